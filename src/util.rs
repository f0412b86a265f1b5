// Copyright 2023 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Crate-private utilities.

/// A wrapper around [`str`] references whose [`PartialEq`] and [`Eq`]
/// implementations are ASCII-case-insensitive.
pub struct Caseless<'a>(pub &'a str);

impl PartialEq for Caseless<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}

impl Eq for Caseless<'_> {}

/// Reads a network-byte-order `u16` from the beginning of `octets`,
/// returning [`None`] if the slice is too short.
pub fn read_u16(octets: &[u8]) -> Option<u16> {
    octets
        .get(0..2)
        .map(|bytes| u16::from_be_bytes(bytes.try_into().unwrap()))
}

/// Reads a network-byte-order `u32` from the beginning of `octets`,
/// returning [`None`] if the slice is too short.
pub fn read_u32(octets: &[u8]) -> Option<u32> {
    octets
        .get(0..4)
        .map(|bytes| u32::from_be_bytes(bytes.try_into().unwrap()))
}
