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

//! Implementation of the [`NameBuilder`] type.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// An incremental builder for [`Name`]s.
///
/// Octets are appended to the current label with
/// [`NameBuilder::try_push`]; [`NameBuilder::next_label`] closes the
/// current label and opens the next one. [`NameBuilder::finish`] closes
/// the name with the null root label and produces the [`Name`]. All
/// length limits are enforced as the name is built, so a `NameBuilder`
/// never holds invalid state.
pub struct NameBuilder {
    wire: ArrayVec<u8, MAX_WIRE_LEN>,
    offsets: ArrayVec<u8, MAX_N_LABELS>,
    label_start: usize,
}

impl NameBuilder {
    /// Creates a new `NameBuilder` with an empty first label.
    pub fn new() -> Self {
        let mut builder = Self {
            wire: ArrayVec::new(),
            offsets: ArrayVec::new(),
            label_start: 0,
        };
        builder.offsets.push(0);
        builder.wire.push(0);
        builder
    }

    /// Returns the length of the label currently under construction.
    fn current_label_len(&self) -> usize {
        self.wire[self.label_start] as usize
    }

    /// Appends an octet to the label currently under construction.
    pub fn try_push(&mut self, octet: u8) -> Result<(), Error> {
        if self.current_label_len() == MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else if self.wire.len() == MAX_WIRE_LEN - 1 {
            // Room must remain for the null root label.
            Err(Error::NameTooLong)
        } else {
            self.wire.push(octet);
            self.wire[self.label_start] += 1;
            Ok(())
        }
    }

    /// Closes the label currently under construction and opens the next
    /// one.
    pub fn next_label(&mut self) -> Result<(), Error> {
        if self.current_label_len() == 0 {
            Err(Error::NullNonTerminal)
        } else if self.offsets.len() == MAX_N_LABELS - 1 || self.wire.len() == MAX_WIRE_LEN - 1 {
            // Again, room must remain for the null root label.
            Err(Error::NameTooLong)
        } else {
            self.label_start = self.wire.len();
            self.offsets.push(self.label_start as u8);
            self.wire.push(0);
            Ok(())
        }
    }

    /// Finishes the name. The label currently under construction must
    /// be empty; it becomes the null root label.
    pub fn finish(self) -> Result<Name, Error> {
        if self.current_label_len() != 0 {
            Err(Error::NonNullTerminal)
        } else {
            Ok(Name::from_parts(&self.offsets, &self.wire))
        }
    }
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
