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

//! Implementation of parsing and validation of on-the-wire names.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// The maximum number of compression pointers we will follow while
/// parsing a single compressed name. Pointers must point strictly
/// backwards, which already guarantees termination; the cap bounds the
/// work an adversarial message can make us do.
const MAX_POINTER_JUMPS: usize = 128;

////////////////////////////////////////////////////////////////////////
// VALIDATION AND PARSING OF UNCOMPRESSED ON-THE-WIRE NAMES           //
////////////////////////////////////////////////////////////////////////

/// Parses an uncompressed name present at the beginning of `octets`.
/// The parameter `use_all` controls whether to expect the name to
/// occupy the entire buffer. This is the implementation of
/// [`Name::try_from_uncompressed`] and
/// [`Name::try_from_uncompressed_all`].
pub fn parse_uncompressed_name(octets: &[u8], use_all: bool) -> Result<(Name, usize), Error> {
    let mut offset = 0;
    let mut finished = false;
    let mut label_offsets = ArrayVec::<u8, MAX_N_LABELS>::new();
    while !finished && offset < octets.len() {
        let label_len = octets[offset];
        if label_len > (MAX_LABEL_LEN as u8) {
            return Err(Error::LabelTooLong);
        } else if label_len == 0 {
            finished = true;
        }
        label_offsets.push(offset as u8);
        offset += label_len as usize + 1;
        if offset > MAX_WIRE_LEN {
            // We check the offset against the maximum wire length in
            // each iteration (as opposed to once at the end) to ensure
            // that we never overflow label_offsets.
            return Err(Error::NameTooLong);
        }
    }

    if !finished {
        Err(Error::UnexpectedEom)
    } else if use_all && offset < octets.len() {
        Err(Error::ExtraData)
    } else if offset > octets.len() {
        Err(Error::UnexpectedEom)
    } else {
        let name = Name::from_parts(&label_offsets, &octets[..offset]);
        Ok((name, offset))
    }
}

/// Validates an uncompressed name present at the beginning of `octets`.
/// The parameter `use_all` controls whether to expect the name to
/// occupy the entire buffer. This is the implementation of
/// [`Name::validate_uncompressed`] and
/// [`Name::validate_uncompressed_all`].
pub fn validate_uncompressed_name(octets: &[u8], use_all: bool) -> Result<usize, Error> {
    let mut offset = 0;
    let mut finished = false;
    while !finished && offset < octets.len() {
        let label_len = octets[offset];
        if label_len > (MAX_LABEL_LEN as u8) {
            return Err(Error::LabelTooLong);
        } else if label_len == 0 {
            finished = true;
        }
        offset += label_len as usize + 1;
        if offset > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
    }

    if !finished {
        Err(Error::UnexpectedEom)
    } else if use_all && offset < octets.len() {
        Err(Error::ExtraData)
    } else if offset > octets.len() {
        Err(Error::UnexpectedEom)
    } else {
        Ok(offset)
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING OF COMPRESSED ON-THE-WIRE NAMES                            //
////////////////////////////////////////////////////////////////////////

/// Parses a compressed name starting at index `start` of `octets`.
/// Pointers are followed. Indices given in pointers are treated as
/// indices of `octets`, so the intention is for an entire DNS message
/// to be passed in `octets`. This is the implementation of
/// [`Name::try_from_compressed`].
pub fn parse_compressed_name(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
    let mut next_chunk = Some(start);
    let mut wire_len_of_first_chunk = None;
    let mut jumps = 0;

    let mut label_offsets = ArrayVec::<u8, MAX_N_LABELS>::new();
    let mut wire_repr = ArrayVec::<u8, MAX_WIRE_LEN>::new();

    while let Some(chunk_start) = next_chunk {
        let mut finished_with_chunk = false;
        let mut index = chunk_start;

        while !finished_with_chunk {
            let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
            if len & 0xc0 == 0xc0 {
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(Error::TooManyPointers);
                }
                next_chunk = Some(parse_pointer(octets, chunk_start, index)? as usize);
                index += 2;
                finished_with_chunk = true;
            } else if len > (MAX_LABEL_LEN as u8) {
                return Err(Error::LabelTooLong);
            } else {
                if label_offsets.try_push(wire_repr.len() as u8).is_err() {
                    return Err(Error::NameTooLong);
                }
                let end_of_label = index + len as usize + 1;
                if len == 0 {
                    next_chunk = None;
                    finished_with_chunk = true;
                } else if end_of_label >= octets.len() {
                    return Err(Error::UnexpectedEom);
                }
                wire_repr
                    .try_extend_from_slice(&octets[index..end_of_label])
                    .or(Err(Error::NameTooLong))?;
                index = end_of_label;
            }
        }

        wire_len_of_first_chunk.get_or_insert(index - chunk_start);
    }

    let name = Name::from_parts(&label_offsets, &wire_repr);
    Ok((name, wire_len_of_first_chunk.unwrap()))
}

/// Parses a pointer at `index` in `octets`. This also checks that the
/// pointer refers to an index *earlier* than the start of the chunk it
/// is in (`chunk_start`).
fn parse_pointer(octets: &[u8], chunk_start: usize, index: usize) -> Result<u16, Error> {
    if index + 1 < octets.len() {
        let pointer_bytes = [octets[index], octets[index + 1]];
        let pointer = u16::from_be_bytes(pointer_bytes) & (!0xc000);
        if (pointer as usize) >= chunk_start {
            // According to RFC 1035 § 4.1.4, pointers point to a
            // *prior* occurrence of the name. (Importantly, this
            // prevents loops!)
            Err(Error::InvalidPointer)
        } else {
            Ok(pointer)
        }
    } else {
        Err(Error::UnexpectedEom)
    }
}

////////////////////////////////////////////////////////////////////////
// SKIPPING OF COMPRESSED ON-THE-WIRE NAMES                           //
////////////////////////////////////////////////////////////////////////

/// Skips a compressed name starting at the beginning of `octets`; this
/// is the implementation of [`Name::skip_compressed`].
pub fn skip_compressed_name(octets: &[u8]) -> Result<usize, Error> {
    let mut offset = 0;

    while offset < octets.len() {
        let label_len = octets[offset];
        if label_len & 0xc0 == 0xc0 {
            if offset + 2 > octets.len() {
                return Err(Error::UnexpectedEom);
            }
            return Ok(offset + 2);
        } else if label_len > (MAX_LABEL_LEN as u8) {
            return Err(Error::LabelTooLong);
        } else if label_len == 0 {
            return Ok(offset + 1);
        } else {
            offset += 1 + label_len as usize;
        }
        if offset > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
    }

    Err(Error::UnexpectedEom)
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uncompressed_works() {
        let buf = b"\x03www\x04test\x00extra";
        let (name, len) = parse_uncompressed_name(buf, false).unwrap();
        assert_eq!(len, 10);
        assert_eq!(name.wire_repr(), b"\x03www\x04test\x00");
        assert_eq!(
            parse_uncompressed_name(buf, true),
            Err(Error::ExtraData),
        );
    }

    #[test]
    fn parse_uncompressed_rejects_truncation() {
        assert_eq!(
            parse_uncompressed_name(b"\x03ww", false),
            Err(Error::UnexpectedEom),
        );
        assert_eq!(
            parse_uncompressed_name(b"\x03www", false),
            Err(Error::UnexpectedEom),
        );
    }

    #[test]
    fn parse_compressed_follows_pointers() {
        // A name at offset 12 pointing back to a name at offset 0.
        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x04test\x00______");
        let start = buf.len();
        buf.extend_from_slice(b"\x03www\xc0\x00");
        let (name, len) = parse_compressed_name(&buf, start).unwrap();
        assert_eq!(len, 6);
        assert_eq!(name.wire_repr(), b"\x03www\x04test\x00");
    }

    #[test]
    fn parse_compressed_rejects_forward_pointers() {
        let buf = b"\x03www\xc0\x08\x00\x00\x04test\x00";
        assert_eq!(
            parse_compressed_name(buf, 0),
            Err(Error::InvalidPointer),
        );
    }

    #[test]
    fn parse_compressed_rejects_self_pointers() {
        let buf = b"\xc0\x00";
        assert_eq!(
            parse_compressed_name(buf, 0),
            Err(Error::InvalidPointer),
        );
    }

    #[test]
    fn skip_compressed_works() {
        assert_eq!(skip_compressed_name(b"\x04test\x00"), Ok(6));
        assert_eq!(skip_compressed_name(b"\x03www\xc0\x00"), Ok(6));
        assert_eq!(skip_compressed_name(b"\xc0\x00"), Ok(2));
        assert_eq!(
            skip_compressed_name(b"\x04test"),
            Err(Error::UnexpectedEom),
        );
    }
}
