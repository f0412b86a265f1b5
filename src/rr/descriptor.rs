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

//! The RR type descriptor table.
//!
//! Every operation that must understand the interior structure of
//! RDATA — extracting embedded domain names for the zone adjust pass,
//! computing the DNSSEC canonical form for ordering and deduplication,
//! decompressing names on read, and compressing names on write — is
//! driven by a single static table mapping each RR type to a list of
//! [`FieldKind`]s. Types absent from the table are treated as opaque
//! ([RFC 3597]), so unknown types need no special handling anywhere.
//!
//! The name field kinds are distinguished by their wire rules:
//!
//! * [`FieldKind::CompressedName`]: may appear compressed in messages
//!   and may be compressed when written (the RFC 1035 types);
//! * [`FieldKind::UncompressedName`]: must be written uncompressed,
//!   but is decompressed on read for compatibility ([RFC 3597 § 4]);
//! * [`FieldKind::LiteralName`]: never compressed in either direction
//!   and excluded from canonical-form case folding ([RFC 6840 § 5.1]).
//!
//! [RFC 3597]: https://datatracker.ietf.org/doc/html/rfc3597
//! [RFC 3597 § 4]: https://datatracker.ietf.org/doc/html/rfc3597#section-4
//! [RFC 6840 § 5.1]: https://datatracker.ietf.org/doc/html/rfc6840#section-5.1

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use super::{Rdata, Type};
use crate::name::{self, Name};

////////////////////////////////////////////////////////////////////////
// FIELD KINDS AND THE DESCRIPTOR TABLE                               //
////////////////////////////////////////////////////////////////////////

/// The kind of one RDATA field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// A domain name that participates in message compression.
    CompressedName,

    /// A domain name written uncompressed but decompressed on read.
    UncompressedName,

    /// A domain name never subject to compression or case folding.
    LiteralName,

    /// A fixed-width field of the given size in octets.
    Fixed(usize),

    /// The variable-length tail of the RDATA (possibly empty).
    Remainder,
}

impl FieldKind {
    /// Returns whether this field holds a domain name.
    pub fn is_name(self) -> bool {
        matches!(
            self,
            Self::CompressedName | Self::UncompressedName | Self::LiteralName
        )
    }
}

const SINGLE_COMPRESSED_NAME: &[FieldKind] = &[FieldKind::CompressedName];
const SOA_FIELDS: &[FieldKind] = &[
    FieldKind::CompressedName,
    FieldKind::CompressedName,
    FieldKind::Fixed(20),
];
const MINFO_FIELDS: &[FieldKind] = &[FieldKind::CompressedName, FieldKind::CompressedName];
const MX_FIELDS: &[FieldKind] = &[FieldKind::Fixed(2), FieldKind::CompressedName];
const SRV_FIELDS: &[FieldKind] = &[FieldKind::Fixed(6), FieldKind::UncompressedName];
const RRSIG_FIELDS: &[FieldKind] = &[
    FieldKind::Fixed(18),
    FieldKind::LiteralName,
    FieldKind::Remainder,
];
const NSEC_FIELDS: &[FieldKind] = &[FieldKind::LiteralName, FieldKind::Remainder];
const OPAQUE: &[FieldKind] = &[FieldKind::Remainder];

/// Returns the descriptor (the list of RDATA field kinds) for an RR
/// type. Unknown types are opaque.
pub fn fields(rr_type: Type) -> &'static [FieldKind] {
    match rr_type {
        Type::NS
        | Type::MD
        | Type::MF
        | Type::CNAME
        | Type::MB
        | Type::MG
        | Type::MR
        | Type::PTR => SINGLE_COMPRESSED_NAME,
        Type::SOA => SOA_FIELDS,
        Type::MINFO => MINFO_FIELDS,
        Type::MX => MX_FIELDS,
        Type::SRV => SRV_FIELDS,
        Type::RRSIG => RRSIG_FIELDS,
        Type::NSEC => NSEC_FIELDS,
        _ => OPAQUE,
    }
}

////////////////////////////////////////////////////////////////////////
// FIELD ITERATION                                                    //
////////////////////////////////////////////////////////////////////////

/// An iterator over the `(kind, octets)` fields of an RDATA, produced
/// by [`fields_of`].
pub struct Fields<'a> {
    kinds: std::slice::Iter<'static, FieldKind>,
    rdata: &'a [u8],
    cursor: usize,
    failed: bool,
}

/// Returns an iterator over the fields of `rdata`, interpreted as the
/// RDATA of a record of type `rr_type`. Domain-name fields must be in
/// uncompressed form (which is how all stored RDATA is kept; see
/// [`read`] for the on-the-wire case).
pub fn fields_of(rr_type: Type, rdata: &[u8]) -> Fields {
    Fields {
        kinds: fields(rr_type).iter(),
        rdata,
        cursor: 0,
        failed: false,
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<(FieldKind, &'a [u8]), FieldError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let kind = match self.kinds.next() {
            Some(kind) => *kind,
            None => {
                if self.cursor < self.rdata.len() {
                    self.failed = true;
                    return Some(Err(FieldError::TrailingOctets));
                } else {
                    return None;
                }
            }
        };
        let remaining = &self.rdata[self.cursor..];
        let len = match kind {
            FieldKind::CompressedName | FieldKind::UncompressedName | FieldKind::LiteralName => {
                match Name::validate_uncompressed(remaining) {
                    Ok(len) => len,
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(FieldError::InvalidName(e)));
                    }
                }
            }
            FieldKind::Fixed(n) => {
                if remaining.len() < n {
                    self.failed = true;
                    return Some(Err(FieldError::Truncated));
                }
                n
            }
            FieldKind::Remainder => remaining.len(),
        };
        self.cursor += len;
        Some(Ok((kind, &remaining[..len])))
    }
}

/// An error found while walking the fields of an RDATA.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldError {
    /// The RDATA ended in the middle of a field.
    Truncated,

    /// A domain-name field did not hold a valid uncompressed name.
    InvalidName(name::Error),

    /// Octets remained after the last field of the descriptor.
    TrailingOctets,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Truncated => f.write_str("RDATA ends mid-field"),
            Self::InvalidName(e) => write!(f, "invalid domain name in RDATA: {}", e),
            Self::TrailingOctets => f.write_str("extra octets after the last RDATA field"),
        }
    }
}

impl std::error::Error for FieldError {}

/// Validates RDATA of the given type against its descriptor.
pub fn validate(rr_type: Type, rdata: &Rdata) -> Result<(), FieldError> {
    for field in fields_of(rr_type, rdata.octets()) {
        field?;
    }
    Ok(())
}

/// Returns the spans of the domain-name fields of `rdata`. Malformed
/// RDATA yields the fields up to the malformation.
pub fn dnames(rr_type: Type, rdata: &Rdata) -> Vec<&[u8]> {
    fields_of(rr_type, rdata.octets())
        .filter_map(|field| match field {
            Ok((kind, octets)) if kind.is_name() => Some(octets),
            _ => None,
        })
        .collect()
}

////////////////////////////////////////////////////////////////////////
// CANONICAL FORM                                                     //
////////////////////////////////////////////////////////////////////////

/// Compares two RDATAs of type `rr_type` in DNSSEC canonical form
/// ([RFC 4034 § 6.3]): compressible domain-name fields are compared
/// with ASCII case folded, everything else bitwise. If either RDATA is
/// malformed with respect to the descriptor, this falls back to a
/// bitwise comparison of the full RDATAs.
///
/// [RFC 4034 § 6.3]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.3
pub fn canonical_cmp(rr_type: Type, a: &Rdata, b: &Rdata) -> Ordering {
    let mut fields_a = fields_of(rr_type, a.octets());
    let mut fields_b = fields_of(rr_type, b.octets());
    loop {
        match (fields_a.next(), fields_b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Ok((kind, span_a))), Some(Ok((_, span_b)))) => {
                let ordering = match kind {
                    FieldKind::CompressedName | FieldKind::UncompressedName => {
                        let lhs = span_a.iter().map(u8::to_ascii_lowercase);
                        let rhs = span_b.iter().map(u8::to_ascii_lowercase);
                        lhs.cmp(rhs)
                    }
                    _ => span_a.cmp(span_b),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            // Malformed on either side: bitwise fallback.
            _ => return a.octets().cmp(b.octets()),
        }
    }
}

/// Determines whether two RDATAs of type `rr_type` are equal in DNSSEC
/// canonical form. See [`canonical_cmp`].
pub fn canonical_eq(rr_type: Type, a: &Rdata, b: &Rdata) -> bool {
    canonical_cmp(rr_type, a, b).is_eq()
}

////////////////////////////////////////////////////////////////////////
// READING RDATA FROM MESSAGES                                        //
////////////////////////////////////////////////////////////////////////

/// An error signaling that RDATA could not be read from a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadRdataError {
    /// The message ended before `rdlength` octets of RDATA.
    UnexpectedEom,

    /// A domain-name field was invalid.
    InvalidName(name::Error),

    /// The RDATA did not match the descriptor for its type.
    Malformed,

    /// Decompression expanded the RDATA beyond the 65,535-octet limit.
    TooLong,
}

impl From<name::Error> for ReadRdataError {
    fn from(e: name::Error) -> Self {
        Self::InvalidName(e)
    }
}

impl From<FieldError> for ReadRdataError {
    fn from(e: FieldError) -> Self {
        match e {
            FieldError::InvalidName(e) => Self::InvalidName(e),
            _ => Self::Malformed,
        }
    }
}

impl fmt::Display for ReadRdataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::UnexpectedEom => f.write_str("unexpected end of message in RDATA"),
            Self::InvalidName(e) => write!(f, "invalid domain name in RDATA: {}", e),
            Self::Malformed => f.write_str("RDATA does not match its type's structure"),
            Self::TooLong => f.write_str("RDATA is too long after decompression"),
        }
    }
}

impl std::error::Error for ReadRdataError {}

/// Reads RDATA of type `rr_type` and length `rdlength` from `message`
/// starting at `cursor`, validating it against the descriptor and
/// decompressing any embedded compressed domain names.
///
/// Per [RFC 3597 § 4], only RFC 1035 types may contain compressed
/// names; the `UncompressedName` kinds are nevertheless decompressed
/// on read to be liberal in what we accept. When no rewriting is
/// needed, a borrowed reference into `message` is returned.
///
/// [RFC 3597 § 4]: https://datatracker.ietf.org/doc/html/rfc3597#section-4
pub fn read<'a>(
    rr_type: Type,
    message: &'a [u8],
    cursor: usize,
    rdlength: u16,
) -> Result<Cow<'a, Rdata>, ReadRdataError> {
    let end = cursor + rdlength as usize;
    if end > message.len() {
        return Err(ReadRdataError::UnexpectedEom);
    }
    let original = &message[cursor..end];

    let kinds = fields(rr_type);
    if kinds == OPAQUE {
        // No structure to check and nothing to decompress.
        let rdata = original.try_into().or(Err(ReadRdataError::TooLong))?;
        return Ok(Cow::Borrowed(rdata));
    }

    let mut out = Vec::with_capacity(original.len());
    let mut index = cursor;
    for kind in kinds {
        match *kind {
            FieldKind::CompressedName | FieldKind::UncompressedName => {
                // Names may point backwards anywhere in the message,
                // but the contiguous chunk must lie within the RDATA.
                let (name, consumed) = Name::try_from_compressed(message, index)?;
                if index + consumed > end {
                    return Err(ReadRdataError::Malformed);
                }
                out.extend_from_slice(name.wire_repr());
                index += consumed;
            }
            FieldKind::LiteralName => {
                let len = Name::validate_uncompressed(&message[index..end])?;
                out.extend_from_slice(&message[index..index + len]);
                index += len;
            }
            FieldKind::Fixed(n) => {
                if index + n > end {
                    return Err(ReadRdataError::Malformed);
                }
                out.extend_from_slice(&message[index..index + n]);
                index += n;
            }
            FieldKind::Remainder => {
                out.extend_from_slice(&message[index..end]);
                index = end;
            }
        }
    }
    if index != end {
        return Err(ReadRdataError::Malformed);
    }

    if out == original {
        let rdata = original.try_into().or(Err(ReadRdataError::TooLong))?;
        Ok(Cow::Borrowed(rdata))
    } else {
        Rdata::from_vec(out)
            .map(Cow::Owned)
            .or(Err(ReadRdataError::TooLong))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn rdata(octets: &[u8]) -> &Rdata {
        octets.try_into().unwrap()
    }

    #[test]
    fn fields_of_walks_soa() {
        let soa = b"\x02ns\x04test\x00\x05admin\x04test\x00\
                    \x00\x00\x00\x01\x00\x00\x0e\x10\x00\x00\x03\x84\
                    \x00\x09\x3a\x80\x00\x00\x01\x2c";
        let fields: Vec<_> = fields_of(Type::SOA, soa).map(Result::unwrap).collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].0, FieldKind::CompressedName);
        assert_eq!(fields[0].1, b"\x02ns\x04test\x00");
        assert_eq!(fields[1].0, FieldKind::CompressedName);
        assert_eq!(fields[2].0, FieldKind::Fixed(20));
    }

    #[test]
    fn fields_of_rejects_trailing_octets() {
        let results: Vec<_> = fields_of(Type::CNAME, b"\x04test\x00junk").collect();
        assert_eq!(results.last(), Some(&Err(FieldError::TrailingOctets)));
    }

    #[test]
    fn fields_of_rejects_short_fixed_field() {
        let results: Vec<_> = fields_of(Type::MX, b"\x00").collect();
        assert_eq!(results[0], Err(FieldError::Truncated));
    }

    #[test]
    fn unknown_types_are_opaque() {
        let octets = b"\xde\xad\xbe\xef";
        let fields: Vec<_> = fields_of(Type::from(65280), octets)
            .map(Result::unwrap)
            .collect();
        assert_eq!(fields, vec![(FieldKind::Remainder, &octets[..])]);
    }

    #[test]
    fn canonical_eq_folds_case_in_names() {
        assert!(canonical_eq(
            Type::CNAME,
            rdata(b"\x04Test\x00"),
            rdata(b"\x04tEST\x00"),
        ));
        // ... but not in opaque data.
        assert!(!canonical_eq(Type::TXT, rdata(b"\x04Test"), rdata(b"\x04tEST")));
    }

    #[test]
    fn canonical_cmp_orders_by_folded_names() {
        let a = rdata(b"\x01A\x04test\x00");
        let b = rdata(b"\x01b\x04test\x00");
        assert_eq!(canonical_cmp(Type::NS, a, b), Ordering::Less);
    }

    #[test]
    fn read_decompresses_names() {
        // Message: a name at offset 0, then MX RDATA whose exchange
        // field points back at it.
        let mut message = Vec::new();
        message.extend_from_slice(b"\x04mail\x04test\x00");
        let cursor = message.len();
        message.extend_from_slice(b"\x00\x0a\xc0\x00");
        let rdata = read(Type::MX, &message, cursor, 4).unwrap();
        assert_eq!(rdata.octets(), b"\x00\x0a\x04mail\x04test\x00");
        assert!(matches!(rdata, Cow::Owned(_)));
    }

    #[test]
    fn read_borrows_when_uncompressed() {
        let message = b"\x00\x0a\x04mail\x04test\x00";
        let rdata = read(Type::MX, message, 0, message.len() as u16).unwrap();
        assert!(matches!(rdata, Cow::Borrowed(_)));
    }

    #[test]
    fn read_rejects_overrun() {
        assert_eq!(
            read(Type::A, b"\x7f\x00", 0, 4),
            Err(ReadRdataError::UnexpectedEom),
        );
    }
}
