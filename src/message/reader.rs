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

//! Implementation of the [`Reader`] type to read on-the-wire DNS
//! messages.

use std::borrow::Cow;
use std::fmt;

use super::constants::*;
use super::tsig::{self, ReadTsigRr};
use super::{Opcode, Question, Rcode};
use crate::class::Class;
use crate::name::{self, Name};
use crate::rr::descriptor::{self, ReadRdataError};
use crate::rr::{Rdata, Ttl, Type};
use crate::util::{read_u16, read_u32};

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// reading the message data.
///
/// A `Reader` is constructed using its [`TryFrom`] implementation. Any
/// underlying buffer for a reader must contain at least a full DNS
/// message header of 12 octets; otherwise the construction will fail.
///
/// Since header information is in a fixed position, it can be read at
/// any time through the appropriate `Reader` methods. Questions and
/// resource records are read sequentially through a parse cursor,
/// which is initially set to the first octet after the DNS header:
/// call [`Reader::read_question`] for each question, then
/// [`Reader::read_rr`] (or [`Reader::scan_trailing`]) for the records.
///
/// [`Reader::scan_trailing`] consumes the remainder of a request
/// message in one pass, enforcing the structural rules on pseudo-RRs:
/// at most one OPT record in the whole message, and a TSIG record only
/// as the very last record of the additional section. Anything after
/// the last counted record is trailing garbage and rejected.
#[derive(Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes(self.octets[ID_START..ID_END].try_into().unwrap())
    }

    /// Returns whether the QR (query response) bit is set.
    pub fn qr(&self) -> bool {
        (self.octets[QR_BYTE] & QR_MASK) != 0
    }

    /// Returns the message's opcode.
    pub fn opcode(&self) -> Opcode {
        let raw = (self.octets[OPCODE_BYTE] & OPCODE_MASK) >> OPCODE_SHIFT;
        raw.try_into().unwrap()
    }

    /// Returns whether the AA (authoritative answer) bit is set.
    pub fn aa(&self) -> bool {
        (self.octets[AA_BYTE] & AA_MASK) != 0
    }

    /// Returns whether the TC (truncation) bit is set.
    pub fn tc(&self) -> bool {
        (self.octets[TC_BYTE] & TC_MASK) != 0
    }

    /// Returns whether the RD (recursion desired) bit is set.
    pub fn rd(&self) -> bool {
        (self.octets[RD_BYTE] & RD_MASK) != 0
    }

    /// Returns whether the RA (recursion available) bit is set.
    pub fn ra(&self) -> bool {
        (self.octets[RA_BYTE] & RA_MASK) != 0
    }

    /// Returns the RCODE of the message.
    pub fn rcode(&self) -> Rcode {
        let raw = self.octets[RCODE_BYTE] & RCODE_MASK;
        raw.try_into().unwrap()
    }

    /// Returns the number of questions in the message.
    pub fn qdcount(&self) -> u16 {
        u16::from_be_bytes(self.octets[QDCOUNT_START..QDCOUNT_END].try_into().unwrap())
    }

    /// Returns the number of answers in the message.
    pub fn ancount(&self) -> u16 {
        u16::from_be_bytes(self.octets[ANCOUNT_START..ANCOUNT_END].try_into().unwrap())
    }

    /// Returns the number of authority records in the message.
    pub fn nscount(&self) -> u16 {
        u16::from_be_bytes(self.octets[NSCOUNT_START..NSCOUNT_END].try_into().unwrap())
    }

    /// Returns the number of additional records in the message.
    pub fn arcount(&self) -> u16 {
        u16::from_be_bytes(self.octets[ARCOUNT_START..ARCOUNT_END].try_into().unwrap())
    }

    /// Reads a [`Question`] starting at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_question(&mut self) -> Result<Question> {
        let (qname, qname_len) =
            Name::try_from_compressed(self.octets, self.cursor).map_err(Error::InvalidOwner)?;
        let qname_end = self.cursor + qname_len;
        let qtype = read_u16(&self.octets[qname_end..])
            .ok_or(Error::UnexpectedEomInField)?
            .into();
        let qclass = read_u16(&self.octets[qname_end + 2..])
            .ok_or(Error::UnexpectedEomInField)?
            .into();
        self.cursor += qname_len + 4;
        Ok(Question {
            qname,
            qtype,
            qclass,
        })
    }

    /// Reads a resource record at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_rr(&mut self) -> Result<ReadRr<'a>> {
        let (owner, owner_len) =
            Name::try_from_compressed(self.octets, self.cursor).map_err(Error::InvalidOwner)?;
        let owner_end = self.cursor + owner_len;
        let rr_type = read_u16(&self.octets[owner_end..])
            .ok_or(Error::UnexpectedEomInField)?
            .into();
        let class = read_u16(&self.octets[owner_end + 2..])
            .ok_or(Error::UnexpectedEomInField)?
            .into();
        let ttl = read_u32(&self.octets[owner_end + 4..])
            .ok_or(Error::UnexpectedEomInField)?
            .into();
        let rdlength = read_u16(&self.octets[owner_end + 8..]).ok_or(Error::UnexpectedEomInField)?;
        let rdata = descriptor::read(rr_type, self.octets, owner_end + 10, rdlength)?;
        self.cursor = owner_end + 10 + rdlength as usize;
        Ok(ReadRr {
            owner,
            rr_type,
            class,
            ttl,
            rdata,
        })
    }

    /// Scans the records after the question section of a request,
    /// extracting the OPT and TSIG pseudo-RRs while skipping (but not
    /// fully parsing) everything else.
    ///
    /// The structural rules enforced here:
    ///
    /// * at most one OPT record in the message, with the root as its
    ///   owner ([RFC 6891 § 6.1.1]);
    /// * a TSIG record only as the very last record of the additional
    ///   section ([RFC 8945 § 5.1]); and
    /// * no data in the buffer after the last counted record.
    ///
    /// [RFC 6891 § 6.1.1]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.1
    /// [RFC 8945 § 5.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.1
    pub fn scan_trailing(&mut self) -> Result<Trailing> {
        let total =
            self.ancount() as usize + self.nscount() as usize + self.arcount() as usize;
        let mut edns = None;
        let mut tsig = None;

        for index in 0..total {
            let rr_start = self.cursor;
            if tsig.is_some() {
                // Records counted after a TSIG mean it wasn't last.
                return Err(Error::MisplacedTsig);
            }
            let owner_len = Name::skip_compressed(&self.octets[self.cursor..])
                .map_err(Error::InvalidOwner)?;
            let owner_end = self.cursor + owner_len;
            let rr_type: Type = read_u16(&self.octets[owner_end..])
                .ok_or(Error::UnexpectedEomInField)?
                .into();
            let class = read_u16(&self.octets[owner_end + 2..])
                .ok_or(Error::UnexpectedEomInField)?;
            let ttl = read_u32(&self.octets[owner_end + 4..])
                .ok_or(Error::UnexpectedEomInField)?;
            let rdlength =
                read_u16(&self.octets[owner_end + 8..]).ok_or(Error::UnexpectedEomInField)?;
            let rdata_start = owner_end + 10;
            let rdata_end = rdata_start + rdlength as usize;
            if rdata_end > self.octets.len() {
                return Err(Error::UnexpectedEomInField);
            }

            match rr_type {
                Type::OPT => {
                    if edns.is_some() {
                        return Err(Error::MultipleOpt);
                    }
                    if self.octets[rr_start] != 0 {
                        return Err(Error::OptOwnerNotRoot);
                    }
                    edns = Some(ReadEdns {
                        udp_payload_size: class,
                        extended_rcode_upper_bits: (ttl >> 24) as u8,
                        version: (ttl >> 16) as u8,
                        dnssec_ok: ttl & EDNS_DO_MASK != 0,
                    });
                }
                Type::TSIG => {
                    // A TSIG RR is valid only as the last record of the
                    // additional section.
                    if index != total - 1 || self.arcount() == 0 {
                        return Err(Error::MisplacedTsig);
                    }
                    let (key_name, _) = Name::try_from_compressed(self.octets, rr_start)
                        .map_err(Error::InvalidOwner)?;
                    let rr = ReadTsigRr::from_wire(
                        key_name,
                        &self.octets[rdata_start..rdata_end],
                    )
                    .map_err(Error::InvalidTsig)?;
                    tsig = Some(ReadTsig {
                        offset: rr_start,
                        rr,
                    });
                }
                _ => (),
            }
            self.cursor = rdata_end;
        }

        if self.cursor < self.octets.len() {
            return Err(Error::TrailingGarbage);
        }
        Ok(Trailing { edns, tsig })
    }

    /// Returns whether the `Reader`'s cursor has reached the end of the
    /// message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }

    /// Returns the underlying message buffer.
    pub fn octets(&self) -> &'a [u8] {
        self.octets
    }
}

impl<'a> TryFrom<&'a [u8]> for Reader<'a> {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self> {
        if octets.len() >= HEADER_SIZE {
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
            })
        } else {
            Err(Error::HeaderTooShort)
        }
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("id", &self.id())
            .field("qr", &self.qr())
            .field("opcode", &self.opcode())
            .field("aa", &self.aa())
            .field("tc", &self.tc())
            .field("rd", &self.rd())
            .field("ra", &self.ra())
            .field("rcode", &self.rcode())
            .field("qdcount", &self.qdcount())
            .field("ancount", &self.ancount())
            .field("nscount", &self.nscount())
            .field("arcount", &self.arcount())
            .field("cursor", &self.cursor)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// READ RR AND TRAILING-RECORD STRUCTURES                             //
////////////////////////////////////////////////////////////////////////

/// A structure containing RR data as returned by [`Reader::read_rr`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadRr<'a> {
    pub owner: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: Ttl,
    pub rdata: Cow<'a, Rdata>,
}

/// The pseudo-RRs found by [`Reader::scan_trailing`].
#[derive(Debug)]
pub struct Trailing {
    pub edns: Option<ReadEdns>,
    pub tsig: Option<ReadTsig>,
}

/// EDNS information from a request's OPT record ([RFC 6891 § 6.1]).
///
/// [RFC 6891 § 6.1]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1
#[derive(Clone, Copy, Debug)]
pub struct ReadEdns {
    pub udp_payload_size: u16,
    pub extended_rcode_upper_bits: u8,
    pub version: u8,
    pub dnssec_ok: bool,
}

/// A parsed TSIG RR and the offset at which it starts (the length of
/// the message prefix a verification MAC is computed over).
#[derive(Debug)]
pub struct ReadTsig {
    pub offset: usize,
    pub rr: ReadTsigRr,
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that part of a DNS message could not be read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    HeaderTooShort,
    UnexpectedEomInField,
    InvalidOwner(name::Error),
    InvalidRdata(ReadRdataError),
    MultipleOpt,
    OptOwnerNotRoot,
    MisplacedTsig,
    InvalidTsig(tsig::ParseError),
    TrailingGarbage,
}

impl From<ReadRdataError> for Error {
    fn from(err: ReadRdataError) -> Self {
        Self::InvalidRdata(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::HeaderTooShort => f.write_str("header too short"),
            Self::UnexpectedEomInField => f.write_str("unexpected end of message in field"),
            Self::InvalidOwner(err) => write!(f, "invalid owner: {}", err),
            Self::InvalidRdata(err) => err.fmt(f),
            Self::MultipleOpt => f.write_str("more than one OPT record"),
            Self::OptOwnerNotRoot => f.write_str("OPT record owner is not the root"),
            Self::MisplacedTsig => f.write_str("TSIG record is not the last record"),
            Self::InvalidTsig(err) => write!(f, "invalid TSIG record: {}", err),
            Self::TrailingGarbage => f.write_str("data after the last record"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Reader`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::{Qclass, Qtype};
    use super::*;

    /// This is a reply to a query for example.com. IN NS to a recursive
    /// server, made on January 7, 2022.
    const EXAMPLE_COM_NS_MESSAGE: &[u8] =
        b"\xe2\xd7\x81\x80\x00\x01\x00\x02\x00\x00\x00\x01\x07\x65\x78\x61\
          \x6d\x70\x6c\x65\x03\x63\x6f\x6d\x00\x00\x02\x00\x01\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x14\x01\x61\x0c\x69\x61\x6e\x61\
          \x2d\x73\x65\x72\x76\x65\x72\x73\x03\x6e\x65\x74\x00\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x04\x01\x62\xc0\x2b\x00\x00\x29\
          \x10\x00\x00\x00\x00\x00\x00\x00";

    #[test]
    fn reader_works() {
        let mut reader = Reader::try_from(EXAMPLE_COM_NS_MESSAGE).unwrap();
        let expected_qname: Name = "example.com.".parse().unwrap();
        let expected_ns_a: Name = "a.iana-servers.net.".parse().unwrap();
        let expected_ns_b: Name = "b.iana-servers.net.".parse().unwrap();

        // Check the header.
        assert_eq!(reader.id(), 0xe2d7);
        assert!(reader.qr());
        assert_eq!(reader.opcode(), Opcode::QUERY);
        assert!(!reader.aa());
        assert!(!reader.tc());
        assert!(reader.rd());
        assert!(reader.ra());
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert_eq!(reader.qdcount(), 1);
        assert_eq!(reader.ancount(), 2);
        assert_eq!(reader.nscount(), 0);
        assert_eq!(reader.arcount(), 1);

        // Check the question.
        let question = reader.read_question().unwrap();
        assert_eq!(question.qname, expected_qname);
        assert_eq!(question.qtype, Qtype::from(Type::NS));
        assert_eq!(question.qclass, Qclass::from(Class::IN));

        // Check the answers. Note that read_rr decompresses the
        // NS RDATA.
        let answer_1 = reader.read_rr().unwrap();
        assert_eq!(answer_1.owner, expected_qname);
        assert_eq!(answer_1.rr_type, Type::NS);
        assert_eq!(answer_1.class, Class::IN);
        assert_eq!(answer_1.ttl, Ttl::from(86178));
        assert_eq!(answer_1.rdata.octets(), expected_ns_a.wire_repr());
        let answer_2 = reader.read_rr().unwrap();
        assert_eq!(answer_2.owner, expected_qname);
        assert_eq!(answer_2.rdata.octets(), expected_ns_b.wire_repr());

        // Check the OPT record.
        let opt = reader.read_rr().unwrap();
        assert_eq!(opt.owner, Name::root());
        assert_eq!(opt.rr_type, Type::OPT);
        assert_eq!(opt.class, Class::from(4096));
        assert!(opt.rdata.is_empty());

        // And that should be it!
        assert!(reader.at_eom());
    }

    #[test]
    fn scan_trailing_finds_edns() {
        let mut reader = Reader::try_from(EXAMPLE_COM_NS_MESSAGE).unwrap();
        reader.read_question().unwrap();
        let trailing = reader.scan_trailing().unwrap();
        let edns = trailing.edns.unwrap();
        assert_eq!(edns.udp_payload_size, 4096);
        assert_eq!(edns.version, 0);
        assert!(!edns.dnssec_ok);
        assert!(trailing.tsig.is_none());
    }

    #[test]
    fn scan_trailing_rejects_multiple_opts() {
        let mut message = Vec::new();
        message.extend_from_slice(b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x02");
        for _ in 0..2 {
            message.extend_from_slice(b"\x00\x00\x29\x10\x00\x00\x00\x00\x00\x00\x00");
        }
        let mut reader = Reader::try_from(message.as_slice()).unwrap();
        assert_eq!(reader.scan_trailing().unwrap_err(), Error::MultipleOpt);
    }

    #[test]
    fn scan_trailing_rejects_garbage() {
        let mut message = Vec::new();
        message.extend_from_slice(b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01");
        message.extend_from_slice(b"\x00\x00\x29\x10\x00\x00\x00\x00\x00\x00\x00");
        message.extend_from_slice(b"junk");
        let mut reader = Reader::try_from(message.as_slice()).unwrap();
        assert_eq!(reader.scan_trailing().unwrap_err(), Error::TrailingGarbage);
    }

    #[test]
    fn reader_constructor_rejects_short_message() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Reader::try_from(buf.as_slice()), Err(Error::HeaderTooShort));
        }
    }
}
