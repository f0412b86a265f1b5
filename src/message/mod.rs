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

//! Parsing and serialization of on-the-wire DNS messages.
//!
//! [`Reader`] and [`Writer`] are the two entry points. They keep
//! separate cursors — a message is either being parsed or being
//! written, never both — and each enforces the structural rules of
//! RFC 1035 plus the EDNS (RFC 6891) and TSIG (RFC 8945) placement
//! rules on its side of the wire.

use std::fmt;

mod constants;
mod opcode;
mod question;
mod rcode;

pub mod reader;
pub mod tsig;
pub mod writer;

pub use opcode::Opcode;
pub use question::{Qclass, Qtype, Question};
pub use rcode::Rcode;
pub use reader::Reader;
pub use writer::Writer;

/// An extended RCODE, as introduced by EDNS ([RFC 6891 § 6.1.3]) and
/// also used in the TSIG error field ([RFC 8945 § 4.2]).
///
/// [RFC 6891 § 6.1.3]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.3
/// [RFC 8945 § 4.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.2
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ExtendedRcode(u16);

impl ExtendedRcode {
    pub const NOERROR: Self = Self(0);
    pub const FORMERR: Self = Self(1);
    pub const SERVFAIL: Self = Self(2);
    pub const NXDOMAIN: Self = Self(3);
    pub const NOTIMP: Self = Self(4);
    pub const REFUSED: Self = Self(5);
    pub const NOTAUTH: Self = Self(9);
    pub const BADVERS: Self = Self(16);
    pub const BADSIG: Self = Self(16);
    pub const BADKEY: Self = Self(17);
    pub const BADTIME: Self = Self(18);
}

impl From<u16> for ExtendedRcode {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<ExtendedRcode> for u16 {
    fn from(rcode: ExtendedRcode) -> Self {
        rcode.0
    }
}

impl From<Rcode> for ExtendedRcode {
    fn from(rcode: Rcode) -> Self {
        Self(u8::from(rcode) as u16)
    }
}

impl fmt::Debug for ExtendedRcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "extended RCODE {}", self.0)
    }
}

impl fmt::Display for ExtendedRcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
