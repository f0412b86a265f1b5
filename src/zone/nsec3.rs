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

//! NSEC3 parameters and owner-name hashing ([RFC 5155]).
//!
//! [RFC 5155]: https://datatracker.ietf.org/doc/html/rfc5155

use std::fmt;

use data_encoding::BASE32_DNSSEC;
use sha1::{Digest, Sha1};

use crate::name::{Label, Name};
use crate::rr::Rdata;

/// The NSEC3 hash algorithm number for SHA-1, the only algorithm
/// defined by [RFC 5155 § 11].
///
/// [RFC 5155 § 11]: https://datatracker.ietf.org/doc/html/rfc5155#section-11
pub const NSEC3_HASH_SHA1: u8 = 1;

/// The parameters governing a zone's NSEC3 hashed-name index, as
/// carried by the apex NSEC3PARAM record ([RFC 5155 § 4]).
///
/// [RFC 5155 § 4]: https://datatracker.ietf.org/doc/html/rfc5155#section-4
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nsec3Params {
    pub algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Box<[u8]>,
}

impl Nsec3Params {
    /// Decodes NSEC3PARAM RDATA.
    pub fn from_rdata(rdata: &Rdata) -> Result<Self, ParamError> {
        let octets = rdata.octets();
        if octets.len() < 5 {
            return Err(ParamError::Malformed);
        }
        let salt_len = octets[4] as usize;
        if octets.len() != 5 + salt_len {
            return Err(ParamError::Malformed);
        }
        Ok(Self {
            algorithm: octets[0],
            flags: octets[1],
            iterations: u16::from_be_bytes(octets[2..4].try_into().unwrap()),
            salt: octets[5..].into(),
        })
    }

    /// Computes the NSEC3 hash of a domain name under these
    /// parameters, per [RFC 5155 § 5]: the name is folded to
    /// lowercase, and `H(x) = SHA-1(x || salt)` is iterated the
    /// configured number of extra times. Fails if the hash algorithm
    /// is not SHA-1.
    ///
    /// [RFC 5155 § 5]: https://datatracker.ietf.org/doc/html/rfc5155#section-5
    pub fn hash_name(&self, name: &Name) -> Result<[u8; 20], ParamError> {
        if self.algorithm != NSEC3_HASH_SHA1 {
            return Err(ParamError::UnsupportedAlgorithm(self.algorithm));
        }
        let mut lowered = Vec::with_capacity(name.wire_repr().len());
        name.lowercase_wire_repr_into(&mut lowered);

        let mut hash = sha1_with_salt(&lowered, &self.salt);
        for _ in 0..self.iterations {
            hash = sha1_with_salt(&hash, &self.salt);
        }
        Ok(hash)
    }

    /// Computes the owner name of the NSEC3 record corresponding to
    /// `name`: the base32hex-encoded hash prepended to the zone apex
    /// name.
    pub fn hashed_owner(&self, name: &Name, apex: &Name) -> Result<Name, ParamError> {
        let hash = self.hash_name(name)?;
        let encoded = BASE32_DNSSEC.encode(&hash);
        let label = <&Label>::try_from(encoded.as_bytes()).or(Err(ParamError::Malformed))?;
        Name::concat(label, apex).or(Err(ParamError::Malformed))
    }
}

fn sha1_with_salt(data: &[u8], salt: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.update(salt);
    hasher.finalize().into()
}

/// An error decoding NSEC3 parameters or hashing under them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamError {
    /// The NSEC3PARAM RDATA does not have the expected structure.
    Malformed,

    /// The hash algorithm is not SHA-1.
    UnsupportedAlgorithm(u8),
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Malformed => f.write_str("malformed NSEC3PARAM RDATA"),
            Self::UnsupportedAlgorithm(algorithm) => {
                write!(f, "unsupported NSEC3 hash algorithm {}", algorithm)
            }
        }
    }
}

impl std::error::Error for ParamError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// The parameters of the RFC 5155 Appendix A example zone:
    /// algorithm 1, flags 0, 12 iterations, salt aabbccdd.
    fn rfc5155_params() -> Nsec3Params {
        Nsec3Params {
            algorithm: NSEC3_HASH_SHA1,
            flags: 0,
            iterations: 12,
            salt: vec![0xaa, 0xbb, 0xcc, 0xdd].into_boxed_slice(),
        }
    }

    fn hash_to_base32(name: &str) -> String {
        let name: Name = name.parse().unwrap();
        let hash = rfc5155_params().hash_name(&name).unwrap();
        BASE32_DNSSEC.encode(&hash)
    }

    #[test]
    fn from_rdata_works() {
        let rdata: &Rdata = b"\x01\x00\x00\x0c\x04\xaa\xbb\xcc\xdd".try_into().unwrap();
        assert_eq!(Nsec3Params::from_rdata(rdata).unwrap(), rfc5155_params());
    }

    #[test]
    fn from_rdata_rejects_bad_salt_length() {
        let rdata: &Rdata = b"\x01\x00\x00\x0c\x08\xaa\xbb".try_into().unwrap();
        assert_eq!(Nsec3Params::from_rdata(rdata), Err(ParamError::Malformed));
    }

    #[test]
    fn hashes_match_rfc5155_appendix_a() {
        // Worked examples from RFC 5155 Appendix A.
        assert_eq!(hash_to_base32("example."), "0p9mhaveqvm6t7vbl5lop2u3t2rp3tom");
        assert_eq!(hash_to_base32("a.example."), "35mthgpgcu1qg68fab165klnsnk3dpvl");
        assert_eq!(hash_to_base32("ai.example."), "gjeqe526plbf1g8mklp59enfd789njgi");
        assert_eq!(hash_to_base32("ns1.example."), "2t7b4g4vsa5smi47k61mv5bv1a22bojr");
        assert_eq!(hash_to_base32("w.example."), "k8udemvp1j2f7eg6jebps17vp3n8i58h");
        assert_eq!(
            hash_to_base32("*.w.example."),
            "r53bq7cc2uvmubfu5ocmm6pers9tk9en",
        );
        assert_eq!(
            hash_to_base32("x.y.w.example."),
            "2vptu5timamqttgl4luu9kg21e0aor3s",
        );
    }

    #[test]
    fn hashing_is_case_insensitive() {
        assert_eq!(hash_to_base32("A.Example."), hash_to_base32("a.example."));
    }

    #[test]
    fn hashed_owner_appends_the_apex() {
        let apex: Name = "example.".parse().unwrap();
        let name: Name = "a.example.".parse().unwrap();
        let owner = rfc5155_params().hashed_owner(&name, &apex).unwrap();
        let expected: Name = "35mthgpgcu1qg68fab165klnsnk3dpvl.example."
            .parse()
            .unwrap();
        assert_eq!(owner, expected);
    }

    #[test]
    fn unsupported_algorithms_are_rejected() {
        let params = Nsec3Params {
            algorithm: 2,
            ..rfc5155_params()
        };
        let name: Name = "example.".parse().unwrap();
        assert_eq!(
            params.hash_name(&name),
            Err(ParamError::UnsupportedAlgorithm(2)),
        );
    }
}
