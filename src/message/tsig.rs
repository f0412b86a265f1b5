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

//! Implementation of Secret Key Authentication for DNS (TSIG), as
//! specified by [RFC 8945].
//!
//! This module implements two basic actions: verification and signing
//! of messages using the TSIG pseudo-RR.
//!
//! For verification, [`Reader::scan_trailing`] produces a
//! [`ReadTsigRr`] along with the offset at which the TSIG RR starts;
//! look the key up in a [`Keyring`] and call
//! [`ReadTsigRr::verify_request`].
//!
//! For signing, configure a [`PreparedTsigRr`] with the appropriate
//! TSIG parameters and hand it to
//! [`Writer::set_tsig`](super::Writer::set_tsig) together with a
//! [`TsigMode`](super::writer::TsigMode); the TSIG RR is then computed
//! and appended as the final record when the message is finished.
//!
//! The two algorithms required by [RFC 8945 § 6], HMAC-SHA1 and
//! HMAC-SHA256, are implemented.
//!
//! [`Reader::scan_trailing`]: super::Reader::scan_trailing
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945
//! [RFC 8945 § 6]: https://datatracker.ietf.org/doc/html/rfc8945#section-6

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use sha1::Sha1;
use sha2::Sha256;

use super::constants::{ARCOUNT_END, ARCOUNT_START, ID_END, ID_START};
use super::ExtendedRcode;
use crate::name::{LowercaseName, Name};
use crate::rr::Rdata;
use crate::util::read_u16;

////////////////////////////////////////////////////////////////////////
// TSIG ALGORITHMS AND KEYS                                           //
////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref HMAC_SHA1_NAME: LowercaseName = "hmac-sha1.".parse().unwrap();
    static ref HMAC_SHA256_NAME: LowercaseName = "hmac-sha256.".parse().unwrap();
}

/// A supported TSIG algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    HmacSha1,
    HmacSha256,
}

impl Algorithm {
    /// Returns the domain name identifying the algorithm.
    pub fn name(self) -> &'static LowercaseName {
        match self {
            Self::HmacSha1 => &HMAC_SHA1_NAME,
            Self::HmacSha256 => &HMAC_SHA256_NAME,
        }
    }

    /// Looks up an algorithm by its domain name.
    pub fn from_name(name: &Name) -> Option<Self> {
        if name == HMAC_SHA1_NAME.as_ref() {
            Some(Self::HmacSha1)
        } else if name == HMAC_SHA256_NAME.as_ref() {
            Some(Self::HmacSha256)
        } else {
            None
        }
    }

    /// Returns the length of a full MAC for this algorithm.
    pub fn mac_len(self) -> usize {
        match self {
            Self::HmacSha1 => 20,
            Self::HmacSha256 => 32,
        }
    }
}

/// A shared secret and the algorithm it is used with.
#[derive(Clone)]
pub struct Key {
    pub algorithm: Algorithm,
    pub secret: Box<[u8]>,
}

/// The set of TSIG keys a server recognizes, indexed by key name.
#[derive(Clone, Default)]
pub struct Keyring {
    keys: HashMap<LowercaseName, Key>,
}

impl Keyring {
    /// Returns a new, empty `Keyring`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a key under the given name.
    pub fn insert(&mut self, name: Name, key: Key) {
        self.keys.insert(name.into(), key);
    }

    /// Looks up a key by name (case-insensitively).
    pub fn get(&self, name: &Name) -> Option<&Key> {
        self.keys.get(name)
    }

    /// Returns whether the keyring holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

////////////////////////////////////////////////////////////////////////
// TIME SIGNED                                                        //
////////////////////////////////////////////////////////////////////////

/// The 48-bit "time signed" field of a TSIG RR: seconds since the Unix
/// epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeSigned(u64);

impl TimeSigned {
    /// Constructs a `TimeSigned` from a Unix timestamp, truncating it
    /// to 48 bits.
    pub fn from_unix_time(secs: u64) -> Self {
        Self(secs & 0x0000_ffff_ffff_ffff)
    }

    /// Returns the current time as a `TimeSigned`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix_time(secs)
    }

    /// Returns the timestamp as seconds since the Unix epoch.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// Returns the absolute difference between two timestamps.
    pub fn abs_diff(self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Returns the six-octet wire form of the timestamp.
    pub fn to_wire(self) -> [u8; 6] {
        let bytes = self.0.to_be_bytes();
        bytes[2..8].try_into().unwrap()
    }
}

////////////////////////////////////////////////////////////////////////
// READ TSIG RRS (VERIFICATION)                                       //
////////////////////////////////////////////////////////////////////////

/// A parsed TSIG RR, as found in a received message.
#[derive(Clone, Debug)]
pub struct ReadTsigRr {
    pub key_name: Name,
    pub algorithm: Name,
    pub time_signed: TimeSigned,
    pub fudge: u16,
    pub mac: Box<[u8]>,
    pub original_id: u16,
    pub error: ExtendedRcode,
    pub other: Box<[u8]>,
}

impl ReadTsigRr {
    /// Parses TSIG RDATA ([RFC 8945 § 4.2]). The owner of the RR (the
    /// key name) is passed in by the caller.
    ///
    /// [RFC 8945 § 4.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.2
    pub fn from_wire(key_name: Name, rdata: &[u8]) -> Result<Self, ParseError> {
        let (algorithm, algorithm_len) =
            Name::try_from_uncompressed(rdata).or(Err(ParseError))?;
        let fixed = &rdata[algorithm_len..];
        if fixed.len() < 10 {
            return Err(ParseError);
        }
        let mut time_bytes = [0; 8];
        time_bytes[2..8].copy_from_slice(&fixed[0..6]);
        let time_signed = TimeSigned::from_unix_time(u64::from_be_bytes(time_bytes));
        let fudge = read_u16(&fixed[6..]).ok_or(ParseError)?;
        let mac_size = read_u16(&fixed[8..]).ok_or(ParseError)? as usize;
        let after_mac = fixed.get(10 + mac_size..).ok_or(ParseError)?;
        let mac = fixed[10..10 + mac_size].into();
        if after_mac.len() < 6 {
            return Err(ParseError);
        }
        let original_id = read_u16(after_mac).ok_or(ParseError)?;
        let error = ExtendedRcode::from(read_u16(&after_mac[2..]).ok_or(ParseError)?);
        let other_len = read_u16(&after_mac[4..]).ok_or(ParseError)? as usize;
        let other_octets = after_mac.get(6..).ok_or(ParseError)?;
        if other_octets.len() != other_len {
            return Err(ParseError);
        }
        Ok(Self {
            key_name,
            algorithm,
            time_signed,
            fudge,
            mac,
            original_id,
            error,
            other: other_octets.into(),
        })
    }

    /// Verifies the MAC of a received request, per [RFC 8945 § 5.2].
    ///
    /// `message` is the full received message and `tsig_offset` the
    /// offset at which the TSIG RR starts (as reported by
    /// [`Reader::scan_trailing`](super::Reader::scan_trailing)). The
    /// MAC is checked first; only then is the time window checked, so
    /// a [`VerifyError::BadTime`] result may (and must) be reported in
    /// a *signed* response.
    pub fn verify_request(
        &self,
        message: &[u8],
        tsig_offset: usize,
        key: &Key,
        now: TimeSigned,
    ) -> Result<(), VerifyError> {
        if Algorithm::from_name(&self.algorithm) != Some(key.algorithm) {
            return Err(VerifyError::BadKey);
        }

        // Reconstruct the message as it was before the TSIG RR was
        // added: original ID, decremented ARCOUNT, TSIG RR removed.
        let mut prefix = message[..tsig_offset].to_vec();
        prefix[ID_START..ID_END].copy_from_slice(&self.original_id.to_be_bytes());
        let arcount = read_u16(&prefix[ARCOUNT_START..]).unwrap_or(0);
        let arcount = arcount.saturating_sub(1);
        prefix[ARCOUNT_START..ARCOUNT_END].copy_from_slice(&arcount.to_be_bytes());

        let variables = self.digest_variables();
        let verified = verify_mac(
            key.algorithm,
            &key.secret,
            &[&prefix, &variables],
            &self.mac,
        );
        if !verified {
            return Err(VerifyError::BadSig);
        }

        if now.abs_diff(self.time_signed) > self.fudge as u64 {
            return Err(VerifyError::BadTime);
        }
        Ok(())
    }

    /// Assembles the TSIG variables that enter the MAC computation
    /// ([RFC 8945 § 4.3.3]).
    ///
    /// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
    fn digest_variables(&self) -> Vec<u8> {
        let mut variables = Vec::new();
        self.key_name.lowercase_wire_repr_into(&mut variables);
        variables.extend_from_slice(&255u16.to_be_bytes()); // class ANY
        variables.extend_from_slice(&0u32.to_be_bytes()); // TTL
        self.algorithm.lowercase_wire_repr_into(&mut variables);
        variables.extend_from_slice(&self.time_signed.to_wire());
        variables.extend_from_slice(&self.fudge.to_be_bytes());
        variables.extend_from_slice(&u16::from(self.error).to_be_bytes());
        variables.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        variables.extend_from_slice(&self.other);
        variables
    }
}

////////////////////////////////////////////////////////////////////////
// PREPARED TSIG RRS (SIGNING)                                        //
////////////////////////////////////////////////////////////////////////

/// The parameters of a TSIG RR to be appended to an outgoing message.
///
/// The MAC itself is computed when the message is finished; see
/// [`Writer::set_tsig`](super::Writer::set_tsig).
#[derive(Clone, Debug)]
pub struct PreparedTsigRr {
    pub key_name: LowercaseName,
    pub time_signed: TimeSigned,
    pub fudge: u16,
    pub original_id: u16,
    pub error: ExtendedRcode,
    pub other: Box<[u8]>,
}

impl PreparedTsigRr {
    /// Returns the total wire size of the signed TSIG RR (owner
    /// through RDATA) for space-reservation purposes.
    pub fn signed_len(&self, algorithm: Algorithm) -> usize {
        self.rr_len(algorithm.name(), algorithm.mac_len())
    }

    /// Like [`PreparedTsigRr::signed_len`], but for an unsigned TSIG
    /// RR (as used in e.g. BADKEY error responses) with the given
    /// algorithm name.
    pub fn unsigned_len(&self, algorithm_name: &Name) -> usize {
        self.rr_len(algorithm_name, 0)
    }

    fn rr_len(&self, algorithm_name: &Name, mac_len: usize) -> usize {
        let rdata_len = algorithm_name.wire_repr().len() + 6 + 2 + 2 + mac_len + 2 + 2 + 2
            + self.other.len();
        self.key_name.wire_repr().len() + 10 + rdata_len
    }

    /// Computes the MAC for a request and produces the TSIG RDATA.
    /// `message` must be the message serialized so far, with final
    /// header counts not including the TSIG RR itself.
    pub fn sign_request(
        &self,
        message: &[u8],
        algorithm: Algorithm,
        key: &[u8],
    ) -> (Box<Rdata>, Box<[u8]>) {
        let variables = self.digest_variables(algorithm);
        let mac = compute_mac(algorithm, key, &[message, &variables]);
        (self.build_rdata(algorithm.name(), &mac), mac.into())
    }

    /// Computes the MAC for a response and produces the TSIG RDATA.
    /// The MAC of the request being answered is mixed in first, per
    /// [RFC 8945 § 4.3.2].
    ///
    /// [RFC 8945 § 4.3.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.2
    pub fn sign_response(
        &self,
        message: &[u8],
        request_mac: &[u8],
        algorithm: Algorithm,
        key: &[u8],
    ) -> (Box<Rdata>, Box<[u8]>) {
        let variables = self.digest_variables(algorithm);
        let request_mac_len = (request_mac.len() as u16).to_be_bytes();
        let mac = compute_mac(
            algorithm,
            key,
            &[&request_mac_len, request_mac, message, &variables],
        );
        (self.build_rdata(algorithm.name(), &mac), mac.into())
    }

    /// Produces unsigned TSIG RDATA (empty MAC), as required for
    /// responses to requests whose key or MAC could not be verified
    /// ([RFC 8945 § 5.2.1] and [§ 5.2.2]).
    ///
    /// [RFC 8945 § 5.2.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2.1
    /// [§ 5.2.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2.2
    pub fn unsigned(&self, algorithm_name: &Name) -> Box<Rdata> {
        self.build_rdata(algorithm_name, &[])
    }

    fn digest_variables(&self, algorithm: Algorithm) -> Vec<u8> {
        let mut variables = Vec::new();
        self.key_name.lowercase_wire_repr_into(&mut variables);
        variables.extend_from_slice(&255u16.to_be_bytes()); // class ANY
        variables.extend_from_slice(&0u32.to_be_bytes()); // TTL
        variables.extend_from_slice(algorithm.name().wire_repr());
        variables.extend_from_slice(&self.time_signed.to_wire());
        variables.extend_from_slice(&self.fudge.to_be_bytes());
        variables.extend_from_slice(&u16::from(self.error).to_be_bytes());
        variables.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        variables.extend_from_slice(&self.other);
        variables
    }

    fn build_rdata(&self, algorithm_name: &Name, mac: &[u8]) -> Box<Rdata> {
        let mut rdata = Vec::new();
        rdata.extend_from_slice(algorithm_name.wire_repr());
        rdata.extend_from_slice(&self.time_signed.to_wire());
        rdata.extend_from_slice(&self.fudge.to_be_bytes());
        rdata.extend_from_slice(&(mac.len() as u16).to_be_bytes());
        rdata.extend_from_slice(mac);
        rdata.extend_from_slice(&self.original_id.to_be_bytes());
        rdata.extend_from_slice(&u16::from(self.error).to_be_bytes());
        rdata.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        rdata.extend_from_slice(&self.other);
        Rdata::from_vec(rdata).expect("TSIG RDATA cannot exceed the length limit")
    }
}

////////////////////////////////////////////////////////////////////////
// MAC COMPUTATION                                                    //
////////////////////////////////////////////////////////////////////////

fn compute_mac(algorithm: Algorithm, key: &[u8], chunks: &[&[u8]]) -> Vec<u8> {
    match algorithm {
        Algorithm::HmacSha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).unwrap();
            for chunk in chunks {
                mac.update(chunk);
            }
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
            for chunk in chunks {
                mac.update(chunk);
            }
            mac.finalize().into_bytes().to_vec()
        }
    }
}

fn verify_mac(algorithm: Algorithm, key: &[u8], chunks: &[&[u8]], expected: &[u8]) -> bool {
    match algorithm {
        Algorithm::HmacSha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).unwrap();
            for chunk in chunks {
                mac.update(chunk);
            }
            mac.verify_slice(expected).is_ok()
        }
        Algorithm::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
            for chunk in chunks {
                mac.update(chunk);
            }
            mac.verify_slice(expected).is_ok()
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that TSIG RDATA could not be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("malformed TSIG RDATA")
    }
}

impl std::error::Error for ParseError {}

/// The result of a failed TSIG verification, mapping to the error
/// codes of [RFC 8945 § 5.2].
///
/// [RFC 8945 § 5.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerifyError {
    /// The key is unknown or the algorithm does not match.
    BadKey,

    /// The MAC did not verify.
    BadSig,

    /// The signature is outside the allowed time window.
    BadTime,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::BadKey => f.write_str("unknown key or algorithm mismatch"),
            Self::BadSig => f.write_str("MAC verification failed"),
            Self::BadTime => f.write_str("signature outside the time window"),
        }
    }
}

impl std::error::Error for VerifyError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef";

    fn test_key() -> Key {
        Key {
            algorithm: Algorithm::HmacSha256,
            secret: SECRET.into(),
        }
    }

    /// Builds a signed message: a minimal header-plus-question prefix
    /// with a TSIG RR appended. Returns the full message, the TSIG
    /// offset, and the parsed TSIG RR.
    fn signed_message(time_signed: TimeSigned) -> (Vec<u8>, usize, ReadTsigRr) {
        let key_name: Name = "key.yarrow.test.".parse().unwrap();

        // Header (ID 0x1234, ARCOUNT 0) plus opaque question bytes.
        let mut prefix = vec![0u8; 12];
        prefix[0..2].copy_from_slice(&0x1234u16.to_be_bytes());
        prefix.extend_from_slice(b"\x03foo\x04test\x00\x00\x01\x00\x01");

        let prepared = PreparedTsigRr {
            key_name: key_name.clone().into(),
            time_signed,
            fudge: 300,
            original_id: 0x1234,
            error: ExtendedRcode::NOERROR,
            other: Box::new([]),
        };
        let (rdata, _mac) = prepared.sign_request(&prefix, Algorithm::HmacSha256, SECRET);

        // Append the TSIG RR and bump ARCOUNT.
        let mut message = prefix;
        message[11] = 1;
        let tsig_offset = message.len();
        message.extend_from_slice(key_name.wire_repr());
        message.extend_from_slice(&250u16.to_be_bytes()); // TYPE TSIG
        message.extend_from_slice(&255u16.to_be_bytes()); // CLASS ANY
        message.extend_from_slice(&0u32.to_be_bytes()); // TTL
        message.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        message.extend_from_slice(rdata.octets());

        let read = ReadTsigRr::from_wire(key_name, rdata.octets()).unwrap();
        (message, tsig_offset, read)
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let time = TimeSigned::from_unix_time(1_690_000_000);
        let (message, tsig_offset, read) = signed_message(time);
        let now = TimeSigned::from_unix_time(1_690_000_100);
        assert_eq!(
            read.verify_request(&message, tsig_offset, &test_key(), now),
            Ok(()),
        );
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let time = TimeSigned::from_unix_time(1_690_000_000);
        let (message, tsig_offset, read) = signed_message(time);
        let bad_key = Key {
            algorithm: Algorithm::HmacSha256,
            secret: b"not-the-secret".as_slice().into(),
        };
        assert_eq!(
            read.verify_request(&message, tsig_offset, &bad_key, time),
            Err(VerifyError::BadSig),
        );
    }

    #[test]
    fn verify_rejects_stale_time() {
        let time = TimeSigned::from_unix_time(1_690_000_000);
        let (message, tsig_offset, read) = signed_message(time);
        let now = TimeSigned::from_unix_time(1_690_001_000);
        assert_eq!(
            read.verify_request(&message, tsig_offset, &test_key(), now),
            Err(VerifyError::BadTime),
        );
    }

    #[test]
    fn verify_rejects_algorithm_mismatch() {
        let time = TimeSigned::from_unix_time(1_690_000_000);
        let (message, tsig_offset, read) = signed_message(time);
        let sha1_key = Key {
            algorithm: Algorithm::HmacSha1,
            secret: SECRET.into(),
        };
        assert_eq!(
            read.verify_request(&message, tsig_offset, &sha1_key, time),
            Err(VerifyError::BadKey),
        );
    }

    #[test]
    fn keyring_lookup_is_case_insensitive() {
        let mut keyring = Keyring::new();
        keyring.insert("Key.Yarrow.Test.".parse().unwrap(), test_key());
        let query_name: Name = "key.yarrow.test.".parse().unwrap();
        assert!(keyring.get(&query_name).is_some());
    }

    #[test]
    fn time_signed_wire_form_is_48_bits() {
        let time = TimeSigned::from_unix_time(0x0000_0123_4567_89ab);
        assert_eq!(time.to_wire(), [0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);
    }
}
