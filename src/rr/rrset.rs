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

//! Implementation of RRset storage.
//!
//! [RFC 2181 § 5] defined an RRset as a group of records with the same
//! owner, class, and type, all sharing one TTL. DNS data is looked up
//! and signed RRset-wise, so zone storage works in RRsets throughout:
//! an [`Rrset`] holds the common type and TTL plus the [`RdataSet`] of
//! its records, and — following DNSSEC practice — the RRSIG records
//! covering the set travel with it as its [`SignatureSet`]. The owner
//! and class are tracked by the containing zone structures.
//!
//! [RFC 2181 § 5]: https://datatracker.ietf.org/doc/html/rfc2181#section-5

use std::fmt;

use super::{Rdata, RdataSet, Ttl, Type};
use crate::util::read_u16;

////////////////////////////////////////////////////////////////////////
// RRSETS                                                             //
////////////////////////////////////////////////////////////////////////

/// An RRset in memory: the records of one `(owner, type, class)`,
/// with any covering RRSIGs.
#[derive(Clone, Debug, PartialEq)]
pub struct Rrset {
    pub rr_type: Type,
    pub ttl: Ttl,
    pub rdatas: RdataSet,
    pub signatures: Option<SignatureSet>,
}

impl Rrset {
    /// Creates a new, empty `Rrset`.
    pub fn new(rr_type: Type, ttl: Ttl) -> Self {
        Self {
            rr_type,
            ttl,
            rdatas: RdataSet::new(),
            signatures: None,
        }
    }

    /// Merges another `Rrset` of the same type into this one: the
    /// RDATAs are unioned (deduplicating by canonical form) and the
    /// TTL becomes the minimum of the two. Signatures are *not*
    /// merged; a merged set needs to be re-signed. Returns the number
    /// of duplicate RDATAs dropped.
    pub fn merge(&mut self, other: &Rrset) -> usize {
        self.ttl = self.ttl.min(other.ttl);
        self.rdatas.merge(self.rr_type, &other.rdatas)
    }

    /// Returns the first RDATA of the set in canonical order, if any.
    pub fn first_rdata(&self) -> Option<&Rdata> {
        self.rdatas.iter().next()
    }
}

/// The RRSIG records covering one [`Rrset`].
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureSet {
    pub ttl: Ttl,
    pub rdatas: RdataSet,
}

////////////////////////////////////////////////////////////////////////
// RRSET LISTS                                                        //
////////////////////////////////////////////////////////////////////////

/// All of the [`Rrset`]s at one node of the DNS tree, sorted by type.
///
/// Records are added one at a time with [`RrsetList::add`]; the list
/// groups them into RRsets. RRSIG records are routed to the RRset of
/// their covered type. Since records arrive in no guaranteed order, a
/// signature whose covered RRset has not been seen yet creates an
/// empty placeholder set; [`RrsetList::lookup`] treats a placeholder
/// with no data as absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RrsetList {
    rrsets: Vec<Rrset>,
}

impl RrsetList {
    /// Returns a new, empty `RrsetList`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a resource record to the `RrsetList`.
    ///
    /// This fails if the TTL of the new record does not match the
    /// other records of its RRset ([RFC 2181 § 5.2]). If the target
    /// RRset already contains RDATA equal (in canonical form) to the
    /// provided RDATA, the record is silently ignored, following the
    /// behavior of other nameservers.
    ///
    /// [RFC 2181 § 5.2]: https://datatracker.ietf.org/doc/html/rfc2181#section-5.2
    pub fn add(&mut self, rr_type: Type, ttl: Ttl, rdata: &Rdata) -> Result<(), RrsetAddError> {
        if rr_type == Type::RRSIG {
            return self.add_signature(ttl, rdata);
        }
        match self.rrsets.binary_search_by_key(&rr_type, |r| r.rr_type) {
            Ok(index) => {
                let rrset = &mut self.rrsets[index];
                if rrset.rdatas.is_empty() {
                    // A placeholder created by an early signature; it
                    // takes its TTL from the first real record.
                    rrset.ttl = ttl;
                } else if rrset.ttl != ttl {
                    return Err(RrsetAddError::TtlMismatch);
                }
                rrset.rdatas.insert(rr_type, rdata);
                Ok(())
            }
            Err(index) => {
                let mut rrset = Rrset::new(rr_type, ttl);
                rrset.rdatas.insert(rr_type, rdata);
                self.rrsets.insert(index, rrset);
                Ok(())
            }
        }
    }

    /// Routes an RRSIG record to the RRset of its covered type.
    fn add_signature(&mut self, ttl: Ttl, rdata: &Rdata) -> Result<(), RrsetAddError> {
        let covered = read_u16(rdata.octets())
            .map(Type::from)
            .ok_or(RrsetAddError::InvalidSignature)?;
        let index = match self.rrsets.binary_search_by_key(&covered, |r| r.rr_type) {
            Ok(index) => index,
            Err(index) => {
                self.rrsets.insert(index, Rrset::new(covered, ttl));
                index
            }
        };
        let signatures = self.rrsets[index].signatures.get_or_insert(SignatureSet {
            ttl,
            rdatas: RdataSet::new(),
        });
        if signatures.rdatas.is_empty() {
            signatures.ttl = ttl;
        } else if signatures.ttl != ttl {
            return Err(RrsetAddError::TtlMismatch);
        }
        signatures.rdatas.insert(Type::RRSIG, rdata);
        Ok(())
    }

    /// Removes a record from the `RrsetList`. An RRset whose last
    /// RDATA is removed is dropped (along with its signatures); an
    /// RRSIG removal that empties the signature set drops the
    /// signature set. Returns whether a record was removed.
    pub fn remove(&mut self, rr_type: Type, rdata: &Rdata) -> bool {
        if rr_type == Type::RRSIG {
            let covered = match read_u16(rdata.octets()).map(Type::from) {
                Some(covered) => covered,
                None => return false,
            };
            if let Ok(index) = self.rrsets.binary_search_by_key(&covered, |r| r.rr_type) {
                let rrset = &mut self.rrsets[index];
                if let Some(signatures) = &mut rrset.signatures {
                    let removed = signatures.rdatas.remove(Type::RRSIG, rdata);
                    if signatures.rdatas.is_empty() {
                        rrset.signatures = None;
                    }
                    if rrset.rdatas.is_empty() && rrset.signatures.is_none() {
                        self.rrsets.remove(index);
                    }
                    return removed;
                }
            }
            false
        } else if let Ok(index) = self.rrsets.binary_search_by_key(&rr_type, |r| r.rr_type) {
            let rrset = &mut self.rrsets[index];
            let removed = rrset.rdatas.remove(rr_type, rdata);
            if rrset.rdatas.is_empty() {
                self.rrsets.remove(index);
            }
            removed
        } else {
            false
        }
    }

    /// Looks up the [`Rrset`] of type `rr_type`, ignoring placeholder
    /// sets that hold no data.
    pub fn lookup(&self, rr_type: Type) -> Option<&Rrset> {
        self.rrsets
            .binary_search_by_key(&rr_type, |r| r.rr_type)
            .map(|index| &self.rrsets[index])
            .ok()
            .filter(|rrset| !rrset.rdatas.is_empty())
    }

    /// Returns an iterator over the [`Rrset`]s of the list (including
    /// any placeholders).
    pub fn iter(&self) -> std::slice::Iter<Rrset> {
        self.rrsets.iter()
    }

    /// Returns a mutable iterator over the [`Rrset`]s of the list.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<Rrset> {
        self.rrsets.iter_mut()
    }

    /// Returns the number of [`Rrset`]s in the list.
    pub fn len(&self) -> usize {
        self.rrsets.len()
    }

    /// Returns whether the list holds no record data at all.
    pub fn is_empty(&self) -> bool {
        self.rrsets.iter().all(|r| r.rdatas.is_empty())
    }
}

/// An error signaling that a record cannot be added to an
/// [`RrsetList`].
#[derive(Debug, Eq, PartialEq)]
pub enum RrsetAddError {
    /// The record's TTL differs from the rest of its RRset.
    TtlMismatch,

    /// An RRSIG record's RDATA was too short to name a covered type.
    InvalidSignature,
}

impl fmt::Display for RrsetAddError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::TtlMismatch => f.write_str("TTL mismatch"),
            Self::InvalidSignature => f.write_str("invalid RRSIG RDATA"),
        }
    }
}

impl std::error::Error for RrsetAddError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
