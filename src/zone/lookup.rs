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

//! The zone lookup algorithm of [RFC 1034 § 4.3.2], as clarified by
//! [RFC 4592].
//!
//! The search runs on the canonically ordered plain tree. A single
//! [`find_less_equal`](super::ZoneTree::find_less_equal) query yields
//! either the exact node or the canonical predecessor; in the latter
//! case the *closest encloser* (the deepest existing ancestor of the
//! searched name) is found by walking the predecessor's `parent`
//! links until an ancestor of the searched name is reached. From
//! there:
//!
//! * a zone cut at or above the match turns the result into a
//!   referral (unless the caller asked to search below cuts, as glue
//!   lookups do, or the query is for the DS RRset at the cut itself);
//! * an exact match yields the requested RRset, the node's CNAME, or
//!   a no-records result;
//! * without an exact match, a wildcard child of the closest encloser
//!   (`*.<closest encloser>`, RFC 4592's "source of synthesis") is
//!   tried before concluding that the name does not exist.
//!
//! [RFC 1034 § 4.3.2]: https://datatracker.ietf.org/doc/html/rfc1034#section-4.3.2
//! [RFC 4592]: https://datatracker.ietf.org/doc/html/rfc4592

use super::{Node, NodeId, ZoneContents};
use crate::name::Name;
use crate::rr::{Rrset, Type};

////////////////////////////////////////////////////////////////////////
// LOOKUP RESULT TYPES                                                //
////////////////////////////////////////////////////////////////////////

/// Options controlling [`ZoneContents::lookup`] and
/// [`ZoneContents::lookup_all`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LookupOptions {
    /// Continue the search below zone cuts instead of generating
    /// referrals. This is primarily useful for looking up glue
    /// records.
    pub search_below_cuts: bool,
}

/// The result of a lookup for records of a specific type.
#[derive(Debug)]
pub enum LookupResult<'a> {
    /// The desired records were found.
    Found(Found<'a>),

    /// No records of the desired type were found, but a CNAME record
    /// is present.
    Cname(Cname<'a>),

    /// The lookup reached a zone cut and would leave authoritative
    /// data.
    Referral(Referral<'a>),

    /// The domain name exists, but owns no records of the desired
    /// type.
    NoRecords(NoRecords<'a>),

    /// The domain name does not exist.
    NxDomain(NxDomain<'a>),

    /// The searched name is not within the zone's hierarchy.
    WrongZone,
}

/// The result of a lookup for *all* records at a name.
#[derive(Debug)]
pub enum LookupAllResult<'a> {
    /// The domain name exists.
    Found(FoundAll<'a>),

    /// The lookup reached a zone cut and would leave authoritative
    /// data.
    Referral(Referral<'a>),

    /// The domain name does not exist.
    NxDomain(NxDomain<'a>),

    /// The searched name is not within the zone's hierarchy.
    WrongZone,
}

/// Data returned when a single-type lookup finds records.
#[derive(Debug)]
pub struct Found<'a> {
    /// The node the records were found at (the wildcard node, when
    /// this result is synthesized).
    pub node: &'a Node,

    /// The RRset that was looked up.
    pub rrset: &'a Rrset,

    /// If this result was synthesized from a wildcard domain name,
    /// the source of synthesis.
    pub source_of_synthesis: Option<&'a Name>,
}

/// Data returned when a lookup of all record types finds the target
/// domain name.
#[derive(Debug)]
pub struct FoundAll<'a> {
    pub node: &'a Node,
    pub source_of_synthesis: Option<&'a Name>,
}

/// Data returned when a single-type lookup finds a CNAME at the
/// target domain (and another RR type was requested).
#[derive(Debug)]
pub struct Cname<'a> {
    pub node: &'a Node,

    /// The CNAME RRset found at the target domain name.
    pub rrset: &'a Rrset,

    pub source_of_synthesis: Option<&'a Name>,
}

/// Data returned when a lookup encounters a zone cut.
#[derive(Debug)]
pub struct Referral<'a> {
    /// The delegation point (the node owning the NS RRset).
    pub node: &'a Node,
}

/// Data returned when the target domain name exists but owns no
/// matching records.
#[derive(Debug)]
pub struct NoRecords<'a> {
    pub node: &'a Node,
    pub source_of_synthesis: Option<&'a Name>,
}

/// Data returned when the target domain name does not exist.
#[derive(Debug)]
pub struct NxDomain<'a> {
    /// The longest ancestor of the searched name that exists in the
    /// zone; the starting point for denial-of-existence proofs.
    pub closest_encloser: &'a Node,
}

////////////////////////////////////////////////////////////////////////
// THE LOOKUP ALGORITHM                                               //
////////////////////////////////////////////////////////////////////////

impl ZoneContents {
    /// Finds `name` in the plain tree. Returns the exact node (if the
    /// name exists) and the closest encloser, or `None` if the name is
    /// not within the zone.
    pub fn find_dname(&self, name: &Name) -> Option<(Option<NodeId>, NodeId)> {
        if !name.eq_or_subdomain_of(self.origin()) {
            return None;
        }
        let (exact, at_or_before) = self.tree().find_less_equal(name);
        if exact {
            let id = at_or_before.unwrap();
            return Some((Some(id), id));
        }
        // The apex sorts at or before every name in its zone, so a
        // predecessor exists here. The closest encloser is an ancestor
        // of the predecessor; walk up until we reach it.
        let mut encloser = at_or_before?;
        while !name.eq_or_subdomain_of(self.node(encloser).owner()) {
            encloser = self.node(encloser).parent()?;
        }
        Some((None, encloser))
    }

    /// Looks up records of the given type at the given name.
    pub fn lookup(&self, name: &Name, rr_type: Type, options: LookupOptions) -> LookupResult {
        let (exact, encloser) = match self.find_dname(name) {
            Some(found) => found,
            None => return LookupResult::WrongZone,
        };

        if !options.search_below_cuts {
            if let Some(cut) = self.enclosing_cut(exact.unwrap_or(encloser)) {
                // A DS query at the delegation point itself is
                // answered from the parent side of the cut
                // (RFC 4035 § 3.1.4.1).
                let ds_at_cut = rr_type == Type::DS && exact == Some(cut);
                if !ds_at_cut {
                    return LookupResult::Referral(Referral {
                        node: self.node(cut),
                    });
                }
            }
        }

        if let Some(id) = exact {
            self.node_records(self.node(id), rr_type, None)
        } else if let Some(wildcard) = self.wildcard_child(encloser) {
            let node = self.node(wildcard);
            if node.is_delegation_point() && !options.search_below_cuts {
                // Wildcard synthesis does not promote a delegation
                // into an authoritative answer.
                LookupResult::Referral(Referral { node })
            } else {
                self.node_records(node, rr_type, Some(node.owner()))
            }
        } else {
            LookupResult::NxDomain(NxDomain {
                closest_encloser: self.node(encloser),
            })
        }
    }

    /// Looks up all records at the given name (the QTYPE `*` path).
    pub fn lookup_all(&self, name: &Name, options: LookupOptions) -> LookupAllResult {
        let (exact, encloser) = match self.find_dname(name) {
            Some(found) => found,
            None => return LookupAllResult::WrongZone,
        };

        if !options.search_below_cuts {
            if let Some(cut) = self.enclosing_cut(exact.unwrap_or(encloser)) {
                return LookupAllResult::Referral(Referral {
                    node: self.node(cut),
                });
            }
        }

        if let Some(id) = exact {
            LookupAllResult::Found(FoundAll {
                node: self.node(id),
                source_of_synthesis: None,
            })
        } else if let Some(wildcard) = self.wildcard_child(encloser) {
            let node = self.node(wildcard);
            LookupAllResult::Found(FoundAll {
                node,
                source_of_synthesis: Some(node.owner()),
            })
        } else {
            LookupAllResult::NxDomain(NxDomain {
                closest_encloser: self.node(encloser),
            })
        }
    }

    /// Finds the zone cut at or above a node: the node itself if it is
    /// a delegation point, or the delegation point above it if it lies
    /// in non-authoritative data.
    fn enclosing_cut(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let node = self.node(current);
            if node.is_delegation_point() {
                return Some(current);
            }
            if node.is_non_authoritative() {
                current = node.parent()?;
            } else {
                return None;
            }
        }
    }

    /// Produces the result for a node that the search has settled on.
    fn node_records<'a>(
        &'a self,
        node: &'a Node,
        rr_type: Type,
        source_of_synthesis: Option<&'a Name>,
    ) -> LookupResult<'a> {
        if let Some(rrset) = node.rrsets().lookup(rr_type) {
            LookupResult::Found(Found {
                node,
                rrset,
                source_of_synthesis,
            })
        } else if let Some(rrset) = node.rrsets().lookup(Type::CNAME) {
            LookupResult::Cname(Cname {
                node,
                rrset,
                source_of_synthesis,
            })
        } else {
            LookupResult::NoRecords(NoRecords {
                node,
                source_of_synthesis,
            })
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
