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

//! The in-memory zone database.
//!
//! A [`ZoneContents`] is one immutable version of a zone: a node arena
//! indexed by two canonically ordered [`ZoneTree`]s (the plain tree of
//! owner names and the NSEC3 tree of hashed names), the zone's NSEC3
//! parameters, and the cross-links computed by the adjust pass. Once a
//! version has been published through a
//! [`ZoneSlot`](crate::catalog::ZoneSlot), it is never mutated again:
//! any number of readers may traverse it concurrently without locks,
//! and writers produce *new* versions — via [`ZoneBuilder`] for a
//! fresh load, or [`Changeset`] application for an incremental
//! update — that are adjusted and then swapped in atomically.
//!
//! The adjust pass ([`ZoneContents::adjust`]) runs once before a
//! version becomes visible. It decodes the apex NSEC3PARAM record,
//! resolves every domain name embedded in RDATA to the zone node that
//! owns it (so delegation and additional-section processing follow a
//! link instead of re-running a lookup), and walks the tree in
//! canonical order marking delegation points, non-authoritative
//! subtrees, and each authoritative node's NSEC3 node. The pass is
//! idempotent; running it on an already adjusted zone changes nothing.

use std::sync::Arc;

use log::warn;
use slab::Slab;

use crate::class::Class;
use crate::name::{Label, Name};
use crate::rr::{descriptor, Rdata, Record, Rrset, Ttl, Type};
use crate::util::read_u16;

mod error;
mod lookup;
mod node;
mod nsec3;
mod tree;
mod update;

pub use error::{Error, UpdateError};
pub use lookup::{
    Cname, Found, FoundAll, LookupAllResult, LookupOptions, LookupResult, NoRecords, NxDomain,
    Referral,
};
pub use node::{Node, NodeId, RrsetTargets};
pub use nsec3::{Nsec3Params, ParamError, NSEC3_HASH_SHA1};
pub use tree::ZoneTree;
pub use update::{apply, serial_advanced, Changeset};

////////////////////////////////////////////////////////////////////////
// ZONE CONTENTS                                                      //
////////////////////////////////////////////////////////////////////////

/// One immutable version of a zone.
///
/// Readers obtain a shared reference from the zone's publish slot and
/// may use every accessor here without synchronization. All node
/// cross-references are [`NodeId`]s into this version's arena; they
/// never dangle within a version, and they are never valid across
/// versions.
#[derive(Clone, Debug)]
pub struct ZoneContents {
    origin: Arc<Name>,
    class: Class,
    apex: NodeId,
    nodes: Slab<Arc<Node>>,
    tree: ZoneTree,
    nsec3_tree: ZoneTree,
    nsec3_params: Option<Nsec3Params>,
}

impl PartialEq for ZoneContents {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
            && self.class == other.class
            && self.apex == other.apex
            && self.nodes.len() == other.nodes.len()
            && self.nodes.iter().eq(other.nodes.iter())
            && self.tree == other.tree
            && self.nsec3_tree == other.nsec3_tree
            && self.nsec3_params == other.nsec3_params
    }
}

impl ZoneContents {
    /// Creates a new, empty zone with an apex node.
    fn new(origin: Name, class: Class) -> Self {
        let origin = Arc::new(origin);
        let mut nodes = Slab::new();
        let mut apex_node = Node::new(origin.clone(), None);
        apex_node.set_apex();
        let apex = nodes.insert(Arc::new(apex_node));
        let mut tree = ZoneTree::new();
        tree.insert(origin.clone(), apex);
        Self {
            origin,
            class,
            apex,
            nodes,
            tree,
            nsec3_tree: ZoneTree::new(),
            nsec3_params: None,
        }
    }

    /// Returns the zone's origin (the owner name of its apex).
    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// Returns the zone's class.
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the id of the apex node.
    pub fn apex_id(&self) -> NodeId {
        self.apex
    }

    /// Returns the apex node.
    pub fn apex(&self) -> &Node {
        self.node(self.apex)
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Returns the total number of nodes (in both trees).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the plain tree of owner names.
    pub fn tree(&self) -> &ZoneTree {
        &self.tree
    }

    /// Returns the NSEC3 tree of hashed owner names.
    pub fn nsec3_tree(&self) -> &ZoneTree {
        &self.nsec3_tree
    }

    /// Returns the zone's decoded NSEC3 parameters, if it has any.
    pub fn nsec3_params(&self) -> Option<&Nsec3Params> {
        self.nsec3_params.as_ref()
    }

    /// Returns the SOA RRset at the apex.
    pub fn soa(&self) -> Option<&Rrset> {
        self.apex().rrsets().lookup(Type::SOA)
    }

    /// Returns the zone's SOA serial.
    pub fn soa_serial(&self) -> Option<u32> {
        self.soa_field(0)
    }

    /// Returns the SOA MINIMUM field, the TTL for negative caching
    /// ([RFC 2308 § 3]).
    ///
    /// [RFC 2308 § 3]: https://datatracker.ietf.org/doc/html/rfc2308#section-3
    pub fn soa_minimum(&self) -> Option<u32> {
        self.soa_field(16)
    }

    /// Reads a 32-bit field of the apex SOA RDATA, at `offset` octets
    /// past the two domain names.
    fn soa_field(&self, offset: usize) -> Option<u32> {
        let rdata = self.soa()?.first_rdata()?;
        let octets = rdata.octets();
        let mname_len = Name::validate_uncompressed(octets).ok()?;
        let rname_len = Name::validate_uncompressed(&octets[mname_len..]).ok()?;
        let start = mname_len + rname_len + offset;
        octets
            .get(start..start + 4)
            .map(|bytes| u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// Returns whether the zone is DNSSEC-signed (its apex SOA carries
    /// signatures).
    pub fn is_signed(&self) -> bool {
        self.soa().map_or(false, |soa| soa.signatures.is_some())
    }

    /// Returns an iterator over the nodes of the plain tree, in
    /// canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.tree.iter().map(|(_, id)| self.node(id))
    }

    ////////////////////////////////////////////////////////////////////
    // CONSTRUCTION (SHARED BY THE BUILDER AND CHANGESET APPLICATION) //
    ////////////////////////////////////////////////////////////////////

    /// Returns the node with the given id for mutation, cloning it
    /// first if it is shared with another zone version.
    pub(super) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        Arc::make_mut(&mut self.nodes[id])
    }

    /// Adds one record to the zone, creating nodes (including empty
    /// non-terminals) as needed. NSEC3 records and their signatures go
    /// to the NSEC3 tree; everything else goes to the plain tree.
    pub(super) fn add_record(
        &mut self,
        owner: &Name,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdata: &Rdata,
    ) -> Result<(), Error> {
        if class != self.class {
            return Err(Error::ClassMismatch);
        }
        if !owner.eq_or_subdomain_of(&self.origin) {
            return Err(Error::NotInZone);
        }
        let id = if goes_to_nsec3_tree(rr_type, rdata) {
            self.get_or_create_nsec3_node(owner)
        } else {
            self.get_or_create_node(owner)
        };
        self.node_mut(id)
            .rrsets_mut()
            .add(rr_type, ttl, rdata)
            .map_err(Into::into)
    }

    /// Removes one record from the zone. Removing a record that is not
    /// present is a no-op. Emptied nodes are left in place; the caller
    /// prunes them after the whole changeset is applied.
    pub(super) fn remove_record(&mut self, owner: &Name, rr_type: Type, rdata: &Rdata) {
        let nsec3 = goes_to_nsec3_tree(rr_type, rdata);
        let tree = if nsec3 { &self.nsec3_tree } else { &self.tree };
        if let Some(id) = tree.get(owner) {
            self.node_mut(id).rrsets_mut().remove(rr_type, rdata);
        }
    }

    /// Gets or creates the plain-tree node for `owner`, creating any
    /// missing ancestors between it and the apex as empty
    /// non-terminals. The owner must already be known to be within the
    /// zone.
    fn get_or_create_node(&mut self, owner: &Name) -> NodeId {
        if let Some(id) = self.tree.get(owner) {
            return id;
        }
        let parent = self.get_or_create_node(&owner.superdomain(1).unwrap());
        let interned = Arc::new(owner.clone());
        let id = self.nodes.insert(Arc::new(Node::new(interned.clone(), Some(parent))));
        self.tree.insert(interned, id);
        id
    }

    /// Gets or creates the NSEC3-tree node for `owner`. NSEC3 owners
    /// hang directly off the apex; no intermediate nodes exist in the
    /// NSEC3 tree.
    fn get_or_create_nsec3_node(&mut self, owner: &Name) -> NodeId {
        if let Some(id) = self.nsec3_tree.get(owner) {
            return id;
        }
        let interned = Arc::new(owner.clone());
        let id = self
            .nodes
            .insert(Arc::new(Node::new(interned.clone(), Some(self.apex))));
        self.nsec3_tree.insert(interned, id);
        id
    }

    /// Removes a node from its tree and the arena. The node must be
    /// empty and without descendants.
    pub(super) fn remove_node(&mut self, id: NodeId, nsec3: bool) {
        let owner = self.node(id).owner().clone();
        let tree = if nsec3 {
            &mut self.nsec3_tree
        } else {
            &mut self.tree
        };
        tree.remove(&owner);
        self.nodes.remove(id);
    }

    ////////////////////////////////////////////////////////////////////
    // THE ADJUST PASS                                                //
    ////////////////////////////////////////////////////////////////////

    /// Prepares this version for serving. Runs in three phases:
    ///
    /// 1. the apex NSEC3PARAM record (if any) is decoded;
    /// 2. every domain name embedded in RDATA is resolved against the
    ///    plain tree and the resulting node links recorded;
    /// 3. the plain tree is walked in canonical order (so parents are
    ///    visited before children), delegation-point and
    ///    non-authoritative flags are set, and each authoritative node
    ///    is linked to its NSEC3 node.
    ///
    /// The pass recomputes all derived state from scratch, so running
    /// it again on an adjusted zone is a no-op.
    pub fn adjust(&mut self) {
        // Phase 1: NSEC3 parameters.
        self.nsec3_params = self
            .apex()
            .rrsets()
            .lookup(Type::NSEC3PARAM)
            .and_then(|rrset| rrset.first_rdata())
            .and_then(|rdata| match Nsec3Params::from_rdata(rdata) {
                Ok(params) if params.algorithm == NSEC3_HASH_SHA1 => Some(params),
                Ok(params) => {
                    warn!(
                        "zone {}: ignoring NSEC3PARAM with unsupported hash algorithm {}",
                        self.origin, params.algorithm,
                    );
                    None
                }
                Err(e) => {
                    warn!("zone {}: ignoring malformed NSEC3PARAM: {}", self.origin, e);
                    None
                }
            });

        let plain_ids: Vec<NodeId> = self.tree.iter().map(|(_, id)| id).collect();
        let nsec3_ids: Vec<NodeId> = self.nsec3_tree.iter().map(|(_, id)| id).collect();

        // Phase 2: RDATA name interning.
        for &id in plain_ids.iter().chain(nsec3_ids.iter()) {
            let targets = self.compute_rdata_targets(id);
            self.node_mut(id).set_rdata_targets(targets);
        }

        // Phase 3: node flags and NSEC3 links.
        for &id in &plain_ids {
            let parent_cut = self.node(id).parent().map_or(false, |parent| {
                let parent = self.node(parent);
                parent.is_delegation_point() || parent.is_non_authoritative()
            });
            let has_ns = self.node(id).rrsets().lookup(Type::NS).is_some();
            let is_apex = id == self.apex;

            let node = self.node_mut(id);
            node.clear_adjusted_flags();
            if parent_cut {
                node.set_non_authoritative();
            } else if has_ns && !is_apex {
                node.set_delegation_point();
            }

            let link = if self.node(id).is_non_authoritative() {
                None
            } else {
                self.nsec3_node_for(self.node(id).owner().as_ref().clone())
            };
            self.node_mut(id).set_nsec3_node(link);
        }
    }

    /// Resolves the domain names in the RDATA (and signature RDATA) of
    /// each of a node's RRsets against the plain tree.
    fn compute_rdata_targets(&self, id: NodeId) -> Vec<RrsetTargets> {
        let node = self.node(id);
        let mut all = Vec::with_capacity(node.rrsets().len());
        for rrset in node.rrsets().iter() {
            let mut targets = Vec::new();
            for rdata in rrset.rdatas.iter() {
                for span in descriptor::dnames(rrset.rr_type, rdata) {
                    targets.push(self.resolve_dname(span));
                }
            }
            let mut signature_targets = Vec::new();
            if let Some(signatures) = &rrset.signatures {
                for rdata in signatures.rdatas.iter() {
                    for span in descriptor::dnames(Type::RRSIG, rdata) {
                        signature_targets.push(self.resolve_dname(span));
                    }
                }
            }
            all.push(RrsetTargets {
                rr_type: rrset.rr_type,
                targets,
                signature_targets,
            });
        }
        all
    }

    fn resolve_dname(&self, span: &[u8]) -> Option<NodeId> {
        Name::try_from_uncompressed_all(span)
            .ok()
            .and_then(|name| self.tree.get(&name))
    }

    /// Finds the NSEC3 node whose owner is the hashed form of `name`,
    /// if the zone has NSEC3 parameters and such a node exists.
    fn nsec3_node_for(&self, name: Name) -> Option<NodeId> {
        let params = self.nsec3_params.as_ref()?;
        let hashed = params.hashed_owner(&name, &self.origin).ok()?;
        self.nsec3_tree.get(&hashed)
    }

    ////////////////////////////////////////////////////////////////////
    // NSEC/NSEC3 PROOF PRIMITIVES                                    //
    ////////////////////////////////////////////////////////////////////

    /// Returns the NSEC3 node matching `name` exactly (the node whose
    /// owner is the hash of `name`).
    pub fn nsec3_exact(&self, name: &Name) -> Option<NodeId> {
        let params = self.nsec3_params.as_ref()?;
        let hashed = params.hashed_owner(name, &self.origin).ok()?;
        self.nsec3_tree.get(&hashed)
    }

    /// Returns the NSEC3 node *covering* `name`: the one whose hash
    /// interval contains the hash of `name`. The hash order is treated
    /// as circular, so a hash before the first NSEC3 owner is covered
    /// by the last one.
    pub fn nsec3_cover(&self, name: &Name) -> Option<NodeId> {
        let params = self.nsec3_params.as_ref()?;
        let hashed = params.hashed_owner(name, &self.origin).ok()?;
        match self.nsec3_tree.find_less_equal(&hashed) {
            (_, Some(id)) => Some(id),
            (_, None) => self.nsec3_tree.last(),
        }
    }

    /// Returns the node whose NSEC record covers the (nonexistent)
    /// `name`: the closest canonical predecessor that owns an NSEC
    /// RRset. Empty non-terminals own no NSEC records and are skipped.
    pub fn nsec_cover(&self, name: &Name) -> Option<NodeId> {
        let (exact, at_or_before) = self.tree.find_less_equal(name);
        let mut id = if exact {
            self.tree.previous(name)?
        } else {
            at_or_before.or_else(|| self.tree.last())?
        };
        for _ in 0..self.tree.len() {
            if self.node(id).rrsets().lookup(Type::NSEC).is_some() {
                return Some(id);
            }
            id = self.tree.previous(self.node(id).owner())?;
        }
        None
    }

    /// Returns the wildcard child (`*.<owner>`) of a node, if it
    /// exists.
    pub fn wildcard_child(&self, id: NodeId) -> Option<NodeId> {
        let wildcard = Name::concat(Label::asterisk(), self.node(id).owner()).ok()?;
        self.tree.get(&wildcard)
    }
}

/// Determines whether a record belongs in the NSEC3 tree: NSEC3
/// records, and RRSIG records covering NSEC3.
fn goes_to_nsec3_tree(rr_type: Type, rdata: &Rdata) -> bool {
    match rr_type {
        Type::NSEC3 => true,
        Type::RRSIG => read_u16(rdata.octets()).map(Type::from) == Some(Type::NSEC3),
        _ => false,
    }
}

////////////////////////////////////////////////////////////////////////
// ZONE BUILDER                                                       //
////////////////////////////////////////////////////////////////////////

/// Builds a fresh [`ZoneContents`] from flat records.
///
/// This is the seam to the zone loader: records are added one by one
/// in any order, and [`ZoneBuilder::build`] checks minimal structural
/// requirements (an apex SOA). The result has *not* been adjusted;
/// the publish slot runs the adjust pass when the zone is first
/// published.
pub struct ZoneBuilder {
    contents: ZoneContents,
}

impl ZoneBuilder {
    /// Creates a builder for a zone with the given origin and class.
    pub fn new(origin: Name, class: Class) -> Self {
        Self {
            contents: ZoneContents::new(origin, class),
        }
    }

    /// Adds a record to the zone under construction.
    pub fn add(
        &mut self,
        owner: &Name,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdata: &Rdata,
    ) -> Result<(), Error> {
        self.contents.add_record(owner, rr_type, class, ttl, rdata)
    }

    /// Adds a [`Record`] to the zone under construction.
    pub fn add_record(&mut self, record: &Record) -> Result<(), Error> {
        self.add(
            &record.owner,
            record.rr_type,
            record.class,
            record.ttl,
            &record.rdata,
        )
    }

    /// Finishes the build. This fails if the apex has no SOA record.
    pub fn build(self) -> Result<ZoneContents, Error> {
        if self.contents.soa().is_none() {
            return Err(Error::MissingSoa);
        }
        Ok(self.contents)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////


#[cfg(test)]
pub(crate) use tests::{build_zone, soa_rdata};
