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

//! Implementation of the [`Node`] structure for zone trees.

use std::sync::Arc;

use crate::name::Name;
use crate::rr::{RrsetList, Type};

/// The index of a [`Node`] in its zone's node arena.
///
/// All cross-references between nodes — the `parent` back-link, the
/// NSEC3 link, and the RDATA target links computed by the adjust
/// pass — are expressed as `NodeId`s rather than owning pointers, so
/// the node graph can be arbitrarily cross-linked without reference
/// cycles. A `NodeId` is only meaningful relative to the
/// [`ZoneContents`](super::ZoneContents) that issued it.
pub type NodeId = usize;

/// A node in a zone tree: an owner name and the RRsets at that name,
/// plus the cross-links and flags computed by the adjust pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    owner: Arc<Name>,
    rrsets: RrsetList,
    flags: NodeFlags,
    parent: Option<NodeId>,
    nsec3_node: Option<NodeId>,
    rdata_targets: Vec<RrsetTargets>,
}

impl Node {
    /// Creates a new, empty `Node`.
    pub fn new(owner: Arc<Name>, parent: Option<NodeId>) -> Self {
        Self {
            owner,
            rrsets: RrsetList::new(),
            flags: NodeFlags::default(),
            parent,
            nsec3_node: None,
            rdata_targets: Vec::new(),
        }
    }

    /// Returns the node's owner name. This is the zone's interned
    /// representative for the name.
    pub fn owner(&self) -> &Arc<Name> {
        &self.owner
    }

    /// Returns the node's RRsets.
    pub fn rrsets(&self) -> &RrsetList {
        &self.rrsets
    }

    /// Returns the node's RRsets for mutation.
    pub fn rrsets_mut(&mut self) -> &mut RrsetList {
        &mut self.rrsets
    }

    /// Returns the closest ancestor of this node present in the tree,
    /// or `None` at the apex.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Returns the NSEC3 node whose owner is the hashed form of this
    /// node's owner, if the zone has NSEC3 parameters and the link was
    /// established by the adjust pass.
    pub fn nsec3_node(&self) -> Option<NodeId> {
        self.nsec3_node
    }

    pub fn set_nsec3_node(&mut self, nsec3_node: Option<NodeId>) {
        self.nsec3_node = nsec3_node;
    }

    /// Returns whether this node is the zone apex.
    pub fn is_apex(&self) -> bool {
        self.flags.contains(NodeFlags::APEX)
    }

    /// Returns whether this node is a delegation point (a non-apex
    /// node owning an NS RRset).
    pub fn is_delegation_point(&self) -> bool {
        self.flags.contains(NodeFlags::DELEGATION_POINT)
    }

    /// Returns whether this node lies below a zone cut.
    pub fn is_non_authoritative(&self) -> bool {
        self.flags.contains(NodeFlags::NON_AUTHORITATIVE)
    }

    /// Returns whether this node exists only to give descendants a
    /// place in the tree.
    pub fn is_empty_non_terminal(&self) -> bool {
        !self.is_apex() && self.rrsets.is_empty()
    }

    pub fn set_apex(&mut self) {
        self.flags.insert(NodeFlags::APEX);
    }

    pub fn set_delegation_point(&mut self) {
        self.flags.insert(NodeFlags::DELEGATION_POINT);
    }

    pub fn set_non_authoritative(&mut self) {
        self.flags.insert(NodeFlags::NON_AUTHORITATIVE);
    }

    /// Clears the flags recomputed by the adjust pass (everything but
    /// the apex marker).
    pub fn clear_adjusted_flags(&mut self) {
        self.flags.remove(NodeFlags::DELEGATION_POINT);
        self.flags.remove(NodeFlags::NON_AUTHORITATIVE);
    }

    /// Returns the RDATA target links for the RRset of the given type,
    /// as computed by the adjust pass: one entry per domain-name field
    /// across the RRset's RDATAs in canonical order, `Some` when the
    /// name resolves to a node of this zone.
    pub fn rdata_targets(&self, rr_type: Type) -> Option<&RrsetTargets> {
        self.rdata_targets
            .iter()
            .find(|targets| targets.rr_type == rr_type)
    }

    pub fn set_rdata_targets(&mut self, targets: Vec<RrsetTargets>) {
        self.rdata_targets = targets;
    }
}

/// The RDATA target links of one RRset (and its signatures).
#[derive(Clone, Debug, PartialEq)]
pub struct RrsetTargets {
    pub rr_type: Type,
    /// One entry per domain-name field of the RRset's RDATAs, in
    /// canonical RDATA order.
    pub targets: Vec<Option<NodeId>>,
    /// Likewise for the covering RRSIG RDATAs (the signer names).
    pub signature_targets: Vec<Option<NodeId>>,
}

/// The flag set of a [`Node`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NodeFlags(u8);

impl NodeFlags {
    const APEX: Self = Self(0x01);
    const DELEGATION_POINT: Self = Self(0x02);
    const NON_AUTHORITATIVE: Self = Self(0x04);

    fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 != 0
    }

    fn insert(&mut self, flag: Self) {
        self.0 |= flag.0;
    }

    fn remove(&mut self, flag: Self) {
        self.0 &= !flag.0;
    }
}
