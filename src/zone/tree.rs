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

//! Implementation of the [`ZoneTree`] structure.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use arrayvec::ArrayVec;

use super::NodeId;
use crate::name::Name;

/// The maximum wire length of a domain name; used to size the stack
/// buffer for hash-index lookups.
const MAX_WIRE_LEN: usize = 255;

/// An index of owner names to [`NodeId`]s in canonical order.
///
/// The tree is an ordered map keyed by the DNSSEC canonical ordering
/// of domain names ([RFC 4034 § 6.1], which is what [`Name`]'s [`Ord`]
/// implements). Its central primitive is [`ZoneTree::find_less_equal`],
/// which reports both whether an exact match exists and the node at or
/// canonically before the searched name — the single query from which
/// closest-encloser walks and NSEC/NSEC3 covering proofs are built.
/// For canonical-order predecessor queries the tree is treated as
/// circular: the predecessor of the first name is the last name.
///
/// An auxiliary hash index keyed by the lowercased wire form provides
/// O(1) exact lookup; the ordered map remains authoritative for
/// everything else.
///
/// A `ZoneTree` holds the interned owner names (`Arc<Name>`) of its
/// zone; cloning a tree shares them.
///
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneTree {
    by_name: BTreeMap<Arc<Name>, NodeId>,
    by_wire: HashMap<Arc<[u8]>, NodeId>,
}

impl ZoneTree {
    /// Returns a new, empty `ZoneTree`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts a node at its canonical position. Returns `false`
    /// (leaving the tree unchanged) if the owner is already present;
    /// duplicate owners are not permitted.
    pub fn insert(&mut self, owner: Arc<Name>, id: NodeId) -> bool {
        if self.by_wire.contains_key(lowered(&owner).as_slice()) {
            return false;
        }
        let mut wire = Vec::with_capacity(owner.wire_repr().len());
        owner.lowercase_wire_repr_into(&mut wire);
        self.by_wire.insert(wire.into(), id);
        self.by_name.insert(owner, id);
        true
    }

    /// Removes the node with the given owner, returning its id.
    pub fn remove(&mut self, owner: &Name) -> Option<NodeId> {
        let id = self.by_wire.remove(lowered(owner).as_slice())?;
        self.by_name.remove(owner);
        Some(id)
    }

    /// Returns the node whose owner is exactly `name`, if present.
    pub fn get(&self, name: &Name) -> Option<NodeId> {
        self.by_wire.get(lowered(name).as_slice()).copied()
    }

    /// The central search primitive: returns whether a node with
    /// exactly this owner exists, together with the node at or
    /// canonically before `name` (or `None` if every name in the tree
    /// sorts after `name`).
    pub fn find_less_equal(&self, name: &Name) -> (bool, Option<NodeId>) {
        match self
            .by_name
            .range::<Name, _>((Bound::Unbounded, Bound::Included(name)))
            .next_back()
        {
            Some((owner, &id)) => (owner.as_ref() == name, Some(id)),
            None => (false, None),
        }
    }

    /// Returns the canonical-order predecessor of `name`, treating the
    /// tree as circular: the predecessor of the canonically first name
    /// is the canonically last one. Returns `None` only on an empty
    /// tree.
    pub fn previous(&self, name: &Name) -> Option<NodeId> {
        self.by_name
            .range::<Name, _>((Bound::Unbounded, Bound::Excluded(name)))
            .next_back()
            .or_else(|| self.by_name.iter().next_back())
            .map(|(_, &id)| id)
    }

    /// Returns the first node in canonical order strictly after
    /// `name`, without wrapping around.
    pub fn next_in_order(&self, name: &Name) -> Option<(&Name, NodeId)> {
        self.by_name
            .range::<Name, _>((Bound::Excluded(name), Bound::Unbounded))
            .next()
            .map(|(owner, &id)| (owner.as_ref(), id))
    }

    /// Returns an iterator over the tree in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, NodeId)> {
        self.by_name.iter().map(|(owner, &id)| (owner.as_ref(), id))
    }

    /// Returns an iterator over the tree in reverse canonical order.
    pub fn iter_reverse(&self) -> impl Iterator<Item = (&Name, NodeId)> {
        self.by_name
            .iter()
            .rev()
            .map(|(owner, &id)| (owner.as_ref(), id))
    }

    /// Returns the canonically last node of the tree.
    pub fn last(&self) -> Option<NodeId> {
        self.by_name.iter().next_back().map(|(_, &id)| id)
    }

    /// Returns the number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Produces the lowercased wire form of a name in a stack buffer, for
/// hash-index lookups.
fn lowered(name: &Name) -> ArrayVec<u8, MAX_WIRE_LEN> {
    name.wire_repr()
        .iter()
        .map(u8::to_ascii_lowercase)
        .collect()
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
