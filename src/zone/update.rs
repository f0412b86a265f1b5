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

//! Changeset application: building a new zone version from a base
//! version plus a set of record removals and additions.
//!
//! Application is copy-on-write at node granularity. The new version
//! starts as a shallow clone of the base — the trees share their
//! interned owner names and the arena shares every node behind an
//! `Arc` — and only the nodes actually touched by the changeset are
//! deep-cloned before mutation. The base version is never modified;
//! readers holding it are unaffected.
//!
//! A changeset must advance the apex SOA serial in the serial-number
//! arithmetic of [RFC 1982] (so the usual shape is: remove the old
//! SOA, add the new one, plus the data changes). After the mutations,
//! emptied nodes are pruned and the adjust pass recomputes the derived
//! state; the returned version is ready to publish.
//!
//! [RFC 1982]: https://datatracker.ietf.org/doc/html/rfc1982

use super::{NodeId, UpdateError, ZoneContents};
use crate::rr::Record;

/// An ordered set of record removals and additions to be applied
/// atomically against one zone version.
#[derive(Clone, Debug, Default)]
pub struct Changeset {
    /// The SOA serial this changeset applies on top of, when known
    /// (e.g. from a journal). Application fails if the base zone's
    /// serial differs.
    pub serial_from: Option<u32>,

    /// The SOA serial the zone is expected to have afterwards, when
    /// known.
    pub serial_to: Option<u32>,

    /// Records to remove. Removing a record that is not present is a
    /// no-op.
    pub removals: Vec<Record>,

    /// Records to add.
    pub additions: Vec<Record>,
}

/// Returns whether `new` is after `old` in RFC 1982 serial-number
/// arithmetic.
pub fn serial_advanced(old: u32, new: u32) -> bool {
    let diff = new.wrapping_sub(old);
    diff != 0 && diff < 0x8000_0000
}

/// Applies a changeset to a base zone version, producing a new,
/// adjusted version ready to publish. The base is not modified.
pub fn apply(base: &ZoneContents, changeset: &Changeset) -> Result<ZoneContents, UpdateError> {
    let base_serial = base.soa_serial().ok_or(UpdateError::ConstraintViolation)?;
    if let Some(from) = changeset.serial_from {
        if from != base_serial {
            return Err(UpdateError::SerialMismatch);
        }
    }

    let mut next = base.clone();
    for record in &changeset.removals {
        next.remove_record(&record.owner, record.rr_type, &record.rdata);
    }
    for record in &changeset.additions {
        next.add_record(
            &record.owner,
            record.rr_type,
            record.class,
            record.ttl,
            &record.rdata,
        )?;
    }

    let new_serial = next.soa_serial().ok_or(UpdateError::ConstraintViolation)?;
    if let Some(to) = changeset.serial_to {
        if to != new_serial {
            return Err(UpdateError::ConstraintViolation);
        }
    }
    if !serial_advanced(base_serial, new_serial) {
        return Err(UpdateError::SerialNotAdvancing);
    }

    next.prune_empty_nodes();
    next.adjust();
    Ok(next)
}

impl ZoneContents {
    /// Removes nodes left without records by a changeset. A node is
    /// pruned when it owns no record data, is not the apex, and has no
    /// descendants; pruning a leaf may expose its parent, so the scan
    /// repeats until it finds nothing.
    fn prune_empty_nodes(&mut self) {
        loop {
            let prune_plain: Vec<NodeId> = self
                .tree
                .iter()
                .filter(|&(owner, id)| {
                    id != self.apex
                        && self.node(id).rrsets().is_empty()
                        && !self.has_descendants(owner)
                })
                .map(|(_, id)| id)
                .collect();
            let prune_nsec3: Vec<NodeId> = self
                .nsec3_tree
                .iter()
                .filter(|&(_, id)| self.node(id).rrsets().is_empty())
                .map(|(_, id)| id)
                .collect();
            if prune_plain.is_empty() && prune_nsec3.is_empty() {
                return;
            }
            for id in prune_plain {
                self.remove_node(id, false);
            }
            for id in prune_nsec3 {
                self.remove_node(id, true);
            }
        }
    }

    fn has_descendants(&self, owner: &crate::name::Name) -> bool {
        self.tree
            .next_in_order(owner)
            .map_or(false, |(next, _)| next.eq_or_subdomain_of(owner))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::{build_zone, soa_rdata, UpdateError};
    use super::*;
    use crate::class::Class;
    use crate::name::Name;
    use crate::rr::{Rdata, Ttl, Type};

    fn record(owner: &str, rr_type: Type, rdata: &[u8]) -> Record {
        Record::new(
            owner.parse().unwrap(),
            rr_type,
            Class::IN,
            Ttl::from(3600),
            <&Rdata>::try_from(rdata).unwrap(),
        )
    }

    fn soa_with_serial(serial: u32) -> Vec<u8> {
        let mut soa = soa_rdata();
        let mname_len = Name::validate_uncompressed(&soa).unwrap();
        let rname_len = Name::validate_uncompressed(&soa[mname_len..]).unwrap();
        let at = mname_len + rname_len;
        soa[at..at + 4].copy_from_slice(&serial.to_be_bytes());
        soa
    }

    /// A changeset bumping the serial from 1 (the fixture's value) to
    /// `to`, plus the given removals and additions.
    fn changeset(to: u32, removals: Vec<Record>, additions: Vec<Record>) -> Changeset {
        let mut changeset = Changeset {
            serial_from: Some(1),
            serial_to: Some(to),
            removals,
            additions,
        };
        changeset
            .removals
            .push(record("yarrow.test.", Type::SOA, &soa_with_serial(1)));
        changeset
            .additions
            .push(record("yarrow.test.", Type::SOA, &soa_with_serial(to)));
        changeset
    }

    #[test]
    fn apply_adds_and_removes_records() {
        let base = build_zone(&[("www.yarrow.test.", Type::A, &[192, 0, 2, 1])]);
        let next = apply(
            &base,
            &changeset(
                2,
                vec![record("www.yarrow.test.", Type::A, &[192, 0, 2, 1])],
                vec![record("www.yarrow.test.", Type::AAAA, &[0; 16])],
            ),
        )
        .unwrap();

        assert_eq!(next.soa_serial(), Some(2));
        let www: Name = "www.yarrow.test.".parse().unwrap();
        let id = next.tree().get(&www).unwrap();
        assert!(next.node(id).rrsets().lookup(Type::A).is_none());
        assert!(next.node(id).rrsets().lookup(Type::AAAA).is_some());

        // The base version is untouched.
        let base_id = base.tree().get(&www).unwrap();
        assert!(base.node(base_id).rrsets().lookup(Type::A).is_some());
        assert_eq!(base.soa_serial(), Some(1));
    }

    #[test]
    fn untouched_nodes_are_shared_with_the_base() {
        let base = build_zone(&[
            ("www.yarrow.test.", Type::A, &[192, 0, 2, 1]),
            ("mail.yarrow.test.", Type::A, &[192, 0, 2, 2]),
        ]);
        let next = apply(
            &base,
            &changeset(
                2,
                vec![],
                vec![record("www.yarrow.test.", Type::AAAA, &[0; 16])],
            ),
        )
        .unwrap();

        // Adjust rewrites flags on every node in place, but untouched
        // nodes still hold the very same interned owner names as the
        // base version.
        let mail: Name = "mail.yarrow.test.".parse().unwrap();
        let base_node = base.node(base.tree().get(&mail).unwrap());
        let next_node = next.node(next.tree().get(&mail).unwrap());
        assert!(std::sync::Arc::ptr_eq(base_node.owner(), next_node.owner()));
    }

    #[test]
    fn apply_rejects_non_advancing_serial() {
        let base = build_zone(&[]);
        let mut stale = Changeset::default();
        stale
            .removals
            .push(record("yarrow.test.", Type::SOA, &soa_with_serial(1)));
        stale
            .additions
            .push(record("yarrow.test.", Type::SOA, &soa_with_serial(1)));
        assert_eq!(apply(&base, &stale), Err(UpdateError::SerialNotAdvancing));
    }

    #[test]
    fn apply_rejects_serial_mismatch() {
        let base = build_zone(&[]);
        let mut changeset = changeset(3, vec![], vec![]);
        changeset.serial_from = Some(7);
        assert_eq!(apply(&base, &changeset), Err(UpdateError::SerialMismatch));
    }

    #[test]
    fn apply_rejects_removing_the_apex_soa() {
        let base = build_zone(&[]);
        let removal_only = Changeset {
            serial_from: Some(1),
            serial_to: None,
            removals: vec![record("yarrow.test.", Type::SOA, &soa_with_serial(1))],
            additions: vec![],
        };
        assert_eq!(
            apply(&base, &removal_only),
            Err(UpdateError::ConstraintViolation),
        );
    }

    #[test]
    fn emptied_nodes_are_pruned() {
        let base = build_zone(&[("a.b.yarrow.test.", Type::A, &[192, 0, 2, 1])]);
        let next = apply(
            &base,
            &changeset(
                2,
                vec![record("a.b.yarrow.test.", Type::A, &[192, 0, 2, 1])],
                vec![],
            ),
        )
        .unwrap();

        // Both the leaf and the empty non-terminal above it are gone.
        let leaf: Name = "a.b.yarrow.test.".parse().unwrap();
        let ent: Name = "b.yarrow.test.".parse().unwrap();
        assert!(next.tree().get(&leaf).is_none());
        assert!(next.tree().get(&ent).is_none());
    }

    #[test]
    fn empty_non_terminals_with_other_descendants_survive() {
        let base = build_zone(&[
            ("a.b.yarrow.test.", Type::A, &[192, 0, 2, 1]),
            ("c.b.yarrow.test.", Type::A, &[192, 0, 2, 2]),
        ]);
        let next = apply(
            &base,
            &changeset(
                2,
                vec![record("a.b.yarrow.test.", Type::A, &[192, 0, 2, 1])],
                vec![],
            ),
        )
        .unwrap();

        let ent: Name = "b.yarrow.test.".parse().unwrap();
        assert!(next.tree().get(&ent).is_some());
    }

    #[test]
    fn new_delegations_are_flagged_by_the_adjust_pass() {
        let base = build_zone(&[]);
        let next = apply(
            &base,
            &changeset(
                2,
                vec![],
                vec![
                    record(
                        "sub.yarrow.test.",
                        Type::NS,
                        b"\x03ns1\x03sub\x06yarrow\x04test\x00",
                    ),
                    record("ns1.sub.yarrow.test.", Type::A, &[192, 0, 2, 2]),
                ],
            ),
        )
        .unwrap();

        let cut: Name = "sub.yarrow.test.".parse().unwrap();
        let cut_id = next.tree().get(&cut).unwrap();
        assert!(next.node(cut_id).is_delegation_point());
        let glue: Name = "ns1.sub.yarrow.test.".parse().unwrap();
        let glue_id = next.tree().get(&glue).unwrap();
        assert!(next.node(glue_id).is_non_authoritative());
    }

    #[test]
    fn serial_arithmetic_wraps() {
        assert!(serial_advanced(1, 2));
        assert!(!serial_advanced(2, 1));
        assert!(!serial_advanced(5, 5));
        // Wraparound per RFC 1982.
        assert!(serial_advanced(0xffff_ffff, 0));
        assert!(!serial_advanced(0, 0xffff_ffff));
        assert!(serial_advanced(0x7fff_ffff, 0xffff_fffe));
    }
}
