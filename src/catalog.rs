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

//! The zone catalog and the per-zone publish slot.
//!
//! [`ZoneSlot`] is the concurrency seam between the query path and the
//! writer path. Readers take a snapshot of the current
//! [`ZoneContents`] with a single atomic load and then traverse it
//! lock-free for the lifetime of their request; the snapshot is a
//! strong reference, so a version superseded mid-request stays alive
//! until its last straggling reader drops it, at which point it is
//! reclaimed. Writers serialize on a per-slot mutex (which readers
//! never touch), build the next version against their own snapshot,
//! and publish it with one atomic pointer swap. Two requests that
//! straddle a publish may resolve against different versions, but each
//! sees one coherent version from start to finish; no partial state is
//! ever observable.
//!
//! [`Catalog`] maps query names to slots: the zone chosen for a query
//! is the one whose origin matches the most trailing labels of the
//! QNAME within the query's class (step 2 of the RFC 1034 § 4.3.2
//! algorithm).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use log::info;

use crate::class::Class;
use crate::name::Name;
use crate::zone::{apply, Changeset, UpdateError, ZoneContents};

////////////////////////////////////////////////////////////////////////
// ZONE SLOTS                                                         //
////////////////////////////////////////////////////////////////////////

/// The publish slot of one zone: the current [`ZoneContents`] version,
/// swapped atomically under a single writer.
pub struct ZoneSlot {
    current: ArcSwap<ZoneContents>,
    writer: Mutex<()>,
}

impl ZoneSlot {
    /// Creates a slot holding the first version of a zone. The adjust
    /// pass is run before the version becomes visible (it has no
    /// effect if the loader already ran it).
    pub fn new(mut contents: ZoneContents) -> Self {
        contents.adjust();
        Self {
            current: ArcSwap::from_pointee(contents),
            writer: Mutex::new(()),
        }
    }

    /// Returns a snapshot of the current zone version. The returned
    /// reference is valid (and stable) for as long as the caller holds
    /// it, regardless of concurrent publishes.
    pub fn snapshot(&self) -> Arc<ZoneContents> {
        self.current.load_full()
    }

    /// Runs a writer transaction: `f` builds a new version from the
    /// current one, which is then published atomically. Writers are
    /// serialized; readers are never blocked. On error nothing is
    /// published.
    pub fn update<F>(&self, f: F) -> Result<(), UpdateError>
    where
        F: FnOnce(&ZoneContents) -> Result<ZoneContents, UpdateError>,
    {
        let guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let base = self.snapshot();
        let next = f(&base)?;
        self.current.store(Arc::new(next));
        drop(guard);
        Ok(())
    }

    /// Applies a [`Changeset`] to the current version and publishes
    /// the result.
    pub fn apply(&self, changeset: &Changeset) -> Result<(), UpdateError> {
        self.update(|base| {
            let next = apply(base, changeset)?;
            info!(
                "zone {}: published serial {} (was {})",
                next.origin(),
                next.soa_serial().unwrap_or(0),
                base.soa_serial().unwrap_or(0),
            );
            Ok(next)
        })
    }
}

////////////////////////////////////////////////////////////////////////
// THE CATALOG                                                        //
////////////////////////////////////////////////////////////////////////

/// The set of zones a server is authoritative for, indexed for
/// longest-match lookup by query name and class.
#[derive(Default)]
pub struct Catalog {
    zones: HashMap<Class, HashMap<Box<[u8]>, ZoneSlot>>,
}

impl Catalog {
    /// Returns a new, empty `Catalog`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts a zone. The first version of `contents` is adjusted and
    /// published immediately. An existing slot for the same origin and
    /// class is replaced.
    pub fn insert(&mut self, contents: ZoneContents) {
        let class = contents.class();
        let key = lowered_wire(contents.origin());
        self.zones
            .entry(class)
            .or_default()
            .insert(key, ZoneSlot::new(contents));
    }

    /// Looks up the zone that is the nearest ancestor of `qname`
    /// within `class` — the zone whose origin matches the most
    /// trailing labels of `qname`.
    pub fn lookup(&self, qname: &Name, class: Class) -> Option<&ZoneSlot> {
        let by_name = self.zones.get(&class)?;
        for skip in 0..qname.len() {
            let suffix: Box<[u8]> = qname
                .wire_repr_from(skip)
                .iter()
                .map(u8::to_ascii_lowercase)
                .collect();
            if let Some(slot) = by_name.get(&suffix) {
                return Some(slot);
            }
        }
        None
    }

    /// Returns the slot for the zone with exactly this origin and
    /// class.
    pub fn get(&self, origin: &Name, class: Class) -> Option<&ZoneSlot> {
        self.zones.get(&class)?.get(&lowered_wire(origin))
    }

    /// Returns whether the catalog holds no zones.
    pub fn is_empty(&self) -> bool {
        self.zones.values().all(|by_name| by_name.is_empty())
    }
}

fn lowered_wire(name: &Name) -> Box<[u8]> {
    name.wire_repr()
        .iter()
        .map(u8::to_ascii_lowercase)
        .collect()
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Record, Ttl, Type};
    use crate::zone::build_zone;

    fn catalog_with_fixture() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(build_zone(&[("www.yarrow.test.", Type::A, &[192, 0, 2, 1])]));
        catalog
    }

    #[test]
    fn lookup_finds_the_longest_match() {
        let catalog = catalog_with_fixture();
        let inside: Name = "deep.under.yarrow.test.".parse().unwrap();
        assert!(catalog.lookup(&inside, Class::IN).is_some());
        let exact: Name = "yarrow.test.".parse().unwrap();
        assert!(catalog.lookup(&exact, Class::IN).is_some());
        let outside: Name = "other.test.".parse().unwrap();
        assert!(catalog.lookup(&outside, Class::IN).is_none());
        assert!(catalog.lookup(&inside, Class::CH).is_none());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = catalog_with_fixture();
        let mixed: Name = "WWW.Yarrow.TEST.".parse().unwrap();
        assert!(catalog.lookup(&mixed, Class::IN).is_some());
    }

    #[test]
    fn snapshots_survive_a_publish() {
        let catalog = catalog_with_fixture();
        let origin: Name = "yarrow.test.".parse().unwrap();
        let slot = catalog.get(&origin, Class::IN).unwrap();

        let before = slot.snapshot();
        assert_eq!(before.soa_serial(), Some(1));

        // Publish serial 2 while still holding the old snapshot.
        let soa_old = crate::zone::soa_rdata();
        let mut soa_new = soa_old.clone();
        let serial_at = soa_old.len() - 20;
        soa_new[serial_at..serial_at + 4].copy_from_slice(&2u32.to_be_bytes());
        let changeset = Changeset {
            serial_from: Some(1),
            serial_to: Some(2),
            removals: vec![Record::new(
                origin.clone(),
                Type::SOA,
                Class::IN,
                Ttl::from(3600),
                soa_old.as_slice().try_into().unwrap(),
            )],
            additions: vec![Record::new(
                origin.clone(),
                Type::SOA,
                Class::IN,
                Ttl::from(3600),
                soa_new.as_slice().try_into().unwrap(),
            )],
        };
        slot.apply(&changeset).unwrap();

        // The straggler still sees its version; new readers see the
        // new one.
        assert_eq!(before.soa_serial(), Some(1));
        assert_eq!(slot.snapshot().soa_serial(), Some(2));
    }

    #[test]
    fn failed_updates_publish_nothing() {
        let catalog = catalog_with_fixture();
        let origin: Name = "yarrow.test.".parse().unwrap();
        let slot = catalog.get(&origin, Class::IN).unwrap();
        let stale = Changeset {
            serial_from: Some(41),
            ..Default::default()
        };
        assert!(slot.apply(&stale).is_err());
        assert_eq!(slot.snapshot().soa_serial(), Some(1));
    }
}
