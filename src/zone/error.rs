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

//! Error types for zone construction and update.

use std::fmt;

use crate::rr::RrsetAddError;

/// An error adding a record to a zone.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The record's owner is not at or below the zone origin.
    NotInZone,

    /// The record's class does not match the zone's class.
    ClassMismatch,

    /// The zone has no SOA record at its apex.
    MissingSoa,

    /// The record could not be added to its node's RRsets.
    Rrset(RrsetAddError),
}

impl From<RrsetAddError> for Error {
    fn from(e: RrsetAddError) -> Self {
        Self::Rrset(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotInZone => f.write_str("owner is outside the zone"),
            Self::ClassMismatch => f.write_str("CLASS mismatch"),
            Self::MissingSoa => f.write_str("no SOA record at the zone apex"),
            Self::Rrset(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

/// An error applying a changeset to a zone.
#[derive(Debug, Eq, PartialEq)]
pub enum UpdateError {
    /// The changeset's starting serial does not match the zone.
    SerialMismatch,

    /// The new SOA serial does not advance past the old one in serial
    /// arithmetic.
    SerialNotAdvancing,

    /// The changeset would leave the zone structurally invalid (e.g.
    /// it removes the apex SOA without replacement).
    ConstraintViolation,

    /// A record in the changeset could not be applied.
    Record(Error),
}

impl From<Error> for UpdateError {
    fn from(e: Error) -> Self {
        Self::Record(e)
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SerialMismatch => f.write_str("changeset does not start from the zone's serial"),
            Self::SerialNotAdvancing => f.write_str("SOA serial does not advance"),
            Self::ConstraintViolation => f.write_str("changeset violates zone constraints"),
            Self::Record(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for UpdateError {}
