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

//! DNS resource record handling: RR types, TTLs, RDATA, the RR type
//! descriptor table, and RRset storage.

use crate::class::Class;
use crate::name::Name;

pub mod descriptor;

mod rdata;
mod rr_type;
mod rrset;
mod ttl;

pub use rdata::{Rdata, RdataIter, RdataSet, RdataTooLongError};
pub use rr_type::Type;
pub use rrset::{Rrset, RrsetAddError, RrsetList, SignatureSet};
pub use ttl::Ttl;

/// A single resource record, with its owner.
///
/// Most of the crate works with [`Rrset`]s, whose owners are tracked by
/// the containing zone structures. `Record` is the "flat" form used at
/// the edges: changeset entries and zone-build input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub owner: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: Ttl,
    pub rdata: Box<Rdata>,
}

impl Record {
    pub fn new(owner: Name, rr_type: Type, class: Class, ttl: Ttl, rdata: &Rdata) -> Self {
        Self {
            owner,
            rr_type,
            class,
            ttl,
            rdata: rdata.to_owned(),
        }
    }
}
