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

//! Yarrow is the core of an authoritative DNS server: an in-memory
//! zone database and a query-resolution engine that together turn DNS
//! request messages into DNS response messages.
//!
//! The crate is organized as follows:
//!
//! * The [`name`], [`class`], and [`rr`] modules implement the basic
//!   vocabulary of the DNS: domain names, classes, RR types, RDATA,
//!   and RRsets.
//! * The [`message`] module parses and serializes on-the-wire DNS
//!   messages, including EDNS (RFC 6891) and TSIG (RFC 8945) handling.
//! * The [`zone`] module implements the zone database proper: a pair
//!   of canonically ordered name trees (plain and NSEC3) over a node
//!   arena, the "adjust" pass that prepares a zone for serving, the
//!   lookup algorithm of RFC 1034 § 4.3.2 (as clarified by RFC 4592),
//!   and atomic changeset application.
//! * The [`catalog`] module publishes zone versions to concurrent
//!   readers through per-zone atomic slots.
//! * The [`server`] module drives query classification, resolution,
//!   DNSSEC-aware response construction, and TSIG signing.
//!
//! Network I/O is deliberately absent: the server consumes and
//! produces byte buffers, and the surrounding system owns the sockets.

pub mod catalog;
pub mod class;
pub mod message;
pub mod name;
pub mod rr;
pub mod server;
pub mod zone;

mod util;
