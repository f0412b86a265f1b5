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

//! Handling of DNS QUERY messages.
//!
//! A query runs through classification, resolution against the
//! catalog-selected zone, response-section population (including the
//! DNSSEC denial-of-existence proofs when the requestor set the DO
//! bit), additional-section processing, and finalization. Errors
//! surface as RCODEs — or, when the response exceeds the UDP budget,
//! as a cleared message with the TC bit set.

use arrayvec::ArrayVec;
use log::warn;

use super::{Context, ProcessingError, ProcessingResult, Server, Transport};
use crate::class::Class;
use crate::message::writer::{self, Hint, HintPointerVec, HintedName};
use crate::message::{Opcode, Qclass, Qtype, Question, Rcode, Writer};
use crate::name::{Label, Name};
use crate::rr::{RdataSet, Rrset, Ttl, Type};
use crate::zone::{
    LookupAllResult, LookupOptions, LookupResult, Node, NodeId, ZoneContents,
};

////////////////////////////////////////////////////////////////////////
// CLASSIFICATION                                                     //
////////////////////////////////////////////////////////////////////////

/// What kind of request a message is, from its opcode and QTYPE. Only
/// [`QueryClass::Normal`] engages the authoritative lookup path;
/// transfers, NOTIFY, and UPDATE belong to transports this crate does
/// not provide.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum QueryClass {
    Normal,
    Axfr,
    Ixfr,
    Notify,
    Update,
    Invalid,
}

pub(super) fn classify(opcode: Opcode, qtype: Option<Qtype>) -> QueryClass {
    match opcode {
        Opcode::QUERY => match qtype {
            Some(Qtype::AXFR) => QueryClass::Axfr,
            Some(Qtype::IXFR) => QueryClass::Ixfr,
            Some(Qtype::MAILA) | Some(Qtype::MAILB) => QueryClass::Invalid,
            _ => QueryClass::Normal,
        },
        Opcode::NOTIFY => QueryClass::Notify,
        Opcode::UPDATE => QueryClass::Update,
        _ => QueryClass::Invalid,
    }
}

////////////////////////////////////////////////////////////////////////
// QUERY HANDLING                                                     //
////////////////////////////////////////////////////////////////////////

impl Server {
    /// Handles a DNS message with opcode QUERY and a normal QTYPE.
    pub(super) fn handle_query(&self, context: &mut Context) {
        // If there is no question, then that's a FORMERR.
        let question = match context.question.clone() {
            Some(question) => question,
            None => {
                context.response.set_rcode(Rcode::FormErr);
                return;
            }
        };

        // We do not support QCLASS * (ANY).
        if question.qclass == Qclass::ANY {
            context.response.set_rcode(Rcode::NotImp);
            return;
        }

        // Find which zone (if any) in our catalog is the longest match
        // for the QNAME and QCLASS, and snapshot its current version.
        // The snapshot is ours for the rest of the request; concurrent
        // publishes cannot affect it.
        let class = Class::from(question.qclass);
        let slot = match self.catalog.lookup(&question.qname, class) {
            Some(slot) => slot,
            None => {
                context.response.set_rcode(Rcode::Refused);
                return;
            }
        };
        let zone = slot.snapshot();
        if zone.soa().is_none() {
            // The writer path never publishes a zone without an apex
            // SOA, so this is a broken invariant. Answer SERVFAIL and
            // keep the worker alive.
            warn!("zone {}: apex SOA missing at answer time", zone.origin());
            context.response.set_rcode(Rcode::ServFail);
            return;
        }

        let result = if question.qtype == Qtype::ANY {
            answer_any(&zone, &question, context)
        } else {
            answer(&zone, &question, context)
        };

        match result {
            Ok(()) => (),
            Err(ProcessingError::ServFail) => {
                context.response.set_aa(false);
                context.response.set_rcode(Rcode::ServFail);
                context.response.clear_rrs();
            }
            Err(ProcessingError::Truncation) => {
                // Predictable truncation: drop every RR and set TC,
                // rather than leaving a partially populated message.
                context.response.clear_rrs();
                if context.received_info.transport == Transport::Tcp {
                    // We can't ask the client to retry over TCP, since
                    // we are already over TCP.
                    context.response.set_aa(false);
                    context.response.set_rcode(Rcode::ServFail);
                } else {
                    context.response.set_tc(true);
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ANSWERING LOGIC                                                    //
////////////////////////////////////////////////////////////////////////

/// Answers a query for a specific RR type once the zone to search has
/// been determined.
fn answer(zone: &ZoneContents, question: &Question, context: &mut Context) -> ProcessingResult<()> {
    let qname = &question.qname;
    let rr_type = question.qtype.into();
    let dnssec = context.dnssec_ok && zone.is_signed();
    let response = &mut context.response;

    match zone.lookup(qname, rr_type, LookupOptions::default()) {
        LookupResult::Found(found) => {
            response.set_aa(true);
            let mut hints = HintPointerVec::new();
            add_rrset(
                response,
                Section::Answer,
                HintedName::new(Hint::Qname, qname),
                found.rrset,
                zone.class(),
                dnssec,
                Some(&mut hints),
            )?;
            if dnssec {
                if let Some(source) = found.source_of_synthesis {
                    add_wildcard_proof(zone, qname, source, response)?;
                }
            }
            do_additional(zone, found.node, rr_type, Some(&hints), response)
        }
        LookupResult::Cname(cname) => {
            do_cname(zone, qname, cname.rrset, rr_type, dnssec, response)
        }
        LookupResult::Referral(referral) => do_referral(zone, referral.node, dnssec, response),
        LookupResult::NoRecords(no_records) => {
            response.set_aa(true);
            add_negative_soa(zone, dnssec, response)?;
            if dnssec {
                add_nodata_proof(
                    zone,
                    qname,
                    no_records.node,
                    no_records.source_of_synthesis.is_some(),
                    response,
                )?;
            }
            Ok(())
        }
        LookupResult::NxDomain(nx) => {
            response.set_rcode(Rcode::NxDomain);
            response.set_aa(true);
            add_negative_soa(zone, dnssec, response)?;
            if dnssec {
                add_nxdomain_proof(zone, qname, nx.closest_encloser, response)?;
            }
            Ok(())
        }
        LookupResult::WrongZone => Err(ProcessingError::ServFail),
    }
}

/// Answers a query with QTYPE * (ANY).
fn answer_any(
    zone: &ZoneContents,
    question: &Question,
    context: &mut Context,
) -> ProcessingResult<()> {
    let qname = &question.qname;
    let dnssec = context.dnssec_ok && zone.is_signed();
    let response = &mut context.response;

    match zone.lookup_all(qname, LookupOptions::default()) {
        LookupAllResult::Found(found) => {
            response.set_aa(true);
            let mut n_added = 0;
            for rrset in found.node.rrsets().iter() {
                if rrset.rdatas.is_empty() {
                    continue;
                }
                add_rrset(
                    response,
                    Section::Answer,
                    HintedName::new(Hint::Qname, qname),
                    rrset,
                    zone.class(),
                    dnssec,
                    None,
                )?;
                n_added += 1;
            }
            if n_added == 0 {
                add_negative_soa(zone, dnssec, response)?;
            }
            Ok(())
        }
        LookupAllResult::Referral(referral) => do_referral(zone, referral.node, dnssec, response),
        LookupAllResult::NxDomain(nx) => {
            response.set_rcode(Rcode::NxDomain);
            response.set_aa(true);
            add_negative_soa(zone, dnssec, response)?;
            if dnssec {
                add_nxdomain_proof(zone, qname, nx.closest_encloser, response)?;
            }
            Ok(())
        }
        LookupAllResult::WrongZone => Err(ProcessingError::ServFail),
    }
}

////////////////////////////////////////////////////////////////////////
// ANSWERING LOGIC - CNAME HANDLING                                   //
////////////////////////////////////////////////////////////////////////

/// The maximum number of links in a CNAME chain that we will follow
/// before giving up and returning SERVFAIL.
const MAX_CNAME_CHAIN_LEN: usize = 8;

/// The owners already seen while following a CNAME chain. The original
/// QNAME is tracked separately, so the capacity is one less than the
/// chain limit.
type PreviousOwners = ArrayVec<Name, { MAX_CNAME_CHAIN_LEN - 1 }>;

/// Follows a CNAME chain to produce an answer when a CNAME RRset is
/// present at QNAME. Loops and over-long chains yield SERVFAIL.
fn do_cname(
    zone: &ZoneContents,
    qname: &Name,
    cname_rrset: &Rrset,
    rr_type: Type,
    dnssec: bool,
    response: &mut Writer,
) -> ProcessingResult<()> {
    // RFC 6604 § 2.1 reiterates RFC 1035: the AA bit is set based on
    // the first owner name in the answer section.
    response.set_aa(true);
    follow_cname_1(zone, qname, cname_rrset, rr_type, dnssec, response, ArrayVec::new())
}

/// Step 1 of CNAME following: extract the target, check for loops,
/// and write the CNAME RRset to the answer.
fn follow_cname_1(
    zone: &ZoneContents,
    qname: &Name,
    cname_rrset: &Rrset,
    rr_type: Type,
    dnssec: bool,
    response: &mut Writer,
    owners_seen: PreviousOwners,
) -> ProcessingResult<()> {
    let cname = cname_rrset
        .first_rdata()
        .and_then(|rdata| Name::try_from_uncompressed_all(rdata.octets()).ok())
        .ok_or(ProcessingError::ServFail)?;
    if &cname == qname || owners_seen.contains(&cname) {
        // The CNAME chain contains a loop.
        return Err(ProcessingError::ServFail);
    }
    let hinted_owner = match owners_seen.last() {
        Some(owner) => HintedName::new(Hint::MostRecentNameInRdata, owner),
        None => HintedName::new(Hint::Qname, qname),
    };
    add_rrset(
        response,
        Section::Answer,
        hinted_owner,
        cname_rrset,
        zone.class(),
        dnssec,
        None,
    )?;
    follow_cname_2(zone, qname, cname, rr_type, dnssec, response, owners_seen)
}

/// Step 2 of CNAME following: re-run the query with the CNAME target
/// as the new name.
///
/// RFC 1034 § 3.4.2 suggests restarting the query from the very
/// beginning, even into other available zones. We instead re-run it
/// within the original QNAME's zone, like other authoritative servers:
/// resolvers don't know we are authoritative for the other zone and a
/// careful one would discard those records anyway. Per RFC 6604 § 3,
/// the RCODE is set by the last query cycle.
fn follow_cname_2(
    zone: &ZoneContents,
    qname: &Name,
    cname: Name,
    rr_type: Type,
    dnssec: bool,
    response: &mut Writer,
    mut owners_seen: PreviousOwners,
) -> ProcessingResult<()> {
    match zone.lookup(&cname, rr_type, LookupOptions::default()) {
        LookupResult::Found(found) => {
            let mut hints = HintPointerVec::new();
            add_rrset(
                response,
                Section::Answer,
                HintedName::new(Hint::MostRecentNameInRdata, &cname),
                found.rrset,
                zone.class(),
                dnssec,
                Some(&mut hints),
            )?;
            do_additional(zone, found.node, rr_type, Some(&hints), response)
        }
        LookupResult::Cname(next_cname) => {
            // The chain continues; give up if it's getting too long.
            if owners_seen.try_push(cname).is_ok() {
                follow_cname_1(
                    zone,
                    qname,
                    next_cname.rrset,
                    rr_type,
                    dnssec,
                    response,
                    owners_seen,
                )
            } else {
                Err(ProcessingError::ServFail)
            }
        }
        LookupResult::Referral(referral) => do_referral(zone, referral.node, dnssec, response),
        LookupResult::NoRecords(_) => add_negative_soa(zone, dnssec, response),
        LookupResult::NxDomain(nx) => {
            response.set_rcode(Rcode::NxDomain);
            add_negative_soa(zone, dnssec, response)?;
            if dnssec {
                add_nxdomain_proof(zone, &cname, nx.closest_encloser, response)?;
            }
            Ok(())
        }
        LookupResult::WrongZone => Ok(()),
    }
}

////////////////////////////////////////////////////////////////////////
// ANSWERING LOGIC - REFERRAL HANDLING                                //
////////////////////////////////////////////////////////////////////////

/// Creates a referral response: the NS RRset of the delegation point
/// in AUTHORITY (with the DS RRset or its denial when DNSSEC is in
/// play), and glue addresses in ADDITIONAL.
///
/// In-domain glue is mandatory — without it the delegation cannot be
/// followed — so a shortfall truncates the response. Addresses for
/// sibling-domain name servers are a convenience and are dropped when
/// they don't fit.
fn do_referral(
    zone: &ZoneContents,
    node: &Node,
    dnssec: bool,
    response: &mut Writer,
) -> ProcessingResult<()> {
    // Note: the AA bit is *not* set on referrals.
    let ns_rrset = node
        .rrsets()
        .lookup(Type::NS)
        .ok_or(ProcessingError::ServFail)?;
    let mut hints = HintPointerVec::new();
    add_rrset_to(
        response,
        Section::Authority,
        HintedName::new(Hint::None, node.owner()),
        Type::NS,
        zone.class(),
        ns_rrset.ttl,
        &ns_rrset.rdatas,
        Some(&mut hints),
    )?;

    if dnssec {
        if let Some(ds) = node.rrsets().lookup(Type::DS) {
            add_rrset(
                response,
                Section::Authority,
                HintedName::new(Hint::None, node.owner()),
                ds,
                zone.class(),
                true,
                None,
            )?;
        } else {
            add_ds_absence_proof(zone, node, response)?;
        }
    }

    // Glue: the adjust pass resolved each NS target that lies within
    // this zone to its node, so address lookup is a link follow.
    // Targets outside the zone were left unresolved and are never
    // chased.
    if let Some(targets) = node.rdata_targets(Type::NS) {
        for (index, target) in targets.targets.iter().enumerate() {
            let target_node = match target {
                Some(id) => zone.node(*id),
                None => continue,
            };
            let owner = HintedName::from_hint_pointer_vec(&hints, index, target_node.owner());
            let mandatory = target_node.owner().eq_or_subdomain_of(node.owner());
            if mandatory {
                add_addresses(zone, target_node, owner, response)?;
            } else {
                allow_truncation(add_addresses(zone, target_node, owner, response))?;
            }
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// ADDITIONAL SECTION PROCESSING                                      //
////////////////////////////////////////////////////////////////////////

/// Includes A/AAAA RRsets for the names embedded in an answered NS,
/// MX, SRV, or legacy mail RRset, when those names belong to this
/// zone. The follow depth is one: addresses pulled in here never
/// trigger further additional processing. Addresses are extra
/// information ([RFC 2181 § 9]); whatever doesn't fit is dropped
/// without truncating the response.
///
/// [RFC 2181 § 9]: https://datatracker.ietf.org/doc/html/rfc2181#section-9
fn do_additional(
    zone: &ZoneContents,
    node: &Node,
    rr_type: Type,
    hints: Option<&HintPointerVec>,
    response: &mut Writer,
) -> ProcessingResult<()> {
    if !matches!(
        rr_type,
        Type::NS | Type::MX | Type::SRV | Type::MB | Type::MD | Type::MF
    ) {
        return Ok(());
    }
    if let Some(targets) = node.rdata_targets(rr_type) {
        for (index, target) in targets.targets.iter().enumerate() {
            if let Some(id) = target {
                let target_node = zone.node(*id);
                let owner = match hints {
                    Some(hints) => {
                        HintedName::from_hint_pointer_vec(hints, index, target_node.owner())
                    }
                    None => HintedName::new(Hint::None, target_node.owner()),
                };
                allow_truncation(add_addresses(zone, target_node, owner, response))?;
            }
        }
    }
    Ok(())
}

/// Adds any A and AAAA RRsets of `node` to the additional section.
fn add_addresses(
    zone: &ZoneContents,
    node: &Node,
    mut owner: HintedName,
    response: &mut Writer,
) -> writer::Result<()> {
    if let Some(a_rrset) = node.rrsets().lookup(Type::A) {
        response.add_additional_rrset(
            owner,
            Type::A,
            zone.class(),
            a_rrset.ttl,
            &a_rrset.rdatas,
            None,
        )?;
        owner = HintedName::new(Hint::MostRecentOwner, owner.name());
    }
    if let Some(aaaa_rrset) = node.rrsets().lookup(Type::AAAA) {
        response.add_additional_rrset(
            owner,
            Type::AAAA,
            zone.class(),
            aaaa_rrset.ttl,
            &aaaa_rrset.rdatas,
            None,
        )?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// NEGATIVE RESPONSES AND DENIAL-OF-EXISTENCE PROOFS                  //
////////////////////////////////////////////////////////////////////////

/// Adds the zone's SOA to the authority section for negative caching.
/// Per [RFC 2308 § 3], its TTL is the SOA MINIMUM field. With DNSSEC,
/// the SOA's signatures come along.
///
/// [RFC 2308 § 3]: https://datatracker.ietf.org/doc/html/rfc2308#section-3
fn add_negative_soa(
    zone: &ZoneContents,
    dnssec: bool,
    response: &mut Writer,
) -> ProcessingResult<()> {
    let soa = zone.soa().ok_or(ProcessingError::ServFail)?;
    let ttl = Ttl::from(zone.soa_minimum().ok_or(ProcessingError::ServFail)?);
    add_rrset_to(
        response,
        Section::Authority,
        HintedName::new(Hint::None, zone.origin()),
        Type::SOA,
        zone.class(),
        ttl,
        &soa.rdatas,
        None,
    )?;
    if dnssec {
        if let Some(signatures) = &soa.signatures {
            add_rrset_to(
                response,
                Section::Authority,
                HintedName::new(Hint::MostRecentOwner, zone.origin()),
                Type::RRSIG,
                zone.class(),
                ttl,
                &signatures.rdatas,
                None,
            )?;
        }
    }
    Ok(())
}

/// Adds the NXDOMAIN denial: the NSEC3 closest-encloser proof of
/// [RFC 5155 § 7.2.2] (the closest encloser exists, the next closer
/// name does not, and no wildcard at the closest encloser covers the
/// query), or the two-record NSEC equivalent of [RFC 4035 § 3.1.3.2].
///
/// [RFC 5155 § 7.2.2]: https://datatracker.ietf.org/doc/html/rfc5155#section-7.2.2
/// [RFC 4035 § 3.1.3.2]: https://datatracker.ietf.org/doc/html/rfc4035#section-3.1.3.2
fn add_nxdomain_proof(
    zone: &ZoneContents,
    qname: &Name,
    closest_encloser: &Node,
    response: &mut Writer,
) -> ProcessingResult<()> {
    let wildcard = wildcard_name(closest_encloser.owner())?;
    if zone.nsec3_params().is_some() {
        let next_closer = next_closer_name(qname, closest_encloser.owner());
        let proof = [
            zone.nsec3_exact(closest_encloser.owner()),
            zone.nsec3_cover(&next_closer),
            zone.nsec3_cover(&wildcard),
        ];
        add_nsec3_records(zone, proof, response)
    } else {
        let proof = [zone.nsec_cover(qname), zone.nsec_cover(&wildcard), None];
        add_nsec_records(zone, proof, response)
    }
}

/// Adds the NODATA denial: the NSEC/NSEC3 record matching the queried
/// name proves the type's absence through its type bitmap
/// ([RFC 5155 § 7.2.3], [RFC 4035 § 3.1.3.1]). For wildcard NODATA
/// answers, the closest-encloser proof for the query name is included
/// as well ([RFC 5155 § 7.2.5]).
fn add_nodata_proof(
    zone: &ZoneContents,
    qname: &Name,
    node: &Node,
    wildcard: bool,
    response: &mut Writer,
) -> ProcessingResult<()> {
    if zone.nsec3_params().is_some() {
        if wildcard {
            let encloser = node
                .owner()
                .superdomain(1)
                .ok_or(ProcessingError::ServFail)?;
            let next_closer = next_closer_name(qname, &encloser);
            let proof = [
                zone.nsec3_exact(&encloser),
                zone.nsec3_cover(&next_closer),
                zone.nsec3_exact(node.owner()),
            ];
            add_nsec3_records(zone, proof, response)
        } else {
            // An opt-out zone has no NSEC3 record for an insecure
            // delegation; the covering record stands in for it.
            let exact = node
                .nsec3_node()
                .or_else(|| zone.nsec3_exact(node.owner()))
                .or_else(|| zone.nsec3_cover(node.owner()));
            add_nsec3_records(zone, [exact, None, None], response)
        }
    } else {
        if let Some(nsec) = node.rrsets().lookup(Type::NSEC) {
            add_rrset(
                response,
                Section::Authority,
                HintedName::new(Hint::None, node.owner()),
                nsec,
                zone.class(),
                true,
                None,
            )?;
        }
        if wildcard {
            let proof = [zone.nsec_cover(qname), None, None];
            add_nsec_records(zone, proof, response)?;
        }
        Ok(())
    }
}

/// Proves that the answer was synthesized correctly from a wildcard:
/// the next closer name of the query does not exist
/// ([RFC 5155 § 7.2.6], [RFC 4035 § 3.1.3.3]).
fn add_wildcard_proof(
    zone: &ZoneContents,
    qname: &Name,
    source_of_synthesis: &Name,
    response: &mut Writer,
) -> ProcessingResult<()> {
    let encloser = source_of_synthesis
        .superdomain(1)
        .ok_or(ProcessingError::ServFail)?;
    if zone.nsec3_params().is_some() {
        let next_closer = next_closer_name(qname, &encloser);
        add_nsec3_records(zone, [zone.nsec3_cover(&next_closer), None, None], response)
    } else {
        add_nsec_records(zone, [zone.nsec_cover(qname), None, None], response)
    }
}

/// Proves that a delegation is unsigned: the NSEC/NSEC3 record at the
/// delegation point shows no DS in its type bitmap ([RFC 4035
/// § 3.1.4.1]).
fn add_ds_absence_proof(
    zone: &ZoneContents,
    node: &Node,
    response: &mut Writer,
) -> ProcessingResult<()> {
    if zone.nsec3_params().is_some() {
        let id = node
            .nsec3_node()
            .or_else(|| zone.nsec3_exact(node.owner()))
            .or_else(|| zone.nsec3_cover(node.owner()));
        add_nsec3_records(zone, [id, None, None], response)
    } else if let Some(nsec) = node.rrsets().lookup(Type::NSEC) {
        add_rrset(
            response,
            Section::Authority,
            HintedName::new(Hint::None, node.owner()),
            nsec,
            zone.class(),
            true,
            None,
        )
        .map_err(Into::into)
    } else {
        Ok(())
    }
}

/// Writes up to three NSEC3 records (each with its signatures) to the
/// authority section, deduplicating repeated nodes.
fn add_nsec3_records(
    zone: &ZoneContents,
    proof: [Option<NodeId>; 3],
    response: &mut Writer,
) -> ProcessingResult<()> {
    let mut written: ArrayVec<NodeId, 3> = ArrayVec::new();
    for id in proof.into_iter().flatten() {
        if written.contains(&id) {
            continue;
        }
        written.push(id);
        let node = zone.node(id);
        let rrset = match node.rrsets().lookup(Type::NSEC3) {
            Some(rrset) => rrset,
            None => {
                warn!(
                    "zone {}: NSEC3 node {} has no NSEC3 RRset",
                    zone.origin(),
                    node.owner(),
                );
                return Err(ProcessingError::ServFail);
            }
        };
        add_rrset(
            response,
            Section::Authority,
            HintedName::new(Hint::None, node.owner()),
            rrset,
            zone.class(),
            true,
            None,
        )?;
    }
    Ok(())
}

/// Writes up to three NSEC records (each with its signatures) to the
/// authority section, deduplicating repeated nodes.
fn add_nsec_records(
    zone: &ZoneContents,
    proof: [Option<NodeId>; 3],
    response: &mut Writer,
) -> ProcessingResult<()> {
    let mut written: ArrayVec<NodeId, 3> = ArrayVec::new();
    for id in proof.into_iter().flatten() {
        if written.contains(&id) {
            continue;
        }
        written.push(id);
        let node = zone.node(id);
        if let Some(rrset) = node.rrsets().lookup(Type::NSEC) {
            add_rrset(
                response,
                Section::Authority,
                HintedName::new(Hint::None, node.owner()),
                rrset,
                zone.class(),
                true,
                None,
            )?;
        }
    }
    Ok(())
}

/// The next closer name: one more label of `qname` than the closest
/// encloser has.
fn next_closer_name(qname: &Name, encloser: &Name) -> Name {
    qname
        .superdomain(qname.len() - encloser.len() - 1)
        .expect("the query name is below its closest encloser")
}

fn wildcard_name(encloser: &Name) -> ProcessingResult<Name> {
    Name::concat(Label::asterisk(), encloser).or(Err(ProcessingError::ServFail))
}

////////////////////////////////////////////////////////////////////////
// WRITING HELPERS                                                    //
////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy)]
enum Section {
    Answer,
    Authority,
}

/// Writes an RRset (and, when `dnssec` is set, its signatures) to the
/// given section.
fn add_rrset(
    response: &mut Writer,
    section: Section,
    owner: HintedName,
    rrset: &Rrset,
    class: Class,
    dnssec: bool,
    hints: Option<&mut HintPointerVec>,
) -> writer::Result<()> {
    add_rrset_to(
        response,
        section,
        owner,
        rrset.rr_type,
        class,
        rrset.ttl,
        &rrset.rdatas,
        hints,
    )?;
    if dnssec {
        if let Some(signatures) = &rrset.signatures {
            add_rrset_to(
                response,
                section,
                HintedName::new(Hint::MostRecentOwner, owner.name()),
                Type::RRSIG,
                class,
                signatures.ttl,
                &signatures.rdatas,
                None,
            )?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn add_rrset_to(
    response: &mut Writer,
    section: Section,
    owner: HintedName,
    rr_type: Type,
    class: Class,
    ttl: Ttl,
    rdatas: &RdataSet,
    hints: Option<&mut HintPointerVec>,
) -> writer::Result<()> {
    match section {
        Section::Answer => response.add_answer_rrset(owner, rr_type, class, ttl, rdatas, hints),
        Section::Authority => {
            response.add_authority_rrset(owner, rr_type, class, ttl, rdatas, hints)
        }
    }
}

/// Executes address-writing helpers whose truncation is tolerated:
/// a [`Truncation`](writer::Error::Truncation) failure is swallowed
/// (the RRs were rolled back), while other errors propagate.
fn allow_truncation(result: writer::Result<()>) -> ProcessingResult<()> {
    match result {
        Err(writer::Error::Truncation) => Ok(()),
        other => other.map_err(Into::into),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::{ReceivedInfo, Response, Transport};
    use super::*;
    use crate::catalog::Catalog;
    use crate::message::reader::ReadRr;
    use crate::message::Reader;
    use crate::rr::Ttl;
    use crate::zone::{ZoneBuilder, ZoneContents};

    ////////////////////////////////////////////////////////////////////
    // FIXTURES                                                       //
    ////////////////////////////////////////////////////////////////////

    fn name(from: &str) -> Name {
        from.parse().unwrap()
    }

    fn soa_rdata() -> Vec<u8> {
        let mut rdata = Vec::new();
        rdata.extend_from_slice(b"\x03ns1\x07example\x03com\x00");
        rdata.extend_from_slice(b"\x05admin\x07example\x03com\x00");
        rdata.extend_from_slice(&1u32.to_be_bytes()); // serial
        rdata.extend_from_slice(&3600u32.to_be_bytes()); // refresh
        rdata.extend_from_slice(&900u32.to_be_bytes()); // retry
        rdata.extend_from_slice(&604800u32.to_be_bytes()); // expire
        rdata.extend_from_slice(&300u32.to_be_bytes()); // minimum
        rdata
    }

    /// Minimal RRSIG RDATA covering `covered`, signed by example.com.
    fn rrsig_rdata(covered: Type) -> Vec<u8> {
        let mut rdata = Vec::new();
        rdata.extend_from_slice(&u16::from(covered).to_be_bytes());
        rdata.push(8); // algorithm
        rdata.push(2); // labels
        rdata.extend_from_slice(&3600u32.to_be_bytes()); // original TTL
        rdata.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // expiration
        rdata.extend_from_slice(&1_690_000_000u32.to_be_bytes()); // inception
        rdata.extend_from_slice(&0x2b2bu16.to_be_bytes()); // key tag
        rdata.extend_from_slice(b"\x07example\x03com\x00"); // signer
        rdata.extend_from_slice(b"not-a-real-signature");
        rdata
    }

    /// Minimal NSEC3 RDATA: SHA-1, no flags, 0 iterations, empty
    /// salt, an arbitrary next-hash, and an empty type bitmap.
    fn nsec3_rdata() -> Vec<u8> {
        let mut rdata = vec![1, 0, 0, 0, 0, 20];
        rdata.extend_from_slice(&[0x55; 20]);
        rdata
    }

    /// NSEC3PARAM RDATA matching [`nsec3_rdata`]: SHA-1, no flags, 0
    /// iterations, empty salt.
    const NSEC3PARAM_RDATA: &[u8] = &[1, 0, 0, 0, 0];

    fn zone_with(records: &[(&str, Type, &[u8])]) -> ZoneContents {
        let mut builder = ZoneBuilder::new(name("example.com."), Class::IN);
        let soa = soa_rdata();
        builder
            .add(
                &name("example.com."),
                Type::SOA,
                Class::IN,
                Ttl::from(3600),
                soa.as_slice().try_into().unwrap(),
            )
            .unwrap();
        for &(owner, rr_type, rdata) in records {
            builder
                .add(
                    &name(owner),
                    rr_type,
                    Class::IN,
                    Ttl::from(300),
                    rdata.try_into().unwrap(),
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    fn server_for(zone: ZoneContents) -> Server {
        let mut catalog = Catalog::new();
        catalog.insert(zone);
        Server::new(catalog)
    }

    /// The basic fixture of the end-to-end scenarios:
    /// `www.example.com. 300 IN A 192.0.2.1`.
    fn basic_server() -> Server {
        server_for(zone_with(&[("www.example.com.", Type::A, &[192, 0, 2, 1])]))
    }

    /// The DNSSEC fixture: an NSEC3-signed rendition of the basic
    /// zone, with extra names placed so that the closest-encloser
    /// proof for `nope.example.com.` needs three distinct NSEC3
    /// records. (With no salt and zero extra iterations, the hashes
    /// below are fixed.)
    ///
    /// ```text
    /// H(example.com.)      = onib9mgub9h0rml3cdf5bgrj59dkjhvk
    /// H(www.example.com.)  = mifdndt3nff3od53o7tla1hrff95jkuk
    /// H(t.example.com.)    = 139abrdcfnreaq72m4ijosk6d7nbrour
    /// H(b.example.com.)    = 3qnilc4qrc2p5crn7jgvb5s3bpg0shuv
    /// H(nope.example.com.) = 15it77ur1n42socrlbuba55g3hb2llhh
    /// H(*.example.com.)    = 4f3cnt8cu22tngec382jj4gde4rb47ub
    /// ```
    fn signed_server() -> Server {
        let soa_sig = rrsig_rdata(Type::SOA);
        let a_sig = rrsig_rdata(Type::A);
        let nsec3_sig = rrsig_rdata(Type::NSEC3);
        let nsec3 = nsec3_rdata();
        let mut records: Vec<(String, Type, Vec<u8>)> = vec![
            ("example.com.".into(), Type::RRSIG, soa_sig),
            ("example.com.".into(), Type::NSEC3PARAM, NSEC3PARAM_RDATA.to_vec()),
            ("www.example.com.".into(), Type::A, vec![192, 0, 2, 1]),
            ("www.example.com.".into(), Type::RRSIG, a_sig.clone()),
            ("t.example.com.".into(), Type::A, vec![192, 0, 2, 3]),
            ("t.example.com.".into(), Type::RRSIG, a_sig.clone()),
            ("b.example.com.".into(), Type::A, vec![192, 0, 2, 4]),
            ("b.example.com.".into(), Type::RRSIG, a_sig),
        ];
        for hash in [
            "onib9mgub9h0rml3cdf5bgrj59dkjhvk",
            "mifdndt3nff3od53o7tla1hrff95jkuk",
            "139abrdcfnreaq72m4ijosk6d7nbrour",
            "3qnilc4qrc2p5crn7jgvb5s3bpg0shuv",
        ] {
            let owner = format!("{}.example.com.", hash);
            records.push((owner.clone(), Type::NSEC3, nsec3.clone()));
            records.push((owner, Type::RRSIG, nsec3_sig.clone()));
        }
        let borrowed: Vec<(&str, Type, &[u8])> = records
            .iter()
            .map(|(owner, rr_type, rdata)| (owner.as_str(), *rr_type, rdata.as_slice()))
            .collect();
        server_for(zone_with(&borrowed))
    }

    ////////////////////////////////////////////////////////////////////
    // QUERY DRIVER                                                   //
    ////////////////////////////////////////////////////////////////////

    fn run_query(server: &Server, qname: &str, qtype: Qtype, dnssec_ok: bool) -> Vec<u8> {
        let mut request = [0u8; 512];
        let mut writer = Writer::new(&mut request, 512).unwrap();
        writer.set_id(0x0707);
        writer
            .add_question(&Question {
                qname: name(qname),
                qtype,
                qclass: Class::IN.into(),
            })
            .unwrap();
        if dnssec_ok {
            writer.set_edns(4096, true).unwrap();
        }
        let len = writer.finish();

        let mut response_buf = vec![0u8; u16::MAX as usize];
        let info = ReceivedInfo {
            transport: Transport::Udp,
        };
        match server.handle_message(&request[..len], info, &mut response_buf) {
            Response::Single(size) => response_buf[..size].to_vec(),
            Response::None => panic!("expected a response"),
        }
    }

    struct Sections<'a> {
        answers: Vec<ReadRr<'a>>,
        authority: Vec<ReadRr<'a>>,
        additional: Vec<ReadRr<'a>>,
    }

    fn read_rrs<'a>(reader: &mut Reader<'a>, count: u16) -> Vec<ReadRr<'a>> {
        (0..count).map(|_| reader.read_rr().unwrap()).collect()
    }

    fn read_sections<'a>(reader: &mut Reader<'a>) -> Sections<'a> {
        for _ in 0..reader.qdcount() {
            reader.read_question().unwrap();
        }
        let (ancount, nscount, arcount) = (reader.ancount(), reader.nscount(), reader.arcount());
        let answers = read_rrs(reader, ancount);
        let authority = read_rrs(reader, nscount);
        let additional = read_rrs(reader, arcount);
        Sections {
            answers,
            authority,
            additional,
        }
    }

    ////////////////////////////////////////////////////////////////////
    // END-TO-END SCENARIOS                                           //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn positive_answer() {
        let server = basic_server();
        let response = run_query(&server, "www.example.com.", Type::A.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(reader.aa());
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 1);
        assert_eq!(sections.answers[0].owner, name("www.example.com."));
        assert_eq!(sections.answers[0].rr_type, Type::A);
        assert_eq!(sections.answers[0].ttl, Ttl::from(300));
        assert_eq!(sections.answers[0].rdata.octets(), &[192, 0, 2, 1]);
        assert!(sections.authority.is_empty());
        assert!(sections.additional.is_empty());
    }

    #[test]
    fn nodata_answer_carries_the_soa() {
        let server = basic_server();
        let response = run_query(&server, "www.example.com.", Type::AAAA.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(reader.aa());
        let sections = read_sections(&mut reader);
        assert!(sections.answers.is_empty());
        assert_eq!(sections.authority.len(), 1);
        assert_eq!(sections.authority[0].rr_type, Type::SOA);
        // The negative-caching TTL is the SOA MINIMUM field.
        assert_eq!(sections.authority[0].ttl, Ttl::from(300));
    }

    #[test]
    fn nxdomain_answer_carries_the_soa() {
        let server = basic_server();
        let response = run_query(&server, "nope.example.com.", Type::A.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NxDomain);
        assert!(reader.aa());
        let sections = read_sections(&mut reader);
        assert!(sections.answers.is_empty());
        assert_eq!(sections.authority.len(), 1);
        assert_eq!(sections.authority[0].rr_type, Type::SOA);
    }

    #[test]
    fn referral_with_glue() {
        let server = server_for(zone_with(&[
            ("www.example.com.", Type::A, &[192, 0, 2, 1]),
            (
                "sub.example.com.",
                Type::NS,
                b"\x03ns1\x03sub\x07example\x03com\x00",
            ),
            ("ns1.sub.example.com.", Type::A, &[192, 0, 2, 2]),
        ]));
        let response = run_query(&server, "x.sub.example.com.", Type::A.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(!reader.aa());
        let sections = read_sections(&mut reader);
        assert!(sections.answers.is_empty());
        assert_eq!(sections.authority.len(), 1);
        assert_eq!(sections.authority[0].owner, name("sub.example.com."));
        assert_eq!(sections.authority[0].rr_type, Type::NS);
        assert_eq!(sections.additional.len(), 1);
        assert_eq!(sections.additional[0].owner, name("ns1.sub.example.com."));
        assert_eq!(sections.additional[0].rr_type, Type::A);
        assert_eq!(sections.additional[0].rdata.octets(), &[192, 0, 2, 2]);
    }

    #[test]
    fn wildcard_synthesis_answers_at_the_query_name() {
        let server = server_for(zone_with(&[
            ("www.example.com.", Type::A, &[192, 0, 2, 1]),
            ("*.wild.example.com.", Type::A, &[192, 0, 2, 3]),
        ]));
        let response = run_query(&server, "foo.wild.example.com.", Type::A.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(reader.aa());
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 1);
        assert_eq!(sections.answers[0].owner, name("foo.wild.example.com."));
        assert_eq!(sections.answers[0].rdata.octets(), &[192, 0, 2, 3]);
    }

    #[test]
    fn signed_nxdomain_carries_the_closest_encloser_proof() {
        let server = signed_server();
        let response = run_query(&server, "nope.example.com.", Type::A.into(), true);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NxDomain);
        assert!(reader.aa());
        let sections = read_sections(&mut reader);
        assert!(sections.answers.is_empty());

        // SOA + RRSIG(SOA) + three NSEC3 records + their RRSIGs.
        assert_eq!(sections.authority.len(), 8);
        assert_eq!(sections.authority[0].rr_type, Type::SOA);
        assert_eq!(sections.authority[1].rr_type, Type::RRSIG);

        // The three NSEC3 records: matching the closest encloser
        // (example.com.), covering the next closer name
        // (nope.example.com.), and covering the wildcard
        // (*.example.com.).
        let nsec3_owners: Vec<&Name> = sections
            .authority
            .iter()
            .filter(|rr| rr.rr_type == Type::NSEC3)
            .map(|rr| &rr.owner)
            .collect();
        assert_eq!(
            nsec3_owners,
            vec![
                &name("onib9mgub9h0rml3cdf5bgrj59dkjhvk.example.com."),
                &name("139abrdcfnreaq72m4ijosk6d7nbrour.example.com."),
                &name("3qnilc4qrc2p5crn7jgvb5s3bpg0shuv.example.com."),
            ],
        );

        // Every NSEC3 record travels with a signature.
        let rrsig_count = sections
            .authority
            .iter()
            .filter(|rr| rr.rr_type == Type::RRSIG)
            .count();
        assert_eq!(rrsig_count, 4);

        // The OPT record echoes the DO bit.
        assert_eq!(sections.additional.len(), 1);
        assert_eq!(sections.additional[0].rr_type, Type::OPT);
    }

    #[test]
    fn signed_positive_answer_includes_rrsigs() {
        let server = signed_server();
        let response = run_query(&server, "www.example.com.", Type::A.into(), true);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 2);
        assert_eq!(sections.answers[0].rr_type, Type::A);
        assert_eq!(sections.answers[1].rr_type, Type::RRSIG);
        assert!(sections.authority.is_empty());
    }

    #[test]
    fn unsigned_queries_to_signed_zones_omit_rrsigs() {
        let server = signed_server();
        let response = run_query(&server, "www.example.com.", Type::A.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 1);
        assert_eq!(sections.answers[0].rr_type, Type::A);
    }

    ////////////////////////////////////////////////////////////////////
    // CLASSIFICATION AND REFUSAL                                     //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn classification_works() {
        assert_eq!(
            classify(Opcode::QUERY, Some(Type::A.into())),
            QueryClass::Normal,
        );
        assert_eq!(classify(Opcode::QUERY, Some(Qtype::AXFR)), QueryClass::Axfr);
        assert_eq!(classify(Opcode::QUERY, Some(Qtype::IXFR)), QueryClass::Ixfr);
        assert_eq!(
            classify(Opcode::QUERY, Some(Qtype::MAILB)),
            QueryClass::Invalid,
        );
        assert_eq!(classify(Opcode::NOTIFY, None), QueryClass::Notify);
        assert_eq!(classify(Opcode::UPDATE, None), QueryClass::Update);
        assert_eq!(classify(Opcode::STATUS, None), QueryClass::Invalid);
    }

    #[test]
    fn transfers_are_not_implemented() {
        let server = basic_server();
        for qtype in [Qtype::AXFR, Qtype::IXFR] {
            let response = run_query(&server, "example.com.", qtype, false);
            let reader = Reader::try_from(response.as_slice()).unwrap();
            assert_eq!(reader.rcode(), Rcode::NotImp);
        }
    }

    #[test]
    fn out_of_bailiwick_queries_are_refused() {
        let server = basic_server();
        let response = run_query(&server, "www.elsewhere.test.", Type::A.into(), false);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::Refused);
        assert!(!reader.aa());
    }

    ////////////////////////////////////////////////////////////////////
    // CNAME CHAINS                                                   //
    ////////////////////////////////////////////////////////////////////

    fn cname_rdata(target: &str) -> Vec<u8> {
        name(target).wire_repr().to_vec()
    }

    /// Builds a zone with a chain c0 → c1 → … of `links` CNAME
    /// records, terminated by an A record.
    fn chain_server(links: usize) -> Server {
        let mut records: Vec<(String, Type, Vec<u8>)> = Vec::new();
        for i in 0..links {
            records.push((
                format!("c{}.example.com.", i),
                Type::CNAME,
                cname_rdata(&format!("c{}.example.com.", i + 1)),
            ));
        }
        records.push((
            format!("c{}.example.com.", links),
            Type::A,
            vec![192, 0, 2, 9],
        ));
        let borrowed: Vec<(&str, Type, &[u8])> = records
            .iter()
            .map(|(owner, rr_type, rdata)| (owner.as_str(), *rr_type, rdata.as_slice()))
            .collect();
        server_for(zone_with(&borrowed))
    }

    #[test]
    fn cname_chains_are_followed() {
        let server = chain_server(3);
        let response = run_query(&server, "c0.example.com.", Type::A.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(reader.aa());
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 4);
        for rr in &sections.answers[..3] {
            assert_eq!(rr.rr_type, Type::CNAME);
        }
        assert_eq!(sections.answers[3].rr_type, Type::A);
        assert_eq!(sections.answers[3].owner, name("c3.example.com."));
    }

    #[test]
    fn cname_chains_at_the_limit_are_followed() {
        let server = chain_server(MAX_CNAME_CHAIN_LEN);
        let response = run_query(&server, "c0.example.com.", Type::A.into(), false);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
    }

    #[test]
    fn over_long_cname_chains_fail() {
        let server = chain_server(MAX_CNAME_CHAIN_LEN + 1);
        let response = run_query(&server, "c0.example.com.", Type::A.into(), false);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::ServFail);
        assert_eq!(reader.ancount(), 0);
    }

    #[test]
    fn cname_loops_fail() {
        let a_to_b = cname_rdata("b.example.com.");
        let b_to_a = cname_rdata("a.example.com.");
        let server = server_for(zone_with(&[
            ("a.example.com.", Type::CNAME, a_to_b.as_slice()),
            ("b.example.com.", Type::CNAME, b_to_a.as_slice()),
        ]));
        let response = run_query(&server, "a.example.com.", Type::A.into(), false);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::ServFail);
    }

    ////////////////////////////////////////////////////////////////////
    // ADDITIONAL SECTION PROCESSING                                  //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn mx_answers_pull_in_addresses() {
        let server = server_for(zone_with(&[
            (
                "example.com.",
                Type::MX,
                b"\x00\x0a\x04mail\x07example\x03com\x00",
            ),
            ("mail.example.com.", Type::A, &[192, 0, 2, 5]),
            (
                "mail.example.com.",
                Type::AAAA,
                &[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            ),
        ]));
        let response = run_query(&server, "example.com.", Type::MX.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 1);
        assert_eq!(sections.additional.len(), 2);
        assert_eq!(sections.additional[0].rr_type, Type::A);
        assert_eq!(sections.additional[1].rr_type, Type::AAAA);
        for rr in &sections.additional {
            assert_eq!(rr.owner, name("mail.example.com."));
        }
    }

    #[test]
    fn out_of_zone_targets_are_not_chased() {
        let server = server_for(zone_with(&[(
            "example.com.",
            Type::MX,
            b"\x00\x0a\x04mail\x09elsewhere\x04test\x00",
        )]));
        let response = run_query(&server, "example.com.", Type::MX.into(), false);
        let mut reader = Reader::try_from(response.as_slice()).unwrap();
        let sections = read_sections(&mut reader);
        assert_eq!(sections.answers.len(), 1);
        assert!(sections.additional.is_empty());
    }

    ////////////////////////////////////////////////////////////////////
    // TRUNCATION                                                     //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn oversized_udp_answers_truncate_cleanly() {
        // 60 TXT records of 120 octets each cannot fit in 512 octets.
        let mut records: Vec<(String, Type, Vec<u8>)> = Vec::new();
        for i in 0..60 {
            let mut rdata = vec![119u8];
            rdata.extend_from_slice(format!("{:0119}", i).as_bytes());
            records.push(("big.example.com.".into(), Type::TXT, rdata));
        }
        let borrowed: Vec<(&str, Type, &[u8])> = records
            .iter()
            .map(|(owner, rr_type, rdata)| (owner.as_str(), *rr_type, rdata.as_slice()))
            .collect();
        let server = server_for(zone_with(&borrowed));

        let response = run_query(&server, "big.example.com.", Type::TXT.into(), false);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(reader.tc());
        assert_eq!(reader.ancount(), 0);
        assert_eq!(reader.nscount(), 0);
        assert!(response.len() <= 512);
    }

    #[test]
    fn dropped_additional_records_do_not_truncate() {
        // An MX answer whose address records don't fit is still a
        // complete answer; the addresses are simply dropped.
        let mut records: Vec<(String, Type, Vec<u8>)> = vec![(
            "example.com.".into(),
            Type::MX,
            b"\x00\x0a\x04mail\x07example\x03com\x00".to_vec(),
        )];
        for i in 0..60u8 {
            records.push((
                "mail.example.com.".into(),
                Type::A,
                vec![192, 0, 2, i],
            ));
        }
        let borrowed: Vec<(&str, Type, &[u8])> = records
            .iter()
            .map(|(owner, rr_type, rdata)| (owner.as_str(), *rr_type, rdata.as_slice()))
            .collect();
        let server = server_for(zone_with(&borrowed));

        let response = run_query(&server, "example.com.", Type::MX.into(), false);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NoError);
        assert!(!reader.tc());
        assert_eq!(reader.ancount(), 1);
        assert_eq!(reader.arcount(), 0);
    }
}
