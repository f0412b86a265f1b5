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

//! Implementation of the [`Writer`] type to write on-the-wire DNS
//! messages.

use std::fmt;
use std::num::NonZeroU16;

use super::constants::*;
use super::tsig::{Algorithm, PreparedTsigRr};
use super::{ExtendedRcode, Opcode, Qclass, Question, Rcode};
use crate::class::Class;
use crate::name::Name;
use crate::rr::descriptor::{self, FieldKind};
use crate::rr::{Rdata, RdataSet, Ttl, Type};

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer that serializes a DNS message into it.
///
/// A `Writer` is constructed with [`Writer::new`]. The underlying
/// buffer and initial message size limit must be long enough to
/// accommodate a full DNS message header of 12 octets. The message
/// header is initially zeroed.
///
/// Since header information is in a fixed position, it can be written
/// at any time through the appropriate `Writer` methods. The message
/// body is written sequentially through a write cursor, and the
/// `Writer` tracks which section it is currently serializing:
///
/// ```text
/// QUESTION → ANSWER → AUTHORITY → ADDITIONAL
/// ```
///
/// Sections only ever advance. Attempts to add records out of order
/// fail with [`Error::OutOfOrder`], and every add is atomic: on any
/// failure the cursor, counts, and compression state roll back, so a
/// partially written record is never visible. [`Writer::finish`]
/// consumes the `Writer` (freezing the message for good), reconciles
/// the header counts with the records actually written, and appends
/// the OPT and TSIG pseudo-records, in that order, at the very end of
/// the additional section.
///
/// For EDNS messages, use [`Writer::set_edns`]; space for the OPT
/// record is reserved up front. For TSIG, use [`Writer::set_tsig`];
/// space is likewise reserved, and the MAC is computed over the
/// serialized message when it is finished.
pub struct Writer<'a> {
    octets: &'a mut [u8],
    cursor: usize,
    limit: usize,
    available: usize,
    rr_start: usize,
    section: Section,
    qdcount: u16,
    ancount: u16,
    nscount: u16,
    arcount: u16,
    qname: Option<PriorName>,
    most_recent_owner: Option<PriorName>,
    most_recent_name_in_rdata: Option<PriorName>,
    edns: Option<Edns>,
    tsig: Option<Tsig>,
}

/// A type for recording which section of a DNS message a [`Writer`] is
/// currently serializing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

/// Records where a name was written in a message and how many labels
/// long it is.
#[derive(Clone, Copy, Debug)]
struct PriorName {
    pointer: HintPointer,
    len: u8,
}

impl PriorName {
    fn new(pointer: HintPointer, name: &Name) -> Self {
        Self {
            pointer,
            len: name.len() as u8,
        }
    }
}

/// A type for recording EDNS information for a message until it is
/// serialized in [`Writer::finish`].
#[derive(Clone, Debug)]
struct Edns {
    udp_payload_size: u16,
    extended_rcode_upper_bits: u8,
    dnssec_ok: bool,
}

/// A type for recording TSIG information for a message until it is
/// serialized in [`Writer::finish`].
struct Tsig {
    mode: TsigMode,
    reserved_len: usize,
    rr: PreparedTsigRr,
}

/// Specifies if and how to sign a message with a TSIG RR.
#[derive(Clone, Debug)]
pub enum TsigMode {
    /// The message should be signed as a request.
    Request {
        algorithm: Algorithm,
        key: Box<[u8]>,
    },

    /// The message should be signed as a response.
    Response {
        algorithm: Algorithm,
        request_mac: Box<[u8]>,
        key: Box<[u8]>,
    },

    /// The message should not be signed. The MAC field of the TSIG RR
    /// will be left empty.
    Unsigned { algorithm: Name },
}

/// The amount of space we need to reserve for the OPT record. (Since we
/// don't emit any EDNS options, the OPT record is a fixed size.)
const OPT_RECORD_SIZE: usize = 11;

impl<'a> Writer<'a> {
    /// Creates a new `Writer` from the underlying buffer `octets`. The
    /// message size is initially limited to `limit` or `octets.len()`
    /// (whichever is smaller). If the smaller limit is too small to
    /// hold a full DNS message header of 12 octets, then this will
    /// fail.
    pub fn new(octets: &'a mut [u8], limit: usize) -> Result<Self> {
        let limit = limit.min(octets.len());
        if limit < HEADER_SIZE {
            Err(Error::Truncation)
        } else {
            octets[0..HEADER_SIZE].fill(0);
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
                limit,
                available: limit,
                rr_start: HEADER_SIZE,
                section: Section::Question,
                qdcount: 0,
                ancount: 0,
                nscount: 0,
                arcount: 0,
                qname: None,
                most_recent_owner: None,
                most_recent_name_in_rdata: None,
                edns: None,
                tsig: None,
            })
        }
    }

    /// Sets the size limit for the message as close to `new_limit` as
    /// possible. Note that this method silently clamps the value: the
    /// limit cannot be more than the underlying buffer's size and
    /// cannot be less than the length of the message written so far,
    /// plus any reserved space.
    pub fn set_limit(&mut self, new_limit: usize) {
        if new_limit >= self.limit {
            let new_limit = new_limit.min(self.octets.len());
            let increase = new_limit - self.limit;
            self.limit = new_limit;
            self.available += increase;
        } else {
            let new_limit = new_limit.max(self.cursor + self.limit - self.available);
            let decrease = self.limit - new_limit;
            self.limit = new_limit;
            self.available -= decrease;
        }
    }

    /// Returns the current 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes(self.octets[ID_START..ID_END].try_into().unwrap())
    }

    /// Sets the 16-bit ID of the message.
    pub fn set_id(&mut self, id: u16) {
        self.write_u16(ID_START, id);
    }

    /// Sets or clears the QR (query response) bit.
    pub fn set_qr(&mut self, qr: bool) {
        if qr {
            self.octets[QR_BYTE] |= QR_MASK;
        } else {
            self.octets[QR_BYTE] &= !QR_MASK;
        }
    }

    /// Sets the message's opcode.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.octets[OPCODE_BYTE] &= !OPCODE_MASK;
        self.octets[OPCODE_BYTE] |= u8::from(opcode) << OPCODE_SHIFT;
    }

    /// Returns the current value of the AA (authoritative answer) bit.
    pub fn aa(&self) -> bool {
        (self.octets[AA_BYTE] & AA_MASK) != 0
    }

    /// Sets or clears the AA (authoritative answer) bit.
    pub fn set_aa(&mut self, aa: bool) {
        if aa {
            self.octets[AA_BYTE] |= AA_MASK;
        } else {
            self.octets[AA_BYTE] &= !AA_MASK;
        }
    }

    /// Returns the current value of the TC (truncation) bit.
    pub fn tc(&self) -> bool {
        (self.octets[TC_BYTE] & TC_MASK) != 0
    }

    /// Sets or clears the TC (truncation) bit.
    pub fn set_tc(&mut self, tc: bool) {
        if tc {
            self.octets[TC_BYTE] |= TC_MASK;
        } else {
            self.octets[TC_BYTE] &= !TC_MASK;
        }
    }

    /// Sets or clears the RD (recursion desired) bit.
    pub fn set_rd(&mut self, rd: bool) {
        if rd {
            self.octets[RD_BYTE] |= RD_MASK;
        } else {
            self.octets[RD_BYTE] &= !RD_MASK;
        }
    }

    /// Returns the message's current RCODE. Note that if EDNS may be in
    /// use, one should use [`Writer::extended_rcode`] instead.
    pub fn rcode(&self) -> Rcode {
        let raw = self.octets[RCODE_BYTE] & RCODE_MASK;
        raw.try_into().unwrap()
    }

    /// Sets the message's RCODE. In an EDNS message, this clears the
    /// 8-bit extension of the RCODE in the OPT TTL field.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.octets[RCODE_BYTE] &= !RCODE_MASK;
        self.octets[RCODE_BYTE] |= u8::from(rcode);
        if let Some(ref mut edns) = self.edns {
            edns.extended_rcode_upper_bits = 0;
        }
    }

    /// Returns the message's extended RCODE. If EDNS is not in use,
    /// then this is just the RCODE.
    pub fn extended_rcode(&self) -> ExtendedRcode {
        let lower_four = (self.octets[RCODE_BYTE] & RCODE_MASK) as u16;
        if let Some(ref edns) = self.edns {
            let raw = ((edns.extended_rcode_upper_bits as u16) << 4) | lower_four;
            raw.into()
        } else {
            lower_four.into()
        }
    }

    /// Sets the message's extended RCODE. This will fail if EDNS is not
    /// in use, or if the value is greater than 4,095 (since OPT records
    /// can only express extended RCODEs that fit in 12 bits).
    pub fn set_extended_rcode(&mut self, rcode: ExtendedRcode) -> Result<()> {
        if let Some(ref mut edns) = self.edns {
            let raw = u16::from(rcode);
            if raw > 4095 {
                Err(Error::ExtendedRcodeOverflow)
            } else {
                self.octets[RCODE_BYTE] &= !RCODE_MASK;
                self.octets[RCODE_BYTE] |= (raw as u8) & RCODE_MASK;
                edns.extended_rcode_upper_bits = (raw >> 4) as u8;
                Ok(())
            }
        } else {
            Err(Error::NotEdns)
        }
    }

    /// Returns the current number of questions in the message.
    pub fn qdcount(&self) -> u16 {
        self.qdcount
    }

    /// Returns the current number of answer RRs in the message.
    pub fn ancount(&self) -> u16 {
        self.ancount
    }

    /// Returns the current number of authority RRs in the message.
    pub fn nscount(&self) -> u16 {
        self.nscount
    }

    /// Returns the current number of additional RRs in the message
    /// (including any pending OPT record).
    pub fn arcount(&self) -> u16 {
        self.arcount
    }

    /// Adds a question to the message. This must be used before any
    /// resource records are added.
    pub fn add_question(&mut self, question: &Question) -> Result<()> {
        if self.section != Section::Question {
            Err(Error::OutOfOrder)
        } else if let Some(new_qdcount) = self.qdcount.checked_add(1) {
            self.with_rollback(|this| {
                let qname = this.write_unhinted_name(&question.qname)?;
                if this.qdcount == 0 {
                    this.qname = qname;
                }
                this.try_push_u16(question.qtype.into())?;
                this.try_push_u16(question.qclass.into())
            })?;
            self.qdcount = new_qdcount;
            self.rr_start = self.cursor;
            Ok(())
        } else {
            Err(Error::CountOverflow)
        }
    }

    /// Adds a resource record to the answer section of the message.
    /// This must be used after any questions are added and before RRs
    /// are added to any other section.
    pub fn add_answer_rr(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdata: &Rdata,
        hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.with_rollback(|this| {
            this.change_section_to_answer()?;
            this.add_rr(owner, rr_type, class, ttl, rdata, hint_pointer_vec)?;
            this.ancount = this.ancount.checked_add(1).ok_or(Error::CountOverflow)?;
            Ok(())
        })
    }

    /// Adds an RRset to the answer section of the message. This must be
    /// used after any questions are added and before RRs are added to
    /// any other section.
    pub fn add_answer_rrset(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdatas: &RdataSet,
        hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.with_rollback(|this| {
            this.change_section_to_answer()?;
            let n_added = this.add_rrset(owner, rr_type, class, ttl, rdatas, hint_pointer_vec)?;
            this.ancount = u16::try_from(n_added)
                .ok()
                .and_then(|n| this.ancount.checked_add(n))
                .ok_or(Error::CountOverflow)?;
            Ok(())
        })
    }

    /// Changes the current section to [`Section::Answer`], if possible.
    fn change_section_to_answer(&mut self) -> Result<()> {
        match self.section {
            Section::Question => {
                self.section = Section::Answer;
                Ok(())
            }
            Section::Answer => Ok(()),
            _ => Err(Error::OutOfOrder),
        }
    }

    /// Adds a resource record to the authority section of the message.
    /// This must be used after any questions and answer RRs are added
    /// and before any additional RRs are added.
    pub fn add_authority_rr(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdata: &Rdata,
        hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.with_rollback(|this| {
            this.change_section_to_authority()?;
            this.add_rr(owner, rr_type, class, ttl, rdata, hint_pointer_vec)?;
            this.nscount = this.nscount.checked_add(1).ok_or(Error::CountOverflow)?;
            Ok(())
        })
    }

    /// Adds an RRset to the authority section of the message. This
    /// must be used after any questions and answer RRs are added and
    /// before any additional RRs are added.
    pub fn add_authority_rrset(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdatas: &RdataSet,
        hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.with_rollback(|this| {
            this.change_section_to_authority()?;
            let n_added = this.add_rrset(owner, rr_type, class, ttl, rdatas, hint_pointer_vec)?;
            this.nscount = u16::try_from(n_added)
                .ok()
                .and_then(|n| this.nscount.checked_add(n))
                .ok_or(Error::CountOverflow)?;
            Ok(())
        })
    }

    /// Changes the current section to [`Section::Authority`], if
    /// possible.
    fn change_section_to_authority(&mut self) -> Result<()> {
        match self.section {
            Section::Question | Section::Answer => {
                self.section = Section::Authority;
                Ok(())
            }
            Section::Authority => Ok(()),
            _ => Err(Error::OutOfOrder),
        }
    }

    /// Adds a resource record to the additional section of the message.
    /// This must be used after any questions and any RRs in other
    /// sections are added.
    pub fn add_additional_rr(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdata: &Rdata,
        hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.with_rollback(|this| {
            this.section = Section::Additional;
            this.add_rr(owner, rr_type, class, ttl, rdata, hint_pointer_vec)?;
            this.arcount = this.arcount.checked_add(1).ok_or(Error::CountOverflow)?;
            Ok(())
        })
    }

    /// Adds an RRset to the additional section of the message. This
    /// must be used after any questions and any RRs in other sections
    /// are added.
    pub fn add_additional_rrset(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdatas: &RdataSet,
        hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.with_rollback(|this| {
            this.section = Section::Additional;
            let n_added = this.add_rrset(owner, rr_type, class, ttl, rdatas, hint_pointer_vec)?;
            this.arcount = u16::try_from(n_added)
                .ok()
                .and_then(|n| this.arcount.checked_add(n))
                .ok_or(Error::CountOverflow)?;
            Ok(())
        })
    }

    /// Writes out an RR at the current cursor. This is for internal
    /// use: the write is not done atomically and may change the cursor
    /// even when an error is returned. This is intended to be used with
    /// [`Writer::with_rollback`].
    fn add_rr(
        &mut self,
        owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdata: &Rdata,
        mut hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<()> {
        self.most_recent_owner = self.write_hinted_name(owner)?;
        self.try_push_u16(rr_type.into())?;
        self.try_push_u16(class.into())?;
        self.try_push_u32(ttl.into())?;

        // Save two octets for the RDLENGTH field. We must compute and
        // write this field at the end, since it's affected by
        // compression.
        if self.available - self.cursor < 2 {
            return Err(Error::Truncation);
        }
        let rdlength_start = self.cursor;
        self.cursor += 2;

        // Write the RDATA, compressing or recording domain-name fields
        // according to the type descriptor.
        for field in descriptor::fields_of(rr_type, rdata.octets()) {
            let (kind, span) = field.or(Err(Error::InvalidRdata))?;
            match kind {
                FieldKind::CompressedName => {
                    let name =
                        Name::try_from_uncompressed_all(span).or(Err(Error::InvalidRdata))?;
                    self.most_recent_name_in_rdata = self.write_unhinted_name(&name)?;
                    if let Some(vec) = hint_pointer_vec.as_deref_mut() {
                        vec.push(self.most_recent_name_in_rdata.map(|n| n.pointer));
                    }
                }
                FieldKind::UncompressedName => {
                    let name =
                        Name::try_from_uncompressed_all(span).or(Err(Error::InvalidRdata))?;
                    self.most_recent_name_in_rdata = self.write_uncompressed_name(&name)?;
                    if let Some(vec) = hint_pointer_vec.as_deref_mut() {
                        vec.push(self.most_recent_name_in_rdata.map(|n| n.pointer));
                    }
                }
                FieldKind::LiteralName | FieldKind::Fixed(_) | FieldKind::Remainder => {
                    self.try_push(span)?;
                }
            }
        }

        // Compute and write the RDLENGTH field.
        let rdlength = self.cursor - rdlength_start - 2;
        self.write_u16(rdlength_start, rdlength as u16);
        Ok(())
    }

    /// Writes out an RRset at the current cursor. This is for internal
    /// use; see [`Writer::add_rr`] for the caveats.
    fn add_rrset(
        &mut self,
        mut owner: HintedName,
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        rdatas: &RdataSet,
        mut hint_pointer_vec: Option<&mut HintPointerVec>,
    ) -> Result<usize> {
        let mut n_added = 0;
        for rdata in rdatas.iter() {
            self.add_rr(
                owner,
                rr_type,
                class,
                ttl,
                rdata,
                hint_pointer_vec.as_deref_mut(),
            )?;
            owner.hint = Hint::MostRecentOwner;
            n_added += 1;
        }
        Ok(n_added)
    }

    /// Removes any resource records previously added to the message.
    pub fn clear_rrs(&mut self) {
        self.ancount = 0;
        self.nscount = 0;
        self.arcount = 0;
        if self.edns.is_some() {
            self.arcount += 1;
        }
        self.cursor = self.rr_start;
        self.section = Section::Question;
        self.most_recent_owner = None;
        self.most_recent_name_in_rdata = None;
    }

    /// Makes this an EDNS message. This will reserve space at the end
    /// of the message for the OPT record; if there is insufficient
    /// space, then this will fail. This will also fail if this is
    /// already an EDNS message.
    pub fn set_edns(&mut self, udp_payload_size: u16, dnssec_ok: bool) -> Result<()> {
        if self.edns.is_some() {
            Err(Error::AlreadyEdns)
        } else if self.cursor + OPT_RECORD_SIZE > self.available {
            Err(Error::Truncation)
        } else if let Some(new_arcount) = self.arcount.checked_add(1) {
            self.arcount = new_arcount;
            self.available -= OPT_RECORD_SIZE;
            self.edns = Some(Edns {
                udp_payload_size,
                extended_rcode_upper_bits: 0,
                dnssec_ok,
            });
            Ok(())
        } else {
            Err(Error::CountOverflow)
        }
    }

    /// Makes this a TSIG-secured message. This will reserve space at
    /// the end of the message for the TSIG record; if there is
    /// insufficient space, then this will fail. This will also fail if
    /// this is already a TSIG message.
    ///
    /// Note that the TSIG RR is *not* reflected in
    /// [`Writer::arcount`] until the message is finished: the MAC is
    /// computed over the message with header counts that do not
    /// include the TSIG RR itself ([RFC 8945 § 4.3.3]).
    ///
    /// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
    pub fn set_tsig(&mut self, mode: TsigMode, rr: PreparedTsigRr) -> Result<()> {
        if self.tsig.is_some() {
            return Err(Error::AlreadyTsig);
        }

        let reserved_len = match &mode {
            TsigMode::Request { algorithm, .. } | TsigMode::Response { algorithm, .. } => {
                rr.signed_len(*algorithm)
            }
            TsigMode::Unsigned { algorithm } => rr.unsigned_len(algorithm),
        };
        if self.cursor + reserved_len > self.available {
            Err(Error::Truncation)
        } else if self.arcount == u16::MAX {
            Err(Error::CountOverflow)
        } else {
            self.available -= reserved_len;
            self.tsig = Some(Tsig {
                mode,
                reserved_len,
                rr,
            });
            Ok(())
        }
    }

    /// Finishes writing the message. The final length of the message
    /// is returned.
    pub fn finish(self) -> usize {
        self.finish_with_mac().0
    }

    /// Finishes writing the message, returning its final length and
    /// its TSIG MAC (if the message was signed).
    pub fn finish_with_mac(mut self) -> (usize, Option<Box<[u8]>>) {
        self.write_u16(QDCOUNT_START, self.qdcount);
        self.write_u16(ANCOUNT_START, self.ancount);
        self.write_u16(NSCOUNT_START, self.nscount);
        self.write_u16(ARCOUNT_START, self.arcount);

        // We finish up by writing any OPT or TSIG records, which go at
        // the very end of the message. Before each RR is written, the
        // "available" field is restored to undo the space reservation,
        // since Writer::add_rr checks it; the unwraps are then okay,
        // since the reservation guaranteed the space.

        if let Some(ref edns) = self.edns {
            let class = Class::from(edns.udp_payload_size);
            let mut ttl = (edns.extended_rcode_upper_bits as u32) << 24;
            if edns.dnssec_ok {
                ttl |= EDNS_DO_MASK;
            }
            self.available += OPT_RECORD_SIZE;
            let root = Name::root();
            self.add_rr(
                HintedName::new(Hint::None, &root),
                Type::OPT,
                class,
                Ttl::from(ttl),
                Rdata::empty(),
                None,
            )
            .unwrap();
        }

        let mac = if let Some(tsig) = self.tsig.take() {
            // The MAC covers the message as it stands, with the TSIG
            // RR itself excluded from the ARCOUNT.
            let message = &self.octets[0..self.cursor];
            let (rdata, mac) = match &tsig.mode {
                TsigMode::Request { algorithm, key } => {
                    let (rdata, mac) = tsig.rr.sign_request(message, *algorithm, key);
                    (rdata, Some(mac))
                }
                TsigMode::Response {
                    request_mac,
                    algorithm,
                    key,
                } => {
                    let (rdata, mac) =
                        tsig.rr.sign_response(message, request_mac, *algorithm, key);
                    (rdata, Some(mac))
                }
                TsigMode::Unsigned { algorithm } => (tsig.rr.unsigned(algorithm), None),
            };
            self.arcount += 1;
            self.write_u16(ARCOUNT_START, self.arcount);
            self.available += tsig.reserved_len;
            let key_name = Name::clone(&tsig.rr.key_name);
            self.add_rr(
                HintedName::new(Hint::None, &key_name),
                Type::TSIG,
                Qclass::ANY.into(),
                Ttl::from(0),
                &rdata,
                None,
            )
            .unwrap();
            mac
        } else {
            None
        };

        (self.cursor, mac)
    }

    /// Executes `f(self)`, returning the result and rolling back the
    /// section, cursor, and compression state to the current values
    /// first if the result is an error.
    fn with_rollback<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_section = self.section;
        let saved_cursor = self.cursor;
        let saved_qname = self.qname;
        let saved_most_recent_owner = self.most_recent_owner;
        let saved_most_recent_name_in_rdata = self.most_recent_name_in_rdata;
        let result = f(self);
        if result.is_err() {
            self.section = saved_section;
            self.cursor = saved_cursor;
            self.qname = saved_qname;
            self.most_recent_owner = saved_most_recent_owner;
            self.most_recent_name_in_rdata = saved_most_recent_name_in_rdata;
        }
        result
    }

    /// Writes a domain name to the underlying buffer at the current
    /// cursor, compressing it based on the provided hint if the name
    /// is long enough to make it worthwhile.
    fn write_hinted_name(&mut self, hinted_name: HintedName) -> Result<Option<PriorName>> {
        // Compression is not worth it if the name is no longer than a
        // two-octet pointer.
        if hinted_name.name.wire_repr().len() <= 2 {
            return self.write_uncompressed_name(hinted_name.name);
        }

        match hinted_name.hint {
            Hint::Qname => {
                if let Some(qname) = self.qname {
                    self.try_push_u16(0xc000 | qname.pointer.get())
                        .and(Ok(Some(qname)))
                } else {
                    self.write_compressed_unhinted_name(hinted_name.name)
                }
            }
            Hint::MostRecentOwner => {
                if let Some(most_recent_owner) = self.most_recent_owner {
                    self.try_push_u16(0xc000 | most_recent_owner.pointer.get())
                        .and(Ok(Some(most_recent_owner)))
                } else {
                    self.write_compressed_unhinted_name(hinted_name.name)
                }
            }
            Hint::MostRecentNameInRdata => {
                if let Some(most_recent) = self.most_recent_name_in_rdata {
                    self.try_push_u16(0xc000 | most_recent.pointer.get())
                        .and(Ok(Some(most_recent)))
                } else {
                    self.write_compressed_unhinted_name(hinted_name.name)
                }
            }
            Hint::Explicit(pointer) => {
                if (pointer.get() as usize) < self.cursor {
                    self.try_push_u16(0xc000 | pointer.get())
                        .and(Ok(Some(PriorName::new(pointer, hinted_name.name))))
                } else {
                    self.write_compressed_unhinted_name(hinted_name.name)
                }
            }
            Hint::None => self.write_compressed_unhinted_name(hinted_name.name),
        }
    }

    /// Writes a domain name without a hint to the underlying buffer at
    /// the current cursor, trying to compress it if the name is long
    /// enough to make it worthwhile.
    fn write_unhinted_name(&mut self, name: &Name) -> Result<Option<PriorName>> {
        if name.wire_repr().len() > 2 {
            self.write_compressed_unhinted_name(name)
        } else {
            self.write_uncompressed_name(name)
        }
    }

    /// Writes a domain name to the underlying buffer at the current
    /// cursor, trying to compress it against the suffix hints recorded
    /// for the packet.
    ///
    /// Like Knot, we do not attempt perfect compression against every
    /// prior name in the message; that requires a per-message hash
    /// table and most of its entries are never matched. Instead, the
    /// packet keeps three suffix
    /// hints — the QNAME, the most recently written owner, and the
    /// most recently written name in RDATA — and each new name is
    /// matched against (at most two of) them label by label, emitting
    /// a pointer to the longest suffix found. For authoritative
    /// responses, where nearly every name shares a suffix with the
    /// QNAME or the previous record, this captures almost all of the
    /// savings of full compression at a fraction of the bookkeeping.
    ///
    /// The scan "lines up" the labels of the prior names against the
    /// compressee's, right-aligned, and walks left to right from the
    /// compressee's first label. A match that runs to the end of a
    /// prior name yields a pointer; matched prefixes of the compressee
    /// are written literally with the pointer after them.
    fn write_compressed_unhinted_name(&mut self, compressee: &Name) -> Result<Option<PriorName>> {
        // Keeps track of a single prior name we're matching against.
        struct PriorCtx {
            start_column: usize,
            pointer: usize,
            match_start: Option<MatchStart>,
        }

        // Keeps track of an active match against a prior name.
        struct MatchStart {
            start_column: usize,
            prior_pointer: HintPointer,
        }

        // Sets up the PriorCtx for a prior name. If the prior name is
        // longer than the compressee, skip labels until the one that
        // lines up with the compressee's first label.
        let octets: &[u8] = self.octets;
        let build_prior_ctx = |prior: PriorName| {
            let prior_len = prior.len as usize;
            let start_column = compressee.len().saturating_sub(prior_len);
            let mut prior_pointer = prior.pointer.get() as usize;
            if prior_len > compressee.len() {
                let skip = prior_len - compressee.len();
                for _ in 0..skip {
                    // Prior-name pointers never point at a label that
                    // is itself a pointer, so the first label here is
                    // real.
                    let label_len = octets[prior_pointer] as usize;
                    prior_pointer += label_len + 1;
                    move_to_next_real_label(octets, &mut prior_pointer);
                }
            }
            PriorCtx {
                start_column,
                pointer: prior_pointer,
                match_start: None,
            }
        };

        // Load the prior names. The most recent owner (with the QNAME
        // as a fallback) and the most recent name in RDATA are the two
        // suffix hints we scan against.
        let most_recent_owner_or_qname = self.most_recent_owner.or(self.qname);
        if most_recent_owner_or_qname.is_none() && self.most_recent_name_in_rdata.is_none() {
            return self.write_uncompressed_name(compressee);
        }
        let mut prior_ctxs = [
            most_recent_owner_or_qname.map(build_prior_ctx),
            self.most_recent_name_in_rdata.map(build_prior_ctx),
        ];

        for (column, compressee_label) in
            compressee.labels().take(compressee.len() - 1).enumerate()
        {
            // The two prior names often point back to the same place in
            // the message; drop one to avoid doing the work twice.
            if let (Some(a), Some(b)) = (&prior_ctxs[0], &prior_ctxs[1]) {
                if a.pointer == b.pointer {
                    match (&a.match_start, &b.match_start) {
                        (Some(a), Some(b)) => {
                            if a.start_column <= b.start_column {
                                prior_ctxs[1] = None;
                            } else {
                                prior_ctxs[0] = None;
                            }
                        }
                        (Some(_), None) => prior_ctxs[1] = None,
                        (None, Some(_)) => prior_ctxs[0] = None,
                        (None, None) => prior_ctxs[1] = None,
                    }
                }
            }

            for prior_ctx in &mut prior_ctxs {
                let prior_ctx = match prior_ctx.as_mut() {
                    Some(p) => p,
                    None => continue,
                };
                if column < prior_ctx.start_column {
                    continue;
                }

                let prior_label_len = self.octets[prior_ctx.pointer] as usize;
                let prior_label_octets =
                    &self.octets[prior_ctx.pointer + 1..prior_ctx.pointer + 1 + prior_label_len];
                if let Some(prior_pointer) = HintPointer::new(prior_ctx.pointer) {
                    if compressee_label
                        .octets()
                        .eq_ignore_ascii_case(prior_label_octets)
                    {
                        prior_ctx.match_start.get_or_insert(MatchStart {
                            start_column: column,
                            prior_pointer,
                        });
                    } else {
                        prior_ctx.match_start = None;
                    }
                } else {
                    // The prior label sits past the largest offset a
                    // pointer can express.
                    prior_ctx.match_start = None;
                }

                prior_ctx.pointer += 1 + prior_label_len;
                move_to_next_real_label(self.octets, &mut prior_ctx.pointer);
            }
        }

        let longest_match = prior_ctxs
            .iter()
            .filter_map(|pc| pc.as_ref().and_then(|pc| pc.match_start.as_ref()))
            .min_by_key(|m| m.start_column);

        if let Some(longest_match) = longest_match {
            if longest_match.start_column == 0 {
                self.try_push_u16(0xc000 | longest_match.prior_pointer.get())?;
                Ok(Some(PriorName::new(
                    longest_match.prior_pointer,
                    compressee,
                )))
            } else {
                let pointer = HintPointer::new(self.cursor);
                self.try_push(compressee.wire_repr_to(longest_match.start_column))?;
                self.try_push_u16(0xc000 | longest_match.prior_pointer.get())?;
                Ok(pointer.map(|pointer| PriorName::new(pointer, compressee)))
            }
        } else {
            self.write_uncompressed_name(compressee)
        }
    }

    /// Writes a domain name to the underlying buffer at the current
    /// cursor, without compression.
    fn write_uncompressed_name(&mut self, name: &Name) -> Result<Option<PriorName>> {
        let pointer = HintPointer::new(self.cursor);
        self.try_push(name.wire_repr())?;
        Ok(pointer.map(|pointer| PriorName::new(pointer, name)))
    }

    /// Tries to write `data` to the underlying buffer at the current
    /// cursor, failing if there is not sufficient space.
    fn try_push(&mut self, data: &[u8]) -> Result<()> {
        if self.available - self.cursor >= data.len() {
            self.write(self.cursor, data);
            self.cursor += data.len();
            Ok(())
        } else {
            Err(Error::Truncation)
        }
    }

    /// Tries to write `data` in network byte order to the underlying
    /// buffer, failing if there is not sufficient space.
    fn try_push_u16(&mut self, data: u16) -> Result<()> {
        self.try_push(&data.to_be_bytes())
    }

    /// Tries to write `data` in network byte order to the underlying
    /// buffer, failing if there is not sufficient space.
    fn try_push_u32(&mut self, data: u32) -> Result<()> {
        self.try_push(&data.to_be_bytes())
    }

    /// Writes `data` at `position` (which must already be within the
    /// written part of the buffer).
    fn write(&mut self, position: usize, data: &[u8]) {
        self.octets[position..position + data.len()].copy_from_slice(data);
    }

    /// Writes `data` in network byte order at `position`.
    fn write_u16(&mut self, position: usize, data: u16) {
        self.write(position, &data.to_be_bytes());
    }
}

/// Advances a pointer to a label in a previously written name until it
/// rests on the next "real" (non-pointer) label.
fn move_to_next_real_label(octets: &[u8], pointer: &mut usize) {
    loop {
        let len = octets[*pointer] as usize;
        if len & 0xc0 == 0xc0 {
            let next_pointer = ((len & 0x3f) << 8) | (octets[*pointer + 1] as usize);
            if next_pointer < *pointer {
                *pointer = next_pointer;
            } else {
                panic!("invalid pointer found during compression; this is a bug");
            }
        } else {
            return;
        }
    }
}

impl fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Writer")
            .field("cursor", &self.cursor)
            .field("limit", &self.limit)
            .field("section", &self.section)
            .field("qdcount", &self.qdcount)
            .field("ancount", &self.ancount)
            .field("nscount", &self.nscount)
            .field("arcount", &self.arcount)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// COMPRESSION HINTS                                                  //
////////////////////////////////////////////////////////////////////////

/// A suggestion for how the [`Writer`] can quickly compress a domain
/// name, based on where an equal name was (probably) previously
/// written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hint {
    /// The name is equal to the QNAME.
    Qname,

    /// The name is equal to the most recently written record owner.
    MostRecentOwner,

    /// The name is equal to the most recently written domain name in
    /// RDATA.
    MostRecentNameInRdata,

    /// The name was written at the offset given by the
    /// [`HintPointer`].
    Explicit(HintPointer),

    /// No hint; scan the suffix hints for a partial match.
    None,
}

/// A [`Name`] bundled with a [`Hint`] for writing it.
#[derive(Clone, Copy, Debug)]
pub struct HintedName<'a> {
    hint: Hint,
    name: &'a Name,
}

impl<'a> HintedName<'a> {
    pub fn new(hint: Hint, name: &'a Name) -> Self {
        Self { hint, name }
    }

    /// Creates a `HintedName` from an entry of a [`HintPointerVec`],
    /// falling back to [`Hint::None`] when the entry is absent.
    pub fn from_hint_pointer_vec(
        vec: &HintPointerVec,
        index: usize,
        name: &'a Name,
    ) -> Self {
        match vec.get(index) {
            Some(pointer) => Self::new(Hint::Explicit(pointer), name),
            None => Self::new(Hint::None, name),
        }
    }

    pub fn name(&self) -> &'a Name {
        self.name
    }
}

/// The offset at which a domain name was written in a message, for use
/// with [`Hint::Explicit`]. Always a valid compression-pointer target
/// (nonzero and at most 2¹⁴ − 1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HintPointer(NonZeroU16);

impl HintPointer {
    fn new(offset: usize) -> Option<Self> {
        if offset <= POINTER_MAX {
            NonZeroU16::new(offset as u16).map(Self)
        } else {
            None
        }
    }

    fn get(self) -> u16 {
        self.0.get()
    }
}

/// Records, for each domain name written in the RDATA of an RRset, the
/// offset at which it was written (if it is a valid pointer target).
/// This enables additional-section processing to compress the owners
/// of address records against the NS/MX/SRV targets that pulled them
/// in.
#[derive(Clone, Debug, Default)]
pub struct HintPointerVec(Vec<Option<HintPointer>>);

impl HintPointerVec {
    pub fn new() -> Self {
        Default::default()
    }

    fn push(&mut self, pointer: Option<HintPointer>) {
        self.0.push(pointer);
    }

    pub fn get(&self, index: usize) -> Option<HintPointer> {
        self.0.get(index).copied().flatten()
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error that occurred while writing a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The message size limit does not permit the write.
    Truncation,

    /// Sections can only be written in order.
    OutOfOrder,

    /// A section's RR count would overflow.
    CountOverflow,

    /// The RDATA does not match its type's structure.
    InvalidRdata,

    /// EDNS has already been configured.
    AlreadyEdns,

    /// EDNS has not been configured.
    NotEdns,

    /// TSIG has already been configured.
    AlreadyTsig,

    /// The extended RCODE does not fit in 12 bits.
    ExtendedRcodeOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Truncation => f.write_str("insufficient space in message"),
            Self::OutOfOrder => f.write_str("sections must be written in order"),
            Self::CountOverflow => f.write_str("section count would overflow"),
            Self::InvalidRdata => f.write_str("invalid RDATA"),
            Self::AlreadyEdns => f.write_str("EDNS already configured"),
            Self::NotEdns => f.write_str("EDNS not configured"),
            Self::AlreadyTsig => f.write_str("TSIG already configured"),
            Self::ExtendedRcodeOverflow => f.write_str("extended RCODE too large"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Writer`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::Reader;
    use super::*;
    use crate::message::Qtype;

    fn question(qname: &str) -> Question {
        Question {
            qname: qname.parse().unwrap(),
            qtype: Qtype::from(Type::A),
            qclass: Class::IN.into(),
        }
    }

    #[test]
    fn written_messages_parse_back() {
        let qname: Name = "www.yarrow.test.".parse().unwrap();
        let mut rdatas = RdataSet::new();
        rdatas.insert(Type::A, (&[127, 0, 0, 1]).try_into().unwrap());
        rdatas.insert(Type::A, (&[127, 0, 0, 2]).try_into().unwrap());

        let mut buf = [0; 512];
        let mut writer = Writer::new(&mut buf, 512).unwrap();
        writer.set_id(0x0707);
        writer.set_qr(true);
        writer.add_question(&question("www.yarrow.test.")).unwrap();
        writer
            .add_answer_rrset(
                HintedName::new(Hint::Qname, &qname),
                Type::A,
                Class::IN,
                Ttl::from(300),
                &rdatas,
                None,
            )
            .unwrap();
        let len = writer.finish();

        let mut reader = Reader::try_from(&buf[..len]).unwrap();
        assert_eq!(reader.id(), 0x0707);
        assert!(reader.qr());
        assert_eq!(reader.qdcount(), 1);
        assert_eq!(reader.ancount(), 2);
        let read_question = reader.read_question().unwrap();
        assert_eq!(read_question.qname, qname);
        let rr1 = reader.read_rr().unwrap();
        assert_eq!(rr1.owner, qname);
        assert_eq!(rr1.rdata.octets(), &[127, 0, 0, 1]);
        let rr2 = reader.read_rr().unwrap();
        assert_eq!(rr2.owner, qname);
        assert_eq!(rr2.rdata.octets(), &[127, 0, 0, 2]);
        assert!(reader.at_eom());
    }

    #[test]
    fn owner_compression_uses_qname_hint() {
        let qname: Name = "www.yarrow.test.".parse().unwrap();
        let mut buf = [0; 512];
        let mut writer = Writer::new(&mut buf, 512).unwrap();
        writer.add_question(&question("www.yarrow.test.")).unwrap();
        let before = writer.cursor;
        writer
            .add_answer_rr(
                HintedName::new(Hint::Qname, &qname),
                Type::A,
                Class::IN,
                Ttl::from(300),
                (&[127, 0, 0, 1]).try_into().unwrap(),
                None,
            )
            .unwrap();
        writer.finish();
        // The owner is a two-octet pointer to the QNAME at offset 12.
        assert_eq!(&buf[before..before + 2], &[0xc0, 0x0c]);
    }

    #[test]
    fn rdata_names_are_compressed_against_suffix_hints() {
        let owner: Name = "yarrow.test.".parse().unwrap();
        let mut rdatas = RdataSet::new();
        let ns1: Name = "ns1.yarrow.test.".parse().unwrap();
        let ns2: Name = "ns2.yarrow.test.".parse().unwrap();
        rdatas.insert(Type::NS, ns1.wire_repr().try_into().unwrap());
        rdatas.insert(Type::NS, ns2.wire_repr().try_into().unwrap());

        let mut compressed = [0; 512];
        let mut writer = Writer::new(&mut compressed, 512).unwrap();
        writer.add_question(&question("yarrow.test.")).unwrap();
        writer
            .add_answer_rrset(
                HintedName::new(Hint::Qname, &owner),
                Type::NS,
                Class::IN,
                Ttl::from(300),
                &rdatas,
                None,
            )
            .unwrap();
        let len = writer.finish();

        // The uncompressed rendition of the same RRset is longer...
        let uncompressed_len = 12
            + owner.wire_repr().len() + 4
            + 2 * (owner.wire_repr().len() + 10)
            + ns1.wire_repr().len()
            + ns2.wire_repr().len();
        assert!(len < uncompressed_len);

        // ... and the compressed one still parses back correctly.
        let mut reader = Reader::try_from(&compressed[..len]).unwrap();
        reader.read_question().unwrap();
        let rr1 = reader.read_rr().unwrap();
        let rr2 = reader.read_rr().unwrap();
        assert_eq!(rr1.rdata.octets(), ns1.wire_repr());
        assert_eq!(rr2.rdata.octets(), ns2.wire_repr());
    }

    #[test]
    fn sections_cannot_retreat() {
        let owner: Name = "yarrow.test.".parse().unwrap();
        let rdata: &Rdata = (&[127, 0, 0, 1]).try_into().unwrap();
        let mut buf = [0; 512];
        let mut writer = Writer::new(&mut buf, 512).unwrap();
        writer
            .add_additional_rr(
                HintedName::new(Hint::None, &owner),
                Type::A,
                Class::IN,
                Ttl::from(300),
                rdata,
                None,
            )
            .unwrap();
        assert_eq!(
            writer.add_answer_rr(
                HintedName::new(Hint::None, &owner),
                Type::A,
                Class::IN,
                Ttl::from(300),
                rdata,
                None,
            ),
            Err(Error::OutOfOrder),
        );
    }

    #[test]
    fn truncation_rolls_back_cleanly() {
        let owner: Name = "a-rather-long-owner-name.yarrow.test.".parse().unwrap();
        let rdata: &Rdata = (&[127, 0, 0, 1]).try_into().unwrap();
        let mut buf = [0; 512];
        let mut writer = Writer::new(&mut buf, 24).unwrap();
        let result = writer.add_answer_rr(
            HintedName::new(Hint::None, &owner),
            Type::A,
            Class::IN,
            Ttl::from(300),
            rdata,
            None,
        );
        assert_eq!(result, Err(Error::Truncation));
        assert_eq!(writer.ancount(), 0);
        assert_eq!(writer.finish(), HEADER_SIZE);
    }

    #[test]
    fn finish_appends_opt_with_do_bit() {
        let mut buf = [0; 512];
        let mut writer = Writer::new(&mut buf, 512).unwrap();
        writer.set_edns(1232, true).unwrap();
        let len = writer.finish();

        let mut reader = Reader::try_from(&buf[..len]).unwrap();
        assert_eq!(reader.arcount(), 1);
        let trailing = reader.scan_trailing().unwrap();
        let edns = trailing.edns.unwrap();
        assert_eq!(edns.udp_payload_size, 1232);
        assert!(edns.dnssec_ok);
    }

    #[test]
    fn finish_appends_tsig_last() {
        use super::super::tsig::TimeSigned;

        let key_name: Name = "key.yarrow.test.".parse().unwrap();
        let prepared = PreparedTsigRr {
            key_name: key_name.clone().into(),
            time_signed: TimeSigned::from_unix_time(1_690_000_000),
            fudge: 300,
            original_id: 0x0707,
            error: ExtendedRcode::NOERROR,
            other: Box::new([]),
        };

        let mut buf = [0; 512];
        let mut writer = Writer::new(&mut buf, 512).unwrap();
        writer.set_id(0x0707);
        writer.set_edns(1232, false).unwrap();
        writer
            .set_tsig(
                TsigMode::Response {
                    algorithm: Algorithm::HmacSha256,
                    request_mac: Box::new([0xab; 32]),
                    key: b"0123456789abcdef".as_slice().into(),
                },
                prepared,
            )
            .unwrap();
        let (len, mac) = writer.finish_with_mac();
        assert!(mac.is_some());

        // The TSIG RR must be the final record and counted in ARCOUNT.
        let mut reader = Reader::try_from(&buf[..len]).unwrap();
        assert_eq!(reader.arcount(), 2);
        let trailing = reader.scan_trailing().unwrap();
        assert!(trailing.edns.is_some());
        let tsig = trailing.tsig.unwrap();
        assert_eq!(tsig.rr.key_name, key_name);
        assert_eq!(tsig.rr.original_id, 0x0707);
    }
}
