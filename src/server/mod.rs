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

//! The processing logic of an authoritative DNS server.
//!
//! The [`Server`] structure is the heart of this module. It receives,
//! parses, and responds to DNS messages through
//! [`Server::handle_message`], resolving queries against its
//! [`Catalog`] of zones. Network I/O is entirely the caller's concern:
//! an I/O provider hands in a received byte buffer and a buffer for
//! the response, and sends whatever comes back. Worker threads may
//! call [`Server::handle_message`] concurrently; each call takes its
//! own snapshots of the zones it touches.
//!
//! Processing follows a fixed pipeline: parse the question, scan the
//! trailing records for EDNS and TSIG, verify TSIG, classify the
//! query by opcode and QTYPE, resolve it (the `query` module), and
//! finish the response — reconciling header counts and appending OPT
//! and TSIG. Every early exit produces a fully initialized response
//! (or explicitly no response at all); a partially written message is
//! never handed back.

use log::warn;

use crate::catalog::Catalog;
use crate::message::reader::ReadTsig;
use crate::message::tsig::{self, Keyring, PreparedTsigRr, TimeSigned};
use crate::message::writer::{self, TsigMode};
use crate::message::{ExtendedRcode, Opcode, Question, Rcode, Reader, Writer};
use crate::name::LowercaseName;

mod query;

/// The UDP payload size we advertise in OPT records: the common
/// fragmentation-safe default.
pub const EDNS_UDP_PAYLOAD_SIZE: u16 = 1232;

/// The fudge we use when signing TSIG responses.
const TSIG_FUDGE: u16 = 300;

////////////////////////////////////////////////////////////////////////
// SERVER PUBLIC API AND CORE MESSAGE-HANDLING LOGIC                  //
////////////////////////////////////////////////////////////////////////

/// An authoritative DNS server, abstracted from any underlying network
/// I/O provider.
pub struct Server {
    catalog: Catalog,
    keyring: Keyring,
}

impl Server {
    /// Creates a new `Server` that will serve the provided [`Catalog`].
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            keyring: Keyring::new(),
        }
    }

    /// Configures the TSIG keys this server recognizes.
    pub fn set_keyring(&mut self, keyring: Keyring) {
        self.keyring = keyring;
    }

    /// Handles a received DNS message. This is the API through which
    /// I/O providers submit messages.
    ///
    /// `received_buf` contains the message received, and
    /// `received_info` provides additional information about it.
    /// `response_buf` is a buffer into which a response message may be
    /// serialized. Its length is interpreted as the maximum size of a
    /// DNS message the caller is willing to send; to comply with the
    /// DNS specification it should be at least 512 octets for UDP and
    /// 65,535 octets for TCP. If the buffer is not long enough to hold
    /// a DNS message header, this method will panic.
    ///
    /// A [`Response`] is returned, signifying whether a response is to
    /// be sent and, if so, how long the response message written into
    /// `response_buf` is.
    pub fn handle_message(
        &self,
        received_buf: &[u8],
        received_info: ReceivedInfo,
        response_buf: &mut [u8],
    ) -> Response {
        // Construct a Reader, while ignoring messages that do not
        // contain a full DNS header.
        let mut received = match Reader::try_from(received_buf) {
            Ok(r) => r,
            Err(_) => return Response::None,
        };

        // Ignore messages that are responses.
        if received.qr() {
            return Response::None;
        }

        // Start the response by copying information from the received
        // message and setting the QR bit.
        let response_size_limit = match received_info.transport {
            Transport::Tcp => u16::MAX as usize,
            Transport::Udp => 512,
        };
        let response = Writer::new(response_buf, response_size_limit)
            .expect("failed to start response (buffer too short)");
        let mut context = Context {
            question: None,
            response,
            received_info,
            dnssec_ok: false,
            send_response: true,
        };
        context.response.set_id(received.id());
        context.response.set_qr(true);
        context.response.set_opcode(received.opcode());
        if received.opcode() == Opcode::QUERY {
            // Per the ISC DNS compliance testing tool, RD is only
            // defined for opcode QUERY and thus we shouldn't copy it
            // otherwise.
            context.response.set_rd(received.rd());
        }

        self.handle_message_with_context(&mut received, &mut context);

        if context.send_response {
            Response::Single(context.response.finish())
        } else {
            Response::None
        }
    }

    /// Continues message processing once the response [`Writer`] is
    /// set up: reads the question, processes the trailing pseudo-RRs,
    /// and dispatches on the opcode.
    fn handle_message_with_context(&self, received: &mut Reader, context: &mut Context) {
        // Read the question, if any. Note that most current
        // implementations ignore messages with QDCOUNT > 1, so we do
        // the same. If there is a question, add it to the response.
        context.question = match received.qdcount() {
            0 => None,
            1 => match received.read_question() {
                Ok(question) => {
                    if context.response.add_question(&question).is_err() {
                        context.response.set_rcode(Rcode::ServFail);
                        return;
                    }
                    Some(question)
                }
                Err(_) => {
                    context.response.set_rcode(Rcode::FormErr);
                    return;
                }
            },
            _ => {
                context.send_response = false;
                return;
            }
        };

        // Scan the remaining records for the OPT and TSIG pseudo-RRs.
        // Everything the scan enforces — a single OPT, TSIG placement,
        // no trailing garbage — is a format error when violated.
        let trailing = match received.scan_trailing() {
            Ok(trailing) => trailing,
            Err(_) => {
                context.response.set_rcode(Rcode::FormErr);
                return;
            }
        };

        // EDNS negotiation (RFC 6891). The requestor's payload size
        // raises our UDP response budget; the DO bit is echoed and
        // controls DNSSEC processing downstream.
        if let Some(edns) = trailing.edns {
            if context.received_info.transport == Transport::Udp {
                let budget = (edns.udp_payload_size as usize).max(512);
                context.response.set_limit(budget);
            }
            if context
                .response
                .set_edns(EDNS_UDP_PAYLOAD_SIZE, edns.dnssec_ok)
                .is_err()
            {
                context.response.set_rcode(Rcode::ServFail);
                return;
            }
            if edns.version > 0 {
                // RFC 6891 § 6.1.3: respond BADVERS to versions we do
                // not implement.
                let _ = context.response.set_extended_rcode(ExtendedRcode::BADVERS);
                return;
            }
            context.dnssec_ok = edns.dnssec_ok;
        }

        // TSIG verification (RFC 8945 § 5.2). On failure a response
        // carrying the appropriate TSIG error has been prepared and
        // processing stops.
        if let Some(ref tsig) = trailing.tsig {
            if !self.verify_tsig(received, tsig, context) {
                return;
            }
        }

        let qtype = context.question.as_ref().map(|q| q.qtype);
        match query::classify(received.opcode(), qtype) {
            query::QueryClass::Normal => self.handle_query(context),
            // Zone transfers run over a transport this crate does not
            // provide, and NOTIFY/UPDATE belong to the writer path's
            // external collaborators; all of them answer NOTIMP here.
            query::QueryClass::Axfr
            | query::QueryClass::Ixfr
            | query::QueryClass::Notify
            | query::QueryClass::Update
            | query::QueryClass::Invalid => context.response.set_rcode(Rcode::NotImp),
        }
    }

    /// Verifies the TSIG record of a request and arranges for the
    /// response to be signed. Returns `false` if processing should
    /// stop because a TSIG error response has been prepared.
    fn verify_tsig(&self, received: &Reader, tsig: &ReadTsig, context: &mut Context) -> bool {
        let now = TimeSigned::now();
        let key_name = LowercaseName::from(tsig.rr.key_name.clone());
        let prepared = |time_signed, error, other: Box<[u8]>| PreparedTsigRr {
            key_name: key_name.clone(),
            time_signed,
            fudge: TSIG_FUDGE,
            original_id: received.id(),
            error,
            other,
        };

        let key = match self.keyring.get(&tsig.rr.key_name) {
            Some(key) => key,
            None => {
                // RFC 8945 § 5.2.1: an unsigned BADKEY response.
                let mode = TsigMode::Unsigned {
                    algorithm: tsig.rr.algorithm.clone(),
                };
                let rr = prepared(tsig.rr.time_signed, ExtendedRcode::BADKEY, Box::new([]));
                let _ = context.response.set_tsig(mode, rr);
                context.response.set_rcode(Rcode::NotAuth);
                return false;
            }
        };

        match tsig
            .rr
            .verify_request(received.octets(), tsig.offset, key, now)
        {
            Ok(()) => {
                let mode = TsigMode::Response {
                    algorithm: key.algorithm,
                    request_mac: tsig.rr.mac.clone(),
                    key: key.secret.clone(),
                };
                let rr = prepared(now, ExtendedRcode::NOERROR, Box::new([]));
                if context.response.set_tsig(mode, rr).is_err() {
                    context.response.set_rcode(Rcode::ServFail);
                    return false;
                }
                true
            }
            Err(tsig::VerifyError::BadTime) => {
                // RFC 8945 § 5.2.3: a BADTIME response is signed, with
                // the server's current time in the other-data field.
                let mode = TsigMode::Response {
                    algorithm: key.algorithm,
                    request_mac: tsig.rr.mac.clone(),
                    key: key.secret.clone(),
                };
                let other = now.to_wire().to_vec().into_boxed_slice();
                let rr = prepared(tsig.rr.time_signed, ExtendedRcode::BADTIME, other);
                let _ = context.response.set_tsig(mode, rr);
                context.response.set_rcode(Rcode::NotAuth);
                false
            }
            Err(e) => {
                // RFC 8945 § 5.2.2: unsigned BADSIG (or BADKEY on an
                // algorithm mismatch) responses.
                let error = match e {
                    tsig::VerifyError::BadSig => ExtendedRcode::BADSIG,
                    _ => ExtendedRcode::BADKEY,
                };
                let mode = TsigMode::Unsigned {
                    algorithm: tsig.rr.algorithm.clone(),
                };
                let rr = prepared(tsig.rr.time_signed, error, Box::new([]));
                let _ = context.response.set_tsig(mode, rr);
                context.response.set_rcode(Rcode::NotAuth);
                false
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONTEXT AND SUPPORTING TYPES                                       //
////////////////////////////////////////////////////////////////////////

/// The working state of one request/response cycle.
pub(super) struct Context<'b> {
    pub question: Option<Question>,
    pub response: Writer<'b>,
    pub received_info: ReceivedInfo,
    pub dnssec_ok: bool,
    pub send_response: bool,
}

/// Information about a received message, provided by the I/O layer.
#[derive(Clone, Copy, Debug)]
pub struct ReceivedInfo {
    pub transport: Transport,
}

/// The transport a message was received over.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transport {
    Udp,
    Tcp,
}

/// Whether (and how large) a response is to be sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Response {
    /// A response of the given length has been written.
    Single(usize),

    /// No response is to be sent.
    None,
}

/// Errors internal to query processing, converted to RCODEs (or the
/// TC bit) at the top of the query path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum ProcessingError {
    ServFail,
    Truncation,
}

impl From<writer::Error> for ProcessingError {
    fn from(e: writer::Error) -> Self {
        match e {
            writer::Error::Truncation => Self::Truncation,
            other => {
                warn!("error while writing response: {}", other);
                Self::ServFail
            }
        }
    }
}

pub(super) type ProcessingResult<T> = Result<T, ProcessingError>;
