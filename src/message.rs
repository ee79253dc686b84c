//! GTPv2-C Messages
//!
//! `Message` is the unit the endpoint parses, validates, dispatches and
//! marshals: a header plus a flat IE list. Typed builders construct the
//! request messages the endpoint emits; `CreateSessionRequest` additionally
//! buckets caller IEs into canonical slots so the marshaled IE order is
//! stable regardless of argument order.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Gtp2cError, Gtp2cResult};
use crate::header::{message_type_name, Header, MessageType};
use crate::ie::{Ie, IeType};

/// GTPv2-C Message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message header
    pub header: Header,
    /// Information Elements
    pub ies: Vec<Ie>,
}

impl Message {
    /// Create a new message from a header
    pub fn new(header: Header) -> Self {
        Self {
            header,
            ies: Vec::new(),
        }
    }

    /// Create an Echo Request message (no TEID in the header)
    pub fn echo_request(ies: Vec<Ie>) -> Self {
        let header = Header::new_no_teid(MessageType::EchoRequest as u8, 0);
        Self { header, ies }
    }

    /// Create an Echo Response message (no TEID in the header)
    pub fn echo_response(ies: Vec<Ie>) -> Self {
        let header = Header::new_no_teid(MessageType::EchoResponse as u8, 0);
        Self { header, ies }
    }

    /// Create a Version Not Supported Indication message (no payload)
    pub fn version_not_supported_indication() -> Self {
        let header = Header::new_no_teid(MessageType::VersionNotSupportedIndication as u8, 0);
        Self::new(header)
    }

    /// GTP version from the header
    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// Message type code
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// Human-readable message type name
    pub fn type_name(&self) -> String {
        message_type_name(self.header.message_type)
    }

    /// Header TEID; zero when the header carries none
    pub fn teid(&self) -> u32 {
        self.header.teid.unwrap_or(0)
    }

    /// Sequence number
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    /// Set the sequence number
    pub fn set_sequence(&mut self, sequence: u32) {
        self.header.sequence = sequence;
    }

    /// First IE of the given type, any instance
    pub fn find_ie(&self, ie_type: IeType) -> Option<&Ie> {
        self.ies.iter().find(|ie| ie.ie_type == ie_type as u8)
    }

    /// Message length field value: everything after the first 4 header bytes
    fn calculate_length(&self) -> usize {
        let mut length = if self.header.teid_presence { 8 } else { 4 };
        for ie in &self.ies {
            length += ie.encoded_len();
        }
        length
    }

    /// Marshal the message to wire bytes
    pub fn marshal(&self) -> Gtp2cResult<Bytes> {
        let length = self.calculate_length();
        if length > u16::MAX as usize {
            return Err(Gtp2cError::MessageTooLarge {
                len: length + 4,
            });
        }

        let mut buf = BytesMut::with_capacity(length + 4);
        let mut header = self.header.clone();
        header.length = length as u16;
        header.encode(&mut buf);

        for ie in &self.ies {
            ie.encode(&mut buf);
        }
        Ok(buf.freeze())
    }

    /// Parse a message from wire bytes
    pub fn parse(raw: &[u8]) -> Gtp2cResult<Self> {
        let mut buf = Bytes::copy_from_slice(raw);
        let header = Header::decode(&mut buf)?;

        let header_extra = header.header_len() - 4;
        let payload_len = (header.length as usize).checked_sub(header_extra).ok_or_else(|| {
            Gtp2cError::InvalidFormat(format!(
                "message length {} shorter than header remainder {header_extra}",
                header.length
            ))
        })?;

        if buf.remaining() < payload_len {
            return Err(Gtp2cError::BufferTooShort {
                needed: payload_len,
                available: buf.remaining(),
            });
        }

        let mut msg = Self::new(header);
        let mut remaining = payload_len;
        while remaining > 0 {
            let before = buf.remaining();
            let ie = Ie::decode(&mut buf)?;
            remaining = remaining.saturating_sub(before - buf.remaining());
            msg.ies.push(ie);
        }
        Ok(msg)
    }
}

/// Create Session Request with canonical IE slots.
///
/// IEs handed to [`CreateSessionRequest::new`] are bucketed by type (and
/// instance for F-TEID and Bearer Context), so marshaling always emits them
/// in the same order. Unrecognized IEs keep their arrival order at the end.
#[derive(Debug, Clone, Default)]
pub struct CreateSessionRequest {
    pub teid: u32,
    pub sequence: u32,
    pub imsi: Option<Ie>,
    pub msisdn: Option<Ie>,
    pub mei: Option<Ie>,
    pub uli: Option<Ie>,
    pub serving_network: Option<Ie>,
    pub rat_type: Option<Ie>,
    pub indication: Option<Ie>,
    pub sender_fteid: Option<Ie>,
    pub pgw_s5s8_fteid: Option<Ie>,
    pub apn: Option<Ie>,
    pub selection_mode: Option<Ie>,
    pub pdn_type: Option<Ie>,
    pub paa: Option<Ie>,
    pub apn_restriction: Option<Ie>,
    pub ambr: Option<Ie>,
    pub linked_ebi: Option<Ie>,
    pub bearer_contexts_to_be_created: Option<Ie>,
    pub bearer_contexts_to_be_removed: Option<Ie>,
    pub recovery: Option<Ie>,
    pub additional_ies: Vec<Ie>,
}

impl CreateSessionRequest {
    /// Bucket the given IEs into their slots
    pub fn new(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        let mut req = Self {
            teid,
            sequence,
            ..Default::default()
        };

        for ie in ies {
            match IeType::try_from(ie.ie_type) {
                Ok(IeType::Imsi) => req.imsi = Some(ie),
                Ok(IeType::Msisdn) => req.msisdn = Some(ie),
                Ok(IeType::Mei) => req.mei = Some(ie),
                Ok(IeType::Uli) => req.uli = Some(ie),
                Ok(IeType::ServingNetwork) => req.serving_network = Some(ie),
                Ok(IeType::RatType) => req.rat_type = Some(ie),
                Ok(IeType::Indication) => req.indication = Some(ie),
                Ok(IeType::FTeid) => match ie.instance {
                    0 => req.sender_fteid = Some(ie),
                    1 => req.pgw_s5s8_fteid = Some(ie),
                    _ => req.additional_ies.push(ie),
                },
                Ok(IeType::Apn) => req.apn = Some(ie),
                Ok(IeType::SelectionMode) => req.selection_mode = Some(ie),
                Ok(IeType::PdnType) => req.pdn_type = Some(ie),
                Ok(IeType::Paa) => req.paa = Some(ie),
                Ok(IeType::ApnRestriction) => req.apn_restriction = Some(ie),
                Ok(IeType::Ambr) => req.ambr = Some(ie),
                Ok(IeType::Ebi) => req.linked_ebi = Some(ie),
                Ok(IeType::BearerContext) => match ie.instance {
                    0 => req.bearer_contexts_to_be_created = Some(ie),
                    1 => req.bearer_contexts_to_be_removed = Some(ie),
                    _ => req.additional_ies.push(ie),
                },
                Ok(IeType::Recovery) => req.recovery = Some(ie),
                _ => req.additional_ies.push(ie),
            }
        }
        req
    }

    /// Rebuild the typed view from a parsed message
    pub fn from_message(msg: &Message) -> Gtp2cResult<Self> {
        if msg.message_type() != MessageType::CreateSessionRequest as u8 {
            return Err(Gtp2cError::InvalidMessageType(msg.message_type()));
        }
        Ok(Self::new(msg.teid(), msg.sequence(), msg.ies.clone()))
    }

    /// Convert into a generic message with IEs in canonical order
    pub fn into_message(self) -> Message {
        let header = Header::new(
            MessageType::CreateSessionRequest as u8,
            self.teid,
            self.sequence,
        );
        let mut msg = Message::new(header);

        let slots = [
            self.imsi,
            self.msisdn,
            self.mei,
            self.uli,
            self.serving_network,
            self.rat_type,
            self.indication,
            self.sender_fteid,
            self.pgw_s5s8_fteid,
            self.apn,
            self.selection_mode,
            self.pdn_type,
            self.paa,
            self.apn_restriction,
            self.ambr,
            self.linked_ebi,
            self.bearer_contexts_to_be_created,
            self.bearer_contexts_to_be_removed,
            self.recovery,
        ];
        msg.ies.extend(slots.into_iter().flatten());
        msg.ies.extend(self.additional_ies);
        msg
    }

    /// Marshal to wire bytes
    pub fn marshal(self) -> Gtp2cResult<Bytes> {
        self.into_message().marshal()
    }
}

/// Modify Bearer Request
#[derive(Debug, Clone)]
pub struct ModifyBearerRequest {
    pub teid: u32,
    pub sequence: u32,
    pub ies: Vec<Ie>,
}

impl ModifyBearerRequest {
    pub fn new(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self {
            teid,
            sequence,
            ies,
        }
    }

    pub fn into_message(self) -> Message {
        let header = Header::new(
            MessageType::ModifyBearerRequest as u8,
            self.teid,
            self.sequence,
        );
        let mut msg = Message::new(header);
        msg.ies = self.ies;
        msg
    }
}

/// Delete Session Request
#[derive(Debug, Clone)]
pub struct DeleteSessionRequest {
    pub teid: u32,
    pub sequence: u32,
    pub ies: Vec<Ie>,
}

impl DeleteSessionRequest {
    pub fn new(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self {
            teid,
            sequence,
            ies,
        }
    }

    pub fn into_message(self) -> Message {
        let header = Header::new(
            MessageType::DeleteSessionRequest as u8,
            self.teid,
            self.sequence,
        );
        let mut msg = Message::new(header);
        msg.ies = self.ies;
        msg
    }
}

/// Delete Bearer Request
#[derive(Debug, Clone)]
pub struct DeleteBearerRequest {
    pub teid: u32,
    pub sequence: u32,
    pub ies: Vec<Ie>,
}

impl DeleteBearerRequest {
    pub fn new(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self {
            teid,
            sequence,
            ies,
        }
    }

    pub fn into_message(self) -> Message {
        let header = Header::new(
            MessageType::DeleteBearerRequest as u8,
            self.teid,
            self.sequence,
        );
        let mut msg = Message::new(header);
        msg.ies = self.ies;
        msg
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::types::{ApnRestriction, InterfaceType, PdnType, RatType, SelectionMode};

    #[test]
    fn test_echo_request_round_trip() {
        let mut msg = Message::echo_request(vec![Ie::recovery(42)]);
        msg.set_sequence(0x123456);
        let raw = msg.marshal().unwrap();

        let decoded = Message::parse(&raw).unwrap();
        assert_eq!(decoded.message_type(), MessageType::EchoRequest as u8);
        assert!(!decoded.header.teid_presence);
        assert_eq!(decoded.sequence(), 0x123456);
        assert_eq!(
            decoded
                .find_ie(IeType::Recovery)
                .unwrap()
                .restart_counter()
                .unwrap(),
            42
        );
    }

    #[test]
    fn test_version_not_supported_indication_empty() {
        let mut msg = Message::version_not_supported_indication();
        msg.set_sequence(0x000001);
        let raw = msg.marshal().unwrap();
        assert_eq!(raw.len(), 8);

        let decoded = Message::parse(&raw).unwrap();
        assert_eq!(
            decoded.message_type(),
            MessageType::VersionNotSupportedIndication as u8
        );
        assert!(decoded.ies.is_empty());
        assert_eq!(decoded.sequence(), 0x000001);
    }

    #[test]
    fn test_marshal_rejects_oversized_message() {
        let mut msg = Message::echo_request(Vec::new());
        msg.ies
            .push(Ie::from_slice(IeType::Indication as u8, 0, &vec![0u8; 70_000]));
        assert!(matches!(
            msg.marshal(),
            Err(Gtp2cError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_payload() {
        let mut msg = Message::echo_request(vec![Ie::recovery(1)]);
        msg.set_sequence(1);
        let raw = msg.marshal().unwrap();
        assert!(Message::parse(&raw[..raw.len() - 2]).is_err());
    }

    /// The serialized create-session vector: MME-to-SGW request with the
    /// full IE complement, byte-for-byte.
    #[test]
    fn test_create_session_request_wire_vector() {
        let ies = vec![
            Ie::imsi("123451234567890").unwrap(),
            Ie::msisdn("123450123456789").unwrap(),
            Ie::apn("some.apn.example"),
            Ie::fteid(
                InterfaceType::S11MmeGtpC as u8,
                0xffffffff,
                Some(Ipv4Addr::new(1, 1, 1, 1)),
                None,
            ),
            Ie::fteid(
                InterfaceType::S5S8PgwGtpC as u8,
                0xffffffff,
                Some(Ipv4Addr::new(1, 1, 1, 2)),
                None,
            )
            .with_instance(1),
            Ie::pdn_type(PdnType::Ipv4 as u8),
            Ie::ambr(0x11111111, 0x22222222),
            Ie::indication(&[0xa1, 0x08, 0x15, 0x10, 0x88, 0x81, 0x40]),
            Ie::bearer_context(vec![
                Ie::ebi(0x05),
                Ie::bearer_qos(
                    true,
                    2,
                    true,
                    0xff,
                    0x1111111111,
                    0x2222222222,
                    0x1111111111,
                    0x2222222222,
                ),
            ]),
            Ie::mei("123450123456789").unwrap(),
            Ie::serving_network("123", "45").unwrap(),
            Ie::paa_ipv4(Ipv4Addr::new(2, 2, 2, 2)),
            Ie::apn_restriction(ApnRestriction::Public1 as u8),
            Ie::uli_tai_ecgi("123", "45", 0x0001, 0x00000101).unwrap(),
            Ie::rat_type(RatType::Eutran as u8),
            Ie::selection_mode(SelectionMode::MsOrNetworkProvidedApnSubscribedVerified as u8),
        ];

        let raw = CreateSessionRequest::new(0x11223344, 0x000001, ies)
            .marshal()
            .unwrap();

        #[rustfmt::skip]
        let expected: &[u8] = &[
            // Header
            0x48, 0x20, 0x00, 0xca, 0x11, 0x22, 0x33, 0x44, 0x00, 0x00, 0x01, 0x00,
            // IMSI
            0x01, 0x00, 0x08, 0x00, 0x21, 0x43, 0x15, 0x32, 0x54, 0x76, 0x98, 0xf0,
            // MSISDN
            0x4c, 0x00, 0x08, 0x00, 0x21, 0x43, 0x05, 0x21, 0x43, 0x65, 0x87, 0xf9,
            // MEI
            0x4b, 0x00, 0x08, 0x00, 0x21, 0x43, 0x05, 0x21, 0x43, 0x65, 0x87, 0xf9,
            // ULI: TAI + ECGI
            0x56, 0x00, 0x0d, 0x00, 0x18,
            0x21, 0xf3, 0x54, 0x00, 0x01,
            0x21, 0xf3, 0x54, 0x00, 0x00, 0x01, 0x01,
            // ServingNetwork
            0x53, 0x00, 0x03, 0x00, 0x21, 0xf3, 0x54,
            // RATType
            0x52, 0x00, 0x01, 0x00, 0x06,
            // Indication
            0x4d, 0x00, 0x07, 0x00, 0xa1, 0x08, 0x15, 0x10, 0x88, 0x81, 0x40,
            // F-TEID S11 (instance 0)
            0x57, 0x00, 0x09, 0x00, 0x8a, 0xff, 0xff, 0xff, 0xff, 0x01, 0x01, 0x01, 0x01,
            // F-TEID S5/S8 (instance 1)
            0x57, 0x00, 0x09, 0x01, 0x87, 0xff, 0xff, 0xff, 0xff, 0x01, 0x01, 0x01, 0x02,
            // APN
            0x47, 0x00, 0x11, 0x00, 0x04, 0x73, 0x6f, 0x6d, 0x65, 0x03, 0x61, 0x70, 0x6e,
            0x07, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65,
            // SelectionMode
            0x80, 0x00, 0x01, 0x00, 0x00,
            // PDNType
            0x63, 0x00, 0x01, 0x00, 0x01,
            // PAA
            0x4f, 0x00, 0x05, 0x00, 0x01, 0x02, 0x02, 0x02, 0x02,
            // APNRestriction
            0x7f, 0x00, 0x01, 0x00, 0x01,
            // AMBR
            0x48, 0x00, 0x08, 0x00, 0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x22, 0x22,
            // BearerContext
            0x5d, 0x00, 0x1f, 0x00,
            //   EBI
            0x49, 0x00, 0x01, 0x00, 0x05,
            //   BearerQoS
            0x50, 0x00, 0x16, 0x00, 0x49, 0xff,
            0x11, 0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x22, 0x22, 0x22,
            0x11, 0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x22, 0x22, 0x22,
        ];

        assert_eq!(&raw[..], expected);
    }

    #[test]
    fn test_create_session_request_parse_back() {
        let ies = vec![
            Ie::imsi("123451234567890").unwrap(),
            Ie::fteid(
                InterfaceType::S11MmeGtpC as u8,
                0x00000001,
                Some(Ipv4Addr::new(1, 1, 1, 1)),
                None,
            ),
            Ie::fteid(
                InterfaceType::S5S8PgwGtpC as u8,
                0x00000002,
                Some(Ipv4Addr::new(1, 1, 1, 2)),
                None,
            )
            .with_instance(1),
        ];
        let raw = CreateSessionRequest::new(0x11223344, 0x000100, ies)
            .marshal()
            .unwrap();

        let msg = Message::parse(&raw).unwrap();
        assert_eq!(msg.teid(), 0x11223344);
        assert_eq!(msg.sequence(), 0x000100);

        let req = CreateSessionRequest::from_message(&msg).unwrap();
        assert_eq!(req.imsi.unwrap().imsi_str().unwrap(), "123451234567890");
        assert_eq!(req.sender_fteid.unwrap().teid().unwrap(), 1);
        assert_eq!(req.pgw_s5s8_fteid.unwrap().teid().unwrap(), 2);
    }

    #[test]
    fn test_delete_session_request_header() {
        let msg = DeleteSessionRequest::new(0xdeadbeef, 0, vec![Ie::ebi(5)]).into_message();
        assert_eq!(msg.message_type(), MessageType::DeleteSessionRequest as u8);
        assert_eq!(msg.teid(), 0xdeadbeef);
        assert_eq!(msg.ies.len(), 1);
    }
}
