//! GTPv2-C Header
//!
//! Header structure as specified in 3GPP TS 29.274 Section 5.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Gtp2cError, Gtp2cResult};

/// GTPv2-C header length (with TEID)
pub const HEADER_LEN: usize = 12;

/// GTPv2-C header length (without TEID)
pub const HEADER_LEN_NO_TEID: usize = 8;

/// GTP version carried in the header flags
pub const GTP_VERSION_2: u8 = 2;

/// Message types the endpoint knows how to build or dispatch by default.
///
/// Dispatch itself is keyed by the raw `u8`, so unknown types are still
/// received and handed to user-registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    EchoRequest = 1,
    EchoResponse = 2,
    VersionNotSupportedIndication = 3,
    CreateSessionRequest = 32,
    CreateSessionResponse = 33,
    ModifyBearerRequest = 34,
    ModifyBearerResponse = 35,
    DeleteSessionRequest = 36,
    DeleteSessionResponse = 37,
    DeleteBearerRequest = 99,
    DeleteBearerResponse = 100,
}

impl TryFrom<u8> for MessageType {
    type Error = Gtp2cError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::EchoRequest),
            2 => Ok(Self::EchoResponse),
            3 => Ok(Self::VersionNotSupportedIndication),
            32 => Ok(Self::CreateSessionRequest),
            33 => Ok(Self::CreateSessionResponse),
            34 => Ok(Self::ModifyBearerRequest),
            35 => Ok(Self::ModifyBearerResponse),
            36 => Ok(Self::DeleteSessionRequest),
            37 => Ok(Self::DeleteSessionResponse),
            99 => Ok(Self::DeleteBearerRequest),
            100 => Ok(Self::DeleteBearerResponse),
            _ => Err(Gtp2cError::InvalidMessageType(value)),
        }
    }
}

/// Human-readable name for a message type code, used in diagnostics.
pub fn message_type_name(msg_type: u8) -> String {
    match MessageType::try_from(msg_type) {
        Ok(MessageType::EchoRequest) => "Echo Request".to_string(),
        Ok(MessageType::EchoResponse) => "Echo Response".to_string(),
        Ok(MessageType::VersionNotSupportedIndication) => {
            "Version Not Supported Indication".to_string()
        }
        Ok(MessageType::CreateSessionRequest) => "Create Session Request".to_string(),
        Ok(MessageType::CreateSessionResponse) => "Create Session Response".to_string(),
        Ok(MessageType::ModifyBearerRequest) => "Modify Bearer Request".to_string(),
        Ok(MessageType::ModifyBearerResponse) => "Modify Bearer Response".to_string(),
        Ok(MessageType::DeleteSessionRequest) => "Delete Session Request".to_string(),
        Ok(MessageType::DeleteSessionResponse) => "Delete Session Response".to_string(),
        Ok(MessageType::DeleteBearerRequest) => "Delete Bearer Request".to_string(),
        Ok(MessageType::DeleteBearerResponse) => "Delete Bearer Response".to_string(),
        Err(_) => format!("Unknown ({msg_type})"),
    }
}

/// GTPv2-C Header
///
/// The version field is recorded as received; rejecting non-v2 traffic is
/// the job of the connection's validation stage, which must be able to see
/// the offending version and mirror the sequence number back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Version (3 bits), 2 for GTPv2
    pub version: u8,
    /// Piggybacked flag (1 bit)
    pub piggybacked: bool,
    /// TEID presence flag (1 bit)
    pub teid_presence: bool,
    /// Message Type
    pub message_type: u8,
    /// Message Length (excluding the first 4 bytes of the header)
    pub length: u16,
    /// Tunnel Endpoint Identifier, present if teid_presence is set
    pub teid: Option<u32>,
    /// Sequence Number (24 bits)
    pub sequence: u32,
}

impl Header {
    /// Create a new header with TEID
    pub fn new(message_type: u8, teid: u32, sequence: u32) -> Self {
        Self {
            version: GTP_VERSION_2,
            piggybacked: false,
            teid_presence: true,
            message_type,
            length: 0,
            teid: Some(teid),
            sequence,
        }
    }

    /// Create a new header without TEID
    pub fn new_no_teid(message_type: u8, sequence: u32) -> Self {
        Self {
            version: GTP_VERSION_2,
            piggybacked: false,
            teid_presence: false,
            message_type,
            length: 0,
            teid: None,
            sequence,
        }
    }

    /// Get the flags byte
    pub fn flags(&self) -> u8 {
        let mut flags = (self.version & 0x07) << 5;
        if self.piggybacked {
            flags |= 0x10;
        }
        if self.teid_presence {
            flags |= 0x08;
        }
        flags
    }

    /// Get header length on the wire
    pub fn header_len(&self) -> usize {
        if self.teid_presence {
            HEADER_LEN
        } else {
            HEADER_LEN_NO_TEID
        }
    }

    /// Encode header to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags());
        buf.put_u8(self.message_type);
        buf.put_u16(self.length);

        if self.teid_presence {
            buf.put_u32(self.teid.unwrap_or(0));
        }

        // Sequence number (24 bits) + spare (8 bits)
        buf.put_u32(self.sequence << 8);
    }

    /// Decode header from bytes
    pub fn decode(buf: &mut Bytes) -> Gtp2cResult<Self> {
        if buf.remaining() < 4 {
            return Err(Gtp2cError::BufferTooShort {
                needed: 4,
                available: buf.remaining(),
            });
        }

        let flags = buf.get_u8();
        let version = (flags >> 5) & 0x07;
        let piggybacked = (flags & 0x10) != 0;
        let teid_presence = (flags & 0x08) != 0;

        let message_type = buf.get_u8();
        let length = buf.get_u16();

        let min_remaining = if teid_presence { 8 } else { 4 };
        if buf.remaining() < min_remaining {
            return Err(Gtp2cError::BufferTooShort {
                needed: min_remaining,
                available: buf.remaining(),
            });
        }

        let teid = if teid_presence {
            Some(buf.get_u32())
        } else {
            None
        };

        // Sequence number lives in the upper 24 bits of the trailing word
        let sqn_raw = buf.get_u32();
        let sequence = sqn_raw >> 8;

        Ok(Self {
            version,
            piggybacked,
            teid_presence,
            message_type,
            length,
            teid,
            sequence,
        })
    }
}
