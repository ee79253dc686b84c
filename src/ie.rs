//! GTPv2-C Information Elements
//!
//! Generic TLV encoding/decoding plus typed constructors and accessors for
//! the IEs the endpoint extracts or emits. Value layouts follow
//! 3GPP TS 29.274 Section 8.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Gtp2cError, Gtp2cResult};

/// GTPv2-C IE type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IeType {
    Imsi = 1,
    Cause = 2,
    Recovery = 3,
    Apn = 71,
    Ambr = 72,
    Ebi = 73,
    Mei = 75,
    Msisdn = 76,
    Indication = 77,
    Paa = 79,
    BearerQos = 80,
    RatType = 82,
    ServingNetwork = 83,
    BearerTft = 84,
    Uli = 86,
    FTeid = 87,
    BearerContext = 93,
    PdnType = 99,
    ApnRestriction = 127,
    SelectionMode = 128,
}

impl TryFrom<u8> for IeType {
    type Error = Gtp2cError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Imsi),
            2 => Ok(Self::Cause),
            3 => Ok(Self::Recovery),
            71 => Ok(Self::Apn),
            72 => Ok(Self::Ambr),
            73 => Ok(Self::Ebi),
            75 => Ok(Self::Mei),
            76 => Ok(Self::Msisdn),
            77 => Ok(Self::Indication),
            79 => Ok(Self::Paa),
            80 => Ok(Self::BearerQos),
            82 => Ok(Self::RatType),
            83 => Ok(Self::ServingNetwork),
            84 => Ok(Self::BearerTft),
            86 => Ok(Self::Uli),
            87 => Ok(Self::FTeid),
            93 => Ok(Self::BearerContext),
            99 => Ok(Self::PdnType),
            127 => Ok(Self::ApnRestriction),
            128 => Ok(Self::SelectionMode),
            _ => Err(Gtp2cError::InvalidFormat(format!(
                "unknown IE type: {value}"
            ))),
        }
    }
}

/// ULI part-presence flags
const ULI_FLAG_TAI: u8 = 0x08;
const ULI_FLAG_ECGI: u8 = 0x10;

/// Generic GTPv2-C Information Element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ie {
    /// IE Type
    pub ie_type: u8,
    /// IE Instance (4 bits)
    pub instance: u8,
    /// IE Value (raw bytes)
    pub payload: Bytes,
}

impl Ie {
    /// Create a new IE
    pub fn new(ie_type: u8, instance: u8, payload: Bytes) -> Self {
        Self {
            ie_type,
            instance: instance & 0x0F,
            payload,
        }
    }

    /// Create a new IE from a byte slice
    pub fn from_slice(ie_type: u8, instance: u8, payload: &[u8]) -> Self {
        Self::new(ie_type, instance, Bytes::copy_from_slice(payload))
    }

    /// Return the same IE with the given instance value
    pub fn with_instance(mut self, instance: u8) -> Self {
        self.instance = instance & 0x0F;
        self
    }

    /// Encode IE to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.ie_type);
        buf.put_u16(self.payload.len() as u16);
        buf.put_u8(self.instance & 0x0F);
        buf.put_slice(&self.payload);
    }

    /// Decode IE from bytes
    pub fn decode(buf: &mut Bytes) -> Gtp2cResult<Self> {
        if buf.remaining() < 4 {
            return Err(Gtp2cError::BufferTooShort {
                needed: 4,
                available: buf.remaining(),
            });
        }

        let ie_type = buf.get_u8();
        let length = buf.get_u16() as usize;
        let instance = buf.get_u8() & 0x0F;

        if buf.remaining() < length {
            return Err(Gtp2cError::BufferTooShort {
                needed: length,
                available: buf.remaining(),
            });
        }

        let payload = buf.copy_to_bytes(length);
        Ok(Self {
            ie_type,
            instance,
            payload,
        })
    }

    /// Get encoded length: Type(1) + Length(2) + Instance(1) + Value
    pub fn encoded_len(&self) -> usize {
        4 + self.payload.len()
    }

    // ------------------------------------------------------------------
    // Typed constructors
    // ------------------------------------------------------------------

    /// IMSI IE from a decimal digit string (up to 15 digits, TBCD)
    pub fn imsi(digits: &str) -> Gtp2cResult<Self> {
        Ok(Self::new(IeType::Imsi as u8, 0, tbcd_encode(digits)?.into()))
    }

    /// MSISDN IE from a decimal digit string (TBCD)
    pub fn msisdn(digits: &str) -> Gtp2cResult<Self> {
        Ok(Self::new(
            IeType::Msisdn as u8,
            0,
            tbcd_encode(digits)?.into(),
        ))
    }

    /// Mobile Equipment Identity IE from a decimal digit string (TBCD)
    pub fn mei(digits: &str) -> Gtp2cResult<Self> {
        Ok(Self::new(IeType::Mei as u8, 0, tbcd_encode(digits)?.into()))
    }

    /// Recovery IE carrying a restart counter
    pub fn recovery(restart_counter: u8) -> Self {
        Self::from_slice(IeType::Recovery as u8, 0, &[restart_counter])
    }

    /// Access Point Name IE from a dot-separated FQDN
    pub fn apn(apn: &str) -> Self {
        let mut encoded = Vec::with_capacity(apn.len() + 1);
        for label in apn.split('.') {
            encoded.push(label.len() as u8);
            encoded.extend_from_slice(label.as_bytes());
        }
        Self::new(IeType::Apn as u8, 0, encoded.into())
    }

    /// Aggregate Maximum Bit Rate IE
    pub fn ambr(uplink: u32, downlink: u32) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32(uplink);
        buf.put_u32(downlink);
        Self::new(IeType::Ambr as u8, 0, buf.freeze())
    }

    /// EPS Bearer ID IE
    pub fn ebi(ebi: u8) -> Self {
        Self::from_slice(IeType::Ebi as u8, 0, &[ebi & 0x0F])
    }

    /// Indication IE from raw flag octets
    pub fn indication(octets: &[u8]) -> Self {
        Self::from_slice(IeType::Indication as u8, 0, octets)
    }

    /// PDN Address Allocation IE carrying an IPv4 address
    pub fn paa_ipv4(addr: Ipv4Addr) -> Self {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u8(crate::types::PdnType::Ipv4 as u8);
        buf.put_slice(&addr.octets());
        Self::new(IeType::Paa as u8, 0, buf.freeze())
    }

    /// Bearer QoS IE: ARP (preemption capability, priority level,
    /// preemption vulnerability), QCI, and the four 40-bit bitrates.
    #[allow(clippy::too_many_arguments)]
    pub fn bearer_qos(
        pci: bool,
        priority_level: u8,
        pvi: bool,
        qci: u8,
        mbr_uplink: u64,
        mbr_downlink: u64,
        gbr_uplink: u64,
        gbr_downlink: u64,
    ) -> Self {
        let mut buf = BytesMut::with_capacity(22);

        let mut arp = 0u8;
        if pci {
            arp |= 0x40;
        }
        arp |= (priority_level & 0x0F) << 2;
        if pvi {
            arp |= 0x01;
        }
        buf.put_u8(arp);
        buf.put_u8(qci);

        // bitrates are 40 bits each
        buf.put_slice(&mbr_uplink.to_be_bytes()[3..8]);
        buf.put_slice(&mbr_downlink.to_be_bytes()[3..8]);
        buf.put_slice(&gbr_uplink.to_be_bytes()[3..8]);
        buf.put_slice(&gbr_downlink.to_be_bytes()[3..8]);

        Self::new(IeType::BearerQos as u8, 0, buf.freeze())
    }

    /// RAT Type IE
    pub fn rat_type(rat_type: u8) -> Self {
        Self::from_slice(IeType::RatType as u8, 0, &[rat_type])
    }

    /// Serving Network IE from MCC and MNC digit strings
    pub fn serving_network(mcc: &str, mnc: &str) -> Gtp2cResult<Self> {
        Ok(Self::new(
            IeType::ServingNetwork as u8,
            0,
            plmn_encode(mcc, mnc)?.to_vec().into(),
        ))
    }

    /// User Location Information IE with TAI and ECGI parts
    pub fn uli_tai_ecgi(mcc: &str, mnc: &str, tac: u16, eci: u32) -> Gtp2cResult<Self> {
        let plmn = plmn_encode(mcc, mnc)?;
        let mut buf = BytesMut::with_capacity(13);
        buf.put_u8(ULI_FLAG_TAI | ULI_FLAG_ECGI);
        // TAI: PLMN + TAC
        buf.put_slice(&plmn);
        buf.put_u16(tac);
        // ECGI: PLMN + spare nibble + 28-bit ECI
        buf.put_slice(&plmn);
        buf.put_u32(eci & 0x0FFF_FFFF);
        Ok(Self::new(IeType::Uli as u8, 0, buf.freeze()))
    }

    /// Fully Qualified TEID IE
    pub fn fteid(
        interface_type: u8,
        teid: u32,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Self {
        let mut flags = interface_type & 0x3F;
        if ipv4.is_some() {
            flags |= 0x80;
        }
        if ipv6.is_some() {
            flags |= 0x40;
        }

        let mut buf = BytesMut::with_capacity(25);
        buf.put_u8(flags);
        buf.put_u32(teid);
        if let Some(addr) = ipv4 {
            buf.put_slice(&addr.octets());
        }
        if let Some(addr) = ipv6 {
            buf.put_slice(&addr.octets());
        }
        Self::new(IeType::FTeid as u8, 0, buf.freeze())
    }

    /// Grouped Bearer Context IE from child IEs
    pub fn bearer_context(children: Vec<Ie>) -> Self {
        let mut buf = BytesMut::new();
        for child in &children {
            child.encode(&mut buf);
        }
        Self::new(IeType::BearerContext as u8, 0, buf.freeze())
    }

    /// PDN Type IE
    pub fn pdn_type(pdn_type: u8) -> Self {
        Self::from_slice(IeType::PdnType as u8, 0, &[pdn_type & 0x07])
    }

    /// APN Restriction IE
    pub fn apn_restriction(restriction: u8) -> Self {
        Self::from_slice(IeType::ApnRestriction as u8, 0, &[restriction])
    }

    /// Selection Mode IE
    pub fn selection_mode(mode: u8) -> Self {
        Self::from_slice(IeType::SelectionMode as u8, 0, &[mode & 0x03])
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    fn require(&self, len: usize) -> Gtp2cResult<()> {
        if self.payload.len() < len {
            return Err(Gtp2cError::BufferTooShort {
                needed: len,
                available: self.payload.len(),
            });
        }
        Ok(())
    }

    /// IMSI digit string (TBCD decode)
    pub fn imsi_str(&self) -> Gtp2cResult<String> {
        self.require(1)?;
        Ok(tbcd_decode(&self.payload))
    }

    /// MSISDN digit string (TBCD decode)
    pub fn msisdn_str(&self) -> Gtp2cResult<String> {
        self.require(1)?;
        Ok(tbcd_decode(&self.payload))
    }

    /// Mobile Equipment Identity digit string (TBCD decode)
    pub fn mei_str(&self) -> Gtp2cResult<String> {
        self.require(1)?;
        Ok(tbcd_decode(&self.payload))
    }

    /// Restart counter from a Recovery IE
    pub fn restart_counter(&self) -> Gtp2cResult<u8> {
        self.require(1)?;
        Ok(self.payload[0])
    }

    /// Dot-separated APN string
    pub fn apn_str(&self) -> Gtp2cResult<String> {
        let mut labels = Vec::new();
        let mut i = 0;
        while i < self.payload.len() {
            let len = self.payload[i] as usize;
            if i + 1 + len > self.payload.len() {
                return Err(Gtp2cError::InvalidFormat(
                    "truncated APN label".to_string(),
                ));
            }
            labels.push(
                std::str::from_utf8(&self.payload[i + 1..i + 1 + len])
                    .map_err(|_| Gtp2cError::InvalidFormat("non-UTF8 APN label".to_string()))?
                    .to_string(),
            );
            i += 1 + len;
        }
        Ok(labels.join("."))
    }

    /// RAT type octet
    pub fn rat_type_value(&self) -> Gtp2cResult<u8> {
        self.require(1)?;
        Ok(self.payload[0])
    }

    /// MCC digit string from a Serving Network IE
    pub fn mcc(&self) -> Gtp2cResult<String> {
        self.require(3)?;
        let (mcc, _) = plmn_decode([self.payload[0], self.payload[1], self.payload[2]]);
        Ok(mcc)
    }

    /// MNC digit string from a Serving Network IE
    pub fn mnc(&self) -> Gtp2cResult<String> {
        self.require(3)?;
        let (_, mnc) = plmn_decode([self.payload[0], self.payload[1], self.payload[2]]);
        Ok(mnc)
    }

    /// Interface type from an F-TEID IE
    pub fn interface_type(&self) -> Gtp2cResult<u8> {
        self.require(1)?;
        Ok(self.payload[0] & 0x3F)
    }

    /// TEID from an F-TEID IE
    pub fn teid(&self) -> Gtp2cResult<u32> {
        self.require(5)?;
        Ok(u32::from_be_bytes([
            self.payload[1],
            self.payload[2],
            self.payload[3],
            self.payload[4],
        ]))
    }

    /// IPv4 address from an F-TEID IE, if the V4 flag is set
    pub fn fteid_ipv4(&self) -> Gtp2cResult<Option<Ipv4Addr>> {
        self.require(5)?;
        if self.payload[0] & 0x80 == 0 {
            return Ok(None);
        }
        self.require(9)?;
        Ok(Some(Ipv4Addr::new(
            self.payload[5],
            self.payload[6],
            self.payload[7],
            self.payload[8],
        )))
    }

    /// EPS Bearer ID
    pub fn ebi_value(&self) -> Gtp2cResult<u8> {
        self.require(1)?;
        Ok(self.payload[0] & 0x0F)
    }

    /// ARP priority level from a Bearer QoS IE
    pub fn priority_level(&self) -> Gtp2cResult<u8> {
        self.require(1)?;
        Ok((self.payload[0] >> 2) & 0x0F)
    }

    /// QCI from a Bearer QoS IE
    pub fn qci(&self) -> Gtp2cResult<u8> {
        self.require(2)?;
        Ok(self.payload[1])
    }

    /// ARP preemption capability flag from a Bearer QoS IE
    pub fn preemption_capability(&self) -> Gtp2cResult<bool> {
        self.require(1)?;
        Ok(self.payload[0] & 0x40 != 0)
    }

    /// ARP preemption vulnerability flag from a Bearer QoS IE
    pub fn preemption_vulnerability(&self) -> Gtp2cResult<bool> {
        self.require(1)?;
        Ok(self.payload[0] & 0x01 != 0)
    }

    fn bitrate_at(&self, offset: usize) -> Gtp2cResult<u64> {
        self.require(offset + 5)?;
        let b = &self.payload[offset..offset + 5];
        Ok(u64::from_be_bytes([0, 0, 0, b[0], b[1], b[2], b[3], b[4]]))
    }

    /// MBR for uplink from a Bearer QoS IE
    pub fn mbr_uplink(&self) -> Gtp2cResult<u64> {
        self.bitrate_at(2)
    }

    /// MBR for downlink from a Bearer QoS IE
    pub fn mbr_downlink(&self) -> Gtp2cResult<u64> {
        self.bitrate_at(7)
    }

    /// GBR for uplink from a Bearer QoS IE
    pub fn gbr_uplink(&self) -> Gtp2cResult<u64> {
        self.bitrate_at(12)
    }

    /// GBR for downlink from a Bearer QoS IE
    pub fn gbr_downlink(&self) -> Gtp2cResult<u64> {
        self.bitrate_at(17)
    }

    /// Decode the payload of a grouped IE as a child IE list
    pub fn child_ies(&self) -> Gtp2cResult<Vec<Ie>> {
        let mut buf = self.payload.clone();
        let mut children = Vec::new();
        while buf.remaining() > 0 {
            children.push(Ie::decode(&mut buf)?);
        }
        Ok(children)
    }
}

/// TBCD-encode a decimal digit string: swapped nibbles, 0xF filler on odd
/// length.
fn tbcd_encode(digits: &str) -> Gtp2cResult<Vec<u8>> {
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    let bytes = digits.as_bytes();
    for pair in bytes.chunks(2) {
        let lo = tbcd_digit(pair[0])?;
        let hi = if pair.len() == 2 {
            tbcd_digit(pair[1])?
        } else {
            0x0F
        };
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn tbcd_digit(b: u8) -> Gtp2cResult<u8> {
    if b.is_ascii_digit() {
        Ok(b - b'0')
    } else {
        Err(Gtp2cError::InvalidFormat(format!(
            "non-digit in TBCD string: {}",
            b as char
        )))
    }
}

/// Decode a TBCD byte string into decimal digits, dropping the filler.
fn tbcd_decode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        let lo = b & 0x0F;
        let hi = b >> 4;
        if lo <= 9 {
            out.push((b'0' + lo) as char);
        }
        if hi <= 9 {
            out.push((b'0' + hi) as char);
        }
    }
    out
}

/// Encode MCC/MNC digit strings into the 3-octet PLMN identity. A 2-digit
/// MNC gets the 0xF filler in the third-digit nibble.
fn plmn_encode(mcc: &str, mnc: &str) -> Gtp2cResult<[u8; 3]> {
    let m = mcc.as_bytes();
    let n = mnc.as_bytes();
    if m.len() != 3 || (n.len() != 2 && n.len() != 3) {
        return Err(Gtp2cError::InvalidFormat(format!(
            "invalid PLMN: mcc={mcc} mnc={mnc}"
        )));
    }

    let mcc1 = tbcd_digit(m[0])?;
    let mcc2 = tbcd_digit(m[1])?;
    let mcc3 = tbcd_digit(m[2])?;
    let mnc1 = tbcd_digit(n[0])?;
    let mnc2 = tbcd_digit(n[1])?;
    let mnc3 = if n.len() == 3 {
        tbcd_digit(n[2])?
    } else {
        0x0F
    };

    Ok([
        (mcc2 << 4) | mcc1,
        (mnc3 << 4) | mcc3,
        (mnc2 << 4) | mnc1,
    ])
}

/// Decode a 3-octet PLMN identity into MCC/MNC digit strings.
fn plmn_decode(plmn: [u8; 3]) -> (String, String) {
    let digit = |d: u8| (b'0' + d) as char;

    let mut mcc = String::with_capacity(3);
    mcc.push(digit(plmn[0] & 0x0F));
    mcc.push(digit(plmn[0] >> 4));
    mcc.push(digit(plmn[1] & 0x0F));

    let mut mnc = String::with_capacity(3);
    mnc.push(digit(plmn[2] & 0x0F));
    mnc.push(digit(plmn[2] >> 4));
    if plmn[1] >> 4 != 0x0F {
        mnc.push(digit(plmn[1] >> 4));
    }
    (mcc, mnc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_ie_encode_decode() {
        let ie = Ie::from_slice(IeType::Recovery as u8, 0, &[42]);
        let mut buf = BytesMut::new();
        ie.encode(&mut buf);

        let mut bytes = buf.freeze();
        let decoded = Ie::decode(&mut bytes).unwrap();

        assert_eq!(decoded.ie_type, IeType::Recovery as u8);
        assert_eq!(decoded.instance, 0);
        assert_eq!(decoded.payload[0], 42);
    }

    #[test]
    fn test_imsi_tbcd_bytes() {
        let ie = Ie::imsi("123451234567890").unwrap();
        assert_eq!(
            &ie.payload[..],
            &[0x21, 0x43, 0x15, 0x32, 0x54, 0x76, 0x98, 0xf0]
        );
        assert_eq!(ie.imsi_str().unwrap(), "123451234567890");
    }

    #[test]
    fn test_msisdn_tbcd_bytes() {
        let ie = Ie::msisdn("123450123456789").unwrap();
        assert_eq!(
            &ie.payload[..],
            &[0x21, 0x43, 0x05, 0x21, 0x43, 0x65, 0x87, 0xf9]
        );
        assert_eq!(ie.msisdn_str().unwrap(), "123450123456789");
    }

    #[test]
    fn test_tbcd_rejects_non_digits() {
        assert!(Ie::imsi("12345abc").is_err());
    }

    #[test]
    fn test_serving_network_plmn_bytes() {
        let ie = Ie::serving_network("123", "45").unwrap();
        assert_eq!(&ie.payload[..], &[0x21, 0xf3, 0x54]);
        assert_eq!(ie.mcc().unwrap(), "123");
        assert_eq!(ie.mnc().unwrap(), "45");
    }

    #[test]
    fn test_serving_network_three_digit_mnc() {
        let ie = Ie::serving_network("310", "410").unwrap();
        assert_eq!(ie.mcc().unwrap(), "310");
        assert_eq!(ie.mnc().unwrap(), "410");
    }

    #[test]
    fn test_apn_encode_decode() {
        let ie = Ie::apn("some.apn.example");
        assert_eq!(
            &ie.payload[..],
            &[
                0x04, b's', b'o', b'm', b'e', 0x03, b'a', b'p', b'n', 0x07, b'e', b'x', b'a',
                b'm', b'p', b'l', b'e'
            ]
        );
        assert_eq!(ie.apn_str().unwrap(), "some.apn.example");
    }

    #[test]
    fn test_fteid_round_trip() {
        let ie = Ie::fteid(10, 0xffffffff, Some(Ipv4Addr::new(1, 1, 1, 1)), None);
        assert_eq!(ie.payload[0], 0x8a);
        assert_eq!(ie.interface_type().unwrap(), 10);
        assert_eq!(ie.teid().unwrap(), 0xffffffff);
        assert_eq!(ie.fteid_ipv4().unwrap(), Some(Ipv4Addr::new(1, 1, 1, 1)));
    }

    #[test]
    fn test_bearer_qos_bytes_and_accessors() {
        let ie = Ie::bearer_qos(
            true,
            2,
            true,
            0xff,
            0x1111111111,
            0x2222222222,
            0x1111111111,
            0x2222222222,
        );
        assert_eq!(ie.payload[0], 0x49);
        assert_eq!(ie.payload[1], 0xff);
        assert_eq!(ie.payload.len(), 22);
        assert!(ie.preemption_capability().unwrap());
        assert!(ie.preemption_vulnerability().unwrap());
        assert_eq!(ie.priority_level().unwrap(), 2);
        assert_eq!(ie.qci().unwrap(), 0xff);
        assert_eq!(ie.mbr_uplink().unwrap(), 0x1111111111);
        assert_eq!(ie.mbr_downlink().unwrap(), 0x2222222222);
        assert_eq!(ie.gbr_uplink().unwrap(), 0x1111111111);
        assert_eq!(ie.gbr_downlink().unwrap(), 0x2222222222);
    }

    #[test]
    fn test_uli_tai_ecgi_bytes() {
        let ie = Ie::uli_tai_ecgi("123", "45", 0x0001, 0x00000101).unwrap();
        assert_eq!(
            &ie.payload[..],
            &[
                0x18, 0x21, 0xf3, 0x54, 0x00, 0x01, 0x21, 0xf3, 0x54, 0x00, 0x00, 0x01, 0x01
            ]
        );
    }

    #[test]
    fn test_bearer_context_children() {
        let bc = Ie::bearer_context(vec![
            Ie::ebi(5),
            Ie::bearer_qos(true, 2, true, 9, 0, 0, 0, 0),
        ]);
        let children = bc.child_ies().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].ie_type, IeType::Ebi as u8);
        assert_eq!(children[0].ebi_value().unwrap(), 5);
        assert_eq!(children[1].ie_type, IeType::BearerQos as u8);
    }

    #[test]
    fn test_with_instance() {
        let ie = Ie::fteid(7, 1, None, None).with_instance(1);
        assert_eq!(ie.instance, 1);
    }
}
