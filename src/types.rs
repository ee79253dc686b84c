//! Protocol constants for GTPv2-C as specified in 3GPP TS 29.274.

use crate::error::Gtp2cError;

/// F-TEID Interface Types (TS 29.274 Section 8.22)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InterfaceType {
    S1USgwGtpU = 0,
    S1UEnodebGtpU = 1,
    S12RncGtpU = 2,
    S12SgwGtpU = 3,
    S5S8SgwGtpU = 4,
    S5S8PgwGtpU = 5,
    S5S8SgwGtpC = 6,
    S5S8PgwGtpC = 7,
    S5S8SgwPmipv6 = 8,
    S5S8PgwPmipv6 = 9,
    S11MmeGtpC = 10,
    S11S4SgwGtpC = 11,
    S10MmeGtpC = 12,
    S3MmeGtpC = 13,
    S3SgsnGtpC = 14,
    S4SgsnGtpU = 15,
    S4SgwGtpU = 16,
    S4SgsnGtpC = 17,
    S16SgsnGtpC = 18,
}

impl TryFrom<u8> for InterfaceType {
    type Error = Gtp2cError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::S1USgwGtpU),
            1 => Ok(Self::S1UEnodebGtpU),
            2 => Ok(Self::S12RncGtpU),
            3 => Ok(Self::S12SgwGtpU),
            4 => Ok(Self::S5S8SgwGtpU),
            5 => Ok(Self::S5S8PgwGtpU),
            6 => Ok(Self::S5S8SgwGtpC),
            7 => Ok(Self::S5S8PgwGtpC),
            8 => Ok(Self::S5S8SgwPmipv6),
            9 => Ok(Self::S5S8PgwPmipv6),
            10 => Ok(Self::S11MmeGtpC),
            11 => Ok(Self::S11S4SgwGtpC),
            12 => Ok(Self::S10MmeGtpC),
            13 => Ok(Self::S3MmeGtpC),
            14 => Ok(Self::S3SgsnGtpC),
            15 => Ok(Self::S4SgsnGtpU),
            16 => Ok(Self::S4SgwGtpU),
            17 => Ok(Self::S4SgsnGtpC),
            18 => Ok(Self::S16SgsnGtpC),
            _ => Err(Gtp2cError::InvalidFormat(format!(
                "unknown interface type: {value}"
            ))),
        }
    }
}

/// RAT Types (TS 29.274 Section 8.17)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RatType {
    Utran = 1,
    Geran = 2,
    Wlan = 3,
    Gan = 4,
    HspaEvolution = 5,
    Eutran = 6,
    Virtual = 7,
}

/// PDN Types (TS 29.274 Section 8.34)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PdnType {
    Ipv4 = 1,
    Ipv6 = 2,
    Ipv4v6 = 3,
    NonIp = 4,
}

/// APN Restriction values (TS 29.274 Section 8.57)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApnRestriction {
    NoExistingContextsOrRestriction = 0,
    Public1 = 1,
    Public2 = 2,
    Private1 = 3,
    Private2 = 4,
}

/// Selection Mode values (TS 29.274 Section 8.58)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SelectionMode {
    MsOrNetworkProvidedApnSubscribedVerified = 0,
    MsProvidedApnSubscriptionNotVerified = 1,
    NetworkProvidedApnSubscriptionNotVerified = 2,
}
