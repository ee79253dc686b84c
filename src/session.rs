//! Session and Bearer identity model.
//!
//! A `Session` is the endpoint's view of one subscriber attachment: the
//! IMSI, the peer the session was negotiated with, and the TEIDs the peer
//! knows us by, keyed by interface type. Registry lookups on the connection
//! hand out clones; a mutated copy is re-registered with
//! `Conn::add_session`, which replaces by IMSI.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{Gtp2cError, Gtp2cResult};

/// Name of the bearer every session is created with.
pub const DEFAULT_BEARER_NAME: &str = "default";

/// A QoS-bearing logical channel belonging to a session.
#[derive(Debug, Clone, Default)]
pub struct Bearer {
    pub name: String,
    pub apn: String,
    /// EPS Bearer ID
    pub ebi: u8,
    /// ARP priority level
    pub priority_level: u8,
    /// QoS Class Identifier
    pub qci: u8,
    /// ARP preemption capability
    pub pci: bool,
    /// ARP preemption vulnerability
    pub pvi: bool,
    pub mbr_uplink: u64,
    pub mbr_downlink: u64,
    pub gbr_uplink: u64,
    pub gbr_downlink: u64,
}

impl Bearer {
    /// Create a named bearer with zeroed QoS
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// A subscriber session on the endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    pub imsi: String,
    pub msisdn: String,
    pub imei: String,
    pub mcc: String,
    pub mnc: String,
    pub rat_type: u8,
    peer_addr: SocketAddr,
    peer_addr_string: String,
    teid_map: HashMap<u8, u32>,
    active: bool,
    bearers: Vec<Bearer>,
}

impl Session {
    /// Create an inactive session toward the given peer, carrying the
    /// "default" bearer.
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            imsi: String::new(),
            msisdn: String::new(),
            imei: String::new(),
            mcc: String::new(),
            mnc: String::new(),
            rat_type: 0,
            peer_addr,
            peer_addr_string: peer_addr.to_string(),
            teid_map: HashMap::new(),
            active: false,
            bearers: vec![Bearer::new(DEFAULT_BEARER_NAME)],
        }
    }

    /// The remote address the session was negotiated with
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Canonical text form of the peer address, used for registry equality
    pub fn peer_addr_string(&self) -> &str {
        &self.peer_addr_string
    }

    /// Record the TEID the peer assigned for an interface type
    pub fn add_teid(&mut self, interface_type: u8, teid: u32) {
        self.teid_map.insert(interface_type, teid);
    }

    /// TEID registered under the given interface type
    pub fn teid(&self, interface_type: u8) -> Option<u32> {
        self.teid_map.get(&interface_type).copied()
    }

    /// Iterate over all (interface type, TEID) pairs
    pub fn teids(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.teid_map.iter().map(|(&it, &teid)| (it, teid))
    }

    /// Whether any interface type carries the given TEID
    pub fn has_teid(&self, teid: u32) -> bool {
        self.teid_map.values().any(|&t| t == teid)
    }

    /// Mark the session active. Sessions without an IMSI cannot be
    /// activated; the registry keys on it.
    pub fn activate(&mut self) -> Gtp2cResult<()> {
        if self.imsi.is_empty() {
            return Err(Gtp2cError::InvalidSession(
                "cannot activate session with empty IMSI".to_string(),
            ));
        }
        self.active = true;
        Ok(())
    }

    /// Mark the session inactive
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Whether the session counts toward session/bearer totals
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Add a bearer
    pub fn add_bearer(&mut self, bearer: Bearer) {
        self.bearers.push(bearer);
    }

    /// Number of bearers on the session
    pub fn bearer_count(&self) -> usize {
        self.bearers.len()
    }

    /// Bearer looked up by name
    pub fn bearer_by_name(&self, name: &str) -> Option<&Bearer> {
        self.bearers.iter().find(|b| b.name == name)
    }

    /// The "default" bearer
    pub fn default_bearer(&self) -> Option<&Bearer> {
        self.bearer_by_name(DEFAULT_BEARER_NAME)
    }

    /// Mutable access to the "default" bearer
    pub fn default_bearer_mut(&mut self) -> Option<&mut Bearer> {
        self.bearers.iter_mut().find(|b| b.name == DEFAULT_BEARER_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:2123".parse().unwrap()
    }

    #[test]
    fn test_new_session_has_default_bearer() {
        let sess = Session::new(peer());
        assert!(!sess.is_active());
        assert_eq!(sess.bearer_count(), 1);
        assert_eq!(sess.default_bearer().unwrap().name, DEFAULT_BEARER_NAME);
    }

    #[test]
    fn test_teid_map() {
        let mut sess = Session::new(peer());
        sess.add_teid(10, 0x11111111);
        sess.add_teid(7, 0x22222222);

        assert_eq!(sess.teid(10), Some(0x11111111));
        assert_eq!(sess.teid(7), Some(0x22222222));
        assert_eq!(sess.teid(6), None);
        assert!(sess.has_teid(0x22222222));
        assert!(!sess.has_teid(0x33333333));
        assert_eq!(sess.teids().count(), 2);
    }

    #[test]
    fn test_activation_requires_imsi() {
        let mut sess = Session::new(peer());
        assert!(sess.activate().is_err());

        sess.imsi = "001010123456789".to_string();
        sess.activate().unwrap();
        assert!(sess.is_active());

        sess.deactivate();
        assert!(!sess.is_active());
    }

    #[test]
    fn test_peer_addr_string() {
        let sess = Session::new(peer());
        assert_eq!(sess.peer_addr_string(), "127.0.0.1:2123");
    }
}
