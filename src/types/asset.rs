//! Asset registry types

use alloy::primitives::Address;
use std::collections::BTreeMap;
use std::time::Duration;
use super::NetworkId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub symbol: String,
    pub decimals: u8,
    pub poll_interval: Duration,
    pub addresses: BTreeMap<NetworkId, Address>,
}

impl Asset {
    pub fn address_on(&self, network: &NetworkId) -> Option<Address> {
        self.addresses.get(network).copied()
    }

    pub fn is_listed_on(&self, network: &NetworkId) -> bool {
        self.addresses.contains_key(network)
    }
}
