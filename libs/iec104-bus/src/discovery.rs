//! Neighbor address cache for lazy, one-shot discovery.
//!
//! A neighbor is represented as `(guid, cached address)`; once an
//! address is learned it is fixed for the process lifetime (§3 of the
//! specification this crate implements).

use dashmap::DashMap;
use std::net::SocketAddr;

#[derive(Debug, Default)]
pub struct NeighborTable {
    addresses: DashMap<u32, SocketAddr>,
}

impl NeighborTable {
    pub fn new() -> Self {
        NeighborTable::default()
    }

    pub fn resolve(&self, guid: u32, addr: SocketAddr) {
        self.addresses.entry(guid).or_insert(addr);
    }

    pub fn address_of(&self, guid: u32) -> Option<SocketAddr> {
        self.addresses.get(&guid).map(|entry| *entry.value())
    }

    pub fn is_resolved(&self, guid: u32) -> bool {
        self.addresses.contains_key(&guid)
    }

    /// Returns every expected guid from `all` that has no cached address yet.
    pub fn unresolved<'a>(&self, all: &'a [u32]) -> Vec<u32> {
        all.iter().copied().filter(|g| !self.is_resolved(*g)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_lazily_and_stays_fixed() {
        let table = NeighborTable::new();
        assert_eq!(table.unresolved(&[1, 2, 3]), vec![1, 2, 3]);

        let addr: SocketAddr = "127.0.0.1:20202".parse().unwrap();
        table.resolve(2, addr);
        assert_eq!(table.unresolved(&[1, 2, 3]), vec![1, 3]);
        assert_eq!(table.address_of(2), Some(addr));

        // re-resolving with a different address doesn't move it
        let other: SocketAddr = "127.0.0.1:30303".parse().unwrap();
        table.resolve(2, other);
        assert_eq!(table.address_of(2), Some(addr));
    }
}
