// CLASSIFICATION: COMMUNITY
// Filename: domain.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-12

//! Resource key domains.
//!
//! A domain is a key shared by a set of components for tagging memory
//! resources. Domains are deduplicated by membership: acquiring a domain
//! over a set that already has one returns the existing key with its
//! reference count bumped, so tenants asking for the same grouping do not
//! burn through the key space.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};

use crate::error::Result;
use crate::keys::pool::KeyPool;
use crate::lattice_types::ComponentId;

/// Largest assignable domain key; zero and all-ones stay reserved.
pub const MAX_RKEY: u8 = 62;

#[derive(Debug)]
struct Domain {
    members: BTreeSet<ComponentId>,
    refs: usize,
}

/// Allocated resource key domains, deduplicated by member set.
#[derive(Debug)]
pub struct DomainSet {
    pool: KeyPool,
    domains: HashMap<u8, Domain>,
}

impl Default for DomainSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainSet {
    /// Fresh set with the whole key range free.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: KeyPool::new("resource key domain", MAX_RKEY),
            domains: HashMap::new(),
        }
    }

    /// Key for `members`, reusing an existing domain with identical
    /// membership before allocating a new key.
    pub fn acquire(&mut self, members: BTreeSet<ComponentId>) -> Result<u8> {
        if let Some((key, domain)) = self
            .domains
            .iter_mut()
            .find(|(_, d)| d.members == members)
        {
            domain.refs += 1;
            debug!("rkey domain {key}: refs now {}", domain.refs);
            return Ok(*key);
        }
        let key = self.pool.alloc()?;
        info!("rkey domain {key}: created over {} member(s)", members.len());
        self.domains.insert(key, Domain { members, refs: 1 });
        Ok(key)
    }

    /// Drop one reference to `key`; the last one frees it. Releasing an
    /// unknown key is a no-op.
    pub fn release(&mut self, key: u8) -> bool {
        let Some(domain) = self.domains.get_mut(&key) else {
            debug!("rkey domain {key}: release of unknown domain ignored");
            return false;
        };
        domain.refs -= 1;
        if domain.refs == 0 {
            self.domains.remove(&key);
            self.pool.release(key);
            info!("rkey domain {key}: destroyed");
        }
        true
    }

    /// Members of a live domain.
    #[must_use]
    pub fn members(&self, key: u8) -> Option<&BTreeSet<ComponentId>> {
        self.domains.get(&key).map(|d| &d.members)
    }

    /// Iterate live domains.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &BTreeSet<ComponentId>)> {
        self.domains.iter().map(|(k, d)| (*k, &d.members))
    }

    /// Number of live domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether no domain is allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[usize]) -> BTreeSet<ComponentId> {
        ids.iter().map(|i| ComponentId(*i)).collect()
    }

    #[test]
    fn identical_membership_reuses_the_key() {
        let mut set = DomainSet::new();
        let a = set.acquire(members(&[1, 2, 3])).expect("acquire");
        let b = set.acquire(members(&[3, 2, 1])).expect("re-acquire");
        assert_eq!(a, b);
        assert_eq!(set.len(), 1);
        let c = set.acquire(members(&[1, 2])).expect("distinct");
        assert_ne!(a, c);
    }

    #[test]
    fn domain_survives_until_last_release() {
        let mut set = DomainSet::new();
        let key = set.acquire(members(&[4, 5])).expect("acquire");
        set.acquire(members(&[4, 5])).expect("re-acquire");
        assert!(set.release(key));
        assert!(set.members(key).is_some());
        assert!(set.release(key));
        assert!(set.members(key).is_none());
        assert!(!set.release(key));
    }

    #[test]
    fn exhaustion_reports_the_resource() {
        let mut set = DomainSet::new();
        for i in 0..usize::from(MAX_RKEY) {
            set.acquire(members(&[i])).expect("acquire");
        }
        assert_eq!(
            set.acquire(members(&[usize::from(MAX_RKEY) + 7])),
            Err(crate::error::FabricError::Exhausted("resource key domain"))
        );
    }
}
