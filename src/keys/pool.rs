// CLASSIFICATION: COMMUNITY
// Filename: pool.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-08-12

//! Randomized key pools.
//!
//! Key zero is the no-access value and the all-ones key is reserved by the
//! hardware, so a pool hands out `1..=max` only. Allocation order is
//! shuffled and released keys re-enter at a random position, so a key
//! freed by one tenant is not immediately handed to the next.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{FabricError, Result};

/// Pool of small keys with randomized allocation order.
#[derive(Debug)]
pub struct KeyPool {
    what: &'static str,
    free: Vec<u8>,
}

impl KeyPool {
    /// Pool over `1..=max`, shuffled.
    #[must_use]
    pub fn new(what: &'static str, max: u8) -> Self {
        let mut free: Vec<u8> = (1..=max).collect();
        free.shuffle(&mut rand::thread_rng());
        Self { what, free }
    }

    /// Take any free key.
    pub fn alloc(&mut self) -> Result<u8> {
        self.free.pop().ok_or(FabricError::Exhausted(self.what))
    }

    /// Take a specific key, failing if it is already out.
    pub fn claim(&mut self, key: u8) -> Result<()> {
        match self.free.iter().position(|k| *k == key) {
            Some(pos) => {
                self.free.remove(pos);
                Ok(())
            }
            None => Err(FabricError::Conflict {
                what: self.what,
                value: u64::from(key),
            }),
        }
    }

    /// Return a key at a random position in the free list.
    pub fn release(&mut self, key: u8) {
        if key == 0 || self.free.contains(&key) {
            return;
        }
        let at = rand::thread_rng().gen_range(0..=self.free.len());
        self.free.insert(at, key);
    }

    /// Number of keys still free.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pool_covers_range_exactly_once() {
        let mut pool = KeyPool::new("test key", 62);
        let mut seen = HashSet::new();
        for _ in 0..62 {
            let k = pool.alloc().expect("alloc");
            assert!((1..=62).contains(&k));
            assert!(seen.insert(k));
        }
        assert_eq!(pool.alloc(), Err(FabricError::Exhausted("test key")));
    }

    #[test]
    fn claim_conflicts_once_taken() {
        let mut pool = KeyPool::new("test key", 8);
        pool.claim(5).expect("first claim");
        assert_eq!(
            pool.claim(5),
            Err(FabricError::Conflict {
                what: "test key",
                value: 5,
            })
        );
        pool.release(5);
        pool.claim(5).expect("claim after release");
    }

    #[test]
    fn release_is_idempotent() {
        let mut pool = KeyPool::new("test key", 4);
        pool.claim(2).expect("claim");
        pool.release(2);
        pool.release(2);
        assert_eq!(pool.remaining(), 4);
        pool.release(0);
        assert_eq!(pool.remaining(), 4);
    }
}
