// CLASSIFICATION: COMMUNITY
// Filename: partition.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-08-23

//! Access-key partitions.
//!
//! A partition is a set of components allowed to talk to each other under
//! one access key. Hardware enforcement is a per-component access table
//! indexed by peer component id; a pair may communicate when each side's
//! row for the other is valid and carries the partition key. Membership
//! changes program only the delta pairs: adding the n-th member touches
//! `2*(n-1)` rows, never the whole mesh.
//!
//! Like resource key domains, partitions are deduplicated by membership:
//! creating a partition over a set that already has one returns the
//! existing key with its reference count bumped, and only the last destroy
//! tears the grants down.

use std::collections::HashMap;

use ctlspace_codec::AccessTableRow;
use log::{debug, info, warn};

use crate::error::{FabricError, Result};
use crate::hw::{write_range, write_verified, ControlSpace, CtlAddr, StructSel};
use crate::keys::pool::KeyPool;
use crate::lattice_types::Gcid;

/// Largest assignable access key; zero and all-ones stay reserved.
pub const MAX_AKEY: u8 = 62;

/// Byte offset of the access-table row gating peer `cid`.
#[must_use]
pub fn access_row_offset(cid: u16) -> usize {
    AccessTableRow::ROW_BYTES * (1 + usize::from(cid))
}

#[derive(Debug)]
struct Partition {
    members: Vec<Gcid>,
    refs: usize,
}

/// Live partitions keyed by access key, deduplicated by member set.
#[derive(Debug)]
pub struct Partitions {
    pool: KeyPool,
    parts: HashMap<u8, Partition>,
}

impl Default for Partitions {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitions {
    /// Fresh state with the whole key range free.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: KeyPool::new("access key", MAX_AKEY),
            parts: HashMap::new(),
        }
    }

    /// Key for a partition over `members`, reusing an existing partition
    /// with identical membership before allocating and programming a new
    /// one. A failed grant revokes the pairs already written and returns
    /// the key to the pool, leaving no state behind.
    pub fn create(&mut self, cs: &mut dyn ControlSpace, members: Vec<Gcid>) -> Result<u8> {
        let mut canon = members.clone();
        canon.sort_unstable();
        canon.dedup();
        if canon.len() != members.len() {
            return Err(FabricError::Config("duplicate partition member".into()));
        }
        if let Some((akey, part)) = self.parts.iter_mut().find(|(_, p)| {
            let mut m = p.members.clone();
            m.sort_unstable();
            m == canon
        }) {
            part.refs += 1;
            debug!("partition {akey}: identical membership, refs now {}", part.refs);
            return Ok(*akey);
        }

        let akey = self.pool.alloc()?;
        let mut granted: Vec<(Gcid, Gcid)> = Vec::new();
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if let Err(e) = grant_pair(cs, a, b, akey) {
                    granted.push((a, b));
                    revoke_granted(cs, akey, &granted);
                    self.pool.release(akey);
                    return Err(e);
                }
                granted.push((a, b));
            }
        }
        info!("partition {akey}: created over {} member(s)", members.len());
        self.parts.insert(akey, Partition { members, refs: 1 });
        Ok(akey)
    }

    /// Admit one more component, programming only the new pairs. A failed
    /// grant revokes the pairs already written; membership is unchanged.
    pub fn add_member(&mut self, cs: &mut dyn ControlSpace, akey: u8, gcid: Gcid) -> Result<()> {
        let part = self.parts.get_mut(&akey).ok_or(FabricError::Conflict {
            what: "access key",
            value: u64::from(akey),
        })?;
        if part.members.contains(&gcid) {
            return Err(FabricError::Conflict {
                what: "partition member",
                value: u64::from(gcid.cid),
            });
        }
        let mut granted: Vec<(Gcid, Gcid)> = Vec::new();
        for i in 0..part.members.len() {
            let peer = part.members[i];
            if let Err(e) = grant_pair(cs, gcid, peer, akey) {
                granted.push((gcid, peer));
                revoke_granted(cs, akey, &granted);
                return Err(e);
            }
            granted.push((gcid, peer));
        }
        part.members.push(gcid);
        debug!("partition {akey}: admitted {gcid}");
        Ok(())
    }

    /// Expel a component, revoking only the pairs it was part of. Removing
    /// a non-member is a no-op.
    pub fn remove_member(
        &mut self,
        cs: &mut dyn ControlSpace,
        akey: u8,
        gcid: Gcid,
    ) -> Result<bool> {
        let part = self.parts.get_mut(&akey).ok_or(FabricError::Conflict {
            what: "access key",
            value: u64::from(akey),
        })?;
        let Some(pos) = part.members.iter().position(|m| *m == gcid) else {
            debug!("partition {akey}: removal of non-member {gcid} ignored");
            return Ok(false);
        };
        part.members.remove(pos);
        for i in 0..part.members.len() {
            revoke_pair(cs, gcid, part.members[i])?;
        }
        debug!("partition {akey}: expelled {gcid}");
        Ok(true)
    }

    /// Drop one reference to a partition; the last one revokes every pair
    /// and frees the key, returning `true`. Teardown is best-effort: a pair
    /// whose revoke fails is logged as residual, and the key is released
    /// either way so it is never stranded.
    pub fn destroy(&mut self, cs: &mut dyn ControlSpace, akey: u8) -> Result<bool> {
        let part = self.parts.get_mut(&akey).ok_or(FabricError::Conflict {
            what: "access key",
            value: u64::from(akey),
        })?;
        part.refs -= 1;
        if part.refs > 0 {
            debug!("partition {akey}: refs now {}", part.refs);
            return Ok(false);
        }
        let Some(part) = self.parts.remove(&akey) else {
            return Ok(false);
        };
        for (i, &a) in part.members.iter().enumerate() {
            for &b in &part.members[i + 1..] {
                if let Err(e) = revoke_pair(cs, a, b) {
                    warn!("partition {akey}: residual grant {a} <-> {b}: {e}");
                }
            }
        }
        self.pool.release(akey);
        info!("partition {akey}: destroyed");
        Ok(true)
    }

    /// Members of a live partition.
    #[must_use]
    pub fn members(&self, akey: u8) -> Option<&[Gcid]> {
        self.parts.get(&akey).map(|p| p.members.as_slice())
    }

    /// Iterate live partitions.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[Gcid])> {
        self.parts.iter().map(|(k, p)| (*k, p.members.as_slice()))
    }
}

/// Best-effort revocation of partially-programmed grants.
fn revoke_granted(cs: &mut dyn ControlSpace, akey: u8, pairs: &[(Gcid, Gcid)]) {
    for &(a, b) in pairs {
        if let Err(e) = revoke_pair(cs, a, b) {
            warn!("partition {akey}: rollback left {a} <-> {b} granted: {e}");
        }
    }
}

/// Grant both directions of one pair. Grants are verified by read-back:
/// silently losing an access grant would fail open on the next rewrite.
fn grant_pair(cs: &mut dyn ControlSpace, a: Gcid, b: Gcid, akey: u8) -> Result<()> {
    let mut row = AccessTableRow::zeroed();
    row.set_valid(true)?;
    row.set_akey(akey)?;
    write_verified(
        cs,
        CtlAddr::Gcid(a),
        StructSel::access_table(),
        access_row_offset(b.cid),
        row.as_bytes(),
        "access grant",
    )?;
    write_verified(
        cs,
        CtlAddr::Gcid(b),
        StructSel::access_table(),
        access_row_offset(a.cid),
        row.as_bytes(),
        "access grant",
    )
}

/// Revoke both directions of one pair.
fn revoke_pair(cs: &mut dyn ControlSpace, a: Gcid, b: Gcid) -> Result<()> {
    let row = AccessTableRow::zeroed();
    write_range(
        cs,
        CtlAddr::Gcid(a),
        StructSel::access_table(),
        access_row_offset(b.cid),
        row.as_bytes(),
        "access revoke",
    )?;
    write_range(
        cs,
        CtlAddr::Gcid(b),
        StructSel::access_table(),
        access_row_offset(a.cid),
        row.as_bytes(),
        "access revoke",
    )
}
