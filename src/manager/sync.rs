// CLASSIFICATION: COMMUNITY
// Filename: sync.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-15

//! Primary-to-secondary state synchronization records.
//!
//! The primary streams one record per state mutation; the secondary applies
//! them to a shadow copy it can take over from. The transport may redeliver,
//! so application is idempotent by content: an op that would not change the
//! shadow is a no-op, and applying the same record twice equals applying it
//! once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::lattice_types::{ComponentId, Gcid};
use crate::topo::route::Route;

/// One replicated state mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum SyncOp {
    /// A route was programmed.
    RouteAdd {
        /// The route, by content.
        route: Route,
    },
    /// A route was unprogrammed.
    RouteRemove {
        /// The route, by content.
        route: Route,
    },
    /// A partition was created.
    PartitionCreate {
        /// Assigned access key.
        akey: u8,
        /// Member addresses.
        members: Vec<Gcid>,
    },
    /// A partition member was admitted.
    PartitionAdd {
        /// Access key of the partition.
        akey: u8,
        /// New member.
        member: Gcid,
    },
    /// A partition member was expelled.
    PartitionRemove {
        /// Access key of the partition.
        akey: u8,
        /// Expelled member.
        member: Gcid,
    },
    /// A partition was destroyed.
    PartitionDestroy {
        /// Access key returned to the pool.
        akey: u8,
    },
    /// A resource key domain came into existence.
    DomainAcquire {
        /// Assigned resource key.
        key: u8,
        /// Member components.
        members: Vec<ComponentId>,
    },
    /// A resource key domain's last reference dropped.
    DomainRelease {
        /// Freed resource key.
        key: u8,
    },
}

/// The secondary's shadow of replicated state.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncShadow {
    routes: Vec<Route>,
    partitions: HashMap<u8, Vec<Gcid>>,
    domains: HashMap<u8, Vec<ComponentId>>,
}

impl SyncShadow {
    /// Empty shadow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one record; returns whether the shadow changed.
    pub fn apply(&mut self, op: &SyncOp) -> bool {
        match op {
            SyncOp::RouteAdd { route } => {
                if self.routes.contains(route) {
                    return false;
                }
                self.routes.push(route.clone());
                true
            }
            SyncOp::RouteRemove { route } => {
                let before = self.routes.len();
                self.routes.retain(|r| r != route);
                before != self.routes.len()
            }
            SyncOp::PartitionCreate { akey, members } => {
                if self.partitions.get(akey) == Some(members) {
                    return false;
                }
                self.partitions.insert(*akey, members.clone());
                true
            }
            SyncOp::PartitionAdd { akey, member } => {
                match self.partitions.get_mut(akey) {
                    Some(m) if !m.contains(member) => {
                        m.push(*member);
                        true
                    }
                    _ => false,
                }
            }
            SyncOp::PartitionRemove { akey, member } => {
                match self.partitions.get_mut(akey) {
                    Some(m) => {
                        let before = m.len();
                        m.retain(|g| g != member);
                        before != m.len()
                    }
                    None => false,
                }
            }
            SyncOp::PartitionDestroy { akey } => self.partitions.remove(akey).is_some(),
            SyncOp::DomainAcquire { key, members } => {
                if self.domains.get(key) == Some(members) {
                    return false;
                }
                self.domains.insert(*key, members.clone());
                true
            }
            SyncOp::DomainRelease { key } => self.domains.remove(key).is_some(),
        }
    }

    /// Routes currently in the shadow.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Partition membership by access key.
    #[must_use]
    pub fn partition(&self, akey: u8) -> Option<&[Gcid]> {
        self.partitions.get(&akey).map(Vec::as_slice)
    }

    /// Domain membership by resource key.
    #[must_use]
    pub fn domain(&self, key: u8) -> Option<&[ComponentId]> {
        self.domains.get(&key).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topo::route::Hop;
    use crate::lattice_types::EdgeId;

    fn route() -> Route {
        Route {
            src: Gcid::new(0, 1),
            dst: Gcid::new(0, 3),
            dst_comp: ComponentId(2),
            hops: vec![Hop {
                comp: ComponentId(0),
                gcid: Gcid::new(0, 1),
                egress: 0,
                edge: EdgeId(0),
            }],
        }
    }

    #[test]
    fn redelivery_is_idempotent() {
        let mut shadow = SyncShadow::new();
        let add = SyncOp::RouteAdd { route: route() };
        assert!(shadow.apply(&add));
        assert!(!shadow.apply(&add));
        assert_eq!(shadow.routes().len(), 1);

        let create = SyncOp::PartitionCreate {
            akey: 9,
            members: vec![Gcid::new(0, 1), Gcid::new(0, 3)],
        };
        assert!(shadow.apply(&create));
        assert!(!shadow.apply(&create));

        let remove = SyncOp::RouteRemove { route: route() };
        assert!(shadow.apply(&remove));
        assert!(!shadow.apply(&remove));
        assert!(shadow.routes().is_empty());
    }

    #[test]
    fn ops_round_trip_as_tagged_json() {
        let op = SyncOp::DomainAcquire {
            key: 4,
            members: vec![ComponentId(1), ComponentId(2)],
        };
        let text = serde_json::to_string(&op).expect("serialize");
        assert!(text.contains("\"op\":\"domain-acquire\""));
        let back: SyncOp = serde_json::from_str(&text).expect("parse");
        assert_eq!(back, op);
    }

    #[test]
    fn membership_deltas_apply_once() {
        let mut shadow = SyncShadow::new();
        shadow.apply(&SyncOp::PartitionCreate {
            akey: 2,
            members: vec![Gcid::new(0, 1)],
        });
        let add = SyncOp::PartitionAdd {
            akey: 2,
            member: Gcid::new(0, 5),
        };
        assert!(shadow.apply(&add));
        assert!(!shadow.apply(&add));
        assert_eq!(shadow.partition(2).map(<[Gcid]>::len), Some(2));
    }
}
