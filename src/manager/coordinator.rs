// CLASSIFICATION: COMMUNITY
// Filename: coordinator.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-08-23

//! Single-writer fabric coordinator.
//!
//! All fabric state (topology, route table, key pools, the control-space
//! handle) lives on one thread. External callers talk to it through an
//! `mpsc` command channel with per-command reply senders, so every hardware
//! mutation is serialized without locks. Events arrive on the same channel
//! and are dispatched synchronously by event-type name.

use std::collections::BTreeSet;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use ctlspace_codec::Uuid128;
use log::{info, warn};

use crate::config::FabricConfig;
use crate::error::{FabricError, Result};
use crate::fabric::discovery::{CidAllocator, Discovery};
use crate::hw::ControlSpace;
use crate::keys::{DomainSet, Partitions};
use crate::lattice_types::{ComponentId, Gcid, IfaceNum};
use crate::manager::events::{EventRecord, EV_IFACE_DOWN, EV_IFACE_ERROR, EV_MGR_BEAT};
use crate::manager::heartbeat::{Pulse, Role};
use crate::manager::sync::SyncOp;
use crate::topo::graph::Topology;
use crate::topo::snapshot::{DomainSnapshot, FabricSnapshot, PartitionSnapshot};
use crate::topo::table::{program_pair, RouteTable};

/// Highest component id a 12-bit cid field can carry.
const MAX_CID: u16 = 0xfff;

/// One request to the coordinator thread.
pub enum Command {
    /// Crawl the fabric; replies with the number of components found.
    Discover(Sender<Result<usize>>),
    /// Program routes between two addresses.
    Connect {
        /// Source address.
        src: Gcid,
        /// Destination address.
        dst: Gcid,
        /// Also program the inverted routes.
        bidirectional: bool,
        /// Replies with the number of routes programmed for the pair.
        reply: Sender<Result<usize>>,
    },
    /// Tear down all routes between two addresses.
    Disconnect {
        /// Source address.
        src: Gcid,
        /// Destination address.
        dst: Gcid,
        /// Replies with the number of routes removed.
        reply: Sender<Result<usize>>,
    },
    /// Create an access partition; replies with the assigned key.
    PartitionCreate {
        /// Member addresses.
        members: Vec<Gcid>,
        /// Reply channel.
        reply: Sender<Result<u8>>,
    },
    /// Admit a member into a partition.
    PartitionAdd {
        /// Access key.
        akey: u8,
        /// New member.
        member: Gcid,
        /// Reply channel.
        reply: Sender<Result<()>>,
    },
    /// Expel a member from a partition.
    PartitionRemove {
        /// Access key.
        akey: u8,
        /// Member to expel.
        member: Gcid,
        /// Replies with whether the member was present.
        reply: Sender<Result<bool>>,
    },
    /// Destroy a partition.
    PartitionDestroy {
        /// Access key.
        akey: u8,
        /// Reply channel.
        reply: Sender<Result<()>>,
    },
    /// Acquire a resource key domain over a component set.
    DomainAcquire {
        /// Member components.
        members: BTreeSet<ComponentId>,
        /// Replies with the domain key.
        reply: Sender<Result<u8>>,
    },
    /// Release one reference to a resource key domain.
    DomainRelease {
        /// Domain key.
        key: u8,
        /// Replies with whether the key was known.
        reply: Sender<bool>,
    },
    /// An asynchronous fabric event.
    Event(EventRecord),
    /// Capture the exportable state.
    Snapshot(Sender<FabricSnapshot>),
    /// Take the pending state-sync records for the secondary.
    DrainSync(Sender<Vec<SyncOp>>),
    /// Assume the primary role.
    Promote,
    /// Stop the command loop and hand the coordinator back.
    Shutdown,
}

/// Owner of all mutable fabric state.
pub struct Coordinator {
    cs: Box<dyn ControlSpace + Send>,
    cfg: FabricConfig,
    mgr_uuid: Uuid128,
    bridge_count: usize,
    role: Role,
    pulse: Pulse,
    topo: Topology,
    routes: RouteTable,
    partitions: Partitions,
    domains: DomainSet,
    cids: CidAllocator,
    sync_log: Vec<SyncOp>,
    unreachable: Vec<(Gcid, Gcid)>,
}

impl Coordinator {
    /// Coordinator over `cs`, starting in the given role.
    #[must_use]
    pub fn new(
        cs: Box<dyn ControlSpace + Send>,
        cfg: FabricConfig,
        mgr_uuid: Uuid128,
        bridge_count: usize,
        role: Role,
    ) -> Self {
        Self {
            cs,
            cfg,
            mgr_uuid,
            bridge_count,
            role,
            pulse: Pulse::new(),
            topo: Topology::new(),
            routes: RouteTable::new(),
            partitions: Partitions::new(),
            domains: DomainSet::new(),
            cids: CidAllocator::new(MAX_CID),
            sync_log: Vec::new(),
            unreachable: Vec::new(),
        }
    }

    /// Current role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Pulse fed by primary heartbeat events; clone it into a watchdog.
    #[must_use]
    pub fn pulse(&self) -> Pulse {
        self.pulse.clone()
    }

    /// Pairs currently marked unreachable.
    #[must_use]
    pub fn unreachable(&self) -> &[(Gcid, Gcid)] {
        &self.unreachable
    }

    /// Crawl the fabric from the local bridges.
    pub fn discover(&mut self) -> Result<usize> {
        let mut disc = Discovery::new(self.cs.as_mut(), &self.cfg, self.mgr_uuid);
        let found = disc.crawl(&mut self.topo, &mut self.cids, self.bridge_count)?;
        Ok(found.len())
    }

    /// Borrow the discovered topology.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    /// Borrow the route table.
    #[must_use]
    pub fn route_table(&self) -> &RouteTable {
        &self.routes
    }

    fn comp_of(&self, gcid: Gcid) -> Result<ComponentId> {
        self.topo
            .find_by_gcid(gcid)
            .ok_or(FabricError::UnknownAddress(gcid))
    }

    /// Program routes between `src` and `dst`, optionally both ways.
    ///
    /// Inverse routes whose reversed hops have no free table entry are
    /// skipped with a warning, not failed.
    pub fn connect(&mut self, src: Gcid, dst: Gcid, bidirectional: bool) -> Result<usize> {
        let src_comp = self.comp_of(src)?;
        let dst_comp = self.comp_of(dst)?;
        let count = program_pair(
            self.cs.as_mut(),
            &self.topo,
            &mut self.routes,
            &self.cfg.routing,
            src_comp,
            dst_comp,
        )?;
        self.unreachable.retain(|p| *p != (src, dst));

        if bidirectional {
            let forward: Vec<_> = self
                .routes
                .routes_for(src, dst)
                .into_iter()
                .cloned()
                .collect();
            for route in forward {
                let inverse = route.invert(&self.topo)?;
                if !self.routes.has_capacity(&inverse) {
                    warn!(
                        "{dst} -> {src}: inverse route skipped, no free table entry"
                    );
                    continue;
                }
                self.routes.ensure(self.cs.as_mut(), inverse)?;
            }
            self.unreachable.retain(|p| *p != (dst, src));
        }

        for route in self.routes.routes_for(src, dst) {
            self.sync_log.push(SyncOp::RouteAdd {
                route: route.clone(),
            });
        }
        if bidirectional {
            for route in self.routes.routes_for(dst, src) {
                self.sync_log.push(SyncOp::RouteAdd {
                    route: route.clone(),
                });
            }
        }
        Ok(count)
    }

    /// Remove every route between `src` and `dst`.
    pub fn disconnect(&mut self, src: Gcid, dst: Gcid) -> Result<usize> {
        let doomed: Vec<_> = self
            .routes
            .routes_for(src, dst)
            .into_iter()
            .cloned()
            .collect();
        let count = doomed.len();
        for route in doomed {
            while self.routes.refs(&route) > 0 {
                self.routes.remove(self.cs.as_mut(), &route)?;
            }
            self.sync_log.push(SyncOp::RouteRemove { route });
        }
        Ok(count)
    }

    /// Handle a link loss reported at `(gcid, iface)`: degrade the
    /// topology, tear down crossing routes, and recompute each affected
    /// pair. Pairs left without a path are marked unreachable.
    pub fn link_down(&mut self, gcid: Gcid, iface: IfaceNum) -> Result<()> {
        let comp = self.comp_of(gcid)?;
        let Some(edge) = self.topo.iface_edge(comp, iface) else {
            warn!("{gcid}: iface {iface} has no known link, event ignored");
            return Ok(());
        };
        info!("{gcid}: iface {iface} down, tearing down {edge}");

        for (s, d) in self.routes.pairs() {
            for route in self.routes.routes_for(s, d) {
                if route.uses_edge(edge) {
                    self.sync_log.push(SyncOp::RouteRemove {
                        route: route.clone(),
                    });
                }
            }
        }
        self.topo.mark_link_down(edge);
        let affected = self.routes.on_link_down(self.cs.as_mut(), edge)?;

        for (src, dst) in affected {
            match self.connect(src, dst, false) {
                Ok(n) => info!("{src} -> {dst}: {n} route(s) after recompute"),
                Err(FabricError::Unreachable { .. }) => {
                    warn!("{src} -> {dst}: no remaining path, marked unreachable");
                    if !self.unreachable.contains(&(src, dst)) {
                        self.unreachable.push((src, dst));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Dispatch one event by type name. Unknown types warn and are dropped.
    pub fn handle_event(&mut self, ev: &EventRecord) {
        match (ev.kind.as_str(), ev.iface) {
            (EV_IFACE_DOWN | EV_IFACE_ERROR, Some(iface)) => {
                if let Err(e) = self.link_down(ev.sender, iface) {
                    warn!("{}: link-down handling failed: {e}", ev.sender);
                }
            }
            (EV_IFACE_DOWN | EV_IFACE_ERROR, None) => {
                warn!("{}: {} without interface, ignored", ev.sender, ev.kind);
            }
            (EV_MGR_BEAT, _) => self.pulse.beat(),
            (other, _) => warn!("{}: unknown event type {other:?}, ignored", ev.sender),
        }
    }

    /// Create an access partition over `members`.
    pub fn partition_create(&mut self, members: Vec<Gcid>) -> Result<u8> {
        for member in &members {
            self.comp_of(*member)?;
        }
        let akey = self.partitions.create(self.cs.as_mut(), members.clone())?;
        self.sync_log.push(SyncOp::PartitionCreate { akey, members });
        Ok(akey)
    }

    /// Admit `member` into partition `akey`.
    pub fn partition_add(&mut self, akey: u8, member: Gcid) -> Result<()> {
        self.comp_of(member)?;
        self.partitions.add_member(self.cs.as_mut(), akey, member)?;
        self.sync_log.push(SyncOp::PartitionAdd { akey, member });
        Ok(())
    }

    /// Expel `member` from partition `akey`.
    pub fn partition_remove(&mut self, akey: u8, member: Gcid) -> Result<bool> {
        let removed = self
            .partitions
            .remove_member(self.cs.as_mut(), akey, member)?;
        if removed {
            self.sync_log.push(SyncOp::PartitionRemove { akey, member });
        }
        Ok(removed)
    }

    /// Drop one reference to partition `akey`; the last drop revokes all
    /// its grants.
    pub fn partition_destroy(&mut self, akey: u8) -> Result<()> {
        if self.partitions.destroy(self.cs.as_mut(), akey)? {
            self.sync_log.push(SyncOp::PartitionDestroy { akey });
        }
        Ok(())
    }

    /// Acquire a resource key domain over `members`.
    pub fn domain_acquire(&mut self, members: BTreeSet<ComponentId>) -> Result<u8> {
        let key = self.domains.acquire(members.clone())?;
        self.sync_log.push(SyncOp::DomainAcquire {
            key,
            members: members.into_iter().collect(),
        });
        Ok(key)
    }

    /// Release one reference to domain `key`.
    pub fn domain_release(&mut self, key: u8) -> bool {
        let known = self.domains.release(key);
        if known && self.domains.members(key).is_none() {
            self.sync_log.push(SyncOp::DomainRelease { key });
        }
        known
    }

    /// Capture the exportable state, key allocations included.
    #[must_use]
    pub fn snapshot(&self) -> FabricSnapshot {
        let mut snap = FabricSnapshot::capture(&self.topo, &self.routes);
        snap.partitions = self
            .partitions
            .iter()
            .map(|(akey, members)| PartitionSnapshot {
                akey,
                members: members.to_vec(),
            })
            .collect();
        snap.partitions.sort_by_key(|p| p.akey);
        snap.domains = self
            .domains
            .iter()
            .map(|(key, members)| DomainSnapshot {
                key,
                members: members.iter().map(|m| m.index()).collect(),
            })
            .collect();
        snap.domains.sort_by_key(|d| d.key);
        snap
    }

    /// Take the pending sync records.
    pub fn drain_sync(&mut self) -> Vec<SyncOp> {
        std::mem::take(&mut self.sync_log)
    }

    /// Assume the primary role.
    pub fn promote(&mut self) {
        if self.role != Role::Primary {
            info!("promoting to primary manager");
            self.role = Role::Primary;
        }
    }

    /// Run the command loop until [`Command::Shutdown`], returning the
    /// coordinator for inspection.
    pub fn run(mut self, rx: Receiver<Command>) -> Self {
        while let Ok(cmd) = rx.recv() {
            match cmd {
                Command::Discover(reply) => {
                    let _ = reply.send(self.discover());
                }
                Command::Connect {
                    src,
                    dst,
                    bidirectional,
                    reply,
                } => {
                    let _ = reply.send(self.connect(src, dst, bidirectional));
                }
                Command::Disconnect { src, dst, reply } => {
                    let _ = reply.send(self.disconnect(src, dst));
                }
                Command::PartitionCreate { members, reply } => {
                    let _ = reply.send(self.partition_create(members));
                }
                Command::PartitionAdd {
                    akey,
                    member,
                    reply,
                } => {
                    let _ = reply.send(self.partition_add(akey, member));
                }
                Command::PartitionRemove {
                    akey,
                    member,
                    reply,
                } => {
                    let _ = reply.send(self.partition_remove(akey, member));
                }
                Command::PartitionDestroy { akey, reply } => {
                    let _ = reply.send(self.partition_destroy(akey));
                }
                Command::DomainAcquire { members, reply } => {
                    let _ = reply.send(self.domain_acquire(members));
                }
                Command::DomainRelease { key, reply } => {
                    let _ = reply.send(self.domain_release(key));
                }
                Command::Event(ev) => self.handle_event(&ev),
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Command::DrainSync(reply) => {
                    let _ = reply.send(self.drain_sync());
                }
                Command::Promote => self.promote(),
                Command::Shutdown => break,
            }
        }
        self
    }

    /// Spawn the command loop on its own thread.
    pub fn spawn(self) -> (Sender<Command>, thread::JoinHandle<Self>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || self.run(rx));
        (tx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::config::SimComponent;
    use crate::hw::model::ModelFabric;

    fn chain_config() -> FabricConfig {
        let mut cfg = FabricConfig::default();
        cfg.topology = vec![
            SimComponent {
                name: "br0".into(),
                class: "bridge".into(),
                links: vec!["0:sw0:0".into()],
            },
            SimComponent {
                name: "sw0".into(),
                class: "switch".into(),
                links: vec!["1:mem0:0".into()],
            },
            SimComponent {
                name: "mem0".into(),
                class: "memory".into(),
                links: vec![],
            },
        ];
        cfg
    }

    fn coordinator() -> Coordinator {
        let cfg = chain_config();
        let model = ModelFabric::from_config(&cfg.topology).expect("model");
        let bridges = model.bridge_count();
        Coordinator::new(
            Box::new(model),
            cfg,
            Uuid128::from_value(0xfeed_beef),
            bridges,
            Role::Primary,
        )
    }

    #[test]
    fn discover_connect_snapshot() {
        let mut coord = coordinator();
        assert_eq!(coord.discover().expect("discover"), 3);
        let snap = coord.snapshot();
        assert_eq!(snap.components.len(), 3);
        assert_eq!(snap.edges.len(), 2);

        let src = snap.components[0].gcid.expect("bridge gcid");
        let dst = snap
            .components
            .iter()
            .find(|c| c.class == crate::lattice_types::CompClass::Memory)
            .and_then(|c| c.gcid)
            .expect("memory gcid");
        let n = coord.connect(src, dst, true).expect("connect");
        assert_eq!(n, 1);
        // The inverse was programmed too.
        assert_eq!(coord.route_table().routes_for(dst, src).len(), 1);

        let ops = coord.drain_sync();
        assert!(ops
            .iter()
            .any(|op| matches!(op, SyncOp::RouteAdd { route } if route.src == dst)));
        assert!(coord.drain_sync().is_empty());
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let mut coord = coordinator();
        coord.discover().expect("discover");
        let before = coord.snapshot();
        coord.handle_event(&EventRecord {
            sender: before.components[0].gcid.expect("gcid"),
            iface: None,
            remote: None,
            kind: "vendor-trap".into(),
            data: serde_json::Value::Null,
        });
        assert_eq!(coord.snapshot(), before);
    }

    #[test]
    fn command_loop_round_trip() {
        let coord = coordinator();
        let (tx, handle) = coord.spawn();

        let (reply, rx) = mpsc::channel();
        tx.send(Command::Discover(reply)).expect("send");
        assert_eq!(rx.recv().expect("reply").expect("discover"), 3);

        let (reply, rx) = mpsc::channel();
        tx.send(Command::Snapshot(reply)).expect("send");
        let snap = rx.recv().expect("snapshot");
        assert_eq!(snap.components.len(), 3);

        tx.send(Command::Shutdown).expect("send");
        let coord = handle.join().expect("join");
        assert_eq!(coord.role(), Role::Primary);
    }

    #[test]
    fn beat_events_feed_the_pulse() {
        let mut coord = coordinator();
        let pulse = coord.pulse();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let before = pulse.age();
        coord.handle_event(&EventRecord {
            sender: Gcid::new(0, 1),
            iface: None,
            remote: None,
            kind: EV_MGR_BEAT.into(),
            data: serde_json::Value::Null,
        });
        assert!(pulse.age() < before);
    }
}
