// CLASSIFICATION: COMMUNITY
// Filename: table.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-08-09

//! Destination-table programming with reference counting.
//!
//! Hardware rows are shared: every route traversing the same
//! `(component, destination, egress)` triple lands in one row, and the row
//! stays programmed until its last route is gone. Each destination owns a
//! fixed group of entries whose entry 0 is the summary row mirroring the
//! minimum hop count of the group.
//!
//! Write ordering is load-bearing. Enabling a route programs rows from the
//! hop nearest the destination back toward the source, so no row ever
//! forwards into an unprogrammed row. Disabling runs source-first for the
//! same reason. A row is rewritten only when its content must change:
//! brand-new, minimum hop count moved, or validity flipped.

use std::collections::HashMap;

use ctlspace_codec::DestTableRow;
use log::{debug, info, warn};

use crate::config::RoutingConfig;
use crate::error::{FabricError, Result};
use crate::hw::{write_range, ControlSpace, CtlAddr, StructSel};
use crate::lattice_types::{ComponentId, EdgeId, Gcid, IfaceNum};
use crate::topo::graph::Topology;
use crate::topo::paths::compute_paths;
use crate::topo::route::{Hop, Route};

/// Table entries per destination, summary entry 0 included.
pub const ENTRIES_PER_ROW: usize = 4;

/// Byte offset of one entry behind the table header.
#[must_use]
pub fn row_offset(dest: u16, entry: usize) -> usize {
    DestTableRow::ROW_BYTES * (1 + usize::from(dest) * ENTRIES_PER_ROW + entry)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RowKey {
    comp: ComponentId,
    dest: u16,
    egress: IfaceNum,
}

/// In-memory shadow of one programmed hardware row.
#[derive(Debug)]
struct RowState {
    entry: usize,
    /// One hop-count contribution per distinct route through this row.
    users: Vec<u8>,
    programmed: u8,
}

#[derive(Debug, Default)]
struct DestState {
    taken: [bool; ENTRIES_PER_ROW],
    /// Last summary written: `(egress, hop count)`, `None` when invalid.
    summary: Option<(IfaceNum, u8)>,
}

#[derive(Debug)]
struct RouteEntry {
    route: Route,
    refs: usize,
}

/// Programmed routes plus the shadow of every hardware row they own.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<(Gcid, Gcid), Vec<RouteEntry>>,
    rows: HashMap<RowKey, RowState>,
    dests: HashMap<(ComponentId, u16), DestState>,
}

impl RouteTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every hop of `route` can still get a free entry.
    #[must_use]
    pub fn has_capacity(&self, route: &Route) -> bool {
        self.missing_capacity(route).is_none()
    }

    fn missing_capacity(&self, route: &Route) -> Option<(ComponentId, u16)> {
        let dest = route.dst.cid;
        let mut needed: HashMap<(ComponentId, u16), usize> = HashMap::new();
        for hop in &route.hops {
            let key = RowKey {
                comp: hop.comp,
                dest,
                egress: hop.egress,
            };
            if !self.rows.contains_key(&key) {
                *needed.entry((hop.comp, dest)).or_default() += 1;
            }
        }
        for (slot, need) in needed {
            let free = self.dests.get(&slot).map_or(ENTRIES_PER_ROW - 1, |d| {
                d.taken[1..].iter().filter(|t| !**t).count()
            });
            if need > free {
                return Some(slot);
            }
        }
        None
    }

    /// Add one reference to `route`, programming hardware rows on the first.
    ///
    /// Returns `true` when rows were written, `false` when an identical
    /// route was already programmed and only its count moved.
    pub fn add(&mut self, cs: &mut dyn ControlSpace, route: Route) -> Result<bool> {
        let pair = (route.src, route.dst);
        if let Some(entry) = self
            .routes
            .get_mut(&pair)
            .and_then(|v| v.iter_mut().find(|e| e.route == route))
        {
            entry.refs += 1;
            debug!("{} -> {}: route refs now {}", pair.0, pair.1, entry.refs);
            return Ok(false);
        }

        if self.missing_capacity(&route).is_some() {
            return Err(FabricError::Exhausted("destination table entry"));
        }

        // Destination-first programming.
        let total = route.hops.len();
        for (i, hop) in route.hops.iter().enumerate().rev() {
            let hc = (total - i).min(u8::MAX as usize) as u8;
            self.program_hop(cs, hop, route.dst.cid, hc)?;
        }
        info!(
            "{} -> {}: route programmed over {total} hops",
            pair.0, pair.1
        );
        self.routes
            .entry(pair)
            .or_default()
            .push(RouteEntry { route, refs: 1 });
        Ok(true)
    }

    /// Add `route` only if no identical route is already programmed.
    /// Recompute passes use this so they never inflate reference counts.
    pub fn ensure(&mut self, cs: &mut dyn ControlSpace, route: Route) -> Result<bool> {
        let pair = (route.src, route.dst);
        if self
            .routes
            .get(&pair)
            .is_some_and(|v| v.iter().any(|e| e.route == route))
        {
            return Ok(false);
        }
        self.add(cs, route)
    }

    /// Drop one reference; the last one unprograms the hardware rows.
    ///
    /// Removing a route that is not present is a no-op, so callers may
    /// retry removals after partial failures.
    pub fn remove(&mut self, cs: &mut dyn ControlSpace, route: &Route) -> Result<bool> {
        let pair = (route.src, route.dst);
        let Some(entries) = self.routes.get_mut(&pair) else {
            debug!("{} -> {}: remove of unknown route ignored", pair.0, pair.1);
            return Ok(false);
        };
        let Some(idx) = entries.iter().position(|e| e.route == *route) else {
            debug!("{} -> {}: remove of unknown route ignored", pair.0, pair.1);
            return Ok(false);
        };
        entries[idx].refs -= 1;
        if entries[idx].refs > 0 {
            debug!(
                "{} -> {}: route refs now {}",
                pair.0, pair.1, entries[idx].refs
            );
            return Ok(true);
        }
        let gone = entries.remove(idx).route;
        if entries.is_empty() {
            self.routes.remove(&pair);
        }
        self.unprogram_route(cs, &gone, false)?;
        info!("{} -> {}: route unprogrammed", pair.0, pair.1);
        Ok(true)
    }

    /// Tear down every route crossing `edge`, best effort, and return the
    /// affected `(src, dst)` pairs for recomputation.
    pub fn on_link_down(
        &mut self,
        cs: &mut dyn ControlSpace,
        edge: EdgeId,
    ) -> Result<Vec<(Gcid, Gcid)>> {
        let mut affected = Vec::new();
        let doomed: Vec<Route> = self
            .routes
            .values()
            .flatten()
            .filter(|e| e.route.uses_edge(edge))
            .map(|e| e.route.clone())
            .collect();
        for route in doomed {
            let pair = (route.src, route.dst);
            if let Some(entries) = self.routes.get_mut(&pair) {
                entries.retain(|e| e.route != route);
                if entries.is_empty() {
                    self.routes.remove(&pair);
                }
            }
            // A dead link may make some hops unwritable; shadow state must
            // still converge, so row write failures only warn here.
            self.unprogram_route(cs, &route, true)?;
            if !affected.contains(&pair) {
                affected.push(pair);
            }
        }
        if !affected.is_empty() {
            info!("{edge} down: {} route pair(s) torn down", affected.len());
        }
        Ok(affected)
    }

    /// Routes currently programmed for a pair, shortest first.
    #[must_use]
    pub fn routes_for(&self, src: Gcid, dst: Gcid) -> Vec<&Route> {
        let mut v: Vec<&Route> = self
            .routes
            .get(&(src, dst))
            .map(|e| e.iter().map(|e| &e.route).collect())
            .unwrap_or_default();
        v.sort_by_key(|r| r.hop_count());
        v
    }

    /// Reference count of an exact route, zero when absent.
    #[must_use]
    pub fn refs(&self, route: &Route) -> usize {
        self.routes
            .get(&(route.src, route.dst))
            .and_then(|v| v.iter().find(|e| e.route == *route))
            .map_or(0, |e| e.refs)
    }

    /// All pairs with at least one programmed route.
    #[must_use]
    pub fn pairs(&self) -> Vec<(Gcid, Gcid)> {
        self.routes.keys().copied().collect()
    }

    /// Last summary written for `(comp, dest)`: `(egress, hop count)`.
    #[must_use]
    pub fn summary_of(&self, comp: ComponentId, dest: u16) -> Option<(IfaceNum, u8)> {
        self.dests.get(&(comp, dest)).and_then(|d| d.summary)
    }

    fn program_hop(
        &mut self,
        cs: &mut dyn ControlSpace,
        hop: &Hop,
        dest: u16,
        hc: u8,
    ) -> Result<()> {
        let key = RowKey {
            comp: hop.comp,
            dest,
            egress: hop.egress,
        };
        if let Some(state) = self.rows.get_mut(&key) {
            state.users.push(hc);
            if hc < state.programmed {
                write_row(cs, hop.gcid, dest, state.entry, Some((hop.egress, hc)))?;
                state.programmed = hc;
            }
        } else {
            let dstate = self.dests.entry((hop.comp, dest)).or_default();
            let Some(entry) = (1..ENTRIES_PER_ROW).find(|e| !dstate.taken[*e]) else {
                return Err(FabricError::Exhausted("destination table entry"));
            };
            dstate.taken[entry] = true;
            write_row(cs, hop.gcid, dest, entry, Some((hop.egress, hc)))?;
            self.rows.insert(
                key,
                RowState {
                    entry,
                    users: vec![hc],
                    programmed: hc,
                },
            );
        }
        self.update_summary(cs, hop.comp, hop.gcid, dest)
    }

    fn unprogram_route(
        &mut self,
        cs: &mut dyn ControlSpace,
        route: &Route,
        best_effort: bool,
    ) -> Result<()> {
        // Source-first teardown.
        let total = route.hops.len();
        for (i, hop) in route.hops.iter().enumerate() {
            let hc = (total - i).min(u8::MAX as usize) as u8;
            match self.unprogram_hop(cs, hop, route.dst.cid, hc) {
                Ok(()) => {}
                Err(e) if best_effort => {
                    warn!("{}: row teardown failed, continuing: {e}", hop.gcid);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn unprogram_hop(
        &mut self,
        cs: &mut dyn ControlSpace,
        hop: &Hop,
        dest: u16,
        hc: u8,
    ) -> Result<()> {
        let key = RowKey {
            comp: hop.comp,
            dest,
            egress: hop.egress,
        };
        let Some(state) = self.rows.get_mut(&key) else {
            return Ok(());
        };
        if let Some(pos) = state.users.iter().position(|u| *u == hc) {
            state.users.remove(pos);
        }
        if state.users.is_empty() {
            let entry = state.entry;
            self.rows.remove(&key);
            write_row(cs, hop.gcid, dest, entry, None)?;
            if let Some(dstate) = self.dests.get_mut(&(hop.comp, dest)) {
                dstate.taken[entry] = false;
            }
        } else if let Some(&min) = state.users.iter().min() {
            if min != state.programmed {
                write_row(cs, hop.gcid, dest, state.entry, Some((hop.egress, min)))?;
                state.programmed = min;
            }
        }
        self.update_summary(cs, hop.comp, hop.gcid, dest)
    }

    /// Rewrite entry 0 of a destination's group iff its content changed.
    fn update_summary(
        &mut self,
        cs: &mut dyn ControlSpace,
        comp: ComponentId,
        gcid: Gcid,
        dest: u16,
    ) -> Result<()> {
        let best = self
            .rows
            .iter()
            .filter(|(k, _)| k.comp == comp && k.dest == dest)
            .min_by_key(|(_, s)| (s.programmed, s.entry))
            .map(|(k, s)| (k.egress, s.programmed));
        let Some(dstate) = self.dests.get_mut(&(comp, dest)) else {
            return Ok(());
        };
        if dstate.summary == best {
            return Ok(());
        }
        write_row(cs, gcid, dest, 0, best)?;
        dstate.summary = best;
        Ok(())
    }
}

/// Write one 16-byte entry; `None` invalidates it.
fn write_row(
    cs: &mut dyn ControlSpace,
    gcid: Gcid,
    dest: u16,
    entry: usize,
    content: Option<(IfaceNum, u8)>,
) -> Result<()> {
    let mut row = DestTableRow::zeroed();
    if let Some((egress, hc)) = content {
        row.set_valid(true)?;
        row.set_egress(egress)?;
        row.set_hop_count(hc)?;
    }
    write_range(
        cs,
        CtlAddr::Gcid(gcid),
        StructSel::dest_table(),
        row_offset(dest, entry),
        row.as_bytes(),
        "destination table row",
    )
}

/// Recompute and program routes for one pair, honoring the per-pair cap.
///
/// Existing identical routes are kept without touching their reference
/// counts; newly admitted paths are programmed; when `max_routes` is
/// exceeded the longest routes are torn down first. Returns the number of
/// routes left programmed, or [`FabricError::Unreachable`] when the pair
/// has no path at all.
pub fn program_pair(
    cs: &mut dyn ControlSpace,
    topo: &Topology,
    table: &mut RouteTable,
    cfg: &RoutingConfig,
    src: ComponentId,
    dst: ComponentId,
) -> Result<usize> {
    let (src_gcid, dst_gcid) = match (
        topo.component(src).and_then(|c| c.gcid),
        topo.component(dst).and_then(|c| c.gcid),
    ) {
        (Some(s), Some(d)) => (s, d),
        _ => {
            return Err(FabricError::Unreachable {
                src: Gcid { sid: 0, cid: 0 },
                dst: Gcid { sid: 0, cid: 0 },
            })
        }
    };
    let cands = compute_paths(topo, src, dst, cfg);
    if cands.is_empty() {
        return Err(FabricError::Unreachable {
            src: src_gcid,
            dst: dst_gcid,
        });
    }
    for cand in &cands {
        let route = Route::from_candidate(topo, cand)?;
        match table.ensure(cs, route) {
            Ok(_) => {}
            Err(FabricError::Exhausted(what)) => {
                warn!("{src_gcid} -> {dst_gcid}: path skipped, {what} exhausted");
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(cap) = cfg.max_routes {
        let mut excess: Vec<Route> = table
            .routes_for(src_gcid, dst_gcid)
            .into_iter()
            .cloned()
            .collect();
        while excess.len() > cap {
            let Some(longest) = excess.pop() else { break };
            table.remove(cs, &longest)?;
        }
    }
    Ok(table.routes_for(src_gcid, dst_gcid).len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlspace_codec::Uuid128;

    use crate::fabric::component::{CState, Component};
    use crate::fabric::interface::{IState, Interface, PhyState};
    use crate::hw::model::ModelFabric;
    use crate::hw::read_range;
    use crate::lattice_types::CompClass;
    use crate::topo::paths::PathCandidate;

    /// Model plus mirrored topology: all components are bridges so they can
    /// be addressed locally for gcid registration.
    struct Rig {
        model: ModelFabric,
        topo: Topology,
        ids: Vec<ComponentId>,
        gcids: Vec<Gcid>,
    }

    fn rig(n: usize, links: &[(usize, IfaceNum, usize, IfaceNum)]) -> Rig {
        let mut model = ModelFabric::new();
        let mut topo = Topology::new();
        let mut ids = Vec::new();
        let mut gcids = Vec::new();
        for i in 0..n {
            let serial = (i + 1) as u64;
            model.add_component(CompClass::Bridge, serial);
            let gcid = Gcid::new(0, serial as u16);
            // Register the fabric address with the model directly.
            let mut bytes = [0u8; 4];
            bytes[0] = (gcid.cid & 0xff) as u8;
            bytes[2..4].copy_from_slice(&gcid.sid.to_le_bytes());
            write_range(
                &mut model,
                CtlAddr::Local { index: i },
                StructSel::core(),
                40,
                &bytes,
                "test address",
            )
            .expect("register gcid");
            let nifaces = 4;
            ids.push(topo.insert(Component {
                id: ComponentId(0),
                class_uuid: Uuid128::from_value(u128::from(serial) | 0x5000),
                serial,
                fru_uuid: Uuid128::from_value(u128::from(serial)),
                class: CompClass::Bridge,
                gcid: Some(gcid),
                cstate: CState::Up,
                usable: true,
                ifaces: (0..nifaces)
                    .map(|n| {
                        let mut i = Interface::down(n);
                        i.istate = IState::Up;
                        i.phy = PhyState::Up;
                        i.usable = true;
                        i
                    })
                    .collect(),
            }));
            gcids.push(gcid);
        }
        for &(a, ai, b, bi) in links {
            topo.add_edge(ids[a], ai, ids[b], bi, false);
        }
        Rig {
            model,
            topo,
            ids,
            gcids,
        }
    }

    fn route_over(rig: &Rig, comps: &[usize]) -> Route {
        let ids: Vec<ComponentId> = comps.iter().map(|i| rig.ids[*i]).collect();
        let edges = ids
            .windows(2)
            .map(|w| {
                rig.topo
                    .edges_between(w[0], w[1])
                    .first()
                    .copied()
                    .expect("edge")
            })
            .collect();
        Route::from_candidate(
            &rig.topo,
            &PathCandidate {
                comps: ids,
                edges,
            },
        )
        .expect("route")
    }

    fn read_row(rig: &mut Rig, comp: usize, dest: u16, entry: usize) -> DestTableRow {
        let buf = read_range(
            &mut rig.model,
            CtlAddr::Gcid(rig.gcids[comp]),
            StructSel::dest_table(),
            row_offset(dest, entry),
            DestTableRow::ROW_BYTES,
        )
        .expect("row read");
        DestTableRow::decode(&buf).expect("row decode")
    }

    /// 0 -- 1 -- 2 chain.
    fn chain() -> Rig {
        rig(3, &[(0, 0, 1, 0), (1, 1, 2, 0)])
    }

    #[test]
    fn add_programs_rows_and_summary() {
        let mut r = chain();
        let route = route_over(&r, &[0, 1, 2]);
        let dest = route.dst.cid;
        let mut table = RouteTable::new();
        assert!(table.add(&mut r.model, route).expect("add"));

        // Mid-hop row: egress 1, one hop from the destination.
        let row = read_row(&mut r, 1, dest, 1);
        assert!(row.valid().expect("valid"));
        assert_eq!(row.egress().expect("egress"), 1);
        assert_eq!(row.hop_count().expect("hc"), 1);
        // Its summary mirrors the only row.
        let summary = read_row(&mut r, 1, dest, 0);
        assert!(summary.valid().expect("valid"));
        assert_eq!(summary.hop_count().expect("hc"), 1);
        // Source row is two hops out.
        assert_eq!(read_row(&mut r, 0, dest, 1).hop_count().expect("hc"), 2);
    }

    #[test]
    fn enable_is_destination_first_disable_source_first() {
        let mut r = chain();
        let route = route_over(&r, &[0, 1, 2]);
        let mut table = RouteTable::new();
        r.model.clear_write_log();
        table.add(&mut r.model, route.clone()).expect("add");
        let enable_order: Vec<usize> = r
            .model
            .write_log()
            .iter()
            .filter(|w| w.sel == StructSel::dest_table())
            .map(|w| w.phys)
            .collect();
        // Component 1 (next to the destination) before component 0; the
        // summary write follows each row write on the same component.
        assert_eq!(enable_order, vec![1, 1, 0, 0]);

        r.model.clear_write_log();
        table.remove(&mut r.model, &route).expect("remove");
        let disable_order: Vec<usize> = r
            .model
            .write_log()
            .iter()
            .filter(|w| w.sel == StructSel::dest_table())
            .map(|w| w.phys)
            .collect();
        assert_eq!(disable_order, vec![0, 0, 1, 1]);
    }

    #[test]
    fn identical_adds_share_rows_until_last_remove() {
        let mut r = chain();
        let route = route_over(&r, &[0, 1, 2]);
        let dest = route.dst.cid;
        let mut table = RouteTable::new();
        assert!(table.add(&mut r.model, route.clone()).expect("first add"));
        assert!(!table.add(&mut r.model, route.clone()).expect("second add"));
        assert_eq!(table.refs(&route), 2);

        table.remove(&mut r.model, &route).expect("first remove");
        assert!(read_row(&mut r, 1, dest, 1).valid().expect("valid"));
        table.remove(&mut r.model, &route).expect("last remove");
        assert!(!read_row(&mut r, 1, dest, 1).valid().expect("valid"));
        assert!(!read_row(&mut r, 1, dest, 0).valid().expect("summary"));
        assert_eq!(table.refs(&route), 0);
    }

    #[test]
    fn over_remove_is_a_no_op() {
        let mut r = chain();
        let route = route_over(&r, &[0, 1, 2]);
        let mut table = RouteTable::new();
        assert!(!table.remove(&mut r.model, &route).expect("remove nothing"));
        table.add(&mut r.model, route.clone()).expect("add");
        table.remove(&mut r.model, &route).expect("remove");
        assert!(!table.remove(&mut r.model, &route).expect("extra remove"));
    }

    #[test]
    fn shorter_route_lowers_shared_row_and_summary() {
        // 0 -- 1 -- 3 and 0 -- 1 -- 2 -- 3 share 0's egress 0 row.
        let mut r = rig(
            4,
            &[(0, 0, 1, 0), (1, 1, 3, 0), (1, 2, 2, 0), (2, 1, 3, 1)],
        );
        let long = route_over(&r, &[0, 1, 2, 3]);
        let short = route_over(&r, &[0, 1, 3]);
        let dest = long.dst.cid;
        let mut table = RouteTable::new();

        table.add(&mut r.model, long).expect("long");
        assert_eq!(read_row(&mut r, 0, dest, 1).hop_count().expect("hc"), 3);

        r.model.clear_write_log();
        table.add(&mut r.model, short).expect("short");
        // Shared source row rewritten with the lower hop count.
        assert_eq!(read_row(&mut r, 0, dest, 1).hop_count().expect("hc"), 2);
        assert_eq!(table.summary_of(r.ids[0], dest), Some((0, 2)));
    }

    #[test]
    fn row_not_rewritten_when_hop_count_equal() {
        let mut r = rig(3, &[(0, 0, 1, 0), (0, 1, 1, 1), (1, 2, 2, 0)]);
        let a = route_over(&r, &[0, 1, 2]);
        let mut table = RouteTable::new();
        table.add(&mut r.model, a.clone()).expect("a");
        // A second identical-length route through the same shared last hop
        // leaves that row untouched.
        let b = {
            let e0 = r.topo.edges_between(r.ids[0], r.ids[1])[1];
            let e1 = r.topo.edges_between(r.ids[1], r.ids[2])[0];
            Route::from_candidate(
                &r.topo,
                &PathCandidate {
                    comps: vec![r.ids[0], r.ids[1], r.ids[2]],
                    edges: vec![e0, e1],
                },
            )
            .expect("b")
        };
        r.model.clear_write_log();
        table.add(&mut r.model, b).expect("add b");
        let writes_to_shared_row: usize = r
            .model
            .write_log()
            .iter()
            .filter(|w| {
                w.phys == 1
                    && w.sel == StructSel::dest_table()
                    && w.offset == row_offset(a.dst.cid, 1)
            })
            .count();
        assert_eq!(writes_to_shared_row, 0);
    }

    #[test]
    fn capacity_exhaustion_is_reported_before_writing() {
        // Four parallel links 0 -- 1: only three non-summary entries exist.
        let mut r = rig(
            2,
            &[(0, 0, 1, 0), (0, 1, 1, 1), (0, 2, 1, 2), (0, 3, 1, 3)],
        );
        let mut table = RouteTable::new();
        let edges: Vec<EdgeId> = r.topo.edges_between(r.ids[0], r.ids[1]);
        for e in &edges[..3] {
            let route = Route::from_candidate(
                &r.topo,
                &PathCandidate {
                    comps: vec![r.ids[0], r.ids[1]],
                    edges: vec![*e],
                },
            )
            .expect("route");
            table.add(&mut r.model, route).expect("add");
        }
        let fourth = Route::from_candidate(
            &r.topo,
            &PathCandidate {
                comps: vec![r.ids[0], r.ids[1]],
                edges: vec![edges[3]],
            },
        )
        .expect("route");
        r.model.clear_write_log();
        assert_eq!(
            table.add(&mut r.model, fourth.clone()),
            Err(FabricError::Exhausted("destination table entry"))
        );
        assert!(r.model.write_log().is_empty());
        assert!(!table.has_capacity(&fourth));
    }

    #[test]
    fn link_down_tears_down_and_reports_pairs() {
        let mut r = chain();
        let route = route_over(&r, &[0, 1, 2]);
        let dest = route.dst.cid;
        let pair = (route.src, route.dst);
        let mut table = RouteTable::new();
        table.add(&mut r.model, route.clone()).expect("add");
        table.add(&mut r.model, route.clone()).expect("re-add");

        let edge = route.hops[1].edge;
        let affected = table.on_link_down(&mut r.model, edge).expect("link down");
        assert_eq!(affected, vec![pair]);
        // Rows are gone regardless of the reference count.
        assert!(!read_row(&mut r, 0, dest, 1).valid().expect("valid"));
        assert!(!read_row(&mut r, 1, dest, 1).valid().expect("valid"));
        assert!(table.routes_for(pair.0, pair.1).is_empty());
    }

    #[test]
    fn program_pair_honors_route_cap() {
        // Triangle: direct 0 -- 2 plus detour through 1.
        let mut r = rig(3, &[(0, 0, 2, 0), (0, 1, 1, 0), (1, 1, 2, 1)]);
        let mut table = RouteTable::new();
        let cfg = RoutingConfig {
            min_paths: 2,
            cutoff_factor: 2.0,
            max_routes: Some(1),
        };
        let left = program_pair(&mut r.model, &r.topo, &mut table, &cfg, r.ids[0], r.ids[2])
            .expect("program");
        assert_eq!(left, 1);
        let kept = table.routes_for(r.gcids[0], r.gcids[2]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].hop_count(), 1);
    }

    #[test]
    fn program_pair_unreachable_when_disconnected() {
        let mut r = rig(2, &[]);
        let mut table = RouteTable::new();
        assert!(matches!(
            program_pair(
                &mut r.model,
                &r.topo,
                &mut table,
                &RoutingConfig::default(),
                r.ids[0],
                r.ids[1],
            ),
            Err(FabricError::Unreachable { .. })
        ));
    }
}
