// CLASSIFICATION: COMMUNITY
// Filename: fabctl.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-18

//! Inspect latticefm snapshot dumps.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use latticefm::lattice_types::Gcid;
use latticefm::topo::snapshot::FabricSnapshot;

#[derive(Parser)]
#[command(name = "fabctl", about = "Fabric snapshot inspection tool")]
struct Cli {
    /// Snapshot JSON written by latticefm_d.
    #[arg(long, default_value = "latticefm-snapshot.json")]
    snapshot: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print components and links.
    Topology,
    /// Print routes between a pair, `sid:cid` hex addresses.
    Routes {
        #[arg(long)]
        src: String,
        #[arg(long)]
        dst: String,
    },
    /// Print access partitions and resource key domains.
    Keys,
}

fn parse_gcid(text: &str) -> anyhow::Result<Gcid> {
    let (sid, cid) = text
        .split_once(':')
        .with_context(|| format!("bad address {text:?}, expected sid:cid"))?;
    Ok(Gcid::new(
        u16::from_str_radix(sid, 16).with_context(|| format!("bad subnet id {sid:?}"))?,
        u16::from_str_radix(cid, 16).with_context(|| format!("bad component id {cid:?}"))?,
    ))
}

fn load(path: &PathBuf) -> anyhow::Result<FabricSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn show_topology(snap: &FabricSnapshot) {
    for c in &snap.components {
        let addr = c
            .gcid
            .map_or_else(|| "-".to_string(), |g| g.to_string());
        println!(
            "c{} {:<12} addr={addr} serial={:#x} cstate={} usable={} ifaces-up={:?}",
            c.index, c.class, c.serial, c.cstate, c.usable, c.up_ifaces
        );
    }
    for e in &snap.edges {
        let kind = if e.relay { "relay" } else { "link" };
        println!(
            "{kind} c{}.{} <-> c{}.{} usable={}",
            e.a.0, e.a.1, e.b.0, e.b.1, e.usable
        );
    }
}

fn show_routes(snap: &FabricSnapshot, src: Gcid, dst: Gcid) {
    let Some(pair) = snap.pairs.iter().find(|p| p.src == src && p.dst == dst) else {
        println!("no routes for {src} -> {dst}");
        return;
    };
    for (i, route) in pair.routes.iter().enumerate() {
        let hops: Vec<String> = route
            .hops
            .iter()
            .map(|h| format!("{}.{}", h.gcid, h.egress))
            .collect();
        println!("route {i}: {} hop(s): {}", route.hop_count(), hops.join(" -> "));
    }
}

fn show_keys(snap: &FabricSnapshot) {
    for p in &snap.partitions {
        let members: Vec<String> = p.members.iter().map(Gcid::to_string).collect();
        println!("partition akey={} members=[{}]", p.akey, members.join(", "));
    }
    for d in &snap.domains {
        println!("domain rkey={} members={:?}", d.key, d.members);
    }
    if snap.partitions.is_empty() && snap.domains.is_empty() {
        println!("no keys allocated");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let snap = load(&cli.snapshot)?;
    match cli.cmd {
        Command::Topology => show_topology(&snap),
        Command::Routes { src, dst } => {
            show_routes(&snap, parse_gcid(&src)?, parse_gcid(&dst)?);
        }
        Command::Keys => show_keys(&snap),
    }
    Ok(())
}
