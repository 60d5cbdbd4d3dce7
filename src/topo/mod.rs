// CLASSIFICATION: COMMUNITY
// Filename: topo/mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-10

//! Topology graph, multi-path routing, and table programming.

pub mod graph;
pub mod paths;
pub mod route;
pub mod snapshot;
pub mod table;

pub use graph::{Edge, Topology};
pub use paths::{compute_paths, PathCandidate};
pub use route::{Hop, Route};
pub use snapshot::{FabricSnapshot, SNAPSHOT_VERSION};
pub use table::{program_pair, RouteTable, ENTRIES_PER_ROW};
