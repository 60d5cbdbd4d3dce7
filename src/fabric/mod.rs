// CLASSIFICATION: COMMUNITY
// Filename: fabric/mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-07-28

//! Component and interface bring-up state machines plus the fabric crawl.

pub mod bringup;
pub mod component;
pub mod discovery;
pub mod interface;
pub mod link;

pub use bringup::{bring_up_component, bring_up_interface, BringUpOutcome};
pub use component::{class_ops, CState, Component};
pub use discovery::{CidAllocator, Discovery};
pub use interface::{IState, Interface, PeerRef, PhyState};
pub use link::{LinkCtl, PeerAttrs};
