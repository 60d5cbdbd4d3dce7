// CLASSIFICATION: COMMUNITY
// Filename: keys/mod.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-08-12

//! Access-key partitions and resource key domains.

pub mod domain;
pub mod partition;
pub mod pool;

pub use domain::{DomainSet, MAX_RKEY};
pub use partition::{access_row_offset, Partitions, MAX_AKEY};
pub use pool::KeyPool;
