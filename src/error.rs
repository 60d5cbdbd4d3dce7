// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-23

//! Fabric-wide error taxonomy.
//!
//! Data-integrity and timeout failures degrade the affected unit and stay
//! local to it; exhaustion and conflict surface to the caller of the failing
//! request; unreachability marks state instead of retrying.

use thiserror::Error;

use ctlspace_codec::CodecError;

use crate::lattice_types::Gcid;

/// Errors produced by fabric-management operations.
#[derive(Debug, Error, PartialEq)]
pub enum FabricError {
    /// Hardware returned the all-ones sentinel where valid data was
    /// expected. Fatal to the in-flight operation; the unit is degraded to
    /// unusable, never retried blindly.
    #[error("all-ones sentinel from {gcid} during {during}")]
    DataIntegrity {
        /// Component whose read produced the sentinel.
        gcid: Gcid,
        /// Operation in flight when the sentinel appeared.
        during: &'static str,
    },

    /// A link-control or configuration-window deadline expired.
    #[error("{what} timed out after {millis}ms")]
    Timeout {
        /// The operation that timed out.
        what: &'static str,
        /// Deadline that expired.
        millis: u64,
    },

    /// A link-control operation completed with an explicit failure status.
    /// The peer answered; it refused or could not serve the operation.
    #[error("{what} failed at {gcid}")]
    LinkOpFailed {
        /// The operation the hardware failed.
        what: &'static str,
        /// Component reporting the failure.
        gcid: Gcid,
    },

    /// No free key, routing-table entry, or addressing slot.
    #[error("no free {0}")]
    Exhausted(&'static str),

    /// A proposed address or key is already assigned.
    #[error("{what} {value} already assigned")]
    Conflict {
        /// Kind of resource in conflict.
        what: &'static str,
        /// The proposed value.
        value: u64,
    },

    /// No path exists between source and destination.
    #[error("no path from {src} to {dst}")]
    Unreachable {
        /// Route source.
        src: Gcid,
        /// Route destination.
        dst: Gcid,
    },

    /// Structure decode/encode failure from the control-space codec.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),

    /// A control-space address could not be resolved to a component.
    #[error("unknown control-space address {0}")]
    UnknownAddress(Gcid),

    /// Configuration file problems, reported at startup only.
    #[error("config: {0}")]
    Config(String),
}

/// Shorthand result used across the crate.
pub type Result<T> = core::result::Result<T, FabricError>;
