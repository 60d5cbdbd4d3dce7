// CLASSIFICATION: COMMUNITY
// Filename: lattice_types.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-02

//! Common cross-module types for the fabric manager.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Fabric-wide component address: subnet id plus component id.
///
/// The component id occupies 12 bits; the subnet id 16. Multi-subnet routing
/// is out of the behavior set, but the subnet id is carried so snapshots and
/// addresses stay faithful to the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gcid {
    /// Subnet identifier.
    pub sid: u16,
    /// Component identifier within the subnet (12 bits used).
    pub cid: u16,
}

impl Gcid {
    /// Build an address from subnet and component ids.
    #[must_use]
    pub fn new(sid: u16, cid: u16) -> Self {
        debug_assert!(cid < 0x1000);
        Self { sid, cid }
    }
}

impl fmt::Display for Gcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:03x}", self.sid, self.cid)
    }
}

/// Arena slot handle for a component in the topology graph.
///
/// Handles are stable for the life of the fabric; the structure graph is
/// cyclic (interface -> component -> interface), so owning references are
/// never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// Raw slot index, for snapshots and logs.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Arena slot handle for an edge (physical link) in the topology graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub(crate) usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Interface number local to a component.
pub type IfaceNum = u16;

/// Component class resolved once at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompClass {
    /// Host bridge; discovery starts here.
    Bridge,
    /// Switch with forwarding tables.
    Switch,
    /// Memory endpoint.
    Memory,
    /// Accelerator endpoint.
    Accelerator,
}

impl CompClass {
    /// Decode the class code carried in the core capability word.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(CompClass::Bridge),
            2 => Some(CompClass::Switch),
            3 => Some(CompClass::Memory),
            4 => Some(CompClass::Accelerator),
            _ => None,
        }
    }

    /// Class code carried in the core capability word.
    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            CompClass::Bridge => 1,
            CompClass::Switch => 2,
            CompClass::Memory => 3,
            CompClass::Accelerator => 4,
        }
    }
}

impl core::str::FromStr for CompClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(CompClass::Bridge),
            "switch" => Ok(CompClass::Switch),
            "memory" => Ok(CompClass::Memory),
            "accelerator" => Ok(CompClass::Accelerator),
            other => Err(format!("unknown component class {other:?}")),
        }
    }
}

impl fmt::Display for CompClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompClass::Bridge => "bridge",
            CompClass::Switch => "switch",
            CompClass::Memory => "memory",
            CompClass::Accelerator => "accelerator",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcid_renders_subnet_and_cid() {
        assert_eq!(Gcid::new(0x1, 0x2a).to_string(), "0001:02a");
    }
}
