// CLASSIFICATION: COMMUNITY
// Filename: interface.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Interface model: link state, PHY sub-state, usability, peer reference.

use crate::lattice_types::{ComponentId, IfaceNum};

/// Interface link state, mirroring the 3-bit hardware code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IState {
    /// Link down.
    Down,
    /// Link training / configuration.
    Cfg,
    /// Link up.
    Up,
    /// Link up in low power.
    Lp,
}

impl IState {
    /// Decode the raw hardware code; unknown codes read as Down.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => IState::Cfg,
            2 => IState::Up,
            3 => IState::Lp,
            _ => IState::Down,
        }
    }

    /// Raw hardware code.
    #[must_use]
    pub fn to_raw(self) -> u64 {
        match self {
            IState::Down => 0,
            IState::Cfg => 1,
            IState::Up => 2,
            IState::Lp => 3,
        }
    }
}

/// PHY sub-state beneath the interface state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyState {
    /// PHY down.
    Down,
    /// Training.
    Training,
    /// Up at full power.
    Up,
    /// Up in a low-power state.
    UpLp,
}

impl PhyState {
    /// Decode the raw hardware code; unknown codes read as Down.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => PhyState::Training,
            2 => PhyState::Up,
            3 => PhyState::UpLp,
            _ => PhyState::Down,
        }
    }

    /// Raw hardware code.
    #[must_use]
    pub fn to_raw(self) -> u64 {
        match self {
            PhyState::Down => 0,
            PhyState::Training => 1,
            PhyState::Up => 2,
            PhyState::UpLp => 3,
        }
    }

    /// Whether the interface may be enabled on this PHY state.
    #[must_use]
    pub fn is_up(self) -> bool {
        matches!(self, PhyState::Up | PhyState::UpLp)
    }
}

/// Weak reference to the interface on the other end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRef {
    /// Peer component handle.
    pub comp: ComponentId,
    /// Interface number on the peer.
    pub iface: IfaceNum,
}

/// One interface of a component.
#[derive(Debug, Clone)]
pub struct Interface {
    /// Hardware interface number.
    pub num: IfaceNum,
    /// Link state.
    pub istate: IState,
    /// PHY sub-state.
    pub phy: PhyState,
    /// Whether routing may use this interface.
    pub usable: bool,
    /// Peer reference, established by the link-control protocol and cleared
    /// when the link drops.
    pub peer: Option<PeerRef>,
    /// Measured path time from the path-time exchange, if run.
    pub path_time: Option<u32>,
}

impl Interface {
    /// A fresh interface in the Down state.
    #[must_use]
    pub fn down(num: IfaceNum) -> Self {
        Self {
            num,
            istate: IState::Down,
            phy: PhyState::Down,
            usable: false,
            peer: None,
            path_time: None,
        }
    }

    /// Usability from link state plus PHY sub-state.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.usable && matches!(self.istate, IState::Up | IState::Lp) && self.phy.is_up()
    }

    /// Drop to Down and clear the peer reference.
    pub fn mark_down(&mut self) {
        self.istate = IState::Down;
        self.phy = PhyState::Down;
        self.usable = false;
        self.peer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn istate_codes_round_trip() {
        for s in [IState::Down, IState::Cfg, IState::Up, IState::Lp] {
            assert_eq!(IState::from_raw(s.to_raw()), s);
        }
    }

    #[test]
    fn usability_needs_link_and_phy() {
        let mut i = Interface::down(0);
        assert!(!i.is_usable());
        i.istate = IState::Up;
        i.phy = PhyState::Up;
        i.usable = true;
        assert!(i.is_usable());
        i.phy = PhyState::Training;
        assert!(!i.is_usable());
    }

    #[test]
    fn mark_down_clears_peer() {
        let mut i = Interface::down(1);
        i.peer = Some(PeerRef {
            comp: crate::lattice_types::ComponentId(0),
            iface: 2,
        });
        i.mark_down();
        assert!(i.peer.is_none());
    }
}
