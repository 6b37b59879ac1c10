// src/core/disk_state.rs

//! The tri-state disk lifecycle, stored as a relaxed atomic. No
//! happens-before coupling is assumed by readers; producers re-check under
//! the relevant stripe monitor where causality actually matters (e.g.
//! close-then-notify).

use std::sync::atomic::{AtomicU8, Ordering};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DiskState {
    #[strum(serialize = "OPEN")]
    Open,
    #[strum(serialize = "CLOSED")]
    Closed,
    #[strum(serialize = "DISABLED_BY_MAINTENANCE")]
    DisabledByMaintenance,
}

impl DiskState {
    fn to_u8(self) -> u8 {
        match self {
            DiskState::Open => 0,
            DiskState::Closed => 1,
            DiskState::DisabledByMaintenance => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => DiskState::Open,
            1 => DiskState::Closed,
            2 => DiskState::DisabledByMaintenance,
            _ => unreachable!("invalid DiskState encoding"),
        }
    }
}

#[derive(Debug)]
pub struct AtomicDiskState(AtomicU8);

impl AtomicDiskState {
    pub fn new(initial: DiskState) -> Self {
        Self(AtomicU8::new(initial.to_u8()))
    }

    pub fn load(&self) -> DiskState {
        DiskState::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, state: DiskState) {
        self.0.store(state.to_u8(), Ordering::Relaxed);
    }
}

impl Default for AtomicDiskState {
    fn default() -> Self {
        Self::new(DiskState::Open)
    }
}
