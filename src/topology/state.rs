use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phase of the cluster topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TopoState {
    Initializing = 0,
    Initialized = 1,
    Finished = 2,
    Failed = 3,
}

impl TopoState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TopoState::Initializing,
            1 => TopoState::Initialized,
            2 => TopoState::Finished,
            _ => TopoState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TopoState::Finished | TopoState::Failed)
    }
}

impl fmt::Display for TopoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopoState::Initializing => "initializing",
            TopoState::Initialized => "initialized",
            TopoState::Finished => "finished",
            TopoState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lock-free holder of the topology state.
///
/// Writers only move the state with [`TopoStateCell::transition`], which
/// compares against the expected source state, so terminal states are never left.
#[derive(Debug)]
pub struct TopoStateCell(AtomicU8);

impl TopoStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(TopoState::Initializing as u8))
    }

    pub fn load(&self) -> TopoState {
        TopoState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to`. Returns false if the current state was not `from`.
    pub fn transition(&self, from: TopoState, to: TopoState) -> bool {
        let moved = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            tracing::info!("Topology state changed: {} -> {}", from, to);
        }
        moved
    }
}

impl Default for TopoStateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_requires_expected_state() {
        let cell = TopoStateCell::new();
        assert_eq!(cell.load(), TopoState::Initializing);
        assert!(!cell.transition(TopoState::Initialized, TopoState::Finished));
        assert!(cell.transition(TopoState::Initializing, TopoState::Initialized));
        assert!(!cell.transition(TopoState::Initializing, TopoState::Initialized));
        assert!(cell.transition(TopoState::Initialized, TopoState::Finished));
        assert_eq!(cell.load(), TopoState::Finished);
    }

    #[test]
    fn test_failed_is_terminal() {
        let cell = TopoStateCell::new();
        assert!(cell.transition(TopoState::Initializing, TopoState::Failed));
        assert!(!cell.transition(TopoState::Initializing, TopoState::Initialized));
        assert_eq!(cell.load(), TopoState::Failed);
        assert!(cell.load().is_terminal());
    }
}
