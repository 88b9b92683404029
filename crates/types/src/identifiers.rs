//! Domain-specific identifier types.

use sbor::prelude::*;
use std::fmt;

/// Validator identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct ValidatorId(pub u64);

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self.0)
    }
}

/// Consensus round number. Strictly increases within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BasicSbor)]
#[sbor(transparent)]
pub struct View(pub u64);

impl View {
    /// The genesis view.
    pub const GENESIS: Self = View(0);

    pub fn genesis() -> Self {
        Self::GENESIS
    }

    pub fn is_genesis(self) -> bool {
        self.0 == 0
    }

    /// Get the next view.
    pub fn next(self) -> Self {
        View(self.0 + 1)
    }

    /// Get the previous view (returns None at genesis).
    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).map(View)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "View({})", self.0)
    }
}

/// Validator-set era. An epoch ends with a committed end-of-epoch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BasicSbor)]
#[sbor(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch({})", self.0)
    }
}
