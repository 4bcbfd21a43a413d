//! Size fallback state machine
//!
//! One [`SizeFallback`] drives the variants tried for a single requested
//! output. A not-found fetch moves to the next variant of the configured chain;
//! any other failure ends the walk immediately, because fallback is meant for
//! absent resources only, not for server or transport trouble.

use crate::types::Size;

/// Position of a [`SizeFallback`] walk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackState {
    /// Fetching the originally requested variant
    Requested(Size),
    /// Fetching a lower-tier replacement
    Fallback(Size),
    /// No variant left to try
    Exhausted,
}

/// Fallback walk for one requested output
#[derive(Clone, Debug)]
pub struct SizeFallback {
    requested: Size,
    chain: Vec<Size>,
    next: usize,
    state: FallbackState,
}

impl SizeFallback {
    /// Start a walk at `requested`, falling back through `chain` in order
    ///
    /// Pass an empty chain to disable fallback.
    pub fn new(requested: Size, chain: &[Size]) -> Self {
        Self {
            requested,
            chain: chain.to_vec(),
            next: 0,
            state: FallbackState::Requested(requested),
        }
    }

    /// Start a walk honoring the fallback-enable flag
    pub fn with_enabled(requested: Size, chain: &[Size], enabled: bool) -> Self {
        if enabled {
            Self::new(requested, chain)
        } else {
            Self::new(requested, &[])
        }
    }

    /// Variant originally requested
    pub fn requested(&self) -> Size {
        self.requested
    }

    /// Current state
    pub fn state(&self) -> FallbackState {
        self.state
    }

    /// Variant to fetch now, or `None` once exhausted
    pub fn current(&self) -> Option<Size> {
        match self.state {
            FallbackState::Requested(size) | FallbackState::Fallback(size) => Some(size),
            FallbackState::Exhausted => None,
        }
    }

    /// The current variant was not found; move to the next one
    pub fn on_not_found(&mut self) -> FallbackState {
        self.state = match self.chain.get(self.next) {
            Some(&size) => {
                self.next += 1;
                FallbackState::Fallback(size)
            }
            None => FallbackState::Exhausted,
        };
        self.state
    }

    /// The current variant failed for a reason other than absence; stop here
    pub fn on_failure(&mut self) -> FallbackState {
        self.state = FallbackState::Exhausted;
        self.state
    }
}
