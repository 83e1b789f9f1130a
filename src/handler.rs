//! Cooperative cancellation of long-running compilations.

use std::fmt::{self, Display};

/// Points at which a compilation polls its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputationEvent {
    /// The compilation is about to start.
    SddComputationStarted,
    /// The top-down compiler is about to case-split on a variable.
    SddShannonExpansion,
}

impl Display for ComputationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputationEvent::SddComputationStarted => write!(f, "SDD computation started"),
            ComputationEvent::SddShannonExpansion => write!(f, "SDD Shannon expansion"),
        }
    }
}

/// Decides whether a running computation may continue.
pub trait ComputationHandler {
    /// Returns false to abort the computation at `event`.
    fn should_resume(&mut self, event: ComputationEvent) -> bool;
}

/// Handler that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandler;

impl ComputationHandler for NopHandler {
    fn should_resume(&mut self, _event: ComputationEvent) -> bool {
        true
    }
}

/// Cancels the compilation once more than `limit` Shannon expansions were requested.
#[derive(Debug, Clone, Copy)]
pub struct ShannonExpansionLimit {
    limit: usize,
    count: usize,
}

impl ShannonExpansionLimit {
    pub fn new(limit: usize) -> Self {
        Self { limit, count: 0 }
    }

    /// Number of Shannon expansions allowed so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl ComputationHandler for ShannonExpansionLimit {
    fn should_resume(&mut self, event: ComputationEvent) -> bool {
        if event != ComputationEvent::SddShannonExpansion {
            return true;
        }
        if self.count >= self.limit {
            return false;
        }
        self.count += 1;
        true
    }
}

/// A computation was aborted by its handler at `event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancellation {
    pub event: ComputationEvent,
}

impl Display for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "computation canceled at: {}", self.event)
    }
}

impl std::error::Error for Cancellation {}

/// Polls `handler`, turning a refusal into a [`Cancellation`].
pub(crate) fn check(handler: &mut dyn ComputationHandler, event: ComputationEvent) -> Result<(), Cancellation> {
    if handler.should_resume(event) {
        Ok(())
    } else {
        Err(Cancellation { event })
    }
}
