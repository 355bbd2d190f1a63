//! Change notifications emitted by the bench.

use std::fmt;

/// Something observable changed on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchEvent {
    /// Beams (and element data) of rows `start..=end` were recomputed.
    DataChanged { start: usize, end: usize },
    OpticsAdded { index: usize },
    OpticsRemoved { index: usize, count: usize },
    TargetBeamChanged,
    /// Fit `index` was added, edited or removed.
    FitChanged { index: usize },
    WavelengthChanged,
}

/// Observer of bench events. Called synchronously, after the bench state
/// is consistent again.
pub trait BenchListener {
    fn on_event(&mut self, event: &BenchEvent);
}

#[derive(Default)]
pub(crate) struct Listeners(Vec<Box<dyn BenchListener>>);

impl Listeners {
    pub(crate) fn push(&mut self, listener: Box<dyn BenchListener>) {
        self.0.push(listener);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Box<dyn BenchListener>> {
        self.0.last_mut()
    }

    pub(crate) fn emit(&mut self, event: BenchEvent) {
        for listener in &mut self.0 {
            listener.on_event(&event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.0.len())
    }
}
