//! Async view state with staleness protection.
//!
//! Requests are never cancelled in flight; a view that closes or retargets
//! simply stops caring about the answer. [`AsyncView`] makes that safe with
//! a generation counter: [`AsyncView::begin`] hands out a token, and a
//! response only lands if its token still matches. Bumping the generation
//! with [`AsyncView::invalidate`] strands every outstanding response.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct AsyncView<T> {
    data: Option<T>,
    in_flight: bool,
    error: Option<String>,
    fetched_at: Option<Instant>,
    generation: u64,
}

impl<T> Default for AsyncView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncView<T> {
    pub fn new() -> Self {
        Self {
            data: None,
            in_flight: false,
            error: None,
            fetched_at: None,
            generation: 0,
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    /// Age of the data on screen.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    /// Marks a request as started and returns the token its response must
    /// present to land.
    pub fn begin(&mut self) -> u64 {
        self.in_flight = true;
        self.generation
    }

    /// Applies a successful response. Returns false (and changes nothing)
    /// when the token is stale.
    pub fn finish(&mut self, token: u64, data: T) -> bool {
        if token != self.generation {
            return false;
        }
        self.data = Some(data);
        self.error = None;
        self.in_flight = false;
        self.fetched_at = Some(Instant::now());
        true
    }

    /// Records a failed response, keeping any previously shown data.
    /// Returns false when the token is stale.
    pub fn fail(&mut self, token: u64, error: impl Into<String>) -> bool {
        if token != self.generation {
            return false;
        }
        self.error = Some(error.into());
        self.in_flight = false;
        true
    }

    /// Sets an error outside the request cycle (input validation and the
    /// like).
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Strands all outstanding responses and drops local state. Called when
    /// the view closes or switches target.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.in_flight = false;
        self.data = None;
        self.error = None;
        self.fetched_at = None;
    }
}

/// Operator-selectable polling cadence for one view.
#[derive(Debug, Clone)]
pub struct RefreshCadence {
    choices: &'static [u64],
    index: usize,
    enabled: bool,
}

impl RefreshCadence {
    /// Cadence starting at `default_secs` (or the first choice when that is
    /// not on the menu), initially disabled.
    pub fn new(choices: &'static [u64], default_secs: u64) -> Self {
        let index = choices
            .iter()
            .position(|&secs| secs == default_secs)
            .unwrap_or(0);
        Self {
            choices,
            index,
            enabled: false,
        }
    }

    /// Same, but polling from the start.
    pub fn enabled(choices: &'static [u64], default_secs: u64) -> Self {
        let mut cadence = Self::new(choices, default_secs);
        cadence.enabled = true;
        cadence
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flips polling on or off and reports the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn interval_secs(&self) -> u64 {
        self.choices[self.index]
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs())
    }

    /// Rotates to the next interval on the menu and returns it.
    pub fn cycle(&mut self) -> u64 {
        self.index = (self.index + 1) % self.choices.len();
        self.interval_secs()
    }

    /// Whether the view is due for a poll: enabled, nothing in flight, and
    /// the last fetch is old enough (or there has been none).
    pub fn due<T>(&self, view: &AsyncView<T>) -> bool {
        if !self.enabled || view.is_in_flight() {
            return false;
        }
        match view.fetched_at() {
            None => true,
            Some(at) => at.elapsed() >= self.interval(),
        }
    }
}
