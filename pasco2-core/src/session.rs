use std::sync::atomic::{AtomicBool, Ordering};

/// Flags shared between the acquisition loop and the console.
///
/// The console writes, the acquisition loop reads once per cycle. Each flag
/// is an independent atomic with relaxed ordering, so a reader may see a
/// value that is up to one cycle stale. Both flags only gate console output
/// and never touch sensor state, so a stale read changes what gets printed
/// and nothing else.
///
/// The measurement period is deliberately absent: it lives in the sensor's
/// own configuration registers.
#[derive(Debug)]
pub struct SessionState {
    /// Print not-ready, communication and fault diagnostics.
    diagnostics_enabled: AtomicBool,

    /// Print concentration values (cleared while a console command runs).
    display_enabled: AtomicBool,
}

impl SessionState {
    /// Create the startup state: diagnostics off, display on.
    pub const fn new() -> Self {
        Self {
            diagnostics_enabled: AtomicBool::new(false),
            display_enabled: AtomicBool::new(true),
        }
    }

    /// Whether diagnostic lines are requested.
    ///
    /// # Returns
    /// * `bool` - The last value written, possibly one cycle stale.
    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics_enabled.load(Ordering::Relaxed)
    }

    /// Turn diagnostic lines on or off.
    ///
    /// # Arguments
    /// * `enabled` - The new value.
    pub fn set_diagnostics_enabled(&self, enabled: bool) {
        self.diagnostics_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether concentration values are printed.
    ///
    /// # Returns
    /// * `bool` - The last value written, possibly one cycle stale.
    pub fn display_enabled(&self) -> bool {
        self.display_enabled.load(Ordering::Relaxed)
    }

    /// Turn concentration output on or off. Prefer [`Self::pause_display`]
    /// for temporary suppression.
    ///
    /// # Arguments
    /// * `enabled` - The new value.
    pub fn set_display_enabled(&self, enabled: bool) {
        self.display_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether a diagnostic line may be printed: requires both flags.
    pub fn should_log_diagnostics(&self) -> bool {
        self.diagnostics_enabled() && self.display_enabled()
    }

    /// Suppress concentration output until the returned guard is dropped.
    ///
    /// # Returns
    /// * `DisplayPause` - Guard that re-enables the display on drop.
    pub fn pause_display(&self) -> DisplayPause<'_> {
        self.set_display_enabled(false);
        DisplayPause { session: self }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the display disabled for the lifetime of a console command.
#[must_use]
pub struct DisplayPause<'a> {
    session: &'a SessionState,
}

impl Drop for DisplayPause<'_> {
    fn drop(&mut self) {
        self.session.set_display_enabled(true);
    }
}

/// Tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_display_on_and_diagnostics_off() {
        let session = SessionState::new();

        assert!(session.display_enabled());
        assert!(!session.diagnostics_enabled());
        assert!(!session.should_log_diagnostics());
    }

    #[test]
    fn diagnostics_require_display() {
        let session = SessionState::new();
        session.set_diagnostics_enabled(true);
        assert!(session.should_log_diagnostics());

        session.set_display_enabled(false);
        assert!(!session.should_log_diagnostics());
    }

    #[test]
    fn pause_restores_display_on_drop() {
        let session = SessionState::new();

        {
            let _pause = session.pause_display();
            assert!(!session.display_enabled());
        }

        assert!(session.display_enabled());
    }

    #[test]
    fn pause_restores_display_even_if_it_was_off() {
        let session = SessionState::new();
        session.set_display_enabled(false);

        drop(session.pause_display());

        assert!(session.display_enabled());
    }

    #[test]
    fn flags_are_set_independently() {
        let session = SessionState::new();

        session.set_diagnostics_enabled(true);
        session.set_display_enabled(false);
        assert!(session.diagnostics_enabled());
        assert!(!session.display_enabled());

        session.set_diagnostics_enabled(false);
        assert!(!session.display_enabled());
    }
}
