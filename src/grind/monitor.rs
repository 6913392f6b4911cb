//! Attempt monitor
//!
//! Counts fail transitions and decides when a grinding session should stop.

use std::collections::VecDeque;

use ndarray::ArrayView3;

use super::state::{ProgressBarState, StopReason};
use super::MonitorError;
use crate::vision::{ColorStateClassifier, StateClassifier, VisionError};

/// Number of recent states kept for the success/connection-error checks
pub const HISTORY_WINDOW: usize = 4;

/// Tracks classifications for one session
pub struct AttemptMonitor<C = ColorStateClassifier> {
    classifier: C,
    max_attempts: u32,
    fail_count: u32,
    recent_states: VecDeque<ProgressBarState>,
    current_state: Option<ProgressBarState>,
}

impl<C: StateClassifier> AttemptMonitor<C> {
    /// Create a monitor; `max_attempts` must be at least 1
    pub fn new(classifier: C, max_attempts: u32) -> Result<Self, MonitorError> {
        if max_attempts == 0 {
            return Err(MonitorError::InvalidMaxAttempts(max_attempts));
        }

        Ok(Self {
            classifier,
            max_attempts,
            fail_count: 0,
            recent_states: VecDeque::with_capacity(HISTORY_WINDOW),
            current_state: None,
        })
    }

    /// Classify a frame and fold it into the session state
    pub fn process(
        &mut self,
        image: ArrayView3<'_, u8>,
    ) -> Result<ProgressBarState, VisionError> {
        let state = self.classifier.classify(image)?;
        let previous = self.current_state;

        if state.is_fail() && !previous.is_some_and(|p| p.is_fail()) {
            self.fail_count += 1;
        }

        if self.recent_states.len() == HISTORY_WINDOW {
            self.recent_states.pop_front();
        }
        self.recent_states.push_back(state);
        self.current_state = Some(state);

        log::debug!(
            "Progress bar {} -> {} (fail_count={})",
            previous.map_or("none", |p| p.as_str()),
            state,
            self.fail_count
        );

        Ok(state)
    }

    /// Why the session should stop, if it should
    ///
    /// Evaluated fresh on every call. The attempt cap wins over the
    /// windowed checks.
    pub fn stop_reason(&self) -> Option<StopReason> {
        let reason = if self.fail_count >= self.max_attempts {
            Some(StopReason::MaxAttemptsReached)
        } else if self.window_is(ProgressBarState::Standby) {
            Some(StopReason::Success)
        } else if self.window_is(ProgressBarState::ConnectionError) {
            Some(StopReason::ConnectionError)
        } else {
            None
        };

        if let Some(reason) = reason {
            log::debug!("Stop condition {} (fail_count={})", reason, self.fail_count);
        }

        reason
    }

    fn window_is(&self, state: ProgressBarState) -> bool {
        self.recent_states.len() == HISTORY_WINDOW
            && self.recent_states.iter().all(|s| *s == state)
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    pub fn current_state(&self) -> Option<ProgressBarState> {
        self.current_state
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Oldest first
    pub fn recent_states(&self) -> impl Iterator<Item = ProgressBarState> + '_ {
        self.recent_states.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use log::Level;
    use ndarray::Array3;

    use super::*;
    use crate::grind::state::ProgressBarState::*;
    use crate::test_support::{at_level, capture_logs};

    fn frame(state: ProgressBarState) -> Array3<u8> {
        let [b, g, r] = match state {
            Fail => [20, 20, 200],
            Progress => [30, 150, 160],
            Standby => [10, 10, 10],
            ConnectionError => [200, 50, 50],
            Unknown => [200, 200, 200],
        };
        Array3::from_shape_fn((4, 16, 3), |(_, _, c)| [b, g, r][c])
    }

    fn feed(monitor: &mut AttemptMonitor, states: &[ProgressBarState]) {
        for &state in states {
            assert_eq!(monitor.process(frame(state).view()).unwrap(), state);
        }
    }

    fn monitor(max_attempts: u32) -> AttemptMonitor {
        let classifier = ColorStateClassifier::new();
        AttemptMonitor::new(classifier, max_attempts).unwrap()
    }

    #[test]
    fn test_rejects_zero_max_attempts() {
        let result = AttemptMonitor::new(ColorStateClassifier::new(), 0);
        assert!(matches!(result, Err(MonitorError::InvalidMaxAttempts(0))));
    }

    #[test]
    fn test_initial_state() {
        let monitor = monitor(3);
        assert_eq!(monitor.fail_count(), 0);
        assert_eq!(monitor.current_state(), None);
        assert_eq!(monitor.max_attempts(), 3);
        assert_eq!(monitor.stop_reason(), None);
    }

    #[test]
    fn test_consecutive_fails_count_once() {
        let mut monitor = monitor(10);
        feed(&mut monitor, &[Standby, Fail, Fail, Standby, Fail]);

        assert_eq!(monitor.fail_count(), 2);
        assert_eq!(monitor.current_state(), Some(Fail));
    }

    #[test]
    fn test_first_frame_fail_counts() {
        let mut monitor = monitor(10);
        feed(&mut monitor, &[Fail]);
        assert_eq!(monitor.fail_count(), 1);
    }

    #[test]
    fn test_max_attempts_reached_on_second_fail() {
        let mut monitor = monitor(2);

        feed(&mut monitor, &[Progress, Fail]);
        assert_eq!(monitor.stop_reason(), None);

        feed(&mut monitor, &[Progress, Fail]);
        assert_eq!(monitor.stop_reason(), Some(StopReason::MaxAttemptsReached));
    }

    #[test]
    fn test_max_attempts_wins_over_success_window() {
        let mut monitor = monitor(1);
        feed(&mut monitor, &[Fail, Standby, Standby, Standby, Standby]);
        assert_eq!(monitor.stop_reason(), Some(StopReason::MaxAttemptsReached));
    }

    #[test]
    fn test_success_needs_four_standby() {
        let mut monitor = monitor(5);

        feed(&mut monitor, &[Standby, Standby, Standby]);
        assert_eq!(monitor.stop_reason(), None);

        feed(&mut monitor, &[Standby]);
        assert_eq!(monitor.stop_reason(), Some(StopReason::Success));
    }

    #[test]
    fn test_connection_error_window() {
        let mut monitor = monitor(5);
        feed(
            &mut monitor,
            &[ConnectionError, ConnectionError, ConnectionError, ConnectionError],
        );
        assert_eq!(monitor.stop_reason(), Some(StopReason::ConnectionError));
    }

    #[test]
    fn test_single_noisy_frame_breaks_window() {
        let mut monitor = monitor(5);
        feed(&mut monitor, &[Standby, Standby, Unknown, Standby]);
        assert_eq!(monitor.stop_reason(), None);

        // Noise rotates out of the window
        feed(&mut monitor, &[Standby, Standby, Standby]);
        assert_eq!(monitor.stop_reason(), Some(StopReason::Success));
    }

    #[test]
    fn test_each_frame_logs_one_transition() {
        let mut monitor = monitor(3);
        feed(&mut monitor, &[Progress]);

        let (_, records) = capture_logs(|| feed(&mut monitor, &[Fail]));

        assert_eq!(records.len(), 1);
        let debug = at_level(&records, Level::Debug);
        assert_eq!(debug, vec!["Progress bar progress -> fail (fail_count=1)"]);
    }

    #[test]
    fn test_stop_reason_logs_reason_and_count() {
        let mut monitor = monitor(2);
        feed(&mut monitor, &[Fail, Progress, Fail]);

        let (reason, records) = capture_logs(|| monitor.stop_reason());

        assert_eq!(reason, Some(StopReason::MaxAttemptsReached));
        assert_eq!(records.len(), 1);
        let debug = at_level(&records, Level::Debug);
        assert!(debug[0].contains("max_attempts_reached"));
        assert!(debug[0].contains("fail_count=2"));
    }

    #[test]
    fn test_no_stop_reason_logs_nothing() {
        let mut monitor = monitor(5);
        feed(&mut monitor, &[Standby, Standby, Standby]);

        let (reason, records) = capture_logs(|| monitor.stop_reason());

        assert_eq!(reason, None);
        assert!(records.is_empty());
    }

    #[test]
    fn test_history_window_is_bounded() {
        let mut monitor = monitor(50);
        feed(
            &mut monitor,
            &[Progress, Fail, Progress, Standby, Unknown, Progress],
        );

        let recent: Vec<_> = monitor.recent_states().collect();
        assert_eq!(recent, vec![Progress, Standby, Unknown, Progress]);
    }

    #[test]
    fn test_invalid_frame_propagates() {
        let mut monitor = monitor(3);
        let bad = Array3::<u8>::zeros((4, 4, 4));

        assert!(matches!(
            monitor.process(bad.view()),
            Err(VisionError::InvalidFrame(_))
        ));
        assert_eq!(monitor.current_state(), None);
        assert_eq!(monitor.recent_states().count(), 0);
    }
}
