//! Grind Sentinel - upgrade-grinding helper
//!
//! This library watches an in-game progress bar, counts failed upgrade
//! attempts and toggles network adapters around a session so that failures
//! can be observed without being spent.
//!
//! ## Airplane Mode
//!
//! The `network` module disables the configured adapters before grinding
//! and re-enables them afterwards, waiting until connectivity confirms each
//! change.

pub mod config;
pub mod grind;
pub mod network;
pub mod vision;

#[cfg(test)]
pub(crate) mod test_support;

use crate::config::settings::Settings;
use crate::grind::{AttemptMonitor, MonitorError, ProgressBarState, StopReason};
use crate::network::{
    AdapterPlatform, Clock, ConnectivityProbe, NetworkAdapterController, NetworkError,
    PowerShellPlatform, ReachabilityProbe, SystemClock,
};
use crate::vision::{ColorStateClassifier, FrameSource, StateClassifier, VisionError};

/// One grinding session: capture loop plus adapter toggling
pub struct GrindSession<C, P, Q, K = SystemClock> {
    monitor: AttemptMonitor<C>,
    controller: NetworkAdapterController<P, Q, K>,
    settings: Settings,
}

impl GrindSession<ColorStateClassifier, PowerShellPlatform, ReachabilityProbe, SystemClock> {
    /// Wire up the production components from settings
    pub fn from_settings(settings: Settings) -> Result<Self, SessionError> {
        settings.validate()?;

        let max_attempts = settings.monitor.max_attempts;
        let monitor = AttemptMonitor::new(ColorStateClassifier::new(), max_attempts)?;
        let probe = ReachabilityProbe::new(settings.probe.probe_options()?);
        let controller = NetworkAdapterController::with_clock(
            PowerShellPlatform::new(),
            probe,
            SystemClock,
            settings.network.controller_options(),
        );

        Ok(Self::new(monitor, controller, settings))
    }
}

impl<C, P, Q, K> GrindSession<C, P, Q, K>
where
    C: StateClassifier,
    P: AdapterPlatform,
    Q: ConnectivityProbe,
    K: Clock,
{
    pub fn new(
        monitor: AttemptMonitor<C>,
        controller: NetworkAdapterController<P, Q, K>,
        settings: Settings,
    ) -> Self {
        Self {
            monitor,
            controller,
            settings,
        }
    }

    /// Run until a stop condition, the frame cap, or the end of `source`
    ///
    /// Adapters are re-enabled on every exit path once they were touched.
    /// An error from the capture loop takes precedence over a failed
    /// re-enable.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> Result<SessionReport, SessionError> {
        let adapters = self.session_adapters();

        let outcome = self
            .disable_adapters(&adapters)
            .and_then(|()| self.grind(source));
        let restored = self.restore_adapters(&adapters);

        let report = outcome?;
        restored?;

        log::info!(
            "Session finished: {:?} after {} frames, {} fails",
            report.end,
            report.frames,
            report.fail_count
        );
        Ok(report)
    }

    fn session_adapters(&self) -> Vec<String> {
        if self.settings.session.airplane_mode {
            self.settings.network.adapter_ids.clone()
        } else {
            Vec::new()
        }
    }

    fn disable_adapters(&self, adapters: &[String]) -> Result<(), SessionError> {
        if adapters.is_empty() {
            return Ok(());
        }

        log::info!("Disabling {} adapter(s) for the session", adapters.len());
        let timeout = self.settings.network.disable_timeout();
        if self.controller.toggle(adapters, false, true, Some(timeout))? {
            Ok(())
        } else {
            Err(SessionError::AdaptersUnavailable(adapters.join(", ")))
        }
    }

    fn restore_adapters(&self, adapters: &[String]) -> Result<(), SessionError> {
        if adapters.is_empty() {
            return Ok(());
        }

        log::info!("Re-enabling {} adapter(s)", adapters.len());
        let timeout = self.settings.network.enable_timeout();
        if self.controller.toggle(adapters, true, true, Some(timeout))? {
            Ok(())
        } else {
            Err(SessionError::RestoreFailed(adapters.join(", ")))
        }
    }

    fn grind<S: FrameSource>(&mut self, source: &mut S) -> Result<SessionReport, SessionError> {
        let mut frames = 0u64;

        loop {
            if self.settings.session.max_frames.is_some_and(|max| frames >= max) {
                return Ok(self.report(SessionEnd::FrameLimit, frames));
            }

            let Some(frame) = source.next_frame()? else {
                return Ok(self.report(SessionEnd::SourceExhausted, frames));
            };
            self.monitor.process(frame.view())?;
            frames += 1;

            if let Some(reason) = self.monitor.stop_reason() {
                return Ok(self.report(SessionEnd::Stopped(reason), frames));
            }

            let interval = self.settings.session.frame_interval();
            self.controller.clock().sleep(interval);
        }
    }

    fn report(&self, end: SessionEnd, frames: u64) -> SessionReport {
        SessionReport {
            end,
            fail_count: self.monitor.fail_count(),
            frames,
            last_state: self.monitor.current_state(),
        }
    }

    pub fn monitor(&self) -> &AttemptMonitor<C> {
        &self.monitor
    }

    pub fn controller(&self) -> &NetworkAdapterController<P, Q, K> {
        &self.controller
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The monitor reported a stop condition
    Stopped(StopReason),
    /// The frame source ran dry
    SourceExhausted,
    /// `session.max_frames` was reached
    FrameLimit,
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub fail_count: u32,
    pub frames: u64,
    pub last_state: Option<ProgressBarState>,
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("Could not disable adapters: {0}")]
    AdaptersUnavailable(String),
    #[error("Could not re-enable adapters: {0}")]
    RestoreFailed(String),
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use ndarray::Array3;

    use super::*;
    use crate::network::clock::manual::ManualClock;
    use crate::network::controller::fakes::{MemoryPlatform, ScriptedProbe};
    use crate::network::{ConnectivityState, ControllerOptions};
    use crate::vision::BgrFrame;

    struct ScriptedFrames(VecDeque<Result<BgrFrame, VisionError>>);

    fn solid(bgr: [u8; 3]) -> BgrFrame {
        Array3::from_shape_fn((2, 8, 3), |(_, _, c)| bgr[c])
    }

    impl ScriptedFrames {
        fn colors(colors: &[[u8; 3]]) -> Self {
            Self(colors.iter().map(|bgr| Ok(solid(*bgr))).collect())
        }
    }

    impl FrameSource for ScriptedFrames {
        fn next_frame(&mut self) -> Result<Option<BgrFrame>, VisionError> {
            self.0.pop_front().transpose()
        }
    }

    const FAIL: [u8; 3] = [20, 20, 200];
    const PROGRESS: [u8; 3] = [30, 150, 160];
    const STANDBY: [u8; 3] = [10, 10, 10];

    type TestSession =
        GrindSession<ColorStateClassifier, MemoryPlatform, ScriptedProbe, Arc<ManualClock>>;

    fn session(settings: Settings, probe: ScriptedProbe) -> (TestSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let classifier = ColorStateClassifier::new();
        let max_attempts = settings.monitor.max_attempts;
        let monitor = AttemptMonitor::new(classifier, max_attempts).unwrap();
        let controller = NetworkAdapterController::with_clock(
            MemoryPlatform::new(&["wifi"]),
            probe,
            clock.clone(),
            ControllerOptions::default(),
        );
        (GrindSession::new(monitor, controller, settings), clock)
    }

    fn airplane_settings(max_attempts: u32) -> Settings {
        let mut settings = Settings::default();
        settings.monitor.max_attempts = max_attempts;
        settings.network.adapter_ids = vec!["wifi".to_string()];
        settings
    }

    #[test]
    fn test_session_stops_at_max_attempts_and_restores_adapters() {
        let probe = ScriptedProbe::new(&[
            ConnectivityState::Offline,
            ConnectivityState::Offline,
            ConnectivityState::Offline, // residual check
            ConnectivityState::Online,
            ConnectivityState::Online,
        ]);
        let (mut session, _) = session(airplane_settings(2), probe);
        let mut frames = ScriptedFrames::colors(&[PROGRESS, FAIL, FAIL, PROGRESS, FAIL, STANDBY]);

        let report = session.run(&mut frames).unwrap();

        assert_eq!(
            report.end,
            SessionEnd::Stopped(StopReason::MaxAttemptsReached)
        );
        assert_eq!(report.fail_count, 2);
        assert_eq!(report.frames, 5);
        assert_eq!(report.last_state, Some(ProgressBarState::Fail));

        let platform = session.controller().platform();
        assert_eq!(
            platform.calls(),
            vec![("wifi".to_string(), false), ("wifi".to_string(), true)]
        );
        assert_eq!(platform.is_enabled("wifi"), Some(true));
    }

    #[test]
    fn test_session_success_window() {
        let mut settings = airplane_settings(3);
        settings.session.airplane_mode = false;
        let probe = ScriptedProbe::always(ConnectivityState::Online);
        let (mut session, clock) = session(settings, probe);
        let mut frames = ScriptedFrames::colors(&[PROGRESS, STANDBY, STANDBY, STANDBY, STANDBY]);

        let report = session.run(&mut frames).unwrap();

        assert_eq!(report.end, SessionEnd::Stopped(StopReason::Success));
        assert!(session.controller().platform().calls().is_empty());
        // Sleeps between frames only, not after the stopping frame
        assert_eq!(clock.elapsed(), Duration::from_millis(4 * 300));
    }

    #[test]
    fn test_source_exhausted_and_frame_limit() {
        let mut settings = Settings::default();
        settings.session.max_frames = Some(2);
        let (mut session, _) = session(settings, ScriptedProbe::always(ConnectivityState::Online));

        let mut frames = ScriptedFrames::colors(&[PROGRESS, PROGRESS, PROGRESS]);
        let report = session.run(&mut frames).unwrap();
        assert_eq!(report.end, SessionEnd::FrameLimit);

        let mut empty = ScriptedFrames::colors(&[]);
        let report = session.run(&mut empty).unwrap();
        assert_eq!(report.end, SessionEnd::SourceExhausted);
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn test_capture_error_still_restores_adapters() {
        let probe = ScriptedProbe::new(&[ConnectivityState::Offline, ConnectivityState::Offline]);
        let (mut session, _) = session(airplane_settings(5), probe);
        let error = VisionError::CaptureFailed("window closed".to_string());
        let mut frames = ScriptedFrames(VecDeque::from([Err(error)]));

        // Probe stays offline, so the re-enable times out; the capture error wins
        let err = session.run(&mut frames).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Vision(VisionError::CaptureFailed(_))
        ));
        let platform = session.controller().platform();
        assert_eq!(platform.calls().len(), 2);
        assert_eq!(platform.is_enabled("wifi"), Some(true));
    }

    #[test]
    fn test_unknown_adapter_aborts_before_grinding() {
        let mut settings = airplane_settings(5);
        settings.network.adapter_ids = vec!["ethernet".to_string()];
        let (mut session, _) = session(settings, ScriptedProbe::always(ConnectivityState::Offline));
        let mut frames = ScriptedFrames::colors(&[PROGRESS]);

        let err = session.run(&mut frames).unwrap_err();

        assert!(matches!(err, SessionError::AdaptersUnavailable(_)));
        assert!(session.monitor().current_state().is_none());
    }
}
