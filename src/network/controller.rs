//! Network adapter controller
//!
//! Toggles adapters through an [`AdapterPlatform`] and, when asked, blocks
//! until a [`ConnectivityProbe`] confirms the new state twice in a row.

use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::{AdapterPlatform, ConnectivityProbe, ConnectivityState, NetworkAdapter, NetworkError};

/// Timing knobs for toggling and waiting
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Delay between connectivity checks
    pub poll_interval: Duration,
    /// Consecutive matching checks needed to confirm a state
    pub stable_checks: u32,
    /// How often to report that we're still waiting
    pub progress_log_interval: Duration,
    /// Wait timeout when disabling and none is given
    pub disable_timeout: Duration,
    /// Wait timeout when enabling and none is given
    pub enable_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            stable_checks: 2,
            progress_log_interval: Duration::from_secs(2),
            disable_timeout: Duration::from_secs(5),
            enable_timeout: Duration::from_secs(10),
        }
    }
}

/// Enables/disables adapters with confirmed-state waiting
pub struct NetworkAdapterController<P, Q, K = SystemClock> {
    platform: P,
    probe: Q,
    clock: K,
    options: ControllerOptions,
}

impl<P: AdapterPlatform, Q: ConnectivityProbe> NetworkAdapterController<P, Q, SystemClock> {
    /// Create a controller on the real clock with default timings
    pub fn new(platform: P, probe: Q) -> Self {
        Self::with_clock(platform, probe, SystemClock, ControllerOptions::default())
    }
}

impl<P: AdapterPlatform, Q: ConnectivityProbe, K: Clock> NetworkAdapterController<P, Q, K> {
    /// Create a controller with an explicit clock and timings
    pub fn with_clock(platform: P, probe: Q, clock: K, options: ControllerOptions) -> Self {
        Self {
            platform,
            probe,
            clock,
            options,
        }
    }

    /// All adapters the platform currently reports
    pub fn list_adapters(&self) -> Result<Vec<NetworkAdapter>, NetworkError> {
        self.platform.list()
    }

    /// Enable or disable the given adapters
    ///
    /// Unknown ids are logged and skipped. Returns `Ok(false)` when none of a
    /// non-empty id list exists or the platform refused a toggle. With
    /// `wait`, blocks until connectivity matches `enable`; `timeout` defaults
    /// to 5s for disabling and 10s for enabling.
    pub fn toggle<S: AsRef<str>>(
        &self,
        adapter_ids: &[S],
        enable: bool,
        wait: bool,
        timeout: Option<Duration>,
    ) -> Result<bool, NetworkError> {
        if adapter_ids.is_empty() {
            log::debug!("No adapters requested, nothing to toggle");
            return Ok(true);
        }

        let (valid, invalid) = self.partition_ids(adapter_ids)?;
        for id in &invalid {
            log::warn!("Adapter {} not found, skipping", id);
        }

        if valid.is_empty() {
            log::debug!("None of the {} requested adapters exist", adapter_ids.len());
            return Ok(false);
        }

        let action = if enable { "Enabling" } else { "Disabling" };
        let mut all_applied = true;
        for id in &valid {
            if self.platform.set_enabled(id, enable)? {
                log::info!("{} adapter {}", action, id);
            } else {
                log::error!("{} adapter {} was refused by the platform", action, id);
                all_applied = false;
            }
        }

        if !all_applied {
            return Ok(false);
        }
        if !wait {
            return Ok(true);
        }

        let timeout = timeout.unwrap_or(if enable {
            self.options.enable_timeout
        } else {
            self.options.disable_timeout
        });
        self.wait_for_state(enable, timeout)?;

        if !enable && self.probe.check().is_online() {
            log::warn!(
                "Internet still reachable after disabling adapters, another network path is active"
            );
        }

        Ok(true)
    }

    /// Split requested ids into known and unknown, keeping request order
    pub fn partition_ids<'a, S: AsRef<str>>(
        &self,
        adapter_ids: &'a [S],
    ) -> Result<(Vec<&'a str>, Vec<&'a str>), NetworkError> {
        let known = self.platform.list()?;

        Ok(adapter_ids
            .iter()
            .map(|id| id.as_ref())
            .partition(|id| known.iter().any(|adapter| adapter.id == *id)))
    }

    /// Block until connectivity matches `expected_online` on consecutive checks
    ///
    /// No check is made once more than `timeout` has elapsed.
    pub fn wait_for_state(
        &self,
        expected_online: bool,
        timeout: Duration,
    ) -> Result<(), NetworkError> {
        let expected = ConnectivityState::from_online(expected_online);
        let start = self.clock.now();
        let mut last_report = start;
        let mut consecutive = 0;

        log::info!(
            "Waiting up to {:.1}s for network to go {}",
            timeout.as_secs_f64(),
            expected
        );

        loop {
            if self.clock.now() - start > timeout {
                return Err(NetworkError::Timeout { expected, timeout });
            }

            if self.probe.check() == expected {
                consecutive += 1;
                if consecutive >= self.options.stable_checks {
                    log::info!(
                        "Network is {} (confirmed after {:.1}s)",
                        expected,
                        (self.clock.now() - start).as_secs_f64()
                    );
                    return Ok(());
                }
            } else {
                consecutive = 0;
            }

            let now = self.clock.now();
            if now - last_report >= self.options.progress_log_interval {
                log::info!(
                    "Still waiting for network to go {} ({:.1}s/{:.1}s)",
                    expected,
                    (now - start).as_secs_f64(),
                    timeout.as_secs_f64()
                );
                last_report = now;
            }

            self.clock.sleep(self.options.poll_interval);
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn probe(&self) -> &Q {
        &self.probe
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }
}
