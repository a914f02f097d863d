//! Build-time configuration of the alarm.
//!
//! There is no runtime reconfiguration. The firmware validates [`CONFIG`]
//! once during init and refuses to start when it is inconsistent.

use smart_leds::RGB8;

use crate::error::ConfigError;

/// Number of raw readings averaged per cycle.
pub const SAMPLE_COUNT: usize = 200;

/// The watchdog timeout must cover this many worst-case periods.
pub const WATCHDOG_MARGIN: u32 = 2;

/// Upper bound on pushing one uniform frame to the LED strip.
pub const RENDER_BUDGET_MS: u32 = 5;

pub const CONFIG: Config = Config {
    threshold: ThresholdPolicy::Plain { threshold: 800 },
    actuation: ActuationPolicy::Level,
    sampling_period_ms: 150,
    acquisition_timeout_ms: 20,
    watchdog_timeout_ms: 3000,
    feed_slice_ms: 50,
    led_count: 25,
    alert_color: RGB8 { r: 255, g: 0, b: 0 },
};

/// How a volume level maps to the alarm state.
///
/// Reaching a threshold exactly never counts as exceeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThresholdPolicy {
    /// Alert strictly above `threshold`, quiet otherwise.
    Plain { threshold: u16 },
    /// Enter alert strictly above `high`, leave it strictly below `low`,
    /// keep the previous state in between.
    ///
    /// With `low == high` this matches [`ThresholdPolicy::Plain`] except at
    /// exactly that level, where the previous state is kept instead of
    /// dropping to quiet.
    Hysteresis { low: u16, high: u16 },
}

impl ThresholdPolicy {
    pub const fn plain(threshold: u16) -> Self {
        Self::Plain { threshold }
    }

    pub fn hysteresis(low: u16, high: u16) -> Result<Self, ConfigError> {
        let policy = Self::Hysteresis { low, high };
        policy.validate()?;
        Ok(policy)
    }

    /// Level that must be exceeded to raise an alert.
    pub fn alert_threshold(&self) -> u16 {
        match *self {
            Self::Plain { threshold } => threshold,
            Self::Hysteresis { high, .. } => high,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Hysteresis { low, high } if low > high => {
                Err(ConfigError::InvertedHysteresis { low, high })
            }
            _ => Ok(()),
        }
    }
}

/// How the alarm state is shown on the LED strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuationPolicy {
    /// Keep the strip lit for as long as the detector is in alert.
    /// The strip is only rewritten when the state changes.
    Level,
    /// Flash the strip for `duration_ms` on every cycle whose latest raw
    /// reading exceeds the alert threshold.
    Pulse { duration_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub threshold: ThresholdPolicy,
    pub actuation: ActuationPolicy,
    pub sampling_period_ms: u32,
    /// Longest the sense phase waits for the bulk transfer.
    pub acquisition_timeout_ms: u32,
    pub watchdog_timeout_ms: u32,
    /// Longest the background sleeps between two watchdog feeds while it is
    /// blocked in a pulse.
    pub feed_slice_ms: u32,
    pub led_count: usize,
    pub alert_color: RGB8,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.acquisition_timeout_ms == 0
            || self.acquisition_timeout_ms >= self.sampling_period_ms
        {
            return Err(ConfigError::InvalidAcquisitionTimeout);
        }
        if self.led_count == 0 {
            return Err(ConfigError::ZeroLeds);
        }
        self.threshold.validate()?;
        if let ActuationPolicy::Pulse { duration_ms: 0 } = self.actuation {
            return Err(ConfigError::ZeroPulse);
        }
        if self.feed_slice_ms == 0 || self.feed_slice_ms >= self.watchdog_timeout_ms {
            return Err(ConfigError::InvalidFeedSlice);
        }

        let required_ms = self.required_watchdog_timeout_ms();
        if self.watchdog_timeout_ms < required_ms {
            return Err(ConfigError::WatchdogTooShort {
                timeout_ms: self.watchdog_timeout_ms,
                required_ms,
            });
        }

        Ok(())
    }

    /// Longest stretch the background may spend without feeding the watchdog
    /// because of rendering.
    pub fn render_budget_ms(&self) -> u32 {
        match self.actuation {
            ActuationPolicy::Level => RENDER_BUDGET_MS,
            ActuationPolicy::Pulse { .. } => self.feed_slice_ms + RENDER_BUDGET_MS,
        }
    }

    pub fn worst_case_cycle_ms(&self) -> u32 {
        self.acquisition_timeout_ms + self.render_budget_ms()
    }

    pub fn required_watchdog_timeout_ms(&self) -> u32 {
        let cycle_ms = self
            .sampling_period_ms
            .saturating_add(self.worst_case_cycle_ms());
        WATCHDOG_MARGIN.saturating_mul(cycle_ms)
    }

    /// Without a heartbeat for this long the sense phase is considered stuck
    /// and the watchdog is left to expire.
    pub fn stall_limit_ms(&self) -> u32 {
        self.sampling_period_ms.saturating_mul(2)
    }
}

impl Default for Config {
    fn default() -> Self {
        CONFIG
    }
}
