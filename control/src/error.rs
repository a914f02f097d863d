//! Failure kinds, split by when they can happen.
//!
//! [`InitError`] aborts startup and the device never reaches the scheduling
//! loop. [`CycleFault`] only skips the current cycle; recovery from anything
//! persistent is left to the hardware watchdog.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no DMA stream available for the bulk transfer")]
    TransferUnavailable,

    #[error("sensing peripheral could not be configured")]
    SensorMisconfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleFault {
    #[error("bulk transfer did not complete within {timeout_ms} ms")]
    TransferTimeout { timeout_ms: u32 },

    #[error("bulk transfer reported a hardware error")]
    TransferFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("sampling period must be non-zero")]
    ZeroPeriod,

    #[error("acquisition timeout must be non-zero and shorter than the period")]
    InvalidAcquisitionTimeout,

    #[error("LED count must be non-zero")]
    ZeroLeds,

    #[error("hysteresis low threshold {low} is above high threshold {high}")]
    InvertedHysteresis { low: u16, high: u16 },

    #[error("alert pulse duration must be non-zero")]
    ZeroPulse,

    #[error("feed slice must be non-zero and shorter than the watchdog timeout")]
    InvalidFeedSlice,

    #[error("watchdog timeout {timeout_ms} ms is below the required {required_ms} ms")]
    WatchdogTooShort { timeout_ms: u32, required_ms: u32 },
}
