//! Sampling and decision core of the noise alarm.
//!
//! Everything here is independent of the target hardware. Peripherals enter
//! through small traits ([`acquirer::Sensor`], [`acquirer::BulkTransfer`],
//! [`smart_leds::SmartLedsWrite`] and [`embedded_hal::watchdog::Watchdog`]),
//! so the whole cycle can be exercised on the host.

#![cfg_attr(not(test), no_std)]

pub mod acquirer;
pub mod actuator;
pub mod config;
pub mod detector;
pub mod error;
pub mod estimator;
pub mod handoff;
pub mod liveness;
pub mod scheduler;

pub use acquirer::{AudioFrame, SampleAcquirer};
pub use actuator::AlertActuator;
pub use config::{ActuationPolicy, Config, ThresholdPolicy, CONFIG, SAMPLE_COUNT};
pub use detector::{Detection, DetectionState, Evaluation, ThresholdDetector};
pub use error::{ConfigError, CycleFault, InitError};
pub use estimator::VolumeLevel;
pub use handoff::ActuationRequest;
pub use liveness::{Heartbeat, LivenessReporter};
pub use scheduler::{Background, CycleReport, Sensing};
