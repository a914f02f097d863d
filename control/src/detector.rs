//! Two-state loudness detector.

use crate::config::ThresholdPolicy;
use crate::estimator::VolumeLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectionState {
    #[default]
    Quiet,
    Alert,
}

/// Current state together with the level that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Detection {
    pub state: DetectionState,
    pub level: VolumeLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Evaluation {
    pub state: DetectionState,
    pub changed: bool,
}

/// Decide the next state from a level and the prior state.
pub fn evaluate(
    policy: &ThresholdPolicy,
    level: VolumeLevel,
    prior: DetectionState,
) -> Evaluation {
    let level = level.value();
    let state = match *policy {
        ThresholdPolicy::Plain { threshold } => {
            if level > threshold {
                DetectionState::Alert
            } else {
                DetectionState::Quiet
            }
        }
        ThresholdPolicy::Hysteresis { low, high } => {
            if level > high {
                DetectionState::Alert
            } else if level < low {
                DetectionState::Quiet
            } else {
                prior
            }
        }
    };

    Evaluation {
        state,
        changed: state != prior,
    }
}

/// Owner of the [`Detection`] carried from one cycle to the next.
#[derive(Debug)]
pub struct ThresholdDetector {
    policy: ThresholdPolicy,
    detection: Detection,
}

impl ThresholdDetector {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            detection: Detection::default(),
        }
    }

    pub fn evaluate(&mut self, level: VolumeLevel) -> Evaluation {
        let evaluation = evaluate(&self.policy, level, self.detection.state);
        self.detection = Detection {
            state: evaluation.state,
            level,
        };
        evaluation
    }

    pub fn detection(&self) -> Detection {
        self.detection
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }
}
