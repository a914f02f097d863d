use crate::acquirer::AudioFrame;

/// Loudness of one frame, in raw ADC units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeLevel(pub u16);

impl VolumeLevel {
    pub fn value(self) -> u16 {
        self.0
    }
}

/// Mean of the frame, truncated towards zero.
pub fn estimate<const N: usize>(frame: &AudioFrame<N>) -> VolumeLevel {
    let sum: u64 = frame.samples().iter().map(|s| u64::from(*s)).sum();
    // NOTE: The mean of u16 values always fits back into u16.
    #[allow(clippy::cast_possible_truncation)]
    let mean = (sum / N as u64) as u16;
    VolumeLevel(mean)
}
