//! Master clock configuration.

use crate::Ticks;

/// Clock configuration for a CPU.
///
/// All scheduler periods derive from this frequency.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g., `3_500_000` for a Spectrum Z80).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Cycles in the given number of milliseconds (integer division).
    #[must_use]
    pub const fn ticks_per_millis(&self, millis: u64) -> Ticks {
        Ticks::new(self.frequency_hz * millis / 1000)
    }

    /// Wall-clock duration of the given cycle count.
    #[must_use]
    pub fn duration_of(&self, ticks: Ticks) -> std::time::Duration {
        let nanos = u128::from(ticks.get()) * 1_000_000_000 / u128::from(self.frequency_hz.max(1));
        std::time::Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_millis_at_spectrum_speed() {
        let clock = MasterClock::new(3_500_000);
        assert_eq!(clock.ticks_per_millis(10), Ticks::new(35_000));
    }

    #[test]
    fn duration_of_one_second() {
        let clock = MasterClock::new(3_500_000);
        assert_eq!(
            clock.duration_of(Ticks::new(3_500_000)),
            std::time::Duration::from_secs(1)
        );
    }
}
