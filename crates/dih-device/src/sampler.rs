//! Periodic sensor readings.

use std::{ops::Sub, time::Duration, time::Instant};

use dih_core::Environment;

/// Lowest reading the simulated sensor reports, in degrees Celsius.
const MIN_CELSIUS: f64 = -10.0;
/// Highest reading the simulated sensor reports, in degrees Celsius.
const MAX_CELSIUS: f64 = 45.0;

/// Paces readings to at most one per interval.
#[derive(Debug, Clone)]
pub struct SampleSchedule<I = Instant> {
    interval: Duration,
    last: Option<I>,
}

impl<I> SampleSchedule<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Schedule that fires at most once per `interval`, first on the first
    /// call to [`SampleSchedule::due`].
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// True (and consumes the slot) if a reading should be taken at `now`.
    pub fn due(&mut self, now: I) -> bool {
        let ready = self.last.is_none_or(|last| now - last >= self.interval);
        if ready {
            self.last = Some(now);
        }
        ready
    }

    /// Forget the last reading so the next call to `due` fires.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Simulated temperature sensor.
///
/// Performs a bounded random walk in 0.1 degree steps so consecutive
/// readings look like a slowly drifting room temperature.
#[derive(Debug, Clone)]
pub struct Thermometer {
    celsius: f64,
}

impl Thermometer {
    /// Sensor starting at `celsius`.
    pub fn new(celsius: f64) -> Self {
        Self { celsius: celsius.clamp(MIN_CELSIUS, MAX_CELSIUS) }
    }

    /// Last reading.
    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    /// Take a reading, formatted with one decimal place.
    pub fn sample<E: Environment>(&mut self, env: &E) -> String {
        // -0.2 ..= +0.2 in tenths
        let step = (env.random_u64() % 5) as f64 - 2.0;
        self.celsius = (self.celsius + step / 10.0).clamp(MIN_CELSIUS, MAX_CELSIUS);
        format!("{:.1}", self.celsius)
    }
}

impl Default for Thermometer {
    fn default() -> Self {
        Self::new(21.0)
    }
}

#[cfg(test)]
mod tests {
    use dih_harness::{SimEnv, SimInstant};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn schedule_fires_once_per_interval() {
        let mut schedule = SampleSchedule::new(Duration::from_secs(1));

        assert!(schedule.due(SimInstant::from_millis(0)));
        assert!(!schedule.due(SimInstant::from_millis(999)));
        assert!(schedule.due(SimInstant::from_millis(1000)));
        assert!(!schedule.due(SimInstant::from_millis(1500)));
        assert!(schedule.due(SimInstant::from_millis(2500)));
    }

    #[test]
    fn reset_fires_immediately() {
        let mut schedule = SampleSchedule::new(Duration::from_secs(1));

        assert!(schedule.due(SimInstant::from_millis(0)));
        schedule.reset();
        assert!(schedule.due(SimInstant::from_millis(10)));
    }

    proptest! {
        #[test]
        fn readings_stay_in_range(seed in any::<u64>(), start in -50.0f64..60.0, n in 1usize..500) {
            let env = SimEnv::with_seed(seed);
            let mut sensor = Thermometer::new(start);

            for _ in 0..n {
                let reading = sensor.sample(&env);
                let value: f64 = reading.parse().unwrap();
                prop_assert!((MIN_CELSIUS..=MAX_CELSIUS).contains(&value));
                prop_assert_eq!(reading.split_once('.').map(|(_, frac)| frac.len()), Some(1));
            }
        }
    }
}
