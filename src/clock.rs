//! Countdown phase derivation.
//!
//! All times are milliseconds since the Unix epoch. The phase is a pure
//! function of `(now, target)`; [`PhaseClock`] wraps it with a sampling
//! cadence and reports only the samples where the phase changed.

use std::fmt;
use std::time::Duration;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Remaining whole seconds at or below which the countdown enters the climax.
pub const CLIMAX_SECONDS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Normal,
    Climax,
    Celebration,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Normal => "normal",
            Phase::Climax => "climax",
            Phase::Celebration => "celebration",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whole seconds left, rounded up. Rounding up keeps the display from ever
/// showing 0 while the target is still in the future.
pub fn remaining_seconds(now: i64, target: i64) -> i64 {
    let difference = target - now;
    difference.div_euclid(MS_PER_SECOND) + i64::from(difference.rem_euclid(MS_PER_SECOND) != 0)
}

pub fn phase_at(now: i64, target: i64) -> Phase {
    let difference = target - now;
    if difference <= 0 {
        Phase::Celebration
    } else if remaining_seconds(now, target) <= CLIMAX_SECONDS {
        Phase::Climax
    } else {
        Phase::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRemaining {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeRemaining {
    pub fn between(now: i64, target: i64) -> Self {
        let difference = target - now;
        if difference <= 0 {
            return Self::default();
        }
        let d = difference as u64;
        Self {
            days: d / MS_PER_DAY as u64,
            hours: (d / MS_PER_HOUR as u64) % 24,
            minutes: (d / MS_PER_MINUTE as u64) % 60,
            seconds: (d / MS_PER_SECOND as u64) % 60,
        }
    }

    /// Milliseconds represented by the decomposition, truncated to the second.
    pub fn as_millis(&self) -> u64 {
        (((self.days * 24 + self.hours) * 60 + self.minutes) * 60 + self.seconds) * 1_000
    }

    #[cfg(test)]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Edge-triggered phase sampler for one target moment.
///
/// The first call to [`PhaseClock::poll`] samples immediately; later calls
/// sample at most once per period. A sample reports `Some(phase)` only when
/// the phase differs from the last reported one, which starts as
/// [`Phase::Normal`].
#[derive(Debug, Clone)]
pub struct PhaseClock {
    target: i64,
    period: i64,
    phase: Phase,
    last_sample: Option<i64>,
}

impl PhaseClock {
    pub fn new(target: i64, period: Duration) -> Self {
        Self {
            target,
            period: (period.as_millis() as i64).max(1),
            phase: Phase::Normal,
            last_sample: None,
        }
    }

    pub fn target(&self) -> i64 {
        self.target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self, now: i64) -> TimeRemaining {
        TimeRemaining::between(now, self.target)
    }

    pub fn remaining_seconds(&self, now: i64) -> i64 {
        remaining_seconds(now, self.target)
    }

    /// Samples if the period has elapsed since the previous sample.
    ///
    /// A clock that jumped backwards past the previous sample is sampled
    /// right away; the phase rule resolves it like any other instant.
    pub fn poll(&mut self, now: i64) -> Option<Phase> {
        if let Some(last) = self.last_sample {
            let elapsed = now - last;
            if elapsed >= 0 && elapsed < self.period {
                return None;
            }
        }
        self.sample(now)
    }

    pub fn sample(&mut self, now: i64) -> Option<Phase> {
        self.last_sample = Some(now);
        let next = phase_at(now, self.target);
        if next == self.phase {
            return None;
        }
        self.phase = next;
        Some(next)
    }

    /// Replaces the target and forces the phase back to normal. The next
    /// poll samples immediately.
    pub fn reset(&mut self, target: i64) {
        self.target = target;
        self.phase = Phase::Normal;
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(50);

    #[test]
    fn past_or_exact_target_is_celebration_with_zero_remaining() {
        for difference in [0, -1, -999, -1_000, -5_000, -86_400_000] {
            assert_eq!(phase_at(0, difference), Phase::Celebration, "{difference}");
            assert!(TimeRemaining::between(0, difference).is_zero());
        }
    }

    #[test]
    fn last_ten_seconds_are_climax() {
        for difference in [1, 500, 999, 1_000, 1_001, 9_000, 9_999, 10_000] {
            assert_eq!(phase_at(0, difference), Phase::Climax, "{difference}");
        }
    }

    #[test]
    fn more_than_ten_seconds_is_normal() {
        for difference in [10_001, 10_999, 11_000, 60_000, 3 * MS_PER_DAY] {
            assert_eq!(phase_at(0, difference), Phase::Normal, "{difference}");
        }
    }

    #[test]
    fn remaining_seconds_round_up() {
        assert_eq!(remaining_seconds(0, 1), 1);
        assert_eq!(remaining_seconds(0, 1_000), 1);
        assert_eq!(remaining_seconds(0, 1_001), 2);
        assert_eq!(remaining_seconds(0, 10_000), 10);
        assert_eq!(remaining_seconds(0, 0), 0);
        assert_eq!(remaining_seconds(0, -1), 0);
        assert_eq!(remaining_seconds(0, -1_000), -1);
    }

    #[test]
    fn decomposition_reconstructs_within_one_second() {
        let samples = [
            1,
            999,
            1_000,
            59_999,
            61_500,
            3_599_999,
            3_600_000,
            86_399_999,
            86_400_001,
            400 * MS_PER_DAY + 13 * MS_PER_HOUR + 7 * MS_PER_MINUTE + 42_123,
        ];
        for difference in samples {
            let remaining = TimeRemaining::between(0, difference);
            let rebuilt = remaining.as_millis() as i64;
            assert!(rebuilt <= difference, "{difference}: {remaining:?}");
            assert!(rebuilt > difference - 1_000, "{difference}: {remaining:?}");
            assert!(remaining.hours < 24 && remaining.minutes < 60 && remaining.seconds < 60);
        }
    }

    #[test]
    fn decomposition_fields() {
        let difference = 2 * MS_PER_DAY + 3 * MS_PER_HOUR + 4 * MS_PER_MINUTE + 5_678;
        assert_eq!(
            TimeRemaining::between(1_000, 1_000 + difference),
            TimeRemaining { days: 2, hours: 3, minutes: 4, seconds: 5 }
        );
    }

    #[test]
    fn notifies_once_per_transition_at_any_cadence() {
        for step in [1, 7, 50, 333, 1_000] {
            let start = 1_700_000_000_000;
            let mut clock = PhaseClock::new(start + 11_000, PERIOD);
            let mut changes = Vec::new();
            let mut now = start;
            while now <= start + 13_000 {
                changes.extend(clock.sample(now));
                now += step;
            }
            assert_eq!(changes, vec![Phase::Climax, Phase::Celebration], "step {step}");
        }
    }

    #[test]
    fn poll_respects_period() {
        let mut clock = PhaseClock::new(10_500, PERIOD);
        assert_eq!(clock.poll(0), None);
        // 10.5s remaining rounds up to 11: still normal. 600ms later it is
        // climax, but the poll at +20ms is inside the period.
        assert_eq!(clock.poll(20), None);
        assert_eq!(clock.poll(600), Some(Phase::Climax));
        assert_eq!(clock.poll(620), None);
        assert_eq!(clock.poll(10_499), None);
        assert_eq!(clock.poll(10_500), Some(Phase::Celebration));
        assert_eq!(clock.poll(20_000), None);
    }

    #[test]
    fn eleven_second_scenario() {
        let start = 1_767_225_589_000;
        let mut clock = PhaseClock::new(start + 11_000, PERIOD);
        assert_eq!(clock.poll(start), None);
        assert_eq!(clock.phase(), Phase::Normal);
        assert_eq!(clock.poll(start + 999), None);
        assert_eq!(clock.poll(start + 1_000), Some(Phase::Climax));
        assert_eq!(clock.remaining_seconds(start + 1_000), 10);
        assert_eq!(clock.poll(start + 10_999), None);
        assert_eq!(clock.remaining_seconds(start + 10_999), 1);
        assert_eq!(clock.poll(start + 11_000), Some(Phase::Celebration));
    }

    #[test]
    fn target_in_the_past_skips_climax() {
        let now = 50_000;
        let mut clock = PhaseClock::new(now - 5_000, PERIOD);
        assert_eq!(clock.poll(now), Some(Phase::Celebration));
        assert!(clock.remaining(now).is_zero());
        for t in (now..now + 2_000).step_by(10) {
            assert_eq!(clock.poll(t), None);
        }
    }

    #[test]
    fn backwards_clock_jump_samples_immediately() {
        let mut clock = PhaseClock::new(100_000, PERIOD);
        assert_eq!(clock.poll(95_000), Some(Phase::Climax));
        assert_eq!(clock.poll(80_000), Some(Phase::Normal));
    }

    #[test]
    fn reset_returns_to_normal_and_resamples() {
        let mut clock = PhaseClock::new(1_000, PERIOD);
        assert_eq!(clock.poll(2_000), Some(Phase::Celebration));
        clock.reset(2_000 + 11_000);
        assert_eq!(clock.phase(), Phase::Normal);
        assert_eq!(clock.target(), 13_000);
        assert_eq!(clock.poll(2_010), None);
        assert_eq!(clock.poll(3_000), Some(Phase::Climax));
    }
}
