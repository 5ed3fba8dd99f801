//! Poll intervals — fixed or exponential backoff.

use std::time::Duration;

use fnscale_core::FnscaleConfig;
use fnscale_core::config::ConfigError;

/// How long to wait between status polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    /// Same delay between every poll.
    Fixed(Duration),
    /// Start at `initial`, double after every poll, never exceed `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(15),
        }
    }
}

impl PollInterval {
    /// A fresh delay sequence for one wait.
    pub fn schedule(&self) -> PollSchedule {
        match *self {
            PollInterval::Fixed(d) => PollSchedule {
                current: d,
                max: d,
            },
            PollInterval::Exponential { initial, max } => PollSchedule {
                current: initial.min(max),
                max,
            },
        }
    }
}

/// Iterator-like delay sequence produced by [`PollInterval::schedule`].
#[derive(Debug, Clone)]
pub struct PollSchedule {
    current: Duration,
    max: Duration,
}

impl PollSchedule {
    /// The delay before the next poll. Advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// Deadline and poll cadence for awaiting a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwaitOptions {
    pub timeout: Duration,
    pub interval: PollInterval,
}

impl Default for AwaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: PollInterval::default(),
        }
    }
}

impl AwaitOptions {
    pub fn from_config(config: &FnscaleConfig) -> Result<Self, ConfigError> {
        let (initial, max) = config.poll_bounds()?;
        Ok(Self {
            timeout: config.deploy_timeout()?,
            interval: PollInterval::Exponential { initial, max },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_doubles_and_caps_at_fifteen_seconds() {
        let mut schedule = PollInterval::default().schedule();
        let delays: Vec<u64> = (0..7).map(|_| schedule.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 15, 15, 15]);
    }

    #[test]
    fn fixed_interval_never_changes() {
        let mut schedule = PollInterval::Fixed(Duration::from_millis(500)).schedule();
        for _ in 0..5 {
            assert_eq!(schedule.next_delay(), Duration::from_millis(500));
        }
    }

    #[test]
    fn initial_above_max_is_clamped() {
        let mut schedule = PollInterval::Exponential {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(10),
        }
        .schedule();
        assert_eq!(schedule.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn huge_intervals_saturate() {
        let mut fixed = PollInterval::Fixed(Duration::MAX).schedule();
        assert_eq!(fixed.next_delay(), Duration::MAX);
        assert_eq!(fixed.next_delay(), Duration::MAX);

        let mut schedule = PollInterval::Exponential {
            initial: Duration::MAX / 2 + Duration::from_secs(1),
            max: Duration::MAX,
        }
        .schedule();
        schedule.next_delay();
        assert_eq!(schedule.next_delay(), Duration::MAX);
    }

    #[test]
    fn options_from_config() {
        let config = FnscaleConfig::from_toml_str(
            "[app]\nname = \"api\"\n\n[deploy]\ntimeout = \"2m\"\npoll_initial = \"500ms\"\npoll_max = \"5s\"\n",
        )
        .unwrap();
        let opts = AwaitOptions::from_config(&config).unwrap();
        assert_eq!(opts.timeout, Duration::from_secs(120));
        assert_eq!(
            opts.interval,
            PollInterval::Exponential {
                initial: Duration::from_millis(500),
                max: Duration::from_secs(5),
            }
        );
    }
}
