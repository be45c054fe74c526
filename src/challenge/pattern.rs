use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Number of steps in a default challenge.
pub const DEFAULT_PATTERN_LENGTH: usize = 20;

/// Binary state of the flashing indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashState {
    #[default]
    Black,
    White,
}

impl FlashState {
    /// Solid color shown for this state.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            FlashState::Black => [0, 0, 0],
            FlashState::White => [255, 255, 255],
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            FlashState::Black => 'B',
            FlashState::White => 'W',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'B' => Some(FlashState::Black),
            'W' => Some(FlashState::White),
            _ => None,
        }
    }
}

impl fmt::Display for FlashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Fixed sequence of indicator states played over a total duration.
///
/// Every step lasts `total_duration / len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePattern {
    states: Vec<FlashState>,
    total_duration: Duration,
}

impl ChallengePattern {
    pub fn new(states: Vec<FlashState>, total_duration: Duration) -> Result<Self> {
        if states.is_empty() {
            return Err(Error::InvalidPattern("pattern has no steps".into()));
        }
        if total_duration.is_zero() {
            return Err(Error::InvalidPattern("total duration is zero".into()));
        }
        Ok(Self {
            states,
            total_duration,
        })
    }

    /// Random pattern of `len` steps containing both states.
    ///
    /// A single-step pattern cannot hold both and is just random.
    pub fn random<R: Rng + ?Sized>(len: usize, total_duration: Duration, rng: &mut R) -> Result<Self> {
        let mut states: Vec<FlashState> = (0..len)
            .map(|_| {
                if rng.gen_bool(0.5) {
                    FlashState::White
                } else {
                    FlashState::Black
                }
            })
            .collect();

        if len > 1 {
            let whites = states.iter().filter(|s| **s == FlashState::White).count();
            if whites == 0 || whites == len {
                let flip = rng.gen_range(0..len);
                states[flip] = match states[flip] {
                    FlashState::Black => FlashState::White,
                    FlashState::White => FlashState::Black,
                };
            }
        }

        Self::new(states, total_duration)
    }

    /// Parse a `"BWBW"` style string.
    pub fn parse(pattern: &str, total_duration: Duration) -> Result<Self> {
        let states = pattern
            .trim()
            .chars()
            .map(|c| {
                FlashState::from_char(c)
                    .ok_or_else(|| Error::InvalidPattern(format!("unknown state '{}'", c)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(states, total_duration)
    }

    pub fn states(&self) -> &[FlashState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Time allotted to each step.
    pub fn interval(&self) -> Duration {
        self.total_duration / self.states.len() as u32
    }

    pub fn get(&self, index: usize) -> Option<FlashState> {
        self.states.get(index).copied()
    }
}

impl fmt::Display for ChallengePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in &self.states {
            write!(f, "{}", state)?;
        }
        Ok(())
    }
}

/// Parses states only; the duration defaults to one second per step.
impl FromStr for ChallengePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let steps = s.trim().chars().count() as u64;
        Self::parse(s, Duration::from_secs(steps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_interval_divides_duration() {
        let pattern = ChallengePattern::parse("BWBW", Duration::from_millis(2000)).unwrap();
        assert_eq!(pattern.len(), 4);
        assert_eq!(pattern.interval(), Duration::from_millis(500));
        assert_eq!(pattern.to_string(), "BWBW");
    }

    #[test]
    fn test_rejects_empty_and_zero_duration() {
        assert!(matches!(
            ChallengePattern::new(vec![], Duration::from_secs(1)),
            Err(Error::InvalidPattern(_))
        ));
        assert!(matches!(
            ChallengePattern::parse("BW", Duration::ZERO),
            Err(Error::InvalidPattern(_))
        ));
        assert!(matches!(
            "BXW".parse::<ChallengePattern>(),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_random_contains_both_states() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let pattern = ChallengePattern::random(3, Duration::from_secs(3), &mut rng).unwrap();
            assert!(pattern.states().contains(&FlashState::Black));
            assert!(pattern.states().contains(&FlashState::White));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let pattern: ChallengePattern = "bwW".parse().unwrap();
        assert_eq!(
            pattern.states(),
            &[FlashState::Black, FlashState::White, FlashState::White]
        );
        assert_eq!(pattern.total_duration(), Duration::from_secs(3));
    }
}
