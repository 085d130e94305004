//! Time and randomness sources injected into the game service.

use chrono::{DateTime, Utc};
use dicehall_types::constants::DIE_FACES;
use rand::Rng;

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Produces one die face in `1..=DIE_FACES` per call.
pub trait DiceSource: Send + Sync {
    fn roll(&self) -> u8;
}

/// Uniform rolls from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDice;

impl DiceSource for RandomDice {
    fn roll(&self) -> u8 {
        rand::thread_rng().gen_range(1..=DIE_FACES)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use fixtures::{ManualClock, ScriptedDice};

/// Deterministic clock and dice. **Test fixtures only.**
#[cfg(any(test, feature = "test-helpers"))]
mod fixtures {
    use std::{
        collections::VecDeque,
        sync::{Mutex, PoisonError},
    };

    use chrono::{DateTime, Duration, Utc};

    use super::{Clock, DiceSource};

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += by;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(Utc::now())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Replays a fixed sequence of faces, then falls back to `fallback`.
    #[derive(Debug)]
    pub struct ScriptedDice {
        script: Mutex<VecDeque<u8>>,
        fallback: u8,
    }

    impl ScriptedDice {
        #[must_use]
        pub fn new(faces: impl IntoIterator<Item = u8>) -> Self {
            Self {
                script: Mutex::new(faces.into_iter().collect()),
                fallback: 1,
            }
        }

        /// Always rolls `face`.
        #[must_use]
        pub fn constant(face: u8) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: face,
            }
        }

        pub fn push(&self, faces: impl IntoIterator<Item = u8>) {
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(faces);
        }
    }

    impl DiceSource for ScriptedDice {
        fn roll(&self) -> u8 {
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(self.fallback)
        }
    }
}
