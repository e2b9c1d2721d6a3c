//! Distinct ID generation.
//!
//! IDs are 64-bit values laid out as
//!
//! ```text
//! | 1 bit unused | 41 bits ms since epoch | 10 bits machine id | 12 bits sequence |
//! ```
//!
//! The epoch is configurable (`start_time`) so that the 41-bit timestamp
//! covers ~69 years from the service's own birthday rather than 1970.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::context::ContextBuilder;
use crate::lifecycle::{InitStep, StepError};

const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

/// Largest accepted machine id.
pub const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const MACHINE_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + MACHINE_BITS;

/// Backward clock steps up to this many milliseconds are absorbed by
/// reusing the last timestamp; larger ones fail the call.
pub const MAX_CLOCK_SKEW_MS: u64 = 5;

/// Errors raised while setting up the generator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnowflakeError {
    #[error("start_time {0:?} is not a YYYY-MM-DD date")]
    InvalidStartTime(String),

    #[error("start_time {0} lies in the future")]
    EpochInFuture(String),

    #[error("machine_id {0} exceeds maximum {max}", max = MAX_MACHINE_ID)]
    MachineIdOutOfRange(u16),

    #[error("clock moved backwards by {skew_ms}ms")]
    ClockMovedBackwards { skew_ms: u64 },
}

#[derive(Debug)]
struct State {
    last_ms: u64,
    sequence: u64,
}

/// Thread-safe generator of time-ordered unique IDs.
#[derive(Debug)]
pub struct IdGenerator {
    epoch_ms: u64,
    machine_id: u16,
    state: Mutex<State>,
}

impl IdGenerator {
    /// Create a generator whose epoch is midnight UTC of `start_time`.
    pub fn new(start_time: &str, machine_id: u16) -> Result<Self, SnowflakeError> {
        if machine_id > MAX_MACHINE_ID {
            return Err(SnowflakeError::MachineIdOutOfRange(machine_id));
        }
        let date = NaiveDate::parse_from_str(start_time, "%Y-%m-%d")
            .map_err(|_| SnowflakeError::InvalidStartTime(start_time.to_string()))?;
        let epoch_ms = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .filter(|ms| *ms >= 0)
            .ok_or_else(|| SnowflakeError::InvalidStartTime(start_time.to_string()))?
            as u64;
        if epoch_ms > now_ms() {
            return Err(SnowflakeError::EpochInFuture(start_time.to_string()));
        }

        Ok(Self {
            epoch_ms,
            machine_id,
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    pub fn machine_id(&self) -> u16 {
        self.machine_id
    }

    /// Issue the next ID.
    ///
    /// When the 4096 IDs of the current millisecond are exhausted this waits
    /// for the clock to move on. A clock that steps back by at most
    /// [`MAX_CLOCK_SKEW_MS`] is treated as standing still; a larger step is
    /// an error and leaves the generator untouched.
    pub fn next_id(&self) -> Result<u64, SnowflakeError> {
        self.next_id_with(|| self.elapsed_ms())
    }

    fn next_id_with(&self, mut clock: impl FnMut() -> u64) -> Result<u64, SnowflakeError> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = clock();
        let (ms, sequence) = if now > state.last_ms {
            (now, 0)
        } else {
            check_skew(now, state.last_ms)?;
            match (state.sequence + 1) & SEQUENCE_MASK {
                0 => (wait_past(state.last_ms, &mut clock)?, 0),
                sequence => (state.last_ms, sequence),
            }
        };
        state.last_ms = ms;
        state.sequence = sequence;

        Ok((ms << TIMESTAMP_SHIFT) | ((self.machine_id as u64) << MACHINE_SHIFT) | sequence)
    }

    fn elapsed_ms(&self) -> u64 {
        now_ms().saturating_sub(self.epoch_ms)
    }
}

fn check_skew(now: u64, last_ms: u64) -> Result<(), SnowflakeError> {
    match last_ms.saturating_sub(now) {
        skew_ms if skew_ms > MAX_CLOCK_SKEW_MS => {
            Err(SnowflakeError::ClockMovedBackwards { skew_ms })
        }
        _ => Ok(()),
    }
}

/// Spin until `clock` passes `last_ms`. Gives up once the wait exceeds the
/// tolerated skew, so the lock is never held longer than a few milliseconds.
fn wait_past(last_ms: u64, clock: &mut impl FnMut() -> u64) -> Result<u64, SnowflakeError> {
    let give_up = Instant::now() + Duration::from_millis(MAX_CLOCK_SKEW_MS + 1);
    loop {
        let now = clock();
        if now > last_ms {
            return Ok(now);
        }
        check_skew(now, last_ms)?;
        if Instant::now() >= give_up {
            return Err(SnowflakeError::ClockMovedBackwards {
                skew_ms: last_ms - now,
            });
        }
        std::hint::spin_loop();
    }
}

/// Split an ID into (ms since epoch, machine id, sequence).
pub fn decompose(id: u64) -> (u64, u16, u16) {
    (
        id >> TIMESTAMP_SHIFT,
        ((id >> MACHINE_SHIFT) & MAX_MACHINE_ID as u64) as u16,
        (id & SEQUENCE_MASK) as u16,
    )
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Init step installing the shared [`IdGenerator`].
pub struct IdGeneratorStep {
    start_time: String,
    machine_id: u16,
}

impl IdGeneratorStep {
    pub fn new(start_time: impl Into<String>, machine_id: u16) -> Self {
        Self {
            start_time: start_time.into(),
            machine_id,
        }
    }
}

#[async_trait]
impl InitStep for IdGeneratorStep {
    fn name(&self) -> &str {
        "snowflake"
    }

    async fn init(&mut self, ctx: &mut ContextBuilder) -> Result<(), StepError> {
        let generator = IdGenerator::new(&self.start_time, self.machine_id)?;
        tracing::debug!(
            start_time = %self.start_time,
            machine_id = self.machine_id,
            "ID generator ready"
        );
        ctx.set_id_generator(Arc::new(generator));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_increasing() {
        let generator = IdGenerator::new("2020-07-01", 3).unwrap();
        let mut seen = HashSet::new();
        let mut last = 0;
        for _ in 0..10_000 {
            let id = generator.next_id().unwrap();
            assert!(id > last);
            assert!(seen.insert(id));
            last = id;
        }
    }

    #[test]
    fn id_carries_machine_id() {
        let generator = IdGenerator::new("2020-07-01", 1023).unwrap();
        let (elapsed, machine, _) = decompose(generator.next_id().unwrap());
        assert_eq!(machine, 1023);
        assert!(elapsed > 0);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            IdGenerator::new("2020-07-01", 1024).unwrap_err(),
            SnowflakeError::MachineIdOutOfRange(1024)
        );
        assert!(matches!(
            IdGenerator::new("yesterday", 1),
            Err(SnowflakeError::InvalidStartTime(_))
        ));
        assert!(matches!(
            IdGenerator::new("2999-01-01", 1),
            Err(SnowflakeError::EpochInFuture(_))
        ));
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let generator = Arc::new(IdGenerator::new("2020-07-01", 9).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || (0..2_000).map(|_| generator.next_id().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn small_backward_step_reuses_last_timestamp() {
        let generator = IdGenerator::new("2020-07-01", 2).unwrap();
        let first = generator.next_id_with(|| 100).unwrap();
        let second = generator.next_id_with(|| 97).unwrap();

        assert!(second > first);
        assert_eq!(decompose(second), (100, 2, 1));
    }

    #[test]
    fn large_backward_step_fails_without_consuming_state() {
        let generator = IdGenerator::new("2020-07-01", 2).unwrap();
        let first = generator.next_id_with(|| 100).unwrap();

        assert_eq!(
            generator.next_id_with(|| 50),
            Err(SnowflakeError::ClockMovedBackwards { skew_ms: 50 })
        );
        let next = generator.next_id_with(|| 100).unwrap();
        assert_eq!(decompose(next), (100, 2, 1));
        assert!(next > first);
    }

    #[test]
    fn exhausted_millisecond_waits_for_the_clock() {
        let generator = IdGenerator::new("2020-07-01", 2).unwrap();
        for _ in 0..=SEQUENCE_MASK {
            generator.next_id_with(|| 100).unwrap();
        }

        let mut ticks = [99, 100, 101].into_iter();
        let id = generator
            .next_id_with(|| ticks.next().unwrap_or(101))
            .unwrap();
        assert_eq!(decompose(id), (101, 2, 0));
    }

    #[test]
    fn stuck_clock_gives_up_instead_of_spinning() {
        let generator = IdGenerator::new("2020-07-01", 2).unwrap();
        for _ in 0..=SEQUENCE_MASK {
            generator.next_id_with(|| 100).unwrap();
        }

        let started = Instant::now();
        assert_eq!(
            generator.next_id_with(|| 98),
            Err(SnowflakeError::ClockMovedBackwards { skew_ms: 2 })
        );
        assert!(started.elapsed() < Duration::from_secs(1));

        // The exhausted sequence is still in place for the next millisecond.
        let id = generator.next_id_with(|| 101).unwrap();
        assert_eq!(decompose(id), (101, 2, 0));
    }
}
