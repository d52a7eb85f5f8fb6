//! Distributed unique id generation.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, ensure};
use parking_lot::Mutex;

/// A source of unique primary keys.
pub trait IdGenerator: Send + Sync {
    /// The next id; positive, never repeated.
    fn next_id(&self) -> i64;
}

/// Milliseconds between the Unix epoch and 2020-01-01T00:00:00Z.
pub const EPOCH_MS: u64 = 1_577_836_800_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE: u64 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_SHIFT: u32 = NODE_BITS + SEQUENCE_BITS;

/// Snowflake ids: 41 bits of milliseconds since [`EPOCH_MS`], 10 bits of node
/// id and a 12-bit per-millisecond sequence.
#[derive(Debug)]
pub struct Snowflake {
    node: u64,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    last: u64,
    sequence: u64,
}

impl Default for Snowflake {
    fn default() -> Self {
        Self {
            node: 0,
            state: Mutex::new(State::default()),
        }
    }
}

impl Snowflake {
    /// Create a generator for `node`.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` does not fit in 10 bits.
    pub fn new(node: u16) -> Result<Self> {
        ensure!(u64::from(node) <= MAX_NODE, "snowflake node {node} exceeds {MAX_NODE}");
        Ok(Self {
            node: u64::from(node),
            ..Self::default()
        })
    }

    /// Split an id into its timestamp (ms since [`EPOCH_MS`]), node and
    /// sequence.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub const fn decompose(id: i64) -> (u64, u16, u16) {
        let id = id as u64;
        (
            id >> TIMESTAMP_SHIFT,
            ((id >> SEQUENCE_BITS) & MAX_NODE) as u16,
            (id & MAX_SEQUENCE) as u16,
        )
    }

    #[allow(clippy::cast_possible_wrap)]
    fn next_with(&self, clock: impl Fn() -> u64) -> i64 {
        let mut state = self.state.lock();

        // a clock that moved backwards keeps the last timestamp
        let mut now = clock().max(state.last);
        if now == state.last {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                now = wait_after(state.last, &clock);
            }
        } else {
            state.sequence = 0;
        }
        state.last = now;

        let id = (now << TIMESTAMP_SHIFT) | (self.node << SEQUENCE_BITS) | state.sequence;
        (id & i64::MAX as u64) as i64
    }
}

impl IdGenerator for Snowflake {
    fn next_id(&self) -> i64 {
        self.next_with(elapsed_ms)
    }
}

// Spin until the clock passes `last`. A clock lagging by more than a
// millisecond borrows the next timestamp instead.
fn wait_after(last: u64, clock: &impl Fn() -> u64) -> u64 {
    loop {
        let now = clock();
        if now > last {
            return now;
        }
        if now + 1 < last {
            return last + 1;
        }
        std::hint::spin_loop();
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms() -> u64 {
    let since_unix = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (since_unix.as_millis() as u64).saturating_sub(EPOCH_MS).max(1)
}
