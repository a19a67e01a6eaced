//! Sharded page-key iteration

use crate::error::{Error, Result};

/// Walks page keys from `start`, yielding those that belong to one shard
///
/// A key belongs to shard `shard_index` of `shard_size` when
/// `key % shard_size == shard_index`. Keys are visited `step` apart and the
/// walk stops before reaching zero. Starting at 20, shard 1 of 5 yields
/// 16, 11, 6, 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardedPageKeys {
    next: u64,
    shard_index: u64,
    shard_size: u64,
    step: i64,
}

impl ShardedPageKeys {
    /// Walk toward zero from `start`
    pub fn new(start: u64, shard_index: u64, shard_size: u64) -> Result<Self> {
        Self::with_step(start, shard_index, shard_size, -1)
    }

    /// Walk from `start` by a custom non-zero step
    pub fn with_step(start: u64, shard_index: u64, shard_size: u64, step: i64) -> Result<Self> {
        if shard_size == 0 {
            return Err(Error::invalid_value("shard_size", "must be positive"));
        }
        if shard_index >= shard_size {
            return Err(Error::invalid_value(
                "shard_index",
                format!("must be below shard_size {shard_size}"),
            ));
        }
        if step == 0 {
            return Err(Error::invalid_value("step", "must not be zero"));
        }
        Ok(Self {
            next: start,
            shard_index,
            shard_size,
            step,
        })
    }

    /// The unsharded walk from `start` down to 1
    pub fn descending(start: u64) -> Self {
        Self {
            next: start,
            shard_index: 0,
            shard_size: 1,
            step: -1,
        }
    }

    fn stepped(&self) -> Option<u64> {
        if self.step < 0 {
            self.next.checked_sub(self.step.unsigned_abs())
        } else {
            self.next.checked_add(self.step.unsigned_abs())
        }
    }
}

impl Iterator for ShardedPageKeys {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while self.next > 0 {
            let candidate = self.next;
            self.next = self.stepped().unwrap_or(0);
            if candidate % self.shard_size == self.shard_index {
                return Some(candidate);
            }
        }
        None
    }
}
