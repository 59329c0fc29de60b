// src/types/zset.rs

//! # Sorted Set Type Support
//!
//! One record per key, elements kept ordered by `(score, member)` in the
//! encoding itself, so rank queries read the blob in order. Every insert
//! re-sorts the whole set before writing it back.
//!
//! Supported commands:
//! - `ZADD` / `ZREM`
//! - `ZRANGE` (optionally with scores)
//! - `ZCOUNT` / `ZSCORE` / `ZCARD`

use super::{Access, decoded, encoded};
use crate::codec::{ScoredMember, clamp_range, decode_zset, encode_zset, zset_insert};
use crate::context::Context;
use crate::engine::Store;
use crate::error::{Error, Result};

impl Store {
    /// Execute ZADD. Returns `true` when `member` is new; an existing
    /// member gets its score replaced.
    ///
    /// # Errors
    ///
    /// `InvalidScore` for NaN, `WrongType` if the key holds another type.
    pub fn zadd(&self, ctx: &Context, key: &[u8], score: f64, member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        if score.is_nan() {
            return Err(Error::InvalidScore);
        }
        self.run(ctx, |scope| {
            let mut items = decoded(scope, key, Access::Write, decode_zset)?.unwrap_or_default();
            let added = zset_insert(&mut items, score, member);
            scope.store(key, &encoded(encode_zset(&items))?)?;
            Ok(added)
        })
    }

    /// Execute ZREM. Removing the last member deletes the key.
    pub fn zrem(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut items = match decoded(scope, key, Access::Write, decode_zset)? {
                Some(items) => items,
                None => return Ok(false),
            };
            let before = items.len();
            items.retain(|i| i.member != member);
            if items.len() == before {
                return Ok(false);
            }
            if items.is_empty() {
                scope.purge(key)?;
            } else {
                scope.store(key, &encoded(encode_zset(&items))?)?;
            }
            Ok(true)
        })
    }

    /// Execute ZRANGE by rank, lowest score first.
    pub fn zrange(&self, ctx: &Context, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .zrange_with_scores(ctx, key, start, stop)?
            .into_iter()
            .map(|i| i.member)
            .collect())
    }

    /// ZRANGE ... WITHSCORES
    pub fn zrange_with_scores(
        &self,
        ctx: &Context,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let items = decoded(scope, key, Access::Read, decode_zset)?.unwrap_or_default();
            Ok(match clamp_range(items.len(), start, stop) {
                Some(range) => items[range].to_vec(),
                None => Vec::new(),
            })
        })
    }

    /// Execute ZCOUNT over the inclusive score interval `[min, max]`.
    /// `min > max` counts nothing.
    pub fn zcount(&self, ctx: &Context, key: &[u8], min: f64, max: f64) -> Result<u64> {
        self.validate_key(key)?;
        if min > max {
            return Ok(0);
        }
        self.run(ctx, |scope| {
            let items = decoded(scope, key, Access::Read, decode_zset)?.unwrap_or_default();
            Ok(items
                .iter()
                .filter(|i| i.score >= min && i.score <= max)
                .count() as u64)
        })
    }

    /// Execute ZSCORE.
    pub fn zscore(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            Ok(decoded(scope, key, Access::Read, decode_zset)?.and_then(|items| {
                items.iter().find(|i| i.member == member).map(|i| i.score)
            }))
        })
    }

    /// Execute ZCARD.
    pub fn zcard(&self, ctx: &Context, key: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            Ok(decoded(scope, key, Access::Read, decode_zset)?
                .map_or(0, |items| items.len() as u64))
        })
    }
}
