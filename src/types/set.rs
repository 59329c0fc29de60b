// src/types/set.rs

//! # Set Type Support
//!
//! A set is one record holding distinct members in the member layout of
//! [`crate::codec`]; insertion order carries no meaning. A blob with a
//! repeated member is not a set, so a list holding duplicates is rejected
//! as `WrongType`.
//!
//! Supported commands:
//! - `SADD` / `SREM`
//! - `SMEMBERS` / `SISMEMBER` / `SCARD`

use super::{Access, decoded, encoded};
use crate::codec::{decode_set, encode_set};
use crate::context::Context;
use crate::engine::Store;
use crate::error::Result;

impl Store {
    /// Execute SADD. Returns `true` if `member` was newly added.
    pub fn sadd(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut members = decoded(scope, key, Access::Write, decode_set)?.unwrap_or_default();
            if members.iter().any(|m| m.as_slice() == member) {
                return Ok(false);
            }
            members.push(member.to_vec());
            scope.store(key, &encoded(encode_set(&members))?)?;
            Ok(true)
        })
    }

    /// Execute SREM. Returns `true` if `member` existed and was removed.
    /// Removing the last member deletes the key.
    pub fn srem(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut members = match decoded(scope, key, Access::Write, decode_set)? {
                Some(m) => m,
                None => return Ok(false),
            };
            let pos = match members.iter().position(|m| m.as_slice() == member) {
                Some(p) => p,
                None => return Ok(false),
            };
            members.swap_remove(pos);
            if members.is_empty() {
                scope.purge(key)?;
            } else {
                scope.store(key, &encoded(encode_set(&members))?)?;
            }
            Ok(true)
        })
    }

    /// Execute SMEMBERS. A missing key is an empty set.
    pub fn smembers(&self, ctx: &Context, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            Ok(decoded(scope, key, Access::Read, decode_set)?.unwrap_or_default())
        })
    }

    /// Execute SISMEMBER.
    pub fn sismember(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            Ok(decoded(scope, key, Access::Read, decode_set)?
                .is_some_and(|members| members.iter().any(|m| m.as_slice() == member)))
        })
    }

    /// Execute SCARD.
    pub fn scard(&self, ctx: &Context, key: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            Ok(decoded(scope, key, Access::Read, decode_set)?
                .map_or(0, |members| members.len() as u64))
        })
    }
}
