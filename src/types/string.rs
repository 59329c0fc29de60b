// src/types/string.rs

//! String 类型与计数器
//!
//! - SET / GET / DEL / EXISTS：原样存取字节
//! - INCR / DECR / INCRBY / DECRBY：值按十进制文本解析为 i64，不存在视为 0
//! - APPEND：在原值后追加，不存在视为空串

use crate::codec::{decode_counter, encode_counter};
use crate::context::Context;
use crate::engine::Store;
use crate::engine::kv::abort;
use crate::error::{Error, Result};

impl Store {
    /// 读取一个值
    ///
    /// # 错误
    /// - `KeyNotFound`：不存在或已过期
    /// - `EmptyKey` / `KeyTooLarge`：key 不合法（不访问引擎）
    pub fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| Ok(scope.load(key)?.map(|v| v.to_vec())))?
            .ok_or(Error::KeyNotFound)
    }

    /// 覆盖写入，空值合法。已过期的旧 TTL 随旧值一起作废，未过期的保留
    pub fn set(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<()> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            if let Some(meta) = scope.meta(key)? {
                if meta.is_expired(scope.now()) {
                    scope.remove_meta(key)?;
                }
            }
            scope.store(key, value)
        })
    }

    /// 删除多个 key，不存在或不合法的 key 跳过；返回实际删除数
    pub fn del(&self, ctx: &Context, keys: &[&[u8]]) -> Result<u64> {
        let valid: Vec<&[u8]> = keys
            .iter()
            .copied()
            .filter(|k| self.validate_key(k).is_ok())
            .collect();
        if valid.is_empty() {
            return Ok(0);
        }
        self.run(ctx, |scope| {
            let mut removed = 0;
            for key in &valid {
                if scope.purge(key)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    /// 存在性探测；不合法的 key 直接返回 false
    pub fn exists(&self, ctx: &Context, key: &[u8]) -> Result<bool> {
        if self.validate_key(key).is_err() {
            return Ok(false);
        }
        self.run(ctx, |scope| Ok(scope.load(key)?.is_some()))
    }

    /// 原子地加 delta，返回新值
    pub fn incr_by(&self, ctx: &Context, key: &[u8], delta: i64) -> Result<i64> {
        self.apply_counter(ctx, key, |n| n.checked_add(delta))
    }

    /// 原子地减 delta，返回新值
    pub fn decr_by(&self, ctx: &Context, key: &[u8], delta: i64) -> Result<i64> {
        self.apply_counter(ctx, key, |n| n.checked_sub(delta))
    }

    pub fn incr(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        self.incr_by(ctx, key, 1)
    }

    pub fn decr(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        self.decr_by(ctx, key, 1)
    }

    fn apply_counter<F>(&self, ctx: &Context, key: &[u8], op: F) -> Result<i64>
    where
        F: Fn(i64) -> Option<i64>,
    {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let old = match scope.load(key)? {
                Some(raw) => match decode_counter(&raw) {
                    Some(n) => n,
                    None => return abort(Error::NotInteger),
                },
                None => 0,
            };
            let new = match op(old) {
                Some(n) => n,
                None => return abort(Error::Overflow),
            };
            scope.store(key, &encode_counter(new))?;
            Ok(new)
        })
    }

    /// 追加字节，返回追加后的长度
    pub fn append(&self, ctx: &Context, key: &[u8], suffix: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut value = scope.load(key)?.map(|v| v.to_vec()).unwrap_or_default();
            value.extend_from_slice(suffix);
            scope.store(key, &value)?;
            Ok(value.len() as u64)
        })
    }
}
