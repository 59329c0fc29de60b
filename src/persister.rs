// src/persister.rs

//! 对外的持久层接口
//!
//! 上层（命令分发、测试替身）只依赖 `Persister`，不直接接触 sled。
//! 每个方法都带 `Context`：库编号、取消信号、截止时间都从这里来。

use crate::codec::ScoredMember;
use crate::context::Context;
use crate::engine::Store;
use crate::error::Result;

pub trait Persister: Send + Sync {
    // String
    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>>;
    fn set(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<()>;
    fn del(&self, ctx: &Context, keys: &[&[u8]]) -> Result<u64>;
    fn exists(&self, ctx: &Context, key: &[u8]) -> Result<bool>;
    fn append(&self, ctx: &Context, key: &[u8], suffix: &[u8]) -> Result<u64>;

    // 计数器
    fn incr(&self, ctx: &Context, key: &[u8]) -> Result<i64>;
    fn decr(&self, ctx: &Context, key: &[u8]) -> Result<i64>;
    fn incr_by(&self, ctx: &Context, key: &[u8], delta: i64) -> Result<i64>;
    fn decr_by(&self, ctx: &Context, key: &[u8], delta: i64) -> Result<i64>;

    // TTL
    fn expire(&self, ctx: &Context, key: &[u8], secs: i64) -> Result<bool>;
    fn expire_at(&self, ctx: &Context, key: &[u8], timestamp: i64) -> Result<bool>;
    fn ttl(&self, ctx: &Context, key: &[u8]) -> Result<i64>;
    fn pttl(&self, ctx: &Context, key: &[u8]) -> Result<i64>;
    fn persist(&self, ctx: &Context, key: &[u8]) -> Result<bool>;

    // List
    fn lpush(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<u64>;
    fn rpush(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<u64>;
    fn lpop(&self, ctx: &Context, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn rpop(&self, ctx: &Context, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn lindex(&self, ctx: &Context, key: &[u8], index: i64) -> Result<Option<Vec<u8>>>;
    fn lset(&self, ctx: &Context, key: &[u8], index: i64, value: &[u8]) -> Result<()>;
    fn lrange(&self, ctx: &Context, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>>;
    fn llen(&self, ctx: &Context, key: &[u8]) -> Result<u64>;

    // Set
    fn sadd(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool>;
    fn srem(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool>;
    fn smembers(&self, ctx: &Context, key: &[u8]) -> Result<Vec<Vec<u8>>>;
    fn sismember(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool>;
    fn scard(&self, ctx: &Context, key: &[u8]) -> Result<u64>;

    // Sorted set
    fn zadd(&self, ctx: &Context, key: &[u8], score: f64, member: &[u8]) -> Result<bool>;
    fn zrem(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool>;
    fn zrange(&self, ctx: &Context, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>>;
    fn zrange_with_scores(
        &self,
        ctx: &Context,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>>;
    fn zcount(&self, ctx: &Context, key: &[u8], min: f64, max: f64) -> Result<u64>;
    fn zscore(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<Option<f64>>;
    fn zcard(&self, ctx: &Context, key: &[u8]) -> Result<u64>;

    // 库级
    fn flush_all(&self, ctx: &Context) -> Result<u64>;
    fn db_size(&self, ctx: &Context) -> Result<u64>;
    fn close(&self) -> Result<()>;
}

impl Persister for Store {
    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>> {
        Store::get(self, ctx, key)
    }

    fn set(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<()> {
        Store::set(self, ctx, key, value)
    }

    fn del(&self, ctx: &Context, keys: &[&[u8]]) -> Result<u64> {
        Store::del(self, ctx, keys)
    }

    fn exists(&self, ctx: &Context, key: &[u8]) -> Result<bool> {
        Store::exists(self, ctx, key)
    }

    fn append(&self, ctx: &Context, key: &[u8], suffix: &[u8]) -> Result<u64> {
        Store::append(self, ctx, key, suffix)
    }

    fn incr(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        Store::incr(self, ctx, key)
    }

    fn decr(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        Store::decr(self, ctx, key)
    }

    fn incr_by(&self, ctx: &Context, key: &[u8], delta: i64) -> Result<i64> {
        Store::incr_by(self, ctx, key, delta)
    }

    fn decr_by(&self, ctx: &Context, key: &[u8], delta: i64) -> Result<i64> {
        Store::decr_by(self, ctx, key, delta)
    }

    fn expire(&self, ctx: &Context, key: &[u8], secs: i64) -> Result<bool> {
        Store::expire(self, ctx, key, secs)
    }

    fn expire_at(&self, ctx: &Context, key: &[u8], timestamp: i64) -> Result<bool> {
        Store::expire_at(self, ctx, key, timestamp)
    }

    fn ttl(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        Store::ttl(self, ctx, key)
    }

    fn pttl(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        Store::pttl(self, ctx, key)
    }

    fn persist(&self, ctx: &Context, key: &[u8]) -> Result<bool> {
        Store::persist(self, ctx, key)
    }

    fn lpush(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<u64> {
        Store::lpush(self, ctx, key, value)
    }

    fn rpush(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<u64> {
        Store::rpush(self, ctx, key, value)
    }

    fn lpop(&self, ctx: &Context, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Store::lpop(self, ctx, key)
    }

    fn rpop(&self, ctx: &Context, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Store::rpop(self, ctx, key)
    }

    fn lindex(&self, ctx: &Context, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        Store::lindex(self, ctx, key, index)
    }

    fn lset(&self, ctx: &Context, key: &[u8], index: i64, value: &[u8]) -> Result<()> {
        Store::lset(self, ctx, key, index, value)
    }

    fn lrange(&self, ctx: &Context, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        Store::lrange(self, ctx, key, start, stop)
    }

    fn llen(&self, ctx: &Context, key: &[u8]) -> Result<u64> {
        Store::llen(self, ctx, key)
    }

    fn sadd(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        Store::sadd(self, ctx, key, member)
    }

    fn srem(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        Store::srem(self, ctx, key, member)
    }

    fn smembers(&self, ctx: &Context, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Store::smembers(self, ctx, key)
    }

    fn sismember(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        Store::sismember(self, ctx, key, member)
    }

    fn scard(&self, ctx: &Context, key: &[u8]) -> Result<u64> {
        Store::scard(self, ctx, key)
    }

    fn zadd(&self, ctx: &Context, key: &[u8], score: f64, member: &[u8]) -> Result<bool> {
        Store::zadd(self, ctx, key, score, member)
    }

    fn zrem(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<bool> {
        Store::zrem(self, ctx, key, member)
    }

    fn zrange(&self, ctx: &Context, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        Store::zrange(self, ctx, key, start, stop)
    }

    fn zrange_with_scores(
        &self,
        ctx: &Context,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>> {
        Store::zrange_with_scores(self, ctx, key, start, stop)
    }

    fn zcount(&self, ctx: &Context, key: &[u8], min: f64, max: f64) -> Result<u64> {
        Store::zcount(self, ctx, key, min, max)
    }

    fn zscore(&self, ctx: &Context, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        Store::zscore(self, ctx, key, member)
    }

    fn zcard(&self, ctx: &Context, key: &[u8]) -> Result<u64> {
        Store::zcard(self, ctx, key)
    }

    fn flush_all(&self, ctx: &Context) -> Result<u64> {
        Store::flush_all(self, ctx)
    }

    fn db_size(&self, ctx: &Context) -> Result<u64> {
        Store::db_size(self, ctx)
    }

    fn close(&self) -> Result<()> {
        Store::close(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    /// 通过 trait 对象调用，确认 Store 能被当作 `dyn Persister` 共享
    #[test]
    fn test_store_as_trait_object() -> anyhow::Result<()> {
        let p: Arc<dyn Persister> = Arc::new(Store::open(Config::temporary())?);
        let ctx = Context::new(2);

        p.set(&ctx, b"k", b"v")?;
        assert_eq!(p.get(&ctx, b"k")?, b"v".to_vec());
        assert_eq!(p.rpush(&ctx, b"L", b"a")?, 1);
        assert!(p.sadd(&ctx, b"S", b"a")?);
        assert!(p.zadd(&ctx, b"Z", 1.0, b"a")?);
        assert_eq!(p.db_size(&ctx)?, 4);
        assert_eq!(p.flush_all(&ctx)?, 4);
        assert_eq!(p.db_size(&ctx)?, 0);

        p.close()?;
        assert!(p.get(&ctx, b"k").is_err());
        Ok(())
    }
}
