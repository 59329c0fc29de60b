// src/expire.rs

//! 过期（TTL）子系统
//!
//! 过期信息单独存在 `expire` 树里，从不与值记录混放：
//! - key   = `[u32 db id][原始 key]`，按库隔离，同名 key 在不同库互不干扰
//! - value = `[u64 expires_at][u64 created_at]`（UNIX 秒，大端）
//!
//! 有记录即“带 TTL”，无记录即持久 key。过期是按 `expires_at <= now`
//! 算出来的逻辑状态：读路径（见 `engine::kv::Scope::load`）把过期 key
//! 当作不存在，物理删除由读路径顺手完成，或交给批量清理 / 启动恢复。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sled::Tree;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::engine::Store;
use crate::engine::kv::abort;
use crate::error::{Error, Result};

/// 过期树名称
pub const EXPIRE_TREE: &str = "expire";

/// key 不存在
pub const TTL_NOT_FOUND: i64 = -2;
/// key 存在但没有过期时间
pub const TTL_PERSISTENT: i64 = -1;

/// 元数据层允许的最远过期时间：一年
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

const META_SIZE: usize = 16;

/// 当前 UNIX 秒
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 当前 UNIX 毫秒
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// 过期树中的 key：库编号前缀 + 原始 key
pub fn ttl_key(db: u32, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + key.len());
    out.extend_from_slice(&db.to_be_bytes());
    out.extend_from_slice(key);
    out
}

/// 拆分过期树 key，长度不足 4 字节返回 None
pub fn split_ttl_key(raw: &[u8]) -> Option<(u32, &[u8])> {
    if raw.len() < 4 {
        return None;
    }
    let mut b = [0u8; 4];
    b.copy_from_slice(&raw[..4]);
    Some((u32::from_be_bytes(b), &raw[4..]))
}

/// 一条过期元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlMeta {
    pub expires_at: u64,
    pub created_at: u64,
}

impl TtlMeta {
    /// `now + secs` 过期；负数或超过一年视为非法
    pub fn for_duration(now: u64, secs: i64) -> Result<Self> {
        if secs < 0 {
            return Err(Error::InvalidTtl(format!("negative duration {}", secs)));
        }
        let secs = secs as u64;
        if secs > MAX_TTL_SECS {
            return Err(Error::InvalidTtl(format!(
                "{} seconds exceeds the maximum of {}",
                secs, MAX_TTL_SECS
            )));
        }
        Ok(TtlMeta {
            expires_at: now + secs,
            created_at: now,
        })
    }

    /// 绝对时间戳过期；负数或超过 now + 一年视为非法
    pub fn at(now: u64, timestamp: i64) -> Result<Self> {
        if timestamp < 0 {
            return Err(Error::InvalidTtl(format!("negative timestamp {}", timestamp)));
        }
        let ts = timestamp as u64;
        if ts > now.saturating_add(MAX_TTL_SECS) {
            return Err(Error::InvalidTtl(format!(
                "timestamp {} is more than {} seconds ahead",
                ts, MAX_TTL_SECS
            )));
        }
        Ok(TtlMeta {
            expires_at: ts,
            created_at: now,
        })
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    pub fn encode(&self) -> [u8; META_SIZE] {
        let mut out = [0u8; META_SIZE];
        out[..8].copy_from_slice(&self.expires_at.to_be_bytes());
        out[8..].copy_from_slice(&self.created_at.to_be_bytes());
        out
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() != META_SIZE {
            return Err(Error::Corrupt {
                key: String::from("<ttl metadata>"),
                reason: format!("expected {} bytes, got {}", META_SIZE, raw.len()),
            });
        }
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(&raw[..8]);
        b.copy_from_slice(&raw[8..]);
        Ok(TtlMeta {
            expires_at: u64::from_be_bytes(a),
            created_at: u64::from_be_bytes(b),
        })
    }
}

/// 获取 或 创建 expire Tree
pub(crate) fn expire_tree(env: &sled::Db) -> Result<Tree> {
    Ok(env.open_tree(EXPIRE_TREE)?)
}

/// 一轮扫描中发现的过期条目
enum Sweep {
    Expired(u32, Vec<u8>),
    Corrupt(Vec<u8>),
}

/// 一轮清理的统计
#[derive(Debug, Default)]
struct Pass {
    scanned: usize,
    removed: usize,
    failed: usize,
}

impl Store {
    /// EXPIRE：key 不存在或秒数为负返回 false
    pub fn expire(&self, ctx: &Context, key: &[u8], secs: i64) -> Result<bool> {
        self.validate_key(key)?;
        if secs < 0 {
            return Ok(false);
        }
        self.run(ctx, |scope| {
            if scope.load(key)?.is_none() {
                return Ok(false);
            }
            let meta = match TtlMeta::for_duration(scope.now(), secs) {
                Ok(m) => m,
                Err(e) => return abort(e),
            };
            scope.put_meta(key, &meta)?;
            Ok(true)
        })
    }

    /// EXPIREAT：key 不存在或时间戳已过返回 false
    pub fn expire_at(&self, ctx: &Context, key: &[u8], timestamp: i64) -> Result<bool> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            if timestamp <= scope.now() as i64 {
                return Ok(false);
            }
            if scope.load(key)?.is_none() {
                return Ok(false);
            }
            let meta = match TtlMeta::at(scope.now(), timestamp) {
                Ok(m) => m,
                Err(e) => return abort(e),
            };
            scope.put_meta(key, &meta)?;
            Ok(true)
        })
    }

    /// TTL：剩余秒数，或 -2（不存在 / 已过期）/ -1（无过期时间）
    pub fn ttl(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        self.remaining(ctx, key, |meta, now| meta.expires_at as i64 - now as i64)
    }

    /// PTTL：同 TTL，单位毫秒
    pub fn pttl(&self, ctx: &Context, key: &[u8]) -> Result<i64> {
        self.remaining(ctx, key, |meta, _| {
            (meta.expires_at as i64).saturating_mul(1000) - now_ms() as i64
        })
    }

    fn remaining<F>(&self, ctx: &Context, key: &[u8], left: F) -> Result<i64>
    where
        F: Fn(&TtlMeta, u64) -> i64,
    {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            if scope.load(key)?.is_none() {
                return Ok(TTL_NOT_FOUND);
            }
            match scope.meta(key)? {
                None => Ok(TTL_PERSISTENT),
                Some(meta) => match left(&meta, scope.now()) {
                    n if n <= 0 => Ok(TTL_NOT_FOUND),
                    n => Ok(n),
                },
            }
        })
    }

    /// PERSIST：移除过期时间；key 不存在或本就持久返回 false
    pub fn persist(&self, ctx: &Context, key: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            if scope.load(key)?.is_none() {
                return Ok(false);
            }
            scope.remove_meta(key)
        })
    }

    /// 是否已过期；无元数据（持久或不存在）返回 false。不做任何删除
    pub fn is_expired(&self, ctx: &Context, key: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        ctx.check()?;
        self.ensure_open()?;
        match self.expire.get(ttl_key(ctx.db(), key))? {
            Some(raw) => Ok(TtlMeta::decode(&raw)
                .map_err(|_| Error::corrupt(key, "bad ttl metadata"))?
                .is_expired(now_secs())),
            None => Ok(false),
        }
    }

    /// 扫描过期树，最多处理 `cleanup_batch_size` 个过期 key，
    /// 值和元数据在同一事务里删除。返回删除的 key 数
    pub fn cleanup_expired(&self) -> Result<usize> {
        Ok(self.sweep()?.removed)
    }

    fn sweep(&self) -> Result<Pass> {
        self.ensure_open()?;
        let now = now_secs();
        let batch = self.config().cleanup_batch_size;

        let mut found = Vec::new();
        for item in self.expire.iter() {
            let (raw_key, raw_meta) = item?;
            match (split_ttl_key(&raw_key), TtlMeta::decode(&raw_meta)) {
                (Some((db, key)), Ok(meta)) => {
                    if meta.is_expired(now) {
                        found.push(Sweep::Expired(db, key.to_vec()));
                    }
                }
                _ => found.push(Sweep::Corrupt(raw_key.to_vec())),
            }
            if found.len() >= batch {
                break;
            }
        }

        let mut pass = Pass {
            scanned: found.len(),
            ..Pass::default()
        };
        for entry in found {
            match entry {
                Sweep::Expired(db, key) => match self.reap(db, &key) {
                    Ok(true) => pass.removed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        pass.failed += 1;
                        warn!(db, key = %hex::encode(&key), error = %e, "failed to remove expired key");
                    }
                },
                Sweep::Corrupt(raw_key) => {
                    // 只丢弃坏掉的元数据，值保留为持久 key
                    warn!(entry = %hex::encode(&raw_key), "dropping corrupt ttl metadata");
                    if let Err(e) = self.expire.remove(&raw_key) {
                        pass.failed += 1;
                        warn!(error = %e, "failed to drop corrupt ttl metadata");
                    }
                }
            }
        }
        if pass.removed > 0 {
            debug!(removed = pass.removed, "expired keys cleaned up");
        }
        Ok(pass)
    }

    /// 事务内复查后删除一个过期 key
    fn reap(&self, db: u32, key: &[u8]) -> Result<bool> {
        if db >= self.tables().max_databases() {
            // 库已不在配置范围内，只清理元数据
            return Ok(self.expire.remove(ttl_key(db, key))?.is_some());
        }
        self.run(&Context::new(db), |scope| match scope.meta(key)? {
            Some(meta) if meta.is_expired(scope.now()) => {
                scope.data.remove(key)?;
                scope.remove_meta(key)?;
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    /// 启动恢复：重复清理直到某一轮扫到的条目不满一个批次，返回删除总数。
    /// 一轮里所有条目都处理失败时停止，避免原地打转
    pub fn restore_ttl(&self) -> Result<usize> {
        let batch = self.config().cleanup_batch_size;
        let mut total = 0;
        loop {
            let pass = self.sweep()?;
            total += pass.removed;
            if pass.scanned < batch || pass.failed == pass.scanned {
                break;
            }
        }
        info!(removed = total, "ttl restore finished");
        Ok(total)
    }

    /// 在当前 tokio 运行时上启动后台清理任务
    pub fn spawn_cleaner(&self) -> tokio::task::JoinHandle<()> {
        let every = Duration::from_secs(self.config().cleanup_interval_secs);
        tokio::spawn(run_cleaner(self.clone(), every))
    }
}

/// 后台定时清理任务，store 关闭后退出
pub async fn run_cleaner(store: Store, every: Duration) {
    let mut iv = interval(every);
    iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        iv.tick().await;
        if store.is_closed() {
            debug!("store closed, cleaner exiting");
            break;
        }
        let s = store.clone();
        match tokio::task::spawn_blocking(move || s.cleanup_expired()).await {
            Ok(Ok(_)) => {}
            Ok(Err(Error::Closed)) => break,
            Ok(Err(e)) => warn!(error = %e, "expire cleanup failed"),
            Err(e) => warn!(error = %e, "expire cleanup task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::thread::sleep;

    fn make_store() -> Store {
        Store::open(Config::temporary()).expect("打开临时 store 失败")
    }

    #[test]
    fn test_meta_encoding_and_bounds() -> anyhow::Result<()> {
        let m = TtlMeta::for_duration(1_000, 60)?;
        assert_eq!(m.expires_at, 1_060);
        assert_eq!(m.created_at, 1_000);
        assert_eq!(TtlMeta::decode(&m.encode())?, m);

        assert!(TtlMeta::for_duration(1_000, -1).is_err());
        assert!(TtlMeta::for_duration(1_000, MAX_TTL_SECS as i64 + 1).is_err());
        assert!(TtlMeta::at(1_000, -5).is_err());
        assert!(TtlMeta::at(1_000, 1_000 + MAX_TTL_SECS as i64 + 1).is_err());
        assert!(TtlMeta::decode(&[0u8; 7]).is_err());

        assert!(m.is_expired(1_060));
        assert!(!m.is_expired(1_059));
        Ok(())
    }

    #[test]
    fn test_ttl_key_namespacing() {
        let k = ttl_key(3, b"abc");
        assert_eq!(split_ttl_key(&k), Some((3, &b"abc"[..])));
        assert_ne!(ttl_key(0, b"abc"), ttl_key(1, b"abc"));
        assert_eq!(split_ttl_key(b"ab"), None);
    }

    #[test]
    fn test_expire_and_ttl() -> anyhow::Result<()> {
        let store = make_store();
        let ctx = Context::new(0);

        assert_eq!(store.ttl(&ctx, b"missing")?, TTL_NOT_FOUND);
        store.set(&ctx, b"k", b"v")?;
        assert_eq!(store.ttl(&ctx, b"k")?, TTL_PERSISTENT);
        assert_eq!(store.pttl(&ctx, b"k")?, TTL_PERSISTENT);

        assert!(store.expire(&ctx, b"k", 60)?);
        let t = store.ttl(&ctx, b"k")?;
        assert!(t > 0 && t <= 60, "ttl = {}", t);
        let p = store.pttl(&ctx, b"k")?;
        assert!(p > 0 && p <= 60_000, "pttl = {}", p);
        assert!(!store.is_expired(&ctx, b"k")?);

        // 不存在 / 负数
        assert!(!store.expire(&ctx, b"missing", 60)?);
        assert!(!store.expire(&ctx, b"k", -1)?);
        // 超过一年
        assert!(matches!(
            store.expire(&ctx, b"k", MAX_TTL_SECS as i64 + 1),
            Err(Error::InvalidTtl(_))
        ));
        Ok(())
    }

    #[test]
    fn test_expire_at() -> anyhow::Result<()> {
        let store = make_store();
        let ctx = Context::new(0);
        store.set(&ctx, b"k", b"v")?;

        let now = now_secs() as i64;
        assert!(!store.expire_at(&ctx, b"k", now - 10)?);
        assert!(!store.expire_at(&ctx, b"missing", now + 10)?);
        assert!(store.expire_at(&ctx, b"k", now + 100)?);
        let t = store.ttl(&ctx, b"k")?;
        assert!(t > 90 && t <= 100, "ttl = {}", t);
        Ok(())
    }

    #[test]
    fn test_persist() -> anyhow::Result<()> {
        let store = make_store();
        let ctx = Context::new(0);
        store.set(&ctx, b"k", b"v")?;

        assert!(!store.persist(&ctx, b"k")?);
        assert!(store.expire(&ctx, b"k", 60)?);
        assert!(store.persist(&ctx, b"k")?);
        assert_eq!(store.ttl(&ctx, b"k")?, TTL_PERSISTENT);
        assert!(!store.persist(&ctx, b"missing")?);
        Ok(())
    }

    #[test]
    fn test_lazy_expiration_on_read() -> anyhow::Result<()> {
        let store = make_store();
        let ctx = Context::new(0);
        store.set(&ctx, b"k", b"v")?;
        assert!(store.expire(&ctx, b"k", 1)?);

        sleep(Duration::from_millis(2100));
        assert!(store.is_expired(&ctx, b"k")?);
        // 后台清理还没跑，读路径也必须看不到
        assert!(!store.exists(&ctx, b"k")?);
        assert!(matches!(store.get(&ctx, b"k"), Err(Error::KeyNotFound)));
        assert_eq!(store.ttl(&ctx, b"k")?, TTL_NOT_FOUND);
        // 读路径已顺手删除
        assert!(!store.is_expired(&ctx, b"k")?);
        Ok(())
    }

    #[test]
    fn test_cleanup_expired_batches() -> anyhow::Result<()> {
        let store = Store::open(Config {
            cleanup_batch_size: 2,
            ..Config::temporary()
        })?;
        let ctx = Context::new(0);
        for i in 0..5 {
            let key = format!("k{}", i);
            store.set(&ctx, key.as_bytes(), b"v")?;
            assert!(store.expire(&ctx, key.as_bytes(), 1)?);
        }
        store.set(&ctx, b"keep", b"v")?;
        assert!(store.expire(&ctx, b"keep", 600)?);

        sleep(Duration::from_millis(2100));
        assert_eq!(store.cleanup_expired()?, 2);
        assert_eq!(store.restore_ttl()?, 3);
        assert_eq!(store.cleanup_expired()?, 0);

        assert_eq!(store.db_size(&ctx)?, 1);
        assert!(store.ttl(&ctx, b"keep")? > 0);
        Ok(())
    }

    #[test]
    fn test_ttl_is_per_database() -> anyhow::Result<()> {
        let store = make_store();
        let db0 = Context::new(0);
        let db1 = Context::new(1);
        store.set(&db0, b"k", b"zero")?;
        store.set(&db1, b"k", b"one")?;

        assert!(store.expire(&db1, b"k", 60)?);
        assert_eq!(store.ttl(&db0, b"k")?, TTL_PERSISTENT);
        assert!(store.ttl(&db1, b"k")? > 0);
        Ok(())
    }

    #[test]
    fn test_corrupt_metadata_is_dropped() -> anyhow::Result<()> {
        let store = make_store();
        let ctx = Context::new(0);
        store.set(&ctx, b"k", b"v")?;
        store.expire.insert(ttl_key(0, b"k"), b"bad".to_vec())?;

        assert!(matches!(store.ttl(&ctx, b"k"), Err(Error::Corrupt { .. })));
        assert_eq!(store.cleanup_expired()?, 0);
        assert_eq!(store.ttl(&ctx, b"k")?, TTL_PERSISTENT);
        assert_eq!(store.get(&ctx, b"k")?, b"v".to_vec());
        Ok(())
    }

    #[test]
    fn test_restore_drains_past_corrupt_entries() -> anyhow::Result<()> {
        let store = Store::open(Config {
            cleanup_batch_size: 2,
            ..Config::temporary()
        })?;
        let ctx = Context::new(0);
        // 坏记录排在最前面，占掉第一轮的一个名额
        store.set(&ctx, b"a", b"v")?;
        store.expire.insert(ttl_key(0, b"a"), b"bad".to_vec())?;
        for i in 0..3 {
            let key = format!("k{}", i);
            store.set(&ctx, key.as_bytes(), b"v")?;
            assert!(store.expire(&ctx, key.as_bytes(), 1)?);
        }

        sleep(Duration::from_millis(2100));
        assert_eq!(store.restore_ttl()?, 3);
        assert_eq!(store.db_size(&ctx)?, 1);
        assert_eq!(store.ttl(&ctx, b"a")?, TTL_PERSISTENT);
        Ok(())
    }

    #[tokio::test]
    async fn test_background_cleaner() -> anyhow::Result<()> {
        let store = Store::open(Config {
            cleanup_interval_secs: 1,
            ..Config::temporary()
        })?;
        let ctx = Context::new(0);
        store.set(&ctx, b"k", b"v")?;
        assert!(store.expire(&ctx, b"k", 1)?);

        let handle = store.spawn_cleaner();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        // 清理任务已物理删除：过期树里没有记录
        assert!(!store.is_expired(&ctx, b"k")?);
        assert_eq!(store.db_size(&ctx)?, 0);

        store.close()?;
        tokio::time::timeout(Duration::from_secs(3), handle).await??;
        Ok(())
    }
}
