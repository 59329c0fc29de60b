// src/engine/mod.rs

//! # 引擎模块
//!
//! `Store` 是整个存储核心的入口，它：
//! - 持有 sled 环境（`sled::Db`），每个逻辑库一棵 Tree，另有一棵 `expire` 树存过期元数据；
//! - 每个操作都包在一次跨“值表 + 过期表”的 sled 事务里，读改写整值完成；
//! - 在三个检查点响应调用方取消：解析表之前、开启事务之前、事务提交之前。
//!
//! 各类型的命令实现分布在 `types::{string, list, set, zset}` 和 `expire` 中，
//! 都是 `impl Store` 的一部分。

pub mod kv;
pub mod tables;

pub use kv::Scope;
pub use tables::Tables;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sled::transaction::{ConflictableTransactionError, TransactionResult};
use sled::{Batch, Db, Transactional, Tree};
use tracing::info;

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::expire::{expire_tree, now_secs, ttl_key};
use kv::TxResult;

/// key 的最大长度（字节）
pub const MAX_KEY_SIZE: usize = 511;

/// 存储环境；克隆开销很小，所有副本共享同一个 sled 实例
#[derive(Clone)]
pub struct Store {
    pub(crate) env: Db,
    pub(crate) tables: Arc<Tables>,
    pub(crate) expire: Tree,
    config: Arc<Config>,
    closed: Arc<AtomicBool>,
}

impl Store {
    /// 打开（或创建）环境；配置开启时先执行一次启动恢复，再对外服务
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let env = config.sled_config().open()?;
        let expire = expire_tree(&env)?;
        let store = Store {
            tables: Arc::new(Tables::new(env.clone(), config.max_databases)),
            env,
            expire,
            config: Arc::new(config),
            closed: Arc::new(AtomicBool::new(false)),
        };
        info!(
            path = ?store.config.data_dir,
            temporary = store.config.temporary,
            "store opened"
        );
        if store.config.restore_on_open {
            store.restore_ttl()?;
        }
        Ok(store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 刷盘并标记关闭；之后的操作返回 `Error::Closed`。重复调用无副作用
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let bytes = self.env.flush()?;
        info!(flushed_bytes = bytes, "store closed");
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// key 校验：非空且不超过 MAX_KEY_SIZE
    pub fn validate_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        Ok(())
    }

    /// 在 ctx 所选库上执行一次事务
    pub(crate) fn run<T, F>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: Fn(&Scope<'_>) -> TxResult<T>,
    {
        self.ensure_open()?;
        ctx.check()?;
        let table = self.tables.resolve(ctx.db())?;
        self.transact(ctx, &table, f)
    }

    fn transact<T, F>(&self, ctx: &Context, table: &Tree, f: F) -> Result<T>
    where
        F: Fn(&Scope<'_>) -> TxResult<T>,
    {
        ctx.check()?;
        let res: TransactionResult<T, Error> = (table, &self.expire).transaction(|(data, ttl)| {
            let scope = Scope {
                data,
                ttl,
                db: ctx.db(),
                now: now_secs(),
            };
            let out = f(&scope)?;
            // 提交前最后一次检查，取消则整个事务回滚
            ctx.check().map_err(ConflictableTransactionError::Abort)?;
            Ok(out)
        });
        Ok(res?)
    }

    /// FLUSHALL：在一次事务里清空当前库的全部记录及其过期元数据，
    /// 返回删除的记录数
    pub fn flush_all(&self, ctx: &Context) -> Result<u64> {
        self.ensure_open()?;
        ctx.check()?;
        let db = ctx.db();
        let table = self.tables.resolve(db)?;

        let keys = table.iter().keys().collect::<std::result::Result<Vec<_>, _>>()?;
        let mut metas = Batch::default();
        for key in self.expire.scan_prefix(db.to_be_bytes()).keys() {
            metas.remove(key?);
        }

        self.transact(ctx, &table, |scope| {
            scope.ttl.apply_batch(&metas)?;
            // 扫描之后才写入的元数据也要随值一起删掉
            for key in &keys {
                scope.data.remove(&key[..])?;
                scope.ttl.remove(ttl_key(db, &key[..]))?;
            }
            Ok(())
        })?;
        let count = keys.len() as u64;
        info!(db, removed = count, "flushall");
        Ok(count)
    }

    /// 当前库中物理存在的记录数（可能包含尚未清理的过期 key）
    pub fn db_size(&self, ctx: &Context) -> Result<u64> {
        self.ensure_open()?;
        ctx.check()?;
        Ok(self.tables.resolve(ctx.db())?.len() as u64)
    }
}
