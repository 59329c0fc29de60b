// src/engine/tables.rs

//! 表管理：每个逻辑库（db id）对应环境中的一棵 sled Tree，首次使用时创建。
//!
//! 已创建的表走 DashMap 读路径，不会碰创建锁；只有第一次见到的 id
//! 才会在 `create_lock` 上串行化。

use dashmap::DashMap;
use parking_lot::Mutex;
use sled::{Db, Tree};
use tracing::debug;

use crate::error::{Error, Result};

/// 逻辑库对应的 Tree 名称
pub fn table_name(db_id: u32) -> String {
    format!("db_{:02}", db_id)
}

pub struct Tables {
    env: Db,
    max_databases: u32,
    cache: DashMap<u32, Tree>,
    create_lock: Mutex<()>,
}

impl Tables {
    pub fn new(env: Db, max_databases: u32) -> Self {
        Tables {
            env,
            max_databases,
            cache: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// 取得 db_id 对应的表，不存在则创建
    pub fn resolve(&self, db_id: u32) -> Result<Tree> {
        if db_id >= self.max_databases {
            return Err(Error::InvalidDatabase {
                id: db_id,
                max: self.max_databases,
            });
        }
        if let Some(tree) = self.cache.get(&db_id) {
            return Ok(tree.value().clone());
        }

        let _guard = self.create_lock.lock();
        // 双重检查：等锁期间可能已被其他线程创建
        if let Some(tree) = self.cache.get(&db_id) {
            return Ok(tree.value().clone());
        }
        let tree = self.env.open_tree(table_name(db_id))?;
        debug!(db = db_id, "table opened");
        self.cache.insert(db_id, tree.clone());
        Ok(tree)
    }

    /// 已打开的表数量
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn max_databases(&self) -> u32 {
        self.max_databases
    }
}
