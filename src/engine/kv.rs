// src/engine/kv.rs

//! 单次事务内的读写视图：把值表和过期表两个 `TransactionalTree`
//! 绑在一起，所有值访问都经过惰性过期检查。

use sled::IVec;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};

use crate::error::Error;
use crate::expire::{TtlMeta, ttl_key};

/// 事务闭包的返回类型
pub type TxResult<T> = ConflictableTransactionResult<T, Error>;

/// 以指定错误中止事务
pub fn abort<T>(e: Error) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(e))
}

pub struct Scope<'a> {
    pub(crate) data: &'a TransactionalTree,
    pub(crate) ttl: &'a TransactionalTree,
    pub(crate) db: u32,
    /// 事务开始时刻（UNIX 秒）
    pub(crate) now: u64,
}

impl<'a> Scope<'a> {
    pub fn db(&self) -> u32 {
        self.db
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// 读取 key 的过期元数据
    pub fn meta(&self, key: &[u8]) -> TxResult<Option<TtlMeta>> {
        match self.ttl.get(ttl_key(self.db, key))? {
            Some(raw) => match TtlMeta::decode(&raw) {
                Ok(m) => Ok(Some(m)),
                Err(_) => abort(Error::corrupt(key, "bad ttl metadata")),
            },
            None => Ok(None),
        }
    }

    pub fn put_meta(&self, key: &[u8], meta: &TtlMeta) -> TxResult<()> {
        self.ttl.insert(ttl_key(self.db, key), meta.encode().to_vec())?;
        Ok(())
    }

    /// 删除过期元数据，返回之前是否存在
    pub fn remove_meta(&self, key: &[u8]) -> TxResult<bool> {
        Ok(self.ttl.remove(ttl_key(self.db, key))?.is_some())
    }

    /// 读取 key 的当前值：已过期视为不存在，并顺手删除值和元数据
    pub fn load(&self, key: &[u8]) -> TxResult<Option<IVec>> {
        if let Some(meta) = self.meta(key)? {
            if meta.is_expired(self.now) {
                self.data.remove(key)?;
                self.remove_meta(key)?;
                return Ok(None);
            }
        }
        Ok(self.data.get(key)?)
    }

    /// 整值写回，不改动过期元数据
    pub fn store(&self, key: &[u8], value: &[u8]) -> TxResult<()> {
        self.data.insert(key, value)?;
        Ok(())
    }

    /// 删除值及其过期元数据；返回删除前 key 是否（未过期地）存在。
    /// 元数据无法解码时不中止：值仍在就算作存活，两条记录一并删除
    pub fn purge(&self, key: &[u8]) -> TxResult<bool> {
        let expired = match self.ttl.remove(ttl_key(self.db, key))? {
            Some(raw) => TtlMeta::decode(&raw).is_ok_and(|m| m.is_expired(self.now)),
            None => false,
        };
        let existed = self.data.remove(key)?.is_some();
        Ok(existed && !expired)
    }
}
