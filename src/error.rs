// src/error.rs

//! 统一错误类型
//!
//! 分类：校验错误 / 未找到 / 类型不匹配 / 数据损坏 / 取消 / 底层引擎错误。

use sled::transaction::TransactionError;
use thiserror::Error;

use crate::codec::{EncodeError, MAX_MEMBER_SIZE};

/// crate 内统一使用的 Result
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // 校验错误
    // -------------------------------------------------------------------------
    #[error("ERR empty key")]
    EmptyKey,

    #[error("ERR key too large: {len} bytes (max {max})")]
    KeyTooLarge { len: usize, max: usize },

    #[error("ERR invalid expire time: {0}")]
    InvalidTtl(String),

    #[error("ERR score is not a valid float")]
    InvalidScore,

    #[error("ERR value too large: {len} bytes (max {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("ERR invalid database id {id} (max {max})")]
    InvalidDatabase { id: u32, max: u32 },

    // -------------------------------------------------------------------------
    // 未找到
    // -------------------------------------------------------------------------
    #[error("ERR key not found")]
    KeyNotFound,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    // -------------------------------------------------------------------------
    // 类型 / 取值不匹配
    // -------------------------------------------------------------------------
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    // -------------------------------------------------------------------------
    // 磁盘数据损坏
    // -------------------------------------------------------------------------
    #[error("ERR corrupt record for key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    // -------------------------------------------------------------------------
    // 取消 / 超时
    // -------------------------------------------------------------------------
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    // -------------------------------------------------------------------------
    // 生命周期 / 配置
    // -------------------------------------------------------------------------
    #[error("ERR store is closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // 底层引擎
    // -------------------------------------------------------------------------
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 构造一个损坏错误，key 以 hex 形式展示
    pub fn corrupt(key: &[u8], reason: impl ToString) -> Self {
        Error::Corrupt {
            key: hex::encode(key),
            reason: reason.to_string(),
        }
    }

    /// 属于“预期内”的未找到类结果
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound | Error::IndexOutOfRange)
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Canceled | Error::DeadlineExceeded)
    }
}

/// sled 事务错误：Abort 原样透出，Storage 归为引擎错误
impl From<TransactionError<Error>> for Error {
    fn from(e: TransactionError<Error>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => Error::Engine(inner),
        }
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::MemberTooLarge { len } => Error::ValueTooLarge {
                len,
                max: MAX_MEMBER_SIZE,
            },
        }
    }
}
