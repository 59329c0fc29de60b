// src/types/mod.rs

//! String / List / Set / SortedSet 的命令实现（均为 `impl Store`）。
//!
//! 复合类型没有类型标记，只能靠解码结果判断记录是否“长得像”目标类型：
//! - 写路径（push/add/rem/pop/set）：任何解码失败都按 WRONGTYPE 处理；
//! - 读路径（index/range/members/count）：头部声明的长度超出实际缓冲区
//!   视为磁盘损坏，其余失败按 WRONGTYPE 处理。

pub mod list;
pub mod set;
pub mod string;
pub mod zset;

use crate::codec::{DecodeError, EncodeError};
use crate::engine::Scope;
use crate::engine::kv::{TxResult, abort};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

pub(crate) fn classify(key: &[u8], access: Access, e: DecodeError) -> Error {
    match (access, &e) {
        (Access::Read, DecodeError::Truncated { .. }) => Error::corrupt(key, e),
        _ => Error::WrongType,
    }
}

/// 读取并解码 key 的当前值；不存在（或已过期）返回 None
pub(crate) fn decoded<T>(
    scope: &Scope<'_>,
    key: &[u8],
    access: Access,
    decode: fn(&[u8]) -> Result<T, DecodeError>,
) -> TxResult<Option<T>> {
    match scope.load(key)? {
        None => Ok(None),
        Some(raw) => match decode(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => abort(classify(key, access, e)),
        },
    }
}

/// 编码结果转为事务结果；成员过大时中止事务
pub(crate) fn encoded(blob: Result<Vec<u8>, EncodeError>) -> TxResult<Vec<u8>> {
    match blob {
        Ok(b) => Ok(b),
        Err(e) => abort(e.into()),
    }
}
