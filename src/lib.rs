// src/lib.rs
//! crab-vault：嵌入式、落盘的 Redis 风格 KV 引擎
//!
//! config / context / codec / engine / error / expire / persister / types

pub mod codec;     // 复合类型的二进制编码
pub mod config;    // 配置加载与校验
pub mod context;   // 库选择、取消、截止时间
pub mod engine;    // 存储引擎（sled 事务 + 表管理）
pub mod error;     // 统一错误类型
pub mod expire;    // 过期策略
pub mod persister; // 对外接口
pub mod types;     // String / List / Set / SortedSet 数据结构

pub use codec::ScoredMember;
pub use config::Config;
pub use context::Context;
pub use engine::{MAX_KEY_SIZE, Store};
pub use error::{Error, Result};
pub use expire::{MAX_TTL_SECS, TTL_NOT_FOUND, TTL_PERSISTENT};
pub use persister::Persister;
