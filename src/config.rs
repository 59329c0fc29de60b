// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use anyhow::{Context, Result};
use tracing::info;

use crate::error::Error;

/// 单个环境最多允许的逻辑库数量（硬上限）
pub const MAX_DATABASES: u32 = 100;

/// 存储引擎配置，可从 JSON 文件读入
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// sled 环境目录
    pub data_dir: PathBuf,
    /// 临时库（关闭后删除），测试用
    pub temporary: bool,
    /// 允许的逻辑库数量，库 id 取值 0..max_databases
    pub max_databases: u32,
    /// sled 页缓存大小（字节）
    pub cache_capacity: u64,
    /// sled 后台刷盘周期（毫秒），None 表示只在显式 flush 时落盘
    pub flush_every_ms: Option<u64>,
    /// 后台过期清理周期（秒）
    pub cleanup_interval_secs: u64,
    /// 每轮清理最多处理的过期 key 数
    pub cleanup_batch_size: usize,
    /// 打开时先跑一次启动恢复
    pub restore_on_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("crab_vault_data"),
            temporary: false,
            max_databases: MAX_DATABASES,
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
            cleanup_interval_secs: 60,
            cleanup_batch_size: 100,
            restore_on_open: true,
        }
    }
}

impl Config {
    /// 指定目录，其余取默认值
    pub fn with_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Config {
            data_dir: dir.into(),
            ..Config::default()
        }
    }

    /// 临时环境
    pub fn temporary() -> Self {
        Config {
            temporary: true,
            ..Config::default()
        }
    }

    /// 超出上限属于配置错误，在打开环境时直接拒绝
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_databases == 0 || self.max_databases > MAX_DATABASES {
            return Err(Error::Config(format!(
                "max_databases must be within 1..={}, got {}",
                MAX_DATABASES, self.max_databases
            )));
        }
        if self.cleanup_batch_size == 0 {
            return Err(Error::Config("cleanup_batch_size must be positive".into()));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(Error::Config("cleanup_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub(crate) fn sled_config(&self) -> sled::Config {
        let cfg = sled::Config::new()
            .temporary(self.temporary)
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms);
        // 临时库不指定目录，由 sled 生成独立的临时路径
        if self.temporary {
            cfg
        } else {
            cfg.path(&self.data_dir)
        }
    }
}

/// 从指定路径读取并反序列化 JSON 配置
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();

    // 如果配置文件不存在，写出默认配置
    if !path_ref.exists() {
        let default_cfg = Config::default();
        let default_json = serde_json::to_string_pretty(&default_cfg)?;
        fs::write(path_ref, default_json)
            .with_context(|| format!("Failed to write default config {:?}", path_ref))?;
        info!(path = ?path_ref, "config file not found, default configuration created");
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;
    let cfg: Config = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config file {:?}", path_ref))?;
    cfg.validate()?;
    Ok(cfg)
}
