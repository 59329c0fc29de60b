// src/context.rs

//! 调用上下文：携带库编号、取消标记和可选截止时间。
//!
//! 克隆出来的 Context 共享同一个取消标记，任何一份调用 `cancel()`
//! 都会让其余副本上的操作在下一个检查点中止。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct Context {
    db: u32,
    canceled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new(db: u32) -> Self {
        Context {
            db,
            ..Context::default()
        }
    }

    /// 切换库编号，保留取消标记与截止时间（相当于 SELECT）
    pub fn select(&self, db: u32) -> Self {
        Context {
            db,
            canceled: Arc::clone(&self.canceled),
            deadline: self.deadline,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn db(&self) -> u32 {
        self.db
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// 检查点：已取消或已超时则返回对应错误
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(Error::Canceled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let ctx = Context::new(0);
        let other = ctx.select(3);
        assert_eq!(other.db(), 3);
        assert!(ctx.check().is_ok());

        other.cancel();
        assert!(ctx.is_canceled());
        assert!(matches!(ctx.check(), Err(Error::Canceled)));
    }

    #[test]
    fn test_deadline() {
        let ctx = Context::new(0).with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));

        let ctx = Context::new(0).with_timeout(Duration::from_secs(60));
        assert!(ctx.check().is_ok());
    }
}
