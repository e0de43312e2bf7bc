//! 截止时间
//!
//! 一次运行只有一个截止时间，创建后不可延长

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// 运行的绝对截止时间
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    at: Instant,
}

impl Deadline {
    /// 从当前时刻起，给定预算后截止
    pub fn after(budget: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            at: started_at + budget,
        }
    }

    /// 剩余时间，已过期时为零
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// 在截止时间内执行，超时则丢弃该 future
    pub async fn run_within<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::time::timeout_at(self.at, fut).await.ok()
    }

    /// 在 `limit` 与剩余时间中较小者内执行
    ///
    /// 返回 `Err(true)` 表示撞到了截止时间，`Err(false)` 表示只是超过了 `limit`
    pub async fn run_bounded<F: Future>(&self, limit: Duration, fut: F) -> Result<F::Output, bool> {
        let own_limit = Instant::now() + limit;
        if own_limit < self.at {
            tokio::time::timeout_at(own_limit, fut)
                .await
                .map_err(|_| self.is_expired())
        } else {
            tokio::time::timeout_at(self.at, fut).await.map_err(|_| true)
        }
    }

    /// 睡眠，但不超过截止时间；返回是否完整睡完
    pub async fn sleep(&self, duration: Duration) -> bool {
        let wake = Instant::now() + duration;
        if wake >= self.at {
            tokio::time::sleep_until(self.at).await;
            false
        } else {
            tokio::time::sleep_until(wake).await;
            true
        }
    }
}
