use chrono::{DateTime, Utc};

/// 当前时间来源
///
/// 调度器通过这个trait取当前时间，测试中可注入固定时钟。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
