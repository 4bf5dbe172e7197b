//! 窄化的 cron 求值器
//!
//! 只接受标准的5字段表达式（分 时 日 月 周）。精确语义只覆盖
//! "分钟和小时都是字面整数"的情况：下一次运行是今天的该时刻，
//! 已过则顺延到明天。其余任何模式（通配分钟/小时、步进、区间、
//! 列表、日期/星期约束、越界字面量）统一回退为"下一个整点执行"。
//!
//! 这个回退是约定行为而不是缺陷：完整的cron语法是明确的非目标，
//! 调用方依赖回退的可预测性。

use crate::{DbmError, Result};
use chrono::{DateTime, Duration, Timelike, Utc};

/// 校验cron表达式的字段数量
pub fn validate(expression: &str) -> Result<()> {
    let fields = expression.split_whitespace().count();
    if fields != 5 {
        return Err(DbmError::cron(format!(
            "无效的 cron 表达式（需要5个字段，实际{}个）: {}",
            fields, expression
        )));
    }
    Ok(())
}

/// 计算下一次运行时间
pub fn next_run(expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    validate(expression)?;

    let parts: Vec<&str> = expression.split_whitespace().collect();
    let (minute_field, hour_field) = (parts[0], parts[1]);

    if let (Ok(minute), Ok(hour)) = (minute_field.parse::<u32>(), hour_field.parse::<u32>()) {
        if minute <= 59 && hour <= 23 {
            let candidate = now
                .date_naive()
                .and_hms_opt(hour, minute, 0)
                .ok_or_else(|| {
                    DbmError::cron(format!("无法构造运行时间: {hour}:{minute}"))
                })?
                .and_utc();

            // 今天的时刻已过则顺延到明天
            return Ok(if candidate > now {
                candidate
            } else {
                candidate + Duration::days(1)
            });
        }
    }

    // 其余模式统一回退：下一个整点
    Ok(next_top_of_hour(now))
}

/// 取下一个整点（分钟、秒、纳秒归零后加一小时）
fn next_top_of_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = now
        .with_minute(0)
        .and_then(|dt| dt.with_second(0))
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(now);
    truncated + Duration::hours(1)
}
