use crate::app::CliApp;
use chrono::{DateTime, SecondsFormat, Utc};
use dbm_core::database::NewSchedule;
use dbm_core::db::BackupStatus;
use dbm_core::error::{DbmError, Result};
use tracing::{info, warn};

/// 新建备份计划并安排第一次运行
pub async fn add_schedule(
    app: &CliApp,
    name: String,
    cron: String,
    timezone: Option<String>,
    connection_id: String,
) -> Result<()> {
    let record = app
        .database
        .create_schedule(NewSchedule {
            name,
            cron_expression: cron,
            timezone,
            connection_id,
        })
        .await?;

    // 立刻求值一次，把下次运行时间写入持久层
    app.scheduler.schedule_backup(&record.id).await?;

    info!("✅ 已创建备份计划: {} ({})", record.name, record.id);
    info!("运行 'dbm-cli serve' 后计划开始按周期执行");
    Ok(())
}

/// 列出所有备份计划
pub async fn list_schedules(app: &CliApp) -> Result<()> {
    let schedules = app.database.list_schedules().await?;

    if schedules.is_empty() {
        println!("暂无备份计划，使用 'dbm-cli schedule add' 创建。");
        return Ok(());
    }

    println!("备份计划 ({} 个):", schedules.len());
    for schedule in schedules {
        let state = if schedule.is_active {
            "生效"
        } else {
            "停用"
        };
        println!(
            "  {}  {}  [{}]  cron: '{}'  上次: {}  下次: {}",
            schedule.id,
            schedule.name,
            state,
            schedule.cron_expression,
            format_time(schedule.last_run_at),
            format_time(schedule.next_run_at),
        );
    }

    Ok(())
}

/// 启用备份计划并重新上膛
pub async fn enable_schedule(app: &CliApp, id: &str) -> Result<()> {
    ensure_schedule_exists(app, id).await?;

    app.database.set_schedule_active(id, true).await?;
    app.scheduler.schedule_backup(id).await?;

    info!("✅ 已启用备份计划: {}", id);
    Ok(())
}

/// 停用备份计划并取消定时器
pub async fn disable_schedule(app: &CliApp, id: &str) -> Result<()> {
    ensure_schedule_exists(app, id).await?;

    app.scheduler.cancel_schedule(id).await?;

    info!("✅ 已停用备份计划: {}", id);
    Ok(())
}

/// 立即执行一次备份并报告结果
pub async fn run_schedule_now(app: &CliApp, id: &str) -> Result<()> {
    ensure_schedule_exists(app, id).await?;

    info!("正在执行备份计划: {}", id);
    app.scheduler.execute_scheduled_backup(id).await;

    // 执行器的失败不向上抛，从最新记录读取本次结果
    let latest = app
        .database
        .list_backups()
        .await?
        .into_iter()
        .find(|record| record.schedule_id == id);

    match latest {
        Some(record) => match record.backup_status() {
            Some(BackupStatus::Completed) => {
                info!(
                    "✅ 备份完成: {} ({} 字节)",
                    record.file_path, record.file_size_bytes
                );
                Ok(())
            }
            _ => {
                warn!(
                    "❌ 备份失败: {}",
                    record.error_message.as_deref().unwrap_or("未知错误")
                );
                Err(DbmError::custom("备份执行失败"))
            }
        },
        None => Err(DbmError::custom("本次执行没有产生备份记录")),
    }
}

/// 删除备份计划
pub async fn remove_schedule(app: &CliApp, id: &str) -> Result<()> {
    ensure_schedule_exists(app, id).await?;

    // 先丢弃内存定时器，再删除持久化的计划
    app.scheduler.cancel_job(id);
    app.database.delete_schedule(id).await?;

    info!("✅ 已删除备份计划: {}", id);
    Ok(())
}

async fn ensure_schedule_exists(app: &CliApp, id: &str) -> Result<()> {
    if app.database.get_schedule(id).await?.is_none() {
        return Err(DbmError::custom(format!("备份计划不存在: {id}")));
    }
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}
