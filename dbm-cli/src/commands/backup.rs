use crate::app::CliApp;
use dbm_core::db::BackupStatus;
use dbm_core::error::{DbmError, Result};
use std::path::Path;
use tracing::info;

/// 列出所有备份记录和存储目录占用
pub async fn list_backups(app: &CliApp) -> Result<()> {
    let backups = app.database.list_backups().await?;

    if backups.is_empty() {
        println!("暂无备份记录。");
        return Ok(());
    }

    println!("备份记录 ({} 条):", backups.len());
    for record in &backups {
        let status = match record.backup_status() {
            Some(BackupStatus::Pending) => "进行中",
            Some(BackupStatus::Completed) => "已完成",
            Some(BackupStatus::Failed) => "失败",
            None => "未知",
        };
        println!(
            "  {}  {}  [{}]  {}",
            record.id,
            record.file_name,
            status,
            format_size(record.file_size_bytes as u64),
        );
        if let Some(error) = &record.error_message {
            println!("      错误: {error}");
        }
    }

    let usage = app.executor.storage_usage().await?;
    println!(
        "存储目录 {} 共占用 {}",
        app.executor.storage_dir().display(),
        format_size(usage)
    );

    Ok(())
}

/// 删除备份记录及其产物文件
pub async fn remove_backup(app: &CliApp, id: &str) -> Result<()> {
    let record = app
        .database
        .get_backup_by_id(id)
        .await?
        .ok_or_else(|| DbmError::custom(format!("备份记录不存在: {id}")))?;

    // 先删文件再删记录
    let file_path = Path::new(&record.file_path);
    if file_path.exists() {
        tokio::fs::remove_file(file_path).await?;
        info!("已删除备份文件: {}", record.file_path);
    }

    app.database.delete_backup_record(id).await?;
    info!("✅ 已删除备份记录: {}", id);
    Ok(())
}

/// 人类易读的字节数
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
