use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 数据库连接
///
/// 凭据只在发起备份子进程时通过环境变量传递，不出现在任何日志中。
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    /// 数据库类型，如 'postgresql'
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    /// 检测到的 PostgreSQL 主版本号，如 '16'
    pub postgres_version: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// 手动实现Debug，避免密码泄露到日志
impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("username", &self.username)
            .field("password", &"<已隐藏>")
            .field("postgres_version", &self.postgres_version)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// 备份计划
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: String,
    pub name: String,
    /// 5字段 cron 表达式，如 '0 2 * * *'
    pub cron_expression: String,
    pub timezone: String,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub connection_id: String,
}

/// 备份文件记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFileRecord {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub schedule_id: String,
}

impl BackupFileRecord {
    /// 解析记录的状态字段
    pub fn backup_status(&self) -> Option<BackupStatus> {
        BackupStatus::parse(&self.status)
    }
}

/// 备份状态
///
/// 状态单调：pending 只会经历一次终态迁移，记录不会被重新打开。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackupStatus {
    Pending,
    Completed,
    Failed,
}

impl BackupStatus {
    /// 数据库中存储的状态字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Pending => "pending",
            BackupStatus::Completed => "completed",
            BackupStatus::Failed => "failed",
        }
    }

    /// 从存储的字符串解析状态
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BackupStatus::Pending),
            "completed" => Some(BackupStatus::Completed),
            "failed" => Some(BackupStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            BackupStatus::Pending,
            BackupStatus::Completed,
            BackupStatus::Failed,
        ] {
            assert_eq!(BackupStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BackupStatus::parse("unknown"), None);
    }

    #[test]
    fn test_connection_debug_redacts_password() {
        let conn = ConnectionRecord {
            id: "c1".to_string(),
            name: "prod".to_string(),
            db_type: "postgresql".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database_name: "app".to_string(),
            username: "admin".to_string(),
            password: "super-secret".to_string(),
            postgres_version: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let debug = format!("{conn:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<已隐藏>"));
    }
}
