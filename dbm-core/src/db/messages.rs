use crate::Result;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use super::models::{BackupFileRecord, ConnectionRecord, ScheduleRecord};

/// DuckDB数据库操作消息
#[derive(Debug)]
pub enum DbMessage {
    /// 初始化数据库表
    InitTables {
        respond_to: oneshot::Sender<Result<()>>,
    },

    // ========== 数据库连接管理 ==========
    /// 创建数据库连接
    CreateConnection {
        record: ConnectionRecord,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 获取所有数据库连接
    ListConnections {
        respond_to: oneshot::Sender<Result<Vec<ConnectionRecord>>>,
    },
    /// 根据ID获取数据库连接
    GetConnection {
        id: String,
        respond_to: oneshot::Sender<Result<Option<ConnectionRecord>>>,
    },
    /// 更新连接的 PostgreSQL 版本号
    UpdateConnectionVersion {
        id: String,
        version: String,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 删除数据库连接
    DeleteConnection {
        id: String,
        respond_to: oneshot::Sender<Result<()>>,
    },

    // ========== 备份计划管理 ==========
    /// 创建备份计划
    CreateSchedule {
        record: ScheduleRecord,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 获取所有备份计划
    ListSchedules {
        respond_to: oneshot::Sender<Result<Vec<ScheduleRecord>>>,
    },
    /// 获取所有生效的备份计划
    ListActiveSchedules {
        respond_to: oneshot::Sender<Result<Vec<ScheduleRecord>>>,
    },
    /// 根据ID获取备份计划
    GetSchedule {
        id: String,
        respond_to: oneshot::Sender<Result<Option<ScheduleRecord>>>,
    },
    /// 启用或停用备份计划
    SetScheduleActive {
        id: String,
        active: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 更新计划的上次运行时间
    UpdateScheduleLastRun {
        id: String,
        last_run_at: DateTime<Utc>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 更新计划的下次运行时间
    UpdateScheduleNextRun {
        id: String,
        next_run_at: DateTime<Utc>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 删除备份计划
    DeleteSchedule {
        id: String,
        respond_to: oneshot::Sender<Result<()>>,
    },

    // ========== 备份文件记录管理 ==========
    /// 插入备份文件记录（pending状态）
    InsertBackupRecord {
        record: BackupFileRecord,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 将pending记录迁移到终态（completed/failed）
    CompleteBackupRecord {
        id: String,
        status: String,
        file_size_bytes: i64,
        error_message: Option<String>,
        completed_at: DateTime<Utc>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 获取所有备份文件记录
    ListBackups {
        respond_to: oneshot::Sender<Result<Vec<BackupFileRecord>>>,
    },
    /// 根据ID获取备份文件记录
    GetBackupById {
        id: String,
        respond_to: oneshot::Sender<Result<Option<BackupFileRecord>>>,
    },
    /// 删除备份文件记录
    DeleteBackupRecord {
        id: String,
        respond_to: oneshot::Sender<Result<()>>,
    },
}
