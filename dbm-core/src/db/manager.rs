use crate::{DbmError, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

use super::actor::DuckDbActor;
use super::messages::DbMessage;
use super::models::{BackupFileRecord, ConnectionRecord, ScheduleRecord};

/// DuckDB数据库管理器
#[derive(Debug, Clone)]
pub struct DbManager {
    sender: mpsc::Sender<DbMessage>,
}

impl DbManager {
    /// 创建新的DuckDB管理器
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // 确保数据库文件的父目录存在
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let actor = DuckDbActor::new(db_path)?;
        Self::start(actor).await
    }

    /// 创建内存数据库管理器
    pub async fn new_memory() -> Result<Self> {
        let actor = DuckDbActor::new_memory()?;
        Self::start(actor).await
    }

    /// 启动Actor并初始化数据库表
    async fn start(actor: DuckDbActor) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(100);
        tokio::spawn(actor.run(receiver));

        let manager = Self { sender };
        manager
            .request(|respond_to| DbMessage::InitTables { respond_to })
            .await?;

        Ok(manager)
    }

    /// 发送消息并等待Actor响应
    async fn request<T>(
        &self,
        make_message: impl FnOnce(oneshot::Sender<Result<T>>) -> DbMessage,
    ) -> Result<T> {
        let (respond_to, receiver) = oneshot::channel();

        self.sender
            .send(make_message(respond_to))
            .await
            .map_err(|_| DbmError::custom("数据库Actor已关闭"))?;

        receiver
            .await
            .map_err(|_| DbmError::custom("等待数据库响应失败"))?
    }

    // ========== 数据库连接 ==========

    /// 创建数据库连接
    pub async fn create_connection(&self, record: ConnectionRecord) -> Result<()> {
        self.request(|respond_to| DbMessage::CreateConnection { record, respond_to })
            .await
    }

    /// 获取所有数据库连接
    pub async fn list_connections(&self) -> Result<Vec<ConnectionRecord>> {
        self.request(|respond_to| DbMessage::ListConnections { respond_to })
            .await
    }

    /// 根据ID获取数据库连接
    pub async fn get_connection(&self, id: &str) -> Result<Option<ConnectionRecord>> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::GetConnection { id, respond_to })
            .await
    }

    /// 更新连接的 PostgreSQL 版本号
    pub async fn update_connection_version(&self, id: &str, version: &str) -> Result<()> {
        let id = id.to_string();
        let version = version.to_string();
        self.request(|respond_to| DbMessage::UpdateConnectionVersion {
            id,
            version,
            respond_to,
        })
        .await
    }

    /// 删除数据库连接
    pub async fn delete_connection(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::DeleteConnection { id, respond_to })
            .await
    }

    // ========== 备份计划 ==========

    /// 创建备份计划
    pub async fn create_schedule(&self, record: ScheduleRecord) -> Result<()> {
        self.request(|respond_to| DbMessage::CreateSchedule { record, respond_to })
            .await
    }

    /// 获取所有备份计划
    pub async fn list_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        self.request(|respond_to| DbMessage::ListSchedules { respond_to })
            .await
    }

    /// 获取所有生效的备份计划
    pub async fn list_active_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        self.request(|respond_to| DbMessage::ListActiveSchedules { respond_to })
            .await
    }

    /// 根据ID获取备份计划
    pub async fn get_schedule(&self, id: &str) -> Result<Option<ScheduleRecord>> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::GetSchedule { id, respond_to })
            .await
    }

    /// 启用或停用备份计划
    pub async fn set_schedule_active(&self, id: &str, active: bool) -> Result<()> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::SetScheduleActive {
            id,
            active,
            respond_to,
        })
        .await
    }

    /// 更新计划的上次运行时间
    pub async fn update_schedule_last_run(
        &self,
        id: &str,
        last_run_at: DateTime<Utc>,
    ) -> Result<()> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::UpdateScheduleLastRun {
            id,
            last_run_at,
            respond_to,
        })
        .await
    }

    /// 更新计划的下次运行时间
    pub async fn update_schedule_next_run(
        &self,
        id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::UpdateScheduleNextRun {
            id,
            next_run_at,
            respond_to,
        })
        .await
    }

    /// 删除备份计划
    pub async fn delete_schedule(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::DeleteSchedule { id, respond_to })
            .await
    }

    // ========== 备份文件记录 ==========

    /// 插入备份文件记录
    pub async fn insert_backup_record(&self, record: BackupFileRecord) -> Result<()> {
        self.request(|respond_to| DbMessage::InsertBackupRecord { record, respond_to })
            .await
    }

    /// 将pending记录迁移到终态
    pub async fn complete_backup_record(
        &self,
        id: &str,
        status: &str,
        file_size_bytes: i64,
        error_message: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let id = id.to_string();
        let status = status.to_string();
        self.request(|respond_to| DbMessage::CompleteBackupRecord {
            id,
            status,
            file_size_bytes,
            error_message,
            completed_at,
            respond_to,
        })
        .await
    }

    /// 获取所有备份文件记录
    pub async fn list_backups(&self) -> Result<Vec<BackupFileRecord>> {
        self.request(|respond_to| DbMessage::ListBackups { respond_to })
            .await
    }

    /// 根据ID获取备份文件记录
    pub async fn get_backup_by_id(&self, id: &str) -> Result<Option<BackupFileRecord>> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::GetBackupById { id, respond_to })
            .await
    }

    /// 删除备份文件记录
    pub async fn delete_backup_record(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.request(|respond_to| DbMessage::DeleteBackupRecord { id, respond_to })
            .await
    }
}
