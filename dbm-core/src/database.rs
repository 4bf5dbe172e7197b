use crate::db::{BackupFileRecord, BackupStatus, ConnectionRecord, DbManager, ScheduleRecord};
use crate::scheduler::cron;
use crate::{DbmError, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// 数据库管理器 - DuckDB适配器
///
/// 持久化层的领域接口：负责生成ID与时间戳、做入参校验，
/// 并把调度器/CLI的操作转发给底层的 DbManager。
#[derive(Debug, Clone)]
pub struct Database {
    manager: DbManager,
}

/// 新建数据库连接的参数
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub name: String,
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    pub postgres_version: Option<String>,
}

/// 新建备份计划的参数
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub name: String,
    pub cron_expression: String,
    pub timezone: Option<String>,
    pub connection_id: String,
}

impl Database {
    /// 连接到数据库
    pub async fn connect<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let manager = DbManager::new(db_path).await?;
        Ok(Database { manager })
    }

    /// 创建内存数据库（测试用）
    pub async fn connect_memory() -> Result<Self> {
        let manager = DbManager::new_memory().await?;
        Ok(Database { manager })
    }

    // ========== 数据库连接 ==========

    /// 创建数据库连接
    pub async fn create_connection(&self, params: NewConnection) -> Result<ConnectionRecord> {
        let now = Utc::now();
        let record = ConnectionRecord {
            id: Uuid::new_v4().to_string(),
            name: params.name,
            db_type: params.db_type,
            host: params.host,
            port: params.port,
            database_name: params.database_name,
            username: params.username,
            password: params.password,
            postgres_version: params.postgres_version,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.manager.create_connection(record.clone()).await?;
        Ok(record)
    }

    /// 获取所有数据库连接
    pub async fn list_connections(&self) -> Result<Vec<ConnectionRecord>> {
        self.manager.list_connections().await
    }

    /// 根据ID获取数据库连接
    pub async fn get_connection(&self, id: &str) -> Result<Option<ConnectionRecord>> {
        self.manager.get_connection(id).await
    }

    /// 更新连接的 PostgreSQL 版本号
    pub async fn update_connection_version(&self, id: &str, version: &str) -> Result<()> {
        self.manager.update_connection_version(id, version).await
    }

    /// 删除数据库连接
    pub async fn delete_connection(&self, id: &str) -> Result<()> {
        self.manager.delete_connection(id).await
    }

    // ========== 备份计划 ==========

    /// 创建备份计划
    ///
    /// 引用的连接必须存在；cron表达式必须是5字段格式。
    pub async fn create_schedule(&self, params: NewSchedule) -> Result<ScheduleRecord> {
        cron::validate(&params.cron_expression)?;

        if self.get_connection(&params.connection_id).await?.is_none() {
            return Err(DbmError::custom(format!(
                "数据库连接不存在: {}",
                params.connection_id
            )));
        }

        let now = Utc::now();
        let record = ScheduleRecord {
            id: Uuid::new_v4().to_string(),
            name: params.name,
            cron_expression: params.cron_expression,
            timezone: params.timezone.unwrap_or_else(|| "UTC".to_string()),
            is_active: true,
            last_run_at: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
            connection_id: params.connection_id,
        };

        self.manager.create_schedule(record.clone()).await?;
        Ok(record)
    }

    /// 获取所有备份计划
    pub async fn list_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        self.manager.list_schedules().await
    }

    /// 获取所有生效的备份计划
    pub async fn list_active_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        self.manager.list_active_schedules().await
    }

    /// 根据ID获取备份计划
    pub async fn get_schedule(&self, id: &str) -> Result<Option<ScheduleRecord>> {
        self.manager.get_schedule(id).await
    }

    /// 启用或停用备份计划
    pub async fn set_schedule_active(&self, id: &str, active: bool) -> Result<()> {
        self.manager.set_schedule_active(id, active).await
    }

    /// 更新计划的上次运行时间
    pub async fn update_schedule_last_run(
        &self,
        id: &str,
        last_run_at: DateTime<Utc>,
    ) -> Result<()> {
        self.manager.update_schedule_last_run(id, last_run_at).await
    }

    /// 更新计划的下次运行时间
    pub async fn update_schedule_next_run(
        &self,
        id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        self.manager.update_schedule_next_run(id, next_run_at).await
    }

    /// 删除备份计划
    pub async fn delete_schedule(&self, id: &str) -> Result<()> {
        self.manager.delete_schedule(id).await
    }

    // ========== 备份文件记录 ==========

    /// 插入pending状态的备份文件记录
    pub async fn insert_backup_record(
        &self,
        schedule_id: &str,
        file_name: &str,
        file_path: &str,
        started_at: DateTime<Utc>,
    ) -> Result<BackupFileRecord> {
        let record = BackupFileRecord {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            file_size_bytes: 0,
            status: BackupStatus::Pending.as_str().to_string(),
            error_message: None,
            started_at,
            completed_at: None,
            created_at: started_at,
            schedule_id: schedule_id.to_string(),
        };

        self.manager.insert_backup_record(record.clone()).await?;
        Ok(record)
    }

    /// 将pending记录迁移到终态（completed/failed）
    pub async fn complete_backup_record(
        &self,
        id: &str,
        status: BackupStatus,
        file_size_bytes: i64,
        error_message: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        // pending 不是终态，不允许写回
        if status == BackupStatus::Pending {
            return Err(DbmError::custom("备份记录不能回到 pending 状态"));
        }

        self.manager
            .complete_backup_record(
                id,
                status.as_str(),
                file_size_bytes,
                error_message,
                completed_at,
            )
            .await
    }

    /// 获取所有备份文件记录
    pub async fn list_backups(&self) -> Result<Vec<BackupFileRecord>> {
        self.manager.list_backups().await
    }

    /// 根据ID获取备份文件记录
    pub async fn get_backup_by_id(&self, id: &str) -> Result<Option<BackupFileRecord>> {
        self.manager.get_backup_by_id(id).await
    }

    /// 删除备份文件记录
    pub async fn delete_backup_record(&self, id: &str) -> Result<()> {
        self.manager.delete_backup_record(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_params(name: &str) -> NewConnection {
        NewConnection {
            name: name.to_string(),
            db_type: "postgresql".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database_name: "app".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            postgres_version: None,
        }
    }

    #[tokio::test]
    async fn test_connection_crud() {
        let db = Database::connect_memory().await.unwrap();

        let created = db.create_connection(connection_params("prod")).await.unwrap();
        let fetched = db.get_connection(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "prod");
        assert_eq!(fetched.port, 5432);
        assert!(fetched.postgres_version.is_none());

        db.update_connection_version(&created.id, "17").await.unwrap();
        let updated = db.get_connection(&created.id).await.unwrap().unwrap();
        assert_eq!(updated.postgres_version.as_deref(), Some("17"));

        db.delete_connection(&created.id).await.unwrap();
        assert!(db.get_connection(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_schedule_requires_connection() {
        let db = Database::connect_memory().await.unwrap();

        let result = db
            .create_schedule(NewSchedule {
                name: "nightly".to_string(),
                cron_expression: "0 2 * * *".to_string(),
                timezone: None,
                connection_id: "missing".to_string(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_schedule_rejects_bad_cron() {
        let db = Database::connect_memory().await.unwrap();
        let conn = db.create_connection(connection_params("prod")).await.unwrap();

        let result = db
            .create_schedule(NewSchedule {
                name: "nightly".to_string(),
                cron_expression: "0 2 * *".to_string(),
                timezone: None,
                connection_id: conn.id,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_schedule_active_flag() {
        let db = Database::connect_memory().await.unwrap();
        let conn = db.create_connection(connection_params("prod")).await.unwrap();

        let schedule = db
            .create_schedule(NewSchedule {
                name: "nightly".to_string(),
                cron_expression: "0 2 * * *".to_string(),
                timezone: Some("UTC".to_string()),
                connection_id: conn.id,
            })
            .await
            .unwrap();

        assert_eq!(db.list_active_schedules().await.unwrap().len(), 1);

        db.set_schedule_active(&schedule.id, false).await.unwrap();
        assert!(db.list_active_schedules().await.unwrap().is_empty());
        assert_eq!(db.list_schedules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backup_record_status_is_monotonic() {
        let db = Database::connect_memory().await.unwrap();
        let conn = db.create_connection(connection_params("prod")).await.unwrap();
        let schedule = db
            .create_schedule(NewSchedule {
                name: "nightly".to_string(),
                cron_expression: "0 2 * * *".to_string(),
                timezone: None,
                connection_id: conn.id,
            })
            .await
            .unwrap();

        let record = db
            .insert_backup_record(&schedule.id, "a.sql", "./backups/a.sql", Utc::now())
            .await
            .unwrap();
        assert_eq!(record.backup_status(), Some(BackupStatus::Pending));

        db.complete_backup_record(&record.id, BackupStatus::Completed, 1024, None, Utc::now())
            .await
            .unwrap();
        let done = db.get_backup_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(done.backup_status(), Some(BackupStatus::Completed));
        assert_eq!(done.file_size_bytes, 1024);
        assert!(done.completed_at.is_some());

        // 终态记录不会被二次改写
        db.complete_backup_record(
            &record.id,
            BackupStatus::Failed,
            0,
            Some("late".to_string()),
            Utc::now(),
        )
        .await
        .unwrap();
        let still_done = db.get_backup_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(still_done.backup_status(), Some(BackupStatus::Completed));
        assert!(still_done.error_message.is_none());
    }
}
