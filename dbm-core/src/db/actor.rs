use crate::Result;
use chrono::{DateTime, Utc};
use duckdb::{Connection, Row, params};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::DbMessage;
use super::models::{BackupFileRecord, BackupStatus, ConnectionRecord, ScheduleRecord};

/// DuckDB Actor - 确保单线程访问DuckDB
pub struct DuckDbActor {
    connection: Connection,
}

impl DuckDbActor {
    /// 创建新的DuckDB Actor
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let connection = Connection::open(db_path)?;
        Ok(Self { connection })
    }

    /// 创建内存DuckDB Actor
    pub fn new_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        Ok(Self { connection })
    }

    /// 运行Actor消息循环
    pub async fn run(mut self, mut receiver: mpsc::Receiver<DbMessage>) {
        info!("DuckDB Actor 已启动");

        while let Some(message) = receiver.recv().await {
            self.handle_message(message);
        }

        info!("DuckDB Actor 已关闭");
    }

    /// 处理数据库消息
    fn handle_message(&mut self, message: DbMessage) {
        match message {
            DbMessage::InitTables { respond_to } => {
                let result = self.init_tables();
                let _ = respond_to.send(result);
            }
            DbMessage::CreateConnection { record, respond_to } => {
                let result = self.create_connection(&record);
                let _ = respond_to.send(result);
            }
            DbMessage::ListConnections { respond_to } => {
                let result = self.list_connections();
                let _ = respond_to.send(result);
            }
            DbMessage::GetConnection { id, respond_to } => {
                let result = self.get_connection(&id);
                let _ = respond_to.send(result);
            }
            DbMessage::UpdateConnectionVersion {
                id,
                version,
                respond_to,
            } => {
                let result = self.update_connection_version(&id, &version);
                let _ = respond_to.send(result);
            }
            DbMessage::DeleteConnection { id, respond_to } => {
                let result = self.delete_connection(&id);
                let _ = respond_to.send(result);
            }
            DbMessage::CreateSchedule { record, respond_to } => {
                let result = self.create_schedule(&record);
                let _ = respond_to.send(result);
            }
            DbMessage::ListSchedules { respond_to } => {
                let result = self.list_schedules(false);
                let _ = respond_to.send(result);
            }
            DbMessage::ListActiveSchedules { respond_to } => {
                let result = self.list_schedules(true);
                let _ = respond_to.send(result);
            }
            DbMessage::GetSchedule { id, respond_to } => {
                let result = self.get_schedule(&id);
                let _ = respond_to.send(result);
            }
            DbMessage::SetScheduleActive {
                id,
                active,
                respond_to,
            } => {
                let result = self.set_schedule_active(&id, active);
                let _ = respond_to.send(result);
            }
            DbMessage::UpdateScheduleLastRun {
                id,
                last_run_at,
                respond_to,
            } => {
                let result = self.update_schedule_last_run(&id, last_run_at);
                let _ = respond_to.send(result);
            }
            DbMessage::UpdateScheduleNextRun {
                id,
                next_run_at,
                respond_to,
            } => {
                let result = self.update_schedule_next_run(&id, next_run_at);
                let _ = respond_to.send(result);
            }
            DbMessage::DeleteSchedule { id, respond_to } => {
                let result = self.delete_schedule(&id);
                let _ = respond_to.send(result);
            }
            DbMessage::InsertBackupRecord { record, respond_to } => {
                let result = self.insert_backup_record(&record);
                let _ = respond_to.send(result);
            }
            DbMessage::CompleteBackupRecord {
                id,
                status,
                file_size_bytes,
                error_message,
                completed_at,
                respond_to,
            } => {
                let result = self.complete_backup_record(
                    &id,
                    &status,
                    file_size_bytes,
                    error_message.as_deref(),
                    completed_at,
                );
                let _ = respond_to.send(result);
            }
            DbMessage::ListBackups { respond_to } => {
                let result = self.list_backups();
                let _ = respond_to.send(result);
            }
            DbMessage::GetBackupById { id, respond_to } => {
                let result = self.get_backup_by_id(&id);
                let _ = respond_to.send(result);
            }
            DbMessage::DeleteBackupRecord { id, respond_to } => {
                let result = self.delete_backup_record(&id);
                let _ = respond_to.send(result);
            }
        }
    }

    /// 初始化数据库表
    fn init_tables(&mut self) -> Result<()> {
        debug!("正在初始化DuckDB表...");

        // 读取并执行SQL初始化脚本
        let sql_content = include_str!("../../migrations/init_duckdb.sql");

        // 按分号分割SQL语句并执行
        for statement in sql_content.split(';').filter(|s| !s.trim().is_empty()) {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                self.connection.execute(trimmed, [])?;
            }
        }

        info!("DuckDB表初始化完成");
        Ok(())
    }

    // ========== 数据库连接 ==========

    fn create_connection(&mut self, record: &ConnectionRecord) -> Result<()> {
        self.connection.execute(
            "INSERT INTO backup_connection
             (id, name, db_type, host, port, database_name, username, password,
              postgres_version, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.name,
                record.db_type,
                record.host,
                record.port as i32,
                record.database_name,
                record.username,
                record.password,
                record.postgres_version,
                record.is_active,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn list_connections(&mut self) -> Result<Vec<ConnectionRecord>> {
        let mut stmt = self.connection.prepare(
            "SELECT id, name, db_type, host, port, database_name, username, password,
                    postgres_version, is_active, created_at, updated_at
             FROM backup_connection ORDER BY created_at",
        )?;

        let iter = stmt.query_map([], map_connection_row)?;

        let mut connections = Vec::new();
        for connection in iter {
            connections.push(connection?);
        }

        Ok(connections)
    }

    fn get_connection(&mut self, id: &str) -> Result<Option<ConnectionRecord>> {
        let mut stmt = self.connection.prepare(
            "SELECT id, name, db_type, host, port, database_name, username, password,
                    postgres_version, is_active, created_at, updated_at
             FROM backup_connection WHERE id = ?",
        )?;

        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(map_connection_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn update_connection_version(&mut self, id: &str, version: &str) -> Result<()> {
        self.connection.execute(
            "UPDATE backup_connection SET postgres_version = ?, updated_at = ? WHERE id = ?",
            params![version, Utc::now(), id],
        )?;
        Ok(())
    }

    fn delete_connection(&mut self, id: &str) -> Result<()> {
        self.connection
            .execute("DELETE FROM backup_connection WHERE id = ?", params![id])?;
        Ok(())
    }

    // ========== 备份计划 ==========

    fn create_schedule(&mut self, record: &ScheduleRecord) -> Result<()> {
        self.connection.execute(
            "INSERT INTO backup_schedule
             (id, name, cron_expression, timezone, is_active, last_run_at, next_run_at,
              created_at, updated_at, connection_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.name,
                record.cron_expression,
                record.timezone,
                record.is_active,
                record.last_run_at,
                record.next_run_at,
                record.created_at,
                record.updated_at,
                record.connection_id,
            ],
        )?;
        Ok(())
    }

    fn list_schedules(&mut self, active_only: bool) -> Result<Vec<ScheduleRecord>> {
        let sql = if active_only {
            "SELECT id, name, cron_expression, timezone, is_active, last_run_at, next_run_at,
                    created_at, updated_at, connection_id
             FROM backup_schedule WHERE is_active = TRUE ORDER BY created_at"
        } else {
            "SELECT id, name, cron_expression, timezone, is_active, last_run_at, next_run_at,
                    created_at, updated_at, connection_id
             FROM backup_schedule ORDER BY created_at"
        };

        let mut stmt = self.connection.prepare(sql)?;
        let iter = stmt.query_map([], map_schedule_row)?;

        let mut schedules = Vec::new();
        for schedule in iter {
            schedules.push(schedule?);
        }

        Ok(schedules)
    }

    fn get_schedule(&mut self, id: &str) -> Result<Option<ScheduleRecord>> {
        let mut stmt = self.connection.prepare(
            "SELECT id, name, cron_expression, timezone, is_active, last_run_at, next_run_at,
                    created_at, updated_at, connection_id
             FROM backup_schedule WHERE id = ?",
        )?;

        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(map_schedule_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn set_schedule_active(&mut self, id: &str, active: bool) -> Result<()> {
        self.connection.execute(
            "UPDATE backup_schedule SET is_active = ?, updated_at = ? WHERE id = ?",
            params![active, Utc::now(), id],
        )?;
        Ok(())
    }

    fn update_schedule_last_run(&mut self, id: &str, last_run_at: DateTime<Utc>) -> Result<()> {
        self.connection.execute(
            "UPDATE backup_schedule SET last_run_at = ?, updated_at = ? WHERE id = ?",
            params![last_run_at, Utc::now(), id],
        )?;
        Ok(())
    }

    fn update_schedule_next_run(&mut self, id: &str, next_run_at: DateTime<Utc>) -> Result<()> {
        self.connection.execute(
            "UPDATE backup_schedule SET next_run_at = ?, updated_at = ? WHERE id = ?",
            params![next_run_at, Utc::now(), id],
        )?;
        Ok(())
    }

    fn delete_schedule(&mut self, id: &str) -> Result<()> {
        self.connection
            .execute("DELETE FROM backup_schedule WHERE id = ?", params![id])?;
        Ok(())
    }

    // ========== 备份文件记录 ==========

    fn insert_backup_record(&mut self, record: &BackupFileRecord) -> Result<()> {
        self.connection.execute(
            "INSERT INTO backup_file
             (id, file_name, file_path, file_size_bytes, status, error_message,
              started_at, completed_at, created_at, schedule_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.file_name,
                record.file_path,
                record.file_size_bytes,
                record.status,
                record.error_message,
                record.started_at,
                record.completed_at,
                record.created_at,
                record.schedule_id,
            ],
        )?;
        Ok(())
    }

    /// 状态单调性由 WHERE status = 'pending' 保证：终态记录不会被二次改写
    fn complete_backup_record(
        &mut self,
        id: &str,
        status: &str,
        file_size_bytes: i64,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.connection.execute(
            "UPDATE backup_file
             SET status = ?, file_size_bytes = ?, error_message = ?, completed_at = ?
             WHERE id = ? AND status = ?",
            params![
                status,
                file_size_bytes,
                error_message,
                completed_at,
                id,
                BackupStatus::Pending.as_str(),
            ],
        )?;
        Ok(())
    }

    fn list_backups(&mut self) -> Result<Vec<BackupFileRecord>> {
        let mut stmt = self.connection.prepare(
            "SELECT id, file_name, file_path, file_size_bytes, status, error_message,
                    started_at, completed_at, created_at, schedule_id
             FROM backup_file ORDER BY created_at DESC",
        )?;

        let iter = stmt.query_map([], map_backup_row)?;

        let mut backups = Vec::new();
        for backup in iter {
            backups.push(backup?);
        }

        Ok(backups)
    }

    fn get_backup_by_id(&mut self, id: &str) -> Result<Option<BackupFileRecord>> {
        let mut stmt = self.connection.prepare(
            "SELECT id, file_name, file_path, file_size_bytes, status, error_message,
                    started_at, completed_at, created_at, schedule_id
             FROM backup_file WHERE id = ?",
        )?;

        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(map_backup_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn delete_backup_record(&mut self, id: &str) -> Result<()> {
        self.connection
            .execute("DELETE FROM backup_file WHERE id = ?", params![id])?;
        Ok(())
    }
}

fn map_connection_row(row: &Row<'_>) -> duckdb::Result<ConnectionRecord> {
    Ok(ConnectionRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        db_type: row.get(2)?,
        host: row.get(3)?,
        port: row.get::<_, i32>(4)? as u16,
        database_name: row.get(5)?,
        username: row.get(6)?,
        password: row.get(7)?,
        postgres_version: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_schedule_row(row: &Row<'_>) -> duckdb::Result<ScheduleRecord> {
    Ok(ScheduleRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        cron_expression: row.get(2)?,
        timezone: row.get(3)?,
        is_active: row.get(4)?,
        last_run_at: row.get(5)?,
        next_run_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        connection_id: row.get(9)?,
    })
}

fn map_backup_row(row: &Row<'_>) -> duckdb::Result<BackupFileRecord> {
    Ok(BackupFileRecord {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_path: row.get(2)?,
        file_size_bytes: row.get(3)?,
        status: row.get(4)?,
        error_message: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        created_at: row.get(8)?,
        schedule_id: row.get(9)?,
    })
}
