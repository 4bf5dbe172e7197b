// 备份调度模块
//
// 把cron表达式变成定时器：到点把备份交给执行器，并把结果写回
// 持久层。每个计划同一时刻至多有一个在途定时器；每次执行结束后
// 无条件重新安排下一个周期，无论这次成功还是失败——这是整个系统
// 唯一的"重试"机制。
//
// 定时器表是实例内的显式注册表，不是全局状态，测试可以各自持有
// 独立的调度器实例。

mod clock;
pub mod cron;

pub use clock::{Clock, SystemClock};

use crate::database::Database;
use crate::db::BackupStatus;
use crate::executor::BackupExecutor;
use crate::{DbmError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 内存中的定时任务：计划ID到已上膛定时器的绑定
///
/// token用于区分同一计划的先后定时器，定时器触发时只注销自己的条目。
struct ScheduledJob {
    token: u64,
    handle: JoinHandle<()>,
}

/// 备份调度器
///
/// 克隆开销很小，内部状态由Arc共享。
#[derive(Clone)]
pub struct BackupScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    database: Database,
    executor: BackupExecutor,
    clock: Arc<dyn Clock>,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
    job_token: AtomicU64,
    /// 跨不同计划的并发备份上限
    execution_slots: Semaphore,
}

impl BackupScheduler {
    /// 创建使用系统时钟的调度器
    pub fn new(database: Database, executor: BackupExecutor, max_concurrent: usize) -> Self {
        Self::with_clock(database, executor, max_concurrent, Arc::new(SystemClock))
    }

    /// 指定时钟构造（测试中注入固定时钟）
    pub fn with_clock(
        database: Database,
        executor: BackupExecutor,
        max_concurrent: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                database,
                executor,
                clock,
                jobs: Mutex::new(HashMap::new()),
                job_token: AtomicU64::new(0),
                execution_slots: Semaphore::new(max_concurrent.max(1)),
            }),
        }
    }

    /// 进程启动时调用：为所有生效的计划上膛定时器，返回成功上膛的数量
    pub async fn initialize(&self) -> Result<usize> {
        info!("正在初始化备份调度器...");

        let schedules = self.inner.database.list_active_schedules().await?;
        let mut armed = 0usize;

        for schedule in &schedules {
            match self.schedule_backup(&schedule.id).await {
                Ok(()) => armed += 1,
                Err(e) => {
                    // 单个计划的配置问题不阻止其他计划上膛
                    error!("初始化备份计划 {} 失败: {}", schedule.id, e);
                }
            }
        }

        info!("已初始化 {} 个备份计划", armed);
        Ok(armed)
    }

    /// 为指定计划安排下一次备份（幂等）
    ///
    /// 先取消该计划已有的定时器；计划不存在或已停用时静默返回。
    /// 下次运行时间已过则立即执行（绝不跳过一次运行），否则上膛
    /// 定时器并把下次运行时间写回持久层。
    pub async fn schedule_backup(&self, schedule_id: &str) -> Result<()> {
        self.cancel_job(schedule_id);

        let Some(schedule) = self.inner.database.get_schedule(schedule_id).await? else {
            return Ok(());
        };
        if !schedule.is_active {
            return Ok(());
        }

        let now = self.inner.clock.now();
        let next_run = cron::next_run(&schedule.cron_expression, now)?;
        let delay = next_run - now;

        if delay <= chrono::Duration::zero() {
            // 下次运行时间已经过去，立即执行并在执行结束后重新安排
            spawn::spawn_execute(self.clone(), schedule_id.to_string());
            return Ok(());
        }

        let delay = delay
            .to_std()
            .map_err(|e| DbmError::scheduler(format!("定时器延迟无效: {e}")))?;
        self.arm_timer(schedule_id.to_string(), delay);

        self.inner
            .database
            .update_schedule_next_run(schedule_id, next_run)
            .await?;

        info!(
            "已安排备份计划 {} 于 {} 执行",
            schedule_id,
            next_run.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        Ok(())
    }

    /// 上膛一个定时器：到点后注销自己的条目并执行备份
    fn arm_timer(&self, schedule_id: String, delay: std::time::Duration) {
        let token = self.inner.job_token.fetch_add(1, Ordering::Relaxed);
        let handle = spawn::spawn_timer(self.clone(), schedule_id.clone(), delay, token);

        let mut jobs = lock_jobs(&self.inner.jobs);
        if let Some(previous) = jobs.insert(schedule_id, ScheduledJob { token, handle }) {
            previous.handle.abort();
        }
    }

    /// 定时器触发时注销自己的条目；token不匹配说明条目已被新定时器替换
    fn retire_job(&self, schedule_id: &str, token: u64) {
        let mut jobs = lock_jobs(&self.inner.jobs);
        if jobs.get(schedule_id).is_some_and(|job| job.token == token) {
            jobs.remove(schedule_id);
        }
    }

    /// 执行一次定时备份，并无条件重新安排下一个周期
    ///
    /// 执行过程中的任何错误都在这里被捕获记录，不向调度循环传播。
    pub async fn execute_scheduled_backup(&self, schedule_id: &str) {
        if let Err(e) = self.run_backup_cycle(schedule_id).await {
            error!("执行定时备份 {} 时发生错误: {}", schedule_id, e);
        }

        // 无论这次执行成败，都安排下一个周期
        if let Err(e) = self.schedule_backup(schedule_id).await {
            error!("重新安排备份计划 {} 失败: {}", schedule_id, e);
        }
    }

    /// 一次备份周期：读取实体、登记记录、调用执行器、写回结果
    async fn run_backup_cycle(&self, schedule_id: &str) -> Result<()> {
        info!("开始执行定时备份: {}", schedule_id);

        let Some(schedule) = self.inner.database.get_schedule(schedule_id).await? else {
            // 计划在上膛与触发之间被删除：跳过本周期，不算错误
            error!("备份计划不存在: {}", schedule_id);
            return Ok(());
        };

        let Some(connection) = self
            .inner
            .database
            .get_connection(&schedule.connection_id)
            .await?
        else {
            error!("备份计划 {} 引用的数据库连接不存在", schedule_id);
            return Ok(());
        };

        let started_at = self.inner.clock.now();
        self.inner
            .database
            .update_schedule_last_run(schedule_id, started_at)
            .await?;

        let file_name = backup_file_name(&connection.name, started_at);
        let file_path = self.inner.executor.storage_dir().join(&file_name);
        let record = self
            .inner
            .database
            .insert_backup_record(
                schedule_id,
                &file_name,
                &file_path.to_string_lossy(),
                started_at,
            )
            .await?;

        // 并发上限：不同计划同时在途的备份子进程数受信号量约束
        let _permit = self
            .inner
            .execution_slots
            .acquire()
            .await
            .map_err(|_| DbmError::scheduler("并发信号量已关闭"))?;
        let outcome = self.inner.executor.execute_backup(&connection, &file_name).await;
        drop(_permit);

        let status = if outcome.success {
            BackupStatus::Completed
        } else {
            BackupStatus::Failed
        };
        self.inner
            .database
            .complete_backup_record(
                &record.id,
                status,
                outcome.file_size.unwrap_or(0) as i64,
                outcome.error.clone(),
                self.inner.clock.now(),
            )
            .await?;

        if outcome.success {
            info!("定时备份 {} 完成", schedule_id);
        } else {
            warn!(
                "定时备份 {} 失败: {}",
                schedule_id,
                outcome.error.as_deref().unwrap_or("未知错误")
            );
        }

        Ok(())
    }

    /// 只丢弃内存中的定时器，不改动持久化的计划状态；对无定时器的ID安全
    pub fn cancel_job(&self, schedule_id: &str) {
        let removed = lock_jobs(&self.inner.jobs).remove(schedule_id);
        if let Some(job) = removed {
            job.handle.abort();
            info!("已取消备份定时任务: {}", schedule_id);
        }
    }

    /// 取消计划：丢弃定时器并把计划持久化为停用
    pub async fn cancel_schedule(&self, schedule_id: &str) -> Result<()> {
        self.cancel_job(schedule_id);
        self.inner
            .database
            .set_schedule_active(schedule_id, false)
            .await?;
        Ok(())
    }

    /// 指定计划当前是否有上膛的定时器
    pub fn has_job(&self, schedule_id: &str) -> bool {
        lock_jobs(&self.inner.jobs).contains_key(schedule_id)
    }

    /// 当前上膛的定时器数量
    pub fn active_job_count(&self) -> usize {
        lock_jobs(&self.inner.jobs).len()
    }
}

/// 锁中毒时继续使用内部数据：任务表没有需要维护的跨字段不变量
fn lock_jobs(jobs: &Mutex<HashMap<String, ScheduledJob>>) -> std::sync::MutexGuard<'_, HashMap<String, ScheduledJob>> {
    jobs.lock().unwrap_or_else(|e| e.into_inner())
}

/// 把 `tokio::spawn` 放进独立子模块，避免在 `execute_scheduled_backup` /
/// `schedule_backup` 的定义作用域内触发“递归 async + spawn”的自动 trait
/// 推导循环。行为与内联 spawn 完全一致。
mod spawn {
    use super::BackupScheduler;
    use tokio::task::JoinHandle;

    /// 立即执行一次定时备份（用于错过的运行）
    pub(super) fn spawn_execute(scheduler: BackupScheduler, id: String) {
        tokio::spawn(async move {
            scheduler.execute_scheduled_backup(&id).await;
        });
    }

    /// 上膛定时器：到点后注销自己的条目并执行备份
    pub(super) fn spawn_timer(
        scheduler: BackupScheduler,
        id: String,
        delay: std::time::Duration,
        token: u64,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.retire_job(&id, token);
            scheduler.execute_scheduled_backup(&id).await;
        })
    }
}

/// 生成备份文件名：backup_<连接名>_<ISO8601时间戳，':'与'.'替换为'-'>.sql
fn backup_file_name(connection_name: &str, now: DateTime<Utc>) -> String {
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("backup_{connection_name}_{timestamp}.sql")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewConnection, NewSchedule};
    use crate::db::{ConnectionRecord, ScheduleRecord};
    use crate::executor::{CommandOutput, CommandRunner, CommandSpec};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    /// 固定时钟
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// 假命令执行器：Docker探测永远失败，转储走本地策略
    struct StubRunner {
        exit_code: i32,
        stderr: String,
        write_dump_file: bool,
    }

    impl StubRunner {
        fn succeeding() -> Self {
            Self {
                exit_code: 0,
                stderr: String::new(),
                write_dump_file: true,
            }
        }

        fn failing(stderr: &str) -> Self {
            Self {
                exit_code: 1,
                stderr: stderr.to_string(),
                write_dump_file: false,
            }
        }
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, spec: &CommandSpec, _timeout: Duration) -> Result<CommandOutput> {
            if spec.args == ["--version"] {
                // Docker不可用，执行器回退到本地策略
                return Ok(CommandOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                });
            }

            if self.write_dump_file {
                let target = spec
                    .args
                    .iter()
                    .find_map(|arg| arg.strip_prefix("--file="))
                    .map(PathBuf::from)
                    .expect("转储命令缺少 --file 参数");
                std::fs::write(target, b"-- dump\n").unwrap();
            }

            Ok(CommandOutput {
                exit_code: self.exit_code,
                stdout: String::new(),
                stderr: self.stderr.clone(),
            })
        }
    }

    /// 测试时钟固定在中午，"0 2 * * *" 的下一次运行在十几个小时之后，
    /// 真实定时器在测试期间不会触发。
    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    async fn build_scheduler(runner: StubRunner) -> (BackupScheduler, Database, TempDir) {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("backups");
        let database = Database::connect_memory().await.unwrap();
        let executor = BackupExecutor::with_runner(
            storage,
            "16".to_string(),
            Duration::from_secs(60),
            Arc::new(runner),
        );
        let scheduler = BackupScheduler::with_clock(
            database.clone(),
            executor,
            4,
            Arc::new(FixedClock(test_now())),
        );
        (scheduler, database, dir)
    }

    async fn seed_schedule(database: &Database, name: &str) -> (ConnectionRecord, ScheduleRecord) {
        let connection = database
            .create_connection(NewConnection {
                name: name.to_string(),
                db_type: "postgresql".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database_name: "app".to_string(),
                username: "admin".to_string(),
                password: "secret".to_string(),
                postgres_version: None,
            })
            .await
            .unwrap();

        let schedule = database
            .create_schedule(NewSchedule {
                name: format!("{name}-nightly"),
                cron_expression: "0 2 * * *".to_string(),
                timezone: None,
                connection_id: connection.id.clone(),
            })
            .await
            .unwrap();

        (connection, schedule)
    }

    #[tokio::test]
    async fn test_initialize_arms_one_timer_per_active_schedule() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;

        let (_, active_a) = seed_schedule(&database, "a").await;
        let (_, active_b) = seed_schedule(&database, "b").await;
        let (_, disabled) = seed_schedule(&database, "c").await;
        database
            .set_schedule_active(&disabled.id, false)
            .await
            .unwrap();

        let armed = scheduler.initialize().await.unwrap();

        assert_eq!(armed, 2);
        assert_eq!(scheduler.active_job_count(), 2);
        assert!(scheduler.has_job(&active_a.id));
        assert!(scheduler.has_job(&active_b.id));
        assert!(!scheduler.has_job(&disabled.id));

        // 上膛时把下次运行时间写回持久层
        let persisted = database.get_schedule(&active_a.id).await.unwrap().unwrap();
        assert_eq!(
            persisted.next_run_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_schedule_backup_is_idempotent() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;
        let (_, schedule) = seed_schedule(&database, "a").await;

        scheduler.schedule_backup(&schedule.id).await.unwrap();
        scheduler.schedule_backup(&schedule.id).await.unwrap();

        assert_eq!(scheduler.active_job_count(), 1);
        assert!(scheduler.has_job(&schedule.id));
    }

    #[tokio::test]
    async fn test_schedule_backup_missing_or_inactive_is_silent_noop() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;

        scheduler.schedule_backup("no-such-id").await.unwrap();
        assert_eq!(scheduler.active_job_count(), 0);

        let (_, schedule) = seed_schedule(&database, "a").await;
        database
            .set_schedule_active(&schedule.id, false)
            .await
            .unwrap();
        scheduler.schedule_backup(&schedule.id).await.unwrap();
        assert_eq!(scheduler.active_job_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_on_missing_schedule_creates_no_record() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;

        scheduler.execute_scheduled_backup("no-such-id").await;

        assert!(database.list_backups().await.unwrap().is_empty());
        assert_eq!(scheduler.active_job_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_on_missing_connection_creates_no_record_but_rearms() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;
        let (connection, schedule) = seed_schedule(&database, "a").await;
        database.delete_connection(&connection.id).await.unwrap();

        scheduler.execute_scheduled_backup(&schedule.id).await;

        assert!(database.list_backups().await.unwrap().is_empty());
        // 计划本身还在且生效，周期继续
        assert!(scheduler.has_job(&schedule.id));
    }

    #[tokio::test]
    async fn test_successful_run_completes_record_and_rearms() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;
        let (connection, schedule) = seed_schedule(&database, "a").await;

        scheduler.execute_scheduled_backup(&schedule.id).await;

        let backups = database.list_backups().await.unwrap();
        assert_eq!(backups.len(), 1);
        let record = &backups[0];
        assert_eq!(record.backup_status(), Some(BackupStatus::Completed));
        assert_eq!(record.file_size_bytes, 8);
        assert!(record.error_message.is_none());
        assert!(record.completed_at.is_some());
        assert!(record.file_name.starts_with(&format!("backup_{}_", connection.name)));
        assert!(record.file_name.ends_with(".sql"));
        // 时间戳中的 ':' 和 '.' 已被替换
        assert!(!record.file_name.contains(':'));

        let persisted = database.get_schedule(&schedule.id).await.unwrap().unwrap();
        assert_eq!(persisted.last_run_at, Some(test_now()));

        // 成功后重新上膛
        assert!(scheduler.has_job(&schedule.id));
    }

    #[tokio::test]
    async fn test_failed_run_records_error_and_still_rearms() {
        let (scheduler, database, _dir) =
            build_scheduler(StubRunner::failing("pg_dump: connection refused")).await;
        let (_, schedule) = seed_schedule(&database, "a").await;

        scheduler.execute_scheduled_backup(&schedule.id).await;

        let backups = database.list_backups().await.unwrap();
        assert_eq!(backups.len(), 1);
        let record = &backups[0];
        assert_eq!(record.backup_status(), Some(BackupStatus::Failed));
        assert!(
            record
                .error_message
                .as_deref()
                .unwrap()
                .contains("connection refused")
        );
        assert!(record.completed_at.is_some());

        // 失败也重新上膛：下一个周期就是重试
        assert!(scheduler.has_job(&schedule.id));
    }

    #[tokio::test]
    async fn test_cancel_job_then_schedule_leaves_single_timer() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;
        let (_, schedule) = seed_schedule(&database, "a").await;

        scheduler.schedule_backup(&schedule.id).await.unwrap();
        scheduler.cancel_job(&schedule.id);
        assert!(!scheduler.has_job(&schedule.id));

        // 取消只动内存定时器，持久化状态不变
        let persisted = database.get_schedule(&schedule.id).await.unwrap().unwrap();
        assert!(persisted.is_active);

        scheduler.schedule_backup(&schedule.id).await.unwrap();
        assert_eq!(scheduler.active_job_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_job_on_unknown_id_is_safe() {
        let (scheduler, _database, _dir) = build_scheduler(StubRunner::succeeding()).await;
        scheduler.cancel_job("no-such-id");
        assert_eq!(scheduler.active_job_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_schedule_disarms_and_persists_inactive() {
        let (scheduler, database, _dir) = build_scheduler(StubRunner::succeeding()).await;
        let (_, schedule) = seed_schedule(&database, "a").await;

        scheduler.schedule_backup(&schedule.id).await.unwrap();
        scheduler.cancel_schedule(&schedule.id).await.unwrap();

        assert!(!scheduler.has_job(&schedule.id));
        let persisted = database.get_schedule(&schedule.id).await.unwrap().unwrap();
        assert!(!persisted.is_active);

        // 停用的计划不会再被上膛
        scheduler.schedule_backup(&schedule.id).await.unwrap();
        assert!(!scheduler.has_job(&schedule.id));
    }

    #[test]
    fn test_backup_file_name_shape() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 2, 30, 45).unwrap();
        let name = backup_file_name("prod", now);
        assert_eq!(name, "backup_prod_2024-01-01T02-30-45-000Z.sql");
    }
}
