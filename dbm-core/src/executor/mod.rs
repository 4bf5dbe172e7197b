// 备份执行器模块
//
// 给定一个数据库连接和目标文件名，选择转储策略（Docker容器优先，
// 本地工具回退）并拉起子进程完成备份。所有失败都以结构化结果返回，
// 重试完全交给调度器的下一个周期。

mod runner;
mod strategy;
mod types;

pub use runner::{CommandRunner, SystemCommandRunner};
pub use strategy::{DockerPgDump, DumpStrategy, LocalPgDump};
pub use types::{BackupOutcome, CommandOutput, CommandSpec};

use crate::Result;
use crate::config::AppConfig;
use crate::constants::{backup, timeout};
use crate::db::ConnectionRecord;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 数据库类型分派键，目前只实现了PostgreSQL
const POSTGRESQL: &str = "postgresql";

/// 备份执行器
#[derive(Clone)]
pub struct BackupExecutor {
    storage_dir: PathBuf,
    default_postgres_version: String,
    timeout: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl BackupExecutor {
    /// 创建使用系统命令执行器的备份执行器
    pub fn new(
        storage_dir: PathBuf,
        default_postgres_version: String,
        timeout: Duration,
    ) -> Self {
        Self::with_runner(
            storage_dir,
            default_postgres_version,
            timeout,
            Arc::new(SystemCommandRunner),
        )
    }

    /// 从应用配置构造备份执行器
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            PathBuf::from(&config.backup.storage_dir),
            config.docker.default_postgres_version.clone(),
            Duration::from_secs(config.backup.timeout_secs),
        )
    }

    /// 指定命令执行器构造（测试中注入假实现）
    pub fn with_runner(
        storage_dir: PathBuf,
        default_postgres_version: String,
        timeout: Duration,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            storage_dir,
            default_postgres_version,
            timeout,
            runner,
        }
    }

    /// 获取备份存储目录
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// 执行一次备份
    pub async fn execute_backup(
        &self,
        connection: &ConnectionRecord,
        file_name: &str,
    ) -> BackupOutcome {
        // 先分派数据库类型：不支持的类型不触碰文件系统
        if connection.db_type != POSTGRESQL {
            return BackupOutcome::fail(format!(
                "暂不支持的数据库类型: {}",
                connection.db_type
            ));
        }

        // 确保备份存储目录存在
        if let Err(e) = tokio::fs::create_dir_all(&self.storage_dir).await {
            return BackupOutcome::fail(format!(
                "无法创建备份存储目录 {}: {}",
                self.storage_dir.display(),
                e
            ));
        }

        self.execute_postgres_backup(connection, file_name).await
    }

    /// 执行PostgreSQL备份：Docker策略优先，不可用时回退到本地策略
    async fn execute_postgres_backup(
        &self,
        connection: &ConnectionRecord,
        file_name: &str,
    ) -> BackupOutcome {
        let docker = DockerPgDump {
            default_version: self.default_postgres_version.clone(),
        };

        if self.strategy_available(&docker).await {
            self.run_strategy(&docker, connection, file_name).await
        } else {
            warn!("Docker 不可用，回退到本地 pg_dump");
            self.run_strategy(&LocalPgDump, connection, file_name).await
        }
    }

    /// 探测策略可用性；探测失败按"不可用"处理，不算错误
    async fn strategy_available(&self, strategy: &dyn DumpStrategy) -> bool {
        let Some(probe) = strategy.probe() else {
            return true;
        };

        match self.runner.run(&probe, timeout::PROBE_TIMEOUT).await {
            Ok(output) => output.success(),
            Err(_) => false,
        }
    }

    /// 用指定策略执行转储并核对产物
    async fn run_strategy(
        &self,
        strategy: &dyn DumpStrategy,
        connection: &ConnectionRecord,
        file_name: &str,
    ) -> BackupOutcome {
        info!(
            "使用 {} 策略备份连接 {}",
            strategy.name(),
            connection.name
        );

        let spec = match strategy.dump_command(connection, &self.storage_dir, file_name) {
            Ok(spec) => spec,
            Err(e) => return BackupOutcome::fail(e.to_string()),
        };
        debug!("转储命令: {:?}", spec);

        let output = match self.runner.run(&spec, self.timeout).await {
            Ok(output) => output,
            Err(e) => return BackupOutcome::fail(e.to_string()),
        };

        if !output.success() {
            // stderr原文保留，调度器会原样写入备份记录
            return BackupOutcome::fail(format!(
                "{} 退出码 {}: {}",
                strategy.name(),
                output.exit_code,
                output.stderr
            ));
        }

        let file_path = self.storage_dir.join(file_name);
        match tokio::fs::metadata(&file_path).await {
            Ok(metadata) => {
                info!(
                    "备份完成: {} ({} 字节)",
                    file_path.display(),
                    metadata.len()
                );
                BackupOutcome::ok(file_path, metadata.len())
            }
            Err(e) => BackupOutcome::fail(format!(
                "转储成功但未找到备份文件 {}: {}",
                file_path.display(),
                e
            )),
        }
    }

    /// 连通性测试：走完整备份路径，随后无论成败都删除测试产物
    pub async fn test_backup(&self, connection: &ConnectionRecord) -> BackupOutcome {
        let file_name = format!(
            "{}{}.sql",
            backup::TEST_BACKUP_PREFIX,
            Utc::now().timestamp_millis()
        );

        let outcome = self.execute_backup(connection, &file_name).await;

        let file_path = self.storage_dir.join(&file_name);
        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => debug!("已清理测试备份文件: {}", file_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("清理测试备份文件失败: {}", e),
        }

        outcome
    }

    /// 统计备份存储目录占用的总字节数
    pub async fn storage_usage(&self) -> Result<u64> {
        let storage_dir = self.storage_dir.clone();

        let total = tokio::task::spawn_blocking(move || {
            let mut total = 0u64;

            for entry in WalkDir::new(&storage_dir).into_iter().flatten() {
                if entry.path().is_file() {
                    if let Ok(metadata) = entry.metadata() {
                        total += metadata.len();
                    }
                }
            }

            total
        })
        .await?;

        Ok(total)
    }
}
