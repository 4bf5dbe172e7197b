use dbm_core::{
    config::AppConfig, database::Database, error::Result, executor::BackupExecutor,
    scheduler::BackupScheduler,
};

use crate::cli::{BackupCommand, Commands, ConnectionCommand, ScheduleCommand};
use crate::commands;

#[derive(Clone)]
pub struct CliApp {
    pub config: AppConfig,
    pub database: Database,
    pub executor: BackupExecutor,
    pub scheduler: BackupScheduler,
}

impl CliApp {
    /// 使用智能配置查找初始化CLI应用
    pub async fn new_with_auto_config() -> Result<Self> {
        let config = AppConfig::find_and_load_config()?;

        // 确保数据目录和备份存储目录存在
        config.ensure_dirs()?;

        // 初始化数据库
        let database = Database::connect(&config.database.path).await?;

        // 创建执行器和调度器
        let executor = BackupExecutor::from_config(&config);
        let scheduler = BackupScheduler::new(
            database.clone(),
            executor.clone(),
            config.backup.max_concurrent,
        );

        Ok(Self {
            config,
            database,
            executor,
            scheduler,
        })
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
            Commands::Connection(connection_cmd) => {
                self.run_connection_command(connection_cmd).await
            }
            Commands::Schedule(schedule_cmd) => self.run_schedule_command(schedule_cmd).await,
            Commands::Backup(backup_cmd) => self.run_backup_command(backup_cmd).await,
            Commands::Serve => commands::run_serve(self).await,
        }
    }

    /// 运行数据库连接相关命令
    async fn run_connection_command(&self, cmd: ConnectionCommand) -> Result<()> {
        match cmd {
            ConnectionCommand::Add {
                name,
                db_type,
                host,
                port,
                database,
                username,
                password,
                postgres_version,
            } => {
                commands::add_connection(
                    self,
                    name,
                    db_type,
                    host,
                    port,
                    database,
                    username,
                    password,
                    postgres_version,
                )
                .await
            }
            ConnectionCommand::List => commands::list_connections(self).await,
            ConnectionCommand::Test {
                id,
                postgres_version,
            } => commands::test_connection(self, &id, postgres_version).await,
            ConnectionCommand::Remove { id } => commands::remove_connection(self, &id).await,
        }
    }

    /// 运行备份计划相关命令
    async fn run_schedule_command(&self, cmd: ScheduleCommand) -> Result<()> {
        match cmd {
            ScheduleCommand::Add {
                name,
                cron,
                timezone,
                connection_id,
            } => commands::add_schedule(self, name, cron, timezone, connection_id).await,
            ScheduleCommand::List => commands::list_schedules(self).await,
            ScheduleCommand::Enable { id } => commands::enable_schedule(self, &id).await,
            ScheduleCommand::Disable { id } => commands::disable_schedule(self, &id).await,
            ScheduleCommand::Run { id } => commands::run_schedule_now(self, &id).await,
            ScheduleCommand::Remove { id } => commands::remove_schedule(self, &id).await,
        }
    }

    /// 运行备份记录相关命令
    async fn run_backup_command(&self, cmd: BackupCommand) -> Result<()> {
        match cmd {
            BackupCommand::List => commands::list_backups(self).await,
            BackupCommand::Remove { id } => commands::remove_backup(self, &id).await,
        }
    }
}
