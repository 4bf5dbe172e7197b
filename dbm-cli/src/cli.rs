use clap::{Parser, Subcommand};

/// 数据库备份管理命令行工具
#[derive(Parser, Debug)]
#[command(name = "dbm-cli", version, about = "数据库备份管理工具")]
pub struct Cli {
    /// 启用详细日志（DEBUG级别）
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 初始化配置文件、数据目录和备份存储目录
    Init {
        /// 覆盖已存在的配置
        #[arg(long)]
        force: bool,
    },
    /// 数据库连接管理
    #[command(subcommand)]
    Connection(ConnectionCommand),
    /// 备份计划管理
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// 备份记录管理
    #[command(subcommand)]
    Backup(BackupCommand),
    /// 以前台守护进程方式运行调度器
    Serve,
}

/// 数据库连接相关命令
#[derive(Subcommand, Debug)]
pub enum ConnectionCommand {
    /// 登记一个数据库连接
    Add {
        /// 连接名称（会出现在备份文件名中）
        name: String,
        /// 数据库类型
        #[arg(long, default_value = "postgresql")]
        db_type: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        /// 目标数据库名
        #[arg(long)]
        database: String,
        #[arg(long)]
        username: String,
        /// 连接密码（也可通过 DBM_DB_PASSWORD 环境变量传入）
        #[arg(long, env = "DBM_DB_PASSWORD", hide_env_values = true)]
        password: String,
        /// PostgreSQL 主版本号，如 '16'，用于选择转储镜像
        #[arg(long)]
        postgres_version: Option<String>,
    },
    /// 列出所有连接
    List,
    /// 对连接做一次试备份，验证连通性
    Test {
        /// 连接ID
        id: String,
        /// 已确认的 PostgreSQL 主版本号，测试成功后写回连接记录
        #[arg(long)]
        postgres_version: Option<String>,
    },
    /// 删除连接
    Remove {
        /// 连接ID
        id: String,
    },
}

/// 备份计划相关命令
#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// 新建备份计划
    Add {
        /// 计划名称
        name: String,
        /// cron 表达式，例如 '0 2 * * *' 表示每天凌晨2点
        #[arg(long)]
        cron: String,
        /// 时区标识，默认 UTC
        #[arg(long)]
        timezone: Option<String>,
        /// 关联的连接ID
        #[arg(long)]
        connection_id: String,
    },
    /// 列出所有备份计划
    List,
    /// 启用备份计划
    Enable {
        /// 计划ID
        id: String,
    },
    /// 停用备份计划
    Disable {
        /// 计划ID
        id: String,
    },
    /// 立即执行一次备份（不等到下一个周期）
    Run {
        /// 计划ID
        id: String,
    },
    /// 删除备份计划
    Remove {
        /// 计划ID
        id: String,
    },
}

/// 备份记录相关命令
#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// 列出所有备份记录
    List,
    /// 删除备份记录及其产物文件
    Remove {
        /// 记录ID
        id: String,
    },
}
