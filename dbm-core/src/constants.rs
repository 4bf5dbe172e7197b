/// 备份存储相关常量
pub mod backup {
    use std::path::{Path, PathBuf};

    /// 备份存储目录名
    pub const STORAGE_DIR_NAME: &str = "backups";

    /// 连通性测试备份文件名前缀
    pub const TEST_BACKUP_PREFIX: &str = "test_backup_";

    /// 获取默认的备份存储目录路径
    pub fn get_default_storage_dir() -> PathBuf {
        Path::new(".").join(STORAGE_DIR_NAME)
    }
}

/// 数据库相关常量
pub mod database {
    use std::path::{Path, PathBuf};

    /// 数据目录名
    pub const DATA_DIR_NAME: &str = "data";

    /// DuckDB数据库文件名
    pub const DB_FILE_NAME: &str = "dbm.db";

    /// 获取默认的数据库文件路径
    pub fn get_database_path() -> PathBuf {
        Path::new(".").join(DATA_DIR_NAME).join(DB_FILE_NAME)
    }
}

/// Docker相关常量
pub mod docker {
    /// docker 可执行文件名
    pub const DOCKER_BIN: &str = "docker";

    /// PostgreSQL 官方镜像名前缀，完整镜像为 postgres:<主版本号>
    pub const POSTGRES_IMAGE: &str = "postgres";

    /// 未检测到版本时使用的 PostgreSQL 主版本号
    pub const DEFAULT_POSTGRES_VERSION: &str = "16";

    /// 容器内挂载备份目录的路径
    pub const CONTAINER_BACKUP_DIR: &str = "/backups";
}

/// 备份工具相关常量
pub mod dump {
    /// PostgreSQL 转储工具可执行文件名
    pub const PG_DUMP_BIN: &str = "pg_dump";

    /// 凭据传递使用的环境变量名
    pub const PG_PASSWORD_ENV: &str = "PGPASSWORD";
}

/// 超时与并发相关常量
pub mod timeout {
    use std::time::Duration;

    /// 备份子进程的默认执行超时（秒）
    pub const DEFAULT_BACKUP_TIMEOUT_SECS: u64 = 3600;

    /// Docker可用性探测的超时
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    /// 默认的最大并发备份数（跨不同计划）
    pub const DEFAULT_MAX_CONCURRENT_BACKUPS: usize = 4;
}

/// cron 表达式预设
///
/// 注意：窄化的求值器只对"分钟和小时均为字面整数"的表达式给出精确时间，
/// 其余模式（包括周备份、月备份预设）统一回退为"下一个整点执行"。
pub mod cron {
    /// 每小时整点
    pub const HOURLY: &str = "0 * * * *";

    /// 每天凌晨2点
    pub const DAILY_2AM: &str = "0 2 * * *";

    /// 每周日零点
    pub const WEEKLY: &str = "0 0 * * 0";

    /// 每月1日零点
    pub const MONTHLY: &str = "0 0 1 * *";
}

/// 配置文件相关常量
pub mod config {
    /// 按优先级查找的配置文件名列表
    pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["config.toml", "dbm.toml", ".dbm.toml"];

    /// 默认配置文件名
    pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
}
