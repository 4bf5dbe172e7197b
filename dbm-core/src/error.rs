use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbmError>;

#[derive(Error, Debug)]
pub enum DbmError {
    #[error("配置错误: {0}")]
    Config(#[from] toml::de::Error),

    #[error("配置序列化错误: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("DuckDB数据库错误: {0}")]
    DuckDb(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("UUID 错误: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cron 表达式错误: {0}")]
    Cron(String),

    #[error("调度器错误: {0}")]
    Scheduler(String),

    #[error("备份操作失败: {0}")]
    Backup(String),

    #[error("Docker 命令执行失败: {0}")]
    Docker(String),

    #[error("自定义错误: {0}")]
    Custom(String),

    #[error("配置文件未找到")]
    ConfigNotFound,
}

// 为DuckDB错误实现From trait
impl From<duckdb::Error> for DbmError {
    fn from(err: duckdb::Error) -> Self {
        DbmError::DuckDb(err.to_string())
    }
}

impl DbmError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn cron(msg: impl Into<String>) -> Self {
        Self::Cron(msg.into())
    }

    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    pub fn docker(msg: impl Into<String>) -> Self {
        Self::Docker(msg.into())
    }
}
