use crate::constants::{backup, config, database, docker, timeout};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub backup: BackupConfig,
    pub docker: DockerConfig,
}

/// 数据库相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// 备份相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupConfig {
    pub storage_dir: String,
    /// 跨不同计划的最大并发备份数
    pub max_concurrent: usize,
    /// 备份子进程超时（秒），超时后强制终止
    pub timeout_secs: u64,
}

/// Docker相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DockerConfig {
    /// 连接未检测到版本时使用的 PostgreSQL 主版本号
    pub default_postgres_version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: database::get_database_path().to_string_lossy().to_string(),
            },
            backup: BackupConfig {
                storage_dir: backup::get_default_storage_dir()
                    .to_string_lossy()
                    .to_string(),
                max_concurrent: timeout::DEFAULT_MAX_CONCURRENT_BACKUPS,
                timeout_secs: timeout::DEFAULT_BACKUP_TIMEOUT_SECS,
            },
            docker: DockerConfig {
                default_postgres_version: docker::DEFAULT_POSTGRES_VERSION.to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：config.toml -> dbm.toml -> .dbm.toml
    pub fn find_and_load_config() -> Result<Self> {
        for config_file in &config::CONFIG_FILE_CANDIDATES {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        // 如果没找到配置文件，创建默认配置
        tracing::warn!(
            "未找到配置文件，创建默认配置: {}",
            config::DEFAULT_CONFIG_FILE
        );
        let default_config = Self::default();
        default_config.save_to_file(config::DEFAULT_CONFIG_FILE)?;
        Ok(default_config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// 保存配置到指定文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 确保数据目录和备份存储目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.backup.storage_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::default();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.backup.storage_dir, config.backup.storage_dir);
        assert_eq!(loaded.backup.max_concurrent, config.backup.max_concurrent);
        assert_eq!(loaded.backup.timeout_secs, config.backup.timeout_secs);
        assert_eq!(
            loaded.docker.default_postgres_version,
            config.docker.default_postgres_version
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = AppConfig::load_from_file(dir.path().join("nope.toml"));
        assert!(result.is_err());
    }
}
