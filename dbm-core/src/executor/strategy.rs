use crate::constants::{docker, dump};
use crate::db::ConnectionRecord;
use crate::{DbmError, Result};
use std::path::Path;

use super::types::CommandSpec;

/// 转储执行策略
///
/// 首选策略在一次性容器内执行转储工具，本地策略直接调用 PATH 中的
/// 转储工具。新增数据库引擎时注册新的策略实现即可。
pub trait DumpStrategy: Send + Sync {
    /// 策略名称（日志用）
    fn name(&self) -> &'static str;

    /// 可用性探测命令；None 表示无需探测
    fn probe(&self) -> Option<CommandSpec>;

    /// 生成转储命令
    ///
    /// 凭据只通过 CommandSpec 的环境变量传递，作用域限定在这一次
    /// 子进程调用。
    fn dump_command(
        &self,
        connection: &ConnectionRecord,
        storage_dir: &Path,
        file_name: &str,
    ) -> Result<CommandSpec>;
}

/// Docker容器内执行 pg_dump（首选策略）
///
/// 按连接记录的主版本号选择 postgres:<version> 镜像，未检测到版本时
/// 使用配置的默认版本。
pub struct DockerPgDump {
    pub default_version: String,
}

impl DumpStrategy for DockerPgDump {
    fn name(&self) -> &'static str {
        "docker-pg_dump"
    }

    fn probe(&self) -> Option<CommandSpec> {
        Some(CommandSpec::new(docker::DOCKER_BIN).arg("--version"))
    }

    fn dump_command(
        &self,
        connection: &ConnectionRecord,
        storage_dir: &Path,
        file_name: &str,
    ) -> Result<CommandSpec> {
        let version = connection
            .postgres_version
            .as_deref()
            .unwrap_or(&self.default_version);
        let image = format!("{}:{}", docker::POSTGRES_IMAGE, version);

        // Docker的卷挂载需要绝对路径
        let absolute_dir = std::fs::canonicalize(storage_dir).map_err(|e| {
            DbmError::docker(format!(
                "无法解析备份目录 {}: {}",
                storage_dir.display(),
                e
            ))
        })?;

        let mut spec = CommandSpec::new(docker::DOCKER_BIN)
            .arg("run")
            .arg("--rm")
            .arg("-v")
            .arg(format!(
                "{}:{}",
                absolute_dir.display(),
                docker::CONTAINER_BACKUP_DIR
            ))
            // 只声明变量名，值经由docker进程自身的环境传入，不出现在参数列表
            .arg("-e")
            .arg(dump::PG_PASSWORD_ENV)
            .arg(image)
            .arg(dump::PG_DUMP_BIN);

        let container_file = format!("{}/{}", docker::CONTAINER_BACKUP_DIR, file_name);
        for arg in pg_dump_args(connection, &container_file) {
            spec = spec.arg(arg);
        }

        Ok(spec.env(dump::PG_PASSWORD_ENV, connection.password.clone()))
    }
}

/// 本地 pg_dump（回退策略）
pub struct LocalPgDump;

impl DumpStrategy for LocalPgDump {
    fn name(&self) -> &'static str {
        "local-pg_dump"
    }

    fn probe(&self) -> Option<CommandSpec> {
        None
    }

    fn dump_command(
        &self,
        connection: &ConnectionRecord,
        storage_dir: &Path,
        file_name: &str,
    ) -> Result<CommandSpec> {
        let file_path = storage_dir.join(file_name);

        let mut spec = CommandSpec::new(dump::PG_DUMP_BIN);
        for arg in pg_dump_args(connection, &file_path.to_string_lossy()) {
            spec = spec.arg(arg);
        }

        Ok(spec.env(dump::PG_PASSWORD_ENV, connection.password.clone()))
    }
}

/// 两种策略共享的 pg_dump 参数
fn pg_dump_args(connection: &ConnectionRecord, file_arg: &str) -> Vec<String> {
    vec![
        format!("--host={}", connection.host),
        format!("--port={}", connection.port),
        format!("--username={}", connection.username),
        format!("--dbname={}", connection.database_name),
        "--verbose".to_string(),
        "--clean".to_string(),
        "--no-owner".to_string(),
        "--no-privileges".to_string(),
        format!("--file={}", file_arg),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn test_connection(version: Option<&str>) -> ConnectionRecord {
        ConnectionRecord {
            id: "c1".to_string(),
            name: "prod".to_string(),
            db_type: "postgresql".to_string(),
            host: "db.internal".to_string(),
            port: 5433,
            database_name: "app".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            postgres_version: version.map(|v| v.to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_docker_image_follows_connection_version() {
        let dir = tempdir().unwrap();
        let strategy = DockerPgDump {
            default_version: "16".to_string(),
        };

        let spec = strategy
            .dump_command(&test_connection(Some("14")), dir.path(), "a.sql")
            .unwrap();
        assert!(spec.args.contains(&"postgres:14".to_string()));

        let spec = strategy
            .dump_command(&test_connection(None), dir.path(), "a.sql")
            .unwrap();
        assert!(spec.args.contains(&"postgres:16".to_string()));
    }

    #[test]
    fn test_docker_command_keeps_password_out_of_args() {
        let dir = tempdir().unwrap();
        let strategy = DockerPgDump {
            default_version: "16".to_string(),
        };

        let spec = strategy
            .dump_command(&test_connection(Some("16")), dir.path(), "a.sql")
            .unwrap();

        assert!(spec.args.iter().all(|arg| !arg.contains("secret")));
        assert!(
            spec.envs
                .iter()
                .any(|(k, v)| k == "PGPASSWORD" && v == "secret")
        );
    }

    #[test]
    fn test_local_command_targets_host_path() {
        let dir = tempdir().unwrap();
        let strategy = LocalPgDump;

        let spec = strategy
            .dump_command(&test_connection(None), dir.path(), "a.sql")
            .unwrap();

        assert_eq!(spec.program, "pg_dump");
        let file_arg = format!("--file={}", dir.path().join("a.sql").display());
        assert!(spec.args.contains(&file_arg));
        assert!(spec.args.contains(&"--port=5433".to_string()));
    }
}
