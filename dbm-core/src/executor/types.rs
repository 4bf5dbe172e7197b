use std::fmt;
use std::path::PathBuf;

/// 备份执行结果
///
/// 执行器的所有失败路径都以结构化结果返回，不向上抛出。
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub file_size: Option<u64>,
    pub error: Option<String>,
}

impl BackupOutcome {
    /// 成功结果
    pub fn ok(file_path: PathBuf, file_size: u64) -> Self {
        Self {
            success: true,
            file_path: Some(file_path),
            file_size: Some(file_size),
            error: None,
        }
    }

    /// 失败结果
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            file_path: None,
            file_size: None,
            error: Some(error.into()),
        }
    }
}

/// 待执行的外部命令描述
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// 仅作用于这一次子进程调用的环境变量（用于传递凭据）
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

// 手动实现Debug：环境变量只打印键名，避免凭据泄露到日志
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("envs", &env_keys)
            .finish()
    }
}

/// 子进程执行输出
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// 退出码为0视为成功
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_debug_hides_env_values() {
        let spec = CommandSpec::new("pg_dump")
            .arg("--host=localhost")
            .env("PGPASSWORD", "super-secret");

        let debug = format!("{spec:?}");
        assert!(debug.contains("PGPASSWORD"));
        assert!(!debug.contains("super-secret"));
    }
}
