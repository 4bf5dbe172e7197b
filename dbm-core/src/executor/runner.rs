use crate::{DbmError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::types::{CommandOutput, CommandSpec};

/// 子进程执行抽象
///
/// 执行器通过这个trait拉起外部命令，测试中可注入假实现来模拟
/// Docker不可用、转储失败等情况。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 执行命令并捕获输出，超过超时后强制终止子进程
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput>;
}

/// 基于 tokio::process 的系统命令执行器
#[derive(Debug, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 超时丢弃future时确保子进程被终止
            .kill_on_drop(true);

        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| {
                DbmError::backup(format!(
                    "命令 {} 执行超时（{}秒），子进程已终止",
                    spec.program,
                    timeout.as_secs()
                ))
            })??;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
