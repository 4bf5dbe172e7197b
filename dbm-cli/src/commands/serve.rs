use crate::app::CliApp;
use dbm_core::constants::{docker, dump};
use dbm_core::error::Result;
use tracing::{info, warn};

/// 以前台守护进程方式运行调度器，直到收到 Ctrl+C
pub async fn run_serve(app: &CliApp) -> Result<()> {
    report_tooling();

    let armed = app.scheduler.initialize().await?;
    info!("调度器已启动，共 {} 个生效的备份计划", armed);
    info!("按 Ctrl+C 退出");

    tokio::signal::ctrl_c().await?;

    info!("收到退出信号，正在停止调度器...");
    Ok(())
}

/// 启动时报告转储工具链可用性，方便预判会走哪条执行策略
fn report_tooling() {
    match which::which(docker::DOCKER_BIN) {
        Ok(path) => info!("Docker 可用: {}", path.display()),
        Err(_) => warn!("Docker 未安装或不在 PATH 中，将回退到本地 pg_dump"),
    }

    match which::which(dump::PG_DUMP_BIN) {
        Ok(path) => info!("pg_dump 可用: {}", path.display()),
        Err(_) => warn!("pg_dump 不在 PATH 中，Docker 不可用时备份将失败"),
    }
}
