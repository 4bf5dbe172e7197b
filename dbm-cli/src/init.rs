use dbm_core::{
    config::AppConfig,
    constants::{config, database},
    database::Database,
    error::Result,
};
use std::path::Path;
use tracing::{info, warn};

/// 运行独立的初始化流程
pub async fn run_init(force: bool) -> Result<()> {
    info!("🗄️  DBM 初始化");
    info!("======================");

    // 检查是否已经初始化过
    if !force
        && (Path::new(config::DEFAULT_CONFIG_FILE).exists()
            || database::get_database_path().exists())
    {
        warn!("⚠️  检测到已存在的配置文件或数据库文件");
        info!("如果您要重新初始化，请使用 --force 参数");
        info!("示例: dbm-cli init --force");
        return Ok(());
    }

    info!("📋 步骤 1: 创建配置文件和目录结构");

    // 创建默认配置
    let app_config = AppConfig::default();
    app_config.save_to_file(config::DEFAULT_CONFIG_FILE)?;
    info!("   ✅ 创建配置文件: {}", config::DEFAULT_CONFIG_FILE);

    // 创建必要的目录结构
    app_config.ensure_dirs()?;
    info!("   ✅ 创建目录结构:");
    info!(
        "      - {}  (备份存储目录)",
        app_config.backup.storage_dir
    );
    info!("      - {}  (数据库文件)", app_config.database.path);

    info!("📋 步骤 2: 初始化数据库");

    let _database = Database::connect(&app_config.database.path).await?;
    info!("   ✅ 创建DuckDB数据库: {}", app_config.database.path);

    info!("🎉 初始化完成！");
    info!("下一步:");
    info!("  1. dbm-cli connection add <名称> --database <库名> --username <用户> --password <密码>");
    info!("  2. dbm-cli schedule add <名称> --cron '0 2 * * *' --connection-id <连接ID>");
    info!("  3. dbm-cli serve");

    Ok(())
}
