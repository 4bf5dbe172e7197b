use crate::app::CliApp;
use dbm_core::database::NewConnection;
use dbm_core::error::{DbmError, Result};
use tracing::{info, warn};

/// 登记一个数据库连接
#[allow(clippy::too_many_arguments)]
pub async fn add_connection(
    app: &CliApp,
    name: String,
    db_type: String,
    host: String,
    port: u16,
    database: String,
    username: String,
    password: String,
    postgres_version: Option<String>,
) -> Result<()> {
    let record = app
        .database
        .create_connection(NewConnection {
            name,
            db_type,
            host,
            port,
            database_name: database,
            username,
            password,
            postgres_version,
        })
        .await?;

    info!("✅ 已登记数据库连接: {} ({})", record.name, record.id);
    Ok(())
}

/// 列出所有连接
pub async fn list_connections(app: &CliApp) -> Result<()> {
    let connections = app.database.list_connections().await?;

    if connections.is_empty() {
        println!("暂无数据库连接，使用 'dbm-cli connection add' 登记。");
        return Ok(());
    }

    println!("数据库连接 ({} 个):", connections.len());
    for conn in connections {
        let version = conn.postgres_version.as_deref().unwrap_or("未检测");
        println!(
            "  {}  {}  {}://{}@{}:{}/{}  版本: {}",
            conn.id,
            conn.name,
            conn.db_type,
            conn.username,
            conn.host,
            conn.port,
            conn.database_name,
            version
        );
    }

    Ok(())
}

/// 对连接做一次试备份验证连通性；成功后可写回确认的版本号
pub async fn test_connection(
    app: &CliApp,
    id: &str,
    postgres_version: Option<String>,
) -> Result<()> {
    let connection = app
        .database
        .get_connection(id)
        .await?
        .ok_or_else(|| DbmError::custom(format!("数据库连接不存在: {id}")))?;

    info!("正在测试连接 {} ...", connection.name);
    let outcome = app.executor.test_backup(&connection).await;

    if outcome.success {
        info!("✅ 连接测试成功");

        if let Some(version) = postgres_version {
            app.database.update_connection_version(id, &version).await?;
            info!("已记录 PostgreSQL 主版本号: {}", version);
        }
        Ok(())
    } else {
        warn!(
            "❌ 连接测试失败: {}",
            outcome.error.as_deref().unwrap_or("未知错误")
        );
        Err(DbmError::custom("连接测试失败"))
    }
}

/// 删除连接
pub async fn remove_connection(app: &CliApp, id: &str) -> Result<()> {
    if app.database.get_connection(id).await?.is_none() {
        return Err(DbmError::custom(format!("数据库连接不存在: {id}")));
    }

    app.database.delete_connection(id).await?;
    info!("✅ 已删除数据库连接: {}", id);
    Ok(())
}
