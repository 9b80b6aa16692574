use anyhow::{Context, Result};
use netprov_core::config::{load_config_from_toml_str, AppConfig};
use netprov_core::service::ProvisioningService;
use tracing_subscriber::EnvFilter;

mod runner;

const DEFAULT_CONFIG: &str = include_str!("../../configs/default.toml");

/// `NETPROV_CONFIG` 指向的文件优先，否则使用内置的默认配置
fn load_config() -> Result<AppConfig> {
    let text = match std::env::var_os("NETPROV_CONFIG") {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.to_string_lossy()))?,
        None => DEFAULT_CONFIG.to_string(),
    };
    load_config_from_toml_str(&text).context("parsing config")
}

async fn run() -> Result<()> {
    let config = load_config()?;
    let platform = runner::build_platform(&config);
    ProvisioningService::new(config, platform).run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 初始化日志（这是入口点的职责）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. 处理顶层错误
    if let Err(e) = run().await {
        tracing::error!("❌ Provisioner failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
