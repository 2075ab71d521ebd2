use anyhow::{anyhow, Context};
use tokio::fs;
use std::sync::OnceLock;
use tracing::info;
use crate::models::extension_model::ExtensionConfig;
use tokio::net::TcpListener;

static CONFIG_CACHE: OnceLock<ExtensionConfig> = OnceLock::new();
static CORE_URL: OnceLock<String> = OnceLock::new();

pub async fn init_config_and_bind() -> anyhow::Result<TcpListener> {
    let file_path = "plugin.json";

    let data = fs::read_to_string(file_path)
        .await
        .with_context(|| format!("reading manifest {file_path}"))?;

    let mut config: ExtensionConfig =
        serde_json::from_str(&data).context("parsing manifest JSON")?;

    // === SERVER SOCKET BURADA AÇILIYOR ===
    // The manifest may ask for port 0; the OS then picks a free one and
    // the patched port is what gets registered.
    let bind_addr = format!(
        "{}:{}",
        config.connection.ip,
        config.connection.port
    );

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;

    let actual_port = listener
        .local_addr()
        .context("listener address")?
        .port();

    // === PORT PATCH ===
    config.connection.port = actual_port;

    // CORE URL
    let url = format!(
        "{}:{}",
        config.connection.target,
        config.connection.target_port
    );

    CORE_URL
        .set(url)
        .map_err(|_| anyhow!("core URL already initialized"))?;

    CONFIG_CACHE
        .set(config)
        .map_err(|_| anyhow!("config already initialized"))?;

    info!("Config initialized with dynamic port: {}", actual_port);

    Ok(listener)
}

pub fn get_cached_config() -> &'static ExtensionConfig {
    CONFIG_CACHE.get().expect("Config not initialized")
}

pub fn get_core_url() -> &'static String {
    CORE_URL.get().expect("Core URL not initialized")
}
