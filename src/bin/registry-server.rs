use std::net::SocketAddr;
use std::sync::Arc;

use trace::info;

use schema_registry_core::http::router;
use schema_registry_core::{InMemoryStorage, RegistryCore};

#[derive(Debug, Clone, serde::Deserialize)]
struct Config {
    app: AppConfig,
    server: ServerConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct AppConfig {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default = "default_environment")]
    environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

#[derive(Debug, Clone, serde::Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig { name: "schema-registry-core".into(), version: default_version(), environment: default_environment() },
            server: ServerConfig { host: default_host(), port: default_port() },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg: Config = match std::fs::read_to_string(&config_path) {
        Ok(content) => serde_yaml::from_str(&content)?,
        Err(_) => Config::default(),
    };

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting schema registry server"
    );

    let storage = Arc::new(InMemoryStorage::new());
    let core = RegistryCore::new(storage);
    let app = router(core).layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::new(cfg.server.host.parse()?, cfg.server.port);
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
