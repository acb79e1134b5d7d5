use crate::error::{DompetError, Result};
use crate::server;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dompet=info".into()),
        )
        .init();

    let settings = load_settings();
    if settings.ingest_api_key.is_empty() {
        return Err(DompetError::Settings(
            "ingest_api_key is not configured; refusing to serve an open endpoint".to_string(),
        ));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(&settings))
}
