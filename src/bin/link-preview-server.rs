use link_preview::{server, setup_logging, LogConfig, PreviewError, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), PreviewError> {
    setup_logging(LogConfig {
        file_output: std::env::var_os("LINK_PREVIEW_LOG_DIR").is_some(),
        log_dir: std::env::var("LINK_PREVIEW_LOG_DIR")
            .unwrap_or_else(|_| "logs".to_string())
            .into(),
        ..Default::default()
    })?;

    let config = ServiceConfig::from_env()?;
    server::serve(config).await
}
