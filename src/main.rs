use rmcp::{ServiceExt, transport::stdio};

use codesmith::config::Config;
use codesmith::server::CodesmithServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    load_dotenv();

    tracing::info!("codesmith starting");

    let config = Config::load();
    tracing::info!(
        "default provider: {}, max_tokens: {}",
        config.default_provider,
        config.generation.max_tokens
    );
    let server = CodesmithServer::new(config)?;

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;

    service.waiting().await?;

    tracing::info!("codesmith shutting down");
    Ok(())
}

/// Load `.env` beside the binary (MCP clients may start us from any CWD),
/// then the cargo project root for development builds, then the CWD.
fn load_dotenv() {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));

    if let Some(dir) = exe_dir {
        for candidate in [dir.join(".env"), dir.join("../../.env")] {
            if candidate.exists() {
                dotenvy::from_path(&candidate).ok();
                return;
            }
        }
    }
    dotenvy::dotenv().ok();
}
