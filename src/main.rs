use live_chess::api::router::create_router;
use live_chess::api::state::AppState;
use live_chess::config::AppConfig;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Handle --health-check flag for Docker HEALTHCHECK (works in scratch image).
    if std::env::args().any(|a| a == "--health-check") {
        match health_check(&AppConfig::from_env()).await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("Health check failed: {e}");
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_chess=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr();
    let state = AppState::new(config);
    info!(
        host = %state.config.host,
        port = state.config.port,
        "in-memory token table, game store and session registry ready"
    );

    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%bind_addr, %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(
        "live-chess v{} listening on {bind_addr}, live sessions at /ws",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = axum::serve(listener, app).await {
        error!(%e, "server stopped");
        std::process::exit(1);
    }
}

/// Send a raw HTTP/1.1 GET /health to the local port and expect 200 OK.
async fn health_check(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let port = config.port;
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await?;
    let request =
        format!("GET /health HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf[..n]);
    if response.starts_with("HTTP/1.1 200") {
        Ok(())
    } else {
        Err(format!(
            "Unexpected response: {}",
            response.lines().next().unwrap_or("")
        )
        .into())
    }
}
