use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Serves the mock webservice on `WEBSERVICE_ADDR` (default `127.0.0.1:8080`).
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let addr: SocketAddr = std::env::var("WEBSERVICE_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));
    let listener = TcpListener::bind(addr).await?;
    println!(
        "webservice {} listening on http://{}/api/ (key {})",
        mock_server::PSWS_VERSION,
        listener.local_addr()?,
        mock_server::API_KEY
    );
    mock_server::run(listener).await
}
