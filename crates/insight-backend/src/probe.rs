//! TCP reachability probe for database connection strings.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use insight_core::types::{ConnectionConfig, ProbeResult};
use insight_workspace::ConnectionProbe;

/// Opens a TCP connection to the host named in the connection string.
///
/// Checks reachability only; credentials are not verified. Messages never
/// include the password.
#[derive(Debug, Default, Clone)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

/// Extract `host:port` from a connection URL, defaulting the port by scheme.
pub fn resolve_target(connection_string: &str) -> Result<(String, u16), String> {
    let url = Url::parse(connection_string.trim())
        .map_err(|e| format!("invalid connection string: {}", e))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| "connection string has no host".to_string())?
        .to_string();
    let port = match url.port() {
        Some(port) => port,
        None => match url.scheme() {
            "postgres" | "postgresql" => 5432,
            "mysql" => 3306,
            other => return Err(format!("unsupported scheme '{}'", other)),
        },
    };
    Ok((host, port))
}

#[async_trait]
impl ConnectionProbe for TcpProbe {
    async fn test_connection(&self, config: &ConnectionConfig) -> ProbeResult {
        let (host, port) = match resolve_target(&config.connection_string) {
            Ok(target) => target,
            Err(message) => return ProbeResult::failed(message),
        };

        match TcpStream::connect((host.as_str(), port)).await {
            Ok(_) => {
                debug!(%host, port, "Connection probe succeeded");
                ProbeResult::ok("Connection successful!")
            }
            Err(e) => ProbeResult::failed(format!("could not reach {}:{}: {}", host, port, e)),
        }
    }
}
