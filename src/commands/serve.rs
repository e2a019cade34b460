//! `budget serve`: the HTTP API.

use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::mirror::Mode;
use crate::server::{self, AppState};
use crate::{Config, Error, Result};
use std::net::{IpAddr, SocketAddr};

/// Runs the HTTP API until the process is stopped. `host` and `port` override the values in
/// `config.json`.
///
/// # Errors
/// A `Request` error when the host is not an IP address, a `Service` error when the listener
/// cannot be bound or the server fails.
pub async fn serve(
    config: Config,
    mode: Mode,
    host: Option<&str>,
    port: Option<u16>,
) -> Result<Out<()>> {
    let addr = listen_addr(&config, host, port)?;
    server::run(AppState::new(config, mode), addr)
        .await
        .pub_result(ErrorType::Service)?;
    Ok("The HTTP server has stopped".into())
}

fn listen_addr(config: &Config, host: Option<&str>, port: Option<u16>) -> Result<SocketAddr> {
    let host = host.unwrap_or(config.host());
    let ip: IpAddr = host
        .trim()
        .parse()
        .map_err(|e| Error::request(format!("Invalid host '{host}': {e}")))?;
    Ok(SocketAddr::new(ip, port.unwrap_or(config.port())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_listen_addr() {
        let env = TestEnv::new().await;
        let config = env.config();
        let addr = listen_addr(&config, None, None).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8000");

        let addr = listen_addr(&config, Some("0.0.0.0"), Some(9000)).unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:9000");

        let err = listen_addr(&config, Some("localhost"), None).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
    }
}
