// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::ClientBuilder;
use std::error::Error;
use std::time::Duration;
use tracing::error;
#[cfg(feature = "fips")]
use tracing::debug;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Creates the HTTP client shared by one sink's sends.
///
/// `timeout` is the per-request deadline. If the TLS setup fails the error
/// is logged and reqwest's default client is used instead, so a sink never
/// fails to start because of it.
#[must_use]
pub fn get_client(timeout: Duration) -> reqwest::Client {
    match build_client(timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {e}, using reqwest defaults");
            reqwest::Client::new()
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, Box<dyn Error>> {
    let client = create_reqwest_client_builder()?
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .tcp_keepalive(Some(TCP_KEEPALIVE))
        .user_agent(concat!("remote-telemetry/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

#[cfg(not(feature = "fips"))]
fn create_reqwest_client_builder() -> Result<ClientBuilder, Box<dyn Error>> {
    Ok(reqwest::Client::builder().use_rustls_tls())
}

/// Uses the process-wide rustls provider, which must have been installed as a
/// FIPS provider before telemetry starts.
#[cfg(feature = "fips")]
fn create_reqwest_client_builder() -> Result<ClientBuilder, Box<dyn Error>> {
    let provider =
        rustls::crypto::CryptoProvider::get_default().ok_or("No crypto provider configured")?;
    if !provider.fips() {
        return Err("Crypto provider is not FIPS-compliant".into());
    }

    let mut root_cert_store = rustls::RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    let (added, ignored) = root_cert_store.add_parsable_certificates(native_certs.certs);
    if added == 0 {
        return Err("No valid certificates found in native root store".into());
    }
    debug!("Loaded {added} native root certificates ({ignored} ignored)");

    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(rustls::ALL_VERSIONS)
        .map_err(|_| "Failed to set protocol versions")?
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    if !config.fips() {
        return Err("The final TLS configuration is not FIPS-compliant".into());
    }

    Ok(reqwest::Client::builder().use_preconfigured_tls(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_client_times_out_against_silent_server() {
        // Accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = get_client(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let result = client.post(format!("http://{addr}/")).send().await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_timeout());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
