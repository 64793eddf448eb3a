//! Outbound HTTPS collaborator
//!
//! Adapters only ever see response bodies. Status handling, TLS and timeouts
//! belong to the transport; nothing here retries.

use async_trait::async_trait;

use crate::error::GatewayResult;

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` and return the response body.
    async fn post(&self, url: &str, body: &str) -> GatewayResult<String>;

    /// GET `url` and return the response body.
    async fn get(&self, url: &str) -> GatewayResult<String>;
}

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportConfig};

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Client;
    use tokio::time::timeout;
    use tracing::{debug, error};

    use super::Transport;
    use crate::error::{GatewayError, GatewayResult};

    #[derive(Debug, Clone)]
    pub struct HttpTransportConfig {
        pub request_timeout: Duration,
        pub user_agent: String,
    }

    impl Default for HttpTransportConfig {
        fn default() -> Self {
            Self {
                request_timeout: Duration::from_secs(30),
                user_agent: "card-gateways/0.1".to_string(),
            }
        }
    }

    /// reqwest-backed transport
    pub struct HttpTransport {
        client: Client,
        config: HttpTransportConfig,
    }

    impl HttpTransport {
        pub fn new(config: HttpTransportConfig) -> GatewayResult<Self> {
            let client = Client::builder()
                .timeout(config.request_timeout)
                .user_agent(config.user_agent.as_str())
                .build()
                .map_err(|e| {
                    GatewayError::invalid_option(
                        "transport",
                        format!("Failed to create HTTP client: {}", e),
                    )
                })?;

            Ok(Self { client, config })
        }

        async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> GatewayResult<String> {
            let url = strip_query(url);
            let response = timeout(self.config.request_timeout, request.send())
                .await
                .map_err(|_| {
                    GatewayError::transport(format!(
                        "Request to {} timed out after {} seconds",
                        url,
                        self.config.request_timeout.as_secs()
                    ))
                })??;

            let status = response.status();
            if !status.is_success() {
                error!("Gateway endpoint {} answered HTTP {}", url, status);
                return Err(GatewayError::transport(format!("HTTP {} from {}", status, url)));
            }

            let body = response.text().await?;
            debug!("Received {} bytes from {}", body.len(), url);
            Ok(body)
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn post(&self, url: &str, body: &str) -> GatewayResult<String> {
            debug!("POST {}", url);
            let request = self
                .client
                .post(url)
                .header("Content-Type", "application/xml")
                .body(body.to_string());
            self.send(request, url).await
        }

        async fn get(&self, url: &str) -> GatewayResult<String> {
            debug!("GET {}", strip_query(url));
            let request = self.client.get(url);
            self.send(request, url).await
        }
    }

    /// Query strings can carry card data and never reach logs or errors.
    fn strip_query(url: &str) -> &str {
        url.split('?').next().unwrap_or(url)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_strip_query() {
            assert_eq!(
                strip_query("https://host/Gestpay/PAGAMS2S.asp?a=1&b=PAY1_CARDNUMBER=4111"),
                "https://host/Gestpay/PAGAMS2S.asp"
            );
        }

        #[test]
        fn test_transport_config_default() {
            let config = HttpTransportConfig::default();
            assert_eq!(config.request_timeout, Duration::from_secs(30));
            assert!(HttpTransport::new(config).is_ok());
        }
    }
}
