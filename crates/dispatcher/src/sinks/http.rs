//! HttpSink - POSTs each record as JSON to a REST endpoint

use std::collections::HashMap;
use std::time::Duration;

use contracts::{Ack, CanonicalRecord, RecordSink, TransportError};
use tracing::{debug, instrument};

/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;

/// Configuration for HttpSink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Endpoint receiving one record per request
    pub url: reqwest::Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let raw = params
            .get("url")
            .ok_or_else(|| "missing 'url' parameter".to_string())?;
        let url = reqwest::Url::parse(raw).map_err(|e| format!("invalid url '{raw}': {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported url scheme '{}'", url.scheme()));
        }

        let timeout_ms = match params.get("timeout_ms") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid timeout_ms '{raw}': {e}"))?,
            None => DEFAULT_HTTP_TIMEOUT_MS,
        };

        Ok(Self {
            url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Sink that sends records to an HTTP collector
pub struct HttpSink {
    name: String,
    config: HttpSinkConfig,
    client: Option<reqwest::Client>,
}

impl HttpSink {
    pub fn new(name: impl Into<String>, config: HttpSinkConfig) -> Result<Self, TransportError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::connection(&name, e.to_string()))?;

        debug!(sink = %name, url = %config.url, "HttpSink ready");
        Ok(Self {
            name,
            config,
            client: Some(client),
        })
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, TransportError> {
        let name = name.into();
        let config =
            HttpSinkConfig::from_params(params).map_err(|e| TransportError::connection(&name, e))?;
        Self::new(name, config)
    }

    fn map_request_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_connect() {
            TransportError::connection(&self.name, e.to_string())
        } else if e.is_timeout() {
            TransportError::send(&self.name, format!("timed out after {:?}", self.config.timeout))
        } else {
            TransportError::send(&self.name, e.to_string())
        }
    }
}

impl RecordSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_sink_transmit",
        skip(self, record),
        fields(sink = %self.name, identity_key = %record.identity_key)
    )]
    async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError> {
        let client = self.client.as_ref().ok_or_else(|| TransportError::Closed {
            sink_name: self.name.clone(),
        })?;
        let body =
            serde_json::to_vec(record).map_err(|e| TransportError::encode(&self.name, e.to_string()))?;
        let bytes = body.len();

        let response = client
            .post(self.config.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                sink_name: self.name.clone(),
                status: status.as_u16(),
            });
        }

        Ok(Ack {
            bytes,
            status: Some(status.as_u16()),
        })
    }

    #[instrument(name = "http_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    #[instrument(name = "http_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        self.client = None;
        debug!(sink = %self.name, "HttpSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts one request, answers with `status`, returns the raw request
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/beacon", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response =
                format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, server)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn sink_for(url: &str) -> HttpSink {
        let mut params = HashMap::new();
        params.insert("url".to_string(), url.to_string());
        params.insert("timeout_ms".to_string(), "2000".to_string());
        HttpSink::from_params("collector", &params).unwrap()
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let mut params = HashMap::new();
        params.insert("url".to_string(), "https://collector.example/api/beacon".to_string());
        let config = HttpSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS));

        params.insert("url".to_string(), "ftp://collector.example".to_string());
        assert!(HttpSinkConfig::from_params(&params).is_err());

        assert!(HttpSinkConfig::from_params(&HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_posts_json_record() {
        let (url, server) = one_shot_server("200 OK").await;
        let mut sink = sink_for(&url);

        let ack = sink.transmit(&record(5, true)).await.unwrap();
        assert_eq!(ack.status, Some(200));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/beacon"));
        assert!(request.contains("application/json"));
        assert!(request.contains(&record(5, true).identity_key.to_string()));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let (url, server) = one_shot_server("503 Service Unavailable").await;
        let mut sink = sink_for(&url);

        let err = sink.transmit(&record(1, true)).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Rejected {
                sink_name: "collector".into(),
                status: 503
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_transmit_after_close() {
        let mut sink = sink_for("http://127.0.0.1:9/api/beacon");
        sink.close().await.unwrap();
        let err = sink.transmit(&record(1, true)).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed { .. }));
    }
}
