//! NetworkSink - one UDP datagram per record

use contracts::{Ack, CanonicalRecord, RecordSink, TransportError};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Datagrams larger than this are refused
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{addr_str}': {e}"))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{other}'")),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{raw}': {e}"))?,
            None => 65_000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends records over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, TransportError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| TransportError::connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| TransportError::connection(&name, e.to_string()))
    }

    fn encode(&self, record: &CanonicalRecord) -> Result<Vec<u8>, TransportError> {
        let data = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(record).map_err(|e| e.to_string()),
            NetworkFormat::Bincode => bincode::serialize(record).map_err(|e| e.to_string()),
        }
        .map_err(|e| TransportError::encode(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            return Err(TransportError::encode(
                &self.name,
                format!(
                    "datagram of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }
}

impl RecordSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_transmit",
        skip(self, record),
        fields(sink = %self.name, identity_key = %record.identity_key)
    )]
    async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError> {
        let data = self.encode(record)?;
        let socket = self.socket.as_ref().ok_or_else(|| TransportError::Closed {
            sink_name: self.name.clone(),
        })?;

        let sent = socket
            .send(&data)
            .await
            .map_err(|e| TransportError::send(&self.name, e.to_string()))?;
        Ok(Ack::bytes(sent))
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), TransportError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn test_network_sink_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.max_packet_size, 65_000);
    }

    #[test]
    fn test_network_sink_config_rejects_unknown_format() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "xml".to_string());
        assert!(NetworkSinkConfig::from_params(&params).is_err());
    }

    #[tokio::test]
    async fn test_network_sink_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 65_000,
        };

        let mut sink = NetworkSink::new("udp", config).await.unwrap();
        let ack = sink.transmit(&record(3, true)).await.unwrap();

        let mut buf = vec![0u8; 65_536];
        let len = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(len, ack.bytes);

        let decoded: CanonicalRecord = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(decoded.identity_key, record(3, true).identity_key);
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_encode_error() {
        let config = NetworkSinkConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 16,
        };

        let mut sink = NetworkSink::new("tiny", config).await.unwrap();
        let err = sink.transmit(&record(1, true)).await.unwrap_err();
        assert!(matches!(err, TransportError::Encode { .. }));
    }

    #[tokio::test]
    async fn test_bincode_datagram_without_optional_fields_decodes() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Bincode,
            max_packet_size: 65_000,
        };

        let mut sent = record(4, false);
        sent.bluetooth_address = None;
        sent.tx_power = None;

        let mut sink = NetworkSink::new("udp-bincode", config).await.unwrap();
        let ack = sink.transmit(&sent).await.unwrap();

        let mut buf = vec![0u8; 65_536];
        let len = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(len, ack.bytes);

        let decoded: CanonicalRecord = bincode::deserialize(&buf[..len]).unwrap();
        assert_eq!(decoded, sent);
    }
}
