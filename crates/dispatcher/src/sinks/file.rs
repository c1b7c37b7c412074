//! FileSink - appends records to `<base_path>/<sink>.jsonl`

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use contracts::{Ack, CanonicalRecord, RecordSink, TransportError};
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// Sink that writes one JSON line per record
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        fs::create_dir_all(&config.base_path)?;

        let path = config.base_path.join(format!("{name}.jsonl"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(sink = %name, path = %path.display(), "FileSink opened");

        Ok(Self {
            name,
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Output file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn append(&mut self, record: &CanonicalRecord) -> Result<usize, TransportError> {
        let mut line = serde_json::to_vec(record)
            .map_err(|e| TransportError::encode(&self.name, e.to_string()))?;
        line.push(b'\n');

        let writer = self.writer.as_mut().ok_or_else(|| TransportError::Closed {
            sink_name: self.name.clone(),
        })?;
        writer
            .write_all(&line)
            .map_err(|e| TransportError::send(&self.name, e.to_string()))?;
        Ok(line.len())
    }
}

impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_transmit",
        skip(self, record),
        fields(sink = %self.name, identity_key = %record.identity_key)
    )]
    async fn transmit(&mut self, record: &CanonicalRecord) -> Result<Ack, TransportError> {
        self.append(record).map(Ack::bytes)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), TransportError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| TransportError::send(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        self.flush().await?;
        self.writer = None;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
