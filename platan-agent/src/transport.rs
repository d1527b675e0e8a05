//! HTTPS transport for the engine: one blocking POST per command.

use platan_core::{Endpoint, Transport, TransportError};
use serde_json::Value;

/// reqwest-backed transport. Upload-side and download-side commands go to
/// two distinct URLs, matching the server's endpoint split.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    upload_url: String,
    download_url: String,
}

impl HttpTransport {
    pub fn new(upload_url: String, download_url: String) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            upload_url,
            download_url,
        })
    }

    fn url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Upload => &self.upload_url,
            Endpoint::Download => &self.download_url,
        }
    }
}

impl Transport for HttpTransport {
    fn post(&mut self, endpoint: Endpoint, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(endpoint);
        tracing::debug!(%url, command = body["command"].as_str().unwrap_or(""), "POST");
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "request failed");
            return Err(TransportError::Status(status.as_u16()));
        }
        resp.json::<Value>()
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}
