//! Remote chunk transfer over HTTP/HTTPS

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chunk_sink::{ChunkSink, SinkError, Transfer};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::Write;

/// `action` field the remote endpoint dispatches on.
pub const PROCESS_CHUNK_ACTION: &str = "wpmdb_process_chunk";

type HmacSha256 = Hmac<Sha256>;

/// Buffers a step's SQL and posts it to the remote site on transfer.
pub struct HttpChunkSink {
    client: reqwest::Client,
    url: String,
    remote_state_id: String,
    key: String,
    gzip: bool,
    chunk: Vec<u8>,
}

impl HttpChunkSink {
    pub fn new(url: String, remote_state_id: String, key: String, gzip: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            remote_state_id,
            key,
            gzip,
            chunk: Vec::new(),
        }
    }

    /// Form fields in the order they are signed and sent. `sig` comes last.
    fn fields(&self, table: &str) -> Result<Vec<(&'static str, Vec<u8>)>, SinkError> {
        let (gzipped, chunk) = if self.gzip {
            ("1", compress(&self.chunk)?)
        } else {
            ("0", self.chunk.clone())
        };
        let mut fields = vec![
            ("action", PROCESS_CHUNK_ACTION.as_bytes().to_vec()),
            ("remote_state_id", self.remote_state_id.as_bytes().to_vec()),
            ("table", table.as_bytes().to_vec()),
            ("chunk_gzipped", gzipped.as_bytes().to_vec()),
            ("chunk", chunk),
        ];
        let sig = sign(&fields, &self.key);
        fields.push(("sig", sig.into_bytes()));
        Ok(fields)
    }
}

/// zlib stream, what the remote end inflates.
fn compress(chunk: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(chunk)?;
    encoder.finish()
}

/// Base64 HMAC-SHA256 of the concatenated field values.
pub fn sign(fields: &[(&str, Vec<u8>)], key: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    for (_, value) in fields {
        mac.update(value);
    }
    STANDARD.encode(mac.finalize().into_bytes())
}

/// The endpoint answers `1` on success. Anything else is an error, preferably
/// a JSON `{wpmdb_error, body}` object.
fn check_response(body: &str) -> Result<(), SinkError> {
    let body = body.trim();
    if body == "1" {
        return Ok(());
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if map.contains_key("wpmdb_error") {
            if let Some(message) = map.get("body") {
                let message = match message {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return Err(SinkError::Remote { body: message });
            }
        }
    }
    Err(SinkError::UnexpectedResponse(body.to_string()))
}

#[async_trait]
impl ChunkSink for HttpChunkSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.chunk.extend_from_slice(chunk);
        Ok(())
    }

    async fn transfer(&mut self, transfer: &Transfer) -> Result<(), SinkError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.fields(&transfer.table)? {
            form = form.part(name, reqwest::multipart::Part::bytes(value));
        }

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SinkError::Http(format!("Failed to post chunk to {}: {e}", self.url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::Http(format!("Failed to read response from {}: {e}", self.url)))?;
        if !status.is_success() {
            return Err(SinkError::Http(format!(
                "HTTP request failed with status {status} for URL: {}",
                self.url
            )));
        }
        if let Err(e) = check_response(&body) {
            tracing::error!("transfer_chunk received error response: {e}");
            return Err(e);
        }

        tracing::debug!(
            "Transferred {} bytes of {} to {}",
            self.chunk.len(),
            transfer.table,
            self.url
        );
        self.chunk.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn sink(gzip: bool) -> HttpChunkSink {
        HttpChunkSink::new(
            "https://remote.example/wp-admin/admin-ajax.php".to_string(),
            "state-1".to_string(),
            "secret".to_string(),
            gzip,
        )
    }

    #[tokio::test]
    async fn test_fields_plain() {
        let mut sink = sink(false);
        sink.write_chunk(b"INSERT 1;\n").await.unwrap();
        let fields = sink.fields("wp_posts").unwrap();
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["action", "remote_state_id", "table", "chunk_gzipped", "chunk", "sig"]
        );
        assert_eq!(fields[3].1, b"0".to_vec());
        assert_eq!(fields[4].1, b"INSERT 1;\n".to_vec());
        assert_eq!(
            String::from_utf8(fields[5].1.clone()).unwrap(),
            sign(&fields[..5], "secret")
        );
    }

    #[tokio::test]
    async fn test_fields_gzipped() {
        let mut sink = sink(true);
        sink.write_chunk(b"UPDATE x;\n").await.unwrap();
        let fields = sink.fields("wp_posts").unwrap();
        assert_eq!(fields[3].1, b"1".to_vec());

        let mut inflated = String::new();
        ZlibDecoder::new(fields[4].1.as_slice())
            .read_to_string(&mut inflated)
            .unwrap();
        assert_eq!(inflated, "UPDATE x;\n");
    }

    #[test]
    fn test_sign_depends_on_key_and_values() {
        let fields = vec![("a", b"1".to_vec()), ("b", b"2".to_vec())];
        let sig = sign(&fields, "k");
        assert_eq!(sig, sign(&fields, "k"));
        assert_ne!(sig, sign(&fields, "other"));
        assert_ne!(sig, sign(&[("a", b"1".to_vec())], "k"));
        // 32 byte digest
        assert_eq!(STANDARD.decode(sig).unwrap().len(), 32);
    }

    #[test]
    fn test_check_response() {
        assert!(check_response("1").is_ok());
        assert!(check_response(" 1\n").is_ok());
        match check_response(r#"{"wpmdb_error":1,"body":"Table missing"}"#) {
            Err(SinkError::Remote { body }) => assert_eq!(body, "Table missing"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            check_response("<html>500</html>"),
            Err(SinkError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            check_response(r#"{"ok":true}"#),
            Err(SinkError::UnexpectedResponse(_))
        ));
    }
}
