//! Wire protocol: JSON command bodies and response parsing.
//!
//! Every request is a single POST of one command object; upload-side and
//! download-side commands go to different endpoints. A response missing a
//! required field is a protocol failure, never partial success.

use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;

/// Which server endpoint a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// join / challenge / data
    Upload,
    /// check / down
    Download,
}

/// Outbound command bodies. The `command` tag and lowercase names are the
/// server's contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command<'a> {
    Join {
        id: &'a str,
    },
    Challenge {
        id: &'a str,
        challenge: String,
        session: &'a str,
    },
    Data {
        id: &'a str,
        token: &'a str,
        data: String,
    },
    Check {
        id: &'a str,
        token: &'a str,
        name: &'a str,
    },
    Down {
        id: &'a str,
        token: &'a str,
        name: &'a str,
        chunk: u32,
    },
}

impl Command<'_> {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Command::Join { .. } | Command::Challenge { .. } | Command::Data { .. } => {
                Endpoint::Upload
            }
            Command::Check { .. } | Command::Down { .. } => Endpoint::Download,
        }
    }
}

/// Malformed or incomplete server response.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing field `{0}` in server response")]
    MissingField(&'static str),
    #[error("invalid field `{0}` in server response")]
    InvalidField(&'static str),
}

/// Phase-1 join response, with challenge and IV already hex-decoded.
#[derive(Debug, Clone)]
pub struct JoinChallenge {
    pub challenge: Vec<u8>,
    pub iv: Vec<u8>,
    pub session: String,
}

/// `check` response. `status` is the server's readiness word; everything
/// else describes the stored artifact's chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub status: String,
    pub size: u64,
    pub chunks: u32,
    pub chunksize: u32,
}

impl CheckReport {
    /// The artifact is fully materialized and chunks can be fetched.
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

/// One downloaded chunk, base64-decoded.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub length: u64,
    pub data: Vec<u8>,
}

fn require_str<'a>(v: &'a Value, field: &'static str) -> Result<&'a str, ProtocolError> {
    match v.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(ProtocolError::MissingField(field))
        }
        Some(_) => Err(ProtocolError::InvalidField(field)),
    }
}

fn require_u64(v: &Value, field: &'static str) -> Result<u64, ProtocolError> {
    v.get(field)
        .ok_or(ProtocolError::MissingField(field))?
        .as_u64()
        .ok_or(ProtocolError::InvalidField(field))
}

fn require_hex(v: &Value, field: &'static str) -> Result<Vec<u8>, ProtocolError> {
    hex::decode(require_str(v, field)?).map_err(|_| ProtocolError::InvalidField(field))
}

pub fn parse_join(v: &Value) -> Result<JoinChallenge, ProtocolError> {
    Ok(JoinChallenge {
        challenge: require_hex(v, "challenge")?,
        iv: require_hex(v, "iv")?,
        session: require_str(v, "session")?.to_owned(),
    })
}

pub fn parse_token(v: &Value) -> Result<String, ProtocolError> {
    Ok(require_str(v, "token")?.to_owned())
}

pub fn parse_upload(v: &Value) -> Result<String, ProtocolError> {
    Ok(require_str(v, "uuid")?.to_owned())
}

pub fn parse_check(v: &Value) -> Result<CheckReport, ProtocolError> {
    Ok(CheckReport {
        status: require_str(v, "status")?.to_owned(),
        size: require_u64(v, "size")?,
        chunks: require_u64(v, "chunks")? as u32,
        chunksize: require_u64(v, "chunksize")? as u32,
    })
}

/// Parse a `down` response. An out-of-range chunk index makes the server
/// omit `data`, which surfaces here as a missing field.
pub fn parse_chunk(v: &Value) -> Result<ChunkPayload, ProtocolError> {
    let length = require_u64(v, "length")?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(require_str(v, "data")?)
        .map_err(|_| ProtocolError::InvalidField("data"))?;
    if data.len() as u64 != length {
        return Err(ProtocolError::InvalidField("length"));
    }
    Ok(ChunkPayload { length, data })
}

/// Base64 used for upload payloads and chunk data.
pub fn encode_payload(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_bodies_serialize_with_tag() {
        let body = serde_json::to_value(Command::Join { id: "dev-1" }).unwrap();
        assert_eq!(body, json!({"command": "join", "id": "dev-1"}));

        let body = serde_json::to_value(Command::Down {
            id: "dev-1",
            token: "t",
            name: "n",
            chunk: 3,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"command": "down", "id": "dev-1", "token": "t", "name": "n", "chunk": 3})
        );
    }

    #[test]
    fn endpoints() {
        assert_eq!(Command::Join { id: "x" }.endpoint(), Endpoint::Upload);
        assert_eq!(
            Command::Check {
                id: "x",
                token: "t",
                name: "n"
            }
            .endpoint(),
            Endpoint::Download
        );
    }

    #[test]
    fn join_response_parses() {
        let v = json!({"challenge": "00ff", "iv": "a1b2", "session": "s1"});
        let j = parse_join(&v).unwrap();
        assert_eq!(j.challenge, vec![0x00, 0xff]);
        assert_eq!(j.iv, vec![0xa1, 0xb2]);
        assert_eq!(j.session, "s1");
    }

    #[test]
    fn join_missing_iv_is_protocol_error() {
        let v = json!({"challenge": "00ff", "session": "s1"});
        assert!(matches!(
            parse_join(&v),
            Err(ProtocolError::MissingField("iv"))
        ));
    }

    #[test]
    fn join_bad_hex_is_invalid_field() {
        let v = json!({"challenge": "zz", "iv": "a1b2", "session": "s1"});
        assert!(matches!(
            parse_join(&v),
            Err(ProtocolError::InvalidField("challenge"))
        ));
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let v = json!({"token": ""});
        assert!(matches!(
            parse_token(&v),
            Err(ProtocolError::MissingField("token"))
        ));
    }

    #[test]
    fn check_report_ready() {
        let v = json!({"status": "ready", "size": 8192, "chunks": 2, "chunksize": 4096});
        let r = parse_check(&v).unwrap();
        assert!(r.is_ready());
        assert_eq!(r.chunks, 2);
        assert_eq!(r.chunksize, 4096);

        let v =
            json!({"status": "file not ready. retry later", "size": 0, "chunks": 0, "chunksize": 0});
        assert!(!parse_check(&v).unwrap().is_ready());
    }

    #[test]
    fn chunk_roundtrips_base64() {
        let raw = vec![1u8, 2, 3, 4, 5];
        let v = json!({"length": 5, "data": encode_payload(&raw)});
        let c = parse_chunk(&v).unwrap();
        assert_eq!(c.data, raw);
        assert_eq!(c.length, 5);
    }

    #[test]
    fn chunk_without_data_is_protocol_error() {
        // Out-of-range index: server answers with length 0 and no data.
        let v = json!({"length": 0, "chunks": 4});
        assert!(matches!(
            parse_chunk(&v),
            Err(ProtocolError::MissingField("data"))
        ));
    }

    #[test]
    fn chunk_length_mismatch_is_protocol_error() {
        let v = json!({"length": 99, "data": encode_payload(&[1, 2, 3])});
        assert!(matches!(
            parse_chunk(&v),
            Err(ProtocolError::InvalidField("length"))
        ));
    }
}
