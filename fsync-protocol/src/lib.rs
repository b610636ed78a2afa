//! Wire protocol: tagged request/response variants carried over a
//! length-prefixed framed codec. `tokio_util::codec::LengthDelimitedCodec`
//! supplies the framing; payloads are `serde_json`-encoded.

use std::collections::HashMap;

use fsync_api_types::{FileState, RelPath, VectorClock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod codec;

/// Abstracts the connection to one peer, so the Transfer Layer and the
/// Request Handler need not know whether it is a live TCP socket or an
/// in-process loopback used for testing. The hosting process supplies a
/// concrete implementation at construction.
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, request: Request) -> anyhow::Result<Response>;
}

/// Prefix on a `putFileChunks` error body enumerating the hashes the
/// server still needs.
pub const MISSING_CHUNKS_PREFIX: &str = "缺失块: ";

/// Builds the well-known missing-chunks error message body.
pub fn missing_chunks_message(hashes: &[String]) -> String {
    format!("{MISSING_CHUNKS_PREFIX}{}", hashes.join(","))
}

/// Parses a missing-chunks error message back into its hash list, if it
/// carries the expected prefix.
pub fn parse_missing_chunks(message: &str) -> Option<Vec<String>> {
    let rest = message.strip_prefix(MISSING_CHUNKS_PREFIX)?;
    Some(
        rest.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RpcError {
    pub message: String,
}

impl RpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn missing_chunks(hashes: &[String]) -> Self {
        Self::new(missing_chunks_message(hashes))
    }

    pub fn missing_hashes(&self) -> Option<Vec<String>> {
        parse_missing_chunks(&self.message)
    }
}

/// Every request variant the server accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    GetMst { sync_id: String },
    GetFiles { sync_id: String },
    GetFileData { sync_id: String, path: RelPath },
    PutFileData {
        sync_id: String,
        path: RelPath,
        bytes: Vec<u8>,
        vc: VectorClock,
    },
    DeleteFiles {
        sync_id: String,
        paths: HashMap<RelPath, Option<VectorClock>>,
    },
    GetFileChunks { sync_id: String, path: RelPath },
    GetChunkData { sync_id: String, hash: String },
    PutFileChunks {
        sync_id: String,
        path: RelPath,
        hashes: Vec<String>,
        vc: VectorClock,
    },
    PutChunkData {
        sync_id: String,
        hash: String,
        bytes: Vec<u8>,
    },
}

impl Request {
    pub fn sync_id(&self) -> &str {
        match self {
            Request::GetMst { sync_id }
            | Request::GetFiles { sync_id }
            | Request::GetFileData { sync_id, .. }
            | Request::PutFileData { sync_id, .. }
            | Request::DeleteFiles { sync_id, .. }
            | Request::GetFileChunks { sync_id, .. }
            | Request::GetChunkData { sync_id, .. }
            | Request::PutFileChunks { sync_id, .. }
            | Request::PutChunkData { sync_id, .. } => sync_id,
        }
    }

    /// Size of the payload this request carries outbound, when known
    /// ahead of time. Lets a caller scale its per-request timeout by
    /// payload size rather than applying one fixed bound to every RPC.
    pub fn payload_len(&self) -> Option<usize> {
        match self {
            Request::PutFileData { bytes, .. } | Request::PutChunkData { bytes, .. } => Some(bytes.len()),
            _ => None,
        }
    }
}

/// Every response variant. `Error` carries the UTF-8 message;
/// missing-chunks errors use [`missing_chunks_message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Response {
    MstRoot { sync_id: String, root: String },
    /// Legacy non-tagged variant kept for completeness of the request
    /// handler's response surface; `FilesV2` is preferred.
    Files {
        sync_id: String,
        entries: HashMap<RelPath, FileState>,
        deleted_paths: Vec<RelPath>,
    },
    FilesV2 {
        sync_id: String,
        states: HashMap<RelPath, FileState>,
    },
    FileData {
        sync_id: String,
        path: RelPath,
        bytes: Vec<u8>,
        vc: VectorClock,
    },
    PutAck { sync_id: String, path: RelPath },
    DeleteAck { sync_id: String },
    FileChunks {
        sync_id: String,
        path: RelPath,
        hashes: Vec<String>,
    },
    ChunkData { sync_id: String, hash: String, bytes: Vec<u8> },
    FileChunksAck { sync_id: String, path: RelPath },
    ChunkAck { sync_id: String, hash: String },
    Error { sync_id: String, error: RpcError },
}

impl Response {
    pub fn error(sync_id: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            sync_id: sync_id.into(),
            error: RpcError::new(message),
        }
    }

    pub fn sync_id(&self) -> &str {
        match self {
            Response::MstRoot { sync_id, .. }
            | Response::Files { sync_id, .. }
            | Response::FilesV2 { sync_id, .. }
            | Response::FileData { sync_id, .. }
            | Response::PutAck { sync_id, .. }
            | Response::DeleteAck { sync_id }
            | Response::FileChunks { sync_id, .. }
            | Response::ChunkData { sync_id, .. }
            | Response::FileChunksAck { sync_id, .. }
            | Response::ChunkAck { sync_id, .. }
            | Response::Error { sync_id, .. } => sync_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chunks_round_trips() {
        let hashes = vec!["aa".to_string(), "bb".to_string(), "cc".to_string()];
        let msg = missing_chunks_message(&hashes);
        assert_eq!(msg, "缺失块: aa,bb,cc");
        assert_eq!(parse_missing_chunks(&msg), Some(hashes));
    }

    #[test]
    fn non_matching_message_has_no_missing_hashes() {
        assert_eq!(parse_missing_chunks("some other error"), None);
    }

    #[test]
    fn payload_len_known_only_for_data_carrying_requests() {
        let put = Request::PutFileData {
            sync_id: "DEMO".to_string(),
            path: "a.txt".to_string(),
            bytes: vec![0u8; 42],
            vc: VectorClock::new(),
        };
        assert_eq!(put.payload_len(), Some(42));

        let get = Request::GetFileData {
            sync_id: "DEMO".to_string(),
            path: "a.txt".to_string(),
        };
        assert_eq!(get.payload_len(), None);
    }

    #[test]
    fn request_serializes_with_op_tag() {
        let req = Request::GetMst { sync_id: "DEMO".to_string() };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "getMst");
        assert_eq!(json["syncId"], "DEMO");
    }

    #[test]
    fn response_round_trips_through_json() {
        let resp = Response::PutAck {
            sync_id: "DEMO".to_string(),
            path: "a.txt".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sync_id(), "DEMO");
    }
}
