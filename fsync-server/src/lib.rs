//! Request Handler: the server-side responder for every
//! RPC variant, stateless across calls — all persistent effects land in
//! the Block Store, the File State Store, and the filesystem. One method
//! per request kind, matched by tag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use fsync_api_types::{DeletionRecord, FileMetadata, PeerId, VectorClock};
use fsync_clock::{CausalClockManager, ClockKey};
use fsync_datastore::{chunk_file, BlockStore, MerkleIndex};
use fsync_protocol::{missing_chunks_message, Request, Response, RpcTransport};
use fsync_state::FileStateStore;
use tracing::warn;

/// Everything the handler needs to service RPCs for one `syncID`.
pub struct FolderContext {
    pub folder_id: String,
    pub sync_id: String,
    pub local_path: PathBuf,
    pub local_peer_id: PeerId,
    pub state: Arc<FileStateStore>,
    pub clock: Arc<CausalClockManager>,
    pub blocks: Arc<BlockStore>,
}

/// Dispatches every [`Request`] variant against a registry of
/// [`FolderContext`]s keyed by `syncID`. Implements [`RpcTransport`] so it
/// can stand in directly for a live connection in tests that wire two
/// engines together without a socket.
pub struct RequestHandler {
    folders: RwLock<HashMap<String, Arc<FolderContext>>>,
    write_stability_window_secs: i64,
}

impl RequestHandler {
    pub fn new() -> Self {
        Self {
            folders: RwLock::new(HashMap::new()),
            write_stability_window_secs: fsync_buildcfg::WRITE_STABILITY_WINDOW_SECS,
        }
    }

    /// Shrinks the write-in-progress stability window; tests use this so
    /// they don't have to sleep for the production default.
    pub fn with_write_stability_window(mut self, secs: i64) -> Self {
        self.write_stability_window_secs = secs;
        self
    }

    pub fn register(&self, ctx: FolderContext) {
        self.folders.write().unwrap().insert(ctx.sync_id.clone(), Arc::new(ctx));
    }

    pub fn unregister(&self, sync_id: &str) {
        self.folders.write().unwrap().remove(sync_id);
    }

    fn context(&self, sync_id: &str) -> Option<Arc<FolderContext>> {
        self.folders.read().unwrap().get(sync_id).cloned()
    }

    /// Services one request, always producing a response (internal errors
    /// are folded into `Response::Error` rather than propagated).
    pub async fn handle_request(&self, request: Request) -> Response {
        let sync_id = request.sync_id().to_string();
        let ctx = match self.context(&sync_id) {
            Some(ctx) => ctx,
            None => return Response::error(sync_id, format!("unknown sync id '{sync_id}'")),
        };

        let result = match request {
            Request::GetMst { .. } => self.get_mst(&ctx).await,
            Request::GetFiles { .. } => self.get_files(&ctx).await,
            Request::GetFileData { path, .. } => self.get_file_data(&ctx, &path).await,
            Request::PutFileData { path, bytes, vc, .. } => self.put_file_data(&ctx, &path, bytes, vc).await,
            Request::DeleteFiles { paths, .. } => self.delete_files(&ctx, paths).await,
            Request::GetFileChunks { path, .. } => self.get_file_chunks(&ctx, &path).await,
            Request::GetChunkData { hash, .. } => self.get_chunk_data(&ctx, &hash).await,
            Request::PutFileChunks { path, hashes, vc, .. } => self.put_file_chunks(&ctx, &path, hashes, vc).await,
            Request::PutChunkData { hash, bytes, .. } => self.put_chunk_data(&ctx, &hash, bytes).await,
        };

        result.unwrap_or_else(|e| Response::error(sync_id, e.to_string()))
    }

    async fn get_mst(&self, ctx: &FolderContext) -> Result<Response> {
        let mut index = MerkleIndex::new();
        for path in ctx.state.live_paths() {
            if let Some(meta) = ctx.state.get_live(&path) {
                index.insert(path, meta.hash);
            }
        }
        Ok(Response::MstRoot {
            sync_id: ctx.sync_id.clone(),
            root: index.root(),
        })
    }

    async fn get_files(&self, ctx: &FolderContext) -> Result<Response> {
        let mut states = HashMap::new();
        for path in ctx.state.live_paths() {
            if let Some(state) = ctx.state.get_state(&path) {
                states.insert(path, state);
            }
        }
        for path in ctx.state.get_deleted_paths() {
            if let Some(state) = ctx.state.get_state(&path) {
                states.insert(path, state);
            }
        }
        Ok(Response::FilesV2 {
            sync_id: ctx.sync_id.clone(),
            states,
        })
    }

    async fn get_file_data(&self, ctx: &FolderContext, path: &str) -> Result<Response> {
        let abs = ctx.local_path.join(path);

        if !write_stable(&abs, self.write_stability_window_secs).await? {
            anyhow::bail!("file '{path}' may be in progress");
        }

        let bytes = tokio::fs::read(&abs).await.with_context(|| format!("reading {abs:?}"))?;
        let vc = ctx
            .clock
            .get(&ClockKey::new(ctx.folder_id.as_str(), ctx.sync_id.as_str(), path))?
            .unwrap_or_default();

        Ok(Response::FileData {
            sync_id: ctx.sync_id.clone(),
            path: path.to_string(),
            bytes,
            vc,
        })
    }

    async fn put_file_data(&self, ctx: &FolderContext, path: &str, bytes: Vec<u8>, vc: VectorClock) -> Result<Response> {
        let abs = ctx.local_path.join(path);
        let key = ClockKey::new(ctx.folder_id.as_str(), ctx.sync_id.as_str(), path);
        let existing = ctx.clock.get(&key)?.unwrap_or_default();
        let merged = CausalClockManager::merge(&existing, &vc);

        fsync_tools::fs::replace_file(&abs, &bytes).with_context(|| format!("writing {abs:?}"))?;

        let meta = metadata_for(&abs, &bytes, merged.clone())?;
        ctx.clock.save(&key, merged)?;
        ctx.state.set_live(path, meta)?;

        Ok(Response::PutAck {
            sync_id: ctx.sync_id.clone(),
            path: path.to_string(),
        })
    }

    async fn delete_files(&self, ctx: &FolderContext, paths: HashMap<String, Option<VectorClock>>) -> Result<Response> {
        let now = now_unix();
        for (path, incoming_vc) in paths {
            let key = ClockKey::new(ctx.folder_id.as_str(), ctx.sync_id.as_str(), path.as_str());
            let existing = ctx.clock.get(&key)?.unwrap_or_default();
            let merged = match incoming_vc {
                Some(vc) => CausalClockManager::merge(&existing, &vc),
                None => existing.increment(&ctx.local_peer_id),
            };

            let abs = ctx.local_path.join(&path);
            match tokio::fs::metadata(&abs).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&abs).await,
                Ok(_) => tokio::fs::remove_file(&abs).await,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
            .with_context(|| format!("removing {abs:?}"))?;

            ctx.clock.save(&key, merged.clone())?;
            ctx.state.set_deleted(
                &path,
                DeletionRecord {
                    deleted_at: now,
                    deleted_by: ctx.local_peer_id.clone(),
                    vector_clock: merged,
                },
            )?;
        }

        Ok(Response::DeleteAck { sync_id: ctx.sync_id.clone() })
    }

    async fn get_file_chunks(&self, ctx: &FolderContext, path: &str) -> Result<Response> {
        let abs = ctx.local_path.join(path);
        let data = tokio::fs::read(&abs).await.with_context(|| format!("reading {abs:?}"))?;
        let chunks = chunk_file(&data);
        let mut hashes = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            ctx.blocks
                .put(&chunk.hash, &chunk.data)
                .with_context(|| format!("persisting chunk {}", chunk.hash))?;
            hashes.push(chunk.hash);
        }
        Ok(Response::FileChunks {
            sync_id: ctx.sync_id.clone(),
            path: path.to_string(),
            hashes,
        })
    }

    async fn get_chunk_data(&self, ctx: &FolderContext, hash: &str) -> Result<Response> {
        if let Some(data) = ctx.blocks.get(hash)? {
            return Ok(Response::ChunkData {
                sync_id: ctx.sync_id.clone(),
                hash: hash.to_string(),
                bytes: data,
            });
        }

        // On-demand recovery: the chunk was evicted or never persisted
        // locally; re-chunk every tracked file until one reproduces it.
        for path in ctx.state.live_paths() {
            let abs = ctx.local_path.join(&path);
            let data = match tokio::fs::read(&abs).await {
                Ok(data) => data,
                Err(_) => continue,
            };
            let chunks = chunk_file(&data);
            if let Some(chunk) = chunks.iter().find(|c| c.hash == hash) {
                ctx.blocks.put(&chunk.hash, &chunk.data)?;
                return Ok(Response::ChunkData {
                    sync_id: ctx.sync_id.clone(),
                    hash: hash.to_string(),
                    bytes: chunk.data.clone(),
                });
            }
        }

        warn!(hash, "chunk not recoverable from any tracked file");
        anyhow::bail!("chunk {hash} not found")
    }

    async fn put_file_chunks(&self, ctx: &FolderContext, path: &str, hashes: Vec<String>, vc: VectorClock) -> Result<Response> {
        let missing: Vec<String> = hashes.iter().filter(|h| !ctx.blocks.has(h)).cloned().collect();
        if !missing.is_empty() {
            return Ok(Response::error(ctx.sync_id.clone(), missing_chunks_message(&missing)));
        }

        let mut buffer = Vec::new();
        for hash in &hashes {
            let data = ctx
                .blocks
                .get(hash)?
                .ok_or_else(|| anyhow::anyhow!("chunk {hash} vanished between presence check and read"))?;
            buffer.extend_from_slice(&data);
        }

        let abs = ctx.local_path.join(path);
        let key = ClockKey::new(ctx.folder_id.as_str(), ctx.sync_id.as_str(), path);
        let existing = ctx.clock.get(&key)?.unwrap_or_default();
        let merged = CausalClockManager::merge(&existing, &vc);

        fsync_tools::fs::replace_file(&abs, &buffer).with_context(|| format!("writing {abs:?}"))?;

        let meta = metadata_for(&abs, &buffer, merged.clone())?;
        ctx.clock.save(&key, merged)?;
        ctx.state.set_live(path, meta)?;

        Ok(Response::FileChunksAck {
            sync_id: ctx.sync_id.clone(),
            path: path.to_string(),
        })
    }

    async fn put_chunk_data(&self, ctx: &FolderContext, hash: &str, bytes: Vec<u8>) -> Result<Response> {
        ctx.blocks.put(hash, &bytes)?;
        Ok(Response::ChunkAck {
            sync_id: ctx.sync_id.clone(),
            hash: hash.to_string(),
        })
    }
}

impl Default for RequestHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RpcTransport for RequestHandler {
    async fn call(&self, request: Request) -> Result<Response> {
        Ok(self.handle_request(request).await)
    }
}

/// Builds the `FileMetadata` to persist after a successful write: hash of
/// the bytes actually on disk, size, and the filesystem's own mtime (the
/// wire protocol carries neither — peers converge on the writer's mtime).
fn metadata_for(abs: &Path, bytes: &[u8], vc: VectorClock) -> Result<FileMetadata> {
    let meta = std::fs::metadata(abs).with_context(|| format!("reading metadata for {abs:?}"))?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(FileMetadata {
        hash: fsync_tools::hash::sha256_hex(bytes),
        mtime,
        size: bytes.len() as u64,
        creation_date: None,
        is_directory: false,
        vector_clock: vc,
    })
}

/// Write-in-progress guard: a zero-length, just-modified
/// file might still be mid-write on the sender's side. Waits once for the
/// full stability window, then re-checks. Returns `false` if the file is
/// still zero-length and within the window after the wait.
async fn write_stable(path: &Path, window_secs: i64) -> Result<bool> {
    let meta = tokio::fs::metadata(path).await.with_context(|| format!("stat {path:?}"))?;
    if meta.len() != 0 {
        return Ok(true);
    }

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    if now_unix().saturating_sub(mtime) >= window_secs {
        // Zero-length but old: treat as a legitimately empty file.
        return Ok(true);
    }

    tokio::time::sleep(std::time::Duration::from_secs(window_secs.max(0) as u64)).await;

    let recheck = tokio::fs::metadata(path).await.with_context(|| format!("re-stat {path:?}"))?;
    Ok(recheck.len() != 0)
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(appdata: &Path, local_path: &Path, sync_id: &str) -> FolderContext {
        std::fs::create_dir_all(local_path).unwrap();
        FolderContext {
            folder_id: format!("folder-{sync_id}"),
            sync_id: sync_id.to_string(),
            local_path: local_path.to_path_buf(),
            local_peer_id: "peerA".to_string(),
            state: Arc::new(FileStateStore::open(appdata, sync_id).unwrap()),
            clock: Arc::new(CausalClockManager::new(appdata)),
            blocks: Arc::new(BlockStore::open(fsync_buildcfg::blocks_dir(appdata)).unwrap()),
        }
    }

    #[tokio::test]
    async fn put_then_get_full_file_roundtrips() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new();
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        let put = handler
            .handle_request(Request::PutFileData {
                sync_id: "DEMO".to_string(),
                path: "a.txt".to_string(),
                bytes: b"hello".to_vec(),
                vc: VectorClock::new().increment("p1"),
            })
            .await;
        assert!(matches!(put, Response::PutAck { .. }));

        let get = handler
            .handle_request(Request::GetFileData {
                sync_id: "DEMO".to_string(),
                path: "a.txt".to_string(),
            })
            .await;
        match get {
            Response::FileData { bytes, vc, .. } => {
                assert_eq!(bytes, b"hello");
                assert_eq!(vc.get("p1"), 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_mst_root_reflects_live_state() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new();
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        let empty_root = match handler.handle_request(Request::GetMst { sync_id: "DEMO".to_string() }).await {
            Response::MstRoot { root, .. } => root,
            other => panic!("unexpected response: {other:?}"),
        };

        handler
            .handle_request(Request::PutFileData {
                sync_id: "DEMO".to_string(),
                path: "a.txt".to_string(),
                bytes: b"content".to_vec(),
                vc: VectorClock::new().increment("p1"),
            })
            .await;

        let after_root = match handler.handle_request(Request::GetMst { sync_id: "DEMO".to_string() }).await {
            Response::MstRoot { root, .. } => root,
            other => panic!("unexpected response: {other:?}"),
        };

        assert_ne!(empty_root, after_root);
    }

    #[tokio::test]
    async fn delete_files_removes_from_disk_and_state() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new();
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        handler
            .handle_request(Request::PutFileData {
                sync_id: "DEMO".to_string(),
                path: "a.txt".to_string(),
                bytes: b"content".to_vec(),
                vc: VectorClock::new().increment("p1"),
            })
            .await;
        assert!(folder.path().join("a.txt").exists());

        let mut paths = HashMap::new();
        paths.insert("a.txt".to_string(), Some(VectorClock::new().increment("p2")));
        let resp = handler
            .handle_request(Request::DeleteFiles {
                sync_id: "DEMO".to_string(),
                paths,
            })
            .await;
        assert!(matches!(resp, Response::DeleteAck { .. }));
        assert!(!folder.path().join("a.txt").exists());

        let files = match handler.handle_request(Request::GetFiles { sync_id: "DEMO".to_string() }).await {
            Response::FilesV2 { states, .. } => states,
            other => panic!("unexpected response: {other:?}"),
        };
        assert!(files.get("a.txt").unwrap().is_deleted());
    }

    #[tokio::test]
    async fn put_file_chunks_reports_missing_then_commits() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new();
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let chunks = chunk_file(&data);
        let hashes: Vec<String> = chunks.iter().map(|c| c.hash.clone()).collect();

        let first = handler
            .handle_request(Request::PutFileChunks {
                sync_id: "DEMO".to_string(),
                path: "big.bin".to_string(),
                hashes: hashes.clone(),
                vc: VectorClock::new().increment("p1"),
            })
            .await;
        let missing = match first {
            Response::Error { error, .. } => error.missing_hashes().expect("missing-chunks prefix"),
            other => panic!("expected missing-chunks error, got {other:?}"),
        };
        assert_eq!(missing.len(), hashes.len());

        for chunk in &chunks {
            let resp = handler
                .handle_request(Request::PutChunkData {
                    sync_id: "DEMO".to_string(),
                    hash: chunk.hash.clone(),
                    bytes: chunk.data.clone(),
                })
                .await;
            assert!(matches!(resp, Response::ChunkAck { .. }));
        }

        let commit = handler
            .handle_request(Request::PutFileChunks {
                sync_id: "DEMO".to_string(),
                path: "big.bin".to_string(),
                hashes,
                vc: VectorClock::new().increment("p1"),
            })
            .await;
        assert!(matches!(commit, Response::FileChunksAck { .. }));
        assert_eq!(std::fs::read(folder.path().join("big.bin")).unwrap(), data);
    }

    #[tokio::test]
    async fn get_chunk_data_recovers_by_rescanning_folder() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new();
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(folder.path().join("big.bin"), &data).unwrap();
        handler
            .handle_request(Request::PutFileData {
                sync_id: "DEMO".to_string(),
                path: "big.bin".to_string(),
                bytes: data.clone(),
                vc: VectorClock::new().increment("p1"),
            })
            .await;

        let chunks = chunk_file(&data);
        let target = &chunks[chunks.len() / 2].hash;

        let resp = handler
            .handle_request(Request::GetChunkData {
                sync_id: "DEMO".to_string(),
                hash: target.clone(),
            })
            .await;
        match resp {
            Response::ChunkData { hash, bytes, .. } => {
                assert_eq!(&hash, target);
                assert_eq!(bytes, chunks[chunks.len() / 2].data);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_file_data_rejects_file_stuck_empty_through_stability_window() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new().with_write_stability_window(1);
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        std::fs::write(folder.path().join("empty.txt"), b"").unwrap();
        let resp = handler
            .handle_request(Request::GetFileData {
                sync_id: "DEMO".to_string(),
                path: "empty.txt".to_string(),
            })
            .await;
        match resp {
            Response::Error { error, .. } => assert!(error.message.contains("in progress")),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_file_data_returns_nonempty_file_without_waiting() {
        let appdata = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let handler = RequestHandler::new().with_write_stability_window(60);
        handler.register(context(appdata.path(), folder.path(), "DEMO"));

        std::fs::write(folder.path().join("a.txt"), b"content").unwrap();
        let resp = handler
            .handle_request(Request::GetFileData {
                sync_id: "DEMO".to_string(),
                path: "a.txt".to_string(),
            })
            .await;
        match resp {
            Response::FileData { bytes, .. } => assert_eq!(bytes, b"content"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_sync_id_yields_error() {
        let handler = RequestHandler::new();
        let resp = handler
            .handle_request(Request::GetMst { sync_id: "NOPE".to_string() })
            .await;
        assert!(matches!(resp, Response::Error { .. }));
    }
}
