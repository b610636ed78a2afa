//! Transfer Layer: per-file full vs. chunked upload and download over an
//! [`RpcTransport`], with retries, an OOM guard on chunked-transfer
//! fallback, and bounded chunk concurrency. The chunked path always
//! follows the same shape: chunk locally, ask the remote what it's
//! missing, stream only that.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use fsync_api_types::{RelPath, SafetyError, TransientError, VectorClock};
use fsync_datastore::{chunk_file, BlockStore};
use fsync_protocol::{Request, Response, RpcTransport};
use tracing::warn;

/// Outcome of a completed transfer: the values the caller should persist
/// into the File State Store. Neither `getFileData` nor the chunk RPCs
/// carry `mtime`/`creationDate`; the caller already holds those from
/// discovery metadata and sets them on the written file itself so both
/// peers converge on the writer's mtime.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub bytes_transferred: u64,
    pub vc: VectorClock,
}

/// Linearly scales the per-RPC timeout between [`fsync_buildcfg::RPC_TIMEOUT_MIN_SECS`]
/// and [`fsync_buildcfg::RPC_TIMEOUT_MAX_SECS`] by how much payload the
/// request carries outbound, relative to a full chunk transfer threshold's
/// worth of bytes. Requests with no known payload (control-plane calls, or
/// a `get*` request whose response size isn't known ahead of time) get the
/// minimum.
fn request_timeout_secs(request: &Request) -> u64 {
    let Some(len) = request.payload_len() else {
        return fsync_buildcfg::RPC_TIMEOUT_MIN_SECS;
    };
    let span = fsync_buildcfg::RPC_TIMEOUT_MAX_SECS - fsync_buildcfg::RPC_TIMEOUT_MIN_SECS;
    let ratio = (len as f64 / fsync_buildcfg::CHUNK_TRANSFER_THRESHOLD as f64).min(1.0);
    fsync_buildcfg::RPC_TIMEOUT_MIN_SECS + (span as f64 * ratio) as u64
}

pub struct TransferClient<T: RpcTransport> {
    transport: T,
    blocks: BlockStore,
}

impl<T: RpcTransport> TransferClient<T> {
    pub fn new(transport: T, blocks: BlockStore) -> Self {
        Self { transport, blocks }
    }

    /// Issues one RPC, retrying transient failures up to
    /// [`fsync_buildcfg::MAX_RETRIES`] times. Each attempt is bounded by a
    /// per-request timeout scaled between [`fsync_buildcfg::RPC_TIMEOUT_MIN_SECS`]
    /// (control-plane calls, or a payload-carrying call with no bytes) and
    /// [`fsync_buildcfg::RPC_TIMEOUT_MAX_SECS`] (a full chunk/file's worth
    /// of payload), so a call over a slow link isn't abandoned too early
    /// while a genuinely stuck peer is still bounded. A timed-out attempt
    /// is treated the same as any other transient failure and retried.
    async fn call_with_retries(&self, request: Request) -> Result<Response> {
        let per_request_timeout = Duration::from_secs(request_timeout_secs(&request));
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(per_request_timeout, self.transport.call(request.clone())).await;
            match outcome {
                Ok(Ok(resp)) => return Ok(resp),
                Ok(Err(e)) if attempt >= fsync_buildcfg::MAX_RETRIES => {
                    return Err(anyhow::Error::new(TransientError::Timeout(attempt))
                        .context(e.to_string()));
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "transient RPC failure, retrying");
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
                Err(_) if attempt >= fsync_buildcfg::MAX_RETRIES => {
                    return Err(TransientError::Timeout(attempt).into());
                }
                Err(_) => {
                    warn!(attempt, "RPC timed out, retrying");
                }
            }
        }
    }

    /// Uploads `local_path` (already known to be `size` bytes) to `path`
    /// in `sync_id`, merging `vc` on the remote side. Chooses full vs.
    /// chunked transfer based on the configured size threshold.
    pub async fn upload(
        &self,
        sync_id: &str,
        path: &RelPath,
        local_path: &Path,
        size: u64,
        vc: VectorClock,
    ) -> Result<TransferOutcome> {
        if size <= fsync_buildcfg::CHUNK_TRANSFER_THRESHOLD {
            return self.upload_full(sync_id, path, local_path, vc).await;
        }

        match self.upload_chunked(sync_id, path, local_path, size, vc.clone()).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if size > fsync_buildcfg::OOM_GUARD_LIMIT {
                    return Err(anyhow::Error::new(SafetyError::OomGuard {
                        path: path.clone(),
                        size,
                        limit: fsync_buildcfg::OOM_GUARD_LIMIT,
                    })
                    .context(e.to_string()));
                }
                warn!(path, error = %e, "chunked upload failed, falling back to full upload");
                self.upload_full(sync_id, path, local_path, vc).await
            }
        }
    }

    async fn upload_full(&self, sync_id: &str, path: &RelPath, local_path: &Path, vc: VectorClock) -> Result<TransferOutcome> {
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading {local_path:?} for full upload"))?;
        let len = bytes.len() as u64;
        let response = self
            .call_with_retries(Request::PutFileData {
                sync_id: sync_id.to_string(),
                path: path.clone(),
                bytes,
                vc: vc.clone(),
            })
            .await?;
        match response {
            Response::PutAck { .. } => Ok(TransferOutcome {
                bytes_transferred: len,
                vc,
            }),
            Response::Error { error, .. } => bail!("putFileData rejected: {error}"),
            other => bail!("unexpected response to putFileData: {other:?}"),
        }
    }

    async fn upload_chunked(
        &self,
        sync_id: &str,
        path: &RelPath,
        local_path: &Path,
        size: u64,
        vc: VectorClock,
    ) -> Result<TransferOutcome> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading {local_path:?} for chunked upload"))?;
        let chunks = chunk_file(&data);
        for chunk in &chunks {
            self.blocks
                .put(&chunk.hash, &chunk.data)
                .with_context(|| format!("persisting local chunk {}", chunk.hash))?;
        }
        let hashes: Vec<String> = chunks.iter().map(|c| c.hash.clone()).collect();

        let response = self
            .call_with_retries(Request::PutFileChunks {
                sync_id: sync_id.to_string(),
                path: path.clone(),
                hashes: hashes.clone(),
                vc: vc.clone(),
            })
            .await?;

        let missing = match response {
            Response::FileChunksAck { .. } => Vec::new(),
            Response::Error { error, .. } => error
                .missing_hashes()
                .ok_or_else(|| anyhow::anyhow!("putFileChunks error without missing-chunks list: {error}"))?,
            other => bail!("unexpected response to putFileChunks: {other:?}"),
        };

        if !missing.is_empty() {
            let by_hash: std::collections::HashMap<&str, &fsync_datastore::Chunk> =
                chunks.iter().map(|c| (c.hash.as_str(), c)).collect();

            let bounded = fsync_tools::concurrency::Bounded::new(fsync_buildcfg::MAX_CONCURRENT_CHUNK_UPLOADS);
            let uploads: Vec<_> = missing
                .iter()
                .filter_map(|h| by_hash.get(h.as_str()).map(|c| (*c).clone()))
                .collect();
            let results = bounded
                .run_all(uploads, |chunk| async move {
                    self.call_with_retries(Request::PutChunkData {
                        sync_id: sync_id.to_string(),
                        hash: chunk.hash.clone(),
                        bytes: chunk.data.clone(),
                    })
                    .await
                })
                .await;
            for result in results {
                match result? {
                    Response::ChunkAck { .. } => {}
                    Response::Error { error, .. } => bail!("putChunkData rejected: {error}"),
                    other => bail!("unexpected response to putChunkData: {other:?}"),
                }
            }

            let commit = self
                .call_with_retries(Request::PutFileChunks {
                    sync_id: sync_id.to_string(),
                    path: path.clone(),
                    hashes,
                    vc: vc.clone(),
                })
                .await?;
            match commit {
                Response::FileChunksAck { .. } => {}
                Response::Error { error, .. } => bail!("putFileChunks still missing chunks after upload: {error}"),
                other => bail!("unexpected response to putFileChunks commit: {other:?}"),
            }
        }

        Ok(TransferOutcome {
            bytes_transferred: size,
            vc,
        })
    }

    /// Downloads `path` (known remote size `remote_size`) from `sync_id`
    /// into `dest_path`. `before_write` is invoked immediately before the
    /// local file is written, so the caller can set the sync-write
    /// cooldown first.
    pub async fn download(
        &self,
        sync_id: &str,
        path: &RelPath,
        dest_path: &Path,
        remote_size: u64,
        local_vc: &VectorClock,
        before_write: impl FnOnce(),
    ) -> Result<TransferOutcome> {
        if remote_size <= fsync_buildcfg::CHUNK_TRANSFER_THRESHOLD {
            return self.download_full(sync_id, path, dest_path, local_vc, before_write).await;
        }

        match self
            .download_chunked(sync_id, path, dest_path, local_vc, &before_write)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if remote_size > fsync_buildcfg::OOM_GUARD_LIMIT {
                    return Err(anyhow::Error::new(SafetyError::OomGuard {
                        path: path.clone(),
                        size: remote_size,
                        limit: fsync_buildcfg::OOM_GUARD_LIMIT,
                    })
                    .context(e.to_string()));
                }
                warn!(path, error = %e, "chunked download failed, falling back to full download");
                self.download_full(sync_id, path, dest_path, local_vc, before_write).await
            }
        }
    }

    async fn download_full(
        &self,
        sync_id: &str,
        path: &RelPath,
        dest_path: &Path,
        local_vc: &VectorClock,
        before_write: impl FnOnce(),
    ) -> Result<TransferOutcome> {
        let response = self
            .call_with_retries(Request::GetFileData {
                sync_id: sync_id.to_string(),
                path: path.clone(),
            })
            .await?;
        let (bytes, remote_vc) = match response {
            Response::FileData { bytes, vc, .. } => (bytes, vc),
            Response::Error { error, .. } => bail!("getFileData rejected: {error}"),
            other => bail!("unexpected response to getFileData: {other:?}"),
        };

        before_write();
        let len = bytes.len() as u64;
        fsync_tools::fs::replace_file(dest_path, &bytes).with_context(|| format!("writing {dest_path:?}"))?;

        Ok(TransferOutcome {
            bytes_transferred: len,
            vc: fsync_clock::CausalClockManager::merge(local_vc, &remote_vc),
        })
    }

    async fn download_chunked(
        &self,
        sync_id: &str,
        path: &RelPath,
        dest_path: &Path,
        local_vc: &VectorClock,
        before_write: &impl FnOnce(),
    ) -> Result<TransferOutcome> {
        let response = self
            .call_with_retries(Request::GetFileChunks {
                sync_id: sync_id.to_string(),
                path: path.clone(),
            })
            .await?;
        let hashes = match response {
            Response::FileChunks { hashes, .. } => hashes,
            Response::Error { error, .. } => bail!("getFileChunks rejected: {error}"),
            other => bail!("unexpected response to getFileChunks: {other:?}"),
        };

        let to_fetch: Vec<String> = hashes.iter().filter(|h| !self.blocks.has(h)).cloned().collect();

        let bounded = fsync_tools::concurrency::Bounded::new(fsync_buildcfg::MAX_CONCURRENT_CHUNK_DOWNLOADS);
        let fetched = bounded
            .run_all(to_fetch, |hash| async move {
                let response = self
                    .call_with_retries(Request::GetChunkData {
                        sync_id: sync_id.to_string(),
                        hash: hash.clone(),
                    })
                    .await?;
                match response {
                    Response::ChunkData { bytes, .. } => Ok::<_, anyhow::Error>((hash, bytes)),
                    Response::Error { error, .. } => bail!("getChunkData rejected: {error}"),
                    other => bail!("unexpected response to getChunkData: {other:?}"),
                }
            })
            .await;

        for result in fetched {
            let (hash, bytes) = result?;
            self.blocks.put(&hash, &bytes).with_context(|| format!("persisting downloaded chunk {hash}"))?;
        }

        let mut buffer = Vec::new();
        for hash in &hashes {
            let data = self
                .blocks
                .get(hash)
                .with_context(|| format!("reading chunk {hash} for reconstruction"))?
                .ok_or_else(|| anyhow::anyhow!("chunk {hash} missing from block store after download"))?;
            buffer.extend_from_slice(&data);
        }

        before_write();
        let len = buffer.len() as u64;
        fsync_tools::fs::replace_file(dest_path, &buffer).with_context(|| format!("writing {dest_path:?}"))?;

        // The chunk RPCs carry no VC; the caller merges in the remote VC
        // it already holds from discovery metadata before persisting state.
        Ok(TransferOutcome {
            bytes_transferred: len,
            vc: local_vc.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeServer {
        blocks: BlockStore,
        files: Mutex<HashMap<String, (Vec<u8>, VectorClock)>>,
    }

    #[async_trait]
    impl RpcTransport for FakeServer {
        async fn call(&self, request: Request) -> Result<Response> {
            match request {
                Request::PutFileData { sync_id, path, bytes, vc } => {
                    self.files.lock().unwrap().insert(path.clone(), (bytes, vc));
                    Ok(Response::PutAck { sync_id, path })
                }
                Request::GetFileData { sync_id, path } => {
                    let files = self.files.lock().unwrap();
                    let (bytes, vc) = files.get(&path).cloned().expect("file present");
                    Ok(Response::FileData { sync_id, path, bytes, vc })
                }
                Request::PutFileChunks { sync_id, path, hashes, vc } => {
                    let missing: Vec<String> = hashes.iter().filter(|h| !self.blocks.has(h)).cloned().collect();
                    if missing.is_empty() {
                        // reconstruct into `files` from the block store
                        let mut buf = Vec::new();
                        for h in &hashes {
                            buf.extend_from_slice(&self.blocks.get(h).unwrap().unwrap());
                        }
                        self.files.lock().unwrap().insert(path.clone(), (buf, vc));
                        Ok(Response::FileChunksAck { sync_id, path })
                    } else {
                        Ok(Response::error(sync_id, fsync_protocol::missing_chunks_message(&missing)))
                    }
                }
                Request::PutChunkData { sync_id, hash, bytes } => {
                    self.blocks.put(&hash, &bytes).unwrap();
                    Ok(Response::ChunkAck { sync_id, hash })
                }
                Request::GetFileChunks { sync_id, path } => {
                    let files = self.files.lock().unwrap();
                    let (bytes, _) = files.get(&path).cloned().expect("file present");
                    let hashes = fsync_datastore::chunk_file(&bytes).into_iter().map(|c| c.hash).collect();
                    Ok(Response::FileChunks { sync_id, path, hashes })
                }
                Request::GetChunkData { sync_id, hash } => {
                    let data = self.blocks.get(&hash).unwrap().expect("chunk present");
                    Ok(Response::ChunkData { sync_id, hash, bytes: data })
                }
                other => panic!("unhandled fake request: {other:?}"),
            }
        }
    }

    fn peer_vc(peer: &str) -> VectorClock {
        VectorClock::new().increment(peer)
    }

    #[tokio::test]
    async fn full_upload_then_download_roundtrips() {
        let server_blocks = BlockStore::open(tempfile::tempdir().unwrap().into_path()).unwrap();
        let server = FakeServer {
            blocks: server_blocks,
            files: Mutex::new(HashMap::new()),
        };
        let client_blocks = BlockStore::open(tempfile::tempdir().unwrap().into_path()).unwrap();
        let client = TransferClient::new(server, client_blocks);

        let local_dir = tempfile::tempdir().unwrap();
        let src = local_dir.path().join("a.txt");
        tokio::fs::write(&src, b"hello world").await.unwrap();

        let vc = peer_vc("p1");
        let outcome = client
            .upload("DEMO", &"a.txt".to_string(), &src, 11, vc.clone())
            .await
            .unwrap();
        assert_eq!(outcome.bytes_transferred, 11);

        let dest = local_dir.path().join("b.txt");
        let outcome = client
            .download("DEMO", &"a.txt".to_string(), &dest, 11, &VectorClock::new(), || {})
            .await
            .unwrap();
        assert_eq!(outcome.bytes_transferred, 11);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn chunked_upload_then_download_roundtrips_large_file() {
        let server_blocks = BlockStore::open(tempfile::tempdir().unwrap().into_path()).unwrap();
        let server = FakeServer {
            blocks: server_blocks,
            files: Mutex::new(HashMap::new()),
        };
        let client_blocks = BlockStore::open(tempfile::tempdir().unwrap().into_path()).unwrap();
        let client = TransferClient::new(server, client_blocks);

        let local_dir = tempfile::tempdir().unwrap();
        let src = local_dir.path().join("big.bin");
        let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&src, &data).await.unwrap();

        let vc = peer_vc("p1");
        let outcome = client
            .upload("DEMO", &"big.bin".to_string(), &src, data.len() as u64, vc)
            .await
            .unwrap();
        assert_eq!(outcome.bytes_transferred, data.len() as u64);

        let dest = local_dir.path().join("big_copy.bin");
        let outcome = client
            .download(
                "DEMO",
                &"big.bin".to_string(),
                &dest,
                data.len() as u64,
                &VectorClock::new(),
                || {},
            )
            .await
            .unwrap();
        assert_eq!(outcome.bytes_transferred, data.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
    }

    struct StalledTransport;

    #[async_trait]
    impl RpcTransport for StalledTransport {
        async fn call(&self, _request: Request) -> Result<Response> {
            // never resolves within the stability window; the virtual
            // clock below lets this run instantly instead of for real
            // minutes.
            tokio::time::sleep(Duration::from_secs(fsync_buildcfg::STALE_TRANSFER_TIMEOUT_SECS as u64 * 2)).await;
            unreachable!("call_with_retries should have timed out before this resolves");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_rpc_is_abandoned_after_max_retries() {
        let client_blocks = BlockStore::open(tempfile::tempdir().unwrap().into_path()).unwrap();
        let client = TransferClient::new(StalledTransport, client_blocks);

        let local_dir = tempfile::tempdir().unwrap();
        let src = local_dir.path().join("a.txt");
        tokio::fs::write(&src, b"hello").await.unwrap();

        let err = client
            .upload("DEMO", &"a.txt".to_string(), &src, 5, peer_vc("p1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out") || err.downcast_ref::<TransientError>().is_some());
    }
}
