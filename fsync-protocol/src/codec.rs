//! Length-prefixed framing around JSON-encoded [`Request`]/[`Response`]
//! values, for use over a `tokio::net::TcpStream`.

use bytes::{Buf, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::{Request, Response};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wraps [`LengthDelimitedCodec`] to encode/decode JSON-serializable
/// values frame-by-frame.
pub struct JsonFramed<T> {
    inner: LengthDelimitedCodec,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for JsonFramed<T> {
    fn default() -> Self {
        Self {
            inner: LengthDelimitedCodec::new(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonFramed<T> {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        self.inner
            .encode(Bytes::from(payload), dst)
            .map_err(CodecError::Io)
    }
}

impl<T: DeserializeOwned> Decoder for JsonFramed<T> {
    type Item = T;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>, Self::Error> {
        match self.inner.decode(src)? {
            Some(mut frame) => {
                let value = serde_json::from_slice(frame.copy_to_bytes(frame.len()).as_ref())?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Frame codec for request bodies (client -> server direction).
pub type RequestCodec = JsonFramed<Request>;
/// Frame codec for response bodies (server -> client direction).
pub type ResponseCodec = JsonFramed<Response>;
