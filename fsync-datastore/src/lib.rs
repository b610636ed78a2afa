//! Content-defined chunking, the content-addressed block store, and the
//! Merkle state index.

pub mod block_store;
pub mod chunker;
pub mod data_blob;
mod gear_table;
pub mod merkle;

pub use block_store::BlockStore;
pub use chunker::Chunker;
pub use data_blob::{chunk_file, Chunk};
pub use merkle::MerkleIndex;
