use std::path::Path;

use thiserror::Error;

const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Compression error: {0}")]
    Compression(std::io::Error),
}

/// Write `data` to `path`, creating the parent directories when needed.
pub async fn save_to_file(data: &[u8], path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, data).await?;
    Ok(())
}

pub async fn load_from_file(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    Ok(tokio::fs::read(path).await?)
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    zstd::encode_all(data, COMPRESSION_LEVEL).map_err(PersistenceError::Compression)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    zstd::decode_all(data).map_err(PersistenceError::Compression)
}
