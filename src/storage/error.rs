use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Sled error: {0}")]
    SledError(String),

    #[error("Codec error: {0}")]
    CodecError(String),

    #[error("Mutation not found: {0}")]
    NotFound(String),
}
