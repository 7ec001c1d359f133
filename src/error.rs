use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cocodump operations.
#[derive(Debug, Error)]
pub enum CocodumpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a .json file, got: {path}")]
    UnexpectedExtension { path: PathBuf },

    #[error("Source directory not found: {path}")]
    MissingDirectory { path: PathBuf },

    #[error("Destination already exists (pass --overwrite to replace): {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Cannot merge \"{collection}\" records with id={id}: {left} != {right}")]
    Conflict {
        collection: &'static str,
        id: String,
        left: String,
        right: String,
    },

    #[error("Cannot merge datasets of different kinds: {left} != {right}")]
    KindMismatch { left: String, right: String },

    #[error("Not a supported dataset kind: {0}")]
    UnsupportedKind(String),

    #[error("Unknown {collection} id in crop tree: {id}")]
    UnknownIdentifier {
        collection: &'static str,
        id: String,
    },

    #[error("Empty file name for image id={id}")]
    EmptyFileName { id: String },

    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No input dataset, pass at least one of --in-json-file / --in-json-tree")]
    NoInputDataset,
}
