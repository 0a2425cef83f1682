//! Error types for vista.

/// Result type alias for vista operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for vista.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Data directory could not be determined.
    #[error("could not determine data directory for this platform")]
    DataDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A model artifact file does not exist and cannot be fetched.
    #[error("model file does not exist: {path}")]
    ModelFileNotFound {
        /// Path to the missing model file.
        path: std::path::PathBuf,
    },

    /// Failed to read a category file.
    #[error("failed to read category file '{path}'")]
    CategoryRead {
        /// Path to the category file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read the artist database.
    #[error("failed to read artist database '{path}'")]
    ArtistsRead {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Failed to open or decode an input image.
    #[error("failed to open image '{path}'")]
    ImageOpen {
        /// Path to the image.
        path: std::path::PathBuf,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Failed to write an output image.
    #[error("failed to write image '{path}'")]
    ImageWrite {
        /// Path to the output image.
        path: std::path::PathBuf,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// No valid image files were found among the inputs.
    #[error("no valid image files found in the provided paths")]
    NoValidImageFiles,

    /// Image dimensions are unusable for the requested operation.
    #[error("invalid image size {width}x{height}: {reason}")]
    InvalidImageSize {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// Why the size is rejected.
        reason: String,
    },

    /// Requested execution provider is not available.
    #[error("{provider} provider not available (available: {available})")]
    ProviderUnavailable {
        /// Requested provider name.
        provider: String,
        /// Comma separated list of available providers.
        available: String,
    },

    /// Failed to build an ONNX Runtime session.
    #[error("failed to load model '{name}': {reason}")]
    ModelLoad {
        /// Logical model name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// Inference failed.
    #[error("inference failed in '{name}': {reason}")]
    Inference {
        /// Logical model name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// Model output had an unexpected shape.
    #[error("unexpected output shape from '{name}': {shape:?}")]
    UnexpectedShape {
        /// Logical model name.
        name: String,
        /// Shape returned by the model.
        shape: Vec<usize>,
    },

    /// Failed to load or run a tokenizer.
    #[error("tokenizer error: {reason}")]
    Tokenizer {
        /// Failure description.
        reason: String,
    },

    /// Failed to read the LDSR model configuration.
    #[error("failed to read LDSR config '{path}'")]
    LdsrConfigRead {
        /// Path to the YAML file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the LDSR model configuration.
    #[error("failed to parse LDSR config '{path}'")]
    LdsrConfigParse {
        /// Path to the YAML file.
        path: std::path::PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid diffusion sampling parameters.
    #[error("invalid sampling parameters: {reason}")]
    InvalidSampling {
        /// Failure description.
        reason: String,
    },

    /// Failed to download a file.
    #[error("failed to download from '{url}'")]
    DownloadFailed {
        /// URL being downloaded.
        url: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Downloaded file does not match its expected checksum.
    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Path to the downloaded file.
        path: std::path::PathBuf,
        /// Expected SHA-256 hex digest.
        expected: String,
        /// Actual SHA-256 hex digest.
        actual: String,
    },

    /// Failed to serialize JSON output.
    #[error("failed to serialize JSON output")]
    JsonSerialize {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Internal error (unexpected state).
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Build an [`Error::Inference`] from any displayable error.
    pub fn inference(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::Inference {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build an [`Error::ModelLoad`] from any displayable error.
    pub fn model_load(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::ModelLoad {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
