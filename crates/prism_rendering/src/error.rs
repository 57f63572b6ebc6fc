//! # Rendering Error Types
//!
//! All errors that can occur in the rendering core.
//!
//! Capacity overflow during packing is NOT an error: it is reported through
//! [`PackOutcome`](crate::culling::PackOutcome) and the frame continues.

use thiserror::Error;

/// Errors raised by a [`GraphicsDevice`](crate::device::GraphicsDevice).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Buffer creation was requested with zero bytes.
    #[error("cannot create a zero-sized {kind} buffer")]
    ZeroSized {
        /// Kind of buffer that was requested.
        kind: &'static str,
    },

    /// The buffer id does not name a live buffer.
    #[error("unknown buffer: {0}")]
    UnknownBuffer(u32),

    /// The buffer is already inside a map/unmap window.
    #[error("buffer {0} is already mapped")]
    AlreadyMapped(u32),

    /// A mapped write was issued outside a map/unmap window.
    #[error("buffer {0} is not mapped")]
    NotMapped(u32),

    /// The buffer was not created CPU-writable.
    #[error("buffer {0} is not CPU-writable")]
    NotWritable(u32),

    /// A write would run past the end of the buffer.
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfRange {
        /// Byte offset of the write.
        offset: u64,
        /// Length of the write in bytes.
        len: u64,
        /// Size of the buffer in bytes.
        size: u64,
    },

    /// The backend refused to create the resource.
    #[error("resource creation failed: {0}")]
    CreationFailed(String),
}

/// Errors raised by meshes, registries and the draw coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A device operation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A mesh with this name is already registered.
    #[error("mesh already exists: {0}")]
    MeshExists(String),

    /// No mesh is registered under this name.
    #[error("mesh not found: {0}")]
    MeshNotFound(String),

    /// The instance handle no longer refers to a live instance.
    #[error("instance handle is no longer valid")]
    InvalidHandle,
}

/// Errors raised while loading a [`RenderConfig`](crate::config::RenderConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but holds unusable values.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
