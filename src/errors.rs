//! Error types for the device boundary and the filesystem boundary.
//!
//! One `thiserror` enum per layer seam, each carrying just enough context
//! to log and to decide a return value, never a generic `Box<dyn Error>`
//! once we're inside our own layers.

use thiserror::Error;

/// An error returned by the MTP driver boundary (§4.8, §7).
///
/// The driver's error stack is dumped and cleared by the caller immediately
/// after a failing call (see `DeviceSession::drain_error_stack`); this type
/// only carries what's needed to decide which cache to leave dirty and what
/// to log.
#[derive(Debug, Error, Clone)]
#[error("MTP device error (code {code}): {message}")]
pub struct DeviceError {
    pub code: i32,
    pub message: String,
}

impl DeviceError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Errors surfaced at the FUSE operation boundary (§7).
///
/// Every `FSOps` handler ends by converting its `Result<_, FsError>` into a
/// `fuser` reply; `to_errno` is the single place that conversion happens, so
/// no handler hand-rolls an errno mapping.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("object already exists")]
    AlreadyExists,

    #[error("directory not empty, or rename target is a file")]
    NotEmpty,

    #[error("operation not permitted on this path")]
    PermissionDenied,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl FsError {
    /// Negated `errno` value, as every `FSOps` handler must return per spec.md §4.7/§7.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::PermissionDenied => libc::EPERM,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            // spec.md §7: "return the driver's code unchanged (non-zero)". A positive
            // `code` is a real errno magnitude from the driver and is threaded through
            // as-is; callers that only have a sentinel (no specific errno to report)
            // use a non-positive placeholder, which falls back to EIO.
            FsError::Device(err) => if err.code > 0 { err.code } else { libc::EIO },
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
