use thiserror::Error;

/// Primary error type for spoolq operations.
///
/// One variant per status kind the engine can report. Variants carry the
/// context a caller needs to act (queue name, offending position) and map
/// onto the numeric [`StatusCode`] set for hosts that speak status codes.
#[derive(Error, Debug)]
pub enum QueueError {
    /// An argument failed validation before any filesystem work started.
    #[error("invalid argument: {detail}")]
    InvalidArg { detail: String },

    /// The handle does not name a live row in the handle table.
    ///
    /// Raised for handles that were never issued, were already closed, or
    /// whose table slot has since been reassigned (stale generation).
    #[error("invalid queue handle")]
    InvalidHandle,

    /// A positional seek asked for an entry outside the live range.
    #[error("seek position {position} out of range ({live} live entries)")]
    InvalidSeek { position: u8, live: u8 },

    /// Create was asked to make a queue that already exists.
    #[error("queue already exists: '{name}'")]
    QueueExists { name: String },

    /// No queue directory with this name exists.
    #[error("queue not found: '{name}'")]
    QueueMissing { name: String },

    /// The queue is already open in this process with different access
    /// parameters.
    #[error("queue '{name}' is already open with different access parameters")]
    QueueOpened { name: String },

    /// The operation needs a lock file that is not present — the queue is
    /// not open (anymore) for the required kind of access.
    #[error("queue '{name}' is not open for this operation")]
    QueueClosed { name: String },

    /// Reserved: enqueue on a full queue evicts the oldest entry instead of
    /// failing, so the engine never raises this today.
    #[error("queue is full")]
    QueueFull,

    /// The queue has no live entries.
    #[error("queue is empty")]
    QueueEmpty,

    /// Another opener (this process or another) holds a conflicting lock.
    /// Retrying after the other side closes may succeed.
    #[error("queue '{name}' is busy")]
    QueueBusy { name: String },

    /// A mutating operation was attempted through a read-only handle.
    #[error("queue is open read-only")]
    ReadOnly,

    /// A reading operation was attempted through a write-only handle.
    #[error("queue is open write-only")]
    WriteOnly,

    /// Seek on a queue created without the random-access flag.
    #[error("queue was created without random access")]
    NotSeekable,

    /// A filesystem port call failed. Best-effort cleanup has already run.
    #[error("filesystem access failed: {0}")]
    FsAccess(#[from] std::io::Error),

    /// Every row of the handle table is in use.
    #[error("no free handle slots")]
    HandleNotAvail,
}

/// Numeric status codes for hosts that consume the engine through a
/// status-code interface (the embedded deployments this engine grew up in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// Successful result.
    Ok = 0,
    /// Argument validation failed.
    InvalidArg = 1,
    /// Handle not found or stale.
    InvalidHandle = 2,
    /// Seek position outside the live range.
    InvalidSeek = 3,
    /// Queue already exists.
    QueueExists = 4,
    /// Queue directory absent.
    QueueMissing = 5,
    /// Already open with different access parameters.
    QueueOpened = 6,
    /// Required lock file absent.
    QueueClosed = 7,
    /// Reserved; never raised (enqueue evicts).
    QueueIsFull = 8,
    /// No live entries.
    QueueIsEmpty = 9,
    /// Conflicting lock held.
    QueueIsBusy = 10,
    /// Write attempted on read-only handle.
    QueueReadOnly = 11,
    /// Read attempted on write-only handle.
    QueueWriteOnly = 12,
    /// Random access not enabled at creation.
    QueueNotSeekable = 13,
    /// Filesystem port failure.
    FsAccessFail = 14,
    /// Handle table exhausted.
    HandleNotAvail = 15,
}

impl QueueError {
    /// Map this error to its numeric status code.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArg { .. } => StatusCode::InvalidArg,
            Self::InvalidHandle => StatusCode::InvalidHandle,
            Self::InvalidSeek { .. } => StatusCode::InvalidSeek,
            Self::QueueExists { .. } => StatusCode::QueueExists,
            Self::QueueMissing { .. } => StatusCode::QueueMissing,
            Self::QueueOpened { .. } => StatusCode::QueueOpened,
            Self::QueueClosed { .. } => StatusCode::QueueClosed,
            Self::QueueFull => StatusCode::QueueIsFull,
            Self::QueueEmpty => StatusCode::QueueIsEmpty,
            Self::QueueBusy { .. } => StatusCode::QueueIsBusy,
            Self::ReadOnly => StatusCode::QueueReadOnly,
            Self::WriteOnly => StatusCode::QueueWriteOnly,
            Self::NotSeekable => StatusCode::QueueNotSeekable,
            Self::FsAccess(_) => StatusCode::FsAccessFail,
            Self::HandleNotAvail => StatusCode::HandleNotAvail,
        }
    }

    /// Whether this is a transient error that may succeed on retry.
    ///
    /// `QueueBusy` is the explicit "retry after the other opener closes"
    /// signal of the lock protocol.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::QueueBusy { .. })
    }

    /// Create an `InvalidArg` with a detail message.
    pub fn invalid_arg(detail: impl Into<String>) -> Self {
        Self::InvalidArg {
            detail: detail.into(),
        }
    }

    /// Create a `QueueBusy` for the named queue.
    pub fn busy(name: impl Into<String>) -> Self {
        Self::QueueBusy { name: name.into() }
    }

    /// Create a `QueueMissing` for the named queue.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::QueueMissing { name: name.into() }
    }

    /// Create a `QueueClosed` for the named queue.
    pub fn closed(name: impl Into<String>) -> Self {
        Self::QueueClosed { name: name.into() }
    }

    /// A filesystem-level inconsistency (corrupt header, LUT slot naming a
    /// payload that should exist, ...) surfaced as `FsAccess`.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::FsAccess(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            detail.into(),
        ))
    }
}

/// Result type alias using `QueueError`.
pub type Result<T> = std::result::Result<T, QueueError>;
