//! Compile-time limits of the on-disk format and the process-local engine.

/// Maximum byte length of a queue name (the queue's directory name).
pub const MAX_NAME_LEN: usize = 31;

/// Width of one LUT slot: the payload reference is rendered as this many
/// decimal digits, so references cycle through `10^LUT_ENTRY_SIZE` names.
pub const LUT_ENTRY_SIZE: usize = 4;

/// Capacity of the LUT file in bytes for the largest allowed queue
/// (255 entries round up to the 256-slot allocation the format reserves).
pub const LUT_FILE_SIZE_MAX: usize = 256 * LUT_ENTRY_SIZE;

/// Number of distinct payload names the reference counter can mint before
/// its low digits repeat.
pub const REFERENCE_SPACE: u32 = 10_000;

/// Encoded size of the queue header record in bytes.
pub const HEADER_SIZE: usize = 18;

/// Capacity of the process-local handle table.
pub const HANDLE_LIST_MAX: usize = 10;
