//! Flag sets shared between the engine and the filesystem port.

bitflags::bitflags! {
    /// Per-queue characteristics, fixed at creation and persisted in the
    /// header's `flags` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QueueFlags: u16 {
        /// Entries are free-form message-log records.
        const MESSAGE_LOG = 0x0001;
        /// The queue supports `seek`/`get_entry` random-access reads.
        const RANDOM_ACCESS = 0x0002;
    }
}

bitflags::bitflags! {
    /// How the filesystem port should open a file.
    ///
    /// Exactly one of the three access bits is expected; `CREATE` and
    /// `CREATE_NEW` modify creation behavior, `TRUNCATE` empties an
    /// existing file on open.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u8 {
        /// Open for reading only.
        const READ_ONLY = 0x01;
        /// Open for writing only.
        const WRITE_ONLY = 0x02;
        /// Open for reading and writing.
        const READ_WRITE = 0x04;
        /// Create the file if it does not exist.
        const CREATE = 0x08;
        /// Create the file, failing if it already exists. This is the
        /// atomic existence arbiter the lock protocol relies on.
        const CREATE_NEW = 0x10;
        /// Truncate to zero length on open.
        const TRUNCATE = 0x20;
    }
}

impl OpenFlags {
    /// Whether the flags ask for any kind of write access.
    #[inline]
    pub const fn writes(self) -> bool {
        self.intersects(Self::WRITE_ONLY.union(Self::READ_WRITE))
    }

    /// Whether the flags ask for any kind of read access.
    #[inline]
    pub const fn reads(self) -> bool {
        self.intersects(Self::READ_ONLY.union(Self::READ_WRITE))
    }

    /// Whether the flags permit creating a missing file.
    #[inline]
    pub const fn creates(self) -> bool {
        self.intersects(Self::CREATE.union(Self::CREATE_NEW))
    }
}
