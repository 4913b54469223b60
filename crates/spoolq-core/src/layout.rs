//! On-disk layout: the `.header` record, the `.lut` circular index, and
//! payload file naming.
//!
//! Both metadata files are fixed-size and rewritten whole on every mutating
//! operation. The header is 18 bytes, little-endian, no padding:
//!
//! ```text
//! offset  size  field
//!      0     4  size              total live payload bytes
//!      4     4  max_entry_size
//!      8     1  max_entries
//!      9     1  num_of_entries
//!     10     1  head_lut_offs
//!     11     1  tail_lut_offs
//!     12     1  seek_lut_offs
//!     13     1  (reserved)
//!     14     2  reference_count
//!     16     2  flags
//! ```
//!
//! The LUT is `max_entries` slots of [`LUT_ENTRY_SIZE`] bytes each; a slot
//! holds the payload filename as fixed-width decimal digits, or all zero
//! bytes for an empty slot.

use std::path::Path;

use spoolq_error::{QueueError, Result};
use spoolq_types::limits::{HEADER_SIZE, LUT_ENTRY_SIZE, REFERENCE_SPACE};
use spoolq_types::{OpenFlags, QueueFlags};
use spoolq_vfs::{Vfs, VfsFile};

/// Name of the per-queue metadata record.
pub const HEADER_FILE: &str = ".header";
/// Name of the per-queue lookup-table file.
pub const LUT_FILE: &str = ".lut";

/// One LUT slot's contents: a fixed-width payload reference.
pub type Reference = [u8; LUT_ENTRY_SIZE];

/// The fixed-size metadata record of one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHeader {
    /// Total bytes of live payloads.
    pub size: u32,
    /// Cap enforced on each enqueued payload.
    pub max_entry_size: u32,
    /// Capacity of the LUT ring.
    pub max_entries: u8,
    /// Count of currently live entries.
    pub num_of_entries: u8,
    /// Ring index of the oldest live entry.
    pub head_lut_offs: u8,
    /// Ring index of the newest live entry.
    pub tail_lut_offs: u8,
    /// Ring index the next `get_entry` reads.
    pub seek_lut_offs: u8,
    /// Mints payload filenames; only ever incremented.
    pub reference_count: u16,
    /// Queue characteristics fixed at creation.
    pub flags: QueueFlags,
}

impl QueueHeader {
    /// Header for a freshly created, empty queue.
    pub fn new(max_entries: u8, max_entry_size: u32, flags: QueueFlags) -> Self {
        Self {
            size: 0,
            max_entry_size,
            max_entries,
            num_of_entries: 0,
            head_lut_offs: 0,
            tail_lut_offs: 0,
            seek_lut_offs: 0,
            reference_count: 0,
            flags,
        }
    }

    /// Whether the queue holds no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_of_entries == 0
    }

    /// Whether the ring is at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_of_entries == self.max_entries
    }

    /// The ring index after `i`, wrapping at `max_entries`.
    #[inline]
    pub fn ring_next(&self, i: u8) -> u8 {
        (i + 1) % self.max_entries
    }

    /// Encode little-endian into the fixed 18-byte record.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.max_entry_size.to_le_bytes());
        buf[8] = self.max_entries;
        buf[9] = self.num_of_entries;
        buf[10] = self.head_lut_offs;
        buf[11] = self.tail_lut_offs;
        buf[12] = self.seek_lut_offs;
        // buf[13] reserved
        buf[14..16].copy_from_slice(&self.reference_count.to_le_bytes());
        buf[16..18].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf
    }

    /// Decode and structurally validate a header record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(QueueError::corrupt(format!(
                "header record truncated: {} of {HEADER_SIZE} bytes",
                buf.len()
            )));
        }
        let hdr = Self {
            size: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            max_entry_size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            max_entries: buf[8],
            num_of_entries: buf[9],
            head_lut_offs: buf[10],
            tail_lut_offs: buf[11],
            seek_lut_offs: buf[12],
            reference_count: u16::from_le_bytes([buf[14], buf[15]]),
            flags: QueueFlags::from_bits_truncate(u16::from_le_bytes([buf[16], buf[17]])),
        };
        if hdr.max_entries == 0 {
            return Err(QueueError::corrupt("header: max_entries is zero"));
        }
        if hdr.num_of_entries > hdr.max_entries {
            return Err(QueueError::corrupt(format!(
                "header: {} entries exceed capacity {}",
                hdr.num_of_entries, hdr.max_entries
            )));
        }
        if hdr.head_lut_offs >= hdr.max_entries
            || hdr.tail_lut_offs >= hdr.max_entries
            || hdr.seek_lut_offs >= hdr.max_entries
        {
            return Err(QueueError::corrupt("header: ring offset out of range"));
        }
        Ok(hdr)
    }
}

/// An owned, in-memory mirror of the `.lut` file.
///
/// Read whole, manipulated in memory, written back whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut {
    buf: Vec<u8>,
}

impl Lut {
    /// A LUT of `max_entries` empty slots.
    pub fn new_empty(max_entries: u8) -> Self {
        Self {
            buf: vec![0u8; max_entries as usize * LUT_ENTRY_SIZE],
        }
    }

    /// Wrap raw file contents, validating the length.
    pub fn from_bytes(buf: Vec<u8>, max_entries: u8) -> Result<Self> {
        let expected = max_entries as usize * LUT_ENTRY_SIZE;
        if buf.len() != expected {
            return Err(QueueError::corrupt(format!(
                "LUT file is {} bytes, expected {expected}",
                buf.len()
            )));
        }
        Ok(Self { buf })
    }

    /// The raw bytes, as written to disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    fn range(i: u8) -> std::ops::Range<usize> {
        let start = i as usize * LUT_ENTRY_SIZE;
        start..start + LUT_ENTRY_SIZE
    }

    /// The reference stored at slot `i`, or `None` for an empty slot.
    pub fn slot(&self, i: u8) -> Option<Reference> {
        let bytes = &self.buf[Self::range(i)];
        if bytes.iter().all(|&b| b == 0) {
            return None;
        }
        let mut r = [0u8; LUT_ENTRY_SIZE];
        r.copy_from_slice(bytes);
        Some(r)
    }

    /// Store `reference` at slot `i`.
    pub fn set_slot(&mut self, i: u8, reference: Reference) {
        self.buf[Self::range(i)].copy_from_slice(&reference);
    }

    /// Mark slot `i` empty.
    pub fn clear_slot(&mut self, i: u8) {
        self.buf[Self::range(i)].fill(0);
    }

    /// Number of non-empty slots.
    pub fn live_count(&self) -> usize {
        self.buf
            .chunks_exact(LUT_ENTRY_SIZE)
            .filter(|slot| slot.iter().any(|&b| b != 0))
            .count()
    }

    /// Whether any live slot holds `reference`.
    pub fn contains(&self, reference: &Reference) -> bool {
        self.buf
            .chunks_exact(LUT_ENTRY_SIZE)
            .any(|slot| slot == reference)
    }

    /// The references of all live slots, in slot order.
    pub fn live_references(&self) -> impl Iterator<Item = Reference> + '_ {
        self.buf
            .chunks_exact(LUT_ENTRY_SIZE)
            .filter(|slot| slot.iter().any(|&b| b != 0))
            .map(|slot| {
                let mut r = [0u8; LUT_ENTRY_SIZE];
                r.copy_from_slice(slot);
                r
            })
    }
}

/// Render a counter value as a fixed-width decimal reference using its low
/// `10^LUT_ENTRY_SIZE` digits.
pub fn render_reference(count: u16) -> Reference {
    let mut n = u32::from(count) % REFERENCE_SPACE;
    let mut r = [b'0'; LUT_ENTRY_SIZE];
    for slot in r.iter_mut().rev() {
        *slot = b'0' + (n % 10) as u8;
        n /= 10;
    }
    r
}

/// Advance the header's reference counter and mint a payload reference not
/// currently held by any live slot.
///
/// The counter's low digits repeat every [`REFERENCE_SPACE`] enqueues; an
/// entry that old may still be live, so colliding names are skipped. At most
/// 255 slots are live, so the probe terminates well inside one revolution.
pub fn mint_reference(hdr: &mut QueueHeader, lut: &Lut) -> Reference {
    loop {
        hdr.reference_count = hdr.reference_count.wrapping_add(1);
        let reference = render_reference(hdr.reference_count);
        if !lut.contains(&reference) {
            return reference;
        }
    }
}

/// A reference as a payload filename. Rejects slots whose bytes are not
/// decimal digits (a damaged LUT).
pub fn reference_name(reference: &Reference) -> Result<String> {
    if !reference.iter().all(u8::is_ascii_digit) {
        return Err(QueueError::corrupt(format!(
            "LUT slot holds a malformed reference: {reference:?}"
        )));
    }
    // All digits: valid UTF-8 by construction.
    Ok(String::from_utf8_lossy(reference).into_owned())
}

/// Read and decode the header of the queue at `dir`.
pub fn read_header<V: Vfs>(vfs: &V, dir: &Path) -> Result<QueueHeader> {
    let mut file = vfs.open(&dir.join(HEADER_FILE), OpenFlags::READ_ONLY)?;
    let mut buf = [0u8; HEADER_SIZE];
    let n = file.read(&mut buf, 0)?;
    file.close()?;
    if n < HEADER_SIZE {
        return Err(QueueError::corrupt(format!(
            "header record truncated: {n} of {HEADER_SIZE} bytes"
        )));
    }
    QueueHeader::decode(&buf)
}

/// Encode and persist the header of the queue at `dir`.
pub fn write_header<V: Vfs>(vfs: &V, dir: &Path, hdr: &QueueHeader) -> Result<()> {
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
    let mut file = vfs.open(&dir.join(HEADER_FILE), flags)?;
    file.write(&hdr.encode(), 0)?;
    file.close()
}

/// Read the whole LUT of the queue at `dir` into memory.
pub fn read_lut<V: Vfs>(vfs: &V, dir: &Path, max_entries: u8) -> Result<Lut> {
    let mut file = vfs.open(&dir.join(LUT_FILE), OpenFlags::READ_ONLY)?;
    let mut buf = vec![0u8; max_entries as usize * LUT_ENTRY_SIZE];
    let n = file.read(&mut buf, 0)?;
    file.close()?;
    if n < buf.len() {
        return Err(QueueError::corrupt(format!(
            "LUT file truncated: {n} of {} bytes",
            buf.len()
        )));
    }
    Lut::from_bytes(buf, max_entries)
}

/// Persist the whole LUT of the queue at `dir`.
pub fn write_lut<V: Vfs>(vfs: &V, dir: &Path, lut: &Lut) -> Result<()> {
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
    let mut file = vfs.open(&dir.join(LUT_FILE), flags)?;
    file.write(lut.as_bytes(), 0)?;
    file.close()
}
