//! The queue engine: public operations over the layout manager, the lock
//! protocol, and the handle table.
//!
//! Every operation is synchronous and single-shot: it either completes or
//! returns a status error after best-effort cleanup. All filesystem work
//! goes through the [`Vfs`] port with absolute paths under the engine's
//! base directory; the process working directory is never touched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use spoolq_error::{QueueError, Result};
use spoolq_types::limits::{LUT_ENTRY_SIZE, MAX_NAME_LEN};
use spoolq_types::{AccessMode, AccessType, OpenFlags, QueueFlags, QueueHandle, SeekTarget};
use spoolq_vfs::{Vfs, VfsFile};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::handle::{HandleEntry, HandleTable};
use crate::layout::{
    HEADER_FILE, LUT_FILE, Lut, QueueHeader, mint_reference, read_header, read_lut,
    reference_name, write_header, write_lut,
};
use crate::lock::{self, RO_LOCK, RW_LOCK, WO_LOCK};

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Live entries.
    pub entries: u8,
    /// Total bytes of live payloads.
    pub bytes: u32,
}

/// The queue engine.
///
/// One instance per process is the intended deployment; the handle table is
/// engine-local and the inter-process story is the on-disk lock protocol.
/// The table sits behind a mutex, so one engine may be shared across
/// threads — though the on-disk files of a single queue still assume the
/// one-writer discipline the locks enforce.
pub struct QueueEngine<V: Vfs> {
    vfs: V,
    base_dir: PathBuf,
    sweep_orphans: bool,
    handles: Mutex<HandleTable>,
}

impl<V: Vfs> QueueEngine<V> {
    /// Bring up the engine, creating the base directory if missing.
    pub fn new(vfs: V, config: EngineConfig) -> Result<Self> {
        if !vfs.dir_exists(&config.base_dir)? {
            vfs.create_dir(&config.base_dir)?;
        }
        debug!(base_dir = %config.base_dir.display(), vfs = vfs.name(), "queue engine ready");
        Ok(Self {
            vfs,
            base_dir: config.base_dir,
            sweep_orphans: config.sweep_orphans,
            handles: Mutex::new(HandleTable::new()),
        })
    }

    /// The filesystem port this engine runs on.
    pub fn vfs(&self) -> &V {
        &self.vfs
    }

    fn queue_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// A queue name is a single directory component, bounded and outside
    /// the `.`-prefixed namespace the metadata and lock files own.
    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(QueueError::invalid_arg("queue name is empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(QueueError::invalid_arg(format!(
                "queue name exceeds {MAX_NAME_LEN} bytes: '{name}'"
            )));
        }
        if name.starts_with('.') {
            return Err(QueueError::invalid_arg(format!(
                "queue name may not start with '.': '{name}'"
            )));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0')
        {
            return Err(QueueError::invalid_arg(format!(
                "queue name contains a path separator: '{name}'"
            )));
        }
        Ok(())
    }

    fn require_queue_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.queue_dir(name);
        if !self.vfs.dir_exists(&dir)? {
            return Err(QueueError::missing(name));
        }
        Ok(dir)
    }

    /// A snapshot of the handle-table row a handle points at.
    fn entry(&self, handle: QueueHandle) -> Result<HandleEntry> {
        Ok(self.handles.lock().get(handle)?.clone())
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Create an empty queue.
    pub fn create(
        &self,
        name: &str,
        max_entries: u8,
        max_entry_size: u32,
        flags: QueueFlags,
    ) -> Result<()> {
        Self::validate_name(name)?;
        if max_entries == 0 {
            return Err(QueueError::invalid_arg("max_entries must be non-zero"));
        }
        if max_entry_size == 0 {
            return Err(QueueError::invalid_arg("max_entry_size must be non-zero"));
        }

        let dir = self.queue_dir(name);
        if self.vfs.dir_exists(&dir)? {
            return Err(QueueError::QueueExists {
                name: name.to_owned(),
            });
        }
        self.vfs.create_dir(&dir)?;

        let hdr = QueueHeader::new(max_entries, max_entry_size, flags);
        if let Err(e) = write_header(&self.vfs, &dir, &hdr)
            .and_then(|()| write_lut(&self.vfs, &dir, &Lut::new_empty(max_entries)))
        {
            // Partial progress: take the directory back out.
            if let Err(cleanup) = self.vfs.remove_dir_all(&dir) {
                warn!(name, error = %cleanup, "failed to remove partially created queue");
            }
            return Err(e);
        }

        debug!(name, max_entries, max_entry_size, ?flags, "queue created");
        Ok(())
    }

    /// Destroy a queue. Succeeds without side effect if the queue is
    /// absent; refuses with `QueueBusy` while any opener remains.
    pub fn destroy(&self, name: &str) -> Result<()> {
        Self::validate_name(name)?;
        let dir = self.queue_dir(name);
        if !self.vfs.dir_exists(&dir)? {
            return Ok(());
        }

        // Hold the table lock so a concurrent open in this process cannot
        // slip between the busy check and the removal.
        let table = self.handles.lock();
        if table.contains_name(name) {
            return Err(QueueError::busy(name));
        }
        if lock::inspect(&self.vfs, &dir)?.is_held() {
            return Err(QueueError::busy(name));
        }
        self.vfs.remove_dir_all(&dir)?;
        drop(table);

        debug!(name, "queue destroyed");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Open / close
    // -----------------------------------------------------------------

    /// Open a queue for `access` in `mode`, returning an opaque handle.
    ///
    /// Re-opening a queue this process already has open succeeds with the
    /// existing handle when `(access, mode)` match, and `QueueOpened`
    /// otherwise; no additional lock state is created either way.
    pub fn open(&self, name: &str, access: AccessType, mode: AccessMode) -> Result<QueueHandle> {
        Self::validate_name(name)?;
        let dir = self.require_queue_dir(name)?;

        let mut table = self.handles.lock();
        if let Some((existing, entry)) = table.find_by_name(name) {
            if entry.access == access && entry.mode == mode {
                return Ok(existing);
            }
            return Err(QueueError::QueueOpened {
                name: name.to_owned(),
            });
        }

        let state = lock::inspect(&self.vfs, &dir)?;
        if state.writer_present() {
            return Err(QueueError::busy(name));
        }
        if state.is_held() && access != AccessType::ReadOnly {
            return Err(QueueError::busy(name));
        }

        lock::acquire(&self.vfs, &dir, access)?;
        let Some(handle) = table.reserve(HandleEntry {
            name: name.to_owned(),
            access,
            mode,
        }) else {
            // Back the lock change out before reporting exhaustion.
            lock::release(&self.vfs, &dir)?;
            return Err(QueueError::HandleNotAvail);
        };
        drop(table);

        if access.can_write() && self.sweep_orphans {
            // Safe under the exclusive writer lock; failure costs disk
            // space, not correctness.
            if let Err(e) = self.sweep_orphan_payloads(&dir) {
                warn!(name, error = %e, "orphan payload sweep failed");
            }
        }

        debug!(name, %access, %handle, "queue opened");
        Ok(handle)
    }

    /// Close an open handle, releasing its lock state and table row.
    pub fn close(&self, handle: QueueHandle) -> Result<()> {
        let mut table = self.handles.lock();
        let entry = table.get(handle)?.clone();

        let dir = self.queue_dir(&entry.name);
        if !self.vfs.dir_exists(&dir)? {
            return Err(QueueError::missing(&entry.name));
        }

        lock::release(&self.vfs, &dir)?;
        table.release(handle)?;
        drop(table);

        debug!(name = %entry.name, %handle, "queue closed");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------

    /// Append an entry at the tail. A full queue evicts its oldest entry,
    /// payload file included, to make room.
    pub fn enqueue(&self, handle: QueueHandle, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(QueueError::invalid_arg("payload is empty"));
        }
        let entry = self.entry(handle)?;
        if !entry.access.can_write() {
            return Err(QueueError::ReadOnly);
        }
        let dir = self.require_queue_dir(&entry.name)?;
        if !lock::inspect(&self.vfs, &dir)?.writer_present() {
            return Err(QueueError::closed(&entry.name));
        }

        let mut hdr = read_header(&self.vfs, &dir)?;
        let mut lut = read_lut(&self.vfs, &dir, hdr.max_entries)?;
        if data.len() > hdr.max_entry_size as usize {
            return Err(QueueError::invalid_arg(format!(
                "payload of {} bytes exceeds max_entry_size {}",
                data.len(),
                hdr.max_entry_size
            )));
        }

        let reference = mint_reference(&mut hdr, &lut);
        let payload = reference_name(&reference)?;
        let mut file = self.vfs.open(
            &dir.join(&payload),
            OpenFlags::WRITE_ONLY | OpenFlags::CREATE_NEW,
        )?;
        if let Err(e) = file.write(data, 0).and_then(|()| file.close()) {
            let _ = self.vfs.delete(&dir.join(&payload));
            return Err(e);
        }

        if hdr.is_empty() && hdr.head_lut_offs == hdr.tail_lut_offs {
            // Empty: the new entry lands on the slot head and tail share.
            lut.set_slot(hdr.tail_lut_offs, reference);
            hdr.num_of_entries = 1;
        } else if hdr.is_full()
            && u16::from(hdr.tail_lut_offs)
                == (u16::from(hdr.head_lut_offs) + u16::from(hdr.max_entries) - 1)
                    % u16::from(hdr.max_entries)
        {
            // Full: evict the oldest entry. The new payload already sits on
            // disk, so a crash in here leaves no window with the entry
            // referenced but missing.
            if hdr.seek_lut_offs == hdr.head_lut_offs {
                hdr.seek_lut_offs = hdr.ring_next(hdr.seek_lut_offs);
            }
            let evicted = lut
                .slot(hdr.head_lut_offs)
                .ok_or_else(|| QueueError::corrupt("full queue has an empty head slot"))?;
            lut.clear_slot(hdr.head_lut_offs);
            let evicted_name = reference_name(&evicted)?;
            let evicted_bytes = self.remove_payload(&dir, &evicted_name)?;
            hdr.size = hdr.size.saturating_sub(evicted_bytes);
            hdr.head_lut_offs = hdr.ring_next(hdr.head_lut_offs);
            hdr.tail_lut_offs = hdr.ring_next(hdr.tail_lut_offs);
            lut.set_slot(hdr.tail_lut_offs, reference);
            debug!(name = %entry.name, evicted = %evicted_name, "oldest entry evicted");
        } else {
            hdr.tail_lut_offs = hdr.ring_next(hdr.tail_lut_offs);
            lut.set_slot(hdr.tail_lut_offs, reference);
            hdr.num_of_entries += 1;
        }
        hdr.size = hdr.size.saturating_add(data.len() as u32);

        write_lut(&self.vfs, &dir, &lut)?;
        write_header(&self.vfs, &dir, &hdr)?;

        debug!(
            name = %entry.name,
            reference = %payload,
            bytes = data.len(),
            entries = hdr.num_of_entries,
            "entry enqueued"
        );
        Ok(())
    }

    /// Remove the oldest entry, copying its payload into `buf`.
    ///
    /// Returns the number of bytes actually copied (at most `buf.len()`);
    /// the entry is removed in full either way.
    pub fn dequeue(&self, handle: QueueHandle, buf: &mut [u8]) -> Result<usize> {
        let entry = self.entry(handle)?;
        if !entry.access.can_write() {
            return Err(QueueError::ReadOnly);
        }
        let dir = self.require_queue_dir(&entry.name)?;
        if !lock::inspect(&self.vfs, &dir)?.writer_present() {
            return Err(QueueError::closed(&entry.name));
        }

        let mut hdr = read_header(&self.vfs, &dir)?;
        let mut lut = read_lut(&self.vfs, &dir, hdr.max_entries)?;
        if hdr.is_empty() {
            return Err(QueueError::QueueEmpty);
        }

        // The read cursor never trails behind the head.
        if hdr.seek_lut_offs == hdr.head_lut_offs {
            hdr.seek_lut_offs = hdr.ring_next(hdr.seek_lut_offs);
        }

        let reference = lut
            .slot(hdr.head_lut_offs)
            .ok_or_else(|| QueueError::corrupt("live head slot is empty"))?;
        let payload = reference_name(&reference)?;

        let mut file = self.vfs.open(&dir.join(&payload), OpenFlags::READ_ONLY)?;
        let payload_bytes = file.file_size()?;
        let n = file.read(buf, 0)?;
        file.close()?;
        self.vfs.delete(&dir.join(&payload))?;

        lut.clear_slot(hdr.head_lut_offs);
        hdr.head_lut_offs = hdr.ring_next(hdr.head_lut_offs);
        hdr.num_of_entries -= 1;
        hdr.size = hdr.size.saturating_sub(payload_bytes as u32);
        if hdr.num_of_entries == 0 {
            // An empty ring keeps head and tail together.
            hdr.tail_lut_offs = hdr.head_lut_offs;
        }

        write_lut(&self.vfs, &dir, &lut)?;
        write_header(&self.vfs, &dir, &hdr)?;

        debug!(
            name = %entry.name,
            reference = %payload,
            bytes = n,
            entries = hdr.num_of_entries,
            "entry dequeued"
        );
        Ok(n)
    }

    // -----------------------------------------------------------------
    // Random access
    // -----------------------------------------------------------------

    /// Position the read cursor for the next [`get_entry`](Self::get_entry).
    pub fn seek(&self, handle: QueueHandle, target: SeekTarget) -> Result<()> {
        let entry = self.entry(handle)?;
        if !entry.access.can_read() {
            return Err(QueueError::WriteOnly);
        }
        let dir = self.require_queue_dir(&entry.name)?;
        if !lock::inspect(&self.vfs, &dir)?.reader_present() {
            return Err(QueueError::closed(&entry.name));
        }

        let mut hdr = read_header(&self.vfs, &dir)?;
        if !hdr.flags.contains(QueueFlags::RANDOM_ACCESS) {
            return Err(QueueError::NotSeekable);
        }
        if hdr.is_empty() {
            return Err(QueueError::QueueEmpty);
        }

        hdr.seek_lut_offs = match target {
            SeekTarget::Head => hdr.head_lut_offs,
            SeekTarget::Tail => hdr.tail_lut_offs,
            SeekTarget::Position(p) => {
                if p >= hdr.num_of_entries {
                    return Err(QueueError::InvalidSeek {
                        position: p,
                        live: hdr.num_of_entries,
                    });
                }
                ((u16::from(hdr.head_lut_offs) + u16::from(p)) % u16::from(hdr.max_entries)) as u8
            }
        };
        write_header(&self.vfs, &dir, &hdr)?;
        Ok(())
    }

    /// Copy the entry under the read cursor into `buf` without removing it,
    /// then advance the cursor unless it already sits at the tail.
    ///
    /// Returns the number of bytes copied (at most `buf.len()`).
    pub fn get_entry(&self, handle: QueueHandle, buf: &mut [u8]) -> Result<usize> {
        let entry = self.entry(handle)?;
        if !entry.access.can_read() {
            return Err(QueueError::WriteOnly);
        }
        let dir = self.require_queue_dir(&entry.name)?;
        if !lock::inspect(&self.vfs, &dir)?.reader_present() {
            return Err(QueueError::closed(&entry.name));
        }

        let mut hdr = read_header(&self.vfs, &dir)?;
        let lut = read_lut(&self.vfs, &dir, hdr.max_entries)?;
        if hdr.is_empty() {
            return Err(QueueError::QueueEmpty);
        }

        let reference = lut
            .slot(hdr.seek_lut_offs)
            .ok_or_else(|| QueueError::corrupt("read cursor points at an empty slot"))?;
        let payload = reference_name(&reference)?;
        let mut file = self.vfs.open(&dir.join(&payload), OpenFlags::READ_ONLY)?;
        let n = file.read(buf, 0)?;
        file.close()?;

        if hdr.seek_lut_offs != hdr.tail_lut_offs {
            hdr.seek_lut_offs = hdr.ring_next(hdr.seek_lut_offs);
        }
        write_header(&self.vfs, &dir, &hdr)?;
        Ok(n)
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// The number of live entries.
    pub fn get_length(&self, handle: QueueHandle) -> Result<u8> {
        Ok(self.stats(handle)?.entries)
    }

    /// Live-entry count and total live payload bytes.
    pub fn stats(&self, handle: QueueHandle) -> Result<QueueStats> {
        let entry = self.entry(handle)?;
        let dir = self.require_queue_dir(&entry.name)?;
        if !lock::inspect(&self.vfs, &dir)?.is_held() {
            return Err(QueueError::closed(&entry.name));
        }
        let hdr = read_header(&self.vfs, &dir)?;
        Ok(QueueStats {
            entries: hdr.num_of_entries,
            bytes: hdr.size,
        })
    }

    // -----------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------

    /// Delete a payload file, returning how many bytes it held. A payload
    /// already gone counts zero; the caller's accounting stays whole.
    fn remove_payload(&self, dir: &Path, name: &str) -> Result<u32> {
        let path = dir.join(name);
        if !self.vfs.exists(&path)? {
            return Ok(0);
        }
        let mut file = self.vfs.open(&path, OpenFlags::READ_ONLY)?;
        let bytes = file.file_size()?;
        file.close()?;
        self.vfs.delete(&path)?;
        Ok(bytes as u32)
    }

    /// Delete payload-shaped files no live LUT slot references.
    ///
    /// A crash between the payload write and the index write strands the
    /// payload on disk; the next writer open runs this under the exclusive
    /// lock. Only names of exactly `LUT_ENTRY_SIZE` decimal digits are
    /// touched.
    fn sweep_orphan_payloads(&self, dir: &Path) -> Result<()> {
        let hdr = read_header(&self.vfs, dir)?;
        let lut = read_lut(&self.vfs, dir, hdr.max_entries)?;
        let live: HashSet<String> = lut
            .live_references()
            .map(|r| reference_name(&r))
            .collect::<Result<_>>()?;

        for name in self.vfs.list_dir(dir)? {
            if name == HEADER_FILE
                || name == LUT_FILE
                || name == RO_LOCK
                || name == WO_LOCK
                || name == RW_LOCK
            {
                continue;
            }
            let payload_shaped =
                name.len() == LUT_ENTRY_SIZE && name.bytes().all(|b| b.is_ascii_digit());
            if payload_shaped && !live.contains(&name) {
                self.vfs.delete(&dir.join(&name))?;
                debug!(dir = %dir.display(), orphan = %name, "orphan payload removed");
            }
        }
        Ok(())
    }
}
