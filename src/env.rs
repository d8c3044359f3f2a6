use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Append-only byte sink the log is written to.
///
/// Implementations are expected to buffer: the log writer issues many small
/// appends (a 7-byte header, then a payload) and flushes after each physical
/// record. Only `sync` gives crash durability.
pub trait WritableFile: Send {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    /// Push buffered bytes to the OS.
    fn flush(&mut self) -> Result<()>;
    /// Push buffered bytes to the OS and force them to stable storage.
    fn sync(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

impl<W: WritableFile + ?Sized> WritableFile for Box<W> {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        (**self).append(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// A file opened for appending.
///
/// Two layers of buffering:
///   BufWriter.flush()  → Rust buffer → OS page cache
///   file.sync_all()    → OS page cache → physical disk
pub struct AppendFile {
    writer: BufWriter<File>,
}

impl AppendFile {
    /// Open `path` for appending, creating it if needed. Returns the file and
    /// its current length so a log writer can resume mid-block.
    pub fn open(path: &Path) -> Result<(Self, u64)> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok((
            AppendFile {
                writer: BufWriter::with_capacity(64 * 1024, file),
            },
            len,
        ))
    }
}

impl WritableFile for AppendFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.sync()
    }
}

/// In-memory sink. Cloning shares the underlying buffer so a test can keep a
/// handle and inspect what the log wrote.
#[derive(Clone, Default)]
pub struct MemFile {
    inner: std::sync::Arc<parking_lot::Mutex<MemFileState>>,
}

#[derive(Default)]
struct MemFileState {
    data: Vec<u8>,
    syncs: usize,
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything appended so far.
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().data.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `sync` calls observed.
    pub fn syncs(&self) -> usize {
        self.inner.lock().syncs
    }
}

impl WritableFile for MemFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.inner.lock().data.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.lock().syncs += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
