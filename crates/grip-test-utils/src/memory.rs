use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use grip_io::{EntryKind, FileSource, FileSourceError, FileSourceFactory, Result, SourceKind};
use parking_lot::Mutex;

/// A [`FileSource`] over in-memory entries that counts every read.
///
/// Clones share state, so a test can keep a handle after giving one to a
/// registry and inspect reads and `close` calls afterwards.
#[derive(Debug, Clone)]
pub struct InMemoryFileSource {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
    reads: Mutex<HashMap<String, usize>>,
    read_delay: Option<Duration>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl InMemoryFileSource {
    pub fn new(root: impl Into<PathBuf>) -> InMemoryFileSourceBuilder {
        InMemoryFileSourceBuilder {
            root: root.into(),
            entries: BTreeMap::new(),
            read_delay: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn read_count(&self, path: &str) -> usize {
        self.inner.reads.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.inner.reads.lock().values().sum()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::Acquire)
    }
}

pub struct InMemoryFileSourceBuilder {
    root: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
    read_delay: Option<Duration>,
}

impl InMemoryFileSourceBuilder {
    pub fn file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(path.to_string(), bytes.into());
        self
    }

    /// Adds `<internal_name>.class`.
    pub fn class(self, internal_name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.file(&format!("{internal_name}.class"), bytes)
    }

    /// Sleep inside every read, to widen race windows.
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn build(self) -> InMemoryFileSource {
        InMemoryFileSource {
            inner: Arc::new(Inner {
                root: self.root,
                entries: self.entries,
                reads: Mutex::new(HashMap::new()),
                read_delay: self.read_delay,
                closed: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
            }),
        }
    }
}

impl FileSource for InMemoryFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }

    fn list_entries(&self, visitor: &mut dyn FnMut(&str, EntryKind)) -> Result<()> {
        if self.is_closed() {
            return Err(FileSourceError::Closed(self.inner.root.clone()));
        }
        for path in self.inner.entries.keys() {
            visitor(path, EntryKind::of_file(path));
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(FileSourceError::Closed(self.inner.root.clone()));
        }
        *self.inner.reads.lock().entry(path.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.inner.read_delay {
            std::thread::sleep(delay);
        }
        self.inner
            .entries
            .get(path)
            .cloned()
            .ok_or_else(|| FileSourceError::EntryNotFound {
                root: self.inner.root.clone(),
                entry: path.to_string(),
            })
    }

    fn close(&self) -> Result<()> {
        self.inner.close_calls.fetch_add(1, Ordering::AcqRel);
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Hands out registered [`InMemoryFileSource`]s by root path. Unknown roots
/// are rejected the way an unrecognised on-disk shape would be.
#[derive(Debug, Clone, Default)]
pub struct InMemorySourceFactory {
    sources: HashMap<PathBuf, InMemoryFileSource>,
    created: Arc<AtomicUsize>,
}

impl InMemorySourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: InMemoryFileSource) -> Self {
        self.sources.insert(source.root().to_path_buf(), source);
        self
    }

    pub fn source(&self, root: impl AsRef<Path>) -> Option<&InMemoryFileSource> {
        self.sources.get(root.as_ref())
    }

    /// How many sources have been opened through this factory.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }
}

impl FileSourceFactory for InMemorySourceFactory {
    fn create_file_source(&self, path: &Path) -> Result<Box<dyn FileSource>> {
        let source = self
            .sources
            .get(path)
            .cloned()
            .ok_or_else(|| FileSourceError::UnknownSourceKind(path.to_path_buf()))?;
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(source))
    }
}
