//! Attachment loader.
//!
//! Reads one user-supplied file into memory as text and publishes each phase
//! change on a watch channel. Every load, clear and abort bumps a generation
//! counter; a read that finishes under an older generation is discarded.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parley_core::config::DEFAULT_MAX_ATTACHMENT_BYTES;
use parley_core::{AttachmentPhase, UploadedAttachment};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use crate::error::AttachmentError;

// =============================================================================
// Sources
// =============================================================================

/// Something that can be read as an attachment.
pub trait AttachmentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Size in bytes, known before reading.
    fn size(&self) -> u64;

    fn read(&self) -> impl Future<Output = Result<Vec<u8>, AttachmentError>> + Send;
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct PathSource {
    path: PathBuf,
    name: String,
    size: u64,
}

impl PathSource {
    /// Stat the file. The content is not read until [`AttachmentLoader::load`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| AttachmentError::ReadFailure(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(AttachmentError::ReadFailure(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttachmentSource for PathSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&self) -> Result<Vec<u8>, AttachmentError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| AttachmentError::ReadFailure(e.to_string()))
    }
}

/// An in-memory blob handed over by a file picker.
#[derive(Debug, Clone)]
pub struct BytesSource {
    name: String,
    bytes: Vec<u8>,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl AttachmentSource for BytesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read(&self) -> Result<Vec<u8>, AttachmentError> {
        Ok(self.bytes.clone())
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Terminal result of a load that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Content is available and the phase is `Ready`.
    Ready,
    /// The read finished after a newer load, clear or abort; it was dropped.
    Stale,
}

/// Content handed to the session engine when it consumes an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedAttachment {
    pub name: String,
    pub content: String,
}

/// Owns the single attachment slot.
pub struct AttachmentLoader {
    max_bytes: u64,
    generation: Mutex<u64>,
    state: watch::Sender<UploadedAttachment>,
    abort: Notify,
}

impl AttachmentLoader {
    pub fn new(max_bytes: u64) -> Self {
        let (state, _) = watch::channel(UploadedAttachment::default());
        Self {
            max_bytes,
            generation: Mutex::new(0),
            state,
            abort: Notify::new(),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Read a source into the slot.
    ///
    /// Oversized sources are rejected before any read begins, leaving the
    /// slot idle. A failed decode leaves the slot in `Error` with a reason.
    pub async fn load<S: AttachmentSource>(&self, source: &S) -> Result<LoadOutcome, AttachmentError> {
        let size = source.size();
        if size > self.max_bytes {
            warn!(name = %source.name(), size, limit = self.max_bytes, "Attachment too large");
            self.advance(UploadedAttachment::default());
            return Err(AttachmentError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        // Registered before the phase flips so an abort cannot slip between.
        let aborted = self.abort.notified();
        let generation = self.advance(UploadedAttachment {
            name: source.name().to_string(),
            phase: AttachmentPhase::Reading,
            ..Default::default()
        });
        debug!(name = %source.name(), size, generation, "Attachment read started");

        let read = tokio::select! {
            result = source.read() => result,
            _ = aborted => {
                info!(name = %source.name(), "Attachment read aborted");
                return Err(AttachmentError::ReadAborted);
            }
        };

        let decoded = read.and_then(|bytes| self.decode(bytes));

        let current = self.lock_generation();
        if *current != generation {
            debug!(name = %source.name(), generation, current = *current, "Discarding stale attachment read");
            return Ok(LoadOutcome::Stale);
        }
        match decoded {
            Ok(content) => {
                info!(name = %source.name(), bytes = content.len(), "Attachment ready");
                self.state.send_replace(UploadedAttachment {
                    name: source.name().to_string(),
                    content: Some(content),
                    phase: AttachmentPhase::Ready,
                    error_reason: None,
                });
                Ok(LoadOutcome::Ready)
            }
            Err(e) => {
                warn!(name = %source.name(), error = %e, "Attachment read failed");
                self.state.send_replace(UploadedAttachment {
                    name: source.name().to_string(),
                    content: None,
                    phase: AttachmentPhase::Error,
                    error_reason: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<String, AttachmentError> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }
        String::from_utf8(bytes)
            .map_err(|e| AttachmentError::ReadFailure(format!("file is not UTF-8 text: {}", e)))
    }

    /// Cancel an in-flight read. Returns whether a read was pending.
    pub fn abort(&self) -> bool {
        let mut generation = self.lock_generation();
        if self.state.borrow().phase != AttachmentPhase::Reading {
            return false;
        }
        *generation += 1;
        self.state.send_replace(UploadedAttachment::default());
        drop(generation);
        self.abort.notify_waiters();
        true
    }

    /// Return to idle and drop any content, whatever the phase.
    pub fn clear(&self) {
        self.advance(UploadedAttachment::default());
        debug!("Attachment cleared");
    }

    /// Take ready content out of the slot, leaving it idle.
    ///
    /// `None` unless the phase is `Ready`; a read in progress is untouched.
    pub fn take_ready(&self) -> Option<ConsumedAttachment> {
        let mut generation = self.lock_generation();
        let snapshot = self.state.borrow().clone();
        let content = snapshot.ready_content()?.to_string();
        *generation += 1;
        self.state.send_replace(UploadedAttachment::default());
        Some(ConsumedAttachment {
            name: snapshot.name,
            content,
        })
    }

    /// Drop a failed read so it does not outlive the submission that
    /// follows it. Returns whether the slot was in `Error`.
    pub fn clear_failed(&self) -> bool {
        let mut generation = self.lock_generation();
        if self.state.borrow().phase != AttachmentPhase::Error {
            return false;
        }
        *generation += 1;
        self.state.send_replace(UploadedAttachment::default());
        debug!("Failed attachment cleared");
        true
    }

    pub fn snapshot(&self) -> UploadedAttachment {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> AttachmentPhase {
        self.state.borrow().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadedAttachment> {
        self.state.subscribe()
    }

    /// Bump the generation and publish a new slot state atomically.
    fn advance(&self, next: UploadedAttachment) -> u64 {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.state.send_replace(next);
        *generation
    }

    fn lock_generation(&self) -> std::sync::MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AttachmentLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENT_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Reports a size without holding the bytes; counts read attempts.
    struct SizedSource {
        size: u64,
        reads: AtomicUsize,
    }

    impl AttachmentSource for SizedSource {
        fn name(&self) -> &str {
            "huge.csv"
        }

        fn size(&self) -> u64 {
            self.size
        }

        async fn read(&self) -> Result<Vec<u8>, AttachmentError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    /// Blocks its read until released.
    struct GatedSource {
        gate: Arc<Notify>,
        bytes: Vec<u8>,
    }

    impl AttachmentSource for GatedSource {
        fn name(&self) -> &str {
            "slow.txt"
        }

        fn size(&self) -> u64 {
            self.bytes.len() as u64
        }

        async fn read(&self) -> Result<Vec<u8>, AttachmentError> {
            self.gate.notified().await;
            Ok(self.bytes.clone())
        }
    }

    async fn wait_for_phase(loader: &AttachmentLoader, phase: AttachmentPhase) {
        let mut rx = loader.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|a| a.phase == phase))
            .await
            .expect("timed out waiting for phase")
            .expect("loader dropped");
    }

    #[tokio::test]
    async fn test_load_bytes_ready() {
        let loader = AttachmentLoader::default();
        let outcome = loader
            .load(&BytesSource::new("notes.txt", "hello world"))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Ready);
        let snap = loader.snapshot();
        assert_eq!(snap.phase, AttachmentPhase::Ready);
        assert_eq!(snap.name, "notes.txt");
        assert_eq!(snap.ready_content(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_oversized_rejected_before_read() {
        let loader = AttachmentLoader::default();
        let source = SizedSource {
            size: 210 * 1024 * 1024,
            reads: AtomicUsize::new(0),
        };
        let err = loader.load(&source).await.unwrap_err();
        assert_eq!(
            err,
            AttachmentError::TooLarge {
                size: 210 * 1024 * 1024,
                limit: DEFAULT_MAX_ATTACHMENT_BYTES,
            }
        );
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
        assert_eq!(loader.snapshot(), UploadedAttachment::default());
    }

    #[tokio::test]
    async fn test_oversized_resets_previous_content() {
        let loader = AttachmentLoader::new(8);
        loader.load(&BytesSource::new("a.txt", "small")).await.unwrap();
        let err = loader
            .load(&BytesSource::new("b.txt", "much too large"))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::TooLarge { .. }));
        assert_eq!(loader.phase(), AttachmentPhase::Idle);
        assert!(loader.snapshot().content.is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_sets_error_phase() {
        let loader = AttachmentLoader::default();
        let err = loader
            .load(&BytesSource::new("blob.bin", vec![0xff, 0xfe, 0x00]))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::ReadFailure(_)));
        let snap = loader.snapshot();
        assert_eq!(snap.phase, AttachmentPhase::Error);
        assert!(snap.error_reason.as_ref().unwrap().contains("UTF-8"));
        assert!(snap.ready_content().is_none());
    }

    #[tokio::test]
    async fn test_clear_during_read_discards_result() {
        let loader = Arc::new(AttachmentLoader::default());
        let gate = Arc::new(Notify::new());
        let source = GatedSource {
            gate: Arc::clone(&gate),
            bytes: b"late content".to_vec(),
        };

        let task = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(&source).await })
        };
        wait_for_phase(&loader, AttachmentPhase::Reading).await;

        loader.clear();
        gate.notify_one();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(loader.snapshot(), UploadedAttachment::default());
    }

    #[tokio::test]
    async fn test_abort_returns_to_idle() {
        let loader = Arc::new(AttachmentLoader::default());
        let source = GatedSource {
            gate: Arc::new(Notify::new()),
            bytes: b"never".to_vec(),
        };

        let task = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(&source).await })
        };
        wait_for_phase(&loader, AttachmentPhase::Reading).await;

        assert!(loader.abort());
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, AttachmentError::ReadAborted);
        assert_eq!(loader.phase(), AttachmentPhase::Idle);
    }

    #[tokio::test]
    async fn test_abort_when_idle_is_noop() {
        let loader = AttachmentLoader::default();
        assert!(!loader.abort());
        loader.load(&BytesSource::new("a.txt", "x")).await.unwrap();
        assert!(!loader.abort());
        assert_eq!(loader.phase(), AttachmentPhase::Ready);
    }

    #[tokio::test]
    async fn test_take_ready_consumes_once() {
        let loader = AttachmentLoader::default();
        assert!(loader.take_ready().is_none());
        loader.load(&BytesSource::new("data.csv", "a,b\n1,2")).await.unwrap();

        let consumed = loader.take_ready().unwrap();
        assert_eq!(consumed.name, "data.csv");
        assert_eq!(consumed.content, "a,b\n1,2");
        assert_eq!(loader.phase(), AttachmentPhase::Idle);
        assert!(loader.take_ready().is_none());
    }

    #[tokio::test]
    async fn test_clear_failed_only_touches_error_phase() {
        let loader = AttachmentLoader::default();
        assert!(!loader.clear_failed());

        loader.load(&BytesSource::new("a.txt", "x")).await.unwrap();
        assert!(!loader.clear_failed());
        assert_eq!(loader.phase(), AttachmentPhase::Ready);

        let _ = loader.load(&BytesSource::new("bad.bin", vec![0xff])).await;
        assert_eq!(loader.phase(), AttachmentPhase::Error);
        assert!(loader.clear_failed());
        assert_eq!(loader.snapshot(), UploadedAttachment::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let loader = AttachmentLoader::default();
        let mut rx = loader.subscribe();
        loader.load(&BytesSource::new("a.txt", "x")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, AttachmentPhase::Ready);
    }

    #[tokio::test]
    async fn test_path_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        std::fs::write(&path, "# Q3 numbers").unwrap();

        let source = PathSource::open(&path).await.unwrap();
        assert_eq!(source.name(), "report.md");
        assert_eq!(source.size(), 12);

        let loader = AttachmentLoader::default();
        loader.load(&source).await.unwrap();
        assert_eq!(loader.snapshot().ready_content(), Some("# Q3 numbers"));
    }

    #[tokio::test]
    async fn test_path_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PathSource::open(dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, AttachmentError::ReadFailure(_)));

        let err = PathSource::open(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }
}
