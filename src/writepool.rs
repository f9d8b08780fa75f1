//! Bounded-concurrency wrapper over `Storage::set`.
//!
//! Submissions return as soon as a job has been handed to the pool; they do
//! not wait for the backend to acknowledge the write. If any background
//! write fails, the first failure is latched and resurfaces the next time
//! the caller calls [`WritePool::drain`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use threadpool::ThreadPool;
use tracing::warn;

use crate::error::{OpiError, Result};
use crate::storage::Storage;

pub const DEFAULT_MAX_WRITERS: usize = 200;
pub const MIN_MAX_WRITERS: usize = 100;
pub const MAX_MAX_WRITERS: usize = 1000;

pub struct WritePool {
    pool: ThreadPool,
    storage: Arc<dyn Storage>,
    failed: Arc<AtomicBool>,
    first_error: Arc<Mutex<Option<String>>>,
}

impl WritePool {
    /// Build a pool with `max_writers` worker threads, clamped to
    /// `[MIN_MAX_WRITERS, MAX_MAX_WRITERS]`.
    pub fn new(storage: Arc<dyn Storage>, max_writers: usize) -> Self {
        let width = max_writers.clamp(MIN_MAX_WRITERS, MAX_MAX_WRITERS);
        WritePool {
            pool: ThreadPool::new(width),
            storage,
            failed: Arc::new(AtomicBool::new(false)),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Enqueue a write. Returns immediately; the job runs on a pool thread.
    pub fn submit(&self, key: String, value: Vec<u8>) {
        let storage = Arc::clone(&self.storage);
        let failed = Arc::clone(&self.failed);
        let first_error = Arc::clone(&self.first_error);
        self.pool.execute(move || {
            if let Err(e) = storage.set(&key, &value) {
                warn!(key = %key, error = %e, "background write failed");
                if !failed.swap(true, Ordering::SeqCst) {
                    *first_error.lock().expect("write pool error lock poisoned") = Some(e.to_string());
                }
            }
        });
    }

    /// Block until every submitted write has completed, then surface the
    /// first latched error, if any.
    pub fn drain(&self) -> Result<()> {
        self.pool.join();
        if self.failed.load(Ordering::SeqCst) {
            let msg = self
                .first_error
                .lock()
                .expect("write pool error lock poisoned")
                .clone()
                .unwrap_or_else(|| "unknown write pool failure".to_string());
            return Err(OpiError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg)));
        }
        Ok(())
    }
}
