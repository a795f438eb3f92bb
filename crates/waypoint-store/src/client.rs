// waypoint-store/src/client.rs
// ============================================================================
// Module: DataStore Client
// Description: Single-owner datastore connection behind a request queue.
// Purpose: Serialize every statement against the shared backend session.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The backend protocol session is not safe for concurrent use, so the
//! [`DataStoreClient`] moves the [`Backend`] into one worker thread and talks to
//! it only through a channel. Each request carries its own reply channel and
//! the worker processes requests strictly in arrival order, one at a time.
//! Handles are cheap to clone; the worker stops once the last handle drops.
//!
//! There is no timeout or retry here: a stalled backend stalls every caller
//! waiting in the queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::result::ResultSet;
use crate::result::Statement;
use crate::sqlite::SqliteBackend;
use crate::sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the datastore worker thread.
const WORKER_THREAD_NAME: &str = "waypoint-datastore";

// ============================================================================
// SECTION: Backend Trait
// ============================================================================

/// Connected backend session executing one statement at a time.
///
/// Implementations are only ever driven from the client's worker thread, so
/// they may assume exclusive access.
pub trait Backend: Send + 'static {
    /// Executes a statement with already arity-checked parameters.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] with the backend's diagnostic text on failure.
    fn execute(&mut self, statement: &Statement, params: &[String])
    -> Result<ResultSet, QueryError>;
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Queued request handed to the worker.
struct Job {
    /// Statement to execute.
    statement: Statement,
    /// Owned statement parameters.
    params: Vec<String>,
    /// One-shot reply channel.
    reply: mpsc::SyncSender<Result<ResultSet, QueryError>>,
}

/// Cloneable handle to the serialized datastore connection.
#[derive(Clone)]
pub struct DataStoreClient {
    /// Shared queue and worker state.
    inner: Arc<ClientInner>,
}

/// Queue sender and worker handle shared by all client handles.
struct ClientInner {
    /// Request queue; `None` only while shutting down.
    queue: Option<mpsc::Sender<Job>>,
    /// Requests queued or executing.
    pending: Arc<AtomicUsize>,
    /// Worker thread owning the backend.
    worker: Option<JoinHandle<()>>,
}

impl DataStoreClient {
    /// Starts the worker thread and hands it exclusive ownership of `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Worker`] when the worker thread cannot be
    /// spawned.
    pub fn start<B: Backend>(backend: B) -> Result<Self, ConnectionError> {
        let (queue, requests) = mpsc::channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(backend, &requests, &worker_pending))
            .map_err(|err| ConnectionError::Worker(err.to_string()))?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                queue: Some(queue),
                pending,
                worker: Some(worker),
            }),
        })
    }

    /// Opens the bundled `SQLite` backend and starts the client over it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the database cannot be opened or
    /// initialized.
    pub fn open_sqlite(config: &SqliteStoreConfig) -> Result<Self, ConnectionError> {
        let backend = SqliteBackend::open(config)?;
        Self::start(backend)
    }

    /// Executes `statement` with `params`, waiting for its turn in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Arity`] when the parameter count does not match
    /// the statement, [`QueryError::Unavailable`] when the worker is gone, and
    /// [`QueryError::Backend`] for backend failures.
    pub fn execute(&self, statement: &Statement, params: &[&str]) -> Result<ResultSet, QueryError> {
        if params.len() != statement.arity() {
            return Err(QueryError::Arity {
                statement: statement.label(),
                expected: statement.arity(),
                actual: params.len(),
            });
        }
        let queue = self
            .inner
            .queue
            .as_ref()
            .ok_or_else(|| QueryError::Unavailable("datastore client shut down".to_string()))?;
        let (reply, response) = mpsc::sync_channel(1);
        let job = Job {
            statement: *statement,
            params: params.iter().map(|value| (*value).to_string()).collect(),
            reply,
        };
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        if queue.send(job).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(QueryError::Unavailable("datastore worker stopped".to_string()));
        }
        response
            .recv()
            .map_err(|_| QueryError::Unavailable("datastore worker dropped request".to_string()))?
    }

    /// Returns the number of requests queued or executing.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        drop(self.queue.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Drains the request queue against the owned backend.
fn run_worker<B: Backend>(mut backend: B, requests: &mpsc::Receiver<Job>, pending: &AtomicUsize) {
    while let Ok(job) = requests.recv() {
        let result = backend.execute(&job.statement, &job.params);
        pending.fetch_sub(1, Ordering::SeqCst);
        let _ = job.reply.send(result);
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures establishing the datastore connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Filesystem failure around the store path.
    #[error("datastore io error: {0}")]
    Io(String),
    /// Backend refused or failed to open the connection.
    #[error("datastore connection failed: {0}")]
    Open(String),
    /// Schema creation or verification failed.
    #[error("datastore schema error: {0}")]
    Schema(String),
    /// Connection descriptor rejected before connecting.
    #[error("datastore config invalid: {0}")]
    Invalid(String),
    /// Worker thread could not be started.
    #[error("datastore worker failed to start: {0}")]
    Worker(String),
}

impl ConnectionError {
    /// Builds an [`ConnectionError::Invalid`] for a store path.
    pub(crate) fn invalid_path(path: &Path, reason: &str) -> Self {
        Self::Invalid(format!("{}: {reason}", path.display()))
    }
}

/// Per-statement failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Backend rejected or failed the statement.
    #[error("Query failed: {0}")]
    Backend(String),
    /// Caller supplied the wrong number of parameters.
    #[error("statement {statement} expects {expected} parameters, got {actual}")]
    Arity {
        /// Statement label.
        statement: &'static str,
        /// Declared parameter count.
        expected: usize,
        /// Supplied parameter count.
        actual: usize,
    },
    /// The worker is no longer serving requests.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
