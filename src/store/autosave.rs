//! # Background Autosave
//!
//! [`Autosaver`] moves a [`DataStore`] onto a dedicated writer thread:
//!
//! ```text
//!  Workspace ──save(pages)──▶ channel ──▶ writer thread ──▶ PageStore ──▶ BlobStore
//!                 (returns at once)          (owns the store)
//! ```
//!
//! - **Single writer**: the store lives on exactly one thread, so two saves can
//!   never overlap. A save requested while another is being written waits in
//!   the channel.
//! - **Trailing debounce**: a save is written once no new request has arrived
//!   for the debounce interval. Saves that arrive inside the interval replace
//!   the pending snapshot (they are full snapshots, so only the latest matters).
//! - **Deferred failures**: a background write that fails is logged and kept;
//!   the next `save` call reports it. The failed snapshot is not retried; the
//!   next save carries the complete state anyway.
//!
//! `load`, `export_blob` and `flush` write any pending snapshot first and then
//! answer on a reply channel. Dropping the autosaver writes what is pending and
//! joins the thread.

use super::DataStore;
use crate::error::StorageError;
use crate::model::Page;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

type Reply<T> = Sender<Result<T, StorageError>>;
type FailureSlot = Arc<Mutex<Option<StorageError>>>;

enum Request {
    Save(Vec<Page>),
    Flush(Reply<()>),
    Load(Reply<Vec<Page>>),
    Export(Reply<Vec<u8>>),
    Shutdown,
}

pub struct Autosaver {
    request_tx: Sender<Request>,
    thread_handle: Option<JoinHandle<()>>,
    failure: FailureSlot,
}

impl Autosaver {
    /// Spawns the writer thread; ownership of `store` moves to it.
    pub fn spawn<S>(store: S, debounce: Duration) -> Result<Self, StorageError>
    where
        S: DataStore + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel();
        let failure = FailureSlot::default();
        let worker_failure = Arc::clone(&failure);

        let thread_handle = thread::Builder::new()
            .name("folio-autosave".to_string())
            .spawn(move || run_writer(store, request_rx, debounce, worker_failure))?;

        Ok(Self {
            request_tx,
            thread_handle: Some(thread_handle),
            failure,
        })
    }

    fn send(&self, request: Request) -> Result<(), StorageError> {
        self.request_tx
            .send(request)
            .map_err(|_| StorageError::Backend("autosave writer has shut down".to_string()))
    }

    fn ask<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T, StorageError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(request(reply_tx))?;
        reply_rx.recv().map_err(|_| {
            StorageError::Backend("autosave writer dropped the reply channel".to_string())
        })?
    }

    fn take_failure(&self) -> Option<StorageError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl DataStore for Autosaver {
    /// Queues `pages` and reports the last background failure, if any.
    fn save(&mut self, pages: &[Page]) -> Result<(), StorageError> {
        self.send(Request::Save(pages.to_vec()))?;
        match self.take_failure() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn load(&mut self) -> Result<Vec<Page>, StorageError> {
        self.ask(Request::Load)
    }

    fn export_blob(&mut self) -> Result<Vec<u8>, StorageError> {
        self.ask(Request::Export)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.ask(Request::Flush)
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        let _ = self.request_tx.send(Request::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("autosave writer panicked");
            }
        }
    }
}

fn run_writer<S: DataStore>(
    mut store: S,
    request_rx: Receiver<Request>,
    debounce: Duration,
    failure: FailureSlot,
) {
    debug!(debounce_ms = debounce.as_millis() as u64, "autosave writer started");
    let mut pending: Option<Vec<Page>> = None;

    loop {
        let request = if pending.is_some() {
            match request_rx.recv_timeout(debounce) {
                Ok(request) => request,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(Err(e)) = write_pending(&mut store, &mut pending, &failure) {
                        warn!(error = %e, "background save failed");
                        record(&failure, e);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => Request::Shutdown,
            }
        } else {
            match request_rx.recv() {
                Ok(request) => request,
                Err(_) => Request::Shutdown,
            }
        };

        match request {
            Request::Save(pages) => {
                if pending.replace(pages).is_some() {
                    debug!("coalesced pending save");
                }
            }
            Request::Flush(reply) => {
                let result = match write_pending(&mut store, &mut pending, &failure) {
                    Some(result) => result,
                    None => match take(&failure) {
                        Some(e) => Err(e),
                        None => Ok(()),
                    },
                };
                let _ = reply.send(result);
            }
            Request::Load(reply) => {
                settle(&mut store, &mut pending, &failure);
                let _ = reply.send(store.load());
            }
            Request::Export(reply) => {
                settle(&mut store, &mut pending, &failure);
                let _ = reply.send(store.export_blob());
            }
            Request::Shutdown => {
                settle(&mut store, &mut pending, &failure);
                break;
            }
        }
    }

    debug!("autosave writer stopped");
}

/// Writes the pending snapshot, if there is one. A successful write clears any
/// recorded failure since the durable state is now current.
fn write_pending<S: DataStore>(
    store: &mut S,
    pending: &mut Option<Vec<Page>>,
    failure: &FailureSlot,
) -> Option<Result<(), StorageError>> {
    let pages = pending.take()?;
    let result = store.save(&pages);
    if result.is_ok() {
        take(failure);
    }
    Some(result)
}

fn settle<S: DataStore>(store: &mut S, pending: &mut Option<Vec<Page>>, failure: &FailureSlot) {
    if let Some(Err(e)) = write_pending(store, pending, failure) {
        warn!(error = %e, "background save failed");
        record(failure, e);
    }
}

fn record(failure: &FailureSlot, error: StorageError) {
    *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
}

fn take(failure: &FailureSlot) -> Option<StorageError> {
    failure.lock().unwrap_or_else(PoisonError::into_inner).take()
}
