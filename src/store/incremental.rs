//! Incremental Set
//!
//! Streams one value across several writes. The session owns the store's
//! incremental-set lock for its whole lifetime, so no other mutation can
//! interleave; readers keep seeing the previous value until `finalize`.

use parking_lot::MutexGuard;

use crate::device::BlockDevice;
use crate::error::{Result, TdbError};

use super::inner::SetSession;
use super::TdbStore;

/// In-progress streamed write of one key
///
/// Dropping the handle without calling [`finalize`](Self::finalize)
/// discards the write; the key keeps its previous value.
pub struct IncrementalSet<'a, D: BlockDevice> {
    store: &'a TdbStore<D>,
    session: Option<SetSession>,
    _session_lock: MutexGuard<'a, ()>,
}

impl<'a, D: BlockDevice> IncrementalSet<'a, D> {
    pub(crate) fn new(store: &'a TdbStore<D>, session: SetSession, lock: MutexGuard<'a, ()>) -> Self {
        Self {
            store,
            session: Some(session),
            _session_lock: lock,
        }
    }

    /// Key being written
    pub fn key(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.key.as_str())
    }

    /// Bytes still expected before `finalize`
    pub fn remaining(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.writer.data_remaining())
    }

    /// Append the next chunk of the value.
    ///
    /// Writing past the size declared at `set_start` fails with
    /// `InvalidSize` and leaves the session usable. A media failure ends
    /// the session.
    pub fn add_data(&mut self, data: &[u8]) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| TdbError::InvalidArgument("session already closed".to_string()))?;

        let mut inner = self.store.inner.lock();
        match inner.write_data(session, data) {
            Ok(()) => Ok(()),
            Err(e @ TdbError::InvalidSize(_)) => Err(e),
            Err(e) => {
                if let Some(session) = self.session.take() {
                    inner.abandon_set(session)?;
                }
                Err(e)
            }
        }
    }

    /// Commit the value. Behaves as one atomic `set` from the readers' side.
    pub fn finalize(mut self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or_else(|| TdbError::InvalidArgument("session already closed".to_string()))?;

        let mut inner = self.store.inner.lock();
        let missing = session.writer.data_remaining();
        if missing != 0 {
            inner.abandon_set(session)?;
            return Err(TdbError::InvalidSize(format!(
                "finalized with {} of the declared bytes missing",
                missing
            )));
        }
        inner.commit_set(session)
    }
}

impl<D: BlockDevice> Drop for IncrementalSet<'_, D> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.store.inner.lock().abandon_set(session) {
                tracing::warn!(error = %e, "Failed to discard unfinished write");
            }
        }
    }
}
