//! Streaming consumption of queued session events.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use super::{RealtimeSession, Shared};
use crate::error::{RealtimeError, Result};
use crate::events::RealtimeUpdate;
use crate::transport::ConnectionState;

/// Marks the single active reader. Dropping it stops queueing and empties the queue.
struct ReaderGuard {
    shared: Arc<Shared>,
}

impl ReaderGuard {
    fn acquire(shared: &Arc<Shared>) -> Result<Self> {
        let mut state = shared.lock();
        if state.collecting {
            return Err(RealtimeError::InvalidState(
                "another reader is already consuming session updates".into(),
            ));
        }
        if state.connection != ConnectionState::Open {
            return Err(RealtimeError::ConnectionNotOpen(state.connection));
        }
        state.collecting = true;
        Ok(Self {
            shared: Arc::clone(shared),
        })
    }

    /// Take every queued `T` in arrival order. Other events are discarded.
    fn drain<T: RealtimeUpdate>(&self) -> (Vec<T>, bool) {
        let mut state = self.shared.lock();
        let mut matched = Vec::new();
        let mut skipped = 0usize;
        for event in state.queue.drain(..) {
            match T::extract(event) {
                Ok(update) => matched.push(update),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::trace!(skipped, "discarded events not matching the reader");
        }
        (matched, state.connection == ConnectionState::Open)
    }

    async fn wait(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = self.shared.arrivals.notified() => {}
            _ = cancel.cancelled() => {}
        }
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.collecting = false;
        state.queue.clear();
    }
}

impl RealtimeSession {
    /// Call `handler` with every session event of type `T` until the
    /// session leaves `Open` or `cancel` fires.
    ///
    /// Events are queued only while a reader is active, and events that are
    /// not a `T` are discarded. A second concurrent reader fails with
    /// [`RealtimeError::InvalidState`].
    ///
    /// ```no_run
    /// # use openai_realtime::prelude::*;
    /// # async fn example(session: &RealtimeSession) -> openai_realtime::error::Result<()> {
    /// let cancel = CancellationToken::new();
    /// session
    ///     .receive_updates::<TextDeltaEvent, _>(|delta| print!("{}", delta.delta), &cancel)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn receive_updates<T, F>(&self, mut handler: F, cancel: &CancellationToken) -> Result<()>
    where
        T: RealtimeUpdate,
        F: FnMut(T),
    {
        let reader = ReaderGuard::acquire(&self.shared)?;
        loop {
            let (batch, open) = reader.drain::<T>();
            for update in batch {
                handler(update);
            }
            if !open || cancel.is_cancelled() {
                return Ok(());
            }
            reader.wait(cancel).await;
        }
    }

    /// [`receive_updates`](Self::receive_updates) as a stream.
    ///
    /// Yields a single error when another reader is active.
    pub fn updates<T: RealtimeUpdate>(&self, cancel: CancellationToken) -> BoxStream<'static, Result<T>> {
        let shared = Arc::clone(&self.shared);
        let stream = async_stream::stream! {
            let reader = match ReaderGuard::acquire(&shared) {
                Ok(reader) => reader,
                Err(error) => {
                    yield Err(error);
                    return;
                }
            };
            loop {
                let (batch, open) = reader.drain::<T>();
                for update in batch {
                    yield Ok(update);
                }
                if !open || cancel.is_cancelled() {
                    break;
                }
                reader.wait(&cancel).await;
            }
        };
        Box::pin(stream)
    }
}
