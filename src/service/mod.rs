//! Long-lived services that publish operation state to subscribers.
//!
//! Each service owns a `broadcast` channel per kind of result. Subscribe
//! before triggering an operation to see its `Loading` state. Starting an
//! operation while the previous one of the same kind is still running
//! cancels the previous one.

mod favorites;
mod listing;
mod profile;

pub use favorites::FavoritesService;
pub use listing::ListingService;
pub use profile::ProfileService;

use futures::StreamExt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::resource::{Resource, ResourceStream};

/// Buffer of each service channel.
const CHANNEL_CAPACITY: usize = 16;

fn channel<T: Clone>() -> broadcast::Sender<T> {
    let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
    sender
}

/// Holds at most one running task. Replacing or dropping the slot aborts
/// the task it held.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSlot {
    pub(crate) fn replace(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.lock().replace(handle) {
            if !previous.is_finished() {
                tracing::debug!("Cancelling superseded task");
            }
            previous.abort();
        }
    }

    pub(crate) fn abort(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Sends every state of `stream` to `sender`. Returns the terminal state.
async fn forward<T: Clone>(
    mut stream: ResourceStream<T>,
    sender: &broadcast::Sender<Resource<T>>,
) -> Option<Resource<T>> {
    let mut last = None;
    while let Some(state) = stream.next().await {
        // No subscribers is not an error.
        let _ = sender.send(state.clone());
        last = Some(state);
    }
    last
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_replace_aborts_previous_task() {
        let slot = TaskSlot::default();
        let first = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        let first_abort = first.abort_handle();
        slot.replace(first);
        assert!(slot.is_running());

        slot.replace(tokio::spawn(async {}));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(first_abort.is_finished());
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let handle = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        let abort = handle.abort_handle();
        {
            let slot = TaskSlot::default();
            slot.replace(handle);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_forward_publishes_every_state() {
        let sender = channel::<Resource<u8>>();
        let mut receiver = sender.subscribe();

        let last = forward(crate::resource::resource_stream(async { Ok(3) }), &sender).await;
        assert_eq!(last, Some(Resource::Success(3)));
        assert_eq!(receiver.recv().await.unwrap(), Resource::Loading);
        assert_eq!(receiver.recv().await.unwrap(), Resource::Success(3));
    }
}
