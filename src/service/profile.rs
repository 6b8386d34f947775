use tokio::sync::broadcast;

use super::{channel, forward, TaskSlot};
use crate::models::{UserData, UserDataState};
use crate::repository::ProfileRepository;
use crate::resource::Resource;

/// Publishes profile reads and profile updates of the signed-in user.
pub struct ProfileService {
    profiles: ProfileRepository,
    profile: broadcast::Sender<Resource<UserDataState>>,
    updates: broadcast::Sender<Resource<String>>,
    fetch_task: TaskSlot,
    update_task: TaskSlot,
}

impl ProfileService {
    pub fn new(profiles: ProfileRepository) -> Self {
        Self {
            profiles,
            profile: channel(),
            updates: channel(),
            fetch_task: TaskSlot::default(),
            update_task: TaskSlot::default(),
        }
    }

    pub fn subscribe_profile(&self) -> broadcast::Receiver<Resource<UserDataState>> {
        self.profile.subscribe()
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<Resource<String>> {
        self.updates.subscribe()
    }

    pub fn fetch_profile(&self) {
        let stream = self.profiles.fetch_profile();
        let sender = self.profile.clone();
        self.fetch_task.replace(tokio::spawn(async move {
            forward(stream, &sender).await;
        }));
    }

    /// Publishes `"Updated Successfully.."` on success.
    pub fn update_profile(&self, draft: UserData) {
        let stream = self.profiles.update_profile(draft);
        let sender = self.updates.clone();
        self.update_task.replace(tokio::spawn(async move {
            forward(stream, &sender).await;
        }));
    }
}
