//! De-duplication of "episode is airing" notifications.
//!
//! The state lives for the lifetime of the process only. After a restart the
//! first successful poll announces the current episode again.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotificationState {
    last_episode_notified: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Notify(i64),
    Skip,
}

impl NotificationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_episode_notified(&self) -> i64 {
        self.last_episode_notified
    }
}

/// Decides whether `current_episode` deserves an announcement.
///
/// The state is advanced as part of the decision, before any send happens, so
/// a failed send is never retried for the same episode.
pub fn maybe_notify(current_episode: i64, state: &mut NotificationState) -> Decision {
    if current_episode > 0 && current_episode > state.last_episode_notified {
        state.last_episode_notified = current_episode;
        Decision::Notify(current_episode)
    } else {
        Decision::Skip
    }
}
