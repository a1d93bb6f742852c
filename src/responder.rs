use tracing::{error, info};

use crate::anilist::AniListApi;
use crate::messages;

const MS_PER_DAY: i64 = 86_400_000;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_MINUTE: i64 = 60_000;

/// Builds the reply for the `/onepiece` command. Always produces a message;
/// fetch failures become a generic apology.
pub async fn next_episode_reply(anilist: &dyn AniListApi, now_ms: i64) -> String {
    let media = match anilist.fetch_media_state().await {
        Ok(m) => m,
        Err(e) => {
            error!("Error fetching next episode: {}", e);
            return messages::FETCH_FAILED.to_string();
        }
    };

    match media.next_airing_episode {
        Some(next) => {
            let delta_ms = next.airing_at.saturating_mul(1000).saturating_sub(now_ms);
            let countdown = format_countdown(delta_ms);
            info!(episode = next.episode, countdown = %countdown, "Answering countdown command");
            messages::countdown_reply(&media, next.episode, &countdown)
        }
        None => {
            info!("No upcoming episode scheduled");
            messages::no_upcoming_episode(&media)
        }
    }
}

/// Renders a millisecond delta as `1d 2h 3m`, leaving out zero parts.
/// Seconds are dropped; anything below a minute renders as an empty string.
pub fn format_countdown(delta_ms: i64) -> String {
    if delta_ms <= 0 {
        return String::new();
    }
    let days = delta_ms / MS_PER_DAY;
    let hours = (delta_ms % MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (delta_ms % MS_PER_HOUR) / MS_PER_MINUTE;

    [(days, 'd'), (hours, 'h'), (minutes, 'm')]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}
