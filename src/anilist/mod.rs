use async_trait::async_trait;

use crate::error::BotResult;

mod client;
mod map;
mod resolve;

pub use client::AniListClient;
pub use resolve::resolve_current_episode;

/// AniList id of One Piece. This deployment tracks exactly one series.
pub const TRACKED_MEDIA_ID: i64 = 21;

#[async_trait]
pub trait AniListApi: Send + Sync {
    /// Always hits the network; nothing is cached between calls.
    async fn fetch_media_state(&self) -> BotResult<MediaState>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaState {
    pub media_id: i64,
    pub title: String,
    pub site_url: String,
    pub next_airing_episode: Option<AiringEpisode>,
    pub total_episodes: i64,
}

/// The *upcoming* episode, never the one currently airing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiringEpisode {
    pub episode: i64,
    pub airing_at: i64,
}

#[async_trait]
impl AniListApi for AniListClient {
    async fn fetch_media_state(&self) -> BotResult<MediaState> {
        let media = self.fetch_media().await?;
        Ok(MediaState::try_from(media)?)
    }
}
