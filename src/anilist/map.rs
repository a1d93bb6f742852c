use anyhow::anyhow;

use super::client::{Media, MediaTitle};
use super::{AiringEpisode, MediaState};

impl TryFrom<Media> for MediaState {
    type Error = anyhow::Error;

    fn try_from(media: Media) -> Result<Self, Self::Error> {
        let next_airing_episode = match media.next_airing_episode {
            Some(next) if next.episode < 1 => {
                return Err(anyhow!(
                    "AniList reported non-positive next episode {} for media {}",
                    next.episode,
                    media.id
                ));
            }
            Some(next) => Some(AiringEpisode {
                episode: next.episode,
                airing_at: next.airing_at,
            }),
            None => None,
        };

        let site_url = media
            .site_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("https://anilist.co/anime/{}/", media.id));

        Ok(MediaState {
            media_id: media.id,
            title: choose_title(&media.title.unwrap_or_default()),
            site_url,
            next_airing_episode,
            // Long-running series report null until they end.
            total_episodes: media.episodes.unwrap_or(0),
        })
    }
}

fn choose_title(title: &MediaTitle) -> String {
    title
        .romaji
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown Title")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::super::client::NextAiringEpisode;
    use super::*;

    fn media(next: Option<(i64, i64)>, episodes: Option<i64>) -> Media {
        Media {
            id: 21,
            title: Some(MediaTitle {
                romaji: Some(" ONE PIECE ".to_string()),
            }),
            site_url: None,
            next_airing_episode: next.map(|(episode, airing_at)| NextAiringEpisode {
                episode,
                airing_at,
            }),
            episodes,
        }
    }

    #[test]
    fn maps_media_into_state() {
        let state = MediaState::try_from(media(Some((1100, 1_700_000_000)), None)).expect("state");
        assert_eq!(state.title, "ONE PIECE");
        assert_eq!(state.site_url, "https://anilist.co/anime/21/");
        assert_eq!(
            state.next_airing_episode,
            Some(AiringEpisode {
                episode: 1100,
                airing_at: 1_700_000_000
            })
        );
        assert_eq!(state.total_episodes, 0);
    }

    #[test]
    fn rejects_non_positive_next_episode() {
        assert!(MediaState::try_from(media(Some((0, 1)), Some(3))).is_err());
    }

    #[test]
    fn falls_back_to_unknown_title() {
        let mut m = media(None, Some(12));
        m.title = None;
        let state = MediaState::try_from(m).expect("state");
        assert_eq!(state.title, "Unknown Title");
        assert_eq!(state.total_episodes, 12);
    }
}
