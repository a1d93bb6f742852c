use super::MediaState;

/// The episode that is airing now (or aired most recently).
///
/// AniList reports the upcoming episode, so the current one is the episode
/// before it. With nothing scheduled the last known episode is current. A
/// result of 0 means nothing has aired yet.
pub fn resolve_current_episode(state: &MediaState) -> i64 {
    match state.next_airing_episode {
        Some(next) => next.episode - 1,
        None => state.total_episodes,
    }
}

#[cfg(test)]
mod tests {
    use super::super::AiringEpisode;
    use super::*;

    fn state(next: Option<i64>, total: i64) -> MediaState {
        MediaState {
            media_id: 21,
            title: "ONE PIECE".to_string(),
            site_url: "https://anilist.co/anime/21/".to_string(),
            next_airing_episode: next.map(|episode| AiringEpisode {
                episode,
                airing_at: 1_700_000_000,
            }),
            total_episodes: total,
        }
    }

    #[test]
    fn previous_episode_is_current_when_one_is_scheduled() {
        for e in [2, 57, 1100] {
            assert_eq!(resolve_current_episode(&state(Some(e), 9999)), e - 1);
        }
    }

    #[test]
    fn total_episodes_when_nothing_is_scheduled() {
        for n in [0, 12, 1100] {
            assert_eq!(resolve_current_episode(&state(None, n)), n);
        }
    }

    #[test]
    fn first_episode_upcoming_resolves_to_zero() {
        assert_eq!(resolve_current_episode(&state(Some(1), 0)), 0);
    }
}
