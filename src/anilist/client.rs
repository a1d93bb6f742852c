use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::TRACKED_MEDIA_ID;

#[derive(Debug, Clone)]
pub struct AniListClient {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
    status: Option<i32>,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

impl AniListClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let user_agent = format!("onepiece_notifier/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build AniList HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub(crate) async fn fetch_media(&self) -> Result<Media> {
        let query = format!(
            r#"
query {{
  Media(id: {TRACKED_MEDIA_ID}, type: ANIME) {{
    id
    title {{ romaji }}
    siteUrl
    nextAiringEpisode {{
      episode
      airingAt
    }}
    episodes
  }}
}}
"#
        );

        let res = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query }))
            .send()
            .await
            .context("AniList request failed")?;

        let status = res.status();
        let bytes = res.bytes().await.context("Failed to read AniList body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "AniList HTTP error (status {}): {}",
                status,
                String::from_utf8_lossy(&bytes)
            ));
        }

        parse_media_response(&bytes)
    }
}

pub(crate) fn parse_media_response(bytes: &[u8]) -> Result<Media> {
    let parsed: GraphQlResponse<Data> =
        serde_json::from_slice(bytes).context("Failed to parse AniList JSON")?;
    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        let msg = errors
            .into_iter()
            .map(|e| match e.status {
                Some(s) => format!("{} (status {})", e.message, s),
                None => e.message,
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(anyhow!("AniList GraphQL error: {}", msg));
    }

    parsed
        .data
        .and_then(|d| d.media)
        .ok_or_else(|| anyhow!("AniList returned no media for id {}", TRACKED_MEDIA_ID))
}

#[derive(Debug, Deserialize)]
pub(crate) struct Media {
    pub(crate) id: i64,
    pub(crate) title: Option<MediaTitle>,
    #[serde(rename = "siteUrl")]
    pub(crate) site_url: Option<String>,
    #[serde(rename = "nextAiringEpisode")]
    pub(crate) next_airing_episode: Option<NextAiringEpisode>,
    pub(crate) episodes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MediaTitle {
    pub(crate) romaji: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextAiringEpisode {
    pub(crate) episode: i64,
    #[serde(rename = "airingAt")]
    pub(crate) airing_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_media_with_next_airing_episode() {
        let body = json!({
            "data": {
                "Media": {
                    "id": 21,
                    "title": { "romaji": "ONE PIECE" },
                    "siteUrl": "https://anilist.co/anime/21",
                    "nextAiringEpisode": { "episode": 1100, "airingAt": 1700000000 },
                    "episodes": null
                }
            }
        })
        .to_string();
        let media = parse_media_response(body.as_bytes()).expect("media");
        assert_eq!(media.id, 21);
        let next = media.next_airing_episode.expect("next airing");
        assert_eq!((next.episode, next.airing_at), (1100, 1700000000));
        assert_eq!(media.episodes, None);
    }

    #[test]
    fn surfaces_graphql_errors() {
        let body = json!({
            "data": { "Media": null },
            "errors": [{ "message": "Not Found.", "status": 404 }]
        })
        .to_string();
        let err = parse_media_response(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Not Found. (status 404)"));
    }

    #[test]
    fn missing_media_is_an_error() {
        let body = json!({ "data": { "Media": null } }).to_string();
        assert!(parse_media_response(body.as_bytes()).is_err());
    }

    #[test]
    fn rejects_mistyped_fields() {
        let body = json!({
            "data": {
                "Media": {
                    "id": 21,
                    "nextAiringEpisode": { "episode": "soon", "airingAt": 1 },
                    "episodes": 10
                }
            }
        })
        .to_string();
        assert!(parse_media_response(body.as_bytes()).is_err());
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(parse_media_response(b"<html>rate limited</html>").is_err());
    }
}
