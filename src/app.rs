use crate::anilist::{AniListApi, AniListClient};
use crate::config::Config;
use crate::discord::{ChatApi, DiscordClient, COMMAND_NAME};
use crate::messages;
use crate::responder::next_episode_reply;
use crate::schedule::Notifier;
use crate::tracker::NotificationState;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_SKEW_SECS: i64 = 300; // 5 minutes freshness window

const INTERACTION_PING: u8 = 1;
const INTERACTION_APPLICATION_COMMAND: u8 = 2;
const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;

#[derive(Clone)]
pub struct AppState {
    pub anilist: Arc<dyn AniListApi>,
    pub chat: Arc<dyn ChatApi>,
    pub verifying_key: VerifyingKey,
}

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    application_id: Option<String>,
    token: Option<String>,
    data: Option<CommandData>,
}

#[derive(Debug, Deserialize)]
struct CommandData {
    name: String,
}

pub async fn run(config: Config) -> Result<()> {
    let anilist: Arc<dyn AniListApi> = Arc::new(AniListClient::new(&config.anilist_endpoint)?);
    let discord = DiscordClient::new(&config.discord_token)?;

    let application = discord
        .fetch_application()
        .await
        .context("Failed to log in to Discord")?;
    info!("Logged in as application {}", application.id);
    let verifying_key = parse_verifying_key(&application.verify_key)?;

    register_command(&discord, &application.id, config.guild_id.as_deref()).await;

    let chat: Arc<dyn ChatApi> = Arc::new(discord);
    let notifier = Notifier::new(anilist.clone(), chat.clone(), config.channel_id.clone());
    let poller = tokio::spawn(notifier.clone().run_poller(NotificationState::new()));
    let alarm = tokio::spawn(notifier.run_weekly_alarm());

    let state = AppState {
        anilist,
        chat,
        verifying_key,
    };
    let app = build_router(state);

    info!("Listening for interactions on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    poller.abort();
    alarm.abort();
    served.context("Interaction server failed")
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn register_command(discord: &DiscordClient, application_id: &str, guild_id: Option<&str>) {
    let guild_id = match guild_id {
        Some(id) => Some(id.to_string()),
        None => match discord.first_guild_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to list guilds: {:#}", e);
                None
            }
        },
    };
    let Some(guild_id) = guild_id else {
        warn!("Bot is not in any guild, /{} not registered", COMMAND_NAME);
        return;
    };
    match discord.register_command(application_id, &guild_id).await {
        Ok(()) => info!("Registered /{} in guild {}", COMMAND_NAME, guild_id),
        Err(e) => warn!("Failed to register /{}: {:#}", COMMAND_NAME, e),
    }
}

async fn handle_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_fresh_timestamp(&headers) {
        warn!("Rejecting interaction: stale or missing timestamp");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !verify_discord_signature(&headers, &body, &state.verifying_key) {
        warn!("Interaction signature verification failed");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Rejecting interaction: invalid JSON body: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match interaction.kind {
        INTERACTION_PING => Json(json!({ "type": RESPONSE_PONG })).into_response(),
        INTERACTION_APPLICATION_COMMAND => handle_command(state, interaction),
        other => {
            warn!("Ignoring unsupported interaction type {}", other);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

fn handle_command(state: AppState, interaction: Interaction) -> Response {
    let name = interaction.data.as_ref().map(|d| d.name.as_str());
    if name != Some(COMMAND_NAME) {
        warn!("Received unknown command {:?}", name);
        return Json(json!({
            "type": RESPONSE_CHANNEL_MESSAGE,
            "data": { "content": messages::UNKNOWN_COMMAND }
        }))
        .into_response();
    }

    let (Some(application_id), Some(token)) = (interaction.application_id, interaction.token)
    else {
        warn!("Rejecting command without application id or token");
        return StatusCode::BAD_REQUEST.into_response();
    };

    info!("Received /{} command", COMMAND_NAME);
    tokio::spawn(async move {
        let reply = next_episode_reply(state.anilist.as_ref(), Utc::now().timestamp_millis()).await;
        if let Err(e) = state
            .chat
            .edit_interaction_reply(&application_id, &token, &reply)
            .await
        {
            error!("Failed to deliver /{} reply: {}", COMMAND_NAME, e);
        }
    });

    Json(json!({ "type": RESPONSE_DEFERRED_CHANNEL_MESSAGE })).into_response()
}

fn parse_verifying_key(hex_key: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_key.trim()).context("Interaction public key is not hex")?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("Interaction public key must be 32 bytes, got {}", bytes.len()))?;
    VerifyingKey::from_bytes(&bytes).context("Interaction public key is not a valid Ed25519 key")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn verify_discord_signature(headers: &HeaderMap, body: &[u8], key: &VerifyingKey) -> bool {
    let Some(sig_hex) = header_str(headers, "x-signature-ed25519") else {
        return false;
    };
    let Some(timestamp) = header_str(headers, "x-signature-timestamp") else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    key.verify(&message, &signature).is_ok()
}

fn is_fresh_timestamp(headers: &HeaderMap) -> bool {
    let Some(ts) = header_str(headers, "x-signature-timestamp").and_then(|v| v.parse::<i64>().ok())
    else {
        return false;
    };
    Utc::now()
        .timestamp()
        .checked_sub(ts)
        .is_some_and(|skew| skew.unsigned_abs() <= MAX_SKEW_SECS as u64)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_headers(key: &SigningKey, timestamp: &str, body: &[u8]) -> HeaderMap {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        let sig = key.sign(&message);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-signature-ed25519",
            HeaderValue::from_str(&hex::encode(sig.to_bytes())).unwrap(),
        );
        headers.insert(
            "x-signature-timestamp",
            HeaderValue::from_str(timestamp).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_valid_signature_and_rejects_tampering() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let body = br#"{"type":1}"#;
        let headers = signed_headers(&key, "1700000000", body);
        assert!(verify_discord_signature(&headers, body, &key.verifying_key()));
        assert!(!verify_discord_signature(
            &headers,
            br#"{"type":2}"#,
            &key.verifying_key()
        ));
        let other = SigningKey::from_bytes(&[8u8; 32]);
        assert!(!verify_discord_signature(&headers, body, &other.verifying_key()));
    }

    #[test]
    fn rejects_malformed_signature_header() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut headers = signed_headers(&key, "1700000000", b"{}");
        headers.insert("x-signature-ed25519", HeaderValue::from_static("zz"));
        assert!(!verify_discord_signature(&headers, b"{}", &key.verifying_key()));
        headers.remove("x-signature-ed25519");
        assert!(!verify_discord_signature(&headers, b"{}", &key.verifying_key()));
    }

    #[test]
    fn timestamp_freshness_window() {
        let mut headers = HeaderMap::new();
        assert!(!is_fresh_timestamp(&headers));
        let now = Utc::now().timestamp();
        headers.insert(
            "x-signature-timestamp",
            HeaderValue::from_str(&now.to_string()).unwrap(),
        );
        assert!(is_fresh_timestamp(&headers));
        headers.insert(
            "x-signature-timestamp",
            HeaderValue::from_str(&(now - 3600).to_string()).unwrap(),
        );
        assert!(!is_fresh_timestamp(&headers));
    }

    #[test]
    fn extreme_timestamps_are_stale_not_fatal() {
        for ts in [i64::MIN, i64::MAX, i64::MIN + 1] {
            let mut headers = HeaderMap::new();
            headers.insert(
                "x-signature-timestamp",
                HeaderValue::from_str(&ts.to_string()).unwrap(),
            );
            assert!(!is_fresh_timestamp(&headers), "{}", ts);
        }
    }

    #[test]
    fn parses_public_key_from_application_info() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let hex_key = hex::encode(key.verifying_key().to_bytes());
        let parsed = parse_verifying_key(&hex_key).expect("key");
        assert_eq!(parsed, key.verifying_key());
        assert!(parse_verifying_key("abcd").is_err());
        assert!(parse_verifying_key("not hex").is_err());
    }
}
