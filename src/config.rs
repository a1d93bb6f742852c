use std::env;
use std::net::SocketAddr;
use tracing::info;

use crate::error::{BotError, BotResult};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3146";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub channel_id: String,
    pub anilist_endpoint: String,
    pub guild_id: Option<String>,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> BotResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> BotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let require = |key: &str| {
            get(key).ok_or_else(|| {
                BotError::Configuration(format!(
                    "Missing required environment variable: {}",
                    key
                ))
            })
        };
        let discord_token = require("DISCORD_BOT_TOKEN")?;
        let channel_id = require("CHANNEL_ID")?.trim().to_string();
        let anilist_endpoint = require("ANILIST_API")?.trim().to_string();
        info!("All required environment variables are set");

        let raw_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.trim().parse::<SocketAddr>().map_err(|e| {
            BotError::Configuration(format!("BIND_ADDR '{}' is not a socket address: {}", raw_addr, e))
        })?;

        Ok(Self {
            discord_token,
            channel_id,
            anilist_endpoint,
            guild_id: get("DISCORD_GUILD_ID").map(|g| g.trim().to_string()),
            bind_addr,
        })
    }
}
