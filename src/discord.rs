use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::BotResult;

const DISCORD_API: &str = "https://discord.com/api/v10";

pub const COMMAND_NAME: &str = "onepiece";
pub const COMMAND_DESCRIPTION: &str = "Get the time until the next One Piece episode airs";

/// The narrow slice of Discord the bot needs after startup.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, channel_id: &str, content: &str) -> BotResult<()>;
    /// Replaces the deferred "thinking..." response of an interaction.
    async fn edit_interaction_reply(
        &self,
        application_id: &str,
        interaction_token: &str,
        content: &str,
    ) -> BotResult<()>;
}

#[derive(Debug, Clone)]
pub struct DiscordClient {
    client: Client,
    auth: HeaderValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationInfo {
    pub id: String,
    /// Hex-encoded Ed25519 key used to sign interaction requests.
    pub verify_key: String,
}

#[derive(Debug, Deserialize)]
struct PartialGuild {
    id: String,
}

impl DiscordClient {
    pub fn new(token: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bot {}", token))
            .context("Discord token is not a valid header value")?;
        auth.set_sensitive(true);

        let user_agent = format!(
            "DiscordBot (onepiece_notifier, {})",
            env!("CARGO_PKG_VERSION")
        );
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build Discord HTTP client")?;
        Ok(Self { client, auth })
    }

    fn bot(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, self.auth.clone())
    }

    pub async fn fetch_application(&self) -> Result<ApplicationInfo> {
        let req = self.bot(self.client.get(format!("{DISCORD_API}/applications/@me")));
        self.send_json(req, "application info").await
    }

    pub async fn first_guild_id(&self) -> Result<Option<String>> {
        let req = self.bot(
            self.client
                .get(format!("{DISCORD_API}/users/@me/guilds"))
                .query(&[("limit", "1")]),
        );
        let guilds: Vec<PartialGuild> = self.send_json(req, "guild list").await?;
        Ok(guilds.into_iter().next().map(|g| g.id))
    }

    pub async fn register_command(&self, application_id: &str, guild_id: &str) -> Result<()> {
        let url = format!("{DISCORD_API}/applications/{application_id}/guilds/{guild_id}/commands");
        let body = json!({
            "name": COMMAND_NAME,
            "description": COMMAND_DESCRIPTION,
            "type": 1
        });
        let req = self.bot(self.client.post(url).json(&body));
        self.send_checked(req, "command registration").await
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let res = req
            .send()
            .await
            .with_context(|| format!("Discord {} request failed", what))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("Failed to read Discord {} body", what))?;
        if !status.is_success() {
            return Err(anyhow!(
                "Discord {} HTTP error (status {}): {}",
                what,
                status,
                text
            ));
        }
        serde_json::from_str(&text).with_context(|| format!("Failed to parse Discord {} JSON", what))
    }

    async fn send_checked(&self, req: RequestBuilder, what: &str) -> Result<()> {
        let res = req
            .send()
            .await
            .with_context(|| format!("Discord {} request failed", what))?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Discord {} HTTP error (status {}): {}",
                what,
                status,
                text
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatApi for DiscordClient {
    async fn send_message(&self, channel_id: &str, content: &str) -> BotResult<()> {
        let url = format!("{DISCORD_API}/channels/{channel_id}/messages");
        let req = self.bot(self.client.post(url).json(&json!({ "content": content })));
        Ok(self.send_checked(req, "message send").await?)
    }

    async fn edit_interaction_reply(
        &self,
        application_id: &str,
        interaction_token: &str,
        content: &str,
    ) -> BotResult<()> {
        // Interaction webhooks authenticate through the token in the path.
        let url =
            format!("{DISCORD_API}/webhooks/{application_id}/{interaction_token}/messages/@original");
        let req = self.client.patch(url).json(&json!({ "content": content }));
        Ok(self.send_checked(req, "interaction reply").await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_info_ignores_extra_fields() {
        let info: ApplicationInfo = serde_json::from_value(serde_json::json!({
            "id": "1234",
            "name": "Going Merry",
            "verify_key": "ab".repeat(32),
            "bot_public": true
        }))
        .expect("application info");
        assert_eq!(info.id, "1234");
        assert_eq!(info.verify_key.len(), 64);
    }

    #[test]
    fn rejects_token_with_newline() {
        assert!(DiscordClient::new("bad\ntoken").is_err());
    }
}
