use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use gaffer_core::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use gaffer_core::errors::ApplicationError;

use crate::commands::{CommandDefinition, UserRef};
use crate::embeds::OutboundMessage;

const API_BASE: &str = "https://discord.com/api/v10";
const MEMBER_PAGE_LIMIT: usize = 1000;
const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildMember {
    pub user: UserRef,
    pub role_ids: Vec<RoleId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildRole {
    pub id: RoleId,
    pub name: String,
    pub color: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    /// Absent for DM channels.
    pub guild_id: Option<GuildId>,
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("platform request to {endpoint} failed: {source}")]
    Transport { endpoint: String, source: reqwest::Error },
    #[error("platform request to {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("platform response from {endpoint} could not be decoded: {source}")]
    Decode { endpoint: String, source: reqwest::Error },
}

impl From<RestError> for ApplicationError {
    fn from(error: RestError) -> Self {
        ApplicationError::Platform(error.to_string())
    }
}

/// REST egress to the platform. Every mutation and fetch the bot performs
/// goes through this seam; handlers and services only ever see the trait.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    async fn create_dm_channel(&self, user: &UserId) -> Result<ChannelId, RestError>;
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<MessageId, RestError>;
    async fn edit_message(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
        message: &OutboundMessage,
    ) -> Result<(), RestError>;
    async fn fetch_channel(&self, channel: &ChannelId) -> Result<ChannelInfo, RestError>;
    async fn fetch_member(&self, guild: &GuildId, user: &UserId) -> Result<GuildMember, RestError>;
    /// Full membership listing, paginated; never served from a cache.
    async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>, RestError>;
    async fn list_roles(&self, guild: &GuildId) -> Result<Vec<GuildRole>, RestError>;
    async fn add_member_role(
        &self,
        guild: &GuildId,
        user: &UserId,
        role: &RoleId,
    ) -> Result<(), RestError>;
    async fn remove_member_role(
        &self,
        guild: &GuildId,
        user: &UserId,
        role: &RoleId,
    ) -> Result<(), RestError>;
    /// Follow-up message on an acknowledged interaction.
    async fn interaction_followup(
        &self,
        interaction_token: &str,
        message: &OutboundMessage,
    ) -> Result<(), RestError>;
    async fn overwrite_commands(&self, definitions: &[CommandDefinition]) -> Result<(), RestError>;
}

pub struct RestClient {
    http: Client,
    bot_token: SecretString,
    application_id: OnceCell<String>,
}

impl RestClient {
    pub fn new(bot_token: SecretString, application_id: Option<String>) -> Self {
        let cell = OnceCell::new();
        if let Some(id) = application_id {
            // Seeding can only fail if the cell is already set; it is not.
            let _ = cell.set(id);
        }
        Self { http: Client::new(), bot_token, application_id: cell }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token.expose_secret())
    }

    async fn application_id(&self) -> Result<&str, RestError> {
        let id = self
            .application_id
            .get_or_try_init(|| async {
                let endpoint = format!("{API_BASE}/oauth2/applications/@me");
                let response = self
                    .http
                    .get(&endpoint)
                    .header("Authorization", self.auth_header())
                    .send()
                    .await
                    .map_err(|source| RestError::Transport { endpoint: endpoint.clone(), source })?;
                let response = check_status(endpoint.clone(), response)?;
                let payload: ApplicationPayload = response
                    .json()
                    .await
                    .map_err(|source| RestError::Decode { endpoint, source })?;
                Ok(payload.id)
            })
            .await?;
        Ok(id)
    }

    async fn get_json<T>(&self, endpoint: String) -> Result<T, RestError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(&endpoint)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|source| RestError::Transport { endpoint: endpoint.clone(), source })?;
        let response = check_status(endpoint.clone(), response)?;
        response.json().await.map_err(|source| RestError::Decode { endpoint, source })
    }

    async fn post_json<T>(&self, endpoint: String, body: &Value) -> Result<T, RestError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(&endpoint)
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(|source| RestError::Transport { endpoint: endpoint.clone(), source })?;
        let response = check_status(endpoint.clone(), response)?;
        response.json().await.map_err(|source| RestError::Decode { endpoint, source })
    }

    async fn send_without_body(
        &self,
        method: reqwest::Method,
        endpoint: String,
    ) -> Result<(), RestError> {
        let response = self
            .http
            .request(method, &endpoint)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|source| RestError::Transport { endpoint: endpoint.clone(), source })?;
        check_status(endpoint, response)?;
        Ok(())
    }
}

fn check_status(
    endpoint: String,
    response: reqwest::Response,
) -> Result<reqwest::Response, RestError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RestError::Status { endpoint, status: status.as_u16() })
    }
}

/// Message body in the platform's wire shape, with the private-delivery flag
/// folded into `flags`.
pub(crate) fn wire_body(message: &OutboundMessage) -> Value {
    let mut body = serde_json::to_value(message).unwrap_or_else(|_| json!({}));
    if message.ephemeral {
        if let Some(object) = body.as_object_mut() {
            object.insert("flags".to_owned(), json!(EPHEMERAL_FLAG));
        }
    }
    body
}

#[async_trait]
impl DiscordApi for RestClient {
    async fn create_dm_channel(&self, user: &UserId) -> Result<ChannelId, RestError> {
        let endpoint = format!("{API_BASE}/users/@me/channels");
        let payload: ChannelPayload =
            self.post_json(endpoint, &json!({ "recipient_id": user.0 })).await?;
        Ok(ChannelId(payload.id))
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<MessageId, RestError> {
        let endpoint = format!("{API_BASE}/channels/{}/messages", channel.0);
        let payload: MessagePayload = self.post_json(endpoint, &wire_body(message)).await?;
        Ok(MessageId(payload.id))
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
        message: &OutboundMessage,
    ) -> Result<(), RestError> {
        let endpoint = format!("{API_BASE}/channels/{}/messages/{}", channel.0, message_id.0);
        let response = self
            .http
            .patch(&endpoint)
            .header("Authorization", self.auth_header())
            .json(&wire_body(message))
            .send()
            .await
            .map_err(|source| RestError::Transport { endpoint: endpoint.clone(), source })?;
        check_status(endpoint, response)?;
        Ok(())
    }

    async fn fetch_channel(&self, channel: &ChannelId) -> Result<ChannelInfo, RestError> {
        let endpoint = format!("{API_BASE}/channels/{}", channel.0);
        let payload: ChannelPayload = self.get_json(endpoint).await?;
        Ok(ChannelInfo { id: ChannelId(payload.id), guild_id: payload.guild_id.map(GuildId) })
    }

    async fn fetch_member(&self, guild: &GuildId, user: &UserId) -> Result<GuildMember, RestError> {
        let endpoint = format!("{API_BASE}/guilds/{}/members/{}", guild.0, user.0);
        let payload: MemberPayload = self.get_json(endpoint).await?;
        Ok(payload.into())
    }

    async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>, RestError> {
        let mut members = Vec::new();
        let mut after = String::from("0");

        loop {
            let endpoint = format!(
                "{API_BASE}/guilds/{}/members?limit={MEMBER_PAGE_LIMIT}&after={after}",
                guild.0
            );
            let page: Vec<MemberPayload> = self.get_json(endpoint).await?;
            let page_len = page.len();

            if let Some(last) = page.last() {
                after = last.user.id.clone();
            }
            members.extend(page.into_iter().map(GuildMember::from));

            if page_len < MEMBER_PAGE_LIMIT {
                break;
            }
        }

        debug!(
            event_name = "egress.discord.members_fetched",
            guild_id = %guild,
            member_count = members.len(),
            "fetched full guild member listing"
        );
        Ok(members)
    }

    async fn list_roles(&self, guild: &GuildId) -> Result<Vec<GuildRole>, RestError> {
        let endpoint = format!("{API_BASE}/guilds/{}/roles", guild.0);
        let payload: Vec<RolePayload> = self.get_json(endpoint).await?;
        Ok(payload
            .into_iter()
            .map(|role| GuildRole { id: RoleId(role.id), name: role.name, color: role.color })
            .collect())
    }

    async fn add_member_role(
        &self,
        guild: &GuildId,
        user: &UserId,
        role: &RoleId,
    ) -> Result<(), RestError> {
        let endpoint =
            format!("{API_BASE}/guilds/{}/members/{}/roles/{}", guild.0, user.0, role.0);
        self.send_without_body(reqwest::Method::PUT, endpoint).await
    }

    async fn remove_member_role(
        &self,
        guild: &GuildId,
        user: &UserId,
        role: &RoleId,
    ) -> Result<(), RestError> {
        let endpoint =
            format!("{API_BASE}/guilds/{}/members/{}/roles/{}", guild.0, user.0, role.0);
        self.send_without_body(reqwest::Method::DELETE, endpoint).await
    }

    async fn interaction_followup(
        &self,
        interaction_token: &str,
        message: &OutboundMessage,
    ) -> Result<(), RestError> {
        let application_id = self.application_id().await?;
        let endpoint =
            format!("{API_BASE}/webhooks/{application_id}/{interaction_token}?wait=true");
        let _: MessagePayload = self.post_json(endpoint, &wire_body(message)).await?;
        Ok(())
    }

    async fn overwrite_commands(&self, definitions: &[CommandDefinition]) -> Result<(), RestError> {
        let application_id = self.application_id().await?;
        let endpoint = format!("{API_BASE}/applications/{application_id}/commands");
        let body = serde_json::to_value(definitions).unwrap_or_else(|_| json!([]));
        let response = self
            .http
            .put(&endpoint)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|source| RestError::Transport { endpoint: endpoint.clone(), source })?;
        check_status(endpoint, response)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApplicationPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(default)]
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    id: String,
    name: String,
    #[serde(default)]
    color: u32,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    user: UserPayload,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: String,
}

impl From<MemberPayload> for GuildMember {
    fn from(payload: MemberPayload) -> Self {
        Self {
            user: UserRef {
                id: UserId(payload.user.id),
                tag: user_tag(&payload.user.username, &payload.user.discriminator),
            },
            role_ids: payload.roles.into_iter().map(RoleId).collect(),
        }
    }
}

/// Legacy tags render as `name#discriminator`; migrated accounts (reported
/// with discriminator `0`) render as the bare username.
fn user_tag(username: &str, discriminator: &str) -> String {
    if discriminator.is_empty() || discriminator == "0" {
        username.to_owned()
    } else {
        format!("{username}#{discriminator}")
    }
}
