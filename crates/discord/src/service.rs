use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use async_trait::async_trait;
use gaffer_core::domain::ids::{ChannelId, GuildId};
use gaffer_core::domain::offer::{ContractRole, FieldPosition, Offer};
use gaffer_core::domain::team::TeamRegistry;
use gaffer_core::domain::token::{OfferClaim, OfferTokenCodec};
use gaffer_core::errors::{ApplicationError, DomainError};

use crate::commands::{CommandContext, ContractService, RoleRef, UserRef};
use crate::embeds::{
    self, acceptance_announcement, members_message, offer_message, signed_embed, Embed,
    EmbedBuilder, OutboundMessage, DEFAULT_EMBED_COLOR, SIGNED_TITLE,
};
use crate::events::{
    accept_token, ComponentClickEvent, EventContext, OfferAcceptService, ACCEPT_CUSTOM_ID,
};
use crate::rest::DiscordApi;

/// Platform limit on a component custom id. Tokens that would push past it
/// are dropped in favor of the bare control id plus document re-extraction.
const CUSTOM_ID_LIMIT: usize = 100;

const GUILD_ONLY_NOTICE: &str = "This command can only be used in a server.";
const NO_TEAM_NOTICE: &str = "You don't have a team role assigned.";
const CHANNEL_MISSING_NOTICE: &str = "⚠️ Error: Transaction channel not found.";

/// The production contract service: offer issue/accept, membership query,
/// and release, all through the [`DiscordApi`] seam.
pub struct HubService {
    api: Arc<dyn DiscordApi>,
    registry: Arc<TeamRegistry>,
    tokens: OfferTokenCodec,
    transaction_channel_id: Option<ChannelId>,
    /// Contract ids already accepted in this process. Checked and updated
    /// before the first side effect so rapid duplicate clicks cannot
    /// double-grant or double-post.
    claimed: Mutex<HashSet<u32>>,
}

impl HubService {
    pub fn new(
        api: Arc<dyn DiscordApi>,
        registry: Arc<TeamRegistry>,
        tokens: OfferTokenCodec,
        transaction_channel_id: Option<ChannelId>,
    ) -> Self {
        Self { api, registry, tokens, transaction_channel_id, claimed: Mutex::new(HashSet::new()) }
    }

    fn accept_control_id(&self, claim: &OfferClaim) -> String {
        let control_id = format!("{ACCEPT_CUSTOM_ID}.{}", self.tokens.encode(claim));
        if control_id.len() <= CUSTOM_ID_LIMIT {
            return control_id;
        }

        warn!(
            event_name = "offer.token.oversized",
            contract_id = %claim.contract_id,
            team = %claim.team_name,
            "claim token exceeds the custom id limit; falling back to document extraction"
        );
        ACCEPT_CUSTOM_ID.to_owned()
    }

    /// Recover the accepted offer's claim: the signed token when the control
    /// carries one, otherwise the rendered document.
    fn recover_claim(&self, event: &ComponentClickEvent) -> Result<OfferClaim, DomainError> {
        if let Some(token) = accept_token(&event.custom_id) {
            match self.tokens.decode(token) {
                Ok(claim) => return Ok(claim),
                Err(error) => {
                    warn!(
                        event_name = "offer.token.rejected",
                        error = %error,
                        "accept control token did not verify; falling back to document extraction"
                    );
                }
            }
        }

        let embed = event.message.embeds.first().ok_or(DomainError::UnreadableOffer)?;
        let team_name = embeds::extract_team_name(embed).ok_or(DomainError::UnreadableOffer)?;
        let contract_id =
            embeds::extract_contract_id(embed).ok_or(DomainError::UnreadableOffer)?;
        Ok(OfferClaim { contract_id, team_name, issued_at: 0 })
    }

    fn signed_document(&self, event: &ComponentClickEvent, claim: &OfferClaim) -> Embed {
        match event.message.embeds.first() {
            Some(original) => signed_embed(original, &event.user.tag),
            // Token-only recovery with a stripped message snapshot: re-render
            // a minimal signed document instead of refusing the acceptance.
            None => EmbedBuilder::new()
                .color(DEFAULT_EMBED_COLOR)
                .title(SIGNED_TITLE)
                .description(format!(
                    "Contract **{}** with **{}** has been signed.",
                    claim.contract_id, claim.team_name
                ))
                .footer(format!("Accepted by {}", event.user.tag))
                .build(),
        }
    }

    /// Grant the team role by display-name lookup. A missing role or a failed
    /// grant is logged and does not abort the signing flow.
    async fn grant_team_role(&self, guild: &GuildId, event: &ComponentClickEvent, claim: &OfferClaim) {
        let roles = match self.api.list_roles(guild).await {
            Ok(roles) => roles,
            Err(error) => {
                warn!(
                    event_name = "offer.accept.role_listing_failed",
                    guild_id = %guild,
                    error = %error,
                    "could not list guild roles for the team role grant"
                );
                return;
            }
        };

        let Some(team_role) = roles.iter().find(|role| role.name == claim.team_name) else {
            warn!(
                event_name = "offer.accept.role_missing",
                guild_id = %guild,
                team = %claim.team_name,
                "no guild role matches the team name; skipping grant"
            );
            return;
        };

        if let Err(error) =
            self.api.add_member_role(guild, &event.user.id, &team_role.id).await
        {
            warn!(
                event_name = "offer.accept.role_grant_failed",
                guild_id = %guild,
                user_id = %event.user.id,
                role_id = %team_role.id,
                error = %error,
                "team role grant failed; continuing with announcement"
            );
        }
    }
}

#[async_trait]
impl ContractService for HubService {
    async fn offer(
        &self,
        candidate: UserRef,
        role: ContractRole,
        position: FieldPosition,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        if ctx.guild_id.is_none() {
            return Ok(OutboundMessage::text(GUILD_ONLY_NOTICE).private());
        }

        let Some(team) = self.registry.team_for_roles(&ctx.invoker_role_ids) else {
            info!(
                event_name = "offer.issue.no_team",
                invoker = %ctx.invoker.tag,
                correlation_id = %ctx.request_id,
                "offer refused: invoker holds no registry team role"
            );
            return Ok(OutboundMessage::text(NO_TEAM_NOTICE).private());
        };

        let offer = Offer::draft(
            ctx.invoker.tag.clone(),
            candidate.tag.clone(),
            role,
            position,
            team.name.clone(),
        );
        let claim = OfferClaim {
            contract_id: offer.contract_id,
            team_name: team.name.clone(),
            issued_at: Utc::now().timestamp(),
        };
        let document = offer_message(&offer, &team.image_url, &self.accept_control_id(&claim));

        let delivery = async {
            let dm = self.api.create_dm_channel(&candidate.id).await?;
            self.api.send_message(&dm, &document).await
        };
        if let Err(error) = delivery.await {
            warn!(
                event_name = "offer.issue.delivery_failed",
                candidate = %candidate.tag,
                contract_id = %offer.contract_id,
                correlation_id = %ctx.request_id,
                error = %error,
                "offer document could not be delivered"
            );
            return Ok(OutboundMessage::text(format!(
                "Could not deliver the offer to {}. Their direct messages may be closed.",
                candidate.tag
            ))
            .private());
        }

        info!(
            event_name = "offer.issue.sent",
            team = %team.name,
            contract_id = %offer.contract_id,
            candidate = %candidate.tag,
            correlation_id = %ctx.request_id,
            "offer document delivered"
        );
        Ok(OutboundMessage::text(format!("Offer sent to {}.", candidate.tag)).private())
    }

    async fn view(
        &self,
        role: RoleRef,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        let Some(guild_id) = &ctx.guild_id else {
            return Ok(OutboundMessage::text(GUILD_ONLY_NOTICE).private());
        };

        // Always a full fetch; platform-side member caches go stale.
        let members = self.api.list_members(guild_id).await?;
        let mentions: Vec<String> = members
            .iter()
            .filter(|member| member.role_ids.contains(&role.id))
            .map(|member| format!("<@{}>", member.user.id))
            .collect();

        info!(
            event_name = "view.members_listed",
            role = %role.name,
            member_count = mentions.len(),
            correlation_id = %ctx.request_id,
            "membership query answered"
        );
        Ok(members_message(&role.name, role.color, &mentions))
    }

    async fn release(
        &self,
        target: UserRef,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        let Some(guild_id) = &ctx.guild_id else {
            return Ok(OutboundMessage::text(GUILD_ONLY_NOTICE).private());
        };

        let member = self.api.fetch_member(guild_id, &target.id).await?;
        let Some(team) = self.registry.team_for_roles(&member.role_ids) else {
            return Ok(OutboundMessage::text(format!(
                "{} is not associated with any team role.",
                target.tag
            ))
            .private());
        };

        self.api.remove_member_role(guild_id, &target.id, &team.role_id).await?;

        info!(
            event_name = "release.role_removed",
            team = %team.name,
            target = %target.tag,
            correlation_id = %ctx.request_id,
            "team role released"
        );
        Ok(OutboundMessage::text(format!("Released {} from the team role.", target.tag)).private())
    }
}

#[async_trait]
impl OfferAcceptService for HubService {
    async fn accept(
        &self,
        event: &ComponentClickEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, ApplicationError> {
        let claim = self.recover_claim(event).map_err(ApplicationError::from)?;

        // The announcement channel gates the whole flow; nothing mutates
        // until it resolves.
        let Some(channel_id) = &self.transaction_channel_id else {
            warn!(
                event_name = "offer.accept.channel_unconfigured",
                contract_id = %claim.contract_id,
                correlation_id = %ctx.correlation_id,
                "transaction channel is not configured"
            );
            return Ok(Some(OutboundMessage::text(CHANNEL_MISSING_NOTICE).private()));
        };
        let channel = match self.api.fetch_channel(channel_id).await {
            Ok(channel) => channel,
            Err(error) => {
                warn!(
                    event_name = "offer.accept.channel_missing",
                    channel_id = %channel_id,
                    contract_id = %claim.contract_id,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "transaction channel could not be fetched"
                );
                return Ok(Some(OutboundMessage::text(CHANNEL_MISSING_NOTICE).private()));
            }
        };

        {
            let mut claimed = self.claimed.lock().await;
            if !claimed.insert(claim.contract_id.0) {
                info!(
                    event_name = "offer.accept.duplicate",
                    contract_id = %claim.contract_id,
                    correlation_id = %ctx.correlation_id,
                    "duplicate acceptance suppressed"
                );
                return Ok(None);
            }
        }

        // Disable the control before any other side effect: overwriting the
        // document is what makes a second click impossible.
        let signed = self.signed_document(event, &claim);
        self.api
            .edit_message(
                &event.message.channel_id,
                &event.message.id,
                &OutboundMessage::embed(signed.clone()),
            )
            .await
            .map_err(ApplicationError::from)?;

        let guild_id = event.guild_id.clone().or_else(|| channel.guild_id.clone());
        match &guild_id {
            Some(guild_id) => self.grant_team_role(guild_id, event, &claim).await,
            None => warn!(
                event_name = "offer.accept.guild_unresolved",
                contract_id = %claim.contract_id,
                correlation_id = %ctx.correlation_id,
                "no guild could be resolved for the role grant; skipping"
            ),
        }

        self.api
            .send_message(&channel.id, &OutboundMessage::embed(signed))
            .await
            .map_err(ApplicationError::from)?;

        info!(
            event_name = "offer.accept.signed",
            contract_id = %claim.contract_id,
            team = %claim.team_name,
            acceptor = %event.user.tag,
            correlation_id = %ctx.correlation_id,
            "contract signed and announced"
        );
        Ok(Some(acceptance_announcement(&event.user.tag)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use gaffer_core::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
    use gaffer_core::domain::offer::{ContractRole, FieldPosition};
    use gaffer_core::domain::team::{Team, TeamRegistry};
    use gaffer_core::domain::token::OfferTokenCodec;
    use gaffer_core::errors::ApplicationError;

    use super::HubService;
    use crate::commands::{CommandContext, ContractService, RoleRef, UserRef};
    use crate::embeds::{self, OutboundMessage, NO_MEMBERS_SENTINEL, SIGNED_TITLE};
    use crate::events::{
        ComponentClickEvent, EventContext, MessageSnapshot, OfferAcceptService, ACCEPT_CUSTOM_ID,
    };
    use crate::rest::{ChannelInfo, DiscordApi, GuildMember, GuildRole, RestError};

    fn rest_error(endpoint: &str) -> RestError {
        RestError::Status { endpoint: endpoint.to_owned(), status: 403 }
    }

    #[derive(Default)]
    struct FakeApiState {
        calls: Vec<String>,
        sent: Vec<(ChannelId, OutboundMessage)>,
        edited: Vec<(ChannelId, MessageId, OutboundMessage)>,
    }

    #[derive(Default)]
    struct FakeApi {
        state: Mutex<FakeApiState>,
        members: Vec<GuildMember>,
        member: Option<GuildMember>,
        roles: Vec<GuildRole>,
        channel: Option<ChannelInfo>,
        fail_dm: bool,
        fail_member_listing: bool,
        fail_member_fetch: bool,
    }

    impl FakeApi {
        async fn calls(&self) -> Vec<String> {
            self.state.lock().await.calls.clone()
        }

        async fn sent(&self) -> Vec<(ChannelId, OutboundMessage)> {
            self.state.lock().await.sent.clone()
        }

        async fn edited(&self) -> Vec<(ChannelId, MessageId, OutboundMessage)> {
            self.state.lock().await.edited.clone()
        }

        async fn record(&self, call: impl Into<String>) {
            self.state.lock().await.calls.push(call.into());
        }
    }

    #[async_trait]
    impl DiscordApi for FakeApi {
        async fn create_dm_channel(&self, user: &UserId) -> Result<ChannelId, RestError> {
            self.record(format!("create_dm:{user}")).await;
            if self.fail_dm {
                return Err(rest_error("create_dm"));
            }
            Ok(ChannelId(format!("dm-{user}")))
        }

        async fn send_message(
            &self,
            channel: &ChannelId,
            message: &OutboundMessage,
        ) -> Result<MessageId, RestError> {
            let mut state = self.state.lock().await;
            state.calls.push(format!("send_message:{channel}"));
            state.sent.push((channel.clone(), message.clone()));
            Ok(MessageId("M-new".to_string()))
        }

        async fn edit_message(
            &self,
            channel: &ChannelId,
            message_id: &MessageId,
            message: &OutboundMessage,
        ) -> Result<(), RestError> {
            let mut state = self.state.lock().await;
            state.calls.push(format!("edit_message:{channel}/{message_id}"));
            state.edited.push((channel.clone(), message_id.clone(), message.clone()));
            Ok(())
        }

        async fn fetch_channel(&self, channel: &ChannelId) -> Result<ChannelInfo, RestError> {
            self.record(format!("fetch_channel:{channel}")).await;
            self.channel.clone().ok_or_else(|| rest_error("fetch_channel"))
        }

        async fn fetch_member(
            &self,
            _guild: &GuildId,
            user: &UserId,
        ) -> Result<GuildMember, RestError> {
            self.record(format!("fetch_member:{user}")).await;
            if self.fail_member_fetch {
                return Err(rest_error("fetch_member"));
            }
            self.member.clone().ok_or_else(|| rest_error("fetch_member"))
        }

        async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>, RestError> {
            self.record(format!("list_members:{guild}")).await;
            if self.fail_member_listing {
                return Err(rest_error("list_members"));
            }
            Ok(self.members.clone())
        }

        async fn list_roles(&self, guild: &GuildId) -> Result<Vec<GuildRole>, RestError> {
            self.record(format!("list_roles:{guild}")).await;
            Ok(self.roles.clone())
        }

        async fn add_member_role(
            &self,
            _guild: &GuildId,
            user: &UserId,
            role: &RoleId,
        ) -> Result<(), RestError> {
            self.record(format!("add_role:{user}/{role}")).await;
            Ok(())
        }

        async fn remove_member_role(
            &self,
            _guild: &GuildId,
            user: &UserId,
            role: &RoleId,
        ) -> Result<(), RestError> {
            self.record(format!("remove_role:{user}/{role}")).await;
            Ok(())
        }

        async fn interaction_followup(
            &self,
            _interaction_token: &str,
            _message: &OutboundMessage,
        ) -> Result<(), RestError> {
            self.record("interaction_followup").await;
            Ok(())
        }

        async fn overwrite_commands(
            &self,
            _definitions: &[crate::commands::CommandDefinition],
        ) -> Result<(), RestError> {
            self.record("overwrite_commands").await;
            Ok(())
        }
    }

    fn user(id: &str, tag: &str) -> UserRef {
        UserRef { id: UserId(id.to_string()), tag: tag.to_string() }
    }

    fn member(id: &str, tag: &str, roles: &[&str]) -> GuildMember {
        GuildMember {
            user: user(id, tag),
            role_ids: roles.iter().map(|role| RoleId(role.to_string())).collect(),
        }
    }

    fn registry() -> Arc<TeamRegistry> {
        Arc::new(TeamRegistry::from_teams(vec![
            Team {
                name: "Azuras".to_string(),
                role_id: RoleId("1001".to_string()),
                image_url: "https://cdn.example/azuras.png".to_string(),
            },
            Team {
                name: "Viperio".to_string(),
                role_id: RoleId("1002".to_string()),
                image_url: "https://cdn.example/viperio.png".to_string(),
            },
        ]))
    }

    fn service_with(api: Arc<FakeApi>) -> HubService {
        HubService::new(
            api,
            registry(),
            OfferTokenCodec::new("test-secret"),
            Some(ChannelId("C-tx".to_string())),
        )
    }

    fn guild_ctx(invoker_roles: &[&str]) -> CommandContext {
        CommandContext {
            guild_id: Some(GuildId("G1".to_string())),
            channel_id: ChannelId("C1".to_string()),
            invoker: user("U1", "coach#1001"),
            invoker_role_ids: invoker_roles.iter().map(|role| RoleId(role.to_string())).collect(),
            request_id: "req-1".to_string(),
        }
    }

    fn dm_ctx() -> CommandContext {
        CommandContext { guild_id: None, ..guild_ctx(&["1001"]) }
    }

    fn transaction_channel() -> ChannelInfo {
        ChannelInfo {
            id: ChannelId("C-tx".to_string()),
            guild_id: Some(GuildId("G1".to_string())),
        }
    }

    fn offered_click(custom_id: String, embeds: Vec<embeds::Embed>) -> ComponentClickEvent {
        ComponentClickEvent {
            custom_id,
            guild_id: None,
            channel_id: ChannelId("dm-U2".to_string()),
            user: user("U2", "signee#2002"),
            message: MessageSnapshot {
                id: MessageId("M1".to_string()),
                channel_id: ChannelId("dm-U2".to_string()),
                embeds,
                components: Vec::new(),
            },
        }
    }

    /// Issue an offer through the service and hand back the click event a
    /// candidate would produce by pressing Accept on the delivered document.
    async fn issued_click(api: &Arc<FakeApi>, service: &HubService) -> ComponentClickEvent {
        service
            .offer(
                user("U2", "signee#2002"),
                ContractRole::Starter,
                FieldPosition::Midfielder,
                &guild_ctx(&["1001"]),
            )
            .await
            .expect("offer should succeed");

        let (_, document) = api.sent().await.pop().expect("offer document sent");
        let custom_id = document.components[0].components[0].custom_id.clone();
        offered_click(custom_id, document.embeds)
    }

    #[tokio::test]
    async fn offer_delivers_document_with_verifiable_token() {
        let api = Arc::new(FakeApi::default());
        let service = service_with(api.clone());

        let reply = service
            .offer(
                user("U2", "signee#2002"),
                ContractRole::Starter,
                FieldPosition::Midfielder,
                &guild_ctx(&["1001"]),
            )
            .await
            .expect("offer should succeed");

        assert!(reply.ephemeral);
        assert_eq!(reply.content.as_deref(), Some("Offer sent to signee#2002."));

        let sent = api.sent().await;
        assert_eq!(sent.len(), 1);
        let (channel, document) = &sent[0];
        assert_eq!(channel, &ChannelId("dm-U2".to_string()));

        let button = &document.components[0].components[0];
        let token = button
            .custom_id
            .strip_prefix(&format!("{ACCEPT_CUSTOM_ID}."))
            .expect("control should carry a token");
        let claim = OfferTokenCodec::new("test-secret").decode(token).expect("token verifies");
        assert_eq!(claim.team_name, "Azuras");

        let embed = &document.embeds[0];
        assert_eq!(embeds::extract_contract_id(embed), Some(claim.contract_id));
    }

    #[tokio::test]
    async fn offer_without_registry_role_sends_nothing() {
        let api = Arc::new(FakeApi::default());
        let service = service_with(api.clone());

        let reply = service
            .offer(
                user("U2", "signee#2002"),
                ContractRole::Rotation,
                FieldPosition::Striker,
                &guild_ctx(&["9999"]),
            )
            .await
            .expect("offer should short-circuit");

        assert_eq!(reply.content.as_deref(), Some("You don't have a team role assigned."));
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn offer_outside_guild_is_refused() {
        let api = Arc::new(FakeApi::default());
        let service = service_with(api.clone());

        let reply = service
            .offer(user("U2", "signee#2002"), ContractRole::Rotation, FieldPosition::Striker, &dm_ctx())
            .await
            .expect("offer should short-circuit");

        assert_eq!(reply.content.as_deref(), Some("This command can only be used in a server."));
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn offer_reports_failed_delivery_privately() {
        let api = Arc::new(FakeApi { fail_dm: true, ..FakeApi::default() });
        let service = service_with(api.clone());

        let reply = service
            .offer(
                user("U2", "signee#2002"),
                ContractRole::Captain,
                FieldPosition::Goalkeeper,
                &guild_ctx(&["1001"]),
            )
            .await
            .expect("delivery failure is reported, not raised");

        assert!(reply.ephemeral);
        assert!(reply.content.expect("content").contains("Could not deliver the offer"));
        assert!(api.sent().await.is_empty());
    }

    #[tokio::test]
    async fn view_renders_mention_list_from_fresh_fetch() {
        let api = Arc::new(FakeApi {
            members: vec![
                member("U2", "signee#2002", &["1001"]),
                member("U3", "other#3003", &["4444"]),
                member("U4", "keeper#4004", &["1001", "4444"]),
            ],
            ..FakeApi::default()
        });
        let service = service_with(api.clone());

        let reply = service
            .view(
                RoleRef { id: RoleId("1001".to_string()), name: "Azuras".to_string(), color: None },
                &guild_ctx(&[]),
            )
            .await
            .expect("view should succeed");

        let embed = &reply.embeds[0];
        assert_eq!(embed.description.as_deref(), Some("<@U2>\n<@U4>"));
        assert_eq!(api.calls().await, vec!["list_members:G1".to_string()]);
    }

    #[tokio::test]
    async fn view_uses_empty_state_sentinel() {
        let api = Arc::new(FakeApi::default());
        let service = service_with(api.clone());

        let reply = service
            .view(
                RoleRef { id: RoleId("1001".to_string()), name: "Azuras".to_string(), color: None },
                &guild_ctx(&[]),
            )
            .await
            .expect("view should succeed");

        assert_eq!(reply.embeds[0].description.as_deref(), Some(NO_MEMBERS_SENTINEL));
    }

    #[tokio::test]
    async fn view_propagates_platform_failures() {
        let api = Arc::new(FakeApi { fail_member_listing: true, ..FakeApi::default() });
        let service = service_with(api.clone());

        let error = service
            .view(
                RoleRef { id: RoleId("1001".to_string()), name: "Azuras".to_string(), color: None },
                &guild_ctx(&[]),
            )
            .await
            .expect_err("listing failure should surface");

        assert!(matches!(error, ApplicationError::Platform(_)));
    }

    #[tokio::test]
    async fn release_removes_exactly_the_held_team_role() {
        let api = Arc::new(FakeApi {
            member: Some(member("U2", "signee#2002", &["9999", "1002"])),
            ..FakeApi::default()
        });
        let service = service_with(api.clone());

        let reply = service
            .release(user("U2", "signee#2002"), &guild_ctx(&[]))
            .await
            .expect("release should succeed");

        assert_eq!(reply.content.as_deref(), Some("Released signee#2002 from the team role."));
        assert_eq!(
            api.calls().await,
            vec!["fetch_member:U2".to_string(), "remove_role:U2/1002".to_string()]
        );
    }

    #[tokio::test]
    async fn release_without_team_role_issues_no_mutation() {
        let api = Arc::new(FakeApi {
            member: Some(member("U2", "signee#2002", &["9999"])),
            ..FakeApi::default()
        });
        let service = service_with(api.clone());

        let reply = service
            .release(user("U2", "signee#2002"), &guild_ctx(&[]))
            .await
            .expect("release should short-circuit");

        assert_eq!(
            reply.content.as_deref(),
            Some("signee#2002 is not associated with any team role.")
        );
        assert_eq!(api.calls().await, vec!["fetch_member:U2".to_string()]);
    }

    #[tokio::test]
    async fn release_propagates_fetch_failures() {
        let api = Arc::new(FakeApi { fail_member_fetch: true, ..FakeApi::default() });
        let service = service_with(api.clone());

        let error = service
            .release(user("U2", "signee#2002"), &guild_ctx(&[]))
            .await
            .expect_err("fetch failure should surface");

        assert!(matches!(error, ApplicationError::Platform(_)));
    }

    #[tokio::test]
    async fn accept_disables_control_before_granting_and_announcing() {
        let api = Arc::new(FakeApi {
            channel: Some(transaction_channel()),
            roles: vec![GuildRole {
                id: RoleId("1001".to_string()),
                name: "Azuras".to_string(),
                color: 0,
            }],
            ..FakeApi::default()
        });
        let service = service_with(api.clone());
        let click = issued_click(&api, &service).await;

        let reply = service
            .accept(&click, &EventContext::default())
            .await
            .expect("accept should succeed")
            .expect("acceptance is announced");

        assert!(!reply.ephemeral);
        assert_eq!(
            reply.content.as_deref(),
            Some("🎉 signee#2002 has accepted the contract offer!")
        );

        let calls = api.calls().await;
        let edit_index = calls.iter().position(|call| call.starts_with("edit_message")).expect("edit");
        let grant_index = calls.iter().position(|call| call.starts_with("add_role")).expect("grant");
        let post_index = calls
            .iter()
            .rposition(|call| call == "send_message:C-tx")
            .expect("transaction post");
        assert!(edit_index < grant_index, "control must be disabled before the grant");
        assert!(edit_index < post_index, "control must be disabled before the announcement");
        assert!(calls.contains(&"add_role:U2/1001".to_string()));

        let edited = api.edited().await;
        assert_eq!(edited.len(), 1);
        let (_, _, overwritten) = &edited[0];
        assert_eq!(overwritten.embeds[0].title.as_deref(), Some(SIGNED_TITLE));
        assert!(overwritten.components.is_empty());

        let signed_posts: Vec<_> = api
            .sent()
            .await
            .into_iter()
            .filter(|(channel, _)| channel == &ChannelId("C-tx".to_string()))
            .collect();
        assert_eq!(signed_posts.len(), 1);
        assert_eq!(signed_posts[0].1.embeds[0].title.as_deref(), Some(SIGNED_TITLE));
    }

    #[tokio::test]
    async fn duplicate_acceptance_grants_and_posts_at_most_once() {
        let api = Arc::new(FakeApi {
            channel: Some(transaction_channel()),
            roles: vec![GuildRole {
                id: RoleId("1001".to_string()),
                name: "Azuras".to_string(),
                color: 0,
            }],
            ..FakeApi::default()
        });
        let service = service_with(api.clone());
        let click = issued_click(&api, &service).await;

        let first = service.accept(&click, &EventContext::default()).await.expect("first accept");
        let second = service.accept(&click, &EventContext::default()).await.expect("second accept");

        assert!(first.is_some());
        assert_eq!(second, None, "duplicate acceptance must be suppressed");

        let calls = api.calls().await;
        assert_eq!(calls.iter().filter(|call| call.starts_with("add_role")).count(), 1);
        assert_eq!(calls.iter().filter(|call| *call == "send_message:C-tx").count(), 1);
        assert_eq!(api.edited().await.len(), 1);
    }

    #[tokio::test]
    async fn accept_without_configured_channel_mutates_nothing() {
        let api = Arc::new(FakeApi::default());
        let service = HubService::new(
            api.clone(),
            registry(),
            OfferTokenCodec::new("test-secret"),
            None,
        );
        let click = issued_click(&api, &service).await;
        let calls_before = api.calls().await.len();

        let reply = service
            .accept(&click, &EventContext::default())
            .await
            .expect("missing channel is reported, not raised")
            .expect("acceptor is notified");

        assert!(reply.ephemeral);
        assert_eq!(reply.content.as_deref(), Some("⚠️ Error: Transaction channel not found."));
        assert_eq!(api.calls().await.len(), calls_before);
        assert!(api.edited().await.is_empty());
    }

    #[tokio::test]
    async fn accept_with_unfetchable_channel_mutates_nothing() {
        let api = Arc::new(FakeApi::default());
        let service = service_with(api.clone());
        let click = issued_click(&api, &service).await;

        let reply = service
            .accept(&click, &EventContext::default())
            .await
            .expect("missing channel is reported, not raised")
            .expect("acceptor is notified");

        assert_eq!(reply.content.as_deref(), Some("⚠️ Error: Transaction channel not found."));
        assert!(api.edited().await.is_empty());
        assert!(!api.calls().await.iter().any(|call| call.starts_with("add_role")));
    }

    #[tokio::test]
    async fn accept_falls_back_to_document_extraction_without_token() {
        let api = Arc::new(FakeApi {
            channel: Some(transaction_channel()),
            roles: vec![GuildRole {
                id: RoleId("1001".to_string()),
                name: "Azuras".to_string(),
                color: 0,
            }],
            ..FakeApi::default()
        });
        let service = service_with(api.clone());

        let mut click = issued_click(&api, &service).await;
        click.custom_id = ACCEPT_CUSTOM_ID.to_string();

        let reply = service
            .accept(&click, &EventContext::default())
            .await
            .expect("fallback extraction should succeed");

        assert!(reply.is_some());
        assert!(api.calls().await.contains(&"add_role:U2/1001".to_string()));
    }

    #[tokio::test]
    async fn accept_with_unreadable_document_is_a_validation_failure() {
        let api = Arc::new(FakeApi { channel: Some(transaction_channel()), ..FakeApi::default() });
        let service = service_with(api.clone());
        let click = offered_click(ACCEPT_CUSTOM_ID.to_string(), Vec::new());

        let error = service
            .accept(&click, &EventContext::default())
            .await
            .expect_err("unreadable offer should fail");

        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(api.edited().await.is_empty());
    }

    #[tokio::test]
    async fn accept_skips_grant_when_team_role_is_missing_but_still_signs() {
        let api = Arc::new(FakeApi {
            channel: Some(transaction_channel()),
            roles: vec![GuildRole {
                id: RoleId("7777".to_string()),
                name: "Renamed Team".to_string(),
                color: 0,
            }],
            ..FakeApi::default()
        });
        let service = service_with(api.clone());
        let click = issued_click(&api, &service).await;

        let reply = service
            .accept(&click, &EventContext::default())
            .await
            .expect("accept should succeed without a grant");

        assert!(reply.is_some());
        let calls = api.calls().await;
        assert!(!calls.iter().any(|call| call.starts_with("add_role")));
        assert_eq!(calls.iter().filter(|call| *call == "send_message:C-tx").count(), 1);
        assert_eq!(api.edited().await.len(), 1);
    }
}
