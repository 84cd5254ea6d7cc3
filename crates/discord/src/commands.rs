use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use gaffer_core::domain::ids::{ChannelId, GuildId, RoleId, UserId};
use gaffer_core::domain::offer::{ContractRole, FieldPosition};
use gaffer_core::errors::{ApplicationError, DomainError};

use crate::embeds::OutboundMessage;

pub const OFFER_COMMAND: &str = "offer";
pub const VIEW_COMMAND: &str = "view";
pub const RELEASE_COMMAND: &str = "release";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    pub tag: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
    pub color: Option<u32>,
}

/// Raw slash-command payload as delivered by the gateway transport. Option
/// values are already typed by the platform's option schema; normalization
/// re-validates the closed choice sets before anything reaches a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub invoker: UserRef,
    pub invoker_role_ids: Vec<RoleId>,
    pub options: Vec<CommandOption>,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    User(UserRef),
    Role(RoleRef),
}

/// Invocation context threaded through to services alongside the typed
/// command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub invoker: UserRef,
    pub invoker_role_ids: Vec<RoleId>,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HubCommand {
    Offer { candidate: UserRef, role: ContractRole, position: FieldPosition },
    View { role: RoleRef },
    Release { target: UserRef },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("command `{command}` is missing required option `{option}`")]
    MissingOption { command: String, option: String },
    #[error("command `{command}` received the wrong kind of value for option `{option}`")]
    WrongOptionKind { command: String, option: String },
    #[error(transparent)]
    InvalidChoice(#[from] DomainError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

pub fn normalize_command(
    payload: SlashCommandPayload,
) -> Result<(HubCommand, CommandContext), CommandParseError> {
    let command = match payload.command.as_str() {
        OFFER_COMMAND => HubCommand::Offer {
            candidate: required_user(&payload, "user")?,
            role: ContractRole::parse(&required_text(&payload, "role")?)?,
            position: FieldPosition::parse(&required_text(&payload, "position")?)?,
        },
        VIEW_COMMAND => HubCommand::View { role: required_role(&payload, "role")? },
        RELEASE_COMMAND => HubCommand::Release { target: required_user(&payload, "user")? },
        other => return Err(CommandParseError::UnsupportedCommand(other.to_owned())),
    };

    let context = CommandContext {
        guild_id: payload.guild_id,
        channel_id: payload.channel_id,
        invoker: payload.invoker,
        invoker_role_ids: payload.invoker_role_ids,
        request_id: payload.request_id,
    };

    Ok((command, context))
}

fn find_option<'a>(payload: &'a SlashCommandPayload, name: &str) -> Option<&'a OptionValue> {
    payload
        .options
        .iter()
        .find(|option| option.name == name)
        .map(|option| &option.value)
}

fn required_text(payload: &SlashCommandPayload, name: &str) -> Result<String, CommandParseError> {
    match find_option(payload, name) {
        Some(OptionValue::Text(value)) => Ok(value.clone()),
        Some(_) => Err(CommandParseError::WrongOptionKind {
            command: payload.command.clone(),
            option: name.to_owned(),
        }),
        None => Err(CommandParseError::MissingOption {
            command: payload.command.clone(),
            option: name.to_owned(),
        }),
    }
}

fn required_user(payload: &SlashCommandPayload, name: &str) -> Result<UserRef, CommandParseError> {
    match find_option(payload, name) {
        Some(OptionValue::User(value)) => Ok(value.clone()),
        Some(_) => Err(CommandParseError::WrongOptionKind {
            command: payload.command.clone(),
            option: name.to_owned(),
        }),
        None => Err(CommandParseError::MissingOption {
            command: payload.command.clone(),
            option: name.to_owned(),
        }),
    }
}

fn required_role(payload: &SlashCommandPayload, name: &str) -> Result<RoleRef, CommandParseError> {
    match find_option(payload, name) {
        Some(OptionValue::Role(value)) => Ok(value.clone()),
        Some(_) => Err(CommandParseError::WrongOptionKind {
            command: payload.command.clone(),
            option: name.to_owned(),
        }),
        None => Err(CommandParseError::MissingOption {
            command: payload.command.clone(),
            option: name.to_owned(),
        }),
    }
}

/// The three hub operations. Implementations perform all platform egress
/// themselves and return the private reply for the invoker.
#[async_trait]
pub trait ContractService: Send + Sync {
    async fn offer(
        &self,
        candidate: UserRef,
        role: ContractRole,
        position: FieldPosition,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError>;

    async fn view(
        &self,
        role: RoleRef,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError>;

    async fn release(
        &self,
        target: UserRef,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: ContractService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        payload: SlashCommandPayload,
    ) -> Result<OutboundMessage, CommandRouteError> {
        let (command, context) = normalize_command(payload)?;
        let reply = match command {
            HubCommand::Offer { candidate, role, position } => {
                self.service.offer(candidate, role, position, &context).await?
            }
            HubCommand::View { role } => self.service.view(role, &context).await?,
            HubCommand::Release { target } => self.service.release(target, &context).await?,
        };
        Ok(reply)
    }
}

#[async_trait]
impl<S> ContractService for std::sync::Arc<S>
where
    S: ContractService + ?Sized,
{
    async fn offer(
        &self,
        candidate: UserRef,
        role: ContractRole,
        position: FieldPosition,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        self.as_ref().offer(candidate, role, position, ctx).await
    }

    async fn view(
        &self,
        role: RoleRef,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        self.as_ref().view(role, ctx).await
    }

    async fn release(
        &self,
        target: UserRef,
        ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        self.as_ref().release(target, ctx).await
    }
}

/// Placeholder service used by the default dispatcher before bootstrap wires
/// the real one.
#[derive(Default)]
pub struct NoopContractService;

#[async_trait]
impl ContractService for NoopContractService {
    async fn offer(
        &self,
        candidate: UserRef,
        role: ContractRole,
        position: FieldPosition,
        _ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        Ok(OutboundMessage::text(format!(
            "Preview: would offer {} the {} ({}) contract.",
            candidate.tag,
            role.display_name(),
            position.display_name()
        ))
        .private())
    }

    async fn view(
        &self,
        role: RoleRef,
        _ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        Ok(OutboundMessage::text(format!("Preview: would list members with {}.", role.name))
            .private())
    }

    async fn release(
        &self,
        target: UserRef,
        _ctx: &CommandContext,
    ) -> Result<OutboundMessage, ApplicationError> {
        Ok(OutboundMessage::text(format!("Preview: would release {}.", target.tag)).private())
    }
}

// Application-command option type codes.
const OPTION_TYPE_STRING: u8 = 3;
const OPTION_TYPE_USER: u8 = 6;
const OPTION_TYPE_ROLE: u8 = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<CommandOptionSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOptionSpec {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandChoice {
    pub name: &'static str,
    pub value: &'static str,
}

/// The registration payloads for the three hub commands, serializable to the
/// platform's application-command JSON.
pub fn command_definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition {
            name: OFFER_COMMAND,
            description: "Offer a contract to a player",
            options: vec![
                CommandOptionSpec {
                    kind: OPTION_TYPE_USER,
                    name: "user",
                    description: "The user you are signing",
                    required: true,
                    choices: Vec::new(),
                },
                CommandOptionSpec {
                    kind: OPTION_TYPE_STRING,
                    name: "role",
                    description: "Role being offered",
                    required: true,
                    choices: ContractRole::ALL
                        .into_iter()
                        .map(|role| CommandChoice {
                            name: role.display_name(),
                            value: role.display_name(),
                        })
                        .collect(),
                },
                CommandOptionSpec {
                    kind: OPTION_TYPE_STRING,
                    name: "position",
                    description: "Position being offered",
                    required: true,
                    choices: FieldPosition::ALL
                        .into_iter()
                        .map(|position| CommandChoice {
                            name: position.display_name(),
                            value: position.display_name(),
                        })
                        .collect(),
                },
            ],
        },
        CommandDefinition {
            name: VIEW_COMMAND,
            description: "View all members with a specific role",
            options: vec![CommandOptionSpec {
                kind: OPTION_TYPE_ROLE,
                name: "role",
                description: "The role to view members of",
                required: true,
                choices: Vec::new(),
            }],
        },
        CommandDefinition {
            name: RELEASE_COMMAND,
            description: "Release a user from their team role",
            options: vec![CommandOptionSpec {
                kind: OPTION_TYPE_USER,
                name: "user",
                description: "The user to release from the team role",
                required: true,
                choices: Vec::new(),
            }],
        },
    ]
}
