use serde::{Deserialize, Serialize};

use gaffer_core::domain::offer::{ContractId, Offer};

/// Fallback color used when nothing more specific applies (offer documents,
/// colorless roles).
pub const DEFAULT_EMBED_COLOR: u32 = 0x0099FF;

pub const OFFER_TITLE: &str = "🏆 Contract Offer 🏆";
pub const SIGNED_TITLE: &str = "🎉 Contract Signed 🎉";
pub const NO_MEMBERS_SENTINEL: &str = "No members found.";

pub const CONTRACT_ID_FIELD: &str = "🆔 Contract ID";
pub const COACH_FIELD: &str = "👤 Coach";
pub const SIGNEE_FIELD: &str = "🤝 Signee";
pub const POSITION_FIELD: &str = "⚽ Position";
pub const ROLE_FIELD: &str = "📜 Role";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub inline: bool,
}

pub struct EmbedBuilder {
    embed: Embed,
}

impl EmbedBuilder {
    pub fn new() -> Self {
        Self { embed: Embed::default() }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.embed.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.embed.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.embed.color = Some(color);
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.embed.thumbnail = Some(EmbedThumbnail { url: url.into() });
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.embed.fields.push(EmbedField { name: name.into(), value: value.into(), inline: false });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.embed.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn build(self) -> Embed {
        self.embed
    }
}

impl Default for EmbedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Button styles, serialized as the platform's numeric style codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

impl From<ButtonStyle> for u8 {
    fn from(style: ButtonStyle) -> Self {
        match style {
            ButtonStyle::Primary => 1,
            ButtonStyle::Secondary => 2,
            ButtonStyle::Success => 3,
            ButtonStyle::Danger => 4,
        }
    }
}

impl TryFrom<u8> for ButtonStyle {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Primary),
            2 => Ok(Self::Secondary),
            3 => Ok(Self::Success),
            4 => Ok(Self::Danger),
            other => Err(format!("unsupported button style code {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: ButtonStyle,
    pub label: String,
    pub custom_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self { kind: 2, style, label: label.into(), custom_id: custom_id.into(), disabled: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Button>,
}

impl ActionRow {
    pub fn of(components: Vec<Button>) -> Self {
        Self { kind: 1, components }
    }
}

/// A renderable message: plain content, embeds, interactive components, and a
/// private-delivery flag mapped to the platform's ephemeral flag on send.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    // Always serialized: an edit that omits `components` would leave stale
    // controls attached instead of clearing them.
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub components: Vec<ActionRow>,
    #[serde(skip)]
    pub ephemeral: bool,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    pub fn embed(embed: Embed) -> Self {
        Self { embeds: vec![embed], ..Self::default() }
    }

    pub fn private(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn with_components(mut self, components: Vec<ActionRow>) -> Self {
        self.components = components;
        self
    }
}

/// The offer document delivered to a candidate, with its single accept
/// control. `accept_custom_id` already carries the signed claim token.
pub fn offer_message(offer: &Offer, image_url: &str, accept_custom_id: &str) -> OutboundMessage {
    let embed = EmbedBuilder::new()
        .color(DEFAULT_EMBED_COLOR)
        .title(OFFER_TITLE)
        .description(format!(
            "You have received a contract offer from **{}**!",
            offer.team_name
        ))
        .thumbnail(image_url)
        .field(CONTRACT_ID_FIELD, format!("**{}**", offer.contract_id))
        .field(COACH_FIELD, offer.issuer_tag.clone())
        .field(SIGNEE_FIELD, offer.candidate_tag.clone())
        .field(POSITION_FIELD, offer.position.display_name())
        .field(ROLE_FIELD, offer.role.display_name())
        .build();

    OutboundMessage::embed(embed).with_components(vec![ActionRow::of(vec![Button::new(
        accept_custom_id,
        "Accept",
        ButtonStyle::Success,
    )])])
}

/// Re-render an offer document in its signed state.
pub fn signed_embed(original: &Embed, acceptor_tag: &str) -> Embed {
    let mut signed = original.clone();
    signed.title = Some(SIGNED_TITLE.to_owned());
    signed.footer = Some(EmbedFooter { text: format!("Accepted by {acceptor_tag}") });
    signed
}

/// Membership listing for `/view`. An empty mention list renders the literal
/// empty-state text, never an empty description.
pub fn members_message(role_name: &str, role_color: Option<u32>, mentions: &[String]) -> OutboundMessage {
    let description = if mentions.is_empty() {
        NO_MEMBERS_SENTINEL.to_owned()
    } else {
        mentions.join("\n")
    };

    let embed = EmbedBuilder::new()
        .color(role_color.filter(|color| *color != 0).unwrap_or(DEFAULT_EMBED_COLOR))
        .title(format!("Members with {role_name}"))
        .description(description)
        .build();

    OutboundMessage::embed(embed).private()
}

pub fn acceptance_announcement(acceptor_tag: &str) -> OutboundMessage {
    OutboundMessage::text(format!("🎉 {acceptor_tag} has accepted the contract offer!"))
}

/// Recover the team name from a rendered offer document: the first bold run
/// in the description. Fallback path when the accept control carries no
/// decodable token.
pub fn extract_team_name(embed: &Embed) -> Option<String> {
    let description = embed.description.as_deref()?;
    let start = description.find("**")? + 2;
    let length = description[start..].find("**")?;
    if length == 0 {
        return None;
    }
    Some(description[start..start + length].to_owned())
}

/// Recover the contract id from the labeled field of a rendered offer
/// document.
pub fn extract_contract_id(embed: &Embed) -> Option<ContractId> {
    let field = embed.fields.iter().find(|field| field.name == CONTRACT_ID_FIELD)?;
    ContractId::parse(field.value.trim().trim_matches('*')).ok()
}

fn is_false(value: &bool) -> bool {
    !*value
}
