use thiserror::Error;

/// Validation failures. Reported privately to the invoker with a specific
/// message; never fatal to the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invoking user holds no registry team role")]
    NoTeamAssigned,
    #[error("user `{tag}` holds no registry team role")]
    NotOnATeam { tag: String },
    #[error("no registry entry for team `{name}`")]
    UnknownTeam { name: String },
    #[error("command is only available inside a guild")]
    GuildOnly,
    #[error("invalid contract identifier `{raw}`")]
    InvalidContractId { raw: String },
    #[error("invalid value `{raw}` for option `{option}`")]
    InvalidChoice { option: String, raw: String },
    #[error("offer state could not be recovered from the accept control")]
    UnreadableOffer,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("platform request failed: {0}")]
    Platform(String),
    #[error("external resource missing: {0}")]
    MissingResource(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// Boundary-facing classification. Carries a correlation id for logs and a
/// user-safe message for the private reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } | Self::Internal { .. } => {
                "An error occurred while processing the command. Please try again later."
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Platform(message) | ApplicationError::MissingResource(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
