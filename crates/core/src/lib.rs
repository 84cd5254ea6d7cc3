pub mod config;
pub mod domain;
pub mod errors;

pub use domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
pub use domain::offer::{ContractId, ContractRole, FieldPosition, Offer, CONTRACT_ID_SPACE};
pub use domain::team::{RegistryError, Team, TeamRegistry};
pub use domain::token::{OfferClaim, OfferTokenCodec, TokenError};
pub use errors::{ApplicationError, DomainError, InterfaceError};
