use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Upper bound (exclusive) for contract identifiers.
pub const CONTRACT_ID_SPACE: u32 = 100_000;

/// Random identifier printed on an offer document. Uniform over
/// `[0, CONTRACT_ID_SPACE)`; collisions are accepted, offers are ephemeral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(pub u32);

impl ContractId {
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(0..CONTRACT_ID_SPACE))
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value: u32 = raw
            .trim()
            .parse()
            .map_err(|_| DomainError::InvalidContractId { raw: raw.to_owned() })?;
        if value >= CONTRACT_ID_SPACE {
            return Err(DomainError::InvalidContractId { raw: raw.to_owned() });
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Squad role offered on a contract. Closed choice set; the platform's
/// option schema rejects anything else before it reaches a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractRole {
    Rotation,
    Starter,
    Captain,
    AssistantManager,
}

impl ContractRole {
    pub const ALL: [Self; 4] = [Self::Rotation, Self::Starter, Self::Captain, Self::AssistantManager];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rotation => "Rotation",
            Self::Starter => "Starter",
            Self::Captain => "Captain",
            Self::AssistantManager => "Assistant Manager",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|role| role.display_name().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| DomainError::InvalidChoice {
                option: "role".to_owned(),
                raw: raw.to_owned(),
            })
    }
}

/// Field position offered on a contract. Closed choice set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPosition {
    Striker,
    Midfielder,
    CenterBack,
    Goalkeeper,
}

impl FieldPosition {
    pub const ALL: [Self; 4] = [Self::Striker, Self::Midfielder, Self::CenterBack, Self::Goalkeeper];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Striker => "Striker",
            Self::Midfielder => "Midfielder",
            Self::CenterBack => "Center-back",
            Self::Goalkeeper => "Goalkeeper",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|position| position.display_name().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| DomainError::InvalidChoice {
                option: "position".to_owned(),
                raw: raw.to_owned(),
            })
    }
}

/// A contract offer. Never persisted: the full state of an issued offer lives
/// in the rendered document and the signed token on its accept control.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub contract_id: ContractId,
    pub issuer_tag: String,
    pub candidate_tag: String,
    pub role: ContractRole,
    pub position: FieldPosition,
    pub team_name: String,
}

impl Offer {
    /// Draft a new offer with a freshly generated contract identifier.
    pub fn draft(
        issuer_tag: impl Into<String>,
        candidate_tag: impl Into<String>,
        role: ContractRole,
        position: FieldPosition,
        team_name: impl Into<String>,
    ) -> Self {
        Self {
            contract_id: ContractId::random(),
            issuer_tag: issuer_tag.into(),
            candidate_tag: candidate_tag.into(),
            role,
            position,
            team_name: team_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContractId, ContractRole, FieldPosition, Offer, CONTRACT_ID_SPACE};

    #[test]
    fn random_contract_ids_stay_in_range() {
        for _ in 0..256 {
            assert!(ContractId::random().0 < CONTRACT_ID_SPACE);
        }
    }

    #[test]
    fn contract_id_parse_round_trips_display() {
        let id = ContractId(84_213);
        assert_eq!(ContractId::parse(&id.to_string()).expect("parse"), id);
    }

    #[test]
    fn contract_id_parse_rejects_out_of_range_and_garbage() {
        assert!(ContractId::parse("100000").is_err());
        assert!(ContractId::parse("-3").is_err());
        assert!(ContractId::parse("not-a-number").is_err());
    }

    #[test]
    fn role_display_names_round_trip() {
        for role in ContractRole::ALL {
            assert_eq!(ContractRole::parse(role.display_name()).expect("parse"), role);
        }
        assert_eq!(
            ContractRole::parse("assistant manager").expect("case-insensitive parse"),
            ContractRole::AssistantManager
        );
        assert!(ContractRole::parse("Benchwarmer").is_err());
    }

    #[test]
    fn position_display_names_round_trip() {
        for position in FieldPosition::ALL {
            assert_eq!(FieldPosition::parse(position.display_name()).expect("parse"), position);
        }
        assert_eq!(
            FieldPosition::parse("center-back").expect("hyphenated parse"),
            FieldPosition::CenterBack
        );
        assert!(FieldPosition::parse("Winger").is_err());
    }

    #[test]
    fn draft_carries_all_offer_fields() {
        let offer = Offer::draft(
            "coach#1001",
            "signee#2002",
            ContractRole::Starter,
            FieldPosition::Goalkeeper,
            "Azuras",
        );

        assert_eq!(offer.issuer_tag, "coach#1001");
        assert_eq!(offer.candidate_tag, "signee#2002");
        assert_eq!(offer.role, ContractRole::Starter);
        assert_eq!(offer.position, FieldPosition::Goalkeeper);
        assert_eq!(offer.team_name, "Azuras");
        assert!(offer.contract_id.0 < CONTRACT_ID_SPACE);
    }
}
