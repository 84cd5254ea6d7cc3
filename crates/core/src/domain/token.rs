use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::offer::ContractId;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const MAC_BYTES: usize = 8;

/// The accept-side state of an offer, carried as a signed opaque token on the
/// accept control instead of being re-parsed out of the rendered document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfferClaim {
    pub contract_id: ContractId,
    pub team_name: String,
    pub issued_at: i64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("offer token is malformed")]
    Malformed,
    #[error("offer token version `{0}` is not supported")]
    UnsupportedVersion(String),
    #[error("offer token signature does not verify")]
    BadSignature,
}

/// Encodes and verifies offer claims. Tokens look like
/// `v1.<contract_id>.<issued_at>.<team hex>.<mac hex>` where the mac is the
/// truncated HMAC-SHA256 of the canonical claim string under a
/// process-lifetime key.
#[derive(Clone, Debug)]
pub struct OfferTokenCodec {
    signing_key: Vec<u8>,
}

impl OfferTokenCodec {
    pub fn new(signing_key: impl AsRef<[u8]>) -> Self {
        Self { signing_key: signing_key.as_ref().to_vec() }
    }

    pub fn encode(&self, claim: &OfferClaim) -> String {
        let canonical = canonical_claim(claim);
        let mac = hmac_truncated_hex(&self.signing_key, canonical.as_bytes());
        format!(
            "{TOKEN_VERSION}.{}.{}.{}.{mac}",
            claim.contract_id,
            claim.issued_at,
            encode_hex(claim.team_name.as_bytes()),
        )
    }

    pub fn decode(&self, token: &str) -> Result<OfferClaim, TokenError> {
        let mut parts = token.split('.');
        let version =
            parts.next().filter(|part| !part.is_empty()).ok_or(TokenError::Malformed)?;
        if version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(version.to_owned()));
        }

        let contract_id = parts
            .next()
            .and_then(|raw| ContractId::parse(raw).ok())
            .ok_or(TokenError::Malformed)?;
        let issued_at: i64 = parts
            .next()
            .and_then(|raw| raw.parse().ok())
            .ok_or(TokenError::Malformed)?;
        let team_bytes = parts.next().and_then(decode_hex).ok_or(TokenError::Malformed)?;
        let team_name = String::from_utf8(team_bytes).map_err(|_| TokenError::Malformed)?;
        let presented_mac = parts.next().and_then(decode_hex).ok_or(TokenError::Malformed)?;
        if parts.next().is_some() || presented_mac.len() != MAC_BYTES {
            return Err(TokenError::Malformed);
        }

        let claim = OfferClaim { contract_id, team_name, issued_at };
        let mut mac = match HmacSha256::new_from_slice(&self.signing_key) {
            Ok(mac) => mac,
            Err(_) => return Err(TokenError::BadSignature),
        };
        mac.update(canonical_claim(&claim).as_bytes());
        mac.verify_truncated_left(&presented_mac).map_err(|_| TokenError::BadSignature)?;

        Ok(claim)
    }
}

fn canonical_claim(claim: &OfferClaim) -> String {
    format!("{TOKEN_VERSION}|{}|{}|{}", claim.contract_id, claim.issued_at, claim.team_name)
}

fn hmac_truncated_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    encode_hex(&digest[..MAC_BYTES])
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&raw[index..index + 2], 16).ok())
        .collect()
}
