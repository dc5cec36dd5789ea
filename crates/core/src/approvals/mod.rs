//! Approval tokens and the gate that validates them.
//!
//! A token proves that a specific action, with specific proposed
//! parameters, was approved. Tokens are minted by [`TokenIssuer`] and
//! carry the action id, a hash of the proposed parameters, and an
//! expiry, all bound together by an HMAC-SHA256 signature:
//!
//! `smtk.<action_id>.<params_hash>.<expires_unix>.<signature>`
//!
//! The gate fails closed: an empty, malformed, forged, mismatched, or
//! expired token is always rejected. Single-use enforcement lives in
//! the executor, which replays the ledgered result for a token that
//! already produced an execution instead of dispatching again.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::action::ActionId;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PREFIX: &str = "smtk";

/// Ids the token grammar cannot carry are rejected at issuance; the
/// gate could only ever reject the resulting token as malformed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenIssueError {
    #[error("action id `{0}` contains `.`, which the token grammar reserves")]
    UnsupportedActionId(String),
}

/// A minted approval credential for exactly one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalToken {
    pub value: String,
    pub action_id: ActionId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalDenial {
    MissingToken,
    MalformedToken,
    BadSignature,
    ActionMismatch { token_action_id: String },
    ParamsMismatch,
    Expired { expired_at: DateTime<Utc> },
}

impl ApprovalDenial {
    pub fn reason(&self) -> String {
        match self {
            Self::MissingToken => "approval token is missing".to_string(),
            Self::MalformedToken => "approval token is malformed".to_string(),
            Self::BadSignature => "approval token signature does not verify".to_string(),
            Self::ActionMismatch { token_action_id } => {
                format!("approval token was issued for action `{token_action_id}`")
            }
            Self::ParamsMismatch => {
                "approval token does not cover the submitted parameters".to_string()
            }
            Self::Expired { expired_at } => {
                format!("approval token expired at {}", expired_at.to_rfc3339())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub allowed: bool,
    pub reason: String,
    pub denial: Option<ApprovalDenial>,
}

impl ApprovalDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into(), denial: None }
    }

    fn deny(denial: ApprovalDenial) -> Self {
        Self { allowed: false, reason: denial.reason(), denial: Some(denial) }
    }
}

/// Mints signed approval tokens. Signing authority normally sits with
/// an upstream approval workflow; this issuer exists so the gate has a
/// counterpart and tests can mint real tokens.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    signing_key: SecretString,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(signing_key: SecretString, ttl_secs: i64) -> Self {
        Self { signing_key, ttl: Duration::seconds(ttl_secs.max(1)) }
    }

    pub fn issue(
        &self,
        action_id: &ActionId,
        params: &serde_json::Value,
    ) -> Result<ApprovalToken, TokenIssueError> {
        self.issue_at(action_id, params, Utc::now())
    }

    pub fn issue_at(
        &self,
        action_id: &ActionId,
        params: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<ApprovalToken, TokenIssueError> {
        if action_id.0.contains('.') {
            return Err(TokenIssueError::UnsupportedActionId(action_id.0.clone()));
        }

        let params_hash = params_hash(params);
        let expires_at = now + self.ttl;
        let expires_unix = expires_at.timestamp();
        let signature = hmac_hex(
            self.signing_key.expose_secret().as_bytes(),
            signing_material(&action_id.0, &params_hash, expires_unix).as_bytes(),
        );

        Ok(ApprovalToken {
            value: format!(
                "{TOKEN_PREFIX}.{}.{params_hash}.{expires_unix}.{signature}",
                action_id.0
            ),
            action_id: action_id.clone(),
            expires_at,
        })
    }
}

/// Validates a presented token against the action and parameters the
/// caller wants to execute.
#[derive(Clone, Debug)]
pub struct ApprovalGate {
    signing_key: SecretString,
}

impl ApprovalGate {
    pub fn new(signing_key: SecretString) -> Self {
        Self { signing_key }
    }

    pub fn validate(
        &self,
        action_id: &ActionId,
        token: &str,
        params: &serde_json::Value,
    ) -> ApprovalDecision {
        self.validate_at(action_id, token, params, Utc::now())
    }

    pub fn validate_at(
        &self,
        action_id: &ActionId,
        token: &str,
        params: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> ApprovalDecision {
        let token = token.trim();
        if token.is_empty() {
            return ApprovalDecision::deny(ApprovalDenial::MissingToken);
        }

        // Action ids must not contain `.`; the token grammar reserves
        // it as the field separator.
        let parts: Vec<&str> = token.split('.').collect();
        let [prefix, token_action_id, token_params_hash, expires_str, signature] = parts[..] else {
            return ApprovalDecision::deny(ApprovalDenial::MalformedToken);
        };
        if prefix != TOKEN_PREFIX {
            return ApprovalDecision::deny(ApprovalDenial::MalformedToken);
        }
        let Ok(expires_unix) = expires_str.parse::<i64>() else {
            return ApprovalDecision::deny(ApprovalDenial::MalformedToken);
        };
        let Some(expires_at) = DateTime::<Utc>::from_timestamp(expires_unix, 0) else {
            return ApprovalDecision::deny(ApprovalDenial::MalformedToken);
        };

        let expected_signature = hmac_hex(
            self.signing_key.expose_secret().as_bytes(),
            signing_material(token_action_id, token_params_hash, expires_unix).as_bytes(),
        );
        if signature != expected_signature {
            return ApprovalDecision::deny(ApprovalDenial::BadSignature);
        }

        if token_action_id != action_id.0 {
            return ApprovalDecision::deny(ApprovalDenial::ActionMismatch {
                token_action_id: token_action_id.to_string(),
            });
        }

        if token_params_hash != params_hash(params) {
            return ApprovalDecision::deny(ApprovalDenial::ParamsMismatch);
        }

        if now > expires_at {
            return ApprovalDecision::deny(ApprovalDenial::Expired { expired_at: expires_at });
        }

        ApprovalDecision::allow(format!(
            "approval token for action `{}` is valid until {}",
            action_id.0,
            expires_at.to_rfc3339()
        ))
    }
}

/// Stable fingerprint of a presented token, used as the idempotency
/// ledger key so raw tokens are never stored.
pub fn token_fingerprint(token: &str) -> String {
    sha256_hex(token.trim().as_bytes())
}

fn signing_material(action_id: &str, params_hash: &str, expires_unix: i64) -> String {
    format!("{action_id}\n{params_hash}\n{expires_unix}")
}

fn params_hash(params: &serde_json::Value) -> String {
    // serde_json maps are ordered, so Display output is canonical.
    sha256_hex(params.to_string().as_bytes())
}

fn hmac_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return sha256_hex(payload),
    };
    mac.update(payload);
    encode_hex(mac.finalize().into_bytes().as_slice())
}

fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    encode_hex(digest.as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use serde_json::json;

    use crate::domain::action::ActionId;

    use super::{token_fingerprint, ApprovalDenial, ApprovalGate, TokenIssueError, TokenIssuer};

    fn key() -> SecretString {
        SecretString::from("test-signing-key".to_string())
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(key(), 3600)
    }

    fn gate() -> ApprovalGate {
        ApprovalGate::new(key())
    }

    fn action_id() -> ActionId {
        ActionId("ACT001".to_string())
    }

    #[test]
    fn issued_token_validates_for_its_action_and_params() {
        let params = json!({"type": "price_change", "sku": "STRAW-1", "price_cents": 299});
        let token = issuer().issue(&action_id(), &params).expect("issue");

        let decision = gate().validate(&action_id(), &token.value, &params);
        assert!(decision.allowed, "{}", decision.reason);
        assert!(decision.denial.is_none());
    }

    #[test]
    fn empty_token_is_rejected_as_missing() {
        let decision = gate().validate(&action_id(), "", &json!({}));
        assert_eq!(decision.denial, Some(ApprovalDenial::MissingToken));

        let decision = gate().validate(&action_id(), "   ", &json!({}));
        assert_eq!(decision.denial, Some(ApprovalDenial::MissingToken));
    }

    #[test]
    fn garbage_token_is_rejected_as_malformed() {
        let decision = gate().validate(&action_id(), "tok-123", &json!({}));
        assert_eq!(decision.denial, Some(ApprovalDenial::MalformedToken));
    }

    #[test]
    fn token_for_another_action_is_rejected() {
        let params = json!({"sku": "STRAW-1"});
        let token = issuer().issue(&ActionId("ACT002".to_string()), &params).expect("issue");

        let decision = gate().validate(&action_id(), &token.value, &params);
        assert_eq!(
            decision.denial,
            Some(ApprovalDenial::ActionMismatch { token_action_id: "ACT002".to_string() })
        );
    }

    #[test]
    fn token_with_different_params_is_rejected() {
        let token = issuer().issue(&action_id(), &json!({"price_cents": 299})).expect("issue");

        let decision = gate().validate(&action_id(), &token.value, &json!({"price_cents": 199}));
        assert_eq!(decision.denial, Some(ApprovalDenial::ParamsMismatch));
    }

    #[test]
    fn expired_token_is_rejected() {
        let params = json!({"sku": "STRAW-1"});
        let issued_at = Utc::now() - Duration::hours(3);
        let token = issuer().issue_at(&action_id(), &params, issued_at).expect("issue");

        let decision = gate().validate_at(&action_id(), &token.value, &params, Utc::now());
        assert!(matches!(decision.denial, Some(ApprovalDenial::Expired { .. })));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let params = json!({"sku": "STRAW-1"});
        let token = issuer().issue(&action_id(), &params).expect("issue");
        let mut tampered = token.value.clone();
        let last = tampered.pop();
        tampered.push(if last == Some('0') { '1' } else { '0' });

        let decision = gate().validate(&action_id(), &tampered, &params);
        assert!(matches!(
            decision.denial,
            Some(ApprovalDenial::BadSignature) | Some(ApprovalDenial::MalformedToken)
        ));
    }

    #[test]
    fn token_signed_with_another_key_is_rejected() {
        let params = json!({"sku": "STRAW-1"});
        let foreign =
            TokenIssuer::new(SecretString::from("other-key".to_string()), 3600);
        let token = foreign.issue(&action_id(), &params).expect("issue");

        let decision = gate().validate(&action_id(), &token.value, &params);
        assert_eq!(decision.denial, Some(ApprovalDenial::BadSignature));
    }

    #[test]
    fn issuance_rejects_action_ids_containing_the_field_separator() {
        let error = issuer()
            .issue(&ActionId("ACT.001".to_string()), &json!({}))
            .expect_err("dotted id cannot be carried by the token grammar");

        assert_eq!(error, TokenIssueError::UnsupportedActionId("ACT.001".to_string()));
    }

    #[test]
    fn fingerprint_is_stable_and_ignores_surrounding_whitespace() {
        assert_eq!(token_fingerprint("tok-123"), token_fingerprint(" tok-123 "));
        assert_ne!(token_fingerprint("tok-123"), token_fingerprint("tok-124"));
    }
}
