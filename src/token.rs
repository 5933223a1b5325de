use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    error::AppError,
    models::{Identity, Role},
};

/// Claims
///
/// The payload of every issued token. `sub` carries the numeric subject id as a
/// string, as registered JWT claims are strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub unique_name: String,
    pub email: String,
    pub role: String,
    /// Fresh random identifier per token.
    pub jti: String,
    pub iat: i64,
    /// Always set on issued tokens; tokens without it are accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    fn into_identity(self) -> Option<Identity> {
        Some(Identity {
            subject_id: self.sub.parse().ok()?,
            display_name: self.unique_name,
            email: self.email,
            role: self.role.parse::<Role>().ok()?,
        })
    }
}

/// TokenService
///
/// Issues and validates HMAC-SHA256 signed identity tokens. Stateless apart from
/// the keys derived from its `JwtConfig`; safe to share behind an `Arc`.
pub struct TokenService {
    config: JwtConfig,
    lifetime: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// new
    ///
    /// Fails with `AppError::Configuration` when the secret is missing or shorter
    /// than 32 characters, when issuer/audience are blank, or when the expiration
    /// is not positive or too large to add to the current time.
    pub fn new(config: JwtConfig) -> Result<Self, AppError> {
        config.validate()?;
        let lifetime = Duration::try_hours(config.expiration_hours).ok_or_else(|| {
            AppError::Configuration("JWT expiration hours out of range".to_string())
        })?;
        let secret = config.secret_key.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime,
            config,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Token lifetime; expiry is always exactly this long after issuance.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Expiry of a token issued at `now`. Errors instead of overflowing the calendar.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        now.checked_add_signed(self.lifetime).ok_or_else(|| {
            AppError::Configuration(format!(
                "token lifetime overflows when issued at {now}"
            ))
        })
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, AppError> {
        self.issue_at(identity, Utc::now())
    }

    /// issue_at
    ///
    /// Mints a token as if the current time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, AppError> {
        let issued_at = now.timestamp();
        let expires_at = self.expires_at(now)?;
        let claims = Claims {
            sub: identity.subject_id.to_string(),
            unique_name: identity.display_name.clone(),
            email: identity.email.clone(),
            role: identity.role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            nbf: Some(issued_at),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Configuration(format!("failed to sign token: {e}")))?;

        tracing::debug!(subject = identity.subject_id, "token issued");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Option<Identity> {
        self.validate_at(token, Utc::now())
    }

    /// validate_at
    ///
    /// Verifies signature, issuer, audience, expiry and not-before (no clock-skew
    /// tolerance) against the instant `now`. `exp` is mandatory, `nbf` optional. Every failure collapses to `None`; the reason is
    /// only logged.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Option<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;
        // Time claims are checked below against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(reason = ?e.kind(), "token rejected");
                return None;
            }
        };

        if claims.exp < now.timestamp() {
            tracing::debug!(exp = claims.exp, "token rejected: expired");
            return None;
        }
        if let Some(nbf) = claims.nbf.filter(|nbf| *nbf > now.timestamp()) {
            tracing::debug!(nbf, "token rejected: not yet valid");
            return None;
        }

        let identity = claims.into_identity();
        if identity.is_none() {
            tracing::debug!("token rejected: unusable subject or role claim");
        }
        identity
    }
}
