//! Token codec and password hashing.
//!
//! Tokens are HS256 JWTs signed with the configured secret. The verifier is
//! pinned to HS256: the algorithm named in a token header is never used to
//! choose a key, so `none` and asymmetric algorithms are rejected outright.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::HbError;
use chrono::Utc;
use common::jwt::{check_token_size, validate_iat, JwtValidationError, TokenKind, UserClaims};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Length of the random token identifier in bytes (128 bits).
pub const JTI_BYTES: usize = 16;

/// Signs and verifies user tokens.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    clock_skew: Duration,
}

impl TokenCodec {
    /// Create a codec for the given HMAC secret and issuer.
    pub fn new(secret: &SecretString, issuer: &str, clock_skew_seconds: i64) -> Self {
        let key_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key_bytes),
            decoding_key: DecodingKey::from_secret(key_bytes),
            validation,
            issuer: issuer.to_string(),
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
        }
    }

    /// Build fresh claims for a user with a new random `jti`.
    pub fn claims_for(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
        kind: TokenKind,
        ttl_seconds: u64,
    ) -> Result<UserClaims, HbError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl_seconds)
            .map_err(|_| HbError::Internal(format!("Token TTL out of range: {}", ttl_seconds)))?;

        Ok(UserClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            jti: generate_jti()?,
            iat: now,
            exp: now + ttl,
            iss: self.issuer.clone(),
            typ: kind,
        })
    }

    /// Sign claims into a compact JWT.
    #[instrument(skip_all)]
    pub fn mint(&self, claims: &UserClaims) -> Result<String, HbError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| HbError::Crypto(format!("Token signing failed: {}", e)))
    }

    /// Verify a JWT and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check before parsing
    /// 2. HS256 signature with the configured key (header `alg` must be HS256)
    /// 3. `exp` not in the past, `iss` matches
    /// 4. `typ` matches `expected`
    /// 5. `sub` is a UUID and `jti` is non-empty
    /// 6. `iat` not beyond the clock skew tolerance
    ///
    /// Every failure maps to a `JwtValidationError` whose message is generic;
    /// the specific reason is logged at debug level.
    #[instrument(skip_all, fields(expected = expected.as_str()))]
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<UserClaims, JwtValidationError> {
        check_token_size(token)?;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(target: "hb.crypto.jwt", error = %e, "Token verification failed");
                classify_jwt_error(e.kind())
            })?;

        let claims = token_data.claims;

        if claims.typ != expected {
            tracing::debug!(
                target: "hb.crypto.jwt",
                presented = claims.typ.as_str(),
                "Token rejected: wrong token kind"
            );
            return Err(JwtValidationError::WrongTokenKind);
        }

        if Uuid::parse_str(&claims.sub).is_err() || claims.jti.trim().is_empty() {
            tracing::debug!(target: "hb.crypto.jwt", "Token rejected: missing or invalid sub/jti");
            return Err(JwtValidationError::MissingClaim);
        }

        validate_iat(claims.iat, self.clock_skew)?;

        Ok(claims)
    }
}

fn classify_jwt_error(kind: &ErrorKind) -> JwtValidationError {
    match kind {
        ErrorKind::InvalidSignature => JwtValidationError::InvalidSignature,
        ErrorKind::ExpiredSignature => JwtValidationError::Expired,
        ErrorKind::InvalidIssuer => JwtValidationError::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(_) => JwtValidationError::MissingClaim,
        _ => JwtValidationError::MalformedToken,
    }
}

/// Hash a password with bcrypt.
///
/// The cost is re-checked here even though configuration already bounds it.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, HbError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(HbError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password, cost).map_err(|e| HbError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HbError> {
    bcrypt::verify(password, hash)
        .map_err(|e| HbError::Crypto(format!("Password verification failed: {}", e)))
}

/// Hash of a random throwaway password, verified against when a login names
/// an unknown email so both paths spend the same bcrypt time.
pub fn dummy_password_hash(cost: u32) -> Result<String, HbError> {
    let throwaway = hex::encode(generate_random_bytes(16)?);
    hash_password(&throwaway, cost)
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, HbError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| HbError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// Generate a token identifier (128 random bits, hex encoded).
pub fn generate_jti() -> Result<String, HbError> {
    Ok(hex::encode(generate_random_bytes(JTI_BYTES)?))
}
