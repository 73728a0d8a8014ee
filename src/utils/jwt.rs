use std::{collections::HashSet, env};

use crate::routes::auth::claims::{Claims, TokenType};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::Error, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use thiserror::Error;
use uuid::Uuid;

/// Minimum acceptable size for the JWT secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
/// Minimum number of unique bytes expected for the JWT secret to avoid trivially guessable values.
const MIN_UNIQUE_JWT_BYTES: usize = 8;

/// Signing algorithm for issued tokens.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
/// Algorithms a presented token may declare. Anything outside the HMAC family is rejected.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Error)]
pub enum JwtSecretError {
    #[error("JWT_SECRET must be set")]
    Missing,
    #[error("JWT_SECRET must be at least {required} bytes, but {actual} bytes were provided")]
    TooShort { actual: usize, required: usize },
    #[error(
        "JWT_SECRET must contain sufficient entropy (at least {required} unique bytes); only {actual} unique bytes found"
    )]
    LowEntropy { actual: usize, required: usize },
}

/// Why a presented token was refused.
///
/// `Expired` is only reported for tokens whose signature checked out, so callers
/// can point the client at the refresh flow instead of a fresh login.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn from_env() -> Result<Self, JwtSecretError> {
        let value = env::var("JWT_SECRET").map_err(|_| JwtSecretError::Missing)?;
        Self::from_secret(value)
    }

    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, JwtSecretError> {
        let bytes = secret.as_ref();
        validate_secret(bytes)?;

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn validate_secret(secret: &[u8]) -> Result<(), JwtSecretError> {
    if secret.is_empty() {
        return Err(JwtSecretError::Missing);
    }

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(JwtSecretError::TooShort {
            actual: secret.len(),
            required: MIN_JWT_SECRET_LENGTH,
        });
    }

    let unique = secret.iter().copied().collect::<HashSet<_>>().len();
    if unique < MIN_UNIQUE_JWT_BYTES {
        return Err(JwtSecretError::LowEntropy {
            actual: unique,
            required: MIN_UNIQUE_JWT_BYTES,
        });
    }

    Ok(())
}

/// Builds and signs claims for the given identity. Lifetime follows the token type.
pub fn issue_token(
    user_id: Uuid,
    username: &str,
    email: &str,
    role: &str,
    token_type: TokenType,
    keys: &JwtKeys,
) -> Result<String, Error> {
    let claims = Claims::new(user_id, username, email, role, token_type);
    encode_claims(&claims, keys)
}

pub(crate) fn encode_claims(claims: &Claims, keys: &JwtKeys) -> Result<String, Error> {
    encode(&Header::new(SIGNING_ALGORITHM), claims, keys.encoding_key())
}

/// Checks signature, algorithm family and expiry, in that order.
pub fn verify_token(token: &str, keys: &JwtKeys) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let data = decode::<Claims>(token, keys.decoding_key(), &validation).map_err(classify)?;

    // jsonwebtoken only rejects `exp < now`; a token expiring this very second is already dead.
    if data.claims.exp <= Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(data.claims)
}

fn classify(err: Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}
