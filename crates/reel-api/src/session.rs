//! Session credential: an HS256 JWT naming the signed-in user.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{debug, error};

use reel_db::models::UserRow;
use reel_types::api::Claims;

use crate::error::ApiError;

pub fn mint(secret: &str, user: &UserRow, now: DateTime<Utc>, ttl: Duration) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id,
        open_id: user.open_id.clone(),
        exp: (now + ttl).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Failed to sign session credential: {}", e);
        ApiError::Internal
    })
}

pub fn validate(secret: &str, token: &str) -> Result<Claims, ApiError> {
    // Pin HS256 so a token can't pick its own algorithm
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected session credential: {}", e);
            ApiError::unauthorized("invalid or expired session")
        })
}
