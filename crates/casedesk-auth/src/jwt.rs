//! Access token creation and verification (HS256).

use anyhow::anyhow;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use casedesk_config::JwtConfig;
use casedesk_core::AppError;

use crate::claims::Claims;

/// Creates an access token embedding the user's role and permission names.
///
/// # Errors
///
/// Returns an internal error if encoding fails.
pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    role_id: Option<Uuid>,
    role_name: Option<String>,
    permissions: Vec<String>,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let exp = now + jwt_config.access_token_expiry.max(0) as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role_id,
        role_name,
        permissions,
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(anyhow!("Failed to create token: {}", e)))
}

/// Verifies signature and expiry and returns the claims.
///
/// # Errors
///
/// Returns an unauthorized error for bad signatures, expired or malformed
/// tokens.
pub fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Token inválido o expirado"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
        }
    }

    #[test]
    fn test_create_and_verify_round_trip() {
        let user_id = Uuid::new_v4();
        let role_id = Uuid::from_u128(3);
        let token = create_access_token(
            user_id,
            "agente@casedesk.local",
            Some(role_id),
            Some("Agente".to_string()),
            vec!["casos.read.own".to_string(), "knowledge.read.all".to_string()],
            &config(),
        )
        .unwrap();

        let claims = verify_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role_id, Some(role_id));
        assert_eq!(claims.role_name.as_deref(), Some("Agente"));
        assert_eq!(claims.permissions.len(), 2);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token =
            create_access_token(Uuid::new_v4(), "a@b.co", None, None, vec![], &config()).unwrap();
        let other = JwtConfig {
            secret: "another-secret".to_string(),
            ..config()
        };
        let err = verify_token(&token, &other).unwrap_err();
        assert_eq!(err.status.as_u16(), 401);
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@b.co".to_string(),
            role_id: None,
            role_name: None,
            permissions: vec![],
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config().secret.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, &config()).is_err());
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        let err = verify_token("not.a.jwt", &config()).unwrap_err();
        assert_eq!(err.public_message(), "Token inválido o expirado");
    }
}
