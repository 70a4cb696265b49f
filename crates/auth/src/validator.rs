use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 validator with a shared secret.
///
/// The time window is checked by [`validate_claims`] against the caller's
/// `now` rather than by the JWT library's registered `exp` claim.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use labdesk_core::UserId;

    fn mint(secret: &[u8], claims: &JwtClaims, alg: Algorithm) -> String {
        jsonwebtoken::encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let now = Utc::now();
        let c = claims(now);
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let decoded = validator.validate(&mint(b"s3cret", &c, Algorithm::HS256), now).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn rejects_wrong_secret_wrong_algorithm_and_expiry() {
        let now = Utc::now();
        let c = claims(now);
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());

        let forged = mint(b"other", &c, Algorithm::HS256);
        assert!(matches!(
            validator.validate(&forged, now),
            Err(TokenValidationError::Malformed(_))
        ));

        let hs512 = mint(b"s3cret", &c, Algorithm::HS512);
        assert!(validator.validate(&hs512, now).is_err());

        let token = mint(b"s3cret", &c, Algorithm::HS256);
        assert_eq!(
            validator.validate(&token, now + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );

        assert!(validator.validate("not-a-jwt", now).is_err());
    }
}
