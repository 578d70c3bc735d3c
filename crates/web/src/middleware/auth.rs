use actix_web::{dev::ServiceRequest, error::ErrorUnauthorized, Error};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use engine::JudgeRole;

/// Bearer validator for director/admin endpoints.
pub async fn api_key_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let api_keys = req
        .app_data::<actix_web::web::Data<ApiKeys>>()
        .expect("ApiKeys not configured");

    if api_keys.is_valid(credentials.token()) {
        Ok(req)
    } else {
        tracing::warn!("Invalid API key attempt");
        Err((ErrorUnauthorized("Invalid API key"), req))
    }
}

#[derive(Clone)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    pub fn from_comma_separated(keys_str: &str) -> Self {
        let keys = keys_str
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Self { keys }
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Claims carried by a judge token. The token rides in a login URL shown
/// as a QR code; the tablet presents it on session join and on every vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeClaims {
    pub sub: String,
    pub judge_id: i64,
    pub meet_id: i64,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl JudgeClaims {
    pub fn judge_role(&self) -> Result<JudgeRole, String> {
        self.role.parse()
    }
}

/// Issues and verifies HMAC-signed judge tokens.
#[derive(Clone)]
pub struct JudgeTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JudgeTokens {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        judge_id: i64,
        meet_id: i64,
        role: JudgeRole,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = JudgeClaims {
            sub: format!("judge:{judge_id}"),
            judge_id,
            meet_id,
            role: role.as_str().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Signature and expiry are both checked; expired tokens fail.
    pub fn verify(&self, token: &str) -> Result<JudgeClaims, jsonwebtoken::errors::Error> {
        decode::<JudgeClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_from_comma_separated() {
        let keys = ApiKeys::from_comma_separated("alpha, beta ,,gamma");
        assert!(keys.is_valid("alpha"));
        assert!(keys.is_valid("beta"));
        assert!(keys.is_valid("gamma"));
        assert!(!keys.is_valid(""));
        assert!(!keys.is_valid("delta"));
    }

    #[test]
    fn judge_token_round_trip() {
        let tokens = JudgeTokens::new("test-secret");
        let token = tokens
            .issue(5, 9, JudgeRole::Left, Duration::hours(12))
            .unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.judge_id, 5);
        assert_eq!(claims.meet_id, 9);
        assert_eq!(claims.judge_role(), Ok(JudgeRole::Left));
    }

    #[test]
    fn judge_token_rejects_wrong_secret() {
        let issued = JudgeTokens::new("secret-one");
        let verifier = JudgeTokens::new("secret-two");

        let token = issued
            .issue(1, 1, JudgeRole::Head, Duration::hours(1))
            .unwrap();
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn judge_token_rejects_expired() {
        let tokens = JudgeTokens::new("test-secret");
        let token = tokens
            .issue(1, 1, JudgeRole::Head, Duration::seconds(-120))
            .unwrap();
        assert!(tokens.verify(&token).is_err());
    }
}
