use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use jsonwebtoken::{
    Algorithm, DecodingKey, TokenData, Validation, decode, decode_header,
    jwk::{AlgorithmParameters, JwkSet},
};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ClerkAuthError {
    #[error("missing authorization token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token header missing `kid`")]
    MissingKeyId,
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(#[from] reqwest::Error),
    #[error("invalid JWKS url: {0}")]
    JwksUrl(#[from] url::ParseError),
    #[error("JWKS key `{0}` not found")]
    KeyNotFound(String),
    #[error("invalid JWKS key: {0}")]
    KeyConstruction(#[source] jsonwebtoken::errors::Error),
    #[error("invalid expiration: {0}")]
    InvalidExpiry(i64),
}

/// The verified subject of a session token. `user_id` is the provider's
/// subject claim and doubles as the user's token identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClerkIdentity {
    pub user_id: String,
    pub session_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClerkClaims {
    sub: String,
    #[serde(default)]
    sid: Option<String>,
    exp: i64,
}

fn claims_to_identity(token: TokenData<ClerkClaims>) -> Result<ClerkIdentity, ClerkAuthError> {
    let ClerkClaims { sub, sid, exp } = token.claims;

    let expires_at = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or(ClerkAuthError::InvalidExpiry(exp))?;

    Ok(ClerkIdentity {
        user_id: sub,
        session_id: sid,
        expires_at,
    })
}

/// Verifies RS256 session tokens against the issuer's JWKS. Decoding keys are
/// cached per `kid` for the lifetime of the verifier.
#[derive(Clone)]
pub struct ClerkAuth {
    issuer: Url,
    client: Client,
    jwks: Arc<DashMap<String, DecodingKey>>,
}

impl ClerkAuth {
    pub fn new(issuer: Url) -> Result<Self, ClerkAuthError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            issuer,
            client,
            jwks: Arc::new(DashMap::new()),
        })
    }

    pub async fn verify(&self, bearer: &str) -> Result<ClerkIdentity, ClerkAuthError> {
        if bearer.trim().is_empty() {
            return Err(ClerkAuthError::MissingToken);
        }

        let header = decode_header(bearer)?;
        let kid = header.kid.ok_or(ClerkAuthError::MissingKeyId)?;

        let decoding_key = match self.jwks.get(&kid) {
            Some(key) => key.clone(),
            None => self.fetch_key(&kid).await?,
        };

        let mut validation = Validation::new(Algorithm::RS256);
        let issuer = self.issuer.as_str().trim_end_matches('/');
        validation.set_issuer(&[issuer]);
        validation.validate_exp = true;

        let claims = decode::<ClerkClaims>(bearer, &decoding_key, &validation)?;
        claims_to_identity(claims)
    }

    async fn fetch_key(&self, kid: &str) -> Result<DecodingKey, ClerkAuthError> {
        let jwks_url = self.issuer.join("/.well-known/jwks.json")?;

        tracing::debug!(%jwks_url, kid, "fetching signing keys");
        let jwks: JwkSet = self
            .client
            .get(jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let key = jwks
            .find(kid)
            .ok_or_else(|| ClerkAuthError::KeyNotFound(kid.to_owned()))?;

        let rsa = match &key.algorithm {
            AlgorithmParameters::RSA(params) => params,
            _ => return Err(ClerkAuthError::KeyNotFound(kid.to_owned())),
        };

        let decoding_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(ClerkAuthError::KeyConstruction)?;
        self.jwks.insert(kid.to_owned(), decoding_key.clone());
        Ok(decoding_key)
    }
}
