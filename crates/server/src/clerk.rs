use std::time::Duration;

use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::ClerkConfig;

const PAGE_SIZE: usize = 100;

/// Client for the identity provider's backend REST API.
#[derive(Debug, Clone)]
pub struct ClerkService {
    client: Client,
    api_url: Url,
    secret_key: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClerkUser {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Error)]
pub enum ClerkServiceError {
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ClerkService {
    pub fn new(config: &ClerkConfig) -> Result<Self, ClerkServiceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_url: config.get_api_url().clone(),
            secret_key: config.get_secret_key().clone(),
        })
    }

    /// Every user registered with the provider, following pagination until a
    /// short page is returned.
    pub async fn list_users(&self) -> Result<Vec<ClerkUser>, ClerkServiceError> {
        let mut users = Vec::new();
        let mut offset = 0;

        loop {
            let mut url = self.endpoint("users")?;
            url.query_pairs_mut()
                .append_pair("limit", &PAGE_SIZE.to_string())
                .append_pair("offset", &offset.to_string())
                .append_pair("order_by", "-created_at");

            let page: Vec<UserResponse> = self
                .client
                .get(url)
                .bearer_auth(self.secret_key.expose_secret())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let fetched = page.len();
            users.extend(page.into_iter().map(ClerkUser::from));
            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        tracing::debug!(count = users.len(), "listed identity provider users");
        Ok(users)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClerkServiceError> {
        self.api_url
            .join(path)
            .map_err(|err| ClerkServiceError::InvalidResponse(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    image_url: Option<String>,
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<UserEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct UserEmailAddress {
    id: String,
    email_address: String,
}

impl From<UserResponse> for ClerkUser {
    fn from(value: UserResponse) -> Self {
        let email = resolve_primary_email(
            value.primary_email_address_id.as_deref(),
            &value.email_addresses,
        );

        let display_name = compose_name(value.first_name.as_deref(), value.last_name.as_deref())
            .or_else(|| value.username.clone())
            .or_else(|| email.clone())
            .unwrap_or_else(|| value.id.clone());

        Self {
            id: value.id,
            first_name: value.first_name,
            last_name: value.last_name,
            email,
            image_url: value.image_url,
            display_name,
        }
    }
}

fn resolve_primary_email(
    primary_id: Option<&str>,
    addresses: &[UserEmailAddress],
) -> Option<String> {
    primary_id
        .and_then(|primary_id| addresses.iter().find(|address| address.id == primary_id))
        .or_else(|| addresses.first())
        .map(|address| address.email_address.clone())
}

fn compose_name(first_name: Option<&str>, last_name: Option<&str>) -> Option<String> {
    match (first_name, last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.to_string()),
        (None, Some(last)) => Some(last.to_string()),
        (None, None) => None,
    }
}
