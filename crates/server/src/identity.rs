use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utils::clerk::{ClerkAuth, ClerkAuthError};

use crate::{
    clerk::{ClerkService, ClerkServiceError, ClerkUser},
    config::ClerkConfig,
};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Auth(#[from] ClerkAuthError),
    #[error(transparent)]
    Directory(#[from] ClerkServiceError),
}

impl IdentityError {
    /// The bearer token itself was rejected. Anything else is a provider or
    /// network failure on our side.
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            IdentityError::Auth(err) => !matches!(
                err,
                ClerkAuthError::JwksFetch(_) | ClerkAuthError::JwksUrl(_)
            ),
            IdentityError::Directory(_) => false,
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// Subject claim of the session token; the user's token identifier.
    pub user_id: String,
}

/// A user as listed by the identity provider's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

impl From<ClerkUser> for DirectoryUser {
    fn from(user: ClerkUser) -> Self {
        DirectoryUser {
            id: user.id,
            display_name: user.display_name,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            image_url: user.image_url,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verifies a bearer token and returns the identity it was issued to.
    async fn verify(&self, bearer: &str) -> Result<Viewer, IdentityError>;

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, IdentityError>;
}

pub struct ClerkIdentityProvider {
    auth: ClerkAuth,
    directory: ClerkService,
}

impl ClerkIdentityProvider {
    pub fn new(config: &ClerkConfig) -> Result<Self, IdentityError> {
        Ok(Self {
            auth: ClerkAuth::new(config.get_issuer().clone())?,
            directory: ClerkService::new(config)?,
        })
    }
}

#[async_trait]
impl IdentityProvider for ClerkIdentityProvider {
    async fn verify(&self, bearer: &str) -> Result<Viewer, IdentityError> {
        let identity = self.auth.verify(bearer).await?;
        Ok(Viewer {
            user_id: identity.user_id,
        })
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, IdentityError> {
        let users = self.directory.list_users().await?;
        Ok(users.into_iter().map(DirectoryUser::from).collect())
    }
}
