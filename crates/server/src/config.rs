use std::env;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite://taskflow.sqlite";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8081";
const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com/v1/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
    #[error("environment variable `{name}` is not a valid url: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct ClerkConfig {
    issuer: Url,
    api_url: Url,
    secret_key: SecretString,
}

impl ClerkConfig {
    pub fn new(issuer: Url, api_url: Url, secret_key: SecretString) -> Self {
        Self {
            issuer,
            api_url,
            secret_key,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer = env::var("CLERK_ISSUER").map_err(|_| ConfigError::MissingVar("CLERK_ISSUER"))?;
        let issuer = parse_url("CLERK_ISSUER", &issuer)?;

        let secret_key = env::var("CLERK_SECRET_KEY")
            .map_err(|_| ConfigError::MissingVar("CLERK_SECRET_KEY"))?;

        let api_url =
            env::var("CLERK_API_URL").unwrap_or_else(|_| DEFAULT_CLERK_API_URL.to_string());
        // Relative joins drop the last segment unless the base ends in `/`.
        let api_url = if api_url.ends_with('/') {
            api_url
        } else {
            format!("{api_url}/")
        };
        let api_url = parse_url("CLERK_API_URL", &api_url)?;

        Ok(Self::new(issuer, api_url, SecretString::from(secret_key)))
    }

    pub fn get_issuer(&self) -> &Url {
        &self.issuer
    }

    pub fn get_api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn get_secret_key(&self) -> &SecretString {
        &self.secret_key
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub cors_permissive: bool,
    pub clerk: ClerkConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let listen_addr =
            env::var("SERVER_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

        let cors_permissive = env::var("CORS_PERMISSIVE")
            .map(|value| !matches!(value.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            listen_addr,
            cors_permissive,
            clerk: ClerkConfig::from_env()?,
        })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}
