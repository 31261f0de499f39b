//! Google OAuth credentials and their lookup.
//!
//! Secrets never appear in `Debug` output or logs.

use crate::error::CredentialError;
use async_trait::async_trait;
use mantra_core::UserId;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// A user's Google OAuth credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleCredentials {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Scopes granted to the token.
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl GoogleCredentials {
    /// Creates credentials against Google's token endpoint with no scopes.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_uri: default_token_uri(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn grants(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Returns the scopes in `required` that these credentials lack, in order
    /// and without duplicates.
    #[must_use]
    pub fn missing_scopes<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing: Vec<String> = Vec::new();
        for scope in required {
            if !self.grants(scope) && !missing.iter().any(|m| m == scope) {
                missing.push(scope.to_string());
            }
        }
        missing
    }

    /// Fields a token node needs to exchange the refresh token.
    #[must_use]
    pub fn token_exchange_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("client_id".to_string(), Value::String(self.client_id.clone()));
        fields.insert(
            "client_secret".to_string(),
            Value::String(self.client_secret.clone()),
        );
        fields.insert(
            "refresh_token".to_string(),
            Value::String(self.refresh_token.clone()),
        );
        fields.insert("token_uri".to_string(), Value::String(self.token_uri.clone()));
        fields
    }
}

impl fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Looks up a user's Google credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns the user's credentials, or `None` if the user never connected
    /// a Google account.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the lookup itself failed.
    async fn get_credentials(
        &self,
        user_id: UserId,
    ) -> Result<Option<GoogleCredentials>, Report<CredentialError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn credentials() -> GoogleCredentials {
        GoogleCredentials::new("ya29.access", "1//refresh", "client.apps", "s3cret").with_scopes([
            "https://www.googleapis.com/auth/gmail.modify",
            "https://www.googleapis.com/auth/calendar",
        ])
    }

    #[test]
    fn reports_missing_scopes_once() {
        let missing = credentials().missing_scopes([
            "https://www.googleapis.com/auth/calendar",
            "https://www.googleapis.com/auth/drive",
            "https://www.googleapis.com/auth/drive",
        ]);
        assert_eq!(missing, vec!["https://www.googleapis.com/auth/drive".to_string()]);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("ya29.access"));
        assert!(!debug.contains("1//refresh"));
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("client.apps"));
    }

    #[test]
    fn decoding_defaults_token_uri() {
        let decoded: GoogleCredentials = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "client_id": "c",
            "client_secret": "s"
        }))
        .expect("decode");
        assert_eq!(decoded.token_uri, GOOGLE_TOKEN_URI);
        assert!(decoded.scopes.is_empty());
    }

    #[test]
    fn token_exchange_fields_carry_refresh_inputs() {
        let fields = credentials().token_exchange_fields();
        assert_eq!(fields["refresh_token"], "1//refresh");
        assert_eq!(fields["client_id"], "client.apps");
        assert!(!fields.contains_key("access_token"));
    }

    struct StaticProvider(HashMap<UserId, GoogleCredentials>);

    #[async_trait]
    impl CredentialProvider for StaticProvider {
        async fn get_credentials(
            &self,
            user_id: UserId,
        ) -> Result<Option<GoogleCredentials>, Report<CredentialError>> {
            Ok(self.0.get(&user_id).cloned())
        }
    }

    #[tokio::test]
    async fn provider_returns_none_for_unknown_user() {
        let known = UserId::new();
        let provider: Box<dyn CredentialProvider> =
            Box::new(StaticProvider(HashMap::from([(known, credentials())])));

        assert!(provider.get_credentials(known).await.unwrap().is_some());
        assert!(provider.get_credentials(UserId::new()).await.unwrap().is_none());
    }
}
