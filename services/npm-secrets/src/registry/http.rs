//! reqwest-backed client for the npm registry token API.

use super::{
    CreatedToken, RegistryClient, RegistryConnector, RegistryError, RegistryResult, TokenSettings,
    TokenSummary,
};
use crate::connection::ConnectionConfig;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use rust_common::{build_http_client, HttpConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

const TOKENS_PATH: &[&str] = &["-", "npm", "v1", "tokens"];
const WHOAMI_PATH: &[&str] = &["-", "whoami"];

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    username: String,
}

#[derive(Debug, Deserialize)]
struct TokenListResponse {
    #[serde(default)]
    objects: Vec<TokenSummary>,
}

#[derive(Deserialize)]
struct CreateTokenResponse {
    token: String,
    key: String,
    #[serde(default)]
    readonly: bool,
    #[serde(default)]
    cidr_whitelist: Option<Vec<String>>,
}

/// Client authenticated with the connection's administrator credentials.
pub struct HttpRegistryClient {
    http: Client,
    base: Url,
    username: String,
    password: SecretString,
}

impl std::fmt::Debug for HttpRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistryClient")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HttpRegistryClient {
    /// Create a client for `connection` on top of a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConnection`] if the connection URI is
    /// not an absolute http(s) URL.
    pub fn new(http: Client, connection: &ConnectionConfig) -> RegistryResult<Self> {
        let base = Url::parse(&connection.connection_uri).map_err(|e| {
            RegistryError::InvalidConnection(format!(
                "connection_uri '{}' is not a valid URL: {e}",
                connection.connection_uri
            ))
        })?;

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(RegistryError::InvalidConnection(format!(
                "connection_uri '{}' must be an http or https URL",
                connection.connection_uri
            )));
        }

        Ok(Self {
            http,
            base,
            username: connection.username.clone(),
            password: SecretString::from(connection.password.expose_secret().to_owned()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> RegistryResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                RegistryError::InvalidConnection(format!("{} cannot be a base URL", self.base))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder, target: &str) -> RegistryResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::unreachable(e.to_string()))?;

        let status = response.status();
        debug!(target, status = status.as_u16(), "registry responded");

        match status.as_u16() {
            401 | 403 => Err(RegistryError::AuthFailed(format!(
                "status {status} from {target}"
            ))),
            404 => Err(RegistryError::NotFound(target.to_string())),
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(RegistryError::Rejected {
                    status: status.as_u16(),
                    body,
                })
            }
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    #[instrument(skip(self), fields(registry = %self.base))]
    async fn whoami(&self) -> RegistryResult<String> {
        let url = self.endpoint(WHOAMI_PATH)?;
        let response = self.send(self.request(Method::GET, url), "whoami").await?;
        let body: WhoamiResponse = response.json().await?;
        Ok(body.username)
    }

    #[instrument(skip(self), fields(registry = %self.base))]
    async fn list_tokens(&self) -> RegistryResult<Vec<TokenSummary>> {
        let url = self.endpoint(TOKENS_PATH)?;
        let response = self.send(self.request(Method::GET, url), "tokens").await?;
        let body: TokenListResponse = response.json().await?;
        Ok(body.objects)
    }

    #[instrument(skip(self, settings), fields(registry = %self.base, readonly = settings.readonly))]
    async fn create_token(&self, settings: &TokenSettings<'_>) -> RegistryResult<CreatedToken> {
        let url = self.endpoint(TOKENS_PATH)?;
        let body = serde_json::json!({
            "password": settings.password.expose_secret(),
            "readonly": settings.readonly,
            "cidr_whitelist": settings.cidr_whitelist,
        });

        let response = self
            .send(self.request(Method::POST, url).json(&body), "tokens")
            .await?;
        let created: CreateTokenResponse = response.json().await?;

        if created.key.is_empty() {
            return Err(RegistryError::Decode(
                "token response carries an empty key".to_string(),
            ));
        }

        Ok(CreatedToken {
            token: SecretString::from(created.token),
            id: created.key,
            readonly: created.readonly,
            cidr_whitelist: created.cidr_whitelist.unwrap_or_default(),
        })
    }

    #[instrument(skip(self), fields(registry = %self.base))]
    async fn delete_token(&self, id: &str) -> RegistryResult<()> {
        let mut segments: Vec<&str> = TOKENS_PATH.to_vec();
        segments.extend(["token", id]);
        let url = self.endpoint(&segments)?;
        self.send(self.request(Method::DELETE, url), &format!("token {id}"))
            .await?;
        Ok(())
    }
}

/// Production connector: one pooled HTTP client shared by every
/// connection generation.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: Client,
}

impl HttpConnector {
    /// Create a connector from HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_http_client(config)?,
        })
    }
}

impl RegistryConnector for HttpConnector {
    fn connect(&self, connection: &ConnectionConfig) -> RegistryResult<Arc<dyn RegistryClient>> {
        let client = HttpRegistryClient::new(self.http.clone(), connection)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(uri: &str) -> RegistryResult<HttpRegistryClient> {
        let connection = ConnectionConfig::new(uri, "admin", "secret");
        HttpRegistryClient::new(Client::new(), &connection)
    }

    #[test]
    fn test_rejects_invalid_uri() {
        assert!(matches!(
            client_for("not a url"),
            Err(RegistryError::InvalidConnection(_))
        ));
        assert!(matches!(
            client_for("ftp://registry.example.com"),
            Err(RegistryError::InvalidConnection(_))
        ));
        assert!(matches!(
            client_for("mailto:admin@example.com"),
            Err(RegistryError::InvalidConnection(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client_for("https://registry.example.com/npm/").unwrap();
        let url = client.endpoint(TOKENS_PATH).unwrap();
        assert_eq!(url.as_str(), "https://registry.example.com/npm/-/npm/v1/tokens");

        let client = client_for("http://localhost:4873").unwrap();
        let url = client.endpoint(&["-", "npm", "v1", "tokens", "token", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4873/-/npm/v1/tokens/token/a%2Fb");
    }

    #[test]
    fn test_debug_hides_password() {
        let client = client_for("http://localhost:4873").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn test_connector_builds_client() {
        let connector = HttpConnector::new(&HttpConfig::default()).unwrap();
        let connection = ConnectionConfig::new("http://localhost:4873", "admin", "secret");
        assert!(connector.connect(&connection).is_ok());
    }
}
