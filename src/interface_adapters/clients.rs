use crate::domain::{AuthApi, AuthGrant, ClientError, LoginRequest, RegisterRequest, User};
use crate::interface_adapters::protocol::ErrorResponse;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

// Thin wrapper around reqwest for the portal's auth endpoints.
#[derive(Clone)]
pub struct HttpAuthApi {
    http: Client,
    base_url: Url,
}

impl HttpAuthApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|err| ClientError::Other(Box::new(err)))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ClientError::Status {
                status: status.as_u16(),
                message: None,
            };
        }
        // Timeouts and connect failures never produced a response.
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ClientError::NoResponse(Box::new(err))
        } else {
            ClientError::Other(Box::new(err))
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    #[tracing::instrument(name = "auth_client.login", skip_all)]
    async fn login(&self, req: LoginRequest) -> Result<AuthGrant, ClientError> {
        let url = self.endpoint("auth/login")?;
        let res = self.http.post(url).json(&req).send().await?;
        decode(res).await
    }

    #[tracing::instrument(name = "auth_client.register", skip_all)]
    async fn register(&self, req: RegisterRequest) -> Result<AuthGrant, ClientError> {
        let url = self.endpoint("auth/register")?;
        let res = self.http.post(url).json(&req).send().await?;
        decode(res).await
    }

    #[tracing::instrument(name = "auth_client.current_user", skip_all)]
    async fn current_user(&self, token: &str) -> Result<User, ClientError> {
        let url = self.endpoint("auth/me")?;
        let res = self.http.get(url).bearer_auth(token).send().await?;
        decode(res).await
    }
}

// Keep upstream status/message so the classifier can preserve 4xx semantics.
async fn decode<T>(res: Response) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let status = res.status();
    if !status.is_success() {
        let message = res
            .json::<ErrorResponse>()
            .await
            .ok()
            .map(|payload| payload.message);
        tracing::debug!(status = status.as_u16(), ?message, "auth request rejected");
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(res.json::<T>().await?)
}

// `Url::join` replaces the last segment unless the base ends with a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_base_url_has_api_prefix_then_endpoints_keep_it() {
        let base = Url::parse("http://127.0.0.1:3000/api").expect("expected valid url");
        let client =
            HttpAuthApi::new(base, Duration::from_millis(500)).expect("expected client to build");

        let url = client.endpoint("auth/login").expect("expected endpoint");

        assert_eq!(url.as_str(), "http://127.0.0.1:3000/api/auth/login");
    }

    #[test]
    fn when_base_url_already_ends_with_slash_then_it_is_unchanged() {
        let base = Url::parse("http://portal.test/api/").expect("expected valid url");

        assert_eq!(with_trailing_slash(base).as_str(), "http://portal.test/api/");
    }
}
