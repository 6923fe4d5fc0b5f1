// File: src/client/core.rs
use crate::client::middleware::{UserAgentLayer, UserAgentService};
use crate::client::redirect::{FollowRedirectLayer, FollowRedirectService};
use crate::error::FetchError;

use http::{Method, Request, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tower::{ServiceBuilder, ServiceExt};

type BaseClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, String>;

pub type HttpsClient = UserAgentService<FollowRedirectService<BaseClient>>;

/// Plain HTTP(S) client for public calendar feeds and automation webhooks.
#[derive(Clone)]
pub struct FeedClient {
    http: HttpsClient,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient").finish_non_exhaustive()
    }
}

impl FeedClient {
    pub fn new(user_agent: &str, max_redirects: usize) -> Result<Self, String> {
        let mut root_store = rustls::RootCertStore::empty();
        let result = rustls_native_certs::load_native_certs();
        root_store.add_parsable_certificates(result.certs);
        if root_store.is_empty() {
            // Plain http feeds still work; https fetches will fail per source.
            log::warn!("No valid system certificates found; https feeds will fail.");
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let base: BaseClient = Client::builder(TokioExecutor::new()).build(https_connector);
        let http = ServiceBuilder::new()
            .layer(UserAgentLayer::new(user_agent.to_string()))
            .layer(FollowRedirectLayer::new(max_redirects))
            .service(base);

        Ok(Self { http })
    }

    async fn send(&self, req: Request<String>) -> Result<(http::StatusCode, String), FetchError> {
        let response = self
            .http
            .clone()
            .oneshot(req)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Transport(format!("reading body: {}", e)))?
            .to_bytes();

        Ok((status, String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn parse_uri(url: &str) -> Result<Uri, FetchError> {
        let uri: Uri = url
            .trim()
            .parse()
            .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        Ok(uri)
    }

    /// GET a feed and return its body as text. Non-2xx answers are errors.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let uri = Self::parse_uri(url)?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(http::header::ACCEPT, "text/calendar, */*;q=0.5")
            .body(String::new())
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let (status, body) = self.send(req).await?;
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(body)
    }

    /// POST a JSON document; used by the webhook automation.
    pub async fn post_json(&self, url: &str, json: String) -> Result<(), FetchError> {
        let uri = Self::parse_uri(url)?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(json)
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let (status, _) = self.send(req).await?;
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_urls() {
        assert!(matches!(
            FeedClient::parse_uri("/ical/1.ics"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            FeedClient::parse_uri("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(FeedClient::parse_uri("https://feeds.example/1.ics").is_ok());
    }
}
