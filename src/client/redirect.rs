// File: ./src/client/redirect.rs
//! Follows 3xx responses. Feed URLs handed out by booking platforms are
//! frequently short links or moved between hosts.
use http::{Request, Response, Uri};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

#[derive(Clone, Debug)]
pub struct FollowRedirectLayer {
    max_redirects: usize,
}

impl FollowRedirectLayer {
    pub fn new(max_redirects: usize) -> Self {
        Self { max_redirects }
    }
}

impl<S> Layer<S> for FollowRedirectLayer {
    type Service = FollowRedirectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FollowRedirectService {
            inner,
            max_redirects: self.max_redirects,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FollowRedirectService<S> {
    inner: S,
    max_redirects: usize,
}

/// Resolve a `Location` header against the URI that produced it.
/// Relative locations inherit scheme and authority.
pub(crate) fn resolve_location(base: &Uri, location: &str) -> Option<Uri> {
    let parsed = location.parse::<Uri>().ok()?;
    let parts = parsed.into_parts();
    let mut builder = Uri::builder();

    if let Some(scheme) = parts.scheme {
        builder = builder.scheme(scheme);
    } else if let Some(s) = base.scheme() {
        builder = builder.scheme(s.clone());
    }

    if let Some(authority) = parts.authority {
        builder = builder.authority(authority);
    } else if let Some(a) = base.authority() {
        builder = builder.authority(a.clone());
    }

    if let Some(pq) = parts.path_and_query {
        builder = builder.path_and_query(pq);
    } else {
        builder = builder.path_and_query("/");
    }

    builder.build().ok()
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for FollowRedirectService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ReqBody: Clone + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        let max_redirects = self.max_redirects;

        Box::pin(async move {
            let mut current_req = req;
            let mut attempts = 0;

            loop {
                // The body must be re-sent on every hop.
                let req_clone = current_req.clone();
                let response = inner.call(current_req).await?;

                if attempts >= max_redirects || !response.status().is_redirection() {
                    return Ok(response);
                }

                let next_uri = response
                    .headers()
                    .get(http::header::LOCATION)
                    .and_then(|loc| loc.to_str().ok())
                    .and_then(|loc| resolve_location(req_clone.uri(), loc));

                match next_uri {
                    Some(uri) => {
                        log::debug!("Following redirect {} -> {}", req_clone.uri(), uri);
                        current_req = req_clone;
                        *current_req.uri_mut() = uri;
                        attempts += 1;
                    }
                    None => return Ok(response),
                }
            }
        })
    }
}
