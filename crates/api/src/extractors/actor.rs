//! Acting user header extractor.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts},
};
use std::convert::Infallible;

/// Header carrying the user on whose behalf a change is made.
pub const UPDATED_BY_HEADER: &str = "x-updated-by";

/// The acting user, when the caller supplied one.
///
/// Blank or non-UTF-8 header values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor(pub Option<String>);

impl Actor {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(HeaderName::from_static(UPDATED_BY_HEADER))
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Actor(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Actor {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_actor_present() {
        let request = Request::builder()
            .header("X-Updated-By", "alice")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_actor_missing() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, Actor(None));
    }

    #[tokio::test]
    async fn test_actor_blank_is_absent() {
        let request = Request::builder()
            .header("X-Updated-By", "   ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, Actor(None));
    }
}
