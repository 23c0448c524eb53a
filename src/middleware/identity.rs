use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::identity::{RequestContext, SharedResolver, User};

/// Extractor yielding the [`User`] the configured resolver derives for this request.
/// Never rejects: the resolver always produces an identity.
#[derive(Debug, Clone)]
pub struct ResolvedUser(pub User);

impl<S> FromRequestParts<S> for ResolvedUser
where
    S: Send + Sync,
    SharedResolver: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = SharedResolver::from_ref(state);
        let ctx = RequestContext::from_parts(parts);
        Ok(Self(resolver.resolve_user(&ctx).await))
    }
}
