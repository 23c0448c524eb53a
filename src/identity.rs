//! Request identity: who is asking, and which access group they fall into.
//!
//! Identity is taken from the `vanna_email` cookie as-is. The cookie is not
//! signed or otherwise verified, so a client can claim any identity,
//! including the admin one. Put an authenticating proxy in front of the
//! server before exposing it beyond a trusted network.

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

pub const EMAIL_COOKIE: &str = "vanna_email";
pub const GUEST_EMAIL: &str = "guest@example.com";
pub const ADMIN_EMAIL: &str = "admin@example.com";

pub const ADMIN_GROUP: &str = "admin";
pub const USER_GROUP: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub group_memberships: Vec<String>,
}

impl User {
    pub fn is_member_of(&self, group: &str) -> bool {
        self.group_memberships.iter().any(|g| g == group)
    }

    /// True when the user belongs to at least one of `groups`.
    /// An empty list places no restriction.
    pub fn in_any_group<S: AsRef<str>>(&self, groups: &[S]) -> bool {
        groups.is_empty() || groups.iter().any(|g| self.is_member_of(g.as_ref()))
    }

    pub fn is_admin(&self) -> bool {
        self.is_member_of(ADMIN_GROUP)
    }
}

/// Read-only view of the inbound request, valid for one request only.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cookies: HashMap<String, String>,
    headers: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn from_parts(parts: &Parts) -> Self {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookies = jar
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            cookies,
            headers,
            remote_addr,
        }
    }

    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Header lookup; names are case-insensitive.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Maps a request to the user it acts on behalf of.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve_user(&self, ctx: &RequestContext) -> User;
}

pub type SharedResolver = Arc<dyn UserResolver>;

/// Resolves the user from the `vanna_email` cookie, falling back to the guest identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieUserResolver;

impl CookieUserResolver {
    /// The resolution policy itself; pure and infallible.
    pub fn user_for_email(email: &str) -> User {
        let group = if email == ADMIN_EMAIL {
            ADMIN_GROUP
        } else {
            USER_GROUP
        };
        User {
            id: email.to_string(),
            email: email.to_string(),
            group_memberships: vec![group.to_string()],
        }
    }
}

#[async_trait]
impl UserResolver for CookieUserResolver {
    async fn resolve_user(&self, ctx: &RequestContext) -> User {
        // An empty cookie counts as no cookie.
        let email = ctx
            .get_cookie(EMAIL_COOKIE)
            .filter(|v| !v.is_empty())
            .unwrap_or(GUEST_EMAIL);
        let user = Self::user_for_email(email);
        if user.is_admin() {
            warn!(
                remote = ?ctx.remote_addr(),
                "admin identity granted from unverified `{}` cookie",
                EMAIL_COOKIE
            );
        } else {
            debug!(
                user = %user.id,
                user_agent = ctx.get_header("user-agent").unwrap_or("-"),
                "resolved request identity"
            );
        }
        user
    }
}
