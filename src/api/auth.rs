// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::error::SocialError;

/// Header carrying the caller id, set by the upstream identity provider
pub const ACTOR_HEADER: &str = "x-user-id";

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = SocialError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or(SocialError::Unauthenticated)?;

        let id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                debug!("Rejecting malformed {} header", ACTOR_HEADER);
                SocialError::Unauthenticated
            })?;

        Ok(Actor(id))
    }
}
