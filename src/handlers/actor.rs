//! Caller identity extractors.
//!
//! Authentication happens upstream; the authenticating proxy forwards the
//! caller's stable owner id in `x-owner-id` and this service trusts it.

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const OWNER_HEADER: &str = "x-owner-id";

/// An authenticated caller. Rejects the request when the header is absent.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

/// A caller that may be anonymous, for reads of public files.
#[derive(Debug, Clone, Copy)]
pub struct MaybeActor(pub Option<Uuid>);

impl<S> FromRequestParts<S> for MaybeActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(OWNER_HEADER) else {
            return Ok(MaybeActor(None));
        };
        value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(|id| MaybeActor(Some(id)))
            .ok_or_else(|| AppError::unauthorized("malformed x-owner-id header"))
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match MaybeActor::from_request_parts(parts, state).await? {
            MaybeActor(Some(id)) => Ok(Actor(id)),
            MaybeActor(None) => Err(AppError::unauthorized("missing x-owner-id header")),
        }
    }
}
