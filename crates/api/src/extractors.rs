//! Request extractors.

use analytics_core::SemesterFilter;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::response::ApiError;

#[derive(Debug, Default, Deserialize)]
struct RawSemesterQuery {
    #[serde(default)]
    semester_id: Option<String>,
}

/// `?semester_id=` as a [`SemesterFilter`]. Missing or empty means all
/// semesters; anything that is not a UUID is rejected with `400`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemesterParam(pub SemesterFilter);

#[async_trait]
impl<S> FromRequestParts<S> for SemesterParam
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawSemesterQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        let filter = SemesterFilter::parse(raw.semester_id.as_deref().unwrap_or_default())?;
        Ok(SemesterParam(filter))
    }
}
