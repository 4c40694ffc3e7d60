use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::error::FolioError;

/// Header that scopes every request to one owner's data.
pub const OWNER_HEADER: &str = "x-owner-id";

const MAX_OWNER_LEN: usize = 128;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(FolioError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for FolioError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> FolioError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                FolioError::Validation(format!("Missing required field: {field}"))
            } else {
                FolioError::Validation(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            FolioError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            FolioError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(_) => {
            FolioError::Validation("Failed to read request body".to_string())
        }
        _ => FolioError::Validation(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}

/// Owner the request acts for, taken from the `X-Owner-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = FolioError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| FolioError::Validation("Missing X-Owner-Id header".to_string()))?;
        let owner = raw
            .to_str()
            .map_err(|_| FolioError::Validation("X-Owner-Id must be visible ASCII".to_string()))?
            .trim();

        if owner.is_empty() || owner.len() > MAX_OWNER_LEN {
            return Err(FolioError::Validation(format!(
                "X-Owner-Id must be between 1 and {MAX_OWNER_LEN} characters"
            )));
        }
        Ok(Self(owner.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn owner_from(header: Option<&str>) -> Result<OwnerId, FolioError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        OwnerId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_and_trims_owner() {
        assert_eq!(owner_from(Some(" reader-1 ")).await.unwrap().0, "reader-1");
    }

    #[tokio::test]
    async fn missing_or_blank_owner_is_rejected() {
        assert!(matches!(owner_from(None).await, Err(FolioError::Validation(_))));
        assert!(matches!(owner_from(Some("  ")).await, Err(FolioError::Validation(_))));
    }

    #[test]
    fn missing_field_is_named() {
        assert_eq!(
            extract_missing_field("Failed to deserialize: missing field `turns` at line 1"),
            Some("turns")
        );
        assert_eq!(extract_missing_field("something else"), None);
    }
}
