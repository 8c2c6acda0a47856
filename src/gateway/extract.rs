//! Request body extractor for the non-upload routes.

use super::error::ApiError;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap};
use axum::{Form, Json};
use serde::de::DeserializeOwned;

/// A body decoded from `application/x-www-form-urlencoded` when the request
/// says so, and from JSON otherwise.
#[derive(Debug)]
pub struct JsonOrForm<T>(pub T);

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_urlencoded(req.headers()) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| invalid_request(&e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| invalid_request(&e.body_text()))?;
            Ok(Self(value))
        }
    }
}

fn invalid_request(detail: &str) -> ApiError {
    ApiError::bad_request(format!("Invalid request: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        name: String,
        sms_notifications: Option<bool>,
    }

    fn request(content_type: &str, body: &'static str) -> Request {
        http::Request::builder()
            .method(http::Method::POST)
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn decodes_json_body() {
        let JsonOrForm(sample) = JsonOrForm::<Sample>::from_request(
            request("application/json", r#"{"name":"ada","smsNotifications":false}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(sample.name, "ada");
        assert_eq!(sample.sms_notifications, Some(false));
    }

    #[tokio::test]
    async fn decodes_urlencoded_body_with_typed_fields() {
        let JsonOrForm(sample) = JsonOrForm::<Sample>::from_request(
            request(
                "application/x-www-form-urlencoded",
                "name=ada%20l&smsNotifications=false",
            ),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(sample.name, "ada l");
        assert_eq!(sample.sms_notifications, Some(false));
    }

    #[tokio::test]
    async fn unsupported_content_type_is_bad_request() {
        let err = JsonOrForm::<Sample>::from_request(request("text/plain", "name=ada"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid request"));
    }
}
