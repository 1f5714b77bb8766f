//! Axum extractors for validated requests
//!
//! These extractors run the route's [`RuleSet`] before the handler body is
//! reached. On any violation they short-circuit with a single 400 listing
//! every violated field.

use super::rules::{RuleSet, order_id_rules, update_status_rules};
use crate::core::error::{ApiError, FieldValidationError, ValidationError};
use crate::core::order::OrderStatus;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Request payloads that carry their own validation rules
pub trait ValidatedPayload: DeserializeOwned {
    fn rules() -> RuleSet;
}

/// Axum extractor that validates and filters a JSON body
///
/// # Usage
///
/// ```rust,ignore
/// pub async fn create_order(
///     ValidatedJson(draft): ValidatedJson<OrderDraft>,
/// ) -> ApiResult<Json<Value>> {
///     // draft is already trimmed and validated
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: ValidatedPayload,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let payload = json_body(req, state).await?;
        let filtered = T::rules()
            .validate_and_filter(payload)
            .map_err(ValidationError::FieldErrors)?;
        Ok(ValidatedJson(serde_json::from_value(filtered)?))
    }
}

/// Order id taken from the `{id}` path segment, checked for shape
#[derive(Debug, Clone)]
pub struct ValidatedId(pub String);

impl<S> FromRequestParts<S> for ValidatedId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = path_id(parts, state).await;
        validate_id(raw).map_err(|errors| ValidationError::FieldErrors(errors).into())
    }
}

/// Query string deserialized into `T`
///
/// A query axum cannot deserialize (a repeated key, say) is rejected as a
/// validation failure instead of axum's plain-text rejection.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(query)) => Ok(ValidatedQuery(query)),
            Err(rejection) => Err(ValidationError::InvalidQuery {
                message: rejection.body_text(),
            }
            .into()),
        }
    }
}

/// Path id plus `{status}` body of the status-update route
///
/// Both are validated before either is rejected, so a request with a bad id
/// and a bad status gets both reported.
#[derive(Debug, Clone)]
pub struct ValidatedStatusUpdate {
    pub id: String,
    pub status: OrderStatus,
}

impl<S> FromRequest<S> for ValidatedStatusUpdate
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let raw_id = path_id(&mut parts, state).await;
        let payload = json_body(Request::from_parts(parts, body), state).await?;

        let id = validate_id(raw_id);
        let status = update_status_rules().validate_and_filter(payload);

        match (id, status) {
            (Ok(ValidatedId(id)), Ok(body)) => {
                let status = body["status"]
                    .as_str()
                    .and_then(|s| s.parse::<OrderStatus>().ok())
                    .ok_or_else(|| ValidationError::InvalidStatus(body["status"].to_string()))?;
                Ok(Self { id, status })
            }
            (id, status) => {
                let errors: Vec<FieldValidationError> = id
                    .err()
                    .into_iter()
                    .chain(status.err())
                    .flatten()
                    .collect();
                Err(ValidationError::FieldErrors(errors).into())
            }
        }
    }
}

async fn json_body<S: Send + Sync>(req: Request, state: &S) -> Result<Value, ApiError> {
    match Json::<Value>::from_request(req, state).await {
        Ok(Json(payload)) => Ok(payload),
        Err(rejection) => Err(ValidationError::InvalidJson {
            message: rejection.body_text(),
        }
        .into()),
    }
}

async fn path_id<S: Send + Sync>(parts: &mut Parts, state: &S) -> Value {
    match Path::<String>::from_request_parts(parts, state).await {
        Ok(Path(id)) => Value::String(id),
        Err(_) => Value::Null,
    }
}

fn validate_id(raw: Value) -> Result<ValidatedId, Vec<FieldValidationError>> {
    let filtered = order_id_rules().validate_and_filter(json!({ "id": raw }))?;
    Ok(ValidatedId(
        filtered["id"].as_str().unwrap_or_default().to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::order::OrderDraft;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/orders")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_validated_json_trims_fields() {
        let req = json_request(r#"{"pizza":" Margherita ","size":"mediana","contactInfo":"5551234"}"#);
        let ValidatedJson(draft) = ValidatedJson::<OrderDraft>::from_request(req, &())
            .await
            .expect("payload should be valid");
        assert_eq!(draft.pizza, "Margherita");
    }

    #[tokio::test]
    async fn test_validated_json_rejects_short_pizza() {
        let req = json_request(r#"{"pizza":"Hi","size":"mediana","contactInfo":"5551234"}"#);
        let err = ValidatedJson::<OrderDraft>::from_request(req, &())
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(ValidationError::FieldErrors(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "pizza");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validated_json_rejects_malformed_body() {
        let req = json_request("{not json");
        let err = ValidatedJson::<OrderDraft>::from_request(req, &())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidJson { .. })
        ));
    }

    #[derive(Debug, serde::Deserialize)]
    struct StatusQuery {
        status: Option<String>,
    }

    async fn query(uri: &str) -> Result<ValidatedQuery<StatusQuery>, ApiError> {
        let (mut parts, _) = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
            .into_parts();
        ValidatedQuery::<StatusQuery>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_validated_query_reads_status() {
        let ValidatedQuery(q) = query("/api/orders?status=listo").await.unwrap();
        assert_eq!(q.status.as_deref(), Some("listo"));
    }

    #[tokio::test]
    async fn test_validated_query_rejects_repeated_key() {
        let err = query("/api/orders?status=listo&status=pendiente")
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(ref e @ ValidationError::InvalidQuery { .. }) => {
                assert_eq!(e.field_errors()[0].field, "query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_id_shapes() {
        assert!(validate_id(json!("65f1c0ffee0000000000abcd")).is_ok());
        assert!(validate_id(json!("short")).is_err());
        assert_eq!(validate_id(Value::Null).unwrap_err()[0].message, "id is required");
    }
}
