// src/api/http.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{config::Config, error::ApiError, models::UserProfile};

#[derive(Debug, Clone)]
pub struct Tokens {
    pub access: String,
    pub refresh: Option<String>,
}

/// Backend list endpoints answer either a bare array or a paginated
/// `{"results": [...]}` envelope; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Paginated { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Paginated { results } => results,
            Listing::Plain(items) => items,
        }
    }
}

/// Typed client for the HMS backend. Attaches the bearer access token to
/// every request; a 401 triggers one refresh-token exchange and a single
/// retry of the original request.
#[derive(Clone)]
pub struct HmsApi {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<RwLock<Option<Tokens>>>,
}

impl HmsApi {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        let tokens = cfg.access_token.clone().map(|access| Tokens {
            access,
            refresh: cfg.refresh_token.clone(),
        });

        Ok(Self {
            client,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            tokens: Arc::new(RwLock::new(tokens)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_tokens(&self, access: String, refresh: Option<String>) {
        *self.tokens.write().await = Some(Tokens { access, refresh });
    }

    pub async fn clear_tokens(&self) {
        *self.tokens.write().await = None;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access.clone())
    }

    /* ============================================================
       Auth
       ============================================================ */

    /// POST /auth/ — exchanges credentials for an access/refresh pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        #[derive(Deserialize)]
        struct LoginTokens {
            access: String,
            refresh: String,
        }

        let resp = self
            .client
            .post(format!("{}/auth/", self.base_url))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let resp = match classify_response(resp).await {
            Ok(resp) => resp,
            Err(ApiError::AuthExpired) => return Err(ApiError::invalid_credentials()),
            Err(err) => return Err(err),
        };

        let tokens: LoginTokens = resp.json().await?;
        self.set_tokens(tokens.access, Some(tokens.refresh)).await;
        Ok(())
    }

    pub async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/profile/").await
    }

    // Exchange the refresh token for a new access token. Failure clears the
    // pair so callers fall back to an explicit re-login.
    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        #[derive(Deserialize)]
        struct Refreshed {
            access: String,
        }

        let refresh = {
            let guard = self.tokens.read().await;
            guard.as_ref().and_then(|t| t.refresh.clone())
        };
        let Some(refresh) = refresh else {
            self.clear_tokens().await;
            return Err(ApiError::AuthExpired);
        };

        let resp = self
            .client
            .post(format!("{}/auth/refresh/", self.base_url))
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await?;

        if !resp.status().is_success() {
            self.clear_tokens().await;
            return Err(ApiError::AuthExpired);
        }

        let refreshed: Refreshed = resp.json().await?;
        let mut guard = self.tokens.write().await;
        if let Some(tokens) = guard.as_mut() {
            tokens.access = refreshed.access;
        }
        Ok(())
    }

    /* ============================================================
       Request plumbing
       ============================================================ */

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Response, reqwest::Error> {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        if let Some(tokens) = self.tokens.read().await.as_ref() {
            req = req.bearer_auth(&tokens.access);
        }
        req.send().await
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Response, ApiError> {
        let resp = self
            .send_once(method.clone(), path, query, body, timeout)
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            self.refresh_access_token().await?;
            let retry = self.send_once(method, path, query, body, timeout).await?;
            return classify_response(retry).await;
        }

        classify_response(resp).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(Method::GET, path, None, None, None).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self.send(Method::GET, path, Some(query), None, None).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn get_json_timeout<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let resp = self
            .send(Method::GET, path, None, None, Some(timeout))
            .await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        let resp = self.send(Method::POST, path, None, Some(body), None).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn patch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        let resp = self
            .send(Method::PATCH, path, None, Some(body), None)
            .await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None, None, None).await?;
        Ok(())
    }
}

/* ============================================================
   Error classification
   ============================================================ */

async fn classify_response(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let path = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(classify_error(status, &path, &body))
}

fn classify_error(status: StatusCode, path: &str, body: &str) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::not_found(path);
    }
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::AuthExpired;
    }
    if status == StatusCode::BAD_REQUEST {
        return match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => ApiError::Validation(flatten_field_errors(map)),
            _ => ApiError::general_validation(if body.is_empty() {
                "bad request".to_string()
            } else {
                body.to_string()
            }),
        };
    }
    envelope_error(status, body)
}

// `{"error": {"code", "message"}}` or DRF's `{"detail": "..."}`, else the
// canonical status reason.
fn envelope_error(status: StatusCode, body: &str) -> ApiError {
    #[derive(Deserialize)]
    struct ErrorObject {
        code: String,
        message: String,
    }
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: ErrorObject,
    }
    #[derive(Deserialize)]
    struct Detail {
        detail: String,
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorResponse>(body) {
        return ApiError::api(envelope.error.code, envelope.error.message);
    }
    if let Ok(detail) = serde_json::from_str::<Detail>(body) {
        return ApiError::api(status.as_u16().to_string(), detail.detail);
    }
    ApiError::api(
        status.as_u16().to_string(),
        status.canonical_reason().unwrap_or("request failed"),
    )
}

// DRF field errors arrive as {"field": ["msg", ...]} or {"field": "msg"}.
fn flatten_field_errors(map: serde_json::Map<String, Value>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(field, value)| {
            let message = match value {
                Value::String(s) => s,
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                other => other.to_string(),
            };
            (field, message)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::testutil::{spawn_backend, test_config};

    fn bearer(headers: &HeaderMap) -> Option<&str> {
        headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let plain: Listing<i64> = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(plain.into_vec(), vec![1, 2, 3]);

        let paginated: Listing<i64> =
            serde_json::from_str(r#"{"count": 3, "next": null, "results": [1, 2, 3]}"#).unwrap();
        assert_eq!(paginated.into_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_classify_field_error_map() {
        let err = classify_error(
            StatusCode::BAD_REQUEST,
            "/api/appointments/",
            r#"{"patient": ["This field is required."], "time": "Invalid time."}"#,
        );
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["patient"], "This field is required.");
        assert_eq!(fields["time"], "Invalid time.");
    }

    #[test]
    fn test_classify_error_envelopes() {
        let coded = classify_error(
            StatusCode::FORBIDDEN,
            "/api/appointments/",
            r#"{"error": {"code": "FORBIDDEN", "message": "nope"}}"#,
        );
        assert!(matches!(coded, ApiError::Api { ref code, .. } if code == "FORBIDDEN"));

        let detail = classify_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "/api/appointments/",
            r#"{"detail": "boom"}"#,
        );
        assert!(matches!(detail, ApiError::Api { ref message, .. } if message == "boom"));
    }

    #[tokio::test]
    async fn test_refresh_then_retry_on_401() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let refreshes_handler = refreshes.clone();

        let router = Router::new()
            .route(
                "/api/ping",
                get(|headers: HeaderMap| async move {
                    if bearer(&headers) == Some("fresh-access") {
                        Ok(Json(serde_json::json!({"ok": true})))
                    } else {
                        Err(StatusCode::UNAUTHORIZED)
                    }
                }),
            )
            .route(
                "/api/auth/refresh/",
                post(move |Json(body): Json<Value>| {
                    let refreshes = refreshes_handler.clone();
                    async move {
                        refreshes.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(body["refresh"], "test-refresh");
                        Json(serde_json::json!({"access": "fresh-access"}))
                    }
                }),
            );

        let base = spawn_backend(router).await;
        let api = HmsApi::new(&test_config(&base)).unwrap();

        let pong: Value = api.get_json("/ping").await.unwrap();
        assert_eq!(pong["ok"], true);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(api.access_token().await.as_deref(), Some("fresh-access"));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_tokens() {
        let router = Router::new()
            .route("/api/ping", get(|| async { StatusCode::UNAUTHORIZED }))
            .route("/api/auth/refresh/", post(|| async { StatusCode::UNAUTHORIZED }));

        let base = spawn_backend(router).await;
        let api = HmsApi::new(&test_config(&base)).unwrap();

        let err = api.get_json::<Value>("/ping").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthExpired));
        assert_eq!(api.access_token().await, None);
    }

    #[tokio::test]
    async fn test_login_stores_tokens_and_maps_bad_credentials() {
        let router = Router::new().route(
            "/api/auth/",
            post(|Json(body): Json<Value>| async move {
                if body["password"] == "secret" {
                    Ok(Json(serde_json::json!({"access": "a1", "refresh": "r1"})))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        );

        let base = spawn_backend(router).await;
        let mut cfg = test_config(&base);
        cfg.access_token = None;
        cfg.refresh_token = None;
        let api = HmsApi::new(&cfg).unwrap();

        let err = api.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::Api { ref code, .. } if code == "INVALID_CREDENTIALS"));
        assert_eq!(api.access_token().await, None);

        api.login("alice", "secret").await.unwrap();
        assert_eq!(api.access_token().await.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_404_classifies_as_not_found() {
        let base = spawn_backend(Router::new()).await;
        let api = HmsApi::new(&test_config(&base)).unwrap();

        let err = api.get_json::<Value>("/google-calendar/connection/").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
