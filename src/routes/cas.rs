//! Login redirect, ticket callback and failure page handlers.

use std::collections::BTreeMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use http::{HeaderMap, Method, StatusCode, Uri, header};
use serde::{Deserialize, Serialize};

use super::{AppState, RouteError};
use crate::cas::{
    CallbackOutcome, CallbackRequest, FailureCode, ProtocolResponse, identity::PROVIDER,
};

/// Query parameters for the login redirect.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Where to send the user after sign-in
    #[serde(default)]
    pub url: Option<String>,
}

/// Query parameters of the failure page.
#[derive(Debug, Deserialize)]
pub struct FailureQuery {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub error: &'static str,
}

/// Redirect the user to the CAS login page.
///
/// The return URL comes from the `url` query parameter, else the `Referer`.
#[tracing::instrument(name = "cas.request_phase", skip_all)]
pub async fn request_phase(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Result<Response, RouteError> {
    let return_url = query.url.filter(|url| !url.is_empty()).or_else(|| {
        headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let response = state
        .strategy
        .request_phase(&state.server.callback_url(), return_url.as_deref())?;
    Ok(protocol_response(response))
}

/// Ticket validation and Single Sign-Out endpoint.
#[tracing::instrument(name = "cas.callback", skip_all, fields(method = %method))]
pub async fn callback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RouteError> {
    let mut params: BTreeMap<String, String> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    if is_form(&headers) {
        params.extend(url::form_urlencoded::parse(&body).into_owned());
    }

    let request = CallbackRequest::new(method, params);
    let outcome = state
        .strategy
        .callback_phase(request, &state.server.callback_url())
        .await?;

    Ok(match outcome {
        CallbackOutcome::Authenticated(identity) => Json(identity).into_response(),
        CallbackOutcome::LogoutHandled(response) => protocol_response(response),
        CallbackOutcome::Failed(failure) => {
            failure_redirect(&state.server.failure_path, failure.code())
        }
    })
}

/// Landing page for failed sign-ins. Only known failure codes are echoed.
#[tracing::instrument(name = "cas.failure", skip_all)]
pub async fn failure(Query(query): Query<FailureQuery>) -> impl IntoResponse {
    let error = query
        .message
        .as_deref()
        .and_then(FailureCode::parse)
        .map_or("authentication_failed", |code| code.as_str());
    (StatusCode::UNAUTHORIZED, Json(FailureBody { error }))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|media| {
            media
                .trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

fn protocol_response(response: ProtocolResponse) -> Response {
    (response.status, response.headers, response.body).into_response()
}

fn failure_redirect(failure_path: &str, code: FailureCode) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("message", code.as_str())
        .append_pair("strategy", PROVIDER)
        .finish();
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("{failure_path}?{query}"))],
    )
        .into_response()
}
