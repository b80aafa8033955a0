//! CAS Single Sign-Out.
//!
//! When a user logs out of CAS, the server POSTs a SAML 2.0 `LogoutRequest`
//! to every service the user signed in to, in a form parameter named
//! `logoutRequest`. The `NameID` and `SessionIndex` (the original service
//! ticket) are copied into the request parameters as `name_id` and
//! `session_index` and the host's [`SingleSignOutHandler`] is called.

use async_trait::async_trait;
use roxmltree::{Document, Node};

use super::{
    error::{BoxError, LogoutFailure},
    request::{CallbackRequest, ProtocolResponse},
    response::text_of,
};
use crate::config::CasConfig;

pub const LOGOUT_REQUEST_PARAM: &str = "logoutRequest";
pub const NAME_ID_PARAM: &str = "name_id";
pub const SESSION_INDEX_PARAM: &str = "session_index";
/// Larger payloads are rejected without being parsed.
pub const MAX_LOGOUT_REQUEST_BYTES: usize = 512 * 1024;

const SAML_ASSERTION_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
const SAML_PROTOCOL_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// Fields of a SAML `LogoutRequest` the client uses.
///
/// Absent elements yield empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutRequest {
    pub name_id: String,
    pub session_index: String,
}

impl LogoutRequest {
    pub fn parse(xml: &str) -> Result<Self, LogoutFailure> {
        if xml.len() > MAX_LOGOUT_REQUEST_BYTES {
            return Err(LogoutFailure::TooLarge(xml.len()));
        }
        let doc = Document::parse(xml).map_err(|e| LogoutFailure::Malformed(e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != "LogoutRequest" {
            return Err(LogoutFailure::Malformed(format!(
                "expected LogoutRequest, found {}",
                root.tag_name().name()
            )));
        }

        let assertion_ns = root
            .lookup_namespace_uri(Some("saml"))
            .unwrap_or(SAML_ASSERTION_NS);
        let protocol_ns = root
            .lookup_namespace_uri(Some("samlp"))
            .unwrap_or(SAML_PROTOCOL_NS);

        Ok(Self {
            name_id: element_text(root, assertion_ns, "NameID"),
            session_index: element_text(root, protocol_ns, "SessionIndex"),
        })
    }
}

fn element_text(root: Node, namespace: &str, name: &str) -> String {
    root.descendants()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == name
                && n.tag_name().namespace() == Some(namespace)
        })
        .map(text_of)
        .collect()
}

/// What a [`SingleSignOutHandler`] asks the client to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutCallbackResult {
    /// `200 OK`.
    Ok,
    /// Sent back verbatim.
    Response(ProtocolResponse),
}

/// Host hook invoked for every Single Sign-Out notification.
///
/// `request` already carries the `name_id` and `session_index` parameters.
/// Returning `Ok(None)` is the same as [`LogoutCallbackResult::Ok`]; an error
/// becomes a `logout_request` failure.
#[async_trait]
pub trait SingleSignOutHandler: Send + Sync {
    async fn on_single_sign_out(
        &self,
        request: &CallbackRequest,
        options: &CasConfig,
    ) -> Result<Option<LogoutCallbackResult>, BoxError>;
}

/// Parse the logout payload of `request`, inject its fields and run `handler`.
///
/// With no handler the notification is acknowledged with `200 OK`.
pub async fn handle_logout(
    mut request: CallbackRequest,
    handler: Option<&dyn SingleSignOutHandler>,
    options: &CasConfig,
) -> Result<ProtocolResponse, LogoutFailure> {
    let payload = request
        .param(LOGOUT_REQUEST_PARAM)
        .ok_or(LogoutFailure::MissingPayload)?;
    let logout = LogoutRequest::parse(payload)?;
    tracing::debug!(
        session_index = %logout.session_index,
        "Received CAS single sign-out request"
    );

    request.inject_param(NAME_ID_PARAM, logout.name_id);
    request.inject_param(SESSION_INDEX_PARAM, logout.session_index);

    let Some(handler) = handler else {
        return Ok(ProtocolResponse::ok());
    };

    match handler
        .on_single_sign_out(&request, options)
        .await
        .map_err(LogoutFailure::Callback)?
    {
        None | Some(LogoutCallbackResult::Ok) => Ok(ProtocolResponse::ok()),
        Some(LogoutCallbackResult::Response(response)) => Ok(response),
    }
}
