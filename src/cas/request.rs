//! Framework-neutral request and response types for the callback endpoint.

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderValue, Method, StatusCode, header};

use super::logout::LOGOUT_REQUEST_PARAM;

/// The parts of an inbound callback the CAS core looks at.
///
/// Hosts build this from whatever framework they run in; query and form
/// parameters are merged into one map, form values winning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    pub method: Method,
    pub params: BTreeMap<String, String>,
}

impl CallbackRequest {
    pub fn new(method: Method, params: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            method,
            params: params.into_iter().collect(),
        }
    }

    pub fn get(params: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::new(Method::GET, params)
    }

    pub fn post(params: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::new(Method::POST, params)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A POST carrying a `logoutRequest` parameter is a Single Sign-Out call.
    pub fn is_logout_request(&self) -> bool {
        self.method == Method::POST && self.params.contains_key(LOGOUT_REQUEST_PARAM)
    }

    /// Add or overwrite a parameter.
    pub fn inject_param(&mut self, name: &str, value: impl Into<String>) {
        self.params.insert(name.to_string(), value.into());
    }
}

/// A plain HTTP response produced by the CAS core for the host to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ProtocolResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with a plain-text `OK` body.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK, "OK")
    }

    /// `302 Found` to `location` with a plain-text body.
    ///
    /// Returns `None` when `location` cannot be used as a header value.
    pub fn redirect(location: &str, body: impl Into<String>) -> Option<Self> {
        let mut response = Self::new(StatusCode::FOUND, body);
        response
            .headers
            .insert(header::LOCATION, HeaderValue::from_str(location).ok()?);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        Some(response)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_logout_detection_requires_post() {
        let body = params(&[("logoutRequest", "<samlp:LogoutRequest/>")]);
        assert!(CallbackRequest::post(body.clone()).is_logout_request());
        assert!(!CallbackRequest::get(body).is_logout_request());
        assert!(!CallbackRequest::post(params(&[("ticket", "ST-1")])).is_logout_request());
    }

    #[test]
    fn test_inject_param_overwrites() {
        let mut request = CallbackRequest::post(params(&[("name_id", "forged")]));
        request.inject_param("name_id", "@NOT_USED@");
        assert_eq!(request.param("name_id"), Some("@NOT_USED@"));
    }

    #[test]
    fn test_redirect_response() {
        let response = ProtocolResponse::redirect("https://cas/login?service=x", "bye").unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.location(), Some("https://cas/login?service=x"));
        assert_eq!(response.headers[header::CONTENT_TYPE], "text/plain");
        assert!(ProtocolResponse::redirect("bad\nheader", "").is_none());
    }
}
