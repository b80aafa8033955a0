use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// CAS Client Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// CAS client options (the `[cas]` table).
///
/// Either `url` or `host` must be set. When `url` is given it is decomposed
/// into scheme, host, port and path and those four fields are ignored.
///
/// ```toml
/// [cas]
/// url = "https://cas.example.org:8443/cas"
/// uid_field = "employeeid"
/// merge_multivalued_attributes = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CasConfig {
    /// Full CAS base URL, e.g. `https://cas.example.org:8443/cas`.
    #[serde(default)]
    pub url: Option<String>,

    /// CAS server host name.
    #[serde(default)]
    pub host: Option<String>,

    /// CAS server port. The scheme default is used (and omitted from URLs) when unset.
    #[serde(default)]
    pub port: Option<u16>,

    /// Path prefix of the CAS application, e.g. `/cas`.
    #[serde(default)]
    pub path: String,

    /// Use `https`.
    #[serde(default = "default_true")]
    pub ssl: bool,

    /// Login endpoint, relative to the CAS base URL.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Logout endpoint, relative to the CAS base URL.
    #[serde(default = "default_logout_url")]
    pub logout_url: String,

    /// CAS 2.0/3.0 ticket validation endpoint, relative to the CAS base URL.
    #[serde(default = "default_service_validate_url")]
    pub service_validate_url: String,

    /// SAML 1.1 ticket validation endpoint, relative to the CAS base URL.
    #[serde(default = "default_saml_validate_url")]
    pub saml_validate_url: String,

    /// Validate tickets with SAML 1.1 instead of the CAS XML protocol.
    #[serde(default)]
    pub saml: bool,

    /// Attribute holding the user's unique identifier.
    #[serde(default = "default_uid_field")]
    pub uid_field: String,

    /// Skip TLS certificate verification. Never enable in production.
    #[serde(default)]
    pub disable_ssl_verification: bool,

    /// PEM file or directory of PEM files trusted in addition to the built-in roots.
    #[serde(default)]
    pub ca_path: Option<String>,

    /// Pin the TLS protocol version (`TLSv1_2` or `TLSv1_3`).
    #[serde(default)]
    pub ssl_version: Option<String>,

    /// Collect repeated attribute names into lists instead of keeping the last value.
    #[serde(default)]
    pub merge_multivalued_attributes: bool,

    /// Leave `extra` empty in the normalized identity.
    #[serde(default)]
    pub skip_info: bool,

    /// Total timeout for each request to the CAS server.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout for requests to the CAS server.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_name_key")]
    pub name_key: String,

    #[serde(default = "default_email_key")]
    pub email_key: String,

    #[serde(default = "default_nickname_key")]
    pub nickname_key: String,

    #[serde(default = "default_first_name_key")]
    pub first_name_key: String,

    #[serde(default = "default_last_name_key")]
    pub last_name_key: String,

    #[serde(default = "default_location_key")]
    pub location_key: String,

    #[serde(default = "default_image_key")]
    pub image_key: String,

    #[serde(default = "default_phone_key")]
    pub phone_key: String,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            path: String::new(),
            ssl: true,
            login_url: default_login_url(),
            logout_url: default_logout_url(),
            service_validate_url: default_service_validate_url(),
            saml_validate_url: default_saml_validate_url(),
            saml: false,
            uid_field: default_uid_field(),
            disable_ssl_verification: false,
            ca_path: None,
            ssl_version: None,
            merge_multivalued_attributes: false,
            skip_info: false,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            name_key: default_name_key(),
            email_key: default_email_key(),
            nickname_key: default_nickname_key(),
            first_name_key: default_first_name_key(),
            last_name_key: default_last_name_key(),
            location_key: default_location_key(),
            image_key: default_image_key(),
            phone_key: default_phone_key(),
        }
    }
}

impl CasConfig {
    /// Options for a CAS server at `host`, everything else defaulted.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Options for a CAS server at the full base `url`.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_login_url() -> String {
    "/login".to_string()
}

fn default_logout_url() -> String {
    "/logout".to_string()
}

fn default_service_validate_url() -> String {
    "/serviceValidate".to_string()
}

fn default_saml_validate_url() -> String {
    "/samlValidate".to_string()
}

fn default_uid_field() -> String {
    "user".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_name_key() -> String {
    "name".to_string()
}

fn default_email_key() -> String {
    "email".to_string()
}

fn default_nickname_key() -> String {
    "user".to_string()
}

fn default_first_name_key() -> String {
    "first_name".to_string()
}

fn default_last_name_key() -> String {
    "last_name".to_string()
}

fn default_location_key() -> String {
    "location".to_string()
}

fn default_image_key() -> String {
    "image".to_string()
}

fn default_phone_key() -> String {
    "phone".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CasConfig = toml::from_str(r#"host = "cas.example.org""#).unwrap();
        assert!(config.ssl);
        assert_eq!(config.login_url, "/login");
        assert_eq!(config.logout_url, "/logout");
        assert_eq!(config.service_validate_url, "/serviceValidate");
        assert_eq!(config.uid_field, "user");
        assert_eq!(config.nickname_key, "user");
        assert!(!config.merge_multivalued_attributes);
        assert!(!config.disable_ssl_verification);
        assert!(config.port.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<CasConfig, _> = toml::from_str(
            r#"
            host = "cas.example.org"
            serviceValidateUri = "/p3/serviceValidate"
        "#,
        );
        assert!(result.is_err());
    }
}
