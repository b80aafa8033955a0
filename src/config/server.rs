//! `[server]` section: bind address, public URL and route paths.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible scheme and host of this service, e.g.
    /// `https://app.example.org`. The CAS server redirects users back here,
    /// so it must match what the browser sees, not the bind address.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Mount point of the CAS routes. The callback lives at `<path_prefix>/callback`.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Where failed authentications are redirected.
    #[serde(default = "default_failure_path")]
    pub failure_path: String,

    /// Maximum request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            path_prefix: default_path_prefix(),
            failure_path: default_failure_path(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    /// Absolute URL of the callback endpoint, as registered with CAS.
    pub fn callback_url(&self) -> String {
        format!(
            "{}{}/callback",
            self.public_url.trim_end_matches('/'),
            self.path_prefix
        )
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let public_url = url::Url::parse(&self.public_url)
            .map_err(|e| format!("server.public_url '{}' is invalid: {e}", self.public_url))?;
        if !matches!(public_url.scheme(), "http" | "https") {
            return Err(format!(
                "server.public_url must use http or https, got '{}'",
                public_url.scheme()
            ));
        }
        for (name, path) in [
            ("path_prefix", &self.path_prefix),
            ("failure_path", &self.failure_path),
        ] {
            if !path.starts_with('/') || (path.len() > 1 && path.ends_with('/')) {
                return Err(format!(
                    "server.{name} must start with '/' and not end with '/', got '{path}'"
                ));
            }
        }
        if self.path_prefix == "/" {
            return Err("server.path_prefix cannot be '/'".to_string());
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_path_prefix() -> String {
    "/auth/cas".to_string()
}

fn default_failure_path() -> String {
    "/auth/failure".to_string()
}

// Default: 1 MiB, comfortably above the 512 KiB logout payload cap
fn default_body_limit() -> usize {
    1024 * 1024
}
