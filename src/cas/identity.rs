//! Projection of validated CAS attributes into a [`NormalizedIdentity`].
//!
//! The eight well-known `info` fields are looked up through configurable
//! attribute names; every other attribute lands in `extra`.

use serde::Serialize;

use super::{
    attributes::{AttributeValue, Attributes, prune},
    response::FailureReason,
};
use crate::config::CasConfig;

pub const PROVIDER: &str = "cas";

/// Well-known info keys. Attributes with these names are never copied into `extra`.
const SCHEMA_KEYS: [&str; 8] = [
    "name",
    "email",
    "nickname",
    "first_name",
    "last_name",
    "location",
    "image",
    "phone",
];

/// Profile fields promoted out of the raw attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub ticket: String,
}

/// The authenticated user as handed to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedIdentity {
    pub provider: &'static str,
    pub uid: String,
    pub info: IdentityInfo,
    pub extra: Attributes,
    pub credentials: Credentials,
}

/// Which attribute feeds each info field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoKeys {
    pub name: String,
    pub email: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub location: String,
    pub image: String,
    pub phone: String,
}

impl InfoKeys {
    pub fn from_config(config: &CasConfig) -> Self {
        Self {
            name: config.name_key.clone(),
            email: config.email_key.clone(),
            nickname: config.nickname_key.clone(),
            first_name: config.first_name_key.clone(),
            last_name: config.last_name_key.clone(),
            location: config.location_key.clone(),
            image: config.image_key.clone(),
            phone: config.phone_key.clone(),
        }
    }
}

impl Default for InfoKeys {
    fn default() -> Self {
        Self::from_config(&CasConfig::default())
    }
}

/// Options of the attribute-to-identity projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMapping {
    pub uid_field: String,
    pub keys: InfoKeys,
    pub skip_info: bool,
}

impl IdentityMapping {
    pub fn from_config(config: &CasConfig) -> Self {
        Self {
            uid_field: config.uid_field.clone(),
            keys: InfoKeys::from_config(config),
            skip_info: config.skip_info,
        }
    }

    /// Project validated attributes into a [`NormalizedIdentity`].
    ///
    /// Fails with [`FailureReason::MissingUid`] when the uid attribute is
    /// absent or empty.
    pub fn project(
        &self,
        attributes: Attributes,
        ticket: &str,
    ) -> Result<NormalizedIdentity, FailureReason> {
        let uid = attributes
            .get(&self.uid_field)
            .and_then(AttributeValue::first_scalar)
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| FailureReason::MissingUid {
                field: self.uid_field.clone(),
            })?
            .to_string();

        let pick = |key: &str| {
            attributes
                .get_str(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let info = IdentityInfo {
            name: pick(&self.keys.name),
            email: pick(&self.keys.email),
            nickname: pick(&self.keys.nickname),
            first_name: pick(&self.keys.first_name),
            last_name: pick(&self.keys.last_name),
            location: pick(&self.keys.location),
            image: pick(&self.keys.image),
            phone: pick(&self.keys.phone),
        };

        let extra = if self.skip_info {
            Attributes::new()
        } else {
            let mut extra = attributes;
            extra.retain(|key, _| !SCHEMA_KEYS.contains(&key));
            prune(extra)
        };

        Ok(NormalizedIdentity {
            provider: PROVIDER,
            uid,
            info,
            extra,
            credentials: Credentials {
                ticket: ticket.to_string(),
            },
        })
    }
}
