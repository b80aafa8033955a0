//! The CAS authentication strategy.
//!
//! [`CasStrategy`] owns the validated endpoint configuration, the ticket
//! validator and the optional hooks. It drives both phases of a sign-in: the
//! login redirect and the callback, where a `ticket` is validated or a
//! Single Sign-Out `logoutRequest` is dispatched.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use url::Url;

use super::{
    CasError,
    attributes::{Attributes, MergePolicy},
    endpoint::CasEndpointConfig,
    error::AuthFailure,
    identity::{IdentityMapping, NormalizedIdentity},
    logout::{SingleSignOutHandler, handle_logout},
    request::{CallbackRequest, ProtocolResponse},
    response::{FailureReason, ValidationResult},
    saml::SamlTicketValidator,
    url::append_params,
    validator::{ServiceTicketValidator, TicketValidator, build_http_client},
};
use crate::config::CasConfig;

pub const REDIRECT_BODY: &str = "You are being redirected to CAS for sign-in.";
pub const TICKET_PARAM: &str = "ticket";
/// Request parameter naming where the user should land after sign-in.
pub const RETURN_URL_PARAM: &str = "url";

/// Host hook that contributes extra attributes after a successful validation.
///
/// Receives the ticket, the parsed attributes and the raw response body.
/// The returned attributes overwrite parsed ones with the same name. Not
/// called when the server returned no attributes.
#[async_trait]
pub trait RawInfoHook: Send + Sync {
    async fn fetch_raw_info(
        &self,
        ticket: &str,
        attributes: &Attributes,
        raw_body: &str,
    ) -> Attributes;
}

/// How a callback ended.
#[derive(Debug)]
pub enum CallbackOutcome {
    Authenticated(NormalizedIdentity),
    /// A Single Sign-Out notification was handled; send this response back.
    LogoutHandled(ProtocolResponse),
    Failed(AuthFailure),
}

/// The CAS client: redirects users to the login page and turns callbacks
/// into identities.
///
/// Immutable after construction and cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct CasStrategy {
    config: Arc<CasConfig>,
    endpoint: Arc<CasEndpointConfig>,
    validator: Arc<dyn TicketValidator>,
    mapping: IdentityMapping,
    single_sign_out: Option<Arc<dyn SingleSignOutHandler>>,
    raw_info_hook: Option<Arc<dyn RawInfoHook>>,
}

impl fmt::Debug for CasStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasStrategy")
            .field("endpoint", &self.endpoint)
            .field("saml", &self.config.saml)
            .field("single_sign_out", &self.single_sign_out.is_some())
            .field("raw_info_hook", &self.raw_info_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl CasStrategy {
    /// Validate `config` and build the strategy with its HTTP client.
    ///
    /// Every configuration problem surfaces here, before any request is made.
    pub fn new(config: CasConfig) -> Result<Self, CasError> {
        let http_client = build_http_client(&config)?;
        Self::with_client(config, http_client)
    }

    /// Like [`CasStrategy::new`] but with a caller-supplied HTTP client.
    pub fn with_client(config: CasConfig, http_client: reqwest::Client) -> Result<Self, CasError> {
        let endpoint = Arc::new(CasEndpointConfig::from_config(&config)?);
        let policy = MergePolicy::from_flag(config.merge_multivalued_attributes);

        let validator: Arc<dyn TicketValidator> = if config.saml {
            Arc::new(SamlTicketValidator::new(endpoint.clone(), http_client, policy))
        } else {
            Arc::new(ServiceTicketValidator::new(endpoint.clone(), http_client, policy))
        };

        tracing::debug!(
            base_url = %endpoint.base_url(),
            saml = config.saml,
            "Configured CAS strategy"
        );

        Ok(Self {
            mapping: IdentityMapping::from_config(&config),
            config: Arc::new(config),
            endpoint,
            validator,
            single_sign_out: None,
            raw_info_hook: None,
        })
    }

    /// Replace the ticket validator.
    pub fn with_validator(mut self, validator: Arc<dyn TicketValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_single_sign_out(mut self, handler: Arc<dyn SingleSignOutHandler>) -> Self {
        self.single_sign_out = Some(handler);
        self
    }

    pub fn with_raw_info_hook(mut self, hook: Arc<dyn RawInfoHook>) -> Self {
        self.raw_info_hook = Some(hook);
        self
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &CasEndpointConfig {
        &self.endpoint
    }

    /// Service URL registered with CAS: the callback URL, carrying the
    /// user's return URL as the `url` parameter when there is one.
    pub fn service_url(callback_url: &str, return_url: Option<&str>) -> Result<Url, CasError> {
        match return_url.filter(|url| !url.is_empty()) {
            Some(return_url) => append_params(callback_url, &[(RETURN_URL_PARAM, return_url)]),
            None => append_params(callback_url, &[]),
        }
    }

    /// Redirect to the CAS login page.
    pub fn request_phase(
        &self,
        callback_url: &str,
        return_url: Option<&str>,
    ) -> Result<ProtocolResponse, CasError> {
        let service = Self::service_url(callback_url, return_url)?;
        let login_url = self.endpoint.login_url(service.as_str())?;
        tracing::debug!(location = %login_url, "Redirecting to CAS login");

        ProtocolResponse::redirect(login_url.as_str(), REDIRECT_BODY).ok_or_else(|| {
            CasError::Configuration("login URL is not a valid Location header".to_string())
        })
    }

    /// CAS logout URL, optionally returning the user to `service`.
    pub fn logout_url(&self, service: Option<&str>) -> Result<Url, CasError> {
        self.endpoint.logout_url(service)
    }

    /// Handle a request to the callback endpoint.
    ///
    /// POSTs carrying `logoutRequest` go to Single Sign-Out handling;
    /// everything else must carry a `ticket`. Only transport and URL errors
    /// are returned as `Err`; every other outcome is a [`CallbackOutcome`].
    pub async fn callback_phase(
        &self,
        request: CallbackRequest,
        callback_url: &str,
    ) -> Result<CallbackOutcome, CasError> {
        if request.is_logout_request() {
            return Ok(
                match handle_logout(request, self.single_sign_out.as_deref(), &self.config).await {
                    Ok(response) => CallbackOutcome::LogoutHandled(response),
                    Err(failure) => {
                        tracing::warn!(error = %failure, "CAS single sign-out request failed");
                        CallbackOutcome::Failed(AuthFailure::from(failure))
                    }
                },
            );
        }

        let Some(ticket) = request.param(TICKET_PARAM).filter(|t| !t.is_empty()) else {
            tracing::warn!(code = "no_ticket", "CAS callback without ticket");
            return Ok(CallbackOutcome::Failed(AuthFailure::MissingTicket));
        };

        let service = Self::service_url(callback_url, request.param(RETURN_URL_PARAM))?;
        let validated = self.validator.validate(service.as_str(), ticket).await?;

        let mut attributes = match validated.result {
            ValidationResult::Success(attributes) if attributes.is_empty() => {
                return Ok(invalid_ticket(FailureReason::NoAttributes));
            }
            ValidationResult::Success(attributes) => attributes,
            ValidationResult::Failure(reason) => return Ok(invalid_ticket(reason)),
        };

        if let Some(hook) = &self.raw_info_hook {
            let raw_info = hook
                .fetch_raw_info(ticket, &attributes, &validated.raw_body)
                .await;
            attributes.extend(raw_info);
        }

        match self.mapping.project(attributes, ticket) {
            Ok(identity) => {
                tracing::info!(uid = %identity.uid, "CAS authentication succeeded");
                Ok(CallbackOutcome::Authenticated(identity))
            }
            Err(reason) => Ok(invalid_ticket(reason)),
        }
    }
}

fn invalid_ticket(reason: FailureReason) -> CallbackOutcome {
    tracing::warn!(code = "invalid_ticket", reason = %reason, "CAS ticket validation failed");
    CallbackOutcome::Failed(AuthFailure::InvalidTicket(reason))
}
