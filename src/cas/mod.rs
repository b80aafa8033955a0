//! CAS protocol client.
//!
//! The flow is the usual one for CAS:
//!
//! 1. [`CasStrategy::request_phase`] redirects the user to the CAS login page
//!    with a `service` URL pointing back at the callback endpoint.
//! 2. CAS sends the user back with a `ticket`, and
//!    [`CasStrategy::callback_phase`] validates it with the server (CAS 2.0/3.0
//!    XML or SAML 1.1) and projects the returned attributes into a
//!    [`NormalizedIdentity`].
//! 3. When the user logs out of CAS, the server POSTs a SAML `LogoutRequest`
//!    to the same callback endpoint; it is handed to the host's
//!    [`SingleSignOutHandler`].

pub mod attributes;
pub mod endpoint;
mod error;
pub mod identity;
pub mod logout;
pub mod request;
pub mod response;
pub mod saml;
pub mod strategy;
pub mod url;
pub mod validator;

pub use attributes::{AttributeValue, Attributes, MergePolicy};
pub use endpoint::CasEndpointConfig;
pub use error::{AuthFailure, BoxError, CasError, FailureCode, LogoutFailure};
pub use identity::{Credentials, IdentityInfo, NormalizedIdentity};
pub use logout::{LogoutCallbackResult, LogoutRequest, SingleSignOutHandler};
pub use request::{CallbackRequest, ProtocolResponse};
pub use response::{FailureReason, ValidationResult};
pub use strategy::{CallbackOutcome, CasStrategy, RawInfoHook};
pub use validator::{TicketValidator, ValidatedTicket};
