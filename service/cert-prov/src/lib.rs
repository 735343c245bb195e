// Licensed under the Apache-2.0 license

//! Certificate provisioning service: decodes GetCertificateRequests,
//! validates their authorization, attestation and signatures, and answers
//! with an operational certificate signed by the service CA.

pub mod builder;
pub mod config;
pub mod crypto;
pub mod error;
pub mod issuer;
pub mod protocol;
pub mod request;
pub mod response;
pub mod service;
pub mod service_sm;
pub mod transport;
pub mod validator;

pub use config::{ServiceAuthority, ServiceConfig, ServicePolicy, TrustAnchors};
pub use error::{BuildError, ConfigError, DecodeError, IssuanceError, ServiceError, ValidationError};
pub use issuer::CertificateIssuer;
pub use request::{Attestation, GetCertificateRequest};
pub use service::CertProvService;
pub use transport::{ExchangeContext, ExchangeManager, InboundMessage, TransportError};
pub use validator::validate_request;
