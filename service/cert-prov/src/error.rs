// Licensed under the Apache-2.0 license

use openssl::error::ErrorStack;
use thiserror::Error;
use weave_cert::CertificateError;
use weave_tlv::TlvError;

use crate::transport::TransportError;

/// Failures while parsing a GetCertificateRequest.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed request: {0}")]
    Malformed(TlvError),
    #[error("invalid certificate in request: {0}")]
    Certificate(CertificateError),
    #[error("invalid request type {0}")]
    InvalidRequestType(u64),
    #[error("related certificates are not allowed on an initial request")]
    RelatedCertsNotAllowed,
    #[error("more than one attestation block present")]
    ConflictingAttestation,
    #[error("operational signature algorithm {0} not supported")]
    UnsupportedOperationalSigAlgo(u64),
    #[error("attestation signature does not match the attestation type")]
    AttestationSignatureMismatch,
    #[error("too many certificates in request")]
    TooManyCertificates,
}

impl DecodeError {
    /// True when the input could not be parsed at all, as opposed to parsing
    /// into something the protocol forbids.
    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeError::Malformed(_) | DecodeError::Certificate(_))
    }
}

impl From<TlvError> for DecodeError {
    fn from(e: TlvError) -> Self {
        DecodeError::Malformed(e)
    }
}

impl From<CertificateError> for DecodeError {
    fn from(e: CertificateError) -> Self {
        match e {
            CertificateError::Tlv(e) => DecodeError::Malformed(e),
            CertificateError::TooManyCertificates => DecodeError::TooManyCertificates,
            other => DecodeError::Certificate(other),
        }
    }
}

/// Failures while checking a decoded request against policy and trust anchors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("pairing authorization mismatch")]
    AuthorizationMismatch,
    #[error("manufacturer attestation required")]
    AttestationRequired,
    #[error("certificate not trusted: {0}")]
    CertNotTrusted(CertificateError),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(u64),
    #[error("HMAC key id {0} not recognized")]
    HmacKeyIdMismatch(u32),
    #[error("HMAC metadata mismatch")]
    HmacMetadataMismatch,
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("crypto backend: {0}")]
    Crypto(#[from] ErrorStack),
}

/// Failures while minting a certificate.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("certificate buffer too small")]
    BufferTooSmall,
    #[error("certificate encoding: {0}")]
    Encoding(TlvError),
    #[error("certificate: {0}")]
    Certificate(CertificateError),
    #[error("crypto backend: {0}")]
    Crypto(#[from] ErrorStack),
}

impl From<CertificateError> for IssuanceError {
    fn from(e: CertificateError) -> Self {
        match e {
            CertificateError::Tlv(TlvError::BufferTooSmall) => IssuanceError::BufferTooSmall,
            CertificateError::Tlv(e) => IssuanceError::Encoding(e),
            CertificateError::Crypto(e) => IssuanceError::Crypto(e),
            other => IssuanceError::Certificate(other),
        }
    }
}

impl From<TlvError> for IssuanceError {
    fn from(e: TlvError) -> Self {
        match e {
            TlvError::BufferTooSmall => IssuanceError::BufferTooSmall,
            e => IssuanceError::Encoding(e),
        }
    }
}

/// Failures while building a client request.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("request encoding: {0}")]
    Encoding(#[from] TlvError),
    #[error("certificate: {0}")]
    Certificate(#[from] CertificateError),
    #[error("crypto backend: {0}")]
    Crypto(#[from] ErrorStack),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("field {field} is not valid hex: {source}")]
    Hex {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("field {field}: {source}")]
    Certificate {
        field: &'static str,
        source: CertificateError,
    },
    #[error("CA private key: {0}")]
    Key(#[from] ErrorStack),
    #[error("CA key does not match the CA certificate")]
    KeyMismatch,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transport: {0:?}")]
    Transport(TransportError),
}

impl From<TransportError> for ServiceError {
    fn from(e: TransportError) -> Self {
        ServiceError::Transport(e)
    }
}
