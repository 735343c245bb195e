// Licensed under the Apache-2.0 license

use thiserror::Error;
use weave_tlv::TlvError;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate encoding: {0}")]
    Tlv(#[from] TlvError),
    #[error("certificate set is full")]
    TooManyCertificates,
    #[error("unsupported signature algorithm {0}")]
    UnsupportedSignatureAlgorithm(u64),
    #[error("unsupported public key algorithm {0}")]
    UnsupportedPublicKeyAlgorithm(u64),
    #[error("unsupported elliptic curve {0:#x}")]
    UnsupportedCurve(u64),
    #[error("unsupported distinguished name")]
    InvalidDistinguishedName,
    #[error("unsupported key purpose {0}")]
    UnsupportedKeyPurpose(u64),
    #[error("certificate chain is empty")]
    EmptyChain,
    #[error("certificate not trusted")]
    CertNotTrusted,
    #[error("certificate signature invalid")]
    InvalidSignature,
    #[error("certificate expired")]
    CertExpired,
    #[error("certificate not yet valid")]
    CertNotYetValid,
    #[error("certificate usage not allowed")]
    CertUsageNotAllowed,
    #[error("certificate path too long")]
    PathTooLong,
    #[error("crypto backend: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),
}

pub type CertificateResult<T> = Result<T, CertificateError>;
