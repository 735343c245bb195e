// Licensed under the Apache-2.0 license

//! Weave certificates: TLV decoding and encoding, DER transcoding of the
//! signed portion, signing, and chain validation.

mod cert;
mod cert_set;
pub mod crypto;
mod der;
mod dn;
mod error;
mod sign;
pub mod tags;
mod time;
mod types;
mod validate;

pub use cert::{
    BasicConstraints, DecodeFlags, EcdsaSignature, ExtendedKeyUsage, Extension, KeyIdentifier,
    KeyUsageExtension, TbsCertificate, WeaveCertificate, TBS_HASH_LEN,
};
pub use cert_set::CertificateSet;
pub use dn::{DistinguishedName, WeaveIdKind};
pub use error::{CertificateError, CertificateResult};
pub use sign::sign_certificate;
pub use time::{CertTime, NO_WELL_DEFINED_EXPIRY};
pub use types::{CurveId, KeyPurpose, KeyUsage, PublicKeyAlgorithm, SignatureAlgorithm};
pub use validate::{validate_chain, ValidationContext, DEFAULT_MAX_DEPTH};
