// Licensed under the Apache-2.0 license

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use openssl::nid::Nid;

use crate::error::{CertificateError, CertificateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    Sha1WithRsa = 3,
    EcdsaWithSha1 = 4,
    EcdsaWithSha256 = 5,
    HmacWithSha256 = 6,
    Sha256WithRsa = 7,
}

impl SignatureAlgorithm {
    pub fn from_id(id: u64) -> CertificateResult<Self> {
        u8::try_from(id)
            .ok()
            .and_then(|v| Self::try_from(v).ok())
            .ok_or(CertificateError::UnsupportedSignatureAlgorithm(id))
    }

    pub(crate) fn oid(self) -> &'static [u64] {
        match self {
            SignatureAlgorithm::Sha1WithRsa => &[1, 2, 840, 113549, 1, 1, 5],
            SignatureAlgorithm::EcdsaWithSha1 => &[1, 2, 840, 10045, 4, 1],
            SignatureAlgorithm::EcdsaWithSha256 => &[1, 2, 840, 10045, 4, 3, 2],
            SignatureAlgorithm::HmacWithSha256 => &[1, 2, 840, 113549, 2, 9],
            SignatureAlgorithm::Sha256WithRsa => &[1, 2, 840, 113549, 1, 1, 11],
        }
    }

    /// RSA and HMAC AlgorithmIdentifiers carry an explicit NULL parameter.
    pub(crate) fn has_null_params(self) -> bool {
        !matches!(
            self,
            SignatureAlgorithm::EcdsaWithSha1 | SignatureAlgorithm::EcdsaWithSha256
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    Rsa = 1,
    Ec = 2,
}

impl PublicKeyAlgorithm {
    pub fn from_id(id: u64) -> CertificateResult<Self> {
        u8::try_from(id)
            .ok()
            .and_then(|v| Self::try_from(v).ok())
            .ok_or(CertificateError::UnsupportedPublicKeyAlgorithm(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum CurveId {
    Prime192v1 = 0x05,
    Prime256v1 = 0x1B,
    Secp224r1 = 0x21,
}

impl CurveId {
    pub fn from_id(id: u64) -> CertificateResult<Self> {
        u32::try_from(id)
            .ok()
            .and_then(|v| Self::try_from(v).ok())
            .ok_or(CertificateError::UnsupportedCurve(id))
    }

    pub fn nid(self) -> Nid {
        match self {
            CurveId::Prime192v1 => Nid::X9_62_PRIME192V1,
            CurveId::Prime256v1 => Nid::X9_62_PRIME256V1,
            CurveId::Secp224r1 => Nid::SECP224R1,
        }
    }

    pub fn from_nid(nid: Nid) -> CertificateResult<Self> {
        match nid {
            Nid::X9_62_PRIME192V1 => Ok(CurveId::Prime192v1),
            Nid::X9_62_PRIME256V1 => Ok(CurveId::Prime256v1),
            Nid::SECP224R1 => Ok(CurveId::Secp224r1),
            other => Err(CertificateError::UnsupportedCurve(other.as_raw() as u64)),
        }
    }

    pub(crate) fn oid(self) -> &'static [u64] {
        match self {
            CurveId::Prime192v1 => &[1, 2, 840, 10045, 3, 1, 1],
            CurveId::Prime256v1 => &[1, 2, 840, 10045, 3, 1, 7],
            CurveId::Secp224r1 => &[1, 3, 132, 0, 33],
        }
    }
}

bitflags! {
    /// Key usage flags. Bit `n` corresponds to bit `n` of the X.509 KeyUsage BIT STRING.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyUsage: u16 {
        const DIGITAL_SIGNATURE = 0x0001;
        const NON_REPUDIATION = 0x0002;
        const KEY_ENCIPHERMENT = 0x0004;
        const DATA_ENCIPHERMENT = 0x0008;
        const KEY_AGREEMENT = 0x0010;
        const KEY_CERT_SIGN = 0x0020;
        const CRL_SIGN = 0x0040;
        const ENCIPHER_ONLY = 0x0080;
        const DECIPHER_ONLY = 0x0100;
    }
}

/// Extended key usage purpose. The value is the last arc of `1.3.6.1.5.5.7.3.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum KeyPurpose {
    ServerAuth = 1,
    ClientAuth = 2,
    CodeSigning = 3,
    EmailProtection = 4,
    TimeStamping = 8,
    OcspSigning = 9,
}

impl KeyPurpose {
    pub fn from_id(id: u64) -> CertificateResult<Self> {
        u8::try_from(id)
            .ok()
            .and_then(|v| Self::try_from(v).ok())
            .ok_or(CertificateError::UnsupportedKeyPurpose(id))
    }

    pub(crate) fn oid(self) -> [u64; 9] {
        [1, 3, 6, 1, 5, 5, 7, 3, u8::from(self) as u64]
    }
}

pub(crate) const EC_PUBLIC_KEY_OID: &[u64] = &[1, 2, 840, 10045, 2, 1];
