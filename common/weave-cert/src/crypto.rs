// Licensed under the Apache-2.0 license

use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcKeyRef, EcPoint, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::{HasParams, HasPublic, Private, Public};

use crate::cert::EcdsaSignature;
use crate::error::{CertificateError, CertificateResult};
use crate::types::CurveId;

/// Length of the short key identifiers placed in SKID/AKID extensions.
pub const KEY_ID_LEN: usize = 8;

pub fn ec_public_key(curve: CurveId, point: &[u8]) -> CertificateResult<EcKey<Public>> {
    let group = EcGroup::from_curve_name(curve.nid())?;
    let mut ctx = BigNumContext::new()?;
    let point = EcPoint::from_bytes(&group, point, &mut ctx)?;
    Ok(EcKey::from_public_key(&group, &point)?)
}

/// Uncompressed SEC1 encoding of the key's public point.
pub fn ec_public_key_bytes<T: HasPublic>(key: &EcKeyRef<T>) -> CertificateResult<Vec<u8>> {
    let mut ctx = BigNumContext::new()?;
    Ok(key
        .public_key()
        .to_bytes(key.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)?)
}

pub fn ec_curve<T: HasParams>(key: &EcKeyRef<T>) -> CertificateResult<CurveId> {
    let nid = key
        .group()
        .curve_name()
        .ok_or(CertificateError::UnsupportedCurve(0))?;
    CurveId::from_nid(nid)
}

/// Verifies an ECDSA signature over a precomputed digest.
pub fn verify_ecdsa(
    curve: CurveId,
    public_key: &[u8],
    digest: &[u8],
    signature: &EcdsaSignature,
) -> CertificateResult<()> {
    let key = ec_public_key(curve, public_key)?;
    let sig = EcdsaSig::from_private_components(
        BigNum::from_slice(&signature.r)?,
        BigNum::from_slice(&signature.s)?,
    )?;
    if sig.verify(digest, &key)? {
        Ok(())
    } else {
        Err(CertificateError::InvalidSignature)
    }
}

pub fn sign_ecdsa(key: &EcKeyRef<Private>, digest: &[u8]) -> CertificateResult<EcdsaSignature> {
    let sig = EcdsaSig::sign(digest, key)?;
    Ok(EcdsaSignature {
        r: sig.r().to_vec(),
        s: sig.s().to_vec(),
    })
}

/// Short key identifier: the leading bytes of the SHA-1 of the public point.
pub fn key_id(public_key: &[u8]) -> Vec<u8> {
    openssl::sha::sha1(public_key)[..KEY_ID_LEN].to_vec()
}
