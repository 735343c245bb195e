// Licensed under the Apache-2.0 license

//! Verification primitives for manufacturer attestation that Weave
//! certificates do not cover: X.509 chains, RSA signatures and HMACs.

use constant_time_eq::constant_time_eq;
use log::debug;
use openssl::hash::MessageDigest;
use openssl::md::Md;
use openssl::pkey::PKey;
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use openssl::sign::Signer;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509StoreContext, X509};

use crate::error::ValidationError;

/// Checks that the first certificate of `chain` leads to `trusted_root`
/// through the remaining ones. Validity periods are ignored.
pub fn validate_x509_chain(chain: &[&[u8]], trusted_root: &[u8]) -> Result<(), ValidationError> {
    let (leaf, intermediates) = chain.split_first().ok_or(ValidationError::InvalidSignature)?;
    let leaf = parse_cert(leaf)?;
    let mut untrusted = Stack::new()?;
    for der in intermediates {
        untrusted.push(parse_cert(der)?)?;
    }

    let mut store = X509StoreBuilder::new()?;
    store.add_cert(X509::from_der(trusted_root)?)?;
    store.set_flags(X509VerifyFlags::NO_CHECK_TIME)?;
    let store = store.build();

    let mut ctx = X509StoreContext::new()?;
    let verified = ctx.init(&store, &leaf, &untrusted, |c| {
        let ok = c.verify_cert()?;
        if !ok {
            debug!("X.509 chain rejected: {}", c.error());
        }
        Ok(ok)
    })?;
    if verified {
        Ok(())
    } else {
        Err(ValidationError::InvalidSignature)
    }
}

/// Verifies a PKCS#1 v1.5 RSA signature over a SHA-256 digest using the
/// key of the DER certificate `cert`.
pub fn verify_rsa_sha256(
    cert: &[u8],
    digest: &[u8],
    signature: &[u8],
) -> Result<(), ValidationError> {
    let key = parse_cert(cert)?.public_key()?;
    if key.rsa().is_err() {
        return Err(ValidationError::InvalidSignature);
    }

    let mut ctx = PkeyCtx::new(&key)?;
    ctx.verify_init()?;
    ctx.set_rsa_padding(Padding::PKCS1)?;
    ctx.set_signature_md(Md::sha256())?;
    match ctx.verify(digest, signature) {
        Ok(true) => Ok(()),
        _ => Err(ValidationError::InvalidSignature),
    }
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ValidationError> {
    let key = PKey::hmac(key)?;
    let mut signer = Signer::new(MessageDigest::sha256(), &key)?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
}

pub fn verify_hmac_sha256(key: &[u8], data: &[u8], mac: &[u8]) -> Result<(), ValidationError> {
    if constant_time_eq(&hmac_sha256(key, data)?, mac) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSignature)
    }
}

fn parse_cert(der: &[u8]) -> Result<X509, ValidationError> {
    X509::from_der(der).map_err(|e| {
        debug!("Unparseable X.509 certificate: {}", e);
        ValidationError::InvalidSignature
    })
}
