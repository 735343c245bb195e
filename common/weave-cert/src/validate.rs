// Licensed under the Apache-2.0 license

use log::{debug, warn};

use crate::cert::WeaveCertificate;
use crate::cert_set::CertificateSet;
use crate::crypto::verify_ecdsa;
use crate::error::{CertificateError, CertificateResult};
use crate::types::{KeyPurpose, KeyUsage, SignatureAlgorithm};

pub const DEFAULT_MAX_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// Packed certificate time to check validity periods against. `None`
    /// skips the check.
    pub effective_time: Option<u32>,
    pub required_key_usages: KeyUsage,
    pub required_key_purposes: Vec<KeyPurpose>,
    /// Maximum number of certificates above the leaf.
    pub max_depth: usize,
    /// Accept a leaf that is its own issuer once its signature verifies.
    pub allow_self_signed_leaf: bool,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            effective_time: None,
            required_key_usages: KeyUsage::empty(),
            required_key_purposes: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            allow_self_signed_leaf: false,
        }
    }
}

/// Builds a path from the leaf of `chain` to one of `anchors` and verifies
/// every signature on it.
///
/// Issuers are matched by subject DN and, when the child carries an
/// authority key id, by subject key id. Candidates come from the anchors
/// first and then from the rest of the chain.
pub fn validate_chain(
    chain: &CertificateSet,
    anchors: &[WeaveCertificate],
    ctx: &ValidationContext,
) -> CertificateResult<()> {
    let leaf = chain.leaf().ok_or(CertificateError::EmptyChain)?;
    check_leaf_usage(leaf, ctx)?;

    let mut cert = leaf;
    for depth in 0..=ctx.max_depth {
        check_validity(cert, ctx)?;

        if is_anchor(cert, anchors) {
            debug!("Chain anchored at {} (depth {})", cert.subject(), depth);
            return Ok(());
        }

        if depth == 0 && ctx.allow_self_signed_leaf && cert.is_self_signed() {
            verify_signed_by(cert, cert)?;
            debug!("Accepted self-signed leaf {}", cert.subject());
            return Ok(());
        }

        let issuer = anchors
            .iter()
            .chain(chain.certs().iter())
            .find(|candidate| issued_by(cert, candidate))
            .ok_or_else(|| {
                warn!("No issuer found for {}", cert.subject());
                CertificateError::CertNotTrusted
            })?;
        check_issuer(issuer, depth)?;
        verify_signed_by(cert, issuer)?;
        cert = issuer;
    }

    Err(CertificateError::PathTooLong)
}

fn is_anchor(cert: &WeaveCertificate, anchors: &[WeaveCertificate]) -> bool {
    anchors
        .iter()
        .any(|a| a.subject() == cert.subject() && a.tbs.public_key == cert.tbs.public_key)
}

fn issued_by(cert: &WeaveCertificate, candidate: &WeaveCertificate) -> bool {
    if core::ptr::eq(cert, candidate) || candidate.subject() != cert.issuer() {
        return false;
    }
    match (cert.tbs.authority_key_id(), candidate.tbs.subject_key_id()) {
        (Some(akid), Some(skid)) => akid == skid,
        _ => true,
    }
}

fn check_validity(cert: &WeaveCertificate, ctx: &ValidationContext) -> CertificateResult<()> {
    let Some(now) = ctx.effective_time else {
        return Ok(());
    };
    if now < cert.tbs.not_before {
        return Err(CertificateError::CertNotYetValid);
    }
    if cert.tbs.not_after != crate::time::NO_WELL_DEFINED_EXPIRY && now > cert.tbs.not_after {
        return Err(CertificateError::CertExpired);
    }
    Ok(())
}

fn check_leaf_usage(leaf: &WeaveCertificate, ctx: &ValidationContext) -> CertificateResult<()> {
    if !ctx.required_key_usages.is_empty() {
        let usages = leaf.tbs.key_usage().unwrap_or(KeyUsage::empty());
        if !usages.contains(ctx.required_key_usages) {
            return Err(CertificateError::CertUsageNotAllowed);
        }
    }
    if !ctx.required_key_purposes.is_empty() {
        let purposes = leaf.tbs.key_purposes().unwrap_or(&[]);
        if !ctx.required_key_purposes.iter().all(|p| purposes.contains(p)) {
            return Err(CertificateError::CertUsageNotAllowed);
        }
    }
    Ok(())
}

/// `depth` is the number of non-leaf certificates below the issuer.
fn check_issuer(issuer: &WeaveCertificate, depth: usize) -> CertificateResult<()> {
    let bc = issuer
        .tbs
        .basic_constraints()
        .filter(|bc| bc.is_ca)
        .ok_or(CertificateError::CertUsageNotAllowed)?;
    if let Some(usages) = issuer.tbs.key_usage() {
        if !usages.contains(KeyUsage::KEY_CERT_SIGN) {
            return Err(CertificateError::CertUsageNotAllowed);
        }
    }
    if bc.path_len.is_some_and(|len| depth > len as usize) {
        return Err(CertificateError::PathTooLong);
    }
    Ok(())
}

fn verify_signed_by(cert: &WeaveCertificate, issuer: &WeaveCertificate) -> CertificateResult<()> {
    if cert.tbs.signature_algorithm != SignatureAlgorithm::EcdsaWithSha256 {
        return Err(CertificateError::UnsupportedSignatureAlgorithm(
            u8::from(cert.tbs.signature_algorithm) as u64,
        ));
    }
    verify_ecdsa(
        issuer.tbs.curve,
        &issuer.tbs.public_key,
        &cert.tbs_hash(),
        &cert.signature,
    )
}
