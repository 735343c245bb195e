// Licensed under the Apache-2.0 license

use constant_time_eq::constant_time_eq;
use log::debug;
use weave_cert::crypto::verify_ecdsa;
use weave_cert::{validate_chain, KeyUsage, SignatureAlgorithm, ValidationContext};

use crate::config::{ServiceAuthority, TrustAnchors};
use crate::crypto::{validate_x509_chain, verify_hmac_sha256, verify_rsa_sha256};
use crate::error::ValidationError;
use crate::protocol::RequestType;
use crate::request::{Attestation, GetCertificateRequest, PairingAuthorization};

/// Checks a decoded request against the authority's trust anchors and
/// policy.
///
/// Authorization and certificate paths are checked before any request
/// signature, so an unauthorized client learns nothing about its
/// signatures.
pub fn validate_request(
    request: &GetCertificateRequest<'_>,
    authority: &ServiceAuthority,
) -> Result<(), ValidationError> {
    let trust = authority.trust();
    let policy = authority.policy();

    if let Some(pairing) = &request.pairing {
        check_pairing(pairing, trust)?;
    }

    let operational_ctx = ValidationContext {
        required_key_usages: KeyUsage::DIGITAL_SIGNATURE,
        max_depth: policy.max_cert_chain_len,
        allow_self_signed_leaf: request.request_type == RequestType::GetInitialOpDeviceCert,
        ..Default::default()
    };
    validate_chain(
        &request.operational_certs,
        authority.operational_anchors(),
        &operational_ctx,
    )
    .map_err(ValidationError::CertNotTrusted)?;

    if policy.attestation_required && !request.attestation.is_present() {
        return Err(ValidationError::AttestationRequired);
    }

    match &request.attestation {
        Attestation::None => {}
        Attestation::WeaveCert { certs, .. } => {
            let ctx = ValidationContext {
                required_key_usages: KeyUsage::DIGITAL_SIGNATURE,
                max_depth: policy.max_cert_chain_len,
                ..Default::default()
            };
            validate_chain(certs, &trust.weave_roots, &ctx)
                .map_err(ValidationError::CertNotTrusted)?;
        }
        Attestation::X509Cert { certs, .. } => {
            let root = trust
                .x509_root
                .as_deref()
                .ok_or(ValidationError::NotConfigured("X.509 attestation root"))?;
            validate_x509_chain(certs, root)?;
        }
        Attestation::Hmac {
            key_id, metadata, ..
        } => {
            let hmac = trust
                .hmac
                .as_ref()
                .ok_or(ValidationError::NotConfigured("HMAC attestation key"))?;
            if *key_id != hmac.key_id {
                return Err(ValidationError::HmacKeyIdMismatch(*key_id));
            }
            if let Some(metadata) = metadata {
                let expected = hmac.metadata.as_deref().unwrap_or_default();
                if !constant_time_eq(metadata, expected) {
                    return Err(ValidationError::HmacMetadataMismatch);
                }
            }
        }
    }

    let digest = request.tbs_hash();
    let op_cert = request.operational_cert();
    verify_ecdsa(
        op_cert.tbs.curve,
        &op_cert.tbs.public_key,
        &digest,
        &request.operational_signature,
    )
    .map_err(|_| ValidationError::InvalidSignature)?;

    match &request.attestation {
        Attestation::None => {}
        Attestation::WeaveCert {
            certs,
            sig_algo,
            signature,
        } => {
            require_algorithm(*sig_algo, SignatureAlgorithm::EcdsaWithSha256)?;
            let leaf = &certs.certs()[0];
            verify_ecdsa(leaf.tbs.curve, &leaf.tbs.public_key, &digest, signature)
                .map_err(|_| ValidationError::InvalidSignature)?;
        }
        Attestation::X509Cert {
            certs,
            sig_algo,
            signature,
        } => {
            require_algorithm(*sig_algo, SignatureAlgorithm::Sha256WithRsa)?;
            verify_rsa_sha256(certs[0], &digest, signature)?;
        }
        Attestation::Hmac { sig_algo, mac, .. } => {
            require_algorithm(*sig_algo, SignatureAlgorithm::HmacWithSha256)?;
            let hmac = trust
                .hmac
                .as_ref()
                .ok_or(ValidationError::NotConfigured("HMAC attestation key"))?;
            // The MAC covers the signed bytes themselves, not their digest.
            verify_hmac_sha256(&hmac.key, request.tbs_data(), mac)?;
        }
    }

    debug!(
        "Request from {} validated",
        request.operational_cert().subject()
    );
    Ok(())
}

fn check_pairing(
    pairing: &PairingAuthorization<'_>,
    trust: &TrustAnchors,
) -> Result<(), ValidationError> {
    let expected = trust
        .pairing
        .as_ref()
        .ok_or(ValidationError::AuthorizationMismatch)?;
    let init_data = pairing.init_data.unwrap_or_default();
    if constant_time_eq(pairing.token, &expected.token)
        && constant_time_eq(init_data, &expected.init_data)
    {
        Ok(())
    } else {
        Err(ValidationError::AuthorizationMismatch)
    }
}

fn require_algorithm(actual: u64, expected: SignatureAlgorithm) -> Result<(), ValidationError> {
    if actual == u8::from(expected) as u64 {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedAlgorithm(actual))
    }
}
