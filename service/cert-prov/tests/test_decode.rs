// Licensed under the Apache-2.0 license

#[cfg(test)]
mod common;

use cert_prov_service::builder::{
    AttestationInput, AttestationSignatureValue, AttestationSigned, GetCertificateRequestBuilder,
    RequestSignatures,
};
use cert_prov_service::protocol::{request_tags, RequestType, MAX_MESSAGE_SIZE};
use cert_prov_service::request::{Attestation, DEFAULT_MAX_CERTS};
use cert_prov_service::{DecodeError, GetCertificateRequest};
use common::{signed_request, AttestationKey, Fixture, DEVICE_ID, HMAC_KEY_ID};
use sha2::{Digest, Sha256};
use weave_cert::crypto::sign_ecdsa;
use weave_tlv::{context_tag, Tag, TlvType, TlvWriter};

#[test]
fn test_tbs_span_matches_builder() {
    common::setup();
    let fx = Fixture::new();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    )
    .pairing(&fx.pairing_token, Some(&fx.pairing_init_data))
    .attestation(AttestationInput::WeaveCert {
        cert: &fx.attestation_cert,
        related: vec![fx.attestation_root_cert.as_slice()],
    });
    let (msg, span) = signed_request(
        &builder,
        &fx.device_key.key,
        AttestationKey::Weave(&fx.attestation_key.key),
    );

    let request = GetCertificateRequest::decode(&msg, DEFAULT_MAX_CERTS).unwrap();
    assert_eq!(request.tbs_span, span);
    assert_eq!(request.tbs_data(), &msg[span.range()]);
    let digest: [u8; 32] = Sha256::digest(&msg[span.range()]).into();
    assert_eq!(request.tbs_hash(), digest);

    // The span starts at the request type, right after the outer structure's control byte.
    assert_eq!(span.start, 1);
    assert_eq!(request.request_type, RequestType::GetInitialOpDeviceCert);
    let pairing = request.pairing.unwrap();
    assert_eq!(pairing.token, fx.pairing_token.as_slice());
    assert_eq!(pairing.init_data, Some(fx.pairing_init_data.as_slice()));
    assert_eq!(request.operational_cert().subject().id, DEVICE_ID);
    match &request.attestation {
        Attestation::WeaveCert { certs, sig_algo, .. } => {
            assert_eq!(certs.len(), 2);
            assert_eq!(*sig_algo, 5);
        }
        other => panic!("unexpected attestation {:?}", other),
    }
}

#[test]
fn test_tbs_span_ends_after_hmac_metadata() {
    common::setup();
    let fx = Fixture::new();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    )
    .attestation(AttestationInput::Hmac {
        key_id: HMAC_KEY_ID,
        metadata: Some(&fx.hmac_metadata),
    });
    let (msg, span) = signed_request(
        &builder,
        &fx.device_key.key,
        AttestationKey::Hmac(&fx.hmac_key),
    );

    let request = GetCertificateRequest::decode(&msg, DEFAULT_MAX_CERTS).unwrap();
    assert_eq!(request.tbs_span, span);
    assert!(request.tbs_data().ends_with(&fx.hmac_metadata));
    match request.attestation {
        Attestation::Hmac {
            key_id, metadata, ..
        } => {
            assert_eq!(key_id, HMAC_KEY_ID);
            assert_eq!(metadata, Some(fx.hmac_metadata.as_slice()));
        }
        other => panic!("unexpected attestation {:?}", other),
    }
}

#[test]
fn test_x509_related_certs_in_tbs() {
    common::setup();
    let fx = Fixture::new();
    let leaf = fx.x509.chained_leaf.to_der().unwrap();
    let intermediate = fx.x509.intermediate.to_der().unwrap();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    )
    .attestation(AttestationInput::X509Cert {
        cert: &leaf,
        related: vec![intermediate.as_slice()],
    });
    let (msg, span) = signed_request(
        &builder,
        &fx.device_key.key,
        AttestationKey::Rsa(&fx.x509.leaf_key),
    );

    let request = GetCertificateRequest::decode(&msg, DEFAULT_MAX_CERTS).unwrap();
    assert_eq!(request.tbs_span, span);
    // The signed region closes after the related-certs array.
    let tbs = request.tbs_data();
    assert_eq!(tbs.last(), Some(&0x18));
    assert!(tbs[..tbs.len() - 1].ends_with(&intermediate));
    match request.attestation {
        Attestation::X509Cert { certs, .. } => {
            assert_eq!(certs, vec![leaf.as_slice(), intermediate.as_slice()]);
        }
        other => panic!("unexpected attestation {:?}", other),
    }
}

#[test]
fn test_related_certs_rejected_on_initial_request() {
    common::setup();
    let fx = Fixture::new();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    )
    .operational_related(vec![fx.ca_cert.as_slice()]);
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    assert!(matches!(
        GetCertificateRequest::decode(&msg, DEFAULT_MAX_CERTS),
        Err(DecodeError::RelatedCertsNotAllowed)
    ));
}

#[test]
fn test_related_certs_accepted_on_rotation() {
    common::setup();
    let fx = Fixture::new();
    let builder =
        GetCertificateRequestBuilder::new(RequestType::RotateOpDeviceCert, &fx.device_cert)
            .operational_related(vec![fx.ca_cert.as_slice()]);
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    let request = GetCertificateRequest::decode(&msg, DEFAULT_MAX_CERTS).unwrap();
    assert_eq!(request.operational_certs.len(), 2);
    assert!(!request.attestation.is_present());
}

#[test]
fn test_conflicting_attestation_rejected() {
    common::setup();
    let fx = Fixture::new();
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    let mut writer = TlvWriter::new(&mut buf);
    writer
        .start_container(Tag::Anonymous, TlvType::Structure)
        .unwrap();
    writer
        .put_u64(context_tag(request_tags::REQ_TYPE), 1)
        .unwrap();
    writer
        .copy_container(context_tag(request_tags::OP_DEVICE_CERT), &fx.device_cert)
        .unwrap();
    writer
        .copy_container(
            context_tag(request_tags::MANUF_ATTEST_WEAVE_CERT),
            &fx.attestation_cert,
        )
        .unwrap();
    writer
        .put_u64(
            context_tag(request_tags::MANUF_ATTEST_HMAC_KEY_ID),
            HMAC_KEY_ID as u64,
        )
        .unwrap();
    writer.end_container().unwrap();
    let len = writer.finalize().unwrap();

    assert!(matches!(
        GetCertificateRequest::decode(&buf[..len], DEFAULT_MAX_CERTS),
        Err(DecodeError::ConflictingAttestation)
    ));
}

#[test]
fn test_attestation_signature_must_match_kind() {
    common::setup();
    let fx = Fixture::new();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    )
    .attestation(AttestationInput::Hmac {
        key_id: HMAC_KEY_ID,
        metadata: None,
    });
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    let (len, _) = builder
        .build(&mut buf, |payload| {
            Ok(RequestSignatures {
                operational: sign_ecdsa(&fx.device_key.key, &payload.digest)?,
                attestation: Some(AttestationSigned {
                    algorithm: 5,
                    value: AttestationSignatureValue::Ecdsa(sign_ecdsa(
                        &fx.attestation_key.key,
                        &payload.digest,
                    )?),
                }),
            })
        })
        .unwrap();

    assert!(matches!(
        GetCertificateRequest::decode(&buf[..len], DEFAULT_MAX_CERTS),
        Err(DecodeError::AttestationSignatureMismatch)
    ));
}

#[test]
fn test_operational_signature_algorithm_checked() {
    common::setup();
    let fx = Fixture::new();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    )
    .operational_sig_algo(4);
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    assert!(matches!(
        GetCertificateRequest::decode(&msg, DEFAULT_MAX_CERTS),
        Err(DecodeError::UnsupportedOperationalSigAlgo(4))
    ));
}

#[test]
fn test_truncated_request_is_malformed() {
    common::setup();
    let fx = Fixture::new();
    let builder = GetCertificateRequestBuilder::new(
        RequestType::GetInitialOpDeviceCert,
        &fx.device_cert,
    );
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    let err = GetCertificateRequest::decode(&msg[..msg.len() - 3], DEFAULT_MAX_CERTS).unwrap_err();
    assert!(err.is_malformed());
}

#[test]
fn test_certificate_capacity_enforced() {
    common::setup();
    let fx = Fixture::new();
    let builder =
        GetCertificateRequestBuilder::new(RequestType::RotateOpDeviceCert, &fx.device_cert)
            .operational_related(vec![fx.ca_cert.as_slice(), fx.attestation_root_cert.as_slice()]);
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    assert!(GetCertificateRequest::decode(&msg, 3).is_ok());
    assert!(matches!(
        GetCertificateRequest::decode(&msg, 2),
        Err(DecodeError::TooManyCertificates)
    ));
}
