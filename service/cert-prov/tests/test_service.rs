// Licensed under the Apache-2.0 license

#[cfg(test)]
mod common;

use std::io::Write;
use std::sync::Arc;

use cert_prov_service::builder::{AttestationInput, GetCertificateRequestBuilder};
use cert_prov_service::protocol::{
    response_tags, RequestType, StatusCode, COMMON_PROFILE, MSG_TYPE_GET_CERTIFICATE_REQUEST,
    MSG_TYPE_GET_CERTIFICATE_RESPONSE, MSG_TYPE_STATUS_REPORT, SECURITY_PROFILE,
};
use cert_prov_service::response::{OutboundMessage, StatusReport};
use cert_prov_service::service_sm::States;
use cert_prov_service::{
    CertProvService, InboundMessage, ServiceAuthority, ServiceConfig, ServiceError,
    ServicePolicy, TransportError,
};
use common::{signed_request, AttestationKey, Fixture, DEVICE_ID, SERVICE_CA_ID};
use mock_transport::{MockExchange, MockExchangeManager};
use weave_cert::{DecodeFlags, WeaveCertificate};
use weave_tlv::{context_tag, Tag, TlvError, TlvReader, TlvType};

const PEER: u64 = 0x18B4_3000_0000_0A01;

fn start(fx: &Fixture, policy: ServicePolicy) -> CertProvService<MockExchangeManager> {
    CertProvService::init(MockExchangeManager::default(), Arc::new(fx.authority(policy))).unwrap()
}

fn request(payload: Vec<u8>) -> InboundMessage {
    InboundMessage::new(SECURITY_PROFILE, MSG_TYPE_GET_CERTIFICATE_REQUEST, payload)
}

fn attested_initial_request(fx: &Fixture) -> Vec<u8> {
    let builder =
        GetCertificateRequestBuilder::new(RequestType::GetInitialOpDeviceCert, &fx.device_cert)
            .attestation(AttestationInput::WeaveCert {
                cert: &fx.attestation_cert,
                related: Vec::new(),
            });
    signed_request(
        &builder,
        &fx.device_key.key,
        AttestationKey::Weave(&fx.attestation_key.key),
    )
    .0
}

fn only_reply(exchange: &MockExchange) -> OutboundMessage {
    let sent = exchange.sent();
    assert_eq!(sent.len(), 1);
    sent.into_iter().next().unwrap()
}

fn status_of(reply: &OutboundMessage) -> u16 {
    assert_eq!(reply.profile_id, COMMON_PROFILE);
    assert_eq!(reply.msg_type, MSG_TYPE_STATUS_REPORT);
    let report = StatusReport::decode(&reply.payload).unwrap();
    assert_eq!(report.profile_id(), SECURITY_PROFILE);
    report.status_code()
}

/// Returns the issued certificate and, when present, the related certificate array.
fn decode_certificate_response(
    reply: &OutboundMessage,
) -> (WeaveCertificate, Option<WeaveCertificate>) {
    assert_eq!(reply.profile_id, SECURITY_PROFILE);
    assert_eq!(reply.msg_type, MSG_TYPE_GET_CERTIFICATE_RESPONSE);

    let mut reader = TlvReader::new(&reply.payload);
    reader
        .next_expect(TlvType::Structure, Tag::Anonymous)
        .unwrap();
    reader.enter_container().unwrap();
    reader
        .next_expect(
            TlvType::Structure,
            context_tag(response_tags::OP_DEVICE_CERT),
        )
        .unwrap();
    let cert = WeaveCertificate::decode(&mut reader, DecodeFlags::empty()).unwrap();

    let related = match reader.next() {
        Err(TlvError::EndOfTlv) => None,
        next => {
            next.unwrap();
            reader
                .expect(TlvType::Array, context_tag(response_tags::RELATED_CERTS))
                .unwrap();
            reader.enter_container().unwrap();
            reader.next().unwrap();
            let ca = WeaveCertificate::decode(&mut reader, DecodeFlags::empty()).unwrap();
            reader.verify_end_of_container().unwrap();
            reader.exit_container().unwrap();
            reader.verify_end_of_container().unwrap();
            Some(ca)
        }
    };
    (cert, related)
}

#[test]
fn test_initial_request_issues_certificate() {
    common::setup();
    let fx = Fixture::new();
    let service = start(&fx, ServicePolicy::default());
    let mut exchange = MockExchange::new(PEER);

    let state =
        service.handle_client_request(&mut exchange, request(attested_initial_request(&fx)));
    assert_eq!(state, States::Done);

    let (cert, related) = decode_certificate_response(&only_reply(&exchange));
    assert_eq!(cert.subject().id, DEVICE_ID);
    assert_eq!(cert.issuer().id, SERVICE_CA_ID);
    assert!(related.is_none());
}

#[test]
fn test_related_certs_included_when_configured() {
    common::setup();
    let fx = Fixture::new();
    let policy = ServicePolicy {
        include_related_certs: true,
        log_message_data: true,
        ..Default::default()
    };
    let service = start(&fx, policy);
    let mut exchange = MockExchange::new(PEER);

    let state =
        service.handle_client_request(&mut exchange, request(attested_initial_request(&fx)));
    assert_eq!(state, States::Done);

    let (_, related) = decode_certificate_response(&only_reply(&exchange));
    let related = related.unwrap();
    assert_eq!(related.subject().id, SERVICE_CA_ID);
    assert_eq!(related.tbs.public_key, fx.ca_key.public);
}

#[test]
fn test_missing_attestation_is_unauthorized() {
    common::setup();
    let fx = Fixture::new();
    let service = start(&fx, ServicePolicy::default());
    let mut exchange = MockExchange::new(PEER);

    let builder =
        GetCertificateRequestBuilder::new(RequestType::GetInitialOpDeviceCert, &fx.device_cert);
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    assert_eq!(
        service.handle_client_request(&mut exchange, request(msg)),
        States::Done
    );
    assert_eq!(
        status_of(&only_reply(&exchange)),
        u16::from(StatusCode::UnauthorizedGetCertRequest)
    );
}

#[test]
fn test_rotation_refused_by_policy() {
    common::setup();
    let fx = Fixture::new();
    let policy = ServicePolicy {
        refuse_rotation: true,
        ..Default::default()
    };
    let service = start(&fx, policy);
    let mut exchange = MockExchange::new(PEER);

    let builder =
        GetCertificateRequestBuilder::new(RequestType::RotateOpDeviceCert, &fx.device_cert);
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    assert_eq!(
        service.handle_client_request(&mut exchange, request(msg)),
        States::Done
    );
    assert_eq!(
        status_of(&only_reply(&exchange)),
        u16::from(StatusCode::NoNewCertRequired)
    );
}

#[test]
fn test_rotation_of_issued_certificate() {
    common::setup();
    let fx = Fixture::new();
    let service = start(&fx, ServicePolicy::default());

    let mut exchange = MockExchange::new(PEER);
    service.handle_client_request(&mut exchange, request(attested_initial_request(&fx)));
    let (issued, _) = decode_certificate_response(&only_reply(&exchange));

    let issued_tlv = issued.encoded().to_vec();
    let builder = GetCertificateRequestBuilder::new(RequestType::RotateOpDeviceCert, &issued_tlv);

    // Rotations are attested like any other request.
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);
    let mut exchange = MockExchange::new(PEER);
    assert_eq!(
        service.handle_client_request(&mut exchange, request(msg)),
        States::Done
    );
    assert_eq!(
        status_of(&only_reply(&exchange)),
        u16::from(StatusCode::UnauthorizedGetCertRequest)
    );

    let builder = builder.attestation(AttestationInput::WeaveCert {
        cert: &fx.attestation_cert,
        related: Vec::new(),
    });
    let (msg, _) = signed_request(
        &builder,
        &fx.device_key.key,
        AttestationKey::Weave(&fx.attestation_key.key),
    );
    let mut exchange = MockExchange::new(PEER);
    assert_eq!(
        service.handle_client_request(&mut exchange, request(msg)),
        States::Done
    );
    let (rotated, _) = decode_certificate_response(&only_reply(&exchange));
    assert_eq!(rotated.subject(), issued.subject());
    assert_ne!(rotated.tbs.serial_number, issued.tbs.serial_number);
}

#[test]
fn test_unexpected_message_is_unauthorized() {
    common::setup();
    let fx = Fixture::new();
    let service = start(&fx, ServicePolicy::default());

    let mut exchange = MockExchange::new(PEER);
    let message = InboundMessage::new(
        SECURITY_PROFILE,
        MSG_TYPE_GET_CERTIFICATE_RESPONSE,
        attested_initial_request(&fx),
    );
    assert_eq!(
        service.handle_client_request(&mut exchange, message),
        States::Done
    );
    assert_eq!(
        status_of(&only_reply(&exchange)),
        u16::from(StatusCode::UnauthorizedGetCertRequest)
    );

    let mut exchange = MockExchange::new(PEER);
    assert_eq!(
        service.handle_client_request(&mut exchange, request(vec![0x15, 0x24])),
        States::Done
    );
    assert_eq!(
        status_of(&only_reply(&exchange)),
        u16::from(StatusCode::UnauthorizedGetCertRequest)
    );
}

#[test]
fn test_closed_exchange_stays_responding() {
    common::setup();
    let fx = Fixture::new();
    let service = start(&fx, ServicePolicy::default());
    let mut exchange = MockExchange::closed(PEER);

    let state =
        service.handle_client_request(&mut exchange, request(attested_initial_request(&fx)));
    assert_eq!(state, States::Responding);
    assert!(exchange.sent().is_empty());
}

#[test]
fn test_registration_lifecycle() {
    common::setup();
    let fx = Fixture::new();
    let manager = MockExchangeManager::default();
    let authority = Arc::new(fx.authority(ServicePolicy::default()));

    let mut service = CertProvService::init(manager.clone(), authority.clone()).unwrap();
    assert_eq!(
        manager.registrations(),
        vec![(SECURITY_PROFILE, MSG_TYPE_GET_CERTIFICATE_REQUEST)]
    );

    assert!(matches!(
        CertProvService::init(manager.clone(), authority.clone()),
        Err(ServiceError::Transport(TransportError::AlreadyRegistered))
    ));

    service.shutdown();
    assert!(manager.registrations().is_empty());
    service.shutdown();

    let service = CertProvService::init(manager.clone(), authority).unwrap();
    assert_eq!(manager.registrations().len(), 1);
    drop(service);
    assert!(manager.registrations().is_empty());
}

#[test]
fn test_service_from_config_file() {
    common::setup();
    let fx = Fixture::new();
    let key_pem = fx.ca_key.key.private_key_to_pem().unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[authority]
certificate = "{}"
private_key_pem = """
{}"""

[trust]
weave_roots = ["{}"]

[authorization]
pairing_token = "{}"
pairing_init_data = "{}"

[policy]
attestation_required = false
"#,
        hex::encode(&fx.ca_cert),
        String::from_utf8(key_pem).unwrap(),
        hex::encode(&fx.attestation_root_cert),
        hex::encode(&fx.pairing_token),
        hex::encode(&fx.pairing_init_data),
    )
    .unwrap();

    let config = ServiceConfig::load(file.path()).unwrap();
    let authority = ServiceAuthority::from_config(&config).unwrap();
    assert!(!authority.policy().attestation_required);
    assert_eq!(authority.ca_cert().subject().id, SERVICE_CA_ID);
    assert_eq!(authority.operational_anchors().len(), 2);

    let service =
        CertProvService::init(MockExchangeManager::default(), Arc::new(authority)).unwrap();
    let builder =
        GetCertificateRequestBuilder::new(RequestType::GetInitialOpDeviceCert, &fx.device_cert)
            .pairing(&fx.pairing_token, Some(&fx.pairing_init_data));
    let (msg, _) = signed_request(&builder, &fx.device_key.key, AttestationKey::None);

    let mut exchange = MockExchange::new(PEER);
    assert_eq!(
        service.handle_client_request(&mut exchange, request(msg)),
        States::Done
    );
    let (cert, _) = decode_certificate_response(&only_reply(&exchange));
    assert_eq!(cert.subject().id, DEVICE_ID);
}

#[test]
fn test_config_rejects_mismatched_key() {
    common::setup();
    let fx = Fixture::new();
    let toml = format!(
        "[authority]\ncertificate = \"{}\"\nprivate_key_pem = \"\"\"\n{}\"\"\"\n",
        hex::encode(&fx.ca_cert),
        String::from_utf8(fx.device_key.key.private_key_to_pem().unwrap()).unwrap(),
    );
    let config = ServiceConfig::from_toml_str(&toml).unwrap();
    assert!(matches!(
        ServiceAuthority::from_config(&config),
        Err(cert_prov_service::ConfigError::KeyMismatch)
    ));
}
