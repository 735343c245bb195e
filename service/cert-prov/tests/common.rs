// Licensed under the Apache-2.0 license

#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use cert_prov_service::builder::{
    AttestationSignatureValue, AttestationSigned, GetCertificateRequestBuilder, RequestSignatures,
};
use cert_prov_service::config::{ExpectedPairing, HmacSettings};
use cert_prov_service::crypto::hmac_sha256;
use cert_prov_service::protocol::MAX_MESSAGE_SIZE;
use cert_prov_service::request::TbsSpan;
use cert_prov_service::{ServiceAuthority, ServicePolicy, TrustAnchors};
use log::LevelFilter;
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints as X509BasicConstraints, KeyUsage as X509KeyUsage};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use rand::Rng;
use simple_logger::SimpleLogger;
use weave_cert::crypto::{ec_public_key_bytes, key_id, sign_ecdsa};
use weave_cert::{
    sign_certificate, BasicConstraints, CertTime, CurveId, DistinguishedName, Extension,
    KeyIdentifier, KeyUsage, KeyUsageExtension, PublicKeyAlgorithm, SignatureAlgorithm,
    TbsCertificate, WeaveCertificate, WeaveIdKind,
};
use zeroize::Zeroizing;

pub const DEVICE_ID: u64 = 0x18B4_3000_0000_0A01;
pub const SERVICE_CA_ID: u64 = 0x18B4_3002_0000_0001;
pub const ATTESTATION_ROOT_ID: u64 = 0x18B4_3002_0000_0A00;
pub const HMAC_KEY_ID: u32 = 0x0000_C0DE;

pub fn setup() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

pub struct TestKey {
    pub key: EcKey<Private>,
    pub public: Vec<u8>,
    pub key_id: Vec<u8>,
}

impl TestKey {
    pub fn generate() -> Self {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = EcKey::generate(&group).unwrap();
        let public = ec_public_key_bytes(&key).unwrap();
        let key_id = key_id(&public);
        Self {
            key,
            public,
            key_id,
        }
    }
}

/// Signs a Weave certificate for `subject_key` with `issuer_key`.
pub fn make_weave_cert(
    subject: DistinguishedName,
    issuer: DistinguishedName,
    subject_key: &TestKey,
    issuer_key: &TestKey,
    is_ca: bool,
) -> Vec<u8> {
    let usages = if is_ca {
        KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN
    } else {
        KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT
    };
    let serial: [u8; 8] = rand::thread_rng().gen();
    let tbs = TbsCertificate {
        serial_number: vec![0x40 | (serial[0] & 0x3F), serial[1], serial[2], serial[3]],
        signature_algorithm: SignatureAlgorithm::EcdsaWithSha256,
        issuer,
        not_before: CertTime::new(2019, 1, 1, 0, 0, 0).pack(),
        not_after: CertTime::new(2049, 1, 1, 0, 0, 0).pack(),
        subject,
        public_key_algorithm: PublicKeyAlgorithm::Ec,
        curve: CurveId::Prime256v1,
        public_key: subject_key.public.clone(),
        extensions: vec![
            Extension::BasicConstraints(BasicConstraints {
                critical: true,
                is_ca,
                path_len: None,
            }),
            Extension::KeyUsage(KeyUsageExtension {
                critical: true,
                usages,
            }),
            Extension::SubjectKeyId(KeyIdentifier {
                critical: false,
                id: subject_key.key_id.clone(),
            }),
            Extension::AuthorityKeyId(KeyIdentifier {
                critical: false,
                id: issuer_key.key_id.clone(),
            }),
        ],
    };
    let mut buf = vec![0u8; 1024];
    let len = sign_certificate(&tbs, &issuer_key.key, &mut buf).unwrap();
    buf.truncate(len);
    buf
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

const YEAR_SECS: i64 = 365 * 24 * 3600;

/// Builds an RSA X.509 certificate valid between the given offsets (in
/// years) from now.
pub fn x509_cert(
    common_name: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    is_ca: bool,
    valid_from_years: i64,
    valid_until_years: i64,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(63, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&Asn1Integer::from_bn(&serial).unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((issuer_cert, _)) => builder.set_issuer_name(issuer_cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    let now = unix_now();
    builder
        .set_not_before(&Asn1Time::from_unix(now + valid_from_years * YEAR_SECS).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(now + valid_until_years * YEAR_SECS).unwrap())
        .unwrap();
    if is_ca {
        builder
            .append_extension(X509BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                X509KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        builder
            .append_extension(X509BasicConstraints::new().critical().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                X509KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }
    let signing_key = issuer.map(|(_, k)| k).unwrap_or(key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

pub fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

/// RSA attestation root with leaves of various validity.
pub struct X509Fixture {
    pub root_key: PKey<Private>,
    pub root: X509,
    pub leaf_key: PKey<Private>,
    pub leaf: X509,
    pub expired_leaf: X509,
    pub future_leaf: X509,
    pub intermediate: X509,
    /// Leaf issued by `intermediate` rather than the root.
    pub chained_leaf: X509,
}

impl X509Fixture {
    pub fn new() -> Self {
        let root_key = rsa_key();
        let root = x509_cert("Attestation Root", &root_key, None, true, -1, 20);
        let leaf_key = rsa_key();
        let issuer = Some((&root, &root_key));
        let leaf = x509_cert("Device", &leaf_key, issuer, false, -1, 10);
        let expired_leaf = x509_cert("Device", &leaf_key, issuer, false, -3, -1);
        let future_leaf = x509_cert("Device", &leaf_key, issuer, false, 1, 3);
        let intermediate_key = rsa_key();
        let intermediate = x509_cert("Intermediate", &intermediate_key, issuer, true, -1, 15);
        let chained_leaf = x509_cert(
            "Device",
            &leaf_key,
            Some((&intermediate, &intermediate_key)),
            false,
            -1,
            10,
        );
        Self {
            root_key,
            root,
            leaf_key,
            leaf,
            expired_leaf,
            future_leaf,
            intermediate,
            chained_leaf,
        }
    }
}

/// Key material for a service CA, one device and its manufacturer
/// attestation credentials.
pub struct Fixture {
    pub device_dn: DistinguishedName,
    pub ca_dn: DistinguishedName,
    pub ca_key: TestKey,
    pub ca_cert: Vec<u8>,
    pub device_key: TestKey,
    /// Self-signed operational certificate.
    pub device_cert: Vec<u8>,
    pub attestation_root_key: TestKey,
    pub attestation_root_cert: Vec<u8>,
    pub attestation_key: TestKey,
    pub attestation_cert: Vec<u8>,
    pub x509: X509Fixture,
    pub hmac_key: Vec<u8>,
    pub hmac_metadata: Vec<u8>,
    pub pairing_token: Vec<u8>,
    pub pairing_init_data: Vec<u8>,
}

impl Fixture {
    pub fn new() -> Self {
        let device_dn = DistinguishedName::new(WeaveIdKind::DeviceId, DEVICE_ID);
        let ca_dn = DistinguishedName::new(WeaveIdKind::CaId, SERVICE_CA_ID);
        let attestation_dn = DistinguishedName::new(WeaveIdKind::CaId, ATTESTATION_ROOT_ID);

        let ca_key = TestKey::generate();
        let ca_cert = make_weave_cert(ca_dn, ca_dn, &ca_key, &ca_key, true);
        let device_key = TestKey::generate();
        let device_cert = make_weave_cert(device_dn, device_dn, &device_key, &device_key, false);

        let attestation_root_key = TestKey::generate();
        let attestation_root_cert = make_weave_cert(
            attestation_dn,
            attestation_dn,
            &attestation_root_key,
            &attestation_root_key,
            true,
        );
        let attestation_key = TestKey::generate();
        let attestation_cert = make_weave_cert(
            device_dn,
            attestation_dn,
            &attestation_key,
            &attestation_root_key,
            false,
        );

        let mut rng = rand::thread_rng();
        Self {
            device_dn,
            ca_dn,
            ca_key,
            ca_cert,
            device_key,
            device_cert,
            attestation_root_key,
            attestation_root_cert,
            attestation_key,
            attestation_cert,
            x509: X509Fixture::new(),
            hmac_key: (0..32).map(|_| rng.gen()).collect(),
            hmac_metadata: b"factory-line-7".to_vec(),
            pairing_token: (0..16).map(|_| rng.gen()).collect(),
            pairing_init_data: b"pairing-init".to_vec(),
        }
    }

    pub fn trust_anchors(&self) -> TrustAnchors {
        TrustAnchors {
            weave_roots: vec![WeaveCertificate::from_tlv(&self.attestation_root_cert).unwrap()],
            x509_root: Some(self.x509.root.to_der().unwrap()),
            pairing: Some(ExpectedPairing {
                token: Zeroizing::new(self.pairing_token.clone()),
                init_data: Zeroizing::new(self.pairing_init_data.clone()),
            }),
            hmac: Some(HmacSettings {
                key_id: HMAC_KEY_ID,
                key: Zeroizing::new(self.hmac_key.clone()),
                metadata: Some(self.hmac_metadata.clone()),
            }),
        }
    }

    pub fn authority(&self, policy: ServicePolicy) -> ServiceAuthority {
        ServiceAuthority::new(
            WeaveCertificate::from_tlv(&self.ca_cert).unwrap(),
            self.ca_key.key.clone(),
            self.trust_anchors(),
            policy,
        )
        .unwrap()
    }
}

pub fn policy_without_attestation() -> ServicePolicy {
    ServicePolicy {
        attestation_required: false,
        ..Default::default()
    }
}

/// How the attestation signature of a request is produced.
pub enum AttestationKey<'k> {
    None,
    Weave(&'k EcKey<Private>),
    Rsa(&'k PKey<Private>),
    Hmac(&'k [u8]),
}

/// Builds a request signed with `operational_key` and the given attestation key.
pub fn signed_request(
    builder: &GetCertificateRequestBuilder<'_>,
    operational_key: &EcKey<Private>,
    attestation_key: AttestationKey<'_>,
) -> (Vec<u8>, TbsSpan) {
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    let (len, span) = builder
        .build(&mut buf, |payload| {
            let operational = sign_ecdsa(operational_key, &payload.digest)?;
            let attestation = match attestation_key {
                AttestationKey::None => None,
                AttestationKey::Weave(key) => Some(AttestationSigned {
                    algorithm: u8::from(SignatureAlgorithm::EcdsaWithSha256) as u64,
                    value: AttestationSignatureValue::Ecdsa(sign_ecdsa(key, &payload.digest)?),
                }),
                AttestationKey::Rsa(key) => {
                    let mut signer = Signer::new(MessageDigest::sha256(), key)?;
                    signer.update(payload.tbs)?;
                    Some(AttestationSigned {
                        algorithm: u8::from(SignatureAlgorithm::Sha256WithRsa) as u64,
                        value: AttestationSignatureValue::Rsa(signer.sign_to_vec()?),
                    })
                }
                AttestationKey::Hmac(key) => Some(AttestationSigned {
                    algorithm: u8::from(SignatureAlgorithm::HmacWithSha256) as u64,
                    value: AttestationSignatureValue::Hmac(hmac_sha256(key, payload.tbs).unwrap()),
                }),
            };
            Ok(RequestSignatures {
                operational,
                attestation,
            })
        })
        .unwrap();
    buf.truncate(len);
    (buf, span)
}
