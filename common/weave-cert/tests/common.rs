// Licensed under the Apache-2.0 license

#![allow(dead_code)]

use log::LevelFilter;
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::Private;
use simple_logger::SimpleLogger;
use weave_cert::crypto::{ec_public_key_bytes, key_id};
use weave_cert::{
    sign_certificate, BasicConstraints, CertTime, CurveId, DistinguishedName, ExtendedKeyUsage,
    Extension, KeyIdentifier, KeyPurpose, KeyUsage, KeyUsageExtension, PublicKeyAlgorithm,
    SignatureAlgorithm, TbsCertificate, WeaveCertificate,
};

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

pub struct CertOptions {
    pub is_ca: bool,
    pub path_len: Option<u8>,
    pub not_before: u32,
    pub not_after: u32,
    pub usages: KeyUsage,
    pub purposes: Vec<KeyPurpose>,
    pub serial: Vec<u8>,
}

impl CertOptions {
    pub fn ca() -> Self {
        Self {
            is_ca: true,
            usages: KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN,
            purposes: Vec::new(),
            ..Self::leaf()
        }
    }

    pub fn leaf() -> Self {
        Self {
            is_ca: false,
            path_len: None,
            not_before: CertTime::new(2019, 1, 1, 0, 0, 0).pack(),
            not_after: CertTime::new(2039, 1, 1, 0, 0, 0).pack(),
            usages: KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT,
            purposes: vec![KeyPurpose::ClientAuth, KeyPurpose::ServerAuth],
            serial: vec![0x01, 0x02, 0x03, 0x04],
        }
    }
}

pub fn build_tbs(
    subject: DistinguishedName,
    issuer: DistinguishedName,
    subject_key: &TestKey,
    issuer_key: &TestKey,
    opts: &CertOptions,
) -> TbsCertificate {
    let mut extensions = vec![
        Extension::BasicConstraints(BasicConstraints {
            critical: true,
            is_ca: opts.is_ca,
            path_len: opts.path_len,
        }),
        Extension::KeyUsage(KeyUsageExtension {
            critical: true,
            usages: opts.usages,
        }),
    ];
    if !opts.purposes.is_empty() {
        extensions.push(Extension::ExtendedKeyUsage(ExtendedKeyUsage {
            critical: true,
            purposes: opts.purposes.clone(),
        }));
    }
    extensions.push(Extension::SubjectKeyId(KeyIdentifier {
        critical: false,
        id: subject_key.key_id.clone(),
    }));
    extensions.push(Extension::AuthorityKeyId(KeyIdentifier {
        critical: false,
        id: issuer_key.key_id.clone(),
    }));

    TbsCertificate {
        serial_number: opts.serial.clone(),
        signature_algorithm: SignatureAlgorithm::EcdsaWithSha256,
        issuer,
        not_before: opts.not_before,
        not_after: opts.not_after,
        subject,
        public_key_algorithm: PublicKeyAlgorithm::Ec,
        curve: CurveId::Prime256v1,
        public_key: subject_key.public.clone(),
        extensions,
    }
}

pub fn encode_cert(tbs: &TbsCertificate, issuer_key: &TestKey) -> Vec<u8> {
    let mut buf = vec![0u8; 1024];
    let len = sign_certificate(tbs, &issuer_key.key, &mut buf).unwrap();
    buf.truncate(len);
    buf
}

pub fn make_cert(
    subject: DistinguishedName,
    issuer: DistinguishedName,
    subject_key: &TestKey,
    issuer_key: &TestKey,
    opts: &CertOptions,
) -> WeaveCertificate {
    let tbs = build_tbs(subject, issuer, subject_key, issuer_key, opts);
    WeaveCertificate::from_tlv(&encode_cert(&tbs, issuer_key)).unwrap()
}
