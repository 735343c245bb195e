// Licensed under the Apache-2.0 license

use log::info;
use weave_cert::crypto::key_id;
use weave_cert::{
    sign_certificate, BasicConstraints, CertTime, ExtendedKeyUsage, Extension, KeyIdentifier,
    KeyPurpose, KeyUsage, KeyUsageExtension, PublicKeyAlgorithm, SignatureAlgorithm,
    TbsCertificate, WeaveCertificate,
};

use crate::config::ServiceAuthority;
use crate::error::IssuanceError;
use crate::protocol::MAX_CERT_SIZE;

/// Start of the validity period of every issued certificate.
pub const ISSUED_NOT_BEFORE: CertTime = CertTime::new(2019, 8, 1, 14, 11, 54);
pub const ISSUED_VALIDITY_YEARS: u16 = 10;
pub const SERIAL_NUMBER_LEN: usize = 8;

/// Mints service-signed operational certificates.
pub struct CertificateIssuer<'s> {
    authority: &'s ServiceAuthority,
}

impl<'s> CertificateIssuer<'s> {
    pub fn new(authority: &'s ServiceAuthority) -> Self {
        Self { authority }
    }

    /// Issues a certificate for the subject and public key of `subject_cert`
    /// and returns its TLV encoding.
    pub fn issue(&self, subject_cert: &WeaveCertificate) -> Result<Vec<u8>, IssuanceError> {
        let mut buf = vec![0u8; MAX_CERT_SIZE];
        let len = self.issue_into(subject_cert, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    pub fn issue_into(
        &self,
        subject_cert: &WeaveCertificate,
        buf: &mut [u8],
    ) -> Result<usize, IssuanceError> {
        let tbs = self.build_tbs(subject_cert)?;
        let len = sign_certificate(&tbs, self.authority.ca_key(), buf)?;
        info!(
            "Issued certificate for {} serial {}",
            tbs.subject,
            hex::encode(&tbs.serial_number)
        );
        Ok(len)
    }

    fn build_tbs(&self, subject_cert: &WeaveCertificate) -> Result<TbsCertificate, IssuanceError> {
        let ca = self.authority.ca_cert();
        let subject_key_id = subject_cert
            .tbs
            .subject_key_id()
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| key_id(&subject_cert.tbs.public_key));
        let authority_key_id = ca
            .tbs
            .subject_key_id()
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| key_id(&ca.tbs.public_key));

        Ok(TbsCertificate {
            serial_number: random_serial_number()?,
            signature_algorithm: SignatureAlgorithm::EcdsaWithSha256,
            issuer: *ca.subject(),
            not_before: ISSUED_NOT_BEFORE.pack(),
            not_after: ISSUED_NOT_BEFORE
                .with_years_added(ISSUED_VALIDITY_YEARS)
                .pack(),
            subject: *subject_cert.subject(),
            public_key_algorithm: PublicKeyAlgorithm::Ec,
            curve: subject_cert.tbs.curve,
            public_key: subject_cert.tbs.public_key.clone(),
            extensions: vec![
                Extension::BasicConstraints(BasicConstraints {
                    critical: true,
                    is_ca: false,
                    path_len: None,
                }),
                Extension::KeyUsage(KeyUsageExtension {
                    critical: true,
                    usages: KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT,
                }),
                Extension::ExtendedKeyUsage(ExtendedKeyUsage {
                    critical: true,
                    purposes: vec![KeyPurpose::ClientAuth, KeyPurpose::ServerAuth],
                }),
                Extension::SubjectKeyId(KeyIdentifier {
                    critical: false,
                    id: subject_key_id,
                }),
                Extension::AuthorityKeyId(KeyIdentifier {
                    critical: false,
                    id: authority_key_id,
                }),
            ],
        })
    }
}

/// Random positive serial number of fixed encoded length.
pub fn random_serial_number() -> Result<Vec<u8>, IssuanceError> {
    let mut serial = vec![0u8; SERIAL_NUMBER_LEN];
    openssl::rand::rand_bytes(&mut serial)?;
    serial[0] = (serial[0] & 0x7F) | 0x40;
    Ok(serial)
}
