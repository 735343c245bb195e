// Licensed under the Apache-2.0 license

use log::debug;
use weave_tlv::{TlvError, TlvReader, TlvType};

use crate::cert::{DecodeFlags, WeaveCertificate};
use crate::dn::DistinguishedName;
use crate::error::{CertificateError, CertificateResult};

/// Bounded collection of decoded certificates. The first certificate loaded
/// is treated as the leaf.
#[derive(Debug, Clone)]
pub struct CertificateSet {
    certs: Vec<WeaveCertificate>,
    max_certs: usize,
}

impl CertificateSet {
    pub fn new(max_certs: usize) -> Self {
        Self {
            certs: Vec::with_capacity(max_certs),
            max_certs,
        }
    }

    /// Decodes the certificate structure the reader is positioned on.
    pub fn load_cert(
        &mut self,
        reader: &mut TlvReader<'_>,
        flags: DecodeFlags,
    ) -> CertificateResult<&WeaveCertificate> {
        if self.certs.len() >= self.max_certs {
            return Err(CertificateError::TooManyCertificates);
        }
        let cert = WeaveCertificate::decode(reader, flags)?;
        debug!(
            "Loaded certificate subject {} issuer {}",
            cert.subject(),
            cert.issuer()
        );
        self.certs.push(cert);
        Ok(&self.certs[self.certs.len() - 1])
    }

    /// Loads either a single certificate structure or an array of them.
    pub fn load_certs(
        &mut self,
        reader: &mut TlvReader<'_>,
        flags: DecodeFlags,
    ) -> CertificateResult<()> {
        match reader.element_type() {
            Some(TlvType::Structure) => self.load_cert(reader, flags).map(|_| ()),
            Some(TlvType::Array) => {
                reader.enter_container()?;
                loop {
                    match reader.next() {
                        Err(TlvError::EndOfTlv) => break,
                        other => other?,
                    }
                    self.load_cert(reader, flags)?;
                }
                reader.exit_container()?;
                Ok(())
            }
            _ => Err(TlvError::WrongType.into()),
        }
    }

    pub fn add(&mut self, cert: WeaveCertificate) -> CertificateResult<()> {
        if self.certs.len() >= self.max_certs {
            return Err(CertificateError::TooManyCertificates);
        }
        self.certs.push(cert);
        Ok(())
    }

    pub fn leaf(&self) -> Option<&WeaveCertificate> {
        self.certs.first()
    }

    pub fn certs(&self) -> &[WeaveCertificate] {
        &self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn find_by_subject(
        &self,
        subject: &DistinguishedName,
        key_id: Option<&[u8]>,
    ) -> Option<&WeaveCertificate> {
        self.certs.iter().find(|c| {
            c.subject() == subject
                && key_id.map_or(true, |id| c.tbs.subject_key_id() == Some(id))
        })
    }
}
