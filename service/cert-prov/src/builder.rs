// Licensed under the Apache-2.0 license

//! Client-side construction of GetCertificateRequest messages.

use sha2::{Digest, Sha256};
use weave_cert::{EcdsaSignature, SignatureAlgorithm};
use weave_tlv::{context_tag, Tag, TlvType, TlvWriter};

use crate::error::BuildError;
use crate::protocol::request_tags::*;
use crate::protocol::RequestType;
use crate::request::TbsSpan;

/// Attestation elements to place in the signed portion of a request.
/// Certificates are passed fully encoded; Weave certificates may carry any
/// tag since they are re-tagged when copied.
#[derive(Debug, Clone)]
pub enum AttestationInput<'b> {
    None,
    WeaveCert {
        cert: &'b [u8],
        related: Vec<&'b [u8]>,
    },
    X509Cert {
        cert: &'b [u8],
        related: Vec<&'b [u8]>,
    },
    Hmac {
        key_id: u32,
        metadata: Option<&'b [u8]>,
    },
}

#[derive(Debug, Clone)]
pub enum AttestationSignatureValue {
    Ecdsa(EcdsaSignature),
    Rsa(Vec<u8>),
    Hmac(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct AttestationSigned {
    pub algorithm: u64,
    pub value: AttestationSignatureValue,
}

/// Signatures produced by the caller over the signed portion.
#[derive(Debug, Clone)]
pub struct RequestSignatures {
    pub operational: EcdsaSignature,
    pub attestation: Option<AttestationSigned>,
}

/// What the signer callback gets to sign.
pub struct SignedPayload<'t> {
    pub tbs: &'t [u8],
    /// SHA-256 of `tbs`.
    pub digest: [u8; 32],
}

pub struct GetCertificateRequestBuilder<'b> {
    request_type: RequestType,
    pairing: Option<(&'b [u8], Option<&'b [u8]>)>,
    operational_cert: &'b [u8],
    operational_related: Vec<&'b [u8]>,
    attestation: AttestationInput<'b>,
    operational_sig_algo: u64,
}

impl<'b> GetCertificateRequestBuilder<'b> {
    pub fn new(request_type: RequestType, operational_cert: &'b [u8]) -> Self {
        Self {
            request_type,
            pairing: None,
            operational_cert,
            operational_related: Vec::new(),
            attestation: AttestationInput::None,
            operational_sig_algo: u8::from(SignatureAlgorithm::EcdsaWithSha256) as u64,
        }
    }

    pub fn pairing(mut self, token: &'b [u8], init_data: Option<&'b [u8]>) -> Self {
        self.pairing = Some((token, init_data));
        self
    }

    pub fn operational_related(mut self, certs: Vec<&'b [u8]>) -> Self {
        self.operational_related = certs;
        self
    }

    pub fn attestation(mut self, attestation: AttestationInput<'b>) -> Self {
        self.attestation = attestation;
        self
    }

    /// Overrides the algorithm id written ahead of the operational signature.
    pub fn operational_sig_algo(mut self, algo: u64) -> Self {
        self.operational_sig_algo = algo;
        self
    }

    /// Encodes the request into `buf`.
    ///
    /// # Arguments
    ///
    /// * `buf` - Destination buffer for the encoded message.
    /// * `sign` - Called once with the signed portion after it has been written.
    ///
    /// # Returns
    ///
    /// The encoded length and the position of the signed portion within `buf`.
    pub fn build<F>(&self, buf: &mut [u8], sign: F) -> Result<(usize, TbsSpan), BuildError>
    where
        F: FnOnce(&SignedPayload<'_>) -> Result<RequestSignatures, BuildError>,
    {
        let mut writer = TlvWriter::new(buf);
        writer.start_container(Tag::Anonymous, TlvType::Structure)?;
        let start = writer.len();

        writer.put_u64(
            context_tag(REQ_TYPE),
            u8::from(self.request_type) as u64,
        )?;
        if let Some((token, init_data)) = self.pairing {
            writer.put_bytes(context_tag(AUTHORIZE_PAIRING_TOKEN), token)?;
            if let Some(init_data) = init_data {
                writer.put_bytes(context_tag(AUTHORIZE_PAIRING_INIT_DATA), init_data)?;
            }
        }

        writer.copy_container(context_tag(OP_DEVICE_CERT), self.operational_cert)?;
        if !self.operational_related.is_empty() {
            writer.start_container(context_tag(OP_RELATED_CERTS), TlvType::Array)?;
            for cert in &self.operational_related {
                writer.copy_container(Tag::Anonymous, cert)?;
            }
            writer.end_container()?;
        }

        match &self.attestation {
            AttestationInput::None => {}
            AttestationInput::WeaveCert { cert, related } => {
                writer.copy_container(context_tag(MANUF_ATTEST_WEAVE_CERT), cert)?;
                if !related.is_empty() {
                    writer.start_container(
                        context_tag(MANUF_ATTEST_WEAVE_REL_CERTS),
                        TlvType::Array,
                    )?;
                    for cert in related {
                        writer.copy_container(Tag::Anonymous, cert)?;
                    }
                    writer.end_container()?;
                }
            }
            AttestationInput::X509Cert { cert, related } => {
                writer.put_bytes(context_tag(MANUF_ATTEST_X509_CERT), cert)?;
                if !related.is_empty() {
                    writer.start_container(
                        context_tag(MANUF_ATTEST_X509_REL_CERTS),
                        TlvType::Array,
                    )?;
                    for cert in related {
                        writer.put_bytes(Tag::Anonymous, cert)?;
                    }
                    writer.end_container()?;
                }
            }
            AttestationInput::Hmac { key_id, metadata } => {
                writer.put_u64(context_tag(MANUF_ATTEST_HMAC_KEY_ID), *key_id as u64)?;
                if let Some(metadata) = metadata {
                    writer.put_bytes(context_tag(MANUF_ATTEST_HMAC_META_DATA), metadata)?;
                }
            }
        }

        let span = TbsSpan {
            start,
            len: writer.len() - start,
        };
        let signatures = {
            let tbs = &writer.written()[span.range()];
            sign(&SignedPayload {
                tbs,
                digest: Sha256::digest(tbs).into(),
            })?
        };

        writer.put_u64(context_tag(OP_DEVICE_SIG_ALGO), self.operational_sig_algo)?;
        signatures
            .operational
            .encode(&mut writer, context_tag(OP_DEVICE_SIG_ECDSA))?;

        if let Some(attestation) = signatures.attestation {
            writer.put_u64(context_tag(MANUF_ATTEST_SIG_ALGO), attestation.algorithm)?;
            match attestation.value {
                AttestationSignatureValue::Ecdsa(sig) => {
                    sig.encode(&mut writer, context_tag(MANUF_ATTEST_SIG_ECDSA))?
                }
                AttestationSignatureValue::Rsa(sig) => {
                    writer.put_bytes(context_tag(MANUF_ATTEST_SIG_RSA), &sig)?
                }
                AttestationSignatureValue::Hmac(mac) => {
                    writer.put_bytes(context_tag(MANUF_ATTEST_SIG_HMAC), &mac)?
                }
            }
        }

        writer.end_container()?;
        Ok((writer.finalize()?, span))
    }
}
