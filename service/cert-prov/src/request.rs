// Licensed under the Apache-2.0 license

//! Decoding of GetCertificateRequest messages.
//!
//! A request is an anonymous structure whose members appear in a fixed
//! order. The signed portion (TBS) runs from the request type up to the end
//! of the last element that precedes the operational signature algorithm.

use core::ops::Range;

use log::debug;
use sha2::{Digest, Sha256};
use weave_cert::{
    CertificateSet, DecodeFlags, EcdsaSignature, SignatureAlgorithm, WeaveCertificate,
};
use weave_tlv::{context_tag, Tag, TlvError, TlvReader, TlvType};

use crate::error::DecodeError;
use crate::protocol::request_tags::*;
use crate::protocol::RequestType;

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Default capacity of the certificate sets a request is decoded into.
pub const DEFAULT_MAX_CERTS: usize = 4;

/// Byte range of the signed portion within the inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TbsSpan {
    pub start: usize,
    pub len: usize,
}

impl TbsSpan {
    fn starting_at(start: usize) -> Self {
        Self { start, len: 0 }
    }

    fn extend_to(&mut self, end: usize) {
        self.len = end - self.start;
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingAuthorization<'a> {
    pub token: &'a [u8],
    pub init_data: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationKind {
    WeaveCert,
    X509Cert,
    Hmac,
}

/// Manufacturer attestation carried by a request, paired with its signature.
#[derive(Debug)]
pub enum Attestation<'a> {
    None,
    WeaveCert {
        certs: CertificateSet,
        sig_algo: u64,
        signature: EcdsaSignature,
    },
    X509Cert {
        /// DER certificates, leaf first.
        certs: Vec<&'a [u8]>,
        sig_algo: u64,
        signature: &'a [u8],
    },
    Hmac {
        key_id: u32,
        metadata: Option<&'a [u8]>,
        sig_algo: u64,
        mac: &'a [u8],
    },
}

impl Attestation<'_> {
    pub fn kind(&self) -> Option<AttestationKind> {
        match self {
            Attestation::None => None,
            Attestation::WeaveCert { .. } => Some(AttestationKind::WeaveCert),
            Attestation::X509Cert { .. } => Some(AttestationKind::X509Cert),
            Attestation::Hmac { .. } => Some(AttestationKind::Hmac),
        }
    }

    pub fn is_present(&self) -> bool {
        self.kind().is_some()
    }
}

/// Attestation elements seen before the signatures.
enum AttestationBlock<'a> {
    WeaveCert(CertificateSet),
    X509Cert(Vec<&'a [u8]>),
    Hmac {
        key_id: u32,
        metadata: Option<&'a [u8]>,
    },
}

enum AttestationSignature<'a> {
    Ecdsa(EcdsaSignature),
    Rsa(&'a [u8]),
    Hmac(&'a [u8]),
}

impl<'a> AttestationBlock<'a> {
    fn with_signature(
        self,
        sig_algo: u64,
        signature: AttestationSignature<'a>,
    ) -> DecodeResult<Attestation<'a>> {
        match (self, signature) {
            (AttestationBlock::WeaveCert(certs), AttestationSignature::Ecdsa(signature)) => {
                Ok(Attestation::WeaveCert {
                    certs,
                    sig_algo,
                    signature,
                })
            }
            (AttestationBlock::X509Cert(certs), AttestationSignature::Rsa(signature)) => {
                Ok(Attestation::X509Cert {
                    certs,
                    sig_algo,
                    signature,
                })
            }
            (AttestationBlock::Hmac { key_id, metadata }, AttestationSignature::Hmac(mac)) => {
                Ok(Attestation::Hmac {
                    key_id,
                    metadata,
                    sig_algo,
                    mac,
                })
            }
            _ => Err(DecodeError::AttestationSignatureMismatch),
        }
    }
}

type BlockDecoder =
    for<'a> fn(&mut TlvReader<'a>, &mut TbsSpan, usize) -> DecodeResult<AttestationBlock<'a>>;

type SignatureDecoder = for<'a> fn(&mut TlvReader<'a>) -> DecodeResult<AttestationSignature<'a>>;

struct BlockEntry {
    elem_type: TlvType,
    tag: u8,
    decode: BlockDecoder,
}

struct SignatureEntry {
    elem_type: TlvType,
    tag: u8,
    decode: SignatureDecoder,
}

/// First element of each attestation variant.
const ATTESTATION_BLOCKS: [BlockEntry; 3] = [
    BlockEntry {
        elem_type: TlvType::Structure,
        tag: MANUF_ATTEST_WEAVE_CERT,
        decode: decode_weave_attestation,
    },
    BlockEntry {
        elem_type: TlvType::ByteString,
        tag: MANUF_ATTEST_X509_CERT,
        decode: decode_x509_attestation,
    },
    BlockEntry {
        elem_type: TlvType::UnsignedInteger,
        tag: MANUF_ATTEST_HMAC_KEY_ID,
        decode: decode_hmac_attestation,
    },
];

const ATTESTATION_SIGNATURES: [SignatureEntry; 3] = [
    SignatureEntry {
        elem_type: TlvType::Structure,
        tag: MANUF_ATTEST_SIG_ECDSA,
        decode: decode_ecdsa_signature,
    },
    SignatureEntry {
        elem_type: TlvType::ByteString,
        tag: MANUF_ATTEST_SIG_RSA,
        decode: decode_rsa_signature,
    },
    SignatureEntry {
        elem_type: TlvType::ByteString,
        tag: MANUF_ATTEST_SIG_HMAC,
        decode: decode_hmac_signature,
    },
];

fn find_block(reader: &TlvReader<'_>) -> Option<&'static BlockEntry> {
    ATTESTATION_BLOCKS
        .iter()
        .find(|entry| reader.is(entry.elem_type, context_tag(entry.tag)))
}

fn find_signature(reader: &TlvReader<'_>) -> Option<&'static SignatureEntry> {
    ATTESTATION_SIGNATURES
        .iter()
        .find(|entry| reader.is(entry.elem_type, context_tag(entry.tag)))
}

/// Decoded GetCertificateRequest borrowing from the inbound message.
#[derive(Debug)]
pub struct GetCertificateRequest<'a> {
    pub request_type: RequestType,
    pub pairing: Option<PairingAuthorization<'a>>,
    /// Operational certificate followed by any related certificates.
    pub operational_certs: CertificateSet,
    pub operational_sig_algo: SignatureAlgorithm,
    pub operational_signature: EcdsaSignature,
    pub attestation: Attestation<'a>,
    pub tbs_span: TbsSpan,
    raw: &'a [u8],
}

impl<'a> GetCertificateRequest<'a> {
    /// Decodes `buf`, allowing at most `max_certs` certificates in each of
    /// the operational and attestation chains.
    pub fn decode(buf: &'a [u8], max_certs: usize) -> DecodeResult<Self> {
        let mut reader = TlvReader::new(buf);
        reader.next_expect(TlvType::Structure, Tag::Anonymous)?;
        reader.enter_container()?;

        let mut tbs = TbsSpan::starting_at(reader.read_point());
        reader.next_expect(TlvType::UnsignedInteger, context_tag(REQ_TYPE))?;
        let raw_type = reader.get_u64()?;
        let request_type = u8::try_from(raw_type)
            .ok()
            .and_then(|t| RequestType::try_from(t).ok())
            .ok_or(DecodeError::InvalidRequestType(raw_type))?;
        reader.next()?;

        let pairing = decode_pairing(&mut reader)?;

        reader.expect(TlvType::Structure, context_tag(OP_DEVICE_CERT))?;
        let mut operational_certs = CertificateSet::new(max_certs);
        operational_certs.load_cert(&mut reader, DecodeFlags::GENERATE_TBS_HASH)?;
        tbs.extend_to(reader.read_point());
        reader.next()?;

        if reader.is(TlvType::Array, context_tag(OP_RELATED_CERTS)) {
            if request_type == RequestType::GetInitialOpDeviceCert {
                return Err(DecodeError::RelatedCertsNotAllowed);
            }
            operational_certs.load_certs(&mut reader, DecodeFlags::GENERATE_TBS_HASH)?;
            tbs.extend_to(reader.read_point());
            reader.next()?;
        }

        let block = match find_block(&reader) {
            Some(entry) => Some((entry.decode)(&mut reader, &mut tbs, max_certs)?),
            None => None,
        };
        if find_block(&reader).is_some() {
            return Err(DecodeError::ConflictingAttestation);
        }

        reader.expect(TlvType::UnsignedInteger, context_tag(OP_DEVICE_SIG_ALGO))?;
        let algo_id = reader.get_u64()?;
        let operational_sig_algo = SignatureAlgorithm::from_id(algo_id)
            .ok()
            .filter(|algo| *algo == SignatureAlgorithm::EcdsaWithSha256)
            .ok_or(DecodeError::UnsupportedOperationalSigAlgo(algo_id))?;
        reader.next_expect(TlvType::Structure, context_tag(OP_DEVICE_SIG_ECDSA))?;
        let operational_signature = EcdsaSignature::decode(&mut reader)?;

        let attestation = match block {
            None => Attestation::None,
            Some(block) => {
                reader.next_expect(TlvType::UnsignedInteger, context_tag(MANUF_ATTEST_SIG_ALGO))?;
                let sig_algo = reader.get_u64()?;
                reader.next()?;
                let entry = find_signature(&reader).ok_or(TlvError::UnexpectedElement)?;
                let signature = (entry.decode)(&mut reader)?;
                block.with_signature(sig_algo, signature)?
            }
        };

        reader.verify_end_of_container()?;
        reader.exit_container()?;

        debug!(
            "Decoded {:?}: {} operational cert(s), attestation {:?}, TBS {:?}",
            request_type,
            operational_certs.len(),
            attestation.kind(),
            tbs.range()
        );

        Ok(Self {
            request_type,
            pairing,
            operational_certs,
            operational_sig_algo,
            operational_signature,
            attestation,
            tbs_span: tbs,
            raw: buf,
        })
    }

    /// The certificate whose key signed the request.
    pub fn operational_cert(&self) -> &WeaveCertificate {
        // Decoding fails unless the operational certificate was loaded first.
        &self.operational_certs.certs()[0]
    }

    /// The signed bytes, exactly as received.
    pub fn tbs_data(&self) -> &'a [u8] {
        &self.raw[self.tbs_span.range()]
    }

    pub fn tbs_hash(&self) -> [u8; 32] {
        Sha256::digest(self.tbs_data()).into()
    }
}

fn decode_pairing<'a>(reader: &mut TlvReader<'a>) -> DecodeResult<Option<PairingAuthorization<'a>>> {
    if !reader.is(TlvType::ByteString, context_tag(AUTHORIZE_PAIRING_TOKEN)) {
        return Ok(None);
    }
    let token = reader.get_bytes()?;
    reader.next()?;

    let init_data = if reader.is(TlvType::ByteString, context_tag(AUTHORIZE_PAIRING_INIT_DATA)) {
        let data = reader.get_bytes()?;
        reader.next()?;
        Some(data)
    } else {
        None
    };
    Ok(Some(PairingAuthorization { token, init_data }))
}

fn decode_weave_attestation<'a>(
    reader: &mut TlvReader<'a>,
    tbs: &mut TbsSpan,
    max_certs: usize,
) -> DecodeResult<AttestationBlock<'a>> {
    let mut certs = CertificateSet::new(max_certs);
    certs.load_cert(reader, DecodeFlags::GENERATE_TBS_HASH)?;
    tbs.extend_to(reader.read_point());
    reader.next()?;

    if reader.is(TlvType::Array, context_tag(MANUF_ATTEST_WEAVE_REL_CERTS)) {
        certs.load_certs(reader, DecodeFlags::GENERATE_TBS_HASH)?;
        tbs.extend_to(reader.read_point());
        reader.next()?;
    }
    Ok(AttestationBlock::WeaveCert(certs))
}

fn decode_x509_attestation<'a>(
    reader: &mut TlvReader<'a>,
    tbs: &mut TbsSpan,
    max_certs: usize,
) -> DecodeResult<AttestationBlock<'a>> {
    let mut certs = vec![reader.get_bytes()?];
    tbs.extend_to(reader.read_point());
    reader.next()?;

    if reader.is(TlvType::Array, context_tag(MANUF_ATTEST_X509_REL_CERTS)) {
        reader.enter_container()?;
        loop {
            match reader.next() {
                Err(TlvError::EndOfTlv) => break,
                other => other?,
            }
            if certs.len() >= max_certs {
                return Err(DecodeError::TooManyCertificates);
            }
            certs.push(reader.get_bytes()?);
        }
        reader.exit_container()?;
        tbs.extend_to(reader.read_point());
        reader.next()?;
    }
    Ok(AttestationBlock::X509Cert(certs))
}

fn decode_hmac_attestation<'a>(
    reader: &mut TlvReader<'a>,
    tbs: &mut TbsSpan,
    _max_certs: usize,
) -> DecodeResult<AttestationBlock<'a>> {
    let key_id = reader.get_u32()?;
    tbs.extend_to(reader.read_point());
    reader.next()?;

    let metadata = if reader.is(TlvType::ByteString, context_tag(MANUF_ATTEST_HMAC_META_DATA)) {
        let metadata = reader.get_bytes()?;
        tbs.extend_to(reader.read_point());
        reader.next()?;
        Some(metadata)
    } else {
        None
    };
    Ok(AttestationBlock::Hmac { key_id, metadata })
}

fn decode_ecdsa_signature<'a>(
    reader: &mut TlvReader<'a>,
) -> DecodeResult<AttestationSignature<'a>> {
    Ok(AttestationSignature::Ecdsa(EcdsaSignature::decode(reader)?))
}

fn decode_rsa_signature<'a>(reader: &mut TlvReader<'a>) -> DecodeResult<AttestationSignature<'a>> {
    Ok(AttestationSignature::Rsa(reader.get_bytes()?))
}

fn decode_hmac_signature<'a>(
    reader: &mut TlvReader<'a>,
) -> DecodeResult<AttestationSignature<'a>> {
    Ok(AttestationSignature::Hmac(reader.get_bytes()?))
}
