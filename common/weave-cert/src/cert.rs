// Licensed under the Apache-2.0 license

use bitflags::bitflags;
use sha2::{Digest, Sha256};
use weave_tlv::{context_tag, TlvError, TlvReader, TlvResult, TlvType, TlvWriter, Tag};

use crate::der::{context_constructed, context_primitive, DerWriter, DER_INTEGER_TAG};
use crate::dn::DistinguishedName;
use crate::error::{CertificateError, CertificateResult};
use crate::tags::*;
use crate::time::der_encode_time;
use crate::types::{
    CurveId, KeyPurpose, KeyUsage, PublicKeyAlgorithm, SignatureAlgorithm, EC_PUBLIC_KEY_OID,
};

pub const TBS_HASH_LEN: usize = 32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DecodeFlags: u8 {
        /// Compute the TBS hash while decoding.
        const GENERATE_TBS_HASH = 0x01;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentifier {
    pub critical: bool,
    pub id: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUsageExtension {
    pub critical: bool,
    pub usages: KeyUsage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicConstraints {
    pub critical: bool,
    pub is_ca: bool,
    pub path_len: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub critical: bool,
    pub purposes: Vec<KeyPurpose>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    AuthorityKeyId(KeyIdentifier),
    SubjectKeyId(KeyIdentifier),
    KeyUsage(KeyUsageExtension),
    BasicConstraints(BasicConstraints),
    ExtendedKeyUsage(ExtendedKeyUsage),
}

/// Iterates the members of the extension structure the reader is positioned
/// on. Returns the value of the `critical` member.
fn decode_members(
    reader: &mut TlvReader<'_>,
    mut on_member: impl FnMut(&mut TlvReader<'_>, u8) -> CertificateResult<()>,
) -> CertificateResult<bool> {
    reader.enter_container()?;
    let mut critical = false;
    loop {
        match reader.next() {
            Err(TlvError::EndOfTlv) => break,
            other => other?,
        }
        let tag = reader
            .tag()
            .and_then(|t| t.context_number())
            .ok_or(TlvError::UnexpectedElement)?;
        if tag == EXTENSION_CRITICAL {
            critical = reader.get_bool()?;
        } else {
            on_member(reader, tag)?;
        }
    }
    reader.exit_container()?;
    Ok(critical)
}

fn decode_key_id(reader: &mut TlvReader<'_>) -> CertificateResult<KeyIdentifier> {
    let mut id = None;
    let critical = decode_members(reader, |r, tag| match tag {
        KEY_IDENTIFIER => {
            id = Some(r.get_bytes()?.to_vec());
            Ok(())
        }
        _ => Err(TlvError::UnexpectedElement.into()),
    })?;
    Ok(KeyIdentifier {
        critical,
        id: id.ok_or(TlvError::UnexpectedElement)?,
    })
}

impl Extension {
    fn decode(reader: &mut TlvReader<'_>) -> CertificateResult<Self> {
        if reader.element_type() != Some(TlvType::Structure) {
            return Err(TlvError::WrongType.into());
        }
        let tag = reader
            .tag()
            .and_then(|t| t.context_number())
            .ok_or(TlvError::UnexpectedElement)?;
        match tag {
            AUTHORITY_KEY_IDENTIFIER => Ok(Extension::AuthorityKeyId(decode_key_id(reader)?)),
            SUBJECT_KEY_IDENTIFIER => Ok(Extension::SubjectKeyId(decode_key_id(reader)?)),
            KEY_USAGE => {
                let mut usages = KeyUsage::empty();
                let critical = decode_members(reader, |r, tag| match tag {
                    KEY_USAGE_FLAGS => {
                        usages = KeyUsage::from_bits_truncate(r.get_u16()?);
                        Ok(())
                    }
                    _ => Err(TlvError::UnexpectedElement.into()),
                })?;
                Ok(Extension::KeyUsage(KeyUsageExtension { critical, usages }))
            }
            BASIC_CONSTRAINTS => {
                let mut is_ca = false;
                let mut path_len = None;
                let critical = decode_members(reader, |r, tag| match tag {
                    BASIC_CONSTRAINTS_IS_CA => {
                        is_ca = r.get_bool()?;
                        Ok(())
                    }
                    BASIC_CONSTRAINTS_PATH_LEN => {
                        path_len = Some(r.get_u8()?);
                        Ok(())
                    }
                    _ => Err(TlvError::UnexpectedElement.into()),
                })?;
                Ok(Extension::BasicConstraints(BasicConstraints {
                    critical,
                    is_ca,
                    path_len,
                }))
            }
            EXTENDED_KEY_USAGE => {
                let mut purposes = Vec::new();
                let critical = decode_members(reader, |r, tag| match tag {
                    KEY_PURPOSES => {
                        r.enter_container()?;
                        loop {
                            match r.next() {
                                Err(TlvError::EndOfTlv) => break,
                                other => other?,
                            }
                            purposes.push(KeyPurpose::from_id(r.get_u64()?)?);
                        }
                        r.exit_container()?;
                        Ok(())
                    }
                    _ => Err(TlvError::UnexpectedElement.into()),
                })?;
                Ok(Extension::ExtendedKeyUsage(ExtendedKeyUsage {
                    critical,
                    purposes,
                }))
            }
            _ => Err(TlvError::UnexpectedElement.into()),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Extension::AuthorityKeyId(_) => AUTHORITY_KEY_IDENTIFIER,
            Extension::SubjectKeyId(_) => SUBJECT_KEY_IDENTIFIER,
            Extension::KeyUsage(_) => KEY_USAGE,
            Extension::BasicConstraints(_) => BASIC_CONSTRAINTS,
            Extension::ExtendedKeyUsage(_) => EXTENDED_KEY_USAGE,
        }
    }

    pub fn is_critical(&self) -> bool {
        match self {
            Extension::AuthorityKeyId(e) | Extension::SubjectKeyId(e) => e.critical,
            Extension::KeyUsage(e) => e.critical,
            Extension::BasicConstraints(e) => e.critical,
            Extension::ExtendedKeyUsage(e) => e.critical,
        }
    }

    fn encode(&self, writer: &mut TlvWriter<'_>) -> TlvResult<()> {
        writer.start_container(context_tag(self.tag()), TlvType::Structure)?;
        if self.is_critical() {
            writer.put_bool(context_tag(EXTENSION_CRITICAL), true)?;
        }
        match self {
            Extension::AuthorityKeyId(e) | Extension::SubjectKeyId(e) => {
                writer.put_bytes(context_tag(KEY_IDENTIFIER), &e.id)?;
            }
            Extension::KeyUsage(e) => {
                writer.put_u64(context_tag(KEY_USAGE_FLAGS), e.usages.bits() as u64)?;
            }
            Extension::BasicConstraints(e) => {
                if e.is_ca {
                    writer.put_bool(context_tag(BASIC_CONSTRAINTS_IS_CA), true)?;
                }
                if let Some(len) = e.path_len {
                    writer.put_u64(context_tag(BASIC_CONSTRAINTS_PATH_LEN), len as u64)?;
                }
            }
            Extension::ExtendedKeyUsage(e) => {
                writer.start_container(context_tag(KEY_PURPOSES), TlvType::Array)?;
                for purpose in &e.purposes {
                    writer.put_u64(Tag::Anonymous, u8::from(*purpose) as u64)?;
                }
                writer.end_container()?;
            }
        }
        writer.end_container()
    }

    fn oid(&self) -> &'static [u64] {
        match self {
            Extension::AuthorityKeyId(_) => &[2, 5, 29, 35],
            Extension::SubjectKeyId(_) => &[2, 5, 29, 14],
            Extension::KeyUsage(_) => &[2, 5, 29, 15],
            Extension::BasicConstraints(_) => &[2, 5, 29, 19],
            Extension::ExtendedKeyUsage(_) => &[2, 5, 29, 37],
        }
    }

    fn der_encode(&self, der: &mut DerWriter) {
        let mut value = DerWriter::new();
        match self {
            Extension::AuthorityKeyId(e) => {
                value.sequence(|akid| akid.tlv(context_primitive(0), &e.id));
            }
            Extension::SubjectKeyId(e) => value.octet_string(&e.id),
            Extension::KeyUsage(e) => {
                let (unused, bits) = key_usage_bits(e.usages);
                value.bit_string(unused, &bits);
            }
            Extension::BasicConstraints(e) => value.sequence(|bc| {
                if e.is_ca {
                    bc.boolean(true);
                }
                if let Some(len) = e.path_len {
                    bc.small_uint(len as u64);
                }
            }),
            Extension::ExtendedKeyUsage(e) => value.sequence(|eku| {
                for purpose in &e.purposes {
                    eku.oid(&purpose.oid());
                }
            }),
        }
        let value = value.into_bytes();
        der.sequence(|ext| {
            ext.oid(self.oid());
            if self.is_critical() {
                ext.boolean(true);
            }
            ext.octet_string(&value);
        });
    }
}

/// KeyUsage as a DER BIT STRING: bit 0 is the most significant bit of the
/// first octet, and trailing zero bits are dropped.
fn key_usage_bits(usages: KeyUsage) -> (u8, Vec<u8>) {
    let flags = usages.bits();
    let bit_len = (u16::BITS - flags.leading_zeros()) as usize;
    let mut out = vec![0u8; bit_len.div_ceil(8)];
    for i in 0..bit_len {
        if flags & (1 << i) != 0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    ((out.len() * 8 - bit_len) as u8, out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl EcdsaSignature {
    /// Decodes the `{ r, s }` structure the reader is positioned on.
    pub fn decode(reader: &mut TlvReader<'_>) -> CertificateResult<Self> {
        if reader.element_type() != Some(TlvType::Structure) {
            return Err(TlvError::WrongType.into());
        }
        reader.enter_container()?;
        reader.next_expect(TlvType::ByteString, context_tag(ECDSA_SIGNATURE_R))?;
        let r = reader.get_bytes()?.to_vec();
        reader.next_expect(TlvType::ByteString, context_tag(ECDSA_SIGNATURE_S))?;
        let s = reader.get_bytes()?.to_vec();
        reader.verify_end_of_container()?;
        reader.exit_container()?;
        Ok(Self { r, s })
    }

    pub fn encode(&self, writer: &mut TlvWriter<'_>, tag: Tag) -> TlvResult<()> {
        writer.start_container(tag, TlvType::Structure)?;
        self.encode_members(writer)?;
        writer.end_container()
    }

    pub(crate) fn encode_members(&self, writer: &mut TlvWriter<'_>) -> TlvResult<()> {
        writer.put_bytes(context_tag(ECDSA_SIGNATURE_R), &self.r)?;
        writer.put_bytes(context_tag(ECDSA_SIGNATURE_S), &self.s)
    }
}

/// Signed portion of a Weave certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub not_before: u32,
    pub not_after: u32,
    pub subject: DistinguishedName,
    pub public_key_algorithm: PublicKeyAlgorithm,
    pub curve: CurveId,
    pub public_key: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl TbsCertificate {
    /// Decodes the TBS members from inside a certificate structure. On return
    /// the reader is positioned on the signature element.
    pub fn decode(reader: &mut TlvReader<'_>) -> CertificateResult<Self> {
        reader.next_expect(TlvType::ByteString, context_tag(SERIAL_NUMBER))?;
        let serial_number = reader.get_bytes()?.to_vec();

        reader.next_expect(TlvType::UnsignedInteger, context_tag(SIGNATURE_ALGORITHM))?;
        let signature_algorithm = SignatureAlgorithm::from_id(reader.get_u64()?)?;

        reader.next_expect(TlvType::Path, context_tag(ISSUER))?;
        let issuer = DistinguishedName::decode(reader)?;

        reader.next_expect(TlvType::UnsignedInteger, context_tag(NOT_BEFORE))?;
        let not_before = reader.get_u32()?;
        reader.next_expect(TlvType::UnsignedInteger, context_tag(NOT_AFTER))?;
        let not_after = reader.get_u32()?;

        reader.next_expect(TlvType::Path, context_tag(SUBJECT))?;
        let subject = DistinguishedName::decode(reader)?;

        reader.next_expect(TlvType::UnsignedInteger, context_tag(PUBLIC_KEY_ALGORITHM))?;
        let algo_id = reader.get_u64()?;
        let public_key_algorithm = PublicKeyAlgorithm::from_id(algo_id)?;
        if public_key_algorithm != PublicKeyAlgorithm::Ec {
            return Err(CertificateError::UnsupportedPublicKeyAlgorithm(algo_id));
        }

        reader.next_expect(
            TlvType::UnsignedInteger,
            context_tag(ELLIPTIC_CURVE_IDENTIFIER),
        )?;
        let curve = CurveId::from_id(reader.get_u64()?)?;

        reader.next_expect(TlvType::ByteString, context_tag(ELLIPTIC_CURVE_PUBLIC_KEY))?;
        let public_key = reader.get_bytes()?.to_vec();

        let mut extensions = Vec::new();
        loop {
            reader.next()?;
            if reader.tag() == Some(context_tag(ECDSA_SIGNATURE)) {
                break;
            }
            extensions.push(Extension::decode(reader)?);
        }

        Ok(Self {
            serial_number,
            signature_algorithm,
            issuer,
            not_before,
            not_after,
            subject,
            public_key_algorithm,
            curve,
            public_key,
            extensions,
        })
    }

    /// Writes the TBS members into an open certificate structure.
    pub fn encode(&self, writer: &mut TlvWriter<'_>) -> TlvResult<()> {
        writer.put_bytes(context_tag(SERIAL_NUMBER), &self.serial_number)?;
        writer.put_u64(
            context_tag(SIGNATURE_ALGORITHM),
            u8::from(self.signature_algorithm) as u64,
        )?;
        self.issuer.encode(writer, context_tag(ISSUER))?;
        writer.put_u64(context_tag(NOT_BEFORE), self.not_before as u64)?;
        writer.put_u64(context_tag(NOT_AFTER), self.not_after as u64)?;
        self.subject.encode(writer, context_tag(SUBJECT))?;
        writer.put_u64(
            context_tag(PUBLIC_KEY_ALGORITHM),
            u8::from(self.public_key_algorithm) as u64,
        )?;
        writer.put_u64(
            context_tag(ELLIPTIC_CURVE_IDENTIFIER),
            u32::from(self.curve) as u64,
        )?;
        writer.put_bytes(context_tag(ELLIPTIC_CURVE_PUBLIC_KEY), &self.public_key)?;
        for ext in &self.extensions {
            ext.encode(writer)?;
        }
        Ok(())
    }

    /// Canonical DER encoding of the equivalent X.509 v3 TBSCertificate.
    pub fn to_der(&self) -> Vec<u8> {
        let mut der = DerWriter::new();
        der.sequence(|tbs| {
            tbs.nested(context_constructed(0), |version| version.small_uint(2));
            // Serial numbers are carried verbatim as INTEGER content.
            tbs.tlv(DER_INTEGER_TAG, &self.serial_number);
            tbs.sequence(|alg| {
                alg.oid(self.signature_algorithm.oid());
                if self.signature_algorithm.has_null_params() {
                    alg.null();
                }
            });
            self.issuer.der_encode(tbs);
            tbs.sequence(|validity| {
                der_encode_time(self.not_before, validity);
                der_encode_time(self.not_after, validity);
            });
            self.subject.der_encode(tbs);
            tbs.sequence(|spki| {
                spki.sequence(|alg| {
                    alg.oid(EC_PUBLIC_KEY_OID);
                    alg.oid(self.curve.oid());
                });
                spki.bit_string(0, &self.public_key);
            });
            if !self.extensions.is_empty() {
                tbs.nested(context_constructed(3), |wrapper| {
                    wrapper.sequence(|exts| {
                        for ext in &self.extensions {
                            ext.der_encode(exts);
                        }
                    })
                });
            }
        });
        der.into_bytes()
    }

    pub fn hash(&self) -> [u8; TBS_HASH_LEN] {
        Sha256::digest(self.to_der()).into()
    }

    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.extensions.iter().find_map(|e| match e {
            Extension::SubjectKeyId(k) => Some(k.id.as_slice()),
            _ => None,
        })
    }

    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.extensions.iter().find_map(|e| match e {
            Extension::AuthorityKeyId(k) => Some(k.id.as_slice()),
            _ => None,
        })
    }

    pub fn basic_constraints(&self) -> Option<&BasicConstraints> {
        self.extensions.iter().find_map(|e| match e {
            Extension::BasicConstraints(bc) => Some(bc),
            _ => None,
        })
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.extensions.iter().find_map(|e| match e {
            Extension::KeyUsage(ku) => Some(ku.usages),
            _ => None,
        })
    }

    pub fn key_purposes(&self) -> Option<&[KeyPurpose]> {
        self.extensions.iter().find_map(|e| match e {
            Extension::ExtendedKeyUsage(eku) => Some(eku.purposes.as_slice()),
            _ => None,
        })
    }
}

/// Decoded Weave certificate together with its original encoding.
#[derive(Debug, Clone)]
pub struct WeaveCertificate {
    pub tbs: TbsCertificate,
    pub signature: EcdsaSignature,
    encoded: Vec<u8>,
    tbs_hash: Option<[u8; TBS_HASH_LEN]>,
}

impl WeaveCertificate {
    /// Decodes the certificate structure the reader is positioned on. The
    /// structure's own tag is not checked.
    pub fn decode(reader: &mut TlvReader<'_>, flags: DecodeFlags) -> CertificateResult<Self> {
        if reader.element_type() != Some(TlvType::Structure) {
            return Err(TlvError::WrongType.into());
        }
        let start = reader.element_offset().ok_or(TlvError::UnexpectedElement)?;
        reader.enter_container()?;
        let tbs = TbsCertificate::decode(reader)?;
        let signature = EcdsaSignature::decode(reader)?;
        reader.verify_end_of_container()?;
        reader.exit_container()?;

        let encoded = reader.buffer()[start..reader.read_point()].to_vec();
        let tbs_hash = flags
            .contains(DecodeFlags::GENERATE_TBS_HASH)
            .then(|| tbs.hash());
        Ok(Self {
            tbs,
            signature,
            encoded,
            tbs_hash,
        })
    }

    /// Decodes a standalone certificate carrying the Security profile tag.
    pub fn from_tlv(bytes: &[u8]) -> CertificateResult<Self> {
        let mut reader = TlvReader::new(bytes);
        reader.next_expect(TlvType::Structure, WEAVE_CERTIFICATE_TAG)?;
        Self::decode(&mut reader, DecodeFlags::GENERATE_TBS_HASH)
    }

    /// TLV encoding exactly as it appeared in the input.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn tbs_hash(&self) -> [u8; TBS_HASH_LEN] {
        self.tbs_hash.unwrap_or_else(|| self.tbs.hash())
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.tbs.subject
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.tbs.issuer
    }

    pub fn is_ca(&self) -> bool {
        self.tbs.basic_constraints().is_some_and(|bc| bc.is_ca)
    }

    pub fn is_self_signed(&self) -> bool {
        if self.tbs.issuer != self.tbs.subject {
            return false;
        }
        match (self.tbs.authority_key_id(), self.tbs.subject_key_id()) {
            (Some(akid), Some(skid)) => akid == skid,
            _ => true,
        }
    }
}
