// Licensed under the Apache-2.0 license

use log::debug;
use openssl::ec::EcKeyRef;
use openssl::pkey::Private;
use weave_tlv::{context_tag, TlvReader, TlvType, TlvWriter};

use crate::cert::TbsCertificate;
use crate::crypto::sign_ecdsa;
use crate::error::{CertificateError, CertificateResult};
use crate::tags::{ECDSA_SIGNATURE, WEAVE_CERTIFICATE_TAG};
use crate::types::SignatureAlgorithm;

/// Encodes `tbs` as a Weave certificate signed by `signing_key` and returns
/// the encoded length.
///
/// The TBS members are written first with an open signature structure after
/// them. That prefix is decoded again and transcoded to DER, and the SHA-256
/// of the DER is what gets signed. The signature members are then appended.
pub fn sign_certificate(
    tbs: &TbsCertificate,
    signing_key: &EcKeyRef<Private>,
    buf: &mut [u8],
) -> CertificateResult<usize> {
    if tbs.signature_algorithm != SignatureAlgorithm::EcdsaWithSha256 {
        return Err(CertificateError::UnsupportedSignatureAlgorithm(
            u8::from(tbs.signature_algorithm) as u64,
        ));
    }

    let mut writer = TlvWriter::new(buf);
    writer.start_container(WEAVE_CERTIFICATE_TAG, TlvType::Structure)?;
    tbs.encode(&mut writer)?;
    writer.start_container(context_tag(ECDSA_SIGNATURE), TlvType::Structure)?;

    let tbs_hash = {
        let mut reader = TlvReader::new(writer.written());
        reader.next_expect(TlvType::Structure, WEAVE_CERTIFICATE_TAG)?;
        reader.enter_container()?;
        TbsCertificate::decode(&mut reader)?.hash()
    };

    let signature = sign_ecdsa(signing_key, &tbs_hash)?;
    signature.encode_members(&mut writer)?;
    writer.end_container()?;
    writer.end_container()?;
    let len = writer.finalize()?;
    debug!("signed certificate for {} ({} bytes)", tbs.subject, len);
    Ok(len)
}
