// Licensed under the Apache-2.0 license

//! Minimal DER encoder used to rebuild the X.509 TBSCertificate that a Weave
//! certificate's signature covers.

pub(crate) const DER_BOOLEAN_TAG: u8 = 0x01;
pub(crate) const DER_INTEGER_TAG: u8 = 0x02;
pub(crate) const DER_BIT_STRING_TAG: u8 = 0x03;
pub(crate) const DER_OCTET_STRING_TAG: u8 = 0x04;
pub(crate) const DER_NULL_TAG: u8 = 0x05;
pub(crate) const DER_OID_TAG: u8 = 0x06;
pub(crate) const DER_UTF8_STRING_TAG: u8 = 0x0C;
pub(crate) const DER_UTC_TIME_TAG: u8 = 0x17;
pub(crate) const DER_GENERALIZED_TIME_TAG: u8 = 0x18;
pub(crate) const DER_SEQUENCE_TAG: u8 = 0x30;
pub(crate) const DER_SET_TAG: u8 = 0x31;

pub(crate) const fn context_constructed(n: u8) -> u8 {
    0xA0 | n
}

pub(crate) const fn context_primitive(n: u8) -> u8 {
    0x80 | n
}

fn trim_leading_zeros(val: &[u8]) -> &[u8] {
    match val.iter().position(|b| *b != 0) {
        Some(i) => &val[i..],
        // All zero (or empty) encodes as a single zero octet.
        None => &[0],
    }
}

pub(crate) fn der_encode_len(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let be = len.to_be_bytes();
        let bytes = trim_leading_zeros(&be);
        out.push(0x80 | bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
}

#[derive(Default)]
pub(crate) struct DerWriter {
    buf: Vec<u8>,
}

impl DerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn tlv(&mut self, tag: u8, content: &[u8]) {
        self.buf.push(tag);
        der_encode_len(content.len(), &mut self.buf);
        self.buf.extend_from_slice(content);
    }

    /// Encodes a constructed element whose content is produced by `f`.
    pub fn nested(&mut self, tag: u8, f: impl FnOnce(&mut DerWriter)) {
        let mut inner = DerWriter::new();
        f(&mut inner);
        self.tlv(tag, &inner.buf);
    }

    pub fn sequence(&mut self, f: impl FnOnce(&mut DerWriter)) {
        self.nested(DER_SEQUENCE_TAG, f)
    }

    /// Unsigned big-endian integer, with a leading zero when the top bit is set.
    pub fn uint(&mut self, val: &[u8]) {
        let trimmed = trim_leading_zeros(val);
        let mut content = Vec::with_capacity(trimmed.len() + 1);
        if trimmed[0] & 0x80 != 0 {
            content.push(0);
        }
        content.extend_from_slice(trimmed);
        self.tlv(DER_INTEGER_TAG, &content);
    }

    pub fn small_uint(&mut self, val: u64) {
        self.uint(&val.to_be_bytes());
    }

    pub fn boolean(&mut self, val: bool) {
        self.tlv(DER_BOOLEAN_TAG, &[if val { 0xFF } else { 0x00 }]);
    }

    pub fn null(&mut self) {
        self.tlv(DER_NULL_TAG, &[]);
    }

    pub fn oid(&mut self, arcs: &[u64]) {
        self.tlv(DER_OID_TAG, &encode_oid(arcs));
    }

    pub fn octet_string(&mut self, val: &[u8]) {
        self.tlv(DER_OCTET_STRING_TAG, val);
    }

    pub fn bit_string(&mut self, unused_bits: u8, val: &[u8]) {
        let mut content = Vec::with_capacity(val.len() + 1);
        content.push(unused_bits);
        content.extend_from_slice(val);
        self.tlv(DER_BIT_STRING_TAG, &content);
    }

    pub fn utf8_string(&mut self, val: &str) {
        self.tlv(DER_UTF8_STRING_TAG, val.as_bytes());
    }
}

fn push_base128(mut val: u64, out: &mut Vec<u8>) {
    let mut tmp = [0u8; 10];
    let mut n = 0;
    loop {
        tmp[n] = (val & 0x7F) as u8;
        n += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        out.push(if i == 0 { tmp[i] } else { tmp[i] | 0x80 });
    }
}

pub(crate) fn encode_oid(arcs: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    if let [first, second, rest @ ..] = arcs {
        push_base128(first * 40 + second, &mut out);
        for arc in rest {
            push_base128(*arc, &mut out);
        }
    }
    out
}
