// Licensed under the Apache-2.0 license

use crate::error::{TlvError, TlvResult};
use crate::reader::TlvReader;
use crate::tag::Tag;
use crate::types::{ElementType, TlvType};

/// Encodes TLV elements into a caller-supplied buffer.
///
/// Integers and length prefixes always use the narrowest width that holds the
/// value. A failed write leaves the buffer contents up to `len()` untouched.
pub struct TlvWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    containers: Vec<TlvType>,
}

impl<'a> TlvWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            containers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes encoded so far, including any still-open container heads.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn put_u64(&mut self, tag: Tag, value: u64) -> TlvResult<()> {
        let elem_type = ElementType::for_unsigned(value);
        let bytes = value.to_le_bytes();
        self.write_element(tag, elem_type, &bytes[..elem_type.field_size()], &[])
    }

    pub fn put_i64(&mut self, tag: Tag, value: i64) -> TlvResult<()> {
        let elem_type = ElementType::for_signed(value);
        let bytes = value.to_le_bytes();
        self.write_element(tag, elem_type, &bytes[..elem_type.field_size()], &[])
    }

    pub fn put_bool(&mut self, tag: Tag, value: bool) -> TlvResult<()> {
        let elem_type = if value {
            ElementType::BooleanTrue
        } else {
            ElementType::BooleanFalse
        };
        self.write_element(tag, elem_type, &[], &[])
    }

    pub fn put_null(&mut self, tag: Tag) -> TlvResult<()> {
        self.write_element(tag, ElementType::Null, &[], &[])
    }

    pub fn put_bytes(&mut self, tag: Tag, value: &[u8]) -> TlvResult<()> {
        self.put_string(tag, ElementType::ByteString1, value)
    }

    pub fn put_str(&mut self, tag: Tag, value: &str) -> TlvResult<()> {
        self.put_string(tag, ElementType::Utf8String1, value.as_bytes())
    }

    pub fn start_container(&mut self, tag: Tag, ty: TlvType) -> TlvResult<()> {
        let elem_type = container_element(ty)?;
        self.write_element(tag, elem_type, &[], &[])?;
        self.containers.push(ty);
        Ok(())
    }

    pub fn end_container(&mut self) -> TlvResult<()> {
        if self.containers.is_empty() {
            return Err(TlvError::NotInContainer);
        }
        self.write_element(Tag::Anonymous, ElementType::EndOfContainer, &[], &[])?;
        self.containers.pop();
        Ok(())
    }

    /// Re-emits an already encoded container under a new tag. `encoded` must
    /// start with the container element; its original tag is dropped.
    pub fn copy_container(&mut self, tag: Tag, encoded: &[u8]) -> TlvResult<()> {
        let mut reader = TlvReader::new(encoded);
        reader.next()?;
        let elem_type = reader
            .raw_element_type()
            .filter(|t| t.is_container())
            .ok_or(TlvError::WrongType)?;
        let body_start = reader.value_offset().ok_or(TlvError::WrongType)?;
        reader.enter_container()?;
        reader.exit_container()?;
        let body_end = reader.read_point();
        self.write_element(tag, elem_type, &[], &encoded[body_start..body_end])
    }

    /// Returns the encoded length once every container has been closed.
    pub fn finalize(&self) -> TlvResult<usize> {
        if !self.containers.is_empty() {
            return Err(TlvError::ContainerOpen);
        }
        Ok(self.len)
    }

    fn put_string(&mut self, tag: Tag, base: ElementType, value: &[u8]) -> TlvResult<()> {
        let elem_type = ElementType::for_length(base, value.len());
        let len = (value.len() as u64).to_le_bytes();
        self.write_element(tag, elem_type, &len[..elem_type.field_size()], value)
    }

    fn write_element(
        &mut self,
        tag: Tag,
        elem_type: ElementType,
        field: &[u8],
        value: &[u8],
    ) -> TlvResult<()> {
        let (tag_control, tag_len) = tag.control();
        let total = 1 + tag_len + field.len() + value.len();
        let end = self
            .len
            .checked_add(total)
            .filter(|end| *end <= self.buf.len())
            .ok_or(TlvError::BufferTooSmall)?;

        let out = &mut self.buf[self.len..end];
        out[0] = tag_control | u8::from(elem_type);
        tag.encode_into(&mut out[1..1 + tag_len]);
        let (field_out, value_out) = out[1 + tag_len..].split_at_mut(field.len());
        field_out.copy_from_slice(field);
        value_out.copy_from_slice(value);
        self.len = end;
        Ok(())
    }
}

fn container_element(ty: TlvType) -> TlvResult<ElementType> {
    match ty {
        TlvType::Structure => Ok(ElementType::Structure),
        TlvType::Array => Ok(ElementType::Array),
        TlvType::Path => Ok(ElementType::Path),
        _ => Err(TlvError::WrongType),
    }
}
