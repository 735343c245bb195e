// Licensed under the Apache-2.0 license

use crate::error::{TlvError, TlvResult};
use crate::tag::Tag;
use crate::types::{ElementType, TlvType};

#[derive(Debug, Clone, Copy)]
struct Element {
    elem_type: ElementType,
    tag: Tag,
    start: usize,
    value_start: usize,
    value_len: usize,
    raw: u64,
}

impl Element {
    fn end(&self) -> usize {
        self.value_start + self.value_len
    }

    fn signed_value(&self) -> i64 {
        match self.elem_type.field_size() {
            1 => self.raw as u8 as i8 as i64,
            2 => self.raw as u16 as i16 as i64,
            4 => self.raw as u32 as i32 as i64,
            _ => self.raw as i64,
        }
    }
}

fn parse_element(buf: &[u8], offset: usize) -> TlvResult<Element> {
    let control = *buf.get(offset).ok_or(TlvError::UnderRun)?;
    let elem_type = ElementType::from_control(control)?;
    let (tag, tag_len) = Tag::decode(control, &buf[offset + 1..])?;
    if elem_type == ElementType::EndOfContainer && tag != Tag::Anonymous {
        return Err(TlvError::InvalidTag);
    }

    let mut cursor = offset + 1 + tag_len;
    let size = elem_type.field_size();
    let field = buf
        .get(cursor..cursor + size)
        .ok_or(TlvError::UnderRun)?;
    let raw = field
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, b)| acc | (*b as u64) << (8 * i));
    cursor += size;

    let (value_start, value_len) = if elem_type.has_length_prefix() {
        let len = usize::try_from(raw).map_err(|_| TlvError::InvalidLength)?;
        let end = cursor.checked_add(len).ok_or(TlvError::InvalidLength)?;
        if end > buf.len() {
            return Err(TlvError::UnderRun);
        }
        (cursor, len)
    } else {
        (cursor - size, size)
    };

    Ok(Element {
        elem_type,
        tag,
        start: offset,
        value_start,
        value_len,
        raw,
    })
}

/// Returns the offset just past the end-of-container marker of the container
/// whose first member starts at `offset`.
fn skip_container(buf: &[u8], mut offset: usize) -> TlvResult<usize> {
    loop {
        let elem = parse_element(buf, offset)?;
        if elem.elem_type == ElementType::EndOfContainer {
            return Ok(offset + 1);
        }
        offset = if elem.elem_type.is_container() {
            skip_container(buf, elem.value_start)?
        } else {
            elem.end()
        };
    }
}

/// Forward-only cursor over an encoded TLV buffer.
///
/// `next` positions the reader on an element; the `get_*` accessors then
/// extract its value. Values are borrowed from the input buffer.
pub struct TlvReader<'a> {
    buf: &'a [u8],
    pos: usize,
    current: Option<Element>,
    containers: Vec<TlvType>,
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            current: None,
            containers: Vec::new(),
        }
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Offset of the first byte not yet consumed by the reader.
    pub fn read_point(&self) -> usize {
        self.pos
    }

    pub fn container_type(&self) -> Option<TlvType> {
        self.containers.last().copied()
    }

    /// Advances to the next element in the current container. Returns
    /// `EndOfTlv` once the container (or the top-level buffer) is exhausted.
    pub fn next(&mut self) -> TlvResult<()> {
        self.skip_current()?;
        if self.pos >= self.buf.len() {
            return Err(if self.containers.is_empty() {
                TlvError::EndOfTlv
            } else {
                TlvError::UnderRun
            });
        }
        let elem = parse_element(self.buf, self.pos)?;
        if elem.elem_type == ElementType::EndOfContainer {
            if self.containers.is_empty() {
                return Err(TlvError::UnexpectedElement);
            }
            return Err(TlvError::EndOfTlv);
        }
        self.pos = elem.end();
        self.current = Some(elem);
        Ok(())
    }

    /// Advances and checks that the new element carries `tag` and has type `ty`.
    pub fn next_expect(&mut self, ty: TlvType, tag: Tag) -> TlvResult<()> {
        self.next()?;
        self.expect(ty, tag)
    }

    /// Checks the element the reader is positioned on without advancing.
    pub fn expect(&self, ty: TlvType, tag: Tag) -> TlvResult<()> {
        let elem = self.current.as_ref().ok_or(TlvError::UnexpectedElement)?;
        if elem.tag != tag {
            return Err(TlvError::UnexpectedElement);
        }
        if elem.elem_type.tlv_type() != Some(ty) {
            return Err(TlvError::WrongType);
        }
        Ok(())
    }

    pub fn is(&self, ty: TlvType, tag: Tag) -> bool {
        self.expect(ty, tag).is_ok()
    }

    pub fn element_type(&self) -> Option<TlvType> {
        self.current.and_then(|e| e.elem_type.tlv_type())
    }

    pub fn raw_element_type(&self) -> Option<ElementType> {
        self.current.map(|e| e.elem_type)
    }

    pub fn tag(&self) -> Option<Tag> {
        self.current.map(|e| e.tag)
    }

    /// Offset of the current element's control byte.
    pub fn element_offset(&self) -> Option<usize> {
        self.current.map(|e| e.start)
    }

    /// Offset of the current element's value (string data or first container member).
    pub fn value_offset(&self) -> Option<usize> {
        self.current.map(|e| e.value_start)
    }

    pub fn get_u64(&self) -> TlvResult<u64> {
        let elem = self.current_elem()?;
        match elem.elem_type.tlv_type() {
            Some(TlvType::UnsignedInteger) => Ok(elem.raw),
            Some(TlvType::SignedInteger) => {
                u64::try_from(elem.signed_value()).map_err(|_| TlvError::IntegerOverflow)
            }
            _ => Err(TlvError::WrongType),
        }
    }

    pub fn get_u32(&self) -> TlvResult<u32> {
        u32::try_from(self.get_u64()?).map_err(|_| TlvError::IntegerOverflow)
    }

    pub fn get_u16(&self) -> TlvResult<u16> {
        u16::try_from(self.get_u64()?).map_err(|_| TlvError::IntegerOverflow)
    }

    pub fn get_u8(&self) -> TlvResult<u8> {
        u8::try_from(self.get_u64()?).map_err(|_| TlvError::IntegerOverflow)
    }

    pub fn get_i64(&self) -> TlvResult<i64> {
        let elem = self.current_elem()?;
        match elem.elem_type.tlv_type() {
            Some(TlvType::SignedInteger) => Ok(elem.signed_value()),
            Some(TlvType::UnsignedInteger) => {
                i64::try_from(elem.raw).map_err(|_| TlvError::IntegerOverflow)
            }
            _ => Err(TlvError::WrongType),
        }
    }

    pub fn get_bool(&self) -> TlvResult<bool> {
        match self.current_elem()?.elem_type {
            ElementType::BooleanTrue => Ok(true),
            ElementType::BooleanFalse => Ok(false),
            _ => Err(TlvError::WrongType),
        }
    }

    pub fn get_f64(&self) -> TlvResult<f64> {
        let elem = self.current_elem()?;
        match elem.elem_type {
            ElementType::Float32 => Ok(f32::from_bits(elem.raw as u32) as f64),
            ElementType::Float64 => Ok(f64::from_bits(elem.raw)),
            _ => Err(TlvError::WrongType),
        }
    }

    pub fn get_bytes(&self) -> TlvResult<&'a [u8]> {
        let elem = self.current_elem()?;
        if elem.elem_type.tlv_type() != Some(TlvType::ByteString) {
            return Err(TlvError::WrongType);
        }
        Ok(&self.buf[elem.value_start..elem.end()])
    }

    pub fn get_str(&self) -> TlvResult<&'a str> {
        let elem = self.current_elem()?;
        if elem.elem_type.tlv_type() != Some(TlvType::Utf8String) {
            return Err(TlvError::WrongType);
        }
        core::str::from_utf8(&self.buf[elem.value_start..elem.end()])
            .map_err(|_| TlvError::InvalidUtf8)
    }

    /// Descends into the container the reader is positioned on.
    pub fn enter_container(&mut self) -> TlvResult<()> {
        let elem = self.current.ok_or(TlvError::WrongType)?;
        let ty = elem
            .elem_type
            .tlv_type()
            .filter(|t| t.is_container())
            .ok_or(TlvError::WrongType)?;
        self.current = None;
        self.pos = elem.value_start;
        self.containers.push(ty);
        Ok(())
    }

    /// Skips whatever is left of the current container and returns to its parent.
    pub fn exit_container(&mut self) -> TlvResult<()> {
        if self.containers.is_empty() {
            return Err(TlvError::NotInContainer);
        }
        self.skip_current()?;
        self.pos = skip_container(self.buf, self.pos)?;
        self.containers.pop();
        Ok(())
    }

    /// Succeeds only if no further elements remain in the current container.
    pub fn verify_end_of_container(&mut self) -> TlvResult<()> {
        match self.next() {
            Err(TlvError::EndOfTlv) => Ok(()),
            Ok(()) => Err(TlvError::TrailingData),
            Err(e) => Err(e),
        }
    }

    fn current_elem(&self) -> TlvResult<&Element> {
        self.current.as_ref().ok_or(TlvError::WrongType)
    }

    fn skip_current(&mut self) -> TlvResult<()> {
        if let Some(elem) = self.current.take() {
            if elem.elem_type.is_container() {
                self.pos = skip_container(self.buf, elem.value_start)?;
            }
        }
        Ok(())
    }
}
