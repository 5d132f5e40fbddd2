//! Deterministic, ordered, length-prefixed binary encoding — the wire format
//! the Datum/Redeemer Codec builds its byte-for-byte contract on top of.
//!
//! Mirrors the teacher's `Reader`/`Writer`/`Serializer` idiom: every type
//! writes its fields in a fixed order and reads them back in the same order,
//! with no self-describing tags beyond what each type chooses to emit.

use thiserror::Error;

use crate::crypto::{CryptoError, Hash, KeyHash, VerificationKey};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("unexpected end of buffer")]
    Eof,
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.write_u64(v.len() as u64);
        self.buf.extend_from_slice(v);
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        let b = *self.data.get(self.pos).ok_or(ReaderError::Eof)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let slice = self
            .data
            .get(self.pos..self.pos + 2)
            .ok_or(ReaderError::Eof)?;
        self.pos += 2;
        Ok(u16::from_be_bytes(slice.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        let slice = self
            .data
            .get(self.pos..self.pos + 8)
            .ok_or(ReaderError::Eof)?;
        self.pos += 8;
        Ok(u64::from_be_bytes(slice.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ReaderError> {
        let len = self.read_u64()? as usize;
        let slice = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(ReaderError::Eof)?;
        self.pos += len;
        Ok(slice.to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Ordered, deterministic encode/decode — no I/O, no allocation beyond the buffer.
pub trait Serializer: Sized {
    fn write(&self, writer: &mut Writer);
    fn read(reader: &mut Reader) -> Result<Self, ReaderError>;
    fn size(&self) -> usize;

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write(&mut writer);
        writer.into_bytes()
    }

    fn from_bytes(data: &[u8]) -> Result<Self, ReaderError> {
        let mut reader = Reader::new(data);
        Self::read(&mut reader)
    }
}

impl Serializer for u8 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self);
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u8()
    }
    fn size(&self) -> usize {
        1
    }
}

impl Serializer for u16 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u16(*self);
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u16()
    }
    fn size(&self) -> usize {
        2
    }
}

impl Serializer for u64 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(*self);
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u64()
    }
    fn size(&self) -> usize {
        8
    }
}

impl Serializer for bool {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(if *self { 1 } else { 0 });
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(reader.read_u8()? != 0)
    }
    fn size(&self) -> usize {
        1
    }
}

impl Serializer for String {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self.as_bytes());
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| ReaderError::InvalidValue(e.to_string()))
    }
    fn size(&self) -> usize {
        8 + self.len()
    }
}

impl Serializer for Vec<u8> {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self);
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bytes()
    }
    fn size(&self) -> usize {
        8 + self.len()
    }
}

impl<T: Serializer> Serializer for Vec<T> {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.len() as u64);
        for item in self {
            item.write(writer);
        }
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u64()? as usize;
        let mut out = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            out.push(T::read(reader)?);
        }
        Ok(out)
    }
    fn size(&self) -> usize {
        8 + self.iter().map(Serializer::size).sum::<usize>()
    }
}

impl<T: Serializer> Serializer for Option<T> {
    fn write(&self, writer: &mut Writer) {
        match self {
            Some(v) => {
                writer.write_u8(1);
                v.write(writer);
            }
            None => writer.write_u8(0),
        }
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(T::read(reader)?)),
        }
    }
    fn size(&self) -> usize {
        1 + self.as_ref().map(Serializer::size).unwrap_or(0)
    }
}

impl Serializer for Hash {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self.as_bytes());
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes()?;
        Ok(Hash::from_bytes(&bytes)?)
    }
    fn size(&self) -> usize {
        8 + Hash::SIZE
    }
}

impl Serializer for VerificationKey {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self.as_bytes());
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes()?;
        Ok(VerificationKey::from_bytes(&bytes)?)
    }
    fn size(&self) -> usize {
        8 + VerificationKey::SIZE
    }
}

impl Serializer for KeyHash {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self.as_bytes());
    }
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes()?;
        Ok(KeyHash::from_bytes(&bytes)?)
    }
    fn size(&self) -> usize {
        8 + KeyHash::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_roundtrip() {
        let mut w = Writer::new();
        42u64.write(&mut w);
        true.write(&mut w);
        "hello".to_string().write(&mut w);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(u64::read(&mut r).unwrap(), 42);
        assert_eq!(bool::read(&mut r).unwrap(), true);
        assert_eq!(String::read(&mut r).unwrap(), "hello");
        assert!(r.is_empty());
    }

    #[test]
    fn option_and_vec_roundtrip() {
        let values: Vec<Option<u64>> = vec![Some(1), None, Some(3)];
        let bytes = values.to_bytes();
        let back = Vec::<Option<u64>>::from_bytes(&bytes).unwrap();
        assert_eq!(values, back);
    }
}
