//! Intermediate representation for the on-chain structured-data format
//! (Plutus Data constructor terms): every domain type encodes to/from this
//! shape first, so the byte-for-byte contract lives in one place.

use escrow_common::{Reader, ReaderError, Serializer, Writer};

use crate::CodecError;

/// A constructor term: either a tagged product (`Constr(tag, fields)`,
/// matching the on-chain redeemer/datum constructor index), a byte string,
/// an integer, or a list of terms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructorTerm {
    Constr(u64, Vec<ConstructorTerm>),
    Bytes(Vec<u8>),
    Int(i128),
    List(Vec<ConstructorTerm>),
}

impl ConstructorTerm {
    pub fn constr(tag: u64, fields: impl Into<Vec<ConstructorTerm>>) -> Self {
        ConstructorTerm::Constr(tag, fields.into())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ConstructorTerm::Bytes(bytes.into())
    }

    pub fn int(value: impl Into<i128>) -> Self {
        ConstructorTerm::Int(value.into())
    }

    pub fn as_constr(&self) -> Result<(u64, &[ConstructorTerm]), CodecError> {
        match self {
            ConstructorTerm::Constr(tag, fields) => Ok((*tag, fields.as_slice())),
            other => Err(CodecError::UnexpectedShape(format!(
                "expected constructor, got {other:?}"
            ))),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], CodecError> {
        match self {
            ConstructorTerm::Bytes(b) => Ok(b.as_slice()),
            other => Err(CodecError::UnexpectedShape(format!(
                "expected bytes, got {other:?}"
            ))),
        }
    }

    pub fn as_int(&self) -> Result<i128, CodecError> {
        match self {
            ConstructorTerm::Int(v) => Ok(*v),
            other => Err(CodecError::UnexpectedShape(format!(
                "expected int, got {other:?}"
            ))),
        }
    }

    pub fn as_list(&self) -> Result<&[ConstructorTerm], CodecError> {
        match self {
            ConstructorTerm::List(items) => Ok(items.as_slice()),
            other => Err(CodecError::UnexpectedShape(format!(
                "expected list, got {other:?}"
            ))),
        }
    }

    pub fn field(fields: &[ConstructorTerm], index: usize) -> Result<&ConstructorTerm, CodecError> {
        fields
            .get(index)
            .ok_or_else(|| CodecError::UnexpectedShape(format!("missing field {index}")))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write(&mut writer);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ReaderError> {
        let mut reader = Reader::new(bytes);
        Self::read(&mut reader)
    }
}

const TAG_CONSTR: u8 = 0;
const TAG_BYTES: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_LIST: u8 = 3;

impl Serializer for ConstructorTerm {
    fn write(&self, writer: &mut Writer) {
        match self {
            ConstructorTerm::Constr(tag, fields) => {
                writer.write_u8(TAG_CONSTR);
                writer.write_u64(*tag);
                writer.write_u64(fields.len() as u64);
                for field in fields {
                    field.write(writer);
                }
            }
            ConstructorTerm::Bytes(bytes) => {
                writer.write_u8(TAG_BYTES);
                writer.write_bytes(bytes);
            }
            ConstructorTerm::Int(value) => {
                writer.write_u8(TAG_INT);
                // Stored as big-endian two's complement sign + magnitude via i128 bits.
                writer.write_u64((*value >> 64) as u64);
                writer.write_u64(*value as u64);
            }
            ConstructorTerm::List(items) => {
                writer.write_u8(TAG_LIST);
                writer.write_u64(items.len() as u64);
                for item in items {
                    item.write(writer);
                }
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            TAG_CONSTR => {
                let tag = reader.read_u64()?;
                let len = reader.read_u64()? as usize;
                let mut fields = Vec::with_capacity(len.min(1 << 16));
                for _ in 0..len {
                    fields.push(ConstructorTerm::read(reader)?);
                }
                Ok(ConstructorTerm::Constr(tag, fields))
            }
            TAG_BYTES => Ok(ConstructorTerm::Bytes(reader.read_bytes()?)),
            TAG_INT => {
                let hi = reader.read_u64()? as i128;
                let lo = reader.read_u64()? as i128;
                Ok(ConstructorTerm::Int((hi << 64) | lo))
            }
            TAG_LIST => {
                let len = reader.read_u64()? as usize;
                let mut items = Vec::with_capacity(len.min(1 << 16));
                for _ in 0..len {
                    items.push(ConstructorTerm::read(reader)?);
                }
                Ok(ConstructorTerm::List(items))
            }
            other => Err(ReaderError::InvalidValue(format!(
                "unknown constructor term tag {other}"
            ))),
        }
    }

    fn size(&self) -> usize {
        self.encode().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constr_roundtrip() {
        let term = ConstructorTerm::constr(
            5,
            vec![
                ConstructorTerm::bytes(vec![1, 2, 3]),
                ConstructorTerm::int(-42i128),
                ConstructorTerm::List(vec![ConstructorTerm::int(1i128)]),
            ],
        );
        let bytes = term.encode();
        let back = ConstructorTerm::decode(&bytes).unwrap();
        assert_eq!(term, back);
    }
}
