use std::sync::Arc;

use crate::error::{Error, Result};
use crate::reader::Reader;

/// One constant-pool slot.
///
/// Only the payloads needed for structural queries are decoded; reference
/// entries keep their raw indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CpInfo {
    /// Slot 0 and the second slot of `Long`/`Double` entries.
    Unusable,
    Utf8(Arc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    MemberRef,
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle,
    MethodType,
    Dynamic,
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpInfo::Unusable => "Unusable",
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class { .. } => "Class",
            CpInfo::String { .. } => "String",
            CpInfo::MemberRef => "MemberRef",
            CpInfo::NameAndType { .. } => "NameAndType",
            CpInfo::MethodHandle => "MethodHandle",
            CpInfo::MethodType => "MethodType",
            CpInfo::Dynamic => "Dynamic",
            CpInfo::Module { .. } => "Module",
            CpInfo::Package { .. } => "Package",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConstantPool {
    entries: Vec<CpInfo>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(CpInfo::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let info = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    CpInfo::Utf8(decode_modified_utf8(bytes)?.into())
                }
                3 => CpInfo::Integer(reader.read_u4()? as i32),
                4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
                5 => CpInfo::Long(reader.read_u8()? as i64),
                6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
                7 => CpInfo::Class {
                    name_index: reader.read_u2()?,
                },
                8 => CpInfo::String {
                    string_index: reader.read_u2()?,
                },
                9 | 10 | 11 => {
                    reader.skip(4)?;
                    CpInfo::MemberRef
                }
                12 => CpInfo::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => {
                    reader.skip(3)?;
                    CpInfo::MethodHandle
                }
                16 => {
                    reader.skip(2)?;
                    CpInfo::MethodType
                }
                17 | 18 => {
                    reader.skip(4)?;
                    CpInfo::Dynamic
                }
                19 => CpInfo::Module {
                    name_index: reader.read_u2()?,
                },
                20 => CpInfo::Package {
                    name_index: reader.read_u2()?,
                },
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };

            let wide = matches!(info, CpInfo::Long(_) | CpInfo::Double(_));
            entries.push(info);
            if wide {
                entries.push(CpInfo::Unusable);
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&CpInfo> {
        match self.entries.get(index as usize) {
            Some(CpInfo::Unusable) | None => Err(Error::InvalidConstantPoolIndex(index)),
            Some(info) => Ok(info),
        }
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&Arc<str>> {
        match self.get(index)? {
            CpInfo::Utf8(value) => Ok(value),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<&Arc<str>> {
        match self.get(index)? {
            CpInfo::Class { name_index } => self.get_utf8(*name_index),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_optional_class_name(&self, index: u16) -> Result<Option<&Arc<str>>> {
        if index == 0 {
            Ok(None)
        } else {
            self.get_class_name(index).map(Some)
        }
    }

    pub(crate) fn get_optional_utf8(&self, index: u16) -> Result<Option<&Arc<str>>> {
        if index == 0 {
            Ok(None)
        } else {
            self.get_utf8(index).map(Some)
        }
    }

    pub(crate) fn get_string_constant(&self, index: u16) -> Result<&Arc<str>> {
        match self.get(index)? {
            CpInfo::String { string_index } => self.get_utf8(*string_index),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "String",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_name_and_type(&self, index: u16) -> Result<(&Arc<str>, &Arc<str>)> {
        match self.get(index)? {
            CpInfo::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.get_utf8(*name_index)?, self.get_utf8(*descriptor_index)?)),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "NameAndType",
                found: other.kind(),
            }),
        }
    }
}

/// Decode the JVM's "modified UTF-8" (`0xC0 0x80` for NUL, surrogate pairs
/// encoded as two three-byte sequences).
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        // ASCII fast path; the overwhelming majority of names and descriptors.
        return std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::InvalidModifiedUtf8);
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            units.push(((b0 & 0x1F) << 6) | b1);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            units.push(((b0 & 0x0F) << 12) | (b1 << 6) | b2);
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }

    String::from_utf16(&units).map_err(|_| Error::InvalidModifiedUtf8)
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(Error::InvalidModifiedUtf8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_embedded_nul_and_supplementary_characters() {
        assert_eq!(decode_modified_utf8(b"abc").unwrap(), "abc");
        assert_eq!(decode_modified_utf8(&[0x61, 0xC0, 0x80]).unwrap(), "a\0");
        // U+1F600 as a CESU-style surrogate pair.
        let smile = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&smile).unwrap(), "\u{1F600}");
        assert_eq!(
            decode_modified_utf8(&[0x00]),
            Err(Error::InvalidModifiedUtf8)
        );
        assert_eq!(
            decode_modified_utf8(&[0xE0, 0x80]),
            Err(Error::InvalidModifiedUtf8)
        );
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut bytes = vec![0x00, 0x05];
        bytes.push(5);
        bytes.extend_from_slice(&42i64.to_be_bytes());
        bytes.push(1);
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.push(b'x');
        bytes.push(3);
        bytes.extend_from_slice(&7i32.to_be_bytes());

        let mut reader = Reader::new(&bytes);
        let pool = ConstantPool::parse(&mut reader).unwrap();
        reader.ensure_empty().unwrap();

        assert_eq!(pool.get(1).unwrap(), &CpInfo::Long(42));
        assert_eq!(pool.get(2), Err(Error::InvalidConstantPoolIndex(2)));
        assert_eq!(pool.get_utf8(3).unwrap().as_ref(), "x");
        assert_eq!(pool.get(4).unwrap(), &CpInfo::Integer(7));
        assert!(matches!(
            pool.get_utf8(4),
            Err(Error::ConstantPoolTypeMismatch { index: 4, .. })
        ));
    }
}
