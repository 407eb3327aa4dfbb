use crate::error::{Error, Result};

/// Big-endian cursor over a class file (or one of its attribute payloads).
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn at(bytes: &'a [u8], pos: usize) -> Result<Self> {
        if pos > bytes.len() {
            return Err(Error::UnexpectedEof);
        }
        Ok(Self { bytes, pos })
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8> {
        let byte = *self.bytes.get(self.pos).ok_or(Error::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16> {
        let bytes = self.read_array::<2>()?;
        Ok(u16::from_be_bytes(bytes))
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32> {
        let bytes = self.read_array::<4>()?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u64> {
        let bytes = self.read_array::<8>()?;
        Ok(u64::from_be_bytes(bytes))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::UnexpectedEof)?;
        let slice = self.bytes.get(self.pos..end).ok_or(Error::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub(crate) fn ensure_empty(&self) -> Result<()> {
        let remaining = self.bytes.len() - self.pos;
        if remaining == 0 {
            Ok(())
        } else {
            Err(Error::TrailingBytes(remaining))
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u1().unwrap(), 0x01);
        assert_eq!(reader.read_u2().unwrap(), 0x0203);
        assert_eq!(reader.read_u4().unwrap(), 0x04050607);
        assert!(reader.ensure_empty().is_ok());
        assert_eq!(reader.read_u1(), Err(Error::UnexpectedEof));
    }

    #[test]
    fn reports_trailing_bytes() {
        let bytes = [0u8; 3];
        let mut reader = Reader::new(&bytes);
        reader.skip(1).unwrap();
        assert_eq!(reader.ensure_empty(), Err(Error::TrailingBytes(2)));
        assert_eq!(reader.read_bytes(3), Err(Error::UnexpectedEof));
    }
}
