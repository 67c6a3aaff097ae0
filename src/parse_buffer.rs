/// Cursor over handshake bytes that were already received by the record layer.
#[derive(Debug, Clone, Copy)]
pub struct ParseBuffer<'b> {
    pos: usize,
    buffer: &'b [u8],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseError {
    InsufficientBytes,
    InsufficientSpace,
    InvalidData,
}

impl<'b> From<&'b [u8]> for ParseBuffer<'b> {
    fn from(val: &'b [u8]) -> Self {
        ParseBuffer::new(val)
    }
}

impl<'b> ParseBuffer<'b> {
    #[must_use]
    pub fn new(buffer: &'b [u8]) -> Self {
        Self { pos: 0, buffer }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos == self.buffer.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn as_slice(&self) -> &'b [u8] {
        &self.buffer[self.pos..]
    }

    /// Splits off the next `len` bytes as an independent cursor and advances past them.
    pub fn slice(&mut self, len: usize) -> Result<ParseBuffer<'b>, ParseError> {
        if self.remaining() < len {
            return Err(ParseError::InsufficientBytes);
        }

        let slice = ParseBuffer::new(&self.buffer[self.pos..self.pos + len]);
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Reads exactly `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<&'b [u8], ParseError> {
        Ok(self.slice(len)?.buffer)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut out = [0; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_list<T>(
        &mut self,
        data_length: usize,
        read: impl Fn(&mut ParseBuffer<'b>) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut data = self.slice(data_length)?;
        let mut result = Vec::new();

        while !data.is_empty() {
            result.push(read(&mut data)?);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let mut buf = ParseBuffer::new(&[0x01, 0x02, 0x03]);
        assert_eq!(Ok(0x01), buf.read_u8());
        assert_eq!(Ok(0x0203), buf.read_u16());
        assert!(buf.is_empty());
        assert_eq!(Err(ParseError::InsufficientBytes), buf.read_u8());
    }

    #[test]
    fn test_slice_is_bounded() {
        let mut buf = ParseBuffer::new(&[0xAA, 0xBB, 0xCC]);
        let mut inner = buf.slice(2).unwrap();
        assert_eq!(1, buf.remaining());
        assert_eq!(Ok(0xAABB), inner.read_u16());
        assert_eq!(Err(ParseError::InsufficientBytes), inner.read_u8());
        assert_eq!(Err(ParseError::InsufficientBytes), buf.slice(2).map(|_| ()));
    }

    #[test]
    fn test_read_list() {
        let mut buf = ParseBuffer::new(&[0x01, 0x02, 0x03, 0x04]);
        let list = buf.read_list(3, ParseBuffer::read_u8).unwrap();
        assert_eq!(vec![1, 2, 3], list);
        assert_eq!(Ok(4), buf.read_u8());
    }
}
