use crate::TlsError;

/// Fixed-capacity sink for outgoing handshake bytes.
pub struct WriteBuffer<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> WriteBuffer<'b> {
    pub fn wrap(buf: &'b mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn push(&mut self, b: u8) -> Result<(), TlsError> {
        self.extend_from_slice(&[b])
    }

    pub fn push_u16(&mut self, num: u16) -> Result<(), TlsError> {
        self.extend_from_slice(&num.to_be_bytes())
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), TlsError> {
        if self.capacity() - self.len < other.len() {
            return Err(TlsError::InsufficientSpace);
        }
        self.buf[self.len..self.len + other.len()].copy_from_slice(other);
        self.len += other.len();
        Ok(())
    }

    fn set(&mut self, idx: usize, val: u8) {
        self.buf[idx] = val;
    }

    /// Writes a one-byte length prefix covering whatever `op` writes.
    pub fn with_u8_length<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, TlsError>,
    ) -> Result<R, TlsError> {
        let len_pos = self.len;
        self.push(0)?;
        let start = self.len;

        let result = op(self)?;

        let len = u8::try_from(self.len - start).map_err(|_| TlsError::EncodeError)?;
        self.set(len_pos, len);

        Ok(result)
    }

    /// Writes a big-endian two-byte length prefix covering whatever `op` writes.
    pub fn with_u16_length<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, TlsError>,
    ) -> Result<R, TlsError> {
        let len_pos = self.len;
        self.push_u16(0)?;
        let start = self.len;

        let result = op(self)?;

        let len = u16::try_from(self.len - start).map_err(|_| TlsError::EncodeError)?;
        let [upper, lower] = len.to_be_bytes();
        self.set(len_pos, upper);
        self.set(len_pos + 1, lower);

        Ok(result)
    }
}
