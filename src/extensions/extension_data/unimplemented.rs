use crate::{
    TlsError,
    buffer::WriteBuffer,
    parse_buffer::{ParseBuffer, ParseError},
};

/// Extension data this crate does not interpret, carried through byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unimplemented {
    pub data: Vec<u8>,
}

impl Unimplemented {
    pub fn parse(buf: &mut ParseBuffer) -> Result<Self, ParseError> {
        let remaining = buf.remaining();
        Ok(Self {
            data: buf.read(remaining)?.to_vec(),
        })
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        buf.extend_from_slice(&self.data)
    }

    pub(crate) fn data_len(&self) -> usize {
        self.data.len()
    }
}
