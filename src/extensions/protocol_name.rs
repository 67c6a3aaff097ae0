use core::fmt;

use heapless::Vec;

use crate::TlsError;
use crate::buffer::WriteBuffer;
use crate::parse_buffer::{ParseBuffer, ParseError};

/// Opaque, non-empty protocol identifier of at most 255 bytes.
///
/// The bytes are kept as received; ALPN reads them as UTF-8, NPN as ISO-8859-1.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtocolName {
    name: Vec<u8, 255>,
}

impl ProtocolName {
    // RFC 7301, Section 6. IANA Considerations, plus the HTTP/2 registration of RFC 7540
    pub const HTTP_1_1: &'static str = "http/1.1";
    pub const H2: &'static str = "h2";
    pub const SPDY_1: &'static str = "spdy/1";
    pub const SPDY_2: &'static str = "spdy/2";
    pub const SPDY_3: &'static str = "spdy/3";

    pub fn new(bytes: &[u8]) -> Result<Self, TlsError> {
        if bytes.is_empty() {
            warn!("Rejecting empty protocol name");
            return Err(TlsError::InvalidProtocolName);
        }

        Vec::from_slice(bytes)
            .map(|name| Self { name })
            .map_err(|()| {
                warn!("Rejecting protocol name of {} bytes", bytes.len());
                TlsError::InvalidProtocolName
            })
    }

    /// Name as sent in ALPN.
    pub fn from_utf8(name: &str) -> Result<Self, TlsError> {
        Self::new(name.as_bytes())
    }

    /// Name as sent in NPN: one byte per character, so only U+0000..=U+00FF can be sent.
    pub fn from_latin1(name: &str) -> Result<Self, TlsError> {
        let mut bytes = Vec::<u8, 255>::new();
        for c in name.chars() {
            let b = u8::try_from(c).map_err(|_| TlsError::InvalidProtocolName)?;
            bytes.push(b).map_err(|_| TlsError::InvalidProtocolName)?;
        }
        Self::new(&bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn to_utf8(&self) -> Result<&str, TlsError> {
        core::str::from_utf8(&self.name).map_err(|_| TlsError::DecodeError)
    }

    #[must_use]
    pub fn to_latin1(&self) -> String {
        self.name.iter().map(|&b| char::from(b)).collect()
    }

    pub fn parse(buf: &mut ParseBuffer) -> Result<Self, ParseError> {
        let name_len = buf.read_u8()? as usize;
        if name_len == 0 {
            return Err(ParseError::InvalidData);
        }

        let name = Vec::from_slice(buf.read(name_len)?).map_err(|()| ParseError::InvalidData)?;
        Ok(Self { name })
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        buf.with_u8_length(|buf| buf.extend_from_slice(&self.name))
    }

    /// Encoded size including the length prefix.
    pub(crate) fn encoded_len(&self) -> usize {
        1 + self.name.len()
    }
}

impl PartialEq<str> for ProtocolName {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for ProtocolName {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.name))
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.name))
    }
}
