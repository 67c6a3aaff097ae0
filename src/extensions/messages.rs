use core::fmt;
use std::cell::OnceCell;

use crate::{
    TlsError,
    buffer::WriteBuffer,
    extensions::{
        ExtensionRegistry, ExtensionType,
        extension_data::{
            alpn::ApplicationLayerProtocolNegotiation, npn::NextProtocolNegotiation,
            unimplemented::Unimplemented,
        },
    },
    handshake::HandshakeType,
    parse_buffer::{ParseBuffer, ParseError},
};

/// Size of the type and length fields in front of every extension.
const EXTENSION_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloExtension {
    ApplicationLayerProtocolNegotiation(ApplicationLayerProtocolNegotiation),
    NextProtocolNegotiation(NextProtocolNegotiation),
    Unknown(ExtensionType, Unimplemented),
}

impl HelloExtension {
    #[must_use]
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Self::ApplicationLayerProtocolNegotiation(_) => {
                ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION
            }
            Self::NextProtocolNegotiation(_) => ExtensionType::NEXT_PROTOCOL_NEGOTIATION,
            Self::Unknown(ext_type, _) => *ext_type,
        }
    }

    /// Encoded size including the type and length fields.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        EXTENSION_HEADER_LEN
            + match self {
                Self::ApplicationLayerProtocolNegotiation(alpn) => alpn.data_len(),
                Self::NextProtocolNegotiation(npn) => npn.data_len(),
                Self::Unknown(_, data) => data.data_len(),
            }
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        self.extension_type().encode(buf)?;

        buf.with_u16_length(|buf| match self {
            Self::ApplicationLayerProtocolNegotiation(alpn) => alpn.encode(buf),
            Self::NextProtocolNegotiation(npn) => npn.encode(buf),
            Self::Unknown(_, data) => data.encode(buf),
        })
    }

    pub fn parse(buf: &mut ParseBuffer, handshake: HandshakeType) -> Result<Self, TlsError> {
        Self::parse_in(buf, handshake, ExtensionRegistry::global())
    }

    /// Like [`HelloExtension::parse`], resolving the extension type through `registry`.
    pub fn parse_in(
        buf: &mut ParseBuffer,
        handshake: HandshakeType,
        registry: &ExtensionRegistry,
    ) -> Result<Self, TlsError> {
        let ext_type = registry.parse(buf).map_err(|err| {
            warn!("Failed to read extension type: {:?}", err);
            TlsError::DecodeError
        })?;

        let data_len = buf.read_u16().map_err(|_| TlsError::DecodeError)? as usize;

        debug!("Read extension type {} ({} bytes)", ext_type, data_len);

        let mut ext_data = buf.slice(data_len).map_err(|_| {
            warn!(
                "Extension {} claims {} bytes, only {} left",
                ext_type,
                data_len,
                buf.remaining()
            );
            TlsError::InvalidExtensionsLength
        })?;

        let decode_error = |err: ParseError| {
            warn!("Failed to parse {} extension data: {:?}", ext_type, err);
            TlsError::DecodeError
        };

        let extension = if ext_type == ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION {
            Self::ApplicationLayerProtocolNegotiation(
                ApplicationLayerProtocolNegotiation::parse(&mut ext_data, handshake)
                    .map_err(decode_error)?,
            )
        } else if ext_type == ExtensionType::NEXT_PROTOCOL_NEGOTIATION {
            Self::NextProtocolNegotiation(
                NextProtocolNegotiation::parse(&mut ext_data).map_err(decode_error)?,
            )
        } else {
            Self::Unknown(
                ext_type,
                Unimplemented::parse(&mut ext_data).map_err(decode_error)?,
            )
        };

        trace!("Parsed {}", extension);
        Ok(extension)
    }
}

impl fmt::Display for HelloExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplicationLayerProtocolNegotiation(alpn) => fmt::Display::fmt(alpn, f),
            Self::NextProtocolNegotiation(npn) => fmt::Display::fmt(npn, f),
            Self::Unknown(ext_type, data) => write!(
                f,
                "Unsupported extension {ext_type}, data: {:02x?}",
                data.data
            ),
        }
    }
}

/// Extensions block of a ClientHello or ServerHello.
///
/// Serialized in insertion order; lookups return the first extension of a type.
#[derive(Debug, Clone, Default)]
pub struct HelloExtensions {
    extensions: Vec<HelloExtension>,
    encoded_len: OnceCell<usize>,
}

impl HelloExtensions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the extensions block, including its two-byte length.
    ///
    /// The extensions must fill the declared length exactly. Extension types are
    /// resolved through [`ExtensionRegistry::global`].
    pub fn parse(buf: &mut ParseBuffer, handshake: HandshakeType) -> Result<Self, TlsError> {
        Self::parse_in(buf, handshake, ExtensionRegistry::global())
    }

    /// Like [`HelloExtensions::parse`], registering unknown extension types in `registry`.
    pub fn parse_in(
        buf: &mut ParseBuffer,
        handshake: HandshakeType,
        registry: &ExtensionRegistry,
    ) -> Result<Self, TlsError> {
        let extensions_len = buf
            .read_u16()
            .map_err(|_| TlsError::InvalidExtensionsLength)? as usize;

        let mut ext_buf = buf.slice(extensions_len).map_err(|_| {
            warn!(
                "Extensions claim {} bytes, only {} left",
                extensions_len,
                buf.remaining()
            );
            TlsError::InvalidExtensionsLength
        })?;

        let mut extensions = Vec::new();
        while !ext_buf.is_empty() {
            extensions.push(HelloExtension::parse_in(&mut ext_buf, handshake, registry)?);
        }

        // The length is recomputed from the members: decoding may normalize them.
        Ok(Self {
            extensions,
            encoded_len: OnceCell::new(),
        })
    }

    pub fn append(&mut self, extension: HelloExtension) {
        self.extensions.push(extension);
        self.encoded_len = OnceCell::new();
    }

    #[must_use]
    pub fn find(&self, ext_type: ExtensionType) -> Option<&HelloExtension> {
        self.extensions
            .iter()
            .find(|ext| ext.extension_type() == ext_type)
    }

    #[must_use]
    pub fn alpn(&self) -> Option<&ApplicationLayerProtocolNegotiation> {
        match self.find(ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION) {
            Some(HelloExtension::ApplicationLayerProtocolNegotiation(alpn)) => Some(alpn),
            _ => None,
        }
    }

    #[must_use]
    pub fn npn(&self) -> Option<&NextProtocolNegotiation> {
        match self.find(ExtensionType::NEXT_PROTOCOL_NEGOTIATION) {
            Some(HelloExtension::NextProtocolNegotiation(npn)) => Some(npn),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HelloExtension> {
        self.extensions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Encoded size including the outer length field, or 0 when there is nothing to send.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        *self.encoded_len.get_or_init(|| {
            if self.extensions.is_empty() {
                0
            } else {
                2 + self
                    .extensions
                    .iter()
                    .map(HelloExtension::encoded_len)
                    .sum::<usize>()
            }
        })
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        let len = self.encoded_len();
        if len == 0 {
            return Ok(());
        }

        let extensions_len = u16::try_from(len - 2).map_err(|_| {
            warn!("Extensions of {} bytes exceed the length field", len - 2);
            TlsError::EncodeError
        })?;
        buf.push_u16(extensions_len)?;

        for extension in &self.extensions {
            trace!("Encoding {}", extension);
            extension.encode(buf)?;
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, TlsError> {
        let mut out = vec![0; self.encoded_len()];
        let mut buf = WriteBuffer::wrap(&mut out);
        self.encode(&mut buf)?;
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a HelloExtensions {
    type Item = &'a HelloExtension;
    type IntoIter = core::slice::Iter<'a, HelloExtension>;

    fn into_iter(self) -> Self::IntoIter {
        self.extensions.iter()
    }
}
