use core::fmt;

use crate::{
    TlsError,
    buffer::WriteBuffer,
    extensions::{ExtensionType, protocol_name::ProtocolName},
    handshake::HandshakeType,
    parse_buffer::{ParseBuffer, ParseError},
};

/// ALPN extension data per RFC 7301, Section 3.1.
///
/// The client offers a list:
/// ```text
/// opaque ProtocolName<1..2^8-1>;
///
/// struct {
///     ProtocolName protocol_name_list<2..2^16-1>
/// } ProtocolNameList;
/// ```
///
/// The server answers with the bare selected `ProtocolName`, without the list length.
/// Both share one extension type, so which form applies depends on the hello it travels in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationLayerProtocolNegotiation {
    Offered(Vec<ProtocolName>),
    Selected(ProtocolName),
}

impl ApplicationLayerProtocolNegotiation {
    /// Client offer, most preferred first. Names are sent as UTF-8.
    pub fn offered<'n>(names: impl IntoIterator<Item = &'n str>) -> Result<Self, TlsError> {
        let protocols = names
            .into_iter()
            .map(ProtocolName::from_utf8)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Offered(protocols))
    }

    /// Server answer naming the chosen protocol.
    pub fn selected(name: &str) -> Result<Self, TlsError> {
        Ok(Self::Selected(ProtocolName::from_utf8(name)?))
    }

    pub fn parse(buf: &mut ParseBuffer, handshake: HandshakeType) -> Result<Self, ParseError> {
        match handshake {
            HandshakeType::ClientHello => Self::parse_offered(buf),
            HandshakeType::ServerHello | HandshakeType::EncryptedExtensions => {
                Self::parse_selected(buf)
            }
        }
    }

    pub fn parse_offered(buf: &mut ParseBuffer) -> Result<Self, ParseError> {
        // An extension without any data carries no list at all.
        if buf.is_empty() {
            return Ok(Self::Offered(Vec::new()));
        }

        let list_len = buf.read_u16()? as usize;
        let protocols = buf.read_list(list_len, ProtocolName::parse)?;

        if !buf.is_empty() {
            warn!(
                "ALPN list length {} disagrees with extension length, {} bytes left over",
                list_len,
                buf.remaining()
            );
            return Err(ParseError::InvalidData);
        }

        Ok(Self::Offered(protocols))
    }

    pub fn parse_selected(buf: &mut ParseBuffer) -> Result<Self, ParseError> {
        let protocol = ProtocolName::parse(buf)?;

        if !buf.is_empty() {
            warn!(
                "ALPN selection followed by {} unexpected bytes",
                buf.remaining()
            );
            return Err(ParseError::InvalidData);
        }

        Ok(Self::Selected(protocol))
    }

    /// Offered protocols, or the single selected one.
    #[must_use]
    pub fn protocols(&self) -> &[ProtocolName] {
        match self {
            Self::Offered(protocols) => protocols,
            Self::Selected(protocol) => core::slice::from_ref(protocol),
        }
    }

    #[must_use]
    pub fn selected_protocol(&self) -> Option<&ProtocolName> {
        match self {
            Self::Offered(_) => None,
            Self::Selected(protocol) => Some(protocol),
        }
    }

    /// Length of the extension data, excluding the type and length fields.
    #[must_use]
    pub fn data_len(&self) -> usize {
        match self {
            Self::Offered(protocols) => {
                2 + protocols.iter().map(ProtocolName::encoded_len).sum::<usize>()
            }
            Self::Selected(protocol) => protocol.encoded_len(),
        }
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        match self {
            Self::Offered(protocols) => buf.with_u16_length(|buf| {
                for protocol in protocols {
                    protocol.encode(buf)?;
                }
                Ok(())
            }),
            Self::Selected(protocol) => protocol.encode(buf),
        }
    }
}

impl fmt::Display for ApplicationLayerProtocolNegotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION.id();
        write!(f, "Application Layer Protocol Negotiation (ALPN) [{id:#x}/{id}], ")?;
        match self {
            Self::Offered(protocols) => write!(f, "client protocols: {protocols:?}"),
            Self::Selected(protocol) => write!(f, "selected protocol: {protocol}"),
        }
    }
}
