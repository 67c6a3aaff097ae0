use core::fmt;

use crate::{
    TlsError,
    buffer::WriteBuffer,
    extensions::{ExtensionType, protocol_name::ProtocolName},
    parse_buffer::{ParseBuffer, ParseError},
};

/// Next Protocol Negotiation extension data, draft-agl-tls-nextprotoneg-03.
///
/// ```text
/// opaque ProtocolName<1..2^8-1>;
/// ProtocolName protocols<0..2^16-1>;  // no inner list length, names fill the extension
/// ```
///
/// The client sends it empty to announce support, the server fills it with the protocols
/// it advertises. Names are ISO-8859-1 and kept unique in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextProtocolNegotiation {
    protocols: Vec<ProtocolName>,
}

impl NextProtocolNegotiation {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<'n>(names: impl IntoIterator<Item = &'n str>) -> Result<Self, TlsError> {
        let mut npn = Self::empty();
        for name in names {
            npn.insert(ProtocolName::from_latin1(name)?);
        }
        Ok(npn)
    }

    #[must_use]
    pub fn from_protocols(protocols: impl IntoIterator<Item = ProtocolName>) -> Self {
        let mut npn = Self::empty();
        for protocol in protocols {
            npn.insert(protocol);
        }
        npn
    }

    /// Adds `protocol` unless already present; returns whether it was added.
    pub fn insert(&mut self, protocol: ProtocolName) -> bool {
        if self.protocols.contains(&protocol) {
            return false;
        }
        self.protocols.push(protocol);
        true
    }

    #[must_use]
    pub fn protocols(&self) -> &[ProtocolName] {
        &self.protocols
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.protocols.iter().map(ProtocolName::to_latin1).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    pub fn parse(buf: &mut ParseBuffer) -> Result<Self, ParseError> {
        let mut npn = Self::empty();

        while !buf.is_empty() {
            let protocol = ProtocolName::parse(buf)?;
            if !npn.insert(protocol) {
                trace!("Dropping repeated NPN protocol");
            }
        }

        Ok(npn)
    }

    /// Length of the extension data, excluding the type and length fields.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.protocols.iter().map(ProtocolName::encoded_len).sum()
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        for protocol in &self.protocols {
            protocol.encode(buf)?;
        }
        Ok(())
    }
}

impl fmt::Display for NextProtocolNegotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = ExtensionType::NEXT_PROTOCOL_NEGOTIATION.id();
        write!(
            f,
            "Next Protocol Negotiation Extension [{id:#x}/{id}], protocols: {:?}",
            self.names()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::NextProtocolNegotiation;
    use crate::buffer::WriteBuffer;
    use crate::extensions::protocol_name::ProtocolName;
    use crate::parse_buffer::{ParseBuffer, ParseError};

    fn encode(npn: &NextProtocolNegotiation) -> Vec<u8> {
        let mut out = [0; 512];
        let mut buf = WriteBuffer::wrap(&mut out);
        npn.encode(&mut buf).unwrap();
        assert_eq!(npn.data_len(), buf.len());
        buf.as_slice().to_vec()
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let npn = NextProtocolNegotiation::new(["h2", "h2", "http/1.1"]).unwrap();
        let data = encode(&npn);

        assert_eq!(
            &[
                0x02, b'h', b'2', //
                0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1',
            ],
            data.as_slice()
        );

        let parsed = NextProtocolNegotiation::parse(&mut ParseBuffer::new(&data)).unwrap();
        assert_eq!(vec!["h2", "http/1.1"], parsed.names());
    }

    #[test]
    fn test_parse_keeps_first_occurrence() {
        let data = [
            0x06, b's', b'p', b'd', b'y', b'/', b'3', //
            0x02, b'h', b'2', //
            0x06, b's', b'p', b'd', b'y', b'/', b'3',
        ];
        let parsed = NextProtocolNegotiation::parse(&mut ParseBuffer::new(&data)).unwrap();
        assert_eq!(vec!["spdy/3", "h2"], parsed.names());
    }

    #[test]
    fn test_empty() {
        let npn = NextProtocolNegotiation::empty();
        assert!(encode(&npn).is_empty());

        let parsed = NextProtocolNegotiation::parse(&mut ParseBuffer::new(&[])).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_latin1_names() {
        let npn = NextProtocolNegotiation::new(["\u{e9}t\u{e9}"]).unwrap();
        let data = encode(&npn);
        assert_eq!(&[0x03, 0xE9, b't', 0xE9], data.as_slice());

        let parsed = NextProtocolNegotiation::parse(&mut ParseBuffer::new(&data)).unwrap();
        assert_eq!(vec!["\u{e9}t\u{e9}"], parsed.names());
    }

    #[test]
    fn test_truncated_name() {
        let data = [0x02, b'h', b'2', 0x08, b'h', b't'];
        assert_eq!(
            Err(ParseError::InsufficientBytes),
            NextProtocolNegotiation::parse(&mut ParseBuffer::new(&data))
        );
    }

    #[test]
    fn test_longest_name_round_trips() {
        let longest = ProtocolName::new(&[b'x'; 255]).unwrap();
        let npn = NextProtocolNegotiation::from_protocols([
            longest.clone(),
            ProtocolName::from_utf8("spdy/3").unwrap(),
        ]);
        let data = encode(&npn);
        assert_eq!(256 + 7, data.len());
        assert_eq!(0xFF, data[0]);

        let parsed = NextProtocolNegotiation::parse(&mut ParseBuffer::new(&data)).unwrap();
        assert_eq!(npn, parsed);
        assert_eq!(&longest, &parsed.protocols()[0]);
    }
}
