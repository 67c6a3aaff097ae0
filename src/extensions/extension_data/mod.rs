pub mod alpn;
pub mod npn;
pub mod unimplemented;
