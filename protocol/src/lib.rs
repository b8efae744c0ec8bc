//! Wire protocol for the multiworld coordination service.
//!
//! Frames are newline-delimited: each line holds one JSON array, and each
//! element of the array is a message object tagged by its `"cmd"` field.
//! Messages unknown to this crate are skipped while decoding, so the
//! service is free to grow its vocabulary without breaking older clients.

pub mod data;
mod decoder;
mod encoder;
mod errors;

pub use data::{CatalogTables, ClientMessage, ItemGrant, ServerMessage, SlotOptions};
pub use errors::WireError;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

/// Tokio codec that encodes outgoing client messages and decodes incoming
/// server message batches, one JSON array per line.
#[derive(Debug, Default)]
pub struct WireCodec;

impl WireCodec {
    /// Create a framed wire-protocol interface from an AsyncRead + AsyncWrite resource
    pub fn framed_io<Rw>(inner: Rw) -> Framed<Rw, WireCodec>
    where
        Rw: AsyncRead + AsyncWrite,
    {
        Framed::new(inner, WireCodec)
    }
}
