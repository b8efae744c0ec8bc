//! Wire frame encoder

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::{ClientMessage, WireCodec, WireError};

impl Encoder<Vec<ClientMessage>> for WireCodec {
    type Error = WireError;

    fn encode(&mut self, batch: Vec<ClientMessage>, dst: &mut BytesMut) -> Result<(), WireError> {
        let payload = serde_json::to_vec(&batch)?;
        trace!("sending frame: {}", String::from_utf8_lossy(&payload));
        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Encoder<ClientMessage> for WireCodec {
    type Error = WireError;

    fn encode(&mut self, message: ClientMessage, dst: &mut BytesMut) -> Result<(), WireError> {
        self.encode(vec![message], dst)
    }
}
