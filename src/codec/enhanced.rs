//! `enhanced` codec: command 1, adds identifier and expiry.
//!
//! The identifier comes back in gateway error responses, which is what makes
//! rejected notifications attributable.

use bytes::{BufMut, Bytes, BytesMut};

use super::{token_and_payload, Codec};
use crate::error::Result;
use crate::message::Message;

/// Registry name.
pub const NAME: &str = "enhanced";

const COMMAND: u8 = 1;

/// Command-1 frame encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnhancedCodec;

impl Codec for EnhancedCodec {
    fn encode(&self, message: &Message) -> Result<Bytes> {
        let (token, payload) = token_and_payload(message)?;

        let mut frame = BytesMut::with_capacity(1 + 4 + 4 + 2 + token.len() + 2 + payload.len());
        frame.put_u8(COMMAND);
        frame.put_u32(message.id());
        frame.put_u32(message.expiry_timestamp());
        frame.put_u16(token.len() as u16);
        frame.put_slice(token);
        frame.put_u16(payload.len() as u16);
        frame.put_slice(&payload);
        Ok(frame.freeze())
    }
}
