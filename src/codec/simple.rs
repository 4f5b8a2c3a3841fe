//! `simple` codec: command 0, token and payload only.

use bytes::{BufMut, Bytes, BytesMut};

use super::{token_and_payload, Codec};
use crate::error::Result;
use crate::message::Message;

/// Registry name.
pub const NAME: &str = "simple";

const COMMAND: u8 = 0;

/// Command-0 frame encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCodec;

impl Codec for SimpleCodec {
    fn encode(&self, message: &Message) -> Result<Bytes> {
        let (token, payload) = token_and_payload(message)?;

        let mut frame = BytesMut::with_capacity(1 + 2 + token.len() + 2 + payload.len());
        frame.put_u8(COMMAND);
        frame.put_u16(token.len() as u16);
        frame.put_slice(token);
        frame.put_u16(payload.len() as u16);
        frame.put_slice(&payload);
        Ok(frame.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let msg = Message::new().device_bytes(vec![0xaa, 0xbb]);
        let frame = SimpleCodec.encode(&msg).unwrap();

        let payload = br#"{"aps":{}}"#;
        assert_eq!(frame[0], 0);
        assert_eq!(&frame[1..3], &[0, 2]);
        assert_eq!(&frame[3..5], &[0xaa, 0xbb]);
        assert_eq!(&frame[5..7], &(payload.len() as u16).to_be_bytes());
        assert_eq!(&frame[7..], payload);
    }
}
