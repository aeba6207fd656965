//! Multipart frame codec.
//!
//! The wire unit is a sequence of frames terminated by a frame whose MORE
//! flag is clear. Each frame is `[flags: u8] [length: u32 BE] [body]`.
//! The codec plugs into `tokio_util::codec` framed streams on both the
//! router and dialer sides.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// MORE bit: another frame belongs to the same message.
const FLAG_MORE: u8 = 0x01;

/// Per-frame header: flags byte plus big-endian length.
const FRAME_HEADER_LEN: usize = 5;

/// Upper bound on a single frame body. Large enough for mesh payloads,
/// small enough that a corrupt length field cannot exhaust memory.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Transport-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge(usize),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("reply timed out")]
    Timeout,
}

/// Codec for multipart messages: `Vec<Bytes>` in, `Vec<Bytes>` out.
#[derive(Debug, Default)]
pub struct MultipartCodec {
    partial: Vec<Bytes>,
}

impl MultipartCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for MultipartCodec {
    type Item = Vec<Bytes>;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < FRAME_HEADER_LEN {
                return Ok(None);
            }
            let flags = src[0];
            let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
            if len > MAX_FRAME_SIZE {
                return Err(TransportError::FrameTooLarge(len));
            }
            if src.len() < FRAME_HEADER_LEN + len {
                src.reserve(FRAME_HEADER_LEN + len - src.len());
                return Ok(None);
            }
            src.advance(FRAME_HEADER_LEN);
            self.partial.push(src.split_to(len).freeze());
            if flags & FLAG_MORE == 0 {
                return Ok(Some(std::mem::take(&mut self.partial)));
            }
        }
    }
}

impl Encoder<Vec<Bytes>> for MultipartCodec {
    type Error = TransportError;

    fn encode(&mut self, frames: Vec<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // A message with no frames still needs a terminator on the wire.
        if frames.is_empty() {
            dst.reserve(FRAME_HEADER_LEN);
            dst.put_u8(0);
            dst.put_u32(0);
            return Ok(());
        }
        let total: usize = frames.iter().map(|f| FRAME_HEADER_LEN + f.len()).sum();
        dst.reserve(total);
        let last = frames.len() - 1;
        for (index, frame) in frames.into_iter().enumerate() {
            if frame.len() > MAX_FRAME_SIZE {
                return Err(TransportError::FrameTooLarge(frame.len()));
            }
            dst.put_u8(if index == last { 0 } else { FLAG_MORE });
            dst.put_u32(frame.len() as u32);
            dst.put_slice(&frame);
        }
        Ok(())
    }
}
