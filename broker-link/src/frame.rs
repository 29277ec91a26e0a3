//! hpfeeds wire format.
//!
//! Every frame is `u32` big-endian total length (header included), one opcode
//! byte, then an opcode-specific body. Short strings inside a body are
//! length-prefixed with a single byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::error::FrameError;

/// Length prefix plus opcode.
pub const HEADER_LEN: usize = 5;

/// Largest frame the broker accepts.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Length of the AUTH signature (SHA-1 digest).
pub const SIGNATURE_LEN: usize = 20;

/// hpfeeds opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Error = 0,
    Info = 1,
    Auth = 2,
    Publish = 3,
    Subscribe = 4,
    Unsubscribe = 5,
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            0 => Ok(Opcode::Error),
            1 => Ok(Opcode::Info),
            2 => Ok(Opcode::Auth),
            3 => Ok(Opcode::Publish),
            4 => Ok(Opcode::Subscribe),
            5 => Ok(Opcode::Unsubscribe),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

/// A decoded hpfeeds frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Broker-side error report
    Error { message: String },
    /// First frame of a session, carries the auth nonce
    Info { broker_name: String, nonce: Bytes },
    /// Client authentication
    Auth {
        ident: String,
        signature: [u8; SIGNATURE_LEN],
    },
    /// Message on a channel
    Publish {
        ident: String,
        channel: String,
        payload: Bytes,
    },
    /// Register interest in a channel
    Subscribe { ident: String, channel: String },
    /// Withdraw interest in a channel
    Unsubscribe { ident: String, channel: String },
}

impl Frame {
    /// Build the AUTH answer to an INFO nonce: `SHA1(nonce || secret)`.
    pub fn auth(ident: &str, secret: &str, nonce: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(secret.as_bytes());

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&hasher.finalize());

        Frame::Auth {
            ident: ident.to_string(),
            signature,
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Frame::Error { .. } => Opcode::Error,
            Frame::Info { .. } => Opcode::Info,
            Frame::Auth { .. } => Opcode::Auth,
            Frame::Publish { .. } => Opcode::Publish,
            Frame::Subscribe { .. } => Opcode::Subscribe,
            Frame::Unsubscribe { .. } => Opcode::Unsubscribe,
        }
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let mut body = BytesMut::new();

        match self {
            Frame::Error { message } => body.put_slice(message.as_bytes()),
            Frame::Info { broker_name, nonce } => {
                put_str8(&mut body, "broker name", broker_name)?;
                body.put_slice(nonce);
            }
            Frame::Auth { ident, signature } => {
                put_str8(&mut body, "ident", ident)?;
                body.put_slice(signature);
            }
            Frame::Publish {
                ident,
                channel,
                payload,
            } => {
                put_str8(&mut body, "ident", ident)?;
                put_str8(&mut body, "channel", channel)?;
                body.put_slice(payload);
            }
            Frame::Subscribe { ident, channel } | Frame::Unsubscribe { ident, channel } => {
                put_str8(&mut body, "ident", ident)?;
                body.put_slice(channel.as_bytes());
            }
        }

        let len = HEADER_LEN + body.len();
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(len));
        }

        dst.reserve(len);
        dst.put_u32(len as u32);
        dst.put_u8(self.opcode() as u8);
        dst.put_slice(&body);
        Ok(())
    }

    /// Encode into a standalone buffer.
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        let mut buffer = BytesMut::new();
        self.encode(&mut buffer)?;
        Ok(buffer.freeze())
    }

    /// Decode one frame from the front of `src`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes are
    /// removed from `src`; an incomplete frame is left in place.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len < HEADER_LEN {
            return Err(FrameError::TooShort(len));
        }
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(len));
        }
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(len).freeze();
        frame.advance(4);
        let opcode = frame.get_u8();

        parse_body(Opcode::try_from(opcode)?, frame).map(Some)
    }
}

fn parse_body(opcode: Opcode, mut body: Bytes) -> Result<Frame, FrameError> {
    match opcode {
        Opcode::Error => Ok(Frame::Error {
            message: String::from_utf8_lossy(&body).into_owned(),
        }),
        Opcode::Info => {
            let broker_name = take_str8(&mut body, "broker name")?;
            Ok(Frame::Info {
                broker_name,
                nonce: body,
            })
        }
        Opcode::Auth => {
            let ident = take_str8(&mut body, "ident")?;
            if body.len() != SIGNATURE_LEN {
                return Err(FrameError::Truncated { field: "signature" });
            }
            let mut signature = [0u8; SIGNATURE_LEN];
            body.copy_to_slice(&mut signature);
            Ok(Frame::Auth { ident, signature })
        }
        Opcode::Publish => {
            let ident = take_str8(&mut body, "ident")?;
            let channel = take_str8(&mut body, "channel")?;
            Ok(Frame::Publish {
                ident,
                channel,
                payload: body,
            })
        }
        Opcode::Subscribe | Opcode::Unsubscribe => {
            let ident = take_str8(&mut body, "ident")?;
            let channel = String::from_utf8(body.to_vec())
                .map_err(|_| FrameError::InvalidText { field: "channel" })?;
            if opcode == Opcode::Subscribe {
                Ok(Frame::Subscribe { ident, channel })
            } else {
                Ok(Frame::Unsubscribe { ident, channel })
            }
        }
    }
}

fn put_str8(dst: &mut BytesMut, field: &'static str, value: &str) -> Result<(), FrameError> {
    let len = value.len();
    if len > u8::MAX as usize {
        return Err(FrameError::FieldTooLong { field, len });
    }
    dst.put_u8(len as u8);
    dst.put_slice(value.as_bytes());
    Ok(())
}

fn take_str8(body: &mut Bytes, field: &'static str) -> Result<String, FrameError> {
    if !body.has_remaining() {
        return Err(FrameError::Truncated { field });
    }
    let len = body.get_u8() as usize;
    if body.remaining() < len {
        return Err(FrameError::Truncated { field });
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| FrameError::InvalidText { field })
}
