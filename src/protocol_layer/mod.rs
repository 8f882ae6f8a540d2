//! The protocol layer frames messages for the FIFO of the port controller, and parses received
//! frames.
//!
//! Transmission uses the FIFO token stream of the FUSB302. GoodCRC replies are generated and
//! consumed by the chip itself, so received GoodCRC messages never leave this layer.
pub mod message;

use fusb302_pd_traits::RegisterAccess;
use heapless::Vec;
use message::header::{ControlMessageType, Header};
use message::{MAX_DATA_OBJECTS, Message};

use crate::registers::{Register, token};

/// Largest frame, consisting of sync tokens, header, data objects and trailing tokens.
pub const MAX_FRAME_SIZE: usize = 4 + 1 + 2 + MAX_DATA_OBJECTS * 4 + 4;

/// A frame of FIFO tokens and message bytes.
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

/// Errors that can occur during message/header parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// The input buffer has an invalid length.
    /// * `expected` - The expected length.
    /// * `found` - The actual length found.
    #[error("invalid input buffer length (expected {expected:?}, found {found:?})")]
    InvalidLength {
        /// The expected length.
        expected: usize,
        /// The actual length found.
        found: usize,
    },
    /// The specification revision field is not supported.
    #[error("unsupported specification revision `{0}`")]
    UnsupportedSpecificationRevision(u8),
}

/// Encode a message into the token stream of the transmit FIFO.
pub fn encode(message: &Message) -> Frame {
    let mut body = [0u8; 2 + MAX_DATA_OBJECTS * 4];
    let length = message.to_bytes(&mut body);

    let mut frame = Frame::new();
    // All pushes fit, the frame is sized for the largest message.
    let _ = frame.extend_from_slice(&[token::SYNC1, token::SYNC1, token::SYNC1, token::SYNC2]);
    let _ = frame.push(token::PACKSYM | (length as u8 & 0x1f));
    let _ = frame.extend_from_slice(&body[..length]);
    let _ = frame.extend_from_slice(&[token::JAM_CRC, token::EOP, token::TX_OFF, token::TX_ON]);

    frame
}

/// Decode a frame that was produced by [`encode`].
pub fn decode(frame: &[u8]) -> Result<Message, ParseError> {
    const PREAMBLE: usize = 5;

    if frame.len() < PREAMBLE + 2 {
        return Err(ParseError::InvalidLength {
            expected: PREAMBLE + 2,
            found: frame.len(),
        });
    }

    let length = usize::from(frame[PREAMBLE - 1] & 0x1f);
    if frame.len() < PREAMBLE + length || length < 2 {
        return Err(ParseError::InvalidLength {
            expected: PREAMBLE + length.max(2),
            found: frame.len(),
        });
    }

    Message::from_bytes(
        &frame[PREAMBLE..PREAMBLE + 2],
        &frame[PREAMBLE + 2..PREAMBLE + length],
    )
}

/// Write a frame into the transmit FIFO.
pub fn transmit<R: RegisterAccess>(registers: &mut R, message: &Message) -> Result<(), R::Error> {
    let frame = encode(message);
    trace!("Transmit frame {:?}", frame.as_slice());

    registers.raw_write(Register::Fifo.into(), &frame)
}

/// Read the next message from the receive FIFO.
///
/// GoodCRC messages are discarded, until another message is found.
pub fn receive<R: RegisterAccess>(registers: &mut R) -> Result<Message, R::Error> {
    loop {
        // SOP token and the header.
        let mut head = [0u8; 3];
        registers.raw_read(Register::Fifo.into(), &mut head)?;

        let header = Header::from_bytes(&head[1..]).unwrap_or_default();

        // Data objects and the CRC.
        let mut payload = [0u8; MAX_DATA_OBJECTS * 4 + 4];
        let length = header.num_objects().min(MAX_DATA_OBJECTS) * 4 + 4;
        registers.raw_read(Register::Fifo.into(), &mut payload[..length])?;

        if header.is_control(ControlMessageType::GoodCRC) {
            trace!("Skip GoodCRC");
            continue;
        }

        return Ok(Message::from_bytes(&head[1..], &payload[..length]).unwrap_or_else(|_| Message::new(header)));
    }
}
