//! Definitions of message content.
pub mod header;
pub mod pdo;
pub mod request;
pub mod vendor_defined;

use byteorder::{ByteOrder, LittleEndian};
use header::{ControlMessageType, DataMessageType, Header};
use heapless::Vec;

use crate::protocol_layer::ParseError;

/// The maximum number of data objects in a message.
pub const MAX_DATA_OBJECTS: usize = 7;

/// A USB PD message, a header followed by up to seven data objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// The message header.
    pub header: Header,
    /// The data objects, as many as announced by the header.
    pub objects: Vec<u32, MAX_DATA_OBJECTS>,
}

impl Message {
    /// Create a new message from a message header, without data objects.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            objects: Vec::new(),
        }
    }

    /// Create a new message from a header and data objects.
    ///
    /// Objects beyond the maximum count are dropped, and the header's object count is adjusted.
    pub fn new_with_objects(header: Header, objects: &[u32]) -> Self {
        let count = objects.len().min(MAX_DATA_OBJECTS);
        let mut message = Self::new(header.with_num_objects(count as u8));

        for object in &objects[..count] {
            // Cannot fail, the count was limited above.
            let _ = message.objects.push(*object);
        }

        message
    }

    /// The data object at the given index, or zero if there is none.
    pub fn object(&self, index: usize) -> u32 {
        self.objects.get(index).copied().unwrap_or(0)
    }

    /// Whether this is the given control message.
    pub fn is_control(&self, message_type: ControlMessageType) -> bool {
        self.header.is_control(message_type)
    }

    /// Whether this is the given data message.
    pub fn is_data(&self, message_type: DataMessageType) -> bool {
        self.header.is_data(message_type)
    }

    /// Serialize a message to a slice, returning the number of written bytes.
    pub fn to_bytes(&self, buffer: &mut [u8]) -> usize {
        let mut length = self.header.to_bytes(buffer);

        for object in &self.objects {
            LittleEndian::write_u32(&mut buffer[length..length + 4], *object);
            length += 4;
        }

        length
    }

    /// Parse a message from a header and the payload that follows it.
    ///
    /// The payload may contain trailing bytes, e.g. the CRC.
    pub fn from_bytes(header: &[u8], payload: &[u8]) -> Result<Self, ParseError> {
        let header = Header::from_bytes(header)?;
        let count = header.num_objects().min(MAX_DATA_OBJECTS);

        if payload.len() < count * 4 {
            return Err(ParseError::InvalidLength {
                expected: count * 4,
                found: payload.len(),
            });
        }

        let mut message = Self::new(header);
        for chunk in payload[..count * 4].chunks_exact(4) {
            let _ = message.objects.push(LittleEndian::read_u32(chunk));
        }

        Ok(message)
    }
}
