//! Received bus frames.
//!
//! A [`Frame`] is the unit handed from the receive interrupt to the dispatch
//! task: a 29-bit CAN identifier plus at most [`MAX_FRAME_PAYLOAD_LEN`] bytes of
//! payload. Frames are built once in interrupt context and never mutated after
//! being enqueued.

use crate::consts::MAX_FRAME_PAYLOAD_LEN;
use embedded_can::{ExtendedId, Id};
use heapless::Vec;
use thiserror::Error;

/// Fixed-capacity byte buffer sized for one CAN FD payload.
pub type Payload = Vec<u8, MAX_FRAME_PAYLOAD_LEN>;

/// Reasons a frame cannot be built.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FrameError {
    /// The payload exceeds [`MAX_FRAME_PAYLOAD_LEN`].
    #[error("payload of {0} bytes exceeds the frame capacity")]
    PayloadTooLong(usize),
    /// The identifier is not a 29-bit extended ID.
    #[error("frame identifier is not a 29-bit extended ID")]
    InvalidId,
}

/// One received CAN FD data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: ExtendedId,
    data: Payload,
}

impl Frame {
    /// Builds a frame from an extended identifier and a payload slice.
    pub fn from_parts(id: ExtendedId, data: &[u8]) -> Result<Self, FrameError> {
        let data = Vec::from_slice(data).map_err(|()| FrameError::PayloadTooLong(data.len()))?;
        Ok(Self { id, data })
    }

    /// Builds a frame from a raw identifier as read out of a receive mailbox.
    pub fn from_raw(raw_id: u32, data: &[u8]) -> Result<Self, FrameError> {
        let id = ExtendedId::new(raw_id).ok_or(FrameError::InvalidId)?;
        Self::from_parts(id, data)
    }

    /// The 29-bit bus address of the sender.
    pub fn bus_address(&self) -> ExtendedId {
        self.id
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Number of payload bytes.
    pub fn payload_len(&self) -> usize {
        self.data.len()
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Extended(id) => Self::from_parts(id, data).ok(),
            Id::Standard(_) => None,
        }
    }

    // CAN FD has no remote frames.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Extended(self.id)
    }

    fn dlc(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
