//! In-flight packet buffers.

use bytes::{Bytes, BytesMut};

use crate::wire::{DdpHeader, HEADER_LEN};

/// An owned DDP datagram: header fields plus the raw wire bytes
/// (header + payload) that were parsed from, or will be serialized to,
/// the link layer.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: DdpHeader,
    pub dev_id: String,
    frame: Bytes,
}

impl Packet {
    /// Build a packet from a header and payload, encoding the wire frame.
    pub fn build(header: DdpHeader, payload: &[u8], dev_id: impl Into<String>) -> Self {
        let mut buf = BytesMut::zeroed(HEADER_LEN + payload.len());
        header.write(&mut buf);
        buf[HEADER_LEN..].copy_from_slice(payload);
        Self {
            header,
            dev_id: dev_id.into(),
            frame: buf.freeze(),
        }
    }

    /// Parse a packet from a raw wire frame received on `dev_id`.
    /// Returns `None` if the frame is shorter than the header.
    pub fn parse(frame: &[u8], dev_id: impl Into<String>) -> Option<Self> {
        let header = DdpHeader::parse(frame)?;
        Some(Self {
            header,
            dev_id: dev_id.into(),
            frame: Bytes::copy_from_slice(frame),
        })
    }

    /// The full wire frame (header + payload).
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// The payload only (frame with the header stripped).
    pub fn payload(&self) -> &[u8] {
        &self.frame[HEADER_LEN.min(self.frame.len())..]
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Re-encode `header` into this packet's stored frame in place,
    /// leaving the payload bytes untouched. Used by the forwarding path
    /// to bump `hops` without reparsing the payload.
    pub fn rewrite_header(&mut self, header: DdpHeader) {
        let mut buf = BytesMut::from(&self.frame[..]);
        header.write(&mut buf);
        self.header = header;
        self.frame = buf.freeze();
    }

    /// Truncate the stored frame to `new_len` bytes.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len < self.frame.len() {
            self.frame = self.frame.slice(0..new_len);
        }
    }
}
