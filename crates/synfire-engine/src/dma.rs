// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! DMA channel abstraction with double-buffered row storage.
//!
//! The scheduler only ever talks to the [`DmaChannel`] trait; on hardware the
//! implementation programs the controller registers, while [`HostDma`] backs
//! the same surface with a shared byte vector so the whole pipeline runs in
//! tests.
//!
//! Completion is polled through a [`Timeout`] so a wedged transfer surfaces
//! as a typed error with the poll count attached instead of hanging the
//! timestep.

use std::hint;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DmaError {
    #[error("dma transfer did not complete within {polls} polls")]
    Timeout { polls: u32 },
    #[error("transfer of {bytes} bytes exceeds the {capacity}-byte row buffer")]
    TransferTooLarge { bytes: usize, capacity: usize },
    #[error("address {address:#010x}..+{bytes} is outside backing memory of {size} bytes")]
    AddressOutOfRange { address: u32, bytes: usize, size: usize },
    #[error("complete() called with no transfer in flight")]
    NoTransferInFlight,
}

/// Which of the two ping-pong row buffers a transfer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBufferId {
    A,
    B,
}

impl RowBufferId {
    pub fn other(self) -> Self {
        match self {
            RowBufferId::A => RowBufferId::B,
            RowBufferId::B => RowBufferId::A,
        }
    }
}

/// Details of a finished transfer, reported by [`DmaChannel::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCompletion {
    pub buffer: RowBufferId,
    pub address: u32,
    pub bytes: usize,
    pub was_write: bool,
}

/// Bounded polling loop for transfer completion.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    pub poll_limit: u32,
}

impl Timeout {
    pub fn new(poll_limit: u32) -> Self {
        Self { poll_limit }
    }

    /// Polls `ready` until it returns true or the limit is hit.
    pub fn wait_for(&self, mut ready: impl FnMut() -> bool) -> Result<(), DmaError> {
        for _ in 0..self.poll_limit {
            if ready() {
                return Ok(());
            }
            hint::spin_loop();
        }
        Err(DmaError::Timeout { polls: self.poll_limit })
    }
}

/// One DMA channel with two row buffers attached.
///
/// At most one transfer is in flight at a time; the scheduler serializes
/// read/write issue itself and only overlaps transfer with decode of the
/// other buffer.
pub trait DmaChannel {
    /// Begin reading `bytes` from `address` into `buffer`.
    fn start_read(&mut self, buffer: RowBufferId, address: u32, bytes: usize)
        -> Result<(), DmaError>;

    /// Begin writing the first `bytes` of `buffer` back to `address`.
    fn start_write(&mut self, buffer: RowBufferId, address: u32, bytes: usize)
        -> Result<(), DmaError>;

    /// Block (bounded by `timeout`) until the in-flight transfer finishes.
    fn complete(&mut self, timeout: &Timeout) -> Result<DmaCompletion, DmaError>;

    /// Abandon the in-flight transfer, if any. Used at deadline preemption.
    fn cancel(&mut self);

    fn in_flight(&self) -> bool;

    fn buffer(&self, id: RowBufferId) -> &[u8];

    fn buffer_mut(&mut self, id: RowBufferId) -> &mut [u8];

    /// Read one little-endian word straight from backing memory, bypassing
    /// the row buffers. Used for direct single-synapse rows.
    fn read_word(&self, address: u32) -> Result<u32, DmaError>;

    /// Transfers completed since construction.
    fn completed_transfers(&self) -> u64;
}

/// Shared backing memory for [`HostDma`], standing in for SDRAM.
pub type SharedSdram = Arc<RwLock<Vec<u8>>>;

pub fn shared_sdram(bytes: Vec<u8>) -> SharedSdram {
    Arc::new(RwLock::new(bytes))
}

struct InFlight {
    buffer: RowBufferId,
    address: u32,
    bytes: usize,
    was_write: bool,
}

/// Host-side [`DmaChannel`] that copies synchronously but reports completion
/// through the same polled interface the hardware channel uses.
pub struct HostDma {
    sdram: SharedSdram,
    buffer_a: Vec<u8>,
    buffer_b: Vec<u8>,
    in_flight: Option<InFlight>,
    completed: u64,
}

impl HostDma {
    pub fn new(sdram: SharedSdram, row_buffer_words: usize) -> Self {
        let capacity = row_buffer_words * 4;
        Self {
            sdram,
            buffer_a: vec![0; capacity],
            buffer_b: vec![0; capacity],
            in_flight: None,
            completed: 0,
        }
    }

    fn check_bounds(&self, address: u32, bytes: usize) -> Result<(), DmaError> {
        let size = self.sdram.read().len();
        let end = address as usize + bytes;
        if end > size {
            return Err(DmaError::AddressOutOfRange { address, bytes, size });
        }
        let capacity = self.buffer_a.len();
        if bytes > capacity {
            return Err(DmaError::TransferTooLarge { bytes, capacity });
        }
        Ok(())
    }

    fn local(&mut self, id: RowBufferId) -> &mut Vec<u8> {
        match id {
            RowBufferId::A => &mut self.buffer_a,
            RowBufferId::B => &mut self.buffer_b,
        }
    }
}

impl DmaChannel for HostDma {
    fn start_read(
        &mut self,
        buffer: RowBufferId,
        address: u32,
        bytes: usize,
    ) -> Result<(), DmaError> {
        self.check_bounds(address, bytes)?;
        let start = address as usize;
        {
            let sdram = self.sdram.clone();
            let sdram = sdram.read();
            self.local(buffer)[..bytes].copy_from_slice(&sdram[start..start + bytes]);
        }
        self.in_flight = Some(InFlight { buffer, address, bytes, was_write: false });
        Ok(())
    }

    fn start_write(
        &mut self,
        buffer: RowBufferId,
        address: u32,
        bytes: usize,
    ) -> Result<(), DmaError> {
        self.check_bounds(address, bytes)?;
        let start = address as usize;
        {
            let sdram = self.sdram.clone();
            let mut sdram = sdram.write();
            let local = self.local(buffer);
            sdram[start..start + bytes].copy_from_slice(&local[..bytes]);
        }
        self.in_flight = Some(InFlight { buffer, address, bytes, was_write: true });
        Ok(())
    }

    fn complete(&mut self, timeout: &Timeout) -> Result<DmaCompletion, DmaError> {
        let pending = self.in_flight.take().ok_or(DmaError::NoTransferInFlight)?;
        // The host copy already happened; the poll still runs so the timeout
        // path is exercised with poll_limit = 0.
        timeout.wait_for(|| true)?;
        self.completed += 1;
        Ok(DmaCompletion {
            buffer: pending.buffer,
            address: pending.address,
            bytes: pending.bytes,
            was_write: pending.was_write,
        })
    }

    fn cancel(&mut self) {
        self.in_flight = None;
    }

    fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn buffer(&self, id: RowBufferId) -> &[u8] {
        match id {
            RowBufferId::A => &self.buffer_a,
            RowBufferId::B => &self.buffer_b,
        }
    }

    fn buffer_mut(&mut self, id: RowBufferId) -> &mut [u8] {
        self.local(id)
    }

    fn read_word(&self, address: u32) -> Result<u32, DmaError> {
        let sdram = self.sdram.read();
        let start = address as usize;
        let end = start + 4;
        if end > sdram.len() {
            return Err(DmaError::AddressOutOfRange {
                address,
                bytes: 4,
                size: sdram.len(),
            });
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&sdram[start..end]);
        Ok(u32::from_le_bytes(word))
    }

    fn completed_transfers(&self) -> u64 {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sdram_with_words(words: &[u32]) -> SharedSdram {
        let mut bytes = Vec::with_capacity(words.len() * 4);
        for w in words {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        shared_sdram(bytes)
    }

    #[test]
    fn read_fills_target_buffer() {
        let sdram = sdram_with_words(&[0x11111111, 0x22222222, 0x33333333]);
        let mut dma = HostDma::new(sdram, 8);
        dma.start_read(RowBufferId::A, 4, 8).unwrap();
        assert!(dma.in_flight());
        let done = dma.complete(&Timeout::new(10)).unwrap();
        assert_eq!(done.buffer, RowBufferId::A);
        assert_eq!(done.bytes, 8);
        assert!(!done.was_write);
        assert_eq!(&dma.buffer(RowBufferId::A)[..4], &0x22222222u32.to_le_bytes());
        assert_eq!(dma.completed_transfers(), 1);
    }

    #[test]
    fn write_lands_in_sdram() {
        let sdram = sdram_with_words(&[0, 0, 0]);
        let mut dma = HostDma::new(sdram.clone(), 8);
        dma.buffer_mut(RowBufferId::B)[..4].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        dma.start_write(RowBufferId::B, 8, 4).unwrap();
        dma.complete(&Timeout::new(10)).unwrap();
        let mem = sdram.read();
        assert_eq!(&mem[8..12], &0xDEADBEEFu32.to_le_bytes());
    }

    #[test]
    fn out_of_range_transfer_rejected() {
        let sdram = sdram_with_words(&[0; 2]);
        let mut dma = HostDma::new(sdram, 8);
        let err = dma.start_read(RowBufferId::A, 4, 8).unwrap_err();
        assert!(matches!(err, DmaError::AddressOutOfRange { .. }));
        assert!(!dma.in_flight());
    }

    #[test]
    fn oversized_transfer_rejected() {
        let sdram = sdram_with_words(&[0; 64]);
        let mut dma = HostDma::new(sdram, 4);
        let err = dma.start_read(RowBufferId::A, 0, 64).unwrap_err();
        assert_eq!(err, DmaError::TransferTooLarge { bytes: 64, capacity: 16 });
    }

    #[test]
    fn complete_without_transfer_is_an_error() {
        let sdram = sdram_with_words(&[0; 4]);
        let mut dma = HostDma::new(sdram, 4);
        assert_eq!(
            dma.complete(&Timeout::new(10)).unwrap_err(),
            DmaError::NoTransferInFlight
        );
    }

    #[test]
    fn timeout_reports_poll_count() {
        let timeout = Timeout::new(17);
        let err = timeout.wait_for(|| false).unwrap_err();
        assert_eq!(err, DmaError::Timeout { polls: 17 });
    }

    #[test]
    fn cancel_clears_in_flight() {
        let sdram = sdram_with_words(&[1, 2, 3, 4]);
        let mut dma = HostDma::new(sdram, 8);
        dma.start_read(RowBufferId::A, 0, 8).unwrap();
        dma.cancel();
        assert!(!dma.in_flight());
        assert_eq!(
            dma.complete(&Timeout::new(10)).unwrap_err(),
            DmaError::NoTransferInFlight
        );
    }

    #[test]
    fn read_word_bypasses_buffers() {
        let sdram = sdram_with_words(&[0xAAAA5555, 0x12345678]);
        let dma = HostDma::new(sdram, 4);
        assert_eq!(dma.read_word(4).unwrap(), 0x12345678);
        assert!(matches!(
            dma.read_word(8).unwrap_err(),
            DmaError::AddressOutOfRange { .. }
        ));
    }
}
