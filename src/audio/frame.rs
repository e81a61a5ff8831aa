use thiserror::Error;

use crate::constants::{FRAME_INDEX_BYTES, FRAME_TOTAL_BYTES};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {len} bytes")]
    Truncated { len: usize },

    #[error("frame out of order: expected index {expected}, got {actual}")]
    OutOfOrder { expected: u32, actual: u32 },

    #[error("expected {expected} frames, got {actual}")]
    CountMismatch { expected: u32, actual: u32 },
}

/// One binary audio frame.
///
/// Layout: `[u32 BE index]`, then on frame 0 only `[u32 BE total]`, then the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub index: u32,
    /// Set on frame 0 only.
    pub total_chunks: Option<u32>,
    pub payload: Vec<u8>,
}

impl AudioFrame {
    pub fn encode(&self) -> Vec<u8> {
        let header = FRAME_INDEX_BYTES + self.total_chunks.map_or(0, |_| FRAME_TOTAL_BYTES);
        let mut out = Vec::with_capacity(header + self.payload.len());
        out.extend_from_slice(&self.index.to_be_bytes());
        if let Some(total) = self.total_chunks {
            out.extend_from_slice(&total.to_be_bytes());
        }
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let index = read_u32(bytes, 0)?;
        if index == 0 {
            let total = read_u32(bytes, FRAME_INDEX_BYTES)?;
            Ok(Self {
                index,
                total_chunks: Some(total),
                payload: bytes[FRAME_INDEX_BYTES + FRAME_TOTAL_BYTES..].to_vec(),
            })
        } else {
            Ok(Self {
                index,
                total_chunks: None,
                payload: bytes[FRAME_INDEX_BYTES..].to_vec(),
            })
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, FrameError> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(FrameError::Truncated { len: bytes.len() })
}

/// `ceil(len / chunk_size)`; zero for empty audio.
pub fn chunk_count(len: usize, chunk_size: usize) -> u32 {
    len.div_ceil(chunk_size.max(1)) as u32
}

/// Splits `audio` into frames of at most `chunk_size` payload bytes.
pub fn split_frames(audio: &[u8], chunk_size: usize) -> impl Iterator<Item = AudioFrame> + '_ {
    let total = chunk_count(audio.len(), chunk_size);
    audio
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(move |(i, payload)| AudioFrame {
            index: i as u32,
            total_chunks: (i == 0).then_some(total),
            payload: payload.to_vec(),
        })
}

/// Client-side reassembly: validates ordering and count, concatenates payloads.
pub fn reassemble<B: AsRef<[u8]>>(frames: &[B]) -> Result<Vec<u8>, FrameError> {
    let mut audio = Vec::new();
    let mut expected_total = None;

    for (i, raw) in frames.iter().enumerate() {
        let frame = AudioFrame::decode(raw.as_ref())?;
        if frame.index != i as u32 {
            return Err(FrameError::OutOfOrder {
                expected: i as u32,
                actual: frame.index,
            });
        }
        if let Some(total) = frame.total_chunks {
            expected_total = Some(total);
        }
        audio.extend_from_slice(&frame.payload);
    }

    let actual = frames.len() as u32;
    match expected_total {
        Some(expected) if expected != actual => Err(FrameError::CountMismatch { expected, actual }),
        _ => Ok(audio),
    }
}
