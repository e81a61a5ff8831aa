//! Chunked binary audio delivery.
//!
//! Each transfer is framed by JSON control messages:
//!
//! ```text
//! {"type":"audio_start","requestId":..,"fileName":..,"totalChunks":N,"chunkSize":C}
//! [0u32 BE][N u32 BE][payload]   frame 0
//! [i u32 BE][payload]            frames 1..N-1
//! {"type":"audio_complete","requestId":..,"fileName":..,"totalChunks":N,"chunksSent":N}
//! ```

pub mod frame;
pub mod streamer;

#[cfg(test)]
mod tests;

pub use frame::{AudioFrame, FrameError, chunk_count, reassemble, split_frames};
pub use streamer::{AudioChunkStreamer, StreamReport};
