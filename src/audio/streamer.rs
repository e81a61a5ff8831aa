use serde::Serialize;
use tracing::{debug, info};

use super::frame::{chunk_count, split_frames};
use crate::transport::{ConnectionSink, TransportError};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AudioControl<'a> {
    #[serde(rename_all = "camelCase")]
    AudioStart {
        request_id: &'a str,
        file_name: &'a str,
        total_chunks: u32,
        chunk_size: usize,
    },
    #[serde(rename_all = "camelCase")]
    AudioComplete {
        request_id: &'a str,
        file_name: &'a str,
        total_chunks: u32,
        chunks_sent: u32,
    },
}

/// What reached the client during one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    pub total_chunks: u32,
    pub chunks_sent: u32,
    /// `audio_complete` was delivered.
    pub completed: bool,
}

/// Sends an audio blob as `audio_start`, numbered binary frames, `audio_complete`.
#[derive(Debug, Clone, Copy)]
pub struct AudioChunkStreamer {
    chunk_size: usize,
}

impl AudioChunkStreamer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Streams `audio` over `sink`.
    ///
    /// A connection that closes mid-transfer stops the stream quietly; the report says how
    /// far it got. Only encoding failures are returned as errors.
    pub fn stream(
        &self,
        sink: &ConnectionSink,
        audio: &[u8],
        request_id: &str,
        file_name: &str,
    ) -> Result<StreamReport, TransportError> {
        let total_chunks = chunk_count(audio.len(), self.chunk_size);
        let mut report = StreamReport {
            total_chunks,
            chunks_sent: 0,
            completed: false,
        };

        let start = AudioControl::AudioStart {
            request_id,
            file_name,
            total_chunks,
            chunk_size: self.chunk_size,
        };
        if let Some(report) = closed_or(sink.send_json(&start), report)? {
            return Ok(report);
        }

        for frame in split_frames(audio, self.chunk_size) {
            if let Some(report) = closed_or(sink.send_binary(frame.encode()), report)? {
                return Ok(report);
            }
            report.chunks_sent += 1;
        }

        let complete = AudioControl::AudioComplete {
            request_id,
            file_name,
            total_chunks,
            chunks_sent: report.chunks_sent,
        };
        if let Some(report) = closed_or(sink.send_json(&complete), report)? {
            return Ok(report);
        }

        report.completed = true;
        debug!(request_id, file_name, total_chunks, bytes = audio.len(), "Audio streamed");
        Ok(report)
    }
}

/// `Ok(Some(report))` when the peer is gone, `Ok(None)` to continue.
fn closed_or(
    sent: Result<(), TransportError>,
    report: StreamReport,
) -> Result<Option<StreamReport>, TransportError> {
    match sent {
        Ok(()) => Ok(None),
        Err(TransportError::Closed) => {
            info!(
                chunks_sent = report.chunks_sent,
                total_chunks = report.total_chunks,
                "Connection closed during audio transfer"
            );
            Ok(Some(report))
        }
        Err(e) => Err(e),
    }
}
