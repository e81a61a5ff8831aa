use serde_json::Value;

use super::*;
use crate::transport::{ConnectionSink, OutboundMessage};

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn json(msg: &OutboundMessage) -> Value {
    match msg {
        OutboundMessage::Text(t) => serde_json::from_str(t).unwrap(),
        other => panic!("expected text message, got {other:?}"),
    }
}

#[test]
fn test_chunk_count() {
    assert_eq!(chunk_count(0, 3072), 0);
    assert_eq!(chunk_count(1, 3072), 1);
    assert_eq!(chunk_count(3072, 3072), 1);
    assert_eq!(chunk_count(3073, 3072), 2);
    assert_eq!(chunk_count(10_000, 3072), 4);
}

#[test]
fn test_frame_layout() {
    let frames: Vec<_> = split_frames(&[1, 2, 3, 4, 5], 2).collect();
    assert_eq!(frames.len(), 3);

    assert_eq!(frames[0].encode(), vec![0, 0, 0, 0, 0, 0, 0, 3, 1, 2]);
    assert_eq!(frames[1].encode(), vec![0, 0, 0, 1, 3, 4]);
    assert_eq!(frames[2].encode(), vec![0, 0, 0, 2, 5]);
}

#[test]
fn test_frame_decode() {
    let frame = AudioFrame::decode(&[0, 0, 0, 0, 0, 0, 0, 2, 9]).unwrap();
    assert_eq!(frame.index, 0);
    assert_eq!(frame.total_chunks, Some(2));
    assert_eq!(frame.payload, vec![9]);

    assert_eq!(
        AudioFrame::decode(&[0, 0, 1]),
        Err(FrameError::Truncated { len: 3 })
    );
    // frame 0 must carry the total
    assert!(AudioFrame::decode(&[0, 0, 0, 0, 1]).is_err());
}

#[test]
fn test_reassemble_restores_audio() {
    let audio: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let frames: Vec<Vec<u8>> = split_frames(&audio, 3072).map(|f| f.encode()).collect();

    assert_eq!(frames.len(), 4);
    assert_eq!(reassemble(&frames).unwrap(), audio);
}

#[test]
fn test_reassemble_detects_reordering_and_loss() {
    let frames: Vec<Vec<u8>> = split_frames(&[1, 2, 3, 4], 1).map(|f| f.encode()).collect();

    let swapped = vec![frames[0].clone(), frames[2].clone(), frames[1].clone()];
    assert_eq!(
        reassemble(&swapped),
        Err(FrameError::OutOfOrder {
            expected: 1,
            actual: 2
        })
    );
    assert_eq!(
        reassemble(&frames[..3]),
        Err(FrameError::CountMismatch {
            expected: 4,
            actual: 3
        })
    );
}

#[test]
fn test_stream_sends_control_messages_and_frames() {
    let (sink, mut rx) = ConnectionSink::channel();
    let streamer = AudioChunkStreamer::new(4);
    let audio = vec![7u8; 10];

    let report = streamer.stream(&sink, &audio, "req-1", "tts_req-1_0.wav").unwrap();
    assert_eq!(
        report,
        StreamReport {
            total_chunks: 3,
            chunks_sent: 3,
            completed: true
        }
    );

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 5);

    let start = json(&messages[0]);
    assert_eq!(start["type"], "audio_start");
    assert_eq!(start["requestId"], "req-1");
    assert_eq!(start["fileName"], "tts_req-1_0.wav");
    assert_eq!(start["totalChunks"], 3);
    assert_eq!(start["chunkSize"], 4);

    let frames: Vec<Vec<u8>> = messages[1..4]
        .iter()
        .map(|m| match m {
            OutboundMessage::Binary(b) => b.clone(),
            other => panic!("expected binary frame, got {other:?}"),
        })
        .collect();
    assert_eq!(reassemble(&frames).unwrap(), audio);

    let complete = json(&messages[4]);
    assert_eq!(complete["type"], "audio_complete");
    assert_eq!(complete["totalChunks"], 3);
    assert_eq!(complete["chunksSent"], 3);
}

#[test]
fn test_stream_on_closed_connection_is_not_an_error() {
    let (sink, rx) = ConnectionSink::channel();
    drop(rx);

    let report = AudioChunkStreamer::new(4)
        .stream(&sink, &[0u8; 16], "req", "f.wav")
        .unwrap();

    assert_eq!(report.total_chunks, 4);
    assert_eq!(report.chunks_sent, 0);
    assert!(!report.completed);
    assert!(sink.is_closed());
}

#[test]
fn test_stream_stops_when_closed_mid_transfer() {
    let (sink, mut rx) = ConnectionSink::channel();
    let streamer = AudioChunkStreamer::new(4);

    // peer acknowledges the start, then goes away
    streamer.stream(&sink, &[1u8; 4], "warmup", "w.wav").unwrap();
    assert_eq!(drain(&mut rx).len(), 3);
    sink.mark_closed();

    let report = streamer.stream(&sink, &[0u8; 16], "req", "f.wav").unwrap();
    assert!(!report.completed);
    assert_eq!(report.chunks_sent, 0);
    assert!(rx.try_recv().is_err());
}
