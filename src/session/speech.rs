use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::ServerEvent;
use super::state::SessionShared;
use crate::audio::AudioChunkStreamer;
use crate::prefix::{SpeechPlan, SpeechSegment, plan_speech};
use crate::provider::{ProviderError, SynthesisProvider};

/// Runs the synthesis a plan still needs and returns the full segment list in order.
pub async fn synthesize_plan(
    synthesizer: &dyn SynthesisProvider,
    plan: SpeechPlan,
    cancel: &CancellationToken,
) -> Result<Vec<SpeechSegment>, ProviderError> {
    let (mut segments, pending) = match plan {
        SpeechPlan::Replay(segments) => return Ok(segments),
        SpeechPlan::Extend { reused, suffix } => (reused, suffix),
        SpeechPlan::Full(text) => (Vec::new(), text),
    };

    let audio = tokio::select! {
        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        audio = synthesizer.synthesize(&pending) => audio?,
    };
    segments.push(SpeechSegment::new(pending, audio));
    Ok(segments)
}

#[derive(Debug)]
pub struct SpeechJob {
    pub request_id: String,
    pub text: String,
    pub seq: u64,
}

/// Per-connection audio worker. Jobs are delivered one at a time, in submission order.
#[derive(Debug)]
pub struct SpeechPipeline {
    tx: mpsc::UnboundedSender<SpeechJob>,
}

impl SpeechPipeline {
    pub fn spawn(
        shared: Arc<SessionShared>,
        synthesizer: Arc<dyn SynthesisProvider>,
        streamer: AudioChunkStreamer,
        min_prefix_chars: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SpeechJob>();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => {
                            deliver(&shared, synthesizer.as_ref(), streamer, min_prefix_chars, job, &cancel).await
                        }
                        None => break,
                    }
                }
            }
            debug!(session_id = %shared.session_id, "Speech pipeline stopped");
        });
        (Self { tx }, handle)
    }

    pub fn submit(&self, job: SpeechJob) -> bool {
        self.tx.send(job).is_ok()
    }
}

async fn deliver(
    shared: &SessionShared,
    synthesizer: &dyn SynthesisProvider,
    streamer: AudioChunkStreamer,
    min_prefix_chars: usize,
    job: SpeechJob,
    cancel: &CancellationToken,
) {
    let previous = shared.prepared_segments();
    let plan = plan_speech(&previous, &job.text, min_prefix_chars);
    let to_synthesize = plan.pending_text().map_or(0, |t| t.chars().count());
    let reused_segments = match &plan {
        SpeechPlan::Replay(segments) => segments.len(),
        SpeechPlan::Extend { reused, .. } => reused.len(),
        SpeechPlan::Full(_) => 0,
    };
    info!(
        session_id = %shared.session_id,
        request_id = %job.request_id,
        reused_segments,
        chars_to_synthesize = to_synthesize,
        "Delivering speech"
    );

    let segments = match synthesize_plan(synthesizer, plan, cancel).await {
        Ok(segments) => segments,
        Err(ProviderError::Cancelled) => return,
        Err(e) => {
            warn!(session_id = %shared.session_id, error = %e, "Speech synthesis failed");
            let _ = shared
                .sink
                .send_json(&ServerEvent::error("음성 합성에 실패했습니다."));
            return;
        }
    };

    for (part, segment) in segments.iter().enumerate() {
        let file_name = format!(
            "tts_{}_{}_part{}.wav",
            shared.session_id, job.request_id, part
        );
        match streamer.stream(&shared.sink, &segment.audio, &job.request_id, &file_name) {
            Ok(report) if report.completed => {}
            Ok(_) => return,
            Err(e) => {
                warn!(session_id = %shared.session_id, error = %e, "Audio stream failed");
                return;
            }
        }
    }

    shared.store_delivered_speech(job.seq, segments);
}
