use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::ResponseEngine;
use super::events::ServerEvent;
use super::speech::synthesize_plan;
use super::state::{CompletedAttempt, SessionShared};
use crate::prefix::plan_speech;
use crate::provider::{ProviderError, SynthesisProvider};

/// Everything an attempt task needs, cloned per spawn.
#[derive(Clone)]
pub struct AttemptContext {
    pub shared: Arc<SessionShared>,
    pub engine: Arc<ResponseEngine>,
    pub synthesizer: Arc<dyn SynthesisProvider>,
    pub presynthesize: bool,
    pub min_prefix_chars: usize,
}

/// One background answer generation for a snapshot of the accumulated text.
#[derive(Debug)]
pub struct Attempt {
    pub seq: u64,
    pub question: String,
    cancel: CancellationToken,
    handle: JoinHandle<Option<CompletedAttempt>>,
}

impl Attempt {
    pub fn spawn(ctx: AttemptContext, seq: u64, question: String, cancel: CancellationToken) -> Self {
        let handle = tokio::spawn(run(ctx, seq, question.clone(), cancel.clone()));
        Self {
            seq,
            question,
            cancel,
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn into_parts(self) -> (CancellationToken, JoinHandle<Option<CompletedAttempt>>) {
        (self.cancel, self.handle)
    }
}

async fn run(
    ctx: AttemptContext,
    seq: u64,
    question: String,
    cancel: CancellationToken,
) -> Option<CompletedAttempt> {
    let started = Instant::now();

    if cancel.is_cancelled() || !ctx.shared.is_current(seq) {
        debug!(seq, "Attempt stale before start");
        return None;
    }

    let answer = match ctx
        .engine
        .preview(&question, &ctx.shared.session_id, &cancel)
        .await
    {
        Ok(answer) => answer,
        Err(_) => {
            debug!(seq, "Attempt cancelled");
            return None;
        }
    };

    if cancel.is_cancelled() {
        return None;
    }

    let completed = CompletedAttempt {
        seq,
        question: question.clone(),
        answer,
    };
    let event = ServerEvent::preview(&completed.answer, &question, started.elapsed());
    if !ctx.shared.publish(completed.clone(), &event) {
        debug!(seq, "Discarded stale attempt result");
        return None;
    }
    debug!(
        seq,
        source = %completed.answer.source.label(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Preview published"
    );

    if ctx.presynthesize {
        tokio::spawn(presynthesize(
            ctx,
            seq,
            completed.answer.content.clone(),
            cancel,
        ));
    }

    Some(completed)
}

/// Synthesizes a preview answer ahead of end-of-utterance, reusing earlier segments.
async fn presynthesize(ctx: AttemptContext, seq: u64, text: String, cancel: CancellationToken) {
    let previous = ctx.shared.prepared_segments();
    let plan = plan_speech(&previous, &text, ctx.min_prefix_chars);

    match synthesize_plan(ctx.synthesizer.as_ref(), plan, &cancel).await {
        Ok(segments) => {
            if !ctx.shared.store_preview_speech(seq, segments) {
                debug!(seq, "Pre-synthesized speech is stale");
            }
        }
        Err(ProviderError::Cancelled) => {}
        Err(e) => warn!(seq, error = %e, "Pre-synthesis failed"),
    }
}
