use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::attempt::{Attempt, AttemptContext};
use super::config::SessionConfig;
use super::engine::{Answer, ResponseEngine};
use super::error::{SessionError, SessionResult};
use super::events::{ClientEvent, ServerEvent, parse_client_event};
use super::speech::{SpeechJob, SpeechPipeline};
use super::state::{SessionShared, SessionState};
use crate::audio::AudioChunkStreamer;
use crate::provider::{SynthesisProvider, TranscriptSink};
use crate::transport::ConnectionSink;

/// Shared collaborators injected into every session.
#[derive(Clone)]
pub struct SessionServices {
    pub engine: Arc<ResponseEngine>,
    pub synthesizer: Arc<dyn SynthesisProvider>,
    pub transcript: Arc<dyn TranscriptSink>,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Result of an end-of-utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedAnswer {
    pub question: String,
    pub answer: Answer,
    pub request_id: String,
    /// Served from the previous finalize without new generation.
    pub reused: bool,
}

/// Per-connection token aggregation and answer lifecycle.
///
/// Each token supersedes the in-flight attempt and starts a new one on the full
/// accumulated text. End-of-utterance yields exactly one [`ServerEvent::Complete`].
pub struct SessionController {
    shared: Arc<SessionShared>,
    services: SessionServices,
    config: SessionConfig,
    speech: SpeechPipeline,
    speech_task: Option<JoinHandle<()>>,
    session_token: CancellationToken,
    accumulated: String,
    state: SessionState,
    current: Option<Attempt>,
    last_finalized_text: String,
    last_finalized_answer: Option<Answer>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.shared.session_id)
            .field("state", &self.state)
            .field("accumulated", &self.accumulated)
            .field("current_seq", &self.current.as_ref().map(|a| a.seq))
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Creates the controller and starts its speech worker. All tasks it spawns are
    /// children of `session_token`.
    pub fn new(
        session_id: impl Into<String>,
        sink: ConnectionSink,
        services: SessionServices,
        config: SessionConfig,
        session_token: CancellationToken,
    ) -> Self {
        let shared = Arc::new(SessionShared::new(session_id, sink));
        let (speech, speech_task) = SpeechPipeline::spawn(
            Arc::clone(&shared),
            Arc::clone(&services.synthesizer),
            AudioChunkStreamer::new(config.chunk_size),
            config.min_prefix_chars,
            session_token.child_token(),
        );

        Self {
            shared,
            services,
            config,
            speech,
            speech_task: Some(speech_task),
            session_token,
            accumulated: String::new(),
            state: SessionState::Idle,
            current: None,
            last_finalized_text: String::new(),
            last_finalized_answer: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    pub fn latest_seq(&self) -> u64 {
        self.shared.latest_seq()
    }

    /// Sends the `connection_established` handshake.
    pub fn announce(&self) -> SessionResult<()> {
        self.shared
            .sink
            .send_json(&ServerEvent::connection_established(&self.shared.session_id))?;
        Ok(())
    }

    /// Parses and dispatches one inbound text frame. Malformed input is reported to the
    /// client as an `error` event and otherwise ignored.
    pub async fn handle_text(&mut self, raw: &str) -> Option<FinalizedAnswer> {
        let result = match parse_client_event(raw) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(finalized) => finalized,
            Err(e) => {
                debug!(session_id = %self.shared.session_id, error = %e, "Rejected client message");
                let _ = self.shared.sink.send_json(&ServerEvent::error(e.to_string()));
                None
            }
        }
    }

    pub async fn handle_event(&mut self, event: ClientEvent) -> SessionResult<Option<FinalizedAnswer>> {
        if event.token == self.config.eos_token {
            Ok(Some(self.finalize(event.request_id).await))
        } else {
            self.on_token(&event.token, event.request_id)?;
            Ok(None)
        }
    }

    /// Appends a token, supersedes the in-flight attempt and starts a new one.
    ///
    /// Never waits for the superseded attempt to stop.
    #[instrument(skip(self, token, request_id), fields(session_id = %self.shared.session_id))]
    pub fn on_token(&mut self, token: &str, request_id: Option<String>) -> SessionResult<u64> {
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }

        self.accumulated.push_str(token);
        let seq = self.shared.next_seq();

        if let Some(previous) = self.current.take() {
            let still_running = !previous.is_finished();
            previous.cancel();
            if still_running {
                debug!(seq = previous.seq, "Superseded in-flight attempt");
                let _ = self
                    .shared
                    .sink
                    .send_json(&ServerEvent::aborted(&previous.question));
            }
        }

        self.state = SessionState::Accumulating;
        let question = self.accumulated.trim().to_string();
        self.current = Some(Attempt::spawn(
            self.attempt_context(),
            seq,
            question.clone(),
            self.session_token.child_token(),
        ));

        self.shared
            .sink
            .send_json(&ServerEvent::typing(&question, request_id))?;
        Ok(seq)
    }

    /// Ends the utterance and produces its single authoritative answer.
    ///
    /// Repeating the previous utterance (or finalizing twice) returns the previous answer
    /// without generating again. Never fails: the last resort is the fallback sentence.
    #[instrument(skip(self, request_id), fields(session_id = %self.shared.session_id))]
    pub async fn finalize(&mut self, request_id: Option<String>) -> FinalizedAnswer {
        let started = Instant::now();
        let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.state = SessionState::Finalizing;
        let question = self.accumulated.trim().to_string();

        let repeat = question.is_empty() || question == self.last_finalized_text;
        let (question, answer, reused) = match (self.last_finalized_answer.clone(), repeat) {
            (Some(previous), true) => {
                self.cancel_current();
                self.shared.next_seq();
                debug!("Utterance repeats the previous one; reusing its answer");
                (self.last_finalized_text.clone(), previous, true)
            }
            (None, true) if question.is_empty() => {
                self.cancel_current();
                self.shared.next_seq();
                debug!("End-of-utterance without text");
                (question, Answer::fallback(self.config.fallback_answer.clone()), false)
            }
            _ => {
                let answer = self.final_answer(&question).await;
                (question, answer, false)
            }
        };

        self.last_finalized_text = question.clone();
        self.last_finalized_answer = Some(answer.clone());
        self.accumulated.clear();
        self.state = SessionState::Idle;

        let elapsed = started.elapsed();
        if let Err(e) = self.shared.sink.send_json(&ServerEvent::complete(
            &answer,
            &question,
            &request_id,
            elapsed,
        )) {
            debug!(error = %e, "Complete event not delivered");
        }
        info!(
            source = %answer.source.label(),
            reused,
            finalize_ms = elapsed.as_millis() as u64,
            "Utterance finalized"
        );

        if !reused && !question.is_empty() {
            self.record_transcript(&question, &answer.content);
        }

        self.speech.submit(SpeechJob {
            request_id: request_id.clone(),
            text: answer.content.clone(),
            seq: self.shared.latest_seq(),
        });

        FinalizedAnswer {
            question,
            answer,
            request_id,
            reused,
        }
    }

    /// Waits (bounded) for the in-flight attempt, then falls back to a synchronous
    /// generation and finally to the fixed fallback sentence.
    async fn final_answer(&mut self, question: &str) -> Answer {
        let latest = self.shared.latest_seq();

        if let Some(attempt) = self.current.take() {
            let seq = attempt.seq;
            let (cancel, mut handle) = attempt.into_parts();
            let outcome = tokio::time::timeout(self.config.finalize_wait, &mut handle).await;
            cancel.cancel();
            self.shared.next_seq();

            match outcome {
                Ok(Ok(Some(done))) if done.seq == latest => {
                    self.promote(question, &done.answer);
                    return done.answer;
                }
                Ok(Ok(_)) => debug!(seq, "In-flight attempt produced no usable result"),
                Ok(Err(e)) => warn!(seq, error = %e, "Attempt task failed"),
                Err(_) => warn!(
                    seq,
                    wait_ms = self.config.finalize_wait.as_millis() as u64,
                    "In-flight attempt missed the finalize wait"
                ),
            }
        } else {
            self.shared.next_seq();
        }

        if let Some(done) = self
            .shared
            .completed_for(latest)
            .filter(|done| done.question == question)
        {
            self.promote(question, &done.answer);
            return done.answer;
        }

        let token = self.session_token.child_token();
        match self
            .services
            .engine
            .answer(question, &self.shared.session_id, &token)
            .await
        {
            Ok(answer) => answer,
            Err(_) => Answer::fallback(self.config.fallback_answer.clone()),
        }
    }

    fn promote(&self, question: &str, answer: &Answer) {
        self.services
            .engine
            .promote(question, answer, &self.shared.session_id);
    }

    fn record_transcript(&self, question: &str, answer: &str) {
        let transcript = Arc::clone(&self.services.transcript);
        let session_id = self.shared.session_id.clone();
        let question = question.to_string();
        let answer = answer.to_string();
        let cancel = self.session_token.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = transcript.record(&session_id, &question, &answer) => {
                    if let Err(e) = result {
                        warn!(session_id = %session_id, error = %e, "Transcript not recorded");
                    }
                }
            }
        });
    }

    fn cancel_current(&mut self) {
        if let Some(attempt) = self.current.take() {
            attempt.cancel();
        }
    }

    fn attempt_context(&self) -> AttemptContext {
        AttemptContext {
            shared: Arc::clone(&self.shared),
            engine: Arc::clone(&self.services.engine),
            synthesizer: Arc::clone(&self.services.synthesizer),
            presynthesize: self.config.presynthesize,
            min_prefix_chars: self.config.min_prefix_chars,
        }
    }

    /// Cancels every task of this session. Idempotent.
    pub fn close(&mut self) {
        self.cancel_current();
        self.shared.next_seq();
        self.session_token.cancel();
        self.state = SessionState::Idle;
    }

    /// Closes the session and waits for its speech worker to stop.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.speech_task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Speech worker ended abnormally");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.session_token.cancel();
    }
}
