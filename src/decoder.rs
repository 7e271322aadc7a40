use crate::buffer::StreamingTextBuffer;
use crate::classify::normalize;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::extract::{extract_first, extract_title};
use crate::model::{Question, QuizPayload};
use crate::options::Options;
use crate::repair::repair;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    Empty,
    Parsing,
    PartialEmitted,
    Complete,
    Failed,
}

/// Which recovery step produced a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Repaired,
    Extracted,
}

/// Decode `text` as a quiz payload, falling back to repair and then to first-question
/// extraction. Never fails; `None` means the text does not hold a usable quiz yet.
pub fn parse_quiz_text(text: &str, opts: &Options) -> Option<(QuizPayload, Strategy)> {
    let cleaned = normalize(text, opts.strip_control_chars);
    if cleaned.is_empty() {
        return None;
    }

    match decode(&cleaned) {
        Ok(payload) => return Some((payload, Strategy::Direct)),
        Err(e) => tracing::trace!(error = %e, "direct decode failed"),
    }

    let repaired = repair(&cleaned, opts);
    match decode(&repaired) {
        Ok(mut payload) => {
            // repaired text is a truncated prefix; a flag seen in it says nothing about the rest
            payload.is_complete = false;
            return Some((payload, Strategy::Repaired));
        }
        Err(e) => tracing::trace!(error = %e, "repaired decode failed"),
    }

    if !opts.partial_extraction {
        return None;
    }
    let question = extract_first(&cleaned)?;
    let title = extract_title(&cleaned).unwrap_or_else(|| opts.fallback_title.clone());
    Some((QuizPayload::partial(title, question), Strategy::Extracted))
}

fn decode(text: &str) -> Result<QuizPayload, DecodeError> {
    if text.is_empty() {
        return Err(DecodeError::new(DecodeErrorKind::Empty, 0));
    }
    serde_json::from_str(text).map_err(DecodeError::from_serde)
}

/// Incremental decoder for one quiz stream.
///
/// Every `push` re-parses the whole accumulated buffer. Emissions are in-progress
/// payloads until one is complete; after that the decoder ignores further input.
pub struct QuizStreamDecoder {
    opts: Options,
    buf: StreamingTextBuffer,
    state: DecoderState,
    last_partial: Option<QuizPayload>,
    complete: Option<QuizPayload>,
    last_strategy: Option<Strategy>,
    attempts: usize,
}

impl QuizStreamDecoder {
    pub fn new(opts: Options) -> Self {
        Self {
            opts,
            buf: StreamingTextBuffer::new(),
            state: DecoderState::Empty,
            last_partial: None,
            complete: None,
            last_strategy: None,
            attempts: 0,
        }
    }

    /// Feed a chunk of raw bytes. Returns a payload when this chunk made a new one available.
    pub fn push(&mut self, chunk: &[u8]) -> Option<QuizPayload> {
        if self.is_terminal() {
            return None;
        }
        self.buf.append(chunk);
        if self.buf.is_empty() {
            return None;
        }
        if self.state == DecoderState::Empty {
            self.state = DecoderState::Parsing;
        }
        self.attempt()
    }

    /// Signal transport close: decode any held-back tail once more and settle the final state.
    pub fn finish(&mut self) -> Option<QuizPayload> {
        if self.is_terminal() {
            return None;
        }
        let pending = self.buf.pending() > 0;
        self.buf.finish();
        let out = if pending { self.attempt() } else { None };
        if self.state != DecoderState::Complete {
            tracing::debug!(
                bytes = self.buf.len(),
                partial = self.last_partial.is_some(),
                "stream ended without a complete payload"
            );
            self.state = DecoderState::Failed;
        }
        out
    }

    /// Abandon the stream after a transport failure.
    pub fn fail(&mut self) {
        if self.state != DecoderState::Complete {
            self.state = DecoderState::Failed;
        }
    }

    fn attempt(&mut self) -> Option<QuizPayload> {
        self.attempts += 1;
        let (mut payload, strategy) = parse_quiz_text(self.buf.text(), &self.opts)?;
        self.last_strategy = Some(strategy);

        if payload.is_complete {
            tracing::info!(
                questions = payload.questions.len(),
                ?strategy,
                attempts = self.attempts,
                "quiz stream complete"
            );
            self.state = DecoderState::Complete;
            self.complete = Some(payload.clone());
            return Some(payload);
        }

        if let Some(prev) = &self.last_partial {
            if strategy == Strategy::Extracted {
                if covers_first_question(prev, &payload) {
                    return None;
                }
                carry_ids(&mut payload, prev);
            }
            if *prev == payload {
                return None;
            }
        }
        tracing::debug!(questions = payload.questions.len(), ?strategy, "partial quiz payload");
        self.state = DecoderState::PartialEmitted;
        self.last_partial = Some(payload.clone());
        Some(payload)
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, DecoderState::Complete | DecoderState::Failed)
    }

    pub fn last_partial(&self) -> Option<&QuizPayload> {
        self.last_partial.as_ref()
    }

    pub fn complete_payload(&self) -> Option<&QuizPayload> {
        self.complete.as_ref()
    }

    pub fn last_strategy(&self) -> Option<Strategy> {
        self.last_strategy
    }

    pub fn text(&self) -> &str {
        self.buf.text()
    }
}

/// An extracted question adds nothing when the previous partial already holds the same
/// question with at least as many options.
fn covers_first_question(prev: &QuizPayload, next: &QuizPayload) -> bool {
    let (Some(p), Some(n)) = (prev.questions.first(), next.questions.first()) else {
        return false;
    };
    let count = |q: &Question| q.options.as_ref().map_or(0, Vec::len);
    p.prompt == n.prompt && (prev.questions.len() > 1 || count(p) >= count(n))
}

/// Keep generated ids stable when the same question is extracted again.
fn carry_ids(next: &mut QuizPayload, prev: &QuizPayload) {
    for (q, p) in next.questions.iter_mut().zip(&prev.questions) {
        if q.prompt == p.prompt {
            carry_question_ids(q, p);
        }
    }
}

fn carry_question_ids(q: &mut Question, p: &Question) {
    q.id = p.id.clone();
    if let (Some(opts), Some(prev_opts)) = (q.options.as_mut(), p.options.as_ref()) {
        for o in opts.iter_mut() {
            if let Some(po) = prev_opts.iter().find(|po| po.text == o.text) {
                o.id = po.id.clone();
            }
        }
    }
}
