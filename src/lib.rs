mod classify;
pub mod buffer;
pub mod cli;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod identity;
pub mod model;
pub mod options;
pub mod repair;
pub mod retry;
pub mod stream;
pub mod sync;
#[cfg(feature = "http")]
pub mod remote;

pub use buffer::StreamingTextBuffer;
pub use decoder::{DecoderState, QuizStreamDecoder, Strategy, parse_quiz_text};
pub use error::{
    DecodeError, DecodeErrorKind, IdentityError, RemoteError, StoreError, TransportError,
};
pub use identity::{FileStore, Identity, IdentityResolver, KeyValueStore, MemoryStore, Resolution};
pub use model::{Answer, AnswerOption, MatchPair, OrderItem, Question, QuestionType, QuizPayload};
pub use options::{ApiConfig, BalanceStrategy, Options};
pub use repair::RepairLogEntry;
pub use stream::{QuizSource, StreamEvent, decode_stream, stream_quiz};
pub use sync::{CrossDomainSyncCoordinator, RemoteStore, SyncDomain, SyncResult};
#[cfg(feature = "http")]
pub use remote::HttpBackend;

/// Best-effort parse of quiz text: full decode, then repaired decode, then extraction of
/// the first question.
pub fn parse_quiz(text: &str, opts: &Options) -> Option<QuizPayload> {
    parse_quiz_text(text, opts).map(|(payload, _)| payload)
}

/// Feed byte chunks through a decoder and collect every emitted payload, including any
/// produced when the input ends.
pub fn decode_chunks<'a, I>(chunks: I, opts: &Options) -> Vec<QuizPayload>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut decoder = QuizStreamDecoder::new(opts.clone());
    let mut out = Vec::new();
    for c in chunks {
        if let Some(p) = decoder.push(c) {
            out.push(p);
        }
        if decoder.is_terminal() {
            return out;
        }
    }
    out.extend(decoder.finish());
    out
}

/// Repair truncated JSON text and return both the result and a log of the changes made.
pub fn repair_with_log(text: &str, opts: &Options) -> (String, Vec<RepairLogEntry>) {
    repair::repair_with_log(text, opts)
}

#[cfg(test)]
mod tests;
