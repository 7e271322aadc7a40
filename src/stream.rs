use crate::decoder::QuizStreamDecoder;
use crate::error::{RemoteError, TransportError};
use crate::model::QuizPayload;
use crate::options::Options;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new payload. A complete one is always the last event of the stream.
    Payload(QuizPayload),
    /// The transport closed before a complete payload arrived.
    End { last_partial: Option<QuizPayload> },
    /// Reading from the transport failed; no further events follow.
    TransportFailed { error: TransportError, last_partial: Option<QuizPayload> },
}

impl StreamEvent {
    pub fn payload(&self) -> Option<&QuizPayload> {
        match self {
            StreamEvent::Payload(p) => Some(p),
            _ => None,
        }
    }
}

/// Raw body chunks of an opened quiz stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Where quiz bytes come from.
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn open(&self, lesson_id: &str) -> Result<ByteStream, RemoteError>;
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    // transport closed and a final partial was emitted; End still owed
    Closing,
    Done,
}

struct Pump<S> {
    source: Pin<Box<S>>,
    decoder: QuizStreamDecoder,
    phase: Phase,
}

/// Turn a byte stream into payload events. The source is dropped as soon as a complete
/// payload is seen, which cancels the underlying transport.
pub fn decode_stream<S, B, E>(source: S, opts: Options) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let pump = Pump {
        source: Box::pin(source),
        decoder: QuizStreamDecoder::new(opts),
        phase: Phase::Reading,
    };
    stream::unfold(pump, |mut pump| async move {
        match pump.phase {
            Phase::Done => return None,
            Phase::Closing => {
                pump.phase = Phase::Done;
                let last_partial = pump.decoder.last_partial().cloned();
                return Some((StreamEvent::End { last_partial }, pump));
            }
            Phase::Reading => {}
        }
        loop {
            match pump.source.next().await {
                Some(Ok(chunk)) => {
                    if let Some(payload) = pump.decoder.push(chunk.as_ref()) {
                        if payload.is_complete {
                            pump.phase = Phase::Done;
                        }
                        return Some((StreamEvent::Payload(payload), pump));
                    }
                }
                Some(Err(e)) => {
                    pump.decoder.fail();
                    pump.phase = Phase::Done;
                    let error = TransportError(e.to_string());
                    tracing::warn!(%error, "quiz stream transport failed");
                    let last_partial = pump.decoder.last_partial().cloned();
                    return Some((StreamEvent::TransportFailed { error, last_partial }, pump));
                }
                None => {
                    return match pump.decoder.finish() {
                        Some(payload) => {
                            pump.phase =
                                if payload.is_complete { Phase::Done } else { Phase::Closing };
                            Some((StreamEvent::Payload(payload), pump))
                        }
                        None => {
                            pump.phase = Phase::Done;
                            let last_partial = pump.decoder.last_partial().cloned();
                            Some((StreamEvent::End { last_partial }, pump))
                        }
                    };
                }
            }
        }
    })
}

/// Open the lesson's stream on `source` and decode it. A failure to open is reported as
/// a single `TransportFailed` event.
pub async fn stream_quiz<Q>(
    source: &Q,
    lesson_id: &str,
    opts: Options,
) -> BoxStream<'static, StreamEvent>
where
    Q: QuizSource + ?Sized,
{
    match source.open(lesson_id).await {
        Ok(bytes) => decode_stream(bytes, opts).boxed(),
        Err(e) => {
            tracing::warn!(lesson_id, error = %e, "failed to open quiz stream");
            let event = StreamEvent::TransportFailed {
                error: TransportError(e.to_string()),
                last_partial: None,
            };
            stream::once(async move { event }).boxed()
        }
    }
}
