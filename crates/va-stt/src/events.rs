/// Events emitted by a duplex STT session, per spec.md §4.7.
#[derive(Debug, Clone, PartialEq)]
pub enum SttEvent {
    /// An incremental, not-yet-final transcript hypothesis.
    Partial { text: String, confidence: Option<f64> },
    /// A finalized transcript segment.
    Final { text: String, confidence: Option<f64> },
    /// The ASR detected the caller has started speaking.
    SpeechStarted,
    /// The ASR detected the end of an utterance (trailing silence).
    UtteranceEnd,
}
