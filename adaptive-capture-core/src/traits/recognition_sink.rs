/// Text the recognition engine produced from the fed audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionResult {
    Transcription(String),
    Translation(String),
}

/// Downstream consumer of captured PCM (16-bit LE mono at the output rate).
///
/// `feed` is fire-and-forget and is called from the capture thread, so it
/// must never block on the recognizer. `on_result` is called by whichever
/// engine is linked behind the sink, from its own thread.
pub trait RecognitionSink: Send + Sync {
    fn feed(&self, pcm: &[u8]);

    fn on_result(&self, _result: &RecognitionResult) {}
}
