use anyhow::Result;
use async_trait::async_trait;

/// Trait for streaming clip assembly.
///
/// Implementations encode audio samples into a finished in-memory clip (WAV
/// here, other containers possible), consuming chunks as they arrive rather
/// than buffering raw samples for the whole recording.
#[async_trait]
pub trait ClipSink: Send {
    /// Write audio samples (streaming, called repeatedly during recording).
    /// The Vec is moved to avoid copying.
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Finalize the container and hand back the encoded bytes.
    async fn finalize(self: Box<Self>) -> Result<Vec<u8>>;
}
