use super::format::AudioFormat;
use super::sink::ClipSink;
use anyhow::Result;
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

enum WavCommand {
    WriteChunk(Vec<f32>),
    Finalize {
        reply: oneshot::Sender<Result<Vec<u8>>>,
    },
}

/// Write/Seek target shared between the WAV writer and the sink, so the
/// encoded bytes can be reclaimed after `WavWriter::finalize` consumes the
/// writer.
#[derive(Clone)]
struct SharedBuffer(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedBuffer {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Cursor::new(Vec::new()))))
    }

    fn take(&self) -> Vec<u8> {
        let mut cursor = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(cursor.get_mut())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).flush()
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).seek(pos)
    }
}

/// In-memory WAV encoder using a dedicated blocking thread.
///
/// Sample conversion and container writes happen off the event loop; chunks
/// are sent to the thread via a channel and appended sequentially. `finalize`
/// patches the header and hands back the finished bytes.
pub struct WavSink {
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavSink {
    pub fn new(format: AudioFormat) -> Result<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };

        let buffer = SharedBuffer::new();
        let mut writer = WavWriter::new(buffer.clone(), spec)
            .map_err(|e| anyhow::anyhow!("Failed to create WAV writer: {}", e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    WavCommand::WriteChunk(samples) => {
                        for sample in samples {
                            // Convert f32 (-1.0 to 1.0) to i16
                            let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                            if let Err(e) = writer.write_sample(amplitude) {
                                tracing::error!("Failed to write sample: {}", e);
                                break;
                            }
                        }
                    }
                    WavCommand::Finalize { reply } => {
                        let result = writer
                            .finalize()
                            .map(|_| buffer.take())
                            .map_err(|e| anyhow::anyhow!("Failed to finalize WAV: {}", e));
                        let _ = reply.send(result);
                        break;
                    }
                }
            }
        });

        Ok(Self { tx })
    }
}

#[async_trait]
impl ClipSink for WavSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(WavCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(self: Box<Self>) -> Result<Vec<u8>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WavCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn encodes_chunks_into_a_valid_wav() {
        let format = AudioFormat::default();
        let mut sink: Box<dyn ClipSink> = Box::new(WavSink::new(format).unwrap());

        sink.write_chunk(vec![0.0, 0.5]).unwrap();
        sink.write_chunk(vec![-1.0]).unwrap();
        let bytes = sink.finalize().await.unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, (0.5 * i16::MAX as f32) as i16, -i16::MAX]);
    }

    #[tokio::test]
    async fn out_of_range_samples_are_clamped() {
        let format = AudioFormat::default();
        let mut sink: Box<dyn ClipSink> = Box::new(WavSink::new(format).unwrap());

        sink.write_chunk(vec![2.0, -2.0]).unwrap();
        let bytes = sink.finalize().await.unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
    }

    #[tokio::test]
    async fn empty_recording_finalizes_to_a_header_only_wav() {
        let format = AudioFormat::default();
        let sink: Box<dyn ClipSink> = Box::new(WavSink::new(format).unwrap());

        let bytes = sink.finalize().await.unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
