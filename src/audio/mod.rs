pub mod capture;
pub mod format;
pub mod sink;
pub mod wav_sink;

pub use capture::{AudioCapture, CaptureSession};
pub use format::AudioFormat;
pub use sink::ClipSink;
pub use wav_sink::WavSink;
