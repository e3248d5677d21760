use anyhow::Result;
use tokio::sync::oneshot;

/// Commands for the Recorder service.
pub enum RecorderCommand {
    /// Open the input device and start capturing. The reply resolves once the
    /// device has been acquired (or refused).
    Start(oneshot::Sender<Result<()>>),
    /// Stop capturing. Returns immediately; the assembled clip arrives later
    /// as an [`AppEvent::ClipAssembled`].
    Stop,
}

/// Asynchronous completions delivered to the app loop.
pub enum AppEvent {
    /// One-shot per recording: the encoded WAV bytes, or the assembly error.
    ClipAssembled(Result<Vec<u8>>),
    /// Once per second while the recording timer runs.
    Tick,
    /// One-shot per play-through, tagged with its generation.
    PlaybackEnded(u64),
}

/// User commands from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    ToggleRecord,
    Playback,
    Delete,
    Quit,
}
