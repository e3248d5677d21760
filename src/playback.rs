use crate::messages::AppEvent;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// One play-through: a sink plus the generation its end event will carry.
///
/// The generation cell is shared with the watcher task so that resuming a
/// paused run under a newer generation retags the eventual end event instead
/// of orphaning it.
struct Run {
    sink: Arc<Sink>,
    generation: Arc<AtomicU64>,
}

/// Playback side of the recorder: wraps the current clip's bytes.
///
/// Created lazily on the first play of a clip and reused across play/pause
/// cycles; torn down by reset or when a new recording completes. Holds the
/// rodio output stream, which is !Send, so the player lives on the app's
/// LocalSet like the capture stream does.
pub struct Player {
    stream: OutputStream,
    run: Option<Run>,
    bytes: Arc<[u8]>,
}

impl Player {
    pub fn new(bytes: Arc<[u8]>) -> Result<Self> {
        let stream =
            OutputStreamBuilder::open_default_stream().context("Failed to open output stream")?;
        Ok(Self {
            stream,
            run: None,
            bytes,
        })
    }

    /// Begin or resume playback under the given generation.
    ///
    /// A fresh play-through decodes the clip and spawns a watcher that emits
    /// exactly one [`AppEvent::PlaybackEnded`] when the sink drains. Resuming
    /// a paused run reuses its sink and watcher.
    pub fn play(&mut self, generation: u64, event_tx: mpsc::Sender<AppEvent>) -> Result<()> {
        match &self.run {
            Some(run) if !run.sink.empty() => {
                run.generation.store(generation, Ordering::Relaxed);
                run.sink.play();
            }
            _ => {
                let cursor = Cursor::new(self.bytes.clone());
                let sink = Arc::new(
                    rodio::play(self.stream.mixer(), cursor).context("Failed to start playback")?,
                );
                let cell = Arc::new(AtomicU64::new(generation));
                tokio::task::spawn_local(Self::watch_end(sink.clone(), cell.clone(), event_tx));
                self.run = Some(Run {
                    sink,
                    generation: cell,
                });
            }
        }
        tracing::debug!("Playback running (generation {})", generation);
        Ok(())
    }

    /// Pause and rewind to the start. Best-effort: a source that cannot seek
    /// just stays paused at its current position.
    pub fn halt(&self) {
        if let Some(run) = &self.run {
            run.sink.pause();
            if let Err(e) = run.sink.try_seek(Duration::ZERO) {
                tracing::warn!("Failed to rewind playback: {}", e);
            }
        }
    }

    async fn watch_end(sink: Arc<Sink>, generation: Arc<AtomicU64>, tx: mpsc::Sender<AppEvent>) {
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if sink.empty() {
                let generation = generation.load(Ordering::Relaxed);
                tracing::debug!("Playback ended (generation {})", generation);
                let _ = tx.send(AppEvent::PlaybackEnded(generation)).await;
                break;
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        // Clearing the sink unblocks the watcher; its final event is stale
        // by generation and gets dropped by the reducer.
        if let Some(run) = &self.run {
            run.sink.stop();
        }
    }
}
