use crate::audio::{AudioCapture, AudioFormat, CaptureSession, ClipSink, WavSink};
use crate::messages::{AppEvent, RecorderCommand};
use anyhow::Result;
use tokio::sync::mpsc;

/// Coordinates audio capture and clip assembly.
///
/// This service:
/// - Manages the capture session (the cpal stream) lifecycle
/// - Receives audio chunks via channel and streams them into a ClipSink
/// - Replies synchronously to Start (the device-acquisition boundary)
/// - Emits one ClipAssembled event per Stop, after the device is released
///
/// Note: this service holds cpal::Stream which is !Send, so it must be
/// spawned on a LocalSet using tokio::task::spawn_local.
pub struct Recorder {
    format: AudioFormat,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
    audio_rx: mpsc::Receiver<Vec<f32>>,
    audio_tx: mpsc::Sender<Vec<f32>>,
    event_tx: mpsc::Sender<AppEvent>,
    session: Option<CaptureSession>,
    sink: Option<Box<dyn ClipSink>>,
    recording: bool,
}

impl Recorder {
    pub fn new(
        format: AudioFormat,
        cmd_rx: mpsc::Receiver<RecorderCommand>,
        audio_rx: mpsc::Receiver<Vec<f32>>,
        audio_tx: mpsc::Sender<Vec<f32>>,
        event_tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            format,
            cmd_rx,
            audio_rx,
            audio_tx,
            event_tx,
            session: None,
            sink: None,
            recording: false,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        // App dropped the handle: release the device and exit.
                        // Dropping the session also shuts its bridge down.
                        None => {
                            self.session = None;
                            break;
                        }
                    }
                }

                // Receive and stream audio chunks (only while recording)
                Some(chunk) = self.audio_rx.recv(), if self.recording => {
                    self.write_chunk(chunk);
                }
            }
        }
    }

    fn write_chunk(&mut self, chunk: Vec<f32>) {
        if let Some(sink) = self.sink.as_mut() {
            // Vec is moved, no copy
            if let Err(e) = sink.write_chunk(chunk) {
                tracing::error!("Failed to write audio chunk: {}", e);
                self.recording = false;
            }
        }
    }

    async fn handle_command(&mut self, cmd: RecorderCommand) {
        match cmd {
            RecorderCommand::Start(reply) => {
                let _ = reply.send(self.start_capture());
            }
            RecorderCommand::Stop => {
                if self.sink.is_some() {
                    self.stop_capture().await;
                } else {
                    tracing::debug!("Stop with no active capture, ignoring");
                }
            }
        }
    }

    fn start_capture(&mut self) -> Result<()> {
        let sink = WavSink::new(self.format)?;

        match AudioCapture::start(self.format, self.audio_tx.clone()) {
            Ok(session) => {
                self.session = Some(session);
                self.sink = Some(Box::new(sink));
                self.recording = true;
                tracing::info!("Recording started");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to start capture: {}", e);
                Err(e)
            }
        }
    }

    async fn stop_capture(&mut self) {
        self.recording = false;

        // Stop the session first: the device is released before the clip is
        // assembled, so autoplay never runs while tracks are held. The stop
        // makes the bridge flush the sub-chunk tail of the ring buffer and
        // exit; keep consuming while it drains so its sends never block.
        if let Some(session) = self.session.take() {
            let mut flushed = session.stop();
            loop {
                tokio::select! {
                    _ = &mut flushed => break,
                    Some(chunk) = self.audio_rx.recv() => self.write_chunk(chunk),
                }
            }
        }

        // Everything the bridge sent is now buffered; drain it into the sink
        while let Ok(chunk) = self.audio_rx.try_recv() {
            self.write_chunk(chunk);
        }

        let result = match self.sink.take() {
            Some(sink) => sink.finalize().await,
            None => Err(anyhow::anyhow!("No clip sink active")),
        };

        tracing::info!("Recording stopped");
        let _ = self.event_tx.send(AppEvent::ClipAssembled(result)).await;
    }
}

/// Handle for communicating with the Recorder.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx }
    }

    /// Open the device and start capturing. Resolves once the device has
    /// been acquired or refused; there is no cancelling a pending request.
    pub async fn start(&self) -> Result<()> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(RecorderCommand::Start(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send start command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive start response: {}", e))?
    }

    /// Request a stop. Returns immediately; the assembled clip arrives on
    /// the app event channel.
    pub async fn stop(&self) -> Result<()> {
        self.tx
            .send(RecorderCommand::Stop)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send stop command: {}", e))
    }
}
