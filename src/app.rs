use crate::audio::AudioFormat;
use crate::clips::ClipRegistry;
use crate::config::Config;
use crate::messages::{AppEvent, UiCommand};
use crate::playback::Player;
use crate::services::{Recorder, RecorderHandle};
use crate::state::{Effect, Event, MemoState, Snapshot, reduce};
use crate::timer::RecordingTimer;

use anyhow::Result;
use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};

/// Owns the state machine and the service layer.
///
/// All mutation happens here, inside one select loop: user commands, service
/// completions and timer ticks are folded through the reducer, and the
/// resulting effects are applied against the services. Runs on a LocalSet
/// because the capture stream and the player are !Send.
pub struct App {
    state: MemoState,
    registry: ClipRegistry,
    recorder: RecorderHandle,
    timer: RecordingTimer,
    player: Option<Player>,
    event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
    ui_rx: mpsc::Receiver<UiCommand>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl App {
    pub fn new(
        config: &Config,
        ui_rx: mpsc::Receiver<UiCommand>,
        snapshot_tx: watch::Sender<Snapshot>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(100);
        let recorder = Self::setup_audio_pipeline(config, event_tx.clone());
        let timer = RecordingTimer::new(event_tx.clone());

        Self {
            state: MemoState::default(),
            registry: ClipRegistry::default(),
            recorder,
            timer,
            player: None,
            event_tx,
            event_rx,
            ui_rx,
            snapshot_tx,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                Some(cmd) = self.ui_rx.recv() => {
                    let event = match cmd {
                        UiCommand::ToggleRecord => Event::RecordPressed,
                        UiCommand::Playback => Event::PlayPressed,
                        UiCommand::Delete => Event::DeletePressed,
                        UiCommand::Quit => break,
                    };
                    self.dispatch(event).await;
                }
                Some(event) = self.event_rx.recv() => {
                    let event = self.translate(event);
                    self.dispatch(event).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.dispatch(Event::Shutdown).await;
        Ok(())
    }

    /// Lift a service completion into a reducer event.
    fn translate(&mut self, event: AppEvent) -> Event {
        match event {
            AppEvent::ClipAssembled(Ok(bytes)) => Event::ClipReady(self.registry.create(bytes)),
            AppEvent::ClipAssembled(Err(e)) => {
                tracing::error!("Clip assembly failed: {:#}", e);
                Event::ClipFailed(format!("Failed to assemble recording: {e:#}"))
            }
            AppEvent::Tick => Event::Tick,
            AppEvent::PlaybackEnded(generation) => Event::PlaybackEnded(generation),
        }
    }

    /// Run an event through the reducer and apply its effects. An effect can
    /// produce a follow-up event (capture replies, playback fallbacks), which
    /// is folded in before returning.
    async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            tracing::debug!("Event: {:?}", event);
            let (next, effects) = reduce(std::mem::take(&mut self.state), event);
            self.state = next;
            for effect in effects {
                if let Some(follow_up) = self.apply(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn apply(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::RequestCapture => match self.recorder.start().await {
                Ok(()) => Some(Event::CaptureStarted),
                Err(e) => Some(Event::CaptureFailed(format!(
                    "Could not access microphone: {e:#}"
                ))),
            },
            Effect::StopCapture => {
                if let Err(e) = self.recorder.stop().await {
                    tracing::warn!("Failed to signal capture stop: {}", e);
                }
                None
            }
            Effect::StartTimer => {
                self.timer.start();
                None
            }
            Effect::StopTimer => {
                self.timer.stop();
                None
            }
            Effect::StartPlayback(generation) => self.start_playback(generation),
            Effect::HaltPlayback => {
                if let Some(player) = &self.player {
                    player.halt();
                }
                None
            }
            Effect::DropPlayer => {
                self.player = None;
                None
            }
            Effect::Revoke(handle) => {
                self.registry.revoke(handle);
                None
            }
            Effect::Render => {
                self.snapshot_tx.send_replace(self.state.snapshot());
                None
            }
        }
    }

    /// Lazily create the player for the current clip and start a play-through.
    /// Any failure clears the playing flag via a synthetic ended event rather
    /// than wedging the state.
    fn start_playback(&mut self, generation: u64) -> Option<Event> {
        let ended = Some(Event::PlaybackEnded(generation));

        let Some(handle) = self.state.clip else {
            return ended;
        };
        let Some(bytes) = self.registry.get(handle) else {
            tracing::warn!("Clip {} is gone, cannot play", handle);
            return ended;
        };

        if self.player.is_none() {
            match Player::new(bytes) {
                Ok(player) => self.player = Some(player),
                Err(e) => {
                    tracing::warn!("Failed to open playback: {:#}", e);
                    return ended;
                }
            }
        }

        if let Some(player) = &mut self.player {
            if let Err(e) = player.play(generation, self.event_tx.clone()) {
                tracing::warn!("Failed to start playback: {:#}", e);
                return ended;
            }
        }
        None
    }

    fn setup_audio_pipeline(config: &Config, event_tx: mpsc::Sender<AppEvent>) -> RecorderHandle {
        let (audio_tx, audio_rx) = mpsc::channel(100);
        let format = AudioFormat {
            sample_rate: config.sample_rate,
            channels: config.channels,
        };

        // Create and spawn the Recorder (spawn_local because it is !Send)
        let (recorder_tx, recorder_rx) = mpsc::channel(10);
        let recorder = Recorder::new(format, recorder_rx, audio_rx, audio_tx, event_tx);
        let recorder_handle = RecorderHandle::new(recorder_tx);
        tokio::task::spawn_local(recorder.run());

        recorder_handle
    }
}
