//! Memo state machine.
//!
//! All state transitions go through [`reduce`], which takes the current state
//! and an event and returns the next state plus a list of effects for the app
//! loop to execute. The reducer never touches devices or tasks itself, so the
//! full control flow is unit-testable without audio hardware.

use crate::clips::ClipHandle;

/// Lifecycle of the capture side.
///
/// `Stopping` is the window where the stop request has been sent but the
/// encoded clip has not arrived yet: the user-visible "recording" flag is
/// already off, the capture session is not yet released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Requesting,
    Recording,
    Stopping,
}

#[derive(Debug, Clone, Default)]
pub struct MemoState {
    pub phase: Phase,
    pub playing: bool,
    pub clip: Option<ClipHandle>,
    pub error: Option<String>,
    pub seconds: u64,
    /// Set when playback is requested mid-recording; consumed exactly once
    /// when the finished clip arrives.
    pub play_after_stop: bool,
    /// Bumped on every play-through so a late end-of-playback notification
    /// from a torn-down player is ignored.
    pub playback_gen: u64,
}

/// Inputs to the reducer: user commands plus completions from the services.
#[derive(Debug, Clone)]
pub enum Event {
    RecordPressed,
    PlayPressed,
    DeletePressed,
    /// Capture session opened, chunks are flowing.
    CaptureStarted,
    /// Input device missing or the stream could not be built.
    CaptureFailed(String),
    /// Stop completed: chunks assembled and registered as a clip.
    ClipReady(ClipHandle),
    /// Stop completed but assembly failed.
    ClipFailed(String),
    /// One-second timer tick.
    Tick,
    /// The sink for the given play-through drained.
    PlaybackEnded(u64),
    Shutdown,
}

/// Side effects for the app loop to run after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RequestCapture,
    StopCapture,
    StartTimer,
    StopTimer,
    /// Begin or resume a play-through with this generation.
    StartPlayback(u64),
    /// Pause and rewind to the start.
    HaltPlayback,
    DropPlayer,
    Revoke(ClipHandle),
    Render,
}

/// (state, event) -> (next state, effects).
pub fn reduce(state: MemoState, event: Event) -> (MemoState, Vec<Effect>) {
    use Effect::*;
    use Event::*;

    let mut state = state;
    match event {
        RecordPressed => match state.phase {
            Phase::Recording => {
                state.phase = Phase::Stopping;
                (state, vec![StopCapture, StopTimer, Render])
            }
            Phase::Idle => {
                let (mut state, mut effects) = reset(state);
                state.phase = Phase::Requesting;
                effects.push(RequestCapture);
                (state, effects)
            }
            // A toggle while a request or a stop is in flight is dropped;
            // the pending completion decides the next phase.
            Phase::Requesting | Phase::Stopping => (state, vec![]),
        },

        CaptureStarted if state.phase == Phase::Requesting => {
            state.phase = Phase::Recording;
            state.seconds = 0;
            (state, vec![StartTimer, Render])
        }
        CaptureFailed(msg) if state.phase == Phase::Requesting => {
            state.phase = Phase::Idle;
            state.error = Some(msg);
            (state, vec![Render])
        }

        PlayPressed => {
            if state.phase == Phase::Recording {
                state.play_after_stop = true;
                state.phase = Phase::Stopping;
                (state, vec![StopCapture, StopTimer, Render])
            } else if state.playing {
                state.playing = false;
                (state, vec![HaltPlayback, Render])
            } else if state.clip.is_some() && state.phase == Phase::Idle {
                state.playing = true;
                state.playback_gen += 1;
                let generation = state.playback_gen;
                (state, vec![StartPlayback(generation), Render])
            } else {
                (state, vec![])
            }
        }

        ClipReady(handle) if state.phase == Phase::Stopping => {
            let mut effects = Vec::new();
            if let Some(old) = state.clip.take() {
                effects.push(Revoke(old));
            }
            state.clip = Some(handle);
            // The previous player holds the old clip's bytes.
            effects.push(DropPlayer);
            state.phase = Phase::Idle;
            if state.play_after_stop {
                state.play_after_stop = false;
                state.playing = true;
                state.playback_gen += 1;
                effects.push(StartPlayback(state.playback_gen));
            }
            effects.push(Render);
            (state, effects)
        }
        // A clip with nowhere to go must still be freed.
        ClipReady(handle) => (state, vec![Revoke(handle)]),

        ClipFailed(msg) if state.phase == Phase::Stopping => {
            state.phase = Phase::Idle;
            state.error = Some(msg);
            state.play_after_stop = false;
            (state, vec![Render])
        }

        Tick if state.phase == Phase::Recording => {
            state.seconds += 1;
            (state, vec![Render])
        }

        PlaybackEnded(generation) if state.playing && generation == state.playback_gen => {
            state.playing = false;
            (state, vec![Render])
        }

        DeletePressed if state.phase == Phase::Idle => reset(state),

        Shutdown => {
            let mut effects = Vec::new();
            if matches!(state.phase, Phase::Recording | Phase::Stopping) {
                effects.push(StopCapture);
            }
            effects.push(StopTimer);
            let (state, rest) = reset(state);
            effects.extend(rest);
            (state, effects)
        }

        // Stale or out-of-phase events are dropped.
        _ => (state, vec![]),
    }
}

/// Full reset: halt playback, drop the player, revoke the clip, zero the
/// counters. Runs on delete, on entering a fresh recording, and on shutdown.
fn reset(mut state: MemoState) -> (MemoState, Vec<Effect>) {
    let mut effects = Vec::new();
    if state.playing {
        state.playing = false;
        effects.push(Effect::HaltPlayback);
    }
    effects.push(Effect::DropPlayer);
    if let Some(handle) = state.clip.take() {
        effects.push(Effect::Revoke(handle));
    }
    state.phase = Phase::Idle;
    state.seconds = 0;
    state.error = None;
    state.play_after_stop = false;
    effects.push(Effect::Render);
    (state, effects)
}

/// Observable outputs, published over a watch channel for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub recording: bool,
    pub playing: bool,
    pub clip: Option<String>,
    pub error: Option<String>,
    pub time: String,
}

impl MemoState {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            recording: self.phase == Phase::Recording,
            playing: self.playing,
            clip: self.clip.map(|h| h.to_string()),
            error: self.error.clone(),
            time: format_elapsed(self.seconds),
        }
    }
}

/// `MM:SS` with two-digit zero padding; minutes simply widen past 99.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
