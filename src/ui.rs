use crate::config::Config;
use crate::messages::UiCommand;
use crate::state::Snapshot;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Maps typed input lines to commands.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    record: String,
    play: String,
    delete: String,
    quit: String,
}

impl KeyBindings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            record: config.record_key.clone(),
            play: config.play_key.clone(),
            delete: config.delete_key.clone(),
            quit: config.quit_key.clone(),
        }
    }

    fn parse(&self, input: &str) -> Option<UiCommand> {
        if input == self.record {
            Some(UiCommand::ToggleRecord)
        } else if input == self.play {
            Some(UiCommand::Playback)
        } else if input == self.delete {
            Some(UiCommand::Delete)
        } else if input == self.quit {
            Some(UiCommand::Quit)
        } else {
            None
        }
    }

    pub fn help(&self) -> String {
        format!(
            "{} record/stop | {} play/stop | {} delete | {} quit",
            self.record, self.play, self.delete, self.quit
        )
    }
}

/// Read commands from stdin, one per line, until quit or EOF.
pub async fn read_commands(bindings: KeyBindings, tx: mpsc::Sender<UiCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(cmd) = bindings.parse(line.trim()) else {
            println!("  ? {}", bindings.help());
            continue;
        };
        tracing::debug!("UI command: {:?}", cmd);
        if tx.send(cmd).await.is_err() || cmd == UiCommand::Quit {
            break;
        }
    }
}

/// Print a status line whenever the observable state changes.
pub async fn render_status(mut rx: watch::Receiver<Snapshot>) {
    let mut last: Option<Snapshot> = None;
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if last.as_ref() != Some(&snapshot) {
            println!("{}", status_line(&snapshot));
            last = Some(snapshot);
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn status_line(s: &Snapshot) -> String {
    if let Some(error) = &s.error {
        format!("! {}", error)
    } else if s.recording {
        format!("* recording {}", s.time)
    } else if s.playing {
        format!("> playing {}", s.clip.as_deref().unwrap_or("?"))
    } else if let Some(clip) = &s.clip {
        format!("- {} ready ({})", clip, s.time)
    } else {
        "- idle, nothing recorded".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MemoState, Phase};

    fn bindings() -> KeyBindings {
        KeyBindings::from_config(&Config::default())
    }

    #[test]
    fn parses_default_bindings() {
        let b = bindings();
        assert_eq!(b.parse("r"), Some(UiCommand::ToggleRecord));
        assert_eq!(b.parse("p"), Some(UiCommand::Playback));
        assert_eq!(b.parse("d"), Some(UiCommand::Delete));
        assert_eq!(b.parse("q"), Some(UiCommand::Quit));
        assert_eq!(b.parse("x"), None);
        assert_eq!(b.parse(""), None);
    }

    #[test]
    fn status_line_prefers_error_then_recording() {
        let mut state = MemoState::default();
        assert_eq!(status_line(&state.snapshot()), "- idle, nothing recorded");

        state.phase = Phase::Recording;
        state.seconds = 65;
        assert_eq!(status_line(&state.snapshot()), "* recording 01:05");

        state.error = Some("Could not access microphone".to_string());
        assert_eq!(
            status_line(&state.snapshot()),
            "! Could not access microphone"
        );
    }
}
