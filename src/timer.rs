use crate::messages::AppEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Elapsed-time ticker for the recording display.
///
/// `start` spawns a task that sends one [`AppEvent::Tick`] per second; `stop`
/// aborts it synchronously and is safe to call when nothing is running. The
/// counter itself lives in the state machine, which zeroes it on start and
/// drops ticks that arrive outside the recording phase.
pub struct RecordingTimer {
    event_tx: mpsc::Sender<AppEvent>,
    task: Option<JoinHandle<()>>,
}

impl RecordingTimer {
    pub fn new(event_tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            event_tx,
            task: None,
        }
    }

    pub fn start(&mut self) {
        self.stop();
        let tx = self.event_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if tx.send(AppEvent::Tick).await.is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
