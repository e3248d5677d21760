use super::format::AudioFormat;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, oneshot};

/// An open microphone session: the live stream plus the signalling ends of
/// its bridge task.
///
/// The session must be kept alive for capture to continue. [`stop`] releases
/// the device and makes the bridge flush whatever is left in the ring buffer
/// before exiting; merely dropping the session triggers the same flush-and-
/// exit path, so the bridge task never outlives its session.
///
/// [`stop`]: CaptureSession::stop
pub struct CaptureSession {
    stream: cpal::Stream,
    shutdown_tx: oneshot::Sender<()>,
    done_rx: oneshot::Receiver<()>,
}

impl CaptureSession {
    /// Release the device and tell the bridge to flush the ring remainder.
    ///
    /// The returned receiver resolves once the final partial chunk has been
    /// sent, so the caller knows when the chunk channel holds the complete
    /// recording. The caller must keep receiving chunks while it waits, or
    /// a long-lagged flush could fill the channel.
    pub fn stop(self) -> oneshot::Receiver<()> {
        drop(self.stream);
        let _ = self.shutdown_tx.send(());
        self.done_rx
    }
}

pub struct AudioCapture;

impl AudioCapture {
    /// Open the default input device and start capturing.
    ///
    /// Audio chunks arrive on `chunk_tx` in 0.5 second pieces while the
    /// session runs; the tail shorter than a piece is delivered by the
    /// stop-time flush.
    pub fn start(format: AudioFormat, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<CaptureSession> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(60.0));
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input audio device available")?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify = Arc::new(Notify::new());
        let notify_callback = notify.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    notify_callback.notify_one();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;

        let chunk_size = format.samples_for_duration(0.5);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::task::spawn_local(Self::bridge_task(
            consumer,
            chunk_tx,
            chunk_size,
            notify,
            shutdown_rx,
            done_tx,
        ));

        tracing::info!("Audio capture started");
        Ok(CaptureSession {
            stream,
            shutdown_tx,
            done_rx,
        })
    }

    async fn bridge_task(
        mut consumer: impl Consumer<Item = f32>,
        tx: mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
        notify: Arc<Notify>,
        mut shutdown_rx: oneshot::Receiver<()>,
        done_tx: oneshot::Sender<()>,
    ) {
        loop {
            tokio::select! {
                _ = notify.notified() => {
                    if consumer.occupied_len() >= chunk_size
                        && !Self::forward(&mut consumer, &tx, chunk_size).await
                    {
                        return;
                    }
                }
                // Resolves on stop, and with an error when the session is
                // dropped without one; both mean flush and exit.
                _ = &mut shutdown_rx => break,
            }
        }

        // The producer is gone. Hand over whatever the ring still holds,
        // then report completion so the receiver can finish draining.
        while consumer.occupied_len() > 0 {
            let size = consumer.occupied_len().min(chunk_size);
            if !Self::forward(&mut consumer, &tx, size).await {
                return;
            }
        }
        let _ = done_tx.send(());
    }

    async fn forward(
        consumer: &mut impl Consumer<Item = f32>,
        tx: &mpsc::Sender<Vec<f32>>,
        size: usize,
    ) -> bool {
        let mut chunk = vec![0.0f32; size];
        let n = consumer.pop_slice(&mut chunk);
        chunk.truncate(n);
        tx.send(chunk).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CHUNK: usize = 8000;

    fn bridge_with_samples(
        samples: usize,
    ) -> (
        impl Future<Output = ()>,
        mpsc::Receiver<Vec<f32>>,
        Arc<Notify>,
        oneshot::Sender<()>,
        oneshot::Receiver<()>,
    ) {
        let ring = HeapRb::<f32>::new(CHUNK * 4);
        let (mut producer, consumer) = ring.split();
        let data: Vec<f32> = (0..samples).map(|i| i as f32).collect();
        producer.push_slice(&data);

        let (tx, rx) = mpsc::channel(100);
        let notify = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let bridge = AudioCapture::bridge_task(
            consumer,
            tx,
            CHUNK,
            notify.clone(),
            shutdown_rx,
            done_tx,
        );
        (bridge, rx, notify, shutdown_tx, done_rx)
    }

    async fn received(rx: &mut mpsc::Receiver<Vec<f32>>) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            sizes.push(chunk.len());
        }
        sizes
    }

    #[tokio::test]
    async fn flushes_a_recording_shorter_than_one_chunk() {
        let (bridge, mut rx, notify, shutdown_tx, done_rx) = bridge_with_samples(4800);
        let task = tokio::spawn(bridge);

        // Below the chunk threshold: a notify forwards nothing.
        notify.notify_one();
        tokio::task::yield_now().await;
        assert_eq!(received(&mut rx).await, Vec::<usize>::new());

        // Stop delivers the tail as one partial chunk.
        shutdown_tx.send(()).unwrap();
        done_rx.await.unwrap();
        assert_eq!(received(&mut rx).await, vec![4800]);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn flushes_the_tail_after_full_chunks() {
        let (bridge, mut rx, notify, shutdown_tx, done_rx) = bridge_with_samples(CHUNK * 2 + 123);
        let task = tokio::spawn(bridge);

        notify.notify_one();
        tokio::task::yield_now().await;
        notify.notify_one();
        tokio::task::yield_now().await;
        assert_eq!(received(&mut rx).await, vec![CHUNK, CHUNK]);

        shutdown_tx.send(()).unwrap();
        done_rx.await.unwrap();
        assert_eq!(received(&mut rx).await, vec![123]);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_session_side_terminates_the_bridge() {
        let (bridge, _rx, _notify, shutdown_tx, done_rx) = bridge_with_samples(0);
        let task = tokio::spawn(bridge);

        // A dropped session never sends an explicit shutdown; the bridge
        // must still wake up, flush and exit rather than park forever.
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("bridge did not exit")
            .unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn flush_splits_a_large_remainder_into_chunks() {
        let (bridge, mut rx, _notify, shutdown_tx, done_rx) = bridge_with_samples(CHUNK * 3 + 7);
        let task = tokio::spawn(bridge);

        shutdown_tx.send(()).unwrap();
        done_rx.await.unwrap();
        assert_eq!(received(&mut rx).await, vec![CHUNK, CHUNK, CHUNK, 7]);
        task.await.unwrap();
    }
}
