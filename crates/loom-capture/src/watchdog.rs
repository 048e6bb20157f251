//! Watchdog (§5 "Watchdog"): a countdown reset by `pet()`, firing a
//! one-shot "bark" when nothing pets it in time. Used to detect a wedged
//! child process or a Consumer that has stopped draining events.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

pub struct Watchdog {
    pet_tx: mpsc::UnboundedSender<()>,
}

impl Watchdog {
    /// Spawns the countdown task. `bark_tx` fires once, the first time the
    /// timeout elapses without an intervening `pet()`.
    pub fn spawn(timeout: Duration, bark_tx: oneshot::Sender<()>) -> Self {
        let (pet_tx, mut pet_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            let mut bark_tx = Some(bark_tx);
            loop {
                tokio::select! {
                    pet = pet_rx.recv() => {
                        if pet.is_none() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(timeout) => {
                        if let Some(tx) = bark_tx.take() {
                            let _ = tx.send(());
                        }
                        return;
                    }
                }
            }
        });

        Self { pet_tx }
    }

    /// Resets the countdown. A failed send means the watchdog task already
    /// exited (it already barked, or was dropped); callers don't need to
    /// treat that as an error.
    pub fn pet(&self) {
        let _ = self.pet_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn barks_after_timeout_with_no_pets() {
        let (tx, rx) = oneshot::channel();
        let _watchdog = Watchdog::spawn(Duration::from_millis(20), tx);
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn petting_delays_the_bark() {
        let (tx, mut rx) = oneshot::channel();
        let watchdog = Watchdog::spawn(Duration::from_millis(30), tx);
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            watchdog.pet();
        }
        assert!(rx.try_recv().is_err());
    }
}
