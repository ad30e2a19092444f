use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

/// Remaining time until expiry, in whole minutes and seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Remaining {
    pub minutes: i64,
    pub seconds: i64,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}m {:02}s", self.minutes, self.seconds)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownMsg {
    Tick(Remaining),
    Expired,
}

/// Remaining time from the client's local clock against the server-supplied
/// absolute instant. `None` once the deadline is reached, including exactly
/// at `now`. Clock skew is not compensated.
pub fn remaining_between(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Remaining> {
    let diff = expires_at - now;
    if diff <= chrono::Duration::zero() {
        return None;
    }
    let total_seconds = diff.num_seconds();
    Some(Remaining {
        minutes: total_seconds / 60,
        seconds: total_seconds % 60,
    })
}

/// One-second cadence ticker for a single trade view. Starting a new
/// countdown replaces any running one - the owner drops/stops the previous
/// instance before constructing the next.
pub(crate) struct Countdown {
    expires_at: DateTime<Utc>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl Countdown {
    pub(crate) fn start(
        expires_at: DateTime<Utc>,
        tick_tx: mpsc::Sender<CountdownMsg>,
    ) -> Self {
        let task_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                match remaining_between(expires_at, Utc::now()) {
                    Some(remaining) => {
                        if tick_tx.send(CountdownMsg::Tick(remaining)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // Reaching zero emits once, then the cadence stops
                        let _ = tick_tx.send(CountdownMsg::Expired).await;
                        break;
                    }
                }
            }
            debug!("Countdown for expiry {} finished", expires_at);
        });

        Self {
            expires_at,
            task_handle,
        }
    }

    pub(crate) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub(crate) fn stop(self) {
        self.task_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_splits_into_minutes_and_seconds() {
        let now = Utc::now();
        let remaining =
            remaining_between(now + chrono::Duration::seconds(125), now).unwrap();
        assert_eq!(remaining.minutes, 2);
        assert_eq!(remaining.seconds, 5);
        assert_eq!(remaining.to_string(), "2m 05s");
    }

    #[test]
    fn deadline_exactly_at_now_is_expired() {
        let now = Utc::now();
        assert_eq!(remaining_between(now, now), None);
        assert_eq!(remaining_between(now - chrono::Duration::seconds(1), now), None);
        assert!(remaining_between(now + chrono::Duration::seconds(1), now).is_some());
    }

    #[tokio::test]
    async fn elapsed_deadline_reports_expired_and_stops() {
        let (tick_tx, mut tick_rx) = mpsc::channel(4);
        let countdown = Countdown::start(Utc::now(), tick_tx);

        assert_eq!(tick_rx.recv().await, Some(CountdownMsg::Expired));
        // The task is done, so the channel closes rather than ticking on
        assert_eq!(tick_rx.recv().await, None);
        countdown.stop();
    }

    #[tokio::test]
    async fn running_countdown_ticks_remaining_time() {
        let (tick_tx, mut tick_rx) = mpsc::channel(4);
        let expires_at = Utc::now() + chrono::Duration::seconds(90);
        let countdown = Countdown::start(expires_at, tick_tx);

        match tick_rx.recv().await {
            Some(CountdownMsg::Tick(remaining)) => {
                assert!(remaining.minutes == 1);
            }
            other => panic!("expected a tick, got {:?}", other),
        }
        countdown.stop();
    }
}
