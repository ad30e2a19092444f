use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::common::error::EscrowError;
use crate::sync::{PushStream, PushTransport};

/// Push transport serving pre-scripted sessions. Each subscribe hands out
/// the next session's payloads and then closes; once the sessions run out,
/// every further attempt errors, which keeps the reconnect loop spinning.
pub struct ScriptedTransport {
    sessions: Mutex<VecDeque<Vec<String>>>,
    attempts: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(sessions: Vec<Vec<String>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn subscribe(&self, _url: &Url) -> Result<Box<dyn PushStream>, EscrowError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.sessions.lock().unwrap().pop_front() {
            Some(payloads) => Ok(Box::new(ScriptedStream {
                payloads: payloads.into(),
            })),
            None => Err(EscrowError::NetworkUnavailable(
                "no scripted session left".to_string(),
            )),
        }
    }
}

struct ScriptedStream {
    payloads: VecDeque<String>,
}

#[async_trait]
impl PushStream for ScriptedStream {
    async fn next_message(&mut self) -> Option<String> {
        self.payloads.pop_front()
    }
}

/// Push transport backed by a channel the test feeds at its own pace. The
/// single session stays open for as long as the sender side is alive.
pub struct ChannelTransport {
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            rx: Mutex::new(Some(rx)),
        };
        (transport, tx)
    }
}

#[async_trait]
impl PushTransport for ChannelTransport {
    async fn subscribe(&self, _url: &Url) -> Result<Box<dyn PushStream>, EscrowError> {
        match self.rx.lock().unwrap().take() {
            Some(rx) => Ok(Box::new(ChannelStream { rx })),
            None => Err(EscrowError::NetworkUnavailable(
                "channel session already consumed".to_string(),
            )),
        }
    }
}

struct ChannelStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl PushStream for ChannelStream {
    async fn next_message(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
