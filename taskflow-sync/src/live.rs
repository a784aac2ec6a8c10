//! Live count channel supervisor.
//!
//! One tokio task owns the connection and the reconnect timer:
//! - each `task_count_update` message replaces the count aggregate
//! - abnormal close or failed connect: log, arm a single reconnect after
//!   `reconnect_delay` (fixed, no backoff, no attempt cap), then pull counts
//!   once in the background
//! - a successful connect disarms any pending reconnect
//! - a normal close is final until `connect_now` is called
//! - connects are polled by the loop, so `shutdown` never waits on one
//! - `shutdown` disarms the timer and closes the connection

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use taskflow_core::TaskCounts;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use crate::counts::CountSynchronizer;
use crate::error::SyncError;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Messages the server pushes. The client never sends anything.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    TaskCountUpdate(TaskCounts),
}

pub fn decode_message(text: &str) -> Result<LiveMessage, SyncError> {
    Ok(serde_json::from_str(text)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Intentional close by either side; no reconnect.
    Normal,
    Abnormal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Closed(CloseKind),
}

/// An open, receive-only connection.
#[async_trait]
pub trait LiveConnection: Send {
    /// Next text frame, or how the connection ended.
    async fn next_frame(&mut self) -> Frame;
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LiveConnection>, SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    /// Lost or failed; a reconnect is armed.
    Reconnecting,
    /// Closed normally; idle until asked to connect.
    Closed,
    Stopped,
}

#[derive(Debug)]
enum Command {
    ConnectNow,
    Shutdown,
}

/// Handle to the running supervisor task.
pub struct LiveChannel {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    task: JoinHandle<()>,
}

impl LiveChannel {
    /// Start the supervisor; it connects immediately.
    ///
    /// `today` supplies the local day for fallback pulls.
    pub fn spawn<F>(
        connector: Arc<dyn Connector>,
        counts: Arc<CountSynchronizer>,
        today: F,
        reconnect_delay: Duration,
    ) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ChannelStatus::Connecting);
        let supervisor = Supervisor {
            connector,
            counts,
            today,
            reconnect_delay,
            status: status_tx,
            conn: None,
            connecting: None,
            reconnect: None,
            fallback: None,
        };
        let task = tokio::spawn(supervisor.run(rx));
        Self { commands, status, task }
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Attempt a connection now if none is open.
    pub fn connect_now(&self) {
        let _ = self.commands.send(Command::ConnectNow);
    }

    /// Stop the supervisor and wait for it to exit. No reconnect fires afterwards.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "live channel supervisor ended abnormally");
        }
    }
}

type PendingConnect =
    Pin<Box<dyn Future<Output = Result<Box<dyn LiveConnection>, SyncError>> + Send>>;

struct Supervisor<F> {
    connector: Arc<dyn Connector>,
    counts: Arc<CountSynchronizer>,
    today: F,
    reconnect_delay: Duration,
    status: watch::Sender<ChannelStatus>,
    conn: Option<Box<dyn LiveConnection>>,
    connecting: Option<PendingConnect>,
    reconnect: Option<Pin<Box<Sleep>>>,
    fallback: Option<JoinHandle<()>>,
}

impl<F> Supervisor<F>
where
    F: Fn() -> NaiveDate + Send + Sync + 'static,
{
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.attempt();

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::ConnectNow) => {
                        if self.conn.is_none() && self.connecting.is_none() {
                            self.attempt();
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        self.teardown().await;
                        return;
                    }
                },
                result = pending_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect(result);
                }
                frame = next_frame(&mut self.conn) => self.on_frame(frame),
                () = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    debug!("reconnect timer fired");
                    self.attempt();
                }
            }
        }
    }

    /// Start a connect; it completes through the `select!` loop.
    fn attempt(&mut self) {
        self.status.send_replace(ChannelStatus::Connecting);
        let connector = self.connector.clone();
        self.connecting = Some(Box::pin(async move { connector.connect().await }));
    }

    fn on_connect(&mut self, result: Result<Box<dyn LiveConnection>, SyncError>) {
        match result {
            Ok(conn) => {
                if self.reconnect.take().is_some() {
                    debug!("connected; pending reconnect cancelled");
                }
                self.conn = Some(conn);
                self.status.send_replace(ChannelStatus::Connected);
                info!("live count channel connected");
            }
            Err(e) => {
                warn!(error = %e, "live count channel connect failed");
                self.lost();
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Text(text) => match decode_message(&text) {
                Ok(LiveMessage::TaskCountUpdate(counts)) => self.counts.apply_snapshot(counts),
                Err(e) => warn!(error = %e, "ignoring unrecognized live message"),
            },
            Frame::Closed(CloseKind::Normal) => {
                self.conn = None;
                self.status.send_replace(ChannelStatus::Closed);
                info!("live count channel closed normally");
            }
            Frame::Closed(CloseKind::Abnormal) => {
                self.conn = None;
                warn!("live count channel dropped");
                self.lost();
            }
        }
    }

    /// Arm one reconnect (replacing any already armed), then pull counts in
    /// the background. The timer runs from the moment the loss is seen.
    fn lost(&mut self) {
        self.reconnect = Some(Box::pin(sleep(self.reconnect_delay)));
        self.status.send_replace(ChannelStatus::Reconnecting);
        debug!(delay_ms = self.reconnect_delay.as_millis() as u64, "reconnect scheduled");

        let counts = self.counts.clone();
        let today = (self.today)();
        self.fallback = Some(tokio::spawn(async move {
            if let Err(e) = counts.refresh(today).await {
                debug!(error = %e, "fallback pull failed");
            }
        }));
    }

    async fn teardown(&mut self) {
        self.reconnect = None;
        self.connecting = None;
        if let Some(pull) = self.fallback.take() {
            pull.abort();
        }
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
        self.status.send_replace(ChannelStatus::Stopped);
        info!("live count channel stopped");
    }
}

async fn pending_connect(
    pending: &mut Option<PendingConnect>,
) -> Result<Box<dyn LiveConnection>, SyncError> {
    match pending {
        Some(f) => f.as_mut().await,
        None => future::pending().await,
    }
}

async fn next_frame(conn: &mut Option<Box<dyn LiveConnection>>) -> Frame {
    match conn {
        Some(c) => c.next_frame().await,
        None => future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_count_update() {
        let msg = decode_message(
            r#"{"type": "task_count_update",
                "data": {"inbox": 2, "today": 1, "upcoming": 3, "completed": 0, "projects": {"5": 4}}}"#,
        )
        .unwrap();
        let LiveMessage::TaskCountUpdate(counts) = msg;
        assert_eq!(counts.inbox, 2);
        assert_eq!(counts.project(5), 4);
    }

    #[test]
    fn rejects_unknown_message_types() {
        assert!(matches!(
            decode_message(r#"{"type": "task_created", "data": {}}"#),
            Err(SyncError::Decode(_))
        ));
        assert!(decode_message("not json").is_err());
    }
}
