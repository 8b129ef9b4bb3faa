//! Reconnecting stream consumer.
//!
//! An explicit state machine (Idle → Connecting → Open → ReconnectWait →
//! Connecting … → Closed) running in a spawned task. Three kinds of input
//! funnel into the same loop: transport outcomes, host commands
//! (`close`, `reconnect`), and environment triggers (`page_visible`,
//! `network_online`). At most one connect attempt is ever in flight, and
//! environment triggers bypass a pending backoff wait only while the
//! transport is down - they never interrupt a connecting or open stream.

use std::pin::pin;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tasklive_core::event::Event;

use crate::backoff::Backoff;
use crate::transport::{EventStream, StreamTransport};

/// Tunables for the reconnect loop.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backoff starting point.
    pub initial_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

/// What the controller reports to the hosting application.
#[derive(Debug, PartialEq)]
pub enum ClientEvent {
    /// An application event. Control events are consumed internally and
    /// never show up here.
    Event(Event),
    /// The attempt budget is spent and the controller has stopped
    /// retrying. Emitted exactly once per exhaustion; only a manual
    /// `reconnect()` revives the stream.
    Disconnected,
}

/// Host commands and environment triggers, funneled into the machine.
#[derive(Debug)]
enum Command {
    PageVisible,
    NetworkOnline,
    Close,
    Reconnect,
}

/// Handle used by the host to drive a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ControllerHandle {
    /// The page became visible again; reconnect immediately if the
    /// transport is currently down.
    pub fn page_visible(&self) {
        let _ = self.cmd_tx.send(Command::PageVisible);
    }

    /// Network connectivity was restored.
    pub fn network_online(&self) {
        let _ = self.cmd_tx.send(Command::NetworkOnline);
    }

    /// Tear down the transport, cancel any pending reconnect and stop.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }

    /// Close, reset backoff state and connect afresh.
    pub fn reconnect(&self) {
        let _ = self.cmd_tx.send(Command::Reconnect);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Connecting,
    Open,
    ReconnectWait,
    Closed,
}

/// Start a controller over the given transport.
///
/// Returns the command handle and the channel on which application
/// events (and the final [`ClientEvent::Disconnected`]) arrive. The
/// controller task exits when the handle and every clone are dropped.
pub fn spawn<T: StreamTransport>(
    transport: T,
    config: ClientConfig,
) -> (ControllerHandle, mpsc::UnboundedReceiver<ClientEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(run(transport, config, cmd_rx, event_tx));
    (ControllerHandle { cmd_tx }, event_rx)
}

async fn run<T: StreamTransport>(
    transport: T,
    config: ClientConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut backoff = Backoff::new(config.initial_delay, config.max_delay, config.max_attempts);
    let mut stream: Option<EventStream> = None;
    let mut phase = Phase::Idle;

    loop {
        match phase {
            Phase::Idle => {
                debug!("Controller starting");
                phase = Phase::Connecting;
            }

            Phase::Connecting => {
                // The only place a connect happens: one attempt in flight.
                let mut connect = pin!(transport.connect());
                phase = loop {
                    tokio::select! {
                        result = &mut connect => match result {
                            Ok(opened) => {
                                info!("Stream open");
                                backoff.reset();
                                stream = Some(opened);
                                break Phase::Open;
                            }
                            Err(e) => {
                                warn!(error = %e, "Connect attempt failed");
                                break Phase::ReconnectWait;
                            }
                        },
                        cmd = cmd_rx.recv() => match cmd {
                            Some(Command::Close) => break Phase::Closed,
                            Some(Command::Reconnect) => {
                                backoff.reset();
                                break Phase::Connecting;
                            }
                            // Never interrupt an in-flight attempt.
                            Some(Command::PageVisible) | Some(Command::NetworkOnline) => continue,
                            None => return,
                        },
                    }
                };
            }

            Phase::Open => {
                let Some(mut active) = stream.take() else {
                    phase = Phase::ReconnectWait;
                    continue;
                };
                // The stream object is dropped on every exit from this
                // loop; reconnection always starts from a fresh transport.
                phase = loop {
                    tokio::select! {
                        item = active.next() => match item {
                            Some(Ok(event)) => {
                                if event.is_control() {
                                    debug!(kind = %event.kind, "Control event");
                                } else if event_tx.send(ClientEvent::Event(event)).is_err() {
                                    // Host dropped the receiver; nothing left to do.
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "Stream failed");
                                break Phase::ReconnectWait;
                            }
                            None => {
                                info!("Stream ended by server");
                                break Phase::ReconnectWait;
                            }
                        },
                        cmd = cmd_rx.recv() => match cmd {
                            Some(Command::Close) => break Phase::Closed,
                            Some(Command::Reconnect) => {
                                backoff.reset();
                                break Phase::Connecting;
                            }
                            // Transport is healthy; environment triggers are moot.
                            Some(Command::PageVisible) | Some(Command::NetworkOnline) => {}
                            None => return,
                        },
                    }
                };
            }

            Phase::ReconnectWait => {
                let Some(delay) = backoff.next_delay() else {
                    info!(attempts = backoff.attempts(), "Reconnect attempts exhausted, giving up");
                    let _ = event_tx.send(ClientEvent::Disconnected);
                    phase = Phase::Closed;
                    continue;
                };
                debug!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = backoff.attempts(),
                    "Waiting before reconnect"
                );
                let mut wait = pin!(tokio::time::sleep(delay));
                phase = loop {
                    tokio::select! {
                        _ = &mut wait => break Phase::Connecting,
                        cmd = cmd_rx.recv() => match cmd {
                            Some(Command::Close) => break Phase::Closed,
                            Some(Command::Reconnect) => {
                                backoff.reset();
                                break Phase::Connecting;
                            }
                            Some(Command::PageVisible) | Some(Command::NetworkOnline) => {
                                // Transport is down here, safe to skip the wait.
                                debug!("Environment trigger, reconnecting immediately");
                                break Phase::Connecting;
                            }
                            None => return,
                        },
                    }
                };
            }

            Phase::Closed => {
                match cmd_rx.recv().await {
                    Some(Command::Reconnect) => {
                        backoff.reset();
                        phase = Phase::Connecting;
                    }
                    // Closed is sticky for everything except a manual
                    // reconnect; see the error-handling contract.
                    Some(_) => {}
                    None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::ClientError;

    /// What one scripted connect attempt does.
    enum Attempt {
        Fail,
        /// Yield these events, then end the stream.
        Serve(Vec<Event>),
        /// Stay open, yielding events fed through the sender.
        Hold(mpsc::UnboundedReceiver<Event>),
    }

    struct ScriptedTransport {
        attempts: Mutex<VecDeque<Attempt>>,
        connects: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Attempt>) -> Arc<Self> {
            Arc::new(Self {
                attempts: Mutex::new(script.into()),
                connects: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl StreamTransport for Arc<ScriptedTransport> {
        async fn connect(&self) -> Result<EventStream, ClientError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let attempt = self.attempts.lock().unwrap().pop_front();
            match attempt {
                None | Some(Attempt::Fail) => {
                    Err(ClientError::Stream("scripted failure".to_string()))
                }
                Some(Attempt::Serve(events)) => Ok(Box::pin(futures::stream::iter(
                    events.into_iter().map(Ok::<Event, ClientError>),
                ))),
                Some(Attempt::Hold(mut rx)) => Ok(Box::pin(async_stream::stream! {
                    while let Some(event) = rx.recv().await {
                        yield Ok(event);
                    }
                })),
            }
        }
    }

    fn fast_config(max_attempts: u32) -> ClientConfig {
        ClientConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_events_are_filtered() {
        let transport = ScriptedTransport::new(vec![Attempt::Serve(vec![
            Event::connected(),
            Event::heartbeat(),
            Event::new("task-updated"),
        ])]);
        let (_handle, mut events) = spawn(transport, fast_config(1));

        // Exactly one callback, carrying only the application event.
        match events.recv().await {
            Some(ClientEvent::Event(event)) => assert_eq!(event.kind, "task-updated"),
            other => panic!("expected application event, got {:?}", other),
        }
        assert_eq!(events.recv().await, Some(ClientEvent::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_backoff_emits_one_disconnect() {
        let transport = ScriptedTransport::new(vec![]);
        let (_handle, mut events) = spawn(transport.clone(), fast_config(3));

        assert_eq!(events.recv().await, Some(ClientEvent::Disconnected));
        // Initial attempt plus one per budgeted retry, then nothing more.
        assert_eq!(transport.connects.load(Ordering::SeqCst), 4);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 4);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_close_is_silent() {
        let (feed, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Attempt::Hold(rx)]);
        let (handle, mut events) = spawn(transport, fast_config(3));

        feed.send(Event::new("task-created")).unwrap();
        assert!(matches!(events.recv().await, Some(ClientEvent::Event(_))));

        handle.close();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(events.try_recv().is_err(), "manual close must not emit Disconnected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_revives_a_closed_controller() {
        let transport = ScriptedTransport::new(vec![
            Attempt::Fail,
            Attempt::Serve(vec![Event::new("board-refresh")]),
        ]);
        let (handle, mut events) = spawn(transport, fast_config(0));

        // Budget of zero: first failure is terminal.
        assert_eq!(events.recv().await, Some(ClientEvent::Disconnected));

        handle.reconnect();
        match events.recv().await {
            Some(ClientEvent::Event(event)) => assert_eq!(event.kind, "board-refresh"),
            other => panic!("expected application event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_visibility_trigger_bypasses_the_wait() {
        let (feed, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Attempt::Fail, Attempt::Hold(rx)]);
        let config = ClientConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(120),
            max_attempts: 5,
        };
        let (handle, mut events) = spawn(transport.clone(), config);

        // Give the first (failing) attempt time to land in the wait.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);

        handle.page_visible();
        feed.send(Event::new("task-updated")).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("reconnect should not wait out the backoff delay");
        assert!(matches!(received, Some(ClientEvent::Event(_))));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_stream_is_reestablished_after_backoff() {
        let (feed, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![
            Attempt::Serve(vec![Event::new("first")]),
            Attempt::Hold(rx),
        ]);
        let (_handle, mut events) = spawn(transport.clone(), fast_config(2));

        assert!(matches!(events.recv().await, Some(ClientEvent::Event(_))));

        // The ended stream is re-established after one backoff wait.
        feed.send(Event::new("second")).unwrap();
        match events.recv().await {
            Some(ClientEvent::Event(event)) => assert_eq!(event.kind, "second"),
            other => panic!("expected application event, got {:?}", other),
        }
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
    }
}
