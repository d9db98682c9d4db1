//! Runs an [`Engine`] on a dedicated thread.
//!
//! The thread is the only writer of the project state. Commands arrive over an
//! unbounded channel and every command is answered with exactly one batch of
//! events, in command order. Sending never blocks, so hosts may queue any
//! number of commands before draining.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::api::{Command, Engine, EngineErrorEvent, Event};

/// Sender used by hosts to dispatch commands to the engine thread.
pub type EngineCommandSender = Sender<Command>;

/// Receiver for the event batch answering each command.
pub type EngineEventReceiver = Receiver<Vec<Event>>;

/// Spawns the engine thread. It exits once every command sender is dropped.
pub fn spawn_engine_bridge(
    mut engine: Engine,
) -> (EngineCommandSender, EngineEventReceiver, JoinHandle<Engine>) {
    let (command_tx, command_rx) = mpsc::channel::<Command>();
    let (event_tx, event_rx) = mpsc::channel::<Vec<Event>>();

    let handle = thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            let events = match engine.handle_command(command) {
                Ok(events) => events,
                Err(failure) => {
                    error!(error = %failure, "engine command failed");
                    vec![Event::Rejected(EngineErrorEvent::from_error(&failure))]
                }
            };
            if event_tx.send(events).is_err() {
                debug!("event receiver dropped; stopping engine thread");
                break;
            }
        }
        engine
    });

    (command_tx, event_rx, handle)
}

/// Channel-backed handle to an engine thread.
#[derive(Debug)]
pub struct EngineBridge {
    command_tx: EngineCommandSender,
    event_rx: EngineEventReceiver,
    worker: Option<JoinHandle<Engine>>,
}

impl EngineBridge {
    /// Starts `engine` on its own thread.
    ///
    /// # Example
    /// ```
    /// use engine::{Command, Engine, EngineBridge, Event, TrackKind};
    ///
    /// let bridge = EngineBridge::spawn(Engine::default());
    /// let events = bridge
    ///     .dispatch(Command::AddTrack { name: "B-roll".to_string(), kind: TrackKind::Video })
    ///     .expect("engine thread is running");
    /// assert!(matches!(events[0], Event::ProjectChanged(_)));
    /// ```
    pub fn spawn(engine: Engine) -> Self {
        let (command_tx, event_rx, worker) = spawn_engine_bridge(engine);
        Self {
            command_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    /// Sends one command without waiting for its events.
    pub fn send_command(&self, command: Command) -> Result<(), BridgeError> {
        self.command_tx
            .send(command)
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Sends one command and blocks until its events arrive.
    ///
    /// Batches answering earlier [`EngineBridge::send_command`] calls must be
    /// drained first, otherwise they are returned here instead.
    pub fn dispatch(&self, command: Command) -> Result<Vec<Event>, BridgeError> {
        self.send_command(command)?;
        self.event_rx.recv().map_err(|_| BridgeError::Disconnected)
    }

    /// Receives all currently queued event batches without blocking.
    pub fn drain_events(&self) -> Result<Vec<Event>, BridgeError> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(batch) => events.extend(batch),
                Err(TryRecvError::Empty) => return Ok(events),
                Err(TryRecvError::Disconnected) => return Err(BridgeError::Disconnected),
            }
        }
    }

    /// Stops the engine thread and returns the engine with its final state.
    pub fn shutdown(mut self) -> Result<Engine, BridgeError> {
        let worker = self.worker.take().ok_or(BridgeError::Disconnected)?;
        let Self { command_tx, .. } = self;
        drop(command_tx);
        worker.join().map_err(|_| BridgeError::WorkerPanicked)
    }
}

/// Error raised by the host-engine bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    Disconnected,
    WorkerPanicked,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "engine thread is not running"),
            Self::WorkerPanicked => write!(f, "engine thread panicked"),
        }
    }
}

impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{EngineBridge, spawn_engine_bridge};
    use crate::api::{Command, Engine, Event};
    use crate::error::ErrorKind;
    use crate::project::TrackKind;

    #[test]
    fn bridge_answers_each_command_with_one_batch() {
        let (command_tx, event_rx, _worker) = spawn_engine_bridge(Engine::default());

        command_tx
            .send(Command::AddTrack {
                name: "Music".to_string(),
                kind: TrackKind::Audio,
            })
            .expect("send add track command");
        command_tx
            .send(Command::SetPlayhead { t: 5.0 })
            .expect("send playhead command");

        let first = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first batch");
        let second = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("second batch");

        assert!(matches!(first.as_slice(), [Event::ProjectChanged(_)]));
        assert_eq!(second, vec![Event::PlayheadChanged { t: 0.0 }]);
    }

    #[test]
    fn persistence_failure_is_forwarded_as_rejection() {
        let bridge = EngineBridge::spawn(Engine::default());
        let events = bridge
            .dispatch(Command::Load {
                path: "/nowhere/project.json".into(),
            })
            .expect("engine thread is running");

        let [Event::Rejected(rejection)] = events.as_slice() else {
            panic!("expected a rejection, got {events:?}");
        };
        assert_eq!(rejection.kind, ErrorKind::Persistence);
    }

    #[test]
    fn queued_commands_do_not_block_before_draining() {
        let bridge = EngineBridge::spawn(Engine::default());
        for _ in 0..100 {
            bridge
                .send_command(Command::AddTrack {
                    name: String::new(),
                    kind: TrackKind::Audio,
                })
                .expect("send add track command");
        }

        for _ in 0..100 {
            let batch = bridge
                .event_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("one batch per command");
            assert!(matches!(batch.as_slice(), [Event::ProjectChanged(_)]));
        }
        assert!(
            bridge
                .drain_events()
                .expect("engine thread is running")
                .is_empty()
        );

        let engine = bridge.shutdown().expect("engine thread joins");
        assert_eq!(engine.store().project().tracks.len(), 102);
    }

    #[test]
    fn shutdown_returns_engine_with_final_state() {
        let bridge = EngineBridge::spawn(Engine::default());
        bridge
            .send_command(Command::AddTrack {
                name: String::new(),
                kind: TrackKind::Video,
            })
            .expect("send add track command");
        let events = bridge
            .dispatch(Command::CheckIntegrity)
            .expect("engine thread is running");
        assert!(matches!(events.as_slice(), [Event::ProjectChanged(_)]));
        let events = bridge
            .event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("integrity batch");
        assert_eq!(events, vec![Event::IntegrityWarnings(Vec::new())]);
        assert!(
            bridge
                .drain_events()
                .expect("engine thread is running")
                .is_empty()
        );

        let engine = bridge.shutdown().expect("engine thread joins");
        assert_eq!(engine.store().project().tracks.len(), 3);
    }
}
