//! UI-affine runtime
//!
//! The coordinator and every native surface live on the thread that owns
//! the `UiRuntime`. Other threads (the stdin reader, tests) only hold a
//! `UiHandle` and marshal work onto that thread through its inbox. Delayed
//! work goes through the same inbox and then waits in a timer queue.

use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::app::coordinator::Coordinator;
use crate::app::scheduler::{Task, TaskHandle, TimerQueue};
use crate::config::BeaconConfig;
use crate::platform::{NativeEventPump, Platform};
use crate::protocol::{Command, Outbound, ProtocolError};

/// Longest the loop waits before pumping native messages again
const IDLE_WAIT: Duration = Duration::from_millis(16);

/// Work sent to the UI thread
pub enum UiMessage {
    Command(Result<Command, ProtocolError>),
    Schedule {
        delay: Duration,
        handle: TaskHandle,
        task: Task,
    },
    Shutdown,
}

/// Cloneable, `Send` entry point onto the UI thread
#[derive(Clone)]
pub struct UiHandle {
    tx: Sender<UiMessage>,
}

impl UiHandle {
    /// Queues a parsed (or unparseable) command; false once the runtime is gone
    pub fn submit(&self, command: Result<Command, ProtocolError>) -> bool {
        self.tx.send(UiMessage::Command(command)).is_ok()
    }

    pub fn submit_line(&self, line: &str) -> bool {
        self.submit(Command::parse(line))
    }

    /// Runs `task` on the UI thread after `delay`
    ///
    /// The returned handle cancels the task if it has not run yet.
    pub fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let message = UiMessage::Schedule {
            delay,
            handle: handle.clone(),
            task,
        };
        if self.tx.send(message).is_err() {
            handle.cancel();
        }
        handle
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(UiMessage::Shutdown);
    }
}

pub struct UiRuntime {
    coordinator: Coordinator,
    inbox: Receiver<UiMessage>,
    handle: UiHandle,
    timers: TimerQueue<Task>,
    pump: Rc<dyn NativeEventPump>,
}

impl UiRuntime {
    /// Must be called on the thread that will run the loop
    pub fn new(platform: Platform, config: &BeaconConfig, outbound: Sender<Outbound>) -> Self {
        let (tx, inbox) = mpsc::channel();
        let handle = UiHandle { tx };
        let pump = Rc::clone(&platform.pump);
        tracing::info!(platform = platform.name, "ui runtime created");
        let coordinator = Coordinator::new(platform, config, handle.clone(), outbound);
        Self {
            coordinator,
            inbox,
            handle,
            timers: TimerQueue::new(),
            pump,
        }
    }

    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Drains the inbox and runs every timer due at `now`
    ///
    /// Returns false once a shutdown was requested.
    pub fn turn(&mut self, now: Instant) -> bool {
        loop {
            let mut progressed = false;
            while let Ok(message) = self.inbox.try_recv() {
                progressed = true;
                if !self.dispatch(message, now) {
                    return false;
                }
            }
            while let Some(task) = self.timers.pop_due(now) {
                progressed = true;
                task(&mut self.coordinator);
            }
            if !progressed {
                return true;
            }
        }
    }

    fn dispatch(&mut self, message: UiMessage, now: Instant) -> bool {
        match message {
            UiMessage::Command(command) => self.coordinator.handle(command),
            UiMessage::Schedule { delay, handle, task } => {
                self.timers.push(now + delay, handle, task);
            }
            UiMessage::Shutdown => return false,
        }
        true
    }

    /// Runs on real time until shutdown
    pub fn run(mut self) {
        tracing::info!("ui runtime running");
        loop {
            if !self.turn(Instant::now()) {
                break;
            }
            self.pump.pump();

            let timeout = self
                .timers
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .map_or(IDLE_WAIT, |until| until.min(IDLE_WAIT));
            match self.inbox.recv_timeout(timeout) {
                Ok(message) => {
                    if !self.dispatch(message, Instant::now()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.coordinator.shutdown();
        tracing::info!("ui runtime stopped");
    }
}
