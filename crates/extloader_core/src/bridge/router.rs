//! Shared runtime-message channel.
//!
//! # Responsibility
//! - Recognize the reserved control messages (currently only termination).
//! - Hand every other runtime message to the application lifecycle
//!   collaborator unchanged.
//!
//! # Invariants
//! - Termination is requested from the lifecycle at most once per router.
//! - Runtime messages never reach extension instances.

use log::{debug, info};
use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Reserved message kind asking the hosting application to terminate.
pub const EXIT_MESSAGE: &str = "tizen://exit";

/// Control messages handled by the router itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Exit,
}

impl ControlMessage {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            EXIT_MESSAGE => Some(Self::Exit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exit => EXIT_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMessage {
    pub kind: String,
    pub data: Option<String>,
}

impl RuntimeMessage {
    pub fn new(kind: impl Into<String>, data: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            data: data.map(str::to_string),
        }
    }
}

/// Completion callback of an asynchronous runtime message.
pub type RuntimeCallback = Box<dyn FnOnce(Option<String>)>;

/// Application lifecycle collaborator.
pub trait AppLifecycle {
    /// Terminates the hosting application.
    fn on_terminate(&self);

    /// Receives a runtime message that is not a control message. The return
    /// value is handed back to the sender as the synchronous reply.
    fn on_runtime_message(
        &self,
        message: &RuntimeMessage,
        callback: Option<RuntimeCallback>,
    ) -> Option<String>;
}

/// Lifecycle that only records requests in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLifecycle;

impl AppLifecycle for LogLifecycle {
    fn on_terminate(&self) {
        info!("event=terminate_request module=bridge status=ignored reason=no_lifecycle");
    }

    fn on_runtime_message(
        &self,
        message: &RuntimeMessage,
        _callback: Option<RuntimeCallback>,
    ) -> Option<String> {
        debug!(
            "event=runtime_message module=bridge status=ignored kind={}",
            message.kind
        );
        None
    }
}

pub struct RuntimeMessageRouter {
    lifecycle: Rc<dyn AppLifecycle>,
    terminated: Cell<bool>,
}

impl RuntimeMessageRouter {
    pub fn new(lifecycle: Rc<dyn AppLifecycle>) -> Self {
        Self {
            lifecycle,
            terminated: Cell::new(false),
        }
    }

    /// Routes one runtime message. Control messages yield no reply.
    pub fn route(&self, message: RuntimeMessage, callback: Option<RuntimeCallback>) -> Option<String> {
        match ControlMessage::parse(&message.kind) {
            Some(ControlMessage::Exit) => {
                if self.terminated.replace(true) {
                    debug!("event=terminate_request module=bridge status=skipped reason=already_requested");
                } else {
                    info!("event=terminate_request module=bridge status=ok");
                    self.lifecycle.on_terminate();
                }
                None
            }
            None => self.lifecycle.on_runtime_message(&message, callback),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.get()
    }
}

impl Debug for RuntimeMessageRouter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeMessageRouter")
            .field("terminated", &self.terminated.get())
            .finish_non_exhaustive()
    }
}
