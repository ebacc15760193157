#![allow(dead_code)]

use extloader_core::host::{
    ChunkData, ChunkId, ChunkType, DataListener, MessageListener, SyncDataReply,
};
use extloader_core::{
    AppLifecycle, Diagnostic, DiagnosticSink, ExtensionInstance, ExtensionLoader, HostError,
    HostExtension, HostRuntime, RuntimeMessage, RuntimeVariables,
};
use extloader_core::bridge::RuntimeCallback;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Host serving a fixed extension list and recording every call.
#[derive(Default)]
pub struct MockHost {
    extensions: Vec<HostExtension>,
    pub initialized_with: RefCell<Option<RuntimeVariables>>,
    pub enumerations: Cell<usize>,
    pub pushed: RefCell<Vec<RuntimeVariables>>,
}

impl MockHost {
    pub fn new(extensions: Vec<HostExtension>) -> Rc<Self> {
        Rc::new(Self {
            extensions,
            ..Self::default()
        })
    }
}

impl HostRuntime for MockHost {
    fn initialize(&self, variables: &RuntimeVariables) -> Result<(), HostError> {
        *self.initialized_with.borrow_mut() = Some(variables.clone());
        Ok(())
    }

    fn get_extensions(&self) -> Result<Vec<HostExtension>, HostError> {
        if self.initialized_with.borrow().is_none() {
            return Err(HostError::NotInitialized);
        }
        self.enumerations.set(self.enumerations.get() + 1);
        Ok(self.extensions.clone())
    }

    fn update_runtime_variables(&self, variables: &RuntimeVariables) -> Result<(), HostError> {
        self.pushed.borrow_mut().push(variables.clone());
        Ok(())
    }
}

/// Instance that records what it receives and lets tests fire its listener.
#[derive(Default)]
pub struct RecordingInstance {
    pub fail_load: bool,
    pub loads: Cell<usize>,
    pub posted: RefCell<Vec<String>>,
    listener: RefCell<Option<Rc<dyn Fn(&str)>>>,
}

impl RecordingInstance {
    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    /// Delivers `message` to the registered listener, if any.
    pub fn emit(&self, message: &str) -> bool {
        let listener = self.listener.borrow().clone();
        match listener {
            Some(listener) => {
                listener(message);
                true
            }
            None => false,
        }
    }
}

impl ExtensionInstance for RecordingInstance {
    fn load_instance(&self) -> Result<(), HostError> {
        self.loads.set(self.loads.get() + 1);
        if self.fail_load {
            return Err(HostError::Failed("instance library missing".to_string()));
        }
        Ok(())
    }

    fn post_message(&self, message: &str) -> bool {
        self.posted.borrow_mut().push(message.to_string());
        true
    }

    fn send_sync_message(&self, message: &str) -> Option<String> {
        self.posted.borrow_mut().push(message.to_string());
        Some(format!("reply:{message}"))
    }

    fn set_message_listener(&self, listener: MessageListener) -> bool {
        *self.listener.borrow_mut() = Some(Rc::from(listener));
        true
    }

    fn post_data(&self, _message: &str, _chunk: &[u8]) -> bool {
        false
    }

    fn send_sync_data(&self, _message: &str, _chunk: &[u8]) -> Option<SyncDataReply> {
        None
    }

    fn set_data_listener(&self, _listener: DataListener) -> bool {
        false
    }

    fn receive_chunk_data(&self, _chunk_id: ChunkId, _chunk_type: ChunkType) -> Option<ChunkData> {
        None
    }
}

/// Builds a host record whose module key is the extension name.
pub fn extension(
    name: &str,
    entry_points: &[&str],
    use_trampoline: bool,
    instance: &Rc<RecordingInstance>,
) -> HostExtension {
    let instance: Rc<dyn ExtensionInstance> = instance.clone();
    HostExtension {
        name: name.to_string(),
        code: name.to_string(),
        entry_points: entry_points.iter().map(|e| e.to_string()).collect(),
        use_trampoline,
        instance,
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub diagnostics: RefCell<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.diagnostics
            .borrow()
            .iter()
            .map(|diagnostic| diagnostic.message.clone())
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

#[derive(Default)]
pub struct RecordingLifecycle {
    pub terminations: Cell<usize>,
    pub messages: RefCell<Vec<RuntimeMessage>>,
}

impl AppLifecycle for RecordingLifecycle {
    fn on_terminate(&self) {
        self.terminations.set(self.terminations.get() + 1);
    }

    fn on_runtime_message(
        &self,
        message: &RuntimeMessage,
        callback: Option<RuntimeCallback>,
    ) -> Option<String> {
        self.messages.borrow_mut().push(message.clone());
        if let Some(callback) = callback {
            callback(message.data.clone());
        }
        None
    }
}

/// Late-bound handle to the loader for code that runs before `start`
/// returns (modules, listeners).
#[derive(Clone, Default)]
pub struct LoaderSlot(Rc<RefCell<Weak<ExtensionLoader>>>);

impl LoaderSlot {
    pub fn set(&self, loader: &Rc<ExtensionLoader>) {
        *self.0.borrow_mut() = Rc::downgrade(loader);
    }

    pub fn get(&self) -> Option<Rc<ExtensionLoader>> {
        self.0.borrow().upgrade()
    }
}
