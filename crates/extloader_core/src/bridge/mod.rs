//! Per-extension message bridge.
//!
//! A [`Bridge`] is handed to an extension module while it is evaluated. It
//! forwards the instance primitives to the host instance and sends runtime
//! messages to the shared [`RuntimeMessageRouter`]. Nothing is buffered,
//! retried or reordered here.

pub mod router;

pub use router::{
    AppLifecycle, ControlMessage, LogLifecycle, RuntimeCallback, RuntimeMessage,
    RuntimeMessageRouter, EXIT_MESSAGE,
};

use crate::host::{
    ChunkData, ChunkId, ChunkType, DataListener, ExtensionInstance, MessageListener,
    SyncDataReply,
};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Clone)]
pub struct Bridge {
    extension: Rc<str>,
    instance: Rc<dyn ExtensionInstance>,
    router: Rc<RuntimeMessageRouter>,
}

impl Bridge {
    pub fn new(
        extension: &str,
        instance: Rc<dyn ExtensionInstance>,
        router: Rc<RuntimeMessageRouter>,
    ) -> Self {
        Self {
            extension: Rc::from(extension),
            instance,
            router,
        }
    }

    /// Name of the extension this bridge belongs to.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn post_message(&self, message: &str) -> bool {
        self.instance.post_message(message)
    }

    pub fn send_sync_message(&self, message: &str) -> Option<String> {
        self.instance.send_sync_message(message)
    }

    pub fn set_message_listener(&self, listener: MessageListener) -> bool {
        self.instance.set_message_listener(listener)
    }

    pub fn post_data(&self, message: &str, chunk: &[u8]) -> bool {
        self.instance.post_data(message, chunk)
    }

    pub fn send_sync_data(&self, message: &str, chunk: &[u8]) -> Option<SyncDataReply> {
        self.instance.send_sync_data(message, chunk)
    }

    pub fn set_data_listener(&self, listener: DataListener) -> bool {
        self.instance.set_data_listener(listener)
    }

    pub fn receive_chunk_data(&self, chunk_id: ChunkId, chunk_type: ChunkType) -> Option<ChunkData> {
        self.instance.receive_chunk_data(chunk_id, chunk_type)
    }

    pub fn send_runtime_message(&self, kind: &str, data: Option<&str>) -> Option<String> {
        self.router.route(RuntimeMessage::new(kind, data), None)
    }

    pub fn send_runtime_sync_message(&self, kind: &str, data: Option<&str>) -> Option<String> {
        self.router.route(RuntimeMessage::new(kind, data), None)
    }

    pub fn send_runtime_async_message(
        &self,
        kind: &str,
        data: Option<&str>,
        callback: RuntimeCallback,
    ) -> Option<String> {
        self.router.route(RuntimeMessage::new(kind, data), Some(callback))
    }
}

impl Debug for Bridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("extension", &self.extension)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
