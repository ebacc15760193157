//! In-process extension instance.
//!
//! # Responsibility
//! - Implement [`ExtensionInstance`] on top of plain Rust callbacks so an
//!   extension's native half can live in the same process as the loader.
//! - Park data replies in a [`ChunkStore`] and hand out chunk ids.
//!
//! # Invariants
//! - Message and data calls are rejected until `load_instance` succeeded;
//!   listeners may be registered at any time.
//! - Listener borrows are released before a listener runs, so a listener may
//!   call back into the instance.

use crate::host::chunk::{ChunkData, ChunkId, ChunkStore, ChunkType};
use crate::host::{DataListener, ExtensionInstance, HostError, MessageListener, SyncDataReply};
use log::debug;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Native-side behavior of one in-process extension.
pub trait InstanceHandler {
    /// Handles a fire-and-forget message. Replies go through `outbox`.
    fn handle_message(&self, message: &str, outbox: &Outbox<'_>);

    /// Handles a synchronous message. `None` means no reply was produced.
    fn handle_sync_message(&self, message: &str) -> Option<String>;

    fn handle_data(&self, _message: &str, _chunk: &[u8], _outbox: &Outbox<'_>) {}

    /// Handles a synchronous data call, returning the reply text and an
    /// optional payload.
    fn handle_sync_data(&self, _message: &str, _chunk: &[u8]) -> Option<(String, Vec<u8>)> {
        None
    }
}

/// Delivery handle passed to [`InstanceHandler`] callbacks.
pub struct Outbox<'a> {
    instance: &'a LoopbackInstance,
}

impl Outbox<'_> {
    /// Delivers a message to the registered message listener.
    pub fn post_message(&self, message: &str) -> bool {
        self.instance.deliver_message(message)
    }

    /// Stores `chunk` and delivers its id to the registered data listener.
    /// Nothing is stored when no data listener is registered.
    pub fn post_data(&self, message: &str, chunk: Vec<u8>) -> bool {
        self.instance.deliver_data(message, chunk)
    }
}

type SharedMessageListener = Rc<dyn Fn(&str)>;
type SharedDataListener = Rc<dyn Fn(&str, Option<ChunkId>)>;

pub struct LoopbackInstance {
    name: String,
    handler: Rc<dyn InstanceHandler>,
    loaded: Cell<bool>,
    message_listener: RefCell<Option<SharedMessageListener>>,
    data_listener: RefCell<Option<SharedDataListener>>,
    chunks: RefCell<ChunkStore>,
}

impl LoopbackInstance {
    pub fn new(name: impl Into<String>, handler: Rc<dyn InstanceHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            loaded: Cell::new(false),
            message_listener: RefCell::new(None),
            data_listener: RefCell::new(None),
            chunks: RefCell::new(ChunkStore::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Posts a message to the listener from outside a handler callback, e.g.
    /// from a host event source.
    pub fn emit_message(&self, message: &str) -> bool {
        self.deliver_message(message)
    }

    pub fn emit_data(&self, message: &str, chunk: Vec<u8>) -> bool {
        self.deliver_data(message, chunk)
    }

    fn outbox(&self) -> Outbox<'_> {
        Outbox { instance: self }
    }

    fn deliver_message(&self, message: &str) -> bool {
        let listener = self.message_listener.borrow().clone();
        match listener {
            Some(listener) => {
                listener(message);
                true
            }
            None => false,
        }
    }

    fn deliver_data(&self, message: &str, chunk: Vec<u8>) -> bool {
        let listener = self.data_listener.borrow().clone();
        let Some(listener) = listener else {
            return false;
        };
        let chunk_id = self.chunks.borrow_mut().store(chunk);
        listener(message, chunk_id);
        true
    }
}

impl Debug for LoopbackInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackInstance")
            .field("name", &self.name)
            .field("loaded", &self.loaded.get())
            .field("pending_chunks", &self.chunks.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ExtensionInstance for LoopbackInstance {
    fn load_instance(&self) -> Result<(), HostError> {
        self.loaded.set(true);
        debug!(
            "event=instance_load module=host status=ok extension={}",
            self.name
        );
        Ok(())
    }

    fn post_message(&self, message: &str) -> bool {
        if !self.is_loaded() {
            return false;
        }
        self.handler.handle_message(message, &self.outbox());
        true
    }

    fn send_sync_message(&self, message: &str) -> Option<String> {
        if !self.is_loaded() {
            return None;
        }
        self.handler.handle_sync_message(message)
    }

    fn set_message_listener(&self, listener: MessageListener) -> bool {
        *self.message_listener.borrow_mut() = Some(Rc::from(listener));
        true
    }

    fn post_data(&self, message: &str, chunk: &[u8]) -> bool {
        if !self.is_loaded() {
            return false;
        }
        self.handler.handle_data(message, chunk, &self.outbox());
        true
    }

    fn send_sync_data(&self, message: &str, chunk: &[u8]) -> Option<SyncDataReply> {
        if !self.is_loaded() {
            return None;
        }
        let (reply, payload) = self.handler.handle_sync_data(message, chunk)?;
        let chunk_id = self.chunks.borrow_mut().store(payload);
        Some(SyncDataReply { reply, chunk_id })
    }

    fn set_data_listener(&self, listener: DataListener) -> bool {
        *self.data_listener.borrow_mut() = Some(Rc::from(listener));
        true
    }

    fn receive_chunk_data(&self, chunk_id: ChunkId, chunk_type: ChunkType) -> Option<ChunkData> {
        self.chunks.borrow_mut().take(chunk_id, chunk_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{InstanceHandler, LoopbackInstance, Outbox};
    use crate::host::chunk::{ChunkData, ChunkType};
    use crate::host::ExtensionInstance;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct EchoHandler;

    impl InstanceHandler for EchoHandler {
        fn handle_message(&self, message: &str, outbox: &Outbox<'_>) {
            outbox.post_message(&format!("echo:{message}"));
        }

        fn handle_sync_message(&self, message: &str) -> Option<String> {
            Some(message.to_uppercase())
        }

        fn handle_data(&self, message: &str, chunk: &[u8], outbox: &Outbox<'_>) {
            outbox.post_data(message, chunk.iter().rev().copied().collect());
        }

        fn handle_sync_data(&self, message: &str, chunk: &[u8]) -> Option<(String, Vec<u8>)> {
            Some((format!("{message}:{}", chunk.len()), chunk.to_vec()))
        }
    }

    fn instance() -> LoopbackInstance {
        LoopbackInstance::new("test.echo", Rc::new(EchoHandler))
    }

    #[test]
    fn rejects_calls_before_load() {
        let instance = instance();
        assert!(!instance.post_message("hi"));
        assert_eq!(instance.send_sync_message("hi"), None);
        assert!(!instance.post_data("hi", &[1]));
        assert_eq!(instance.send_sync_data("hi", &[1]), None);
    }

    #[test]
    fn routes_async_replies_to_message_listener() {
        let instance = instance();
        instance.load_instance().expect("load");
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        instance.set_message_listener(Box::new(move |msg| sink.borrow_mut().push(msg.to_string())));

        assert!(instance.post_message("ping"));
        assert_eq!(instance.send_sync_message("ping").as_deref(), Some("PING"));
        assert_eq!(*received.borrow(), vec!["echo:ping".to_string()]);
    }

    #[test]
    fn data_replies_are_collected_once_by_chunk_id() {
        let instance = instance();
        instance.load_instance().expect("load");
        let chunk_ids = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&chunk_ids);
        instance.set_data_listener(Box::new(move |_, id| sink.borrow_mut().push(id)));

        assert!(instance.post_data("flip", &[1, 2, 3]));
        let id = chunk_ids.borrow()[0].expect("chunk stored");
        assert_eq!(
            instance.receive_chunk_data(id, ChunkType::Octet),
            Some(ChunkData::Octet(vec![3, 2, 1]))
        );
        assert_eq!(instance.receive_chunk_data(id, ChunkType::Octet), None);

        let reply = instance.send_sync_data("size", b"abc").expect("reply");
        assert_eq!(reply.reply, "size:3");
        let id = reply.chunk_id.expect("chunk stored");
        assert_eq!(
            instance.receive_chunk_data(id, ChunkType::String),
            Some(ChunkData::Text("abc".to_string()))
        );
    }

    #[test]
    fn listener_may_reenter_instance() {
        let instance = Rc::new(instance());
        instance.load_instance().expect("load");
        let inner = Rc::clone(&instance);
        let replies = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&replies);
        instance.set_message_listener(Box::new(move |msg| {
            sink.borrow_mut().push(inner.send_sync_message(msg));
        }));

        assert!(instance.emit_message("again"));
        assert_eq!(*replies.borrow(), vec![Some("AGAIN".to_string())]);
    }
}
