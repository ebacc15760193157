//! Host runtime boundary.
//!
//! # Responsibility
//! - Define what the loader needs from the native host: one-time
//!   initialization, extension enumeration, runtime variable updates, and a
//!   per-extension instance carrying the message primitives.
//! - Provide in-process building blocks for hosts (`StaticHost`,
//!   `LoopbackInstance`, `ChunkStore`).
//!
//! # Invariants
//! - `initialize` is called before `get_extensions`.
//! - The loader calls `get_extensions` exactly once.
//! - Everything here is single-threaded (`Rc`-based, `!Send`).

pub mod chunk;
pub mod loopback;
pub mod static_host;
pub mod variables;

pub use chunk::{ChunkData, ChunkId, ChunkStore, ChunkType};
pub use variables::RuntimeVariables;

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Listener receiving messages posted by the host instance.
pub type MessageListener = Box<dyn Fn(&str)>;
/// Listener receiving data messages and the id of the stored chunk, if any.
pub type DataListener = Box<dyn Fn(&str, Option<ChunkId>)>;

/// Reply to a synchronous data call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDataReply {
    pub reply: String,
    /// Chunk stored for `receive_chunk_data`, when the reply carried bytes.
    pub chunk_id: Option<ChunkId>,
}

/// Live host-side instance of one extension.
///
/// Return values follow the host contract: `false`/`None` when the call was
/// rejected (e.g. the instance is not loaded yet).
pub trait ExtensionInstance {
    fn load_instance(&self) -> Result<(), HostError>;
    fn post_message(&self, message: &str) -> bool;
    fn send_sync_message(&self, message: &str) -> Option<String>;
    fn set_message_listener(&self, listener: MessageListener) -> bool;
    fn post_data(&self, message: &str, chunk: &[u8]) -> bool;
    fn send_sync_data(&self, message: &str, chunk: &[u8]) -> Option<SyncDataReply>;
    fn set_data_listener(&self, listener: DataListener) -> bool;
    fn receive_chunk_data(&self, chunk_id: ChunkId, chunk_type: ChunkType) -> Option<ChunkData>;
}

/// One extension as enumerated by the host.
#[derive(Clone)]
pub struct HostExtension {
    pub name: String,
    /// Module key resolved against the loader's module catalog.
    pub code: String,
    pub entry_points: Vec<String>,
    pub use_trampoline: bool,
    pub instance: Rc<dyn ExtensionInstance>,
}

impl Debug for HostExtension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostExtension")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("entry_points", &self.entry_points)
            .field("use_trampoline", &self.use_trampoline)
            .finish_non_exhaustive()
    }
}

/// Native host runtime contract.
pub trait HostRuntime {
    fn initialize(&self, variables: &RuntimeVariables) -> Result<(), HostError>;
    fn get_extensions(&self) -> Result<Vec<HostExtension>, HostError>;
    fn update_runtime_variables(&self, variables: &RuntimeVariables) -> Result<(), HostError>;
}

/// Host collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Enumeration was requested before `initialize`.
    NotInitialized,
    /// The instance for the named extension could not be created.
    InstanceUnavailable(String),
    /// Any other host-side failure.
    Failed(String),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "host runtime is not initialized"),
            Self::InstanceUnavailable(name) => {
                write!(f, "extension instance is unavailable: {name}")
            }
            Self::Failed(message) => write!(f, "host runtime failure: {message}"),
        }
    }
}

impl Error for HostError {}
