//! Sigil Core - Effect execution engine for declarative applications
//!
//! This crate implements the server-side core of the sigil runtime. Client
//! events arrive as named transitions against an entity; the trait layer
//! (outside this crate) decides which effects to run, and this crate executes
//! them:
//!
//! - **Binding resolution**: `@root.path` references resolved against the
//!   per-request execution context
//! - **Effect dispatch**: an ordered list of tagged effects interpreted
//!   against storage and the context, with client-bound effects collected
//!   for the caller's UI
//! - **Storage providers**: interchangeable volatile and durable backends
//!   behind one CRUD-plus-filter trait
//! - **Event bus**: in-process publish/subscribe for fire-and-forget
//!   notifications decoupled from the request cycle
//!
//! ## Execution model
//!
//! Each inbound event gets a fresh [`EffectDispatcher`] and an owned
//! [`EventContext`]. Effects run strictly in caller order; failures degrade
//! to nulls and soft-failure audit records rather than aborting the list.
//! The only errors that propagate are genuine storage backend faults.

pub mod binding;
pub mod bus;
pub mod context;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod response;
pub mod storage;

pub use binding::{resolve, resolve_deep};
pub use bus::{EventBus, SubscriptionId};
pub use context::EventContext;
pub use dispatch::EffectDispatcher;
pub use effect::{Effect, EffectResult, PersistAction};
pub use error::{StorageError, StorageResult};
pub use response::{process_effects, EventRequest, EventResponse};
pub use storage::{DocumentStore, MemoryStore, StorageProvider};
