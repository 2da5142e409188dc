//! File system change watching for doclib
//!
//! A [`ChangeWatcher`] subscribes to recursive notifications below the
//! library root. The notify callback only forwards raw events into a channel;
//! one consumer task debounces them into [`InvalidationBatch`]es and hands
//! each batch to an [`InvalidationSink`].

pub mod batch;
pub mod debounce;
pub mod event;
pub mod watcher;

pub use batch::{route, InvalidationBatch, InvalidationSink};
pub use debounce::{Debouncer, MAX_BATCH_AGE_WINDOWS};
pub use event::{ChangeKind, EntryKind, RawChange};
pub use watcher::{spawn_consumer, ChangeWatcher};
