//! Long-running watcher process: file-change, schedule and on-demand
//! triggers feeding a single serialized update worker.

pub mod debounce;
mod server;
pub mod watcher;

pub use debounce::Debouncer;
pub use server::{DailySchedule, WatchOptions, WatchService, WorkerStats, spawn_update_worker};
pub use watcher::{NoteWatcher, touches_note};
