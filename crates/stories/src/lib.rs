//! Story extraction and aggregate-note upkeep for a Markdown notes vault.
//!
//! The two text transforms ([`extract_story`] and [`upsert`]) are pure; the
//! [`StoryAggregator`] driver wires them to a [`Vault`], a [`DateProvider`]
//! and a [`Notifier`].

pub mod aggregator;
pub mod date;
pub mod error;
pub mod extract;
pub mod notice;
pub mod table;
pub mod upsert;
pub mod vault;

pub use aggregator::{AggregatorSettings, StoryAggregator, Trigger, UpdateOutcome};
pub use date::{DateProvider, FixedDate, NoteDate, SystemClock};
pub use error::StoryError;
pub use extract::{STORY_HEADING, extract_section, extract_story};
pub use notice::{LogNotifier, Notifier};
pub use table::{AggregateRow, parse_rows, stories_for};
pub use upsert::{UpsertPolicy, row_marker, upsert};
pub use vault::{FsVault, MemoryVault, Vault};

pub use storyroll_config::{ExistingRows, RenderMode};
