pub mod commands;
pub mod config;
pub mod diff;
pub mod fetchers;
pub mod relay;
pub mod scheduler;
pub mod server;
pub mod sink;
pub mod supervisor;
pub mod traits;
pub mod types;
pub mod watermark;

pub use config::{Config, FetcherKind};
pub use fetchers::{ApiFetcher, RssFetcher};
pub use relay::{Relay, RelayOutcome};
pub use scheduler::PollScheduler;
pub use sink::DiscordSink;
pub use supervisor::{AddOutcome, CycleReport, RemoveOutcome, SourceSupervisor};
pub use traits::{FeedFetcher, NotificationSink};
pub use types::{Attachment, AttachmentKind, Item, RelayError, Result, TrackedSource};
pub use watermark::WatermarkStore;
