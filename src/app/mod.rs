use crate::config::ConfigListing;

pub mod actions;
pub mod capture;
pub mod coordinator;
pub mod events;
pub mod notice;

pub use actions::{Request, Response, handle_request};
pub use coordinator::{Coordinator, RunProgress};
pub use events::EngineEvent;
pub use notice::{Notice, NoticeKind, RunReply};

/// Everything a request handler needs. Shared by all connections.
pub struct App {
    pub coordinator: Coordinator,
    pub config: ConfigListing,
}

impl App {
    pub fn new(coordinator: Coordinator, config: ConfigListing) -> Self {
        Self { coordinator, config }
    }
}
