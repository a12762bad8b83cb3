pub mod cli;
pub mod extract;
pub mod http;
pub mod manager;
pub mod persist;
pub mod scrapers;

pub use cli::{handle_command, HumanDuration, ScraperCommands};
pub use extract::ContentExtractor;
pub use http::HttpClient;
pub use manager::{Pipeline, Politeness, RunOutcome};
pub use persist::Persister;
pub use scrapers::Source;

pub mod prelude {
    pub use super::scrapers::{SearchEngine, Source};
    pub use ww_core::{Candidate, Error, Result};
}
