pub mod config;
pub mod db;
pub mod llm;
pub mod models;
pub mod page;
pub mod server;
pub mod telemetry;

/**
 * \brief Common re-exports for front-end crates.
 */
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::db;
    pub use crate::llm::{self, CompletionClient, CompletionError, OpenAiClient};
    pub use crate::models;
    pub use crate::server;
    pub use crate::telemetry;
}
