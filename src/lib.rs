pub mod client;
pub mod config;
pub mod conversation;
pub mod correlate;
pub mod document;
pub mod markers;
pub mod models;
pub mod normalize;
pub mod sse;

pub use config::AppConfig;
pub use conversation::ConversationController;
