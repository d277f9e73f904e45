// Declare the modules
pub mod commands;
pub mod config;
pub mod error;
pub mod image;
pub mod models;
pub mod state;
pub mod storage;

pub use config::StoreConfig;
pub use error::StoreError;
pub use models::{Conversation, ConversationInput};
pub use storage::ConversationStore;
