use crate::config::StoreConfig;
use crate::storage::ConversationStore;
use std::sync::Arc;

// Built once by the composition root and handed to whatever needs the store
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
}

impl AppState {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            store: Arc::new(ConversationStore::new(config)),
        }
    }
}
