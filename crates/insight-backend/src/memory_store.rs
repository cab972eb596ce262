use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use insight_core::types::{ConnectionConfig, Identity};
use insight_workspace::{CollaboratorError, ConfigStore};

/// Process-local [`ConfigStore`] keyed by email. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: Mutex<HashMap<String, ConnectionConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.configs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load_connection_config(
        &self,
        identity: &Identity,
    ) -> Result<Option<ConnectionConfig>, CollaboratorError> {
        Ok(self
            .configs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&identity.email)
            .cloned())
    }

    async fn save_connection_config(
        &self,
        identity: &Identity,
        config: &ConnectionConfig,
    ) -> Result<(), CollaboratorError> {
        self.configs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.email.clone(), config.clone());
        Ok(())
    }
}
