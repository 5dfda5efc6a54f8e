//! Shared application state

use std::sync::Arc;

use ctxmenu_core::{LogStore, RegistryManager};

use crate::error::{ApiError, ApiResult};

/// State handed to every handler
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    manager: RegistryManager,
    store: LogStore,
}

impl AppState {
    /// Wrap a manager and the log store it writes to
    pub fn new(manager: RegistryManager, store: LogStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner { manager, store }),
        }
    }

    /// Registry manager
    pub fn manager(&self) -> &RegistryManager {
        &self.inner.manager
    }

    /// Operation log store
    pub fn store(&self) -> &LogStore {
        &self.inner.store
    }

    /// Run synchronous registry or filesystem work off the async runtime
    pub async fn blocking<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&RegistryManager, &LogStore) -> ApiResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(state.manager(), state.store()))
            .await
            .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
    }
}
