use std::sync::Arc;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    services::{AuthSettings, ChatCompletion, MovieProvider, SuggestionCache},
};

/// Shared application state, handed to every handler as `Arc<AppState>`
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub movies: Arc<dyn MovieProvider>,
    /// `None` when no LLM key is configured
    pub llm: Option<Arc<dyn ChatCompletion>>,
    pub suggestions: SuggestionCache,
    pub auth: AuthSettings,
    pub admin_password: Option<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        movies: Arc<dyn MovieProvider>,
        llm: Option<Arc<dyn ChatCompletion>>,
        auth: AuthSettings,
        admin_password: Option<String>,
    ) -> Self {
        Self {
            store,
            movies,
            llm,
            suggestions: SuggestionCache::default(),
            auth,
            admin_password: admin_password.filter(|p| !p.is_empty()),
        }
    }

    pub fn llm(&self) -> AppResult<&dyn ChatCompletion> {
        self.llm
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("AI service is not configured".to_string()))
    }
}
