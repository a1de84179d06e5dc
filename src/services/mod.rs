pub mod auth;
pub mod calendar;
pub mod llm;
pub mod populate;
pub mod recommendation;
pub mod suggestions;
pub mod tmdb;

pub use auth::AuthSettings;
pub use llm::{ChatCompletion, GroqClient};
pub use populate::Lookup;
pub use suggestions::SuggestionCache;
pub use tmdb::{MovieProvider, TmdbProvider};
