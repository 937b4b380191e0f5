//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, ContextConfig, EmbeddingSettings, GenerationSettings,
    RetrievalConfig, RoutingConfig, StoreBackend, StoreSettings,
};
