use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::embedding::EmbeddingBackend;

/// Backup persona copy consulted when the stored profile leaves a field blank.
#[derive(Clone, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub name: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub experience: Option<String>,
    pub interests: Option<String>,
    pub calendly_link: Option<String>,
    pub meeting_rules: Option<String>,
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct RetrievalSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_document_top_k")]
    pub document_top_k: usize,
    #[serde(default = "default_conversation_top_k")]
    pub conversation_top_k: usize,
    #[serde(default = "default_true")]
    pub include_conversation: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            document_top_k: default_document_top_k(),
            conversation_top_k: default_conversation_top_k(),
            include_conversation: true,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default)]
    pub fastembed_model: Option<String>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub profile_defaults: ProfileDefaults,
    #[serde(default = "default_fallback_buffer_capacity")]
    pub fallback_buffer_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: String::new(),
            surrealdb_database: String::new(),
            http_port: default_http_port(),
            openai_base_url: default_base_url(),
            chat_model: default_chat_model(),
            chat_temperature: default_chat_temperature(),
            chat_max_tokens: default_chat_max_tokens(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            fastembed_model: None,
            history_limit: default_history_limit(),
            retrieval: RetrievalSettings::default(),
            profile_defaults: ProfileDefaults::default(),
            fallback_buffer_capacity: default_fallback_buffer_capacity(),
        }
    }
}

fn default_http_port() -> u16 {
    8000
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_chat_temperature() -> f32 {
    0.3
}

fn default_chat_max_tokens() -> u32 {
    500
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_history_limit() -> usize {
    10
}

fn default_top_k() -> usize {
    8
}

fn default_document_top_k() -> usize {
    8
}

fn default_conversation_top_k() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_fallback_buffer_capacity() -> usize {
    500
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    config.try_deserialize()
}
