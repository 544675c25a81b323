use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Applies to list, delete, create and blob checks. Pulls are never timed out.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct UploadConfig {
    /// Expected artifact extension, without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub parameters: GenerationParameters,
}

/// Generation parameters baked into every model created from an upload
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GenerationParameters {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
const fn default_timeout_secs() -> u64 {
    10
}
const fn default_connect_timeout_secs() -> u64 {
    5
}
const fn default_ttl_secs() -> u64 {
    60
}
fn default_extension() -> String {
    "gguf".to_string()
}
const fn default_temperature() -> f32 {
    0.7
}
const fn default_top_p() -> f32 {
    0.9
}
const fn default_top_k() -> u32 {
    40
}
const fn default_num_ctx() -> u32 {
    4096
}
const fn default_repeat_penalty() -> f32 {
    1.1
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            parameters: GenerationParameters::default(),
        }
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            num_ctx: default_num_ctx(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}
