//! Config discovery/loading for pulsechat: `pulsechat.{toml,yaml,yml,json}`
//! in the working directory, then `~/.config/pulsechat/`, with `${VAR}`
//! environment substitution. Falls back to defaults and writes a starter
//! file when nothing is found.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use loader::{config_dir, discover_and_load, find_or_default_config_path, load_config};
pub use schema::{AuthConfig, PresenceConfig, PulsechatConfig, ServerConfig, StoreConfig};
