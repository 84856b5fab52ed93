pub mod config;

pub use config::{
    parse_clock_time, CategoryConfig, Config, DiscordConfig, RelayConfig, RestartConfig,
};
