use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use veboost_core::config::{LoggingConfig, ProtocolConfig};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn new(explicit_file: &Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let mut s = config::Config::builder();

        // our base config will always be in /etc/veboost
        s = s.add_source(config::File::with_name("/etc/veboost/veboost.toml").required(false));

        // but we can override it by having a file in the working dir
        s = s.add_source(config::File::with_name("veboost.toml").required(false));

        // if an explicit file was passed, then we load it as mandatory
        if let Some(explicit) = explicit_file.as_ref().and_then(|x| x.to_str()) {
            s = s.add_source(config::File::with_name(explicit).required(true));
        }

        // finally, we use env vars to make some last-step overrides
        s = s.add_source(
            config::Environment::with_prefix("VEBOOST")
                .prefix_separator("_")
                .separator("__"),
        );

        s.build()?.try_deserialize()
    }
}
