use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "cirrus config does not exist. Looked in:\n\
        - $CIRRUS_CONFIG\n\
        - ./.cirrus/config.yaml\n\
        - ~/.config/cirrus/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("No cloud selected. Run `cirrus config --cloud <name>` first")]
    NoCloudSelected,

    #[error("No region selected. Run `cirrus config --region <name>` first")]
    NoRegionSelected,

    #[error("Invalid cloud: {0}")]
    InvalidCloud(String),

    #[error("Cloud \"{0}\" has no REGIONS setting")]
    MissingRegions(String),

    #[error("Cloud \"{0}\" has no supported regions")]
    EmptyRegions(String),

    #[error("Cloud \"{cloud}\" does not support region \"{region}\"")]
    InvalidRegion { cloud: String, region: String },

    #[error("Missing setting {key} for cloud \"{cloud}\"")]
    MissingKey { cloud: String, key: &'static str },

    #[error("Invalid POLL setting: {0}")]
    InvalidPoll(String),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
