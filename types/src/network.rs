//! Network identifier.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifies which network the node under `--rpc-url` is serving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    #[default]
    Main,
    /// The public test network.
    Test,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// Default node RPC port for this network.
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Self::Main => 8332,
            Self::Test => 18332,
            Self::Regtest => 18443,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
            Self::Regtest => "regtest",
        }
    }
}

impl FromStr for Network {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "test" | "testnet" => Ok(Self::Test),
            "regtest" => Ok(Self::Regtest),
            other => Err(ParseError::InvalidNetwork(other.to_string())),
        }
    }
}
