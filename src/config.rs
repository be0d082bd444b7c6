//! Runtime configuration.
//!
//! Everything is read from environment variables. Unset variables take the
//! defaults below; set-but-malformed variables are an error.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::fetcher::{Endpoint, Envelope};
use crate::pow::PowHash;

// Testnet defaults, same deployment the farm UI talks to.
pub const TESTNET_RPC: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_CONTRACT: &str = "CDSWUUXGPWDZG76ISK6SUCVPZJMD5YUV66J2FXFXFGDX25XKZJIEITAO";
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const KALE_ISSUER: &str = "GCHPTWXMT3HYF4RLZHWBNRF4MPXLTJ76ISHMSYIWCCDXWUYOQG5MR2AB";

/// KALE Stellar Asset Contract, the id balance and price APIs key on.
pub const KALE_TOKEN_ADDRESS: &str = "CB23WRDQWGSP6YPMY4UV5C4OW5CBTXKYN3XEATG7KJEZCXMJBYEHOUOV";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the Soroban side lives.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub contract_id: String,
    pub network_passphrase: String,
    pub asset_issuer: String,
}

/// Holder and price fetching.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub token_address: String,
    pub holder_endpoints: Vec<Endpoint>,
    pub price_endpoints: Vec<Endpoint>,
    pub request_timeout: Duration,
    /// Attempts per endpoint, at least one.
    pub retries: usize,
    pub retry_delay: Duration,
    pub top_limit: usize,
    pub holders_ttl: Duration,
    pub price_ttl: Duration,
    /// Served, flagged as such, when every price source fails.
    pub price_placeholder: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FarmConfig {
    /// Keccak-256 unless overridden. Only Keccak-256 digests are submitted.
    pub pow_hash: PowHash,
    pub max_attempts: u64,
    pub target_score: u32,
    pub plant_work_delay: Duration,
    pub work_harvest_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub fetch: FetchConfig,
    pub farm: FarmConfig,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let token_address = vars.string("KALE_TOKEN_ADDRESS", KALE_TOKEN_ADDRESS);

        let holder_endpoints = match vars.raw("KALE_HOLDER_ENDPOINTS") {
            Some(value) => parse_endpoints("KALE_HOLDER_ENDPOINTS", &value)?,
            None => default_holder_endpoints(&token_address),
        };
        let price_endpoints = match vars.raw("KALE_PRICE_ENDPOINTS") {
            Some(value) => parse_endpoints("KALE_PRICE_ENDPOINTS", &value)?,
            None => vec![Endpoint::new(format!(
                "https://price.jup.ag/v4/price?ids={}",
                token_address
            ))],
        };

        let retries: usize = vars.parse("KALE_FETCH_RETRIES", 2)?;
        if retries == 0 {
            return Err(ConfigError::Invalid {
                var: "KALE_FETCH_RETRIES",
                value: "0".into(),
                reason: "at least one attempt per endpoint is required".into(),
            });
        }

        let fetch = FetchConfig {
            token_address,
            holder_endpoints,
            price_endpoints,
            request_timeout: Duration::from_millis(vars.parse("KALE_REQUEST_TIMEOUT_MS", 5000)?),
            retries,
            retry_delay: Duration::from_millis(vars.parse("KALE_RETRY_DELAY_MS", 1000)?),
            top_limit: vars.parse("TOP_LIMIT", 5)?,
            holders_ttl: Duration::from_secs(vars.parse("KALE_HOLDERS_CACHE_SECS", 30)?),
            price_ttl: Duration::from_secs(vars.parse("KALE_PRICE_CACHE_SECS", 300)?),
            price_placeholder: vars.parse_opt("KALE_PRICE_PLACEHOLDER")?,
        };

        let farm = FarmConfig {
            pow_hash: vars.parse("KALE_POW_HASH", PowHash::Keccak256)?,
            max_attempts: vars.parse("KALE_POW_MAX_ATTEMPTS", 1000)?,
            target_score: vars.parse("KALE_POW_TARGET_SCORE", 3)?,
            plant_work_delay: Duration::from_millis(vars.parse("KALE_PLANT_WORK_DELAY_MS", 5000)?),
            work_harvest_delay: Duration::from_millis(
                vars.parse("KALE_WORK_HARVEST_DELAY_MS", 10_000)?,
            ),
        };

        let ledger = LedgerConfig {
            rpc_url: vars.string("KALE_RPC_URL", TESTNET_RPC),
            contract_id: vars.string("KALE_CONTRACT_ID", TESTNET_CONTRACT),
            network_passphrase: vars.string("KALE_NETWORK_PASSPHRASE", TESTNET_PASSPHRASE),
            asset_issuer: vars.string("KALE_ASSET_ISSUER", KALE_ISSUER),
        };

        Ok(Self {
            ledger,
            fetch,
            farm,
            bind_addr: vars.parse("KALE_BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3737)))?,
        })
    }
}

fn default_holder_endpoints(token: &str) -> Vec<Endpoint> {
    vec![
        Endpoint::new(format!(
            "https://api.hoops.finance/tokens/{}/balances?excludezero=true&excludeid=true&excludetoken=true&excludelastupdated=true",
            token
        )),
        Endpoint::new(format!(
            "https://api.stellar.expert/explorer/public/asset/{}/balances",
            token
        )),
        Endpoint::new(format!(
            "https://api.stellar.expert/explorer/public/asset/{}/holders",
            token
        )),
    ]
}

/// `url[|shape],url[|shape],...`
fn parse_endpoints(var: &'static str, value: &str) -> Result<Vec<Endpoint>, ConfigError> {
    let mut endpoints = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let endpoint = match item.split_once('|') {
            Some((url, shape)) => {
                let envelope = shape.parse::<Envelope>().map_err(|reason| ConfigError::Invalid {
                    var,
                    value: item.to_string(),
                    reason,
                })?;
                Endpoint::new(url.trim()).with_shape(envelope)
            }
            None => Endpoint::new(item),
        };
        endpoints.push(endpoint);
    }

    if endpoints.is_empty() {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "no endpoints listed".into(),
        });
    }
    Ok(endpoints)
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.raw(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_opt(var)?.unwrap_or(default))
    }

    fn parse_opt<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.raw(var)
            .map(|value| {
                value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                    var,
                    reason: e.to_string(),
                    value,
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();

        assert_eq!(config.fetch.holder_endpoints.len(), 3);
        assert!(config.fetch.holder_endpoints[0].url.contains("api.hoops.finance"));
        assert_eq!(config.fetch.top_limit, 5);
        assert_eq!(config.fetch.retries, 2);
        assert_eq!(config.fetch.holders_ttl, Duration::from_secs(30));
        assert!(config.fetch.holders_ttl < config.fetch.price_ttl);
        assert_eq!(config.fetch.price_placeholder, None);
        assert_eq!(config.farm.max_attempts, 1000);
        assert_eq!(config.farm.target_score, 3);
        assert_eq!(config.farm.pow_hash, PowHash::Keccak256);
        assert_eq!(config.ledger.network_passphrase, TESTNET_PASSPHRASE);
        assert_eq!(config.bind_addr.port(), 3737);
    }

    #[test]
    fn test_endpoint_list_with_shape_hints() {
        let config = config_with(&[(
            "KALE_HOLDER_ENDPOINTS",
            "https://a.example/h|leaderboard, https://b.example/h",
        )])
        .unwrap();

        let endpoints = &config.fetch.holder_endpoints;
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url, "https://a.example/h");
        assert_eq!(endpoints[0].shape, Some(Envelope::Field("leaderboard")));
        assert_eq!(endpoints[1].shape, None);
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(config_with(&[("TOP_LIMIT", "five")]).is_err());
        assert!(config_with(&[("KALE_FETCH_RETRIES", "0")]).is_err());
        assert!(config_with(&[("KALE_POW_HASH", "md5")]).is_err());
        assert!(config_with(&[("KALE_HOLDER_ENDPOINTS", "https://a|nested")]).is_err());

        let err = config_with(&[("KALE_RETRY_DELAY_MS", "-1")]).unwrap_err();
        assert!(err.to_string().contains("KALE_RETRY_DELAY_MS"));
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("TOP_LIMIT", "10"),
            ("KALE_POW_HASH", "sha3-256"),
            ("KALE_PRICE_PLACEHOLDER", "0.000123"),
            ("KALE_BIND_ADDR", "0.0.0.0:8080"),
        ])
        .unwrap();

        assert_eq!(config.fetch.top_limit, 10);
        assert_eq!(config.farm.pow_hash, PowHash::Sha3_256);
        assert_eq!(config.fetch.price_placeholder, Some(0.000123));
        assert_eq!(config.bind_addr.port(), 8080);
    }
}
