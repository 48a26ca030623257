//! Process configuration read from the environment, plus the optional dev seed file.
//!
//! | Variable                               | Default        | Notes                          |
//! |----------------------------------------|----------------|--------------------------------|
//! | `ARLEDGER_BIND_ADDR`                   | `0.0.0.0:8080` | socket address                 |
//! | `USE_PERSISTENT_STORES`                | `false`        | Postgres allocation store      |
//! | `DATABASE_URL`                         | -              | required when persistent       |
//! | `ARLEDGER_DEFAULT_CLEARING_ACCOUNT_ID` | -              | UUID, memos without their own |
//! | `ARLEDGER_SEED_FILE`                   | -              | JSON fixture, see [`SeedData`] |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use arledger_accounting::{Account, AccountId};
use arledger_allocation::{CreditMemo, Invoice, InvoiceId};
use arledger_core::{Money, TenantId};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("failed to read seed file {path}: {source}")]
    SeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file {path}: {source}")]
    SeedParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `Some` when the Postgres allocation store is selected.
    pub database_url: Option<String>,
    pub default_clearing_account_id: Option<AccountId>,
    pub seed_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("ARLEDGER_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "ARLEDGER_BIND_ADDR",
                message: e.to_string(),
            })?;

        let persistent = match get("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                message: e.to_string(),
            })?,
        };

        let database_url = if persistent {
            Some(get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?)
        } else {
            None
        };

        let default_clearing_account_id = get("ARLEDGER_DEFAULT_CLEARING_ACCOUNT_ID")
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .map(AccountId::from)
                    .map_err(|e| ConfigError::Invalid {
                        key: "ARLEDGER_DEFAULT_CLEARING_ACCOUNT_ID",
                        message: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            bind_addr,
            database_url,
            default_clearing_account_id,
            seed_file: get("ARLEDGER_SEED_FILE").map(PathBuf::from),
        })
    }

    pub fn use_persistent_stores(&self) -> bool {
        self.database_url.is_some()
    }
}

/// A payment already received against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedPayment {
    pub invoice_id: InvoiceId,
    pub amount: Money,
}

/// Dev fixture: the collaborator data this engine only reads, plus issued credit memos.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedData {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub payments: Vec<SeedPayment>,
    #[serde(default)]
    pub credit_memos: Vec<CreditMemo>,
}

impl SeedData {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::SeedIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::SeedParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_in_memory_on_8080() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert!(!config.use_persistent_stores());
        assert_eq!(config.default_clearing_account_id, None);
        assert_eq!(config.seed_file, None);
    }

    #[test]
    fn persistent_mode_requires_database_url() {
        let err = AppConfig::from_lookup(lookup(&[("USE_PERSISTENT_STORES", "true")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let config = AppConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/arledger"),
        ]))
        .unwrap();
        assert!(config.use_persistent_stores());
    }

    #[test]
    fn rejects_malformed_values() {
        for (key, value) in [
            ("ARLEDGER_BIND_ADDR", "not-an-addr"),
            ("USE_PERSISTENT_STORES", "maybe"),
            ("ARLEDGER_DEFAULT_CLEARING_ACCOUNT_ID", "1234"),
        ] {
            let err = AppConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            match err {
                ConfigError::Invalid { key: k, .. } => assert_eq!(k, key),
                other => panic!("expected Invalid for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parses_clearing_account_and_seed_path() {
        let id = Uuid::now_v7();
        let raw_id = id.to_string();
        let config = AppConfig::from_lookup(lookup(&[
            ("ARLEDGER_DEFAULT_CLEARING_ACCOUNT_ID", raw_id.as_str()),
            ("ARLEDGER_SEED_FILE", "seed/dev.json"),
            ("ARLEDGER_BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.default_clearing_account_id, Some(AccountId::from(id)));
        assert_eq!(config.seed_file, Some(PathBuf::from("seed/dev.json")));
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn seed_sections_are_optional() {
        let tenant = TenantId::new();
        let seed = SeedData::parse(&format!(r#"{{ "tenant_id": "{tenant}" }}"#)).unwrap();
        assert_eq!(seed.tenant_id, tenant);
        assert!(seed.accounts.is_empty() && seed.credit_memos.is_empty());
    }

    #[test]
    fn seed_amounts_are_decimal_strings() {
        let tenant = TenantId::new();
        let invoice = InvoiceId::new();
        let raw = format!(
            r#"{{ "tenant_id": "{tenant}",
                 "payments": [{{ "invoice_id": "{invoice}", "amount": "12.50" }}] }}"#
        );
        let seed = SeedData::parse(&raw).unwrap();
        assert_eq!(seed.payments[0].amount, Money::from_cents(1_250));
    }
}
