// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ledger configuration, loaded from TOML.
//!
//! ```toml
//! base_currency = "usd"
//! history_page_size = 10
//! store_timeout_ms = 2000
//!
//! [rates]
//! timeout_ms = 5000
//! api_key = "..."   # omit to use the fixed table below
//!
//! [rates.fixed]
//! gel = "0.37"
//! ```

use crate::currency::{Currency, FixedRates, RateSource};
use crate::error::ConfigError;
use crate::exchange_api::ExchangeRateApi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unit every balance is stored in.
    pub base_currency: Currency,
    /// Log entries per history page.
    pub history_page_size: usize,
    /// How long a store call waits for the lock.
    pub store_timeout_ms: u64,
    pub rates: RatesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_currency: Currency::Usd,
            history_page_size: 10,
            store_timeout_ms: 2_000,
            rates: RatesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub timeout_ms: u64,
    pub endpoint: String,
    /// When set, rates come from the HTTP api instead of `fixed`.
    pub api_key: Option<String>,
    /// Value of one unit of each currency in the base currency, as decimal strings.
    pub fixed: BTreeMap<String, Decimal>,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            endpoint: "https://v6.exchangerate-api.com/v6".to_string(),
            api_key: None,
            fixed: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_page_size == 0 {
            return Err(ConfigError::Invalid("history_page_size must be positive".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store_timeout_ms must be positive".into()));
        }
        if self.rates.timeout_ms == 0 {
            return Err(ConfigError::Invalid("rates.timeout_ms must be positive".into()));
        }
        self.fixed_rates().map(|_| ())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn rate_timeout(&self) -> Duration {
        Duration::from_millis(self.rates.timeout_ms)
    }

    /// Builds the static rate table from `[rates.fixed]`.
    pub fn fixed_rates(&self) -> Result<FixedRates, ConfigError> {
        self.rates
            .fixed
            .iter()
            .try_fold(FixedRates::new(self.base_currency), |rates, (code, rate)| {
                let currency: Currency = code
                    .parse()
                    .map_err(|_| ConfigError::Invalid(format!("unknown currency '{code}' in rates.fixed")))?;
                if *rate <= Decimal::ZERO {
                    return Err(ConfigError::Invalid(format!("rate for {currency} must be positive")));
                }
                Ok(rates.with_rate(currency, *rate))
            })
    }

    /// The HTTP api when an api key is configured, otherwise the fixed table.
    pub fn rate_source(&self) -> Result<Box<dyn RateSource>, ConfigError> {
        match &self.rates.api_key {
            Some(api_key) => {
                let api = ExchangeRateApi::new(&self.rates.endpoint, api_key, self.rate_timeout())
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Box::new(api))
            }
            None => Ok(Box::new(self.fixed_rates()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.store_timeout(), Duration::from_secs(2));
        assert_eq!(config.rate_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parses_full_document() {
        let config = Config::from_toml_str(
            r#"
            base_currency = "gel"
            history_page_size = 5
            store_timeout_ms = 250

            [rates]
            timeout_ms = 1000
            api_key = "k"

            [rates.fixed]
            usd = "2.7"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_currency, Currency::Gel);
        assert_eq!(config.history_page_size, 5);
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        assert_eq!(config.rates.api_key.as_deref(), Some("k"));
        assert_eq!(config.rates.fixed.get("usd"), Some(&dec!(2.7)));
    }

    #[test]
    fn fixed_rates_feed_the_rate_table() {
        let config = Config::from_toml_str("[rates.fixed]\nrub = \"0.01\"\n").unwrap();
        let rates = config.fixed_rates().unwrap();
        assert_eq!(rates.rate(Currency::Rub, Currency::Usd), Ok(dec!(0.01)));
    }

    #[test]
    fn rejects_zero_page_size() {
        assert!(matches!(
            Config::from_toml_str("history_page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_fixed_currency() {
        assert!(matches!(
            Config::from_toml_str("[rates.fixed]\neur = \"1.1\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(Config::from_toml_str("history_page_size = ["), Err(ConfigError::Parse(_))));
    }
}
