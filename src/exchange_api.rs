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

//! HTTP rate source backed by an exchangerate-api compatible endpoint.
//!
//! Requests `GET {endpoint}/{api_key}/pair/{FROM}/{TO}` and reads
//! `conversion_rate` from the JSON body.

use crate::currency::{Currency, RateSource};
use crate::error::LedgerError;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rate: Option<f64>,
}

/// Rate lookups over HTTP with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ExchangeRateApi {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ExchangeRateApi {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::ConversionError(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, from: Currency, to: Currency) -> String {
        format!(
            "{}/{}/pair/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.api_key,
            from.code(),
            to.code()
        )
    }
}

impl RateSource for ExchangeRateApi {
    fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        // The url carries the api key, keep it out of error messages.
        let response = self.client.get(self.url(from, to)).send().map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                LedgerError::ConversionError(format!("rate lookup {from}->{to} timed out"))
            } else {
                LedgerError::ConversionError(format!("rate lookup {from}->{to} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%from, %to, %status, "rate api returned bad status");
            return Err(LedgerError::ConversionError(format!(
                "rate api returned status {status}"
            )));
        }

        let body: PairResponse = response.json().map_err(|e| {
            LedgerError::ConversionError(format!("malformed rate response: {}", e.without_url()))
        })?;

        if body.result != "success" {
            let reason = body.error_type.unwrap_or(body.result);
            return Err(LedgerError::ConversionError(format!("rate api error: {reason}")));
        }

        let rate = body
            .conversion_rate
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            // f64 Display is the shortest round-trip form, so 0.37 stays 0.37.
            .and_then(|rate| rate.to_string().parse::<Decimal>().ok())
            .ok_or_else(|| LedgerError::ConversionError("rate api returned no usable rate".into()))?;
        Ok(rate)
    }
}
