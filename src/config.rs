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

//! Ledger configuration.

use crate::error::ConfigError;
use std::time::Duration;

/// Environment variable overriding [`LedgerConfig::queue_capacity`].
pub const QUEUE_CAPACITY_ENV: &str = "LEDGER_QUEUE_CAPACITY";

/// Environment variable overriding [`LedgerConfig::transaction_timeout`], in milliseconds.
pub const TX_TIMEOUT_ENV: &str = "LEDGER_TX_TIMEOUT_MS";

/// Tunables for a [`Ledger`](crate::Ledger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Maximum number of pending transactions before producers block.
    pub queue_capacity: usize,

    /// How long a queued transaction may wait before it is dropped.
    /// `None` waits forever.
    pub transaction_timeout: Option<Duration>,

    /// Name of the processor thread.
    pub worker_name: String,
}

impl LedgerConfig {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Builds a configuration from the defaults overridden by
    /// `LEDGER_QUEUE_CAPACITY` and `LEDGER_TX_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(QUEUE_CAPACITY_ENV) {
            config.queue_capacity = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: QUEUE_CAPACITY_ENV,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(TX_TIMEOUT_ENV) {
            let millis: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: TX_TIMEOUT_ENV,
                value: value.clone(),
            })?;
            config.transaction_timeout = Some(Duration::from_millis(millis));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            transaction_timeout: None,
            worker_name: "ledger-processor".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.transaction_timeout, None);
        assert_eq!(config.worker_name, "ledger-processor");
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = LedgerConfig::from_lookup(lookup_from(&[
            (QUEUE_CAPACITY_ENV, "8"),
            (TX_TIMEOUT_ENV, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.transaction_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn unparsable_capacity_is_rejected() {
        let result = LedgerConfig::from_lookup(lookup_from(&[(QUEUE_CAPACITY_ENV, "many")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                key: QUEUE_CAPACITY_ENV,
                value: "many".to_string(),
            })
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = LedgerConfig::from_lookup(lookup_from(&[(QUEUE_CAPACITY_ENV, "0")]));
        assert_eq!(result, Err(ConfigError::ZeroCapacity));
        assert_eq!(
            LedgerConfig::default().with_queue_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );
    }

    #[test]
    fn builder_methods() {
        let config = LedgerConfig::default()
            .with_queue_capacity(3)
            .with_transaction_timeout(Duration::from_secs(1))
            .with_worker_name("worker");
        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.transaction_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.worker_name, "worker");
    }
}
