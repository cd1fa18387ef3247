//! Desk configuration.

use serde::{Deserialize, Serialize};

use crate::engine::ChallengeRules;

/// Configuration for the challenge desk and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// SQLite connection string for the account store
    pub database_url: String,

    /// Base URL of the market-data service
    pub quote_api_url: String,

    /// Base URL of the signal service; static signals only when unset
    pub signal_api_url: Option<String>,

    /// Per-request HTTP timeout (seconds)
    pub request_timeout_secs: u64,

    /// Total time spent retrying a failing quote request (seconds)
    pub quote_retry_window_secs: u64,

    /// Quotes older than this are rejected for trading (seconds)
    pub max_quote_age_secs: i64,

    /// Times a trade is re-evaluated after losing an optimistic-lock race
    pub max_conflict_retries: u32,

    /// Rows shown by the leaderboard
    pub leaderboard_size: i64,

    /// Accounts fetched per page by platform-wide scans
    pub scan_page_size: i64,

    /// Evaluation thresholds and P&L band
    pub rules: ChallengeRules,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./propdesk.db?mode=rwc".to_string(),
            quote_api_url: "http://localhost:3000/api".to_string(),
            signal_api_url: None,
            request_timeout_secs: 10,
            quote_retry_window_secs: 15,
            max_quote_age_secs: 300, // 5 minutes
            max_conflict_retries: 3,
            leaderboard_size: 10,
            scan_page_size: 500,
            rules: ChallengeRules::default(),
        }
    }
}

impl DeskConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), String> {
        self.rules.validate()?;
        if self.max_quote_age_secs <= 0 {
            return Err(format!(
                "max_quote_age_secs must be positive, got {}",
                self.max_quote_age_secs
            ));
        }
        if self.leaderboard_size <= 0 {
            return Err(format!(
                "leaderboard_size must be positive, got {}",
                self.leaderboard_size
            ));
        }
        if self.scan_page_size <= 0 {
            return Err(format!(
                "scan_page_size must be positive, got {}",
                self.scan_page_size
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.max_daily_loss_pct, dec!(5));
        assert!(config.signal_api_url.is_none());
    }

    #[test]
    fn test_rejects_bad_rules() {
        let mut config = DeskConfig::default();
        config.rules.pnl_loss_skew_pct = dec!(25);
        assert!(config.validate().is_err());

        let mut config = DeskConfig::default();
        config.max_quote_age_secs = 0;
        assert!(config.validate().is_err());

        let mut config = DeskConfig::default();
        config.scan_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_from_json() {
        let json = serde_json::to_string(&DeskConfig::default()).unwrap();
        let parsed: DeskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_conflict_retries, 3);
        assert_eq!(parsed.rules, ChallengeRules::default());
    }
}
