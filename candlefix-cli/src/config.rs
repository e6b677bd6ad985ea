use std::env;
use std::str::FromStr;
use std::time::Duration;

use candlefix::{DomainConfig, Interval, MarketDomain, RepairConfig, RepairError, RetryConfig};
use candlefix_scylla::ScyllaConfig;

/// How the final report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(RepairError::InvalidArg(format!(
                "CANDLEFIX_REPORT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Job configuration derived from `CANDLEFIX_*` environment variables.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub store: ScyllaConfig,
    pub repair: RepairConfig,
    pub retry: RetryConfig,
    pub report: ReportFormat,
}

/// Variable source; the process environment in production.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn str(&self, name: &str, default: &str) -> String {
        self.opt(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, RepairError> {
        match self.opt(name) {
            None => Ok(default),
            Some(s) => s
                .parse()
                .map_err(|_| RepairError::InvalidArg(format!("{name}: cannot parse '{s}'"))),
        }
    }

    fn bool(&self, name: &str, default: bool) -> Result<bool, RepairError> {
        let Some(s) = self.opt(name) else {
            return Ok(default);
        };
        match s.to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Ok(true),
            "0" | "false" | "no" | "n" | "off" => Ok(false),
            _ => Err(RepairError::InvalidArg(format!("{name}: expected a boolean, got '{s}'"))),
        }
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        self.opt(name).map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

impl CliConfig {
    pub fn from_env() -> Result<Self, RepairError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    /// Returns `InvalidArg` naming the offending variable for any value that
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RepairError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let store_defaults = ScyllaConfig::default();
        let repair_defaults = RepairConfig::default();
        let retry_defaults = RetryConfig::default();

        let hosts = vars
            .list("CANDLEFIX_HOSTS")
            .unwrap_or(store_defaults.hosts);
        if hosts.is_empty() {
            return Err(RepairError::InvalidArg(
                "CANDLEFIX_HOSTS lists no contact points".to_string(),
            ));
        }
        let request_timeout_ms = vars.parse(
            "CANDLEFIX_REQUEST_TIMEOUT_MS",
            u64::try_from(store_defaults.request_timeout.as_millis()).unwrap_or(u64::MAX),
        )?;
        let store = ScyllaConfig {
            hosts,
            datacenter: vars.opt("CANDLEFIX_DATACENTER"),
            username: vars.opt("CANDLEFIX_USERNAME"),
            password: vars.opt("CANDLEFIX_PASSWORD"),
            table: vars.str("CANDLEFIX_TABLE", &store_defaults.table),
            request_timeout: Duration::from_millis(request_timeout_ms),
            page_size: vars.parse("CANDLEFIX_PAGE_SIZE", store_defaults.page_size)?,
        };

        let intervals = match vars.list("CANDLEFIX_INTERVALS") {
            None => repair_defaults.intervals,
            Some(names) => names
                .iter()
                .map(|n| n.parse::<Interval>())
                .collect::<Result<Vec<_>, _>>()?,
        };
        let repair = RepairConfig {
            domains: vec![
                DomainConfig::new(
                    MarketDomain::Spot,
                    vars.str("CANDLEFIX_SPOT_KEYSPACE", "ecosystem"),
                ),
                DomainConfig::new(
                    MarketDomain::Futures,
                    vars.str("CANDLEFIX_FUTURES_KEYSPACE", "futures"),
                ),
            ],
            intervals,
            symbols: vars.list("CANDLEFIX_SYMBOLS"),
            concurrency: vars.parse("CANDLEFIX_CONCURRENCY", repair_defaults.concurrency)?,
            dry_run: vars.bool("CANDLEFIX_DRY_RUN", repair_defaults.dry_run)?,
            guard_writes: vars.bool("CANDLEFIX_GUARD_WRITES", repair_defaults.guard_writes)?,
        };

        let retry = RetryConfig {
            max_retries: vars.parse("CANDLEFIX_RETRY_MAX", retry_defaults.max_retries)?,
            min_backoff_ms: vars.parse("CANDLEFIX_RETRY_MIN_MS", retry_defaults.min_backoff_ms)?,
            max_backoff_ms: vars.parse("CANDLEFIX_RETRY_MAX_MS", retry_defaults.max_backoff_ms)?,
            ..retry_defaults
        };
        if retry.min_backoff_ms > retry.max_backoff_ms {
            return Err(RepairError::InvalidArg(
                "CANDLEFIX_RETRY_MIN_MS exceeds CANDLEFIX_RETRY_MAX_MS".to_string(),
            ));
        }

        let report = match vars.opt("CANDLEFIX_REPORT") {
            None => ReportFormat::Text,
            Some(s) => s.parse()?,
        };

        Ok(Self {
            store,
            repair,
            retry,
            report,
        })
    }
}
