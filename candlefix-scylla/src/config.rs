use std::time::Duration;

/// Connection settings for a Scylla / Cassandra cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScyllaConfig {
    /// Contact points as `host:port`.
    pub hosts: Vec<String>,
    /// Datacenter to prefer when routing requests.
    pub datacenter: Option<String>,
    /// Username for password authentication.
    pub username: Option<String>,
    /// Password for password authentication.
    pub password: Option<String>,
    /// Name of the candle table in every keyspace.
    pub table: String,
    /// Driver-side deadline for a single request.
    pub request_timeout: Duration,
    /// Rows requested per page when reading partitions.
    pub page_size: i32,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1:9042".to_string()],
            datacenter: None,
            username: None,
            password: None,
            table: "candles".to_string(),
            request_timeout: Duration::from_secs(10),
            page_size: 5_000,
        }
    }
}
