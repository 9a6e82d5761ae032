//! Server configuration loaded from environment variables.
//!
//! | Variable                 | Default         | Description                                 |
//! |--------------------------|-----------------|---------------------------------------------|
//! | `TOPOLOGY_CLUSTERS_FILE` | `clusters.json` | Record stream merged into the registry      |
//! | `TOPOLOGY_LOG_LEVEL`     | `info`          | tracing level (trace/debug/info/warn/error) |
//! | `TOPOLOGY_PRETTY`        | `false`         | Pretty-print the canonical encoding         |

use std::path::PathBuf;

/// Runtime configuration for the topology server process.
#[derive(Debug)]
pub struct Config {
    /// Cluster record stream read at start-up.
    pub clusters_file: PathBuf,

    /// Tracing filter string, e.g. `"topology_registry=debug,info"`.
    pub log_level: String,

    pub pretty: bool,
}

impl Config {
    /// Load configuration from environment variables, applying defaults where
    /// a variable is absent.
    pub fn from_env() -> Self {
        Self {
            clusters_file: PathBuf::from(env_str("TOPOLOGY_CLUSTERS_FILE", "clusters.json")),
            log_level:     env_str("TOPOLOGY_LOG_LEVEL", "info"),
            pretty:        env_bool("TOPOLOGY_PRETTY"),
        }
    }
}

fn env_bool(key: &str) -> bool {
    std::env::var(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::from_env();
        assert!(!cfg.clusters_file.as_os_str().is_empty());
        assert!(!cfg.log_level.is_empty());
    }

    #[test]
    fn env_override_applied() {
        std::env::set_var("TOPOLOGY_PRETTY", "TRUE");
        std::env::set_var("TOPOLOGY_CLUSTERS_FILE", "/etc/topology/clusters.json");
        let cfg = Config::from_env();
        assert!(cfg.pretty);
        assert_eq!(cfg.clusters_file, PathBuf::from("/etc/topology/clusters.json"));
        std::env::remove_var("TOPOLOGY_PRETTY");
        std::env::remove_var("TOPOLOGY_CLUSTERS_FILE");
    }
}
