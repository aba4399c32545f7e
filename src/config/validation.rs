use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: u32 = 256;
const MAX_RETRY_BUDGET: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site section
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_requests_per_host < 1 || config.max_requests_per_host > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "max-requests-per-host must be between 1 and {}, got {}",
            MAX_WORKERS, config.max_requests_per_host
        )));
    }

    if config.delay_min_ms > config.delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "delay-min-ms ({}) must not exceed delay-max-ms ({})",
            config.delay_min_ms, config.delay_max_ms
        )));
    }

    if config.retry_budget > MAX_RETRY_BUDGET {
        return Err(ConfigError::Validation(format!(
            "retry-budget must be <= {}, got {}",
            MAX_RETRY_BUDGET, config.retry_budget
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.shutdown_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "shutdown-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("records-path", &config.records_path),
        ("image-root", &config.image_root),
        ("database-path", &config.database_path),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::QuotaConfig;

    fn valid_config() -> Config {
        Config {
            site: SiteConfig {
                base_url: "https://m.example.com".to_string(),
                user_agent: "test-agent".to_string(),
            },
            crawler: CrawlerConfig::default(),
            quota: QuotaConfig::default(),
            output: OutputConfig {
                records_path: "out.jsonl".to_string(),
                image_root: "images".to_string(),
                database_path: "harvest.db".to_string(),
                incremental: false,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_base_url_scheme() {
        let mut config = valid_config();
        config.site.base_url = "ftp://m.example.com".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.site.base_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = valid_config();
        config.crawler.workers = 0;
        assert!(validate(&config).is_err());

        config.crawler.workers = 257;
        assert!(validate(&config).is_err());

        config.crawler.workers = 256;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_per_host_bounds() {
        let mut config = valid_config();
        config.crawler.max_requests_per_host = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_delay_range() {
        let mut config = valid_config();
        config.crawler.delay_min_ms = 500;
        config.crawler.delay_max_ms = 100;
        assert!(validate(&config).is_err());

        config.crawler.delay_max_ms = 500;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_retry_budget_cap() {
        let mut config = valid_config();
        config.crawler.retry_budget = 11;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_timeouts() {
        let mut config = valid_config();
        config.crawler.request_timeout_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.crawler.shutdown_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_output_paths() {
        let mut config = valid_config();
        config.output.image_root = " ".to_string();
        assert!(validate(&config).is_err());
    }
}
