use crate::domain::license::DEFAULT_REVALIDATE_AFTER_DAYS;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fs;
use std::path::Path;
use url::Url;

const APP_JSON: &str = "app.json";
const LICENSE_ENDPOINT_ENV: &str = "POCKETCAL_LICENSE_ENDPOINT";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub share_base_url: Url,
    pub timezone: Tz,
    pub license_endpoint: Url,
    pub instance_name: String,
    pub revalidate_after_days: i64,
}

impl AppConfig {
    /// Calendar day of `now` in the configured timezone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    pub fn revalidate_after(&self) -> chrono::Duration {
        chrono::Duration::days(self.revalidate_after_days)
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "shareBaseUrl": "https://pocketcal.com/",
        "timezone": "UTC",
        "licenseEndpoint": "https://pocketcal.com/.netlify/functions/validate-license",
        "instanceName": "pocketcal-cli",
        "revalidateAfterDays": DEFAULT_REVALIDATE_AFTER_DAYS
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_string(config: &serde_json::Value, field: &str) -> Option<String> {
    config
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_url(value: &str, field: &str) -> Result<Url, InfraError> {
    Url::parse(value).map_err(|error| InfraError::InvalidConfig(format!("invalid {field} '{value}': {error}")))
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    load_app_config_from_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_app_config_from_lookup<F>(config_dir: &Path, lookup: F) -> Result<AppConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let app = read_config(&config_dir.join(APP_JSON))?;
    let defaults = default_app_config();
    let field = |name: &str| read_string(&app, name).or_else(|| read_string(&defaults, name));

    let timezone_name = field("timezone").unwrap_or_else(|| "UTC".to_string());
    let timezone = timezone_name
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("unknown timezone '{timezone_name}': {error}")))?;

    let share_base_url = field("shareBaseUrl")
        .ok_or_else(|| InfraError::InvalidConfig("shareBaseUrl is required".to_string()))?;
    let license_endpoint = lookup(LICENSE_ENDPOINT_ENV)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| field("licenseEndpoint"))
        .ok_or_else(|| InfraError::InvalidConfig("licenseEndpoint is required".to_string()))?;

    let revalidate_after_days = app
        .get("revalidateAfterDays")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(DEFAULT_REVALIDATE_AFTER_DAYS);
    if revalidate_after_days < 0 {
        return Err(InfraError::InvalidConfig(
            "revalidateAfterDays must be >= 0".to_string(),
        ));
    }

    Ok(AppConfig {
        share_base_url: parse_url(&share_base_url, "shareBaseUrl")?,
        timezone,
        license_endpoint: parse_url(&license_endpoint, "licenseEndpoint")?,
        instance_name: field("instanceName").unwrap_or_else(|| "pocketcal-cli".to_string()),
        revalidate_after_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "pocketcal-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }

        fn write_app(&self, value: serde_json::Value) {
            fs::write(self.path.join(APP_JSON), value.to_string()).expect("write app.json");
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_app_config_from_lookup(&dir.path, |_| None).expect("load config");

        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.share_base_url.as_str(), "https://pocketcal.com/");
        assert_eq!(config.revalidate_after_days, 7);
        assert_eq!(config.instance_name, "pocketcal-cli");
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({
            "schema": 1,
            "timezone": "Asia/Tokyo",
            "revalidateAfterDays": 3
        }));
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_app_config_from_lookup(&dir.path, |_| None).expect("load config");
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.revalidate_after_days, 3);
        assert_eq!(
            config.license_endpoint.as_str(),
            "https://pocketcal.com/.netlify/functions/validate-license"
        );
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 2 }));
        assert!(matches!(
            load_app_config_from_lookup(&dir.path, |_| None),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 1, "timezone": "Mars/Olympus" }));
        match load_app_config_from_lookup(&dir.path, |_| None) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("Mars/Olympus")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn license_endpoint_can_be_overridden_from_environment() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_app_config_from_lookup(&dir.path, |key| match key {
            "POCKETCAL_LICENSE_ENDPOINT" => Some("http://127.0.0.1:8888/validate".to_string()),
            _ => None,
        })
        .expect("load config");
        assert_eq!(config.license_endpoint.as_str(), "http://127.0.0.1:8888/validate");
    }

    #[test]
    fn today_uses_configured_timezone() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 1, "timezone": "Asia/Tokyo" }));
        let config = load_app_config_from_lookup(&dir.path, |_| None).expect("load config");
        let now = DateTime::parse_from_rfc3339("2026-01-31T20:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        assert_eq!(
            config.today(now),
            NaiveDate::from_ymd_opt(2026, 2, 1).expect("valid date")
        );
    }
}
