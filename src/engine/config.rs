use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::ArchiverError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub retention_days: u32,
    pub timezone: String,
    /// Pin the reference "today" for reproducible runs; normally unset.
    pub reference_date: Option<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            retention_days: 60,
            timezone: "Europe/Prague".to_string(),
            reference_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalesConfig {
    pub bestseller_prefix: BTreeMap<String, String>,
}

impl Default for LocalesConfig {
    fn default() -> Self {
        let mut bestseller_prefix = BTreeMap::new();
        bestseller_prefix.insert("cz".to_string(), "nejprodavanejsi".to_string());
        bestseller_prefix.insert("sk".to_string(), "najpredavanejsie".to_string());
        Self { bestseller_prefix }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PimConfig {
    pub base_url: String,
    pub table: String,
    pub timeout_secs: u64,
    pub image_base_url: String,
    pub snapshot_dir: Option<String>,
}

impl Default for PimConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            table: "galery".to_string(),
            timeout_secs: 10,
            image_base_url: "https://img.okay.cz/gal".to_string(),
            snapshot_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiverConfig {
    pub rules: RulesConfig,
    pub locales: LocalesConfig,
    pub pim: PimConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialArchiverConfig {
    rules: Option<RulesConfig>,
    locales: Option<LocalesConfig>,
    pim: Option<PimConfig>,
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_opt_string(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// The PIM bearer token never lives in the config file; only `.env` or the
/// process environment carries it.
pub fn pim_token() -> Option<String> {
    env_opt_string("PIM_TOKEN")
}

fn validate(cfg: &ArchiverConfig) -> Result<()> {
    if cfg.rules.retention_days == 0 {
        return Err(anyhow!("invalid retention_days: must be >= 1"));
    }
    if cfg.rules.timezone.parse::<Tz>().is_err() {
        return Err(anyhow!("invalid timezone `{}`", cfg.rules.timezone));
    }
    if let Some(raw) = &cfg.rules.reference_date {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| anyhow!("invalid reference_date `{raw}`: expected YYYY-MM-DD"))?;
    }
    for (locale, prefix) in &cfg.locales.bestseller_prefix {
        if locale.trim().is_empty() || prefix.trim().is_empty() {
            return Err(anyhow!("invalid bestseller_prefix entry for `{locale}`"));
        }
    }
    if cfg.pim.table.trim().is_empty() {
        return Err(anyhow!("invalid pim table: cannot be empty"));
    }
    if cfg.pim.timeout_secs == 0 {
        return Err(anyhow!("invalid pim timeout: must be >= 1 second"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("ARCHIVER_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".catalog-archiver").join("archiver.toml"))
}

fn apply_partial(base: &mut ArchiverConfig, partial: PartialArchiverConfig) {
    if let Some(rules) = partial.rules {
        base.rules = rules;
    }
    if let Some(locales) = partial.locales {
        base.locales = locales;
    }
    if let Some(pim) = partial.pim {
        base.pim = pim;
    }
}

fn merge_file_config(base: &mut ArchiverConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: PartialArchiverConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse {}: {err}", path.display()))?;
    apply_partial(base, parsed);
    Ok(())
}

/// Defaults, then the optional config file, then env overrides; validated
/// as a whole before any run starts.
pub fn load_config() -> Result<ArchiverConfig> {
    let mut cfg = ArchiverConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.rules.retention_days = env_or_u32("ARCHIVER_RETENTION_DAYS", cfg.rules.retention_days);
    cfg.rules.timezone = env_or_string("ARCHIVER_TIMEZONE", &cfg.rules.timezone);
    if let Some(raw) = env_opt_string("ARCHIVER_REFERENCE_DATE") {
        cfg.rules.reference_date = Some(raw);
    }
    cfg.pim.base_url = env_or_string("PIM_BASE_URL", &cfg.pim.base_url);
    cfg.pim.table = env_or_string("PIM_TABLE", &cfg.pim.table);
    cfg.pim.timeout_secs = env_or_u64("PIM_TIMEOUT_SECS", cfg.pim.timeout_secs);
    cfg.pim.image_base_url = env_or_string("PIM_IMAGE_BASE_URL", &cfg.pim.image_base_url);
    if let Some(dir) = env_opt_string("PIM_SNAPSHOT_DIR") {
        cfg.pim.snapshot_dir = Some(dir);
    }

    validate(&cfg)?;
    Ok(cfg)
}

impl ArchiverConfig {
    pub fn prefix_for_locale(&self, locale: &str) -> Result<&str, ArchiverError> {
        self.locales
            .bestseller_prefix
            .get(locale)
            .map(String::as_str)
            .ok_or_else(|| ArchiverError::UnknownLocale(locale.to_string()))
    }

    /// CLI flag wins, then the pinned config/env date, then today in the
    /// configured business timezone.
    pub fn resolved_reference_date(&self, cli: Option<NaiveDate>) -> Result<NaiveDate> {
        if let Some(date) = cli {
            return Ok(date);
        }
        if let Some(raw) = &self.rules.reference_date {
            return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| anyhow!("invalid reference_date `{raw}`: expected YYYY-MM-DD"));
        }
        let tz: Tz = self
            .rules
            .timezone
            .parse()
            .map_err(|_| anyhow!("invalid timezone `{}`", self.rules.timezone))?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_markets() {
        let cfg = ArchiverConfig::default();
        assert_eq!(cfg.rules.retention_days, 60);
        assert_eq!(cfg.prefix_for_locale("cz").expect("cz"), "nejprodavanejsi");
        assert_eq!(cfg.prefix_for_locale("sk").expect("sk"), "najpredavanejsie");
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn unknown_locale_is_a_typed_error() {
        let cfg = ArchiverConfig::default();
        let err = cfg.prefix_for_locale("de").expect_err("de unconfigured");
        assert!(err.to_string().contains("de"));
    }

    #[test]
    fn partial_file_config_overrides_one_section() {
        let raw = "[rules]\nretention_days = 30\ntimezone = \"Europe/Bratislava\"\n";
        let parsed: PartialArchiverConfig = toml::from_str(raw).expect("parse");

        let mut cfg = ArchiverConfig::default();
        apply_partial(&mut cfg, parsed);

        assert_eq!(cfg.rules.retention_days, 30);
        assert_eq!(cfg.rules.timezone, "Europe/Bratislava");
        assert_eq!(cfg.pim.table, "galery");
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = ArchiverConfig::default();
        cfg.rules.retention_days = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = ArchiverConfig::default();
        cfg.rules.timezone = "Mars/Olympus".to_string();
        assert!(validate(&cfg).is_err());

        let mut cfg = ArchiverConfig::default();
        cfg.rules.reference_date = Some("yesterday".to_string());
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn pinned_reference_date_beats_timezone_today() {
        let mut cfg = ArchiverConfig::default();
        cfg.rules.reference_date = Some("2024-04-01".to_string());

        let resolved = cfg.resolved_reference_date(None).expect("resolve");
        assert_eq!(resolved.to_string(), "2024-04-01");

        let cli = NaiveDate::parse_from_str("2024-05-01", "%Y-%m-%d").expect("date");
        let resolved = cfg.resolved_reference_date(Some(cli)).expect("resolve");
        assert_eq!(resolved, cli);
    }
}
