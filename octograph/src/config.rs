use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

use chrono_tz::Tz;
use octograph_domain::domain::{SeriesKind, TariffRate};

use crate::{
    pipeline::{PipelineError, SeriesJob},
    sources::{octopus, paginated},
    window,
};

#[derive(Debug, Clone, Deserialize)]
pub struct OctopusConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElectricityConfig {
    pub mpan: Option<String>,
    pub serial_number: Option<String>,
    pub standing_charge: Option<f64>,
    pub unit_rate_electricity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    pub mprn: Option<String>,
    pub serial_number: Option<String>,
    /// 1 for SMETS1 meters (report kWh), 2 for SMETS2 (report m³).
    #[serde(default = "default_meter_type")]
    pub meter_type: u8,
    #[serde(default = "default_volume_correction_factor")]
    pub volume_correction_factor: f64,
    /// MJ/m³.
    #[serde(default = "default_calorific_value")]
    pub calorific_value: f64,
    pub standing_charge: Option<f64>,
    pub unit_rate_gas: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Influxdb,
    QuestdbIlp,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConfig {
    #[serde(default = "default_influx_host")]
    pub host: String,
    #[serde(default = "default_influx_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_influx_database")]
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestDbConfig {
    #[serde(default = "default_ilp_tcp_addr")]
    pub ilp_tcp_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus text file rewritten at the end of every run.
    pub textfile_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub octopus: OctopusConfig,
    #[serde(default)]
    pub electricity: ElectricityConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub influxdb: InfluxDbConfig,
    #[serde(default)]
    pub questdb: QuestDbConfig,
    pub metrics: Option<MetricsConfig>,
}

fn default_base_url() -> String {
    octopus::DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    octopus::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_max_error_count() -> u32 {
    paginated::MAX_ERROR_COUNT
}

fn default_retry_backoff_secs() -> u64 {
    paginated::DEFAULT_RETRY_BACKOFF.as_secs()
}

fn default_meter_type() -> u8 {
    1
}

fn default_volume_correction_factor() -> f64 {
    1.02264
}

fn default_calorific_value() -> f64 {
    40.0
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_lookback_hours() -> u32 {
    window::DEFAULT_LOOKBACK_HOURS
}

fn default_state_file() -> PathBuf {
    PathBuf::from("octograph-state.json")
}

fn default_influx_host() -> String {
    "localhost".to_string()
}

fn default_influx_port() -> u16 {
    8086
}

fn default_influx_database() -> String {
    "energy".to_string()
}

fn default_ilp_tcp_addr() -> String {
    "127.0.0.1:9009".to_string()
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            mprn: None,
            serial_number: None,
            meter_type: default_meter_type(),
            volume_correction_factor: default_volume_correction_factor(),
            calorific_value: default_calorific_value(),
            standing_charge: None,
            unit_rate_gas: None,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            lookback_hours: default_lookback_hours(),
            state_file: default_state_file(),
        }
    }
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            port: default_influx_port(),
            user: String::new(),
            password: String::new(),
            database: default_influx_database(),
        }
    }
}

impl Default for QuestDbConfig {
    fn default() -> Self {
        Self {
            ilp_tcp_addr: default_ilp_tcp_addr(),
        }
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, PipelineError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PipelineError::Configuration(format!("no {what} set"))),
    }
}

fn required_rate(value: Option<f64>, what: &str) -> Result<f64, PipelineError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(PipelineError::Configuration(format!("{what} must be a non-negative number, got {v}"))),
        None => Err(PipelineError::Configuration(format!("no {what} set"))),
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, PipelineError> {
        use std::env;

        let path = env::var("OCTOGRAPH_CONFIG").unwrap_or_else(|_| "octograph.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| PipelineError::Configuration(format!("cannot read {path}: {e}")))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PipelineError> {
        toml::from_str(contents).map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    /// Checks everything a run needs before any network activity.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.octopus.api_key.trim().is_empty() {
            return Err(PipelineError::Configuration("no Octopus API key set".to_string()));
        }
        if self.general.lookback_hours == 0 {
            return Err(PipelineError::Configuration(
                "general.lookback_hours must be at least 1".to_string(),
            ));
        }
        if self.general.lookback_hours >= window::MAX_LOOKBACK_HOURS {
            return Err(PipelineError::Configuration(format!(
                "general.lookback_hours must be below {} (the backfill window)",
                window::MAX_LOOKBACK_HOURS
            )));
        }
        self.series_jobs()?;
        self.timezone()?;
        if self.sink.kind == SinkKind::QuestdbIlp {
            self.questdb_addr()?;
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, PipelineError> {
        self.general.timezone.parse::<Tz>().map_err(|e| {
            PipelineError::Configuration(format!("unknown timezone {}: {e}", self.general.timezone))
        })
    }

    pub fn questdb_addr(&self) -> Result<std::net::SocketAddr, PipelineError> {
        self.questdb
            .ilp_tcp_addr
            .parse()
            .map_err(|e| PipelineError::Configuration(format!("invalid questdb.ilp_tcp_addr: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.octopus.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.octopus.retry_backoff_secs)
    }

    pub fn tariff_for(&self, kind: SeriesKind) -> Result<TariffRate, PipelineError> {
        match kind {
            SeriesKind::Electricity => {
                let e = &self.electricity;
                Ok(TariffRate {
                    standing_charge_per_day: required_rate(e.standing_charge, "electricity standing_charge")?,
                    unit_rate: required_rate(e.unit_rate_electricity, "unit_rate_electricity")?,
                    conversion_factor: None,
                })
            }
            SeriesKind::Gas => {
                let g = &self.gas;
                // SMETS1 meters report kWh, SMETS2 report m³ and need converting first.
                let conversion_factor = (g.meter_type > 1).then(|| {
                    TariffRate::gas_conversion_factor(g.volume_correction_factor, g.calorific_value)
                });
                Ok(TariffRate {
                    standing_charge_per_day: required_rate(g.standing_charge, "gas standing_charge")?,
                    unit_rate: required_rate(g.unit_rate_gas, "unit_rate_gas")?,
                    conversion_factor,
                })
            }
        }
    }

    pub fn endpoint_for(&self, kind: SeriesKind) -> Result<String, PipelineError> {
        let base = self.octopus.base_url.trim_end_matches('/');
        match kind {
            SeriesKind::Electricity => {
                let mpan = required(&self.electricity.mpan, "electricity mpan")?;
                let serial = required(&self.electricity.serial_number, "electricity serial_number")?;
                Ok(format!("{base}/electricity-meter-points/{mpan}/meters/{serial}/consumption/"))
            }
            SeriesKind::Gas => {
                let mprn = required(&self.gas.mprn, "gas mprn")?;
                let serial = required(&self.gas.serial_number, "gas serial_number")?;
                Ok(format!("{base}/gas-meter-points/{mprn}/meters/{serial}/consumption/"))
            }
        }
    }

    /// Electricity first, then gas.
    pub fn series_jobs(&self) -> Result<Vec<SeriesJob>, PipelineError> {
        [SeriesKind::Electricity, SeriesKind::Gas]
            .into_iter()
            .map(|kind| {
                Ok(SeriesJob {
                    kind,
                    endpoint: self.endpoint_for(kind)?,
                    rate: self.tariff_for(kind)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [octopus]
        api_key = "sk_live_abc"
        page_size = 1500

        [electricity]
        mpan = "1200000000001"
        serial_number = "19L0000001"
        standing_charge = 46.36
        unit_rate_electricity = 24.5

        [gas]
        mprn = "3000000001"
        serial_number = "E6S0000001"
        meter_type = 2
        standing_charge = 27.22
        unit_rate_gas = 6.1

        [general]
        timezone = "Europe/London"
        lookback_hours = 48

        [sink]
        kind = "questdb_ilp"

        [questdb]
        ilp_tcp_addr = "10.0.0.5:9009"

        [metrics]
        textfile_path = "/var/lib/node_exporter/octograph.prom"
    "#;

    #[test]
    fn parses_full_config_and_builds_jobs() {
        let cfg = AppConfig::from_toml_str(FULL).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.sink.kind, SinkKind::QuestdbIlp);
        assert_eq!(cfg.octopus.page_size, Some(1500));
        assert_eq!(cfg.octopus.max_error_count, 10);
        assert_eq!(cfg.retry_backoff(), Duration::from_secs(60));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(90));

        let jobs = cfg.series_jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, SeriesKind::Electricity);
        assert_eq!(
            jobs[0].endpoint,
            "https://api.octopus.energy/v1/electricity-meter-points/1200000000001/meters/19L0000001/consumption/"
        );
        assert_eq!(jobs[0].rate.unit_rate, 24.5);
        assert!(jobs[0].rate.conversion_factor.is_none());
        assert_eq!(
            jobs[1].endpoint,
            "https://api.octopus.energy/v1/gas-meter-points/3000000001/meters/E6S0000001/consumption/"
        );
        assert_eq!(jobs[1].rate.unit_rate, 6.1);
        let factor = jobs[1].rate.conversion_factor.unwrap();
        assert!((factor - 11.362_666).abs() < 1e-5);
    }

    #[test]
    fn smets1_gas_needs_no_conversion() {
        let cfg = AppConfig::from_toml_str(&FULL.replace("meter_type = 2", "meter_type = 1")).unwrap();

        assert!(cfg.tariff_for(SeriesKind::Gas).unwrap().conversion_factor.is_none());
    }

    #[test]
    fn defaults_apply_to_omitted_sections() {
        let cfg = AppConfig::from_toml_str("[octopus]\napi_key = \"k\"\n").unwrap();

        assert_eq!(cfg.general.timezone, "Europe/London");
        assert_eq!(cfg.general.lookback_hours, 24);
        assert_eq!(cfg.sink.kind, SinkKind::Influxdb);
        assert_eq!(cfg.influxdb.port, 8086);
        assert_eq!(cfg.influxdb.database, "energy");
        assert_eq!(cfg.gas.meter_type, 1);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let cfg = AppConfig::from_toml_str(&FULL.replace("sk_live_abc", " ")).unwrap();

        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("API key")));
    }

    #[test]
    fn missing_meter_identifiers_fail_validation() {
        let cfg = AppConfig::from_toml_str(&FULL.replace("mprn = \"3000000001\"", "")).unwrap();

        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("gas mprn")));
    }

    #[test]
    fn missing_unit_rate_fails_before_any_transform() {
        let cfg = AppConfig::from_toml_str(&FULL.replace("unit_rate_electricity = 24.5", "")).unwrap();

        let err = cfg.tariff_for(SeriesKind::Electricity).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("unit_rate_electricity")));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let cfg = AppConfig::from_toml_str(&FULL.replace("Europe/London", "Mars/Olympus")).unwrap();

        assert!(matches!(cfg.validate(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn invalid_questdb_address_is_rejected() {
        let cfg = AppConfig::from_toml_str(&FULL.replace("10.0.0.5:9009", "questdb")).unwrap();

        assert!(matches!(cfg.validate(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn lookback_reaching_the_backfill_window_is_rejected() {
        let at_limit = FULL.replace(
            "lookback_hours = 48",
            &format!("lookback_hours = {}", window::MAX_LOOKBACK_HOURS),
        );
        let cfg = AppConfig::from_toml_str(&at_limit).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("lookback_hours")));

        let huge = FULL.replace("lookback_hours = 48", &format!("lookback_hours = {}", u32::MAX));
        let cfg = AppConfig::from_toml_str(&huge).unwrap();
        assert!(matches!(cfg.validate(), Err(PipelineError::Configuration(_))));

        let just_below = FULL.replace(
            "lookback_hours = 48",
            &format!("lookback_hours = {}", window::MAX_LOOKBACK_HOURS - 1),
        );
        AppConfig::from_toml_str(&just_below).unwrap().validate().unwrap();
    }
}
