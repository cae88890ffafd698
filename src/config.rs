use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::fit::FillCeilings;
use crate::optimizer::EngineSettings;
use crate::rates::{CarrierPolicy, SizeTiers};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub catalog: CatalogConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            catalog: CatalogConfig::from_env(),
            engine: EngineConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PACK_ADVISOR_API_HOST";
    const PORT_VAR: &'static str = "PACK_ADVISOR_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    error = %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => parse_port(&raw),
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            display_host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

fn parse_port(raw: &str) -> u16 {
    match raw.parse::<u16>() {
        Ok(value) if value != 0 => value,
        Ok(_) => {
            warn!(
                var = ApiConfig::PORT_VAR,
                "port must not be 0, using {}",
                ApiConfig::DEFAULT_PORT
            );
            ApiConfig::DEFAULT_PORT
        }
        Err(err) => {
            warn!(
                var = ApiConfig::PORT_VAR,
                value = raw,
                error = %err,
                "could not parse port, using {}",
                ApiConfig::DEFAULT_PORT
            );
            ApiConfig::DEFAULT_PORT
        }
    }
}

/// Where the catalog snapshot is loaded from at start.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    path: Option<PathBuf>,
}

impl CatalogConfig {
    const PATH_VAR: &'static str = "PACK_ADVISOR_CATALOG_PATH";

    fn from_env() -> Self {
        Self {
            path: env_string(Self::PATH_VAR).map(PathBuf::from),
        }
    }

    /// Catalog JSON file; `None` starts with an empty catalog.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Engine parameters: fill ceilings, size tiers, carriers and simulator size.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    settings: EngineSettings,
}

impl EngineConfig {
    const FILL_CEILING_VAR: &'static str = "PACK_ADVISOR_FILL_CEILING";
    const FRAGILE_FILL_CEILING_VAR: &'static str = "PACK_ADVISOR_FRAGILE_FILL_CEILING";
    const LONG_FILL_CEILING_VAR: &'static str = "PACK_ADVISOR_LONG_FILL_CEILING";
    const SIZE_TIERS_VAR: &'static str = "PACK_ADVISOR_SIZE_TIERS";
    const REQUESTED_CARRIER_VAR: &'static str = "PACK_ADVISOR_REQUESTED_CARRIER";
    const DEFAULT_CARRIER_VAR: &'static str = "PACK_ADVISOR_DEFAULT_CARRIER";
    const SIMULATION_LIMIT_VAR: &'static str = "PACK_ADVISOR_SIMULATION_LIMIT";
    const MAX_ORDER_ITEMS_VAR: &'static str = "PACK_ADVISOR_MAX_ORDER_ITEMS";

    fn from_env() -> Self {
        let ceiling_hint = "must be greater than 0 and at most 1";
        let is_ratio = |value: f64| value > 0.0 && value <= 1.0;

        let standard = load_f64_with_warning(
            Self::FILL_CEILING_VAR,
            FillCeilings::DEFAULT_STANDARD,
            is_ratio,
            ceiling_hint,
        );
        let fragile = load_f64_with_warning(
            Self::FRAGILE_FILL_CEILING_VAR,
            FillCeilings::DEFAULT_FRAGILE,
            is_ratio,
            ceiling_hint,
        );
        let long = load_f64_with_warning(
            Self::LONG_FILL_CEILING_VAR,
            FillCeilings::DEFAULT_LONG,
            is_ratio,
            ceiling_hint,
        );

        let size_tiers = match env_string(Self::SIZE_TIERS_VAR) {
            Some(raw) => parse_size_tiers(&raw).unwrap_or_else(|err| {
                warn!(
                    var = Self::SIZE_TIERS_VAR,
                    value = %raw,
                    error = %err,
                    "invalid size tiers, using defaults"
                );
                SizeTiers::default()
            }),
            None => SizeTiers::default(),
        };

        let simulation_limit = match env_string(Self::SIMULATION_LIMIT_VAR) {
            Some(raw) => parse_simulation_limit(&raw),
            None => EngineSettings::DEFAULT_SIMULATION_LIMIT,
        };

        let max_order_items = match env_string(Self::MAX_ORDER_ITEMS_VAR) {
            Some(raw) => parse_max_order_items(&raw),
            None => EngineSettings::DEFAULT_MAX_ORDER_ITEMS,
        };

        let settings = EngineSettings::builder()
            .fill_ceilings(FillCeilings {
                standard,
                fragile,
                long,
            })
            .size_tiers(size_tiers)
            .requested_carrier(
                env_string(Self::REQUESTED_CARRIER_VAR)
                    .unwrap_or_else(|| CarrierPolicy::DEFAULT_REQUESTED.to_string()),
            )
            .default_carrier(
                env_string(Self::DEFAULT_CARRIER_VAR)
                    .unwrap_or_else(|| CarrierPolicy::DEFAULT_FALLBACK.to_string()),
            )
            .simulation_limit(simulation_limit)
            .max_order_items(max_order_items)
            .build();

        Self { settings }
    }

    /// Returns the configured engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging setup.
///
/// Read on its own before [`AppConfig`], since the subscriber has to exist
/// before the other settings can report problems.
#[derive(Clone, Debug, Default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl LoggingConfig {
    const FORMAT_VAR: &'static str = "PACK_ADVISOR_LOG_FORMAT";

    pub fn from_env() -> Self {
        let format = match env_string(Self::FORMAT_VAR) {
            Some(raw) => parse_log_format(&raw).unwrap_or_else(|| {
                warn!(
                    var = Self::FORMAT_VAR,
                    value = %raw,
                    "unknown log format, using pretty"
                );
                LogFormat::Pretty
            }),
            None => LogFormat::Pretty,
        };
        Self { format }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(var = name, error = %err, "could not read variable, using default value");
            None
        }
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" | "plain" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Parses a comma-separated, strictly ascending list of size thresholds.
fn parse_size_tiers(raw: &str) -> Result<SizeTiers, String> {
    let thresholds = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|err| format!("'{}' is not a whole number: {}", part, err))
        })
        .collect::<Result<Vec<_>, _>>()?;
    SizeTiers::new(thresholds).map_err(|err| err.to_string())
}

fn parse_simulation_limit(raw: &str) -> usize {
    match raw.parse::<usize>() {
        Ok(value) if value >= 1 => value,
        _ => {
            warn!(
                var = EngineConfig::SIMULATION_LIMIT_VAR,
                value = raw,
                "simulation limit must be a whole number of at least 1, using {}",
                EngineSettings::DEFAULT_SIMULATION_LIMIT
            );
            EngineSettings::DEFAULT_SIMULATION_LIMIT
        }
    }
}

fn parse_max_order_items(raw: &str) -> usize {
    match raw.parse::<usize>() {
        Ok(value) if value >= 1 => value,
        _ => {
            warn!(
                var = EngineConfig::MAX_ORDER_ITEMS_VAR,
                value = raw,
                "item cap must be a whole number of at least 1, using {}",
                EngineSettings::DEFAULT_MAX_ORDER_ITEMS
            );
            EngineSettings::DEFAULT_MAX_ORDER_ITEMS
        }
    }
}

fn parse_f64_with_warning(
    var_name: &str,
    raw: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if validator(value) => {
            let tolerance = (default.abs().max(1.0)) * 1e-9;
            if (value - default).abs() > tolerance {
                info!(var = var_name, value, default, "using non-default value");
            }
            value
        }
        Ok(_) => {
            warn!(
                var = var_name,
                value = raw,
                "invalid value: {}. Using {}",
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            warn!(
                var = var_name,
                value = raw,
                error = %err,
                "could not parse as number, using {}",
                default
            );
            default
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => parse_f64_with_warning(var_name, &raw, default, validator, invalid_hint),
        None => default,
    }
}
