use std::env;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::model::BinSpec;
use crate::solver::SolverConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub handoff: HandoffConfig,
    pub calibration: CalibrationConfig,
    pub layout: LayoutConfig,
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            handoff: HandoffConfig::from_env(),
            calibration: CalibrationConfig::from_env(),
            layout: LayoutConfig::from_env(),
            paths: PathConfig::from_env(),
        }
    }
}

/// Configuration for the robot handoff server.
#[derive(Clone, Debug)]
pub struct HandoffConfig {
    bind_ip: IpAddr,
    port: u16,
    retry_limit: u32,
}

impl HandoffConfig {
    const HOST_VAR: &'static str = "OBJECT_PACKING_HANDOFF_HOST";
    const PORT_VAR: &'static str = "OBJECT_PACKING_HANDOFF_PORT";
    const RETRY_LIMIT_VAR: &'static str = "OBJECT_PACKING_HANDOFF_RETRY_LIMIT";

    const DEFAULT_PORT: u16 = 30000;
    const DEFAULT_RETRY_LIMIT: u32 = 1000;

    fn from_env() -> Self {
        Self {
            bind_ip: env_value(Self::HOST_VAR, Self::default_ip(), parse_ip),
            port: env_value(Self::PORT_VAR, Self::DEFAULT_PORT, parse_port),
            retry_limit: env_value(
                Self::RETRY_LIMIT_VAR,
                Self::DEFAULT_RETRY_LIMIT,
                parse_retry_limit,
            ),
        }
    }

    fn default_ip() -> IpAddr {
        IpAddr::from([0, 0, 0, 0])
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Maximum number of accept cycles.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }
}

/// Camera calibration and detection filter.
#[derive(Clone, Debug)]
pub struct CalibrationConfig {
    pixels_per_metric: f64,
    min_area: f64,
}

impl CalibrationConfig {
    const PIXELS_PER_METRIC_VAR: &'static str = "OBJECT_PACKING_PIXELS_PER_METRIC";
    const MIN_AREA_VAR: &'static str = "OBJECT_PACKING_MIN_AREA";

    pub const DEFAULT_PIXELS_PER_METRIC: f64 = 9.0;
    pub const DEFAULT_MIN_AREA: f64 = 100.0;

    fn from_env() -> Self {
        let pixels_per_metric = env_value(
            Self::PIXELS_PER_METRIC_VAR,
            Self::DEFAULT_PIXELS_PER_METRIC,
            parse_positive,
        );
        let min_area = env_value(Self::MIN_AREA_VAR, Self::DEFAULT_MIN_AREA, parse_non_negative);
        if pixels_per_metric != Self::DEFAULT_PIXELS_PER_METRIC {
            info!(
                pixels_per_metric,
                "calibration differs from the default, every reported dimension is scaled"
            );
        }

        Self {
            pixels_per_metric,
            min_area,
        }
    }

    pub fn pixels_per_metric(&self) -> f64 {
        self.pixels_per_metric
    }

    /// Minimum contour area in px².
    pub fn min_area(&self) -> f64 {
        self.min_area
    }
}

/// Bin size and solver behaviour.
#[derive(Clone, Debug)]
pub struct LayoutConfig {
    bin: BinSpec,
    solver: SolverConfig,
}

impl LayoutConfig {
    const BIN_WIDTH_VAR: &'static str = "OBJECT_PACKING_BIN_WIDTH";
    const BIN_HEIGHT_VAR: &'static str = "OBJECT_PACKING_BIN_HEIGHT";
    const ALLOW_ROTATION_VAR: &'static str = "OBJECT_PACKING_SOLVER_ALLOW_ROTATION";

    pub const DEFAULT_BIN_WIDTH: f64 = 25.0;
    pub const DEFAULT_BIN_HEIGHT: f64 = 25.0;

    fn from_env() -> Self {
        let width = env_value(Self::BIN_WIDTH_VAR, Self::DEFAULT_BIN_WIDTH, parse_positive);
        let height = env_value(Self::BIN_HEIGHT_VAR, Self::DEFAULT_BIN_HEIGHT, parse_positive);
        let allow_rotation = env_value(
            Self::ALLOW_ROTATION_VAR,
            SolverConfig::DEFAULT_ALLOW_ROTATION,
            parse_switch,
        );

        // parse_positive already rejected zero, negative and non-finite sizes.
        let bin = BinSpec::new(width, height).unwrap_or(BinSpec {
            width: Self::DEFAULT_BIN_WIDTH,
            height: Self::DEFAULT_BIN_HEIGHT,
        });

        Self {
            bin,
            solver: SolverConfig::builder()
                .allow_rotation(allow_rotation)
                .build(),
        }
    }

    pub fn bin(&self) -> BinSpec {
        self.bin
    }

    pub fn solver_config(&self) -> SolverConfig {
        self.solver
    }
}

/// Input and output files.
#[derive(Clone, Debug, Default)]
pub struct PathConfig {
    pub scene: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl PathConfig {
    const SCENE_VAR: &'static str = "OBJECT_PACKING_SCENE";
    const REPORT_VAR: &'static str = "OBJECT_PACKING_REPORT";

    fn from_env() -> Self {
        Self {
            scene: env_string(Self::SCENE_VAR).map(PathBuf::from),
            report: env_string(Self::REPORT_VAR).map(PathBuf::from),
        }
    }
}

/// Reads a trimmed, non-empty variable.
fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
        Ok(_) | Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ {} is not readable: {}. Using the default.", name, err);
            None
        }
    }
}

/// Reads and parses a variable, falling back to `default` with a warning
/// when it is set but invalid.
fn env_value<T: Display>(name: &str, default: T, parse: impl FnOnce(&str) -> Result<T, String>) -> T {
    let Some(raw) = env_string(name) else {
        return default;
    };
    match parse(&raw) {
        Ok(value) => value,
        Err(hint) => {
            warn!(
                "⚠️ {} contains invalid value '{}': {}. Using {}.",
                name, raw, hint, default
            );
            default
        }
    }
}

fn parse_ip(raw: &str) -> Result<IpAddr, String> {
    raw.parse::<IpAddr>().map_err(|err| err.to_string())
}

fn parse_port(raw: &str) -> Result<u16, String> {
    match raw.parse::<u16>() {
        Ok(0) => Err("must not be 0".to_string()),
        Ok(port) => Ok(port),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_retry_limit(raw: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_finite(raw: &str) -> Result<f64, String> {
    let value = raw.parse::<f64>().map_err(|err| err.to_string())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err("must be a finite number".to_string())
    }
}

fn parse_positive(raw: &str) -> Result<f64, String> {
    parse_finite(raw).and_then(|value| {
        if value > 0.0 {
            Ok(value)
        } else {
            Err("must be greater than 0".to_string())
        }
    })
}

fn parse_non_negative(raw: &str) -> Result<f64, String> {
    parse_finite(raw).and_then(|value| {
        if value >= 0.0 {
            Ok(value)
        } else {
            Err("must not be negative".to_string())
        }
    })
}

fn parse_switch(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err("expected true/false, yes/no, on/off or 1/0".to_string()),
    }
}
