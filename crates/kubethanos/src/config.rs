//! Command-line configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use regex::Regex;
use thiserror::Error;

use crate::control_loop::MAX_INTERVAL;
use crate::error::ScopeError;
use crate::selector::ScopeSelector;

/// Chaos controller that periodically kills a random share of pods
#[derive(Debug, Clone, Parser)]
#[command(name = "kubethanos")]
#[command(version)]
pub struct Args {
    /// A namespace or a set of namespaces to restrict kubethanos (label-selector syntax, e.g. "prod" or "!kube-system")
    #[arg(long, env = "KUBETHANOS_NAMESPACES", default_value = "")]
    pub namespaces: String,

    /// A regex to select which pods to kill
    #[arg(long, env = "KUBETHANOS_INCLUDED_POD_NAMES", value_parser = parse_regex)]
    pub included_pod_names: Option<Regex>,

    /// A regex to exclude pods to kill
    #[arg(long, env = "KUBETHANOS_EXCLUDED_POD_NAMES", value_parser = parse_regex)]
    pub excluded_pod_names: Option<Regex>,

    /// The address of the Kubernetes API server, overrides the kubeconfig
    #[arg(long, env = "KUBETHANOS_MASTER")]
    pub master: Option<String>,

    /// Listen address for the health check endpoint
    #[arg(long, env = "KUBETHANOS_HEALTHCHECK", default_value = ":8080")]
    pub healthcheck: String,

    /// Path to a single kubeconfig file (otherwise $KUBECONFIG, $HOME/.kube/config, then in-cluster config)
    #[arg(long, env = "KUBETHANOS_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Interval between kill cycles (e.g. 30s, 10m, 1h30m)
    #[arg(long, env = "KUBETHANOS_INTERVAL", default_value = "10m", value_parser = parse_duration)]
    pub interval: Duration,

    /// Percentage of candidate pods to kill per cycle (0-100)
    #[arg(long, env = "KUBETHANOS_PERCENTAGE", default_value_t = 50.0)]
    pub percentage: f64,

    /// If true, print out the pod names without actually killing them
    #[arg(long, env = "KUBETHANOS_DRY_RUN", default_value_t = true, action = clap::ArgAction::Set)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long, env = "KUBETHANOS_DEBUG")]
    pub debug: bool,

    /// Log output format
    #[arg(long, env = "KUBETHANOS_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(f64),

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("interval {0:?} exceeds the maximum of {max:?}", max = MAX_INTERVAL)]
    IntervalTooLong(Duration),

    #[error("invalid health check address {addr:?}: {source}")]
    HealthAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to parse namespace selector: {0}")]
    Scope(#[from] ScopeError),
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    pub scope: ScopeSelector,
    /// Accepted for compatibility; not applied when selecting victims.
    pub included_pod_names: Option<Regex>,
    /// Accepted for compatibility; not applied when selecting victims.
    pub excluded_pod_names: Option<Regex>,
    pub kill_fraction: f64,
    pub dry_run: bool,
    pub interval: Duration,
    pub health_addr: SocketAddr,
    pub kubeconfig: Option<PathBuf>,
    pub master: Option<String>,
    pub debug: bool,
    pub log_format: LogFormat,
}

impl TryFrom<Args> for ChaosConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if !(0.0..=100.0).contains(&args.percentage) {
            return Err(ConfigError::InvalidPercentage(args.percentage));
        }
        if args.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if args.interval > MAX_INTERVAL {
            return Err(ConfigError::IntervalTooLong(args.interval));
        }

        let scope = ScopeSelector::parse(&args.namespaces)?;
        let health_addr = parse_listen_addr(&args.healthcheck)?;

        Ok(Self {
            scope,
            included_pod_names: args.included_pod_names,
            excluded_pod_names: args.excluded_pod_names,
            kill_fraction: args.percentage / 100.0,
            dry_run: args.dry_run,
            interval: args.interval,
            health_addr,
            kubeconfig: args.kubeconfig,
            master: args.master,
            debug: args.debug,
            log_format: args.log_format,
        })
    }
}

/// Accepts `host:port` or the bare `:port` form, which binds every interface.
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.parse().map_err(|source| ConfigError::HealthAddr {
        addr: addr.to_string(),
        source,
    })
}

fn parse_regex(s: &str) -> Result<Regex, regex::Error> {
    Regex::new(s)
}

/// Parse a duration such as `90s`, `10m`, `1h30m` or `250ms`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration {input:?}"))?;
        if digits == 0 {
            return Err(format!("invalid duration {input:?}"));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid number in duration {input:?}"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ms" => value / 1000.0,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3600.0,
            other => return Err(format!("unknown unit {other:?} in duration {input:?}")),
        };
        rest = &rest[unit_len..];
        let part = Duration::try_from_secs_f64(seconds)
            .map_err(|_| format!("duration {input:?} is out of range"))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("duration {input:?} is out of range"))?;
    }

    Ok(total)
}
