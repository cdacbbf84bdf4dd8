use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, io, path::Path};
use validator::{Validate, ValidationError};

use crate::hcl;

pub const SERVICE_FILE: &str = "service.yaml";

const HTTP_METHODS: [&str; 8] = [
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "ANY",
];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Invalid duration for `{field}`: {value:?} (expected whole seconds such as \"30s\")")]
    InvalidDuration { field: String, value: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

/// A duration as written in `service.yaml`: either a bare number of seconds
/// or a string carrying a trailing `s` unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub fn seconds(&self, field: &str) -> Result<u64, Error> {
        match self {
            DurationValue::Seconds(seconds) => Ok(*seconds),
            DurationValue::Text(text) => parse_duration(field, text),
        }
    }
}

pub fn parse_duration(field: &str, raw: &str) -> Result<u64, Error> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);

    return digits.parse::<u64>().map_err(|_| Error::InvalidDuration {
        field: field.to_string(),
        value: raw.to_string(),
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub memory: Option<u32>,
    pub timeout: Option<DurationValue>,
    pub cpu: Option<u32>,
    pub architecture: Option<Architecture>,
    pub desired_count: Option<u32>,
    pub min_count: Option<u32>,
    pub max_count: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingMetric {
    pub name: String,
    pub target_value: Option<f64>,
    pub cooldown_up: Option<DurationValue>,
    pub cooldown_down: Option<DurationValue>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreaker {
    pub enabled: Option<bool>,
    pub rollback: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scaling {
    pub metrics: Option<Vec<ScalingMetric>>,
    pub target_value: Option<f64>,
    pub scale_up_cooldown: Option<DurationValue>,
    pub scale_down_cooldown: Option<DurationValue>,
    pub circuit_breaker: Option<CircuitBreaker>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub maximum_percent: Option<u32>,
    pub minimum_healthy_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RouteDefinition {
    #[serde(default = "default_method")]
    #[validate(custom = "validate_method")]
    pub method: String,

    #[serde(default = "default_path")]
    pub path: String,
}

impl RouteDefinition {
    pub fn new(method: &str, path: &str) -> Self {
        return Self {
            method: method.to_string(),
            path: path.to_string(),
        };
    }
}

fn default_method() -> String {
    String::from("GET")
}

fn default_path() -> String {
    String::from("/")
}

/// A queue an event rule delivers to. Written either as a bare queue name or
/// as a `{ queue: name }` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTarget {
    Queue { queue: String },
    Name(String),
}

impl EventTarget {
    pub fn queue(&self) -> &str {
        match self {
            EventTarget::Queue { queue } => queue,
            EventTarget::Name(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EventRoutingRule {
    #[serde(alias = "event_type")]
    #[validate(length(min = 1))]
    pub event: String,

    #[serde(default)]
    #[validate(custom = "validate_targets")]
    pub targets: Vec<EventTarget>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentOverride {
    pub stage: Option<String>,
    pub resources: Resources,
    pub scaling: Scaling,
    pub deployment: Deployment,
    pub secrets: Option<Vec<String>>,
    pub environment_variables: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_names"))]
pub struct ServiceConfig {
    #[validate(required, custom = "validate_service_name")]
    pub name: Option<String>,

    #[serde(default)]
    pub stage: Option<String>,

    #[serde(default)]
    pub resources: Resources,

    #[serde(default)]
    pub scaling: Scaling,

    #[serde(default)]
    pub deployment: Deployment,

    #[serde(default)]
    #[validate(custom = "validate_secret_names")]
    pub secrets: Option<Vec<String>>,

    #[serde(default)]
    #[validate]
    pub routing: Vec<RouteDefinition>,

    #[serde(default)]
    #[validate]
    pub event_routing: Vec<EventRoutingRule>,

    #[serde(default)]
    pub environments: IndexMap<String, EnvironmentOverride>,
}

impl ServiceConfig {
    /// The service name. Only empty on a config that never went through
    /// [`parse`].
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn environment(&self, environment: &str) -> Option<&EnvironmentOverride> {
        self.environments.get(environment)
    }
}

pub fn parse(path: &Path) -> Result<ServiceConfig, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let config = parse_str(&contents)?;
    tracing::debug!(
        service = config.name(),
        routes = config.routing.len(),
        environments = config.environments.len(),
        "parsed service config"
    );

    return Ok(config);
}

pub fn parse_str(contents: &str) -> Result<ServiceConfig, Error> {
    let config: ServiceConfig = match serde_yaml::from_str(contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    match config.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(config);
}

fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("The service name must not be empty"));
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ValidationError::new(
            "The service name may only contain ASCII letters, digits, `-` and `_`",
        ));
    }

    return Ok(());
}

/// Environment names end up in resource names and state keys.
pub fn validate_environment_name(environment: &str) -> Result<(), Error> {
    let valid = !environment.is_empty()
        && environment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::InvalidValue(format!(
            "environment {:?} may only contain ASCII letters, digits, `-` and `_`",
            environment
        )));
    }

    return Ok(());
}

/// Regions are spliced into ARNs and log options, e.g. `eu-west-1`.
pub fn validate_region(region: &str) -> Result<(), Error> {
    let valid = !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(Error::InvalidValue(format!(
            "region {:?} may only contain lowercase ASCII letters, digits and `-`",
            region
        )));
    }

    return Ok(());
}

fn validate_secret_names(secrets: &[String]) -> Result<(), ValidationError> {
    // Secrets Manager name characters, none of which are special inside HCL templates.
    let valid = secrets.iter().all(|secret| {
        !secret.is_empty()
            && secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "/_+=.@-".contains(c))
    });
    if !valid {
        return Err(ValidationError::new(
            "Secret names may only contain ASCII letters, digits and `/_+=.@-`",
        ));
    }

    // Each secret becomes its own resource, named after the normalized secret.
    if has_colliding_identifiers(secrets.iter().map(String::as_str)) {
        return Err(ValidationError::new(
            "Secret names must be unique after normalizing to resource names",
        ));
    }

    return Ok(());
}

/// True when two entries normalize to the same identifier, identical
/// entries included.
fn has_colliding_identifiers<'a>(names: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = HashMap::new();
    for name in names {
        if seen.insert(hcl::identifier(name), name).is_some() {
            return true;
        }
    }

    return false;
}

fn validate_targets(targets: &[EventTarget]) -> Result<(), ValidationError> {
    let valid = targets.iter().all(|target| {
        let queue = target.queue();
        !queue.is_empty()
            && queue
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    if !valid {
        return Err(ValidationError::new(
            "Event target queue names may only contain ASCII letters, digits, `-` and `_`",
        ));
    }

    return Ok(());
}

fn validate_names(config: &ServiceConfig) -> Result<(), ValidationError> {
    for overrides in config.environments.values() {
        if let Some(secrets) = &overrides.secrets {
            validate_secret_names(secrets)?;
        }
    }

    // A repeated event is a duplicate rule and is skipped when rendering;
    // distinct events must not share a rule name.
    let mut rules: HashMap<String, &str> = HashMap::new();
    for rule in &config.event_routing {
        match rules.insert(hcl::identifier(&rule.event), &rule.event) {
            Some(previous) if previous != rule.event => {
                return Err(ValidationError::new(
                    "Event names must be unique after normalizing to rule names",
                ))
            }
            _ => (),
        }
    }

    return Ok(());
}

fn validate_method(method: &str) -> Result<(), ValidationError> {
    let upper = method.to_ascii_uppercase();
    if !HTTP_METHODS.contains(&upper.as_str()) {
        return Err(ValidationError::new(
            "The route method has to be one of GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS or ANY",
        ));
    }

    return Ok(());
}
