//! Base + environment configuration merging. A key present in the
//! environment override replaces the base key wholesale.

use indexmap::IndexMap;

use crate::config::{
    Architecture, CircuitBreaker, Deployment, DurationValue, EnvironmentOverride, Error,
    EventRoutingRule, Resources, RouteDefinition, Scaling, ServiceConfig,
};

pub const DEFAULT_MEMORY: u32 = 512;
pub const DEFAULT_TIMEOUT: u64 = 30;
pub const DEFAULT_CPU: u32 = 256;
pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::Arm64;
pub const DEFAULT_DESIRED_COUNT: u32 = 1;
pub const DEFAULT_MIN_COUNT: u32 = 1;
pub const DEFAULT_MAX_COUNT: u32 = 10;
pub const DEFAULT_MAXIMUM_PERCENT: u32 = 200;
pub const DEFAULT_MINIMUM_HEALTHY_PERCENT: u32 = 100;
pub const DEFAULT_STAGE: &str = "latest";
pub const DEFAULT_SCALE_UP_COOLDOWN: u64 = 30;
pub const DEFAULT_SCALE_DOWN_COOLDOWN: u64 = 300;
pub const DEFAULT_QUEUE_THRESHOLD: f64 = 10.0;
pub const DEFAULT_QUEUE_DEPTH_BASELINE: f64 = 5.0;

/// One-level, per-key overlay of an override record onto a base record.
pub trait Merge {
    fn merge(&self, overrides: &Self) -> Self;
}

fn pick<T: Clone>(base: &Option<T>, overrides: &Option<T>) -> Option<T> {
    overrides.clone().or_else(|| base.clone())
}

fn merge_nested<T: Merge + Clone>(base: &Option<T>, overrides: &Option<T>) -> Option<T> {
    match (base, overrides) {
        (Some(base), Some(overrides)) => Some(base.merge(overrides)),
        (base, overrides) => pick(base, overrides),
    }
}

impl Merge for Resources {
    fn merge(&self, overrides: &Self) -> Self {
        Resources {
            memory: pick(&self.memory, &overrides.memory),
            timeout: pick(&self.timeout, &overrides.timeout),
            cpu: pick(&self.cpu, &overrides.cpu),
            architecture: pick(&self.architecture, &overrides.architecture),
            desired_count: pick(&self.desired_count, &overrides.desired_count),
            min_count: pick(&self.min_count, &overrides.min_count),
            max_count: pick(&self.max_count, &overrides.max_count),
        }
    }
}

impl Merge for CircuitBreaker {
    fn merge(&self, overrides: &Self) -> Self {
        CircuitBreaker {
            enabled: pick(&self.enabled, &overrides.enabled),
            rollback: pick(&self.rollback, &overrides.rollback),
        }
    }
}

impl Merge for Scaling {
    fn merge(&self, overrides: &Self) -> Self {
        Scaling {
            metrics: pick(&self.metrics, &overrides.metrics),
            target_value: pick(&self.target_value, &overrides.target_value),
            scale_up_cooldown: pick(&self.scale_up_cooldown, &overrides.scale_up_cooldown),
            scale_down_cooldown: pick(&self.scale_down_cooldown, &overrides.scale_down_cooldown),
            circuit_breaker: merge_nested(&self.circuit_breaker, &overrides.circuit_breaker),
        }
    }
}

impl Merge for Deployment {
    fn merge(&self, overrides: &Self) -> Self {
        Deployment {
            maximum_percent: pick(&self.maximum_percent, &overrides.maximum_percent),
            minimum_healthy_percent: pick(
                &self.minimum_healthy_percent,
                &overrides.minimum_healthy_percent,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveResources {
    pub memory: u32,
    /// Seconds.
    pub timeout: u64,
    pub cpu: u32,
    pub architecture: Architecture,
    pub desired_count: u32,
    pub min_count: u32,
    pub max_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveMetric {
    pub name: String,
    pub target_value: Option<f64>,
    pub cooldown_up: Option<u64>,
    pub cooldown_down: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectiveCircuitBreaker {
    pub enabled: bool,
    pub rollback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveScaling {
    pub metrics: Vec<EffectiveMetric>,
    pub target_value: Option<f64>,
    /// Seconds. Taken from the first metric when metrics are configured.
    pub scale_up_cooldown: u64,
    /// Seconds. Taken from the first metric when metrics are configured.
    pub scale_down_cooldown: u64,
    pub circuit_breaker: EffectiveCircuitBreaker,
}

impl EffectiveScaling {
    pub fn metric(&self, name: &str) -> Option<&EffectiveMetric> {
        self.metrics.iter().find(|metric| metric.name == name)
    }

    /// Visible-message count that triggers a scale up.
    pub fn queue_threshold(&self) -> f64 {
        match self.metrics.first() {
            Some(first) => first.target_value.unwrap_or(DEFAULT_QUEUE_THRESHOLD),
            None => self.target_value.unwrap_or(DEFAULT_QUEUE_THRESHOLD),
        }
    }

    pub fn queue_depth_baseline(&self) -> f64 {
        self.target_value.unwrap_or(DEFAULT_QUEUE_DEPTH_BASELINE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveDeployment {
    pub maximum_percent: u32,
    pub minimum_healthy_percent: u32,
}

/// Configuration for one (service, environment) pair with every default
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub name: String,
    pub stage: String,
    pub resources: EffectiveResources,
    pub scaling: EffectiveScaling,
    pub deployment: EffectiveDeployment,
    pub environment_variables: IndexMap<String, String>,
    pub secrets: Vec<String>,
    pub routing: Vec<RouteDefinition>,
    pub event_routing: Vec<EventRoutingRule>,
}

/// Resolves the effective configuration for `environment`. An environment
/// missing from `service.yaml` merges as an empty override.
pub fn for_environment(service: &ServiceConfig, environment: &str) -> Result<EffectiveConfig, Error> {
    let empty = EnvironmentOverride::default();
    let overrides = match service.environment(environment) {
        Some(overrides) => overrides,
        None => {
            tracing::warn!(
                service = service.name(),
                environment,
                "environment not declared in service config, using base settings"
            );
            &empty
        }
    };

    return merge(service, overrides);
}

pub fn merge(base: &ServiceConfig, overrides: &EnvironmentOverride) -> Result<EffectiveConfig, Error> {
    let resources = base.resources.merge(&overrides.resources);
    let scaling = base.scaling.merge(&overrides.scaling);
    let deployment = base.deployment.merge(&overrides.deployment);

    let effective = EffectiveConfig {
        name: base.name().to_string(),
        stage: pick(&base.stage, &overrides.stage).unwrap_or_else(|| DEFAULT_STAGE.to_string()),
        resources: resolve_resources(&resources)?,
        scaling: resolve_scaling(&scaling)?,
        deployment: EffectiveDeployment {
            maximum_percent: deployment.maximum_percent.unwrap_or(DEFAULT_MAXIMUM_PERCENT),
            minimum_healthy_percent: deployment
                .minimum_healthy_percent
                .unwrap_or(DEFAULT_MINIMUM_HEALTHY_PERCENT),
        },
        environment_variables: environment_variables(&overrides.environment_variables)?,
        // The environment's list replaces the base list; base secrets are the fallback.
        secrets: pick(&base.secrets, &overrides.secrets).unwrap_or_default(),
        routing: base.routing.clone(),
        event_routing: base.event_routing.clone(),
    };
    tracing::debug!(
        service = effective.name.as_str(),
        memory = effective.resources.memory,
        timeout = effective.resources.timeout,
        secrets = effective.secrets.len(),
        "merged effective config"
    );

    return Ok(effective);
}

fn seconds(value: &Option<DurationValue>, field: &str, default: u64) -> Result<u64, Error> {
    match value {
        Some(value) => value.seconds(field),
        None => Ok(default),
    }
}

fn optional_seconds(value: &Option<DurationValue>, field: &str) -> Result<Option<u64>, Error> {
    value.as_ref().map(|value| value.seconds(field)).transpose()
}

fn resolve_resources(resources: &Resources) -> Result<EffectiveResources, Error> {
    return Ok(EffectiveResources {
        memory: resources.memory.unwrap_or(DEFAULT_MEMORY),
        timeout: seconds(&resources.timeout, "resources.timeout", DEFAULT_TIMEOUT)?,
        cpu: resources.cpu.unwrap_or(DEFAULT_CPU),
        architecture: resources.architecture.unwrap_or(DEFAULT_ARCHITECTURE),
        desired_count: resources.desired_count.unwrap_or(DEFAULT_DESIRED_COUNT),
        min_count: resources.min_count.unwrap_or(DEFAULT_MIN_COUNT),
        max_count: resources.max_count.unwrap_or(DEFAULT_MAX_COUNT),
    });
}

fn resolve_scaling(scaling: &Scaling) -> Result<EffectiveScaling, Error> {
    let mut metrics = Vec::new();
    for (index, metric) in scaling.metrics.iter().flatten().enumerate() {
        metrics.push(EffectiveMetric {
            name: metric.name.clone(),
            target_value: metric.target_value,
            cooldown_up: optional_seconds(
                &metric.cooldown_up,
                &format!("scaling.metrics[{}].cooldown_up", index),
            )?,
            cooldown_down: optional_seconds(
                &metric.cooldown_down,
                &format!("scaling.metrics[{}].cooldown_down", index),
            )?,
        });
    }

    let (scale_up_cooldown, scale_down_cooldown) = match metrics.first() {
        Some(first) => (
            first.cooldown_up.unwrap_or(DEFAULT_SCALE_UP_COOLDOWN),
            first.cooldown_down.unwrap_or(DEFAULT_SCALE_DOWN_COOLDOWN),
        ),
        None => (
            seconds(
                &scaling.scale_up_cooldown,
                "scaling.scale_up_cooldown",
                DEFAULT_SCALE_UP_COOLDOWN,
            )?,
            seconds(
                &scaling.scale_down_cooldown,
                "scaling.scale_down_cooldown",
                DEFAULT_SCALE_DOWN_COOLDOWN,
            )?,
        ),
    };

    let circuit_breaker = scaling.circuit_breaker.clone().unwrap_or_default();

    return Ok(EffectiveScaling {
        metrics,
        target_value: scaling.target_value,
        scale_up_cooldown,
        scale_down_cooldown,
        circuit_breaker: EffectiveCircuitBreaker {
            enabled: circuit_breaker.enabled.unwrap_or(false),
            rollback: circuit_breaker.rollback.unwrap_or(false),
        },
    });
}

fn environment_variables(
    variables: &IndexMap<String, serde_yaml::Value>,
) -> Result<IndexMap<String, String>, Error> {
    let mut resolved = IndexMap::with_capacity(variables.len());
    for (key, value) in variables {
        let text = match value {
            serde_yaml::Value::String(text) => text.clone(),
            serde_yaml::Value::Number(number) => number.to_string(),
            serde_yaml::Value::Bool(flag) => flag.to_string(),
            other => {
                return Err(Error::InvalidValue(format!(
                    "environment variable `{}` must be a string, number or boolean, got {:?}",
                    key, other
                )))
            }
        };
        resolved.insert(key.clone(), text);
    }

    return Ok(resolved);
}
