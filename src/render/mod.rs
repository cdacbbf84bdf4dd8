pub mod iam;
pub mod lambda;
pub mod worker;

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::hcl::{self, Block, Document, Expression};
use crate::merge::{EffectiveConfig, EffectiveMetric};
use crate::outputs::{self, ServiceOutput};
use crate::paths::ResourceTree;

pub use lambda::LambdaTarget;
pub use worker::WorkerTarget;

pub const DEFAULT_STATE_BUCKET: &str = "terraform-state-647272350116";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ADAPTER_LAYER_VERSION: u32 = 25;

/// Generator settings that are not part of `service.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub state_bucket: String,
    pub region: String,
    /// Version of the Lambda Web Adapter layer.
    pub adapter_layer_version: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            state_bucket: DEFAULT_STATE_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            adapter_layer_version: DEFAULT_ADAPTER_LAYER_VERSION,
        }
    }
}

pub struct RenderContext<'a> {
    pub environment: &'a str,
    pub settings: &'a Settings,
    pub config: &'a EffectiveConfig,
    pub tree: &'a ResourceTree,
}

impl RenderContext<'_> {
    /// The service name as a Terraform identifier.
    pub fn local_name(&self) -> String {
        hcl::identifier(&self.config.name)
    }

    /// `<local name>_<suffix>`
    pub fn local(&self, suffix: &str) -> String {
        format!("{}_{}", self.local_name(), suffix)
    }

    /// `<environment>-<service>`, the prefix of every cloud-side name.
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.environment, self.config.name)
    }

    pub fn tags(&self, name: Option<String>) -> Expression {
        let mut tags = Vec::new();
        if let Some(name) = name {
            tags.push(("Name", Expression::String(name)));
        }
        tags.push(("Environment", Expression::string(self.environment)));
        tags.push(("Service", Expression::string(self.config.name.as_str())));
        Expression::object(tags)
    }

    /// User environment variables followed by `reserved`. Reserved keys
    /// replace user values of the same name.
    pub fn environment_variables(
        &self,
        reserved: Vec<(&str, Expression)>,
    ) -> IndexMap<String, Expression> {
        let mut variables: IndexMap<String, Expression> = self
            .config
            .environment_variables
            .iter()
            .map(|(key, value)| (key.clone(), Expression::string(value.as_str())))
            .collect();

        for (key, value) in reserved {
            if variables.insert(key.to_string(), value).is_some() {
                tracing::warn!(
                    variable = key,
                    "environment variable is reserved by the generator, ignoring configured value"
                );
            }
        }

        return variables;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utilization {
    Cpu,
    Memory,
}

impl Utilization {
    /// Name of the `scaling.metrics` entry that enables the alarm.
    pub fn metric_name(self) -> &'static str {
        match self {
            Utilization::Cpu => "cpu_utilization",
            Utilization::Memory => "memory_utilization",
        }
    }

    pub fn cloudwatch_metric(self) -> &'static str {
        match self {
            Utilization::Cpu => "CPUUtilization",
            Utilization::Memory => "MemoryUtilization",
        }
    }

    pub fn default_threshold(self) -> f64 {
        match self {
            Utilization::Cpu => 75.0,
            Utilization::Memory => 85.0,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Utilization::Cpu => "cpu",
            Utilization::Memory => "memory",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Utilization::Cpu => "CPU",
            Utilization::Memory => "Memory",
        }
    }
}

/// Generator-specific parts of a service's Terraform.
pub trait ComputeTarget {
    fn name(&self) -> &'static str;

    /// Whether routes are served through the API Gateway resource tree.
    fn serves_http(&self) -> bool {
        false
    }

    /// `(local name, source, version constraint)` entries for the
    /// `required_providers` block.
    fn required_providers(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        Vec::new()
    }

    fn uses_caller_identity(&self) -> bool {
        false
    }

    /// Local name of the `aws_iam_role` the workload runs as.
    fn runtime_role(&self) -> &'static str;

    fn compute_blocks(&self, context: &RenderContext<'_>) -> Vec<Block>;

    fn trigger_blocks(&self, context: &RenderContext<'_>) -> Vec<Block>;

    /// Only called when the service has secrets.
    fn secret_blocks(&self, context: &RenderContext<'_>) -> Vec<Block>;

    fn utilization_alarm(
        &self,
        _context: &RenderContext<'_>,
        _utilization: Utilization,
        _metric: &EffectiveMetric,
    ) -> Option<Block> {
        None
    }

    /// Only called when the circuit breaker is enabled.
    fn degraded_capacity_alarms(&self, _context: &RenderContext<'_>) -> Vec<Block> {
        Vec::new()
    }

    fn outputs(&self, context: &RenderContext<'_>) -> Vec<(ServiceOutput, Expression)>;
}

pub fn render(target: &dyn ComputeTarget, context: &RenderContext<'_>) -> Document {
    let config = context.config;
    let mut document = Document::new();

    document.extend(header(target, context));
    document.extend(target.compute_blocks(context));
    document.extend(target.trigger_blocks(context));

    if !config.secrets.is_empty() {
        document.extend(target.secret_blocks(context));
    }

    if !config.event_routing.is_empty() {
        document.extend(event_routing(target, context));
    }

    for utilization in [Utilization::Cpu, Utilization::Memory] {
        if let Some(metric) = config.scaling.metric(utilization.metric_name()) {
            document.extend(target.utilization_alarm(context, utilization, metric));
        }
    }

    if config.scaling.circuit_breaker.enabled {
        document.extend(target.degraded_capacity_alarms(context));
    }

    document.extend(outputs::declare(target.outputs(context)));

    tracing::debug!(
        compute = target.name(),
        blocks = document.blocks().len(),
        resources = document.resource_count(),
        "rendered document"
    );
    return document;
}

fn header(target: &dyn ComputeTarget, context: &RenderContext<'_>) -> Vec<Block> {
    let settings = context.settings;
    let name = context.config.name.as_str();

    let backend = Block::new("backend")
        .label("s3")
        .attribute("bucket", settings.state_bucket.as_str())
        .attribute(
            "key",
            format!("{}/services/{}/terraform.tfstate", context.environment, name),
        )
        .attribute("region", settings.region.as_str())
        .attribute("encrypt", true);

    let mut terraform = Block::new("terraform")
        .comment(format!("Generated Terraform for {} ({})", name, context.environment))
        .block(backend);

    let providers = target.required_providers();
    if !providers.is_empty() {
        let mut required = Block::new("required_providers");
        for (provider, source, version) in providers {
            required = required.attribute(
                provider,
                Expression::object([
                    ("source", Expression::string(source)),
                    ("version", Expression::string(version)),
                ]),
            );
        }
        terraform = terraform.block(required);
    }

    let mut blocks = vec![
        terraform,
        Block::new("provider")
            .label("aws")
            .attribute("region", settings.region.as_str()),
        outputs::core_state(&settings.state_bucket, &settings.region, context.environment),
    ];

    if target.uses_caller_identity() || !context.config.event_routing.is_empty() {
        blocks.push(Block::data("aws_caller_identity", "current").comment("Account ID"));
    }

    return blocks;
}

fn event_routing(target: &dyn ComputeTarget, context: &RenderContext<'_>) -> Vec<Block> {
    let config = context.config;
    let bus = context.local("events");
    let bus_name = hcl::reference("aws_cloudwatch_event_bus", &bus, "name");

    let mut blocks = vec![Block::resource("aws_cloudwatch_event_bus", &bus)
        .comment(format!("EventBridge bus for {}", config.name))
        .attribute("name", format!("{}-events", context.qualified_name()))];

    let mut seen = HashSet::new();
    for rule in &config.event_routing {
        if !seen.insert(rule.event.as_str()) {
            tracing::warn!(event = rule.event.as_str(), "duplicate event routing rule, skipping");
            continue;
        }
        let rule_name = hcl::identifier(&format!("{}_{}", config.name, rule.event));

        blocks.push(
            Block::resource("aws_cloudwatch_event_rule", &rule_name)
                .comment(format!("EventBridge rule for {}", rule.event))
                .attribute("name", format!("{}-{}", context.qualified_name(), rule.event))
                .attribute("event_bus_name", bus_name.clone())
                .attribute(
                    "event_pattern",
                    Expression::jsonencode(Expression::object([
                        ("source", Expression::list([Expression::string(config.name.as_str())])),
                        ("detail-type", Expression::list([Expression::string(rule.event.as_str())])),
                    ])),
                ),
        );

        for (index, destination) in rule.targets.iter().enumerate() {
            let queue = destination.queue();
            blocks.push(
                Block::resource("aws_cloudwatch_event_target", &format!("{}_target_{}", rule_name, index))
                    .comment(format!("EventBridge target to {}", queue))
                    .attribute("rule", hcl::reference("aws_cloudwatch_event_rule", &rule_name, "name"))
                    .attribute("event_bus_name", bus_name.clone())
                    .attribute("target_id", queue)
                    .attribute(
                        "arn",
                        Expression::template(format!(
                            "arn:aws:sqs:{}:${{data.aws_caller_identity.current.account_id}}:{}-{}",
                            context.settings.region, context.environment, queue
                        )),
                    ),
            );
        }
    }

    blocks.push(
        iam::role_policy(
            "eventbridge_policy",
            format!("{}-eventbridge-policy", context.qualified_name()),
            target.runtime_role(),
            iam::policy_document(vec![iam::allow(
                &["events:PutEvents"],
                hcl::reference("aws_cloudwatch_event_bus", &bus, "arn"),
            )]),
        )
        .comment("Allow publishing to the service's event bus"),
    );

    return blocks;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::render;
    use super::ComputeTarget;
    use super::LambdaTarget;
    use super::RenderContext;
    use super::Settings;
    use super::WorkerTarget;
    use crate::config::parse_str;
    use crate::hcl::{Document, Expression};
    use crate::merge::{self, EffectiveConfig};
    use crate::paths::ResourceTree;

    pub fn effective(yaml: &str, environment: &str) -> EffectiveConfig {
        merge::for_environment(&parse_str(yaml).unwrap(), environment).unwrap()
    }

    pub fn render_with(target: &dyn ComputeTarget, config: &EffectiveConfig) -> Document {
        let settings = Settings::default();
        let tree = if target.serves_http() {
            ResourceTree::build(&config.routing, &config.name).unwrap()
        } else {
            ResourceTree::default()
        };
        let context = RenderContext {
            environment: "dev",
            settings: &settings,
            config,
            tree: &tree,
        };
        render(target, &context)
    }

    fn identifiers(document: &Document) -> Vec<String> {
        document
            .blocks()
            .iter()
            .map(|block| format!("{} {}", block.identifier, block.labels.join(".")))
            .collect()
    }

    #[test]
    fn header_comes_first_and_outputs_last() {
        let targets: [&dyn ComputeTarget; 2] = [&LambdaTarget, &WorkerTarget];
        for target in targets {
            let document = render_with(target, &effective("name: orders\n", "dev"));
            let identifiers = identifiers(&document);

            assert_eq!("terraform ", identifiers[0]);
            assert_eq!("provider aws", identifiers[1]);
            assert_eq!("data terraform_remote_state.core", identifiers[2]);
            assert_eq!(true, identifiers.last().unwrap().starts_with("output "));
        }
    }

    #[test]
    fn backend_key_is_per_environment_and_service() {
        let document = render_with(&LambdaTarget, &effective("name: orders\n", "dev"));
        let backend = document.blocks()[0].blocks().next().unwrap();

        assert_eq!(
            Some(&Expression::string("dev/services/orders/terraform.tfstate")),
            backend.get("key")
        );
        assert_eq!(Some(&Expression::string("terraform-state-647272350116")), backend.get("bucket"));
    }

    #[test]
    fn event_routing_is_only_emitted_when_configured() {
        let targets: [&dyn ComputeTarget; 2] = [&LambdaTarget, &WorkerTarget];
        for target in targets {
            let document = render_with(target, &effective("name: orders\n", "dev"));
            assert_eq!(0, document.resources("aws_cloudwatch_event_bus").count());
            assert_eq!(0, document.resources("aws_cloudwatch_event_rule").count());
        }
    }

    #[test]
    fn event_routing_emits_bus_rules_and_targets() {
        let config = effective(
            r#"
name: order-api
event_routing:
  - event: order.created
    targets: [billing, {queue: shipping}]
  - event: order-cancelled
    targets: [billing]
"#,
            "dev",
        );
        let document = render_with(&LambdaTarget, &config);

        assert_eq!(1, document.resources("aws_cloudwatch_event_bus").count());
        let rules: Vec<&str> = document
            .resources("aws_cloudwatch_event_rule")
            .filter_map(|block| block.name())
            .collect();
        assert_eq!(vec!["order_api_order_created", "order_api_order_cancelled"], rules);

        let targets: Vec<&str> = document
            .resources("aws_cloudwatch_event_target")
            .filter_map(|block| block.name())
            .collect();
        assert_eq!(
            vec![
                "order_api_order_created_target_0",
                "order_api_order_created_target_1",
                "order_api_order_cancelled_target_0",
            ],
            targets
        );

        let shipping = document
            .resources("aws_cloudwatch_event_target")
            .nth(1)
            .unwrap();
        assert_eq!(
            Some(&Expression::template(
                "arn:aws:sqs:us-east-1:${data.aws_caller_identity.current.account_id}:dev-shipping"
            )),
            shipping.get("arn")
        );
        assert_eq!(1, document.find("data", "aws_caller_identity").count());

        let policy = document
            .resources("aws_iam_role_policy")
            .find(|block| block.name() == Some("eventbridge_policy"))
            .unwrap();
        assert_eq!(Some(&Expression::raw("aws_iam_role.lambda_role.id")), policy.get("role"));
    }

    #[test]
    fn duplicate_event_rules_are_skipped() {
        let config = effective(
            "name: orders\nevent_routing:\n  - event: paid\n    targets: [a]\n  - event: paid\n    targets: [b]\n",
            "dev",
        );
        let document = render_with(&WorkerTarget, &config);
        assert_eq!(1, document.resources("aws_cloudwatch_event_rule").count());
        assert_eq!(1, document.resources("aws_cloudwatch_event_target").count());
    }

    #[test]
    fn distinct_events_get_their_own_rules() {
        let config = effective(
            "name: orders\nevent_routing:\n  - event: paid\n    targets: [a]\n  - event: refunded\n    targets: [a, b]\n",
            "dev",
        );
        let document = render_with(&LambdaTarget, &config);
        assert_eq!(2, document.resources("aws_cloudwatch_event_rule").count());
        assert_eq!(3, document.resources("aws_cloudwatch_event_target").count());
    }

    #[test]
    fn reserved_environment_variables_win() {
        let config = effective(
            "name: orders\nenvironments:\n  dev:\n    environment_variables:\n      PORT: 9090\n      LOG_LEVEL: debug\n",
            "dev",
        );
        let settings = Settings::default();
        let tree = ResourceTree::default();
        let context = RenderContext {
            environment: "dev",
            settings: &settings,
            config: &config,
            tree: &tree,
        };

        let variables = context.environment_variables(vec![
            ("SERVICE_NAME", Expression::string("orders")),
            ("PORT", Expression::string("8080")),
        ]);
        let keys: Vec<&str> = variables.keys().map(String::as_str).collect();
        assert_eq!(vec!["PORT", "LOG_LEVEL", "SERVICE_NAME"], keys);
        assert_eq!(Some(&Expression::string("8080")), variables.get("PORT"));
    }
}
