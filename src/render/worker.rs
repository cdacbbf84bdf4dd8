//! Queue workers: an SQS queue drained by a Fargate service that scales
//! in steps on queue depth.

use crate::config::Architecture;
use crate::hcl::{self, Block, Expression};
use crate::merge::EffectiveMetric;
use crate::outputs::{CoreOutput, ServiceOutput, WORKER_OUTPUTS};

use super::iam;
use super::{ComputeTarget, RenderContext, Utilization};

const TASK_ROLE: &str = "task_role";
const EXECUTION_ROLE: &str = "execution_role";
const CONTAINER_PORT: u32 = 8080;
const ECS_TASKS: &str = "ecs-tasks.amazonaws.com";
const EXECUTION_POLICY: &str = "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
const MESSAGE_RETENTION_SECONDS: u32 = 1_209_600;
const MAX_RECEIVE_COUNT: u32 = 3;
const LOG_RETENTION_DAYS: u32 = 7;

pub struct WorkerTarget;

fn ecr_lifecycle_rule(priority: u32, description: &str, selection: Expression) -> Expression {
    Expression::object([
        ("rulePriority", Expression::number(priority)),
        ("description", Expression::string(description)),
        ("selection", selection),
        ("action", Expression::object([("type", Expression::string("expire"))])),
    ])
}

fn name_value(name: &str, value: Expression) -> Expression {
    Expression::object([("name", Expression::string(name)), ("value", value)])
}

fn service_dimensions(context: &RenderContext<'_>) -> Expression {
    Expression::object([
        (
            "ServiceName",
            hcl::reference("aws_ecs_service", &context.local("service"), "name"),
        ),
        ("ClusterName", CoreOutput::EcsClusterName.reference()),
    ])
}

fn queue_dimensions(context: &RenderContext<'_>) -> Expression {
    Expression::object([(
        "QueueName",
        hcl::reference("aws_sqs_queue", &context.local("queue"), "name"),
    )])
}

/// Fields shared by every alarm: evaluation window and metric selection.
struct Alarm<'a> {
    suffix: &'a str,
    comparison: &'a str,
    evaluation_periods: u32,
    metric: &'a str,
    namespace: &'a str,
    period: u32,
    statistic: &'a str,
    threshold: f64,
}

impl Alarm<'_> {
    fn block(&self, context: &RenderContext<'_>, local: &str) -> Block {
        Block::resource("aws_cloudwatch_metric_alarm", local)
            .attribute("alarm_name", format!("{}-{}", context.qualified_name(), self.suffix))
            .attribute("comparison_operator", self.comparison)
            .attribute("evaluation_periods", self.evaluation_periods)
            .attribute("metric_name", self.metric)
            .attribute("namespace", self.namespace)
            .attribute("period", self.period)
            .attribute("statistic", self.statistic)
            .attribute("threshold", self.threshold)
    }
}

impl WorkerTarget {
    fn repository(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let repository = context.local("repo");
        let selection_tagged = Expression::object([
            ("tagStatus", Expression::string("tagged")),
            ("tagPrefixList", Expression::list([Expression::string("v")])),
            ("countType", Expression::string("imageCountMoreThan")),
            ("countNumber", Expression::number(5)),
        ]);
        let selection_untagged = Expression::object([
            ("tagStatus", Expression::string("untagged")),
            ("countType", Expression::string("sinceImagePushed")),
            ("countUnit", Expression::string("days")),
            ("countNumber", Expression::number(1)),
        ]);

        vec![
            Block::data("aws_ecr_repository", &repository)
                .comment("ECR repository (pre-existing)")
                .attribute("name", format!("{}-{}", context.config.name, context.environment)),
            Block::resource("aws_ecr_lifecycle_policy", &context.local("lifecycle"))
                .comment("ECR lifecycle policy")
                .attribute(
                    "repository",
                    hcl::reference("data.aws_ecr_repository", &repository, "name"),
                )
                .attribute(
                    "policy",
                    Expression::jsonencode(Expression::object([(
                        "rules",
                        Expression::list([
                            ecr_lifecycle_rule(1, "Keep last 5 production images", selection_tagged),
                            ecr_lifecycle_rule(
                                2,
                                "Delete untagged images older than 1 day",
                                selection_untagged,
                            ),
                        ]),
                    )])),
                ),
            Block::new("variable")
                .label("image_tag")
                .comment("Image tag to deploy, set by the release pipeline")
                .attribute("type", Expression::raw("string"))
                .attribute("default", "latest"),
        ]
    }

    fn container(&self, context: &RenderContext<'_>) -> Expression {
        let config = context.config;
        let name = config.name.as_str();
        let queue = context.local("queue");

        let variables = context.environment_variables(vec![
            ("SERVICE_NAME", Expression::string(name)),
            ("ENVIRONMENT", Expression::string(context.environment)),
            ("PORT", Expression::string(CONTAINER_PORT.to_string())),
            ("SQS_QUEUE_URL", hcl::reference("aws_sqs_queue", &queue, "url")),
            ("_X_AMZN_TRACE_ID", Expression::string("")),
            ("OTEL_PROPAGATORS", Expression::string("tracecontext,baggage,xray")),
            (
                "OTEL_RESOURCE_ATTRIBUTES",
                Expression::string(format!(
                    "service.name={},service.version=1.0,deployment.environment={}",
                    name, context.environment
                )),
            ),
        ]);

        let mut container = vec![
            ("name", Expression::string(name)),
            (
                "image",
                Expression::template(format!(
                    "${{data.aws_ecr_repository.{}.repository_url}}:${{var.image_tag}}",
                    context.local("repo")
                )),
            ),
            (
                "portMappings",
                Expression::list([Expression::object([
                    ("containerPort", Expression::number(CONTAINER_PORT)),
                    ("protocol", Expression::string("tcp")),
                ])]),
            ),
            (
                "environment",
                Expression::list(
                    variables
                        .into_iter()
                        .map(|(key, value)| name_value(&key, value)),
                ),
            ),
        ];

        if !config.secrets.is_empty() {
            let secret = context.local("secrets");
            container.push((
                "secrets",
                Expression::list(config.secrets.iter().map(|key| {
                    Expression::object([
                        ("name", Expression::string(key.as_str())),
                        (
                            "valueFrom",
                            Expression::template(format!(
                                "${{aws_secretsmanager_secret.{}.arn}}:{}::",
                                secret, key
                            )),
                        ),
                    ])
                })),
            ));
        }

        container.push((
            "logConfiguration",
            Expression::object([
                ("logDriver", Expression::string("awslogs")),
                (
                    "options",
                    Expression::object([
                        (
                            "awslogs-group",
                            hcl::reference("aws_cloudwatch_log_group", &context.local("logs"), "name"),
                        ),
                        ("awslogs-region", Expression::string(context.settings.region.as_str())),
                        ("awslogs-stream-prefix", Expression::string("ecs")),
                    ]),
                ),
            ]),
        ));
        container.push((
            "dockerLabels",
            Expression::object([
                ("application-signals.service.name", Expression::string(name)),
                ("application-signals.environment", Expression::string(context.environment)),
            ]),
        ));

        Expression::object(container)
    }

    fn task_definition(&self, context: &RenderContext<'_>) -> Block {
        let resources = &context.config.resources;
        let cpu_architecture = match resources.architecture {
            Architecture::Arm64 => "ARM64",
            Architecture::X86_64 => "X86_64",
        };

        Block::resource("aws_ecs_task_definition", &context.local("task"))
            .comment("ECS task definition")
            .attribute("family", context.qualified_name())
            .attribute("network_mode", "awsvpc")
            .attribute("requires_compatibilities", Expression::list([Expression::string("FARGATE")]))
            .attribute("cpu", resources.cpu.to_string())
            .attribute("memory", resources.memory.to_string())
            .attribute(
                "execution_role_arn",
                hcl::reference("aws_iam_role", EXECUTION_ROLE, "arn"),
            )
            .attribute("task_role_arn", hcl::reference("aws_iam_role", TASK_ROLE, "arn"))
            .attribute("skip_destroy", true)
            .block(
                Block::new("runtime_platform")
                    .attribute("operating_system_family", "LINUX")
                    .attribute("cpu_architecture", cpu_architecture),
            )
            .attribute(
                "container_definitions",
                Expression::jsonencode(Expression::list([self.container(context)])),
            )
            .attribute("tags", context.tags(Some(context.qualified_name())))
    }

    fn service(&self, context: &RenderContext<'_>) -> Block {
        let config = context.config;
        let mut service = Block::resource("aws_ecs_service", &context.local("service"))
            .comment("ECS service on the core cluster")
            .attribute("name", context.qualified_name())
            .attribute("cluster", CoreOutput::EcsClusterId.reference())
            .attribute(
                "task_definition",
                hcl::reference("aws_ecs_task_definition", &context.local("task"), "arn"),
            )
            .attribute("desired_count", config.resources.desired_count)
            .attribute("launch_type", "FARGATE")
            .attribute("deployment_maximum_percent", config.deployment.maximum_percent)
            .attribute(
                "deployment_minimum_healthy_percent",
                config.deployment.minimum_healthy_percent,
            )
            .block(
                Block::new("network_configuration")
                    .attribute("subnets", CoreOutput::PrivateSubnetIds.reference())
                    .attribute(
                        "security_groups",
                        Expression::list([hcl::reference(
                            "aws_security_group",
                            &context.local("sg"),
                            "id",
                        )]),
                    )
                    .attribute("assign_public_ip", false),
            );

        let breaker = config.scaling.circuit_breaker;
        if breaker.enabled {
            service = service.block(
                Block::new("deployment_circuit_breaker")
                    .attribute("enable", true)
                    .attribute("rollback", breaker.rollback),
            );
        }

        service.attribute("tags", context.tags(Some(context.qualified_name())))
    }

    fn security_group(&self, context: &RenderContext<'_>) -> Block {
        Block::resource("aws_security_group", &context.local("sg"))
            .comment("Security group")
            .attribute("name_prefix", format!("{}-", context.qualified_name()))
            .attribute("vpc_id", CoreOutput::VpcId.reference())
            .block(
                Block::new("ingress")
                    .attribute("from_port", CONTAINER_PORT)
                    .attribute("to_port", CONTAINER_PORT)
                    .attribute("protocol", "tcp")
                    .attribute("cidr_blocks", Expression::list([Expression::string("10.0.0.0/16")])),
            )
            .block(
                Block::new("egress")
                    .attribute("from_port", 0u32)
                    .attribute("to_port", 0u32)
                    .attribute("protocol", "-1")
                    .attribute("cidr_blocks", Expression::list([Expression::string("0.0.0.0/0")])),
            )
            .attribute("tags", context.tags(Some(format!("{}-sg", context.qualified_name()))))
    }

    fn roles(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let qualified = context.qualified_name();
        let queue = context.local("queue");
        let dlq = context.local("dlq");

        vec![
            iam::role(EXECUTION_ROLE, format!("{}-execution-role", qualified), ECS_TASKS)
                .comment("IAM roles"),
            iam::managed_policy("execution_role_policy", EXECUTION_ROLE, EXECUTION_POLICY),
            iam::role(TASK_ROLE, format!("{}-task-role", qualified), ECS_TASKS),
            iam::role_policy(
                "sqs_policy",
                format!("{}-sqs-policy", qualified),
                TASK_ROLE,
                iam::policy_document(vec![iam::allow(
                    &[
                        "sqs:ReceiveMessage",
                        "sqs:DeleteMessage",
                        "sqs:GetQueueAttributes",
                        "sqs:GetQueueUrl",
                    ],
                    Expression::list([
                        hcl::reference("aws_sqs_queue", &queue, "arn"),
                        hcl::reference("aws_sqs_queue", &dlq, "arn"),
                    ]),
                )]),
            )
            .comment("SQS permissions"),
            iam::role_policy(
                "app_signals_policy",
                format!("{}-app-signals-policy", qualified),
                TASK_ROLE,
                iam::policy_document(vec![iam::allow(
                    &[
                        "application-signals:*",
                        "cloudwatch:PutMetricData",
                        "xray:PutTraceSegments",
                        "xray:PutTelemetryRecords",
                        "xray:GetSamplingRules",
                        "xray:GetSamplingTargets",
                    ],
                    Expression::string("*"),
                )]),
            )
            .comment("Application Signals permissions"),
        ]
    }

    fn log_group(&self, context: &RenderContext<'_>) -> Block {
        Block::resource("aws_cloudwatch_log_group", &context.local("logs"))
            .comment("CloudWatch log group")
            .attribute("name", format!("/ecs/{}", context.qualified_name()))
            .attribute("retention_in_days", LOG_RETENTION_DAYS)
            .block(Block::new("lifecycle").attribute(
                "ignore_changes",
                Expression::list([Expression::raw("retention_in_days")]),
            ))
            .attribute("tags", context.tags(Some(format!("{}-logs", context.qualified_name()))))
    }

    fn queues(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let qualified = context.qualified_name();
        let queue = context.local("queue");
        let dlq = context.local("dlq");
        let queue_arn = hcl::reference("aws_sqs_queue", &queue, "arn");

        let queue_tags = match context.tags(Some(format!("{}-queue", qualified))) {
            Expression::Object(mut entries) => {
                entries.push((String::from("Criticality"), Expression::string("critical")));
                Expression::Object(entries)
            }
            other => other,
        };

        vec![
            Block::resource("aws_sqs_queue", &queue)
                .comment("SQS queue")
                .attribute("name", format!("{}-queue", qualified))
                .attribute("visibility_timeout_seconds", context.config.resources.timeout)
                .attribute("message_retention_seconds", MESSAGE_RETENTION_SECONDS)
                .attribute("tags", queue_tags),
            Block::resource("aws_sqs_queue", &dlq)
                .comment("SQS dead letter queue")
                .attribute("name", format!("{}-queue-dlq", qualified))
                .attribute("tags", context.tags(Some(format!("{}-queue-dlq", qualified)))),
            Block::resource("aws_sqs_queue_policy", &context.local("queue_policy"))
                .comment("Allow EventBridge to deliver to the queue")
                .attribute("queue_url", hcl::reference("aws_sqs_queue", &queue, "id"))
                .attribute(
                    "policy",
                    iam::policy_document(vec![Expression::object([
                        ("Effect", Expression::string("Allow")),
                        (
                            "Principal",
                            Expression::object([(
                                "Service",
                                Expression::string("events.amazonaws.com"),
                            )]),
                        ),
                        ("Action", Expression::string("sqs:SendMessage")),
                        ("Resource", queue_arn),
                        (
                            "Condition",
                            Expression::object([(
                                "StringEquals",
                                Expression::object([(
                                    "aws:SourceAccount",
                                    Expression::raw("data.aws_caller_identity.current.account_id"),
                                )]),
                            )]),
                        ),
                    ])]),
                ),
            Block::resource("aws_sqs_queue_redrive_policy", &context.local("redrive"))
                .attribute("queue_url", hcl::reference("aws_sqs_queue", &queue, "id"))
                .attribute(
                    "redrive_policy",
                    Expression::jsonencode(Expression::object([
                        ("deadLetterTargetArn", hcl::reference("aws_sqs_queue", &dlq, "arn")),
                        ("maxReceiveCount", Expression::number(MAX_RECEIVE_COUNT)),
                    ])),
                ),
        ]
    }

    fn step_policy(&self, context: &RenderContext<'_>, up: bool) -> Block {
        let target = context.local("target");
        let scaling = &context.config.scaling;
        let (direction, cooldown, bound, adjustment) = if up {
            ("up", scaling.scale_up_cooldown, "metric_interval_lower_bound", 1)
        } else {
            ("down", scaling.scale_down_cooldown, "metric_interval_upper_bound", -1)
        };

        Block::resource(
            "aws_appautoscaling_policy",
            &context.local(&format!("scale_{}_policy", direction)),
        )
        .comment(format!("Scale {} policy", direction))
        .attribute("name", format!("{}-scale-{}", context.qualified_name(), direction))
        .attribute("policy_type", "StepScaling")
        .attribute(
            "resource_id",
            hcl::reference("aws_appautoscaling_target", &target, "resource_id"),
        )
        .attribute(
            "scalable_dimension",
            hcl::reference("aws_appautoscaling_target", &target, "scalable_dimension"),
        )
        .attribute(
            "service_namespace",
            hcl::reference("aws_appautoscaling_target", &target, "service_namespace"),
        )
        .block(
            Block::new("step_scaling_policy_configuration")
                .attribute("adjustment_type", "ChangeInCapacity")
                .attribute("cooldown", cooldown)
                .attribute("metric_aggregation_type", "Average")
                .block(
                    Block::new("step_adjustment")
                        .attribute(bound, 0u32)
                        .attribute("scaling_adjustment", adjustment as i64),
                ),
        )
    }

    fn scaling(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let config = context.config;
        let qualified = context.qualified_name();
        let threshold = config.scaling.queue_threshold();

        let target = Block::resource("aws_appautoscaling_target", &context.local("target"))
            .comment("Auto scaling target")
            .attribute("max_capacity", config.resources.max_count)
            .attribute("min_capacity", config.resources.min_count)
            .attribute(
                "resource_id",
                Expression::template(format!(
                    "service/{}/${{aws_ecs_service.{}.name}}",
                    CoreOutput::EcsClusterName.interpolation(),
                    context.local("service")
                )),
            )
            .attribute("scalable_dimension", "ecs:service:DesiredCount")
            .attribute("service_namespace", "ecs")
            .attribute("tags", context.tags(Some(format!("{}-autoscaling-target", qualified))));

        let queue_alarm = |up: bool| {
            let direction = if up { "up" } else { "down" };
            let suffix = format!("scale-{}-alarm", direction);
            let alarm = Alarm {
                suffix: &suffix,
                comparison: if up { "GreaterThanThreshold" } else { "LessThanOrEqualToThreshold" },
                evaluation_periods: 1,
                metric: "ApproximateNumberOfMessagesVisible",
                namespace: "AWS/SQS",
                period: 10,
                statistic: "Sum",
                threshold: if up { threshold } else { (threshold / 2.0).floor() },
            };
            let policy = context.local(&format!("scale_{}_policy", direction));
            alarm
                .block(context, &context.local(&format!("scale_{}_alarm", direction)))
                .comment(format!("Scale {} alarm", direction))
                .attribute(
                    "alarm_description",
                    if up {
                        "Scale up when visible messages > threshold"
                    } else {
                        "Scale down when visible messages <= threshold"
                    },
                )
                .attribute("dimensions", queue_dimensions(context))
                .attribute(
                    "alarm_actions",
                    Expression::list([hcl::reference("aws_appautoscaling_policy", &policy, "arn")]),
                )
                .attribute(
                    "tags",
                    context.tags(Some(format!("{}-scale-{}-alarm", qualified, direction))),
                )
        };

        vec![
            target,
            self.step_policy(context, true),
            self.step_policy(context, false),
            queue_alarm(true),
            queue_alarm(false),
        ]
    }
}

impl ComputeTarget for WorkerTarget {
    fn name(&self) -> &'static str {
        "worker"
    }

    fn required_providers(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("aws", "hashicorp/aws", "~> 6.0"),
            ("random", "hashicorp/random", "~> 3.1"),
        ]
    }

    fn uses_caller_identity(&self) -> bool {
        true
    }

    fn runtime_role(&self) -> &'static str {
        TASK_ROLE
    }

    fn compute_blocks(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let mut blocks = self.repository(context);
        blocks.push(self.task_definition(context));
        blocks.push(self.service(context));
        blocks.push(self.security_group(context));
        blocks.extend(self.roles(context));
        blocks.push(self.log_group(context));
        blocks
    }

    fn trigger_blocks(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let mut blocks = self.queues(context);
        blocks.extend(self.scaling(context));
        blocks
    }

    fn secret_blocks(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let config = context.config;
        let qualified = context.qualified_name();
        let suffix = context.local("secret_suffix");
        let secret = context.local("secrets");
        let secret_arn = Expression::list([hcl::reference("aws_secretsmanager_secret", &secret, "arn")]);

        vec![
            Block::resource("random_id", &suffix)
                .comment("Random suffix for unique secret naming")
                .attribute("byte_length", 4u32),
            Block::resource("aws_secretsmanager_secret", &secret)
                .comment(format!("Secrets Manager secret for {}", config.name))
                .attribute(
                    "name",
                    Expression::template(format!(
                        "{}-secrets-${{random_id.{}.hex}}",
                        qualified, suffix
                    )),
                )
                .attribute("description", format!("Secret for {}", qualified))
                .attribute("recovery_window_in_days", 0u32)
                .attribute("tags", context.tags(Some(format!("{}-secrets", qualified)))),
            Block::resource("aws_secretsmanager_secret_version", &format!("{}_version", secret))
                .attribute("secret_id", hcl::reference("aws_secretsmanager_secret", &secret, "id"))
                .attribute(
                    "secret_string",
                    Expression::jsonencode(Expression::object(
                        config
                            .secrets
                            .iter()
                            .map(|key| (key.as_str(), Expression::string("changeme"))),
                    )),
                )
                .block(Block::new("lifecycle").attribute(
                    "ignore_changes",
                    Expression::list([Expression::raw("secret_string")]),
                )),
            iam::role_policy(
                "secrets_policy",
                format!("{}-secrets-policy", qualified),
                TASK_ROLE,
                iam::policy_document(vec![iam::allow(
                    &["secretsmanager:GetSecretValue"],
                    secret_arn.clone(),
                )]),
            )
            .comment("Secrets Manager permissions"),
            iam::role_policy(
                "execution_secrets_policy",
                format!("{}-execution-secrets-policy", qualified),
                EXECUTION_ROLE,
                iam::policy_document(vec![iam::allow(&["secretsmanager:GetSecretValue"], secret_arn)]),
            ),
        ]
    }

    fn utilization_alarm(
        &self,
        context: &RenderContext<'_>,
        utilization: Utilization,
        metric: &EffectiveMetric,
    ) -> Option<Block> {
        let slug = utilization.slug();
        let suffix = format!("{}-high", slug);
        let alarm = Alarm {
            suffix: &suffix,
            comparison: "GreaterThanThreshold",
            evaluation_periods: 2,
            metric: utilization.cloudwatch_metric(),
            namespace: "AWS/ECS",
            period: 60,
            statistic: "Average",
            threshold: metric.target_value.unwrap_or(utilization.default_threshold()),
        };

        Some(
            alarm
                .block(context, &context.local(&format!("{}_alarm", slug)))
                .comment(format!("{} utilization scale up alarm", utilization.label()))
                .attribute(
                    "alarm_description",
                    format!("Scale up when {} > threshold", utilization.label()),
                )
                .attribute("dimensions", service_dimensions(context))
                .attribute(
                    "alarm_actions",
                    Expression::list([hcl::reference(
                        "aws_appautoscaling_policy",
                        &context.local("scale_up_policy"),
                        "arn",
                    )]),
                )
                .attribute(
                    "tags",
                    context.tags(Some(format!("{}-{}-alarm", context.qualified_name(), slug))),
                ),
        )
    }

    fn degraded_capacity_alarms(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let qualified = context.qualified_name();
        let low_running = Alarm {
            suffix: "low-running-tasks",
            comparison: "LessThanThreshold",
            evaluation_periods: 2,
            metric: "RunningCount",
            namespace: "AWS/ECS",
            period: 60,
            statistic: "Average",
            threshold: 1.0,
        };
        let queue_depth = Alarm {
            suffix: "queue-depth-high",
            comparison: "GreaterThanThreshold",
            evaluation_periods: 2,
            metric: "ApproximateNumberOfMessages",
            namespace: "AWS/SQS",
            period: 60,
            statistic: "Average",
            threshold: context.config.scaling.queue_depth_baseline() * 2.0,
        };

        vec![
            low_running
                .block(context, &context.local("task_failure_alarm"))
                .comment("Degraded capacity alarms")
                .attribute(
                    "alarm_description",
                    "Service has fewer running tasks than expected, possible task failures",
                )
                .attribute("dimensions", service_dimensions(context))
                .attribute("tags", context.tags(Some(format!("{}-circuit-breaker", qualified)))),
            queue_depth
                .block(context, &context.local("queue_depth_high"))
                .attribute(
                    "alarm_description",
                    format!("Monitors SQS queue depth for {}", context.config.name),
                )
                .attribute("alarm_actions", Expression::list([]))
                .attribute("dimensions", queue_dimensions(context))
                .attribute("tags", context.tags(Some(format!("{}-queue-depth-alarm", qualified)))),
        ]
    }

    fn outputs(&self, context: &RenderContext<'_>) -> Vec<(ServiceOutput, Expression)> {
        WORKER_OUTPUTS
            .iter()
            .map(|output| {
                let value = match output {
                    ServiceOutput::QueueUrl => {
                        hcl::reference("aws_sqs_queue", &context.local("queue"), "url")
                    }
                    ServiceOutput::QueueArn => {
                        hcl::reference("aws_sqs_queue", &context.local("queue"), "arn")
                    }
                    ServiceOutput::ServiceName => {
                        hcl::reference("aws_ecs_service", &context.local("service"), "name")
                    }
                    ServiceOutput::ClusterName => CoreOutput::EcsClusterName.reference(),
                    ServiceOutput::TaskDefinitionArn => {
                        hcl::reference("aws_ecs_task_definition", &context.local("task"), "arn")
                    }
                    _ => hcl::reference("aws_appautoscaling_target", &context.local("target"), "arn"),
                };
                (*output, value)
            })
            .collect()
    }
}
