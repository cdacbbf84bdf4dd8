//! HTTP services: a Lambda function behind the shared API Gateway.

use std::collections::HashSet;

use crate::config::Architecture;
use crate::hcl::{self, Block, Expression};
use crate::outputs::{CoreOutput, ServiceOutput, API_OUTPUTS};
use crate::paths::{Parent, PathNode};

use super::iam;
use super::{ComputeTarget, RenderContext};

const ROLE: &str = "lambda_role";
const ADAPTER_ACCOUNT: &str = "753240598075";
const BASIC_EXECUTION_POLICY: &str = "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

pub struct LambdaTarget;

fn adapter_layer(region: &str, architecture: Architecture, version: u32) -> String {
    let variant = match architecture {
        Architecture::Arm64 => "Arm64",
        Architecture::X86_64 => "X86",
    };
    format!(
        "arn:aws:lambda:{}:{}:layer:LambdaAdapterLayer{}:{}",
        region, ADAPTER_ACCOUNT, variant, version
    )
}

fn parent_id(context: &RenderContext<'_>, node: &PathNode) -> Expression {
    match node.parent {
        Parent::Root => CoreOutput::ApiGatewayRootResourceId.reference(),
        Parent::Node(id) => {
            hcl::reference("aws_api_gateway_resource", &context.tree.node(id).identifier, "id")
        }
    }
}

impl LambdaTarget {
    fn function(&self, context: &RenderContext<'_>) -> Block {
        let config = context.config;
        let resources = &config.resources;
        let archive = format!("./{}.zip", config.name);

        let variables = context.environment_variables(vec![
            ("ENVIRONMENT", Expression::string(context.environment)),
            ("SERVICE_NAME", Expression::string(config.name.as_str())),
            ("PORT", Expression::string("8080")),
            ("AWS_LAMBDA_EXEC_WRAPPER", Expression::string("/opt/bootstrap")),
            ("AWS_LWA_ASYNC_INIT", Expression::string("true")),
            ("AWS_LWA_READINESS_CHECK_PATH", Expression::string("/health")),
        ]);

        Block::resource("aws_lambda_function", &context.local_name())
            .comment("Lambda function with Web Adapter")
            .attribute("function_name", context.qualified_name())
            .attribute("role", hcl::reference("aws_iam_role", ROLE, "arn"))
            .attribute("handler", "bootstrap")
            .attribute("runtime", "provided.al2")
            .attribute("filename", archive.as_str())
            .attribute(
                "source_code_hash",
                Expression::call("filebase64sha256", [Expression::string(archive.as_str())]),
            )
            .attribute("memory_size", resources.memory)
            .attribute("timeout", resources.timeout)
            .attribute(
                "architectures",
                Expression::list([Expression::string(resources.architecture.as_str())]),
            )
            .attribute(
                "layers",
                Expression::list([Expression::string(adapter_layer(
                    &context.settings.region,
                    resources.architecture,
                    context.settings.adapter_layer_version,
                ))]),
            )
            .attribute("publish", true)
            .block(Block::new("environment").attribute("variables", Expression::object(variables)))
    }

    fn alias(&self, context: &RenderContext<'_>) -> Block {
        let function = context.local_name();
        Block::resource("aws_lambda_alias", &context.local("alias"))
            .comment("Lambda alias for stage management")
            .attribute("name", context.config.stage.as_str())
            .attribute(
                "description",
                format!("Alias for {} pointing to the published version", context.config.name),
            )
            .attribute(
                "function_name",
                hcl::reference("aws_lambda_function", &function, "function_name"),
            )
            .attribute(
                "function_version",
                hcl::reference("aws_lambda_function", &function, "version"),
            )
    }
}

impl ComputeTarget for LambdaTarget {
    fn name(&self) -> &'static str {
        "api"
    }

    fn serves_http(&self) -> bool {
        true
    }

    fn runtime_role(&self) -> &'static str {
        ROLE
    }

    fn compute_blocks(&self, context: &RenderContext<'_>) -> Vec<Block> {
        vec![
            self.function(context),
            self.alias(context),
            iam::role(
                ROLE,
                format!("{}-lambda-role", context.qualified_name()),
                "lambda.amazonaws.com",
            )
            .comment("IAM role"),
            iam::managed_policy("lambda_basic", ROLE, BASIC_EXECUTION_POLICY),
        ]
    }

    fn trigger_blocks(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let name = context.config.name.as_str();
        let alias = context.local("alias");
        let rest_api_id = CoreOutput::ApiGatewayId.reference();
        let mut blocks = Vec::new();

        for node in context.tree.nodes() {
            blocks.push(
                Block::resource("aws_api_gateway_resource", &node.identifier)
                    .comment(format!("API Gateway resource /{} for {}", node.path, name))
                    .attribute("rest_api_id", rest_api_id.clone())
                    .attribute("parent_id", parent_id(context, node))
                    .attribute("path_part", node.segment.as_str()),
            );
        }

        let mut seen = HashSet::new();
        for binding in context.tree.bindings() {
            let node = context.tree.node(binding.node);
            if !seen.insert((binding.node, binding.method.as_str())) {
                tracing::warn!(
                    method = binding.method.as_str(),
                    path = binding.path.as_str(),
                    "duplicate route, skipping"
                );
                continue;
            }
            let method = format!("{}_{}", node.identifier, binding.method.to_ascii_lowercase());
            let resource_id = hcl::reference("aws_api_gateway_resource", &node.identifier, "id");

            blocks.push(
                Block::resource("aws_api_gateway_method", &method)
                    .comment(format!("{} /{} -> {}", binding.method, binding.path, name))
                    .attribute("rest_api_id", rest_api_id.clone())
                    .attribute("resource_id", resource_id.clone())
                    .attribute("http_method", binding.method.as_str())
                    .attribute("authorization", "NONE"),
            );
            blocks.push(
                Block::resource("aws_api_gateway_integration", &method)
                    .attribute("rest_api_id", rest_api_id.clone())
                    .attribute("resource_id", resource_id)
                    .attribute(
                        "http_method",
                        hcl::reference("aws_api_gateway_method", &method, "http_method"),
                    )
                    .attribute("integration_http_method", "POST")
                    .attribute("type", "AWS_PROXY")
                    .attribute("uri", hcl::reference("aws_lambda_alias", &alias, "invoke_arn")),
            );
        }

        blocks.push(
            Block::resource("aws_lambda_permission", "api_gateway")
                .comment("Lambda permission for API Gateway")
                .attribute("statement_id", "AllowExecutionFromAPIGateway")
                .attribute("action", "lambda:InvokeFunction")
                .attribute(
                    "function_name",
                    hcl::reference("aws_lambda_alias", &alias, "function_name"),
                )
                .attribute("qualifier", hcl::reference("aws_lambda_alias", &alias, "name"))
                .attribute("principal", "apigateway.amazonaws.com")
                .attribute(
                    "source_arn",
                    Expression::template(format!(
                        "{}/*/*",
                        CoreOutput::ApiGatewayExecutionArn.interpolation()
                    )),
                ),
        );

        blocks
    }

    fn secret_blocks(&self, context: &RenderContext<'_>) -> Vec<Block> {
        let config = context.config;
        let mut blocks = Vec::new();
        let mut arns = Vec::new();

        for (index, secret) in config.secrets.iter().enumerate() {
            let local = hcl::identifier(&format!("{}_{}", config.name, secret));
            let mut block = Block::resource("aws_secretsmanager_secret", &local)
                .attribute("name", format!("{}/{}/{}", context.environment, config.name, secret))
                .attribute(
                    "description",
                    format!(
                        "Secret {} for {} service in {}",
                        secret, config.name, context.environment
                    ),
                )
                .attribute("tags", context.tags(None));
            if index == 0 {
                block = block.comment(format!("Secrets Manager for {}", config.name));
            }
            blocks.push(block);

            blocks.push(
                Block::resource("aws_secretsmanager_secret_version", &format!("{}_version", local))
                    .attribute("secret_id", hcl::reference("aws_secretsmanager_secret", &local, "id"))
                    .attribute("secret_string", "n/a")
                    .block(Block::new("lifecycle").attribute(
                        "ignore_changes",
                        Expression::list([Expression::raw("secret_string")]),
                    )),
            );
            arns.push(hcl::reference("aws_secretsmanager_secret", &local, "arn"));
        }

        blocks.push(
            iam::role_policy(
                "secrets_policy",
                format!("{}-secrets-policy", context.qualified_name()),
                ROLE,
                iam::policy_document(vec![iam::allow(
                    &["secretsmanager:GetSecretValue"],
                    Expression::List(arns),
                )]),
            )
            .comment("IAM policy for secrets access"),
        );
        blocks
    }

    fn outputs(&self, context: &RenderContext<'_>) -> Vec<(ServiceOutput, Expression)> {
        API_OUTPUTS
            .iter()
            .map(|output| {
                let value = match output {
                    ServiceOutput::LambdaArn => {
                        hcl::reference("aws_lambda_function", &context.local_name(), "arn")
                    }
                    ServiceOutput::ApiGatewayUrl => CoreOutput::ApiGatewayInvokeUrl.reference(),
                    _ => Expression::string(context.config.stage.as_str()),
                };
                (*output, value)
            })
            .collect()
    }
}
