use crate::hcl::{Block, Expression};

pub const CORE_STATE: &str = "core";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreOutput {
    ApiGatewayId,
    ApiGatewayRootResourceId,
    ApiGatewayExecutionArn,
    ApiGatewayInvokeUrl,
    EcsClusterId,
    EcsClusterName,
    VpcId,
    PrivateSubnetIds,
}

impl CoreOutput {
    pub fn key(self) -> &'static str {
        match self {
            CoreOutput::ApiGatewayId => "api_gateway_id",
            CoreOutput::ApiGatewayRootResourceId => "api_gateway_root_resource_id",
            CoreOutput::ApiGatewayExecutionArn => "api_gateway_execution_arn",
            CoreOutput::ApiGatewayInvokeUrl => "api_gateway_invoke_url",
            CoreOutput::EcsClusterId => "ecs_cluster_id",
            CoreOutput::EcsClusterName => "ecs_cluster_name",
            CoreOutput::VpcId => "vpc_id",
            CoreOutput::PrivateSubnetIds => "private_subnet_ids",
        }
    }

    fn path(self) -> String {
        format!("data.terraform_remote_state.{}.outputs.{}", CORE_STATE, self.key())
    }

    pub fn reference(self) -> Expression {
        Expression::Raw(self.path())
    }

    /// The output as a `${...}` interpolation, for use inside templates.
    pub fn interpolation(self) -> String {
        format!("${{{}}}", self.path())
    }
}

/// Remote state data source for the core stack of `environment`.
pub fn core_state(bucket: &str, region: &str, environment: &str) -> Block {
    Block::data("terraform_remote_state", CORE_STATE)
        .comment("Core infrastructure outputs")
        .attribute("backend", "s3")
        .attribute(
            "config",
            Expression::object([
                ("bucket", Expression::string(bucket)),
                ("key", Expression::string(format!("{}/core/terraform.tfstate", environment))),
                ("region", Expression::string(region)),
            ]),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutput {
    LambdaArn,
    ApiGatewayUrl,
    ApiGatewayStage,
    QueueUrl,
    QueueArn,
    ServiceName,
    ClusterName,
    TaskDefinitionArn,
    AutoscalingTargetArn,
}

impl ServiceOutput {
    pub fn name(self) -> &'static str {
        match self {
            ServiceOutput::LambdaArn => "lambda_arn",
            ServiceOutput::ApiGatewayUrl => "api_gateway_url",
            ServiceOutput::ApiGatewayStage => "api_gateway_stage",
            ServiceOutput::QueueUrl => "queue_url",
            ServiceOutput::QueueArn => "queue_arn",
            ServiceOutput::ServiceName => "service_name",
            ServiceOutput::ClusterName => "cluster_name",
            ServiceOutput::TaskDefinitionArn => "task_definition_arn",
            ServiceOutput::AutoscalingTargetArn => "autoscaling_target_arn",
        }
    }
}

pub const API_OUTPUTS: [ServiceOutput; 3] = [
    ServiceOutput::LambdaArn,
    ServiceOutput::ApiGatewayUrl,
    ServiceOutput::ApiGatewayStage,
];

pub const WORKER_OUTPUTS: [ServiceOutput; 6] = [
    ServiceOutput::QueueUrl,
    ServiceOutput::QueueArn,
    ServiceOutput::ServiceName,
    ServiceOutput::ClusterName,
    ServiceOutput::TaskDefinitionArn,
    ServiceOutput::AutoscalingTargetArn,
];

pub fn declare(outputs: Vec<(ServiceOutput, Expression)>) -> Vec<Block> {
    outputs
        .into_iter()
        .enumerate()
        .map(|(index, (output, value))| {
            let block = Block::output(output.name()).attribute("value", value);
            if index == 0 {
                block.comment("Outputs")
            } else {
                block
            }
        })
        .collect()
}
