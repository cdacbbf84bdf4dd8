use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

pub mod config;
pub mod generate;
pub mod hcl;
pub mod merge;
pub mod outputs;
pub mod paths;
pub mod render;
pub mod writer;

use render::{ComputeTarget, LambdaTarget, Settings, WorkerTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    /// Lambda function behind the shared API Gateway.
    Api,
    /// SQS-driven ECS Fargate service.
    Worker,
}

impl Target {
    fn compute(self) -> &'static dyn ComputeTarget {
        match self {
            Target::Api => &LambdaTarget,
            Target::Worker => &WorkerTarget,
        }
    }
}

/// Generates Terraform for one service in one environment.
#[derive(Parser, Debug)]
#[command(name = "generate", version, about, long_about = None)]
struct Cli {
    /// Directory containing service.yaml.
    service_path: PathBuf,

    /// Environment to generate for, e.g. dev or prod.
    environment: String,

    #[arg(long, value_enum, default_value_t = Target::Api)]
    target: Target,

    /// S3 bucket holding Terraform state.
    #[arg(long, env = "INFRA_STATE_BUCKET", default_value = render::DEFAULT_STATE_BUCKET)]
    state_bucket: String,

    #[arg(long, env = "AWS_REGION", default_value = render::DEFAULT_REGION)]
    region: String,

    /// Version of the Lambda Web Adapter layer.
    #[arg(long, default_value_t = render::DEFAULT_ADAPTER_LAYER_VERSION)]
    adapter_layer_version: u32,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            state_bucket: self.state_bucket.clone(),
            region: self.region.clone(),
            adapter_layer_version: self.adapter_layer_version,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();
    let request = generate::Request {
        service_path: &cli.service_path,
        environment: &cli.environment,
        target: cli.target.compute(),
        settings: &settings,
    };

    let path = generate::run(&request).with_context(|| {
        format!(
            "failed to generate {} terraform for {} ({})",
            request.target.name(),
            cli.service_path.display(),
            cli.environment
        )
    })?;

    println!("Generated Terraform in {}", path.display());
    return Ok(());
}
