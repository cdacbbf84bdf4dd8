use std::path::{Path, PathBuf};

use crate::config::{self, SERVICE_FILE};
use crate::hcl;
use crate::merge;
use crate::paths::ResourceTree;
use crate::render::{self, ComputeTarget, RenderContext, Settings};
use crate::writer;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Writer(#[from] writer::Error),
}

pub struct Request<'a> {
    pub service_path: &'a Path,
    pub environment: &'a str,
    pub target: &'a dyn ComputeTarget,
    pub settings: &'a Settings,
}

/// Renders the Terraform for one service and environment. Nothing is
/// written unless every earlier step succeeds.
pub fn run(request: &Request<'_>) -> Result<PathBuf, Error> {
    config::validate_environment_name(request.environment)?;
    config::validate_region(&request.settings.region)?;

    let service = config::parse(&request.service_path.join(SERVICE_FILE))?;
    tracing::info!(
        service = service.name(),
        environment = request.environment,
        compute = request.target.name(),
        "loaded service config"
    );

    let effective = merge::for_environment(&service, request.environment)?;

    let tree = if request.target.serves_http() {
        ResourceTree::build(&effective.routing, &effective.name)?
    } else {
        if !effective.routing.is_empty() {
            tracing::warn!(
                routes = effective.routing.len(),
                compute = request.target.name(),
                "target does not serve HTTP, ignoring routing"
            );
        }
        ResourceTree::default()
    };

    let context = RenderContext {
        environment: request.environment,
        settings: request.settings,
        config: &effective,
        tree: &tree,
    };
    let document = render::render(request.target, &context);
    let path = writer::write(request.service_path, &hcl::to_string(&document))?;

    tracing::info!(
        path = %path.display(),
        resources = document.resource_count(),
        "generated terraform"
    );
    return Ok(path);
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::run;
    use super::Error;
    use super::Request;
    use crate::config;
    use crate::render::{ComputeTarget, LambdaTarget, Settings, WorkerTarget};

    const ORDERS: &str = r#"
name: orders
stage: v1
resources:
  memory: 1024
  timeout: 20s
secrets: [db]
routing:
  - method: GET
    path: /orders
  - method: POST
    path: /orders
  - method: GET
    path: /orders/{id}
event_routing:
  - event: order.created
    targets: [billing]
environments:
  prod:
    resources:
      memory: 2048
    environment_variables:
      LOG_LEVEL: warn
"#;

    fn generate(dir: &Path, environment: &str, target: &dyn ComputeTarget) -> Result<String, Error> {
        let settings = Settings::default();
        let request = Request {
            service_path: dir,
            environment,
            target,
            settings: &settings,
        };
        let path = run(&request)?;
        return Ok(fs::read_to_string(path).unwrap());
    }

    #[test]
    fn generates_api_service() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("service.yaml"), ORDERS).unwrap();

        let rendered = generate(dir.path(), "prod", &LambdaTarget).unwrap();

        assert_eq!(true, rendered.starts_with("# Generated Terraform for orders (prod)\nterraform {\n"));
        assert_eq!(true, rendered.contains(r#"key     = "prod/services/orders/terraform.tfstate""#));
        assert_eq!(true, rendered.contains("memory_size      = 2048\n"));
        assert_eq!(true, rendered.contains(r#"LOG_LEVEL                    = "warn""#));
        assert_eq!(2, rendered.matches("resource \"aws_api_gateway_resource\"").count());
        assert_eq!(3, rendered.matches("resource \"aws_api_gateway_method\"").count());
        assert_eq!(1, rendered.matches("resource \"aws_cloudwatch_event_bus\"").count());
        assert_eq!(true, rendered.ends_with("output \"api_gateway_stage\" {\n  value = \"v1\"\n}\n"));
    }

    #[test]
    fn generation_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("service.yaml"), ORDERS).unwrap();

        let first = generate(dir.path(), "dev", &WorkerTarget).unwrap();
        let second = generate(dir.path(), "dev", &WorkerTarget).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn worker_ignores_routing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("service.yaml"), ORDERS).unwrap();

        let rendered = generate(dir.path(), "dev", &WorkerTarget).unwrap();

        assert_eq!(false, rendered.contains("aws_api_gateway_resource"));
        assert_eq!(true, rendered.contains("resource \"aws_ecs_service\" \"orders_service\""));
    }

    #[test]
    fn missing_service_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = generate(dir.path(), "dev", &LambdaTarget);

        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::Config(config::Error::FileNotFound(_)) => {}
            _ => panic!("Expected `FileNotFound` error"),
        }
        assert_eq!(false, dir.path().join(".terraform").exists());
    }

    #[test]
    fn invalid_duration_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("service.yaml"),
            "name: orders\nresources:\n  timeout: 5m\n",
        )
        .unwrap();

        let result = generate(dir.path(), "dev", &WorkerTarget);

        match result.err().unwrap() {
            Error::Config(config::Error::InvalidDuration { field, value }) => {
                assert_eq!("resources.timeout", field);
                assert_eq!("5m", value);
            }
            _ => panic!("Expected `InvalidDuration` error"),
        }
        assert_eq!(false, dir.path().join(".terraform").join("main.tf").exists());
    }

    #[test]
    fn failed_run_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("service.yaml"), ORDERS).unwrap();
        let previous = generate(dir.path(), "dev", &LambdaTarget).unwrap();

        fs::write(dir.path().join("service.yaml"), "name: [not, a, name]\n").unwrap();
        assert_eq!(true, generate(dir.path(), "dev", &LambdaTarget).is_err());

        let kept = fs::read_to_string(dir.path().join(".terraform").join("main.tf")).unwrap();
        assert_eq!(previous, kept);
    }

    #[test]
    fn rejects_unsafe_environment_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("service.yaml"), ORDERS).unwrap();

        match generate(dir.path(), "dev\"}", &LambdaTarget).err().unwrap() {
            Error::Config(config::Error::InvalidValue(_)) => {}
            _ => panic!("Expected `InvalidValue` error"),
        }
    }

    #[test]
    fn rejects_unsafe_region() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("service.yaml"), ORDERS).unwrap();
        let settings = Settings {
            region: "us-east-1\" }".to_string(),
            ..Settings::default()
        };
        let request = Request {
            service_path: dir.path(),
            environment: "dev",
            target: &WorkerTarget,
            settings: &settings,
        };

        match run(&request).err().unwrap() {
            Error::Config(config::Error::InvalidValue(_)) => {}
            _ => panic!("Expected `InvalidValue` error"),
        }
        assert_eq!(false, dir.path().join(".terraform").exists());
    }

    #[test]
    fn colliding_route_names_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("service.yaml"),
            "name: orders\nrouting:\n  - method: GET\n    path: /a-b\n  - method: GET\n    path: /a/b\n",
        )
        .unwrap();

        match generate(dir.path(), "dev", &LambdaTarget).err().unwrap() {
            Error::Config(config::Error::InvalidValue(message)) => {
                assert_eq!(true, message.contains("orders_a_b"));
            }
            _ => panic!("Expected `InvalidValue` error"),
        }
        assert_eq!(false, dir.path().join(".terraform").exists());
    }
}
