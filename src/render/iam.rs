use crate::hcl::{self, Block, Expression};

const POLICY_VERSION: &str = "2012-10-17";

pub fn policy_document(statements: Vec<Expression>) -> Expression {
    Expression::jsonencode(Expression::object([
        ("Version", Expression::string(POLICY_VERSION)),
        ("Statement", Expression::List(statements)),
    ]))
}

pub fn allow(actions: &[&str], resource: Expression) -> Expression {
    Expression::object([
        ("Effect", Expression::string("Allow")),
        (
            "Action",
            Expression::list(actions.iter().map(|action| Expression::string(*action))),
        ),
        ("Resource", resource),
    ])
}

pub fn assume_role_policy(service: &str) -> Expression {
    policy_document(vec![Expression::object([
        ("Action", Expression::string("sts:AssumeRole")),
        ("Effect", Expression::string("Allow")),
        (
            "Principal",
            Expression::object([("Service", Expression::string(service))]),
        ),
    ])])
}

pub fn role(local_name: &str, name: String, service: &str) -> Block {
    Block::resource("aws_iam_role", local_name)
        .attribute("name", name)
        .attribute("assume_role_policy", assume_role_policy(service))
}

pub fn managed_policy(local_name: &str, role: &str, policy_arn: &str) -> Block {
    Block::resource("aws_iam_role_policy_attachment", local_name)
        .attribute("role", hcl::reference("aws_iam_role", role, "name"))
        .attribute("policy_arn", policy_arn)
}

/// Inline policy attached to `aws_iam_role.<role>`.
pub fn role_policy(local_name: &str, name: String, role: &str, policy: Expression) -> Block {
    Block::resource("aws_iam_role_policy", local_name)
        .attribute("name", name)
        .attribute("role", hcl::reference("aws_iam_role", role, "id"))
        .attribute("policy", policy)
}
