use std::fmt::Display;

const INDENT: &str = "  ";
const INLINE_LIST_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Quoted literal; quotes, control characters and interpolation markers
    /// are escaped.
    String(String),
    /// Quoted template; `${...}` interpolations are kept as written.
    Template(String),
    /// Printed verbatim: references, numbers, keywords.
    Raw(String),
    Bool(bool),
    List(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    Call(String, Vec<Expression>),
}

impl Expression {
    pub fn string(value: impl Into<String>) -> Self {
        Expression::String(value.into())
    }

    pub fn template(value: impl Into<String>) -> Self {
        Expression::Template(value.into())
    }

    pub fn raw(value: impl Into<String>) -> Self {
        Expression::Raw(value.into())
    }

    pub fn number(value: impl Display) -> Self {
        Expression::Raw(value.to_string())
    }

    pub fn list(items: impl IntoIterator<Item = Expression>) -> Self {
        Expression::List(items.into_iter().collect())
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Expression)>) -> Self {
        Expression::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    pub fn call(name: &str, arguments: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Call(name.to_string(), arguments.into_iter().collect())
    }

    pub fn jsonencode(value: Expression) -> Self {
        Expression::call("jsonencode", [value])
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            Expression::String(_) | Expression::Template(_) | Expression::Raw(_) | Expression::Bool(_)
        )
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::string(value)
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        Expression::String(value)
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::Bool(value)
    }
}

impl From<u32> for Expression {
    fn from(value: u32) -> Self {
        Expression::number(value)
    }
}

impl From<u64> for Expression {
    fn from(value: u64) -> Self {
        Expression::number(value)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::number(value)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::number(value)
    }
}

/// `<kind>.<name>.<attribute>`
pub fn reference(kind: &str, name: &str, attribute: &str) -> Expression {
    Expression::Raw(format!("{}.{}.{}", kind, name, attribute))
}

/// Normalizes free text into a Terraform identifier: every character that is
/// not an ASCII letter or digit becomes `_`.
pub fn identifier(raw: &str) -> String {
    return raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Structure {
    Attribute(String, Expression),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub identifier: String,
    pub labels: Vec<String>,
    pub comment: Option<String>,
    pub body: Vec<Structure>,
}

impl Block {
    pub fn new(identifier: impl Into<String>) -> Self {
        Block {
            identifier: identifier.into(),
            labels: Vec::new(),
            comment: None,
            body: Vec::new(),
        }
    }

    pub fn resource(kind: &str, name: &str) -> Self {
        Block::new("resource").label(kind).label(name)
    }

    pub fn data(kind: &str, name: &str) -> Self {
        Block::new("data").label(kind).label(name)
    }

    pub fn output(name: &str) -> Self {
        Block::new("output").label(name)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Expression>) -> Self {
        self.body.push(Structure::Attribute(key.into(), value.into()));
        self
    }

    pub fn block(mut self, block: Block) -> Self {
        self.body.push(Structure::Block(block));
        self
    }

    /// First label, e.g. `aws_sqs_queue` for a resource block.
    pub fn kind(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// Second label, e.g. the resource's local name.
    pub fn name(&self) -> Option<&str> {
        self.labels.get(1).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Expression> {
        self.body.iter().find_map(|item| match item {
            Structure::Attribute(name, value) if name == key => Some(value),
            _ => None,
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.body.iter().filter_map(|item| match item {
            Structure::Block(block) => Some(block),
            Structure::Attribute(..) => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn extend(&mut self, blocks: impl IntoIterator<Item = Block>) {
        self.blocks.extend(blocks);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Top-level blocks of `identifier` (`resource`, `data`, ...) whose first
    /// label is `kind`.
    pub fn find<'a>(&'a self, identifier: &'a str, kind: &'a str) -> impl Iterator<Item = &'a Block> {
        self.blocks
            .iter()
            .filter(move |block| block.identifier == identifier && block.kind() == Some(kind))
    }

    pub fn resources<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Block> {
        self.find("resource", kind)
    }

    pub fn resource_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.identifier == "resource")
            .count()
    }
}

/// Prints `document` in `terraform fmt` layout.
pub fn to_string(document: &Document) -> String {
    let mut out = String::new();
    for (index, block) in document.blocks.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        write_block(&mut out, block, 0);
    }

    return out;
}

/// Quotes `value` as an HCL string literal.
pub fn quote(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_owned()).to_string();
    return quoted.replace("${", "$${").replace("%{", "%%{");
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    return chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
}

fn object_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_block(out: &mut String, block: &Block, depth: usize) {
    if let Some(comment) = &block.comment {
        for line in comment.lines() {
            push_indent(out, depth);
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }

    push_indent(out, depth);
    out.push_str(&block.identifier);
    for label in &block.labels {
        out.push(' ');
        out.push_str(&quote(label));
    }

    if block.body.is_empty() {
        out.push_str(" {}\n");
        return;
    }

    out.push_str(" {\n");
    write_body(out, &block.body, depth + 1);
    push_indent(out, depth);
    out.push_str("}\n");
}

fn write_body(out: &mut String, body: &[Structure], depth: usize) {
    let mut index = 0;
    while index < body.len() {
        // Runs are maximal, so anything after the first item borders a block.
        if index > 0 {
            out.push('\n');
        }

        match &body[index] {
            Structure::Block(block) => {
                write_block(out, block, depth);
                index += 1;
            }
            Structure::Attribute(..) => {
                let end = body[index..]
                    .iter()
                    .position(|item| matches!(item, Structure::Block(_)))
                    .map_or(body.len(), |offset| index + offset);
                let width = body[index..end]
                    .iter()
                    .filter_map(|item| match item {
                        Structure::Attribute(key, _) => Some(key.len()),
                        Structure::Block(_) => None,
                    })
                    .max()
                    .unwrap_or(0);

                for item in &body[index..end] {
                    if let Structure::Attribute(key, value) = item {
                        push_indent(out, depth);
                        out.push_str(&format!("{:<width$} = ", key, width = width));
                        write_expression(out, value, depth);
                        out.push('\n');
                    }
                }
                index = end;
            }
        }
    }
}

fn write_expression(out: &mut String, expression: &Expression, depth: usize) {
    match expression {
        Expression::String(value) => out.push_str(&quote(value)),
        Expression::Template(value) => {
            out.push('"');
            out.push_str(value);
            out.push('"');
        }
        Expression::Raw(value) => out.push_str(value),
        Expression::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Expression::List(items) => write_list(out, items, depth),
        Expression::Object(entries) => write_object(out, entries, depth),
        Expression::Call(name, arguments) => {
            out.push_str(name);
            out.push('(');
            for (index, argument) in arguments.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_expression(out, argument, depth);
            }
            out.push(')');
        }
    }
}

fn write_list(out: &mut String, items: &[Expression], depth: usize) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }

    if items.iter().all(Expression::is_scalar) {
        let mut inline = String::new();
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                inline.push_str(", ");
            }
            write_expression(&mut inline, item, depth);
        }
        if inline.len() <= INLINE_LIST_WIDTH {
            out.push('[');
            out.push_str(&inline);
            out.push(']');
            return;
        }
    }

    out.push_str("[\n");
    for item in items {
        push_indent(out, depth + 1);
        write_expression(out, item, depth + 1);
        out.push_str(",\n");
    }
    push_indent(out, depth);
    out.push(']');
}

fn write_object(out: &mut String, entries: &[(String, Expression)], depth: usize) {
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }

    let keys: Vec<String> = entries.iter().map(|(key, _)| object_key(key)).collect();
    let width = keys.iter().map(String::len).max().unwrap_or(0);

    out.push_str("{\n");
    for (key, (_, value)) in keys.iter().zip(entries) {
        push_indent(out, depth + 1);
        out.push_str(&format!("{:<width$} = ", key, width = width));
        write_expression(out, value, depth + 1);
        out.push('\n');
    }
    push_indent(out, depth);
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::identifier;
    use super::quote;
    use super::reference;
    use super::to_string;
    use super::Block;
    use super::Document;
    use super::Expression;

    fn render(block: Block) -> String {
        let mut document = Document::new();
        document.push(block);
        to_string(&document)
    }

    #[test]
    fn aligns_consecutive_attributes() {
        let block = Block::resource("aws_sqs_queue", "orders_queue")
            .comment("SQS Queue")
            .attribute("name", "dev-orders-queue")
            .attribute("visibility_timeout_seconds", 30u32)
            .attribute("fifo_queue", false);

        let expected = r#"# SQS Queue
resource "aws_sqs_queue" "orders_queue" {
  name                       = "dev-orders-queue"
  visibility_timeout_seconds = 30
  fifo_queue                 = false
}
"#;
        assert_eq!(expected, render(block));
    }

    #[test]
    fn separates_nested_blocks_with_blank_lines() {
        let block = Block::resource("aws_secretsmanager_secret_version", "db_version")
            .attribute("secret_id", reference("aws_secretsmanager_secret", "db", "id"))
            .attribute("secret_string", "n/a")
            .block(Block::new("lifecycle").attribute(
                "ignore_changes",
                Expression::list([Expression::raw("secret_string")]),
            ));

        let expected = r#"resource "aws_secretsmanager_secret_version" "db_version" {
  secret_id     = aws_secretsmanager_secret.db.id
  secret_string = "n/a"

  lifecycle {
    ignore_changes = [secret_string]
  }
}
"#;
        assert_eq!(expected, render(block));
    }

    #[test]
    fn renders_empty_blocks_inline() {
        assert_eq!(
            "data \"aws_caller_identity\" \"current\" {}\n",
            render(Block::data("aws_caller_identity", "current"))
        );
    }

    #[test]
    fn separates_top_level_blocks() {
        let mut document = Document::new();
        document.push(Block::output("queue_url").attribute("value", Expression::raw("a.b.url")));
        document.push(Block::output("queue_arn").attribute("value", Expression::raw("a.b.arn")));

        let expected = "output \"queue_url\" {\n  value = a.b.url\n}\n\noutput \"queue_arn\" {\n  value = a.b.arn\n}\n";
        assert_eq!(expected, to_string(&document));
    }

    #[test]
    fn renders_objects_and_calls() {
        let policy = Expression::jsonencode(Expression::object([
            ("source", Expression::list([Expression::string("orders")])),
            ("detail-type", Expression::list([Expression::string("order.created")])),
            ("aws:SourceAccount", Expression::raw("data.aws_caller_identity.current.account_id")),
        ]));
        let block = Block::resource("aws_cloudwatch_event_rule", "orders_order_created")
            .attribute("event_pattern", policy);

        let expected = r#"resource "aws_cloudwatch_event_rule" "orders_order_created" {
  event_pattern = jsonencode({
    source              = ["orders"]
    detail-type         = ["order.created"]
    "aws:SourceAccount" = data.aws_caller_identity.current.account_id
  })
}
"#;
        assert_eq!(expected, render(block));
    }

    #[test]
    fn breaks_lists_of_objects_over_lines() {
        let block = Block::new("locals").attribute(
            "environment",
            Expression::list([Expression::object([
                ("name", Expression::string("PORT")),
                ("value", Expression::string("8080")),
            ])]),
        );

        let expected = r#"locals {
  environment = [
    {
      name  = "PORT"
      value = "8080"
    },
  ]
}
"#;
        assert_eq!(expected, render(block));
    }

    #[test]
    fn breaks_long_scalar_lists() {
        let actions = Expression::list(
            ["sqs:ReceiveMessage", "sqs:DeleteMessage", "sqs:GetQueueAttributes", "sqs:GetQueueUrl"]
                .into_iter()
                .map(Expression::string),
        );
        let block = Block::new("locals").attribute("actions", actions);

        let expected = r#"locals {
  actions = [
    "sqs:ReceiveMessage",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
    "sqs:GetQueueUrl",
  ]
}
"#;
        assert_eq!(expected, render(block));
    }

    #[test]
    fn escapes_literals_but_not_templates() {
        assert_eq!(r#""say \"hi\"""#, quote("say \"hi\""));
        assert_eq!(r#""$${HOME} and %%{if}""#, quote("${HOME} and %{if}"));

        let block = Block::new("locals")
            .attribute("literal", "${not.interpolated}")
            .attribute("template", Expression::template("${var.region}/*"));
        let rendered = render(block);
        assert_eq!(true, rendered.contains(r#"literal  = "$${not.interpolated}""#));
        assert_eq!(true, rendered.contains(r#"template = "${var.region}/*""#));
    }

    #[test]
    fn normalizes_identifiers() {
        assert_eq!("orders_api_v1_items", identifier("orders-api/v1/items"));
        assert_eq!("orders__id_", identifier("orders/{id}"));
        assert_eq!("svc_order_created", identifier("svc_order.created"));
    }

    #[test]
    fn counts_and_finds_resources() {
        let mut document = Document::new();
        document.push(Block::data("aws_caller_identity", "current"));
        document.push(Block::resource("aws_sqs_queue", "a"));
        document.push(Block::resource("aws_sqs_queue", "b"));
        document.push(Block::resource("aws_iam_role", "c"));

        assert_eq!(3, document.resource_count());
        let queues: Vec<&str> = document
            .resources("aws_sqs_queue")
            .filter_map(Block::name)
            .collect();
        assert_eq!(vec!["a", "b"], queues);
        assert_eq!(1, document.find("data", "aws_caller_identity").count());
    }
}
