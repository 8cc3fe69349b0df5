//! Stage A: attributes, docs and setup statements of a generated test.
//!
//! Each [`DecorationStep`] looks only at the [`MethodContext`] and writes into
//! the shared [`MethodBuilder`]; no step relies on another having run.

// Internal imports (std, crate)
use super::{MethodContext, OrderGate};
use crate::error::Result;
use crate::model::ParameterMetadata;
use crate::utils::{normalize_type_text, rust_string_literal};

// External imports (alphabetized)
use quote::ToTokens;

/// Local names the generated test body already uses
const RESERVED_BINDINGS: &[&str] = &["data", "client"];

/// Accumulates the pieces of one generated test function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBuilder {
    name: String,
    docs: Vec<String>,
    attributes: Vec<String>,
    statements: Vec<String>,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_doc(&mut self, line: impl Into<String>) {
        self.docs.push(line.into());
    }

    /// Add an attribute, given without the surrounding `#[` `]`
    pub fn add_attribute(&mut self, attribute: impl Into<String>) {
        self.attributes.push(attribute.into());
    }

    /// Add a statement; it may span several lines
    pub fn add_statement(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Render the function with `tail` as its last statement
    pub fn render(&self, tail: &str) -> String {
        let mut out = String::new();
        for doc in &self.docs {
            if doc.is_empty() {
                out.push_str("///\n");
            } else {
                out.push_str(&format!("/// {doc}\n"));
            }
        }
        for attribute in &self.attributes {
            out.push_str(&format!("#[{attribute}]\n"));
        }
        out.push_str(&format!("fn {}() {{\n", self.name));
        for statement in self.statements.iter().map(String::as_str).chain([tail]) {
            for line in statement.lines() {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(&format!("    {line}\n"));
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

/// One Stage A step
pub trait DecorationStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()>;
}

/// `#[test]`, or the runtime's repeat attribute when repeat > 1
#[derive(Debug, Default, Clone, Copy)]
pub struct RepeatStep;

impl DecorationStep for RepeatStep {
    fn name(&self) -> &'static str {
        "repeat"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        if ctx.case.repeat > 1 {
            builder.add_attribute(format!(
                "{}::repeat({})",
                ctx.options.client_crate, ctx.case.repeat
            ));
        } else {
            builder.add_attribute("test");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeoutStep;

impl DecorationStep for TimeoutStep {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        if ctx.case.timeout > 0 {
            builder.add_attribute(format!(
                "{}::timeout({})",
                ctx.options.client_crate, ctx.case.timeout
            ));
        }
        Ok(())
    }
}

/// Execution order, gated by [`OrderGate`]
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderStep;

impl DecorationStep for OrderStep {
    fn name(&self) -> &'static str {
        "order"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        let emit = match ctx.options.order_gate {
            OrderGate::NonZeroOrder => ctx.case.order != 0,
            OrderGate::TimeoutCompat => ctx.case.timeout > 0,
        };
        if emit {
            builder.add_attribute(format!(
                "{}::order({})",
                ctx.options.client_crate, ctx.case.order
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayNameStep;

impl DecorationStep for DisplayNameStep {
    fn name(&self) -> &'static str {
        "display_name"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        if !ctx.case.display_name.is_empty() {
            builder.add_attribute(format!(
                "{}::display_name({})",
                ctx.options.client_crate,
                rust_string_literal(&ctx.case.display_name)
            ));
        }
        Ok(())
    }
}

/// Builds a dedicated client when logging or a response timeout is requested
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientSetupStep;

impl DecorationStep for ClientSetupStep {
    fn name(&self) -> &'static str {
        "client_setup"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        if !ctx.case.needs_custom_client() {
            return Ok(());
        }
        let mut statement = String::from("let client = web_test_client()\n    .mutate()");
        if ctx.case.enable_logging {
            statement.push_str("\n    .filter(log_request())\n    .filter(log_response())");
        }
        if let Some(seconds) = ctx.case.response_timeout {
            statement.push_str(&format!(
                "\n    .response_timeout(Duration::from_secs({seconds}))"
            ));
        }
        statement.push_str("\n    .build();");
        builder.add_statement(statement);
        Ok(())
    }
}

/// Loads the case's data set and materializes JSON body parameters from it
#[derive(Debug, Default, Clone, Copy)]
pub struct DataLoadStep;

impl DecorationStep for DataLoadStep {
    fn name(&self) -> &'static str {
        "data_load"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        builder.add_statement(format!(
            "let data = get_data({});",
            rust_string_literal(&ctx.case.data_provider)
        ));

        let source_crate = ctx.options.source_crate.as_deref();
        for (name, payload) in materialized_bodies(ctx.params(), ctx.requires_body()) {
            builder.add_statement(format!(
                "let {}: {} = from_data(&data, {}).expect({});",
                body_binding(name),
                ctx.scope.qualify_type(&payload, source_crate),
                rust_string_literal(name),
                rust_string_literal(&format!("test data for `{name}`"))
            ));
        }
        Ok(())
    }
}

/// Reporting metadata as doc lines
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptorDocStep;

impl DecorationStep for DescriptorDocStep {
    fn name(&self) -> &'static str {
        "descriptor_docs"
    }

    fn apply(&self, builder: &mut MethodBuilder, ctx: &MethodContext<'_>) -> Result<()> {
        if let Some(descriptor) = &ctx.case.descriptor {
            for line in descriptor.doc_lines() {
                builder.add_doc(line);
            }
        }
        Ok(())
    }
}

/// Stage A in its standard order
pub fn default_decoration_steps() -> Vec<Box<dyn DecorationStep>> {
    vec![
        Box::new(RepeatStep),
        Box::new(TimeoutStep),
        Box::new(OrderStep),
        Box::new(DisplayNameStep),
        Box::new(ClientSetupStep),
        Box::new(DataLoadStep),
        Box::new(DescriptorDocStep),
    ]
}

/// Body and form parameters read from the test data, with their payload
/// types. Multipart requests and verbs without a body materialize nothing.
pub(crate) fn materialized_bodies(
    params: &ParameterMetadata,
    requires_body: bool,
) -> Vec<(&str, String)> {
    if !requires_body || params.requires_multipart() {
        return Vec::new();
    }
    params
        .body
        .iter()
        .chain(params.form.iter())
        .map(|(name, type_name)| (name, payload_type(type_name)))
        .collect()
}

/// Local variable holding a materialized body parameter
pub(crate) fn body_binding(name: &str) -> String {
    if RESERVED_BINDINGS.contains(&name) {
        format!("{name}_value")
    } else {
        name.to_string()
    }
}

/// Payload type of a body parameter: `Json<T>` and `Form<T>` become `T`,
/// references become owned.
pub(crate) fn payload_type(type_name: &str) -> String {
    let trimmed = type_name.trim().trim_start_matches('&').trim();
    let Ok(syn::Type::Path(path)) = syn::parse_str::<syn::Type>(trimmed) else {
        return trimmed.to_string();
    };
    let Some(last) = path.path.segments.last() else {
        return trimmed.to_string();
    };
    if !matches!(last.ident.to_string().as_str(), "Json" | "Form") {
        return trimmed.to_string();
    }
    match &last.arguments {
        syn::PathArguments::AngleBracketed(args) if args.args.len() == 1 => {
            normalize_type_text(&args.args.to_token_stream().to_string())
        }
        _ => trimmed.to_string(),
    }
}
