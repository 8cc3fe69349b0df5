//! Stage B: the chained request and assertion calls of a generated test

// Internal imports (std, crate)
use super::decorations::body_binding;
use super::status::status_expectation;
use super::MethodContext;
use crate::error::Result;
use crate::matcher::matcher_expression;
use crate::uri::prepare_uri_expression;
use crate::utils::rust_string_literal;

/// A receiver followed by chained method calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluentStatement {
    receiver: String,
    calls: Vec<String>,
}

impl FluentStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_receiver(&mut self, receiver: impl Into<String>) {
        self.receiver = receiver.into();
    }

    /// Append a call, given without the leading dot
    pub fn call(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// One call per line, terminated by `;`
    pub fn render(&self) -> String {
        let mut out = self.receiver.clone();
        for call in &self.calls {
            out.push_str("\n    .");
            out.push_str(call);
        }
        out.push(';');
        out
    }
}

/// One Stage B step
pub trait FluentStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()>;
}

/// `client` when Stage A built one, the shared client otherwise
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientSelectionStep;

impl FluentStep for ClientSelectionStep {
    fn name(&self) -> &'static str {
        "client"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        if ctx.case.needs_custom_client() {
            statement.set_receiver("client");
        } else {
            statement.set_receiver("web_test_client()");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VerbStep;

impl FluentStep for VerbStep {
    fn name(&self) -> &'static str {
        "verb"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        match ctx.group.verb {
            Some(verb) => statement.call(format!("{}()", verb.as_str())),
            None => {
                ctx.diagnostics.warning(
                    format!(
                        "`{}` has no routing tag; the generated request uses GET",
                        ctx.group.method_name
                    ),
                    None,
                );
                statement.call("get()");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UriStep;

impl FluentStep for UriStep {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        let params = ctx.params();
        let uri = prepare_uri_expression(ctx.full_path, &params.path, &params.query, &params.matrix);
        statement.call(format!("uri({})", uri.render()));
        Ok(())
    }
}

/// Request headers read from the test data under the header name
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderStep;

impl FluentStep for HeaderStep {
    fn name(&self) -> &'static str {
        "header"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        for name in ctx.params().header.names() {
            let literal = rust_string_literal(name);
            statement.call(format!("header({literal}, safe_string(data.get({literal})))"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AuthStep;

impl FluentStep for AuthStep {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        if ctx.case.requires_auth {
            statement.call("header(\"Authorization\", bearer_token())");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CookieStep;

impl FluentStep for CookieStep {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        for name in ctx.params().cookie.names() {
            let literal = rust_string_literal(name);
            statement.call(format!("cookie({literal}, safe_string(data.get({literal})))"));
        }
        Ok(())
    }
}

/// Multipart upload, or a JSON body built from the materialized parameters
#[derive(Debug, Default, Clone, Copy)]
pub struct BodyStep;

impl FluentStep for BodyStep {
    fn name(&self) -> &'static str {
        "body"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        let params = ctx.params();
        if params.requires_multipart() {
            statement.call("content_type(MediaType::MULTIPART_FORM_DATA)");
            statement.call("body(BodyInserters::from_multipart_data(build_multipart_data(&data)))");
        } else if ctx.requires_body() {
            statement.call("content_type(MediaType::APPLICATION_JSON)");
            for name in params.body.names().chain(params.form.names()) {
                statement.call(format!("body_value(format_body(&{}))", body_binding(name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExchangeStep;

impl FluentStep for ExchangeStep {
    fn name(&self) -> &'static str {
        "exchange"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        statement.call("exchange()");
        statement.call("expect_status()");
        statement.call(status_expectation(ctx.case.expected_status_code).call());
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpectCookieStep;

impl FluentStep for ExpectCookieStep {
    fn name(&self) -> &'static str {
        "expect_cookie"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        for cookie in ctx.case.expected_cookies() {
            statement.call("expect_cookie()");
            statement.call(format!(
                "value_equals({}, {})",
                rust_string_literal(&cookie.name),
                rust_string_literal(&cookie.value)
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpectHeaderStep;

impl FluentStep for ExpectHeaderStep {
    fn name(&self) -> &'static str {
        "expect_header"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        for header in ctx.case.expected_headers() {
            let values: Vec<String> = header.values.iter().map(|v| rust_string_literal(v)).collect();
            statement.call("expect_header()");
            statement.call(format!(
                "value_equals({}, &[{}])",
                rust_string_literal(&header.name),
                values.join(", ")
            ));
        }
        Ok(())
    }
}

/// JSON path assertions on the response body
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpectBodyPathStep;

impl FluentStep for ExpectBodyPathStep {
    fn name(&self) -> &'static str {
        "expect_body"
    }

    fn apply(&self, statement: &mut FluentStatement, ctx: &MethodContext<'_>) -> Result<()> {
        let assertions: Vec<_> = ctx
            .case
            .path_assertions()
            .iter()
            .filter(|a| !a.path.trim().is_empty())
            .filter_map(|a| a.kind.map(|kind| (a, kind)))
            .collect();
        if assertions.is_empty() {
            return Ok(());
        }

        statement.call("expect_body()");
        for (assertion, kind) in assertions {
            let matcher =
                matcher_expression(kind, &assertion.value, assertion.custom_matcher.as_deref())?;
            statement.call(format!("json_path({})", rust_string_literal(&assertion.path)));
            statement.call(format!("value({matcher})"));
        }
        Ok(())
    }
}

/// Stage B in its standard order
pub fn default_fluent_steps() -> Vec<Box<dyn FluentStep>> {
    vec![
        Box::new(ClientSelectionStep),
        Box::new(VerbStep),
        Box::new(UriStep),
        Box::new(HeaderStep),
        Box::new(AuthStep),
        Box::new(CookieStep),
        Box::new(BodyStep),
        Box::new(ExchangeStep),
        Box::new(ExpectCookieStep),
        Box::new(ExpectHeaderStep),
        Box::new(ExpectBodyPathStep),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_chains_one_call_per_line() {
        let mut statement = FluentStatement::new();
        statement.set_receiver("web_test_client()");
        statement.call("get()");
        statement.call("uri(\"/health\")");
        assert_eq!(
            statement.render(),
            "web_test_client()\n    .get()\n    .uri(\"/health\");"
        );
    }

    #[test]
    fn test_default_steps_order() {
        let names: Vec<_> = default_fluent_steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "client",
                "verb",
                "uri",
                "header",
                "auth",
                "cookie",
                "body",
                "exchange",
                "expect_cookie",
                "expect_header",
                "expect_body"
            ]
        );
    }
}
