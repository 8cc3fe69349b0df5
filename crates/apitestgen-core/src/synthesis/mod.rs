//! Code synthesis engine.
//!
//! For every case of a scenario group the engine builds one test function in
//! two stages:
//!
//! * **Stage A** ([`DecorationStep`]s) adds attributes, doc lines and the
//!   setup statements: client configuration, data loading and body
//!   materialization.
//! * **Stage B** ([`FluentStep`]s) builds the chained request and assertion
//!   statement that ends the function.
//!
//! Both chains are plain ordered lists of stateless steps. The defaults can be
//! swapped out with [`SynthesisEngine::with_steps`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use apitestgen_core::diagnostics::LogDiagnostics;
//! use apitestgen_core::model::{Case, HttpVerb, ScenarioGroup};
//! use apitestgen_core::synthesis::{SynthesisEngine, SynthesisOptions};
//!
//! let engine = SynthesisEngine::new(SynthesisOptions::default(), Arc::new(LogDiagnostics));
//! let mut group = ScenarioGroup::new("health");
//! group.verb = Some(HttpVerb::Get);
//! let mut case = Case::new();
//! case.expected_status_code = 200;
//!
//! let method = engine.generate(&group, &case, "/health").unwrap();
//! assert_eq!(method.name, "health_200");
//! assert!(method.source.contains(".is_ok();"));
//! ```

mod decorations;
mod fluent;
mod status;

pub use decorations::{
    default_decoration_steps, ClientSetupStep, DataLoadStep, DecorationStep, DescriptorDocStep,
    DisplayNameStep, MethodBuilder, OrderStep, RepeatStep, TimeoutStep,
};
pub use fluent::{
    default_fluent_steps, AuthStep, BodyStep, ClientSelectionStep, CookieStep, ExchangeStep,
    ExpectBodyPathStep, ExpectCookieStep, ExpectHeaderStep, FluentStatement, FluentStep,
    HeaderStep, UriStep, VerbStep,
};
pub use status::{status_expectation, StatusExpectation};

// Internal imports (std, crate)
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::imports::ModuleScope;
use crate::model::{AuthDescriptor, Case, ParameterMetadata, ScenarioGroup, TestedType};
use crate::utils::to_snake_case;
use decorations::materialized_bodies;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Default crate providing the fluent test client and its attributes
pub const DEFAULT_CLIENT_CRATE: &str = "web_test_client";

/// When the order attribute is emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderGate {
    /// Whenever the case declares a non-zero order
    #[default]
    NonZeroOrder,
    /// Only when the case declares a positive timeout, as older generators did
    TimeoutCompat,
}

/// What happens when two cases of one type produce the same test name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    /// Warn and append `_2`, `_3`, ...
    #[default]
    Suffix,
    /// Fail the whole source unit
    Error,
}

/// Settings that shape the generated code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub client_crate: String,
    /// Name the test crate uses for the crate under test
    pub source_crate: Option<String>,
    pub order_gate: OrderGate,
    pub duplicate_names: DuplicateNamePolicy,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            client_crate: DEFAULT_CLIENT_CRATE.to_string(),
            source_crate: None,
            order_gate: OrderGate::default(),
            duplicate_names: DuplicateNamePolicy::default(),
        }
    }
}

/// Everything a step may look at while generating one test
pub struct MethodContext<'a> {
    pub group: &'a ScenarioGroup,
    pub case: &'a Case,
    /// Base path joined with the group's path
    pub full_path: &'a str,
    /// Names in scope where the tested type is declared
    pub scope: &'a ModuleScope,
    pub options: &'a SynthesisOptions,
    pub diagnostics: &'a dyn Diagnostics,
}

impl MethodContext<'_> {
    pub fn params(&self) -> &ParameterMetadata {
        self.case.parameters()
    }

    pub fn requires_body(&self) -> bool {
        self.group.verb.is_some_and(|verb| verb.requires_body())
    }
}

/// One generated test function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedMethod {
    pub name: String,
    pub source: String,
}

/// All tests generated for one tested type, ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestFile {
    pub file_name: String,
    pub generated_name: String,
    pub source_name: String,
    pub package: String,
    pub base_path: String,
    pub source_file: PathBuf,
    pub auth: Option<AuthDescriptor>,
    /// `use` paths for the types the tests name
    pub imports: Vec<String>,
    pub methods: Vec<GeneratedMethod>,
    pub needs_multipart: bool,
    pub needs_logging: bool,
    pub needs_auth: bool,
    pub needs_response_timeout: bool,
}

/// Turns scenario groups and cases into test source
pub struct SynthesisEngine {
    options: SynthesisOptions,
    decorations: Vec<Box<dyn DecorationStep>>,
    fluent: Vec<Box<dyn FluentStep>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl SynthesisEngine {
    /// Engine with the standard Stage A and Stage B chains
    pub fn new(options: SynthesisOptions, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::with_steps(
            options,
            diagnostics,
            default_decoration_steps(),
            default_fluent_steps(),
        )
    }

    /// Engine with caller-supplied chains, applied in the given order
    pub fn with_steps(
        options: SynthesisOptions,
        diagnostics: Arc<dyn Diagnostics>,
        decorations: Vec<Box<dyn DecorationStep>>,
        fluent: Vec<Box<dyn FluentStep>>,
    ) -> Self {
        Self {
            options,
            decorations,
            fluent,
            diagnostics,
        }
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Test name for a case: `<method>_<status>`
    pub fn method_name(group: &ScenarioGroup, case: &Case) -> String {
        format!("{}_{}", group.method_name, case.expected_status_code)
    }

    /// Generate the test function for one case
    pub fn generate(&self, group: &ScenarioGroup, case: &Case, full_path: &str) -> Result<GeneratedMethod> {
        let scope = ModuleScope::default();
        self.generate_named(group, case, full_path, &scope, Self::method_name(group, case))
    }

    fn generate_named(
        &self,
        group: &ScenarioGroup,
        case: &Case,
        full_path: &str,
        scope: &ModuleScope,
        name: String,
    ) -> Result<GeneratedMethod> {
        let ctx = MethodContext {
            group,
            case,
            full_path,
            scope,
            options: &self.options,
            diagnostics: self.diagnostics.as_ref(),
        };

        let mut builder = MethodBuilder::new(name);
        for step in &self.decorations {
            step.apply(&mut builder, &ctx)?;
        }

        let mut statement = FluentStatement::new();
        for step in &self.fluent {
            step.apply(&mut statement, &ctx)?;
        }

        log::debug!(
            "Generated {} for {} {}",
            builder.name(),
            group.verb.map(|v| v.to_string()).unwrap_or_default(),
            full_path
        );

        Ok(GeneratedMethod {
            name: builder.name().to_string(),
            source: builder.render(&statement.render()),
        })
    }

    /// Generate every test of a tested type.
    ///
    /// Any failure aborts the whole type; colliding test names are handled per
    /// [`DuplicateNamePolicy`].
    pub fn synthesize_type(&self, tested: &TestedType) -> Result<TestFile> {
        let mut methods = Vec::with_capacity(tested.case_count());
        let mut used = HashSet::new();
        let mut payload_types = Vec::new();

        for group in tested.scenarios() {
            let full_path = tested.full_path(group);
            let requires_body = group.verb.is_some_and(|verb| verb.requires_body());
            for case in &group.cases {
                let base = Self::method_name(group, case);
                let name = self.unique_name(&tested.generated_name, &base, &mut used)?;
                methods.push(self.generate_named(group, case, &full_path, &tested.scope, name)?);
                payload_types.extend(
                    materialized_bodies(case.parameters(), requires_body)
                        .into_iter()
                        .map(|(_, type_name)| type_name),
                );
            }
        }

        let cases = || tested.scenarios().iter().flat_map(|g| g.cases.iter());
        Ok(TestFile {
            file_name: format!("{}.rs", to_snake_case(&tested.generated_name)),
            generated_name: tested.generated_name.clone(),
            source_name: tested.source_name.clone(),
            package: tested.package.clone(),
            base_path: tested.base_path.clone(),
            source_file: tested.source_file.clone(),
            auth: tested.auth.clone(),
            imports: self.file_imports(tested, &payload_types),
            methods,
            needs_multipart: cases().any(|c| c.parameters().requires_multipart()),
            needs_logging: cases().any(|c| c.enable_logging),
            needs_auth: cases().any(|c| c.requires_auth),
            needs_response_timeout: cases().any(|c| c.response_timeout.is_some()),
        })
    }

    /// Imports for the payload types the tests materialize
    fn file_imports(&self, tested: &TestedType, payload_types: &[String]) -> Vec<String> {
        let plan = tested.scope.resolve(
            payload_types.iter().map(String::as_str),
            self.options.source_crate.as_deref(),
        );
        if !plan.needs_crate_name.is_empty() {
            self.diagnostics.warning(
                format!(
                    "{}: cannot import {} without the name of the crate under test; set `source_crate`",
                    tested.generated_name,
                    plan.needs_crate_name.join(", ")
                ),
                None,
            );
        }
        if !plan.unresolved.is_empty() {
            self.diagnostics.warning(
                format!(
                    "{}: {} is neither imported nor declared in `{}`; add an import to the preamble",
                    tested.generated_name,
                    plan.unresolved.join(", "),
                    tested.scope.module_path
                ),
                None,
            );
        }
        plan.imports
    }

    fn unique_name(&self, owner: &str, base: &str, used: &mut HashSet<String>) -> Result<String> {
        if used.insert(base.to_string()) {
            return Ok(base.to_string());
        }
        match self.options.duplicate_names {
            DuplicateNamePolicy::Error => Err(Error::synthesis(format!(
                "{owner}: more than one test would be named `{base}`"
            ))),
            DuplicateNamePolicy::Suffix => {
                let mut n = 2;
                let name = loop {
                    let candidate = format!("{base}_{n}");
                    if used.insert(candidate.clone()) {
                        break candidate;
                    }
                    n += 1;
                };
                self.diagnostics.warning(
                    format!("{owner}: test name `{base}` is already used, generating `{name}`"),
                    None,
                );
                Ok(name)
            }
        }
    }
}
