//! Tested types and the scenario groups derived from their methods

// Internal imports (std, crate)
use std::path::PathBuf;

use super::{Case, HttpVerb};
use crate::imports::ModuleScope;

// External imports (alphabetized)
use serde::Serialize;

/// Suffix appended to a tagged type's name to name its generated test
pub const GENERATED_SUFFIX: &str = "GeneratedTest";

/// Credentials used by the generated `bearer_token` helper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthDescriptor {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub token_field: String,
}

/// Tests derived from one method of a tagged type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioGroup {
    pub method_name: String,
    pub verb: Option<HttpVerb>,
    /// Path template relative to the type's base path
    pub path: String,
    pub cases: Vec<Case>,
}

impl ScenarioGroup {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            verb: None,
            path: String::new(),
            cases: Vec::new(),
        }
    }
}

/// A tagged type for which one test file is generated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestedType {
    pub generated_name: String,
    pub source_name: String,
    pub package: String,
    pub base_path: String,
    pub auth: Option<AuthDescriptor>,
    pub source_file: PathBuf,
    /// Names in scope where the type is declared
    #[serde(skip)]
    pub scope: ModuleScope,
    scenarios: Vec<ScenarioGroup>,
}

impl TestedType {
    pub fn new(source_name: impl Into<String>, package: impl Into<String>) -> Self {
        let source_name = source_name.into();
        let package = package.into();
        Self {
            generated_name: format!("{source_name}{GENERATED_SUFFIX}"),
            source_name,
            scope: ModuleScope::new(package.clone()),
            package,
            base_path: String::new(),
            auth: None,
            source_file: PathBuf::new(),
            scenarios: Vec::new(),
        }
    }

    /// Insert a group keyed by its method name.
    ///
    /// A group with the same name is replaced in place and returned.
    pub fn insert_scenario(&mut self, group: ScenarioGroup) -> Option<ScenarioGroup> {
        match self
            .scenarios
            .iter_mut()
            .find(|g| g.method_name == group.method_name)
        {
            Some(existing) => Some(std::mem::replace(existing, group)),
            None => {
                self.scenarios.push(group);
                None
            }
        }
    }

    pub fn scenario(&self, method_name: &str) -> Option<&ScenarioGroup> {
        self.scenarios.iter().find(|g| g.method_name == method_name)
    }

    /// Groups in declaration order
    pub fn scenarios(&self) -> &[ScenarioGroup] {
        &self.scenarios
    }

    /// Total number of cases across all groups
    pub fn case_count(&self) -> usize {
        self.scenarios.iter().map(|g| g.cases.len()).sum()
    }

    /// Base path joined with the group's path, with exactly one `/` between
    pub fn full_path(&self, group: &ScenarioGroup) -> String {
        join_paths(&self.base_path, &group.path)
    }
}

/// Join two URL path fragments without doubling or dropping the separator
pub fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim();
    let path = path.trim();
    match (base.is_empty(), path.is_empty()) {
        (true, true) => String::new(),
        (true, false) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_uses_fixed_suffix() {
        let tested = TestedType::new("ClientController", "api::clients");
        assert_eq!(tested.generated_name, "ClientControllerGeneratedTest");
        assert_eq!(tested.source_name, "ClientController");
    }

    #[test]
    fn scenarios_keep_order_and_unique_names() {
        let mut tested = TestedType::new("Orders", "");
        assert!(tested.insert_scenario(ScenarioGroup::new("list")).is_none());
        assert!(tested.insert_scenario(ScenarioGroup::new("create")).is_none());

        let mut replacement = ScenarioGroup::new("list");
        replacement.path = "/all".into();
        let previous = tested.insert_scenario(replacement).unwrap();

        assert_eq!(previous.path, "");
        let names: Vec<_> = tested.scenarios().iter().map(|g| g.method_name.as_str()).collect();
        assert_eq!(names, vec!["list", "create"]);
        assert_eq!(tested.scenario("list").unwrap().path, "/all");
    }

    #[test]
    fn full_path_joins_with_single_slash() {
        assert_eq!(join_paths("/clients", "/{id}"), "/clients/{id}");
        assert_eq!(join_paths("/clients/", "{id}"), "/clients/{id}");
        assert_eq!(join_paths("/clients", ""), "/clients");
        assert_eq!(join_paths("", "/health"), "/health");
        assert_eq!(join_paths("", ""), "");
    }

    #[test]
    fn case_count_sums_groups() {
        let mut tested = TestedType::new("Orders", "");
        let mut group = ScenarioGroup::new("list");
        group.cases.push(Case::new());
        group.cases.push(Case::new());
        tested.insert_scenario(group);
        tested.insert_scenario(ScenarioGroup::new("create"));
        assert_eq!(tested.case_count(), 2);
    }
}
