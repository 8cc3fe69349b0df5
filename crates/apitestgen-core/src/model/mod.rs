//! Intermediate model built by the scanner and consumed by synthesis.
//!
//! A [`TestedType`] owns its [`ScenarioGroup`]s in declaration order, each
//! group owns its [`Case`]s, and every case of a group shares one
//! [`ParameterMetadata`] describing the method's parameters.

mod case;
mod parameters;
mod tested_type;
mod verb;

pub use case::{
    Case, CookieAssertion, HeaderAssertion, PathAssertion, SeverityLevel, SpecDescriptor,
};
pub use parameters::{MatrixParams, ParameterMetadata, RoleMap};
pub use tested_type::{join_paths, AuthDescriptor, ScenarioGroup, TestedType, GENERATED_SUFFIX};
pub use verb::HttpVerb;
