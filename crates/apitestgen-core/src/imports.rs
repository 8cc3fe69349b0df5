//! Imports for generated test files.
//!
//! Generated tests are compiled as their own crate, so every type they name
//! has to be reachable through the source crate's name. While scanning, each
//! module's `use` items and declared names are recorded in a [`ModuleScope`].
//! At synthesis time the scope turns the payload types of materialized body
//! parameters into `use` paths for the test file.
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::imports::ModuleScope;
//!
//! let mut scope = ModuleScope::new("api::clients");
//! scope.add_use(&syn::parse_quote!(use crate::dto::ClientDto;));
//! scope.declare("Filter");
//!
//! let plan = scope.resolve(["ClientDto", "Vec<Filter>"], Some("shop"));
//! assert_eq!(plan.imports, vec!["shop::api::clients::Filter", "shop::dto::ClientDto"]);
//! ```

// Internal imports (std, crate)
use std::collections::BTreeSet;

use crate::utils::normalize_type_text;

// External imports (alphabetized)
use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::visit_mut::{self, VisitMut};
use syn::{Ident, ItemUse, PathSegment, TypePath, UseTree};

/// Names a generated file can use without an import: the language prelude
/// and what the test file template imports itself
const IN_SCOPE: &[&str] = &[
    "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "f32", "f64", "String", "Vec", "Option", "Result", "Box", "HashMap",
    "Duration", "Value", "DataSet",
];

/// One name brought into scope by a `use` item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Path as written; a leading `::` is kept as an empty first segment
    pub segments: Vec<String>,
    pub alias: Option<String>,
    pub glob: bool,
}

impl Import {
    /// Name the import binds; `None` for globs and `_` imports
    pub fn binding(&self) -> Option<&str> {
        if self.glob {
            return None;
        }
        let name = self
            .alias
            .as_deref()
            .or_else(|| self.segments.last().map(String::as_str))?;
        (name != "_").then_some(name)
    }

    pub fn is_crate_local(&self) -> bool {
        self.segments.first().is_some_and(|s| s == "crate")
    }

    /// Path as the test crate writes it.
    ///
    /// `None` when the path is crate-local and the source crate is unknown.
    pub fn render(&self, source_crate: Option<&str>) -> Option<String> {
        let mut segments = self.segments.clone();
        if self.is_crate_local() {
            segments[0] = source_crate?.to_string();
        }
        let mut path = segments.join("::");
        if self.glob {
            path.push_str("::*");
        }
        if let Some(alias) = &self.alias {
            path.push_str(" as ");
            path.push_str(alias);
        }
        Some(path)
    }
}

/// First segment of a path found inside a type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TypeRoot {
    name: String,
    /// Whether more segments follow, as in `dto::ClientDto`
    qualified: bool,
}

/// Imports a generated file needs, and what could not be placed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    /// Rendered `use` paths, sorted and without duplicates
    pub imports: Vec<String>,
    /// Names not declared or imported by the module
    pub unresolved: Vec<String>,
    /// Crate-local names that cannot be imported without the source crate name
    pub needs_crate_name: Vec<String>,
}

/// The `use` items and declared names of one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleScope {
    pub module_path: String,
    pub imports: Vec<Import>,
    /// Types and modules declared directly in the module
    pub items: BTreeSet<String>,
}

impl ModuleScope {
    pub fn new(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            ..Self::default()
        }
    }

    /// Record a type or module declared in this module
    pub fn declare(&mut self, name: impl Into<String>) {
        self.items.insert(name.into());
    }

    /// Record every name a `use` item binds
    pub fn add_use(&mut self, item: &ItemUse) {
        let mut prefix = if item.leading_colon.is_some() {
            vec![String::new()]
        } else {
            Vec::new()
        };
        flatten(&item.tree, &mut prefix, &mut self.imports);
    }

    /// Imports that bring the roots of `type_texts` into scope of a test
    /// crate depending on `source_crate`.
    ///
    /// A root is looked up among the module's imports, then its declared
    /// items. Unknown multi-segment roots are taken to be external crates;
    /// unknown single names fall back to the module's glob imports.
    pub fn resolve<'a>(
        &self,
        type_texts: impl IntoIterator<Item = &'a str>,
        source_crate: Option<&str>,
    ) -> ImportPlan {
        let roots: BTreeSet<TypeRoot> = type_texts.into_iter().flat_map(type_roots).collect();

        let mut imports = BTreeSet::new();
        let mut unresolved = BTreeSet::new();
        let mut needs_crate_name = BTreeSet::new();

        for root in roots {
            if IN_SCOPE.contains(&root.name.as_str()) {
                continue;
            }
            if is_path_keyword(&root.name) {
                // Rewritten in place by `qualify_type`
                if source_crate.is_none() {
                    needs_crate_name.insert(root.name);
                }
                continue;
            }

            let found = self.lookup(&root);
            if found.is_empty() {
                if !root.qualified {
                    unresolved.insert(root.name);
                }
                continue;
            }
            for import in found {
                match import.render(source_crate) {
                    Some(path) => {
                        imports.insert(path);
                    }
                    None => {
                        needs_crate_name.insert(root.name.clone());
                    }
                }
            }
        }

        ImportPlan {
            imports: imports.into_iter().collect(),
            unresolved: unresolved.into_iter().collect(),
            needs_crate_name: needs_crate_name.into_iter().collect(),
        }
    }

    /// Rewrite `crate::`, `self::` and `super::` paths inside a type so they
    /// resolve from the test crate. Without a crate name the text is returned
    /// unchanged.
    pub fn qualify_type(&self, type_text: &str, source_crate: Option<&str>) -> String {
        let Some(krate) = source_crate else {
            return type_text.to_string();
        };
        let Ok(mut ty) = syn::parse_str::<syn::Type>(type_text) else {
            return type_text.to_string();
        };
        let mut rewriter = PathRewriter {
            scope: self,
            krate,
            changed: false,
        };
        rewriter.visit_type_mut(&mut ty);
        if rewriter.changed {
            normalize_type_text(&ty.to_token_stream().to_string())
        } else {
            type_text.to_string()
        }
    }

    fn lookup(&self, root: &TypeRoot) -> Vec<Import> {
        let bound: Vec<Import> = self
            .imports
            .iter()
            .filter(|import| import.binding() == Some(root.name.as_str()))
            .filter_map(|import| self.absolute(import))
            .collect();
        if !bound.is_empty() {
            return bound;
        }

        if self.items.contains(&root.name) {
            let mut segments = vec!["crate".to_string()];
            segments.extend(self.module_segments());
            segments.push(root.name.clone());
            return vec![Import {
                segments,
                alias: None,
                glob: false,
            }];
        }

        if root.qualified {
            return Vec::new();
        }
        self.imports
            .iter()
            .filter(|import| import.glob)
            .filter_map(|import| self.absolute(import))
            .collect()
    }

    fn absolute(&self, import: &Import) -> Option<Import> {
        Some(Import {
            segments: self.absolute_path(&import.segments)?,
            ..import.clone()
        })
    }

    /// Make a path that starts at `self`, `super` or a local item start at
    /// `crate`. External paths come back unchanged.
    fn absolute_path(&self, segments: &[String]) -> Option<Vec<String>> {
        let first = segments.first()?;
        let module = self.module_segments();
        let resolved = match first.as_str() {
            "crate" | "" => segments.to_vec(),
            "self" => crate_path(&module, &segments[1..]),
            "super" => {
                let depth = segments.iter().take_while(|s| s.as_str() == "super").count();
                let parent = module.len().checked_sub(depth)?;
                crate_path(&module[..parent], &segments[depth..])
            }
            name if self.items.contains(name) => crate_path(&module, segments),
            _ => segments.to_vec(),
        };
        Some(resolved)
    }

    fn module_segments(&self) -> Vec<String> {
        self.module_path
            .split("::")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn crate_path(module: &[String], rest: &[String]) -> Vec<String> {
    let mut segments = Vec::with_capacity(module.len() + rest.len() + 1);
    segments.push("crate".to_string());
    segments.extend_from_slice(module);
    segments.extend_from_slice(rest);
    segments
}

fn is_path_keyword(name: &str) -> bool {
    matches!(name, "crate" | "self" | "super")
}

fn flatten(tree: &UseTree, prefix: &mut Vec<String>, out: &mut Vec<Import>) {
    match tree {
        UseTree::Path(path) => {
            prefix.push(path.ident.to_string());
            flatten(&path.tree, prefix, out);
            prefix.pop();
        }
        UseTree::Name(name) => out.push(leaf(prefix, &name.ident, None)),
        UseTree::Rename(rename) => {
            out.push(leaf(prefix, &rename.ident, Some(rename.rename.to_string())))
        }
        UseTree::Glob(_) => out.push(Import {
            segments: prefix.clone(),
            alias: None,
            glob: true,
        }),
        UseTree::Group(group) => {
            for item in &group.items {
                flatten(item, prefix, out);
            }
        }
    }
}

fn leaf(prefix: &[String], ident: &Ident, alias: Option<String>) -> Import {
    let mut segments = prefix.to_vec();
    // `use a::b::{self}` binds `b`
    if ident != "self" {
        segments.push(ident.to_string());
    }
    Import {
        segments,
        alias,
        glob: false,
    }
}

/// First segments of every path in a type, generic arguments included
fn type_roots(type_text: &str) -> Vec<TypeRoot> {
    let Ok(ty) = syn::parse_str::<syn::Type>(type_text) else {
        log::debug!("Cannot parse type `{type_text}` for import resolution");
        return Vec::new();
    };
    let mut collector = RootCollector::default();
    collector.visit_type(&ty);
    collector.roots
}

#[derive(Default)]
struct RootCollector {
    roots: Vec<TypeRoot>,
}

impl<'ast> Visit<'ast> for RootCollector {
    fn visit_type_path(&mut self, node: &'ast TypePath) {
        if node.qself.is_none() && node.path.leading_colon.is_none() {
            if let Some(first) = node.path.segments.first() {
                self.roots.push(TypeRoot {
                    name: first.ident.to_string(),
                    qualified: node.path.segments.len() > 1,
                });
            }
        }
        visit::visit_type_path(self, node);
    }
}

struct PathRewriter<'a> {
    scope: &'a ModuleScope,
    krate: &'a str,
    changed: bool,
}

impl VisitMut for PathRewriter<'_> {
    fn visit_type_path_mut(&mut self, node: &mut TypePath) {
        visit_mut::visit_type_path_mut(self, node);
        if node.qself.is_some() || node.path.leading_colon.is_some() {
            return;
        }

        let keywords = node
            .path
            .segments
            .iter()
            .take_while(|s| is_path_keyword(&s.ident.to_string()))
            .count();
        if keywords == 0 {
            return;
        }
        let names: Vec<String> = node.path.segments.iter().map(|s| s.ident.to_string()).collect();
        let Some(absolute) = self.scope.absolute_path(&names) else {
            return;
        };

        // `absolute` is `crate`, the resolved module, then the untouched rest
        let rest = names.len() - keywords;
        let mut segments = Punctuated::<PathSegment, syn::Token![::]>::new();
        for (i, name) in absolute[..absolute.len() - rest].iter().enumerate() {
            let name = if i == 0 { self.krate } else { name.as_str() };
            let Ok(ident) = syn::parse_str::<Ident>(name) else {
                return;
            };
            segments.push(PathSegment::from(ident));
        }
        for segment in node.path.segments.iter().skip(keywords) {
            segments.push(segment.clone());
        }
        node.path.segments = segments;
        self.changed = true;
    }
}
