//! Declaration scanning.
//!
//! A [`SourceUnit`] is one Rust file together with the module path it is
//! compiled under. [`DeclarationScanner`] parses a unit with `syn`, finds the
//! types carrying the generation marker and turns the methods of their
//! inherent impl blocks into [`ScenarioGroup`]s via the
//! [`MetadataExtractor`].
//!
//! The marker may sit on an inherent `impl` block or on the `struct`/`enum`
//! declaration itself; in the latter case every inherent impl of that type in
//! the same unit contributes. All impl blocks of one type merge into a single
//! [`TestedType`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use apitestgen_core::diagnostics::LogDiagnostics;
//! use apitestgen_core::scan::{DeclarationScanner, SourceUnit};
//!
//! let source = r#"
//!     #[generate_api_test]
//!     #[route("/clients")]
//!     impl ClientController {
//!         #[get("/{id}")]
//!         #[api_test_spec(case(expected_status_code = 200))]
//!         fn find_by_id(&self, #[path] id: i64) {}
//!     }
//! "#;
//! let unit = SourceUnit::new("src/api.rs", "api", source);
//! let scanner = DeclarationScanner::new(Arc::new(LogDiagnostics));
//! let types = scanner.scan_source(&unit).unwrap();
//! assert_eq!(types[0].generated_name, "ClientControllerGeneratedTest");
//! assert_eq!(types[0].case_count(), 1);
//! ```

// Internal imports (std, crate)
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::extract::{MetadataExtractor, MARKER_TAG, ROUTING_TAGS, SCENARIO_TAG, TYPE_TAGS};
use crate::imports::ModuleScope;
use crate::model::{ScenarioGroup, TestedType};
use crate::tags::Tag;
use crate::utils::join_module_path;

// External imports (alphabetized)
use futures::future::join_all;
use syn::visit::{self, Visit};
use syn::{ImplItemFn, ItemImpl, ReturnType, Type};
use tokio::task;
use walkdir::WalkDir;

/// One Rust source file and the module path it is compiled under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub module_path: String,
    pub source: String,
}

impl SourceUnit {
    pub fn new(
        path: impl Into<PathBuf>,
        module_path: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            module_path: module_path.into(),
            source: source.into(),
        }
    }
}

/// Module path of `path` relative to `root`.
///
/// A leading `src` directory is dropped, `mod.rs` maps to its directory and
/// `lib.rs`/`main.rs` map to the crate root.
pub fn module_path_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.first().is_some_and(|s| s == "src") && segments.len() > 1 {
        segments.remove(0);
    }
    if let Some(file) = segments.pop() {
        let stem = file.strip_suffix(".rs").unwrap_or(&file).to_string();
        if !matches!(stem.as_str(), "mod" | "lib" | "main") {
            segments.push(stem);
        }
    }
    segments.join("::")
}

/// Find every `*.rs` file below `roots` and read it into a [`SourceUnit`].
///
/// Hidden directories and `target` are skipped. Units come back sorted by
/// path so repeated runs see the same order.
pub async fn discover_units(roots: &[PathBuf]) -> Result<Vec<SourceUnit>> {
    let roots = roots.to_vec();
    let files = task::spawn_blocking(move || -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut files = Vec::new();
        for root in &roots {
            if !root.is_dir() {
                return Err(Error::config(format!(
                    "Source directory not found: {}",
                    root.display()
                )));
            }
            let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                entry.depth() == 0 || !(name.starts_with('.') || name == "target")
            });
            for entry in walker {
                let entry = entry.map_err(|e| Error::Io(io::Error::other(e)))?;
                let path = entry.path();
                if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "rs") {
                    files.push((root.clone(), path.to_path_buf()));
                }
            }
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    })
    .await
    .map_err(|e| io::Error::other(format!("Failed to join blocking task: {e}")))??;

    let mut units = Vec::with_capacity(files.len());
    for (root, path) in files {
        let source = tokio::fs::read_to_string(&path).await?;
        let module_path = module_path_for(&root, &path);
        log::debug!("Discovered {} as `{}`", path.display(), module_path);
        units.push(SourceUnit::new(path, module_path, source));
    }
    Ok(units)
}

/// Accumulates tested types from concurrently scanned units
#[derive(Debug, Default)]
pub struct TestedTypeRegistry {
    types: Mutex<Vec<TestedType>>,
}

impl TestedTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TestedType>> {
        self.types.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one unit's types, keeping their order
    pub fn extend(&self, types: impl IntoIterator<Item = TestedType>) {
        self.lock().extend(types);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<TestedType> {
        self.lock().clone()
    }

    pub fn into_inner(self) -> Vec<TestedType> {
        self.types.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tags found on a type, gathered across its declaration and impl blocks
struct TypeEntry<'ast> {
    module_path: String,
    name: String,
    declared_tags: Vec<Tag>,
    impls: Vec<(&'ast ItemImpl, Vec<Tag>)>,
}

impl TypeEntry<'_> {
    /// Declaration tags first, then each impl's in source order
    fn tags(&self) -> Vec<Tag> {
        let mut tags = self.declared_tags.clone();
        for (_, impl_tags) in &self.impls {
            tags.extend(impl_tags.iter().cloned());
        }
        tags
    }
}

/// Collects every type declaration and inherent impl of a file, tracking
/// inline modules and the names each module has in scope
struct TypeCollector<'a, 'ast> {
    extractor: &'a MetadataExtractor,
    module_stack: Vec<String>,
    base_module: &'a str,
    entries: Vec<TypeEntry<'ast>>,
    index: HashMap<(String, String), usize>,
    scopes: HashMap<String, ModuleScope>,
}

impl<'a, 'ast> TypeCollector<'a, 'ast> {
    fn new(extractor: &'a MetadataExtractor, base_module: &'a str) -> Self {
        Self {
            extractor,
            module_stack: Vec::new(),
            base_module,
            entries: Vec::new(),
            index: HashMap::new(),
            scopes: HashMap::new(),
        }
    }

    fn scope_mut(&mut self) -> &mut ModuleScope {
        let module_path = self.current_module();
        self.scopes
            .entry(module_path.clone())
            .or_insert_with(|| ModuleScope::new(module_path))
    }

    fn scope_of(&self, module_path: &str) -> ModuleScope {
        self.scopes
            .get(module_path)
            .cloned()
            .unwrap_or_else(|| ModuleScope::new(module_path))
    }

    fn current_module(&self) -> String {
        join_module_path(self.base_module, &self.module_stack.join("::"))
    }

    fn entry(&mut self, name: String) -> &mut TypeEntry<'ast> {
        let module_path = self.current_module();
        let key = (module_path.clone(), name.clone());
        let position = *self.index.entry(key).or_insert_with(|| {
            self.entries.push(TypeEntry {
                module_path,
                name,
                declared_tags: Vec::new(),
                impls: Vec::new(),
            });
            self.entries.len() - 1
        });
        &mut self.entries[position]
    }

    fn declare(&mut self, name: String, attrs: &[syn::Attribute]) {
        self.scope_mut().declare(name.clone());
        let tags = self.extractor.read_tags(attrs, TYPE_TAGS);
        self.entry(name).declared_tags.extend(tags);
    }
}

impl<'ast> Visit<'ast> for TypeCollector<'_, 'ast> {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.scope_mut().declare(node.ident.to_string());
        if node.content.is_none() {
            return;
        }
        self.module_stack.push(node.ident.to_string());
        visit::visit_item_mod(self, node);
        self.module_stack.pop();
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        self.declare(node.ident.to_string(), &node.attrs);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        self.declare(node.ident.to_string(), &node.attrs);
    }

    fn visit_item_union(&mut self, node: &'ast syn::ItemUnion) {
        self.scope_mut().declare(node.ident.to_string());
    }

    fn visit_item_type(&mut self, node: &'ast syn::ItemType) {
        self.scope_mut().declare(node.ident.to_string());
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.scope_mut().add_use(node);
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        if node.trait_.is_some() {
            return;
        }
        let Some(name) = self_type_name(&node.self_ty) else {
            log::debug!("Skipping impl block without a nameable self type");
            return;
        };
        let tags = self.extractor.read_tags(&node.attrs, TYPE_TAGS);
        self.entry(name).impls.push((node, tags));
    }

    // Items inside function bodies are never tested types.
    fn visit_item_fn(&mut self, _node: &'ast syn::ItemFn) {}
}

/// Turns source units into tested types
#[derive(Clone)]
pub struct DeclarationScanner {
    diagnostics: Arc<dyn Diagnostics>,
}

impl DeclarationScanner {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Scan one unit and return its tested types in declaration order.
    ///
    /// A parse failure or any fatal extraction error aborts the whole unit.
    pub fn scan_source(&self, unit: &SourceUnit) -> Result<Vec<TestedType>> {
        let file =
            syn::parse_file(&unit.source).map_err(|e| Error::parse(unit.path.clone(), e))?;
        let extractor = MetadataExtractor::new(self.diagnostics.clone()).in_file(&unit.path);

        let mut collector = TypeCollector::new(&extractor, &unit.module_path);
        collector.visit_file(&file);

        let mut tested_types = Vec::new();
        for entry in &collector.entries {
            let tags = entry.tags();
            if !tags.iter().any(|t| t.name == MARKER_TAG) {
                continue;
            }
            let mut tested = extractor.create_tested_type(&entry.name, &entry.module_path, &tags);
            tested.scope = collector.scope_of(&entry.module_path);

            for (item_impl, _) in &entry.impls {
                for item in &item_impl.items {
                    let syn::ImplItem::Fn(method) = item else {
                        continue;
                    };
                    if is_constructor(method, &entry.name) {
                        log::debug!("Skipping constructor {}::{}", entry.name, method.sig.ident);
                        continue;
                    }
                    let group = self.scenario_group(&extractor, method)?;
                    let method_name = group.method_name.clone();
                    if tested.insert_scenario(group).is_some() {
                        extractor.warn(
                            format!(
                                "`{}` declares `{method_name}` more than once; keeping the last one",
                                entry.name
                            ),
                            method.sig.ident.span().start().line,
                        );
                    }
                }
            }

            if entry.impls.is_empty() {
                log::debug!("{} is marked but has no impl block in this unit", entry.name);
            }
            tested_types.push(tested);
        }

        log::debug!(
            "Scanned {}: {} tested type(s)",
            unit.path.display(),
            tested_types.len()
        );
        Ok(tested_types)
    }

    /// Scan one unit and append its tested types to `registry`
    pub fn scan_unit(&self, unit: &SourceUnit, registry: &TestedTypeRegistry) -> Result<usize> {
        let types = self.scan_source(unit)?;
        let count = types.len();
        registry.extend(types);
        Ok(count)
    }

    fn scenario_group(
        &self,
        extractor: &MetadataExtractor,
        method: &ImplItemFn,
    ) -> Result<ScenarioGroup> {
        let name = method.sig.ident.to_string();
        let method_tags: Vec<&str> = ROUTING_TAGS
            .iter()
            .copied()
            .chain(std::iter::once(SCENARIO_TAG))
            .collect();
        let tags = extractor.read_tags(&method.attrs, &method_tags);

        let (verb, path) = extractor.extract_route(&tags);
        let mut group = ScenarioGroup::new(&name);
        group.verb = verb;
        group.path = path;

        let params = Arc::new(extractor.process_parameters(&method.sig, verb));
        for spec in tags.iter().filter(|t| t.name == SCENARIO_TAG) {
            for mut case in extractor.extract_cases(&name, spec)? {
                case.parameters = Some(Arc::clone(&params));
                group.cases.push(case);
            }
        }
        Ok(group)
    }
}

/// Units that could not be scanned, with the reason
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub registry: Arc<TestedTypeRegistry>,
    pub failures: Vec<(PathBuf, Error)>,
}

/// Scan all units concurrently on the blocking pool.
///
/// Every unit appends to one shared registry; a failing unit is recorded in
/// [`ScanOutcome::failures`] and reported at error severity without stopping
/// the others.
pub async fn scan_units(units: Vec<SourceUnit>, diagnostics: Arc<dyn Diagnostics>) -> ScanOutcome {
    let registry = Arc::new(TestedTypeRegistry::new());
    let scanner = DeclarationScanner::new(diagnostics.clone());

    let tasks = units.into_iter().map(|unit| {
        let scanner = scanner.clone();
        let registry = Arc::clone(&registry);
        async move {
            let path = unit.path.clone();
            let result = task::spawn_blocking(move || scanner.scan_unit(&unit, &registry))
                .await
                .unwrap_or_else(|e| {
                    Err(io::Error::other(format!("Failed to join blocking task: {e}")).into())
                });
            (path, result)
        }
    });

    let mut failures = Vec::new();
    for (path, result) in join_all(tasks).await {
        if let Err(e) = result {
            diagnostics.error(format!("{}: {e}", path.display()), None);
            failures.push((path, e));
        }
    }

    ScanOutcome { registry, failures }
}

/// Name of an impl's self type: the last path segment, generics dropped
fn self_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) if path.qself.is_none() => {
            path.path.segments.last().map(|s| s.ident.to_string())
        }
        Type::Group(group) => self_type_name(&group.elem),
        Type::Paren(paren) => self_type_name(&paren.elem),
        _ => None,
    }
}

/// An associated function without receiver that returns `Self` or the type
fn is_constructor(method: &ImplItemFn, type_name: &str) -> bool {
    if method.sig.receiver().is_some() {
        return false;
    }
    match &method.sig.output {
        ReturnType::Type(_, ty) => {
            self_type_name(ty).is_some_and(|name| name == "Self" || name == type_name)
        }
        ReturnType::Default => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnostics, Severity};
    use crate::model::HttpVerb;
    use tempfile::tempdir;

    fn scanner() -> (DeclarationScanner, Arc<CollectingDiagnostics>) {
        let sink = Arc::new(CollectingDiagnostics::default());
        (DeclarationScanner::new(sink.clone()), sink)
    }

    fn scan(source: &str) -> (Vec<TestedType>, Arc<CollectingDiagnostics>) {
        let (scanner, sink) = scanner();
        let unit = SourceUnit::new("src/controllers/client.rs", "controllers::client", source);
        (scanner.scan_source(&unit).unwrap(), sink)
    }

    #[test]
    fn test_module_path_for() {
        let root = Path::new("/work/app");
        assert_eq!(
            module_path_for(root, Path::new("/work/app/src/controllers/client.rs")),
            "controllers::client"
        );
        assert_eq!(module_path_for(root, Path::new("/work/app/src/api/mod.rs")), "api");
        assert_eq!(module_path_for(root, Path::new("/work/app/src/lib.rs")), "");
        assert_eq!(module_path_for(root, Path::new("/work/app/src/main.rs")), "");
        assert_eq!(
            module_path_for(Path::new("/work/app/src"), Path::new("/work/app/src/orders.rs")),
            "orders"
        );
    }

    #[test]
    fn test_marker_on_impl() {
        let (types, sink) = scan(
            r#"
            pub struct ClientController;

            #[generate_api_test]
            #[route("/clients")]
            impl ClientController {
                pub fn new() -> Self { ClientController }

                #[get("/{id}")]
                #[api_test_spec(case(expected_status_code = 200), case(expected_status_code = 404))]
                pub async fn find_by_id(&self, #[path] id: i64) -> String { todo!() }

                #[delete("/{id}")]
                pub async fn remove(&self, #[path] id: i64) {}
            }
            "#,
        );

        assert_eq!(types.len(), 1);
        let tested = &types[0];
        assert_eq!(tested.generated_name, "ClientControllerGeneratedTest");
        assert_eq!(tested.package, "controllers::client");
        assert_eq!(tested.base_path, "/clients");
        assert_eq!(tested.source_file, PathBuf::from("src/controllers/client.rs"));

        let names: Vec<_> = tested.scenarios().iter().map(|g| g.method_name.as_str()).collect();
        assert_eq!(names, vec!["find_by_id", "remove"]);

        let find = tested.scenario("find_by_id").unwrap();
        assert_eq!(find.verb, Some(HttpVerb::Get));
        assert_eq!(find.path, "/{id}");
        assert_eq!(find.cases.len(), 2);
        assert!(find.cases[0].parameters().path.contains("id"));
        assert!(tested.scenario("remove").unwrap().cases.is_empty());
        assert_eq!(sink.count(Severity::Warning), 0);
    }

    #[test]
    fn test_cases_of_one_method_share_parameters() {
        let (types, _) = scan(
            r#"
            #[generate_api_test]
            impl Orders {
                #[post("/orders")]
                #[api_test_spec(case(status = 201), case(status = 400))]
                fn create(&self, order: Json<NewOrder>) {}
            }
            "#,
        );
        let cases = &types[0].scenario("create").unwrap().cases;
        let first = cases[0].parameters.as_ref().unwrap();
        let second = cases[1].parameters.as_ref().unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(first.body.get("order"), Some("Json<NewOrder>"));
    }

    #[test]
    fn test_marker_on_struct_merges_impls() {
        let (types, _) = scan(
            r#"
            #[generate_api_test(auth_url = "/auth", username = "u", password = "p")]
            #[route("/items")]
            pub struct ItemController;

            impl ItemController {
                #[get("")]
                #[api_test_spec(case(status = 200))]
                fn list(&self) {}
            }

            impl ItemController {
                #[put("/{id}")]
                #[api_test_spec(case(status = 204))]
                fn update(&self, #[path] id: u32, item: Item) {}
            }

            impl Display for ItemController {
                fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { Ok(()) }
            }

            struct Untagged;
            impl Untagged {
                #[get("/x")]
                fn x(&self) {}
            }
            "#,
        );

        assert_eq!(types.len(), 1);
        let tested = &types[0];
        assert_eq!(tested.base_path, "/items");
        assert_eq!(tested.auth.as_ref().unwrap().token_field, "token");
        let names: Vec<_> = tested.scenarios().iter().map(|g| g.method_name.as_str()).collect();
        assert_eq!(names, vec!["list", "update"]);
    }

    #[test]
    fn test_inline_modules_extend_package() {
        let (types, _) = scan(
            r#"
            mod admin {
                #[generate_api_test]
                impl Users {
                    #[get("/users")]
                    fn list(&self) {}
                }
            }
            "#,
        );
        assert_eq!(types[0].package, "controllers::client::admin");
    }

    #[test]
    fn test_duplicate_method_is_replaced_with_warning() {
        let (types, sink) = scan(
            r#"
            #[generate_api_test]
            impl A {
                #[get("/one")]
                fn ping(&self) {}
            }

            impl A {
                #[get("/two")]
                fn ping(&self) {}
            }
            "#,
        );
        let tested = &types[0];
        assert_eq!(tested.scenarios().len(), 1);
        assert_eq!(tested.scenario("ping").unwrap().path, "/two");
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn test_unit_parse_failure_is_fatal() {
        let (scanner, _) = scanner();
        let unit = SourceUnit::new("src/broken.rs", "broken", "impl {");
        assert!(matches!(
            scanner.scan_source(&unit),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_matcher_error_aborts_unit() {
        let (scanner, _) = scanner();
        let unit = SourceUnit::new(
            "src/a.rs",
            "a",
            r#"
            #[generate_api_test]
            impl A {
                #[api_test_spec(case(json_paths(json_path(path = "$.n", matcher = CUSTOM_CLASS, matcher_ref = "not a path"))))]
                fn f(&self) {}
            }
            "#,
        );
        let registry = TestedTypeRegistry::new();
        assert!(scanner.scan_unit(&unit, &registry).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_constructor_detection() {
        let (types, _) = scan(
            r#"
            #[generate_api_test]
            impl Svc {
                fn new(repo: Repo) -> Svc { todo!() }
                fn with_defaults() -> Self { todo!() }
                fn helper() -> String { String::new() }
            }
            "#,
        );
        let names: Vec<_> = types[0].scenarios().iter().map(|g| g.method_name.as_str()).collect();
        assert_eq!(names, vec!["helper"]);
    }

    #[tokio::test]
    async fn test_discover_and_scan_concurrently() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        tokio::fs::create_dir_all(src.join("api")).await?;
        tokio::fs::create_dir_all(src.join(".hidden")).await?;
        tokio::fs::write(
            src.join("api").join("mod.rs"),
            "#[generate_api_test] impl A { #[get(\"/a\")] fn a(&self) {} }",
        )
        .await?;
        tokio::fs::write(
            src.join("b.rs"),
            "#[generate_api_test] impl B { #[get(\"/b\")] fn b(&self) {} }",
        )
        .await?;
        tokio::fs::write(src.join("broken.rs"), "fn {").await?;
        tokio::fs::write(src.join(".hidden").join("c.rs"), "fn c() {}").await?;
        tokio::fs::write(src.join("notes.txt"), "not rust").await?;

        let units = discover_units(&[dir.path().to_path_buf()]).await?;
        let modules: Vec<_> = units.iter().map(|u| u.module_path.as_str()).collect();
        assert_eq!(modules, vec!["api", "b", "broken"]);

        let sink = Arc::new(CollectingDiagnostics::default());
        let outcome = scan_units(units, sink.clone()).await;
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].0.ends_with("broken.rs"));
        assert_eq!(outcome.registry.len(), 2);
        assert_eq!(sink.count(Severity::Error), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_missing_root() {
        let result = discover_units(&[PathBuf::from("/definitely/not/here")]).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
