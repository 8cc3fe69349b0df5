//! End-to-end tests: tagged sources in, generated test files out

// Internal imports (std, crate)
use std::path::Path;
use std::sync::Arc;

// External imports (alphabetized)
use apitestgen_core::diagnostics::{CollectingDiagnostics, Severity};
use apitestgen_core::synthesis::DuplicateNamePolicy;
use apitestgen_core::{generate, Config, Result};
use tempfile::tempdir;

const ORDERS: &str = r#"
use axum::extract::{Json, Path};

#[generate_api_test(auth_url = "/auth/login", username = "admin", password = "secret", token_field = "access_token")]
#[route("/api/orders")]
pub struct OrderController {
    repo: OrderRepository,
}

impl OrderController {
    pub fn new(repo: OrderRepository) -> Self {
        Self { repo }
    }

    #[get("/{id}")]
    #[api_test_spec(
        case(
            expected_status_code = 200,
            requires_auth = true,
            data_provider = "order_data",
            expected_headers(header(name = "Content-Type", value = "application/json")),
            json_paths(
                json_path(path = "$.id", matcher = NOT_NULL_VALUE),
                json_path(path = "$.total", matcher = GREATER_THAN, value = "10")
            ),
            spec_descriptor(epic = "Orders", story = "Read", severity = CRITICAL)
        ),
        case(expected_status_code = 404, repeat = 2)
    )]
    pub async fn find(&self, #[path] id: u64, #[header("X-Tenant")] tenant: String) -> Json<Order> {
        todo!()
    }

    #[get("/search")]
    #[api_test_spec(case(expected_status_code = 200, enable_logging = true, response_timeout_seconds = 5))]
    pub async fn search(&self, #[query] status: String, #[query] page: u32) -> Json<Vec<Order>> {
        todo!()
    }

    #[put("/{id}/attachment")]
    #[api_test_spec(case(expected_status_code = 204, timeout = 3, order = 1))]
    pub async fn attach(&self, #[path] id: u64, #[file] file: Bytes) {}
}
"#;

const DUPLICATES: &str = r#"
#[generate_api_test]
impl Health {
    #[get("/health")]
    #[api_test_spec(case(status = 200), case(status = 200, display_name = "again"))]
    fn check(&self) {}
}
"#;

const CLIENTS: &str = r#"
use crate::dto::ClientDto;
use axum::extract::{Json, Multipart};

pub struct Address {
    pub city: String,
}

#[generate_api_test]
#[route("/clients")]
impl ClientController {
    #[post("")]
    #[api_test_spec(case(status = 201))]
    pub async fn create(&self, client: Json<ClientDto>) {}

    #[put("/{id}/address")]
    #[api_test_spec(case(status = 200))]
    pub async fn relocate(&self, #[path] id: u64, address: Json<Address>) {}

    #[post("/import")]
    #[api_test_spec(case(status = 202))]
    pub async fn upload(&self, mut multipart: Multipart) {}
}
"#;

async fn write_source(root: &Path, relative: &str, content: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}

#[tokio::test]
async fn generates_a_compilable_looking_test_file() -> Result<()> {
    let dir = tempdir()?;
    write_source(dir.path(), "src/api/orders.rs", ORDERS).await?;

    let config = Config::new([dir.path().join("src")], dir.path().join("tests/generated"));
    let sink = Arc::new(CollectingDiagnostics::default());
    let report = generate(&config, sink.clone()).await?;

    assert!(report.is_success());
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.tests, 4);
    assert_eq!(sink.count(Severity::Warning), 0, "{:?}", sink.messages(Severity::Warning));

    let path = dir
        .path()
        .join("tests/generated/order_controller_generated_test.rs");
    let content = tokio::fs::read_to_string(&path).await?;

    // The whole file must at least be valid Rust syntax.
    syn::parse_file(&content).expect("generated file parses");

    assert!(content.contains("//! Tests for `api::orders::OrderController`"));
    assert!(content.contains(".json_path(\"$.access_token\")"));
    assert!(content.contains("fn build_multipart_data"));
    assert!(content.contains("fn log_request"));

    assert!(content.contains(
        "/// Epic: Orders\n/// Story: Read\n/// Severity: CRITICAL\n#[test]\nfn find_200() {"
    ));
    assert!(content.contains(".uri(format!(\"/api/orders/{}\", safe_string(data.get(\"id\"))))"));
    assert!(content.contains(".header(\"X-Tenant\", safe_string(data.get(\"X-Tenant\")))"));
    assert!(content.contains(".expect_header()\n        .value_equals(\"Content-Type\", &[\"application/json\"])"));
    assert!(content.contains(".json_path(\"$.total\")\n        .value(greater_than(10))"));

    assert!(content.contains("#[web_test_client::repeat(2)]\nfn find_404() {"));
    assert!(content.contains(
        "format!(\"/api/orders/search?status={}&page={}\", safe_string(data.get(\"status\")), safe_string(data.get(\"page\")))"
    ));
    assert!(content.contains(".response_timeout(Duration::from_secs(5))"));
    assert!(content.contains(
        "#[test]\n#[web_test_client::timeout(3)]\n#[web_test_client::order(1)]\nfn attach_204() {"
    ));
    assert!(content.contains(".content_type(MediaType::MULTIPART_FORM_DATA)"));
    Ok(())
}

#[tokio::test]
async fn duplicate_test_names_follow_the_policy() -> Result<()> {
    let dir = tempdir()?;
    write_source(dir.path(), "src/health.rs", DUPLICATES).await?;

    let mut config = Config::new([dir.path().join("src")], dir.path().join("out"));
    let sink = Arc::new(CollectingDiagnostics::default());
    let report = generate(&config, sink.clone()).await?;
    assert!(report.is_success());
    let content = tokio::fs::read_to_string(&report.written[0]).await?;
    assert!(content.contains("fn check_200() {"));
    assert!(content.contains("fn check_200_2() {"));
    assert_eq!(sink.count(Severity::Warning), 1);

    config.duplicate_names = DuplicateNamePolicy::Error;
    config.output_dir = dir.path().join("strict");
    let sink = Arc::new(CollectingDiagnostics::default());
    let report = generate(&config, sink.clone()).await?;
    assert!(!report.is_success());
    assert!(report.written.is_empty());
    assert_eq!(sink.count(Severity::Error), 1);
    Ok(())
}

#[tokio::test]
async fn body_types_are_imported_from_the_crate_under_test() -> Result<()> {
    let dir = tempdir()?;
    write_source(dir.path(), "Cargo.toml", "[package]\nname = \"shop\"\n").await?;
    write_source(dir.path(), "src/api/clients.rs", CLIENTS).await?;

    let config = Config::new([dir.path().join("src")], dir.path().join("out"));
    let sink = Arc::new(CollectingDiagnostics::default());
    let report = generate(&config, sink.clone()).await?;
    assert!(report.is_success());
    assert_eq!(sink.count(Severity::Warning), 0, "{:?}", sink.messages(Severity::Warning));

    let content = tokio::fs::read_to_string(&report.written[0]).await?;
    syn::parse_file(&content).expect("generated file parses");
    assert!(content.contains(
        "use web_test_client::prelude::*;\nuse shop::api::clients::Address;\nuse shop::dto::ClientDto;\n"
    ));
    assert!(content.contains("let client_value: ClientDto = from_data(&data, \"client\")"));
    assert!(content.contains("let address: Address = from_data(&data, \"address\")"));
    // Only payload types are imported
    assert!(!content.contains("use axum"));
    Ok(())
}

#[tokio::test]
async fn upload_extractors_are_sent_as_multipart() -> Result<()> {
    let dir = tempdir()?;
    write_source(dir.path(), "src/api/clients.rs", CLIENTS).await?;

    let mut config = Config::new([dir.path().join("src")], dir.path().join("out"));
    config.source_crate = Some("shop".to_string());
    let report = generate(&config, Arc::new(CollectingDiagnostics::default())).await?;

    let content = tokio::fs::read_to_string(&report.written[0]).await?;
    let upload = content
        .split("fn upload_202() {")
        .nth(1)
        .expect("upload test generated");
    let upload = upload.split("\n}\n").next().unwrap_or_default();
    assert!(upload.contains(".content_type(MediaType::MULTIPART_FORM_DATA)"));
    assert!(upload.contains("build_multipart_data"));
    assert!(!upload.contains("from_data"));
    Ok(())
}

#[tokio::test]
async fn crate_local_body_types_need_a_crate_name() -> Result<()> {
    let dir = tempdir()?;
    write_source(dir.path(), "src/api/clients.rs", CLIENTS).await?;

    let config = Config::new([dir.path().join("src")], dir.path().join("out"));
    let sink = Arc::new(CollectingDiagnostics::default());
    let report = generate(&config, sink.clone()).await?;
    assert!(report.is_success());

    let warnings = sink.messages(Severity::Warning);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("Address, ClientDto"));
    assert!(warnings[0].contains("set `source_crate`"));
    let content = tokio::fs::read_to_string(&report.written[0]).await?;
    assert!(!content.contains("use shop"));
    Ok(())
}
