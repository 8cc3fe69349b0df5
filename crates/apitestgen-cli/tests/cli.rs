//! End-to-end tests driving the apitestgen binary

// Internal imports (std, crate)
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

// External imports (alphabetized)
use anyhow::Result;
use tempfile::tempdir;

const CONTROLLER: &str = r#"
use crate::model::ClientDto;

#[generate_api_test]
#[route("/clients")]
impl ClientController {
    pub fn new() -> Self {
        ClientController
    }

    #[get("/{id}")]
    #[api_test_spec(
        case(expected_status_code = 200, json_paths(json_path(path = "$.name", matcher = EQUAL_TO, value = "John Doe"))),
        case(expected_status_code = 404, display_name = "unknown client")
    )]
    pub async fn find_by_id(&self, #[path] id: i64) -> Json<ClientDto> {
        todo!()
    }

    #[post("")]
    #[api_test_spec(case(status = 201, data_provider = "new_client", requires_auth = true))]
    pub async fn create(&self, client: Json<ClientDto>) {}
}
"#;

fn apitestgen(dir: &Path, args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_apitestgen"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .output()?)
}

fn write_controller(dir: &Path) -> Result<()> {
    let controllers = dir.join("src").join("controllers");
    fs::create_dir_all(&controllers)?;
    fs::write(controllers.join("client.rs"), CONTROLLER)?;
    fs::write(dir.join("Cargo.toml"), "[package]\nname = \"client-service\"\n")?;
    Ok(())
}

#[test]
fn init_writes_default_config_once() -> Result<()> {
    let dir = tempdir()?;

    let output = apitestgen(dir.path(), &["init"])?;
    assert!(output.status.success());
    let content = fs::read_to_string(dir.path().join("apitestgen.yaml"))?;
    assert!(content.contains("client_crate: web_test_client"));

    let output = apitestgen(dir.path(), &["init"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));

    let output = apitestgen(dir.path(), &["init", "--force"])?;
    assert!(output.status.success());
    Ok(())
}

#[test]
fn generate_writes_tests_for_tagged_controllers() -> Result<()> {
    let dir = tempdir()?;
    write_controller(dir.path())?;

    let output = apitestgen(
        dir.path(),
        &["generate", "--output-dir", "tests/api", "--base-url", "http://127.0.0.1:9000"],
    )?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Generated 3 test(s) for 1 type(s)"));

    let generated = fs::read_to_string(
        dir.path()
            .join("tests/api")
            .join("client_controller_generated_test.rs"),
    )?;
    assert!(generated.contains("//! Tests for `controllers::client::ClientController`"));
    assert!(generated.contains("const BASE_URL: &str = \"http://127.0.0.1:9000/\";"));
    assert!(generated.contains("fn find_by_id_200() {"));
    assert!(generated.contains(".value(equal_to(\"John Doe\"))"));
    assert!(generated.contains("#[web_test_client::display_name(\"unknown client\")]"));
    assert!(generated.contains("fn find_by_id_404() {"));
    assert!(generated.contains("fn create_201() {"));
    assert!(generated.contains("use client_service::model::ClientDto;"));
    assert!(generated.contains("let client_value: ClientDto = from_data(&data, \"client\")"));
    assert!(generated.contains("fn bearer_token() -> String {"));
    Ok(())
}

#[test]
fn generate_fails_when_a_unit_cannot_be_parsed() -> Result<()> {
    let dir = tempdir()?;
    write_controller(dir.path())?;
    fs::write(dir.path().join("src").join("broken.rs"), "impl {")?;

    let output = apitestgen(dir.path(), &["generate"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not be processed"));
    assert!(dir
        .path()
        .join("tests/generated/client_controller_generated_test.rs")
        .exists());
    Ok(())
}

#[test]
fn scan_prints_the_model() -> Result<()> {
    let dir = tempdir()?;
    write_controller(dir.path())?;

    let output = apitestgen(dir.path(), &["scan", "--format", "yaml"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("generated_name: ClientControllerGeneratedTest"));
    assert!(stdout.contains("base_path: /clients"));

    let output = apitestgen(dir.path(), &["scan", "--source-dir", "src"])?;
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["types"][0]["scenarios"][0]["method_name"], "find_by_id");
    assert_eq!(report["types"][0]["scenarios"][0]["verb"], "GET");
    Ok(())
}

#[test]
fn generate_honors_a_config_file() -> Result<()> {
    let dir = tempdir()?;
    write_controller(dir.path())?;
    fs::write(
        dir.path().join("custom.toml"),
        "source_dirs = [\"src\"]\noutput_dir = \"out\"\nclient_crate = \"my_client\"\n",
    )?;

    let output = apitestgen(dir.path(), &["generate", "--config", "custom.toml"])?;
    assert!(output.status.success());
    let generated = fs::read_to_string(dir.path().join("out/client_controller_generated_test.rs"))?;
    assert!(generated.contains("use my_client::prelude::*;"));

    let output = apitestgen(
        dir.path(),
        &["generate", "--config", "custom.toml", "--source-crate", "billing"],
    )?;
    assert!(output.status.success());
    let generated = fs::read_to_string(dir.path().join("out/client_controller_generated_test.rs"))?;
    assert!(generated.contains("use billing::model::ClientDto;"));
    Ok(())
}
