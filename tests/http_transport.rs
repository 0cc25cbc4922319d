use ltx2_manager::models::download::{partial_path, FetchOutcome, Fetcher, HttpTransport, Target, Transport};
use std::fs;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn transport(runtime: &Runtime) -> HttpTransport {
    HttpTransport::new(runtime.handle().clone())
        .expect("Failed to create transport")
        .without_progress()
}

#[test]
fn test_download_writes_body() {
    let runtime = Runtime::new().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/vae.safetensors")
        .with_status(200)
        .with_body("weights")
        .create();

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("vae.safetensors");
    let bytes = transport(&runtime)
        .download(&format!("{}/vae.safetensors", server.url()), &dest)
        .expect("Download failed");

    mock.assert();
    assert_eq!(bytes, 7);
    assert_eq!(fs::read_to_string(&dest).unwrap(), "weights");
}

#[test]
fn test_download_follows_redirects() {
    let runtime = Runtime::new().unwrap();
    let mut server = mockito::Server::new();
    let redirect = server
        .mock("GET", "/resolve/main/lora.safetensors")
        .with_status(302)
        .with_header("location", &format!("{}/cdn/lora.safetensors", server.url()))
        .create();
    let cdn = server
        .mock("GET", "/cdn/lora.safetensors")
        .with_status(200)
        .with_body("lora bytes")
        .create();

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("lora.safetensors");
    transport(&runtime)
        .download(&format!("{}/resolve/main/lora.safetensors", server.url()), &dest)
        .expect("Download failed");

    redirect.assert();
    cdn.assert();
    assert_eq!(fs::read_to_string(&dest).unwrap(), "lora bytes");
}

#[test]
fn test_not_found_leaves_no_file() {
    let runtime = Runtime::new().unwrap();
    let mut server = mockito::Server::new();
    server.mock("GET", "/missing.gguf").with_status(404).create();

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("missing.gguf");
    let fetcher = Fetcher::new(transport(&runtime));
    let mut out = Vec::new();

    let outcome = fetcher
        .fetch(
            &Target::model(&dest, format!("{}/missing.gguf", server.url())),
            false,
            &mut out,
        )
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Failed(_)));
    assert!(!dest.exists());
    assert!(!partial_path(&dest).exists());
    assert!(String::from_utf8(out).unwrap().contains("[FAIL] missing.gguf"));
}

#[test]
fn test_invalid_workflow_keeps_existing_file() {
    let runtime = Runtime::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/wf.json")
        .with_status(200)
        .with_body("<html>rate limited</html>")
        .create();

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("wf.json");
    fs::write(&dest, r#"{"nodes": []}"#).unwrap();

    let fetcher = Fetcher::new(transport(&runtime));
    let outcome = fetcher
        .fetch(
            &Target::workflow(&dest, format!("{}/wf.json", server.url())),
            true,
            &mut Vec::new(),
        )
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Failed(_)));
    assert_eq!(fs::read_to_string(&dest).unwrap(), r#"{"nodes": []}"#);
    assert!(!partial_path(&dest).exists());
}

#[test]
fn test_valid_workflow_replaces_file() {
    let runtime = Runtime::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/wf.json")
        .with_status(200)
        .with_body(r#"{"nodes": [{"id": 1}, {"id": 2}], "links": []}"#)
        .create();

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("wf.json");

    let fetcher = Fetcher::new(transport(&runtime));
    let outcome = fetcher
        .fetch(
            &Target::workflow(&dest, format!("{}/wf.json", server.url())),
            false,
            &mut Vec::new(),
        )
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Downloaded(_)));
    assert!(fs::read_to_string(&dest).unwrap().contains("links"));
}
