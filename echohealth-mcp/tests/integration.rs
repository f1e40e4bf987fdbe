use anyhow::Result;
use echohealth_retriever::storage::{DocumentChunk, FlatIndex, IndexSnapshot, MetadataStore};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::{Duration, timeout};

fn write_snapshot(dir: &Path) -> Result<()> {
    let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]])?;
    let metadata = MetadataStore::new(vec![
        DocumentChunk::new("asthma.html", "S1", "Asthma narrows the airways."),
        DocumentChunk::new("flu.html", "S2", "Flu is caused by a virus."),
    ]);
    IndexSnapshot::new(index, metadata, "text-embedding-3-small")?.save(dir)?;
    Ok(())
}

/// Pins the query dimension to the 2-dim test snapshot.
fn write_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("echohealth.toml");
    std::fs::write(
        &path,
        "[embedding]\nmodel = \"text-embedding-3-small\"\ndimensions = 2\n",
    )?;
    Ok(path)
}

fn spawn_server(config_path: &Path, index_dir: &Path) -> Result<Child> {
    Ok(Command::new(env!("CARGO_BIN_EXE_echohealth-mcp"))
        .arg("--config")
        .arg(config_path)
        .arg("--index-dir")
        .arg(index_dir)
        .env("OPENAI_API_KEY", "test-key")
        .env("RUST_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?)
}

async fn send(stdin: &mut ChildStdin, message: Value) -> Result<()> {
    stdin.write_all(format!("{message}\n").as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

async fn receive(stdout: &mut BufReader<ChildStdout>) -> Result<Value> {
    let mut line = String::new();
    timeout(Duration::from_secs(10), stdout.read_line(&mut line)).await??;
    Ok(serde_json::from_str(&line)?)
}

#[tokio::test]
async fn test_server_lists_tools_over_stdio() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let index_dir = temp.path().join("rag");
    write_snapshot(&index_dir)?;
    let config_path = write_config(temp.path())?;

    let mut child = spawn_server(&config_path, &index_dir)?;
    let mut stdin = child.stdin.take().expect("piped stdin");
    let mut stdout = BufReader::new(child.stdout.take().expect("piped stdout"));

    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "integration-test", "version": "0.0.0" }
            }
        }),
    )
    .await?;
    let initialized = receive(&mut stdout).await?;
    assert_eq!(initialized["id"], 1);
    let instructions = initialized["result"]["instructions"].as_str().unwrap_or_default();
    assert!(instructions.contains("Health Information Assistant"));

    send(
        &mut stdin,
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await?;
    send(
        &mut stdin,
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {} }),
    )
    .await?;
    let listed = receive(&mut stdout).await?;
    assert_eq!(listed["id"], 2);
    let mut names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec!["doc_catalog", "doc_search", "grounded_answer", "status"]
    );

    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": { "name": "doc_catalog", "arguments": {} }
        }),
    )
    .await?;
    let catalog = receive(&mut stdout).await?;
    assert_eq!(catalog["id"], 3);
    assert_eq!(
        catalog["result"]["content"][0]["text"],
        "S1: asthma.html\nS2: flu.html"
    );

    drop(stdin);
    timeout(Duration::from_secs(10), child.wait()).await??;
    Ok(())
}

#[tokio::test]
async fn test_server_refuses_to_start_without_snapshot() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let output = Command::new(env!("CARGO_BIN_EXE_echohealth-mcp"))
        .arg("--index-dir")
        .arg(temp.path().join("rag"))
        .env("OPENAI_API_KEY", "test-key")
        .stdin(Stdio::null())
        .output()
        .await?;

    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("Index not loaded"));
    Ok(())
}
