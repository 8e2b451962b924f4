#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Integration tests for the sandboxed file tools: `file_tree`,
//! `list_directories`, `read_file`, `write_file`, `update_adapter_in_file`.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Helper to spawn the server and communicate with it.
struct ServerProcess {
    child: std::process::Child,
    stdin: Option<std::process::ChildStdin>,
    stdout: BufReader<std::process::ChildStdout>,
}

impl ServerProcess {
    fn spawn(state: &Path) -> Result<Self> {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_flow-studio"));
        cmd.arg("serve")
            .arg("--projects-root")
            .arg(state)
            .env("XDG_CONFIG_HOME", state)
            .env("FLOW_STUDIO_RECENT_PROJECTS_FILE", state.join("recent.json"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().context("Failed to spawn server")?;
        let stdin = child.stdin.take().context("Failed to get stdin")?;
        let stdout = BufReader::new(child.stdout.take().context("Failed to get stdout")?);
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
        })
    }

    fn send(&mut self, request: &Value) -> Result<()> {
        let json = serde_json::to_string(request)?;
        let stdin = self.stdin.as_mut().context("Stdin already closed")?;
        writeln!(stdin, "{json}").context("Failed to write to stdin")?;
        stdin.flush().context("Failed to flush stdin")?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Value> {
        let mut line = String::new();
        self.stdout
            .read_line(&mut line)
            .context("Failed to read from stdout")?;
        serde_json::from_str(&line).context("Failed to parse JSON response")
    }

    fn initialize(&mut self) -> Result<()> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "file-tools-test", "version": "1.0.0" }
            }
        }))?;
        let response = self.recv()?;
        if response.get("result").is_none() {
            bail!("Initialize failed: {response:?}");
        }
        Ok(())
    }

    /// Returns `(is_error, text)`.
    fn call_tool(&mut self, name: &str, args: &Value) -> Result<(bool, String)> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 100,
            "method": "tools/call",
            "params": { "name": name, "arguments": args }
        }))?;
        let response = self.recv()?;
        let result = response.get("result").context("No result in response")?;
        let text = result
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|item| item.get("text"))
            .and_then(|t| t.as_str())
            .context("No text content in result")?;
        let is_error = result.get("isError").and_then(Value::as_bool) == Some(true);
        Ok((is_error, text.to_string()))
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        self.stdin.take();
        let _ = self.child.wait();
    }
}

/// `<tmp>/project` with a few files, and `<tmp>/outside.txt` beside it.
/// `<tmp>` doubles as the projects root.
fn fixture() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let root = dir.path().join("project");
    fs::create_dir_all(root.join("configs/nested"))?;
    fs::write(root.join("configs/main.xml"), r#"<Configuration><Adapter name="A"/><Adapter name="B"/></Configuration>"#)?;
    fs::write(root.join("configs/nested/deep.xml"), "<Configuration/>")?;
    fs::write(root.join("readme.txt"), "hello")?;
    fs::write(dir.path().join("outside.txt"), "secret")?;
    Ok((dir, root))
}

fn start(dir: &TempDir) -> Result<ServerProcess> {
    let mut server = ServerProcess::spawn(dir.path())?;
    server.initialize()?;
    Ok(server)
}

#[test]
fn test_file_tree_recursive() -> Result<()> {
    let (dir, root) = fixture()?;
    let mut server = start(&dir)?;

    let (is_error, text) =
        server.call_tool("file_tree", &json!({ "root": root, "recursive": true }))?;
    assert!(!is_error, "{text}");
    let tree: Value = serde_json::from_str(&text)?;
    assert_eq!(tree["type"], "DIRECTORY");
    assert_eq!(tree["children"][0]["name"], "configs");
    assert_eq!(tree["children"][0]["children"][1]["name"], "nested");
    assert_eq!(
        tree["children"][0]["children"][1]["children"][0]["name"],
        "deep.xml"
    );
    assert_eq!(tree["children"][1]["name"], "readme.txt");
    Ok(())
}

#[test]
fn test_escapes_are_rejected() -> Result<()> {
    let (dir, root) = fixture()?;
    let mut server = start(&dir)?;
    let outside = dir.path().join("outside.txt");
    let sibling = format!("{}ile", root.display());

    for path in [
        "../outside.txt".to_string(),
        "configs/../../outside.txt".to_string(),
        outside.display().to_string(),
        sibling,
    ] {
        let (is_error, text) =
            server.call_tool("read_file", &json!({ "root": root, "path": path }))?;
        assert!(is_error, "{path} was not rejected");
        assert!(text.starts_with("SECURITY_VIOLATION: "), "{path}: {text}");
    }

    let (is_error, text) = server.call_tool(
        "write_file",
        &json!({ "root": root, "path": "../outside.txt", "content": "overwritten" }),
    )?;
    assert!(is_error);
    assert!(text.starts_with("SECURITY_VIOLATION: "), "{text}");
    assert_eq!(fs::read_to_string(&outside)?, "secret");
    Ok(())
}

#[test]
fn test_root_outside_projects_root_is_rejected() -> Result<()> {
    let (dir, _root) = fixture()?;
    let mut server = start(&dir)?;
    let outside = dir.path().join("outside.txt");

    for (tool, args) in [
        ("read_file", json!({ "root": "/", "path": "/etc/hostname" })),
        ("read_file", json!({ "root": "/", "path": outside })),
        ("write_file", json!({ "root": "/", "path": outside, "content": "overwritten" })),
        ("file_tree", json!({ "root": "/" })),
        ("read_file", json!({ "root": "..", "path": "etc/hostname" })),
    ] {
        let (is_error, text) = server.call_tool(tool, &args)?;
        assert!(is_error, "{tool} {args} was not rejected");
        assert!(text.starts_with("SECURITY_VIOLATION: "), "{tool}: {text}");
    }
    assert_eq!(fs::read_to_string(&outside)?, "secret");

    let (is_error, text) = server.call_tool(
        "read_file",
        &json!({ "project": "project", "path": "readme.txt" }),
    )?;
    assert!(!is_error, "{text}");
    assert_eq!(text, "hello");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_is_rejected() -> Result<()> {
    let (dir, root) = fixture()?;
    std::os::unix::fs::symlink(dir.path(), root.join("link"))?;
    let mut server = start(&dir)?;

    let (is_error, text) = server.call_tool(
        "read_file",
        &json!({ "root": root, "path": "link/outside.txt" }),
    )?;
    assert!(is_error);
    assert!(text.starts_with("SECURITY_VIOLATION: "), "{text}");

    // The escaping link is not shown in listings
    let (_, text) = server.call_tool("file_tree", &json!({ "root": root }))?;
    assert!(!text.contains("\"link\""), "{text}");
    Ok(())
}

#[test]
fn test_list_directories() -> Result<()> {
    let (dir, root) = fixture()?;
    let mut server = start(&dir)?;

    let (_, text) = server.call_tool("list_directories", &json!({ "root": root }))?;
    let nodes: Value = serde_json::from_str(&text)?;
    assert_eq!(nodes, json!([{
        "name": "configs",
        "path": root.join("configs"),
        "type": "DIRECTORY"
    }]));

    let (_, text) = server.call_tool(
        "list_directories",
        &json!({ "root": root, "include_files": true }),
    )?;
    let nodes: Value = serde_json::from_str(&text)?;
    assert_eq!(nodes.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn test_missing_and_wrong_kind() -> Result<()> {
    let (dir, root) = fixture()?;
    let mut server = start(&dir)?;

    let (is_error, text) =
        server.call_tool("file_tree", &json!({ "root": root, "path": "nope" }))?;
    assert!(is_error);
    assert!(text.starts_with("NOT_FOUND: "), "{text}");

    let (is_error, text) =
        server.call_tool("file_tree", &json!({ "root": root, "path": "readme.txt" }))?;
    assert!(is_error);
    assert!(text.starts_with("INVALID_INPUT: "), "{text}");

    let (is_error, text) =
        server.call_tool("read_file", &json!({ "root": root, "path": "configs" }))?;
    assert!(is_error);
    assert!(text.starts_with("INVALID_INPUT: "), "{text}");
    Ok(())
}

#[test]
fn test_write_then_read() -> Result<()> {
    let (dir, root) = fixture()?;
    let mut server = start(&dir)?;

    let (is_error, text) = server.call_tool(
        "write_file",
        &json!({ "root": root, "path": "readme.txt", "content": "updated" }),
    )?;
    assert!(!is_error, "{text}");
    let (_, text) = server.call_tool("read_file", &json!({ "root": root, "path": "readme.txt" }))?;
    assert_eq!(text, "updated");

    // No temp files left behind
    let leftovers: Vec<_> = fs::read_dir(&root)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn test_update_adapter_in_file() -> Result<()> {
    let (dir, root) = fixture()?;
    let mut server = start(&dir)?;
    let file = root.join("configs/main.xml");
    let before = fs::read_to_string(&file)?;

    let (is_error, text) = server.call_tool(
        "update_adapter_in_file",
        &json!({
            "root": root,
            "path": "configs/main.xml",
            "adapter": "A",
            "fragment": "<Adapter name=\"A\"><Pipe/></Adapter>"
        }),
    )?;
    assert!(!is_error, "{text}");
    let after = fs::read_to_string(&file)?;
    assert_eq!(after, text);
    assert!(after.contains("<Pipe/>"));
    assert!(after.contains(r#"<Adapter name="B"/>"#));
    assert_ne!(after, before);

    let (is_error, text) = server.call_tool(
        "update_adapter_in_file",
        &json!({
            "root": root,
            "path": "configs/main.xml",
            "adapter": "A",
            "fragment": "<!DOCTYPE x><Adapter name=\"A\"/>"
        }),
    )?;
    assert!(is_error);
    assert!(text.starts_with("INVALID_INPUT: "), "{text}");
    assert_eq!(fs::read_to_string(&file)?, after);
    Ok(())
}
