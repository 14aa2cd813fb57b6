use std::{process::Stdio, time::Duration};

use anyhow::{anyhow, Context, Result};
use assert_cmd::cargo::cargo_bin;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

struct Peer {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Peer {
    fn spawn(binary: &str, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(cargo_bin(binary))
            .args(args)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {binary}"))?;
        let stdin = child.stdin.take().context("stdin missing after spawn")?;
        let stdout = child.stdout.take().context("stdout missing after spawn")?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, description: &str) -> Result<String> {
        let mut line = String::new();
        let read = timeout(READ_TIMEOUT, self.stdout.read_line(&mut line))
            .await
            .map_err(|_| anyhow!("{description}: timed out"))??;
        if read == 0 {
            return Err(anyhow!("{description}: stream closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn exits_successfully(&mut self, name: &str) -> Result<()> {
        let status = timeout(EXIT_TIMEOUT, self.child.wait())
            .await
            .map_err(|_| anyhow!("{name} did not exit"))??;
        if !status.success() {
            return Err(anyhow!("{name} exited with status {status}"));
        }
        Ok(())
    }
}

#[tokio::test]
async fn ping_pong_then_both_sides_exit() -> Result<()> {
    let mut server = Peer::spawn("server", &["127.0.0.1", "0"])?;
    let banner = server.read_line("waiting for listening banner").await?;
    let port = banner
        .strip_prefix("Server listening on port ")
        .and_then(|rest| rest.strip_suffix("..."))
        .with_context(|| format!("unexpected banner: {banner}"))?
        .to_string();

    let mut client = Peer::spawn("client", &["127.0.0.1", &port])?;
    assert_eq!(
        client.read_line("waiting for client confirmation").await?,
        format!("Connected to 127.0.0.1:{port}")
    );
    let accepted = server.read_line("waiting for server confirmation").await?;
    assert!(accepted.starts_with("Connection from 127.0.0.1:"), "{accepted}");

    client.send_line("ping").await?;
    assert_eq!(
        server.read_line("waiting for ping").await?,
        "received: {ping}"
    );

    server.send_line("pong").await?;
    assert_eq!(
        client.read_line("waiting for pong").await?,
        "received: {pong}"
    );

    // Only the client's input ends; the server's stays open.
    drop(client.stdin.take());

    assert_eq!(
        server.read_line("waiting for server to see hang up").await?,
        "Peer closed connection."
    );
    assert_eq!(
        client.read_line("waiting for client to see hang up").await?,
        "Peer closed connection."
    );
    client.exits_successfully("client").await?;
    server.exits_successfully("server").await?;
    Ok(())
}

#[test]
fn server_without_bind_address_prints_usage() {
    let output = assert_cmd::Command::cargo_bin("server")
        .unwrap()
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("USAGE"));
}

#[test]
fn server_help_exits_successfully() {
    assert_cmd::Command::cargo_bin("server")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn client_without_address_fails() {
    assert_cmd::Command::cargo_bin("client")
        .unwrap()
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_bind_address_fails() {
    assert_cmd::Command::cargo_bin("server")
        .unwrap()
        .args(["not-an-ip", "0"])
        .env("RUST_LOG", "off")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn refused_connection_fails() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .unwrap()
        .port();

    assert_cmd::Command::cargo_bin("client")
        .unwrap()
        .args(["127.0.0.1", &port.to_string()])
        .env("RUST_LOG", "off")
        .assert()
        .failure()
        .code(1);
}
