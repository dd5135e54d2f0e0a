use std::{process::Stdio, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);
const DELIMITER: &str = "\n\nx";

#[tokio::test]
async fn interactive_session_end_to_end() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut client = spawn_client().await?;

    client.send_line(&format!("CONNECT {port} alice")).await?;
    let (mut broker, handshake) = accept_with_greeting(&listener, "OK\n\nx").await?;
    assert_eq!(handshake, "CONNECT alice");
    assert_eq!(
        client.read_message_line("waiting for connect notice").await?,
        "INFO: connection successfully established"
    );

    client.send_line("SUBSCRIBE news").await?;
    assert_eq!(broker.expect_frame().await?, "SUBSCRIBE news");

    // A push on the subscribed topic is printed; any other topic is reported
    // as an error and dropped.
    broker.send_raw(b"news hello\n\nx").await?;
    assert_eq!(
        client.read_message_line("waiting for delivered message").await?,
        "Topic: news Data: hello"
    );

    broker.send_raw(b"weather cold\n\nx").await?;
    let report = client.read_error_containing("ERROR:").await?;
    assert!(report.contains("weather"), "unexpected report: {report}");

    client.send_line("PUBLISH news from alice").await?;
    assert_eq!(broker.expect_frame().await?, "PUBLISH news from alice");

    client.send_line("DISCONNECT").await?;
    assert_eq!(broker.expect_frame().await?, "DISCONNECT");
    broker.expect_closed().await?;

    // The session is gone; further session commands are rejected.
    client.send_line("PUBLISH news too late").await?;
    let report = client.read_error_containing("not connected").await?;
    assert!(report.contains("ERROR:"), "unexpected report: {report}");

    client.finish().await
}

#[tokio::test]
async fn restored_session_replays_missed_messages() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut client = spawn_client().await?;

    client.send_line(&format!("CONNECT {port} bob")).await?;
    let (mut broker, handshake) =
        accept_with_greeting(&listener, "RESTORED\n\nxnews sports\n\nxnews breaking\n\nx").await?;
    assert_eq!(handshake, "CONNECT bob");

    assert_eq!(
        client.read_message_line("waiting for restore notice").await?,
        "INFO: connection restored"
    );
    assert_eq!(
        client.read_message_line("waiting for replayed message").await?,
        "Topic: news Data: breaking"
    );

    // The restored topic set applies to live traffic too.
    broker.send_raw(b"sports score 1-0\n\nx").await?;
    assert_eq!(
        client.read_message_line("waiting for live message").await?,
        "Topic: sports Data: score 1-0"
    );

    client.finish().await
}

struct ClientProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
}

impl ClientProcess {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .context("client stdin already closed")?;
        stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to send line '{line}'"))?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Reads the next non-empty stdout line; blank lines set live message
    /// batches off from the prompt and are skipped here.
    async fn read_message_line(&mut self, description: &str) -> Result<String> {
        loop {
            let mut line = String::new();
            let count = timeout(READ_TIMEOUT, self.stdout.read_line(&mut line))
                .await
                .map_err(|_| anyhow!("{description}: timed out"))??;
            if count == 0 {
                bail!("{description}: stdout closed");
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }

    /// Reads stderr until a line carrying `needle` shows up. Prompt text is
    /// written without a newline, so it rides along in front of reports.
    async fn read_error_containing(&mut self, needle: &str) -> Result<String> {
        loop {
            let mut line = String::new();
            let count = timeout(READ_TIMEOUT, self.stderr.read_line(&mut line))
                .await
                .map_err(|_| anyhow!("timed out waiting for '{needle}' on stderr"))??;
            if count == 0 {
                bail!("stderr closed while waiting for '{needle}'");
            }
            if line.contains(needle) {
                return Ok(line.trim_end_matches(['\r', '\n']).to_string());
            }
        }
    }

    /// Closes stdin and waits for a clean exit.
    async fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());
        let status = timeout(Duration::from_secs(5), self.child.wait())
            .await
            .context("timed out waiting for the client to exit")??;
        if !status.success() {
            bail!("client exited with status {status}");
        }
        Ok(())
    }
}

async fn spawn_client() -> Result<ClientProcess> {
    let binary = assert_cmd::cargo::cargo_bin!("pubsubx");

    let mut cmd = Command::new(binary);
    cmd.env("RUST_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("failed to spawn client")?;
    let stdin = child.stdin.take().context("client stdin missing")?;
    let stdout = child.stdout.take().context("client stdout missing")?;
    let stderr = child.stderr.take().context("client stderr missing")?;

    Ok(ClientProcess {
        child,
        stdin: Some(stdin),
        stdout: BufReader::new(stdout),
        stderr: BufReader::new(stderr),
    })
}

struct BrokerConn {
    stream: TcpStream,
    buffer: String,
}

impl BrokerConn {
    async fn expect_frame(&mut self) -> Result<String> {
        timeout(READ_TIMEOUT, self.next_frame())
            .await
            .context("timed out waiting for a frame")?
    }

    async fn next_frame(&mut self) -> Result<String> {
        loop {
            if let Some(position) = self.buffer.find(DELIMITER) {
                let frame = self.buffer[..position].to_string();
                self.buffer.drain(..position + DELIMITER.len());
                return Ok(frame);
            }

            let mut buf = [0u8; 2048];
            let count = self.stream.read(&mut buf).await?;
            if count == 0 {
                bail!("client closed the connection before a frame arrived");
            }
            self.buffer.push_str(&String::from_utf8_lossy(&buf[..count]));
        }
    }

    async fn expect_closed(&mut self) -> Result<()> {
        let mut buf = [0u8; 2048];
        let count = timeout(READ_TIMEOUT, self.stream.read(&mut buf))
            .await
            .context("timed out waiting for the client to close")??;
        if count != 0 {
            bail!("expected the stream to close, got {count} more bytes");
        }
        Ok(())
    }

    async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }
}

async fn accept_with_greeting(
    listener: &TcpListener,
    greeting: &str,
) -> Result<(BrokerConn, String)> {
    let (stream, _) = timeout(READ_TIMEOUT, listener.accept())
        .await
        .context("timed out waiting for the client to connect")??;
    let mut conn = BrokerConn {
        stream,
        buffer: String::new(),
    };

    let handshake = conn.expect_frame().await?;
    conn.stream.write_all(greeting.as_bytes()).await?;
    Ok((conn, handshake))
}
