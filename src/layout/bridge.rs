use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use super::DetectionBackend;

/// One box as printed by the layout bridge script, in image pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDetection {
    pub label: String,
    #[serde(default = "default_score")]
    pub score: f32,
    pub coordinate: [f32; 4],
}

fn default_score() -> f32 {
    0.5
}

/// One line written by the bridge in serve mode.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BridgeReply {
    Boxes(Vec<RawDetection>),
    Failure { error: String },
    Ready { ready: bool },
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    image: &'a Path,
}

pub fn parse_reply(line: &str) -> Result<BridgeReply> {
    serde_json::from_str(line.trim()).with_context(|| "failed to parse layout bridge reply")
}

/// A running `--serve` process. The model is loaded once when it starts.
#[derive(Debug)]
struct BridgeSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl BridgeSession {
    fn start(bridge: &LayoutBridge) -> Result<Self> {
        let mut command = Command::new(&bridge.python);
        command.arg(&bridge.script_path).arg("--serve");
        if let Some(model_dir) = &bridge.model_dir {
            command.arg("--model-dir").arg(model_dir);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start layout bridge {}", bridge.script_path.display()))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            // kill failures only mean the process is already gone
            let _ = child.kill();
            anyhow::bail!("layout bridge started without stdio pipes");
        };
        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        match session.read_reply()? {
            BridgeReply::Ready { ready: true } => {
                tracing::debug!(script = %bridge.script_path.display(), "layout bridge ready");
                Ok(session)
            }
            BridgeReply::Failure { error } => anyhow::bail!("layout bridge failed to start: {error}"),
            other => anyhow::bail!("unexpected layout bridge greeting: {other:?}"),
        }
    }

    fn request(&mut self, image_path: &Path) -> Result<BridgeReply> {
        let mut line = serde_json::to_string(&BridgeRequest { image: image_path })?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|()| self.stdin.flush())
            .context("failed to send page to layout bridge")?;
        self.read_reply()
    }

    fn read_reply(&mut self) -> Result<BridgeReply> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .context("failed to read from layout bridge")?;
        if read == 0 {
            anyhow::bail!("layout bridge exited");
        }
        parse_reply(&line)
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        // the process may already have exited
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Runs the external layout model as a long-lived subprocess. Page images go
/// in on stdin one JSON line at a time; detections come back the same way.
///
/// The process is started on first use and restarted after it dies.
#[derive(Debug)]
pub struct LayoutBridge {
    python: PathBuf,
    script_path: PathBuf,
    model_dir: Option<PathBuf>,
    session: Mutex<Option<BridgeSession>>,
}

impl LayoutBridge {
    pub fn new(script_path: PathBuf) -> Self {
        Self {
            python: PathBuf::from("python3"),
            script_path,
            model_dir: None,
            session: Mutex::new(None),
        }
    }

    pub fn with_python(mut self, python: PathBuf) -> Self {
        self.python = python;
        self
    }

    pub fn with_model_dir(mut self, model_dir: Option<PathBuf>) -> Self {
        self.model_dir = model_dir;
        self
    }

    /// Cheap availability check run once before any document is processed.
    pub fn probe(&self) -> Result<()> {
        if !self.script_path.is_file() {
            anyhow::bail!("layout bridge script not found: {}", self.script_path.display());
        }
        if let Some(model_dir) = &self.model_dir {
            if !model_dir.is_dir() {
                anyhow::bail!("layout model directory not found: {}", model_dir.display());
            }
        }
        let status = Command::new(&self.python)
            .arg("--version")
            .output()
            .with_context(|| format!("failed to invoke {}", self.python.display()))?
            .status;
        if !status.success() {
            anyhow::bail!("{} --version exited with {status}", self.python.display());
        }
        Ok(())
    }

    pub fn run(&self, image_path: &Path) -> Result<Vec<RawDetection>> {
        let mut slot = self
            .session
            .lock()
            .map_err(|err| anyhow::anyhow!("layout bridge lock poisoned: {err}"))?;
        let mut session = match slot.take() {
            Some(session) => session,
            None => BridgeSession::start(self)?,
        };

        // A transport error drops the session; the next page starts a new one.
        let reply = session.request(image_path)?;
        *slot = Some(session);

        match reply {
            BridgeReply::Boxes(detections) => Ok(detections),
            BridgeReply::Failure { error } => anyhow::bail!("layout bridge failed on {}: {error}", image_path.display()),
            BridgeReply::Ready { .. } => anyhow::bail!("layout bridge answered a page with a greeting"),
        }
    }
}

impl DetectionBackend for LayoutBridge {
    fn detect(&self, image_path: &Path) -> Result<Vec<RawDetection>> {
        self.run(image_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bridge_replies() -> Result<()> {
        let json = r#"[
            {"label": "doc_title", "score": 0.95, "coordinate": [100.0, 80.5, 500.0, 120.0], "cls_id": 6},
            {"label": "text", "coordinate": [100.0, 130.0, 500.0, 400.0]}
        ]"#;
        let BridgeReply::Boxes(detections) = parse_reply(json)? else {
            anyhow::bail!("expected boxes");
        };
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "doc_title");
        assert_eq!(detections[0].coordinate, [100.0, 80.5, 500.0, 120.0]);
        assert_eq!(detections[1].score, 0.5);

        assert_eq!(parse_reply("[]\n")?, BridgeReply::Boxes(Vec::new()));
        assert_eq!(parse_reply(r#"{"ready": true}"#)?, BridgeReply::Ready { ready: true });
        assert_eq!(
            parse_reply(r#"{"error": "cannot open image"}"#)?,
            BridgeReply::Failure {
                error: "cannot open image".to_string()
            }
        );
        assert!(parse_reply("Loading model...").is_err());
        Ok(())
    }

    #[test]
    fn probe_rejects_missing_script() {
        let bridge = LayoutBridge::new(PathBuf::from("does/not/exist.py"));
        assert!(bridge.probe().is_err());
    }

    /// A stand-in bridge in shell: greets, then answers every page with one
    /// box, or with an error for images named `bad.png`.
    #[cfg(unix)]
    fn fake_bridge(dir: &Path) -> Result<LayoutBridge> {
        let script = dir.join("bridge.sh");
        let starts = dir.join("starts");
        std::fs::write(
            &script,
            format!(
                r#"echo started >> "{starts}"
echo '{{"ready": true}}'
while read -r line; do
  case "$line" in
    *bad.png*) echo '{{"error": "unreadable image"}}' ;;
    *) echo '[{{"label": "doc_title", "score": 0.9, "coordinate": [10, 20, 110, 40]}}]' ;;
  esac
done
"#,
                starts = starts.display()
            ),
        )?;
        Ok(LayoutBridge::new(script).with_python(PathBuf::from("sh")))
    }

    #[cfg(unix)]
    #[test]
    fn serves_every_page_from_one_process() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bridge = fake_bridge(dir.path())?;

        let first = bridge.run(Path::new("/tmp/page-1.png"))?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].coordinate, [10.0, 20.0, 110.0, 40.0]);

        // a failed page keeps the process alive
        assert!(bridge.run(Path::new("/tmp/bad.png")).is_err());
        assert_eq!(bridge.run(Path::new("/tmp/page-3.png"))?.len(), 1);

        let starts = std::fs::read_to_string(dir.path().join("starts"))?;
        assert_eq!(starts.lines().count(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn reports_a_bridge_that_exits_early() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("crash.sh");
        std::fs::write(&script, "exit 3\n")?;
        let bridge = LayoutBridge::new(script).with_python(PathBuf::from("sh"));

        let err = bridge.run(Path::new("/tmp/page-1.png")).unwrap_err();
        assert!(format!("{err:#}").contains("layout bridge exited"));
        Ok(())
    }
}
