//! FBX2glTF invocation.
//!
//! The converter is an opaque executable shipped next to the server, one
//! build per platform: `bin/FBX2glTF-<platform>-x64`. It is run once per
//! request as
//!
//! ```text
//! FBX2glTF-linux-x64 -i <input.fbx> -o <output base> --binary
//! ```
//!
//! and writes `<output base>.glb` (plus any textures) next to the input.
//! Its stdout/stderr are forwarded to the log line by line while it runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("No converter build for platform '{0}'")]
    UnsupportedPlatform(String),

    #[error("Converter binary not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to start converter {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for converter: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed with code {0}.")]
    ExitCode(i32),

    #[error("Converter was terminated by a signal")]
    Terminated,

    #[error("Converter timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Platform tag used in converter binary names, for a `std::env::consts::OS` value.
pub fn platform_tag(os: &str) -> Option<&'static str> {
    match os {
        "linux" => Some("linux"),
        "macos" => Some("darwin"),
        "windows" => Some("win32"),
        _ => None,
    }
}

/// File name of the converter build for `os`.
pub fn binary_name(os: &str) -> ConvertResult<String> {
    let tag = platform_tag(os).ok_or_else(|| ConvertError::UnsupportedPlatform(os.to_string()))?;
    let suffix = if os == "windows" { ".exe" } else { "" };
    Ok(format!("FBX2glTF-{}-x64{}", tag, suffix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Handle to the converter executable.
#[derive(Debug, Clone)]
pub struct Converter {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Converter {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Resolve the converter for the host platform and check that it exists.
    ///
    /// A missing binary is a deployment problem, so this runs once at startup
    /// rather than per request.
    pub fn locate(config: &Config) -> ConvertResult<Self> {
        let program = match &config.converter_path {
            Some(path) => path.clone(),
            None => config
                .converter_bin_dir
                .join(binary_name(std::env::consts::OS)?),
        };

        if !program.is_file() {
            return Err(ConvertError::NotFound(program));
        }

        Ok(Self::new(program, config.convert_timeout))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the converter once and wait for it to exit.
    ///
    /// The child is killed if this future is dropped, e.g. when the client
    /// disconnects mid-conversion.
    pub async fn convert(&self, input: &Path, output_base: &Path) -> ConvertResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output_base)
            .arg("--binary")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "Running {} -i {} -o {} --binary",
            self.program.display(),
            input.display(),
            output_base.display()
        );

        let mut child = cmd.spawn().map_err(|source| ConvertError::Spawn {
            path: self.program.clone(),
            source,
        })?;

        let mut log_tasks: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            log_tasks.push(tokio::spawn(forward_lines(stdout, OutputStream::Stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            log_tasks.push(tokio::spawn(forward_lines(stderr, OutputStream::Stderr)));
        }

        let status = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status.map_err(ConvertError::Wait)?,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill timed out converter: {}", e);
                        }
                        for task in log_tasks {
                            task.abort();
                        }
                        return Err(ConvertError::Timeout(limit));
                    }
                }
            }
            None => child.wait().await.map_err(ConvertError::Wait)?,
        };

        // Let the forwarders drain whatever is still buffered in the pipes.
        for task in log_tasks {
            let _ = task.await;
        }

        check_status(status)
    }
}

fn check_status(status: ExitStatus) -> ConvertResult<()> {
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(ConvertError::ExitCode(code)),
        None => Err(ConvertError::Terminated),
    }
}

/// Log every line of `reader` as it arrives. Invalid UTF-8 is replaced
/// rather than dropped.
async fn forward_lines<R>(reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(raw)) => {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                if line.is_empty() {
                    continue;
                }
                match stream {
                    OutputStream::Stdout => info!(stream = %stream, "{}", line),
                    OutputStream::Stderr => warn!(stream = %stream, "{}", line),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read converter {}: {}", stream, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_name_per_platform() {
        assert_eq!(binary_name("linux").unwrap(), "FBX2glTF-linux-x64");
        assert_eq!(binary_name("macos").unwrap(), "FBX2glTF-darwin-x64");
        assert_eq!(binary_name("windows").unwrap(), "FBX2glTF-win32-x64.exe");
        assert!(matches!(
            binary_name("freebsd"),
            Err(ConvertError::UnsupportedPlatform(os)) if os == "freebsd"
        ));
    }

    #[test]
    fn test_exit_code_message_embeds_code() {
        assert_eq!(ConvertError::ExitCode(3).to_string(), "Failed with code 3.");
    }

    #[test]
    fn test_locate_missing_binary() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            converter_bin_dir: temp.path().to_path_buf(),
            ..Config::default()
        };
        match Converter::locate(&config) {
            Err(ConvertError::NotFound(path)) => assert!(path.starts_with(temp.path())),
            Err(ConvertError::UnsupportedPlatform(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let program = temp.path().join("my-converter");
        std::fs::write(&program, b"").unwrap();
        let config = Config {
            converter_path: Some(program.clone()),
            convert_timeout: Some(Duration::from_secs(5)),
            ..Config::default()
        };

        let converter = Converter::locate(&config).unwrap();
        assert_eq!(converter.program(), program.as_path());
        assert_eq!(converter.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_locate_uses_platform_binary_in_bin_dir() {
        let Ok(name) = binary_name(std::env::consts::OS) else {
            return;
        };
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(&name), b"").unwrap();
        let config = Config {
            converter_bin_dir: temp.path().to_path_buf(),
            ..Config::default()
        };

        let converter = Converter::locate(&config).unwrap();
        assert_eq!(converter.program(), temp.path().join(name).as_path());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::testing::write_script;
        use tempfile::tempdir;

        const FAKE_FBX2GLTF: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "Converting to $out.glb"
echo "warning: no textures found" >&2
printf 'glTF' > "$out.glb"
"#;

        #[tokio::test]
        async fn test_convert_success_writes_output() {
            let temp = tempdir().unwrap();
            let program = write_script(temp.path(), "fbx2gltf", FAKE_FBX2GLTF);
            let input = temp.path().join("chair.fbx");
            std::fs::write(&input, b"fbx").unwrap();

            let converter = Converter::new(program, None);
            converter
                .convert(&input, &temp.path().join("chair"))
                .await
                .unwrap();

            assert_eq!(std::fs::read(temp.path().join("chair.glb")).unwrap(), b"glTF");
        }

        #[tokio::test]
        async fn test_convert_passes_expected_arguments() {
            let temp = tempdir().unwrap();
            let args_file = temp.path().join("args.txt");
            let script = format!(
                "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\" >> '{}'; done\n",
                args_file.display()
            );
            let program = write_script(temp.path(), "record-args", &script);

            Converter::new(program, None)
                .convert(Path::new("in/chair.fbx"), Path::new("in/chair"))
                .await
                .unwrap();

            let recorded = std::fs::read_to_string(&args_file).unwrap();
            let args: Vec<&str> = recorded.lines().collect();
            assert_eq!(args, vec!["-i", "in/chair.fbx", "-o", "in/chair", "--binary"]);
        }

        #[tokio::test]
        async fn test_convert_nonzero_exit() {
            let temp = tempdir().unwrap();
            let program = write_script(
                temp.path(),
                "broken",
                "#!/bin/sh\necho 'ERROR: unsupported FBX version' >&2\nexit 1\n",
            );

            let err = Converter::new(program, None)
                .convert(&temp.path().join("a.fbx"), &temp.path().join("a"))
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::ExitCode(1)));
        }

        #[tokio::test]
        async fn test_convert_handles_non_utf8_output() {
            let temp = tempdir().unwrap();
            let program = write_script(
                temp.path(),
                "binary-noise",
                "#!/bin/sh\nprintf 'ok \\377\\376 line\\nno newline at end'\n",
            );

            Converter::new(program, None)
                .convert(&temp.path().join("a.fbx"), &temp.path().join("a"))
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_convert_spawn_failure() {
            let temp = tempdir().unwrap();
            let err = Converter::new(temp.path().join("does-not-exist"), None)
                .convert(&temp.path().join("a.fbx"), &temp.path().join("a"))
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::Spawn { .. }));
        }

        #[tokio::test]
        async fn test_convert_timeout_kills_child() {
            let temp = tempdir().unwrap();
            let program = write_script(temp.path(), "slow", "#!/bin/sh\nexec sleep 30\n");

            let started = std::time::Instant::now();
            let err = Converter::new(program, Some(Duration::from_millis(200)))
                .convert(&temp.path().join("a.fbx"), &temp.path().join("a"))
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }
}
