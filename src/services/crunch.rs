use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::watch;

/// Nine-patch images; always crunched.
pub const DOT_9PNG: &str = ".9.png";
pub const DOT_PNG: &str = ".png";

/// Crunch tool argument selecting single-file crunch mode.
pub const SINGLE_CRUNCH_MODE: &str = "s";

/// Errors that can occur while crunching a file
#[derive(Error, Debug)]
pub enum CrunchError {
    #[error("Failed to launch crunch tool {tool}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Crunch tool failed with {status}: {output}")]
    Failed { status: String, output: String },

    #[error("Crunch of {0} was interrupted")]
    Interrupted(Utf8PathBuf),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Runs the external crunch tool on single image files.
///
/// The tool is invoked as `<tool> s -i <input> -o <output>`, both paths
/// absolute. Plain `.png` crunching can be switched off; nine-patch files are
/// always crunched because the tool also compiles their patch metadata.
#[derive(Debug, Clone)]
pub struct CrunchTool {
    tool_path: Utf8PathBuf,
    no_crunch: bool,
    env: Option<IndexMap<String, String>>,
    timeout: Option<Duration>,
}

impl CrunchTool {
    pub fn new(tool_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tool_path: tool_path.into(),
            no_crunch: false,
            env: None,
            timeout: None,
        }
    }

    pub fn with_no_crunch(mut self, no_crunch: bool) -> Self {
        self.no_crunch = no_crunch;
        self
    }

    pub fn with_env(mut self, env: IndexMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set whether plain PNGs should be skipped. Not meant to change during a pass.
    pub fn set_no_crunch(&mut self, no_crunch: bool) {
        self.no_crunch = no_crunch;
    }

    pub fn tool_path(&self) -> &Utf8Path {
        &self.tool_path
    }

    /// Whether a file with this name goes through the crunch tool.
    pub fn should_crunch_file(&self, filename: &str) -> bool {
        if filename.ends_with(DOT_9PNG) {
            true
        } else if filename.ends_with(DOT_PNG) {
            !self.no_crunch
        } else {
            false
        }
    }

    /// Build the argument list for crunching `from` into `to`
    pub fn build_crunch_command(&self, from: &Utf8Path, to: &Utf8Path) -> Vec<String> {
        vec![
            self.tool_path.to_string(),
            SINGLE_CRUNCH_MODE.to_string(),
            "-i".to_string(),
            absolute(from),
            "-o".to_string(),
            absolute(to),
        ]
    }

    /// Crunch `from` into `to`.
    ///
    /// Resolves once the tool exits. When `interrupt` flips to `true` the child
    /// is killed and [`CrunchError::Interrupted`] returned. On any failure the
    /// destination is removed so a half-written image never survives.
    pub async fn crunch(
        &self,
        from: &Utf8Path,
        to: &Utf8Path,
        interrupt: Option<watch::Receiver<bool>>,
    ) -> Result<(), CrunchError> {
        let command = self.build_crunch_command(from, to);
        let result = self.run_command(&command, from, interrupt).await;

        if result.is_err() {
            match tokio::fs::remove_file(to).await {
                Ok(()) => tracing::debug!("Removed partial crunch output {}", to),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove partial crunch output {}: {}", to, e),
            }
        }
        result
    }

    async fn run_command(
        &self,
        command: &[String],
        from: &Utf8Path,
        interrupt: Option<watch::Receiver<bool>>,
    ) -> Result<(), CrunchError> {
        tracing::debug!("Executing: {}", command.join(" "));
        let start = Instant::now();

        let mut cmd = Command::new(&command[0]);
        cmd.args(&command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(env) = &self.env {
            cmd.envs(env);
        }

        let child = cmd.spawn().map_err(|source| CrunchError::Launch {
            tool: command[0].clone(),
            source,
        })?;

        let limit = self.timeout;
        let tool = command[0].clone();
        let wait = async move {
            let waited = match limit {
                Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                    .await
                    .map_err(|_| {
                        tracing::warn!("Crunch tool timed out after {:?}", limit);
                        CrunchError::Timeout(limit)
                    })?,
                None => child.wait_with_output().await,
            };
            waited.map_err(|source| CrunchError::Launch { tool, source })
        };

        // Dropping `wait` drops the child, and kill_on_drop terminates it.
        let output = match interrupt {
            Some(mut rx) => tokio::select! {
                output = wait => output?,
                _ = interrupted(&mut rx) => {
                    tracing::warn!("Crunch interrupted: {}", from);
                    return Err(CrunchError::Interrupted(from.to_path_buf()));
                }
            },
            None => wait.await?,
        };

        tracing::debug!(
            "Crunch of {} completed in {:.2}s with {}",
            from,
            start.elapsed().as_secs_f32(),
            output.status
        );

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CrunchError::Failed {
                status: output.status.to_string(),
                output: text.trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Completes once the flag is raised. Never completes if the sender is gone.
async fn interrupted(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|raised| *raised).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn absolute(path: &Utf8Path) -> String {
    std::path::absolute(path.as_std_path())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_crunch_nine_patch_regardless_of_flag() {
        let tool = CrunchTool::new("/opt/aapt").with_no_crunch(true);
        assert!(tool.should_crunch_file("button.9.png"));
    }

    #[test]
    fn test_should_crunch_png_unless_disabled() {
        let mut tool = CrunchTool::new("/opt/aapt");
        assert!(tool.should_crunch_file("icon.png"));

        tool.set_no_crunch(true);
        assert!(!tool.should_crunch_file("icon.png"));
    }

    #[test]
    fn test_should_not_crunch_other_files() {
        let tool = CrunchTool::new("/opt/aapt");
        assert!(!tool.should_crunch_file("main.xml"));
        assert!(!tool.should_crunch_file("photo.jpg"));
        assert!(!tool.should_crunch_file("icon.PNG"));
        assert!(!tool.should_crunch_file("png"));
    }

    #[test]
    fn test_build_crunch_command() {
        let tool = CrunchTool::new("/opt/aapt");
        let cmd = tool.build_crunch_command(
            Utf8Path::new("/res/drawable/icon.png"),
            Utf8Path::new("/out/drawable/icon.png"),
        );
        assert_eq!(
            cmd,
            vec!["/opt/aapt", "s", "-i", "/res/drawable/icon.png", "-o", "/out/drawable/icon.png"]
        );
    }

    #[test]
    fn test_build_crunch_command_makes_paths_absolute() {
        let tool = CrunchTool::new("aapt");
        let cmd = tool.build_crunch_command(Utf8Path::new("in.png"), Utf8Path::new("out.png"));
        assert_eq!(cmd[0], "aapt");
        assert!(Utf8Path::new(&cmd[3]).is_absolute());
        assert!(Utf8Path::new(&cmd[5]).is_absolute());
        assert!(cmd[5].ends_with("out.png"));
    }

    #[test]
    fn test_missing_tool_is_launch_error() {
        let tool = CrunchTool::new("/nonexistent/resmerge-crunch-tool");
        let result = tokio_test::block_on(tool.crunch(
            Utf8Path::new("/tmp/in.png"),
            Utf8Path::new("/tmp/resmerge-never-written.png"),
            None,
        ));
        assert!(matches!(result, Err(CrunchError::Launch { .. })));
    }
}
