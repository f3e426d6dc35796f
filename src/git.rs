// Version-control gateway: a narrow capability trait over git, the
// process-executing implementation of it, and the two sequences the
// upload workflow needs (ensure the checkout, then commit and push).

use crate::error::{Error, Result};
use crate::layout::{IMAGES_DIR, LITEMATIC_DIR};
use reqwest::Url;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Name of the remote the checkout pushes to.
pub const REMOTE: &str = "origin";
/// Branch fetched first and always pushed to.
pub const PRIMARY_BRANCH: &str = "main";
/// Local branch that is reset onto the remote tip on every sync.
pub const WORKING_BRANCH: &str = "upload-temp";

/// A failed git invocation, carrying its diagnostic output. URL
/// credentials are stripped from the message on construction.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl AsRef<str>) -> Self {
        CommandError {
            message: strip_credentials(message.as_ref()),
        }
    }

    fn from_output(shown: &str, output: &Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stderr.trim().is_empty() {
            CommandError::new(stderr.trim())
        } else if !stdout.trim().is_empty() {
            CommandError::new(stdout.trim())
        } else {
            CommandError::new(format!("command failed: git {}", shown))
        }
    }
}

impl From<io::Error> for CommandError {
    fn from(err: io::Error) -> Self {
        CommandError::new(err.to_string())
    }
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// The operations the gateway needs from a version-control client. Every
/// operation acts on one fixed checkout directory.
pub trait VersionControl {
    /// Make the checkout a repository. No-op if it already is one.
    fn initialize(&self) -> CommandResult<()>;

    /// Replace the remote `name` so it points at `url`.
    fn set_remote(&self, name: &str, url: &str) -> CommandResult<()>;

    /// Fetch `branch` from `remote`, or the remote's default branch when
    /// `branch` is `None`. Returns the ref the working branch should be
    /// reset onto.
    fn fetch_branch(&self, remote: &str, branch: Option<&str>) -> CommandResult<String>;

    /// Create or force-reset `branch` to `target` and check it out,
    /// discarding local changes to tracked files.
    fn reset_working_branch_to(&self, branch: &str, target: &str) -> CommandResult<()>;

    /// Stage exactly `paths`, relative to the checkout root.
    fn stage(&self, paths: &[PathBuf]) -> CommandResult<()>;

    /// Whether any of `paths` has a staged change.
    fn has_pending_changes(&self, paths: &[PathBuf]) -> CommandResult<bool>;

    fn commit(&self, message: &str) -> CommandResult<()>;

    /// Push the current HEAD to `refspec` on `remote`.
    fn push(&self, remote: &str, refspec: &str) -> CommandResult<()>;
}

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    global_options: Vec<String>,
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(program: impl Into<OsString>, workdir: impl Into<PathBuf>) -> Self {
        GitCli {
            program: program.into(),
            global_options: Vec::new(),
            workdir: workdir.into(),
        }
    }

    /// Options passed as `git -c <option>` to every invocation.
    pub fn with_global_options(mut self, options: Vec<String>) -> Self {
        self.global_options = options;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        for option in &self.global_options {
            cmd.arg("-c").arg(option);
        }
        cmd.current_dir(&self.workdir);
        hide_console(&mut cmd);
        cmd
    }

    fn run<I, S>(&self, args: I) -> CommandResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let shown = args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        self.run_as(&args, &shown)
    }

    /// Run with `shown` standing in for the arguments in logs and
    /// diagnostics.
    fn run_as(&self, args: &[OsString], shown: &str) -> CommandResult<String> {
        log::debug!("git {}", shown);
        let output = self.command().args(args).output().map_err(|err| {
            CommandError::new(format!(
                "cannot run {}: {}",
                self.program.to_string_lossy(),
                err
            ))
        })?;
        if !output.status.success() {
            let err = CommandError::from_output(shown, &output);
            log::debug!("git {} failed: {}", shown, err);
            return Err(err);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

impl VersionControl for GitCli {
    fn initialize(&self) -> CommandResult<()> {
        if self.workdir.join(".git").exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.workdir)?;
        self.run(["init"])?;
        mark_hidden(&self.workdir);
        Ok(())
    }

    fn set_remote(&self, name: &str, url: &str) -> CommandResult<()> {
        // Absence of the remote is fine.
        let _ = self.run(["remote", "remove", name]);
        let args: Vec<OsString> = ["remote", "add", name, url]
            .iter()
            .map(OsString::from)
            .collect();
        self.run_as(&args, &format!("remote add {} <authenticated url>", name))?;
        Ok(())
    }

    fn fetch_branch(&self, remote: &str, branch: Option<&str>) -> CommandResult<String> {
        match branch {
            Some(branch) => {
                self.run(["fetch", remote, branch])?;
                Ok(format!("{}/{}", remote, branch))
            }
            None => {
                self.run(["fetch", remote])?;
                // A plain init + remote add never records the remote's HEAD.
                self.run(["remote", "set-head", remote, "--auto"])?;
                Ok(format!("{}/HEAD", remote))
            }
        }
    }

    fn reset_working_branch_to(&self, branch: &str, target: &str) -> CommandResult<()> {
        self.run(["checkout", "--force", "-B", branch, target])?;
        Ok(())
    }

    fn stage(&self, paths: &[PathBuf]) -> CommandResult<()> {
        let mut args: Vec<OsString> = vec!["add".into(), "--".into()];
        args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        self.run(args)?;
        Ok(())
    }

    fn has_pending_changes(&self, paths: &[PathBuf]) -> CommandResult<bool> {
        let mut args: Vec<OsString> = vec!["status".into(), "--porcelain".into(), "--".into()];
        args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        let status = self.run(args)?;
        Ok(has_staged_entries(&status))
    }

    fn commit(&self, message: &str) -> CommandResult<()> {
        self.run(["commit", "-m", message])?;
        Ok(())
    }

    fn push(&self, remote: &str, refspec: &str) -> CommandResult<()> {
        self.run(["push", remote, refspec])?;
        Ok(())
    }
}

/// True if any `git status --porcelain` line has an index-side change.
pub fn has_staged_entries(porcelain: &str) -> bool {
    porcelain.lines().any(|line| {
        matches!(line.chars().next(), Some(c) if c != ' ' && c != '?' && c != '!')
    })
}

/// Remote URL with the access token in its credential segment. Only
/// http(s) URLs carry credentials; anything else is returned unchanged.
pub fn authenticated_url(remote_url: &str, access_token: &str) -> String {
    if access_token.is_empty() {
        return remote_url.to_string();
    }
    match Url::parse(remote_url) {
        Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
            if url.set_username(access_token).is_ok() {
                url.to_string()
            } else {
                remote_url.to_string()
            }
        }
        _ => remote_url.to_string(),
    }
}

/// Drop the user-info segment (`user[:password]@`) of every URL in `text`.
pub fn strip_credentials(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("://") {
        let (head, tail) = rest.split_at(pos + 3);
        out.push_str(head);
        let end = tail
            .find(|c: char| c == '/' || c == '\'' || c == '"' || c.is_whitespace())
            .unwrap_or(tail.len());
        let authority = &tail[..end];
        match authority.rfind('@') {
            Some(at) => out.push_str(&authority[at + 1..]),
            None => out.push_str(authority),
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(windows)]
fn hide_console(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_cmd: &mut Command) {}

#[cfg(windows)]
fn mark_hidden(path: &Path) {
    let mut cmd = Command::new("attrib");
    cmd.arg("+h").arg(path);
    hide_console(&mut cmd);
    if let Err(err) = cmd.status() {
        log::debug!("cannot hide {}: {}", path.display(), err);
    }
}

#[cfg(not(windows))]
fn mark_hidden(_path: &Path) {}

/// Runs the sync and publish sequences against one checkout.
#[derive(Debug)]
pub struct Gateway<V> {
    vcs: V,
    root: PathBuf,
}

impl<V: VersionControl> Gateway<V> {
    pub fn new(vcs: V, root: impl Into<PathBuf>) -> Self {
        Gateway {
            vcs,
            root: root.into(),
        }
    }

    /// Root of the checkout all relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Bring the checkout to the remote's current tip: init if needed,
    /// re-point `origin`, fetch, purge the content directories and reset
    /// the working branch.
    pub fn ensure_repository(&self, remote_url: &str, access_token: &str) -> Result<()> {
        let sync_error = |err: CommandError| Error::RepositorySync(err.to_string());

        self.vcs.initialize().map_err(sync_error)?;

        log::info!(
            "syncing {} with {}",
            self.root.display(),
            strip_credentials(remote_url)
        );
        let url = authenticated_url(remote_url, access_token);
        self.vcs.set_remote(REMOTE, &url).map_err(sync_error)?;

        let target = match self.vcs.fetch_branch(REMOTE, Some(PRIMARY_BRANCH)) {
            Ok(target) => target,
            Err(err) => {
                log::warn!(
                    "fetching {} failed, falling back to the remote default branch: {}",
                    PRIMARY_BRANCH,
                    err
                );
                self.vcs.fetch_branch(REMOTE, None).map_err(sync_error)?
            }
        };

        self.purge_content().map_err(|err| {
            Error::RepositorySync(format!("cannot clear stale files: {}", err))
        })?;

        self.vcs
            .reset_working_branch_to(WORKING_BRANCH, &target)
            .map_err(sync_error)?;
        log::info!("checkout reset onto {}", target);
        Ok(())
    }

    /// Stage `paths`, then commit and push them. Returns `false` without
    /// committing when nothing changed.
    pub fn commit_and_push(&self, message: &str, paths: &[PathBuf]) -> Result<bool> {
        let push_error = |err: CommandError| Error::Push(err.to_string());

        let relative: Vec<PathBuf> = paths
            .iter()
            .map(|p| p.strip_prefix(&self.root).unwrap_or(p).to_path_buf())
            .collect();

        self.vcs.stage(&relative).map_err(push_error)?;
        if !self.vcs.has_pending_changes(&relative).map_err(push_error)? {
            log::info!("no file changes, skipping commit");
            return Ok(false);
        }

        self.vcs.commit(message).map_err(push_error)?;
        self.vcs
            .push(REMOTE, &format!("HEAD:{}", PRIMARY_BRANCH))
            .map_err(push_error)?;
        log::info!("pushed \"{}\" to {}/{}", message, REMOTE, PRIMARY_BRANCH);
        Ok(true)
    }

    fn purge_content(&self) -> io::Result<()> {
        for dir in [LITEMATIC_DIR, IMAGES_DIR] {
            let dir = self.root.join(dir);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }
}
