//! Process helpers for the build executor and post-build tasks.
//! Internal to `runner`; public API is defined in `runner/mod.rs`.

use super::NINJA_PROGRAM;
use camino::{Utf8Path, Utf8PathBuf};
use ninja_env::NINJA_ENV;
use std::{
    env,
    ffi::OsString,
    fs::File,
    io,
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
};
use tracing::info;

mod file_io;

pub use file_io::*;

fn resolve_ninja_program_utf8_with<F>(explicit: Option<&Utf8Path>, mut read_env: F) -> Utf8PathBuf
where
    F: FnMut(&str) -> Option<OsString>,
{
    if let Some(program) = explicit {
        return program.to_owned();
    }
    read_env(NINJA_ENV)
        .and_then(|value| {
            let path = PathBuf::from(value);
            Utf8PathBuf::from_path_buf(path).ok()
        })
        .unwrap_or_else(|| Utf8PathBuf::from(NINJA_PROGRAM))
}

/// Choose the executor: `explicit` if given, else `CROSSBUILD_NINJA`, else
/// `ninja` from `PATH`.
#[must_use]
pub fn resolve_ninja_program(explicit: Option<&Utf8Path>) -> Utf8PathBuf {
    resolve_ninja_program_utf8_with(explicit, |key| env::var_os(key))
}

fn log_command_execution(cmd: &Command) {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    info!("Running command: {} {}", program, args.join(" "));
}

/// Invoke the build executor on `build_file` from `working_dir`, inheriting
/// standard I/O, and return its exit status.
///
/// # Errors
///
/// Returns an [`io::Error`] if the process cannot be spawned or waited on.
pub fn run_ninja(program: &Utf8Path, working_dir: &Utf8Path, build_file: &Utf8Path) -> io::Result<ExitStatus> {
    let mut cmd = Command::new(program.as_std_path());
    cmd.current_dir(working_dir.as_std_path())
        .arg("-f")
        .arg(build_file.as_std_path())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    log_command_execution(&cmd);
    cmd.status()
}

/// Run a post-build task from `working_dir`.
///
/// When `out_file` is given it is created afresh and receives both standard
/// output and standard error; otherwise the task inherits the parent's
/// streams. The file is closed when the task finishes.
///
/// # Errors
///
/// Returns an [`io::Error`] if the output file cannot be created or the
/// process cannot be spawned.
pub fn run_task(
    program: &str,
    args: &[String],
    out_file: Option<&Utf8Path>,
    working_dir: &Utf8Path,
) -> io::Result<ExitStatus> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir.as_std_path())
        .stdin(Stdio::inherit());
    if let Some(path) = out_file {
        let file = File::create(working_dir.join(path))?;
        let stderr = file.try_clone()?;
        cmd.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
    } else {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }
    log_command_execution(&cmd);
    cmd.status()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_program_wins() {
        let resolved = resolve_ninja_program_utf8_with(Some(Utf8Path::new("/bin/ninja")), |_| {
            Some(OsString::from("/opt/ninja"))
        });
        assert_eq!(resolved, Utf8PathBuf::from("/bin/ninja"));
    }

    #[test]
    fn resolve_ninja_program_prefers_env_override() {
        let resolved = resolve_ninja_program_utf8_with(None, |_| Some(OsString::from("/opt/ninja")));
        assert_eq!(resolved, Utf8PathBuf::from("/opt/ninja"));
    }

    #[test]
    fn resolve_ninja_program_defaults_without_override() {
        let resolved = resolve_ninja_program_utf8_with(None, |_| None);
        assert_eq!(resolved, Utf8PathBuf::from(NINJA_PROGRAM));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_ninja_program_ignores_invalid_utf8_override() {
        use std::os::unix::ffi::OsStringExt;

        let resolved = resolve_ninja_program_utf8_with(None, |_| {
            Some(OsString::from_vec(vec![0xff, b'n', b'i', b'n', b'j', b'a']))
        });
        assert_eq!(resolved, Utf8PathBuf::from(NINJA_PROGRAM));
    }

    #[cfg(unix)]
    #[test]
    fn task_output_is_redirected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non UTF-8 temp path {}", p.display()))?;
        let args = vec!["-c".to_owned(), "echo out; echo err >&2".to_owned()];
        let status = run_task("sh", &args, Some(Utf8Path::new("log.txt")), &dir)?;
        anyhow::ensure!(status.success(), "task failed: {status}");
        let log = std::fs::read_to_string(dir.join("log.txt"))?;
        anyhow::ensure!(log.contains("out") && log.contains("err"), "log was {log:?}");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn task_exit_status_is_reported() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non UTF-8 temp path {}", p.display()))?;
        let status = run_task("sh", &["-c".to_owned(), "exit 4".to_owned()], None, &dir)?;
        anyhow::ensure!(status.code() == Some(4), "unexpected status {status}");
        Ok(())
    }
}
