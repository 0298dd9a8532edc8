//! The prompt string: `[repo branch] venv ~/path ＋ `.

use crate::executor::Executor;
use colored::Colorize;
use std::path::Path;
use tracing::debug;

/// Repository name and branch of the git work tree containing `cwd`.
pub fn git_info(executor: &Executor, cwd: &Path) -> Option<(String, String)> {
    let toplevel = executor
        .capture("git", &["rev-parse", "--show-toplevel"], cwd)
        .map_err(|e| debug!("Not in a git work tree: {}", e))
        .ok()?;
    let repo = Path::new(toplevel.trim())
        .file_name()?
        .to_string_lossy()
        .into_owned();
    let branch = executor
        .capture("git", &["rev-parse", "--abbrev-ref", "HEAD"], cwd)
        .map(|b| b.trim().to_string())
        .unwrap_or_else(|_| "?".to_string());
    Some((repo, branch))
}

/// `cwd` with the home directory shown as `~`.
pub fn display_path(cwd: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home {
        if let Ok(rest) = cwd.strip_prefix(home) {
            return if rest.as_os_str().is_empty() {
                "~".to_string()
            } else {
                format!("~/{}", rest.display())
            };
        }
    }
    cwd.display().to_string()
}

/// Name of the virtualenv at `virtual_env`; a system `/usr` prefix has none.
pub fn venv_name(virtual_env: Option<&str>) -> Option<String> {
    let path = virtual_env?.trim_end_matches('/');
    let name = Path::new(path).file_name()?.to_str()?;
    (name != "usr").then(|| name.to_string())
}

/// Builds the prompt; `virtual_env` is the value of `VIRTUAL_ENV`, if set.
pub fn render(executor: &Executor, cwd: &Path, home: Option<&Path>, virtual_env: Option<&str>) -> String {
    let git = match git_info(executor, cwd) {
        Some((repo, branch)) => format!("[{} {}] ", repo.cyan(), branch.bold().green()),
        None => String::new(),
    };
    let venv = match venv_name(virtual_env) {
        Some(name) => format!("{} ", name.magenta()),
        None => String::new(),
    };
    format!(
        "{}{}{}{}",
        git,
        venv,
        display_path(cwd, home).bright_cyan(),
        " ＋ ".bold().magenta()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockProcessRunner;
    use std::sync::Arc;

    #[test]
    fn test_home_is_abbreviated() {
        let home = Path::new("/home/ada");

        assert_eq!(display_path(Path::new("/home/ada"), Some(home)), "~");
        assert_eq!(display_path(Path::new("/home/ada/src/crust"), Some(home)), "~/src/crust");
        assert_eq!(display_path(Path::new("/home/adam"), Some(home)), "/home/adam");
        assert_eq!(display_path(Path::new("/etc"), None), "/etc");
    }

    #[test]
    fn test_git_info_from_rev_parse() {
        // The mock answers every git call the same way.
        let runner = MockProcessRunner::new().with_success("git", "/home/ada/src/crust\n");
        let executor = Executor::new(Arc::new(runner));

        let (repo, branch) = git_info(&executor, Path::new("/home/ada/src/crust")).unwrap();

        assert_eq!(repo, "crust");
        assert_eq!(branch, "/home/ada/src/crust");
    }

    #[test]
    fn test_outside_repository_has_no_git_segment() {
        let runner = MockProcessRunner::new().with_failure("git", 128, "not a git repository");
        let executor = Executor::new(Arc::new(runner));

        assert!(git_info(&executor, Path::new("/tmp")).is_none());
        let prompt = render(&executor, Path::new("/tmp"), None, None);
        assert!(prompt.contains("/tmp"));
        assert!(!prompt.starts_with('['));
    }

    #[test]
    fn test_venv_name_is_the_last_path_component() {
        assert_eq!(venv_name(Some("/home/ada/.venvs/ml")).as_deref(), Some("ml"));
        assert_eq!(venv_name(Some("/home/ada/proj/.venv/")).as_deref(), Some(".venv"));
        assert_eq!(venv_name(Some("/usr")), None);
        assert_eq!(venv_name(Some("")), None);
        assert_eq!(venv_name(None), None);
    }

    #[test]
    fn test_venv_segment_comes_before_the_path() {
        colored::control::set_override(false);
        let runner = MockProcessRunner::new().with_failure("git", 128, "not a git repository");
        let executor = Executor::new(Arc::new(runner));

        let prompt = render(&executor, Path::new("/tmp"), None, Some("/home/ada/.venvs/ml"));

        assert_eq!(prompt, "ml /tmp ＋ ");
    }
}
