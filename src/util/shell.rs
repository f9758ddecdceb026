//! Build log output.
//!
//! Pipeline steps announce themselves as headings. Inside GitHub Actions
//! a step's output is wrapped in a collapsible `::group::` instead, which
//! the runner renders as a foldable section.

use std::fmt::Display;

/// Prefix of a GitHub Actions log group start line.
pub const GROUP_START: &str = "::group::";

/// GitHub Actions log group end line.
pub const GROUP_END: &str = "::endgroup::";

/// How step headings are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    /// Plain headings through `tracing`
    #[default]
    Plain,
    /// GitHub Actions workflow commands on stdout
    GithubActions,
}

impl Shell {
    pub fn new(github_actions: bool) -> Self {
        if github_actions {
            Shell::GithubActions
        } else {
            Shell::Plain
        }
    }

    /// Announce a step.
    pub fn heading(&self, msg: impl Display) {
        tracing::info!("# {}", msg);
    }

    /// Run `work` inside a log group named `title`.
    pub fn group<T, E>(
        &self,
        title: impl Display,
        work: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        match self {
            Shell::Plain => {
                self.heading(title);
                work()
            }
            Shell::GithubActions => {
                println!("{}{}", GROUP_START, title);
                let result = work();
                println!("{}", GROUP_END);
                result
            }
        }
    }
}

/// Prefix group names in a container's output line with `breadcrumb`.
///
/// `::group::tests` becomes `::group::default/build > tests`; other lines
/// pass through unchanged.
pub fn prefix_group_line(line: &str, breadcrumb: &str) -> String {
    match line.strip_prefix(GROUP_START) {
        Some(name) => format!("{}{} > {}", GROUP_START, breadcrumb, name),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_group_line() {
        assert_eq!(
            prefix_group_line("::group::staticAnalysis", "default/build"),
            "::group::default/build > staticAnalysis"
        );
        assert_eq!(
            prefix_group_line("compiling main.go", "default/build"),
            "compiling main.go"
        );
        assert_eq!(prefix_group_line("::endgroup::", "default/build"), "::endgroup::");
    }

    #[test]
    fn test_group_returns_work_result() {
        for shell in [Shell::Plain, Shell::GithubActions] {
            let ok: Result<i32, String> = shell.group("step", || Ok(3));
            assert_eq!(ok, Ok(3));

            let err: Result<(), String> = shell.group("step", || Err("boom".to_string()));
            assert_eq!(err, Err("boom".to_string()));
        }
    }
}
