//! Tool invocations used by the lint run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::exec::CommandSpec;

/// Introspection snippet printing the interpreter path and version.
pub const PYTHON_IDENTITY_SCRIPT: &str = r#"import sys;print(sys.executable+"\n"+sys.version)"#;

/// Package installed by the dependency step.
pub const LINT_PACKAGE: &str = "pre-commit";

/// Executable names for every external tool, overridable for unusual runners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSet {
    /// Python interpreter used for the cache identity.
    pub python: String,

    /// Package manager.
    pub pip: String,

    /// Lint tool.
    pub pre_commit: String,

    /// Git binary.
    pub git: String,

    /// Archiver used by the cache client.
    pub tar: String,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            pip: "pip".to_string(),
            pre_commit: "pre-commit".to_string(),
            git: "git".to_string(),
            tar: "tar".to_string(),
        }
    }
}

impl ToolSet {
    /// `pip install pre-commit`
    pub fn install(&self) -> CommandSpec {
        CommandSpec::new(&self.pip, ["install", LINT_PACKAGE])
    }

    /// `pip freeze --local`
    pub fn freeze(&self) -> CommandSpec {
        CommandSpec::new(&self.pip, ["freeze", "--local"])
    }

    /// `python -c '<identity script>'`, captured.
    pub fn python_identity(&self) -> CommandSpec {
        CommandSpec::new(&self.python, ["-c", PYTHON_IDENTITY_SCRIPT]).capture()
    }

    /// `pre-commit run --show-diff-on-failure --color=always --config=<config> <extra...>`
    pub fn lint(&self, config: &Path, extra_args: &[String]) -> CommandSpec {
        let mut args = vec![
            "run".to_string(),
            "--show-diff-on-failure".to_string(),
            "--color=always".to_string(),
            format!("--config={}", config.display()),
        ];
        args.extend(extra_args.iter().cloned());
        CommandSpec::new(&self.pre_commit, args)
    }
}
