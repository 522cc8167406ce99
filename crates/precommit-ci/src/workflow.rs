//! Workflow commands understood by the CI log viewer.
//!
//! Commands are plain `::name::value` lines on stdout.

/// Escape a command value so `%`, CR and LF survive the log parser.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Format a workflow command line.
pub fn command(name: &str, value: &str) -> String {
    format!("::{}::{}", name, escape_data(value))
}

/// Collapsible log section, closed when dropped.
#[must_use = "the group closes as soon as the guard is dropped"]
pub struct LogGroup {
    name: String,
}

impl LogGroup {
    pub fn start(name: &str) -> Self {
        println!("{}", command("group", name));
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        println!("::endgroup::");
    }
}

/// Ask the log viewer to mask `secret` everywhere it appears.
pub fn add_mask(secret: &str) {
    if !secret.is_empty() {
        println!("{}", command("add-mask", secret));
    }
}

/// Report a failure annotation for the step.
pub fn error(message: &str) {
    println!("{}", command("error", message));
}
