//! Restricted shell for plan sessions.

use std::fmt::Write as _;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use super::Denial;

pub const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Read-only inspection commands. Matched on whole tokens.
pub const ALLOWED_PREFIXES: &[&str] = &[
    "ls",
    "cat",
    "head",
    "tail",
    "wc",
    "pwd",
    "find",
    "grep",
    "rg",
    "tree",
    "file",
    "stat",
    "du",
    "which",
    "echo",
    "git status",
    "git log",
    "git diff",
    "git show",
    "git branch",
    "git blame",
    "git ls-files",
    "git rev-parse",
    "git remote -v",
    "npm ls",
];

/// Mutating or privileged commands. Checked before the allow list.
pub const DENIED_PREFIXES: &[&str] = &[
    "git commit",
    "git push",
    "git pull",
    "git fetch",
    "git reset",
    "git checkout",
    "git switch",
    "git restore",
    "git merge",
    "git rebase",
    "git add",
    "git rm",
    "git mv",
    "git stash",
    "git clean",
    "git tag",
    "git cherry-pick",
    "git revert",
    "git apply",
    "git am",
    "npm install",
    "npm i",
    "npm uninstall",
    "npm publish",
    "yarn add",
    "yarn install",
    "pnpm add",
    "pnpm install",
    "pip install",
    "pip uninstall",
    "cargo install",
    "cargo add",
    "cargo publish",
    "brew install",
    "apt",
    "apt-get",
    "rm",
    "rmdir",
    "mv",
    "cp",
    "chmod",
    "chown",
    "dd",
    "mkfs",
    "truncate",
    "touch",
    "mkdir",
    "ln",
    "tee",
    "sudo",
    "su",
    "doas",
];

/// `find` actions that execute, delete, or write their output to a file.
const DENIED_FIND_ACTIONS: &[&str] = &[
    "-delete", "-exec", "-execdir", "-ok", "-okdir", "-fprint", "-fprint0", "-fprintf", "-fls",
];

/// Long options that write files or run other programs, whatever the
/// command. Unambiguous abbreviations count too; git accepts them.
const DENIED_LONG_OPTIONS: &[&str] = &["--output", "--ext-diff", "--pre", "--compile"];

/// Short flags with the same effect, per command: `tree -o` writes its
/// listing, `tree -R` drops HTML files, `file -C` compiles a magic file.
const DENIED_SHORT_FLAGS: &[(&str, &[char])] = &[("tree", &['o', 'R']), ("file", &['C'])];

/// Flags under which `git branch` only lists. Positional arguments are
/// accepted as patterns only together with `--list`.
const BRANCH_LISTING_FLAGS: &[&str] = &[
    "-a",
    "--all",
    "-r",
    "--remotes",
    "-v",
    "-vv",
    "--verbose",
    "--show-current",
    "-l",
    "--list",
    "--column",
    "--no-column",
    "--color",
    "--no-color",
];

const COMPOUND_MARKERS: &[&str] = &[";", "&", "|", ">", "<", "`", "$(", "\n", "\r"];

/// Checks `command` against the restricted shell policy.
///
/// Compound syntax is rejected first, then deny prefixes, then options that
/// turn an inspection command into a writer, then allow prefixes. Anything
/// matching neither list is rejected. Quotes are stripped before matching
/// since bash strips them before the program sees its arguments.
pub fn check_command(command: &str) -> Result<(), Denial> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(Denial::new("command must not be empty"));
    }

    if let Some(marker) = COMPOUND_MARKERS.iter().find(|marker| trimmed.contains(**marker)) {
        return Err(Denial::new(format!(
            "compound commands, pipes and redirection are not allowed in plan mode (found {:?})",
            marker
        )));
    }

    let unquoted: Vec<String> = trimmed.split_whitespace().map(unquote).collect();
    let tokens: Vec<&str> = unquoted.iter().map(String::as_str).collect();

    if let Some(prefix) = DENIED_PREFIXES
        .iter()
        .find(|prefix| starts_with_tokens(&tokens, prefix))
    {
        return Err(Denial::new(format!(
            "'{prefix}' modifies the workspace or system and is not allowed in plan mode"
        )));
    }

    check_options(&tokens)?;

    if ALLOWED_PREFIXES
        .iter()
        .any(|prefix| starts_with_tokens(&tokens, prefix))
    {
        return Ok(());
    }

    Err(Denial::new(format!(
        "'{}' is not on the plan-mode allow list of read-only commands",
        tokens.first().copied().unwrap_or_default()
    )))
}

fn check_options(tokens: &[&str]) -> Result<(), Denial> {
    let Some((&program, args)) = tokens.split_first() else {
        return Ok(());
    };
    let short_flags = DENIED_SHORT_FLAGS
        .iter()
        .find(|(name, _)| *name == program)
        .map_or(&[][..], |(_, flags)| *flags);

    for &arg in args {
        if let Some(option) = denied_long_option(arg) {
            return Err(Denial::new(format!(
                "'{option}' writes files or runs other programs and is not allowed in plan mode"
            )));
        }
        let is_short_cluster = arg.len() > 1 && arg.starts_with('-') && !arg.starts_with("--");
        if is_short_cluster && arg.chars().skip(1).any(|flag| short_flags.contains(&flag)) {
            return Err(Denial::new(format!(
                "'{program} {arg}' writes files and is not allowed in plan mode"
            )));
        }
        if program == "find" && DENIED_FIND_ACTIONS.contains(&arg) {
            return Err(Denial::new(format!(
                "find action '{arg}' is not allowed in plan mode"
            )));
        }
    }

    if starts_with_tokens(tokens, "git branch") {
        check_branch_listing(&tokens[2..])?;
    }
    if starts_with_tokens(tokens, "git remote")
        && !tokens[2..].iter().all(|arg| matches!(*arg, "-v" | "--verbose"))
    {
        return Err(Denial::new("only 'git remote -v' is allowed in plan mode"));
    }
    Ok(())
}

/// Returns the denied long option `arg` spells out or abbreviates.
fn denied_long_option(arg: &str) -> Option<&'static str> {
    if !arg.starts_with("--") {
        return None;
    }
    let name = arg.split('=').next().unwrap_or(arg);
    DENIED_LONG_OPTIONS
        .iter()
        .copied()
        .find(|option| *option == name || (name.len() >= 4 && option.starts_with(name)))
}

fn check_branch_listing(args: &[&str]) -> Result<(), Denial> {
    let listing = args.iter().any(|arg| matches!(*arg, "-l" | "--list"));
    for &arg in args {
        let allowed = if arg.starts_with('-') {
            let name = arg.split('=').next().unwrap_or(arg);
            BRANCH_LISTING_FLAGS.contains(&name)
        } else {
            listing
        };
        if !allowed {
            return Err(Denial::new(format!(
                "only listing forms of 'git branch' are allowed in plan mode (found '{arg}')"
            )));
        }
    }
    Ok(())
}

fn unquote(token: &str) -> String {
    token
        .chars()
        .filter(|ch| !matches!(ch, '\'' | '"' | '\\'))
        .collect()
}

fn starts_with_tokens(tokens: &[&str], prefix: &str) -> bool {
    let prefix_tokens: Vec<&str> = prefix.split_whitespace().collect();
    tokens.len() >= prefix_tokens.len()
        && tokens
            .iter()
            .zip(prefix_tokens.iter())
            .all(|(token, expected)| token == expected)
}

/// Output of one restricted shell run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub ok: bool,
    pub content: String,
}

/// Runs an already-checked command in `cwd` with a hard timeout.
pub async fn run_command(command: &str, cwd: &Path, timeout: Duration) -> ShellOutput {
    let child = Command::new("bash")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(error) => {
            return ShellOutput {
                ok: false,
                content: format!("Failed to launch bash command: {error}"),
            };
        }
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(error)) => {
            return ShellOutput {
                ok: false,
                content: format!("Failed waiting for bash command: {error}"),
            };
        }
        Err(_) => {
            return ShellOutput {
                ok: false,
                content: format!("status: timeout after {}s", timeout.as_secs()),
            };
        }
    };

    let mut content = String::new();
    let _ = write!(
        content,
        "status: {}\nstdout:\n{}\nstderr:\n{}",
        format_exit_status(output.status),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    ShellOutput {
        ok: output.status.success(),
        content: truncate_to_byte_limit(content, MAX_OUTPUT_BYTES),
    }
}

pub(crate) fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes.min(content.len());
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit_code={code}"),
        None => "exit_code=terminated_by_signal".to_string(),
    }
}
