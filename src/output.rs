//! Shared output formatting for hf commands.
//!
//! Every command renders either a human block (header, summary, details,
//! warnings, next steps) or a JSON envelope carrying the same data.

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "hustle.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    let hint = next_steps.first().map(|step| step.as_str());
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: err.kind(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// Best-effort command name for error envelopes, used when clap parsing
/// itself did not get far enough to tell us.
pub fn infer_command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--dir" {
            // Its value is a path, not a command.
            args.next();
        } else if !arg.starts_with('-') {
            positional.push(arg);
        }
    }
    let mut words = positional.into_iter();

    let Some(command) = words.next() else {
        return "hf".to_string();
    };

    let grouped = matches!(
        command.as_str(),
        "item" | "board" | "doc" | "wiki" | "time" | "project" | "skill" | "agent" | "sync"
            | "integration" | "report"
    );
    match words.next() {
        Some(sub) if grouped => format!("{command} {sub}"),
        _ => command,
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::ConfigurationMissing("remote store") | Error::ConfigurationMissing("blob storage") => {
            vec![
                "set [remote] url and api_key in hustle.toml, or HUSTLE_REMOTE_URL and HUSTLE_REMOTE_KEY"
                    .to_string(),
            ]
        }
        Error::ConfigurationMissing("assist endpoint") => {
            vec!["set [assist] endpoint in hustle.toml, or HUSTLE_ASSIST_URL".to_string()]
        }
        Error::NotFound { kind: "work item", .. } => vec!["hf item list".to_string()],
        Error::NotFound { kind: "skill", .. } => vec!["hf skill list".to_string()],
        Error::NotFound { kind: "board", .. } => vec!["hf board list".to_string()],
        Error::InvalidConfig(_) => vec!["fix hustle.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["another hf process holds the workspace; retry".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_skips_empty_sections() {
        let mut out = HumanOutput::new("hf item add: created");
        out.push_summary("id", "abc");
        out.push_next_step("hf item advance abc");
        let text = format_human(&out);
        assert!(text.starts_with("hf item add: created"));
        assert!(text.contains("Summary:\n- id: abc"));
        assert!(!text.contains("Warnings:"));
        assert!(text.contains("Next steps:\n- hf item advance abc"));
    }

    #[test]
    fn missing_remote_suggests_configuration() {
        let steps = error_next_steps(&Error::ConfigurationMissing("remote store"));
        assert!(steps[0].contains("HUSTLE_REMOTE_URL"));
        assert!(error_next_steps(&Error::OperationFailed("x".into())).is_empty());
    }
}
