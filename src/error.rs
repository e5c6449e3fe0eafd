#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Run,
    Assertion,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Run => "RUN",
            ErrorCategory::Assertion => "ASSERTION",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set provider credentials (for example OPENAI_API_KEY) or run with --provider simulated."
            }
            ErrorCategory::Run => {
                "Raise --run-timeout-secs or --max-turns, or retry with RUST_LOG=info for run logs."
            }
            ErrorCategory::Assertion => {
                "Inspect the report table above. Results depend on the selected model."
            }
            ErrorCategory::Input => "Run aigentic-bench --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key")
        || msg.contains("provider")
        || msg.contains("chat completion")
    {
        return ErrorCategory::Provider;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("dataset")
        || msg.contains("profile")
        || msg.contains("empty prompt")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("benchmarks failed") || msg.contains("below threshold") {
        return ErrorCategory::Assertion;
    }

    if msg.contains("timed out")
        || msg.contains("agent run")
        || msg.contains("model turns")
        || msg.contains("approval")
    {
        return ErrorCategory::Run;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        redacted_error_chain(err),
        category.hint()
    )
}

const MIN_REDACTED_KEY_CHARS: usize = 6;

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

/// Mask `sk-` style API keys that surface in provider errors. Only the
/// `sk-[A-Za-z0-9_-]+` run is replaced; surrounding punctuation is kept.
pub fn redact_sensitive_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("sk-") {
        out.push_str(&rest[..pos]);
        let at_word_start = out
            .chars()
            .next_back()
            .is_none_or(|ch| !ch.is_ascii_alphanumeric());
        let tail = &rest[pos + 3..];
        let key_len = tail.find(|ch: char| !is_key_char(ch)).unwrap_or(tail.len());
        if at_word_start && key_len >= MIN_REDACTED_KEY_CHARS {
            out.push_str("sk-[REDACTED]");
        } else {
            out.push_str(&rest[pos..pos + 3 + key_len]);
        }
        rest = &tail[key_len..];
    }
    out.push_str(rest);
    out
}

/// Full error chain with secrets masked, for logs and telemetry.
pub fn redacted_error_chain(err: &anyhow::Error) -> String {
    redact_sensitive_text(&format!("{err:#}"))
}
