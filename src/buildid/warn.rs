#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    W001ProbeSpawnFailed,
    W002ProbeNonZeroExit,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::W001ProbeSpawnFailed => "W001",
            Self::W002ProbeNonZeroExit => "W002",
        }
    }
}

/// Longest value kept in a warn line; tool commands can be arbitrarily long.
const MAX_TOKEN_CHARS: usize = 96;

/// Squash a value into one `key=value` token: words joined by `_`, `=` turned
/// into `:` so the line still splits on it, non-printable text dropped.
fn field_token(value: &str) -> String {
    let words: Vec<String> = value
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(char::is_ascii_graphic)
                .map(|ch| if ch == '=' { ':' } else { ch })
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect();
    if words.is_empty() {
        return "-".to_string();
    }
    let joined = words.join("_");
    match joined.char_indices().nth(MAX_TOKEN_CHARS) {
        Some((cut, _)) => format!("{}...", &joined[..cut]),
        None => joined,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: WarnCode,
    pub stage: &'a str,
    pub probe: &'a str,
    pub status: &'a str,
    pub reason: &'a str,
}

pub fn format_event(event: WarnEvent<'_>) -> String {
    format!(
        "BUILD_ID_WARN code={} stage={} probe={} status={} reason={}",
        event.code.as_str(),
        field_token(event.stage),
        field_token(event.probe),
        field_token(event.status),
        field_token(event.reason),
    )
}

pub fn emit(event: WarnEvent<'_>) {
    eprintln!("{}", format_event(event));
}
