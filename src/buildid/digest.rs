use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::BuildIdError;

const MALFORMED_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestBackend {
    Builtin,
    /// Command line of an external `sha256sum`-style tool, read from stdin.
    External(String),
}

impl DigestBackend {
    pub fn describe(&self) -> String {
        match self {
            Self::Builtin => "builtin-sha256".to_string(),
            Self::External(command) => format!("external:{command}"),
        }
    }
}

pub fn digest(backend: &DigestBackend, preimage: &[u8]) -> Result<String, BuildIdError> {
    match backend {
        DigestBackend::Builtin => Ok(format!("{:x}", Sha256::digest(preimage))),
        DigestBackend::External(command) => external_digest(command, preimage),
    }
}

fn is_sha256_token(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// First whitespace-separated 64-hex token in the tool's stdout, lowercased.
/// Handles both `sha256sum` (`<hex>  -`) and `openssl dgst` (`...= <hex>`).
pub fn extract_token(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .find(|token| is_sha256_token(token))
        .map(str::to_ascii_lowercase)
}

fn external_digest(command: &str, preimage: &[u8]) -> Result<String, BuildIdError> {
    let mut words = command.split_whitespace();
    let Some(program) = words.next() else {
        return Err(BuildIdError::MissingDigestTool(
            "empty digest command".to_string(),
        ));
    };
    let bin = which::which(program)
        .map_err(|err| BuildIdError::MissingDigestTool(format!("{program}: {err}")))?;

    let mut child = Command::new(&bin)
        .args(words)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| BuildIdError::MissingDigestTool(format!("{}: {err}", bin.display())))?;

    // Feed stdin from its own thread so a tool that writes while reading
    // cannot fill the stdout pipe and stall both sides.
    let stdin = child.stdin.take();
    let input = preimage.to_vec();
    let writer = thread::spawn(move || -> std::io::Result<()> {
        let Some(mut stdin) = stdin else {
            return Ok(());
        };
        match stdin.write_all(&input) {
            Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    });
    let output = child
        .wait_with_output()
        .map_err(|err| BuildIdError::DigestToolFailed(format!("{command}: {err}")))?;
    match writer.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            return Err(BuildIdError::DigestToolFailed(format!("{command}: {err}")));
        }
        Err(_) => {
            return Err(BuildIdError::DigestToolFailed(format!(
                "{command}: stdin writer panicked"
            )));
        }
    }
    if !output.status.success() {
        return Err(BuildIdError::DigestToolFailed(format!(
            "{command} exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    extract_token(&stdout).ok_or_else(|| {
        let excerpt: String = stdout.trim().chars().take(MALFORMED_EXCERPT_CHARS).collect();
        BuildIdError::MalformedDigest(format!("{command}: {excerpt}"))
    })
}
