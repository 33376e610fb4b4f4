//! SSH key material, known-hosts lines and connection options.
//!
//! Everything here is text in, text out. Spawning agents and writing key
//! files happens in `crate::infra::ssh`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::domain::error::ClientError;

/// PEM labels accepted for private keys.
pub const KEY_TYPES: &[&str] = &[
    "OPENSSH PRIVATE KEY",
    "RSA PRIVATE KEY",
    "EC PRIVATE KEY",
    "DSA PRIVATE KEY",
    "ENCRYPTED PRIVATE KEY",
    "PRIVATE KEY",
];

const BEGIN_MARKER: &str = "-----BEGIN ";
const END_MARKER: &str = "-----END ";

/// Normalizes a stored private key into PEM text ready for `ssh-add` or a
/// key file.
///
/// Input that does not contain a `-----BEGIN` marker is treated as base64
/// of the PEM text. Line endings become `\n` and a trailing newline is
/// guaranteed.
///
/// # Errors
///
/// Returns [`ClientError::InvalidKeyMaterial`] if the key cannot be decoded,
/// lacks BEGIN/END markers, or carries an unrecognized key type.
pub fn normalize_private_key(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidKeyMaterial("key is empty".into()));
    }

    let text = if trimmed.contains(BEGIN_MARKER) {
        trimmed.to_string()
    } else {
        let compact: String = trimmed.split_whitespace().collect();
        let bytes = BASE64
            .decode(compact)
            .map_err(|_| ClientError::InvalidKeyMaterial("not PEM and not base64".into()))?;
        String::from_utf8(bytes)
            .map_err(|_| ClientError::InvalidKeyMaterial("decoded key is not text".into()))?
    };

    let mut pem = text.replace("\r\n", "\n").replace('\r', "\n");
    pem = pem.trim().to_string();
    pem.push('\n');

    let label = pem_label(&pem)?;
    if !KEY_TYPES.contains(&label) {
        return Err(ClientError::InvalidKeyMaterial(format!(
            "unsupported key type: {label}"
        )));
    }
    if !pem.contains(&format!("{END_MARKER}{label}-----")) {
        return Err(ClientError::InvalidKeyMaterial(format!(
            "missing END marker for {label}"
        )));
    }
    Ok(pem)
}

fn pem_label(pem: &str) -> Result<&str, ClientError> {
    let start = pem
        .find(BEGIN_MARKER)
        .ok_or_else(|| ClientError::InvalidKeyMaterial("missing BEGIN marker".into()))?
        + BEGIN_MARKER.len();
    let rest = &pem[start..];
    let end = rest
        .find("-----")
        .ok_or_else(|| ClientError::InvalidKeyMaterial("malformed BEGIN marker".into()))?;
    Ok(&rest[..end])
}

// ── Known hosts ──────────────────────────────────────────────────────────────

/// A parsed `known_hosts` line: `<host[,alias...]> <key-type> <key-data>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHostsEntry {
    pub hosts: Vec<String>,
    pub key_type: String,
    pub key_data: String,
}

impl KnownHostsEntry {
    /// Parses a single known-hosts line.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SshSetupFailed`] if the line has fewer than
    /// three fields or an empty key.
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let mut fields = line.split_whitespace();
        let (Some(hosts), Some(key_type), Some(key_data)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ClientError::SshSetupFailed(format!(
                "host key entry must be '<host> <type> <key>' (got: {line:?})"
            )));
        };
        if !key_type.starts_with("ssh-") && !key_type.starts_with("ecdsa-") {
            return Err(ClientError::SshSetupFailed(format!(
                "unrecognized host key type: {key_type}"
            )));
        }
        Ok(Self {
            hosts: hosts
                .split(',')
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect(),
            key_type: key_type.to_string(),
            key_data: key_data.to_string(),
        })
    }

    /// Adds host aliases not already present, keeping order.
    pub fn add_aliases<'a>(&mut self, aliases: impl IntoIterator<Item = &'a str>) {
        for alias in aliases {
            if !alias.is_empty() && !self.hosts.iter().any(|h| h == alias) {
                self.hosts.push(alias.to_string());
            }
        }
    }

    /// Renders the entry as a known-hosts line with a trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}\n",
            self.hosts.join(","),
            self.key_type,
            self.key_data
        )
    }
}

/// Host-key checking mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// A pinned entry exists; reject anything else.
    Pinned,
    /// Record the first key seen so it can be pinned later.
    AcceptNew,
}

impl HostKeyPolicy {
    #[must_use]
    pub fn strict_host_key_checking(self) -> &'static str {
        match self {
            Self::Pinned => "yes",
            Self::AcceptNew => "accept-new",
        }
    }
}

/// `-o` options for `ssh` given a policy and file locations.
#[must_use]
pub fn ssh_options(
    policy: HostKeyPolicy,
    known_hosts: &str,
    identity_file: Option<&str>,
) -> Vec<String> {
    let mut opts = vec![
        "-o".to_string(),
        format!("StrictHostKeyChecking={}", policy.strict_host_key_checking()),
        "-o".to_string(),
        format!("UserKnownHostsFile={known_hosts}"),
        "-o".to_string(),
        "PasswordAuthentication=no".to_string(),
        "-o".to_string(),
        "PubkeyAuthentication=yes".to_string(),
    ];
    if let Some(path) = identity_file {
        opts.push("-o".to_string());
        opts.push("IdentitiesOnly=yes".to_string());
        opts.push("-i".to_string());
        opts.push(path.to_string());
    }
    opts
}

// ── ssh-agent ────────────────────────────────────────────────────────────────

/// Socket and pid printed by `ssh-agent -s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEnv {
    pub auth_sock: String,
    pub pid: u32,
}

/// Parses Bourne-shell output of `ssh-agent -s`, e.g.
/// `SSH_AUTH_SOCK=/tmp/ssh-x/agent.1; export SSH_AUTH_SOCK;`.
#[must_use]
pub fn parse_agent_output(output: &str) -> Option<AgentEnv> {
    let mut sock = None;
    let mut pid = None;
    for stmt in output.split([';', '\n']) {
        let Some((key, value)) = stmt.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            "SSH_AUTH_SOCK" => sock = Some(value.trim().to_string()),
            "SSH_AGENT_PID" => pid = value.trim().parse().ok(),
            _ => {}
        }
    }
    Some(AgentEnv {
        auth_sock: sock.filter(|s| !s.is_empty())?,
        pid: pid?,
    })
}

// ── Remote commands ──────────────────────────────────────────────────────────

/// Quotes `value` for a POSIX shell using single quotes.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Wraps `command` so it runs as `user` on the remote host.
#[must_use]
pub fn wrap_as_user(user: &str, command: &str) -> String {
    format!("sudo -u {user} bash -c {}", shell_quote(command))
}
