//! Crawl target identities and pagination cursors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a target identity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty target identity")]
    Empty,

    #[error("invalid host '{0}'")]
    InvalidHost(String),

    #[error("'{0}' is not a user@host handle")]
    InvalidHandle(String),

    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    #[error("malformed target key '{0}'")]
    MalformedKey(String),
}

/// The kind of paginated resource a target refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// An instance's public timeline
    Timeline,

    /// The accounts following a user
    Followers,

    /// The accounts a user follows
    Following,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeline => "timeline",
            Self::Followers => "followers",
            Self::Following => "following",
        }
    }

    /// Directory name under the data dir where this kind's items are written
    pub fn output_dir(&self) -> &'static str {
        match self {
            Self::Timeline => "timelines",
            Self::Followers => "followers",
            Self::Following => "following",
        }
    }

    /// Whether targets of this kind are identified by a user handle
    pub fn is_account_list(&self) -> bool {
        matches!(self, Self::Followers | Self::Following)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timeline" | "timelines" => Ok(Self::Timeline),
            "followers" => Ok(Self::Followers),
            "following" => Ok(Self::Following),
            other => Err(TargetError::UnknownKind(other.to_string())),
        }
    }
}

/// Identity of one resumable resource
///
/// A target is a host plus, for follow-graph crawls, the user handle whose
/// list is walked. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlTarget {
    host: String,
    handle: Option<String>,
    kind: ResourceKind,
}

impl CrawlTarget {
    /// The public timeline of `host`
    pub fn timeline(host: &str) -> Result<Self, TargetError> {
        Ok(Self {
            host: parse_host(host)?,
            handle: None,
            kind: ResourceKind::Timeline,
        })
    }

    /// The follower list of `account` (`user@host`, leading `@` allowed)
    pub fn followers(account: &str) -> Result<Self, TargetError> {
        Self::account_list(ResourceKind::Followers, account)
    }

    /// The following list of `account` (`user@host`, leading `@` allowed)
    pub fn following(account: &str) -> Result<Self, TargetError> {
        Self::account_list(ResourceKind::Following, account)
    }

    fn account_list(kind: ResourceKind, account: &str) -> Result<Self, TargetError> {
        let account = account.trim();
        let account = account.strip_prefix('@').unwrap_or(account);
        let (user, host) = account
            .split_once('@')
            .ok_or_else(|| TargetError::InvalidHandle(account.to_string()))?;

        if user.is_empty() || user.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(TargetError::InvalidHandle(account.to_string()));
        }

        Ok(Self {
            host: parse_host(host)?,
            handle: Some(user.to_string()),
            kind,
        })
    }

    /// Parses one line of a target list for the given resource kind
    pub fn parse(kind: ResourceKind, identity: &str) -> Result<Self, TargetError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(TargetError::Empty);
        }

        match kind {
            ResourceKind::Timeline => Self::timeline(identity),
            kind => Self::account_list(kind, identity),
        }
    }

    /// Reconstructs a target from its checkpoint key (`kind:identity`)
    pub fn from_key(key: &str) -> Result<Self, TargetError> {
        let (kind, identity) = key
            .split_once(':')
            .ok_or_else(|| TargetError::MalformedKey(key.to_string()))?;
        Self::parse(kind.parse()?, identity)
    }

    /// Stable key used to index checkpoints, e.g. `timeline:mastodon.social`
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.identity())
    }

    /// The host, or `user@host` for account lists
    pub fn identity(&self) -> String {
        match &self.handle {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl fmt::Display for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.identity())
    }
}

/// Validates and lowercases a host name, optionally carrying a port
fn parse_host(host: &str) -> Result<String, TargetError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(TargetError::Empty);
    }

    let valid = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == ':');
    if !valid || host.starts_with('.') || host.ends_with('.') {
        return Err(TargetError::InvalidHost(host.to_string()));
    }

    Ok(host.to_ascii_lowercase())
}

/// Opaque pagination marker meaning "resume after this point"
///
/// Remote APIs hand out either string or integer markers; both deserialize
/// into the same textual cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawCursor", into = "String")]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCursor {
    Text(String),
    Number(i64),
}

impl From<RawCursor> for Cursor {
    fn from(raw: RawCursor) -> Self {
        match raw {
            RawCursor::Text(s) => Cursor(s),
            RawCursor::Number(n) => Cursor(n.to_string()),
        }
    }
}
