//! File references understood by the orchestrator.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// URI of the trash root container.
pub const TRASH_ROOT_URI: &str = "trash:///";

const TRASH_SCHEME: &str = "trash://";
const FILE_SCHEME: &str = "file://";
const LOCAL_HOST: &str = "localhost";

/// A resolved reference to a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    /// A path on a local filesystem.
    Local { path: PathBuf },
    /// The trash root container.
    TrashRoot,
    /// An item inside the trash.
    Trashed {
        /// Name of the item inside the trash.
        name: String,
        /// Where the item lived before it was trashed, if recorded.
        original: Option<PathBuf>,
    },
    /// Any other URI (sftp://, smb://, ...).
    Remote { uri: String },
}

impl Locator {
    /// Create a local locator.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    /// Create a trashed-item locator.
    pub fn trashed(name: impl Into<String>, original: Option<PathBuf>) -> Self {
        Self::Trashed {
            name: name.into(),
            original,
        }
    }

    /// Parse a command-line argument into a locator.
    ///
    /// Absolute paths and URIs are taken as they are, anything else is
    /// interpreted relative to `working_dir`.
    pub fn parse(working_dir: &Path, input: &str) -> Result<Self, ResolutionError> {
        if input.is_empty() {
            return Err(ResolutionError::invalid(input, "empty file name"));
        }
        if input.contains('\0') {
            return Err(ResolutionError::invalid(input, "embedded NUL byte"));
        }

        if let Some(rest) = input.strip_prefix(TRASH_SCHEME) {
            let name = decode(input, rest.trim_matches('/'))?;
            return Ok(if name.is_empty() {
                Self::TrashRoot
            } else {
                Self::trashed(name, None)
            });
        }

        if let Some(rest) = input.strip_prefix(FILE_SCHEME) {
            // Only the local host is accepted as authority
            let rest = rest.strip_prefix(LOCAL_HOST).unwrap_or(rest);
            if !rest.starts_with('/') {
                return Err(ResolutionError::invalid(input, "file URI must name a local path"));
            }
            let path = decode(input, rest)?;
            return Ok(Self::local(normalize(Path::new(&path))));
        }

        if looks_like_uri(input) {
            return Ok(Self::Remote {
                uri: input.to_string(),
            });
        }

        let path = Path::new(input);
        if path.is_absolute() {
            Ok(Self::local(normalize(path)))
        } else if working_dir.is_absolute() {
            Ok(Self::local(normalize(&working_dir.join(path))))
        } else {
            Err(ResolutionError::invalid(
                input,
                "relative name without an absolute working directory",
            ))
        }
    }

    /// Whether this locator lives on a local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Whether this locator is the trash or something inside it.
    pub fn is_trashed(&self) -> bool {
        matches!(self, Self::TrashRoot | Self::Trashed { .. })
    }

    /// Whether this locator has no parent.
    pub fn is_root(&self) -> bool {
        match self {
            Self::Local { path } => path.parent().is_none(),
            Self::TrashRoot => true,
            Self::Trashed { .. } => false,
            Self::Remote { uri } => remote_path(uri).trim_matches('/').is_empty(),
        }
    }

    /// The local path, if any.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Local { path } => Some(path),
            _ => None,
        }
    }

    /// The recorded original location of a trashed item.
    pub fn original_location(&self) -> Option<&Path> {
        match self {
            Self::Trashed { original, .. } => original.as_deref(),
            _ => None,
        }
    }

    /// The last component of the locator.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Local { path } => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Self::TrashRoot => None,
            Self::Trashed { name, .. } => name.rsplit('/').next().map(str::to_string),
            Self::Remote { uri } => remote_path(uri)
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }

    /// A short human-readable name.
    pub fn display_name(&self) -> String {
        match self {
            Self::TrashRoot => "Trash".to_string(),
            _ => self.file_name().unwrap_or_else(|| self.to_string()),
        }
    }

    /// Resolve a child name relative to this locator.
    pub fn join(&self, name: &str) -> Self {
        match self {
            Self::Local { path } => Self::local(path.join(name)),
            Self::TrashRoot => Self::trashed(name, None),
            Self::Trashed { name: parent, .. } => Self::trashed(format!("{parent}/{name}"), None),
            Self::Remote { uri } => Self::Remote {
                uri: format!("{}/{name}", uri.trim_end_matches('/')),
            },
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::TrashRoot => write!(f, "{TRASH_ROOT_URI}"),
            Self::Trashed { name, .. } => write!(f, "{TRASH_ROOT_URI}{name}"),
            Self::Remote { uri } => write!(f, "{uri}"),
        }
    }
}

impl From<PathBuf> for Locator {
    fn from(path: PathBuf) -> Self {
        Self::local(path)
    }
}

/// Check for `scheme:` followed by `//`, where the scheme is RFC 3986 shaped.
fn looks_like_uri(input: &str) -> bool {
    let Some((scheme, rest)) = input.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && rest.starts_with("//")
}

/// Path part of a `scheme://authority/path` URI.
fn remote_path(uri: &str) -> &str {
    let after_scheme = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    after_scheme.find('/').map_or("", |idx| &after_scheme[idx..])
}

/// Percent-decode a URI component into UTF-8 text.
fn decode(input: &str, encoded: &str) -> Result<String, ResolutionError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ResolutionError::invalid(input, "URI does not decode to UTF-8"))
}

/// Lexically drop `.` and resolve `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
