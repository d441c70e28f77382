//! Stack frame descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One resolved call-stack frame.
///
/// All fields are best-effort: a frame whose instruction pointer could not
/// be resolved carries no symbol at all and displays as `<unknown>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Demangled symbol name, if resolution succeeded.
    pub symbol: Option<String>,
    /// Source file path, if debug info was available.
    pub file: Option<String>,
    /// Source line number, if debug info was available.
    pub line: Option<u32>,
}

impl StackFrame {
    /// Frame with a symbol name and no source location.
    #[must_use]
    pub fn named(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            file: None,
            line: None,
        }
    }

    /// Frame whose instruction pointer resolved to nothing.
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            symbol: None,
            file: None,
            line: None,
        }
    }

    /// Whether any symbol information was recovered for this frame.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.symbol.is_some()
    }

    /// `file.rs:123` with the path shortened to its final component, or an
    /// empty string when no location is known.
    #[must_use]
    pub fn short_location(&self) -> String {
        match (&self.file, self.line) {
            (Some(f), Some(l)) => {
                let short = Path::new(f)
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or(f.as_str());
                format!("{short}:{l}")
            }
            (Some(f), None) => f.clone(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.symbol.as_deref().unwrap_or("<unknown>");
        let loc = self.short_location();
        if loc.is_empty() {
            write!(f, "{symbol}")
        } else {
            write!(f, "{symbol} ({loc})")
        }
    }
}
