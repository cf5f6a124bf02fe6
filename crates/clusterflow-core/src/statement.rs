//! Remote-executable install statements
//!
//! A [`ScriptStatement`] turns "run script X from the install catalog" into a
//! single `runurl` line:
//!
//! ```text
//! runurl <url>[ <arg>]*
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform a script is rendered for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    #[default]
    Unix,
    Windows,
}

impl OsFamily {
    pub fn line_terminator(&self) -> &'static str {
        match self {
            OsFamily::Unix => "\n",
            OsFamily::Windows => "\r\n",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Unix => write!(f, "unix"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

/// One `runurl` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStatement {
    base_url: String,
    path: String,
    args: Vec<String>,
}

impl ScriptStatement {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The URL the statement fetches
    ///
    /// An absolute `path` wins over the base URL. Otherwise base and path are
    /// joined with exactly one `/`.
    pub fn resolved_url(&self) -> String {
        if has_scheme(&self.path) {
            return self.path.clone();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    pub fn render(&self, os: OsFamily) -> String {
        let mut line = format!("runurl {}", self.resolved_url());
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push_str(os.line_terminator());
        line
    }
}

/// Render a sequence of statements as one script body
pub fn render_script(statements: &[ScriptStatement], os: OsFamily) -> String {
    statements.iter().map(|s| s.render(os)).collect()
}

/// RFC 3986 scheme check: `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`
fn has_scheme(path: &str) -> bool {
    let Some((scheme, _)) = path.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
