//! Command templates with `{placeholder}` substitution.
//!
//! Recognized syntax:
//! - `{name}` where `name` is one of [`Placeholder`]: replaced by the shell-quoted value.
//! - `{{` and `}}`: literal `{` and `}`.
//! - `${...}` and braces not enclosing a bare identifier (`awk '{print $1}'`) are kept verbatim.
//!
//! An identifier placeholder outside the known set is rejected at parse time.

use std::{borrow::Cow, collections::HashMap, ffi::OsStr, fmt, str::FromStr};

use serde::Serialize;

pub type Result<T> = std::result::Result<T, InterpError>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("Undefined variable '{0}' at {}", .1+1)]
    UndefinedVar(String, usize),

    #[error("Unclosed brace (found open brace at {})", .0+1)]
    UnclosedBrace(usize),

    #[error("No value given for placeholder '{{{0}}}'")]
    MissingValue(Placeholder),

    #[error("Template must contain '{{{0}}}'")]
    RequiredPlaceholder(Placeholder),
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Placeholder {
    Input,
    Output,
    Answer,
    Executable,
    Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl CommandTemplate {
    pub fn parse(fmt: &str) -> Result<Self> {
        let chars: Vec<char> = fmt.chars().collect();
        let mut segments = Vec::new();
        let mut lit = String::with_capacity(fmt.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    lit.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    lit.push('}');
                    i += 2;
                }
                '{' if i > 0 && chars[i - 1] == '$' => {
                    lit.push('{');
                    i += 1;
                }
                '{' => {
                    let name_len = chars[i + 1..]
                        .iter()
                        .take_while(|&&c| is_ident_char(c))
                        .count();
                    let close = i + 1 + name_len;
                    match chars.get(close) {
                        Some('}') if name_len > 0 => {
                            let name: String = chars[i + 1..close].iter().collect();
                            let Ok(var) = Placeholder::from_str(&name) else {
                                return Err(InterpError::UndefinedVar(name, i));
                            };
                            if !lit.is_empty() {
                                segments.push(Segment::Literal(std::mem::take(&mut lit)));
                            }
                            segments.push(Segment::Var(var));
                            i = close + 1;
                        }
                        None if name_len > 0 => return Err(InterpError::UnclosedBrace(i)),
                        _ => {
                            lit.push('{');
                            i += 1;
                        }
                    }
                }
                _ => {
                    lit.push(c);
                    i += 1;
                }
            }
        }
        if !lit.is_empty() {
            segments.push(Segment::Literal(lit));
        }

        Ok(Self {
            source: fmt.to_owned(),
            segments,
        })
    }

    /// Parse and ensure every placeholder in `required` appears at least once.
    pub fn parse_requiring(fmt: &str, required: &[Placeholder]) -> Result<Self> {
        let t = Self::parse(fmt)?;
        match required.iter().find(|&&p| !t.contains(p)) {
            Some(&p) => Err(InterpError::RequiredPlaceholder(p)),
            None => Ok(t),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn contains(&self, var: Placeholder) -> bool {
        self.segments.contains(&Segment::Var(var))
    }

    pub fn render<V>(&self, values: &HashMap<Placeholder, V>) -> Result<String>
    where
        V: AsRef<OsStr>,
    {
        let mut res = String::with_capacity(self.source.len() * 3);
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => res.push_str(s),
                Segment::Var(var) => {
                    let value = values.get(var).ok_or(InterpError::MissingValue(*var))?;
                    res.push_str(&shell_quote(&value.as_ref().to_string_lossy()));
                }
            }
        }
        Ok(res)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CommandTemplate {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Quote `s` for POSIX shells. Strings made only of safe characters are returned as is.
pub fn shell_quote(s: &str) -> Cow<'_, str> {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "_-./:=+,@%".contains(c);
    if !s.is_empty() && s.chars().all(is_safe) {
        return Cow::Borrowed(s);
    }
    // terminate '  ->  enclose ' with "  ->  restart '
    Cow::Owned(format!("'{}'", s.replace('\'', r#"'"'"'"#)))
}
