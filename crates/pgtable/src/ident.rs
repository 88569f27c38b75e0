//! Validated SQL identifiers.
//!
//! Table and column names are the only pieces of caller input that end up as SQL
//! text, so every one of them goes through [`Ident`]:
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL
//! - Rendering always double-quotes each part and escapes `"` as `""`
//!
//! # Example
//! ```ignore
//! use pgtable::Ident;
//!
//! let t = Ident::parse("public.items")?;
//! assert_eq!(t.to_sql(), r#""public"."items""#);
//! # Ok::<(), pgtable::TableError>(())
//! ```

use crate::error::{TableError, TableResult};
use std::fmt;

/// A SQL identifier (column, table, or schema-qualified table).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Create a single-part identifier from an exact name (no dotted parsing).
    ///
    /// Used for names coming back from the catalog, which may contain any character.
    pub fn exact(name: &str) -> TableResult<Self> {
        if name.is_empty() {
            return Err(TableError::validation("Identifier cannot be empty"));
        }
        if name.contains('\0') {
            return Err(TableError::validation(
                "Identifier cannot contain NUL character",
            ));
        }
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"CamelCase"."Items"`
    /// - Mixed: `public."Items"`
    pub fn parse(s: &str) -> TableResult<Self> {
        if s.is_empty() {
            return Err(TableError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(TableError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_none() => {
                        return Err(TableError::validation(format!(
                            "Trailing '.' in identifier '{s}'"
                        )));
                    }
                    Some('.') => {}
                    Some(c) => {
                        return Err(TableError::validation(format!(
                            "Expected '.' between identifier parts of '{s}', got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(TableError::validation(format!(
                                "Unclosed quoted identifier '{s}'"
                            )));
                        }
                    }
                }
                if name.is_empty() {
                    return Err(TableError::validation("Empty quoted identifier"));
                }
                parts.push(name);
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(TableError::validation(format!(
                        "Invalid character '{c}' in identifier '{s}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(TableError::validation(format!(
                    "Empty identifier segment in '{s}'"
                )));
            }
            parts.push(name);
        }

        Ok(Self { parts })
    }

    /// The unqualified name (last part).
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Number of dotted parts.
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// `self.column` as a new identifier.
    pub fn join(&self, column: &Ident) -> Ident {
        let mut parts = self.parts.clone();
        parts.extend(column.parts.iter().cloned());
        Ident { parts }
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.parts.iter().map(|p| p.len() + 3).sum());
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push('"');
            for ch in part.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> TableResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> TableResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> TableResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> TableResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> TableResult<Ident> {
        Ident::parse(&self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> TableResult<Ident> {
        Ident::parse(self)
    }
}
