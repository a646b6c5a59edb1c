//! Query templates with symbolic table names and bound parameters.
//!
//! Templates let higher layers write raw SQL without knowing the install
//! prefix or the dialect:
//!
//! - `[[name]]` becomes the quoted table `prefix + name`
//! - `[[*name]]` becomes `prefix + "*" + name`, the internal tables
//! - `[[\name]]` becomes `namespace + "\" + name`, ignoring the prefix
//! - `?` outside quotes is replaced by the next bound value, escaped
//!
//! ```
//! use oxide_sql_core::dialect::MySqlDialect;
//! use oxide_sql_core::template::TableNames;
//! use oxide_sql_core::SqlValue;
//!
//! let names = TableNames::new("app_");
//! let sql = names
//!     .render(
//!         &MySqlDialect,
//!         "SELECT * FROM [[*settings]] WHERE data = ?",
//!         &[SqlValue::from("it's")],
//!     )
//!     .unwrap();
//! assert_eq!(sql, r"SELECT * FROM `app_*settings` WHERE data = 'it\'s'");
//! ```

use crate::dialect::Dialect;
use crate::error::EscapeError;
use crate::value::SqlValue;

/// Default namespace for `[[\name]]` placeholders.
pub const DEFAULT_NAMESPACE: &str = "oxide";

/// Maps logical table names onto physical ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    prefix: String,
    namespace: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self::new("")
    }
}

impl TableNames {
    /// Names under an install prefix, with the default namespace.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            namespace: String::from(DEFAULT_NAMESPACE),
        }
    }

    /// Replaces the fixed namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The install prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The fixed namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Physical (unquoted) name of a logical table.
    ///
    /// A leading `\` selects the namespace instead of the prefix; every other
    /// name, including `*internal` ones, gets the prefix.
    #[must_use]
    pub fn physical(&self, logical: &str) -> String {
        logical.strip_prefix('\\').map_or_else(
            || format!("{}{logical}", self.prefix),
            |rest| format!("{}\\{rest}", self.namespace),
        )
    }

    /// Renders a template for `dialect`.
    ///
    /// # Errors
    ///
    /// Fails when a placeholder is not closed, when the number of `?`
    /// markers differs from `params.len()`, or when a value cannot be
    /// rendered.
    pub fn render(
        &self,
        dialect: &dyn Dialect,
        template: &str,
        params: &[SqlValue],
    ) -> Result<String, EscapeError> {
        let mut out = String::with_capacity(template.len() + 16 * params.len());
        let mut markers = 0;
        let mut quote: Option<char> = None;
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if let Some(open) = quote {
                out.push(c);
                if c == '\\' && open == '\'' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == open {
                    if chars.peek().is_some_and(|(_, next)| *next == open) {
                        if let Some((_, doubled)) = chars.next() {
                            out.push(doubled);
                        }
                    } else {
                        quote = None;
                    }
                }
                continue;
            }
            match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '[' if template[pos..].starts_with("[[") => {
                    let body_start = pos + 2;
                    let len = template[body_start..]
                        .find("]]")
                        .ok_or(EscapeError::UnterminatedPlaceholder(pos))?;
                    let logical = &template[body_start..body_start + len];
                    out.push_str(&dialect.quote_identifier(&self.physical(logical)));
                    let resume = body_start + len + 2;
                    while chars.peek().is_some_and(|(i, _)| *i < resume) {
                        chars.next();
                    }
                }
                '?' => {
                    if let Some(value) = params.get(markers) {
                        out.push_str(&dialect.escape_literal(value)?);
                    }
                    markers += 1;
                }
                _ => out.push(c),
            }
        }

        if markers == params.len() {
            Ok(out)
        } else {
            Err(EscapeError::ParameterCount {
                expected: markers,
                given: params.len(),
            })
        }
    }
}
