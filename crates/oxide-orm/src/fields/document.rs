//! JSON and XML fields.

use crate::error::ValidationError;
use crate::value::Value;

/// Any JSON document, or a scalar wrapped as one.
pub(super) fn coerce_json(field: &str, value: Value) -> Result<Value, ValidationError> {
    let json = match value {
        Value::Json(v) => v,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Int(n) => serde_json::Value::from(n),
        Value::Float(v) => serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .ok_or_else(|| ValidationError::Malformed {
                field: String::from(field),
                message: format!("{v} is not a JSON number"),
            })?,
        Value::Text(s) => serde_json::Value::String(s),
        other => {
            return Err(ValidationError::WrongType {
                field: String::from(field),
                found: other.kind(),
            })
        }
    };
    Ok(Value::Json(json))
}

/// A well-formed document within the length cap.
pub(super) fn coerce_xml(
    field: &str,
    max_length: Option<usize>,
    value: Value,
) -> Result<Value, ValidationError> {
    let text = match value {
        Value::Xml(s) | Value::Text(s) => s,
        other => {
            return Err(ValidationError::WrongType {
                field: String::from(field),
                found: other.kind(),
            })
        }
    };
    super::char::check_length(field, max_length, &text)?;
    check_xml(&text).map_err(|message| ValidationError::Malformed {
        field: String::from(field),
        message,
    })?;
    Ok(Value::Xml(text))
}

/// Checks that `text` is one well-formed XML element, optionally preceded
/// by a declaration, comments and processing instructions.
///
/// Tags must nest and match, attributes must be quoted and unique per
/// element, and entity references must be predefined or numeric. DTDs are
/// not supported.
///
/// # Errors
///
/// Returns a message naming the first problem and its byte offset.
pub fn check_xml(text: &str) -> Result<(), String> {
    XmlChecker::new(text).run()
}

struct XmlChecker<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<&'a str>,
    roots: usize,
}

impl<'a> XmlChecker<'a> {
    const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            stack: Vec::new(),
            roots: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn fail<T>(&self, message: &str) -> Result<T, String> {
        Err(format!("{message} at byte {}", self.pos))
    }

    fn run(mut self) -> Result<(), String> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "unterminated processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "unterminated comment")?;
            } else if rest.starts_with("<![CDATA[") {
                if self.stack.is_empty() {
                    return self.fail("character data outside the root element");
                }
                self.skip_past("]]>", "unterminated CDATA section")?;
            } else if rest.starts_with("<!") {
                return self.fail("document type declarations are not supported");
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if rest.starts_with('<') {
                self.open_tag()?;
            } else {
                self.text()?;
            }
        }
        if let Some(open) = self.stack.last() {
            return self.fail(&format!("element <{open}> is not closed"));
        }
        if self.roots != 1 {
            return self.fail("expected exactly one root element");
        }
        Ok(())
    }

    fn skip_past(&mut self, end: &str, message: &str) -> Result<(), String> {
        match self.rest().find(end) {
            Some(i) => {
                self.pos += i + end.len();
                Ok(())
            }
            None => self.fail(message),
        }
    }

    fn name(&mut self) -> Result<&'a str, String> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| {
                !(c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
                    || (i == 0 && (c.is_ascii_digit() || matches!(c, '-' | '.')))
            })
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return self.fail("expected a name");
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn skip_space(&mut self) -> bool {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        rest.len() != trimmed.len()
    }

    fn open_tag(&mut self) -> Result<(), String> {
        if self.stack.is_empty() {
            if self.roots > 0 {
                return self.fail("more than one root element");
            }
            self.roots += 1;
        }
        self.pos += 1;
        let tag = self.name()?;
        let mut attributes: Vec<&str> = Vec::new();
        loop {
            let spaced = self.skip_space();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(());
            }
            if rest.starts_with('>') {
                self.pos += 1;
                self.stack.push(tag);
                return Ok(());
            }
            if !spaced {
                return self.fail("expected whitespace between attributes");
            }
            let attribute = self.name()?;
            if attributes.contains(&attribute) {
                return self.fail(&format!("duplicate attribute '{attribute}'"));
            }
            attributes.push(attribute);
            self.skip_space();
            if !self.rest().starts_with('=') {
                return self.fail("expected '=' after attribute name");
            }
            self.pos += 1;
            self.skip_space();
            self.attribute_value()?;
        }
    }

    fn attribute_value(&mut self) -> Result<(), String> {
        let Some(quote) = self.rest().chars().next().filter(|c| matches!(*c, '"' | '\'')) else {
            return self.fail("attribute values must be quoted");
        };
        self.pos += 1;
        let Some(end) = self.rest().find(quote) else {
            return self.fail("unterminated attribute value");
        };
        let value = &self.rest()[..end];
        if value.contains('<') {
            return self.fail("'<' in attribute value");
        }
        self.entities(value)?;
        self.pos += end + 1;
        Ok(())
    }

    fn close_tag(&mut self) -> Result<(), String> {
        self.pos += 2;
        let tag = self.name()?;
        self.skip_space();
        if !self.rest().starts_with('>') {
            return self.fail("expected '>'");
        }
        match self.stack.pop() {
            Some(open) if open == tag => {
                self.pos += 1;
                Ok(())
            }
            Some(open) => self.fail(&format!("</{tag}> closes <{open}>")),
            None => self.fail(&format!("</{tag}> without an open element")),
        }
    }

    fn text(&mut self) -> Result<(), String> {
        let rest = self.rest();
        let end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..end];
        if self.stack.is_empty() && !text.trim().is_empty() {
            return self.fail("text outside the root element");
        }
        self.entities(text)?;
        self.pos += end;
        Ok(())
    }

    fn entities(&self, text: &str) -> Result<(), String> {
        let mut rest = text;
        while let Some(i) = rest.find('&') {
            let after = &rest[i + 1..];
            let Some(end) = after.find(';') else {
                return self.fail("unterminated entity reference");
            };
            let entity = &after[..end];
            let known = matches!(entity, "amp" | "lt" | "gt" | "quot" | "apos")
                || entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16).is_ok())
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>().is_ok()))
                    .unwrap_or(false);
            if !known {
                return self.fail(&format!("unknown entity '&{entity};'"));
            }
            rest = &after[end + 1..];
        }
        Ok(())
    }
}
