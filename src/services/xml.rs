//! Serialization of value documents.
//!
//! Two renderings exist: a pretty printer producing the conventional layout of
//! resource files, and a plain serializer that writes nodes back to back. The
//! writer uses the plain one whenever the configured printer fails.

use crate::models::{Element, ValueNode};
use crate::services::provenance::escape_xml_text;
use std::fmt::Write;
use thiserror::Error;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrintError {
    #[error("Invalid element or attribute name: {0:?}")]
    InvalidName(String),

    #[error("Comment text cannot contain \"--\" or end with '-': {0:?}")]
    InvalidComment(String),

    #[error("Cannot print a document whose root is not an element")]
    NotAnElement,

    #[error("Formatting failed")]
    Format(#[from] std::fmt::Error),
}

/// Turns a document into file contents.
#[cfg_attr(test, mockall::automock)]
pub trait XmlPrinter: Send + Sync {
    fn print(&self, document: &ValueNode) -> Result<String, PrintError>;
}

/// Pretty printer for resource documents.
///
/// Children of mixed-content elements go on their own indented line. A
/// whitespace-only text node directly before a comment becomes a blank line,
/// which is how provenance comments get separated from the previous group.
#[derive(Debug, Clone)]
pub struct PrettyPrinter {
    indent: usize,
}

impl PrettyPrinter {
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }

    fn write_element(&self, out: &mut String, element: &Element, depth: usize) -> Result<(), PrintError> {
        let pad = " ".repeat(self.indent * depth);
        out.push_str(&pad);
        write_open_tag(out, element)?;

        if element.children.is_empty() {
            out.push_str("/>");
            return Ok(());
        }

        // Text-bearing elements are printed verbatim so styled values keep their spacing.
        if has_text_content(element) {
            out.push('>');
            for child in &element.children {
                write_plain(out, child)?;
            }
            write!(out, "</{}>", element.name)?;
            return Ok(());
        }

        out.push_str(">\n");
        let child_pad = " ".repeat(self.indent * (depth + 1));
        for (index, child) in element.children.iter().enumerate() {
            match child {
                ValueNode::Element(e) => {
                    self.write_element(out, e, depth + 1)?;
                    out.push('\n');
                }
                ValueNode::Comment(text) => {
                    check_comment(text)?;
                    writeln!(out, "{}<!-- {} -->", child_pad, text)?;
                }
                ValueNode::Text(text) if text.trim().is_empty() => {
                    let before_comment =
                        matches!(element.children.get(index + 1), Some(ValueNode::Comment(_)));
                    if before_comment && text.contains('\n') {
                        out.push('\n');
                    }
                }
                ValueNode::Text(text) => {
                    writeln!(out, "{}{}", child_pad, escape_xml_text(text.trim()))?;
                }
            }
        }
        if depth == 0 {
            out.push('\n');
        }
        write!(out, "{}</{}>", pad, element.name)?;
        Ok(())
    }
}

impl Default for PrettyPrinter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl XmlPrinter for PrettyPrinter {
    fn print(&self, document: &ValueNode) -> Result<String, PrintError> {
        let root = document.as_element().ok_or(PrintError::NotAnElement)?;
        let mut out = String::new();
        out.push_str(XML_DECLARATION);
        out.push('\n');
        self.write_element(&mut out, root, 0)?;
        out.push('\n');
        Ok(out)
    }
}

/// Serializes a document without adding or removing any whitespace.
pub fn to_plain_xml(document: &ValueNode) -> Result<String, PrintError> {
    let mut out = String::new();
    out.push_str(XML_DECLARATION);
    write_plain(&mut out, document)?;
    Ok(out)
}

fn write_plain(out: &mut String, node: &ValueNode) -> Result<(), PrintError> {
    match node {
        ValueNode::Element(element) => {
            write_open_tag(out, element)?;
            if element.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in &element.children {
                    write_plain(out, child)?;
                }
                write!(out, "</{}>", element.name)?;
            }
        }
        ValueNode::Text(text) => out.push_str(&escape_xml_text(text)),
        ValueNode::Comment(text) => {
            check_comment(text)?;
            write!(out, "<!-- {} -->", text)?;
        }
    }
    Ok(())
}

/// Prints with `printer`, falling back to the plain serializer if it fails.
///
/// Returns the content and whether the fallback was used. An error from the
/// fallback is final.
pub fn print_with_fallback(
    printer: &dyn XmlPrinter,
    document: &ValueNode,
) -> Result<(String, bool), PrintError> {
    match printer.print(document) {
        Ok(content) => Ok((content, false)),
        Err(e) => {
            tracing::warn!("Pretty printing failed ({}), using plain serialization", e);
            to_plain_xml(document).map(|content| (content, true))
        }
    }
}

fn write_open_tag(out: &mut String, element: &Element) -> Result<(), PrintError> {
    check_name(&element.name)?;
    write!(out, "<{}", element.name)?;
    for (key, value) in &element.attributes {
        check_name(key)?;
        write!(out, " {}=\"{}\"", key, escape_attribute(value))?;
    }
    Ok(())
}

fn has_text_content(element: &Element) -> bool {
    let mut all_text = true;
    for child in &element.children {
        match child {
            ValueNode::Text(text) if !text.trim().is_empty() => return true,
            ValueNode::Text(_) => {}
            _ => all_text = false,
        }
    }
    all_text
}

fn check_name(name: &str) -> Result<(), PrintError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == ':');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(PrintError::InvalidName(name.to_string()))
    }
}

fn check_comment(text: &str) -> Result<(), PrintError> {
    // Both printers pad comments with a space, so a trailing '-' is legal.
    if text.contains("--") {
        return Err(PrintError::InvalidComment(text.to_string()));
    }
    Ok(())
}

fn escape_attribute(value: &str) -> String {
    escape_xml_text(value).replace('"', "&quot;")
}
