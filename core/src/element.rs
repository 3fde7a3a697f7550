//! Owned XML element tree exchanged with the webservice.
//!
//! # Design
//! Parsing goes through `roxmltree`, which resolves namespaces and merges
//! CDATA sections into the surrounding text, so an `Element` only ever sees
//! resolved `QName`s and plain text. Writing goes through `quick-xml`; any
//! namespace an element or attribute carries is re-declared on the element
//! that uses it.
//!
//! Mixed content is not modeled: `text` holds the text before the first child
//! element, anything after it is discarded.

use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};

/// Namespace of the `xlink:href` attributes the webservice puts on every
/// cross-resource reference.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Number of body characters quoted in a parse error.
const DIAGNOSTIC_PREFIX: usize = 512;

/// A possibly namespace-qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }
}

/// Clark notation: `{uri}local`, or just `local` without a namespace.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// One XML element with its attributes, child elements and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_name(QName::local(name))
    }

    pub fn with_name(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: QName::local(name),
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Value of the un-namespaced attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == name)
            .map(|a| a.value.as_str())
    }

    /// First child element whose local name is `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name.local == name)
    }

    /// Text content with surrounding whitespace removed; empty when absent.
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }

    /// Parse a UTF-8 XML document and return its root element.
    pub fn parse(xml: &str) -> Result<Self> {
        if xml.trim().is_empty() {
            return Err(Error::Parse("HTTP response is empty".to_string()));
        }
        let document = roxmltree::Document::parse(xml).map_err(|e| {
            let prefix: String = xml.chars().take(DIAGNOSTIC_PREFIX).collect();
            Error::Parse(format!("HTTP XML response is not parsable: {e}. {prefix}"))
        })?;
        Ok(Self::from_node(document.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let tag = node.tag_name();
        let name = QName {
            namespace: tag.namespace().map(str::to_string),
            local: tag.name().to_string(),
        };
        let attributes = node
            .attributes()
            .map(|a| Attribute {
                name: QName {
                    namespace: a.namespace().map(str::to_string),
                    local: a.name().to_string(),
                },
                value: a.value().to_string(),
            })
            .collect();
        let children = node
            .children()
            .filter(|c| c.is_element())
            .map(Self::from_node)
            .collect();
        Self {
            name,
            attributes,
            children,
            text: node.text().map(str::to_string),
        }
    }

    /// Serialize as a standalone UTF-8 document with an XML declaration.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        self.write(&mut writer, None)?;
        String::from_utf8(writer.into_inner()).map_err(|e| Error::Structure(e.to_string()))
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>, default_ns: Option<&str>) -> Result<()> {
        let own_ns = self.name.namespace.as_deref();
        let mut start = BytesStart::new(self.name.local.as_str());
        if own_ns != default_ns {
            start.push_attribute(("xmlns", own_ns.unwrap_or("")));
        }

        let mut declared: Vec<(&str, String)> = Vec::new();
        let mut attributes: Vec<(String, &str)> = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let name = match attribute.name.namespace.as_deref() {
                None => attribute.name.local.clone(),
                Some(uri) => {
                    let prefix = match declared.iter().find(|(u, _)| *u == uri) {
                        Some((_, prefix)) => prefix.clone(),
                        None => {
                            let prefix = prefix_for(uri, declared.len());
                            declared.push((uri, prefix.clone()));
                            prefix
                        }
                    };
                    format!("{prefix}:{}", attribute.name.local)
                }
            };
            attributes.push((name, attribute.value.as_str()));
        }
        for (uri, prefix) in &declared {
            let name = format!("xmlns:{prefix}");
            start.push_attribute((name.as_str(), *uri));
        }
        for (name, value) in &attributes {
            start.push_attribute((name.as_str(), *value));
        }

        let text = self.text.as_deref().unwrap_or("");
        if self.children.is_empty() && text.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(write_error)?;
            return Ok(());
        }
        writer.write_event(Event::Start(start)).map_err(write_error)?;
        if !text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?;
        }
        for child in &self.children {
            child.write(writer, own_ns)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.local.as_str())))
            .map_err(write_error)?;
        Ok(())
    }
}

fn prefix_for(uri: &str, index: usize) -> String {
    if uri == XLINK_NS {
        "xlink".to_string()
    } else {
        format!("ns{index}")
    }
}

fn write_error(e: quick_xml::Error) -> Error {
    Error::Structure(format!("cannot write XML: {e}"))
}
