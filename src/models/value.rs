use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A node of a value document fragment.
///
/// `Multi` items carry one of these (normally an element such as
/// `<string name="app_name">Demo</string>`) and the writer adopts it into the
/// aggregated `<resources>` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueNode {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub children: Vec<ValueNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, node: ValueNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(ValueNode::Text(text.into()))
    }

    pub fn push(&mut self, node: ValueNode) {
        self.children.push(node);
    }
}

impl From<Element> for ValueNode {
    fn from(element: Element) -> Self {
        ValueNode::Element(element)
    }
}

impl ValueNode {
    /// `<tag name="name">text</tag>`, the shape of most value resources.
    pub fn named(tag: &str, name: &str, text: &str) -> Self {
        Element::new(tag).attr("name", name).text(text).into()
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            ValueNode::Element(e) => Some(e),
            _ => None,
        }
    }
}
