//! Outgoing request payloads.
//!
//! A [`Node`] is the structure a verb builder hands to the envelope writer. Objects coming
//! from callers usually start life as `serde_json::Value` and are converted with `From`.

use serde_json::Value;

/// Attribute name of the type discriminator the partner API dispatches on.
pub const XSI_TYPE: &str = "xsi:type";

/// A value in an outgoing request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Written as an empty element, e.g. `<Options/>`
    Nil,
    /// Text content
    Text(String),
    /// Element with attributes and children
    Element(Element),
    /// Repeated sibling elements sharing the parent's name
    List(Vec<Node>),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Attach the `xsi:type` discriminator.
    ///
    /// Elements get the attribute, every element of a list gets it, and `Nil` becomes an
    /// element carrying only the attribute. Text cannot carry attributes and is left as is.
    /// Returns whether anything was tagged.
    pub fn set_type(&mut self, object_type: &str) -> bool {
        match self {
            Self::Element(element) => {
                element.set_attr(XSI_TYPE, object_type);
                true
            }
            Self::List(items) => items
                .iter_mut()
                .fold(false, |tagged, item| item.set_type(object_type) || tagged),
            Self::Nil => {
                *self = Self::Element(Element::new().with_attr(XSI_TYPE, object_type));
                true
            }
            Self::Text(_) => false,
        }
    }

    /// The `xsi:type` discriminator, if this is a tagged element.
    pub fn object_type(&self) -> Option<&str> {
        self.as_element().and_then(|e| e.attr(XSI_TYPE))
    }
}

/// An element: ordered attributes, ordered children and optional text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    attributes: Vec<(String, String)>,
    children: Vec<(String, Node)>,
    text: Option<String>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set an attribute, replacing an existing one of the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn with_child(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.set_child(name, node);
        self
    }

    /// Set a child, replacing an existing one of the same name in place.
    pub fn set_child(&mut self, name: impl Into<String>, node: impl Into<Node>) {
        let name = name.into();
        let node = node.into();
        match self.children.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = node,
            None => self.children.push((name, node)),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn remove_child(&mut self, name: &str) -> Option<Node> {
        let index = self.children.iter().position(|(n, _)| n == name)?;
        Some(self.children.remove(index).1)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(n, node)| (n.as_str(), node))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// No children and no text. Attributes are not considered.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.text.is_none()
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Nil,
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => Self::Element(
                map.into_iter()
                    .fold(Element::new(), |element, (k, v)| element.with_child(k, Node::from(v))),
            ),
        }
    }
}
