//! Mapping representation of an XML subtree.
//!
//! # Design
//! A `Node` is the in-memory form callers read and build payloads with. Each
//! shape the webservice documents take gets its own variant, so the codec
//! matches on variants instead of probing mapping keys.
//!
//! `Node` serializes to (and converts from) the JSON shape
//! `{"attrs": {...}, "value": ...}` used for attributed elements, so payloads
//! can be written with `serde_json::json!`.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Key holding an attributed element's attributes.
pub const ATTRS_KEY: &str = "attrs";
/// Key holding an attributed or namespaced element's inner value.
pub const VALUE_KEY: &str = "value";
/// Key holding a namespaced element's or attribute's namespace URI.
pub const XMLNS_KEY: &str = "xmlns";

/// Ordered tag → node mapping.
pub type Mapping = IndexMap<String, Node>;

/// Ordered attribute name → value mapping.
pub type Attributes = IndexMap<String, AttrValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Plain(String),
    /// An attribute qualified with a namespace other than the linking one.
    Namespaced { xmlns: String, value: String },
}

impl AttrValue {
    pub fn as_str(&self) -> &str {
        match self {
            AttrValue::Plain(value) | AttrValue::Namespaced { value, .. } => value,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Plain(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Plain(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Text of an element without attributes or children.
    Scalar(String),
    /// An element carrying attributes; `value` is its text or its children.
    Attributed { attrs: Attributes, value: Box<Node> },
    /// Repeated sibling elements sharing one tag, in document order.
    Sequence(Vec<Node>),
    /// Child elements keyed by tag.
    Container(Mapping),
    /// An element whose tag is qualified with a namespace.
    Namespaced { xmlns: String, value: Box<Node> },
}

impl Default for Node {
    fn default() -> Self {
        Node::Scalar(String::new())
    }
}

impl Node {
    pub fn attributed(attrs: Attributes, value: impl Into<Node>) -> Self {
        Node::Attributed {
            attrs,
            value: Box::new(value.into()),
        }
    }

    /// True for empty text, an empty sequence or an empty container.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Scalar(text) => text.is_empty(),
            Node::Sequence(items) => items.is_empty(),
            Node::Container(children) => children.is_empty(),
            Node::Attributed { .. } | Node::Namespaced { .. } => false,
        }
    }

    /// Text of a scalar, looking through attributes and namespaces.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Scalar(text) => Some(text),
            Node::Attributed { value, .. } | Node::Namespaced { value, .. } => value.text(),
            Node::Sequence(_) | Node::Container(_) => None,
        }
    }

    /// Child mapping, looking through attributes and namespaces.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Container(children) => Some(children),
            Node::Attributed { value, .. } | Node::Namespaced { value, .. } => value.as_mapping(),
            Node::Scalar(_) | Node::Sequence(_) => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Container(children) => Some(children),
            Node::Attributed { value, .. } | Node::Namespaced { value, .. } => value.as_mapping_mut(),
            Node::Scalar(_) | Node::Sequence(_) => None,
        }
    }

    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Node::Container(children) => Some(children),
            Node::Attributed { value, .. } | Node::Namespaced { value, .. } => value.into_mapping(),
            Node::Scalar(_) | Node::Sequence(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|children| children.get(key))
    }

    pub fn attrs(&self) -> Option<&Attributes> {
        match self {
            Node::Attributed { attrs, .. } => Some(attrs),
            Node::Namespaced { value, .. } => value.attrs(),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs().and_then(|attrs| attrs.get(name)).map(AttrValue::as_str)
    }

    /// The node as a list of items: a sequence yields its items, an empty
    /// node yields nothing and anything else yields itself.
    pub fn items(&self) -> Vec<&Node> {
        match self {
            Node::Sequence(items) => items.iter().collect(),
            node if node.is_empty() => Vec::new(),
            node => vec![node],
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(value)
    }
}

macro_rules! scalar_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Node {
            fn from(value: $ty) -> Self {
                Node::Scalar(value.to_string())
            }
        })*
    };
}

scalar_from_number!(i32, i64, u32, u64, usize, f64);

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Node::Container(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::Sequence(value)
    }
}

/// Builds a node from the loose JSON shape callers write payloads in.
///
/// `null` becomes empty text and booleans become `1`/`0`. An object with only
/// a `value` key is unwrapped, one with exactly `value` and a string `xmlns`
/// is namespaced, and an `attrs` key turns the rest of the object into the
/// attributed element's value.
impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::default(),
            Value::Bool(flag) => Node::Scalar(if flag { "1" } else { "0" }.to_string()),
            Value::Number(number) => Node::Scalar(number.to_string()),
            Value::String(text) => Node::Scalar(text),
            Value::Array(items) => Node::Sequence(items.into_iter().map(Node::from).collect()),
            Value::Object(mut object) => {
                if object.len() == 1 {
                    if let Some(inner) = object.remove(VALUE_KEY) {
                        return Node::from(inner);
                    }
                }
                if object.len() == 2 && object.contains_key(VALUE_KEY) {
                    if let Some(Value::String(xmlns)) = object.get(XMLNS_KEY).cloned() {
                        let inner = object.remove(VALUE_KEY).unwrap_or(Value::Null);
                        return Node::Namespaced {
                            xmlns,
                            value: Box::new(Node::from(inner)),
                        };
                    }
                }
                match object.shift_remove(ATTRS_KEY) {
                    Some(attrs) => {
                        let attrs = attributes_from_json(attrs);
                        let value = match object.shift_remove(VALUE_KEY) {
                            Some(inner) if object.is_empty() => Node::from(inner),
                            Some(inner) => {
                                let mut children = container_from_json(object);
                                children.insert(VALUE_KEY.to_string(), Node::from(inner));
                                Node::Container(children)
                            }
                            None if object.is_empty() => Node::default(),
                            None => Node::Container(container_from_json(object)),
                        };
                        Node::attributed(attrs, value)
                    }
                    None => Node::Container(container_from_json(object)),
                }
            }
        }
    }
}

fn container_from_json(object: serde_json::Map<String, Value>) -> Mapping {
    object
        .into_iter()
        .map(|(key, value)| (key, Node::from(value)))
        .collect()
}

fn attributes_from_json(value: Value) -> Attributes {
    let Value::Object(object) = value else {
        return Attributes::new();
    };
    object
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Object(mut qualified) => {
                    let xmlns = json_text(qualified.remove(XMLNS_KEY).unwrap_or(Value::Null));
                    let value = json_text(qualified.remove(VALUE_KEY).unwrap_or(Value::Null));
                    AttrValue::Namespaced { xmlns, value }
                }
                other => AttrValue::Plain(json_text(other)),
            };
            (name, value)
        })
        .collect()
}

fn json_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Bool(flag) => if flag { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::Plain(value) => serializer.serialize_str(value),
            AttrValue::Namespaced { xmlns, value } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(VALUE_KEY, value)?;
                map.serialize_entry(XMLNS_KEY, xmlns)?;
                map.end()
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(text) => serializer.serialize_str(text),
            Node::Attributed { attrs, value } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(ATTRS_KEY, attrs)?;
                map.serialize_entry(VALUE_KEY, value)?;
                map.end()
            }
            Node::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Container(children) => {
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (tag, child) in children {
                    map.serialize_entry(tag, child)?;
                }
                map.end()
            }
            Node::Namespaced { xmlns, value } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(VALUE_KEY, value)?;
                map.serialize_entry(XMLNS_KEY, xmlns)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_become_text() {
        assert_eq!(Node::from(json!(null)), Node::Scalar(String::new()));
        assert_eq!(Node::from(json!(21)), Node::Scalar("21".into()));
        assert_eq!(Node::from(json!(true)), Node::Scalar("1".into()));
        assert_eq!(Node::from(json!("Cupertino")), Node::Scalar("Cupertino".into()));
    }

    #[test]
    fn json_value_only_object_is_unwrapped() {
        assert_eq!(Node::from(json!({"value": "x"})), Node::Scalar("x".into()));
    }

    #[test]
    fn json_attrs_and_value_become_attributed() {
        let node = Node::from(json!({
            "attrs": {"id": "1", "href": {"value": "http://x/1", "xmlns": "urn:link"}},
            "value": "Mug"
        }));
        let Node::Attributed { attrs, value } = &node else {
            panic!("expected attributed node, got {node:?}");
        };
        assert_eq!(attrs["id"], AttrValue::Plain("1".into()));
        assert_eq!(
            attrs["href"],
            AttrValue::Namespaced {
                xmlns: "urn:link".into(),
                value: "http://x/1".into()
            }
        );
        assert_eq!(**value, Node::Scalar("Mug".into()));
        assert_eq!(node.attr("id"), Some("1"));
        assert_eq!(node.text(), Some("Mug"));
    }

    #[test]
    fn json_attrs_next_to_children_attribute_the_container() {
        let node = Node::from(json!({"attrs": {"nodeType": "category"}, "category": {"id": 2}}));
        assert_eq!(node.attr("nodeType"), Some("category"));
        assert_eq!(node.get("category").and_then(|c| c.get("id")), Some(&Node::from("2")));
    }

    #[test]
    fn json_value_and_xmlns_become_namespaced() {
        let node = Node::from(json!({"value": "a", "xmlns": "urn:x"}));
        assert_eq!(
            node,
            Node::Namespaced {
                xmlns: "urn:x".into(),
                value: Box::new(Node::from("a"))
            }
        );
    }

    #[test]
    fn serializes_back_to_the_json_shape() {
        let payload = json!({
            "address": {
                "firstname": "Ada",
                "language": [
                    {"attrs": {"id": "1"}, "value": "one"},
                    {"attrs": {"id": "2"}, "value": "two"}
                ]
            }
        });
        let node = Node::from(payload.clone());
        assert_eq!(serde_json::to_value(&node).unwrap(), payload);
    }

    #[test]
    fn items_listifies() {
        assert!(Node::default().items().is_empty());
        let single = Node::from("x");
        assert_eq!(single.items(), vec![&single]);
        let seq = Node::Sequence(vec![Node::from("a"), Node::from("b")]);
        assert_eq!(seq.items().len(), 2);
    }
}
