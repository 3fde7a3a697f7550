//! XML ↔ mapping transcoding and the codec strategies the client is
//! parameterized with.
//!
//! # Decoding
//! Attributes in the linking namespace are dropped. Attributes are keyed by
//! local name: when a plain and a namespaced attribute share one, the plain
//! attribute is kept, and otherwise the first namespaced one wins. Repeated
//! sibling tags are collapsed into a `Node::Sequence` in document order while
//! a single child stays a plain node. When an element has children its text is discarded,
//! and an element with neither attributes nor children collapses to its
//! trimmed text.
//!
//! # Encoding
//! The mapping handed to `mapping_to_xml` must have exactly one top-level key,
//! the envelope tag.

use tracing::warn;

use crate::element::{Attribute, Element, QName, XLINK_NS};
use crate::error::{Error, Result};
use crate::node::{AttrValue, Attributes, Mapping, Node, ATTRS_KEY};

/// Convert an element into a single-key mapping `{tag: node}`.
pub fn element_to_mapping(element: &Element) -> Mapping {
    let (tag, node) = element_to_node(element);
    let mut mapping = Mapping::with_capacity(1);
    mapping.insert(tag, node);
    mapping
}

/// Convert an element into its tag and mapping node.
pub fn element_to_node(element: &Element) -> (String, Node) {
    let mut attrs = Attributes::new();
    for attribute in &element.attributes {
        let local = &attribute.name.local;
        match attribute.name.namespace.as_deref() {
            Some(XLINK_NS) => continue,
            Some(_) if attrs.contains_key(local) => {
                warn!(attribute = %attribute.name, "dropping namespaced attribute whose local name is taken");
            }
            Some(xmlns) => {
                attrs.insert(
                    local.clone(),
                    AttrValue::Namespaced {
                        xmlns: xmlns.to_string(),
                        value: attribute.value.clone(),
                    },
                );
            }
            None => {
                if let Some(AttrValue::Namespaced { .. }) = attrs.get(local) {
                    warn!(attribute = %local, "plain attribute replaces a namespaced one of the same name");
                }
                attrs.insert(local.clone(), AttrValue::Plain(attribute.value.clone()));
            }
        }
    }

    let mut children = Mapping::new();
    for child in &element.children {
        let (tag, node) = element_to_node(child);
        match children.get_mut(&tag) {
            None => {
                children.insert(tag, node);
            }
            // Decoded nodes are never sequences, so a sequence here was
            // created by an earlier repeat of this tag.
            Some(Node::Sequence(items)) => items.push(node),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Node::Sequence(vec![first, node]);
            }
        }
    }

    let value = if children.is_empty() {
        Node::Scalar(element.trimmed_text().to_string())
    } else {
        Node::Container(children)
    };
    let node = if attrs.is_empty() {
        value
    } else {
        Node::attributed(attrs, value)
    };
    let node = match &element.name.namespace {
        Some(xmlns) => Node::Namespaced {
            xmlns: xmlns.clone(),
            value: Box::new(node),
        },
        None => node,
    };
    (element.name.local.clone(), node)
}

/// Parse an XML document into a single-key mapping.
pub fn xml_to_mapping(xml: &str) -> Result<Mapping> {
    Element::parse(xml).map(|root| element_to_mapping(&root))
}

/// Build the element tree for a single-rooted mapping.
pub fn mapping_to_element(mapping: &Mapping) -> Result<Element> {
    if mapping.len() > 1 {
        return Err(Error::Structure("only one root node allowed".to_string()));
    }
    let Some((tag, node)) = mapping.first() else {
        return Err(Error::Structure("a root node is required".to_string()));
    };
    let mut elements = node_to_elements(tag, node);
    if elements.len() != 1 {
        return Err(Error::Structure("only one root node allowed".to_string()));
    }
    Ok(elements.remove(0))
}

/// Serialize a single-rooted mapping as an XML document.
pub fn mapping_to_xml(mapping: &Mapping) -> Result<String> {
    mapping_to_element(mapping)?.to_xml_string()
}

/// Elements produced for `tag` by `node`; a sequence yields one sibling per
/// item.
pub fn node_to_elements(tag: &str, node: &Node) -> Vec<Element> {
    match node {
        Node::Scalar(text) => vec![Element::new(tag).with_text(text.as_str())],
        Node::Sequence(items) => items
            .iter()
            .flat_map(|item| node_to_elements(tag, item))
            .collect(),
        Node::Container(children) => {
            let mut element = Element::new(tag);
            for (child_tag, child) in children {
                if child_tag == ATTRS_KEY {
                    element.attributes.extend(attributes_from_node(child));
                    continue;
                }
                element.children.extend(node_to_elements(child_tag, child));
            }
            vec![element]
        }
        Node::Attributed { attrs, value } => {
            let mut elements = node_to_elements(tag, value);
            if matches!(**value, Node::Sequence(_)) {
                if !attrs.is_empty() {
                    warn!(tag, "dropping attributes set on a sequence of <{tag}> elements");
                }
                return elements;
            }
            for element in &mut elements {
                element.attributes.extend(attrs.iter().map(|(name, value)| to_attribute(name, value)));
            }
            elements
        }
        Node::Namespaced { xmlns, value } => {
            let mut elements = node_to_elements(tag, value);
            for element in &mut elements {
                element.name.namespace = Some(xmlns.clone());
            }
            elements
        }
    }
}

fn to_attribute(name: &str, value: &AttrValue) -> Attribute {
    match value {
        AttrValue::Plain(value) => Attribute {
            name: QName::local(name),
            value: value.clone(),
        },
        AttrValue::Namespaced { xmlns, value } => Attribute {
            name: QName::qualified(xmlns.as_str(), name),
            value: value.clone(),
        },
    }
}

/// Attributes given as a child literally named `attrs`.
fn attributes_from_node(node: &Node) -> Vec<Attribute> {
    let Some(entries) = node.as_mapping() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|(name, value)| match value {
            Node::Namespaced { xmlns, value } => Some(Attribute {
                name: QName::qualified(xmlns.as_str(), name.as_str()),
                value: value.text()?.to_string(),
            }),
            other => Some(Attribute {
                name: QName::local(name.as_str()),
                value: other.text()?.to_string(),
            }),
        })
        .collect()
}

/// How response bodies are decoded and request payloads encoded.
///
/// `Document` is a full parsed response, `Resource` the same response with
/// the envelope removed, as returned by reads.
pub trait Codec {
    type Document;
    type Resource;
    type Input: ?Sized;

    /// Serialize `content` as a request body wrapped in `envelope`.
    fn encode(&self, envelope: &str, content: &Self::Input) -> Result<String>;

    fn decode(&self, body: &str) -> Result<Self::Document>;

    fn unwrap_envelope(&self, envelope: &str, document: Self::Document) -> Result<Self::Resource>;
}

/// Works with element trees; payloads are complete documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl Codec for XmlCodec {
    type Document = Element;
    type Resource = Element;
    type Input = Element;

    fn encode(&self, _envelope: &str, content: &Element) -> Result<String> {
        content.to_xml_string()
    }

    fn decode(&self, body: &str) -> Result<Element> {
        Element::parse(body)
    }

    fn unwrap_envelope(&self, _envelope: &str, document: Element) -> Result<Element> {
        Ok(document)
    }
}

/// Works with mapping nodes; payloads are wrapped in the envelope on the way
/// out and reads are unwrapped on the way in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingCodec;

impl Codec for MappingCodec {
    type Document = Mapping;
    type Resource = Node;
    type Input = Node;

    fn encode(&self, envelope: &str, content: &Node) -> Result<String> {
        let mut document = Mapping::with_capacity(1);
        document.insert(envelope.to_string(), content.clone());
        mapping_to_xml(&document)
    }

    fn decode(&self, body: &str) -> Result<Mapping> {
        xml_to_mapping(body)
    }

    fn unwrap_envelope(&self, envelope: &str, mut document: Mapping) -> Result<Node> {
        document
            .shift_remove(envelope)
            .ok_or_else(|| Error::Parse(format!("response is not wrapped in <{envelope}>")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(xml: &str) -> serde_json::Value {
        serde_json::to_value(xml_to_mapping(xml).unwrap()).unwrap()
    }

    #[test]
    fn single_child_stays_scalar() {
        let mapping = decode("<prestashop><address><id>1</id></address></prestashop>");
        assert_eq!(mapping, json!({"prestashop": {"address": {"id": "1"}}}));
    }

    #[test]
    fn repeated_children_become_a_sequence_in_order() {
        let mapping = decode(
            "<prestashop><addresses>\
             <address id=\"3\"/><address id=\"1\"/><address id=\"2\"/>\
             </addresses></prestashop>",
        );
        let ids: Vec<&str> = mapping["prestashop"]["addresses"]["address"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["attrs"]["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["3", "1", "2"]);
    }

    #[test]
    fn linking_attributes_are_dropped() {
        let mapping = decode(
            r#"<prestashop xmlns:xlink="http://www.w3.org/1999/xlink">
                 <address id="1" xlink:href="http://localhost/api/addresses/1"/>
               </prestashop>"#,
        );
        assert_eq!(
            mapping,
            json!({"prestashop": {"address": {"attrs": {"id": "1"}, "value": ""}}})
        );
    }

    #[test]
    fn other_namespaced_attributes_are_kept() {
        let mapping = decode(r#"<p xmlns:o="urn:other"><a o:kind="x">t</a></p>"#);
        assert_eq!(
            mapping,
            json!({"p": {"a": {"attrs": {"kind": {"value": "x", "xmlns": "urn:other"}}, "value": "t"}}})
        );
    }

    #[test]
    fn plain_attribute_wins_a_local_name_clash() {
        let expected = json!({"p": {"a": {"attrs": {"id": "1"}, "value": ""}}});
        assert_eq!(decode(r#"<p xmlns:o="urn:o"><a o:id="x" id="1"/></p>"#), expected);
        assert_eq!(decode(r#"<p xmlns:o="urn:o"><a id="1" o:id="x"/></p>"#), expected);
    }

    #[test]
    fn children_take_precedence_over_text() {
        let mapping = decode("<p><a>stray<b>1</b></a></p>");
        assert_eq!(mapping, json!({"p": {"a": {"b": "1"}}}));
    }

    #[test]
    fn namespaced_tags_are_split() {
        let mapping = decode(r#"<p><x:item xmlns:x="urn:x">v</x:item></p>"#);
        assert_eq!(mapping, json!({"p": {"item": {"value": "v", "xmlns": "urn:x"}}}));
    }

    #[test]
    fn encode_flattens_sequences_into_siblings() {
        let node = Node::from(json!({
            "product": {
                "name": {"language": [
                    {"attrs": {"id": "1"}, "value": "Mug"},
                    {"attrs": {"id": "2"}, "value": "Tasse"}
                ]},
                "price": 9.5,
                "ean13": null
            }
        }));
        let xml = MappingCodec.encode("prestashop", &node).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <prestashop><product><name>\
             <language id=\"1\">Mug</language><language id=\"2\">Tasse</language>\
             </name><price>9.5</price><ean13/></product></prestashop>"
        );
    }

    #[test]
    fn encode_drops_attributes_on_sequences() {
        let node = Node::attributed(
            Attributes::from([("id".to_string(), AttrValue::from("1"))]),
            Node::Sequence(vec![Node::from("a"), Node::from("b")]),
        );
        let elements = node_to_elements("item", &node);
        assert_eq!(elements.len(), 2);
        assert!(elements.iter().all(|e| e.attributes.is_empty()));
    }

    #[test]
    fn attrs_child_contributes_attributes() {
        let mut children = Mapping::new();
        children.insert(ATTRS_KEY.to_string(), Node::from(json!({"id": "4"})));
        children.insert("name".to_string(), Node::from("x"));
        let elements = node_to_elements("tag", &Node::Container(children));
        assert_eq!(elements[0].attribute("id"), Some("4"));
        assert_eq!(elements[0].children.len(), 1);
    }

    #[test]
    fn namespaced_attributes_are_written_with_a_prefix() {
        let mapping = Node::from(json!({
            "item": {"attrs": {"href": {"value": "u", "xmlns": "urn:x"}}, "value": "t"}
        }))
        .into_mapping()
        .unwrap();
        let xml = mapping_to_xml(&mapping).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><item xmlns:ns0=\"urn:x\" ns0:href=\"u\">t</item>"
        );
        assert_eq!(xml_to_mapping(&xml).unwrap(), mapping);
    }

    #[test]
    fn mapping_codec_writes_namespaced_attrs_child() {
        let mut children = Mapping::new();
        children.insert(
            ATTRS_KEY.to_string(),
            Node::from(json!({"href": {"value": "u", "xmlns": "urn:x"}, "id": "4"})),
        );
        children.insert("name".to_string(), Node::from("x"));
        let mut content = Mapping::new();
        content.insert("item".to_string(), Node::Container(children));
        let xml = MappingCodec.encode("prestashop", &Node::Container(content)).unwrap();
        assert!(xml.contains(r#"xmlns:ns0="urn:x""#), "{xml}");
        assert!(xml.contains(r#"ns0:href="u""#), "{xml}");

        let decoded = serde_json::to_value(xml_to_mapping(&xml).unwrap()).unwrap();
        assert_eq!(
            decoded,
            json!({"prestashop": {"item": {
                "attrs": {"href": {"value": "u", "xmlns": "urn:x"}, "id": "4"},
                "value": {"name": "x"}
            }}})
        );
    }

    #[test]
    fn more_than_one_root_is_rejected() {
        let mapping = Node::from(json!({"a": "1", "b": "2"})).into_mapping().unwrap();
        let err = mapping_to_xml(&mapping).unwrap_err();
        assert!(matches!(err, Error::Structure(msg) if msg == "only one root node allowed"));
    }

    #[test]
    fn empty_mapping_is_rejected() {
        let err = mapping_to_xml(&Mapping::new()).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn sequence_at_the_root_is_rejected() {
        let mapping = Node::from(json!({"a": ["1", "2"]})).into_mapping().unwrap();
        assert!(matches!(mapping_to_xml(&mapping), Err(Error::Structure(_))));
    }

    #[test]
    fn round_trip_is_stable() {
        let xml = r#"<prestashop xmlns:xlink="http://www.w3.org/1999/xlink">
            <product>
                <id><![CDATA[1]]></id>
                <id_category_default xlink:href="http://localhost/api/categories/2">2</id_category_default>
                <name><language id="1">Mug</language><language id="2">Tasse</language></name>
                <associations>
                    <categories nodeType="category">
                        <category><id>2</id></category>
                        <category><id>3</id></category>
                    </categories>
                </associations>
            </product>
        </prestashop>"#;
        let first = xml_to_mapping(xml).unwrap();
        let second = xml_to_mapping(&mapping_to_xml(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mapping_codec_unwraps_the_envelope() {
        let document = MappingCodec
            .decode("<prestashop><address><id>1</id></address></prestashop>")
            .unwrap();
        let resource = MappingCodec.unwrap_envelope("prestashop", document).unwrap();
        assert_eq!(resource.get("address").and_then(|a| a.get("id")), Some(&Node::from("1")));

        let other = MappingCodec.decode("<other/>").unwrap();
        assert!(matches!(
            MappingCodec.unwrap_envelope("prestashop", other),
            Err(Error::Parse(_))
        ));
    }
}
