//! Scene document serialization.
//!
//! Each built-in node becomes one element named after its type, carrying
//! an `id` attribute and one attribute per defined scalar field. Nodes held
//! by node fields become nested elements. PROTO instances are written as
//! their expanded body; an unexpanded PROTO writes nothing.
//!
//! ```text
//! <Shape id="n12" castShadows="false"><Box id="n13" size="1 1 1"/></Shape>
//! ```

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::{ProtoError, ProtoResult};
use crate::node::Node;

/// Serialize `node` and everything below it.
pub fn to_scene_document(node: &Node) -> ProtoResult<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, node)?;
    String::from_utf8(writer.into_inner()).map_err(|e| ProtoError::Document(e.to_string()))
}

/// Serialize `node` wrapped in `<nodes>`, the form the renderer loads.
pub fn to_fragment(node: &Node) -> ProtoResult<String> {
    Ok(format!("<nodes>{}</nodes>", to_scene_document(node)?))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> ProtoResult<()> {
    let base = match node {
        Node::Base(base) => base,
        Node::Proto(proto) => {
            return match proto.value() {
                Some(value) => write_node(writer, value),
                None => Ok(()),
            };
        }
    };

    let id = base.id().to_string();
    let mut element = BytesStart::new(base.name());
    element.push_attribute(("id", id.as_str()));

    let mut children = Vec::new();
    for parameter in base.parameters() {
        let Some(value) = parameter.value() else {
            continue;
        };
        match value.to_attribute() {
            Some(text) => element.push_attribute((parameter.name(), text.as_str())),
            None => children.extend(value.nodes()),
        }
    }

    // PROTO children that were never expanded produce no element
    children.retain(|child| child.base_node().is_some());

    if children.is_empty() {
        return write_event(writer, Event::Empty(element));
    }

    write_event(writer, Event::Start(element))?;
    for child in children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(base.name())))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> ProtoResult<()> {
    writer
        .write_event(event)
        .map_err(|e| ProtoError::Document(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::node::ExternProtos;
    use crate::resolver::Resolver;
    use std::rc::Rc;

    fn document(text: &str) -> (Node, String) {
        let resolver = Resolver::new(Rc::new(MemoryFetcher::new()));
        let node = resolver
            .create_node_from_text(text, &ExternProtos::default())
            .unwrap();
        let document = to_scene_document(&node).unwrap();
        (node, document)
    }

    fn id_at(node: &Node, path: &crate::node::NodePath) -> String {
        node.node_at_path(path).unwrap().id().to_string()
    }

    #[test]
    fn test_empty_node() {
        let (node, document) = document("Shape { }");
        assert_eq!(document, format!("<Shape id=\"{}\"/>", node.id()));
    }

    #[test]
    fn test_nested_nodes_and_attributes() {
        let (node, document) =
            document("Shape { castShadows FALSE geometry Box { size 1 2 3 } appearance PBRAppearance { baseColor 1 0 0 } }");
        let root = crate::node::NodePath::root();
        let appearance = id_at(&node, &root.clone().child("appearance", 0));
        let geometry = id_at(&node, &root.child("geometry", 0));
        assert_eq!(
            document,
            format!(
                "<Shape id=\"{}\" castShadows=\"false\"><PBRAppearance id=\"{}\" baseColor=\"1 0 0\"/><Box id=\"{}\" size=\"1 2 3\"/></Shape>",
                node.id(),
                appearance,
                geometry
            )
        );
    }

    #[test]
    fn test_mf_nodes() {
        let (node, document) = document("Group { children [ Box { } Sphere { radius 0.25 } ] }");
        let root = crate::node::NodePath::root();
        let first = id_at(&node, &root.clone().child("children", 0));
        let second = id_at(&node, &root.child("children", 1));
        assert_eq!(
            document,
            format!(
                "<Group id=\"{}\"><Box id=\"{}\"/><Sphere id=\"{}\" radius=\"0.25\"/></Group>",
                node.id(),
                first,
                second
            )
        );
    }

    #[test]
    fn test_attribute_escaping() {
        let (_, document) = document("ImageTexture { url [ \"a&b.png\" ] }");
        assert!(document.contains("url=\"&quot;a&amp;b.png&quot;\""));
    }

    #[test]
    fn test_fragment_wrapper() {
        let resolver = Resolver::new(Rc::new(MemoryFetcher::new()));
        let node = resolver
            .create_node_from_text("Box { }", &ExternProtos::default())
            .unwrap();
        assert_eq!(
            to_fragment(&node).unwrap(),
            format!("<nodes><Box id=\"{}\"/></nodes>", node.id())
        );
    }
}
