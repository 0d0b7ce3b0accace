use crate::nodes::{ComponentProperty, Node, NodeKind, PropertyValue};

/// Value of the first property whose key contains `partial_key`.
pub fn property<'a>(properties: &'a [ComponentProperty], partial_key: &str) -> Option<&'a PropertyValue> {
    properties
        .iter()
        .find(|p| p.key.contains(partial_key))
        .map(|p| &p.value)
}

/// Characters of every text layer under `node` labelled `label`, in pre-order.
///
/// A layer matches on its own name, or failing that on the component property
/// its characters are bound to.
pub fn text_by_label<'a>(node: &'a Node, label: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    collect_text(node, label, &mut found);
    found
}

fn collect_text<'a>(node: &'a Node, label: &str, found: &mut Vec<&'a str>) {
    if let NodeKind::Text {
        characters,
        bound_property,
    } = &node.kind
    {
        let bound = bound_property
            .as_deref()
            .is_some_and(|p| p.contains(label));
        if node.name.contains(label) || bound {
            found.push(characters);
        }
    }
    for child in node.children() {
        collect_text(child, label, found);
    }
}
