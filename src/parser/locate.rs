use tracing::debug;

use crate::nodes::Node;

/// A visible target instance plus the container names above it.
#[derive(Debug, Clone)]
pub struct MatchedInstance<'a> {
    pub node: &'a Node,
    /// Root name first, then every FRAME/SECTION on the way down.
    pub nesting: Vec<String>,
}

impl MatchedInstance<'_> {
    pub fn flow(&self) -> Option<&str> {
        self.nesting.first().map(String::as_str)
    }

    pub fn section(&self) -> Option<&str> {
        self.nesting.get(1).map(String::as_str)
    }
}

/// Collect visible instances whose name contains any target, in document pre-order.
///
/// Each top-level child of `root` starts from `[root.name]`. Matched instances are
/// not descended into. Hidden nodes are never matched but their children are still
/// walked.
pub fn locate_instances<'a>(root: &'a Node, targets: &[String]) -> Vec<MatchedInstance<'a>> {
    let seed = vec![root.name.clone()];
    let mut found = Vec::new();

    if is_target(root, targets) {
        found.push(MatchedInstance {
            node: root,
            nesting: seed,
        });
        return found;
    }

    for child in root.children() {
        walk(child, &seed, targets, &mut found);
    }

    debug!("Located {} instances under {:?}", found.len(), root.name);
    found
}

fn walk<'a>(
    node: &'a Node,
    nesting: &[String],
    targets: &[String],
    found: &mut Vec<MatchedInstance<'a>>,
) {
    // containers extend the path for themselves and everything below
    let extended;
    let nesting = if node.is_container() {
        let mut path = nesting.to_vec();
        path.push(node.name.clone());
        extended = path;
        extended.as_slice()
    } else {
        nesting
    };

    if is_target(node, targets) {
        found.push(MatchedInstance {
            node,
            nesting: nesting.to_vec(),
        });
        return;
    }

    for child in node.children() {
        walk(child, nesting, targets, found);
    }
}

fn is_target(node: &Node, targets: &[String]) -> bool {
    node.visible
        && node.is_instance()
        && targets
            .iter()
            .any(|t| !t.is_empty() && node.name.contains(t.as_str()))
}
