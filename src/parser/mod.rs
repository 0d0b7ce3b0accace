pub mod extract;
pub mod locate;
pub mod normalize;

use tracing::warn;

use crate::nodes::Node;
use crate::settings::{Markers, Settings};
use locate::MatchedInstance;

/// What a configured heading is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Required,
    Question,
    Current,
    NoChange,
    Flow,
    Section,
    Unknown,
}

impl Column {
    pub fn from_heading(heading: &str) -> Column {
        let h = heading.trim().to_lowercase();
        // most specific first: "Question (No Change)" and "Question ID" are not Question
        if h.contains("no change") || h.contains("no-change") {
            Column::NoChange
        } else if h.contains("current") {
            Column::Current
        } else if h == "id" || h.ends_with(" id") || h.starts_with("id ") {
            Column::Id
        } else if h.contains("question") {
            Column::Question
        } else if h.contains("required") {
            Column::Required
        } else if h.contains("flow") {
            Column::Flow
        } else if h.contains("section") {
            Column::Section
        } else {
            Column::Unknown
        }
    }
}

/// Resolve headings to columns, warning once per heading nothing can fill.
pub fn resolve_columns(headings: &[String]) -> Vec<Column> {
    headings
        .iter()
        .map(|h| {
            let column = Column::from_heading(h);
            if column == Column::Unknown {
                warn!("Heading {:?} matches no known column; it will be empty", h);
            }
            column
        })
        .collect()
}

/// Two-pass pipeline: document → matched instances → one row per instance.
pub fn process_document(root: &Node, settings: &Settings) -> Vec<Vec<String>> {
    let columns = resolve_columns(&settings.headings);
    locate::locate_instances(root, &settings.components)
        .iter()
        .map(|m| build_row(m, &columns, settings))
        .collect()
}

pub fn build_row(instance: &MatchedInstance, columns: &[Column], settings: &Settings) -> Vec<String> {
    columns
        .iter()
        .map(|c| cell(instance, *c, settings))
        .collect()
}

fn cell(instance: &MatchedInstance, column: Column, settings: &Settings) -> String {
    let markers = &settings.markers;
    let node = instance.node;
    match column {
        Column::Id => match extract::property(node.properties(), &markers.id) {
            Some(v) => normalize::flatten_id(&v.to_string()),
            None => {
                warn!("Instance {:?} has no {:?} property; ID left empty", node.name, markers.id);
                String::new()
            }
        },
        Column::Required => extract::property(node.properties(), &markers.required)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        Column::Question => question_text(node, markers),
        Column::Current => first_layer(node, &markers.current_label, &settings.sentinels),
        Column::NoChange => first_layer(node, &markers.no_change_label, &settings.sentinels),
        Column::Flow => instance.flow().unwrap_or_default().to_string(),
        Column::Section => instance.section().unwrap_or_default().to_string(),
        Column::Unknown => String::new(),
    }
}

/// Header cards carry their question in one flat property; other questions
/// spread it over one or more text layers.
fn question_text(node: &Node, markers: &Markers) -> String {
    if !markers.header_card.is_empty() && node.name.contains(&markers.header_card) {
        return match extract::property(node.properties(), &markers.header_property) {
            Some(v) => normalize::normalize(&v.to_string()),
            None => {
                warn!(
                    "Header card {:?} has no {:?} property",
                    node.name, markers.header_property
                );
                String::new()
            }
        };
    }

    let layers = extract::text_by_label(node, &markers.question_label);
    if layers.is_empty() {
        warn!(
            "Instance {:?} has no {:?} text layer",
            node.name, markers.question_label
        );
    }
    layers
        .iter()
        .map(|t| normalize::normalize(t))
        .collect::<Vec<_>>()
        .join("; ")
}

fn first_layer(node: &Node, label: &str, sentinels: &[String]) -> String {
    extract::text_by_label(node, label)
        .first()
        .map(|t| normalize::normalize_with_sentinels(t, sentinels))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::from_toml("token = \"t\"\nfile = \"f\"\n[[pages]]\nid = \"1-2\"\n").unwrap()
    }

    fn fixture_root() -> Node {
        let raw = std::fs::read_to_string("tests/fixtures/page.json").unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        serde_json::from_value(v["nodes"]["11741:224247"]["document"].clone()).unwrap()
    }

    #[test]
    fn heading_resolution() {
        assert_eq!(Column::from_heading("ID"), Column::Id);
        assert_eq!(Column::from_heading("Question ID"), Column::Id);
        assert_eq!(Column::from_heading("Required"), Column::Required);
        assert_eq!(Column::from_heading("Question"), Column::Question);
        assert_eq!(Column::from_heading("Question (Current)"), Column::Current);
        assert_eq!(Column::from_heading("Question (No Change)"), Column::NoChange);
        assert_eq!(Column::from_heading("Flow"), Column::Flow);
        assert_eq!(Column::from_heading("Section"), Column::Section);
        assert_eq!(Column::from_heading("Programs"), Column::Unknown);
        assert_eq!(Column::from_heading("Hidden"), Column::Unknown);
    }

    #[test]
    fn application_question_row() {
        let root: Node = serde_json::from_value(json!({
            "type": "FRAME", "name": "Page",
            "children": [{ "type": "FRAME", "name": "Section A", "children": [{
                "type": "INSTANCE", "name": "Application Question",
                "componentProperties": {
                    "🟣 ID": { "type": "TEXT", "value": "Q1\n" },
                    "🔴 Required": { "type": "BOOLEAN", "value": true }
                },
                "children": [{ "type": "TEXT", "name": "Text input label", "characters": "What is your name?" }]
            }]}]
        }))
        .unwrap();

        let rows = process_document(&root, &settings());
        assert_eq!(
            rows,
            vec![vec!["Q1; ", "true", "What is your name?", "", "", "Page", "Section A"]]
        );
    }

    #[test]
    fn missing_id_gives_empty_cell_not_panic() {
        let root: Node = serde_json::from_value(json!({
            "type": "FRAME", "name": "Page",
            "children": [{ "type": "INSTANCE", "name": "Application Question", "children": [] }]
        }))
        .unwrap();
        let rows = process_document(&root, &settings());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec!["", "", "", "", "", "Page", ""]);
    }

    #[test]
    fn header_card_reads_flat_property() {
        let mut s = settings();
        s.components.push("Header Card".into());
        let root: Node = serde_json::from_value(json!({
            "type": "FRAME", "name": "Page",
            "children": [{
                "type": "INSTANCE", "name": "Header Card",
                "componentProperties": {
                    "🟣 ID": { "type": "TEXT", "value": "H1" },
                    "✏️ Header text": { "type": "TEXT", "value": "About you\nand your family" }
                },
                "children": [{ "type": "TEXT", "name": "Text input label", "characters": "ignored" }]
            }]
        }))
        .unwrap();
        let rows = process_document(&root, &s);
        assert_eq!(rows[0][0], "H1");
        assert_eq!(rows[0][2], "About you and your family");
    }

    #[test]
    fn every_row_matches_heading_count() {
        let mut s = settings();
        s.headings = vec!["Flow".into(), "Programs".into(), "ID".into()];
        let rows = process_document(&fixture_root(), &s);
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.len() == 3));
        assert!(rows.iter().all(|r| r[1].is_empty()));
    }

    #[test]
    fn fixture_rows() {
        let rows = process_document(&fixture_root(), &settings());
        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first[0], "APP-001; contact");
        assert_eq!(first[1], "true");
        assert_eq!(first[2], "What is your last name?; ¿Cuál es su apellido?");
        // "Current: Last name" placeholder suppressed
        assert_eq!(first[3], "");
        assert_eq!(first[4], "");
        assert_eq!(first[5], "Application flow");
        assert_eq!(first[6], "Contact details");

        let second = &rows[1];
        assert_eq!(second[0], "APP-002");
        assert_eq!(second[2], "Preferred contact method");
        assert_eq!(second[3], "Current: Phone; Email; Text");
        assert_eq!(second[4], "No change: keep phone");

        // hidden section still walked; sibling sections do not leak into nesting
        let third = &rows[2];
        assert_eq!(third[0], "APP-003");
        assert_eq!(third[6], "Archived");
    }
}
