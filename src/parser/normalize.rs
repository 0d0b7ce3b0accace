use std::sync::LazyLock;

use regex::Regex;

static EN_DASH_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"–{2,}").unwrap());
static EM_DASH_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"—{2,}").unwrap());

const LINE_SEPARATOR: char = '\u{2028}';
const OPTION_SEPARATOR: &str = " – ";

/// Clean layer text for a single table cell.
///
/// Line breaks become spaces, dash runs collapse to one dash, and
/// `" – "`-separated options are rejoined with `"; "`. The rules repeat until
/// nothing changes, so normalizing twice gives the same result as once.
pub fn normalize(text: &str) -> String {
    let mut current = apply_rules(text);
    loop {
        let next = apply_rules(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// `normalize`, then blank out known placeholder texts.
pub fn normalize_with_sentinels(text: &str, sentinels: &[String]) -> String {
    let cleaned = normalize(text);
    if sentinels.iter().any(|s| *s == cleaned) {
        String::new()
    } else {
        cleaned
    }
}

/// ID values keep their line structure as `"; "`-separated parts.
pub fn flatten_id(id: &str) -> String {
    id.replace("\r\n", "; ")
        .replace(['\n', '\r', LINE_SEPARATOR], "; ")
}

fn apply_rules(text: &str) -> String {
    let spaced = text.replace(['\n', '\r', LINE_SEPARATOR], " ");
    let collapsed = EN_DASH_RUN_RE.replace_all(&spaced, "–");
    let collapsed = EM_DASH_RUN_RE.replace_all(&collapsed, "—");
    collapsed
        .split(OPTION_SEPARATOR)
        .collect::<Vec<_>>()
        .join("; ")
}
