//! Extracts `@name` / `@"Quoted Name"` mentions from record bodies.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// `@` must start the body or follow a non-word character, so e-mail addresses
// are not mentions.
static MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^\w])@(?:"([^"\r\n]+)"|([\w.\-]+))"#).expect("mention pattern is valid")
});

/// Names mentioned in `body`, deduplicated case-insensitively in first-seen order.
pub fn parse_mentions(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for caps in MENTION_REGEX.captures_iter(body) {
        let name = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => quoted.as_str().trim(),
            (None, Some(bare)) => bare.as_str().trim_end_matches(['.', '-']),
            (None, None) => continue,
        };
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            names.push(name.to_string());
        }
    }

    names
}
