//! CSS selector synthesis for captured elements (§4.4).
//!
//! Selectors are a human/AI-facing hint, not a uniqueness proof — the
//! guarantee this module upholds is narrower and stronger: it never
//! returns an empty string and never panics, for any [`ElementInfo`]
//! shape a capture can produce.

use crate::capture::ElementInfo;

const UTILITY_PREFIXES: &[&str] =
    &["flex", "grid", "p-", "m-", "text-", "bg-", "w-", "h-", "col-", "row-", "d-", "css-"];

fn is_utility_class(class: &str) -> bool {
    UTILITY_PREFIXES.iter().any(|prefix| class.starts_with(prefix))
}

/// Up to two non-utility classes, preferring earlier (outer-declared) ones.
fn non_utility_classes(classes: &[String], limit: usize) -> Vec<&str> {
    classes.iter().map(String::as_str).filter(|c| !is_utility_class(c)).take(limit).collect()
}

/// Build the local (non-ancestor) selector for one element: id wins
/// outright, otherwise `tag` plus up to `class_limit` non-utility classes.
/// Callers synthesizing the target element itself pass `id: None` (the
/// bare `#id` shortcut is handled one level up, in [`synthesize`]); an
/// ancestor's id is combined with its tag instead (`header#top`).
fn local_selector(tag: &str, id: Option<&str>, classes: &[String], class_limit: usize) -> String {
    let tag = if tag.is_empty() { "*" } else { tag };
    if let Some(id) = id.filter(|s| !s.is_empty()) {
        return format!("{tag}#{id}");
    }
    let classes = non_utility_classes(classes, class_limit);
    if classes.is_empty() {
        tag.to_string()
    } else {
        let suffix: String = classes.iter().map(|c| format!(".{c}")).collect();
        format!("{tag}{suffix}")
    }
}

/// Synthesize a CSS selector for `element`, composing up to three ancestor
/// selectors (from [`ElementInfo::parent_chain`]) joined by ` > `.
pub fn synthesize(element: &ElementInfo) -> String {
    if let Some(id) = element.id.as_deref().filter(|s| !s.is_empty()) {
        return format!("#{id}");
    }

    // `parent_chain` is nearest-ancestor-first (§3.2); the selector reads
    // outer-to-inner, so reverse before composing.
    let mut parts: Vec<String> = element
        .parent_chain
        .iter()
        .take(3)
        .rev()
        .map(|ancestor| local_selector(&ancestor.tag, ancestor.id.as_deref(), &ancestor.classes, 1))
        .collect();
    parts.push(local_selector(&element.tag, None, &element.classes, 2));

    let selector = parts.join(" > ");
    if selector.is_empty() {
        "*".to_string()
    } else {
        selector
    }
}
