//! Markdown+frontmatter spec parsing (§4.1).
//!
//! Sectioning (H2 pillars, H4 checks, `## Overrides`) is derived from
//! `pulldown-cmark`'s heading events; the definition-list-style metadata
//! bullets under each check heading (`- **Severity**: ...`) are a line
//! convention, not CommonMark definition lists, so they're read directly
//! off the raw text span between one heading and the next.

use super::{Check, ConfigValue, Pillar, Severity, Spec};
use crate::error::{Error, Result};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::Deserialize;
use std::collections::HashMap;

/// Frontmatter accepts two shapes (§4.1): the spec form (`name`, `version`,
/// `extends`) and the skill form (`name`, `description`). Both deserialize
/// into this one struct; missing `version`/`extends` default per spec.
#[derive(Debug, Deserialize)]
struct Frontmatter {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    description: Option<String>,
}

struct Heading {
    level: u8,
    title: String,
    /// Byte offset where this heading's own line ends (content starts here).
    content_start: usize,
    /// Byte offset where this heading's underlying `#` marker starts
    /// (the previous heading's content ends here).
    heading_start: usize,
}

/// Parse a standalone spec, applying any `## Overrides` immediately. This
/// is what `extends`-free callers (and `Spec::from_markdown`) want; a spec
/// that extends a parent must defer override application until after the
/// parent is merged in, so the loader calls [`parse_with_overrides`]
/// directly instead (§4.1: overrides target the *resolved* spec, which
/// includes inherited checks).
pub fn parse(source: &str) -> Result<Spec> {
    let (mut spec, overrides) = parse_with_overrides(source)?;
    apply_overrides(&mut spec, overrides);
    Ok(spec)
}

/// Parse a spec's own declarations without applying `## Overrides` yet,
/// returning the pending patches alongside so a caller (the loader) can
/// merge in an `extends` parent first and apply overrides against the
/// merged result.
pub(super) fn parse_with_overrides(source: &str) -> Result<(Spec, Vec<(String, CheckPatch)>)> {
    let (frontmatter, body) = split_frontmatter(source)?;
    let headings = collect_headings(body);

    let mut spec = Spec {
        name: frontmatter.name,
        version: frontmatter.version.unwrap_or_else(|| "1.0".to_string()),
        extends: frontmatter.extends,
        pillars: Vec::new(),
        resolved_from: Vec::new(),
        warnings: Vec::new(),
    };

    let mut overrides_mode = false;
    let mut overrides: Vec<(String, CheckPatch)> = Vec::new();

    for (i, h) in headings.iter().enumerate() {
        let content_end = headings.get(i + 1).map(|n| n.heading_start).unwrap_or(body.len());
        let content = &body[h.content_start..content_end];

        match h.level {
            2 if h.title.trim().eq_ignore_ascii_case("overrides") => {
                overrides_mode = true;
            }
            2 => {
                overrides_mode = false;
                spec.pillars.push(Pillar { name: h.title.clone(), description: None, checks: Vec::new() });
            }
            4 if overrides_mode => {
                let patch = parse_check_patch(content)?;
                overrides.push((h.title.trim().to_string(), patch));
            }
            4 => {
                let check = parse_check(&h.title, content)?;
                match spec.pillars.last_mut() {
                    Some(pillar) => pillar.checks.push(check),
                    None => {
                        return Err(Error::SpecParseError(format!(
                            "check `{}` appears before any pillar heading",
                            h.title
                        )))
                    }
                }
            }
            _ => {}
        }
    }

    if spec.name.is_empty() {
        return Err(Error::SpecParseError("frontmatter missing `name`".to_string()));
    }

    Ok((spec, overrides))
}

fn split_frontmatter(source: &str) -> Result<(Frontmatter, &str)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let rest = source.trim_start_matches('\n');
    let Some(after_open) = rest.strip_prefix("---") else {
        return Err(Error::SpecParseError("missing frontmatter opening `---`".to_string()));
    };
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);
    let Some(close_idx) = after_open.find("\n---") else {
        return Err(Error::SpecParseError("missing frontmatter closing `---`".to_string()));
    };
    let yaml = &after_open[..close_idx];
    let after_close = &after_open[close_idx + 4..];
    let body = after_close.strip_prefix('\n').unwrap_or(after_close);

    let frontmatter: Frontmatter = serde_norway::from_str(yaml)
        .map_err(|e| Error::SpecParseError(format!("invalid frontmatter: {e}")))?;
    Ok((frontmatter, body))
}

fn collect_headings(body: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<(u8, String, usize)> = None;

    for (event, range) in Parser::new(body).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((heading_level(level), String::new(), range.start));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, title, _)) = current.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title, heading_start)) = current.take() {
                    headings.push(Heading {
                        level,
                        title: title.trim().to_string(),
                        content_start: range.end,
                        heading_start,
                    });
                }
            }
            _ => {}
        }
    }
    headings
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// A parsed `## Overrides` entry: severity and/or config patch for an
/// already-inherited check id (§4.1).
#[derive(Default)]
pub(super) struct CheckPatch {
    severity: Option<Severity>,
    config: HashMap<String, ConfigValue>,
}

fn parse_check(id: &str, content: &str) -> Result<Check> {
    let mut severity = None;
    let mut description = String::new();
    let mut config = HashMap::new();
    let mut how_to_check = None;
    let mut approved_values = None;

    for (key, value) in definition_bullets(content) {
        match key.to_ascii_lowercase().as_str() {
            "severity" => severity = Some(Severity::parse(&value)?),
            "description" => description = value,
            "config" => config = parse_config(&value),
            "how to check" | "howtocheck" => how_to_check = Some(value),
            "approved values" | "approvedvalues" => {
                approved_values = Some(value.split(',').map(|v| v.trim().to_string()).collect())
            }
            _ => {}
        }
    }

    let severity = severity
        .ok_or_else(|| Error::SpecParseError(format!("check `{id}` is missing `- **Severity**:`")))?;

    Ok(Check {
        id: id.to_string(),
        severity,
        description,
        config,
        how_to_check,
        approved_values,
    })
}

fn parse_check_patch(content: &str) -> Result<CheckPatch> {
    let mut patch = CheckPatch::default();
    for (key, value) in definition_bullets(content) {
        match key.to_ascii_lowercase().as_str() {
            "severity" => patch.severity = Some(Severity::parse(&value)?),
            "config" => patch.config = parse_config(&value),
            _ => {}
        }
    }
    Ok(patch)
}

pub(super) fn apply_overrides(spec: &mut Spec, overrides: Vec<(String, CheckPatch)>) {
    for (id, patch) in overrides {
        let found = spec
            .pillars
            .iter_mut()
            .flat_map(|p| p.checks.iter_mut())
            .find(|c| c.id == id);
        match found {
            Some(check) => {
                if let Some(sev) = patch.severity {
                    check.severity = sev;
                }
                for (k, v) in patch.config {
                    check.config.insert(k, v);
                }
            }
            None => spec.warnings.push(format!(
                "override for unknown check id `{id}` ignored (no dangling effect)"
            )),
        }
    }
}

/// Extract `- **Key**: value` lines from a heading's raw content span.
/// pulldown-cmark already strips the `**` markers from inline text, so a
/// plain line scan for a leading `-` bullet followed by a known label is
/// enough; this mirrors how the spec itself describes the convention
/// ("definition-list style bullet lines"), not a true CommonMark deflist.
fn definition_bullets(content: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw_line in content.lines() {
        let line = raw_line.trim();
        let Some(rest) = line.strip_prefix("- ") else { continue };
        let rest = rest.trim();
        let Some((key, value)) = rest.split_once(':') else { continue };
        let key = key.trim().trim_matches('*').trim().to_string();
        out.push((key, value.trim().to_string()));
    }
    out
}

/// Parse a `key1=value1, key2=value2` config DSL; `key=[a, b, c]` yields a
/// list value. Commas inside `[...]` don't split the outer pair list.
fn parse_config(raw: &str) -> HashMap<String, ConfigValue> {
    let mut out = HashMap::new();
    for pair in split_top_level_commas(raw) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once(['=', ':']) else { continue };
        let key = key.trim().to_string();
        let value = value.trim();
        let value = if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            ConfigValue::List(inner.split(',').map(|v| v.trim().trim_matches('"').to_string()).collect())
        } else {
            ConfigValue::Scalar(value.trim_matches('"').to_string())
        };
        out.insert(key, value);
    }
    out
}

fn split_top_level_commas(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in raw.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
