//! Placeholder and block expansion for report templates.
//!
//! `{{NAME}}` is a scalar placeholder. A block region starts on a line
//! containing `{{#NAME}}` and ends on a line containing `{{/NAME}}`; the whole
//! region is replaced by the rows supplied for `NAME`. When the lines between
//! the markers contain the item placeholder `{{.}}`, they act as a pattern and
//! are repeated once per row. Blocks do not nest.

use std::collections::BTreeMap;

use crate::error::DaylogError;

pub const ITEM_PLACEHOLDER: &str = "{{.}}";

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

/// Replace every known `{{NAME}}`; unknown names stay verbatim.
pub fn substitute_scalars(line: &str, scalars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after_open[..end];
        match scalars.get(name) {
            Some(value) if is_placeholder_name(name) => out.push_str(value),
            _ => {
                out.push_str("{{");
                out.push_str(name);
                out.push_str("}}");
            }
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Marker<'a> {
    kind: MarkerKind,
    name: &'a str,
}

fn find_markers(line: &str) -> Vec<Marker<'_>> {
    let mut out = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        let inner = &after_open[..end];
        let marker = if let Some(name) = inner.strip_prefix('#') {
            Some(Marker {
                kind: MarkerKind::Open,
                name,
            })
        } else {
            inner.strip_prefix('/').map(|name| Marker {
                kind: MarkerKind::Close,
                name,
            })
        };
        if let Some(marker) = marker
            && is_placeholder_name(marker.name)
        {
            out.push(marker);
        }
        rest = &after_open[end + 2..];
    }
    out
}

fn line_ending(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

fn template_error(line: usize, reason: String) -> DaylogError {
    DaylogError::TemplateError { line, reason }
}

struct OpenBlock<'a> {
    name: &'a str,
    opened_at: usize,
    body: Vec<&'a str>,
}

fn expand_block(
    block: &OpenBlock<'_>,
    rows: &[String],
    scalars: &BTreeMap<String, String>,
    ending: &str,
    out: &mut String,
) {
    if rows.is_empty() {
        return;
    }
    let pattern: String = block.body.concat();
    if pattern.contains(ITEM_PLACEHOLDER) {
        // Row text is inserted verbatim, never scanned for placeholders.
        let pattern = substitute_scalars(&pattern, scalars);
        for row in rows {
            out.push_str(&pattern.replace(ITEM_PLACEHOLDER, row));
        }
        return;
    }
    out.push_str(&rows.join("\n"));
    out.push_str(ending);
}

/// Render `template` in one pass over its lines.
///
/// Fails on an open marker without a close, a close without an open, a block
/// opened inside another block, or a block name with no rows supplied.
pub fn render(
    template: &str,
    scalars: &BTreeMap<String, String>,
    blocks: &BTreeMap<String, Vec<String>>,
) -> Result<String, DaylogError> {
    let mut out = String::with_capacity(template.len());
    let mut open: Option<OpenBlock<'_>> = None;

    for (idx, line) in template.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let markers = find_markers(line);

        let Some(current) = open.as_mut() else {
            match markers.first() {
                None => out.push_str(&substitute_scalars(line, scalars)),
                Some(Marker {
                    kind: MarkerKind::Close,
                    name,
                }) => {
                    return Err(template_error(
                        line_no,
                        format!("closing `{{{{/{name}}}}}` without a matching open"),
                    ));
                }
                Some(Marker {
                    kind: MarkerKind::Open,
                    name,
                }) => {
                    let rows = blocks.get(*name).ok_or_else(|| {
                        template_error(line_no, format!("unknown block `{name}`"))
                    })?;
                    let block = OpenBlock {
                        name: *name,
                        opened_at: line_no,
                        body: Vec::new(),
                    };
                    let closes_here = markers[1..]
                        .iter()
                        .any(|m| m.kind == MarkerKind::Close && m.name == *name);
                    if closes_here {
                        expand_block(&block, rows, scalars, line_ending(line), &mut out);
                    } else {
                        open = Some(block);
                    }
                }
            }
            continue;
        };

        match markers.first() {
            None => current.body.push(line),
            Some(Marker {
                kind: MarkerKind::Open,
                name,
            }) => {
                return Err(template_error(
                    line_no,
                    format!(
                        "block `{name}` opened inside block `{}` (opened at line {}); blocks do not nest",
                        current.name, current.opened_at
                    ),
                ));
            }
            Some(Marker {
                kind: MarkerKind::Close,
                name,
            }) => {
                if *name != current.name {
                    return Err(template_error(
                        line_no,
                        format!(
                            "closing `{name}` while block `{}` (opened at line {}) is open",
                            current.name, current.opened_at
                        ),
                    ));
                }
                let rows = blocks.get(current.name).map(Vec::as_slice).unwrap_or(&[]);
                expand_block(current, rows, scalars, line_ending(line), &mut out);
                open = None;
            }
        }
    }

    if let Some(block) = open {
        return Err(template_error(
            block.opened_at,
            format!("block `{}` is never closed", block.name),
        ));
    }
    Ok(out)
}
