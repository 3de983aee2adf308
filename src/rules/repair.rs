use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use super::classify::group_number;
use super::error::{ErrorKind, ValidationError};
use super::grammar::SEPARATORS;
use super::inventory;
use super::structure;
use crate::config::TitleMode;
use crate::docx::xml::{Node, NodePath};
use crate::docx::{BlockMut, Document};
use crate::utils::truncate;

/// One change made to the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFix {
    pub block_index: usize,
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    /// Findings before any change.
    pub found: Vec<ValidationError>,
    pub fixes: Vec<AppliedFix>,
    /// Findings after re-validation; only kinds without an automatic fix remain.
    pub residual: Vec<ValidationError>,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        !self.fixes.is_empty()
    }
}

/// Order of fixes within one block. Stray text goes first so the image
/// inventory is taken from a clean line.
fn priority(kind: &ErrorKind) -> u8 {
    match kind {
        ErrorKind::ImageStrayText => 0,
        ErrorKind::ImageTooMany { .. } => 1,
        ErrorKind::TitleFormat => 2,
        _ => 3,
    }
}

/// Validate, group findings by block, apply the fixes that exist, re-validate.
/// Mutates `document` in place.
pub fn repair(document: &mut Document, mode: TitleMode) -> RepairReport {
    let found = structure::validate(document, mode);

    let mut by_block: BTreeMap<usize, Vec<ErrorKind>> = BTreeMap::new();
    for error in &found {
        match error.block_index {
            Some(index) => {
                let kinds = by_block.entry(index).or_default();
                if !kinds.iter().any(|k| k.code() == error.kind.code()) {
                    kinds.push(error.kind);
                }
            }
            None => debug!("Left for manual review: {}", error),
        }
    }

    let mut fixes = Vec::new();
    for (index, mut kinds) in by_block {
        kinds.sort_by_key(priority);
        let mut next = 0;
        while next < kinds.len() {
            let kind = kinds[next];
            next += 1;
            let fix = match kind {
                ErrorKind::ImageStrayText => strip_stray_text(document, index),
                ErrorKind::ImageTooMany { .. } => prune_images(document, index),
                ErrorKind::TitleFormat => normalize_title(document, index),
                other => {
                    debug!("Line {}: {} left for manual review", index + 1, other.code());
                    None
                }
            };
            if let Some(fix) = fix {
                info!("Line {}: fixed {} ({})", index + 1, fix.kind, fix.detail);
                fixes.push(fix);
                if kind == ErrorKind::ImageStrayText {
                    // cleared runs may now count as images
                    let count = image_count(document, index);
                    let queued = kinds
                        .iter()
                        .any(|k| matches!(k, ErrorKind::ImageTooMany { .. }));
                    if count > 1 && !queued {
                        debug!("Line {}: {} images after clearing text", index + 1, count);
                        kinds.insert(next, ErrorKind::ImageTooMany { count });
                    }
                }
            }
        }
    }

    let residual = structure::validate(document, mode);
    RepairReport {
        found,
        fixes,
        residual,
    }
}

// ── Image line ──

fn strip_stray_text(document: &mut Document, index: usize) -> Option<AppliedFix> {
    let mut block = document.block_mut(index)?;
    let (targets, removed): (Vec<NodePath>, String) = {
        let view = block.as_block();
        let runs: Vec<_> = view
            .runs()
            .into_iter()
            .filter(|r| !r.is_image_only() && !r.text().is_empty())
            .collect();
        (
            runs.iter().map(|r| r.path.clone()).collect(),
            runs.iter().map(|r| r.text()).collect(),
        )
    };
    if targets.is_empty() {
        return None;
    }

    for path in &targets {
        block.clear_run_text(path);
    }
    Some(AppliedFix {
        block_index: index,
        kind: ErrorKind::ImageStrayText.code(),
        detail: format!("removed text {:?}", truncate(&removed, 50)),
    })
}

fn prune_images(document: &mut Document, index: usize) -> Option<AppliedFix> {
    let mut block = document.block_mut(index)?;
    let located = inventory::locate(&block.as_block());
    let keep = located.iter().position(|l| l.image.valid);

    let mut doomed: Vec<(NodePath, NodePath)> = located
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != keep)
        // an object that encloses the kept image cannot go without it
        .filter(|(_, l)| keep.map_or(true, |k| !located[k].object.starts_with(&l.object)))
        .map(|(_, l)| (l.object.clone(), l.run.clone()))
        .collect();
    if doomed.is_empty() {
        return None;
    }
    doomed.sort();
    doomed.dedup();

    // back to front so earlier paths stay valid
    for (object, run) in doomed.iter().rev() {
        if block.remove_node(object).is_some() {
            prune_emptied(&mut block, object, run);
        }
    }
    let removed_names: Vec<String> = located
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != keep)
        .map(|(_, l)| display_name(&l.image.identity))
        .collect();

    let detail = match keep {
        Some(k) => format!(
            "removed {} image(s) [{}], kept {}",
            removed_names.len(),
            removed_names.join(", "),
            display_name(&located[k].image.identity)
        ),
        None => format!(
            "removed {} image(s) [{}], none had a usable size",
            removed_names.len(),
            removed_names.join(", ")
        ),
    };
    Some(AppliedFix {
        block_index: index,
        kind: ErrorKind::ImageTooMany { count: located.len() }.code(),
        detail,
    })
}

fn image_count(document: &Document, index: usize) -> usize {
    document
        .block(index)
        .map_or(0, |block| inventory::inventory(&block).len())
}

fn display_name(identity: &str) -> String {
    if identity.is_empty() {
        "<unnamed>".to_string()
    } else {
        identity.to_string()
    }
}

/// Drop containers left empty by a removal, up to and including the run.
fn prune_emptied(block: &mut BlockMut, removed: &[usize], run: &[usize]) {
    let mut current: NodePath = removed[..removed.len().saturating_sub(1)].to_vec();
    while current.len() > run.len() {
        let empty = block
            .node(&current)
            .is_some_and(|el| el.children.iter().all(is_blank));
        if !empty {
            return;
        }
        block.remove_node(&current);
        current.pop();
    }

    if current.as_slice() == run {
        let bare = block.node(run).is_some_and(|el| {
            el.children
                .iter()
                .all(|n| is_blank(n) || matches!(n, Node::Element(e) if e.is("w:rPr")))
        });
        if bare {
            block.remove_node(run);
        }
    }
}

fn is_blank(node: &Node) -> bool {
    matches!(node, Node::Text(t) if t.trim().is_empty())
}

// ── Title line ──

fn normalize_title(document: &mut Document, index: usize) -> Option<AppliedFix> {
    let group = group_number(index);
    let mut block = document.block_mut(index)?;
    let (text, text_runs) = {
        let view = block.as_block();
        let runs: Vec<NodePath> = view
            .runs()
            .into_iter()
            .filter(|r| !r.text().is_empty())
            .map(|r| r.path)
            .collect();
        (view.trimmed_text(), runs)
    };

    let Some(fixed) = repaired_title(&text, group) else {
        debug!(
            "Line {}: title {:?} has no safe automatic fix",
            index + 1,
            truncate(&text, 50)
        );
        return None;
    };
    let (first, rest) = text_runs.split_first()?;
    if !block.set_run_text(first, &fixed) {
        return None;
    }
    for path in rest {
        block.clear_run_text(path);
    }

    Some(AppliedFix {
        block_index: index,
        kind: ErrorKind::TitleFormat.code(),
        detail: format!("{:?} -> {:?}", truncate(&text, 50), truncate(&fixed, 50)),
    })
}

/// Corrected title text, or `None` when the prefix can't be repaired
/// mechanically (digits followed by whitespace or a bare separator).
pub fn repaired_title(text: &str, group: usize) -> Option<String> {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let (number, rest) = text.split_at(digits);
        return match rest.chars().next() {
            Some(c) if !SEPARATORS.contains(&c) && !c.is_whitespace() => {
                Some(format!("{number}.{rest}"))
            }
            _ => None,
        };
    }
    if text.starts_with(&SEPARATORS[..]) {
        return Some(format!("{group}{text}"));
    }
    Some(format!("{group}. {text}"))
}
