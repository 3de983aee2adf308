use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::docx::xml::{Element, NodePath};
use crate::docx::{Block, Run};

static EXTENT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<wp:extent\b[^>]*>").unwrap());
static DOC_PR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<wp:docPr\b[^>]*>").unwrap());
static CX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bcx="(\d+)""#).unwrap());
static CY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bcy="(\d+)""#).unwrap());
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bname="([^"]*)""#).unwrap());
static STYLE_DIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*(width|height)\s*:\s*([0-9]*\.?[0-9]+)\s*(pt|in|cm|mm|px)?").unwrap()
});

/// One embedded image as declared by its markup. Sizes are EMU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDescriptor {
    pub width: i64,
    pub height: i64,
    pub identity: String,
    /// Zero-height placeholders left by broken edits are invalid.
    pub valid: bool,
}

impl ImageDescriptor {
    fn new(width: i64, height: i64, identity: &str) -> Self {
        ImageDescriptor {
            width,
            height,
            identity: identity.to_string(),
            valid: height > 0,
        }
    }
}

/// An image plus where it lives, relative to its paragraph.
#[derive(Debug, Clone)]
pub struct LocatedImage {
    pub image: ImageDescriptor,
    pub run: NodePath,
    /// Element to detach to remove the image (a drawing, a VML object, an
    /// `mc:AlternateContent`, or the whole run for markup-scan hits).
    pub object: NodePath,
}

pub fn inventory(block: &Block) -> Vec<ImageDescriptor> {
    locate(block).into_iter().map(|l| l.image).collect()
}

/// Images of every image-only run in document order.
pub fn locate(block: &Block) -> Vec<LocatedImage> {
    let mut out = Vec::new();
    for run in block.runs().iter().filter(|r| r.is_image_only()) {
        let before = out.len();
        let mut path = run.path.clone();
        visit(run.element, &mut path, &run.path, None, &mut out);
        if out.len() == before {
            let scanned = scan_markup(run);
            debug!(
                "Block {}: no structured image in run {:?}, markup scan found {}",
                block.index() + 1,
                run.path,
                scanned.len()
            );
            out.extend(scanned);
        }
    }
    out
}

fn visit(
    el: &Element,
    path: &mut NodePath,
    run: &NodePath,
    alternate: Option<&NodePath>,
    out: &mut Vec<LocatedImage>,
) {
    for (i, child) in el.elements() {
        path.push(i);
        match child.name.as_str() {
            "mc:AlternateContent" => {
                // mc:Fallback repeats the same picture for older readers
                if let Some((ci, choice)) = child.elements().find(|(_, e)| e.is("mc:Choice")) {
                    let outer = alternate.cloned().unwrap_or_else(|| path.clone());
                    path.push(ci);
                    visit(choice, path, run, Some(&outer), out);
                    path.pop();
                }
            }
            "w:drawing" => {
                let frames: Vec<(usize, &Element)> = child
                    .elements()
                    .filter(|(_, e)| e.is("wp:inline") || e.is("wp:anchor"))
                    .collect();
                for (fi, frame) in &frames {
                    let object = match alternate {
                        Some(outer) => outer.clone(),
                        None if frames.len() == 1 => path.clone(),
                        None => {
                            let mut p = path.clone();
                            p.push(*fi);
                            p
                        }
                    };
                    out.push(LocatedImage {
                        image: from_frame(frame),
                        run: run.clone(),
                        object,
                    });
                }
            }
            "w:pict" | "w:object" => out.push(LocatedImage {
                image: from_vml(child),
                run: run.clone(),
                object: alternate.cloned().unwrap_or_else(|| path.clone()),
            }),
            _ => visit(child, path, run, alternate, out),
        }
        path.pop();
    }
}

fn from_frame(frame: &Element) -> ImageDescriptor {
    let extent = frame.child("wp:extent");
    let dim = |key: &str| {
        extent
            .and_then(|e| e.attr(key))
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    };
    let identity = frame
        .child("wp:docPr")
        .and_then(|d| d.attr("name"))
        .unwrap_or_default();
    ImageDescriptor::new(dim("cx"), dim("cy"), identity)
}

fn from_vml(object: &Element) -> ImageDescriptor {
    let shape = object.find("v:shape").or_else(|| object.find("v:rect"));
    let (mut width, mut height) = (0, 0);
    if let Some(style) = shape.and_then(|s| s.attr("style")) {
        for caps in STYLE_DIM_RE.captures_iter(style) {
            let value: f64 = caps[2].parse().unwrap_or(0.0);
            let emu = to_emu(value, caps.get(3).map(|m| m.as_str()));
            if caps[1].eq_ignore_ascii_case("width") {
                width = emu;
            } else {
                height = emu;
            }
        }
    }
    let identity = object
        .find("v:imagedata")
        .and_then(|d| d.attr("o:title"))
        .filter(|t| !t.is_empty())
        .or_else(|| shape.and_then(|s| s.attr("alt")))
        .unwrap_or_default();
    ImageDescriptor::new(width, height, identity)
}

fn to_emu(value: f64, unit: Option<&str>) -> i64 {
    let per_unit = match unit.map(|u| u.to_ascii_lowercase()).as_deref() {
        Some("pt") => 12_700.0,
        Some("in") => 914_400.0,
        Some("cm") => 360_000.0,
        Some("mm") => 36_000.0,
        // CSS default unit
        _ => 9_525.0,
    };
    (value * per_unit).round() as i64
}

/// Count `wp:extent` declarations straight from the serialized run, for
/// wrappers the structured walk does not know.
fn scan_markup(run: &Run) -> Vec<LocatedImage> {
    let xml = match run.element.to_xml_string() {
        Ok(xml) => xml,
        Err(e) => {
            debug!("Could not serialize run {:?}: {}", run.path, e);
            return Vec::new();
        }
    };
    let names: Vec<String> = DOC_PR_TAG_RE
        .find_iter(&xml)
        .map(|m| {
            NAME_RE
                .captures(m.as_str())
                .map(|c| c[1].to_string())
                .unwrap_or_default()
        })
        .collect();

    EXTENT_TAG_RE
        .find_iter(&xml)
        .enumerate()
        .map(|(i, m)| {
            let tag = m.as_str();
            let dim = |re: &Regex| {
                re.captures(tag)
                    .and_then(|c| c[1].parse::<i64>().ok())
                    .unwrap_or(0)
            };
            let name = names.get(i).map(String::as_str).unwrap_or_default();
            LocatedImage {
                image: ImageDescriptor::new(dim(&CX_RE), dim(&CY_RE), name),
                run: run.path.clone(),
                object: run.path.clone(),
            }
        })
        .collect()
}
