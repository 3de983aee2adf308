use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::grammar::{self, is_valid_url};
use super::inventory::{self, ImageDescriptor};
use super::structure;
use crate::config::TitleMode;
use crate::docx::{Block, Document};

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)[.,)]\s*").unwrap());

/// Parts of a title line. Fields the line doesn't carry are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TitleFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opinion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Split `<n>.<opinion>_<source>：<title>` (standard) or `<n>.<title>` (simple).
pub fn parse_title(text: &str, mode: TitleMode) -> TitleFields {
    let text = text.trim();
    let Some(caps) = PREFIX_RE.captures(text) else {
        return TitleFields {
            error: Some("missing numbered prefix".to_string()),
            ..Default::default()
        };
    };
    let number = caps[1].parse().ok();
    let rest = &text[caps[0].len()..];

    match mode {
        TitleMode::Simple => TitleFields {
            number,
            title: Some(rest.to_string()),
            ..Default::default()
        },
        TitleMode::Standard => {
            let Some((opinion, tail)) = rest.split_once('_') else {
                return TitleFields {
                    number,
                    error: Some("missing '_' between opinion and source".to_string()),
                    ..Default::default()
                };
            };
            let Some((source, title)) = tail.split_once('：') else {
                return TitleFields {
                    number,
                    opinion: Some(opinion.trim().to_string()),
                    error: Some("missing '：' between source and title".to_string()),
                    ..Default::default()
                };
            };
            TitleFields {
                number,
                opinion: Some(opinion.trim().to_string()),
                source: Some(source.trim().to_string()),
                title: Some(title.trim().to_string()),
                error: None,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleLine {
    pub line: usize,
    pub text: String,
    pub fields: TitleFields,
    pub has_error: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlLine {
    pub line: usize,
    pub text: String,
    pub valid: bool,
    pub has_error: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageLine {
    pub line: usize,
    pub images: Vec<ImageDescriptor>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stray_text: String,
    pub has_error: bool,
}

/// One title/url/image group. A trailing partial group has `None` for the
/// lines it lacks.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRecord {
    pub group: usize,
    pub title: TitleLine,
    pub url: Option<UrlLine>,
    pub image: Option<ImageLine>,
}

impl GroupRecord {
    pub fn has_error(&self) -> bool {
        self.title.has_error
            || self.url.as_ref().is_some_and(|u| u.has_error)
            || self.image.as_ref().is_some_and(|i| i.has_error)
    }
}

pub fn extract_groups(document: &Document, mode: TitleMode) -> Vec<GroupRecord> {
    let flagged: BTreeSet<usize> = structure::validate(document, mode)
        .iter()
        .filter_map(|e| e.block_index)
        .collect();

    let blocks: Vec<Block> = document.blocks().collect();
    blocks
        .chunks(3)
        .enumerate()
        .map(|(g, chunk)| {
            let title = &chunk[0];
            let text = title.trimmed_text();
            GroupRecord {
                group: g + 1,
                title: TitleLine {
                    line: title.index() + 1,
                    fields: parse_title(&text, mode),
                    text,
                    has_error: flagged.contains(&title.index()),
                },
                url: chunk.get(1).map(|b| {
                    let text = b.trimmed_text();
                    UrlLine {
                        line: b.index() + 1,
                        valid: is_valid_url(&text),
                        text,
                        has_error: flagged.contains(&b.index()),
                    }
                }),
                image: chunk.get(2).map(|b| ImageLine {
                    line: b.index() + 1,
                    images: inventory::inventory(b),
                    stray_text: grammar::stray_text(b),
                    has_error: flagged.contains(&b.index()),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::*;

    #[test]
    fn standard_title_splits_into_fields() {
        let fields = parse_title("12.Weibo_Daily News：Rail link opens", TitleMode::Standard);
        assert_eq!(
            fields,
            TitleFields {
                number: Some(12),
                opinion: Some("Weibo".into()),
                source: Some("Daily News".into()),
                title: Some("Rail link opens".into()),
                error: None,
            }
        );
    }

    #[test]
    fn standard_title_reports_missing_delimiters() {
        let fields = parse_title("1.Weibo Daily：Title", TitleMode::Standard);
        assert!(fields.error.unwrap().contains("'_'"));

        let fields = parse_title("1.Weibo_Daily Title", TitleMode::Standard);
        assert_eq!(fields.opinion.as_deref(), Some("Weibo"));
        assert!(fields.title.is_none());
        assert!(fields.error.unwrap().contains("'：'"));
    }

    #[test]
    fn colon_before_underscore_is_not_a_match() {
        let fields = parse_title("1.Daily：Weibo_Title", TitleMode::Standard);
        assert_eq!(fields.opinion.as_deref(), Some("Daily：Weibo"));
        assert!(fields.source.is_none() && fields.title.is_none());
        assert!(fields.error.unwrap().contains("'：'"));
    }

    #[test]
    fn simple_title_keeps_everything_after_prefix() {
        let fields = parse_title("3) Anything_goes：here", TitleMode::Simple);
        assert_eq!(fields.number, Some(3));
        assert_eq!(fields.title.as_deref(), Some("Anything_goes：here"));
        assert!(parse_title("no prefix", TitleMode::Simple).error.is_some());
    }

    #[test]
    fn groups_from_fixture() {
        let xml = std::fs::read_to_string("tests/fixtures/weibo_digest.xml").unwrap();
        let doc = Document::parse(&xml).unwrap();
        let groups = extract_groups(&doc, TitleMode::Standard);

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| !g.has_error()));
        assert_eq!(groups[0].title.fields.source.as_deref(), Some("Daily Wire"));
        assert_eq!(groups[1].url.as_ref().unwrap().line, 5);
        let image = groups[1].image.as_ref().unwrap();
        assert_eq!(image.images.len(), 1);
        assert_eq!(image.images[0].identity, "Gauge photo");
    }

    #[test]
    fn partial_trailing_group_and_error_flags() {
        let mut paragraphs = valid_group(1);
        paragraphs.push(text_paragraph("2.Weibo_Source：Next"));
        paragraphs.push(text_paragraph("not a url"));
        let doc = document(&paragraphs);
        let groups = extract_groups(&doc, TitleMode::Standard);

        assert_eq!(groups.len(), 2);
        assert!(!groups[0].has_error());
        let last = &groups[1];
        assert!(!last.title.has_error);
        let url = last.url.as_ref().unwrap();
        assert!(!url.valid);
        assert!(url.has_error);
        assert!(last.image.is_none());

        let json = serde_json::to_value(last).unwrap();
        assert_eq!(json["title"]["fields"]["source"], "Source");
        assert!(json["title"]["fields"].get("error").is_none());
        assert!(json["image"].is_null());
    }
}
