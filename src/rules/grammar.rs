use std::sync::LazyLock;

use regex::Regex;

use super::classify::group_number;
use super::error::{ErrorKind, ValidationError};
use super::inventory;
use crate::config::TitleMode;
use crate::docx::Block;
use crate::utils::truncate;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^[0-9]+[.,)].+").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_+.~#?&/=]*)$",
    )
    .unwrap()
});

/// Characters allowed between the group number and the title content.
pub const SEPARATORS: [char; 3] = ['.', ',', ')'];

/// Delimiters a standard-mode title must contain, with their display names.
const REQUIRED_TITLE_CHARS: [(char, &str); 3] = [
    ('.', "period"),
    ('_', "underscore"),
    ('：', "full-width colon"),
];

pub fn is_valid_title(text: &str) -> bool {
    TITLE_RE.is_match(text.trim())
}

pub fn is_valid_url(text: &str) -> bool {
    URL_RE.is_match(text.trim())
}

/// Title line: non-empty, `<digits><separator><content>`, and in standard
/// mode the three delimiters. A format failure suppresses the delimiter checks.
pub fn validate_title(index: usize, text: &str, mode: TitleMode) -> Vec<ValidationError> {
    let group = group_number(index);
    let text = text.trim();

    if text.is_empty() {
        return vec![ValidationError::new(
            index,
            ErrorKind::TitleEmpty,
            format!("group {group}: title line is empty"),
        )];
    }

    if !is_valid_title(text) {
        return vec![ValidationError::new(
            index,
            ErrorKind::TitleFormat,
            format!(
                "group {group}: title must be \"number + separator (. , )) + content\", got {:?}",
                truncate(text, 50)
            ),
        )];
    }

    match mode {
        TitleMode::Simple => Vec::new(),
        TitleMode::Standard => REQUIRED_TITLE_CHARS
            .iter()
            .filter(|(ch, _)| !text.contains(*ch))
            .map(|(ch, name)| {
                ValidationError::new(
                    index,
                    ErrorKind::TitleMissingChar(*ch),
                    format!("group {group}: title is missing required character '{ch}' ({name})"),
                )
            })
            .collect(),
    }
}

pub fn validate_url(index: usize, text: &str) -> Vec<ValidationError> {
    let group = group_number(index);
    let text = text.trim();

    if text.is_empty() {
        return vec![ValidationError::new(
            index,
            ErrorKind::UrlEmpty,
            format!("group {group}: URL line is empty"),
        )];
    }
    if !is_valid_url(text) {
        return vec![ValidationError::new(
            index,
            ErrorKind::UrlFormat,
            format!(
                "group {group}: URL line is not a valid http(s) address: {:?}",
                truncate(text, 80)
            ),
        )];
    }
    Vec::new()
}

/// Text of every run that is not image-only, untrimmed.
pub fn stray_text(block: &Block) -> String {
    block
        .runs()
        .iter()
        .filter(|r| !r.is_image_only())
        .map(|r| r.text())
        .collect()
}

/// Image line: stray text, missing image and too many images are reported
/// independently. The count is taken before invalid images are filtered out.
pub fn validate_image(block: &Block) -> Vec<ValidationError> {
    let index = block.index();
    let group = group_number(index);
    let mut errors = Vec::new();

    let stray = stray_text(block);
    if !stray.is_empty() {
        // Debug formatting keeps hidden whitespace visible in logs
        errors.push(ValidationError::new(
            index,
            ErrorKind::ImageStrayText,
            format!(
                "group {group}: image line must hold only an image, found text {:?}",
                truncate(&stray, 50)
            ),
        ));
    }

    let count = inventory::inventory(block).len();
    if count == 0 {
        errors.push(ValidationError::new(
            index,
            ErrorKind::ImageMissing,
            format!("group {group}: image line has no image"),
        ));
    } else if count > 1 {
        errors.push(ValidationError::new(
            index,
            ErrorKind::ImageTooMany { count },
            format!("group {group}: image line holds {count} images, expected exactly one"),
        ));
    }

    errors
}
