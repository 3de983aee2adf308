use tracing::debug;

use super::classify::role;
use super::error::{ErrorKind, Role, ValidationError};
use super::grammar;
use crate::config::TitleMode;
use crate::docx::{Block, Document};

/// Check the whole document: block count first, then every block against
/// the grammar of its role. Always returns a fresh list.
pub fn validate(document: &Document, mode: TitleMode) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let count = document.block_count();
    let remainder = count % 3;
    if remainder != 0 {
        errors.push(ValidationError::document(
            ErrorKind::NotMultipleOfThree { remainder },
            format!(
                "document has {count} paragraphs, not a multiple of 3 ({remainder} left over after group {})",
                count / 3
            ),
        ));
    }

    for block in document.blocks() {
        errors.extend(validate_block(&block, mode));
    }

    debug!(
        "Validated {} blocks ({} mode): {} finding(s)",
        count,
        mode,
        errors.len()
    );
    errors
}

pub fn validate_block(block: &Block, mode: TitleMode) -> Vec<ValidationError> {
    match role(block.index()) {
        Role::Title => grammar::validate_title(block.index(), &block.text(), mode),
        Role::Url => grammar::validate_url(block.index(), &block.text()),
        Role::Image => grammar::validate_image(block),
        Role::Structure => Vec::new(),
    }
}
