pub mod classify;
pub mod error;
pub mod extract;
pub mod grammar;
pub mod inventory;
pub mod repair;
pub mod structure;

pub use error::{summarize, ErrorKind, Role, Severity, ValidationError};
pub use extract::{extract_groups, GroupRecord};
pub use repair::{AppliedFix, RepairReport};

use tracing::info;

use crate::config::{Settings, TitleMode};
use crate::docx::Document;

/// A document rule: checks a document and optionally repairs it.
pub trait Rule {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Findings for the current document state. A fresh list on every call.
    fn validate(&self, document: &Document) -> Vec<ValidationError>;

    /// Validate and log; the document passes through untouched.
    fn apply<'d>(&self, document: &'d Document) -> &'d Document {
        let errors = self.validate(document);
        if errors.is_empty() {
            info!("{}: no findings", self.name());
        } else {
            info!("{}: {} finding(s)", self.name(), errors.len());
        }
        document
    }

    /// Repair `document` in place and report what changed and what is left.
    ///
    /// There is no undo: callers that need the original must keep a copy
    /// (or the source file) before calling this.
    fn fix(&self, document: &mut Document) -> RepairReport;
}

/// Every body paragraph belongs to a title, URL, image triplet.
#[derive(Debug, Clone)]
pub struct ThreeLineGroupRule {
    name: String,
    enabled: bool,
    title_mode: TitleMode,
}

impl ThreeLineGroupRule {
    pub fn new(title_mode: TitleMode) -> Self {
        ThreeLineGroupRule {
            name: "three-line-group".to_string(),
            enabled: true,
            title_mode,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        ThreeLineGroupRule {
            enabled: settings.enabled,
            ..Self::new(settings.title_mode)
        }
    }

    pub fn title_mode(&self) -> TitleMode {
        self.title_mode
    }
}

impl Rule for ThreeLineGroupRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, document: &Document) -> Vec<ValidationError> {
        if !self.enabled {
            return Vec::new();
        }
        structure::validate(document, self.title_mode)
    }

    fn fix(&self, document: &mut Document) -> RepairReport {
        if !self.enabled {
            return RepairReport::default();
        }
        repair::repair(document, self.title_mode)
    }
}
