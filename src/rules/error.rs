use std::fmt;

use serde::Serialize;

/// Expected role of a block, or `Structure` for document-level findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Title,
    Url,
    Image,
    Structure,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Title => "title",
            Role::Url => "url",
            Role::Image => "image",
            Role::Structure => "structure",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    #[allow(dead_code)]
    Warning,
    #[allow(dead_code)]
    Info,
}

/// Closed set of findings. Validators produce these directly and the repair
/// engine dispatches on them, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotMultipleOfThree { remainder: usize },
    TitleEmpty,
    TitleFormat,
    TitleMissingChar(char),
    UrlEmpty,
    UrlFormat,
    ImageStrayText,
    ImageMissing,
    ImageTooMany { count: usize },
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotMultipleOfThree { .. } => "structure/not-multiple-of-three",
            ErrorKind::TitleEmpty => "title/empty",
            ErrorKind::TitleFormat => "title/format",
            ErrorKind::TitleMissingChar(_) => "title/missing-char",
            ErrorKind::UrlEmpty => "url/empty",
            ErrorKind::UrlFormat => "url/format",
            ErrorKind::ImageStrayText => "image/stray-text",
            ErrorKind::ImageMissing => "image/missing",
            ErrorKind::ImageTooMany { .. } => "image/too-many",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            ErrorKind::NotMultipleOfThree { .. } => Role::Structure,
            ErrorKind::TitleEmpty | ErrorKind::TitleFormat | ErrorKind::TitleMissingChar(_) => {
                Role::Title
            }
            ErrorKind::UrlEmpty | ErrorKind::UrlFormat => Role::Url,
            ErrorKind::ImageStrayText | ErrorKind::ImageMissing | ErrorKind::ImageTooMany { .. } => {
                Role::Image
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// `None` for findings about the whole document.
    pub block_index: Option<usize>,
    pub kind: ErrorKind,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    pub fn new(block_index: usize, kind: ErrorKind, message: String) -> Self {
        ValidationError {
            block_index: Some(block_index),
            kind,
            message,
            severity: Severity::default(),
        }
    }

    pub fn document(kind: ErrorKind, message: String) -> Self {
        ValidationError {
            block_index: None,
            kind,
            message,
            severity: Severity::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.kind.role()
    }

    /// 1-based line number as shown to users.
    pub fn line_number(&self) -> Option<usize> {
        self.block_index.map(|i| i + 1)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number() {
            Some(line) => write!(f, "[{}] line {}: {}", self.role(), line, self.message),
            None => write!(f, "[{}] {}", self.role(), self.message),
        }
    }
}

/// Finding counts per role, in role order.
pub fn summarize(errors: &[ValidationError]) -> std::collections::BTreeMap<Role, usize> {
    let mut summary = std::collections::BTreeMap::new();
    for e in errors {
        *summary.entry(e.role()).or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_roles() {
        let kind = ErrorKind::ImageTooMany { count: 3 };
        assert_eq!(kind.code(), "image/too-many");
        assert_eq!(kind.role(), Role::Image);
        assert_eq!(ErrorKind::TitleMissingChar('_').code(), "title/missing-char");
        assert_eq!(
            ErrorKind::NotMultipleOfThree { remainder: 1 }.role(),
            Role::Structure
        );
    }

    #[test]
    fn display_uses_one_based_lines() {
        let e = ValidationError::new(4, ErrorKind::UrlFormat, "bad url".into());
        assert_eq!(e.to_string(), "[url] line 5: bad url");
        let d = ValidationError::document(
            ErrorKind::NotMultipleOfThree { remainder: 2 },
            "11 blocks".into(),
        );
        assert_eq!(d.to_string(), "[structure] 11 blocks");
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn summary_counts_by_role() {
        let errors = vec![
            ValidationError::new(0, ErrorKind::TitleFormat, String::new()),
            ValidationError::new(3, ErrorKind::TitleEmpty, String::new()),
            ValidationError::new(2, ErrorKind::ImageMissing, String::new()),
        ];
        let summary = summarize(&errors);
        assert_eq!(summary[&Role::Title], 2);
        assert_eq!(summary[&Role::Image], 1);
        assert!(!summary.contains_key(&Role::Url));
    }
}
