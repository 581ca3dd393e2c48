use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaylogError {
    #[error("source log directory not found: {0}")]
    SourceNotFound(String),
    #[error("{kind} not found: {path}")]
    ArtifactNotFound { kind: &'static str, path: String },
    #[error("malformed log line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },
    #[error("external summarizer failed: {0}")]
    ExternalToolError(String),
    #[error("template error at line {line}: {reason}")]
    TemplateError { line: usize, reason: String },
    #[error("invalid date `{0}`; expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("invalid template name `{0}`; use a bare name such as `simple`")]
    InvalidTemplateName(String),
}

impl DaylogError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::ExternalToolError(_) => "EXTERNAL_TOOL_ERROR",
            Self::TemplateError { .. } => "TEMPLATE_ERROR",
            Self::InvalidDate(_) => "INVALID_DATE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidTemplateName(_) => "INVALID_TEMPLATE_NAME",
        }
    }
}
