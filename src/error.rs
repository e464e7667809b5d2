use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq)]
pub enum DredgeError {
    #[error("{field}: {reason}")]
    ConfigField { field: String, reason: String },

    #[error("could not load project configuration: {0}")]
    ConfigLoad(String),

    #[error("Project configuration file malformed")]
    ConfigMalformed,

    #[error("File not found")]
    FileNotFound,

    #[error("Error requesting file ({0})")]
    RequestFailed(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("{}", parse_message(.0))]
    ResourceParse(Option<String>),

    #[error("Project treatments malformed")]
    TreatmentsMalformed,

    #[error("Could not load project because treatments not available")]
    #[diagnostic(help("check the `treatments` entry of project.json and the status log"))]
    TreatmentsUnavailable,

    #[error("No such treatment: {0}")]
    UnknownTreatment(String),

    #[error("No such transcript: {0}")]
    UnknownTranscript(String),

    #[error("Could not download pairwise test from {forward} or {reverse}")]
    PairwiseFileNotFound { forward: String, reverse: String },

    #[error("no project loaded")]
    NoProject,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl DredgeError {
    pub fn parse() -> Self {
        DredgeError::ResourceParse(None)
    }

    pub fn parse_reason(reason: impl Into<String>) -> Self {
        DredgeError::ResourceParse(Some(reason.into()))
    }
}

fn parse_message(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("Error parsing file: {reason}"),
        None => "Error parsing file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_messages() {
        assert_eq!(DredgeError::parse().to_string(), "Error parsing file");
        assert_eq!(
            DredgeError::parse_reason("Treatment X not in project").to_string(),
            "Error parsing file: Treatment X not in project"
        );
    }

    #[test]
    fn request_failed_message() {
        let err = DredgeError::RequestFailed("Internal Server Error".to_string());
        assert_eq!(
            err.to_string(),
            "Error requesting file (Internal Server Error)"
        );
    }
}
