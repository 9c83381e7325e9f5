use thiserror::Error;

/// Failure while processing one Slack event. The worker logs these and moves
/// on to the next event.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("slack integration failure: {0}")]
    Slack(String),
    #[error("agent invocation failure: {0}")]
    Agent(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("event payload is missing `{0}`")]
    MissingField(&'static str),
}

impl ApplicationError {
    /// Short category used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Agent(_) => "agent",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
            Self::MissingField(_) => "payload",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ApplicationError;

    #[test]
    fn missing_field_names_the_field() {
        let error = ApplicationError::MissingField("thread_ts");
        assert_eq!(error.to_string(), "event payload is missing `thread_ts`");
        assert_eq!(error.kind(), "payload");
    }

    #[test]
    fn integration_failures_keep_their_message() {
        let error = ApplicationError::Slack("channel_not_found".to_owned());
        assert_eq!(error.to_string(), "slack integration failure: channel_not_found");
        assert_eq!(error.kind(), "slack");
    }
}
