use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskPilotError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, TaskPilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = TaskPilotError::Config("missing api key".to_string());
        assert!(format!("{err}").contains("configuration error"));
        let err = TaskPilotError::Database("locked".to_string());
        assert!(format!("{err}").contains("database error"));
    }
}
