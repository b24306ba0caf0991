use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Metrics error: {message}")]
    Metrics { message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },

    #[error("Failed to launch {component}: {message}")]
    Launch { component: String, message: String },

    #[error("{component} did not stop within {timeout:?}")]
    StopTimeout { component: String, timeout: Duration },
}

impl ProcessorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn launch<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Launch {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn stop_timeout<C: Into<String>>(component: C, timeout: Duration) -> Self {
        Self::StopTimeout {
            component: component.into(),
            timeout,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
