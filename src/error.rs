//! Error types for the lutescribe library

use std::io;
use std::path::PathBuf;

/// Library error type for transcription operations.
///
/// Every variant is fatal for the file being transcribed: there is no local
/// recovery and no partially transcribed score is ever written.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    /// The score tree misses an expected element or carries an unreadable attribute
    #[error("malformed input at {path}: {message}")]
    MalformedInput { path: String, message: String },

    /// Tablature duration token outside the supported set
    #[error("unsupported duration '{token}' in measure {measure} at event {event}")]
    UnsupportedDuration {
        measure: usize,
        event: String,
        token: String,
    },

    /// The pitch spelling oracle failed or answered with an unreadable reply
    #[error("pitch spelling unavailable in measure {measure} at event {event}: {reason}")]
    SpellingUnavailable {
        measure: usize,
        event: String,
        reason: String,
    },

    /// The beam classifier answered with flags that do not fit the measure
    #[error("beam alignment mismatch in measure {measure}: {reason}")]
    BeamAlignmentMismatch { measure: usize, reason: String },

    /// The beam classifier could not be reached
    #[error("beaming unavailable in measure {measure}: {reason}")]
    BeamingUnavailable { measure: usize, reason: String },

    /// XML reading or writing error
    #[error("XML error: {0}")]
    XmlError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Any of the above, located in a file
    #[error("{}: {source}", file.display())]
    InFile {
        file: PathBuf,
        #[source]
        source: Box<TranscribeError>,
    },
}

impl TranscribeError {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attach the file being transcribed.
    pub fn in_file(self, file: impl Into<PathBuf>) -> Self {
        match self {
            already @ Self::InFile { .. } => already,
            other => Self::InFile {
                file: file.into(),
                source: Box::new(other),
            },
        }
    }
}

impl From<io::Error> for TranscribeError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

/// Failure of an external collaborator (spelling oracle or beam classifier).
///
/// Callers attach the measure and event context when converting it into a
/// [`TranscribeError`].
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("could not run '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("'{command}' exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unreadable reply: {0}")]
    Reply(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_file_wraps_once() {
        let err = TranscribeError::malformed("mei/music", "no score")
            .in_file("a.mei")
            .in_file("b.mei");
        assert_eq!(err.to_string(), "a.mei: malformed input at mei/music: no score");
    }
}
