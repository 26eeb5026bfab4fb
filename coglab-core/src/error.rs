use thiserror::Error;

/// Rejected editor operation. The document is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("a name is required")]
    EmptyName,
    #[error("stimulus \"{0}\" has no content")]
    EmptyContent(String),
    #[error("a stimulus named \"{0}\" already exists")]
    DuplicateStimulus(String),
    #[error("a display labeled \"{0}\" already exists")]
    DuplicateStep(String),
    #[error("cannot delete \"{name}\": it is used by {}", .steps.join(", "))]
    StimulusInUse { name: String, steps: Vec<String> },
    #[error("display \"{step}\" refers to unknown stimulus \"{stimulus}\"")]
    UnknownStimulus { step: String, stimulus: String },
    #[error("renaming \"{old}\" to \"{new}\" was not confirmed")]
    RenameDeclined { old: String, new: String },
    #[error("display \"{0}\" needs a duration or must wait for a response")]
    MissingDuration(String),
    #[error("display \"{0}\" waits for a response but has no response keys")]
    MissingResponseKeys(String),
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}
