use std::fmt;

#[derive(Debug)]
pub enum FormPressError {
    /// A layout primitive was driven with a structurally invalid argument
    /// (negative page index, write on a finished document). Aborts the
    /// composition; never downgraded.
    InvalidLayout(String),
    /// A single attachment failed to decode, parse, or merge. Recoverable:
    /// the composer logs it and omits that attachment's pages.
    Attachment(String),
    /// The PDF writer or the lopdf merge pass failed.
    Pdf(String),
    Io(std::io::Error),
}

impl fmt::Display for FormPressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormPressError::InvalidLayout(message) => {
                write!(f, "layout invariant violated: {}", message)
            }
            FormPressError::Attachment(message) => write!(f, "attachment error: {}", message),
            FormPressError::Pdf(message) => write!(f, "pdf error: {}", message),
            FormPressError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for FormPressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormPressError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FormPressError {
    fn from(value: std::io::Error) -> Self {
        FormPressError::Io(value)
    }
}
