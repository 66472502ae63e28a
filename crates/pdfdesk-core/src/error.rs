use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfDeskError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("PDF is encrypted; remove the password and try again")]
    Encrypted,

    #[error("{name} is not available: {hint}")]
    MissingDependency { name: &'static str, hint: String },

    #[error("{0}")]
    NothingFound(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PdfDeskError {
    /// True for problems the user can fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PdfDeskError::InvalidRange(_)
                | PdfDeskError::InvalidInput(_)
                | PdfDeskError::ParseError(_)
                | PdfDeskError::Encrypted
                | PdfDeskError::ImageError(_)
        )
    }
}

impl From<lopdf::Error> for PdfDeskError {
    fn from(err: lopdf::Error) -> Self {
        PdfDeskError::OperationError(err.to_string())
    }
}

impl From<image::ImageError> for PdfDeskError {
    fn from(err: image::ImageError) -> Self {
        PdfDeskError::ImageError(err.to_string())
    }
}

impl From<zip::result::ZipError> for PdfDeskError {
    fn from(err: zip::result::ZipError) -> Self {
        PdfDeskError::SerializationError(err.to_string())
    }
}

impl From<quick_xml::Error> for PdfDeskError {
    fn from(err: quick_xml::Error) -> Self {
        PdfDeskError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for PdfDeskError {
    fn from(err: std::io::Error) -> Self {
        PdfDeskError::SerializationError(err.to_string())
    }
}
