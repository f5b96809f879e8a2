//! Errors surfaced by report rendering.

use std::fmt;
use std::io;

use crate::chart::CaptureError;

/// Failure while producing or saving the dashboard report.
#[derive(Debug)]
pub enum ReportError {
    /// The report fonts could not be located or parsed.
    FontLoad(genpdf::error::Error),
    /// Capturing the chart image failed.
    Capture(CaptureError),
    /// The PDF document could not be assembled.
    Pdf(String),
    /// Writing the finished document failed.
    Io(io::Error),
}

impl From<CaptureError> for ReportError {
    fn from(err: CaptureError) -> Self {
        Self::Capture(err)
    }
}

impl From<io::Error> for ReportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FontLoad(err) => write!(f, "Failed to load report fonts: {err}"),
            Self::Capture(err) => write!(f, "Failed to capture chart: {err}"),
            Self::Pdf(message) => write!(f, "Failed to assemble PDF: {message}"),
            Self::Io(err) => write!(f, "Failed to write report: {err}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FontLoad(err) => Some(err),
            Self::Capture(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Pdf(_) => None,
        }
    }
}
