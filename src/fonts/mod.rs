//! Font discovery, embedding data and text measurement for the report.
//!
//! The report needs a regular and a bold TrueType face.  The same bytes are
//! embedded into the PDF and fed to a `genpdf` font cache, which provides the
//! glyph metrics used to right-align table cells.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{FontCache, FontData, FontFamily};
use genpdf::style::Style;
use log::{debug, warn};

use crate::chart::{CaptureError, ChartFont};
use crate::layout::{FontWeight, TextMetrics};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable overriding the bundled font directory.
pub const FONTS_DIR_ENV: &str = "DASHBOARD_REPORT_FONTS_DIR";

/// Environment variable pointing at a directory with the Arial fallback faces.
pub const WINDOWS_FONTS_DIR_ENV: &str = "DASHBOARD_REPORT_WINDOWS_FONTS_DIR";

const REGULAR_FILE: &str = "Roboto-Regular.ttf";
const BOLD_FILE: &str = "Roboto-Bold.ttf";
const FONT_FILES: &[&str] = &[REGULAR_FILE, BOLD_FILE];

const WINDOWS_FALLBACK_FAMILY_NAME: &str = "Arial";
const WINDOWS_REGULAR_FILE: &str = "arial.ttf";
const WINDOWS_BOLD_FILE: &str = "arialbd.ttf";

/// Directory holding the fonts shipped with the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        candidates.push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = bundled_fonts_source_dir();
    if !candidates.contains(&manifest_candidate) {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn missing_font_files(path: &Path) -> Vec<PathBuf> {
    FONT_FILES
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn resolve_font_directory() -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            let missing_list = missing
                .iter()
                .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ");
            format!("missing files [{}]", missing_list)
        };

        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!(
            "Unable to locate report font directory. Checked: {}. Set {} to a directory containing {}.",
            summary,
            FONTS_DIR_ENV,
            FONT_FILES.join(" and ")
        ),
        io::Error::new(io::ErrorKind::NotFound, "report fonts directory not found"),
    ))
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn windows_font_directory() -> Option<PathBuf> {
    if let Some(path) = env_path(WINDOWS_FONTS_DIR_ENV) {
        return Some(path);
    }

    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env_path(var) {
                let candidate = root.join("Fonts");
                if candidate.is_dir() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

fn read_font(directory: &Path, file: &str, style: &str) -> Result<Vec<u8>, Error> {
    let path = directory.join(file);
    fs::read(&path).map_err(|err| {
        Error::new(
            format!(
                "Failed to read {} font at {}: {}",
                style,
                path.display(),
                err
            ),
            err,
        )
    })
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

struct FontFiles {
    family: &'static str,
    regular: Vec<u8>,
    bold: Vec<u8>,
}

fn load_bundled_files() -> Result<FontFiles, Error> {
    let directory = resolve_font_directory()?;
    debug!("loading report fonts from {}", directory.display());
    Ok(FontFiles {
        family: DEFAULT_FONT_FAMILY_NAME,
        regular: read_font(&directory, REGULAR_FILE, "regular")?,
        bold: read_font(&directory, BOLD_FILE, "bold")?,
    })
}

fn load_windows_files() -> Result<FontFiles, Error> {
    let directory = windows_font_directory().ok_or_else(|| {
        Error::new(
            "Windows font directory not found for fallback",
            io::Error::new(io::ErrorKind::NotFound, "windows fonts directory not found"),
        )
    })?;

    Ok(FontFiles {
        family: WINDOWS_FALLBACK_FAMILY_NAME,
        regular: read_font(&directory, WINDOWS_REGULAR_FILE, "regular")?,
        bold: read_font(&directory, WINDOWS_BOLD_FILE, "bold")?,
    })
}

fn load_font_files() -> Result<FontFiles, Error> {
    match load_bundled_files() {
        Ok(files) => Ok(files),
        Err(err) if fonts_missing(&err) => match load_windows_files() {
            Ok(fallback) => {
                warn!(
                    "Bundled fonts unavailable ({}); falling back to Windows '{}' family.",
                    err, WINDOWS_FALLBACK_FAMILY_NAME
                );
                Ok(fallback)
            }
            Err(fallback_err) => {
                warn!(
                    "Bundled fonts unavailable ({}); Windows fallback failed: {}",
                    err, fallback_err
                );
                Err(Error::new(
                    format!(
                        "Bundled fonts unavailable and Windows fallback failed: {}",
                        fallback_err
                    ),
                    io::Error::new(io::ErrorKind::NotFound, "report fonts are not available"),
                ))
            }
        },
        Err(err) => Err(err),
    }
}

/// Regular and bold faces used by the report, together with their metrics.
pub struct ReportFonts {
    family: &'static str,
    regular: Vec<u8>,
    bold: Vec<u8>,
    cache: FontCache,
}

impl ReportFonts {
    /// Locates and loads the report fonts, falling back to the Windows Arial
    /// family when the bundled Roboto files are missing.
    pub fn load() -> Result<Self, Error> {
        let files = load_font_files()?;
        Self::from_bytes(files.family, files.regular, files.bold)
    }

    /// Builds the font set from in-memory TrueType data.
    pub fn from_bytes(family: &'static str, regular: Vec<u8>, bold: Vec<u8>) -> Result<Self, Error> {
        let metrics_family = FontFamily {
            regular: FontData::new(regular.clone(), None)?,
            bold: FontData::new(bold.clone(), None)?,
            italic: FontData::new(regular.clone(), None)?,
            bold_italic: FontData::new(bold.clone(), None)?,
        };

        Ok(Self {
            family,
            regular,
            bold,
            cache: FontCache::new(metrics_family),
        })
    }

    /// Name of the loaded family.
    pub fn family(&self) -> &str {
        self.family
    }

    /// TrueType data of the face used for `weight`.
    pub fn face_bytes(&self, weight: FontWeight) -> &[u8] {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }

    /// Regular face prepared for labelling the rasterized chart.
    pub fn chart_font(&self) -> Result<ChartFont, CaptureError> {
        ChartFont::from_bytes(self.regular.clone())
    }
}

impl TextMetrics for ReportFonts {
    fn text_width(&self, text: &str, font_size: u8, weight: FontWeight) -> f64 {
        let mut style = Style::new().with_font_size(font_size);
        if weight == FontWeight::Bold {
            style.set_bold();
        }
        let width: printpdf::Mm = style.str_width(&self.cache, text).into();
        width.0
    }
}

/// Indicates whether the bundled report fonts are present on disk.
pub fn default_fonts_available() -> bool {
    resolve_font_directory().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_reported_as_not_found() {
        let err = read_font(Path::new("/__dashboard_report_missing__"), REGULAR_FILE, "regular")
            .expect_err("directory does not exist");
        assert!(fonts_missing(&err));
    }

    #[test]
    fn manifest_directory_is_always_a_candidate() {
        assert!(font_directory_candidates().contains(&bundled_fonts_source_dir()));
    }
}
