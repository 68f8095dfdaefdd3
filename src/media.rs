//! Media classification by file extension

/// Classification of a file by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Unknown extension, never enqueued
    Unclassified,
    /// JPEG and other compressed stills
    Image,
    /// Camera RAW files
    Raw,
    /// TIFF containers
    Tagged,
    /// Movie clips
    Movie,
}

/// Extension table, lowercase and without the leading dot
const EXTENSIONS: &[(&str, MediaKind)] = &[
    ("jpg", MediaKind::Image),
    ("jpeg", MediaKind::Image),
    ("heic", MediaKind::Image),
    ("heif", MediaKind::Image),
    ("png", MediaKind::Image),
    ("tif", MediaKind::Tagged),
    ("tiff", MediaKind::Tagged),
    ("nef", MediaKind::Raw),
    ("rw2", MediaKind::Raw),
    ("cr2", MediaKind::Raw),
    ("crw", MediaKind::Raw),
    ("cr3", MediaKind::Raw),
    ("arw", MediaKind::Raw),
    ("dng", MediaKind::Raw),
    ("orf", MediaKind::Raw),
    ("raf", MediaKind::Raw),
    ("pef", MediaKind::Raw),
    ("srw", MediaKind::Raw),
    ("mov", MediaKind::Movie),
    ("mpg", MediaKind::Movie),
    ("mp4", MediaKind::Movie),
    ("m4v", MediaKind::Movie),
    ("avi", MediaKind::Movie),
    ("mts", MediaKind::Movie),
];

impl MediaKind {
    /// Classify an extension (with or without leading dot, any case)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, kind)| *kind)
            .unwrap_or(MediaKind::Unclassified)
    }

    pub fn is_classified(&self) -> bool {
        *self != MediaKind::Unclassified
    }
}
