//! EXIF metadata access for capture dates

use crate::error::{MetadataError, TagError};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use tracing::trace;

/// Fixed date-time layout of EXIF ASCII date fields
pub const METADATA_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Named date fields that may carry a capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    /// When the original image was taken
    Original,
    /// When the image was digitized
    Digitized,
    /// Generic file date/time
    Generic,
}

/// Date fields to try, in priority order
pub const DATE_FIELDS: &[DateField] = &[DateField::Original, DateField::Digitized, DateField::Generic];

impl DateField {
    pub fn name(&self) -> &'static str {
        match self {
            DateField::Original => "DateTimeOriginal",
            DateField::Digitized => "DateTimeDigitized",
            DateField::Generic => "DateTime",
        }
    }

    fn tag(&self) -> Tag {
        match self {
            DateField::Original => Tag::DateTimeOriginal,
            DateField::Digitized => Tag::DateTimeDigitized,
            DateField::Generic => Tag::DateTime,
        }
    }
}

/// Field lookup over decoded metadata
pub trait TagLookup {
    /// Return the string value of `field`
    fn get(&self, field: DateField) -> Result<String, TagError>;
}

/// Decodes structured metadata from an open file
pub trait MetadataDecoder: Send + Sync {
    fn decode(&self, reader: &mut BufReader<File>) -> Result<Box<dyn TagLookup>, MetadataError>;
}

/// Decoder backed by kamadak-exif; understands JPEG, TIFF-based RAW, HEIF and PNG containers
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifDecoder;

impl MetadataDecoder for ExifDecoder {
    fn decode(&self, reader: &mut BufReader<File>) -> Result<Box<dyn TagLookup>, MetadataError> {
        let exif = Reader::new()
            .read_from_container(reader)
            .map_err(|e| MetadataError(e.to_string()))?;
        Ok(Box::new(ExifTags(exif)))
    }
}

struct ExifTags(exif::Exif);

impl TagLookup for ExifTags {
    fn get(&self, field: DateField) -> Result<String, TagError> {
        let entry = self
            .0
            .get_field(field.tag(), In::PRIMARY)
            .ok_or(TagError::NotFound)?;

        match &entry.value {
            Value::Ascii(values) => values
                .first()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .ok_or(TagError::NotString),
            _ => Err(TagError::NotString),
        }
    }
}

/// Parse an EXIF datetime string: "YYYY:MM:DD HH:MM:SS"
pub fn parse_metadata_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(s, METADATA_DATETIME_FORMAT).ok()
}

/// First date field, in priority order, whose value parses
///
/// Missing fields, non-string values and unparseable values all fall
/// through to the next field.
pub fn probe_date(tags: &dyn TagLookup) -> Option<(DateField, NaiveDateTime)> {
    for field in DATE_FIELDS {
        let value = match tags.get(*field) {
            Ok(v) => v,
            Err(e) => {
                trace!(field = field.name(), error = %e, "Date field unavailable");
                continue;
            }
        };
        match parse_metadata_datetime(&value) {
            Some(datetime) => return Some((*field, datetime)),
            None => trace!(field = field.name(), %value, "Date field did not parse"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct MapTags(HashMap<&'static str, Result<String, TagError>>);

    impl TagLookup for MapTags {
        fn get(&self, field: DateField) -> Result<String, TagError> {
            self.0
                .get(field.name())
                .cloned()
                .unwrap_or(Err(TagError::NotFound))
        }
    }

    #[test]
    fn test_parse_metadata_datetime() {
        let dt = parse_metadata_datetime("2024:01:15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 0);

        // NUL padding from fixed-size ASCII fields
        assert!(parse_metadata_datetime("2024:01:15 14:30:00\0").is_some());

        // Only the fixed metadata layout is accepted
        assert!(parse_metadata_datetime("2024-01-15 14:30:00").is_none());
        assert!(parse_metadata_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_metadata_datetime("invalid").is_none());
    }

    #[test]
    fn test_probe_date_priority() {
        let tags = MapTags(HashMap::from([
            ("DateTimeOriginal", Ok("2020:05:01 10:00:00".to_string())),
            ("DateTimeDigitized", Ok("2021:05:01 10:00:00".to_string())),
            ("DateTime", Ok("2022:05:01 10:00:00".to_string())),
        ]));
        let (field, dt) = probe_date(&tags).unwrap();
        assert_eq!(field, DateField::Original);
        assert_eq!(dt.year(), 2020);
    }

    #[test]
    fn test_probe_date_falls_through() {
        let tags = MapTags(HashMap::from([
            ("DateTimeOriginal", Ok("garbage".to_string())),
            ("DateTimeDigitized", Err(TagError::NotString)),
            ("DateTime", Ok("2022:05:01 10:00:00".to_string())),
        ]));
        let (field, dt) = probe_date(&tags).unwrap();
        assert_eq!(field, DateField::Generic);
        assert_eq!(dt.year(), 2022);

        let empty = MapTags(HashMap::new());
        assert!(probe_date(&empty).is_none());
    }

    #[test]
    fn test_exif_decoder_rejects_non_image() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an image").unwrap();
        file.flush().unwrap();

        let mut reader = BufReader::new(File::open(file.path()).unwrap());
        assert!(ExifDecoder.decode(&mut reader).is_err());
    }
}
