// EXIF capture-date reader backed by kamadak-exif

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Context, Field, In, Reader, Value};

use super::{ImageDates, ImageTagReader};
use crate::error::{GalleryError, Result};

const TAG_DATETIME_ORIGINAL: u16 = 0x9003;
const TAG_DATETIME: u16 = 0x0132;

/// Reads DateTimeOriginal / DateTime from both the Exif sub-IFD and IFD0 of the primary image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTagReader;

impl ImageTagReader for ExifTagReader {
    fn read_dates(&self, path: &Path) -> Result<ImageDates> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(ImageDates::default()),
            Err(e) => {
                return Err(GalleryError::Exif(format!("{}: {}", path.display(), e)));
            }
        };

        let mut dates = ImageDates::default();
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            let slot = match (field.tag.context(), field.tag.number()) {
                (Context::Exif, TAG_DATETIME_ORIGINAL) => &mut dates.sub_ifd_original,
                (Context::Exif, TAG_DATETIME) => &mut dates.sub_ifd_generic,
                (Context::Tiff, TAG_DATETIME_ORIGINAL) => &mut dates.ifd0_original,
                (Context::Tiff, TAG_DATETIME) => &mut dates.ifd0_generic,
                _ => continue,
            };
            if slot.is_none() {
                *slot = field_date(field);
            }
        }

        Ok(dates)
    }
}

/// Parse an EXIF ASCII date ("YYYY:MM:DD HH:MM:SS"). Zeroed or malformed dates are absent.
fn field_date(field: &Field) -> Option<NaiveDateTime> {
    let Value::Ascii(ref values) = field.value else {
        return None;
    };
    let raw = values.first()?;
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(u32::from(dt.hour), u32::from(dt.minute), u32::from(dt.second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Big-endian TIFF with IFD0 DateTime and an Exif sub-IFD holding DateTimeOriginal,
    /// wrapped in a bare JPEG APP1 segment.
    fn jpeg_with_dates(ifd0_datetime: &str, sub_ifd_original: &str) -> Vec<u8> {
        const IFD0_AT: u32 = 8;
        const SUB_IFD_AT: u32 = 38;
        const IFD0_DATE_AT: u32 = 56;
        const SUB_DATE_AT: u32 = 76;

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM");
        push_u16(&mut tiff, 42);
        push_u32(&mut tiff, IFD0_AT);

        // IFD0: DateTime + ExifIFDPointer
        push_u16(&mut tiff, 2);
        push_u16(&mut tiff, TAG_DATETIME);
        push_u16(&mut tiff, 2);
        push_u32(&mut tiff, 20);
        push_u32(&mut tiff, IFD0_DATE_AT);
        push_u16(&mut tiff, 0x8769);
        push_u16(&mut tiff, 4);
        push_u32(&mut tiff, 1);
        push_u32(&mut tiff, SUB_IFD_AT);
        push_u32(&mut tiff, 0);
        assert_eq!(tiff.len() as u32, SUB_IFD_AT);

        // Exif sub-IFD: DateTimeOriginal
        push_u16(&mut tiff, 1);
        push_u16(&mut tiff, TAG_DATETIME_ORIGINAL);
        push_u16(&mut tiff, 2);
        push_u32(&mut tiff, 20);
        push_u32(&mut tiff, SUB_DATE_AT);
        push_u32(&mut tiff, 0);
        assert_eq!(tiff.len() as u32, IFD0_DATE_AT);

        tiff.extend_from_slice(ifd0_datetime.as_bytes());
        tiff.push(0);
        tiff.extend_from_slice(sub_ifd_original.as_bytes());
        tiff.push(0);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        push_u16(&mut jpeg, (tiff.len() + 6 + 2) as u16);
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn test_reads_both_tag_families() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("IMG_0001.jpg");
        std::fs::write(&path, jpeg_with_dates("2015:03:01 12:00:00", "2014:02:01 08:30:00")).unwrap();

        let dates = ExifTagReader.read_dates(&path).unwrap();
        assert_eq!(dates.ifd0_generic, Some(ymd_hms(2015, 3, 1, 12, 0, 0)));
        assert_eq!(dates.sub_ifd_original, Some(ymd_hms(2014, 2, 1, 8, 30, 0)));
        assert_eq!(dates.sub_ifd_generic, None);
        assert_eq!(dates.ifd0_original, None);
    }

    #[test]
    fn test_zeroed_date_is_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("IMG_0002.jpg");
        std::fs::write(&path, jpeg_with_dates("0000:00:00 00:00:00", "2014:02:01 08:30:00")).unwrap();

        let dates = ExifTagReader.read_dates(&path).unwrap();
        assert_eq!(dates.ifd0_generic, None);
        assert!(dates.sub_ifd_original.is_some());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(ExifTagReader.read_dates(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(ExifTagReader.read_dates(&tmp.path().join("gone.jpg")).is_err());
    }
}
