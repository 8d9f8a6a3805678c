use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use exif::{In, Tag};
use serde::Serialize;

use crate::error::{Error, Result};

/// Identifies one property inside a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyKey(Tag);

impl PropertyKey {
    pub fn tag(&self) -> Tag {
        self.0
    }
}

impl From<Tag> for PropertyKey {
    fn from(tag: Tag) -> Self {
        PropertyKey(tag)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}:{})", self.0.context(), self.0.number())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Doubles(Vec<f64>),
    Integers(Vec<i64>),
    Str(String),
    Strings(Vec<String>),
    Other(String),
}

impl PropertyValue {
    pub fn from_exif(tag: Tag, value: &exif::Value) -> PropertyValue {
        use exif::Value;

        match value {
            Value::Rational(v) => PropertyValue::Doubles(v.iter().map(|r| r.to_f64()).collect()),
            Value::SRational(v) => PropertyValue::Doubles(v.iter().map(|r| r.to_f64()).collect()),
            Value::Float(v) => PropertyValue::Doubles(v.iter().map(|&x| f64::from(x)).collect()),
            Value::Double(v) => PropertyValue::Doubles(v.clone()),
            Value::Byte(v) => PropertyValue::Integers(v.iter().map(|&x| i64::from(x)).collect()),
            Value::Short(v) => PropertyValue::Integers(v.iter().map(|&x| i64::from(x)).collect()),
            Value::Long(v) => PropertyValue::Integers(v.iter().map(|&x| i64::from(x)).collect()),
            Value::SByte(v) => PropertyValue::Integers(v.iter().map(|&x| i64::from(x)).collect()),
            Value::SShort(v) => PropertyValue::Integers(v.iter().map(|&x| i64::from(x)).collect()),
            Value::SLong(v) => PropertyValue::Integers(v.iter().map(|&x| i64::from(x)).collect()),
            Value::Ascii(v) => {
                let mut strings: Vec<String> = v
                    .iter()
                    .map(|s| {
                        String::from_utf8_lossy(s)
                            .trim_end_matches('\0')
                            .to_string()
                    })
                    .collect();
                if strings.len() == 1 {
                    PropertyValue::Str(strings.remove(0))
                } else {
                    PropertyValue::Strings(strings)
                }
            }
            _ => PropertyValue::Other(value.display_as(tag).to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Doubles(_) => "an array of doubles",
            PropertyValue::Integers(_) => "an array of integers",
            PropertyValue::Str(_) => "a string",
            PropertyValue::Strings(_) => "an array of strings",
            PropertyValue::Other(_) => "an opaque value",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Doubles(v) => {
                let parts: Vec<String> = v.iter().map(f64::to_string).collect();
                f.write_str(&parts.join(","))
            }
            PropertyValue::Integers(v) => {
                let parts: Vec<String> = v.iter().map(i64::to_string).collect();
                f.write_str(&parts.join(","))
            }
            PropertyValue::Str(s) | PropertyValue::Other(s) => f.write_str(s),
            PropertyValue::Strings(v) => f.write_str(&v.join(";")),
        }
    }
}

/// Read access to the metadata of one file.
pub trait PropertyStore {
    fn get_value(&self, key: PropertyKey) -> Option<PropertyValue>;

    /// Every key the store holds a value for, in file order.
    fn keys(&self) -> Vec<PropertyKey>;
}

/// Property store over the EXIF block of an image file.
///
/// The file is read and closed inside `open`; the store only keeps the
/// parsed fields.
pub struct ExifPropertyStore {
    exif: Option<exif::Exif>,
}

impl ExifPropertyStore {
    pub fn open(path: &Path) -> Result<ExifPropertyStore> {
        log::debug!("opening property store for {}", path.display());
        let parsed = {
            let file = File::open(path).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let mut bufreader = BufReader::new(&file);
            exif::Reader::new().read_from_container(&mut bufreader)
        };
        Self::from_parsed(parsed, path.to_path_buf())
    }

    /// Builds a store from a raw TIFF-structured EXIF block.
    pub fn from_raw(data: Vec<u8>) -> Result<ExifPropertyStore> {
        Self::from_parsed(exif::Reader::new().read_raw(data), PathBuf::from("<raw>"))
    }

    fn from_parsed(
        parsed: std::result::Result<exif::Exif, exif::Error>,
        path: PathBuf,
    ) -> Result<ExifPropertyStore> {
        match parsed {
            Ok(exif) => Ok(ExifPropertyStore { exif: Some(exif) }),
            // A container without an EXIF block has no properties, same as
            // a block without GPS fields.
            Err(exif::Error::NotFound(what)) => {
                log::debug!("no exif data in {}: {}", path.display(), what);
                Ok(ExifPropertyStore { exif: None })
            }
            Err(source) => Err(Error::Metadata { path, source }),
        }
    }
}

impl PropertyStore for ExifPropertyStore {
    fn get_value(&self, key: PropertyKey) -> Option<PropertyValue> {
        let field = self.exif.as_ref()?.get_field(key.tag(), In::PRIMARY)?;
        Some(PropertyValue::from_exif(field.tag, &field.value))
    }

    fn keys(&self) -> Vec<PropertyKey> {
        match &self.exif {
            Some(exif) => exif
                .fields()
                .filter(|f| f.ifd_num == In::PRIMARY)
                .map(|f| PropertyKey(f.tag))
                .collect(),
            None => Vec::new(),
        }
    }
}

pub struct PropertyDescription {
    pub canonical_name: &'static str,
    pub display_name: &'static str,
}

const PROPERTIES: &[(&str, &str, Tag)] = &[
    ("System.GPS.Latitude", "Latitude", Tag::GPSLatitude),
    ("System.GPS.LatitudeRef", "Latitude reference", Tag::GPSLatitudeRef),
    ("System.GPS.Longitude", "Longitude", Tag::GPSLongitude),
    ("System.GPS.LongitudeRef", "Longitude reference", Tag::GPSLongitudeRef),
    ("System.GPS.Altitude", "Altitude", Tag::GPSAltitude),
    ("System.GPS.AltitudeRef", "Altitude reference", Tag::GPSAltitudeRef),
    ("System.GPS.Date", "GPS date", Tag::GPSDateStamp),
    ("System.GPS.MapDatum", "Map datum", Tag::GPSMapDatum),
    ("System.GPS.VersionID", "GPS version", Tag::GPSVersionID),
    ("System.Photo.CameraManufacturer", "Camera maker", Tag::Make),
    ("System.Photo.CameraModel", "Camera model", Tag::Model),
    ("System.Photo.DateTaken", "Date taken", Tag::DateTimeOriginal),
    ("System.Photo.Orientation", "Orientation", Tag::Orientation),
    ("System.Photo.FNumber", "F-stop", Tag::FNumber),
    ("System.Photo.ExposureTime", "Exposure time", Tag::ExposureTime),
    ("System.Photo.FocalLength", "Focal length", Tag::FocalLength),
    ("System.Photo.ISOSpeed", "ISO speed", Tag::PhotographicSensitivity),
    ("System.Photo.Flash", "Flash mode", Tag::Flash),
    ("System.Image.HorizontalSize", "Width", Tag::PixelXDimension),
    ("System.Image.VerticalSize", "Height", Tag::PixelYDimension),
    ("System.ApplicationName", "Program name", Tag::Software),
    ("System.Copyright", "Copyright", Tag::Copyright),
    ("System.Author", "Authors", Tag::Artist),
    ("System.DateModified", "Date modified", Tag::DateTime),
];

/// Maps canonical property names to store keys and back.
#[derive(Default)]
pub struct PropertySystem;

impl PropertySystem {
    pub fn new() -> PropertySystem {
        PropertySystem
    }

    pub fn key_by_name(&self, name: &str) -> Result<PropertyKey> {
        PROPERTIES
            .iter()
            .find(|(canonical, _, _)| canonical.eq_ignore_ascii_case(name))
            .map(|&(_, _, tag)| PropertyKey(tag))
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))
    }

    pub fn description(&self, key: PropertyKey) -> Option<PropertyDescription> {
        PROPERTIES
            .iter()
            .find(|(_, _, tag)| *tag == key.tag())
            .map(|&(canonical_name, display_name, _)| PropertyDescription {
                canonical_name,
                display_name,
            })
    }

    /// Resolves the four GPS keys a geotag lookup needs.
    pub fn gps_keys(&self) -> Result<GpsPropertyKeys> {
        Ok(GpsPropertyKeys {
            latitude: self.key_by_name("System.GPS.Latitude")?,
            longitude: self.key_by_name("System.GPS.Longitude")?,
            latitude_ref: self.key_by_name("System.GPS.LatitudeRef")?,
            longitude_ref: self.key_by_name("System.GPS.LongitudeRef")?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GpsPropertyKeys {
    pub latitude: PropertyKey,
    pub longitude: PropertyKey,
    pub latitude_ref: PropertyKey,
    pub longitude_ref: PropertyKey,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{fs, io::Cursor};

    use exif::{experimental::Writer, Field, Rational, Value};
    use tempfile::tempdir;

    use super::*;

    pub(crate) fn rationals(parts: &[(u32, u32)]) -> Value {
        Value::Rational(
            parts
                .iter()
                .map(|&(num, denom)| Rational { num, denom })
                .collect(),
        )
    }

    pub(crate) fn ascii(s: &str) -> Value {
        Value::Ascii(vec![s.as_bytes().to_vec()])
    }

    /// Encodes the given primary-image fields as a little endian TIFF file.
    pub(crate) fn tiff_with(values: Vec<(Tag, Value)>) -> Vec<u8> {
        let fields: Vec<Field> = values
            .into_iter()
            .map(|(tag, value)| Field {
                tag,
                ifd_num: In::PRIMARY,
                value,
            })
            .collect();
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, true).unwrap();
        buf.into_inner()
    }

    pub(crate) fn geotagged_tiff() -> Vec<u8> {
        tiff_with(vec![
            (Tag::Make, ascii("Acme")),
            (Tag::GPSLatitudeRef, ascii("N")),
            (Tag::GPSLatitude, rationals(&[(37, 1), (46, 1), (125, 10)])),
            (Tag::GPSLongitudeRef, ascii("W")),
            (Tag::GPSLongitude, rationals(&[(122, 1), (25, 1), (0, 1)])),
        ])
    }

    /// Builds a baseline JPEG: SOI, a JFIF APP0 segment, an optional APP1
    /// segment carrying `exif` as its TIFF payload, then EOI.
    pub(crate) fn jpeg_with(exif: Option<Vec<u8>>) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        if let Some(tiff) = exif {
            let len = u16::try_from(2 + 6 + tiff.len()).unwrap();
            data.extend_from_slice(&[0xFF, 0xE1]);
            data.extend_from_slice(&len.to_be_bytes());
            data.extend_from_slice(b"Exif\0\0");
            data.extend_from_slice(&tiff);
        }
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn resolve_gps_keys() {
        let keys = PropertySystem::new().gps_keys().unwrap();

        assert_eq!(keys.latitude.tag(), Tag::GPSLatitude);
        assert_eq!(keys.longitude.tag(), Tag::GPSLongitude);
        assert_eq!(keys.latitude_ref.tag(), Tag::GPSLatitudeRef);
        assert_eq!(keys.longitude_ref.tag(), Tag::GPSLongitudeRef);
    }

    #[test]
    fn key_by_name_ignores_case() {
        let propsys = PropertySystem::new();

        assert_eq!(
            propsys.key_by_name("system.gps.latitude").unwrap(),
            propsys.key_by_name("System.GPS.Latitude").unwrap()
        );
    }

    #[test]
    fn key_by_name_unknown() {
        let err = PropertySystem::new()
            .key_by_name("System.Nope")
            .unwrap_err();

        assert!(matches!(err, Error::UnknownProperty(name) if name == "System.Nope"));
    }

    #[test]
    fn description_for_known_and_unknown_keys() {
        let propsys = PropertySystem::new();
        let desc = propsys
            .description(PropertyKey::from(Tag::GPSLatitude))
            .unwrap();

        assert_eq!(desc.canonical_name, "System.GPS.Latitude");
        assert_eq!(desc.display_name, "Latitude");
        assert!(propsys
            .description(PropertyKey::from(Tag::YCbCrPositioning))
            .is_none());
    }

    #[test]
    fn fallback_key_display() {
        let key = PropertyKey::from(Tag::GPSLatitude);

        assert_eq!(key.to_string(), "(Gps:2)");
    }

    #[test]
    fn read_raw_gps_fields() {
        let store = ExifPropertyStore::from_raw(geotagged_tiff()).unwrap();

        assert_eq!(
            store.get_value(Tag::GPSLatitude.into()),
            Some(PropertyValue::Doubles(vec![37.0, 46.0, 12.5]))
        );
        assert_eq!(
            store.get_value(Tag::GPSLongitudeRef.into()),
            Some(PropertyValue::Str("W".to_string()))
        );
        assert_eq!(store.get_value(Tag::GPSAltitude.into()), None);
    }

    #[test]
    fn keys_lists_primary_fields() {
        let store = ExifPropertyStore::from_raw(geotagged_tiff()).unwrap();
        let keys = store.keys();

        assert!(keys.contains(&Tag::Make.into()));
        assert!(keys.contains(&Tag::GPSLatitude.into()));
        assert!(keys.contains(&Tag::GPSLongitudeRef.into()));
    }

    #[test]
    fn open_tiff_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("photo.tif");
        fs::write(&path, geotagged_tiff()).unwrap();

        let store = ExifPropertyStore::open(&path).unwrap();

        assert_eq!(
            store.get_value(Tag::Make.into()),
            Some(PropertyValue::Str("Acme".to_string()))
        );
    }

    #[test]
    fn open_missing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing.jpg");

        let err = ExifPropertyStore::open(&path).err().unwrap();

        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn open_jpeg_with_exif() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("photo.jpg");
        fs::write(&path, jpeg_with(Some(geotagged_tiff()))).unwrap();

        let store = ExifPropertyStore::open(&path).unwrap();

        assert_eq!(
            store.get_value(Tag::GPSLatitudeRef.into()),
            Some(PropertyValue::Str("N".to_string()))
        );
    }

    #[test]
    fn open_jpeg_without_exif_is_empty() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bare.jpg");
        fs::write(&path, jpeg_with(None)).unwrap();

        let store = ExifPropertyStore::open(&path).unwrap();

        assert!(store.keys().is_empty());
        assert_eq!(store.get_value(Tag::GPSLatitude.into()), None);
    }

    #[test]
    fn open_non_image_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("notes.jpg");
        fs::write(&path, "not an image").unwrap();

        assert!(ExifPropertyStore::open(&path).is_err());
    }

    #[test]
    fn value_display() {
        assert_eq!(
            PropertyValue::Doubles(vec![37.0, 46.0, 12.5]).to_string(),
            "37,46,12.5"
        );
        assert_eq!(
            PropertyValue::Strings(vec!["a".to_string(), "b".to_string()]).to_string(),
            "a;b"
        );
        assert_eq!(PropertyValue::Integers(vec![2, 3, 0, 0]).to_string(), "2,3,0,0");
    }

    #[test]
    fn value_from_exif_ascii_strips_nul() {
        let value = PropertyValue::from_exif(
            Tag::GPSLatitudeRef,
            &Value::Ascii(vec![b"S\0".to_vec()]),
        );

        assert_eq!(value, PropertyValue::Str("S".to_string()));
    }

    #[test]
    fn value_serializes_untagged() {
        let json = serde_json::to_string(&PropertyValue::Doubles(vec![1.0, 2.5])).unwrap();

        assert_eq!(json, "[1.0,2.5]");
    }
}
