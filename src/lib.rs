use std::path::Path;

use serde::Serialize;

pub use error::{Error, Result};
pub use map::MapService;
pub use photo_metadata::{dms_to_decimal, Geotag};
pub use property_store::{
    ExifPropertyStore, GpsPropertyKeys, PropertyKey, PropertyStore, PropertySystem, PropertyValue,
};

pub mod error;
pub mod map;
pub mod photo_metadata;
pub mod property_store;
pub mod registration;

/// Reads the geotag of the photo at `path`.
///
/// `Ok(None)` means the photo carries no usable GPS position.
pub fn geotag_for_path(path: &Path, keys: &GpsPropertyKeys) -> Result<Option<Geotag>> {
    let store = ExifPropertyStore::open(path)?;
    lookup_geotag(&store, keys)
}

/// Reads latitude, then longitude, from `store`.
///
/// Longitude is never looked up when the latitude pair is incomplete.
pub fn lookup_geotag<S: PropertyStore>(
    store: &S,
    keys: &GpsPropertyKeys,
) -> Result<Option<Geotag>> {
    let latitude = match read_coordinate(store, keys.latitude, keys.latitude_ref)? {
        Some(lat) => lat,
        None => {
            log::debug!("latitude missing");
            return Ok(None);
        }
    };
    let longitude = match read_coordinate(store, keys.longitude, keys.longitude_ref)? {
        Some(lon) => lon,
        None => {
            log::debug!("longitude missing");
            return Ok(None);
        }
    };
    Ok(Some(Geotag::new(latitude, longitude)))
}

fn read_coordinate<S: PropertyStore>(
    store: &S,
    angle_key: PropertyKey,
    direction_key: PropertyKey,
) -> Result<Option<f64>> {
    let angle = store.get_value(angle_key);
    let direction = store.get_value(direction_key);
    let (angle, direction) = match (angle, direction) {
        (Some(angle), Some(direction)) => (angle, direction),
        _ => return Ok(None),
    };

    let dms = match angle {
        PropertyValue::Doubles(dms) => dms,
        other => {
            return Err(Error::PropertyType {
                name: "GPS angle",
                expected: "an array of doubles",
                found: other.kind(),
            })
        }
    };
    let direction = match direction {
        PropertyValue::Str(direction) => direction,
        other => {
            return Err(Error::PropertyType {
                name: "GPS direction reference",
                expected: "a string",
                found: other.kind(),
            })
        }
    };
    if dms.is_empty() {
        return Ok(None);
    }

    log::debug!("{} {:?}", direction, dms);
    Ok(Some(dms_to_decimal(&direction, &dms)))
}

#[derive(Serialize, Debug, PartialEq)]
pub struct PropertyEntry {
    pub name: String,
    pub value: PropertyValue,
}

/// Lists every property of the photo at `path` with a readable name.
pub fn dump_properties(path: &Path, propsys: &PropertySystem) -> Result<Vec<PropertyEntry>> {
    let store = ExifPropertyStore::open(path)?;
    Ok(collect_properties(&store, propsys))
}

fn collect_properties<S: PropertyStore>(
    store: &S,
    propsys: &PropertySystem,
) -> Vec<PropertyEntry> {
    store
        .keys()
        .into_iter()
        .filter_map(|key| {
            let value = store.get_value(key)?;
            let name = match propsys.description(key) {
                Some(desc) => format!("{} {}", desc.canonical_name, desc.display_name),
                None => key.to_string(),
            };
            Some(PropertyEntry { name, value })
        })
        .collect()
}
