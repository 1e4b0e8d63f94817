//! Listing CSV reading.
//!
//! Reads an Inside Airbnb style `listings.csv`, gzip compressed or not,
//! from a local file. Every column is kept as a string attribute; the
//! configured columns provide the id, the location, and the property type.

use std::io::Read;
use std::path::Path;

use geo::Point;
use rental_map_city_models::ListingSource;
use rental_map_spatial_models::Attributes;

use crate::ListingError;

/// First two bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Zero-based data row position in the source file.
    pub row: usize,
    /// Listing id, when the id column exists and is non-empty.
    pub id: Option<String>,
    /// Location, `None` when the coordinates are missing or unusable.
    pub point: Option<Point<f64>>,
    /// Raw property type.
    pub property_type: String,
    /// Every column of the row.
    pub attributes: Attributes,
}

/// Reads all listings from a local CSV file, decompressing it first when
/// it is gzip compressed.
///
/// # Errors
///
/// Returns [`ListingError`] if the file cannot be read or decompressed,
/// the CSV is malformed, or a required column is missing.
pub fn read_listings(path: &Path, source: &ListingSource) -> Result<Vec<Listing>, ListingError> {
    let bytes = std::fs::read(path)?;
    log::debug!("Read {} bytes from {}", bytes.len(), path.display());

    let csv_bytes = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        log::debug!("Decompressed to {} bytes", decompressed.len());
        decompressed
    } else {
        bytes
    };

    let listings = parse_listings(csv_bytes.as_slice(), source)?;
    log::info!("Parsed {} listings from {}", listings.len(), path.display());
    Ok(listings)
}

/// Parses listings from CSV data.
///
/// # Errors
///
/// Returns [`ListingError`] if the CSV is malformed or the latitude,
/// longitude, or property type column is missing.
pub fn parse_listings<R: Read>(
    reader: R,
    source: &ListingSource,
) -> Result<Vec<Listing>, ListingError> {
    let delimiter = u8::try_from(source.delimiter).map_err(|_| ListingError::Parse {
        message: format!("delimiter '{}' is not a single byte", source.delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| ListingError::MissingColumn {
            column: name.to_string(),
        })
    };

    let lat_idx = required(&source.latitude_column)?;
    let lng_idx = required(&source.longitude_column)?;
    let type_idx = required(&source.property_type_column)?;
    let id_idx = source.id_column.as_deref().and_then(column);

    if source.id_column.is_some() && id_idx.is_none() {
        log::warn!("Listing id column missing, identifying listings by row position");
    }

    let mut listings = Vec::new();
    let mut without_location = 0usize;

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let point = parse_point(field(lat_idx), field(lng_idx));
        if point.is_none() {
            without_location += 1;
        }

        let mut attributes = Attributes::new();
        for (i, header) in headers.iter().enumerate() {
            attributes.insert(header.clone(), serde_json::Value::String(field(i).to_owned()));
        }

        listings.push(Listing {
            row,
            id: id_idx
                .map(|idx| field(idx).to_owned())
                .filter(|id| !id.is_empty()),
            point,
            property_type: field(type_idx).to_owned(),
            attributes,
        });
    }

    if without_location > 0 {
        log::warn!("{without_location} listings have no usable coordinates");
    }

    Ok(listings)
}

/// Parses a longitude/latitude point. Returns `None` if either value is
/// missing, unparseable, non-finite, or zero.
fn parse_point(lat: &str, lng: &str) -> Option<Point<f64>> {
    let latitude = lat.parse::<f64>().ok()?;
    let longitude = lng.parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() || latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some(Point::new(longitude, latitude))
}
