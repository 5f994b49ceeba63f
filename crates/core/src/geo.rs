//! WGS84 geodesy helpers
//!
//! WGS84 latitude/longitude is the canonical coordinate system everywhere in
//! this crate. UTM and MGRS are presentation-only views derived on demand and
//! never stored as a source of truth.
//!
//! The UTM projection follows the standard transverse Mercator series
//! (Snyder, *Map Projections: A Working Manual*, USGS PP 1395); accuracy is
//! well under a meter inside a zone, far beyond what a landing prediction
//! needs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// WGS84 mean earth radius in km, used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// WGS84 semi-major axis in meters
const WGS84_A: f64 = 6378137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257223563;
/// UTM central scale factor
const UTM_K0: f64 = 0.9996;
/// UTM false easting in meters
const UTM_FALSE_EASTING: f64 = 500000.0;
/// UTM false northing for the southern hemisphere in meters
const UTM_FALSE_NORTHING_SOUTH: f64 = 10000000.0;

/// Continental-US bounding box used by the HRRR availability rule
///
/// HRRR is a CONUS-only product; launches outside this box cannot use it.
/// The box is the advertised HRRR domain edge, slightly generous on purpose
/// so border launches are not rejected.
pub mod conus {
    /// Southern edge, degrees latitude
    pub const LAT_MIN: f64 = 24.5;
    /// Northern edge, degrees latitude
    pub const LAT_MAX: f64 = 49.5;
    /// Western edge, degrees longitude
    pub const LON_MIN: f64 = -125.0;
    /// Eastern edge, degrees longitude
    pub const LON_MAX: f64 = -66.5;
}

/// Whether a point lies inside the continental-US HRRR domain
pub fn within_conus(latitude: f64, longitude: f64) -> bool {
    (conus::LAT_MIN..=conus::LAT_MAX).contains(&latitude)
        && (conus::LON_MIN..=conus::LON_MAX).contains(&longitude)
}

/// Great-circle distance between two WGS84 points in km (haversine)
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Hemisphere of a UTM coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

/// A point in Universal Transverse Mercator coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmCoordinate {
    pub zone: u8,
    pub hemisphere: Hemisphere,
    pub easting_m: f64,
    pub northing_m: f64,
}

impl fmt::Display for UtmCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = match self.hemisphere {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        };
        write!(
            f,
            "{}{} {:.0}E {:.0}N",
            self.zone, h, self.easting_m, self.northing_m
        )
    }
}

/// An MGRS grid reference at 1 m precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MgrsReference {
    pub zone: u8,
    /// Latitude band letter (C..X, skipping I and O)
    pub band: char,
    /// 100 km square column letter
    pub column: char,
    /// 100 km square row letter
    pub row: char,
    /// Easting within the 100 km square, meters
    pub easting_m: u32,
    /// Northing within the 100 km square, meters
    pub northing_m: u32,
}

impl fmt::Display for MgrsReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{} {:05} {:05}",
            self.zone, self.band, self.column, self.row, self.easting_m, self.northing_m
        )
    }
}

/// Convert a WGS84 point to UTM
///
/// Returns `None` outside the UTM domain (|latitude| > 84°). Zone exceptions
/// around Norway and Svalbard are intentionally not applied; this view backs
/// landing reports, not polar navigation.
pub fn to_utm(latitude: f64, longitude: f64) -> Option<UtmCoordinate> {
    if !(-80.0..=84.0).contains(&latitude) {
        return None;
    }

    let zone = utm_zone(longitude);
    let lon0 = f64::from(zone) * 6.0 - 183.0;

    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let phi = latitude.to_radians();
    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (longitude - lon0).to_radians();

    let m = meridional_arc(phi, e2);

    let easting = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut northing = UTM_K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    let hemisphere = if latitude >= 0.0 {
        Hemisphere::North
    } else {
        northing += UTM_FALSE_NORTHING_SOUTH;
        Hemisphere::South
    };

    Some(UtmCoordinate {
        zone,
        hemisphere,
        easting_m: easting,
        northing_m: northing,
    })
}

/// Convert a WGS84 point to an MGRS grid reference at 1 m precision
pub fn to_mgrs(latitude: f64, longitude: f64) -> Option<MgrsReference> {
    let utm = to_utm(latitude, longitude)?;
    let band = latitude_band(latitude)?;

    // Column letters cycle through three 8-letter sets (I and O skipped)
    const COLUMN_SETS: [&[u8; 8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];
    // Row letters cycle through 20, offset by 5 for even zones
    const ROW_LETTERS: &[u8; 20] = b"ABCDEFGHJKLMNPQRSTUV";

    let set = (usize::from(utm.zone) + 2) % 3;
    let col_index = (utm.easting_m / 100000.0).floor() as usize - 1;
    let column = *COLUMN_SETS[set].get(col_index)? as char;

    let row_offset = if utm.zone % 2 == 0 { 5 } else { 0 };
    let row_index = ((utm.northing_m / 100000.0).floor() as usize + row_offset) % 20;
    let row = ROW_LETTERS[row_index] as char;

    Some(MgrsReference {
        zone: utm.zone,
        band,
        column,
        row,
        easting_m: (utm.easting_m % 100000.0).floor() as u32,
        northing_m: (utm.northing_m % 100000.0).floor() as u32,
    })
}

/// UTM zone number for a longitude
fn utm_zone(longitude: f64) -> u8 {
    // Normalize to [-180, 180) then 6° slices; zone 60 covers 174°..180°
    let lon = ((longitude + 180.0).rem_euclid(360.0)) - 180.0;
    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60) as u8
}

/// MGRS latitude band letter for a latitude, C..X skipping I and O
fn latitude_band(latitude: f64) -> Option<char> {
    const BANDS: &[u8; 20] = b"CDEFGHJKLMNPQRSTUVWX";
    if !(-80.0..=84.0).contains(&latitude) {
        return None;
    }
    // Band X is stretched to cover 72..84
    let index = (((latitude + 80.0) / 8.0).floor() as usize).min(19);
    Some(BANDS[index] as char)
}

/// Meridional arc length from the equator (Snyder eq. 3-21)
fn meridional_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_known_distance() {
        // JFK to LAX is roughly 3974 km great-circle
        let d = haversine_km(40.6413, -73.7781, 33.9416, -118.4085);
        assert_relative_eq!(d, 3974.0, max_relative = 0.01);
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_km(40.0, -74.0, 40.0, -74.0), 0.0);
    }

    #[test]
    fn test_conus_bounds() {
        assert!(within_conus(40.7128, -74.0060)); // NYC
        assert!(within_conus(34.05, -118.24)); // LA
        assert!(!within_conus(51.5, -0.1)); // London
        assert!(!within_conus(64.8, -147.7)); // Fairbanks, AK is outside HRRR CONUS
    }

    #[test]
    fn test_utm_nyc_fixture() {
        // NYC is in zone 18 north; easting/northing cross-checked against
        // published converters (~583 960 E, ~4 507 523 N)
        let utm = to_utm(40.7128, -74.0060).unwrap();
        assert_eq!(utm.zone, 18);
        assert_eq!(utm.hemisphere, Hemisphere::North);
        assert!((utm.easting_m - 583960.0).abs() < 200.0, "easting {}", utm.easting_m);
        assert!((utm.northing_m - 4507523.0).abs() < 200.0, "northing {}", utm.northing_m);
    }

    #[test]
    fn test_utm_southern_hemisphere_false_northing() {
        // Sydney: zone 56 south, northing carries the 10 000 km false northing
        let utm = to_utm(-33.8688, 151.2093).unwrap();
        assert_eq!(utm.zone, 56);
        assert_eq!(utm.hemisphere, Hemisphere::South);
        assert!(utm.northing_m > 6000000.0);
    }

    #[test]
    fn test_utm_rejects_polar_latitudes() {
        assert!(to_utm(89.0, 0.0).is_none());
        assert!(to_utm(-85.0, 0.0).is_none());
    }

    #[test]
    fn test_mgrs_nyc_square() {
        // NYC is the well-known 18T WL square
        let mgrs = to_mgrs(40.7128, -74.0060).unwrap();
        assert_eq!(mgrs.zone, 18);
        assert_eq!(mgrs.band, 'T');
        assert_eq!(mgrs.column, 'W');
        assert_eq!(mgrs.row, 'L');
        assert!(mgrs.easting_m < 100000);
        assert!(mgrs.northing_m < 100000);
    }

    #[test]
    fn test_mgrs_display_format() {
        let mgrs = MgrsReference {
            zone: 18,
            band: 'T',
            column: 'W',
            row: 'L',
            easting_m: 83960,
            northing_m: 7523,
        };
        assert_eq!(mgrs.to_string(), "18TWL 83960 07523");
    }

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(utm_zone(-180.0), 1);
        assert_eq!(utm_zone(-75.0), 18);
        assert_eq!(utm_zone(0.0), 31);
        assert_eq!(utm_zone(179.9), 60);
    }
}
