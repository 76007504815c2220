//! Great-circle geometry on a spherical Earth

use num_traits::Float;

/// Mean Earth radius used for distance calculations, in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two latitude/longitude points, in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // clamp guards asin against rounding just above 1 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Round `value` to a fixed number of decimal digits
pub fn quantize<T: Float>(value: T, digits: i32) -> T {
    let scale = T::from(10.0_f64.powi(digits)).unwrap_or_else(T::one);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert!(haversine_km(50.45, 30.52, 50.45, 30.52).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_nearby_points() {
        // two points in Kyiv, roughly 1.4 km apart
        let d = haversine_km(50.4501, 30.5234, 50.46, 30.53);
        assert!(d > 1.0 && d < 2.0, "distance was {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let ab = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        let ba = haversine_km(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((ab - ba).abs() < 1e-9);
        // Paris to London
        assert!((ab - 343.5).abs() < 2.0);
    }

    #[test]
    fn test_haversine_antipodal() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(50.450_149_f64, 4), 50.4501);
        assert_eq!(quantize(-30.523_451_f64, 4), -30.5235);
        assert_eq!(quantize(1.25_f32, 1), 1.3);
    }
}
