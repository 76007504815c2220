use approx::assert_abs_diff_eq;
use lunacast::location::Coordinate;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(50.4501, 30.5234, "latn50_4501_lone30_5234")]
#[case(-33.8688, 151.2093, "lats33_8688_lone151_2093")]
#[case(40.7128, -74.006, "latn40_7128_lonw74_0060")]
#[case(0.0, 0.0, "latn0_0000_lone0_0000")]
fn test_token_format(#[case] lat: f64, #[case] lon: f64, #[case] expected: &str) {
    let coordinate = Coordinate::new(lat, lon).unwrap();
    assert_eq!(coordinate.token(), expected);
}

#[rstest]
#[case(50.45012345, 30.52339999)]
#[case(-89.99994, -179.99996)]
#[case(12.3, -0.00004)]
fn test_token_round_trip_within_precision(#[case] lat: f64, #[case] lon: f64) {
    let coordinate = Coordinate::new(lat, lon).unwrap();
    let decoded = Coordinate::from_token(&coordinate.token()).unwrap();

    assert_abs_diff_eq!(decoded.latitude(), lat, epsilon = 0.00005 + 1e-9);
    assert_abs_diff_eq!(decoded.longitude(), lon, epsilon = 0.00005 + 1e-9);
}

#[rstest]
#[case(90.5, 0.0)]
#[case(-91.0, 10.0)]
#[case(0.0, 180.5)]
#[case(f64::NAN, 0.0)]
fn test_out_of_range_rejected(#[case] lat: f64, #[case] lon: f64) {
    let err = Coordinate::new(lat, lon).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[rstest]
#[case("lat50_lon30")]
#[case("latn50_4501")]
#[case("x50_1_lone1_0")]
fn test_malformed_token(#[case] token: &str) {
    assert!(Coordinate::from_token(token).is_err());
}

#[test]
fn test_distance_between_nearby_points() {
    let a = Coordinate::new(50.4501, 30.5234).unwrap();
    let b = Coordinate::new(50.46, 30.53).unwrap();

    let d = a.distance_km(&b);
    assert!(d > 1.0 && d < 2.0, "distance was {}", d);
    assert_abs_diff_eq!(a.distance_km(&a), 0.0, epsilon = 1e-9);
}
