mod support;

use chrono::{Duration, TimeZone, Timelike, Utc};
use chrono_tz::Europe::London;
use proptest::prelude::*;

use skycam::models::{GeoLocation, SkyCondition, TwilightPhase};
use skycam::services::solar::{
    next_sunset, phase_threshold, resolve_window, sky_condition, solar_altitude,
};
use skycam::SkycamError;

#[test]
fn test_london_midsummer_falls_back_to_nautical() {
    let london = GeoLocation::new(51.5, -0.1).unwrap();
    let resolution =
        resolve_window(&london, TwilightPhase::Astronomical, support::solstice_noon()).unwrap();

    assert!(resolution.fell_back());
    assert_eq!(
        resolution.attempted,
        vec![TwilightPhase::Astronomical, TwilightPhase::Nautical]
    );

    let window = resolution.window;
    assert_eq!(window.phase, TwilightPhase::Nautical);
    assert_eq!(window.date_tag(&London), "20240621");
    assert!(window.duration() > Duration::hours(1));
    assert!(window.duration() < Duration::hours(5));
    assert_eq!(window.start.nanosecond(), 0);
    assert_eq!(window.end.nanosecond(), 0);
}

#[test]
fn test_london_sunset_window() {
    let london = GeoLocation::new(51.5, -0.1).unwrap();
    let window = resolve_window(&london, TwilightPhase::Sunset, support::solstice_noon())
        .unwrap()
        .window;

    let expected_start = Utc.with_ymd_and_hms(2024, 6, 21, 20, 21, 0).unwrap();
    let expected_end = Utc.with_ymd_and_hms(2024, 6, 22, 3, 43, 0).unwrap();
    assert!((window.start - expected_start).num_minutes().abs() <= 4);
    assert!((window.end - expected_end).num_minutes().abs() <= 4);
}

#[test]
fn test_started_mid_window_keeps_tonight() {
    let london = GeoLocation::new(51.5, -0.1).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 6, 21, 23, 30, 0).unwrap();
    let window = resolve_window(&london, TwilightPhase::Sunset, late)
        .unwrap()
        .window;

    assert!(window.contains(late));
    assert_eq!(window.date_tag(&London), "20240621");
}

#[test]
fn test_arctic_summer_is_fatal() {
    let svalbard = GeoLocation::new(78.0, 15.6).unwrap();
    let err = resolve_window(&svalbard, TwilightPhase::Civil, support::solstice_noon()).unwrap_err();

    assert!(err.is_fatal());
    match err {
        SkycamError::NoImagingWindow { attempted, .. } => {
            assert_eq!(attempted, vec![TwilightPhase::Civil, TwilightPhase::Sunset]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(next_sunset(&svalbard, support::solstice_noon()), None);
}

#[test]
fn test_sky_condition_through_the_evening() {
    let london = GeoLocation::new(51.5, -0.1).unwrap();
    assert_eq!(sky_condition(&london, support::solstice_noon()), SkyCondition::Day);

    let equator = GeoLocation::new(0.0, 0.0).unwrap();
    let midnight = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
    assert_eq!(sky_condition(&equator, midnight), SkyCondition::Night);
}

#[test]
fn test_first_setting_after_midnight_sun() {
    let lofoten = GeoLocation::new(68.0, 15.0).unwrap();
    let reference = Utc.with_ymd_and_hms(2024, 7, 15, 2, 0, 0).unwrap();
    let window = resolve_window(&lofoten, TwilightPhase::Sunset, reference)
        .unwrap()
        .window;

    assert!(window.start > reference);
    assert!(
        solar_altitude(&lofoten, window.start).value()
            <= phase_threshold(TwilightPhase::Sunset).value() + 0.01
    );
    assert!(window.duration() < Duration::hours(12));
}

#[test]
fn test_last_night_before_midnight_sun() {
    let lofoten = GeoLocation::new(68.0, 15.0).unwrap();
    let mut reference = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
    let mut saw_window = false;
    let mut saw_fatal = false;
    for _ in 0..24 {
        match resolve_window(&lofoten, TwilightPhase::Sunset, reference) {
            Ok(resolution) => {
                let window = resolution.window;
                saw_window = true;
                assert!(window.end > reference);
                assert!(window.duration() < Duration::hours(12));
                assert!(
                    solar_altitude(&lofoten, window.start).value()
                        <= phase_threshold(TwilightPhase::Sunset).value() + 0.01
                );
            }
            Err(err) => {
                assert!(err.is_fatal());
                saw_fatal = true;
            }
        }
        reference = reference + Duration::days(1);
    }
    assert!(saw_window && saw_fatal);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_window_is_ordered_and_whole_seconds(
        latitude in -70.0f64..70.0,
        longitude in -180.0f64..180.0,
        day in 0i64..366,
        hour in 0u32..24,
        rank in 0u8..4,
    ) {
        let location = GeoLocation::new(latitude, longitude).unwrap();
        let reference = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap() + Duration::days(day);
        let phase = TwilightPhase::try_from(rank).unwrap();

        match resolve_window(&location, phase, reference) {
            Ok(resolution) => {
                let window = resolution.window;
                prop_assert!(window.start < window.end);
                prop_assert_eq!(window.start.nanosecond(), 0);
                prop_assert_eq!(window.end.nanosecond(), 0);
                prop_assert!(window.phase.rank() <= phase.rank());
                prop_assert!(window.end > reference);
                let limit = phase_threshold(window.phase).value() + 0.01;
                prop_assert!(solar_altitude(&location, window.start).value() <= limit);
            }
            // Only the midnight sun leaves no window at all.
            Err(err) => {
                prop_assert!(err.is_fatal());
                prop_assert!(latitude.abs() > 60.0);
            }
        }
    }
}
