//! Solar geometry and imaging-window computation.
//!
//! The sun's position comes from a low-precision ephemeris (mean elements,
//! equation of centre, nutation-corrected obliquity), good to a few
//! hundredths of a degree, which is far below the minute-level precision a
//! capture schedule needs.
//!
//! Windows are derived from [`find_night_periods`]: the intervals in a search
//! span during which the sun stays below a threshold altitude. Crossings are
//! located by a coarse scan followed by bisection.
//!
//! Everything here is pure: callers pass the reference instant explicitly.

use chrono::{DateTime, Duration, Utc};
use qtty::{Degree, Degrees, Radian, Radians};

use crate::error::{Result, SkycamError};
use crate::models::{
    truncate_to_second, GeoLocation, ImagingWindow, SkyCondition, TwilightPhase, Unreachable,
};

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const SECONDS_PER_DAY: f64 = 86_400.0;

const SCAN_STEP_SECONDS: f64 = 300.0;
const BISECTION_TOLERANCE: f64 = 1e-3;

/// How far back a night containing the reference instant may have begun.
const LOOK_BEHIND: Duration = Duration::days(1);
/// How far ahead the next setting may lie. Near the end of polar day the
/// first setting can be more than a day away.
const LOOK_AHEAD: Duration = Duration::days(2);
/// Extra span past `LOOK_AHEAD` so a night starting late in it still ends
/// inside the search.
const NIGHT_SPAN: Duration = Duration::days(1);

/// Threshold altitudes for the sun's centre.
pub mod twilight {
    use qtty::Degrees;

    /// Upper limb on the apparent horizon: refraction plus semi-diameter.
    pub const APPARENT_HORIZON: Degrees = Degrees::new(-0.8333);
    pub const CIVIL: Degrees = Degrees::new(-6.0);
    pub const NAUTICAL: Degrees = Degrees::new(-12.0);
    pub const ASTRONOMICAL: Degrees = Degrees::new(-18.0);
}

/// Interval during which the sun stays below a threshold.
///
/// A period that was already under way when the search began, or still under
/// way when it ended, is clipped to the search bounds and flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The sun was already below the threshold at the start of the search.
    pub open_start: bool,
    /// The sun was still below the threshold at the end of the search.
    pub open_end: bool,
}

fn sin_deg(x: f64) -> f64 {
    Degrees::new(x).to::<Radian>().value().sin()
}

fn cos_deg(x: f64) -> f64 {
    Degrees::new(x).to::<Radian>().value().cos()
}

fn to_degrees(rad: f64) -> f64 {
    Radians::new(rad).to::<Degree>().value()
}

fn julian_day(instant: DateTime<Utc>) -> f64 {
    unix_seconds(instant) / SECONDS_PER_DAY + UNIX_EPOCH_JD
}

fn unix_seconds(instant: DateTime<Utc>) -> f64 {
    instant.timestamp() as f64 + instant.timestamp_subsec_nanos() as f64 / 1e9
}

fn instant_from_unix(seconds: f64) -> Option<DateTime<Utc>> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Geometric altitude of the sun's centre above the horizon.
pub fn solar_altitude(location: &GeoLocation, instant: DateTime<Utc>) -> Degrees {
    let jd = julian_day(instant);
    let t = (jd - J2000) / 36_525.0;

    let mean_longitude = (280.46646 + t * (36_000.76983 + t * 0.000_303_2)).rem_euclid(360.0);
    let mean_anomaly = 357.52911 + t * (35_999.05029 - 0.000_153_7 * t);
    let centre = sin_deg(mean_anomaly) * (1.914602 - t * (0.004817 + 0.000014 * t))
        + sin_deg(2.0 * mean_anomaly) * (0.019993 - 0.000101 * t)
        + sin_deg(3.0 * mean_anomaly) * 0.000289;
    let node = 125.04 - 1934.136 * t;
    let apparent_longitude = mean_longitude + centre - 0.00569 - 0.00478 * sin_deg(node);

    let mean_obliquity =
        23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let obliquity = mean_obliquity + 0.00256 * cos_deg(node);

    let right_ascension = to_degrees(
        (cos_deg(obliquity) * sin_deg(apparent_longitude)).atan2(cos_deg(apparent_longitude)),
    );
    let declination = to_degrees((sin_deg(obliquity) * sin_deg(apparent_longitude)).asin());

    let sidereal = (280.460_618_37
        + 360.985_647_366_29 * (jd - J2000)
        + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0)
        .rem_euclid(360.0);
    let hour_angle = sidereal + location.longitude - right_ascension;

    let sin_altitude = sin_deg(location.latitude) * sin_deg(declination)
        + cos_deg(location.latitude) * cos_deg(declination) * cos_deg(hour_angle);
    Degrees::new(to_degrees(sin_altitude.clamp(-1.0, 1.0).asin()))
}

/// Altitude the sun's centre must be below for `phase`.
///
/// Sunset uses the apparent horizon; the twilight phases use their nominal
/// angle.
pub fn phase_threshold(phase: TwilightPhase) -> Degrees {
    match phase {
        TwilightPhase::Sunset => twilight::APPARENT_HORIZON,
        TwilightPhase::Civil => twilight::CIVIL,
        TwilightPhase::Nautical => twilight::NAUTICAL,
        TwilightPhase::Astronomical => twilight::ASTRONOMICAL,
    }
}

/// Finds every interval in `[from, to]` during which the sun is below
/// `threshold` at `location`.
///
/// # Arguments
///
/// * `location` - Observer position
/// * `from`, `to` - Search span; `to` must not precede `from`
/// * `threshold` - Altitude of the sun's centre bounding the night
///
/// # Returns
///
/// Periods in chronological order. Interior bounds are crossings accurate to
/// a millisecond; bounds clipped to the search span are flagged as open.
/// An empty vector means the sun stays above the threshold throughout.
pub fn find_night_periods(
    location: &GeoLocation,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    threshold: Degrees,
) -> Vec<NightPeriod> {
    let thr = threshold.value();
    let height = |t: f64| -> f64 {
        instant_from_unix(t)
            .map(|instant| solar_altitude(location, instant).value() - thr)
            .unwrap_or(f64::NAN)
    };
    let below = |h: f64| h <= 0.0;

    let origin = unix_seconds(from);
    let finish = unix_seconds(to);
    let mut periods = Vec::new();

    let mut a = origin;
    let mut ha = height(a);
    if !ha.is_finite() {
        return periods;
    }
    let mut open: Option<(f64, bool)> = below(ha).then_some((origin, true));

    while a < finish {
        let b = (a + SCAN_STEP_SECONDS).min(finish);
        let hb = height(b);
        if !hb.is_finite() {
            break;
        }
        if below(ha) != below(hb) {
            let Some(crossing) = bisect(&height, a, b, ha) else {
                break;
            };
            match open.take() {
                Some((start, open_start)) => {
                    periods.extend(period(start, crossing, open_start, false));
                }
                None => open = Some((crossing, false)),
            }
        }
        a = b;
        ha = hb;
    }

    if let Some((start, open_start)) = open {
        periods.extend(period(start, finish, open_start, true));
    }
    periods
}

fn period(start: f64, end: f64, open_start: bool, open_end: bool) -> Option<NightPeriod> {
    Some(NightPeriod {
        start: instant_from_unix(start)?,
        end: instant_from_unix(end)?,
        open_start,
        open_end,
    })
}

/// Narrows a sign change in `[a, b]` down to `BISECTION_TOLERANCE` seconds.
/// Returns the bound on the below-threshold side.
fn bisect(height: &impl Fn(f64) -> f64, mut a: f64, mut b: f64, mut ha: f64) -> Option<f64> {
    let setting = ha > 0.0;
    while b - a > BISECTION_TOLERANCE {
        let mid = 0.5 * (a + b);
        let hm = height(mid);
        if !hm.is_finite() {
            return None;
        }
        if (hm > 0.0) == (ha > 0.0) {
            a = mid;
            ha = hm;
        } else {
            b = mid;
        }
    }
    Some(if setting { b } else { a })
}

/// Computes the imaging window for `phase` relative to `reference`.
///
/// The window is the night that contains `reference`, or else the next one.
/// A night already under way starts at its setting, so a mid-window call
/// does not wait for tomorrow; the start is never earlier than a setting and
/// never in daylight. If the sun goes down and stays down (polar night) the
/// window covers one day of continuous darkness.
///
/// # Arguments
///
/// * `location` - Observer position
/// * `phase` - Threshold bounding the window
/// * `reference` - Instant the search is anchored to, usually "now"
///
/// # Returns
///
/// The window with both bounds truncated to whole seconds, or why none exists.
pub fn compute_window(
    location: &GeoLocation,
    phase: TwilightPhase,
    reference: DateTime<Utc>,
) -> std::result::Result<ImagingWindow, Unreachable> {
    let from = reference - LOOK_BEHIND;
    let latest_start = reference + LOOK_AHEAD;
    let nights = find_night_periods(
        location,
        from,
        latest_start + NIGHT_SPAN,
        phase_threshold(phase),
    );
    if nights.is_empty() {
        return Err(Unreachable::AlwaysAbove);
    }

    let night = nights
        .into_iter()
        .find(|n| n.end > reference && n.start <= latest_start)
        .ok_or(Unreachable::Incomplete)?;

    // Dark since before the search began: no setting to anchor to.
    let start = if night.open_start { reference } else { night.start };
    let end = if night.open_end {
        start.max(reference) + Duration::days(1)
    } else {
        night.end
    };

    ImagingWindow::new(start, end, phase).ok_or(Unreachable::Incomplete)
}

/// A window together with every phase tried to obtain it.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResolution {
    pub window: ImagingWindow,
    pub attempted: Vec<TwilightPhase>,
}

impl WindowResolution {
    /// True when a less strict phase than the preferred one was used.
    pub fn fell_back(&self) -> bool {
        self.attempted.len() > 1
    }
}

/// Resolves a window starting at `preferred` and relaxing one phase at a
/// time down to sunset.
///
/// # Returns
///
/// The first window found and the phases tried to get it. Failing at sunset
/// means the sun does not set at all; that is returned as
/// [`SkycamError::NoImagingWindow`] and is not recoverable.
pub fn resolve_window(
    location: &GeoLocation,
    preferred: TwilightPhase,
    reference: DateTime<Utc>,
) -> Result<WindowResolution> {
    let mut attempted = Vec::with_capacity(TwilightPhase::ALL.len());
    for phase in preferred.fallback_chain() {
        attempted.push(phase);
        if let Ok(window) = compute_window(location, phase, reference) {
            return Ok(WindowResolution { window, attempted });
        }
    }
    Err(SkycamError::NoImagingWindow {
        reference,
        attempted,
    })
}

/// Next sunset strictly after `reference`, in whole seconds; `None` if the
/// sun does not set within a day.
pub fn next_sunset(location: &GeoLocation, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    find_night_periods(
        location,
        reference,
        reference + Duration::days(1),
        twilight::APPARENT_HORIZON,
    )
    .into_iter()
    .find(|n| !n.open_start)
    .map(|n| truncate_to_second(n.start))
}

/// Sky condition at `instant`.
pub fn sky_condition(location: &GeoLocation, instant: DateTime<Utc>) -> SkyCondition {
    SkyCondition::from_altitude(solar_altitude(location, instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn london() -> GeoLocation {
        GeoLocation::new(51.5, -0.1).unwrap()
    }

    fn minutes_apart(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
        (a - b).num_minutes().abs()
    }

    #[test]
    fn test_altitude_at_equinox_noon_on_equator() {
        let equator = GeoLocation::new(0.0, 0.0).unwrap();
        let alt = solar_altitude(&equator, at(2024, 3, 20, 12, 7));
        assert!(alt.value() > 88.0, "got {}", alt.value());
    }

    #[test]
    fn test_london_midsummer_sunset_window() {
        let window = compute_window(&london(), TwilightPhase::Sunset, at(2024, 6, 21, 12, 0)).unwrap();
        // Published times: sunset 20:21 UTC, sunrise 03:43 UTC
        assert!(minutes_apart(window.start, at(2024, 6, 21, 20, 21)) <= 4);
        assert!(minutes_apart(window.end, at(2024, 6, 22, 3, 43)) <= 4);
        assert_eq!(window.start.nanosecond(), 0);
        assert_eq!(window.end.nanosecond(), 0);
    }

    #[test]
    fn test_london_midsummer_has_no_astronomical_night() {
        // Lowest solar altitude that night is about -15 degrees.
        let result = compute_window(&london(), TwilightPhase::Astronomical, at(2024, 6, 21, 12, 0));
        assert_eq!(result, Err(Unreachable::AlwaysAbove));
    }

    #[test]
    fn test_london_midsummer_nautical_window_is_short() {
        let window =
            compute_window(&london(), TwilightPhase::Nautical, at(2024, 6, 21, 12, 0)).unwrap();
        assert!(window.start < window.end);
        assert!(window.duration() > Duration::hours(1));
        assert!(window.duration() < Duration::hours(5));
    }

    #[test]
    fn test_mid_window_uses_previous_setting() {
        let reference = at(2024, 6, 21, 23, 30);
        let window = compute_window(&london(), TwilightPhase::Nautical, reference).unwrap();
        assert!(window.contains(reference));
        assert!(reference - window.start < Duration::hours(3));
    }

    #[test]
    fn test_polar_night_is_continuous_darkness() {
        let svalbard = GeoLocation::new(78.0, 15.0).unwrap();
        let reference = at(2024, 12, 21, 12, 0);
        let window = compute_window(&svalbard, TwilightPhase::Sunset, reference).unwrap();
        assert!(window.contains(reference));
        assert!(window.duration() >= Duration::hours(24));
    }

    #[test]
    fn test_fallback_settles_on_sunset() {
        let trondheim = GeoLocation::new(63.0, 10.0).unwrap();
        let resolution =
            resolve_window(&trondheim, TwilightPhase::Astronomical, at(2024, 6, 21, 12, 0)).unwrap();
        assert_eq!(
            resolution.attempted,
            vec![
                TwilightPhase::Astronomical,
                TwilightPhase::Nautical,
                TwilightPhase::Civil,
                TwilightPhase::Sunset
            ]
        );
        assert_eq!(resolution.window.phase, TwilightPhase::Sunset);
        assert!(resolution.fell_back());
    }

    #[test]
    fn test_fallback_exhaustion_is_fatal() {
        let arctic = GeoLocation::new(78.0, -0.1).unwrap();
        let err = resolve_window(&arctic, TwilightPhase::Astronomical, at(2024, 6, 21, 12, 0))
            .unwrap_err();
        match err {
            SkycamError::NoImagingWindow { attempted, .. } => assert_eq!(attempted.len(), 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_preferred_phase_used_when_reachable() {
        let resolution =
            resolve_window(&london(), TwilightPhase::Civil, at(2024, 6, 21, 12, 0)).unwrap();
        assert_eq!(resolution.attempted, vec![TwilightPhase::Civil]);
        assert!(!resolution.fell_back());
    }

    #[test]
    fn test_next_sunset() {
        let sunset = next_sunset(&london(), at(2024, 6, 21, 12, 0)).unwrap();
        assert!(minutes_apart(sunset, at(2024, 6, 21, 20, 21)) <= 4);
        assert_eq!(sunset.nanosecond(), 0);

        let arctic = GeoLocation::new(78.0, -0.1).unwrap();
        assert!(next_sunset(&arctic, at(2024, 6, 21, 12, 0)).is_none());
    }

    #[test]
    fn test_sky_condition() {
        assert_eq!(sky_condition(&london(), at(2024, 6, 21, 12, 0)), SkyCondition::Day);
        assert_eq!(
            sky_condition(&london(), at(2024, 12, 21, 0, 0)),
            SkyCondition::Night
        );
    }

    fn lofoten() -> GeoLocation {
        GeoLocation::new(68.0, 15.0).unwrap()
    }

    /// Sun altitude at `instant` relative to the phase's threshold.
    fn height_above(location: &GeoLocation, phase: TwilightPhase, instant: DateTime<Utc>) -> f64 {
        solar_altitude(location, instant).value() - phase_threshold(phase).value()
    }

    #[test]
    fn test_night_periods_over_one_london_night() {
        let nights = find_night_periods(
            &london(),
            at(2024, 6, 21, 12, 0),
            at(2024, 6, 22, 12, 0),
            twilight::APPARENT_HORIZON,
        );
        assert_eq!(nights.len(), 1);
        let night = nights[0];
        assert!(!night.open_start && !night.open_end);
        assert!(minutes_apart(night.start, at(2024, 6, 21, 20, 21)) <= 4);
        assert!(minutes_apart(night.end, at(2024, 6, 22, 3, 43)) <= 4);
    }

    #[test]
    fn test_night_periods_clipped_in_polar_night() {
        let svalbard = GeoLocation::new(78.0, 15.0).unwrap();
        let from = at(2024, 12, 21, 0, 0);
        let to = at(2024, 12, 22, 0, 0);
        let nights = find_night_periods(&svalbard, from, to, twilight::APPARENT_HORIZON);
        assert_eq!(
            nights,
            vec![NightPeriod {
                start: from,
                end: to,
                open_start: true,
                open_end: true
            }]
        );
    }

    #[test]
    fn test_end_of_midnight_sun_waits_for_first_setting() {
        // The sun first dips below the horizon late on 16 July.
        let reference = at(2024, 7, 15, 2, 0);
        let window = compute_window(&lofoten(), TwilightPhase::Sunset, reference).unwrap();
        assert!(window.start > reference);
        assert!(height_above(&lofoten(), TwilightPhase::Sunset, window.start) <= 0.01);
        assert!(window.duration() < Duration::hours(12));

        // Just before that setting, and shortly after it, give the same night.
        for offset in [Duration::minutes(-10), Duration::minutes(5)] {
            let later = compute_window(&lofoten(), TwilightPhase::Sunset, window.start + offset)
                .unwrap();
            assert!((later.start - window.start).num_seconds().abs() <= 2);
            assert!((later.end - window.end).num_seconds().abs() <= 2);
        }
    }

    #[test]
    fn test_arctic_windows_start_in_darkness() {
        // Beginning and end of the midnight sun, every three hours.
        for first in [at(2024, 5, 15, 0, 0), at(2024, 7, 5, 0, 0)] {
            for step in 0..(8 * 20) {
                let reference = first + Duration::hours(3 * step);
                for phase in [TwilightPhase::Sunset, TwilightPhase::Civil] {
                    let Ok(window) = compute_window(&lofoten(), phase, reference) else {
                        continue;
                    };
                    let height = height_above(&lofoten(), phase, window.start);
                    assert!(height <= 0.01, "{phase:?} at {reference}: {height}");
                    assert!(window.end > reference);
                    assert!(window.duration() <= Duration::hours(25));
                }
            }
        }
    }
}
