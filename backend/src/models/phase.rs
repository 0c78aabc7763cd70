use std::fmt;

use qtty::Degrees;
use serde::{Deserialize, Serialize};

/// Solar-altitude threshold bounding the imaging window.
///
/// Variants are declared from least to most strict, so the derived ordering
/// follows the rank (`Sunset` = 0 ... `Astronomical` = 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TwilightPhase {
    Sunset,
    Civil,
    Nautical,
    Astronomical,
}

impl TwilightPhase {
    /// All phases, least strict first.
    pub const ALL: [TwilightPhase; 4] = [
        TwilightPhase::Sunset,
        TwilightPhase::Civil,
        TwilightPhase::Nautical,
        TwilightPhase::Astronomical,
    ];

    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Nominal horizon angle of the phase.
    pub fn horizon(self) -> Degrees {
        match self {
            TwilightPhase::Sunset => Degrees::new(0.0),
            TwilightPhase::Civil => Degrees::new(-6.0),
            TwilightPhase::Nautical => Degrees::new(-12.0),
            TwilightPhase::Astronomical => Degrees::new(-18.0),
        }
    }

    /// The next less strict phase, `None` once sunset is reached.
    pub fn less_strict(self) -> Option<TwilightPhase> {
        match self {
            TwilightPhase::Sunset => None,
            TwilightPhase::Civil => Some(TwilightPhase::Sunset),
            TwilightPhase::Nautical => Some(TwilightPhase::Civil),
            TwilightPhase::Astronomical => Some(TwilightPhase::Nautical),
        }
    }

    /// Fallback order starting at `self`, ending with sunset.
    pub fn fallback_chain(self) -> impl Iterator<Item = TwilightPhase> {
        std::iter::successors(Some(self), |phase| phase.less_strict())
    }

    pub fn name(self) -> &'static str {
        match self {
            TwilightPhase::Sunset => "sunset",
            TwilightPhase::Civil => "civil twilight",
            TwilightPhase::Nautical => "nautical twilight",
            TwilightPhase::Astronomical => "astronomical twilight",
        }
    }
}

impl fmt::Display for TwilightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for TwilightPhase {
    type Error = String;

    fn try_from(rank: u8) -> std::result::Result<Self, Self::Error> {
        TwilightPhase::ALL
            .get(rank as usize)
            .copied()
            .ok_or_else(|| format!("twilight phase must be 0-3, got {}", rank))
    }
}

impl From<TwilightPhase> for u8 {
    fn from(phase: TwilightPhase) -> Self {
        phase.rank()
    }
}

/// Where the sun currently sits relative to the twilight thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkyCondition {
    Day,
    CivilTwilight,
    NauticalTwilight,
    AstronomicalTwilight,
    Night,
}

impl SkyCondition {
    pub fn from_altitude(altitude: Degrees) -> Self {
        let alt = altitude.value();
        if alt >= 0.0 {
            SkyCondition::Day
        } else if alt >= -6.0 {
            SkyCondition::CivilTwilight
        } else if alt >= -12.0 {
            SkyCondition::NauticalTwilight
        } else if alt >= -18.0 {
            SkyCondition::AstronomicalTwilight
        } else {
            SkyCondition::Night
        }
    }
}
