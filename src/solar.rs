//! Sunrise/sunset resolution for symbolic time anchors.
//!
//! Rules may anchor their on/off times to `SUNRISE` or `SUNSET` instead of a
//! literal clock time. This module converts those anchors into local clock
//! times for a given date and location, delegating the astronomy to the
//! `sunrise` crate rather than reimplementing an almanac.
//!
//! The twilight selection maps the classic zenith angles onto the solar
//! events the crate exposes: `standard` is the true sunrise/sunset
//! (zenith 90°50'), while `civil`, `nautical` and `astronomical` use the
//! corresponding dawn/dusk definitions (96°, 102°, 108°).

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use sunrise::{Coordinates, DawnType, SolarDay, SolarEvent};

use crate::config::ClockZone;

/// Which solar depression angle defines "sunrise" and "sunset" for scheduling.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Twilight {
    /// True sunrise/sunset: upper limb of the sun at the horizon (zenith 90°50').
    #[default]
    Standard,
    /// Civil twilight (zenith 96°).
    Civil,
    /// Nautical twilight (zenith 102°).
    Nautical,
    /// Astronomical twilight (zenith 108°).
    Astronomical,
}

impl Twilight {
    fn events(self) -> (SolarEvent, SolarEvent) {
        match self {
            Twilight::Standard => (SolarEvent::Sunrise, SolarEvent::Sunset),
            Twilight::Civil => (
                SolarEvent::Dawn(DawnType::Civil),
                SolarEvent::Dusk(DawnType::Civil),
            ),
            Twilight::Nautical => (
                SolarEvent::Dawn(DawnType::Nautical),
                SolarEvent::Dusk(DawnType::Nautical),
            ),
            Twilight::Astronomical => (
                SolarEvent::Dawn(DawnType::Astronomical),
                SolarEvent::Dusk(DawnType::Astronomical),
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Twilight::Standard => "standard",
            Twilight::Civil => "civil",
            Twilight::Nautical => "nautical",
            Twilight::Astronomical => "astronomical",
        }
    }
}

/// Resolved local sunrise and sunset clock times for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

/// Calculate local sunrise/sunset times for `date` at the given coordinates.
///
/// Deterministic for a given input set. The UTC event times from the almanac
/// are converted into the configured clock zone before the time-of-day is
/// taken, so windows line up with the wall clock the rest of the engine uses.
pub fn solar_times(
    latitude: f64,
    longitude: f64,
    twilight: Twilight,
    date: NaiveDate,
    zone: &ClockZone,
) -> Result<SolarTimes> {
    let coord = Coordinates::new(latitude, longitude).with_context(|| {
        format!("Invalid coordinates: lat={latitude:.4}, lon={longitude:.4}")
    })?;

    let solar_day = SolarDay::new(coord, date);
    let (rise_event, set_event) = twilight.events();

    let sunrise = zone.local_time(solar_day.event_time(rise_event));
    let sunset = zone.local_time(solar_day.event_time(set_event));

    Ok(SolarTimes { sunrise, sunset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    // Atlanta suburbs, the coordinates the original deployment ran with
    const LAT: f64 = 34.1939770;
    const LON: f64 = -84.2247560;

    #[test]
    fn solar_times_resolve_for_known_location() {
        let zone = ClockZone::fixed("America/New_York").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let times = solar_times(LAT, LON, Twilight::Standard, date, &zone).unwrap();

        // Summer solstice in north Georgia: sunrise near 06:30, sunset near 20:50
        assert!(times.sunrise.hour() >= 5 && times.sunrise.hour() <= 7);
        assert!(times.sunset.hour() >= 19 && times.sunset.hour() <= 21);
    }

    #[test]
    fn civil_twilight_widens_the_day() {
        let zone = ClockZone::fixed("America/New_York").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let standard = solar_times(LAT, LON, Twilight::Standard, date, &zone).unwrap();
        let civil = solar_times(LAT, LON, Twilight::Civil, date, &zone).unwrap();

        assert!(civil.sunrise < standard.sunrise);
        assert!(civil.sunset > standard.sunset);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let zone = ClockZone::fixed("UTC").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(solar_times(123.0, 0.0, Twilight::Standard, date, &zone).is_err());
    }
}
