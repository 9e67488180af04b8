//! Journey data model consumed from the ingestion side.
//!
//! The engine treats these types as read-only. Missing or malformed fields are tolerated:
//! coordinates may be absent or non-finite, timestamps and speeds may be missing. Nothing
//! here validates; filtering happens in [`crate::extract`].

use chrono::{DateTime, Duration, Utc};

use crate::GpsPoint;

/// Journey-level metadata.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct JourneyMetadata {
    /// Recording stopped before the vessel reached its destination
    pub is_incomplete: bool,
}

/// A full trip, composed of time-ordered intervals.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Journey {
    pub journey_index: u32,
    pub metadata: JourneyMetadata,
    pub intervals: Vec<Interval>,
}

impl Journey {
    pub fn new(journey_index: u32, intervals: Vec<Interval>) -> Self {
        Self {
            journey_index,
            metadata: JourneyMetadata::default(),
            intervals,
        }
    }

    pub fn incomplete(mut self) -> Self {
        self.metadata.is_incomplete = true;
        self
    }
}

/// A sub-segment of a journey with its own time range, status and samples.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Interval {
    pub journey_index: u32,
    /// Sequence number, unique within the journey
    pub interval_number: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Average speed over ground in knots
    pub avg_speed: Option<f64>,
    /// Navigation status label (e.g. "Under way using engine")
    pub nav_status: String,
    /// Activity classification label (e.g. "Fishing")
    pub classification_type: Option<String>,
    pub coordinate_points: Vec<CoordinatePoint>,
}

impl Interval {
    pub fn new(journey_index: u32, interval_number: u32) -> Self {
        Self {
            journey_index,
            interval_number,
            ..Self::default()
        }
    }

    /// Samples with both coordinates present and finite, in original order.
    pub fn usable_samples(&self) -> Vec<TrackSample> {
        self.coordinate_points
            .iter()
            .filter_map(CoordinatePoint::to_sample)
            .collect()
    }

    /// Elapsed time between start and end, when both are known.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// One raw sample as delivered by ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoordinatePoint {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Speed over ground in knots
    pub speed: Option<f64>,
}

impl CoordinatePoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            speed: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// The position, if both coordinates are present and finite.
    pub fn position(&self) -> Option<GpsPoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(GpsPoint::new(lat, lon))
            }
            _ => None,
        }
    }

    pub fn to_sample(&self) -> Option<TrackSample> {
        self.position().map(|point| TrackSample {
            point,
            speed: self.speed,
        })
    }
}

/// A usable sample: a finite position plus the optional speed recorded there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub point: GpsPoint,
    pub speed: Option<f64>,
}
