//! Info-panel content synthesis.
//!
//! Given a rendered path and a query point, work out where along the interval the point
//! lies and interpolate the time and speed there. The result is a [`DisplayPayload`]; its
//! `Display` impl is the text rendering used by hosts that don't format it themselves.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::geo_utils::{nearest_point_on_polyline, nearest_vertex};
use crate::render::RenderedPath;
use crate::surface::MapSurface;
use crate::{GpsPoint, ViewerConfig};

const NOT_AVAILABLE: &str = "N/A";

/// Speed shown in the panel, tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedReading {
    /// Recorded on the nearest sample
    Sample(f64),
    /// Nearest sample had none; taken as-is from the following sample
    NextSample(f64),
    /// Neither sample had one; interval average
    IntervalAverage(f64),
    Unavailable,
}

impl SpeedReading {
    /// Speed in knots, if any source provided one.
    pub fn knots(&self) -> Option<f64> {
        match *self {
            SpeedReading::Sample(v)
            | SpeedReading::NextSample(v)
            | SpeedReading::IntervalAverage(v) => {
                Some(v)
            }
            SpeedReading::Unavailable => None,
        }
    }
}

impl fmt::Display for SpeedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.knots() {
            Some(v) => write!(f, "{:.1} kn", v),
            None => f.write_str(NOT_AVAILABLE),
        }
    }
}

/// Regular hover content: the point, then the interval it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardPayload {
    /// Query position rounded to 6 decimals
    pub position: GpsPoint,
    /// Interpolated time at the query position
    pub time: Option<DateTime<FixedOffset>>,
    pub speed: SpeedReading,
    pub interval_number: u32,
    pub journey_index: u32,
    pub avg_speed: Option<f64>,
    pub nav_status: String,
    /// 0-100
    pub progress_pct: f64,
    pub classification: Option<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub duration: Option<Duration>,
}

/// Hover content at the end of a complete journey.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyEndPayload {
    pub journey_index: u32,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub speed: SpeedReading,
}

/// Content of the interpolated info panel.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayPayload {
    Standard(StandardPayload),
    JourneyEnd(JourneyEndPayload),
}

impl DisplayPayload {
    pub fn journey_index(&self) -> u32 {
        match self {
            DisplayPayload::Standard(p) => p.journey_index,
            DisplayPayload::JourneyEnd(p) => p.journey_index,
        }
    }

    pub fn is_journey_end(&self) -> bool {
        matches!(self, DisplayPayload::JourneyEnd(_))
    }
}

/// Static tooltip bound to a journey-end marker.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSummary {
    pub journey_index: u32,
    pub end_time: Option<DateTime<FixedOffset>>,
}

impl TerminalSummary {
    pub fn for_path(path: &RenderedPath, config: &ViewerConfig) -> Self {
        Self {
            journey_index: path.interval.journey_index,
            end_time: to_display(path.interval.end_time, config),
        }
    }
}

/// Build the panel content for `query` on `path`.
///
/// Progress is the position of the projected query along the sample sequence, as a
/// percentage of the way from the first sample to the last. Time is interpolated linearly
/// between the interval bounds by that progress. Speed comes from the nearest sample,
/// falling back to the next sample, then the interval average.
///
/// On the terminal interval of a complete journey, a query at the last sample or past the
/// completion threshold yields [`DisplayPayload::JourneyEnd`].
pub fn synthesize<S>(
    path: &RenderedPath,
    query: &GpsPoint,
    surface: &S,
    config: &ViewerConfig,
) -> DisplayPayload
where
    S: MapSurface + ?Sized,
{
    let distance = |a: &GpsPoint, b: &GpsPoint| surface.distance(a, b);
    let points = &path.points;
    let n = points.len();

    let nearest = nearest_vertex(query, points, distance).map_or(0, |hit| hit.index);

    // Fractional sample position of the query: segment start + projection parameter
    let position = match nearest_point_on_polyline(query, points, distance) {
        Some(hit) => hit.segment_index as f64 + hit.t,
        None => nearest as f64,
    };

    let progress_pct = if n > 1 {
        (position / (n - 1) as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let speed = resolve_speed(path, nearest);
    let interval = &path.interval;

    // Projected position, not the nearest vertex: on short paths the nearest vertex is the
    // last one long before the query gets there
    let at_last_sample = n > 0 && position >= (n - 1) as f64;
    let past_completion = progress_pct >= config.proximity.completion_progress_pct;
    if path.terminal && (at_last_sample || past_completion) {
        return DisplayPayload::JourneyEnd(JourneyEndPayload {
            journey_index: interval.journey_index,
            end_time: to_display(interval.end_time, config),
            speed,
        });
    }

    DisplayPayload::Standard(StandardPayload {
        position: query.rounded(6),
        time: interpolate_time(interval.start_time, interval.end_time, progress_pct)
            .map(|t| t.with_timezone(&config.utc_offset)),
        speed,
        interval_number: interval.interval_number,
        journey_index: interval.journey_index,
        avg_speed: interval.avg_speed,
        nav_status: interval.nav_status.clone(),
        progress_pct,
        classification: interval.classification_type.clone(),
        start_time: to_display(interval.start_time, config),
        end_time: to_display(interval.end_time, config),
        duration: interval.duration(),
    })
}

fn resolve_speed(path: &RenderedPath, index: usize) -> SpeedReading {
    let samples = &path.samples;
    if let Some(v) = samples.get(index).and_then(|s| s.speed) {
        return SpeedReading::Sample(v);
    }
    let next = (index + 1).min(samples.len().saturating_sub(1));
    if let Some(v) = samples.get(next).and_then(|s| s.speed) {
        return SpeedReading::NextSample(v);
    }
    match path.interval.avg_speed {
        Some(v) => SpeedReading::IntervalAverage(v),
        None => SpeedReading::Unavailable,
    }
}

fn interpolate_time(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    progress_pct: f64,
) -> Option<DateTime<Utc>> {
    let (start, end) = (start?, end?);
    let span_ms = (end - start).num_milliseconds() as f64;
    let offset_ms = (span_ms * progress_pct / 100.0).round() as i64;
    Some(start + Duration::milliseconds(offset_ms))
}

fn to_display(time: Option<DateTime<Utc>>, config: &ViewerConfig) -> Option<DateTime<FixedOffset>> {
    time.map(|t| t.with_timezone(&config.utc_offset))
}

// ============================================================================
// Text rendering
// ============================================================================

/// Format a duration as hours and minutes, dropping seconds and a zero hour component.
///
/// ```
/// use chrono::Duration;
/// use trajectory_viewer::format_duration;
///
/// assert_eq!(format_duration(Duration::seconds(3926)), "1h 5m");
/// assert_eq!(format_duration(Duration::seconds(326)), "5m");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    let (h, m) = (minutes / 60, minutes % 60);
    if h == 0 {
        format!("{}m", m)
    } else {
        format!("{}h {}m", h, m)
    }
}

fn clock(time: &Option<DateTime<FixedOffset>>) -> String {
    match time {
        Some(t) => t.format("%H:%Mh").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn date(time: &Option<DateTime<FixedOffset>>) -> String {
    match time {
        Some(t) => t.format("%d/%m/%y").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

impl fmt::Display for DisplayPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayPayload::Standard(p) => {
                writeln!(
                    f,
                    "POSITION ({:.6}, {:.6})",
                    p.position.latitude, p.position.longitude
                )?;
                writeln!(f, "Time: {} - {}", clock(&p.time), date(&p.time))?;
                writeln!(f, "Speed: {}", p.speed)?;
                writeln!(f, "INTERVAL {} - JOURNEY {}", p.interval_number, p.journey_index)?;
                let avg = match p.avg_speed {
                    Some(v) => format!("{:.1} kn", v),
                    None => NOT_AVAILABLE.to_string(),
                };
                writeln!(f, "Avg speed: {}  Status: {}", avg, p.nav_status)?;
                writeln!(f, "Progress: {:.0}%", p.progress_pct)?;
                writeln!(
                    f,
                    "Activity: {}",
                    p.classification.as_deref().unwrap_or(NOT_AVAILABLE)
                )?;
                let duration = p
                    .duration
                    .map(format_duration)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                write!(
                    f,
                    "Duration: {} ({} → {})",
                    duration,
                    clock(&p.start_time),
                    clock(&p.end_time)
                )
            }
            DisplayPayload::JourneyEnd(p) => {
                writeln!(f, "JOURNEY END {}", p.journey_index)?;
                writeln!(f, "Time: {} - {}", clock(&p.end_time), date(&p.end_time))?;
                write!(f, "Speed: {}", p.speed)
            }
        }
    }
}

impl fmt::Display for TerminalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "JOURNEY END {}", self.journey_index)?;
        write!(
            f,
            "End time: {} - {}",
            clock(&self.end_time),
            date(&self.end_time)
        )
    }
}
