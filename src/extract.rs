//! Trajectory extraction: from a journey collection and a selection to the flat list of
//! intervals that will be drawn.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::model::{Interval, Journey, TrackSample};

/// Selected journey indices. Iteration order (ascending) is the rendering order.
pub type Selection = BTreeSet<u32>;

/// An interval that survived extraction, with its usable samples.
#[derive(Debug, Clone)]
pub struct ExtractedInterval<'a> {
    pub interval: &'a Interval,
    /// At least 2 samples
    pub samples: Vec<TrackSample>,
    /// Last rendered interval of a complete journey
    pub terminal: bool,
}

/// Flatten the selected journeys into renderable intervals.
///
/// Intervals are grouped by the journey index they carry, wherever they are filed, in
/// selection order and then collection order. Intervals with fewer than 2 usable points are
/// dropped. The last surviving interval of each journey is flagged terminal unless the
/// journey is marked incomplete; completeness is read from the first journey carrying the
/// index, and an index with no journey entry counts as complete.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use trajectory_viewer::{extract, CoordinatePoint, Interval, Journey};
///
/// let mut a = Interval::new(1, 1);
/// a.coordinate_points = vec![
///     CoordinatePoint::new(36.0, -5.4),
///     CoordinatePoint::new(36.01, -5.41),
/// ];
/// let mut b = Interval::new(1, 2);
/// b.coordinate_points = vec![CoordinatePoint::new(36.01, -5.41)]; // too short
///
/// let journeys = vec![Journey::new(1, vec![a, b])];
/// let extracted = extract(&journeys, &BTreeSet::from([1]));
///
/// assert_eq!(extracted.len(), 1);
/// assert!(extracted[0].terminal);
/// ```
pub fn extract<'a>(journeys: &'a [Journey], selection: &Selection) -> Vec<ExtractedInterval<'a>> {
    let mut extracted = Vec::new();

    for &journey_index in selection {
        let mut entries = journeys.iter().filter(|j| j.journey_index == journey_index);
        let entry = entries.next();
        if entries.next().is_some() {
            warn!(
                "[Extract] duplicate journey index {}, metadata of the first entry applies",
                journey_index
            );
        }

        let first = extracted.len();
        for journey in journeys {
            for interval in &journey.intervals {
                if interval.journey_index != journey_index {
                    continue;
                }
                if journey.journey_index != journey_index {
                    debug!(
                        "[Extract] interval {} of journey {} is filed under journey {}",
                        interval.interval_number, journey_index, journey.journey_index
                    );
                }
                let samples = interval.usable_samples();
                if samples.len() < 2 {
                    continue;
                }
                extracted.push(ExtractedInterval {
                    interval,
                    samples,
                    terminal: false,
                });
            }
        }

        if first == extracted.len() {
            debug!("[Extract] nothing drawable for journey {}", journey_index);
            continue;
        }
        let complete = entry.map_or(true, |j| !j.metadata.is_incomplete);
        if complete {
            if let Some(last) = extracted[first..].last_mut() {
                last.terminal = true;
            }
        }
    }

    debug!(
        "[Extract] {} intervals from {} selected journeys",
        extracted.len(),
        selection.len()
    );
    extracted
}
