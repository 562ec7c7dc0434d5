//! Annotations: onset-ordered storage, window lookup, label placement.
//!
//! `check_annotations` returns the annotations whose whole-second onset lies
//! in the window plus an adjacency bitmap. The renderer uses the bitmap to
//! stagger labels of neighbouring seconds so their text does not overlap.
use serde::{Deserialize, Serialize};

/// Duration value meaning "instantaneous / unbounded".
pub const INSTANT: f64 = -1.0;

/// One `(onset, duration, text)` annotation. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub onset: f64,
    pub duration: f64,
    pub text: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, text: impl Into<String>) -> Self {
        Self { onset, duration, text: text.into() }
    }

    /// Instantaneous annotation (`duration == -1`).
    pub fn instant(onset: f64, text: impl Into<String>) -> Self {
        Self::new(onset, INSTANT, text)
    }

    /// Onset truncated to whole seconds.
    #[inline]
    pub fn second(&self) -> i64 {
        self.onset.trunc() as i64
    }

    #[inline]
    pub fn is_instant(&self) -> bool {
        self.duration == INSTANT
    }
}

/// Rejected annotation edit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnnotationError {
    #[error("annotation text must not be empty")]
    EmptyText,
    #[error("annotation onset {onset} s is outside the recording (0..={max_time} s)")]
    OnsetOutOfRange { onset: f64, max_time: usize },
    #[error("annotation duration {duration} s must be -1 or between 0 and {max} s")]
    DurationOutOfRange { duration: f64, max: f64 },
    #[error("no annotation at index {index} ({len} annotations)")]
    NoSuchIndex { index: usize, len: usize },
}

/// Annotations kept sorted by onset.
///
/// Entries with equal onsets keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Annotation>", into = "Vec<Annotation>")]
pub struct Annotations {
    items: Vec<Annotation>,
}

impl From<Vec<Annotation>> for Annotations {
    fn from(mut items: Vec<Annotation>) -> Self {
        items.sort_by(|a, b| a.onset.total_cmp(&b.onset));
        Self { items }
    }
}

impl From<Annotations> for Vec<Annotation> {
    fn from(a: Annotations) -> Self {
        a.items
    }
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert after every entry whose onset is `<=` the new onset.
    ///
    /// Returns the index the annotation landed at.
    pub fn insert(&mut self, ann: Annotation, max_time: usize) -> Result<usize, AnnotationError> {
        validate(&ann, max_time)?;
        let idx = self.items.partition_point(|a| a.onset <= ann.onset);
        self.items.insert(idx, ann);
        Ok(idx)
    }

    /// Replace the annotation at `index`, then restore onset order.
    pub fn update(
        &mut self,
        index: usize,
        ann: Annotation,
        max_time: usize,
    ) -> Result<(), AnnotationError> {
        let len = self.items.len();
        if index >= len {
            return Err(AnnotationError::NoSuchIndex { index, len });
        }
        validate(&ann, max_time)?;
        self.items[index] = ann;
        self.items.sort_by(|a, b| a.onset.total_cmp(&b.onset));
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Annotation, AnnotationError> {
        let len = self.items.len();
        if index >= len {
            return Err(AnnotationError::NoSuchIndex { index, len });
        }
        Ok(self.items.remove(index))
    }

    /// Prepend entries at the front regardless of onset order checks.
    ///
    /// Used for the onset-0 filter history, which always sorts first.
    pub(crate) fn prepend(&mut self, front: Vec<Annotation>) {
        let rest = std::mem::take(&mut self.items);
        self.items = front;
        self.items.extend(rest);
    }

    pub(crate) fn drain_front(&mut self, n: usize) {
        let n = n.min(self.items.len());
        self.items.drain(..n);
    }
}

fn validate(ann: &Annotation, max_time: usize) -> Result<(), AnnotationError> {
    if ann.text.is_empty() {
        return Err(AnnotationError::EmptyText);
    }
    if !(0.0..=max_time as f64).contains(&ann.onset) {
        return Err(AnnotationError::OnsetOutOfRange { onset: ann.onset, max_time });
    }
    let max = max_time as f64 - ann.onset;
    if !ann.is_instant() && !(0.0..=max).contains(&ann.duration) {
        return Err(AnnotationError::DurationOutOfRange { duration: ann.duration, max });
    }
    Ok(())
}

/// Annotations inside a window plus the label-stacking bitmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationWindow {
    pub overlapping: Vec<Annotation>,
    /// One entry per second of the window.
    pub adjacency: Vec<bool>,
}

/// Collect the annotations whose whole-second onset lies in
/// `[window_start, window_start + window_size - 1]`.
///
/// `annotations` must be sorted by onset.
///
/// The bitmap is smoothed in place, left to right:
/// * bit 0 survives only if bits 0 and 1 are both set;
/// * an interior bit survives only if it is set and bit `i-1` (as already
///   smoothed) or bit `i+1` is set;
/// * the last bit is cleared when bit `ws-2` is clear.
pub fn check_annotations(
    window_start: usize,
    window_size: usize,
    annotations: &[Annotation],
) -> AnnotationWindow {
    let t_start = window_start as i64;
    let t_end = t_start + window_size as i64 - 1;
    let mut overlapping = Vec::new();
    let mut adjacency = vec![false; window_size];

    for ann in annotations.iter().take_while(|a| a.second() <= t_end) {
        let sec = ann.second();
        if sec >= t_start {
            overlapping.push(ann.clone());
            adjacency[(sec - t_start) as usize] = true;
        }
    }

    if window_size > 1 {
        if !(adjacency[0] && adjacency[1]) {
            adjacency[0] = false;
        }
        for i in 1..window_size - 1 {
            if !((adjacency[i - 1] || adjacency[i + 1]) && adjacency[i]) {
                adjacency[i] = false;
            }
        }
        if !adjacency[window_size - 2] && adjacency[window_size - 1] {
            adjacency[window_size - 1] = false;
        }
    }

    AnnotationWindow { overlapping, adjacency }
}

/// A positioned annotation label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationLabel {
    /// Absolute whole-second onset shared by every line of `text`.
    pub second: usize,
    /// Sample offset from the window start.
    pub x: usize,
    /// Vertical anchor below the lowest trace.
    pub y: f64,
    /// Newline-joined texts of all annotations at `second`.
    pub text: String,
}

/// Merge annotations that share a second and place their labels.
///
/// Labels sit at `-y_lim`; a label whose second is odd and flagged in the
/// adjacency bitmap is raised to `-1.5 * y_lim` so neighbours don't collide.
pub fn label_positions(
    window: &AnnotationWindow,
    window_start: usize,
    fs: usize,
    y_lim: f64,
) -> Vec<AnnotationLabel> {
    let mut labels: Vec<AnnotationLabel> = Vec::new();
    for ann in &window.overlapping {
        let second = ann.second() as usize;
        match labels.last_mut() {
            Some(last) if last.second == second => {
                last.text.push('\n');
                last.text.push_str(&ann.text);
            }
            _ => {
                let offset = second - window_start;
                let raised = window.adjacency[offset] && second % 2 == 1;
                labels.push(AnnotationLabel {
                    second,
                    x: offset * fs,
                    y: if raised { -1.5 * y_lim } else { -y_lim },
                    text: ann.text.clone(),
                });
            }
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: &[f64]) -> Vec<Annotation> {
        secs.iter().map(|&s| Annotation::instant(s, format!("a{s}"))).collect()
    }

    #[test]
    fn isolated_last_second_is_cleared() {
        let anns = at(&[2.0, 3.0, 9.0]);
        let w = check_annotations(0, 10, &anns);
        assert_eq!(w.overlapping.len(), 3);
        let set: Vec<usize> = (0..10).filter(|&i| w.adjacency[i]).collect();
        assert_eq!(set, vec![2, 3]);
    }

    #[test]
    fn first_bit_needs_neighbour() {
        let w = check_annotations(0, 10, &at(&[0.0, 1.0]));
        assert!(w.adjacency[0] && w.adjacency[1]);

        let w = check_annotations(0, 10, &at(&[0.0]));
        assert!(!w.adjacency[0]);
    }

    #[test]
    fn last_bit_kept_with_neighbour() {
        let w = check_annotations(0, 10, &at(&[8.0, 9.0]));
        assert!(w.adjacency[8] && w.adjacency[9]);
    }

    #[test]
    fn outside_window_skipped() {
        let w = check_annotations(5, 5, &at(&[1.0, 4.9, 5.5, 9.99, 10.0]));
        let texts: Vec<&str> = w.overlapping.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["a5.5", "a9.99"]);
    }

    #[test]
    fn single_second_window_not_smoothed() {
        let w = check_annotations(3, 1, &at(&[3.2]));
        assert_eq!(w.adjacency, vec![true]);
    }

    #[test]
    fn insert_keeps_order_and_rejects_out_of_bounds() {
        let mut anns = Annotations::from(at(&[1.0, 5.0]));
        let idx = anns.insert(Annotation::new(3.0, 2.0, "x"), 10).unwrap();
        assert_eq!(idx, 1);
        let idx = anns.insert(Annotation::instant(5.0, "y"), 10).unwrap();
        assert_eq!(idx, 3, "equal onsets insert after existing");

        assert_eq!(
            anns.insert(Annotation::instant(11.0, "late"), 10),
            Err(AnnotationError::OnsetOutOfRange { onset: 11.0, max_time: 10 })
        );
        assert!(matches!(
            anns.insert(Annotation::new(8.0, 3.0, "long"), 10),
            Err(AnnotationError::DurationOutOfRange { .. })
        ));
        assert_eq!(anns.insert(Annotation::instant(1.0, ""), 10), Err(AnnotationError::EmptyText));
        assert_eq!(
            AnnotationError::NoSuchIndex { index: 7, len: 3 }.to_string(),
            "no annotation at index 7 (3 annotations)"
        );
    }

    #[test]
    fn update_resorts() {
        let mut anns = Annotations::from(at(&[1.0, 2.0, 3.0]));
        anns.update(0, Annotation::instant(9.0, "moved"), 10).unwrap();
        let onsets: Vec<f64> = anns.iter().map(|a| a.onset).collect();
        assert_eq!(onsets, vec![2.0, 3.0, 9.0]);
        assert!(anns.remove(7).is_err());
    }

    #[test]
    fn labels_merge_same_second_and_stagger() {
        let anns = vec![
            Annotation::instant(3.1, "a"),
            Annotation::instant(3.7, "b"),
            Annotation::instant(4.0, "c"),
        ];
        let w = check_annotations(0, 10, &anns);
        let labels = label_positions(&w, 0, 256, 100.0);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].text, "a\nb");
        assert_eq!(labels[0].x, 3 * 256);
        assert_eq!(labels[0].y, -150.0);
        assert_eq!(labels[1].y, -100.0);
    }
}
