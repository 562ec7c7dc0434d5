mod common;
use common::{session, sine_recording};
use eegview::annotation::{check_annotations, label_positions, Annotation, AnnotationError, Annotations};

fn at(secs: &[f64]) -> Vec<Annotation> {
    secs.iter().map(|&s| Annotation::instant(s, format!("t{s}"))).collect()
}

// ── Adjacency bitmap ──────────────────────────────────────────────────────────

#[test]
fn leading_bit_needs_its_neighbour() {
    // Only the first two seconds carry annotations.
    let w = check_annotations(0, 10, &at(&[0.0, 1.5]));
    assert!(w.adjacency[0]);
    assert!(w.adjacency[1]);
    assert!(w.adjacency[2..].iter().all(|&b| !b));

    // Second 0 alone: bit 0 cleared because bit 1 is clear.
    let w = check_annotations(0, 10, &at(&[0.3]));
    assert!(w.adjacency.iter().all(|&b| !b));
}

#[test]
fn isolated_final_second_cleared() {
    let w = check_annotations(20, 5, &at(&[24.0]));
    assert_eq!(w.overlapping.len(), 1);
    assert!(!w.adjacency[4]);
}

#[test]
fn two_second_window_edges() {
    let w = check_annotations(0, 2, &at(&[1.0]));
    assert_eq!(w.adjacency, vec![false, false]);
    let w = check_annotations(0, 2, &at(&[0.0, 1.0]));
    assert_eq!(w.adjacency, vec![true, true]);
}

// ── Labels ────────────────────────────────────────────────────────────────────

#[test]
fn same_second_labels_merge_and_odd_neighbours_raise() {
    let anns = at(&[2.1, 2.7, 3.0, 7.0]);
    let w = check_annotations(0, 10, &anns);
    let labels = label_positions(&w, 0, 256, 100.0);
    assert_eq!(labels.len(), 3);

    assert_eq!(labels[0].second, 2);
    assert_eq!(labels[0].text, "t2.1\nt2.7");
    assert_eq!(labels[0].x, 512);
    assert_eq!(labels[0].y, -100.0);

    // Second 3 is odd and adjacent to 2: raised.
    assert_eq!(labels[1].y, -150.0);
    // Second 7 is odd but isolated.
    assert_eq!(labels[2].y, -100.0);
}

// ── Editing ───────────────────────────────────────────────────────────────────

#[test]
fn session_edits_validate_against_duration() {
    let mut s = session(sine_recording(2, 64, 30));
    assert_eq!(s.add_annotation(Annotation::new(10.0, 5.0, "spike")).unwrap(), 0);
    assert_eq!(s.add_annotation(Annotation::instant(2.0, "eyes")).unwrap(), 0);

    assert_eq!(
        s.add_annotation(Annotation::instant(31.0, "late")).unwrap_err(),
        AnnotationError::OnsetOutOfRange { onset: 31.0, max_time: 30 }
    );
    assert!(matches!(
        s.add_annotation(Annotation::new(25.0, 6.0, "long")),
        Err(AnnotationError::DurationOutOfRange { .. })
    ));
    assert_eq!(s.add_annotation(Annotation::instant(1.0, "")).unwrap_err(), AnnotationError::EmptyText);

    s.update_annotation(0, Annotation::instant(20.0, "eyes")).unwrap();
    let texts: Vec<&str> = s.recording().annotations().iter().map(|a| a.text.as_str()).collect();
    assert_eq!(texts, vec!["spike", "eyes"]);

    assert_eq!(s.remove_annotation(0).unwrap().text, "spike");
    assert!(matches!(s.remove_annotation(5), Err(AnnotationError::NoSuchIndex { index: 5, len: 1 })));
}

#[test]
fn jump_to_annotation_uses_whole_second() {
    let rec = sine_recording(2, 64, 60).with_annotations(Annotations::from(at(&[12.7, 58.0])));
    let mut s = session(rec);
    assert_eq!(s.jump_to_annotation(0).unwrap().count, 12);
    // Clamped so the 10 s window still fits.
    assert_eq!(s.jump_to_annotation(1).unwrap().count, 50);
    assert!(s.jump_to_annotation(2).is_err());
}

#[test]
fn sidecar_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ann.json");
    let anns = Annotations::from(vec![Annotation::new(4.0, 1.5, "b"), Annotation::instant(1.0, "a")]);
    eegview::io::save_annotations(&anns, &path).unwrap();
    let back = eegview::io::load_annotations(&path).unwrap();
    assert_eq!(back, anns);
    assert_eq!(back.as_slice()[0].text, "a");
}
