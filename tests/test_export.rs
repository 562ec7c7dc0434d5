mod common;
use common::{load_tensors, multi_class_preds, per_channel_preds, sine_recording, FS, N_CH};
use eegview::annotation::{Annotation, Annotations};
use eegview::config::FilterState;
use eegview::edf::{plan_export, EdfHeader};
use eegview::filter::{FilterProgress, NoProgress};
use eegview::predict::PredictionStore;

fn filter_on() -> FilterState {
    FilterState { enabled: true, ..FilterState::default() }
}

#[test]
fn unfiltered_export_copies_channels() {
    let rec = sine_recording(3, FS, 10);
    let plan = plan_export(&rec, &FilterState::default(), &PredictionStore::new(), EdfHeader::default(), &mut NoProgress)
        .unwrap()
        .unwrap();
    assert_eq!(plan.signals.len(), 3);
    for (sig, row) in plan.signals.iter().zip(rec.data().rows()) {
        assert_eq!(sig.sample_rate, FS as f64);
        assert_eq!(sig.samples, row.to_vec());
        assert!(sig.physical_min < sig.physical_max);
    }
    assert!(plan.annotations.is_empty());
}

#[test]
fn filtered_export_writes_history_once() {
    let rec = sine_recording(2, FS, 10)
        .with_annotations(Annotations::from(vec![Annotation::new(4.0, 1.0, "spike")]));
    let plan = plan_export(&rec, &filter_on(), &PredictionStore::new(), EdfHeader::default(), &mut NoProgress)
        .unwrap()
        .unwrap();
    let texts: Vec<&str> = plan.annotations.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(texts, vec!["filtered", "LP: 30Hz", "HP: 2Hz", "N: 0Hz", "BP: 0-0Hz", "spike"]);
    assert!(plan.annotations[..5].iter().all(|a| a.onset == 0.0 && a.is_instant()));
    assert_ne!(plan.signals[0].samples, rec.data().row(0).to_vec());

    // Re-exporting the exported annotations does not stack histories.
    let again = rec.clone().with_annotations(Annotations::from(plan.annotations.clone()));
    let plan2 = plan_export(&again, &filter_on(), &PredictionStore::new(), EdfHeader::default(), &mut NoProgress)
        .unwrap()
        .unwrap();
    assert_eq!(plan2.annotations, plan.annotations);
}

#[test]
fn binary_per_channel_predictions_become_signals() {
    let rec = sine_recording(N_CH, FS, 20);
    let mut store = PredictionStore::new();
    store.set_predictions(per_channel_preds(), 20, FS, N_CH, true).unwrap();
    let plan = plan_export(&rec, &FilterState::default(), &store, EdfHeader::default(), &mut NoProgress)
        .unwrap()
        .unwrap();

    assert_eq!(plan.signals.len(), 2 * N_CH);
    let preds = &plan.signals[N_CH..];
    assert_eq!(preds[0].label, "PREDICTIONS_0");
    assert_eq!(preds[17].label, "PREDICTIONS_17");
    // Ten bins over 20 s: 0.5 Hz.
    assert!(preds.iter().all(|p| p.sample_rate == 0.5 && p.samples.len() == 10));
    assert!(preds.iter().all(|p| (p.physical_min, p.physical_max) == (0.0, 1.0)));
    // Stored order, not display order.
    assert_eq!(preds[2].samples[1], 0.9);
    assert_eq!(preds[3].samples[2], 0.8);
}

#[test]
fn multi_class_predictions_export_argmax() {
    let rec = sine_recording(2, FS, 10);
    let mut store = PredictionStore::new();
    store.set_predictions(multi_class_preds(), 10, FS, 2, false).unwrap();
    let plan = plan_export(&rec, &FilterState::default(), &store, EdfHeader::default(), &mut NoProgress)
        .unwrap()
        .unwrap();
    let p = plan.signals.last().unwrap();
    assert_eq!(p.label, "PREDICTIONS");
    assert_eq!(p.samples, vec![0.0, 2.0, 2.0, 4.0, 0.0]);
    assert_eq!((p.physical_min, p.physical_max), (0.0, 4.0));
}

struct CancelImmediately;

impl FilterProgress for CancelImmediately {
    fn advance(&mut self, _done: usize, _total: usize) {}
    fn is_canceled(&self) -> bool {
        true
    }
}

#[test]
fn canceled_filter_aborts_export() {
    let rec = sine_recording(2, FS, 10);
    let plan = plan_export(&rec, &filter_on(), &PredictionStore::new(), EdfHeader::default(), &mut CancelImmediately)
        .unwrap();
    assert!(plan.is_none());
}

#[test]
fn export_bundle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.safetensors");
    let rec = sine_recording(2, FS, 10);
    let header = EdfHeader::new("P7 F X Doe", "Startdate X X tech eq", "03.04.05", "06.07.08");
    let plan = plan_export(&rec, &filter_on(), &PredictionStore::new(), header, &mut NoProgress)
        .unwrap()
        .unwrap();
    eegview::io::write_export(&plan, &path).unwrap();

    let (tensors, meta) = load_tensors(&path);
    assert_eq!(tensors.len(), 2);
    assert_eq!(tensors["signal_1"].as_slice().unwrap(), plan.signals[1].samples.as_slice());

    let stored: serde_json::Value = serde_json::from_str(meta["plan"].as_str().unwrap()).unwrap();
    assert_eq!(stored["signals"][0]["label"], "CH0");
    assert_eq!(stored["annotations"][0]["text"], "filtered");
    assert!(stored["header"]["patient_id"].as_str().unwrap().starts_with("P7 F X Doe"));
}
