use eegview::stats::{get_power, get_stats, FrequencyBands};
use eegview::{Recording, Session, ViewerConfig};
use ndarray::Array2;
use std::f32::consts::PI;

const FS: usize = 256;

fn tone(freq: f32, amp: f32, n: usize) -> Vec<f32> {
    (0..n).map(|t| amp * (2.0 * PI * freq * t as f32 / FS as f32).sin()).collect()
}

fn power_of(p: &[eegview::BandPower], band: &str) -> f64 {
    p.iter().find(|b| b.band == band).map(|b| b.power).unwrap()
}

#[test]
fn alpha_tone_dominates_alpha_band() {
    let x = tone(10.0, 1.0, 2 * FS);
    let p = get_power(&x, 0, x.len(), 0.0, 0.0, FS as f64, &FrequencyBands::default()).unwrap();
    let names: Vec<&str> = p.iter().map(|b| b.band.as_str()).collect();
    assert_eq!(names, vec!["delta", "theta", "alpha", "beta", "gamma"]);

    let alpha = power_of(&p, "alpha");
    for other in ["delta", "theta", "beta", "gamma"] {
        assert!(alpha > 1e3 * power_of(&p, other), "{other} rivals alpha");
    }
}

#[test]
fn filter_edges_narrow_or_drop_bands() {
    let x = tone(10.0, 1.0, 2 * FS);
    let bands = FrequencyBands::default();
    // Low-pass at 8 Hz removes alpha entirely.
    let p = get_power(&x, 0, x.len(), 0.0, 8.0, FS as f64, &bands).unwrap();
    assert_eq!(power_of(&p, "alpha"), 0.0);
    assert_eq!(power_of(&p, "gamma"), 0.0);
    // High-pass at 12 Hz keeps only 12–14 Hz of alpha, away from the tone.
    let p = get_power(&x, 0, x.len(), 12.0, 0.0, FS as f64, &bands).unwrap();
    assert_eq!(power_of(&p, "delta"), 0.0);
    let full = get_power(&x, 0, x.len(), 0.0, 0.0, FS as f64, &bands).unwrap();
    assert!(power_of(&p, "alpha") < 1e-2 * power_of(&full, "alpha"));
}

#[test]
fn band_without_bins_is_zero() {
    // Four samples at 256 Hz: bins at 0, 64, 128 Hz.
    let x = [1.0_f32, -1.0, 1.0, -1.0];
    let p = get_power(&x, 0, 4, 0.0, 0.0, FS as f64, &FrequencyBands::default()).unwrap();
    assert!(p.iter().all(|b| b.power == 0.0));
    assert!(get_power(&x, 2, 5, 0.0, 0.0, FS as f64, &FrequencyBands::default()).is_err());
}

#[test]
fn stats_over_sub_range() {
    let x: Vec<f32> = (0..10).map(|v| v as f32).collect();
    let s = get_stats(&x, 2, 6).unwrap();
    approx::assert_abs_diff_eq!(s.mean, 3.5, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(s.var, 1.25, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(s.line_length, 6.0_f64.sqrt(), epsilon = 1e-12);
    assert!(get_stats(&x, 4, 4).is_err());
    assert!(get_stats(&x, 4, 11).is_err());
}

#[test]
fn session_stats_follow_filter_state() {
    let n = 12 * FS;
    let row: Vec<f32> = tone(10.0, 10.0, n).iter().map(|v| v + 40.0).collect();
    let data = Array2::from_shape_vec((1, n), row).unwrap();
    let rec = Recording::new(data, FS, vec!["Cz".into()]).unwrap();

    let raw_cfg = ViewerConfig::default();
    let s = Session::new(rec.clone(), &raw_cfg).unwrap();
    let raw = s.get_stats(0, FS, 11 * FS).unwrap();
    approx::assert_abs_diff_eq!(raw.mean, 40.0, epsilon = 0.1);

    // High-pass on: the DC offset is gone.
    let filt_cfg = ViewerConfig { filter: [1.0, 30.0, 2.0, 0.0, 0.0, 0.0], ..ViewerConfig::default() };
    let s = Session::new(rec, &filt_cfg).unwrap();
    assert!(s.filter().enabled && s.filter().do_hp && !s.filter().do_notch);
    let filt = s.get_stats(0, FS, 11 * FS).unwrap();
    assert!(filt.mean.abs() < 0.5, "mean {}", filt.mean);
    approx::assert_abs_diff_eq!(filt.var, raw.var, epsilon = 1.0);

    // Power is taken on the raw signal; bands above the 30 Hz low-pass drop.
    let p = s.get_power(0, 0, 2 * FS).unwrap();
    assert_eq!(power_of(&p, "gamma"), 0.0);
    assert!(power_of(&p, "alpha") > 0.0);
    assert!(s.get_stats(1, 0, 10).is_err());
}
