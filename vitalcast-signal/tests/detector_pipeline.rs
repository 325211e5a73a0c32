use std::time::Duration;
use vitalcast_signal::{DetectorConfig, EcgConfig, EcgSimulator, HeartRateDetector};

/// Run `seconds` of simulated ECG through a fresh detector and collect rates
fn detected_rates(heart_rate_bpm: f64, seconds: u32) -> Vec<u32> {
    let config = EcgConfig {
        heart_rate_bpm,
        ..Default::default()
    };
    let period = Duration::from_secs_f64(1.0 / config.sample_rate_hz);
    let total = (config.sample_rate_hz as u32) * seconds;

    let mut sim = EcgSimulator::new(config).unwrap();
    let mut hr = HeartRateDetector::new(DetectorConfig::default()).unwrap();

    (0..total)
        .filter_map(|n| hr.process(sim.next_sample(), period * n))
        .map(|event| event.bpm)
        .collect()
}

#[test]
fn test_detects_simulated_rates() {
    for target in [60.0, 72.0, 90.0, 120.0] {
        let rates = detected_rates(target, 20);

        // One event per beat after the first, give or take one at the edges
        let expected_beats = (target / 60.0 * 20.0) as usize;
        assert!(
            rates.len() + 2 >= expected_beats && rates.len() <= expected_beats,
            "target {}: got {} events, expected about {}",
            target,
            rates.len(),
            expected_beats
        );

        for bpm in &rates {
            let diff = (*bpm as f64 - target).abs();
            assert!(diff <= 2.0, "target {}: detected {}", target, bpm);
        }
    }
}

#[test]
fn test_refractory_suppresses_fast_rhythm() {
    // 400 bpm would put peaks 150ms apart, inside the 200ms refractory window,
    // so at most every second beat can register
    let rates = detected_rates(400.0, 5);
    assert!(rates.iter().all(|&bpm| bpm < 300), "rates: {:?}", rates);
}

#[test]
fn test_flat_signal_never_emits() {
    let mut hr = HeartRateDetector::new(DetectorConfig::default()).unwrap();
    for n in 0..5000u32 {
        assert!(hr.process(0.1, Duration::from_millis(n as u64 * 4)).is_none());
    }
    assert_eq!(hr.last_peak(), None);
}
