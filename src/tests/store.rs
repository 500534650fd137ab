//! Composite store scenarios
use crate::prelude::*;
use crate::tests::toolkit::{
    bias_model, clock_sample, day_records, day_store, g01, gps_header, instant,
    lagrange_reference, position_model, position_sample, FailingSource, VecSource,
};

#[test]
fn stored_instants_are_reproduced() {
    let store = day_store();
    for dt in [0.0, 900.0, 43_200.0, 84_600.0, 85_500.0] {
        let xvt = store.xvt(g01(), instant(dt)).unwrap();
        let expected = position_model(dt);
        assert!((xvt.position.0 - expected.0).abs() < 1.0E-6);
        assert!((xvt.position.1 - expected.1).abs() < 1.0E-6);
        assert!((xvt.position.2 - expected.2).abs() < 1.0E-6);
        assert!((xvt.clock_bias - bias_model(dt)).abs() < 1.0E-15);
        assert_eq!(xvt.health, Health::Unused);
    }
}

#[test]
fn midway_query_matches_reference_lagrange() {
    let store = day_store();
    // midway between the 11:45:00 and 12:00:00 samples
    let target = 42_750.0;
    let position = store.position(g01(), instant(target)).unwrap();

    // ten nodes the order-10 window selects: five below, five at or after
    let nodes_x: Vec<(f64, f64)> = (43..53)
        .map(|i| {
            let dt = i as f64 * 900.0;
            (dt, position_model(dt).0)
        })
        .collect();
    let reference = lagrange_reference(&nodes_x, target);
    assert!((position.0 - reference).abs() < 1.0E-3);

    // order 10 is not a straight line between the brackets
    let midpoint = 0.5 * (position_model(42_300.0).0 + position_model(43_200.0).0);
    assert!((position.0 - midpoint).abs() > 1.0);
}

#[test]
fn queries_beyond_the_table_fail_out_of_range() {
    let store = day_store();
    // 23:50:00, past the last 23:45:00 sample
    match store.xvt(g01(), instant(85_800.0)) {
        Err(Error::OutOfRange { series, sv, .. }) => {
            assert_eq!(series, SeriesKind::Position);
            assert_eq!(sv, g01());
        },
        other => panic!("invalid outcome {:?}", other),
    }
}

#[test]
fn data_gap_threshold_is_strict() {
    // one day of samples with 12:00:00 missing
    let records: Vec<ProductRecord> = day_records(g01())
        .into_iter()
        .filter(|record| match record {
            ProductRecord::Position(sample) => {
                sample.epoch != instant(43_200.0).epoch
            },
            _ => true,
        })
        .collect();
    let mut store = EphemerisStore::default();
    store
        .load(VecSource::new(SourceFormat::Ephemeris, records))
        .unwrap();

    // 11:52:30 now sits in a 1800 s bracket: exactly 2.0 nominal steps
    store.set_position_gap_interval(2.0);
    assert!(store.position(g01(), instant(42_750.0)).is_ok());

    store.set_position_gap_interval(1.5);
    assert!(matches!(
        store.position(g01(), instant(42_750.0)),
        Err(Error::DataGap { .. })
    ));
}

#[test]
fn window_span_policing() {
    let mut store = day_store();
    // order 10 windows span 9 nominal steps
    store.set_position_max_interval(8.0);
    assert!(matches!(
        store.position(g01(), instant(42_750.0)),
        Err(Error::IntervalExceeded { .. })
    ));
    store.set_position_max_interval(9.0);
    assert!(store.position(g01(), instant(42_750.0)).is_ok());
}

#[test]
fn clock_override_narrows_clock_coverage() {
    let mut store = day_store();
    store.set_clock_source(SourceFormat::Clock);
    assert_eq!(store.ndata_clock(), 0);

    // dedicated clock product covering 06:00:00 - 12:00:00 at 300 s
    let mut records = vec![ProductRecord::Header(HeaderRecord {
        time_system: TimeSystem::GPS,
        nominal_step: Some(Duration::from_seconds(300.0)),
        satellite_count: Some(1),
    })];
    for i in 0..=72 {
        records.push(clock_sample(g01(), 21_600.0 + i as f64 * 300.0));
    }
    store
        .load(VecSource::new(SourceFormat::Clock, records))
        .unwrap();

    // position coverage extends to 18:00:00 but the clock table stops at noon
    match store.xvt(g01(), instant(64_800.0)) {
        Err(Error::OutOfRange { series, .. }) => assert_eq!(series, SeriesKind::Clock),
        other => panic!("invalid outcome {:?}", other),
    }
    assert!(store.xvt(g01(), instant(36_000.0)).is_ok());

    // composite bounds follow the intersection
    assert_eq!(store.initial_time().unwrap(), instant(21_600.0));
    assert_eq!(store.final_time().unwrap(), instant(43_200.0));
    assert_eq!(
        store.position_final_time().unwrap(),
        instant(85_500.0)
    );
}

#[test]
fn ingestion_commutes_over_disjoint_products() {
    let all = day_records(g01());
    // split into morning and evening halves, headers included in both
    let morning: Vec<ProductRecord> = all
        .iter()
        .filter(|r| earlier_half(r, true))
        .cloned()
        .collect();
    let evening: Vec<ProductRecord> = all
        .iter()
        .filter(|r| earlier_half(r, false))
        .cloned()
        .collect();

    let mut forward = EphemerisStore::default();
    forward
        .load(VecSource::new(SourceFormat::Ephemeris, morning.clone()))
        .unwrap();
    forward
        .load(VecSource::new(SourceFormat::Ephemeris, evening.clone()))
        .unwrap();

    let mut reverse = EphemerisStore::default();
    reverse
        .load(VecSource::new(SourceFormat::Ephemeris, evening))
        .unwrap();
    reverse
        .load(VecSource::new(SourceFormat::Ephemeris, morning))
        .unwrap();

    assert_eq!(forward.ndata_position(), 96);
    assert_eq!(forward.ndata_position(), reverse.ndata_position());
    assert_eq!(forward.ndata_clock(), reverse.ndata_clock());
    assert_eq!(forward.has_velocity(), reverse.has_velocity());
    assert_eq!(
        forward.position_nominal_step(g01()),
        reverse.position_nominal_step(g01())
    );
    assert_eq!(forward.initial_time().unwrap(), reverse.initial_time().unwrap());
    assert_eq!(forward.final_time().unwrap(), reverse.final_time().unwrap());
    for dt in [0.0, 21_150.0, 43_200.0, 85_500.0] {
        assert_eq!(
            forward.positions().table().get(g01(), instant(dt)),
            reverse.positions().table().get(g01(), instant(dt))
        );
        assert_eq!(
            forward.compute_xvt(g01(), instant(dt)),
            reverse.compute_xvt(g01(), instant(dt))
        );
    }
}

fn earlier_half(record: &ProductRecord, morning: bool) -> bool {
    let noon = instant(43_200.0).epoch;
    match record {
        ProductRecord::Header(_) => true,
        ProductRecord::Position(sample) => (sample.epoch < noon) == morning,
        ProductRecord::Clock(sample) => (sample.epoch < noon) == morning,
    }
}

#[test]
fn incompatible_time_systems_are_refused() {
    let mut store = day_store();
    assert_eq!(store.time_system(), TimeSystem::GPS);

    let mut records = day_records(g01());
    records[0] = ProductRecord::Header(HeaderRecord {
        time_system: TimeSystem::UTC,
        nominal_step: Some(Duration::from_seconds(900.0)),
        satellite_count: Some(1),
    });
    let before = store.ndata_position();
    assert!(matches!(
        store.load(VecSource::new(SourceFormat::Ephemeris, records)),
        Err(Error::TimeSystemMismatch {
            store: TimeSystem::GPS,
            file: TimeSystem::UTC,
        })
    ));
    // nothing adopted
    assert_eq!(store.ndata_position(), before);
    assert_eq!(store.time_system(), TimeSystem::GPS);
}

#[test]
fn parser_failures_leave_the_store_untouched() {
    let mut store = EphemerisStore::default();
    let records = vec![gps_header(), position_sample(g01(), 0.0)];
    assert!(matches!(
        store.load(FailingSource::new(SourceFormat::Ephemeris, records)),
        Err(Error::Parse(_))
    ));
    assert_eq!(store.ndata_position(), 0);
    assert_eq!(store.time_system(), TimeSystem::Any);
}

#[test]
fn every_instant_inside_the_bounds_is_served() {
    let store = day_store();
    let initial = store.initial_time().unwrap();
    let final_time = store.final_time().unwrap();
    let span = (final_time - initial).to_seconds();
    for i in 0..=32 {
        let t = initial + Duration::from_seconds(span * i as f64 / 32.0);
        assert!(store.xvt(g01(), t).is_ok(), "failed at {}", t);
    }
}

#[test]
fn unknown_satellites_are_reported() {
    let store = day_store();
    let g07 = SV::new(Constellation::GPS, 7);
    assert!(matches!(
        store.xvt(g07, instant(43_200.0)),
        Err(Error::UnknownSatellite(sv)) if sv == g07
    ));
    let unavailable = store.compute_xvt(g07, instant(43_200.0));
    assert_eq!(unavailable.health, Health::Unavailable);
    assert_eq!(unavailable.position, (0.0, 0.0, 0.0));
}

#[test]
fn switching_clock_sources_clears_the_clock_table() {
    let mut store = day_store();
    assert!(store.ndata_clock() > 0);
    store.set_clock_source(SourceFormat::Clock);
    assert_eq!(store.ndata_clock(), 0);
    assert_eq!(store.ndata_position(), 96);
    assert!(store.has_clock_drift());
    // no-op when unchanged
    store.set_clock_source(SourceFormat::Clock);
    assert_eq!(store.clock_source(), SourceFormat::Clock);
    // switching back also clears
    store.set_clock_source(SourceFormat::Ephemeris);
    assert_eq!(store.ndata_clock(), 0);
}

#[test]
fn clock_product_ingestion_switches_implicitly() {
    let mut store = day_store();
    assert_eq!(store.clock_source(), SourceFormat::Ephemeris);
    let mut records = vec![gps_header()];
    for i in 0..8 {
        records.push(clock_sample(g01(), i as f64 * 300.0));
    }
    let summary = store
        .load(VecSource::new(SourceFormat::Clock, records))
        .unwrap();
    assert_eq!(store.clock_source(), SourceFormat::Clock);
    assert_eq!(summary.clocks_loaded, 8);
    assert_eq!(store.ndata_clock(), 8);
}

#[test]
fn rejection_flags_filter_ephemeris_samples() {
    let sv = g01();
    let mut records = vec![gps_header()];
    for i in 0..8 {
        let dt = i as f64 * 900.0;
        let mut position = position_sample(sv, dt);
        let mut clock = clock_sample(sv, dt);
        if i == 3 {
            if let ProductRecord::Position(sample) = &mut position {
                sample.bad = true;
            }
            if let ProductRecord::Clock(sample) = &mut clock {
                sample.bad = true;
            }
        }
        if i == 5 {
            if let ProductRecord::Position(sample) = &mut position {
                sample.predicted = true;
            }
            if let ProductRecord::Clock(sample) = &mut clock {
                sample.predicted = true;
            }
        }
        records.push(position);
        records.push(clock);
    }

    // defaults: bad rejected, predicted kept
    let mut store = EphemerisStore::default();
    let summary = store
        .load(VecSource::new(SourceFormat::Ephemeris, records.clone()))
        .unwrap();
    assert_eq!(summary.positions_loaded, 7);
    assert_eq!(summary.positions_rejected, 1);
    assert_eq!(summary.clocks_loaded, 7);
    assert_eq!(summary.clocks_rejected, 1);

    // predicted rejection enabled
    let mut store = EphemerisStore::default();
    store.reject_predicted_positions(true);
    store.reject_predicted_clocks(true);
    let summary = store
        .load(VecSource::new(SourceFormat::Ephemeris, records.clone()))
        .unwrap();
    assert_eq!(summary.positions_loaded, 6);
    assert_eq!(summary.positions_rejected, 2);

    // everything kept when policing is off
    let mut store = EphemerisStore::default();
    store.reject_bad_positions(false);
    store.reject_bad_clocks(false);
    let summary = store
        .load(VecSource::new(SourceFormat::Ephemeris, records))
        .unwrap();
    assert_eq!(summary.positions_loaded, 8);
    assert_eq!(summary.clocks_loaded, 8);
}

#[test]
fn rejection_flags_are_inert_for_clock_products() {
    let mut store = EphemerisStore::default();
    store.set_clock_source(SourceFormat::Clock);
    let mut records = vec![gps_header()];
    for i in 0..4 {
        let mut record = clock_sample(g01(), i as f64 * 300.0);
        if let ProductRecord::Clock(sample) = &mut record {
            sample.bad = true;
            sample.predicted = true;
        }
        records.push(record);
    }
    let summary = store
        .load(VecSource::new(SourceFormat::Clock, records))
        .unwrap();
    assert_eq!(summary.clocks_loaded, 4);
    assert_eq!(summary.clocks_rejected, 0);
}

#[test]
fn clear_keeps_configuration_and_time_system() {
    let mut store = day_store();
    store.set_position_interpolation_order(8);
    store.set_position_gap_interval(2.0);
    store.clear();
    assert_eq!(store.ndata_position(), 0);
    assert_eq!(store.ndata_clock(), 0);
    assert_eq!(store.time_system(), TimeSystem::GPS);
    assert_eq!(store.position_interpolation_order(), 8);
    // reloading in the same system is accepted
    store
        .load(VecSource::new(SourceFormat::Ephemeris, day_records(g01())))
        .unwrap();
    assert_eq!(store.ndata_position(), 96);
}

#[test]
fn direct_record_insertion_locks_the_time_system() {
    let mut store = EphemerisStore::default();
    let record = PositionRecord {
        position: (1.0E7, 2.0E7, 3.0E6),
        ..Default::default()
    };
    store
        .add_position_record(g01(), instant(0.0), record.clone())
        .unwrap();
    assert_eq!(store.time_system(), TimeSystem::GPS);
    let utc = instant(900.0).with_time_system(TimeSystem::UTC);
    assert!(matches!(
        store.add_position_record(g01(), utc, record),
        Err(Error::TimeSystemMismatch { .. })
    ));
}

#[test]
fn edit_narrows_both_tables() {
    let mut store = day_store();
    store.edit(instant(18_000.0), instant(36_000.0));
    assert_eq!(store.initial_time().unwrap(), instant(18_000.0));
    assert_eq!(store.final_time().unwrap(), instant(36_000.0));
    assert_eq!(store.ndata_position(), 21);
    assert_eq!(store.ndata_clock(), 21);
}

#[test]
fn derived_clock_drift_is_served() {
    let store = day_store();
    assert!(!store.has_clock_drift());
    let (_, drift) = store.clock_state(g01(), instant(42_750.0)).unwrap();
    let expected = 2.0E-9 + 2.0E-15 * 42_750.0;
    assert!((drift - expected).abs() < 1.0E-13);
}
