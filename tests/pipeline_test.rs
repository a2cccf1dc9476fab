use std::fs::File;
use std::io::Write;

use seriesad::{analyze, synth::generate_synthetic, AnalysisOptions, AnalyzeError, RawTable, Value};

fn spike_table(n: usize, spike_row: usize, spike: f64) -> RawTable {
    let time: Vec<Value> = (0..n).map(|i| Value::Number(i as f64)).collect();
    let x: Vec<Value> = (0..n)
        .map(|i| Value::Number(if i == spike_row { spike } else { 0.0 }))
        .collect();
    RawTable::from_columns(vec![("time", time), ("x", x)])
}

#[test]
fn scored_table_has_all_rows_and_two_extra_columns() {
    let raw = spike_table(20, 19, 100.0);
    let analysis = analyze(&raw, &AnalysisOptions::default()).unwrap();
    assert_eq!(analysis.table.len(), 20);
    // time + x from the numeric table, plus anomaly_score and is_anomaly
    assert_eq!(analysis.table.n_columns(), 4);
    assert_eq!(
        analysis.table.column_names(),
        vec!["time", "x", "anomaly_score", "is_anomaly"]
    );
}

#[test]
fn spike_row_scores_highest_and_is_flagged() {
    let raw = spike_table(20, 19, 100.0);
    let analysis = analyze(&raw, &AnalysisOptions::default()).unwrap();
    let scores = analysis.table.scores();
    for (i, &s) in scores.iter().enumerate() {
        assert!(
            scores[19] >= s,
            "row {i} scored {s}, above the spike row's {}",
            scores[19]
        );
    }
    assert_eq!(analysis.table.labels()[19], 1);
    assert_eq!(analysis.table.top_indices(1).len(), 1);
}

#[test]
fn tables_below_the_split_minimum_still_analyze() {
    // 5 rows is below the 10-row split floor; the clamp trains on all 5.
    let raw = spike_table(5, 2, 50.0);
    let analysis = analyze(&raw, &AnalysisOptions::default()).unwrap();
    assert_eq!(analysis.table.len(), 5);
}

#[test]
fn explicit_features_restrict_scoring_but_keep_columns() {
    let time: Vec<Value> = (0..30).map(|i| Value::Number(i as f64)).collect();
    let a: Vec<Value> = (0..30).map(|i| Value::Number((i % 7) as f64)).collect();
    let b: Vec<Value> = (0..30).map(|i| Value::Number((i % 3) as f64)).collect();
    let raw = RawTable::from_columns(vec![("time", time), ("a", a), ("b", b)]);

    let options = AnalysisOptions {
        features: Some(vec!["a".to_string()]),
        ..AnalysisOptions::default()
    };
    let analysis = analyze(&raw, &options).unwrap();
    assert_eq!(analysis.features, vec!["a".to_string()]);
    assert!(!analysis.features.contains(&"time".to_string()));
    // b stays present as a data column, just unused for fitting
    assert!(analysis.table.column("b").is_some());
    assert!(analysis.table.column("a").is_some());
}

#[test]
fn repeated_analysis_is_bit_identical() {
    let (raw, _) = generate_synthetic(120, 8, 11);
    let options = AnalysisOptions::default();
    let first = analyze(&raw, &options).unwrap();
    let second = analyze(&raw, &options).unwrap();
    assert_eq!(first.table.scores(), second.table.scores());
    assert_eq!(first.table.labels(), second.table.labels());
    assert_eq!(first.features, second.features);
}

#[test]
fn missing_time_column_is_synthesized() {
    let a: Vec<Value> = (0..12).map(|i| Value::Number((i * i) as f64)).collect();
    let raw = RawTable::from_columns(vec![("a", a)]);
    let analysis = analyze(&raw, &AnalysisOptions::default()).unwrap();
    let expected: Vec<f64> = (0..12).map(|i| i as f64).collect();
    assert_eq!(analysis.table.time().as_numeric().unwrap(), &expected[..]);
}

#[test]
fn time_only_table_is_a_fatal_input_error() {
    let time: Vec<Value> = (0..10).map(|i| Value::Number(i as f64)).collect();
    let raw = RawTable::from_columns(vec![("time", time)]);
    let err = analyze(&raw, &AnalysisOptions::default()).unwrap_err();
    assert!(matches!(&err, AnalyzeError::NoFeatures));
    assert_eq!(
        err.to_string(),
        "no numeric feature columns found besides the time axis"
    );
}

#[test]
fn empty_table_is_a_fatal_input_error() {
    let raw = RawTable::new(vec!["x".to_string()], vec![]).unwrap();
    assert!(matches!(
        analyze(&raw, &AnalysisOptions::default()),
        Err(AnalyzeError::EmptyInput)
    ));
}

#[test]
fn injected_synthetic_anomalies_score_higher_on_average() {
    let (raw, injected) = generate_synthetic(300, 12, 7);
    let analysis = analyze(&raw, &AnalysisOptions::default()).unwrap();
    let scores = analysis.table.scores();

    let injected_mean: f64 =
        injected.iter().map(|&i| scores[i]).sum::<f64>() / injected.len() as f64;
    let normal: Vec<f64> = (0..300)
        .filter(|i| !injected.contains(i))
        .map(|i| scores[i])
        .collect();
    let normal_mean: f64 = normal.iter().sum::<f64>() / normal.len() as f64;

    assert!(
        injected_mean > normal_mean,
        "injected rows averaged {injected_mean}, normal rows {normal_mean}"
    );
    assert!(analysis.table.anomaly_count() >= 1);
}

#[test]
fn csv_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "time,temp,site").unwrap();
    for i in 0..25 {
        let temp = if i == 20 { 95.0 } else { 20.0 };
        writeln!(file, "{i},{temp},lab").unwrap();
    }
    drop(file);

    let raw = RawTable::from_csv_reader(File::open(&path).unwrap()).unwrap();
    let analysis = analyze(&raw, &AnalysisOptions::default()).unwrap();
    // the text column is dropped during ingestion
    assert_eq!(analysis.features, vec!["temp".to_string()]);
    assert_eq!(analysis.table.len(), 25);
    let scores = analysis.table.scores();
    assert!(scores.iter().all(|&s| scores[20] >= s));
}

#[test]
fn options_deserialize_with_defaults() {
    let options: AnalysisOptions = serde_json::from_str(r#"{"contamination": 0.1}"#).unwrap();
    assert_eq!(options.contamination, 0.1);
    assert_eq!(options.n_estimators, 200);
    assert_eq!(options.seed, 42);
    assert!(options.features.is_none());
}
