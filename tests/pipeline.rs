use engagement_segments::diagnostics::diagnose;
use engagement_segments::profiling::{cluster_profile, crosstab, segment_insights, SegmentCategory};
use engagement_segments::{
    cluster, Algorithm, ClusterOutcome, ClusteringPipeline, FailureReason, PipelineConfig, Table,
};

fn twenty_rows() -> Table {
    let a: Vec<f64> = (0..20).map(|i| (i % 4) as f64 * 3.0 + (i % 3) as f64).collect();
    let b: Vec<f64> = (0..20).map(|i| ((i * 7) % 11) as f64).collect();
    Table::new()
        .with_column("a", a)
        .unwrap()
        .with_column("b", b)
        .unwrap()
}

/// Low reach chatter, viral but passive, and a smaller highly engaged group.
fn posts(n: usize) -> Table {
    let profile = |i: usize| match i % 10 {
        0..=4 => (20.0, 2.0, 1.0, 500.0, "Text"),
        5..=7 => (300.0, 10.0, 5.0, 60_000.0, "Video"),
        _ => (400.0, 150.0, 90.0, 4_000.0, "Image"),
    };
    let jitter = |i: usize| (i % 7) as f64;
    let column = |f: fn((f64, f64, f64, f64, &str)) -> f64| -> Vec<f64> {
        (0..n).map(|i| f(profile(i)) + jitter(i)).collect()
    };

    Table::new()
        .with_column("Likes", column(|p| p.0))
        .unwrap()
        .with_column("Comments", column(|p| p.1))
        .unwrap()
        .with_column("Shares", column(|p| p.2))
        .unwrap()
        .with_column("Views", column(|p| p.3))
        .unwrap()
        .with_column("ContentType", (0..n).map(|i| profile(i).4).collect::<Vec<_>>())
        .unwrap()
}

#[test]
fn twenty_rows_three_clusters() {
    let outcome = cluster(&twenty_rows(), 3, &["a", "b"]);
    let seg = outcome.segmentation().expect("clustered");

    assert_eq!(seg.labels.len(), 20);
    assert!(seg.labels.iter().all(|&l| l < 3));
    assert_eq!(seg.metrics.cluster_sizes.len(), 3);
    assert_eq!(seg.metrics.cluster_sizes.iter().sum::<usize>(), 20);
    let silhouette = seg.metrics.silhouette.unwrap();
    assert!((-1.0..=1.0).contains(&silhouette));
    assert!(seg.metrics.davies_bouldin.unwrap() >= 0.0);
    assert!(seg.metrics.inertia >= 0.0);
}

#[test]
fn text_feature_degrades_instead_of_failing() {
    let outcome = cluster(&posts(30), 3, &["ContentType"]);
    match &outcome {
        ClusterOutcome::Failed(degraded) => {
            assert_eq!(degraded.reason, FailureReason::NonNumericColumns);
            assert!(degraded.error.contains("ContentType"));
            assert!(degraded.labels.iter().all(|&l| l == 0));
            assert_eq!(degraded.labels.len(), 30);
        }
        ClusterOutcome::Clustered(_) => panic!("text column must not cluster"),
    }
}

#[test]
fn small_tables_degrade_for_every_k() {
    let table = twenty_rows();
    let small = Table::new()
        .with_column("a", table.numeric("a").unwrap()[..9].to_vec())
        .unwrap();
    for k in 2..=5 {
        let outcome = cluster(&small, k, &["a"]);
        assert_eq!(outcome.degraded().unwrap().reason, FailureReason::TooFewRows);
    }
}

#[test]
fn end_to_end_engagement_segments() {
    let table = posts(200).with_engagement_rate().unwrap();
    let features = ["Likes", "Comments", "Shares", "Views"];
    let outcome = cluster(&table, 3, &features);
    let seg = outcome.segmentation().expect("clustered");
    assert_eq!(seg.model.algorithm, Algorithm::KMeans);

    let profile = cluster_profile(&table, &seg.labels, 3, &features).unwrap();
    assert_eq!(profile.clusters.iter().map(|c| c.count).sum::<usize>(), 200);

    let insights = segment_insights(&profile).unwrap();
    let viral = seg.labels[5];
    let chatty = seg.labels[8];
    let category = |cluster: usize| insights.iter().find(|s| s.cluster == cluster).unwrap().category;
    assert_eq!(category(viral), SegmentCategory::PassiveViral);
    assert_eq!(category(chatty), SegmentCategory::ConversationStarter);

    let tab = crosstab(&table, &seg.labels, 3, "ContentType").unwrap();
    let video = tab.insights().into_iter().find(|i| i.cluster == viral).unwrap();
    assert_eq!(video.dominant, "Video");
    assert_eq!(video.share, 100.0);

    let report = diagnose(&table, &features, &outcome);
    assert_eq!(report.clustering.clusters_formed, 3);
    assert!(report.data.missing_pct == 0.0);
}

#[test]
fn pipeline_is_deterministic() {
    let pipeline = ClusteringPipeline::new(PipelineConfig::default());
    let table = posts(120);
    let first = pipeline.cluster(&table, 4, &["Likes", "Views"]);
    let second = pipeline.cluster(&table, 4, &["Likes", "Views"]);
    assert_eq!(first.labels(), second.labels());
}

#[test]
fn config_from_toml_drives_algorithm_choice() {
    let config = PipelineConfig::from_toml_str(
        r#"
        minibatch_threshold = 50
        batch_size = 32
        "#,
    )
    .unwrap();
    let outcome = ClusteringPipeline::new(config).cluster(&posts(100), 3, &["Likes", "Views"]);
    let seg = outcome.segmentation().expect("clustered");
    assert_eq!(seg.model.algorithm, Algorithm::MiniBatchKMeans);
    assert_eq!(seg.labels.len(), 100);
}
