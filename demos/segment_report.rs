use engagement_segments::diagnostics::diagnose;
use engagement_segments::profiling::{cluster_profile, crosstab, segment_insights};
use engagement_segments::{ClusterOutcome, ClusteringPipeline, Matrix, PipelineConfig, Table};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

const FEATURES: [&str; 4] = ["Likes", "Comments", "Shares", "Views"];

/// Synthetic posts drawn around four engagement archetypes.
fn synthetic_posts(n: usize, seed: u64) -> Result<Table, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    // likes, comments, shares, views
    let archetypes = [
        ([40.0, 4.0, 2.0, 800.0], "Text"),
        ([350.0, 20.0, 12.0, 70_000.0], "Video"),
        ([500.0, 180.0, 95.0, 6_000.0], "Image"),
        ([2_500.0, 400.0, 300.0, 90_000.0], "Reel"),
    ];
    let noise = Matrix::random_using((n, 4), Uniform::new(0.8, 1.2), &mut rng);

    let mut columns = vec![Vec::with_capacity(n); 4];
    let mut kinds = Vec::with_capacity(n);
    for i in 0..n {
        let (base, kind) = archetypes[i % archetypes.len()];
        for (j, column) in columns.iter_mut().enumerate() {
            column.push((base[j] * noise[[i, j]]).round());
        }
        kinds.push(kind);
    }

    let mut table = Table::new();
    for (name, values) in FEATURES.iter().zip(columns) {
        table.push_column(*name, values)?;
    }
    table.push_column("ContentType", kinds)?;
    Ok(table.with_engagement_rate()?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    let table = synthetic_posts(400, 7)?;
    println!("=== Engagement Segments ===\n");
    println!("Table: {} rows, columns {:?}\n", table.n_rows(), table.names());

    let outcome = ClusteringPipeline::new(config).cluster(&table, 4, &FEATURES);
    let seg = match &outcome {
        ClusterOutcome::Clustered(seg) => seg,
        ClusterOutcome::Failed(degraded) => {
            println!("Clustering failed: {}", degraded.error);
            println!("Hint: {}", degraded.reason.hint());
            return Ok(());
        }
    };

    println!("Algorithm: {:?} ({} iterations)", seg.model.algorithm, seg.model.n_iter);
    println!("Cluster sizes: {:?}", seg.metrics.cluster_sizes);
    if let Some(s) = seg.metrics.silhouette {
        println!("Silhouette: {s:.3}");
    }
    if let Some(db) = seg.metrics.davies_bouldin {
        println!("Davies-Bouldin: {db:.3}");
    }
    println!("Inertia: {:.2}\n", seg.metrics.inertia);

    let profile = cluster_profile(&table, &seg.labels, 4, &FEATURES)?;
    println!("=== Segments ===");
    for insight in segment_insights(&profile)? {
        println!(
            "Cluster {}: {:<20} {:>5.1}% of posts, engagement {:.4}, views {:.0} ({})",
            insight.cluster,
            insight.category.name(),
            insight.percentage,
            insight.engagement_rate,
            insight.mean_views,
            insight.category.description()
        );
    }

    println!("\n=== Content types ===");
    for insight in crosstab(&table, &seg.labels, 4, "ContentType")?.insights() {
        println!(
            "Cluster {}: mostly {} ({:.0}%), diversity {:?}",
            insight.cluster, insight.dominant, insight.share, insight.diversity
        );
    }

    if let Some(projection) = &seg.projection {
        println!(
            "\nProjection explains {:.1}% of the variance",
            projection.explained_variance_ratio.sum() * 100.0
        );
    }

    let report = diagnose(&table, &FEATURES, &outcome);
    println!("\n=== Diagnostics ===");
    println!("Quality: {:?}", report.clustering.silhouette_quality);
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for tip in &report.tips {
        println!("tip: {tip}");
    }

    Ok(())
}
