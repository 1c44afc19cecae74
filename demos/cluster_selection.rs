use engagement_segments::selection::{best_k_by_silhouette, elbow_curve, suggest_cluster_count};
use engagement_segments::{cluster, ClusteringPipeline, Matrix, PipelineConfig, Table};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Choosing the Number of Segments ===\n");

    // three groups of posts in (Likes, Views)
    let mut rng = StdRng::seed_from_u64(42);
    let centers = [[50.0, 1_000.0], [400.0, 30_000.0], [1_200.0, 8_000.0]];
    let noise = Matrix::random_using((300, 2), Normal::new(0.0, 1.0)?, &mut rng);
    let likes: Vec<f64> = (0..300).map(|i| centers[i % 3][0] + noise[[i, 0]] * 20.0).collect();
    let views: Vec<f64> = (0..300).map(|i| centers[i % 3][1] + noise[[i, 1]] * 500.0).collect();
    let table = Table::new().with_column("Likes", likes)?.with_column("Views", views)?;
    let features = ["Likes", "Views"];

    let suggestion = suggest_cluster_count(table.n_rows(), features.len());
    println!("Heuristic suggestion: k = {}", suggestion.recommended);
    if let Some((low, high)) = suggestion.recommended_range {
        println!("Suggested range: {low}-{high}");
    }
    for warning in &suggestion.warnings {
        println!("  note: {warning}");
    }

    let config = PipelineConfig::default();
    let pipeline = ClusteringPipeline::new(config.clone());
    let prepared = pipeline.prepare_features(&table, &features)?;

    println!("\nElbow curve:");
    for (k, inertia) in elbow_curve(&prepared.scaled, 2..=7, &config)? {
        println!("  k={k}: inertia {inertia:.2}");
    }

    let (best_k, score) = best_k_by_silhouette(&prepared.scaled, 2..=7, &config)?;
    println!("\nBest silhouette: k = {best_k} ({score:.3})");

    let outcome = cluster(&table, best_k, &features);
    let Some(seg) = outcome.segmentation() else {
        println!("Clustering failed: {}", outcome.error().unwrap_or("unknown error"));
        return Ok(());
    };

    println!("\nCenters in original units:");
    let centers = seg.model.centers_original_units()?;
    for (k, center) in centers.rows().into_iter().enumerate() {
        println!("  cluster {k}: likes {:.0}, views {:.0}", center[0], center[1]);
    }

    let fresh = Table::new()
        .with_column("Likes", vec![Some(60.0), Some(1_150.0), None])?
        .with_column("Views", vec![Some(1_200.0), Some(7_500.0), Some(29_000.0)])?;
    println!("\nNew posts assigned to: {:?}", seg.model.predict(&fresh)?);

    Ok(())
}
