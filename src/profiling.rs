//! Describe clusters in the original feature units.

use crate::dataset::{Table, ENGAGEMENT_RATE};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Share above which a category counts towards a cluster's diversity.
pub const SIGNIFICANT_SHARE_PCT: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub count: usize,
    /// Share of all rows, in percent
    pub percentage: f64,
    /// Mean of each profiled feature; `None` when every cell is missing
    pub means: Vec<Option<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub features: Vec<String>,
    /// Non-empty clusters in ascending label order
    pub clusters: Vec<ClusterSummary>,
}

impl ClusterProfile {
    pub fn mean(&self, cluster: usize, feature: &str) -> Option<f64> {
        let j = self.features.iter().position(|f| f == feature)?;
        self.clusters
            .iter()
            .find(|c| c.cluster == cluster)
            .and_then(|c| c.means[j])
    }

    fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

fn check_labels(table: &Table, labels: &[usize], k: usize) -> Result<()> {
    if labels.len() != table.n_rows() {
        return Err(Error::DimensionMismatch {
            expected: table.n_rows(),
            actual: labels.len(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= k) {
        return Err(Error::InvalidParameter(format!("label {bad} out of range for {k} clusters")));
    }
    Ok(())
}

/// Row count, share and feature means per cluster.
pub fn cluster_profile<S: AsRef<str>>(
    table: &Table,
    labels: &[usize],
    k: usize,
    features: &[S],
) -> Result<ClusterProfile> {
    check_labels(table, labels, k)?;
    let columns = features
        .iter()
        .map(|f| table.numeric(f.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let mut counts = vec![0usize; k];
    let mut sums = vec![vec![0.0; columns.len()]; k];
    let mut present = vec![vec![0usize; columns.len()]; k];
    for (i, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        for (j, column) in columns.iter().enumerate() {
            if let Some(v) = column[i].filter(|v| !v.is_nan()) {
                sums[label][j] += v;
                present[label][j] += 1;
            }
        }
    }

    let n = labels.len().max(1) as f64;
    let clusters = (0..k)
        .filter(|&c| counts[c] > 0)
        .map(|c| ClusterSummary {
            cluster: c,
            count: counts[c],
            percentage: counts[c] as f64 / n * 100.0,
            means: sums[c]
                .iter()
                .zip(&present[c])
                .map(|(&sum, &m)| (m > 0).then(|| sum / m as f64))
                .collect(),
        })
        .collect();

    Ok(ClusterProfile {
        features: features.iter().map(|f| f.as_ref().to_string()).collect(),
        clusters,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SegmentCategory {
    GoldenContent,
    PassiveViral,
    ConversationStarter,
    ModeratePerformer,
    Underperforming,
}

impl SegmentCategory {
    pub fn from_ranks(engagement_rank: f64, views_rank: f64) -> Self {
        if engagement_rank >= 0.75 && views_rank >= 0.75 {
            SegmentCategory::GoldenContent
        } else if views_rank >= 0.75 {
            SegmentCategory::PassiveViral
        } else if engagement_rank >= 0.75 {
            SegmentCategory::ConversationStarter
        } else if engagement_rank >= 0.5 && views_rank >= 0.5 {
            SegmentCategory::ModeratePerformer
        } else {
            SegmentCategory::Underperforming
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SegmentCategory::GoldenContent => "Golden Content",
            SegmentCategory::PassiveViral => "Passive Viral",
            SegmentCategory::ConversationStarter => "Conversation Starter",
            SegmentCategory::ModeratePerformer => "Moderate Performer",
            SegmentCategory::Underperforming => "Underperforming",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SegmentCategory::GoldenContent => "viral reach with high engagement",
            SegmentCategory::PassiveViral => "high views, little interaction",
            SegmentCategory::ConversationStarter => "high engagement, moderate reach",
            SegmentCategory::ModeratePerformer => "average performance",
            SegmentCategory::Underperforming => "needs optimization",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SegmentInsight {
    pub cluster: usize,
    pub category: SegmentCategory,
    pub count: usize,
    pub percentage: f64,
    pub engagement_rate: f64,
    pub mean_views: f64,
    pub engagement_rank: f64,
    pub views_rank: f64,
}

/// Name each cluster by how its engagement and reach rank among the others.
///
/// Needs `Views` in the profile, plus either `Engagement_Rate` or all of
/// `Likes`, `Comments` and `Shares`.
pub fn segment_insights(profile: &ClusterProfile) -> Result<Vec<SegmentInsight>> {
    if !profile.has_feature("Views") {
        return Err(Error::InvalidParameter("segment insights need a Views profile".to_string()));
    }
    let derive_rate = !profile.has_feature(ENGAGEMENT_RATE);
    if derive_rate {
        if let Some(absent) = ["Likes", "Comments", "Shares"].iter().find(|f| !profile.has_feature(f)) {
            return Err(Error::InvalidParameter(format!(
                "segment insights need {ENGAGEMENT_RATE} or {absent} in the profile"
            )));
        }
    }

    let mean = |cluster: usize, feature: &str| profile.mean(cluster, feature).unwrap_or(0.0);

    let mut views = Vec::with_capacity(profile.clusters.len());
    let mut rates = Vec::with_capacity(profile.clusters.len());
    for summary in &profile.clusters {
        let c = summary.cluster;
        let v = mean(c, "Views");
        let rate = if !derive_rate {
            mean(c, ENGAGEMENT_RATE)
        } else if v > 0.0 {
            (mean(c, "Likes") + mean(c, "Comments") + mean(c, "Shares")) / v
        } else {
            0.0
        };
        views.push(v);
        rates.push(rate);
    }

    let engagement_ranks = percentile_ranks(&rates);
    let views_ranks = percentile_ranks(&views);

    Ok(profile
        .clusters
        .iter()
        .enumerate()
        .map(|(idx, summary)| SegmentInsight {
            cluster: summary.cluster,
            category: SegmentCategory::from_ranks(engagement_ranks[idx], views_ranks[idx]),
            count: summary.count,
            percentage: summary.percentage,
            engagement_rate: rates[idx],
            mean_views: views[idx],
            engagement_rank: engagement_ranks[idx],
            views_rank: views_ranks[idx],
        })
        .collect())
}

/// Rank / n, ties sharing the average of their positions.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start+1 ..= end share their mean
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average / n as f64;
        }
        start = end;
    }
    ranks
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Diversity {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryInsight {
    pub cluster: usize,
    pub dominant: String,
    /// Share of the dominant category within the cluster, in percent
    pub share: f64,
    pub diversity: Diversity,
    pub significant_categories: usize,
}

/// Category counts per cluster for one text column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrossTab {
    pub column: String,
    /// Sorted distinct categories
    pub categories: Vec<String>,
    /// Clusters with at least one categorized row
    pub clusters: Vec<usize>,
    /// `counts[i][j]`: rows of `clusters[i]` in `categories[j]`
    pub counts: Vec<Vec<usize>>,
}

impl CrossTab {
    /// Row-normalized counts in percent.
    pub fn percentages(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let total = row.iter().sum::<usize>().max(1) as f64;
                row.iter().map(|&c| c as f64 / total * 100.0).collect()
            })
            .collect()
    }

    pub fn insights(&self) -> Vec<CategoryInsight> {
        self.percentages()
            .iter()
            .zip(&self.clusters)
            .filter_map(|(row, &cluster)| {
                let (best, share) = row
                    .iter()
                    .enumerate()
                    .fold(None, |acc: Option<(usize, f64)>, (j, &p)| match acc {
                        Some((_, top)) if top >= p => acc,
                        _ => Some((j, p)),
                    })?;
                let significant = row.iter().filter(|&&p| p > SIGNIFICANT_SHARE_PCT).count();
                let diversity = match significant {
                    s if s >= 3 => Diversity::High,
                    2 => Diversity::Medium,
                    _ => Diversity::Low,
                };
                Some(CategoryInsight {
                    cluster,
                    dominant: self.categories[best].clone(),
                    share,
                    diversity,
                    significant_categories: significant,
                })
            })
            .collect()
    }
}

/// Cross-tabulate a text column against cluster labels; missing cells are skipped.
pub fn crosstab(table: &Table, labels: &[usize], k: usize, column: &str) -> Result<CrossTab> {
    check_labels(table, labels, k)?;
    let values = table
        .column(column)
        .ok_or_else(|| Error::InvalidTable(format!("column '{column}' not found")))?
        .as_text()
        .ok_or_else(|| Error::InvalidTable(format!("column '{column}' is not categorical")))?;

    let mut tally: BTreeMap<usize, BTreeMap<&str, usize>> = BTreeMap::new();
    for (value, &label) in values.iter().zip(labels) {
        if let Some(value) = value {
            *tally.entry(label).or_default().entry(value.as_str()).or_default() += 1;
        }
    }

    let mut categories: Vec<String> = tally
        .values()
        .flat_map(|row| row.keys().map(|c| c.to_string()))
        .collect();
    categories.sort();
    categories.dedup();

    let counts = tally
        .values()
        .map(|row| {
            categories
                .iter()
                .map(|c| row.get(c.as_str()).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    Ok(CrossTab {
        column: column.to_string(),
        categories,
        clusters: tally.keys().copied().collect(),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts() -> Table {
        Table::new()
            .with_column("Likes", vec![10.0, 12.0, 500.0, 520.0, 50.0, 40.0])
            .unwrap()
            .with_column("Comments", vec![1.0, 1.0, 50.0, 60.0, 30.0, 20.0])
            .unwrap()
            .with_column("Shares", vec![0.0, 2.0, 20.0, 20.0, 10.0, 10.0])
            .unwrap()
            .with_column(
                "Views",
                vec![Some(1000.0), Some(1200.0), Some(50_000.0), None, Some(400.0), Some(600.0)],
            )
            .unwrap()
            .with_column(
                "Platform",
                vec![Some("A"), Some("B"), Some("A"), Some("A"), None, Some("C")],
            )
            .unwrap()
    }

    const LABELS: [usize; 6] = [0, 0, 1, 1, 2, 2];
    const FEATURES: [&str; 4] = ["Likes", "Comments", "Shares", "Views"];

    #[test]
    fn test_profile_means_skip_missing() {
        let profile = cluster_profile(&posts(), &LABELS, 3, &FEATURES).unwrap();
        assert_eq!(profile.clusters.len(), 3);
        assert_eq!(profile.clusters[1].count, 2);
        assert!((profile.clusters[1].percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(profile.mean(0, "Likes"), Some(11.0));
        assert_eq!(profile.mean(1, "Views"), Some(50_000.0));
        assert_eq!(profile.mean(1, "Unknown"), None);
    }

    #[test]
    fn test_profile_omits_empty_clusters() {
        let profile = cluster_profile(&posts(), &[0, 0, 0, 2, 2, 2], 4, &["Likes"]).unwrap();
        let ids: Vec<usize> = profile.clusters.iter().map(|c| c.cluster).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_profile_rejects_bad_labels() {
        assert!(cluster_profile(&posts(), &[0, 1], 2, &["Likes"]).is_err());
        assert!(cluster_profile(&posts(), &[0, 0, 0, 0, 0, 5], 3, &["Likes"]).is_err());
        assert!(cluster_profile(&posts(), &LABELS, 3, &["Platform"]).is_err());
    }

    #[test]
    fn test_percentile_ranks_average_ties() {
        assert_eq!(percentile_ranks(&[3.0, 1.0, 2.0]), vec![1.0, 1.0 / 3.0, 2.0 / 3.0]);
        assert_eq!(percentile_ranks(&[5.0, 5.0, 1.0, 9.0]), vec![0.625, 0.625, 0.25, 1.0]);
        assert!(percentile_ranks(&[]).is_empty());
    }

    #[test]
    fn test_segment_categories() {
        let profile = cluster_profile(&posts(), &LABELS, 3, &FEATURES).unwrap();
        let insights = segment_insights(&profile).unwrap();

        // views 1100, 50000, 500; rates 0.0118, 0.0117, 0.16
        assert_eq!(insights[0].category, SegmentCategory::ModeratePerformer);
        assert_eq!(insights[1].category, SegmentCategory::PassiveViral);
        assert_eq!(insights[2].category, SegmentCategory::ConversationStarter);
        assert_eq!(insights[1].views_rank, 1.0);
    }

    #[test]
    fn test_segment_insights_prefer_engagement_rate_column() {
        let table = posts()
            .with_column(ENGAGEMENT_RATE, vec![0.9, 0.8, 0.7, 0.7, 0.1, 0.1])
            .unwrap();
        let profile = cluster_profile(&table, &LABELS, 3, &["Views", ENGAGEMENT_RATE]).unwrap();
        let insights = segment_insights(&profile).unwrap();
        assert!((insights[0].engagement_rate - 0.85).abs() < 1e-12);
        assert_eq!(insights[1].category, SegmentCategory::PassiveViral);
        assert_eq!(insights[2].category, SegmentCategory::Underperforming);
    }

    #[test]
    fn test_segment_insights_need_views() {
        let profile = cluster_profile(&posts(), &LABELS, 3, &["Likes"]).unwrap();
        assert!(segment_insights(&profile).is_err());
        let profile = cluster_profile(&posts(), &LABELS, 3, &["Likes", "Views"]).unwrap();
        assert!(segment_insights(&profile).is_err());
    }

    #[test]
    fn test_crosstab_counts_and_insights() {
        let tab = crosstab(&posts(), &LABELS, 3, "Platform").unwrap();
        assert_eq!(tab.categories, vec!["A", "B", "C"]);
        assert_eq!(tab.clusters, vec![0, 1, 2]);
        assert_eq!(tab.counts, vec![vec![1, 1, 0], vec![2, 0, 0], vec![0, 0, 1]]);

        let pct = tab.percentages();
        assert_eq!(pct[0], vec![50.0, 50.0, 0.0]);

        let insights = tab.insights();
        assert_eq!(insights[0].dominant, "A");
        assert_eq!(insights[0].diversity, Diversity::Medium);
        assert_eq!(insights[1].share, 100.0);
        assert_eq!(insights[1].diversity, Diversity::Low);
        assert_eq!(insights[2].dominant, "C");
    }

    #[test]
    fn test_crosstab_rejects_numeric_column() {
        assert!(crosstab(&posts(), &LABELS, 3, "Likes").is_err());
        assert!(crosstab(&posts(), &LABELS, 3, "Nope").is_err());
    }
}
