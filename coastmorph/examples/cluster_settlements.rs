// Example: settlement types from Ward clustering of summary profiles
use anyhow::Result;
use coastmorph::cluster::ward::{cluster_settlements, fcluster_distance, standardize, ward_linkage};
use coastmorph::contextual::summative::{summarize, GroupKey, MeasurementTable, SummaryOptions};

fn main() -> Result<()> {
    println!("=== Example: Ward clustering of settlements ===\n");

    let mut table = MeasurementTable::new(vec!["sdbAre".to_string(), "sdbPer".to_string()]);
    let settlements = [
        ("ericeira", 90.0, 40.0),
        ("nazare", 95.0, 41.0),
        ("peniche", 100.0, 43.0),
        ("tavira", 260.0, 70.0),
        ("olhao", 240.0, 66.0),
    ];
    for (name, area, perimeter) in settlements {
        for step in 0..8 {
            let jitter = step as f64 * 3.0;
            table.push_row(
                GroupKey::new(name, None),
                false,
                vec![Some(area + jitter), Some(perimeter + jitter / 4.0)],
            )?;
        }
    }

    let summary = summarize(&table, &SummaryOptions::new(&["sdbAre", "sdbPer"], &[]))?;
    println!("Settlements summarised: {}", summary.len());

    let standardized = standardize(&summary.matrix())?;
    let merges = ward_linkage(&standardized)?;
    println!("\nLinkage:");
    for merge in &merges {
        println!(
            "  {} + {} at {:.3} ({} settlements)",
            merge.left, merge.right, merge.distance, merge.size
        );
    }

    for threshold in [1.0, 5.0] {
        let labels = fcluster_distance(&merges, standardized.len(), threshold);
        println!("\nCut at {}: {:?}", threshold, labels);
    }

    let (_, assignments) = cluster_settlements(&summary, 5.0)?;
    for assignment in assignments {
        println!("  {} -> type {}", assignment.place, assignment.cl);
    }

    Ok(())
}
