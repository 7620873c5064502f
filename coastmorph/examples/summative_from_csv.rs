// Example: summative characters of a settlement split in two parts
use anyhow::Result;
use coastmorph::collect::layers::measurements_from_csv;
use coastmorph::contextual::summative::{summarize, SummaryOptions, UndefinedPolicy};

fn main() -> Result<()> {
    println!("=== Example: Summative characters from a measurement table ===\n");

    // One row per building; `case` marks the rows along the seashore street
    let csv_data = "\
uID,sdbAre,sdsLen,part,case
1,112.5,48.0,1,1
2,98.0,48.0,1,1
3,143.2,,1,0
4,87.9,,1,0
5,250.4,,1,0
6,64.0,61.5,2,1
7,71.3,61.5,2,1
8,69.8,35.2,2,1
9,180.0,,2,0
";

    let table = measurements_from_csv(csv_data.as_bytes(), "vieira")?;
    println!("Rows: {}, characters: {:?}", table.len(), table.columns());

    let options = SummaryOptions::new(&["sdbAre"], &["sdsLen"]);
    let summary = summarize(&table, &options)?;

    println!("\nSummary columns: {:?}", summary.columns());
    for row in summary.rows() {
        println!("  {}: {:?}", row.label(), row.values());
    }

    let df = summary.to_polars_df()?;
    println!("\nDataFrame created with {} rows and {} columns", df.height(), df.width());
    println!("{}", df);

    // Part 1 has two seashore rows: meanIQ is still defined, but not with one
    let strict = options.with_policy(UndefinedPolicy::Fail);
    match summarize(&table, &strict) {
        Ok(_) => println!("\nEvery statistic is defined"),
        Err(e) => println!("\nStrict policy refused the table: {}", e),
    }

    Ok(())
}
