// Example: full study run over a data folder
// Usage: cargo run --example study_run -- <data folder> [output folder] [options.json]
use anyhow::Result;
use coastmorph::collect::study::{Study, StudyOptions};
use coastmorph::geometric::dem::Dtm;

fn main() -> Result<()> {
    println!("=== Example: Coastal settlements study ===\n");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let data_path = args.first().cloned();
    let output_path = args.get(1).cloned();
    let options = match args.get(2) {
        Some(path) => StudyOptions::from_json_file(path)?,
        None => StudyOptions::default(),
    };

    let study = Study::with_options(data_path, output_path, options);
    println!("Data folder: {:?}", study.data_path());
    println!("Output folder: {:?}", study.output_path());
    println!("Regions: {:?}\n", study.options.regions);

    // DTM tiles are optional; without them the `min` attribute of the
    // building layers is used
    let dtm_dir = study.data_path().join("dtm");
    let dtm = if dtm_dir.is_dir() {
        Some(Dtm::from_dir(&dtm_dir)?)
    } else {
        None
    };

    study.run(dtm.as_ref())?;

    println!("\nStudy finished");
    Ok(())
}
