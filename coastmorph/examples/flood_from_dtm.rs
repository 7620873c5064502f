// Example: flood exposure of seafront buildings over a DTM tile
use anyhow::Result;
use coastmorph::contextual::flood::{water_relation_default, FloodBuilding};
use coastmorph::geometric::dem::{AsciiGrid, Dtm};
use geo::polygon;

fn main() -> Result<()> {
    println!("=== Example: Flood exposure from a DTM tile ===\n");

    // 4 x 4 tile of 10 m cells, terrain rising inland (northern row first)
    let values = vec![
        12.0, 13.0, 14.0, 15.0, //
        7.0, 8.0, 9.0, 10.0, //
        3.0, 4.0, 5.0, -9999.0, //
        1.0, 2.0, 2.0, 3.0,
    ];
    let grid = AsciiGrid::new(4, 4, 0.0, 0.0, 10.0, -9999.0, values)?;
    let dtm = Dtm::new(vec![grid]);

    let footprints = vec![
        polygon![(x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 20.0), (x: 0.0, y: 20.0), (x: 0.0, y: 0.0)],
        polygon![(x: 20.0, y: 0.0), (x: 40.0, y: 0.0), (x: 40.0, y: 20.0), (x: 20.0, y: 20.0), (x: 20.0, y: 0.0)],
        polygon![(x: 0.0, y: 20.0), (x: 40.0, y: 20.0), (x: 40.0, y: 40.0), (x: 0.0, y: 40.0), (x: 0.0, y: 20.0)],
    ];

    let stats = dtm.building_elevations(&footprints);
    let mut buildings = Vec::new();
    for (idx, (footprint, zonal)) in footprints.into_iter().zip(&stats).enumerate() {
        println!(
            "  Building {}: {} cell(s), min = {:?}, median = {:?}",
            idx + 1,
            zonal.count,
            zonal.min,
            zonal.median
        );
        // the two southern footprints face the sea
        let mut building = FloodBuilding::new(footprint).with_main(idx < 2);
        building.set_zonal_stats(zonal);
        buildings.push(building);
    }

    println!("\nWater relation (+5 m scenario):");
    for row in water_relation_default("furadouro", &buildings) {
        println!(
            "  {}: min_min = {:.2}, min_med = {:.2}, flooded_perc = {:.2}",
            row.place, row.min_min, row.min_med, row.flooded_perc
        );
    }

    Ok(())
}
