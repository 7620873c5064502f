// Example: seashore street orientation against the south-west wind
// The street layer flags the seashore segments with `case = 1`
use anyhow::Result;
use coastmorph::collect::layers::street_segments_from_geojson;
use coastmorph::geometric::street::canonical_path;
use coastmorph::geometric::wind::{bearing, sw_wind_deviation, wind_deviation};

fn main() -> Result<()> {
    println!("=== Example: Wind deviation of a seashore street ===\n");

    // Coordinates in EPSG:3763 (metres)
    let geojson_data = r#"
    {
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"case": 1, "name": "Avenida Marginal"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-88200.0, 101300.0], [-88150.0, 101420.0]]
                }
            },
            {
                "type": "Feature",
                "properties": {"case": 1, "name": "Avenida Marginal"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-88150.0, 101420.0], [-88080.0, 101560.0]]
                }
            },
            {
                "type": "Feature",
                "properties": {"case": 1, "name": "Largo do Farol"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-87900.0, 101800.0], [-87880.0, 101830.0]]
                }
            },
            {
                "type": "Feature",
                "properties": {"case": 0, "name": "Rua Direita"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-88150.0, 101420.0], [-88300.0, 101440.0]]
                }
            }
        ]
    }
    "#;

    let segments = street_segments_from_geojson(geojson_data.as_bytes())?;
    let seashore: Vec<_> = segments
        .iter()
        .filter(|s| s.case)
        .map(|s| s.geometry.clone())
        .collect();
    println!("Street segments loaded: {} ({} on the seashore)", segments.len(), seashore.len());

    let path = canonical_path(&seashore)?;
    println!("Longest merged seashore path: {} vertices", path.0.len());
    println!("Bearing: {:.2} degrees from north", bearing(&path)?);

    println!("\nDeviation from the SW wind (0 = parallel, 1 = perpendicular):");
    println!("  - winddev = {:.4}", sw_wind_deviation(&segments)?);

    // Same street against a westerly wind
    println!("  - against a 90 degree wind = {:.4}", wind_deviation(&segments, 90.0)?);

    Ok(())
}
