use geojson::JsonObject;
use serde_json::Value;

/// Numeric value of a GeoJSON property, accepting numbers and numeric strings
pub fn property_f64(properties: &JsonObject, key: &str) -> Option<f64> {
    match properties.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_cell(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Flag attributes are stored as `1`/`0`, booleans or strings depending on
/// the GIS that digitised them. Anything absent is false.
pub fn property_flag(properties: &JsonObject, key: &str) -> bool {
    match properties.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |v| v == 1.0),
        Some(Value::String(s)) => parse_flag(s),
        _ => false,
    }
}

/// Label of a GeoJSON property (e.g. the settlement `part`), integers kept
/// without a decimal point
pub fn property_label(properties: &JsonObject, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(number_label(n)),
        _ => None,
    }
}

fn number_label(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Parse a CSV cell into a number; empty cells and `NaN` are missing
pub fn parse_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a textual flag cell
pub fn parse_flag(cell: &str) -> bool {
    matches!(
        cell.trim().to_lowercase().as_str(),
        "1" | "1.0" | "true" | "t" | "yes"
    )
}

/// Map a nodata sentinel to a missing value
pub fn nodata_to_none(value: Option<f64>, nodata: f64) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != nodata)
}

/// Format a float for CSV output, NaN written as an empty cell
pub fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_property_flag() {
        let props = properties(json!({"a": 1, "b": "1", "c": true, "d": 0, "e": null}));
        assert!(property_flag(&props, "a"));
        assert!(property_flag(&props, "b"));
        assert!(property_flag(&props, "c"));
        assert!(!property_flag(&props, "d"));
        assert!(!property_flag(&props, "e"));
        assert!(!property_flag(&props, "missing"));
    }

    #[test]
    fn test_property_label() {
        let props = properties(json!({"part": 2, "float_part": 3.0, "name": " north "}));
        assert_eq!(property_label(&props, "part").as_deref(), Some("2"));
        assert_eq!(property_label(&props, "float_part").as_deref(), Some("3"));
        assert_eq!(property_label(&props, "name").as_deref(), Some("north"));
        assert_eq!(property_label(&props, "missing"), None);
    }

    #[test]
    fn test_property_f64() {
        let props = properties(json!({"min": -999, "max": "12.5", "bad": "x"}));
        assert_eq!(property_f64(&props, "min"), Some(-999.0));
        assert_eq!(property_f64(&props, "max"), Some(12.5));
        assert_eq!(property_f64(&props, "bad"), None);
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell(" 3.5 "), Some(3.5));
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell("NaN"), None);
    }

    #[test]
    fn test_nodata_to_none() {
        assert_eq!(nodata_to_none(Some(-999.0), -999.0), None);
        assert_eq!(nodata_to_none(Some(1.5), -999.0), Some(1.5));
        assert_eq!(nodata_to_none(None, -999.0), None);
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(f64::NAN), "");
        assert_eq!(format_cell(4.0), "4");
    }
}
