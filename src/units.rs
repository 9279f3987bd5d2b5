// ---------------------------------------------------------------------------
// Unit text handling
// ---------------------------------------------------------------------------

/// Split a `Name [unit]` column header into its parts.
///
/// `"sur: Current speed [m/s]"` → `("sur: Current speed", Some("m/s"))`.
/// A header without a trailing bracket group comes back unchanged with no
/// unit.
pub fn split_unit_suffix(header: &str) -> (String, Option<String>) {
    let trimmed = header.trim();
    if let Some(rest) = trimmed.strip_suffix(']') {
        if let Some(open) = rest.rfind('[') {
            let name = rest[..open].trim_end();
            let unit = rest[open + 1..].trim();
            if !name.is_empty() && !unit.is_empty() {
                return (name.to_string(), Some(unit.to_string()));
            }
        }
    }
    (trimmed.to_string(), None)
}

/// Return a friendly display string for a raw unit token.
///
/// Model result files often carry enum-style unit names rather than
/// abbreviations (`meter_per_sec`). Known tokens map to their conventional
/// abbreviation; anything else just gets its underscores replaced.
pub fn unit_text(raw: &str) -> String {
    let token = raw.trim();
    let abbrev = match token.to_lowercase().as_str() {
        "meter_per_sec" | "meter_per_second" | "m_per_s" => "m/s",
        "meter" | "metre" => "m",
        "centimeter" | "centimetre" => "cm",
        "millimeter" | "millimetre" => "mm",
        "meter_pow_3_per_sec" | "cubic_meter_per_sec" => "m^3/s",
        "degree" | "degrees" => "deg",
        "degree_celsius" | "deg_c" => "degC",
        "psu" | "practical_salinity_unit" => "PSU",
        "kilogram_per_meter_pow_3" => "kg/m^3",
        "second" | "sec" => "s",
        "hour" => "h",
        _ => return token.replace('_', " "),
    };
    abbrev.to_string()
}
