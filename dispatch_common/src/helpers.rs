use std::str::FromStr;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parses a strictly positive number (e.g. a radius, or a number of seconds). Zero, negative and unparseable values
/// yield `None`, so that the caller can fall back to a default.
pub fn parse_positive_number<T>(value: &str) -> Option<T>
where T: FromStr + PartialOrd + Default {
    value.trim().parse::<T>().ok().filter(|v| *v > T::default())
}
