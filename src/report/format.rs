//! Human-readable formatting of benchmark values.

/// Time units and their size in seconds, smallest first
const TIME_UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("μs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
    ("d", 86400.0),
];

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a float with `significant` significant digits, dropping trailing zeros.
pub fn human_float(value: f64, significant: i32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return format!("{value}");
    }

    let (sign, value) = if value < 0.0 { ("-", -value) } else { ("", value) };
    let magnitude = value.log10().floor() as i32 + 1;
    let digits = significant - magnitude;

    let formatted = if magnitude <= -5 || magnitude >= 9 {
        format!("{:.*e}", (significant - 1).max(0) as usize, value)
    } else if digits <= 0 {
        let scale = 10f64.powi(-digits);
        format!("{}", ((value / scale).round() * scale) as i64)
    } else {
        let s = format!("{:.*}", digits as usize, value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    };

    format!("{sign}{formatted}")
}

/// Round a positive finite value to `significant` digits. Units are picked
/// from this so that e.g. 0.9996s shows as "1s" rather than "1000ms".
fn round_significant(value: f64, significant: i32) -> f64 {
    let shift = significant - 1 - value.log10().floor() as i32;
    let rounded = if shift >= 0 {
        let scale = 10f64.powi(shift);
        (value * scale).round() / scale
    } else {
        let scale = 10f64.powi(-shift);
        (value / scale).round() * scale
    };
    if rounded.is_finite() && rounded > 0.0 { rounded } else { value }
}

/// Format seconds with the largest time unit not exceeding the value.
pub fn human_time(seconds: f64) -> String {
    if seconds == 0.0 || !seconds.is_finite() {
        return human_float(seconds, 3);
    }
    let magnitude = round_significant(seconds.abs(), 3);
    let (unit, size) = TIME_UNITS
        .iter()
        .rev()
        .find(|(_, size)| magnitude >= *size)
        .copied()
        .unwrap_or(TIME_UNITS[0]);
    format!("{}{unit}", human_float(magnitude.copysign(seconds) / size, 3))
}

/// Format a byte count with decimal (1000-based) units.
pub fn human_file_size(bytes: f64) -> String {
    if bytes == 0.0 || !bytes.is_finite() {
        return format!("{}B", human_float(bytes, 3));
    }
    let mut scaled = round_significant(bytes.abs(), 3);
    let mut scale = 0;
    while scaled >= 1000.0 && scale < SIZE_UNITS.len() - 1 {
        scaled /= 1000.0;
        scale += 1;
    }
    format!("{}{}", human_float(scaled.copysign(bytes), 3), SIZE_UNITS[scale])
}

/// Format a value according to its benchmark unit.
pub fn human_value(value: f64, unit: &str) -> String {
    match unit {
        "seconds" => human_time(value),
        "bytes" => human_file_size(value),
        _ => human_float(value, 3),
    }
}

/// Shorten `name` to `width` characters by keeping its tail behind `...`.
pub fn truncate_left(name: &str, width: usize) -> String {
    let len = name.chars().count();
    if len <= width {
        return name.to_string();
    }
    let keep = width.saturating_sub(3);
    let tail: String = name.chars().skip(len - keep).collect();
    format!("{}{tail}", &"..."[..width.min(3)])
}
