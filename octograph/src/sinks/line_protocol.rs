use octograph_domain::domain::Point;

/// Backslash-escapes commas, spaces and equals signs, which delimit keys
/// and values in line protocol.
fn escape_ident(s: &str, out: &mut String) {
    for ch in s.chars() {
        if matches!(ch, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(ch);
    }
}

fn push_tag(out: &mut String, key: &str, value: &str) {
    out.push(',');
    escape_ident(key, out);
    out.push('=');
    escape_ident(value, out);
}

/// Unsuffixed numbers are floats in line protocol.
fn push_fields(out: &mut String, fields: &[(&str, f64)]) {
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        escape_ident(key, out);
        out.push('=');
        out.push_str(&value.to_string());
    }
}

/// Appends one line, without the trailing newline.
///
/// Measurement, tags and timestamp are the series key, so writing the same
/// interval again replaces the earlier values.
pub fn write_point(point: &Point, out: &mut String) {
    escape_ident(point.measurement.as_str(), out);

    push_tag(out, "active_rate", point.tags.active_rate);
    push_tag(out, "time_of_day", &point.tags.time_of_day);

    out.push(' ');
    let f = &point.fields;
    push_fields(
        out,
        &[
            ("consumption", f.consumption),
            ("cost", f.cost),
            ("total_cost", f.total_cost),
            ("standing_charge", f.standing_charge),
            ("unit_charge", f.unit_charge),
        ],
    );

    out.push(' ');
    out.push_str(&point.timestamp.unix_timestamp_nanos().to_string());
}

pub fn encode_batch(points: &[Point]) -> String {
    // Heuristic capacity: ~180 bytes per line.
    let mut s = String::with_capacity(points.len().saturating_mul(180));
    for point in points {
        write_point(point, &mut s);
        s.push('\n');
    }
    s
}
