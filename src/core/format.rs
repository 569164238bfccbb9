/// Whole-dollar USD string with thousands separators, e.g. `$12,345`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0".to_string();
    }

    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

pub fn format_percentage(value: f64) -> String {
    if !value.is_finite() {
        return "0%".to_string();
    }
    // `+ 0.0` turns a rounded -0 into 0.
    format!("{}%", value.round() + 0.0)
}
