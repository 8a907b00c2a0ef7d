//! # format
//!
//! Display helpers used when narration is rendered to text at the
//! presentation boundary. Nothing in the engine parses these strings back.

/// Formats with between `min` and `max` fraction digits, trimming trailing
/// zeros beyond `min`, and groups the integer part by thousands.
fn fixed(value: f64, min: usize, max: usize) -> String {
    let raw = format!("{:.*}", max, value.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (raw.clone(), String::new()),
    };

    let mut frac = frac_part;
    while frac.len() > min && frac.ends_with('0') {
        frac.pop();
    }

    let mut out = String::new();
    if value < 0.0 && (int_part.chars().any(|c| c != '0') || frac.chars().any(|c| c != '0')) {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Price with precision scaled to its magnitude: `98,234`, `178.50`,
/// `1.2345`, `0.000023`.
pub fn format_price(price: f64) -> String {
    let abs = price.abs();
    if abs >= 10_000.0 {
        fixed(price, 0, 0)
    } else if abs >= 100.0 {
        fixed(price, 2, 2)
    } else if abs >= 1.0 {
        fixed(price, 2, 4)
    } else {
        fixed(price, 4, 6)
    }
}

/// Dollar amount, e.g. `$1,234.50`.
pub fn format_usd(value: f64) -> String {
    format!("${}", fixed(value, 2, 2))
}

/// Signed P&L, e.g. `+$150.00` or `-$100.00`.
pub fn format_pnl(pnl: f64) -> String {
    let sign = if pnl >= 0.0 { "+" } else { "-" };
    format!("{sign}${}", fixed(pnl.abs(), 2, 2))
}

/// Signed percent, e.g. `+15.00%`.
pub fn format_percent(percent: f64) -> String {
    let sign = if percent >= 0.0 { "+" } else { "" };
    format!("{sign}{percent:.2}%")
}

pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn format_time_ago(secs: i64) -> String {
    let secs = secs.max(0);
    match secs {
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}
