//! Glyph encoders for the optional graph lines.
//!
//! Both functions are pure: same input, same output, no hidden state.

/// Encodes the change in used physical memory (decimal GB) between two
/// consecutive samples as a bounded glyph string.
///
/// `#` runs mark growth and end in `*`; `:` runs mark shrinkage and end in
/// `@`; `o` and `@` right after the bar mark changes too small to chart.
/// The run length is proportional to the change, one glyph per 0.01 GB.
/// The first sample of a run has no predecessor and encodes as a positive
/// infinitesimal of the current value.
pub fn memory_delta(curr: f64, prev: Option<f64>) -> String {
    let diff = match prev {
        Some(prev) => curr - prev,
        None => return format!("|o 0.00 ({curr:.2})"),
    };

    if (0.0..0.01).contains(&diff) {
        format!("|o 0.00 ({curr:.2})")
    } else if diff <= 0.0 && diff > -0.01 {
        format!("|@ 0.00 ({curr:.2})")
    } else if diff > 0.0 {
        // round() keeps a 0.01 step at exactly one glyph despite the
        // floating-point residue of the subtraction.
        let run = "#".repeat((diff * 100.0).round() as usize);
        format!("|{run}* {diff:.2} ({curr:.2})")
    } else {
        let run = ":".repeat((-diff * 100.0).round() as usize);
        format!("|{run}@ {diff:.2} ({curr:.2})")
    }
}

/// Encodes current CPU utilization as a bar, one `|` per two percent,
/// followed by the value itself.
pub fn cpu_bar(percent: f64) -> String {
    let run = if percent.is_finite() && percent > 0.0 {
        "|".repeat((percent / 2.0) as usize)
    } else {
        String::new()
    };
    format!("{run} {percent:.2}")
}
