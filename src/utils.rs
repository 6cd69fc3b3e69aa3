use statrs::statistics::Statistics;

/// info! that keeps ANSI colour codes only when the display is colourful (terminal output)
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        if $colorful {
            log::info!("{}", message);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&message));
        }
    }};
}

/// Removes ANSI escape sequences (`\x1b[...m`) from a string
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // skip parameters up to the final byte of the sequence
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `steps` evenly spaced values from `start` to `stop`, both included.
/// A single step returns `[start]`, zero steps an empty vector.
pub fn linspace(start: f64, stop: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (stop - start) / (steps - 1) as f64;
            (0..steps)
                .map(|i| if i == steps - 1 { stop } else { start + delta * i as f64 })
                .collect()
        }
    }
}

/// Mean and sample standard deviation of the finite values of a slice.
/// Returns (NaN, NaN) when no finite value is available.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    match finite.len() {
        0 => (f64::NAN, f64::NAN),
        1 => (finite[0], 0.0),
        _ => (finite.iter().mean(), finite.iter().std_dev()),
    }
}

/// Smallest and largest finite values, None if there are none
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(None, |acc, x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
}
