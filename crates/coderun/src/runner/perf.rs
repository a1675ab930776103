//! Performance marker protocol
//!
//! Instrumented programs report their own execution time and memory usage
//! by ending stdout with this block:
//!
//! ```text
//! <user output>\n
//! --- Performance Metrics ---\n
//! Execution time: <seconds> seconds\n
//! Memory usage: <megabytes> MB\n
//! ```
//!
//! The newline before the header belongs to the block (the driver always
//! writes it), so removing the block leaves the user's bytes untouched. The
//! final newline is optional. Numbers must be finite and non-negative. The
//! block is only recognized as the very end of stdout; anything else leaves
//! the output as it is.

/// Header line that introduces the marker lines
pub const MARKER_HEADER: &str = "--- Performance Metrics ---";

const TIME_PREFIX: &str = "Execution time: ";
const TIME_SUFFIX: &str = " seconds";
const MEMORY_PREFIX: &str = "Memory usage: ";
const MEMORY_SUFFIX: &str = " MB";

/// Values reported by an instrumented program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceMarkers {
    pub elapsed_seconds: f64,
    pub memory_megabytes: f64,
}

impl PerformanceMarkers {
    /// Render the block exactly as an instrumented program prints it
    pub fn render(&self) -> String {
        format!(
            "\n{MARKER_HEADER}\n{TIME_PREFIX}{:.6}{TIME_SUFFIX}\n{MEMORY_PREFIX}{:.2}{MEMORY_SUFFIX}\n",
            self.elapsed_seconds, self.memory_megabytes
        )
    }
}

/// Split stdout into user output and markers
///
/// Returns the stdout unchanged together with `None` when there is no
/// well-formed marker block at its end.
pub fn extract(stdout: &str) -> (&str, Option<PerformanceMarkers>) {
    match parse_suffix(stdout) {
        Some((user_len, markers)) => (&stdout[..user_len], Some(markers)),
        None => (stdout, None),
    }
}

fn parse_suffix(stdout: &str) -> Option<(usize, PerformanceMarkers)> {
    let body = stdout.strip_suffix('\n').unwrap_or(stdout);

    let (rest, memory_line) = body.rsplit_once('\n')?;
    let (rest, time_line) = rest.rsplit_once('\n')?;
    let (user, header) = rest.rsplit_once('\n')?;

    if header != MARKER_HEADER {
        return None;
    }

    let elapsed_seconds = parse_value(time_line, TIME_PREFIX, TIME_SUFFIX)?;
    let memory_megabytes = parse_value(memory_line, MEMORY_PREFIX, MEMORY_SUFFIX)?;

    Some((
        user.len(),
        PerformanceMarkers {
            elapsed_seconds,
            memory_megabytes,
        },
    ))
}

fn parse_value(line: &str, prefix: &str, suffix: &str) -> Option<f64> {
    let number = line.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
