//! Field conversions applied before a value is written to an instrument.

/// Unit suffix on the reported wifi signal.
pub const DBM_SUFFIX: &str = "dBm";

/// Maps a boolean flag to a gauge value: 1 for true, 0 for false.
#[inline]
pub fn flag(value: bool) -> i64 {
    i64::from(value)
}

/// Parses a signal strength such as `-47dBm`.
///
/// The suffix is stripped only on an exact, case-sensitive match.
/// Returns `None` if what remains is not a number.
pub fn parse_dbm(raw: &str) -> Option<f64> {
    raw.strip_suffix(DBM_SUFFIX).unwrap_or(raw).parse().ok()
}
