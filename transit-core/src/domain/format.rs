//! Display formatting helpers.

/// Formats a distance in metres for display.
///
/// Distances below one kilometre are shown in whole metres; longer ones in
/// kilometres with `precision` decimal places.
///
/// # Examples
///
/// ```
/// use transit_core::domain::format_distance;
///
/// assert_eq!(format_distance(350, 1), "350 m");
/// assert_eq!(format_distance(1_260, 1), "1.3 km");
/// assert_eq!(format_distance(1_260, 2), "1.26 km");
/// assert_eq!(format_distance(12_000, 0), "12 km");
/// ```
pub fn format_distance(meters: u32, precision: usize) -> String {
    if meters < 1_000 {
        format!("{meters} m")
    } else {
        format!("{:.*} km", precision, f64::from(meters) / 1_000.0)
    }
}
