//! Critical-review classification.
//!
//! Severity is a property of the rating alone and is independent of the
//! per-tenant alert threshold in [`crate::alert::AlertSettings`].

/// Ratings at or below this value are critical.
pub const CRITICAL_RATING_MAX: f64 = 3.0;

/// `true` iff `rating` is a finite number no greater than
/// [`CRITICAL_RATING_MAX`].
pub fn is_critical(rating: f64) -> bool {
  rating.is_finite() && rating <= CRITICAL_RATING_MAX
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_is_inclusive() {
    assert!(is_critical(1.0));
    assert!(is_critical(3.0));
    assert!(!is_critical(4.0));
    assert!(!is_critical(5.0));
  }

  #[test]
  fn non_finite_ratings_are_never_critical() {
    assert!(!is_critical(f64::NAN));
    assert!(!is_critical(f64::INFINITY));
    assert!(!is_critical(f64::NEG_INFINITY));
  }
}
