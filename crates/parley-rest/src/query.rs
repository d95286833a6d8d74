//! PostgREST query-string builders.

use std::fmt::Display;

use uuid::Uuid;

/// `eq.<value>`
pub fn eq(value: impl Display) -> String { format!("eq.{value}") }

/// `in.(<a>,<b>,...)`
pub fn in_list(ids: &[Uuid]) -> String {
  let joined = ids
    .iter()
    .map(Uuid::to_string)
    .collect::<Vec<_>>()
    .join(",");
  format!("in.({joined})")
}

/// `(customer_id.eq.<id>,assessor_id.eq.<id>)`, for the `or` parameter.
pub fn either_participant(user_id: Uuid) -> String {
  format!("(customer_id.eq.{user_id},assessor_id.eq.{user_id})")
}

pub fn ascending(column: &str) -> String { format!("{column}.asc") }

pub fn descending(column: &str) -> String { format!("{column}.desc") }

/// Columns requested from the collections owned by other services.
pub const PROFILE_COLUMNS: &str = "id,full_name,email,phone,role";
pub const ASSESSMENT_COLUMNS: &str = "id,title,registration,status";

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builds_filter_expressions() {
    let a = Uuid::nil();
    let b = Uuid::from_u128(1);
    assert_eq!(eq(a), format!("eq.{a}"));
    assert_eq!(in_list(&[a, b]), format!("in.({a},{b})"));
    assert_eq!(
      either_participant(a),
      format!("(customer_id.eq.{a},assessor_id.eq.{a})")
    );
    assert_eq!(descending("updated_at"), "updated_at.desc");
    assert_eq!(ascending("created_at"), "created_at.asc");
  }
}
