use std::cmp::Ordering;

/// Orders two dotted version strings such as `"1.2.0.1"`.
///
/// Fields are compared numerically from left to right; a field that is not a
/// number counts as `0`, and fields may be negative. When every field the two versions share is equal,
/// the version with more fields is the greater one, so `"1.2" < "1.2.0"`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let fields_a: Vec<i64> = a.split('.').map(version_field).collect();
    let fields_b: Vec<i64> = b.split('.').map(version_field).collect();

    fields_a.iter().zip(fields_b.iter()).map(|(x, y)| x.cmp(y)).find(|ord| ord.is_ne()).unwrap_or_else(|| fields_a.len().cmp(&fields_b.len()))
}

fn version_field(field: &str) -> i64 {
    field.parse().unwrap_or(0)
}
