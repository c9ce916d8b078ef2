use log::warn;

/// Calls `func` with each candidate in order until one succeeds.
///
/// On failure every candidate is returned together with the error it produced,
/// in the order they were tried. An empty candidate list yields an empty list
/// of failures.
pub fn first_success<C, T, E, F>(candidates: &[C], mut func: F) -> Result<T, Vec<(C, E)>>
where
    C: Clone,
    E: std::fmt::Display,
    F: FnMut(&C) -> Result<T, E>,
{
    let mut failures = Vec::new();

    for candidate in candidates {
        match func(candidate) {
            Ok(ok) => return Ok(ok),
            Err(err) => {
                warn!("attempt {} of {} failed: {err}", failures.len() + 1, candidates.len());
                failures.push((candidate.clone(), err));
            }
        }
    }

    Err(failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_success_stops_at_first_ok() {
        let mut calls = 0;
        let res = first_success(&[1, 2, 3], |n| {
            calls += 1;
            if *n == 2 { Ok(n * 10) } else { Err(format!("no {n}")) }
        });

        assert_eq!(res, Ok(20));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_first_success_collects_failures_in_order() {
        let res: Result<(), _> = first_success(&["a", "b"], |s| Err(format!("bad {s}")));

        assert_eq!(res, Err(vec![("a", "bad a".to_string()), ("b", "bad b".to_string())]));
    }

    #[test]
    fn test_first_success_empty() {
        let res: Result<(), Vec<(u8, String)>> = first_success(&[], |_| Ok(()));
        assert_eq!(res, Err(vec![]));
    }
}
