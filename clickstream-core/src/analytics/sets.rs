//! Distinct values and set difference.
//!
//! Membership is by value: duplicates collapse to one, and null is kept as
//! an ordinary member rather than dropped.

use super::frame::{EventFrame, KeySelector};
use crate::error::Result;
use crate::types::Value;
use std::collections::BTreeSet;

/// A set of values. Iterates in [`Value`] order.
pub type ValueSet = BTreeSet<Value>;

/// Distinct values of one selector across a frame.
pub fn distinct_values(frame: &EventFrame<'_>, selector: &KeySelector) -> Result<ValueSet> {
    let key = frame.resolve(selector)?;
    Ok((0..frame.len()).map(|row| frame.read(row, &key)).collect())
}

/// Values in `a` that are not in `b`.
pub fn set_difference(a: &ValueSet, b: &ValueSet) -> ValueSet {
    a.difference(b).cloned().collect()
}

pub fn count_distinct(frame: &EventFrame<'_>, selector: &KeySelector) -> Result<usize> {
    distinct_values(frame, selector).map(|set| set.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventRecord, Field, UserId};

    fn set(values: &[&str]) -> ValueSet {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn test_distinct_collapses_duplicates() {
        let records = vec![
            EventRecord::new("1", 1, "Home"),
            EventRecord::new("2", 2, "Home"),
            EventRecord::new("1", 3, "NextSong"),
        ];
        let frame = EventFrame::new(&records);
        let pages = distinct_values(&frame, &Field::Page.into()).unwrap();
        assert_eq!(pages, set(&["Home", "NextSong"]));
    }

    #[test]
    fn test_null_is_a_member() {
        let records = vec![
            EventRecord::new("1", 1, "NextSong").with_artist("Muse"),
            EventRecord::new("1", 2, "Home"),
            EventRecord::new("1", 3, "Home"),
        ];
        let frame = EventFrame::new(&records);
        let artists = distinct_values(&frame, &Field::Artist.into()).unwrap();
        assert_eq!(artists.len(), 2);
        assert!(artists.contains(&Value::Null));
        assert_eq!(count_distinct(&frame, &Field::Artist.into()).unwrap(), 2);
    }

    #[test]
    fn test_set_difference() {
        let all = set(&["Home", "NextSong", "Error", "Login"]);
        let visited = set(&["Home", "Error"]);
        assert_eq!(set_difference(&all, &visited), set(&["NextSong", "Login"]));
        assert!(set_difference(&visited, &all).is_empty());
    }

    #[test]
    fn test_anonymous_and_missing_users_stay_distinct() {
        let records = vec![
            EventRecord::new("", 1, "Home"),
            EventRecord::new(UserId::Missing, 2, "Home"),
            EventRecord::new("7", 3, "Home"),
        ];
        let frame = EventFrame::new(&records);
        let users = distinct_values(&frame, &Field::UserId.into()).unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.contains(&Value::from("")));
        assert!(users.contains(&Value::Null));
    }
}
