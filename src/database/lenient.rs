//! Lenient numeric fields.
//!
//! Older writers stored counters and timestamps as doubles. These helpers
//! read any BSON number into an `i64`, truncating the fraction.

use mongodb::bson::Bson;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

fn to_int(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.is_finite() => Some(n.trunc() as i64),
        _ => None,
    }
}

/// `#[serde(deserialize_with = "lenient::int")]`
pub(crate) fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Bson::deserialize(deserializer)?;
    to_int(&value).ok_or_else(|| D::Error::custom(format!("expected a number, found {value}")))
}

/// `#[serde(default, deserialize_with = "lenient::opt_int")]`
pub(crate) fn opt_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Bson::deserialize(deserializer)? {
        Bson::Null | Bson::Undefined => Ok(None),
        value => to_int(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a number or null, found {value}"))),
    }
}

/// Integer view of a loose counter value, if it is a number.
pub(crate) fn counter(value: &Bson) -> Option<i64> {
    to_int(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "int")]
        count: i64,
        #[serde(default, deserialize_with = "opt_int")]
        at: Option<i64>,
    }

    #[test]
    fn test_reads_any_number_width() {
        let sample: Sample = bson::from_document(doc! { "count": 3.0, "at": 1_700_000_000.25 }).unwrap();
        assert_eq!(sample.count, 3);
        assert_eq!(sample.at, Some(1_700_000_000));

        let sample: Sample = bson::from_document(doc! { "count": 4_i32, "at": null }).unwrap();
        assert_eq!(sample.count, 4);
        assert_eq!(sample.at, None);

        let sample: Sample = bson::from_document(doc! { "count": 5_i64 }).unwrap();
        assert_eq!(sample.at, None);
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert!(bson::from_document::<Sample>(doc! { "count": "many" }).is_err());
        assert!(bson::from_document::<Sample>(doc! { "count": 1_i64, "at": true }).is_err());
    }
}
