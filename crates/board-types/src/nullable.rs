//! Patch fields that can be cleared.
//!
//! A clearable field is `Option<Option<T>>`: absent leaves the column alone,
//! `Some(None)` writes `null`, `Some(Some(v))` writes `v`. Serde folds an
//! explicit `null` into the outer `None` unless the field deserialises
//! through [`deserialize`].

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
