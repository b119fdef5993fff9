use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A tri-state field update.
///
/// `Keep` leaves the stored value alone, `Clear` writes NULL and `Set` writes the value.
/// In JSON an absent field is `Keep` (use `#[serde(default)]` on the field), an explicit
/// `null` is `Clear` and anything else is `Set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Value to write, or `None` when the field should be left untouched.
    pub fn as_write(&self) -> Option<Option<&T>> {
        match self {
            Self::Keep => None,
            Self::Clear => Some(None),
            Self::Set(v) => Some(Some(v)),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Set(v) => serializer.serialize_some(v),
            _ => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        name: Patch<String>,
    }

    #[test]
    fn absent_null_and_value() {
        let absent: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.name, Patch::Keep);

        let null: Body = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(null.name, Patch::Clear);

        let set: Body = serde_json::from_str(r#"{"name": "ada"}"#).unwrap();
        assert_eq!(set.name, Patch::Set("ada".to_string()));
    }

    #[test]
    fn as_write_shapes() {
        assert_eq!(Patch::<i32>::Keep.as_write(), None);
        assert_eq!(Patch::<i32>::Clear.as_write(), Some(None));
        assert_eq!(Patch::Set(3).as_write(), Some(Some(&3)));
    }
}
