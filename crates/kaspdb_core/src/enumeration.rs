//! Enumeration code/text mapping.
//!
//! Enumerated fields are persisted as an integer code by the relational
//! backend and as symbolic text by the document backend. An [`EnumSet`] is
//! the bidirectional lookup between the two, built once per enumeration and
//! never modified afterwards.

use crate::error::{CoreError, CoreResult};
use kaspdb_value::{EnumValue, Value};
use std::collections::BTreeMap;

/// Immutable bidirectional code/text table for one enumeration.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumSet {
    name: &'static str,
    by_code: BTreeMap<i32, &'static str>,
    by_text: BTreeMap<&'static str, i32>,
}

impl EnumSet {
    /// Builds the table from `(text, code)` members.
    ///
    /// # Panics
    ///
    /// Panics if a code or text appears twice; tables are static data and a
    /// duplicate is a programming error.
    #[must_use]
    pub fn new(name: &'static str, members: &[(&'static str, i32)]) -> Self {
        let mut by_code = BTreeMap::new();
        let mut by_text = BTreeMap::new();
        for &(text, code) in members {
            assert!(
                by_code.insert(code, text).is_none(),
                "duplicate code {code} in enumeration {name}"
            );
            assert!(
                by_text.insert(text, code).is_none(),
                "duplicate text {text:?} in enumeration {name}"
            );
        }
        Self {
            name,
            by_code,
            by_text,
        }
    }

    /// Returns the enumeration name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Looks up the text for a code.
    #[must_use]
    pub fn text(&self, code: i32) -> Option<&'static str> {
        self.by_code.get(&code).copied()
    }

    /// Looks up the code for a text.
    #[must_use]
    pub fn code(&self, text: &str) -> Option<i32> {
        self.by_text.get(text).copied()
    }

    /// Builds the value for a code, if it is a member.
    #[must_use]
    pub fn value_of_code(&self, code: i32) -> Option<EnumValue> {
        self.text(code).map(|text| EnumValue::new(code, text))
    }

    /// Builds the value for a text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEnumText`] if the text is not a member.
    pub fn value_of_text(&self, text: &str) -> CoreResult<EnumValue> {
        self.by_text
            .get_key_value(text)
            .map(|(text, code)| EnumValue::new(*code, *text))
            .ok_or_else(|| CoreError::InvalidEnumText {
                enumeration: self.name,
                text: text.to_string(),
            })
    }

    /// Returns true if the value is a consistent member of this set.
    #[must_use]
    pub fn contains(&self, value: &EnumValue) -> bool {
        self.text(value.code) == Some(value.text.as_str())
    }

    /// Iterates members in code order.
    pub fn members(&self) -> impl Iterator<Item = (i32, &'static str)> + '_ {
        self.by_code.iter().map(|(code, text)| (*code, *text))
    }
}

/// A Rust enum persisted through an [`EnumSet`].
pub trait DbEnum: Copy + Sized + 'static {
    /// The lookup table for this enumeration.
    fn enum_set() -> &'static EnumSet;

    /// The persisted code of this member.
    fn code(self) -> i32;

    /// The member for a code.
    fn from_code(code: i32) -> Option<Self>;

    /// The symbolic text of this member.
    fn text(self) -> &'static str {
        Self::enum_set().text(self.code()).unwrap_or("")
    }

    /// The member for a text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEnumText`] for unrecognised text.
    fn from_text(text: &str) -> CoreResult<Self> {
        let value = Self::enum_set().value_of_text(text)?;
        Self::from_code(value.code).ok_or_else(|| CoreError::InvalidEnumText {
            enumeration: Self::enum_set().name(),
            text: text.to_string(),
        })
    }

    /// Converts to a field value.
    fn to_value(self) -> Value {
        Value::Enum(EnumValue::new(self.code(), self.text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static COLOURS: LazyLock<EnumSet> =
        LazyLock::new(|| EnumSet::new("colour", &[("red", 1), ("green", 2)]));

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Colour {
        Red,
        Green,
    }

    impl DbEnum for Colour {
        fn enum_set() -> &'static EnumSet {
            &COLOURS
        }

        fn code(self) -> i32 {
            match self {
                Colour::Red => 1,
                Colour::Green => 2,
            }
        }

        fn from_code(code: i32) -> Option<Self> {
            match code {
                1 => Some(Colour::Red),
                2 => Some(Colour::Green),
                _ => None,
            }
        }
    }

    #[test]
    fn lookup_both_directions() {
        assert_eq!(COLOURS.text(1), Some("red"));
        assert_eq!(COLOURS.code("green"), Some(2));
        assert_eq!(COLOURS.text(9), None);
        assert_eq!(COLOURS.code("blue"), None);
        assert_eq!(COLOURS.value_of_code(2), Some(EnumValue::new(2, "green")));
    }

    #[test]
    fn unknown_text_is_invalid_enum_text() {
        let err = COLOURS.value_of_text("blue").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidEnumText { enumeration: "colour", .. }
        ));
    }

    #[test]
    fn contains_checks_consistency() {
        assert!(COLOURS.contains(&EnumValue::new(1, "red")));
        assert!(!COLOURS.contains(&EnumValue::new(1, "green")));
    }

    #[test]
    fn typed_enum_roundtrip() {
        assert_eq!(Colour::Green.text(), "green");
        assert_eq!(Colour::from_text("red").unwrap(), Colour::Red);
        assert!(Colour::from_text("RED").is_err());
        assert_eq!(Colour::Red.to_value(), Value::Enum(EnumValue::new(1, "red")));
    }

    #[test]
    #[should_panic(expected = "duplicate code")]
    fn duplicate_code_panics() {
        let _ = EnumSet::new("broken", &[("a", 1), ("b", 1)]);
    }
}
