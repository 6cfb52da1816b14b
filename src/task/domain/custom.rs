//! Closed sets of custom field identifiers carried by every task.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed custom-field enum with its storage names.
macro_rules! custom_field_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$variant_meta:meta])* $variant:ident => $key:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $name {
            /// Every field of the set, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the canonical key used in storage and filters.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $key),+
                }
            }
        }

        impl FromStr for $name {
            type Err = TaskDomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|field| field.as_str() == normalized)
                    .ok_or_else(|| TaskDomainError::UnknownCustomField(value.to_owned()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = TaskDomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(field: $name) -> Self {
                field.as_str().to_owned()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

custom_field_set!(
    /// Free-text custom fields of a task.
    CustomField {
        /// Custom text field 1.
        Custom1 => "custom_1",
        /// Custom text field 2.
        Custom2 => "custom_2",
        /// Custom text field 3.
        Custom3 => "custom_3",
        /// Custom text field 4.
        Custom4 => "custom_4",
        /// Custom text field 5.
        Custom5 => "custom_5",
        /// Custom text field 6.
        Custom6 => "custom_6",
        /// Custom text field 7.
        Custom7 => "custom_7",
        /// Custom text field 8.
        Custom8 => "custom_8",
        /// Custom text field 9.
        Custom9 => "custom_9",
        /// Custom text field 10.
        Custom10 => "custom_10",
        /// Custom text field 11.
        Custom11 => "custom_11",
        /// Custom text field 12.
        Custom12 => "custom_12",
        /// Custom text field 13.
        Custom13 => "custom_13",
        /// Custom text field 14.
        Custom14 => "custom_14",
        /// Custom text field 15.
        Custom15 => "custom_15",
        /// Custom text field 16.
        Custom16 => "custom_16",
    }
);

custom_field_set!(
    /// Integer custom fields of a task.
    CustomIntField {
        /// Custom integer field 1.
        CustomInt1 => "custom_int_1",
        /// Custom integer field 2.
        CustomInt2 => "custom_int_2",
        /// Custom integer field 3.
        CustomInt3 => "custom_int_3",
        /// Custom integer field 4.
        CustomInt4 => "custom_int_4",
        /// Custom integer field 5.
        CustomInt5 => "custom_int_5",
        /// Custom integer field 6.
        CustomInt6 => "custom_int_6",
        /// Custom integer field 7.
        CustomInt7 => "custom_int_7",
        /// Custom integer field 8.
        CustomInt8 => "custom_int_8",
    }
);
