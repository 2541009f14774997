use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw storage identifier.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw storage identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse::<i64>().map(Self).map_err(|error| {
                    AppError::Validation(format!(
                        concat!("invalid ", $label, " '{}': {}"),
                        value, error
                    ))
                })
            }
        }
    };
}

integer_id!(
    /// Identifier of a form container instance.
    ContainerId,
    "container id"
);
integer_id!(
    /// Identifier of an entry within a container.
    EntryId,
    "entry id"
);
integer_id!(
    /// Identifier of a field definition.
    FieldId,
    "field id"
);
integer_id!(
    /// Identifier of a user account.
    UserId,
    "user id"
);
integer_id!(
    /// Identifier of a user group.
    GroupId,
    "group id"
);
integer_id!(
    /// Identifier of a persisted content row.
    ContentId,
    "content id"
);
