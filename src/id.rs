use std::fmt::{Display, Formatter, Result as FmtResult};

/////////////////////////////////////////////// IdParseError ///////////////////////////////////////////

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    kind: &'static str,
    input: String,
}

impl IdParseError {
    pub(crate) fn new(kind: &'static str, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }

    /// Returns which identifier type failed to parse ("school" or "student").
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl Display for IdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "invalid {} id {:?}: expected a UUID", self.kind, self.input)
    }
}

impl std::error::Error for IdParseError {}

/////////////////////////////////////////////// uuid_id! ///////////////////////////////////////////////

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wraps an existing UUID.
            pub fn new(id: uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generates a fresh random (v4) identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::id::IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| $crate::id::IdParseError::new($kind, s))
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifies a school. Generated once at creation and never regenerated.
    SchoolId,
    "school"
);

uuid_id!(
    /// Identifies a student.
    StudentId,
    "student"
);
