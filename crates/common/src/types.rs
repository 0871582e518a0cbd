use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw database value.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw database value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of a user or of a guest session.
    ///
    /// Guest sessions take negative ids and registered users positive
    /// ones. A cart keyed by a guest id behaves exactly like a user's cart.
    UserId
);

impl UserId {
    /// Returns true for an anonymous guest session id.
    pub fn is_guest(&self) -> bool {
        self.0 < 0
    }
}

define_id!(
    /// Identifier of a catalog product.
    ProductId
);

define_id!(
    /// Identifier of a placed order.
    OrderId
);

/// Optimistic-lock counter carried by mutable records.
///
/// A freshly inserted record starts at version 1; every committed write
/// increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a record that has not been written yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version assigned on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_ids_are_negative() {
        assert!(UserId::new(-7).is_guest());
        assert!(!UserId::new(7).is_guest());
    }

    #[test]
    fn ids_of_different_kinds_keep_their_raw_value() {
        let user = UserId::new(7);
        let product = ProductId::from(7);
        assert_eq!(user.as_i64(), product.as_i64());
        assert_eq!(i64::from(OrderId::new(42)), 42);
    }

    #[test]
    fn id_parses_from_path_segment() {
        let id: ProductId = " 15 ".parse().unwrap();
        assert_eq!(id, ProductId::new(15));
        assert!("abc".parse::<OrderId>().is_err());
    }

    #[test]
    fn id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId::new(3)).unwrap();
        assert_eq!(json, "3");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UserId::new(3));
    }

    #[test]
    fn version_increments() {
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::first().next(), Version::new(2));
        assert!(Version::new(2) > Version::first());
    }
}
