//! Newtype IDs for type-safe entity references.
//!
//! Every table keyed by a serial gets its own wrapper, so a size id cannot
//! be passed where a user id is expected.

/// Define serial-backed ID wrappers.
///
/// Each wrapper serializes as a bare number, prints as one, and (with the
/// `postgres` feature) binds and decodes as `INTEGER`. Doc comments written
/// before a name are attached to its type.
///
/// ```rust
/// # use sample_depot_core::define_id;
/// define_id! {
///     /// A storage bin.
///     BinId,
///     PalletId,
/// }
///
/// assert_eq!(BinId::new(3).as_i32(), 3);
/// // let _: BinId = PalletId::new(3); // mismatched types
/// ```
#[macro_export]
macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }
    )+};
}

define_id! {
    /// A size record; stable across box moves and clears.
    SizeId,
    ShipmentId,
    UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = SizeId::new(42);
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("42"));
        let parsed: UserId = serde_json::from_str("7").unwrap_or(UserId::new(0));
        assert_eq!(parsed, UserId::new(7));
    }

    #[test]
    fn test_id_display() {
        let id = ShipmentId::new(12);
        assert_eq!(id.to_string(), "12");
        assert_eq!(format!("{id:>4}"), "  12");
        assert_eq!(id.as_i32(), 12);
    }
}
