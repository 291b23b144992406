//! Asset and resource identifiers.

use uuid::Uuid;

/// Stable 16-byte identifier for an asset (material, geometry, scene).
///
/// Keys are minted by the cooking pipeline and stored in container indices;
/// at runtime they are opaque. [`AssetKey::generate`] produces a fresh
/// random key for in-memory assets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey([u8; 16]);

impl AssetKey {
    /// The all-zero key. Never a valid asset identity.
    pub const NIL: Self = Self([0; 16]);

    /// Wraps raw key bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Whether this is the all-zero key.
    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }

    /// Mints a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0))
    }
}

impl std::fmt::Debug for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetKey({})", Uuid::from_bytes(self.0))
    }
}

/// Integer key for a cached resource instance (texture, buffer).
///
/// The top byte is a namespace tag so cooked keys and the two synthetic
/// families can never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ResourceKey(u64);

impl ResourceKey {
    pub(crate) const SYNTHETIC_TEXTURE_TAG: u64 = 0x54 << 56;
    pub(crate) const SYNTHETIC_BUFFER_TAG: u64 = 0x42 << 56;

    /// Wraps a raw key value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw key value.
    #[inline]
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Builds a synthetic texture key from a counter value.
    #[inline]
    #[must_use]
    pub(crate) const fn synthetic_texture(n: u64) -> Self {
        Self(Self::SYNTHETIC_TEXTURE_TAG | n)
    }

    /// Builds a synthetic buffer key from a counter value.
    #[inline]
    #[must_use]
    pub(crate) const fn synthetic_buffer(n: u64) -> Self {
        Self(Self::SYNTHETIC_BUFFER_TAG | n)
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_families_do_not_collide() {
        let t = ResourceKey::synthetic_texture(7);
        let b = ResourceKey::synthetic_buffer(7);
        assert_ne!(t, b);
        assert_ne!(t, ResourceKey::from_raw(7));
    }

    #[test]
    fn nil_key_detected() {
        assert!(AssetKey::NIL.is_nil());
        assert!(!AssetKey::generate().is_nil());
    }
}
