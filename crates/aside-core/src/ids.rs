//! Branded ID newtypes and the fingerprint derivation.
//!
//! IDs that cross component boundaries get distinct newtypes so a task id
//! cannot be passed where a message id is expected. String-backed ids use
//! UUID v7 (time-ordered) when generated locally; host-assigned ids are
//! wrapped as-is.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Inner string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// Identifier of a configured sidecar task ("addon").
    ///
    /// Assigned by the hosting configuration UI; never generated here except
    /// in tests.
    TaskId
}

string_id! {
    /// Stable identifier of a chat message, independent of its position.
    MessageId
}

string_id! {
    /// Identifier of one scheduler cycle, carried through tracing spans.
    RunId
}

/// Stable index of a message in the ordered chat log.
///
/// Position 0 is the seed/greeting message and is never processed.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(usize);

impl Position {
    /// Wrap a raw log index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw log index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Whether this is the seed/greeting slot.
    #[must_use]
    pub const fn is_seed(self) -> bool {
        self.0 == 0
    }

    /// The immediately preceding position, if any.
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self.0 {
            0 => None,
            n => Some(Self(n - 1)),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one alternate generation occupying a message's slot.
///
/// Variant ids are small per-message indices and may be reused after a
/// regeneration; the [`Fingerprint`] exists because of that reuse.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VariantId(u32);

impl VariantId {
    /// Wrap a raw variant index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw variant index.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived identity of a specific generation of a variant.
///
/// Computed from (position, variant id, generation marker). The marker is
/// monotonic per variant slot, so regenerating content that reuses a variant
/// id still yields a distinct fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for one generation of a variant.
    #[must_use]
    pub fn derive(position: Position, variant: VariantId, generation: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{generation}", position.index(), variant.get()).as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(16);
        for byte in &digest[..8] {
            use fmt::Write as _;
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Hex digest string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
