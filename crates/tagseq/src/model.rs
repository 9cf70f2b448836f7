use core::fmt;

use crate::{Error, Result, format::TagFormat};

/// Default minimum digit width for tag formats created without an explicit
/// padding.
pub const DEFAULT_ZERO_PADDING: u32 = 3;

/// Widest padding a tag format may request.
pub const MAX_ZERO_PADDING: u32 = 12;

/// Longest prefix a tag format may carry, in characters.
pub const MAX_PREFIX_LEN: usize = 32;

/// Number handed out first when a tag format does not specify one.
pub const DEFAULT_STARTING_NUMBER: u64 = 1;

/// Tenant scope. Every sequence and asset belongs to exactly one tenant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identifier of an asset category.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CategoryId(String);

impl CategoryId {
    /// Wraps a category identifier, rejecting blank values.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when `raw` is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::InvalidInput {
                reason: "category_id must not be empty".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unique key of a [`SequenceConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceKey {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
}

impl SequenceKey {
    pub const fn new(tenant_id: TenantId, category_id: CategoryId) -> Self {
        Self {
            tenant_id,
            category_id,
        }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant {} category {}", self.tenant_id, self.category_id)
    }
}

/// Persisted tag sequence for one category of one tenant.
///
/// `current_number` is the next number the allocator will offer. It only
/// moves forward through the reservation committer (or an explicit admin
/// reset).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceConfig {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub prefix: String,
    pub current_number: u64,
    pub zero_padding: u32,
}

impl SequenceConfig {
    pub fn key(&self) -> SequenceKey {
        SequenceKey::new(self.tenant_id, self.category_id.clone())
    }

    pub fn format(&self) -> TagFormat<'_> {
        TagFormat::new(&self.prefix, self.zero_padding)
    }

    /// The identifier the allocator offers when nothing collides.
    pub fn candidate(&self) -> String {
        self.format().format(self.current_number)
    }
}

/// A validated request to configure a category's tag format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSequenceConfig {
    pub category_id: CategoryId,
    pub prefix: String,
    pub starting_number: Option<u64>,
    pub zero_padding: Option<u32>,
}

impl NewSequenceConfig {
    /// Validates the request and binds it to `tenant_id`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the prefix is too long or contains
    /// whitespace/control characters, or the padding is outside
    /// `1..=MAX_ZERO_PADDING`.
    pub fn into_config(self, tenant_id: TenantId) -> Result<SequenceConfig> {
        if self.prefix.chars().count() > MAX_PREFIX_LEN {
            return Err(Error::InvalidInput {
                reason: format!("prefix must be at most {MAX_PREFIX_LEN} characters"),
            });
        }
        if self
            .prefix
            .chars()
            .any(|c| c.is_control() || c.is_whitespace())
        {
            return Err(Error::InvalidInput {
                reason: "prefix must not contain whitespace or control characters".to_string(),
            });
        }
        if self.prefix.ends_with(|c: char| c.is_ascii_digit()) {
            // A trailing digit would make the numeric suffix ambiguous.
            return Err(Error::InvalidInput {
                reason: "prefix must not end with a digit".to_string(),
            });
        }

        let zero_padding = self.zero_padding.unwrap_or(DEFAULT_ZERO_PADDING);
        if !(1..=MAX_ZERO_PADDING).contains(&zero_padding) {
            return Err(Error::InvalidInput {
                reason: format!("zero_padding must be between 1 and {MAX_ZERO_PADDING}"),
            });
        }

        Ok(SequenceConfig {
            tenant_id,
            category_id: self.category_id,
            prefix: self.prefix,
            current_number: self.starting_number.unwrap_or(DEFAULT_STARTING_NUMBER),
            zero_padding,
        })
    }
}

/// An entity that consumed an allocated identifier. `asset_tag` is unique
/// per tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asset {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub asset_tag: String,
    pub name: String,
}
