//! Type-tag registry with precomputed ancestor masks.
//!
//! # How the membership test works
//!
//! Each registered tag owns one *exclusive bit*, chosen by its registration
//! index.  Its *ancestor mask* is its own bit OR-ed with its parent's ancestor
//! mask, so the mask of a leaf contains the bit of every tag on its path to the
//! root.  "Is `candidate` a kind of `query`?" is then a single AND:
//!
//! ```text
//! mask(candidate) & bit(query) != 0
//! ```
//!
//! The answer costs the same whether the chain is two tags deep or twenty.  The
//! price is a fixed budget of tags: the mask is two 63-bit words, so at most
//! [`MASK_WIDTH`] tags can ever be registered.
//!
//! # Lifecycle
//!
//! A [`TypeRegistry`] accepts registrations during startup.  [`TypeRegistry::build`]
//! freezes it into a [`Taxonomy`], which has no mutating methods and can be
//! shared between threads without locking.

use std::collections::HashMap;

use thiserror::Error;

/// Usable bits per mask word.  The top bit of each word is never assigned.
pub const BITS_PER_WORD: usize = 63;

/// Total number of tags a taxonomy can hold.
pub const MASK_WIDTH: usize = BITS_PER_WORD * 2;

/// Errors raised while building the static registries at startup.
///
/// None of these can happen once the server is running; they all mean the
/// compiled-in catalog is inconsistent and boot must stop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The taxonomy already holds [`MASK_WIDTH`] tags.
    #[error("taxonomy is full ({capacity} tags), cannot register `{name}`")]
    TaxonomyFull { name: String, capacity: usize },

    /// The declared parent has not been registered.
    #[error("tag `{name}` declares unknown parent #{parent}")]
    UnknownParent { name: String, parent: u8 },

    /// A tag with this name already exists.
    #[error("tag `{0}` registered twice")]
    DuplicateTag(String),

    /// A wire id carries a tertiary discriminator without a secondary.
    #[error("invalid wire id {0}")]
    InvalidWireId(String),

    /// Two packet identities share one wire id.
    #[error("wire id {0} registered twice")]
    DuplicateWireId(String),

    /// One packet identity was given two wire ids.
    #[error("packet {0} registered twice")]
    DuplicateIdentity(String),

    /// A wire id is both a leaf and the prefix of an extended family.
    #[error("wire id {0} is both a leaf and a family prefix")]
    PrefixConflict(String),

    /// An outbound packet that the server must be able to send has no wire id.
    #[error("outbound packet {0} has no wire id")]
    MissingOutbound(String),
}

// ── TagId / AncestorMask ──────────────────────────────────────────────────────

/// Dense tag identifier, equal to the registration index.
///
/// Ids are a stability contract: external tables may refer to them, so a
/// catalog must always be registered in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u8);

impl TagId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-width bit set over tag ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AncestorMask {
    words: [u64; 2],
}

impl AncestorMask {
    pub const EMPTY: Self = Self { words: [0, 0] };

    /// The exclusive bit of `tag`.
    pub const fn bit(tag: TagId) -> Self {
        let index = tag.index();
        let mut words = [0u64; 2];
        words[index / BITS_PER_WORD] = 1u64 << (index % BITS_PER_WORD);
        Self { words }
    }

    pub const fn union(self, other: Self) -> Self {
        Self {
            words: [self.words[0] | other.words[0], self.words[1] | other.words[1]],
        }
    }

    pub const fn intersects(self, other: Self) -> bool {
        (self.words[0] & other.words[0]) != 0 || (self.words[1] & other.words[1]) != 0
    }

    pub const fn contains(self, tag: TagId) -> bool {
        self.intersects(Self::bit(tag))
    }

    /// Number of tags in the set.
    pub const fn count(self) -> u32 {
        self.words[0].count_ones() + self.words[1].count_ones()
    }
}

// ── TagRecord ─────────────────────────────────────────────────────────────────

/// One immutable node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
    pub parent: Option<TagId>,
    pub mask: AncestorMask,
}

// ── TypeRegistry ──────────────────────────────────────────────────────────────

/// Startup-time builder for a [`Taxonomy`].
#[derive(Debug, Default)]
pub struct TypeRegistry {
    records: Vec<TagRecord>,
    by_name: HashMap<String, TagId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tag under `parent` (or as a root when `None`).
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::TaxonomyFull`], [`ConfigurationError::UnknownParent`]
    /// or [`ConfigurationError::DuplicateTag`].
    pub fn register(
        &mut self,
        name: impl Into<String>,
        parent: Option<TagId>,
    ) -> Result<TagId, ConfigurationError> {
        let name = name.into();
        if self.records.len() >= MASK_WIDTH {
            return Err(ConfigurationError::TaxonomyFull {
                name,
                capacity: MASK_WIDTH,
            });
        }
        if self.by_name.contains_key(&name) {
            return Err(ConfigurationError::DuplicateTag(name));
        }

        let inherited = match parent {
            None => AncestorMask::EMPTY,
            Some(parent_id) => match self.records.get(parent_id.index()) {
                Some(record) => record.mask,
                None => {
                    return Err(ConfigurationError::UnknownParent {
                        name,
                        parent: parent_id.0,
                    })
                }
            },
        };

        let id = TagId::from_index(self.records.len());
        self.by_name.insert(name.clone(), id);
        self.records.push(TagRecord {
            id,
            name,
            parent,
            mask: AncestorMask::bit(id).union(inherited),
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freezes the registry.
    pub fn build(self) -> Taxonomy {
        tracing::debug!(tags = self.records.len(), "taxonomy built");
        Taxonomy {
            records: self.records,
            by_name: self.by_name,
        }
    }
}

// ── Taxonomy ──────────────────────────────────────────────────────────────────

/// Immutable, shareable tag tree.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    records: Vec<TagRecord>,
    by_name: HashMap<String, TagId>,
}

impl Taxonomy {
    /// `true` if `candidate` is `query` or descends from it.
    ///
    /// Ids that were never registered in this taxonomy answer `false`.
    pub fn is_type(&self, candidate: TagId, query: TagId) -> bool {
        self.records
            .get(candidate.index())
            .is_some_and(|record| record.mask.contains(query))
    }

    /// `true` if `candidate` is a kind of any of `queries`.
    pub fn is_any_type(&self, candidate: TagId, queries: &[TagId]) -> bool {
        let query_mask = queries
            .iter()
            .fold(AncestorMask::EMPTY, |acc, q| acc.union(AncestorMask::bit(*q)));
        self.records
            .get(candidate.index())
            .is_some_and(|record| record.mask.intersects(query_mask))
    }

    pub fn parent(&self, tag: TagId) -> Option<TagId> {
        self.records.get(tag.index()).and_then(|r| r.parent)
    }

    pub fn name(&self, tag: TagId) -> Option<&str> {
        self.records.get(tag.index()).map(|r| r.name.as_str())
    }

    pub fn lookup(&self, name: &str) -> Option<TagId> {
        self.by_name.get(name).copied()
    }

    pub fn record(&self, tag: TagId) -> Option<&TagRecord> {
        self.records.get(tag.index())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tags in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TagRecord> {
        self.records.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
