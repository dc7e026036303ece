//! Bidirectional opcode registry.
//!
//! Every frame body starts with a wire identifier of one to three levels:
//!
//! ```text
//! [primary:u8]                                  single-byte opcode
//! [primary:u8][secondary:u16]                   extended family member
//! [primary:u8][secondary:u16][tertiary:u32]     nested family member
//! ```
//!
//! Whether a secondary or tertiary discriminator follows is not encoded on the
//! wire; it is implied by the registered table.  Registering any `WireId` with a
//! secondary turns its primary into a *family prefix*, and registering one with
//! a tertiary turns its `(primary, secondary)` pair into a nested prefix.  A
//! prefix can therefore never also be a leaf, which [`OpcodeRegistryBuilder::build`]
//! enforces.
//!
//! The registry is generic over the inbound identity `I` and outbound identity
//! `O` so that the game catalog lives in [`crate::protocol::catalog`] and this
//! module can be tested against throwaway enums.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::domain::taxonomy::ConfigurationError;
use crate::protocol::codec::ProtocolError;
use crate::protocol::cursor::{PacketReader, PacketWriter};

// ── WireId ────────────────────────────────────────────────────────────────────

/// A fully resolved wire identifier.
///
/// A `tertiary` without a `secondary` is not a valid identifier and is rejected
/// at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId {
    pub primary: u8,
    pub secondary: Option<u16>,
    pub tertiary: Option<u32>,
}

impl WireId {
    /// Single-byte opcode.
    pub const fn single(primary: u8) -> Self {
        Self {
            primary,
            secondary: None,
            tertiary: None,
        }
    }

    /// Member of an extended family.
    pub const fn extended(primary: u8, secondary: u16) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            tertiary: None,
        }
    }

    /// Member of a nested family.
    pub const fn nested(primary: u8, secondary: u16, tertiary: u32) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            tertiary: Some(tertiary),
        }
    }

    /// Number of bytes this identifier occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        1 + self.secondary.map_or(0, |_| 2) + self.tertiary.map_or(0, |_| 4)
    }

    /// Appends the identifier to `writer`.
    pub fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.primary);
        if let Some(secondary) = self.secondary {
            writer.write_u16(secondary);
        }
        if let Some(tertiary) = self.tertiary {
            writer.write_u32(tertiary);
        }
    }

    fn is_well_formed(&self) -> bool {
        !(self.tertiary.is_some() && self.secondary.is_none())
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.primary)?;
        if let Some(secondary) = self.secondary {
            write!(f, ":{secondary:04X}")?;
        }
        if let Some(tertiary) = self.tertiary {
            write!(f, ":{tertiary:08X}")?;
        }
        Ok(())
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Result of an inbound lookup.  Unregistered combinations are a normal
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<I> {
    Known(I),
    Unknown(WireId),
}

impl<I: Copy> Resolution<I> {
    pub fn known(&self) -> Option<I> {
        match self {
            Resolution::Known(id) => Some(*id),
            Resolution::Unknown(_) => None,
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Collects registrations and validates them all at once in [`build`](Self::build).
#[derive(Debug)]
pub struct OpcodeRegistryBuilder<I, O> {
    inbound: Vec<(WireId, I)>,
    outbound: Vec<(O, WireId)>,
    required_outbound: Vec<O>,
}

impl<I, O> Default for OpcodeRegistryBuilder<I, O> {
    fn default() -> Self {
        Self {
            inbound: Vec::new(),
            outbound: Vec::new(),
            required_outbound: Vec::new(),
        }
    }
}

impl<I, O> OpcodeRegistryBuilder<I, O>
where
    I: Copy + Eq + Hash + fmt::Debug,
    O: Copy + Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps an inbound wire id to a client packet identity.
    pub fn inbound(mut self, wire: WireId, id: I) -> Self {
        self.inbound.push((wire, id));
        self
    }

    /// Maps a server packet identity to its outbound wire id.
    pub fn outbound(mut self, id: O, wire: WireId) -> Self {
        self.outbound.push((id, wire));
        self
    }

    /// Declares outbound identities that must have a wire id once built.
    pub fn require_outbound(mut self, ids: &[O]) -> Self {
        self.required_outbound.extend_from_slice(ids);
        self
    }

    /// Validates every registration and freezes the registry.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidWireId`] for a tertiary without a secondary.
    /// - [`ConfigurationError::DuplicateWireId`] / [`ConfigurationError::DuplicateIdentity`]
    ///   when a direction is not one-to-one.
    /// - [`ConfigurationError::PrefixConflict`] when a wire id is both a leaf and
    ///   a family prefix.
    /// - [`ConfigurationError::MissingOutbound`] when a required outbound identity
    ///   was never registered.
    pub fn build(self) -> Result<OpcodeRegistry<I, O>, ConfigurationError> {
        let mut inbound = HashMap::with_capacity(self.inbound.len());
        let mut seen_inbound_ids = HashSet::with_capacity(self.inbound.len());
        for (wire, id) in &self.inbound {
            if !wire.is_well_formed() {
                return Err(ConfigurationError::InvalidWireId(wire.to_string()));
            }
            if inbound.insert(*wire, *id).is_some() {
                return Err(ConfigurationError::DuplicateWireId(wire.to_string()));
            }
            if !seen_inbound_ids.insert(*id) {
                return Err(ConfigurationError::DuplicateIdentity(format!("{id:?}")));
            }
        }

        let mut outbound = HashMap::with_capacity(self.outbound.len());
        let mut outbound_reverse = HashMap::with_capacity(self.outbound.len());
        for (id, wire) in &self.outbound {
            if !wire.is_well_formed() {
                return Err(ConfigurationError::InvalidWireId(wire.to_string()));
            }
            if outbound.insert(*id, *wire).is_some() {
                return Err(ConfigurationError::DuplicateIdentity(format!("{id:?}")));
            }
            if outbound_reverse.insert(*wire, *id).is_some() {
                return Err(ConfigurationError::DuplicateWireId(wire.to_string()));
            }
        }

        for id in &self.required_outbound {
            if !outbound.contains_key(id) {
                return Err(ConfigurationError::MissingOutbound(format!("{id:?}")));
            }
        }

        let inbound_families = FamilyIndex::from_wire_ids(inbound.keys())?;
        FamilyIndex::from_wire_ids(outbound_reverse.keys())?;

        Ok(OpcodeRegistry {
            inbound,
            inbound_families,
            outbound,
            outbound_reverse,
        })
    }
}

// ── Family structure ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct FamilyIndex {
    /// Primaries followed by a `u16` secondary.
    extended: HashSet<u8>,
    /// `(primary, secondary)` pairs followed by a `u32` tertiary.
    nested: HashSet<(u8, u16)>,
}

impl FamilyIndex {
    fn from_wire_ids<'a>(ids: impl Iterator<Item = &'a WireId> + Clone) -> Result<Self, ConfigurationError> {
        let mut index = FamilyIndex::default();
        for wire in ids.clone() {
            if let Some(secondary) = wire.secondary {
                index.extended.insert(wire.primary);
                if wire.tertiary.is_some() {
                    index.nested.insert((wire.primary, secondary));
                }
            }
        }

        for wire in ids {
            let conflict = match (wire.secondary, wire.tertiary) {
                (None, _) => index.extended.contains(&wire.primary),
                (Some(secondary), None) => index.nested.contains(&(wire.primary, secondary)),
                (Some(_), Some(_)) => false,
            };
            if conflict {
                return Err(ConfigurationError::PrefixConflict(wire.to_string()));
            }
        }
        Ok(index)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Immutable, bijective mapping between wire ids and packet identities.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug)]
pub struct OpcodeRegistry<I, O> {
    inbound: HashMap<WireId, I>,
    inbound_families: FamilyIndex,
    outbound: HashMap<O, WireId>,
    outbound_reverse: HashMap<WireId, O>,
}

impl<I, O> OpcodeRegistry<I, O>
where
    I: Copy + Eq + Hash + fmt::Debug,
    O: Copy + Eq + Hash + fmt::Debug,
{
    pub fn builder() -> OpcodeRegistryBuilder<I, O> {
        OpcodeRegistryBuilder::new()
    }

    /// Looks up an already-split inbound wire id.  Never fails.
    pub fn resolve_inbound(
        &self,
        primary: u8,
        secondary: Option<u16>,
        tertiary: Option<u32>,
    ) -> Resolution<I> {
        let wire = WireId {
            primary,
            secondary,
            tertiary,
        };
        match self.inbound.get(&wire) {
            Some(id) => Resolution::Known(*id),
            None => Resolution::Unknown(wire),
        }
    }

    /// Reads the wire id at the front of a frame body.
    ///
    /// Consumes exactly the discriminator bytes the family structure calls for
    /// and leaves the reader positioned at the first payload byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedFrame`] if the body ends inside the
    /// discriminator.  An unregistered id is `Ok(Resolution::Unknown(_))`.
    pub fn read_inbound(&self, reader: &mut PacketReader<'_>) -> Result<Resolution<I>, ProtocolError> {
        let primary = reader.read_u8()?;
        if !self.inbound_families.extended.contains(&primary) {
            return Ok(self.resolve_inbound(primary, None, None));
        }

        let secondary = reader.read_u16()?;
        if !self.inbound_families.nested.contains(&(primary, secondary)) {
            return Ok(self.resolve_inbound(primary, Some(secondary), None));
        }

        let tertiary = reader.read_u32()?;
        Ok(self.resolve_inbound(primary, Some(secondary), Some(tertiary)))
    }

    /// Wire id registered for an outbound identity.
    pub fn wire_of(&self, id: O) -> Option<WireId> {
        self.outbound.get(&id).copied()
    }

    /// Reverse outbound lookup, used by test clients decoding server frames.
    pub fn resolve_outbound(&self, wire: &WireId) -> Option<O> {
        self.outbound_reverse.get(wire).copied()
    }

    /// Wire id registered for an inbound identity.
    pub fn inbound_wire_of(&self, id: I) -> Option<WireId> {
        self.inbound
            .iter()
            .find_map(|(wire, candidate)| (*candidate == id).then_some(*wire))
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
