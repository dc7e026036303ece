//! The closed catalog of world-object kinds.
//!
//! Declaration order is registration order, and the discriminant of each
//! variant is its [`TagId`].  New kinds must be appended at the end so that
//! existing ids stay stable.
//!
//! Ancestor masks for the catalog are computed at compile time from the same
//! [`AncestorMask`] primitives the runtime registry uses, and
//! [`InstanceType::build_taxonomy`] replays the catalog through a
//! [`TypeRegistry`] at boot so that a broken catalog halts startup with a
//! [`ConfigurationError`].

use serde::{Deserialize, Serialize};

use crate::domain::taxonomy::{AncestorMask, ConfigurationError, TagId, Taxonomy, TypeRegistry, MASK_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum InstanceType {
    Object,
    Item,
    Creature,
    Npc,
    Playable,
    Summon,
    Decoy,
    Player,
    NpcInstance,
    Merchant,
    Warehouse,
    StaticObject,
    Door,
    TerrainObject,
    EffectPoint,
    CommissionManager,
    // summons, pets, decoys, traps
    Servitor,
    Pet,
    DecoyClone,
    Trap,
    // attackables
    Attackable,
    Guard,
    QuestGuard,
    Monster,
    Block,
    Chest,
    ControllableMob,
    FeedableBeast,
    TamedBeast,
    FriendlyMob,
    RaidBoss,
    GrandBoss,
    FriendlyNpc,
    FlyTerrainObject,
    // vehicles
    Vehicle,
    Boat,
    AirShip,
    Shuttle,
    ControllableAirShip,
    // siege
    Defender,
    Artefact,
    ControlTower,
    FlameTower,
    SiegeFlag,
    FortCommander,
    FortLogistics,
    FortManager,
    // town npcs
    Fisherman,
    Observation,
    OlympiadManager,
    PetManager,
    RaceManager,
    Teleporter,
    VillageMaster,
    Doorman,
    FortDoorman,
    ClassMaster,
    EventMob,
}

/// Number of kinds in the catalog.
pub const INSTANCE_TYPE_COUNT: usize = InstanceType::ALL.len();

const _: () = assert!(INSTANCE_TYPE_COUNT <= MASK_WIDTH, "instance type catalog exceeds mask width");

const MASKS: [AncestorMask; INSTANCE_TYPE_COUNT] = {
    let mut masks = [AncestorMask::EMPTY; INSTANCE_TYPE_COUNT];
    let mut i = 0;
    while i < INSTANCE_TYPE_COUNT {
        let kind = InstanceType::ALL[i];
        assert!(kind as usize == i, "catalog order must match discriminants");
        let own = AncestorMask::bit(TagId::from_index(i));
        masks[i] = match kind.parent() {
            Some(parent) => {
                assert!((parent as usize) < i, "parent must be declared before child");
                own.union(masks[parent as usize])
            }
            None => own,
        };
        i += 1;
    }
    masks
};

impl InstanceType {
    /// Every kind, in registration order.
    pub const ALL: [InstanceType; 58] = {
        use InstanceType::*;
        [
            Object, Item, Creature, Npc, Playable, Summon, Decoy, Player, NpcInstance, Merchant,
            Warehouse, StaticObject, Door, TerrainObject, EffectPoint, CommissionManager, Servitor,
            Pet, DecoyClone, Trap, Attackable, Guard, QuestGuard, Monster, Block, Chest,
            ControllableMob, FeedableBeast, TamedBeast, FriendlyMob, RaidBoss, GrandBoss,
            FriendlyNpc, FlyTerrainObject, Vehicle, Boat, AirShip, Shuttle, ControllableAirShip,
            Defender, Artefact, ControlTower, FlameTower, SiegeFlag, FortCommander, FortLogistics,
            FortManager, Fisherman, Observation, OlympiadManager, PetManager, RaceManager,
            Teleporter, VillageMaster, Doorman, FortDoorman, ClassMaster, EventMob,
        ]
    };

    /// Direct parent kind; `None` only for [`InstanceType::Object`].
    pub const fn parent(self) -> Option<InstanceType> {
        use InstanceType::*;
        let parent = match self {
            Object => return None,
            Item | Creature => Object,
            Npc | Playable | Decoy | StaticObject | Door | Vehicle => Creature,
            Summon | Player => Playable,
            NpcInstance | TerrainObject | EffectPoint | CommissionManager | Trap | Attackable
            | FlyTerrainObject | ControlTower | FlameTower | SiegeFlag | Observation
            | OlympiadManager | RaceManager | Teleporter | EventMob => Npc,
            Merchant | Warehouse | Artefact | VillageMaster | Doorman | ClassMaster => NpcInstance,
            Servitor | Pet => Summon,
            DecoyClone => Decoy,
            Guard | Monster | Block | FriendlyMob | FriendlyNpc | Defender => Attackable,
            QuestGuard => Guard,
            Chest | ControllableMob | FeedableBeast | RaidBoss => Monster,
            TamedBeast => FeedableBeast,
            GrandBoss => RaidBoss,
            Boat | AirShip | Shuttle => Vehicle,
            ControllableAirShip => AirShip,
            FortCommander => Defender,
            FortLogistics | FortManager | Fisherman | PetManager => Merchant,
            FortDoorman => Doorman,
        };
        Some(parent)
    }

    pub const fn tag(self) -> TagId {
        TagId::from_index(self as usize)
    }

    pub const fn mask(self) -> AncestorMask {
        MASKS[self as usize]
    }

    /// `true` if `self` is `other` or one of its descendants.
    pub const fn is_type(self, other: InstanceType) -> bool {
        self.mask().contains(other.tag())
    }

    pub fn is_any_type(self, others: &[InstanceType]) -> bool {
        others.iter().any(|other| self.is_type(*other))
    }

    pub const fn name(self) -> &'static str {
        use InstanceType::*;
        match self {
            Object => "Object",
            Item => "Item",
            Creature => "Creature",
            Npc => "Npc",
            Playable => "Playable",
            Summon => "Summon",
            Decoy => "Decoy",
            Player => "Player",
            NpcInstance => "NpcInstance",
            Merchant => "Merchant",
            Warehouse => "Warehouse",
            StaticObject => "StaticObject",
            Door => "Door",
            TerrainObject => "TerrainObject",
            EffectPoint => "EffectPoint",
            CommissionManager => "CommissionManager",
            Servitor => "Servitor",
            Pet => "Pet",
            DecoyClone => "DecoyClone",
            Trap => "Trap",
            Attackable => "Attackable",
            Guard => "Guard",
            QuestGuard => "QuestGuard",
            Monster => "Monster",
            Block => "Block",
            Chest => "Chest",
            ControllableMob => "ControllableMob",
            FeedableBeast => "FeedableBeast",
            TamedBeast => "TamedBeast",
            FriendlyMob => "FriendlyMob",
            RaidBoss => "RaidBoss",
            GrandBoss => "GrandBoss",
            FriendlyNpc => "FriendlyNpc",
            FlyTerrainObject => "FlyTerrainObject",
            Vehicle => "Vehicle",
            Boat => "Boat",
            AirShip => "AirShip",
            Shuttle => "Shuttle",
            ControllableAirShip => "ControllableAirShip",
            Defender => "Defender",
            Artefact => "Artefact",
            ControlTower => "ControlTower",
            FlameTower => "FlameTower",
            SiegeFlag => "SiegeFlag",
            FortCommander => "FortCommander",
            FortLogistics => "FortLogistics",
            FortManager => "FortManager",
            Fisherman => "Fisherman",
            Observation => "Observation",
            OlympiadManager => "OlympiadManager",
            PetManager => "PetManager",
            RaceManager => "RaceManager",
            Teleporter => "Teleporter",
            VillageMaster => "VillageMaster",
            Doorman => "Doorman",
            FortDoorman => "FortDoorman",
            ClassMaster => "ClassMaster",
            EventMob => "EventMob",
        }
    }

    /// Registers the whole catalog through a [`TypeRegistry`].
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`] from the registry.
    pub fn build_taxonomy() -> Result<Taxonomy, ConfigurationError> {
        let mut registry = TypeRegistry::new();
        for kind in Self::ALL {
            registry.register(kind.name(), kind.parent().map(InstanceType::tag))?;
        }
        Ok(registry.build())
    }

    // ── Predicates used by packet handlers ────────────────────────────────────

    pub const fn is_item(self) -> bool {
        self.is_type(InstanceType::Item)
    }

    pub const fn is_creature(self) -> bool {
        self.is_type(InstanceType::Creature)
    }

    pub const fn is_player(self) -> bool {
        self.is_type(InstanceType::Player)
    }

    pub const fn is_playable(self) -> bool {
        self.is_type(InstanceType::Playable)
    }

    pub const fn is_npc(self) -> bool {
        self.is_type(InstanceType::Npc)
    }

    pub const fn is_attackable(self) -> bool {
        self.is_type(InstanceType::Attackable)
    }

    /// Raid and grand bosses.
    pub const fn is_raid(self) -> bool {
        self.is_type(InstanceType::RaidBoss)
    }
}

impl std::fmt::Display for InstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InstanceType::*;

    #[test]
    fn test_catalog_builds_into_runtime_taxonomy() {
        // Act
        let tax = InstanceType::build_taxonomy().expect("catalog is consistent");

        // Assert – runtime masks agree with the compile-time table
        assert_eq!(tax.len(), INSTANCE_TYPE_COUNT);
        for kind in InstanceType::ALL {
            let record = tax.record(kind.tag()).expect("registered");
            assert_eq!(record.name, kind.name());
            assert_eq!(record.mask, kind.mask(), "mask mismatch for {kind}");
        }
    }

    #[test]
    fn test_deep_chain_is_transitive() {
        // TamedBeast → FeedableBeast → Monster → Attackable → Npc → Creature → Object
        for ancestor in [FeedableBeast, Monster, Attackable, Npc, Creature, Object] {
            assert!(TamedBeast.is_type(ancestor), "TamedBeast should be {ancestor}");
        }
        assert!(!TamedBeast.is_type(Playable));
    }

    #[test]
    fn test_grand_boss_is_raid_and_attackable() {
        assert!(GrandBoss.is_raid());
        assert!(GrandBoss.is_attackable());
        assert!(!Monster.is_raid());
    }

    #[test]
    fn test_player_is_playable_creature_but_not_npc() {
        assert!(Player.is_player());
        assert!(Player.is_playable());
        assert!(Player.is_creature());
        assert!(!Player.is_npc());
        assert!(!Pet.is_player());
    }

    #[test]
    fn test_item_and_creature_are_disjoint_siblings() {
        assert!(Item.is_item());
        assert!(!Item.is_creature());
        assert!(!Creature.is_item());
    }

    #[test]
    fn test_is_any_type_over_slices() {
        assert!(FortManager.is_any_type(&[Door, Merchant]));
        assert!(!Boat.is_any_type(&[Npc, Playable]));
        assert!(!Boat.is_any_type(&[]));
    }

    #[test]
    fn test_every_kind_except_object_has_a_parent() {
        for kind in InstanceType::ALL {
            assert_eq!(kind.parent().is_none(), kind == Object);
            assert!(kind.is_type(Object));
        }
    }

    #[test]
    fn test_kind_deserializes_from_variant_name() {
        #[derive(Deserialize)]
        struct Row {
            kind: InstanceType,
        }
        let row: Row = from_single_field("RaidBoss");
        assert_eq!(row.kind, RaidBoss);

        fn from_single_field(name: &str) -> Row {
            use serde::de::value::{Error, MapDeserializer};
            let entries = vec![("kind", name)];
            Row::deserialize(MapDeserializer::<_, Error>::new(entries.into_iter()))
                .expect("deserialize")
        }
    }
}
