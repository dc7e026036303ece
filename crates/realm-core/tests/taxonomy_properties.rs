//! Taxonomy invariants checked over the whole static catalog.

use realm_core::domain::taxonomy::MASK_WIDTH;
use realm_core::{ConfigurationError, InstanceType, TypeRegistry};

/// Walks the parent chain of `kind`, excluding `kind` itself.
fn ancestors(kind: InstanceType) -> Vec<InstanceType> {
    let mut chain = Vec::new();
    let mut current = kind.parent();
    while let Some(parent) = current {
        chain.push(parent);
        current = parent.parent();
    }
    chain
}

#[test]
fn test_every_kind_is_each_of_its_ancestors() {
    for kind in InstanceType::ALL {
        for ancestor in ancestors(kind) {
            assert!(kind.is_type(ancestor), "{kind} must be a {ancestor}");
        }
    }
}

#[test]
fn test_is_type_holds_only_along_the_parent_chain() {
    // Arrange
    let taxonomy = InstanceType::build_taxonomy().expect("catalog");

    for candidate in InstanceType::ALL {
        let chain = ancestors(candidate);
        for query in InstanceType::ALL {
            // Act
            let expected = query == candidate || chain.contains(&query);

            // Assert – static masks and runtime taxonomy agree with the chain
            assert_eq!(candidate.is_type(query), expected, "{candidate} vs {query}");
            assert_eq!(taxonomy.is_type(candidate.tag(), query.tag()), expected);
        }
    }
}

#[test]
fn test_siblings_under_the_root_are_unrelated() {
    assert!(!InstanceType::Item.is_type(InstanceType::Creature));
    assert!(!InstanceType::Creature.is_type(InstanceType::Item));
}

#[test]
fn test_runtime_registry_rejects_overflow_after_full_catalog() {
    // Arrange – replay the catalog, then pad up to the exact capacity
    let mut registry = TypeRegistry::new();
    for kind in InstanceType::ALL {
        registry
            .register(kind.name(), kind.parent().map(InstanceType::tag))
            .unwrap();
    }
    for i in registry.len()..MASK_WIDTH {
        registry
            .register(format!("Extension{i}"), Some(InstanceType::Npc.tag()))
            .expect("within capacity");
    }

    // Act
    let overflow = registry.register("OneTooMany", Some(InstanceType::Npc.tag()));

    // Assert
    assert!(matches!(overflow, Err(ConfigurationError::TaxonomyFull { .. })));
    let taxonomy = registry.build();
    let last = taxonomy.lookup(&format!("Extension{}", MASK_WIDTH - 1)).unwrap();
    assert!(taxonomy.is_type(last, InstanceType::Creature.tag()));
    assert!(!taxonomy.is_type(last, InstanceType::Playable.tag()));
}
