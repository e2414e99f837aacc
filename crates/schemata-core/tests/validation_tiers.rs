//! # Validation Tier Tests (T0-T5)
//!
//! If ANY tier fails, the kernel is INVALID.
//!
//! ## Tiers
//! - T0: Provenance Protocol
//! - T1: Inheritance
//! - T2: Keys & Nullability
//! - T3: Reference Constraints
//! - T4: Navigations & Ownership
//! - T5: Registry & Finalization

use schemata_core::{
    BackingType, EntityTypeId, ErrorKind, Facet, Model, ModelSnapshot, NavigationMember,
    PropertyId, Provenance, SetResult, TypeRegistration, ValueType,
};

// =============================================================================
// HELPERS
// =============================================================================

fn entity(model: &mut Model, name: &str, backing: BackingType) -> EntityTypeId {
    model
        .add_entity_type(name, Some(backing), TypeRegistration::Ordinary, Provenance::Explicit)
        .expect("add entity type")
        .applied()
        .expect("applied")
}

fn property(model: &mut Model, entity: EntityTypeId, name: &str, ty: ValueType) -> PropertyId {
    model
        .add_property(entity, name, ty, Provenance::Explicit)
        .expect("add property")
        .applied()
        .expect("applied")
}

/// A root entity type with an `i32` primary key named `Id`.
fn keyed(model: &mut Model, name: &str) -> EntityTypeId {
    let id = entity(model, name, BackingType::new(name));
    let key = property(model, id, "Id", ValueType::new("i32"));
    model
        .set_primary_key(id, &[key], Provenance::Explicit)
        .expect("primary key");
    id
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// TIER T0: PROVENANCE PROTOCOL
// =============================================================================

mod t0_provenance {
    use super::*;

    /// T0.1: A set succeeds iff the request is at least the recorded source.
    #[test]
    fn try_set_follows_order() {
        for existing in Provenance::ALL {
            for requested in Provenance::ALL {
                let mut facet = Facet::with(1u32, existing);
                let result = facet.try_set(2, requested);
                if requested >= existing {
                    assert_eq!(result, SetResult::Changed);
                    assert_eq!(facet.source(), Some(requested));
                } else {
                    assert_eq!(result, SetResult::Rejected);
                    assert_eq!(facet.get(), Some(&1));
                }
            }
        }
    }

    /// T0.2: Re-applying the same value never lowers the recorded source.
    #[test]
    fn idempotent_set_never_lowers() {
        let mut facet = Facet::with(true, Provenance::Explicit);
        assert!(facet.try_set(true, Provenance::Convention).accepted());
        assert_eq!(facet.source(), Some(Provenance::Explicit));

        let mut facet = Facet::with(true, Provenance::Convention);
        assert!(facet.try_set(true, Provenance::Annotation).accepted());
        assert_eq!(facet.source(), Some(Provenance::Annotation));
    }

    /// T0.3: An unset facet accepts anything.
    #[test]
    fn unset_accepts_lowest() {
        let mut facet: Facet<u32> = Facet::unset();
        assert_eq!(facet.try_set(3, Provenance::Convention), SetResult::Changed);
        assert_eq!(facet.source(), Some(Provenance::Convention));
    }

    /// T0.4: Outranked model edits are not errors.
    #[test]
    fn outranked_edit_is_not_an_error() {
        let mut model = Model::new();
        let blog = entity(&mut model, "Blog", BackingType::new("Blog"));
        let title = property(&mut model, blog, "Title", ValueType::nullable("String"));
        model
            .set_max_length(title, Some(200), Provenance::Explicit)
            .expect("max length");
        let outcome = model
            .set_max_length(title, Some(50), Provenance::Convention)
            .expect("not an error");
        assert!(outcome.is_outranked());
        assert_eq!(model.property(title).and_then(|p| p.max_length()), Some(200));
    }
}

// =============================================================================
// TIER T1: INHERITANCE
// =============================================================================

mod t1_inheritance {
    use super::*;

    /// T1.1: A name clash anywhere across the new lineage fails.
    #[test]
    fn duplicate_name_across_lineage_rejected() {
        let mut model = Model::new();
        let root = entity(&mut model, "Root", BackingType::new("Root"));
        let a = entity(&mut model, "A", BackingType::new("A").extends("Root"));
        let b = entity(&mut model, "B", BackingType::new("B").extends("A").extends("Root"));
        model
            .set_base_type(a, Some(root), Provenance::Explicit)
            .expect("a extends root");
        property(&mut model, root, "G", ValueType::new("i32"));
        property(&mut model, b, "G", ValueType::new("String"));

        let err = model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect_err("inherited clash");
        assert_eq!(err.kind(), ErrorKind::DuplicateMember);
        assert_eq!(model.entity_type(b).and_then(|e| e.base_type()), None);
    }

    /// T1.2: A clash with a descendant of the node fails too.
    #[test]
    fn duplicate_name_in_subtree_rejected() {
        let mut model = Model::new();
        let a = entity(&mut model, "A", BackingType::new("A"));
        let b = entity(&mut model, "B", BackingType::new("B").extends("A"));
        let c = entity(&mut model, "C", BackingType::new("C").extends("B").extends("A"));
        model
            .set_base_type(c, Some(b), Provenance::Explicit)
            .expect("c extends b");
        property(&mut model, a, "G", ValueType::new("i32"));
        property(&mut model, c, "G", ValueType::new("i32"));

        let err = model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect_err("descendant clash");
        assert_eq!(err.kind(), ErrorKind::DuplicateMember);
    }

    /// T1.3: Detaching restores the pre-attachment merged view exactly.
    #[test]
    fn detach_restores_merged_view() {
        let mut model = Model::new();
        let a = entity(&mut model, "A", BackingType::new("A"));
        let b = entity(&mut model, "B", BackingType::new("B").extends("A"));
        let a_id = property(&mut model, a, "Id", ValueType::new("i32"));
        model
            .set_primary_key(a, &[a_id], Provenance::Explicit)
            .expect("pk");
        property(&mut model, b, "Extra", ValueType::new("String"));

        let before_props = model.all_properties(b);
        let before_keys = model.all_keys(b);
        let before_navs = model.all_navigations(b);

        model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect("attach");
        assert_eq!(model.all_properties(b).len(), 2);
        assert_eq!(model.primary_key(b), model.primary_key(a));

        model
            .set_base_type(b, None, Provenance::Explicit)
            .expect("detach");
        assert_eq!(model.all_properties(b), before_props);
        assert_eq!(model.all_keys(b), before_keys);
        assert_eq!(model.all_navigations(b), before_navs);
    }

    /// T1.4: Attach, detach, attach yields the same layout as a single attach.
    #[test]
    fn reattach_round_trip() {
        let build = || {
            let mut model = Model::new();
            let a = entity(&mut model, "A", BackingType::new("A"));
            let b = entity(&mut model, "B", BackingType::new("B").extends("A"));
            property(&mut model, b, "B1", ValueType::new("i32"));
            property(&mut model, a, "A1", ValueType::new("i32"));
            property(&mut model, b, "B2", ValueType::new("i32"));
            (model, a, b)
        };
        let indices = |model: &Model, node: EntityTypeId| -> Vec<(String, usize)> {
            model
                .all_properties(node)
                .into_iter()
                .filter_map(|p| model.property(p))
                .map(|p| (p.name().to_string(), p.index()))
                .collect()
        };

        let (mut once, a, b) = build();
        once.set_base_type(b, Some(a), Provenance::Explicit)
            .expect("attach");

        let (mut thrice, a2, b2) = build();
        for base in [Some(a2), None, Some(a2)] {
            thrice
                .set_base_type(b2, base, Provenance::Explicit)
                .expect("toggle");
        }
        assert_eq!(indices(&once, b), indices(&thrice, b2));
        assert_eq!(
            indices(&once, b),
            vec![
                ("A1".to_string(), 0),
                ("B1".to_string(), 1),
                ("B2".to_string(), 2)
            ]
        );
    }

    /// T1.5: A derived type cannot own keys.
    #[test]
    fn derived_type_cannot_own_keys() {
        let mut model = Model::new();
        let a = keyed(&mut model, "A");
        let b = entity(&mut model, "B", BackingType::new("B").extends("A"));
        model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect("attach");
        let code = property(&mut model, b, "Code", ValueType::new("String"));
        let err = model
            .add_key(b, &[code], Provenance::Explicit)
            .expect_err("derived key");
        assert_eq!(err.kind(), ErrorKind::DerivedTypeKey);
    }
}

// =============================================================================
// TIER T2: KEYS & NULLABILITY
// =============================================================================

mod t2_keys {
    use super::*;

    /// T2.1: A key member cannot be made nullable until the key is gone.
    #[test]
    fn nullable_key_member_rejected_while_key_exists() {
        let mut model = Model::new();
        let order = entity(&mut model, "Order", BackingType::new("Order"));
        let code = property(&mut model, order, "Code", ValueType::nullable("String"));
        let key = model
            .add_key(order, &[code], Provenance::Convention)
            .expect("key")
            .applied()
            .expect("applied");
        assert_eq!(model.property(code).map(|p| p.is_nullable()), Some(false));

        for source in Provenance::ALL {
            let err = model
                .set_nullable(code, Some(true), source)
                .expect_err("key member");
            assert_eq!(err.kind(), ErrorKind::NullableKey);
        }

        model
            .remove_key(key, Provenance::Explicit)
            .expect("remove")
            .applied()
            .expect("applied");
        model
            .set_nullable(code, Some(true), Provenance::Convention)
            .expect("nullable")
            .applied()
            .expect("applied");
        assert_eq!(model.property(code).map(|p| p.is_nullable()), Some(true));
    }

    /// T2.2: Removing a key drops the foreign keys that target it.
    #[test]
    fn key_removal_cascades_to_overridable_foreign_keys() {
        let mut model = Model::new();
        let customer = keyed(&mut model, "Customer");
        let order = keyed(&mut model, "Order");
        let fk = model
            .add_relationship(order, customer, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let key = model.primary_key(customer).expect("pk");

        model
            .remove_key(key, Provenance::Explicit)
            .expect("remove")
            .applied()
            .expect("applied");
        assert!(model.foreign_key(fk).is_none());
        assert!(model.find_property(order, "CustomerId").is_none());
    }

    /// T2.3: A key pinned by a relationship at higher provenance is in use.
    #[test]
    fn pinned_key_in_use() {
        let mut model = Model::new();
        let customer = keyed(&mut model, "Customer");
        let order = keyed(&mut model, "Order");
        model
            .add_relationship(order, customer, &[], None, Provenance::Explicit)
            .expect("fk");
        let key = model.primary_key(customer).expect("pk");
        let err = model
            .remove_key(key, Provenance::Convention)
            .expect_err("in use");
        assert_eq!(err.kind(), ErrorKind::KeyInUse);
    }

    /// T2.4: Keys are unique per node and their members must be declared there.
    #[test]
    fn key_members_validated() {
        let mut model = Model::new();
        let a = entity(&mut model, "A", BackingType::new("A"));
        let other = entity(&mut model, "Other", BackingType::new("Other"));
        let x = property(&mut model, a, "X", ValueType::new("i32"));
        let y = property(&mut model, other, "Y", ValueType::new("i32"));

        let err = model
            .add_key(a, &[x, x], Provenance::Explicit)
            .expect_err("duplicate member");
        assert_eq!(err.kind(), ErrorKind::DuplicatePropertyInList);
        let err = model
            .add_key(a, &[y], Provenance::Explicit)
            .expect_err("foreign member");
        assert_eq!(err.kind(), ErrorKind::WrongDeclaringEntity);
        let err = model
            .add_key(a, &[], Provenance::Explicit)
            .expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::EmptyMemberList);
    }
}

// =============================================================================
// TIER T3: REFERENCE CONSTRAINTS
// =============================================================================

mod t3_reference_constraints {
    use super::*;

    /// T3.1: A pairwise type mismatch fails regardless of provenance.
    #[test]
    fn composite_type_mismatch_rejected() {
        for source in Provenance::ALL {
            let mut model = Model::new();
            let principal = entity(&mut model, "Principal", BackingType::new("Principal"));
            let k1 = property(&mut model, principal, "K1", ValueType::new("i32"));
            let k2 = property(&mut model, principal, "K2", ValueType::new("String"));
            model
                .set_primary_key(principal, &[k1, k2], Provenance::Explicit)
                .expect("pk");
            let dependent = entity(&mut model, "Dependent", BackingType::new("Dependent"));
            property(&mut model, dependent, "P1", ValueType::new("i32"));
            property(&mut model, dependent, "P2", ValueType::new("i64"));

            let err = model
                .add_relationship(dependent, principal, &names(&["P1", "P2"]), None, source)
                .expect_err("mismatch");
            assert_eq!(err.kind(), ErrorKind::ForeignKeyTypeMismatch);
            assert!(model.all_foreign_keys(dependent).is_empty());
        }
    }

    /// T3.2: IsRequired follows nullability until pinned.
    #[test]
    fn customer_order_required_scenario() {
        let mut model = Model::new();
        let customer = keyed(&mut model, "Customer");
        let order = keyed(&mut model, "Order");
        let customer_id = property(&mut model, order, "CustomerId", ValueType::nullable("i32"));
        let fk = model
            .add_relationship(order, customer, &names(&["CustomerId"]), None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");

        assert_eq!(model.is_required(fk), Some(false));
        let unique_before = model.foreign_key(fk).map(|f| f.is_unique());

        model
            .relationship_builder(fk)
            .is_required(true)
            .expect("required");
        assert_eq!(model.is_required(fk), Some(true));
        assert_eq!(
            model.property(customer_id).map(|p| p.is_nullable()),
            Some(false)
        );
        assert_eq!(model.foreign_key(fk).map(|f| f.is_unique()), unique_before);
    }

    /// T3.3: Identify-or-create returns the same constraint.
    #[test]
    fn identify_or_create_is_idempotent() {
        let mut model = Model::new();
        let customer = keyed(&mut model, "Customer");
        let order = keyed(&mut model, "Order");
        let first = model
            .add_relationship(order, customer, &names(&["BuyerId"]), None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let second = model
            .add_relationship(order, customer, &names(&["BuyerId"]), None, Provenance::Explicit)
            .expect("fk")
            .applied()
            .expect("applied");
        assert_eq!(first, second);
        assert_eq!(
            model.foreign_key(first).and_then(|f| f.properties_source()),
            Some(Provenance::Explicit)
        );
        assert_eq!(model.all_foreign_keys(order).len(), 1);
    }

    /// T3.4: A relationship to a principal without key gets a placeholder
    /// that the first primary key replaces.
    #[test]
    fn placeholder_key_reconciled() {
        let mut model = Model::new();
        let blog = entity(&mut model, "Blog", BackingType::new("Blog"));
        let post = keyed(&mut model, "Post");
        let fk = model
            .add_relationship(post, blog, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let placeholder = model.foreign_key(fk).map(|f| f.principal_key()).expect("key");
        assert_eq!(model.key(placeholder).map(|k| k.is_placeholder()), Some(true));

        let code = property(&mut model, blog, "Code", ValueType::new("String"));
        let pk = model
            .set_primary_key(blog, &[code], Provenance::Explicit)
            .expect("pk")
            .applied()
            .expect("applied");

        assert_eq!(model.foreign_key(fk).map(|f| f.principal_key()), Some(pk));
        assert!(model.key(placeholder).is_none());
        assert_eq!(model.all_keys(blog), vec![pk]);
        let dependent = model
            .foreign_key(fk)
            .and_then(|f| f.properties().first().copied())
            .and_then(|p| model.property(p))
            .map(|p| p.value_type().name.clone());
        assert_eq!(dependent.as_deref(), Some("String"));
    }

    /// T3.5: Removing a relationship drops its shadow properties.
    #[test]
    fn removal_drops_shadow_properties() {
        let mut model = Model::new();
        let customer = keyed(&mut model, "Customer");
        let order = keyed(&mut model, "Order");
        let fk = model
            .add_relationship(order, customer, &[], None, Provenance::Annotation)
            .expect("fk")
            .applied()
            .expect("applied");
        assert!(model.find_property(order, "CustomerId").is_some());

        let outcome = model
            .remove_foreign_key(fk, Provenance::Convention)
            .expect("remove");
        assert!(outcome.is_outranked());
        model
            .relationship_builder(fk)
            .remove()
            .expect("remove")
            .applied()
            .expect("applied");
        assert!(model.find_property(order, "CustomerId").is_none());
    }
}

// =============================================================================
// TIER T4: NAVIGATIONS & OWNERSHIP
// =============================================================================

mod t4_navigations {
    use super::*;

    /// T4.1: A collection navigation loses to a unique facet it cannot outrank.
    #[test]
    fn unique_collection_collision() {
        let mut model = Model::new();
        let blog = keyed(&mut model, "Blog");
        let post = keyed(&mut model, "Post");
        let fk = model
            .add_relationship(post, blog, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_is_unique(fk, Some(true), Provenance::Convention)
            .expect("unique");

        let outcome = model
            .set_principal_to_dependent(
                fk,
                Some(NavigationMember::collection("Posts")),
                Provenance::Convention,
            )
            .expect("attach");
        assert!(outcome.is_outranked());
        assert_eq!(model.foreign_key(fk).map(|f| f.is_unique()), Some(true));

        let outcome = model
            .set_principal_to_dependent(
                fk,
                Some(NavigationMember::collection("Posts")),
                Provenance::Explicit,
            )
            .expect("attach");
        assert!(outcome.is_applied());
        assert_eq!(model.foreign_key(fk).map(|f| f.is_unique()), Some(false));
        assert!(model.find_navigation(blog, "Posts").is_some());
    }

    /// T4.2: Ownership requires and then pins the principal-to-dependent side.
    #[test]
    fn ownership_requires_navigation() {
        let mut model = Model::new();
        let order = keyed(&mut model, "Order");
        let line = keyed(&mut model, "OrderLine");
        let fk = model
            .add_relationship(line, order, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");

        for source in Provenance::ALL {
            let err = model
                .set_is_ownership(fk, Some(true), source)
                .expect_err("no navigation");
            assert_eq!(err.kind(), ErrorKind::OwnershipWithoutNavigation);
        }

        model
            .relationship_builder(fk)
            .with_navigation_to_dependent(Some(NavigationMember::collection("Lines")))
            .expect("attach");
        model
            .relationship_builder(fk)
            .is_ownership(true)
            .expect("own");
        assert_eq!(
            model.delete_behavior(fk),
            Some(schemata_core::DeleteBehavior::Cascade)
        );

        for source in Provenance::ALL {
            let err = model
                .set_principal_to_dependent(fk, None, source)
                .expect_err("pinned");
            assert_eq!(err.kind(), ErrorKind::NavigationRequiredByOwnership);
        }

        model
            .relationship_builder(fk)
            .is_ownership(false)
            .expect("disown");
        model
            .relationship_builder(fk)
            .with_navigation_to_dependent(None)
            .expect("detach")
            .applied()
            .expect("applied");
        assert!(model.find_navigation(order, "Lines").is_none());
    }

    /// T4.3: A navigation member is owned by one constraint at a time.
    #[test]
    fn single_ownership_of_navigation() {
        let mut model = Model::new();
        let person = keyed(&mut model, "Person");
        let car = keyed(&mut model, "Car");
        let owner = model
            .add_relationship(car, person, &names(&["OwnerId"]), None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let driver = model
            .add_relationship(car, person, &names(&["DriverId"]), None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");

        model
            .set_dependent_to_principal(owner, Some(NavigationMember::reference("Person")), Provenance::Annotation)
            .expect("attach");
        let outcome = model
            .set_dependent_to_principal(driver, Some(NavigationMember::reference("Person")), Provenance::Convention)
            .expect("attach");
        assert!(outcome.is_outranked());

        model
            .set_dependent_to_principal(driver, Some(NavigationMember::reference("Person")), Provenance::Explicit)
            .expect("attach");
        let owned: Vec<_> = [owner, driver]
            .into_iter()
            .filter(|fk| {
                model
                    .foreign_key(*fk)
                    .and_then(|f| f.dependent_to_principal())
                    .is_some()
            })
            .collect();
        assert_eq!(owned, vec![driver]);
    }

    /// T4.4: Skip navigations pair through a synthesized join node that is
    /// discarded once unreferenced.
    #[test]
    fn synthesized_join_node_lifecycle() {
        let mut model = Model::new();
        let student = keyed(&mut model, "Student");
        let course = keyed(&mut model, "Course");
        let courses = model
            .entity(student)
            .skip_navigation(NavigationMember::collection("Courses"), course)
            .expect("skip")
            .applied()
            .expect("applied");
        let students = model
            .entity(course)
            .skip_navigation(NavigationMember::collection("Students"), student)
            .expect("skip")
            .applied()
            .expect("applied");

        let join = model
            .create_join_entity(courses, students, Provenance::Convention)
            .expect("join")
            .applied()
            .expect("applied");
        assert!(model.entity_type(join).is_some_and(|e| e.is_synthesized()));
        model.finalize().expect("finalize");

        let snapshot = ModelSnapshot::from(&model);
        assert_eq!(snapshot.skip_navigations.len(), 2);
        assert!(snapshot.skip_navigations.iter().all(|s| s.inverse.is_some()));
    }
}

// =============================================================================
// TIER T5: REGISTRY & FINALIZATION
// =============================================================================

mod t5_registry {
    use super::*;

    /// T5.1: Every mutator fails uniformly after finalize.
    #[test]
    fn finalized_model_is_read_only() {
        let mut model = Model::new();
        let blog = keyed(&mut model, "Blog");
        let post = keyed(&mut model, "Post");
        let fk = model
            .add_relationship(post, blog, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model.finalize().expect("finalize");

        let errors = [
            model
                .add_entity_type("Tag", None, TypeRegistration::Shared, Provenance::Explicit)
                .map(|_| ()),
            model.set_is_unique(fk, Some(true), Provenance::Explicit).map(|_| ()),
            model.remove_foreign_key(fk, Provenance::Explicit).map(|_| ()),
            model.set_base_type(post, Some(blog), Provenance::Explicit).map(|_| ()),
            model.ignore("Post", Provenance::Explicit).map(|_| ()),
        ];
        for result in errors {
            assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::ReadOnly));
        }
    }

    /// T5.2: A failed finalize leaves the model exactly as before.
    #[test]
    fn failed_finalize_is_atomic() {
        let mut model = Model::new();
        keyed(&mut model, "Blog");
        entity(&mut model, "Draft", BackingType::new("Draft"));
        let before = ModelSnapshot::from(&model);

        let err = model.finalize().expect_err("missing key");
        assert_eq!(err.kind(), ErrorKind::IncompleteModel);
        assert_eq!(ModelSnapshot::from(&model), before);
        assert!(!model.is_read_only());
    }

    /// T5.3: Entity types in use cannot be removed.
    #[test]
    fn referenced_entity_type_cannot_be_removed() {
        let mut model = Model::new();
        let blog = keyed(&mut model, "Blog");
        let post = keyed(&mut model, "Post");
        model
            .add_relationship(post, blog, &[], None, Provenance::Explicit)
            .expect("fk");
        let err = model
            .remove_entity_type(blog, Provenance::Explicit)
            .expect_err("referenced");
        assert_eq!(err.kind(), ErrorKind::EntityTypeInUse);
    }

    /// T5.4: Cleanup removes unreachable conventional nodes only.
    #[test]
    fn cleanup_keeps_reachable_nodes() {
        let mut model = Model::new();
        let blog = keyed(&mut model, "Blog");
        let author = model
            .add_entity_type(
                "Author",
                Some(BackingType::new("Author")),
                TypeRegistration::Ordinary,
                Provenance::Convention,
            )
            .expect("add")
            .applied()
            .expect("applied");
        let id = model
            .add_property(author, "Id", ValueType::new("i32"), Provenance::Convention)
            .expect("prop")
            .applied()
            .expect("applied");
        model
            .set_primary_key(author, &[id], Provenance::Convention)
            .expect("pk");
        model
            .add_relationship(blog, author, &[], None, Provenance::Convention)
            .expect("fk");
        model
            .add_entity_type(
                "Stray",
                Some(BackingType::new("Stray")),
                TypeRegistration::Ordinary,
                Provenance::Convention,
            )
            .expect("add");

        let removed = model.remove_unreachable().expect("cleanup");
        assert_eq!(removed, vec!["Stray".to_string()]);
        assert!(model.find_entity_type("Author").is_some());
    }

    /// T5.5: Same edits produce the same snapshot checksum.
    #[test]
    fn snapshot_checksum_deterministic() {
        let build = || {
            let mut model = Model::new();
            let blog = keyed(&mut model, "Blog");
            let post = keyed(&mut model, "Post");
            model
                .entity(post)
                .references(blog, &[], Some("Blog"))
                .expect("fk");
            model.finalize().expect("finalize");
            model
        };
        assert_eq!(
            schemata_core::snapshot_checksum(&build()),
            schemata_core::snapshot_checksum(&build())
        );
    }
}
