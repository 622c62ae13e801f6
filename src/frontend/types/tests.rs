//! Type registry unit tests.

use super::*;

fn registry() -> TypeRegistry {
    TypeRegistry::new()
}

// ========================================
// Interning
// ========================================

#[test]
fn test_preinterned_indices_match_constants() {
    let reg = registry();
    assert_eq!(reg.intern(TypeDescriptor::primitive(PrimitiveId::Z32)).unwrap(), TypeIndex::Z32);
    assert_eq!(reg.intern(TypeDescriptor::primitive(PrimitiveId::Eini)).unwrap(), TypeIndex::EINI);
    assert_eq!(reg.intern(TypeDescriptor::new(vec![TypeToken::Null])).unwrap(), TypeIndex::NULL);
    assert_eq!(reg.pointer_to(TypeIndex::TYPE_INFO).unwrap(), TypeIndex::TYPE_INFO_PTR);
    assert_eq!(reg.display(TypeIndex::TYPE_INFO_PTR), "*InfoType");
}

#[test]
fn test_interning_is_idempotent() {
    let reg = registry();
    let a = reg.pointer_to(TypeIndex::R64).unwrap();
    let b = reg.pointer_to(TypeIndex::R64).unwrap();
    assert_eq!(a, b);
    let count = reg.len();
    reg.pointer_to(TypeIndex::R64).unwrap();
    assert_eq!(reg.len(), count);
}

#[test]
fn test_interning_registers_dereferenced_types() {
    let reg = registry();
    let before = reg.len();
    let descriptor = TypeDescriptor::new(vec![
        TypeToken::Pointer,
        TypeToken::Array(4),
        TypeToken::Primitive(PrimitiveId::N16),
    ]);
    let outer = reg.intern(descriptor).unwrap();
    // `*[4]n16` and `[4]n16` are new; `n16` was pre-interned.
    assert_eq!(reg.len(), before + 2);
    let array = reg.pointee(outer).unwrap();
    assert_eq!(reg.display(array), "[4]n16");
    assert_eq!(reg.pointee(array).unwrap(), TypeIndex::N16);
}

#[test]
fn test_invalid_descriptors_are_refused() {
    let reg = registry();
    let before = reg.len();
    let dangling = TypeDescriptor::new(vec![TypeToken::Pointer]);
    assert!(matches!(reg.intern(dangling), Err(TypeError::InvalidDescriptor(_))));
    let inverted = TypeDescriptor::new(vec![TypeToken::Primitive(PrimitiveId::Z8), TypeToken::Pointer]);
    assert!(reg.intern(inverted).is_err());
    assert!(reg.intern(TypeDescriptor::new(Vec::new())).is_err());
    assert_eq!(reg.len(), before);
}

#[test]
fn test_dereference_of_scalar_fails() {
    let reg = registry();
    assert!(matches!(reg.dereference(TypeIndex::Z32), Err(TypeError::InvalidDereference(_))));
    assert!(reg.is_invalid(TypeIndex::UNRESOLVED));
    assert!(!reg.is_invalid(TypeIndex::BOOL));
}

#[test]
fn test_base_token_is_outermost() {
    let reg = registry();
    let slice = reg.slice_of(TypeIndex::CHAINE).unwrap();
    assert_eq!(reg.base_token(slice).unwrap(), TypeToken::Slice);
    assert_eq!(reg.display(slice), "[]chaine");
}

#[test]
fn test_function_types_are_interned_by_signature() {
    let reg = registry();
    let sig = Signature {
        params: vec![TypeIndex::Z32],
        returns: vec![TypeIndex::BOOL],
        coroutine: false,
    };
    let a = reg.function(sig.clone()).unwrap();
    let b = reg.function(sig).unwrap();
    assert_eq!(a, b);
    assert_eq!(reg.display(a), "fonc(z32)(bool)");
}

// ========================================
// Compatibility
// ========================================

#[test]
fn test_identical_types() {
    let reg = registry();
    assert_eq!(reg.compatibility(TypeIndex::Z64, TypeIndex::Z64, SourceKind::Expression), Coercion::Identical);
}

#[test]
fn test_integer_literal_widens_to_real() {
    let reg = registry();
    let c = reg.compatibility(TypeIndex::R64, TypeIndex::Z32, SourceKind::IntegerLiteral);
    assert_eq!(c, Coercion::RealLiteralWiden);
    let c = reg.compatibility(TypeIndex::R64, TypeIndex::Z32, SourceKind::Expression);
    assert_eq!(c, Coercion::Incompatible);
}

#[test]
fn test_integer_literal_widens_to_any_integer() {
    let reg = registry();
    for target in [TypeIndex::N8, TypeIndex::Z64, TypeIndex::OCTET] {
        let c = reg.compatibility(target, TypeIndex::Z32, SourceKind::IntegerLiteral);
        assert_eq!(c, Coercion::IntegerLiteralWiden);
    }
}

#[test]
fn test_any_boxing_and_unboxing() {
    let reg = registry();
    assert_eq!(reg.compatibility(TypeIndex::EINI, TypeIndex::R32, SourceKind::Expression), Coercion::BoxToAny);
    assert_eq!(reg.compatibility(TypeIndex::Z32, TypeIndex::EINI, SourceKind::Expression), Coercion::UnboxFromAny);
    assert_eq!(reg.compatibility(TypeIndex::EINI, TypeIndex::RIEN, SourceKind::Expression), Coercion::Incompatible);
}

#[test]
fn test_array_decay_and_byte_view() {
    let reg = registry();
    let array = reg.array_of(TypeIndex::Z32, 3).unwrap();
    let slice = reg.slice_of(TypeIndex::Z32).unwrap();
    assert_eq!(reg.compatibility(slice, array, SourceKind::Expression), Coercion::ArrayDecay);
    let bytes = reg.slice_of(TypeIndex::OCTET).unwrap();
    assert_eq!(reg.compatibility(bytes, TypeIndex::R64, SourceKind::Expression), Coercion::ByteReinterpret);
    let other = reg.slice_of(TypeIndex::Z64).unwrap();
    assert_eq!(reg.compatibility(other, array, SourceKind::Expression), Coercion::Incompatible);
}

#[test]
fn test_c_string_and_references() {
    let reg = registry();
    let char_ptr = reg.pointer_to(TypeIndex::Z8).unwrap();
    assert_eq!(reg.compatibility(char_ptr, TypeIndex::CHAINE, SourceKind::Expression), Coercion::ExtractCString);
    let reference = reg.reference_to(TypeIndex::R64).unwrap();
    assert_eq!(reg.compatibility(reference, TypeIndex::R64, SourceKind::Expression), Coercion::BindByReference);
}

#[test]
fn test_pointer_rules() {
    let reg = registry();
    let p = reg.pointer_to(TypeIndex::Z32).unwrap();
    let void_ptr = reg.pointer_to(TypeIndex::RIEN).unwrap();
    assert_eq!(reg.compatibility(p, TypeIndex::NULL, SourceKind::Expression), Coercion::Identical);
    assert_eq!(reg.compatibility(void_ptr, p, SourceKind::Expression), Coercion::Identical);
    assert_eq!(reg.compatibility(p, void_ptr, SourceKind::Expression), Coercion::Incompatible);
}

#[test]
fn test_penalties_rank_exact_first() {
    assert_eq!(Coercion::Identical.penalty(), Some(0));
    assert!(Coercion::IntegerLiteralWiden.penalty() < Coercion::BoxToAny.penalty());
    assert_eq!(Coercion::Incompatible.penalty(), None);
    assert!(Coercion::BoxToAny.flags().contains(CoercionSet::BOX_TO_ANY));
}

// ========================================
// Compounds and layout
// ========================================

#[test]
fn test_struct_layout_with_padding() {
    let reg = registry();
    let (id, index) = reg.declare_struct("Mixte", "m", false);
    reg.set_fields(
        id,
        vec![
            ("a".into(), TypeIndex::BOOL),
            ("b".into(), TypeIndex::Z64),
            ("c".into(), TypeIndex::N16),
        ],
    )
    .unwrap();
    let layout = reg.finalize(id).unwrap();
    assert_eq!(layout, Layout { size: 24, alignment: 8 });
    let compound = reg.compound(id).unwrap();
    let offsets: Vec<u64> = compound.fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, vec![0, 8, 16]);
    assert_eq!(reg.layout(index).unwrap(), layout);
}

#[test]
fn test_array_and_slice_layout() {
    let reg = registry();
    let array = reg.array_of(TypeIndex::N16, 5).unwrap();
    assert_eq!(reg.layout(array).unwrap(), Layout { size: 10, alignment: 2 });
    let slice = reg.slice_of(TypeIndex::N16).unwrap();
    assert_eq!(reg.layout(slice).unwrap(), Layout::TWO_WORDS);
    assert_eq!(reg.layout(TypeIndex::CHAINE).unwrap(), Layout::TWO_WORDS);
}

#[test]
fn test_enum_layout_follows_backing_type() {
    let reg = registry();
    let (id, index) = reg.declare_enum("Couleur", "m");
    reg.set_enum(id, TypeIndex::N8, vec![("ROUGE".into(), 0), ("VERT".into(), 1)])
        .unwrap();
    assert_eq!(reg.layout(index).unwrap(), Layout { size: 1, alignment: 1 });
    assert_eq!(reg.compound(id).unwrap().variant("VERT"), Some(1));
    assert!(reg.is_integral(index));
}

#[test]
fn test_oversized_array_is_too_large() {
    let reg = registry();
    let array = reg.array_of(TypeIndex::Z64, i64::MAX as u64).unwrap();
    assert!(matches!(reg.layout(array), Err(TypeError::TooLarge(_))));
    let (id, _) = reg.declare_struct("Enorme", "m", false);
    reg.set_fields(id, vec![("valeurs".into(), array)]).unwrap();
    assert!(matches!(reg.finalize(id), Err(TypeError::TooLarge(name)) if name == "Enorme"));
}

#[test]
fn test_struct_fields_summing_past_the_limit_are_too_large() {
    let reg = registry();
    let half = reg.array_of(TypeIndex::Z64, (i64::MAX as u64) / 8).unwrap();
    assert!(reg.layout(half).is_ok());
    let (id, _) = reg.declare_struct("Double", "m", false);
    reg.set_fields(id, vec![("a".into(), half), ("b".into(), half)]).unwrap();
    assert!(matches!(reg.finalize(id), Err(TypeError::TooLarge(_))));
}

#[test]
fn test_layout_of_unfinished_struct_is_incomplete() {
    let reg = registry();
    let (_, index) = reg.declare_struct("Vide", "m", false);
    assert!(matches!(reg.layout(index), Err(TypeError::Incomplete(_))));
}

#[test]
fn test_self_inclusion_is_a_cycle() {
    let reg = registry();
    let (id, index) = reg.declare_struct("Noeud", "m", false);
    let err = reg.set_fields(id, vec![("suivant".into(), index)]).unwrap_err();
    assert!(matches!(err, TypeError::StructureCycle { .. }));

    let array = reg.array_of(index, 2).unwrap();
    assert!(reg.set_fields(id, vec![("enfants".into(), array)]).is_err());

    let pointer = reg.pointer_to(index).unwrap();
    assert!(reg.set_fields(id, vec![("suivant".into(), pointer)]).is_ok());
}

#[test]
fn test_mutual_inclusion_is_a_cycle() {
    let reg = registry();
    let (a, a_index) = reg.declare_struct("A", "m", false);
    let (b, b_index) = reg.declare_struct("B", "m", false);
    reg.set_fields(a, vec![("b".into(), b_index)]).unwrap();
    let err = reg.set_fields(b, vec![("a".into(), a_index)]).unwrap_err();
    assert!(matches!(err, TypeError::StructureCycle { ref structure, .. } if structure == "B"));
}

#[test]
fn test_duplicate_field() {
    let reg = registry();
    let (id, _) = reg.declare_struct("Double", "m", false);
    let err = reg
        .set_fields(id, vec![("x".into(), TypeIndex::Z32), ("x".into(), TypeIndex::Z32)])
        .unwrap_err();
    assert!(matches!(err, TypeError::DuplicateField { .. }));
}
