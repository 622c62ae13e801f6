//! Static type-info records.
//!
//! Every type that is boxed into `eini` or named by `info_de` gets one `KuriTypeInfo` record,
//! memoized by type index. Records chain to the records of their pointee, fields, parameters and
//! results, so the requested set is closed over those links before printing.
//!
//! All records are first declared (`static KuriTypeInfo __info_typeN;`) so initializers can point
//! at each other in any order, then defined with designated initializers.

use std::collections::BTreeSet;

use kuri_core::lang::primitives::{self, PrimitiveCategory};
use kuri_core::runtime::{self, TypeInfoKind};

use super::emitter::{CEmitter, c_string_literal};
use super::errors::CodegenResult;
use crate::frontend::types::{CompoundId, CompoundKind, TypeIndex, TypeRegistry, TypeToken};

/// Name of the record describing `ty`.
pub fn record_name(ty: TypeIndex) -> String {
    format!("__info_type{}", ty.0)
}

#[derive(Debug, Default)]
pub struct ReflectionTable {
    requested: BTreeSet<TypeIndex>,
}

impl ReflectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `&__info_typeN`, recording `ty` for emission.
    pub fn reference(&mut self, ty: TypeIndex) -> String {
        self.requested.insert(ty);
        format!("&{}", record_name(ty))
    }

    /// Declarations and definitions of every requested record and the records they link to.
    #[tracing::instrument(skip_all, fields(requested = self.requested.len()))]
    pub fn emit(&self, registry: &TypeRegistry, indent_width: usize) -> CodegenResult<String> {
        let records = self.closure(registry)?;
        let mut out = CEmitter::new(indent_width);
        for &ty in &records {
            out.line(&format!("static {} {};", runtime::TYPE_INFO_STRUCT, record_name(ty)));
        }
        if !records.is_empty() {
            out.blank_line();
        }
        for &ty in &records {
            self.record(registry, ty, &mut out)?;
        }
        tracing::debug!(records = records.len(), "emitted reflection records");
        Ok(out.finish())
    }

    fn closure(&self, registry: &TypeRegistry) -> CodegenResult<BTreeSet<TypeIndex>> {
        let mut records = BTreeSet::new();
        let mut pending: Vec<TypeIndex> = self.requested.iter().copied().collect();
        while let Some(ty) = pending.pop() {
            if !records.insert(ty) {
                continue;
            }
            pending.extend(links(registry, ty)?.linked());
        }
        Ok(records)
    }

    fn record(&self, registry: &TypeRegistry, ty: TypeIndex, out: &mut CEmitter) -> CodegenResult<()> {
        let name = record_name(ty);
        let links = links(registry, ty)?;
        let size = match registry.layout(ty) {
            Ok(layout) => layout.size,
            Err(_) => 0,
        };
        let display = registry.display(ty);

        let members = if links.fields.is_empty() {
            None
        } else {
            let table = format!("__info_membres{}", ty.0);
            out.line(&format!("static {} {table}[] = {{", runtime::FIELD_INFO_STRUCT));
            out.indent();
            for (field, offset, field_ty) in &links.fields {
                out.line(&format!(
                    "{{{}, {offset}, &{}}},",
                    string_initializer(field.as_bytes()),
                    record_name(*field_ty)
                ));
            }
            out.dedent();
            out.line("};");
            Some((table, links.fields.len()))
        };
        let inputs = type_list(out, &format!("__info_entrees{}", ty.0), &links.inputs);
        let outputs = type_list(out, &format!("__info_sorties{}", ty.0), &links.outputs);

        out.line(&format!("static {} {name} = {{", runtime::TYPE_INFO_STRUCT));
        out.indent();
        out.line(&format!(".genre = {},", links.kind.code()));
        out.line(&format!(".taille_en_octet = {size},"));
        out.line(&format!(".est_signe = {},", if links.signed { "true" } else { "false" }));
        out.line(&format!(".nom = {},", string_initializer(display.as_bytes())));
        if let Some(pointee) = links.pointee {
            out.line(&format!(".type_pointe = &{},", record_name(pointee)));
        }
        if let Some(count) = links.elements {
            out.line(&format!(".nombre_elements = {count},"));
        }
        if let Some((table, count)) = members {
            out.line(&format!(".membres = {table},"));
            out.line(&format!(".nombre_membres = {count},"));
        }
        if let Some((table, count)) = inputs {
            out.line(&format!(".types_entree = {table},"));
            out.line(&format!(".nombre_entrees = {count},"));
        }
        if let Some((table, count)) = outputs {
            out.line(&format!(".types_sortie = {table},"));
            out.line(&format!(".nombre_sorties = {count},"));
        }
        out.dedent();
        out.line("};");
        out.blank_line();
        Ok(())
    }
}

/// `{(int8_t *)"text", len}` for static initializers.
fn string_initializer(bytes: &[u8]) -> String {
    format!("{{(int8_t *){}, {}}}", c_string_literal(bytes), bytes.len())
}

fn type_list(out: &mut CEmitter, table: &str, types: &[TypeIndex]) -> Option<(String, usize)> {
    if types.is_empty() {
        return None;
    }
    let entries: Vec<String> = types.iter().map(|t| format!("&{}", record_name(*t))).collect();
    out.line(&format!(
        "static {} *{table}[] = {{{}}};",
        runtime::TYPE_INFO_STRUCT,
        entries.join(", ")
    ));
    Some((table.to_string(), types.len()))
}

/// What one record says about its type.
struct Links {
    kind: TypeInfoKind,
    signed: bool,
    pointee: Option<TypeIndex>,
    elements: Option<u64>,
    fields: Vec<(String, u64, TypeIndex)>,
    inputs: Vec<TypeIndex>,
    outputs: Vec<TypeIndex>,
}

impl Links {
    fn new(kind: TypeInfoKind) -> Self {
        Self {
            kind,
            signed: false,
            pointee: None,
            elements: None,
            fields: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn linked(&self) -> impl Iterator<Item = TypeIndex> + '_ {
        self.pointee
            .iter()
            .copied()
            .chain(self.fields.iter().map(|f| f.2))
            .chain(self.inputs.iter().copied())
            .chain(self.outputs.iter().copied())
    }
}

fn links(registry: &TypeRegistry, ty: TypeIndex) -> CodegenResult<Links> {
    Ok(match registry.base_token(ty)? {
        TypeToken::Primitive(id) => {
            let info = primitives::info_for(id);
            let kind = match info.category {
                PrimitiveCategory::Unsigned | PrimitiveCategory::Signed => TypeInfoKind::Integer,
                PrimitiveCategory::Real => TypeInfoKind::Real,
                PrimitiveCategory::Bool => TypeInfoKind::Bool,
                PrimitiveCategory::Byte => TypeInfoKind::Byte,
                PrimitiveCategory::Nothing => TypeInfoKind::Nothing,
                PrimitiveCategory::String => TypeInfoKind::String,
                PrimitiveCategory::Any => TypeInfoKind::Any,
            };
            let mut links = Links::new(kind);
            links.signed = matches!(info.category, PrimitiveCategory::Signed | PrimitiveCategory::Real);
            links
        }
        TypeToken::Null => Links::new(TypeInfoKind::Pointer),
        TypeToken::Pointer => Links {
            pointee: Some(registry.pointee(ty)?),
            ..Links::new(TypeInfoKind::Pointer)
        },
        TypeToken::Reference => Links {
            pointee: Some(registry.pointee(ty)?),
            ..Links::new(TypeInfoKind::Reference)
        },
        TypeToken::Array(len) => Links {
            pointee: Some(registry.pointee(ty)?),
            elements: Some(len),
            ..Links::new(TypeInfoKind::Array)
        },
        TypeToken::Slice => Links {
            pointee: Some(registry.pointee(ty)?),
            ..Links::new(TypeInfoKind::Slice)
        },
        TypeToken::Function(signature) => Links {
            inputs: signature.params,
            outputs: signature.returns,
            ..Links::new(TypeInfoKind::Function)
        },
        TypeToken::Compound(id) if id == CompoundId::TYPE_INFO => Links::new(TypeInfoKind::Opaque),
        TypeToken::Compound(id) => {
            let compound = registry.compound(id)?;
            match compound.kind {
                CompoundKind::Struct => Links {
                    fields: compound
                        .fields
                        .into_iter()
                        .map(|f| (f.name, f.offset, f.ty))
                        .collect(),
                    ..Links::new(TypeInfoKind::Struct)
                },
                CompoundKind::Enum { backing, variants } => Links {
                    pointee: Some(backing),
                    elements: Some(variants.len() as u64),
                    ..Links::new(TypeInfoKind::Enum)
                },
                CompoundKind::Opaque => Links::new(TypeInfoKind::Opaque),
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_record_chains_to_pointee() {
        let registry = TypeRegistry::new();
        let pointer = registry.pointer_to(TypeIndex::Z32).unwrap();
        let mut table = ReflectionTable::new();
        assert_eq!(table.reference(pointer), format!("&__info_type{}", pointer.0));
        let text = table.emit(&registry, 4).unwrap();
        assert!(text.contains(&format!("static KuriTypeInfo __info_type{};", TypeIndex::Z32.0)));
        assert!(text.contains(&format!(".type_pointe = &__info_type{},", TypeIndex::Z32.0)));
        assert!(text.contains(".nom = {(int8_t *)\"*z32\", 4},"));
    }

    #[test]
    fn test_struct_record_lists_fields_with_offsets() {
        let registry = TypeRegistry::new();
        let (id, point) = registry.declare_struct("Point", "geo", false);
        registry
            .set_fields(id, vec![("a".into(), TypeIndex::N8), ("b".into(), TypeIndex::R64)])
            .unwrap();
        registry.finalize(id).unwrap();
        let mut table = ReflectionTable::new();
        table.reference(point);
        let text = table.emit(&registry, 4).unwrap();
        assert!(text.contains(&format!("static KuriFieldInfo __info_membres{}[] = {{", point.0)));
        assert!(text.contains(&format!("{{{{(int8_t *)\"b\", 1}}, 8, &__info_type{}}},", TypeIndex::R64.0)));
        assert!(text.contains(".taille_en_octet = 16,"));
        assert!(text.contains(".nombre_membres = 2,"));
    }

    #[test]
    fn test_signedness() {
        let registry = TypeRegistry::new();
        let mut table = ReflectionTable::new();
        table.reference(TypeIndex::N32);
        let text = table.emit(&registry, 4).unwrap();
        assert!(text.contains(".est_signe = false,"));
        assert!(text.contains(&format!(".genre = {},", TypeInfoKind::Integer.code())));
    }
}
