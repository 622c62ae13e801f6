//! C spelling of Kuri types and the type-definition sections of the output.
//!
//! Every type the lowering spells is recorded; once all functions are emitted, [`TypeTable::sections`]
//! closes the recorded set over its dependencies and prints:
//!
//! 1. forward `typedef struct X X;` for structs, fixed-array wrappers and slice views, and the
//!    backing typedef of each enum
//! 2. function-pointer typedefs, a typedef before any typedef mentioning it
//! 3. struct bodies, each after the bodies it embeds by value
//! 4. enum variant constants
//!
//! Fixed arrays are wrapped (`struct KuriTabN { T data[N]; }`) so they copy by value; slices are
//! `{ pointeur, taille }` views.

use std::collections::{BTreeSet, HashMap};

use kuri_core::lang::primitives;
use kuri_core::runtime;

use super::emitter::CEmitter;
use super::errors::{CodegenFault, CodegenResult};
use crate::frontend::mangle::c_identifier;
use crate::frontend::types::{CompoundId, CompoundKind, Signature, TypeIndex, TypeRegistry, TypeToken};

/// `T name`, gluing pointer stars to the name.
pub fn declaration(c_type: &str, name: &str) -> String {
    if c_type.ends_with('*') {
        format!("{c_type}{name}")
    } else {
        format!("{c_type} {name}")
    }
}

/// C name of a struct, enum or opaque compound.
pub fn compound_name(registry: &TypeRegistry, id: CompoundId) -> CodegenResult<String> {
    if id == CompoundId::TYPE_INFO {
        return Ok(runtime::TYPE_INFO_STRUCT.to_string());
    }
    let compound = registry.compound(id)?;
    Ok(match compound.kind {
        CompoundKind::Opaque => c_identifier(&compound.name),
        _ => c_identifier(&format!("{}_{}", compound.module, compound.name)),
    })
}

/// Type spellings and the set of types the output refers to.
#[derive(Debug, Default)]
pub struct TypeTable {
    names: HashMap<TypeIndex, String>,
    used: BTreeSet<TypeIndex>,
}

/// Printed type-definition sections, in output order.
#[derive(Debug, Default)]
pub struct TypeSections {
    pub forward: String,
    pub functions: String,
    pub bodies: String,
    pub constants: String,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// C spelling of `ty`, recording it for the definition sections.
    pub fn c_type(&mut self, registry: &TypeRegistry, ty: TypeIndex) -> CodegenResult<String> {
        if !ty.is_resolved() {
            return Err(CodegenFault::unresolved(ty, "type spelling"));
        }
        self.used.insert(ty);
        if let Some(name) = self.names.get(&ty) {
            return Ok(name.clone());
        }
        let name = match registry.base_token(ty)? {
            TypeToken::Primitive(id) => primitives::info_for(id).c_spelling.to_string(),
            TypeToken::Null => "void *".to_string(),
            TypeToken::Pointer | TypeToken::Reference => {
                let pointee = self.c_type(registry, registry.pointee(ty)?)?;
                if pointee.ends_with('*') {
                    format!("{pointee}*")
                } else {
                    format!("{pointee} *")
                }
            }
            TypeToken::Array(_) => format!("KuriTab{}", ty.0),
            TypeToken::Slice => format!("KuriTranche{}", ty.0),
            TypeToken::Function(_) => format!("KuriFonc{}", ty.0),
            TypeToken::Compound(id) => compound_name(registry, id)?,
        };
        self.names.insert(ty, name.clone());
        Ok(name)
    }

    /// Print the definition sections for every recorded type and its dependencies.
    pub fn sections(&mut self, registry: &TypeRegistry, indent_width: usize) -> CodegenResult<TypeSections> {
        let all = self.closure(registry)?;
        let mut sections = TypeSections::default();

        let mut forward = CEmitter::new(indent_width);
        let mut constants = CEmitter::new(indent_width);
        for &ty in &all {
            match registry.base_token(ty)? {
                TypeToken::Array(_) | TypeToken::Slice => {
                    let name = self.c_type(registry, ty)?;
                    forward.line(&format!("typedef struct {name} {name};"));
                }
                TypeToken::Compound(id) if id != CompoundId::TYPE_INFO => {
                    let compound = registry.compound(id)?;
                    let name = self.c_type(registry, ty)?;
                    match compound.kind {
                        CompoundKind::Struct | CompoundKind::Opaque => {
                            forward.line(&format!("typedef struct {name} {name};"));
                        }
                        CompoundKind::Enum { backing, variants } => {
                            let backing = self.c_type(registry, backing)?;
                            forward.line(&format!("typedef {backing} {name};"));
                            for (variant, value) in variants {
                                constants.line(&format!(
                                    "static const {name} {} = {value};",
                                    c_identifier(&format!("{name}_{variant}"))
                                ));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        sections.forward = forward.finish();
        sections.constants = constants.finish();

        let mut functions = CEmitter::new(indent_width);
        let mut done = BTreeSet::new();
        for &ty in &all {
            self.function_typedef(registry, ty, &mut done, &mut Vec::new(), &mut functions)?;
        }
        sections.functions = functions.finish();

        let mut bodies = CEmitter::new(indent_width);
        let mut done = BTreeSet::new();
        for &ty in &all {
            self.body(registry, ty, &mut done, &mut bodies)?;
        }
        sections.bodies = bodies.finish();
        Ok(sections)
    }

    /// Recorded types plus everything their definitions mention.
    fn closure(&self, registry: &TypeRegistry) -> CodegenResult<BTreeSet<TypeIndex>> {
        let mut all = BTreeSet::new();
        let mut pending: Vec<TypeIndex> = self.used.iter().copied().collect();
        while let Some(ty) = pending.pop() {
            if !all.insert(ty) {
                continue;
            }
            match registry.base_token(ty)? {
                TypeToken::Pointer | TypeToken::Reference | TypeToken::Array(_) | TypeToken::Slice => {
                    pending.push(registry.pointee(ty)?);
                }
                TypeToken::Function(signature) => {
                    pending.extend(signature.params.iter().chain(&signature.returns).copied());
                }
                TypeToken::Compound(id) => {
                    let compound = registry.compound(id)?;
                    pending.extend(compound.fields.iter().map(|f| f.ty));
                    if let CompoundKind::Enum { backing, .. } = compound.kind {
                        pending.push(backing);
                    }
                }
                TypeToken::Primitive(_) | TypeToken::Null => {}
            }
        }
        Ok(all)
    }

    fn function_typedef(
        &mut self,
        registry: &TypeRegistry,
        ty: TypeIndex,
        done: &mut BTreeSet<TypeIndex>,
        visiting: &mut Vec<TypeIndex>,
        out: &mut CEmitter,
    ) -> CodegenResult<()> {
        let Some(signature) = registry.signature_of(ty) else {
            return Ok(());
        };
        if done.contains(&ty) || visiting.contains(&ty) {
            return Ok(());
        }
        visiting.push(ty);
        for &mentioned in signature.params.iter().chain(&signature.returns) {
            if let Some(function) = self.function_behind_pointers(registry, mentioned)? {
                self.function_typedef(registry, function, done, visiting, out)?;
            }
        }
        visiting.pop();
        let name = self.c_type(registry, ty)?;
        let line = self.function_pointer(registry, &name, &signature)?;
        out.line(&line);
        done.insert(ty);
        Ok(())
    }

    fn function_behind_pointers(&self, registry: &TypeRegistry, mut ty: TypeIndex) -> CodegenResult<Option<TypeIndex>> {
        loop {
            match registry.base_token(ty)? {
                TypeToken::Pointer | TypeToken::Reference => ty = registry.pointee(ty)?,
                TypeToken::Function(_) => return Ok(Some(ty)),
                _ => return Ok(None),
            }
        }
    }

    /// `typedef R (*name)(P...);`, with output pointers for several returns.
    fn function_pointer(&mut self, registry: &TypeRegistry, name: &str, signature: &Signature) -> CodegenResult<String> {
        if signature.coroutine {
            return Ok(format!("typedef void (*{name})(void *);"));
        }
        let mut params = Vec::with_capacity(signature.params.len() + signature.returns.len());
        for &param in &signature.params {
            params.push(self.c_type(registry, param)?);
        }
        let result = match signature.returns.as_slice() {
            [] => "void".to_string(),
            [single] => self.c_type(registry, *single)?,
            several => {
                for &slot in several {
                    let c_type = self.c_type(registry, slot)?;
                    params.push(declaration(&c_type, "*").trim_end().to_string());
                }
                "void".to_string()
            }
        };
        let params = if params.is_empty() { "void".to_string() } else { params.join(", ") };
        Ok(format!("typedef {result} (*{name})({params});"))
    }

    /// Print the body of `ty` after the bodies it embeds by value.
    fn body(
        &mut self,
        registry: &TypeRegistry,
        ty: TypeIndex,
        done: &mut BTreeSet<TypeIndex>,
        out: &mut CEmitter,
    ) -> CodegenResult<()> {
        if done.contains(&ty) {
            return Ok(());
        }
        let token = registry.base_token(ty)?;
        let fields: Vec<(String, TypeIndex, Option<u64>)> = match &token {
            TypeToken::Compound(id) if *id != CompoundId::TYPE_INFO => {
                let compound = registry.compound(*id)?;
                if compound.kind != CompoundKind::Struct {
                    return Ok(());
                }
                compound
                    .fields
                    .iter()
                    .map(|f| (c_identifier(&f.name), f.ty, None))
                    .collect()
            }
            TypeToken::Array(len) => vec![(runtime::ARRAY_DATA.to_string(), registry.pointee(ty)?, Some(*len))],
            TypeToken::Slice => {
                let pointer = registry.pointer_to(registry.pointee(ty)?)?;
                vec![
                    (runtime::MEMBER_POINTER.to_string(), pointer, None),
                    (runtime::MEMBER_LENGTH.to_string(), TypeIndex::Z64, None),
                ]
            }
            _ => return Ok(()),
        };
        done.insert(ty);
        if !matches!(token, TypeToken::Slice) {
            for (_, field_ty, _) in &fields {
                if let Some(embedded) = by_value_definition(registry, *field_ty)? {
                    self.body(registry, embedded, done, out)?;
                }
            }
        }

        let name = self.c_type(registry, ty)?;
        out.line(&format!("struct {name} {{"));
        out.indent();
        if fields.is_empty() {
            out.line("char __vide;");
        }
        for (field, field_ty, len) in fields {
            let c_type = self.c_type(registry, field_ty)?;
            let declarator = match len {
                Some(len) => format!("{field}[{}]", len.max(1)),
                None => field,
            };
            out.line(&format!("{};", declaration(&c_type, &declarator)));
        }
        out.dedent();
        out.line("};");
        out.blank_line();
        Ok(())
    }
}

/// The struct-like definition a value of `ty` embeds, if any.
fn by_value_definition(registry: &TypeRegistry, ty: TypeIndex) -> CodegenResult<Option<TypeIndex>> {
    Ok(match registry.base_token(ty)? {
        TypeToken::Array(_) | TypeToken::Slice => Some(ty),
        TypeToken::Compound(id) if id != CompoundId::TYPE_INFO => {
            let compound = registry.compound(id)?;
            (compound.kind == CompoundKind::Struct).then_some(ty)
        }
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_spelling() {
        let registry = TypeRegistry::new();
        let mut table = TypeTable::new();
        let pointer = registry.pointer_to(TypeIndex::Z32).unwrap();
        let double = registry.pointer_to(pointer).unwrap();
        assert_eq!(table.c_type(&registry, pointer).unwrap(), "int32_t *");
        assert_eq!(table.c_type(&registry, double).unwrap(), "int32_t **");
        assert_eq!(declaration("int32_t *", "p"), "int32_t *p");
        assert_eq!(declaration("double", "x"), "double x");
    }

    #[test]
    fn test_unresolved_type_is_a_fault() {
        let registry = TypeRegistry::new();
        let mut table = TypeTable::new();
        assert!(matches!(
            table.c_type(&registry, TypeIndex::UNRESOLVED),
            Err(CodegenFault::UnresolvedType { .. })
        ));
    }

    #[test]
    fn test_embedded_struct_body_comes_first() {
        let registry = TypeRegistry::new();
        let (inner_id, inner) = registry.declare_struct("Point", "geo", false);
        registry.set_fields(inner_id, vec![("x".into(), TypeIndex::R64)]).unwrap();
        registry.finalize(inner_id).unwrap();
        let (outer_id, outer) = registry.declare_struct("Ligne", "geo", false);
        let pair = registry.array_of(inner, 2).unwrap();
        registry.set_fields(outer_id, vec![("bouts".into(), pair)]).unwrap();
        registry.finalize(outer_id).unwrap();

        let mut table = TypeTable::new();
        table.c_type(&registry, outer).unwrap();
        let sections = table.sections(&registry, 4).unwrap();
        assert!(sections.forward.contains("typedef struct geo_Ligne geo_Ligne;"));
        let point = sections.bodies.find("struct geo_Point {").unwrap();
        let array = sections.bodies.find(&format!("struct KuriTab{} {{", pair.0)).unwrap();
        let line = sections.bodies.find("struct geo_Ligne {").unwrap();
        assert!(point < array && array < line, "{}", sections.bodies);
        assert!(sections.bodies.contains("geo_Point data[2];"));
    }

    #[test]
    fn test_enum_typedef_and_constants() {
        let registry = TypeRegistry::new();
        let (id, ty) = registry.declare_enum("Couleur", "m");
        registry
            .set_enum(id, TypeIndex::N8, vec![("ROUGE".into(), 0), ("VERT".into(), 1)])
            .unwrap();
        let mut table = TypeTable::new();
        table.c_type(&registry, ty).unwrap();
        let sections = table.sections(&registry, 4).unwrap();
        assert!(sections.forward.contains("typedef uint8_t m_Couleur;"));
        assert!(sections.constants.contains("static const m_Couleur m_Couleur_VERT = 1;"));
    }

    #[test]
    fn test_function_typedef_with_output_slots() {
        let registry = TypeRegistry::new();
        let ty = registry
            .function(Signature {
                params: vec![TypeIndex::Z32],
                returns: vec![TypeIndex::Z32, TypeIndex::BOOL],
                coroutine: false,
            })
            .unwrap();
        let mut table = TypeTable::new();
        let name = table.c_type(&registry, ty).unwrap();
        let sections = table.sections(&registry, 4).unwrap();
        assert!(
            sections
                .functions
                .contains(&format!("typedef void (*{name})(int32_t, int32_t *, bool *);")),
            "{}",
            sections.functions
        );
    }
}
