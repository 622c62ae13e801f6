//! Declaration units: function headers and bodies, structs, enums and globals.
//!
//! Each unit publishes its entry in the [`ModuleTable`](crate::frontend::module::ModuleTable) as
//! soon as it is complete, which is what parked units wait for. A function publishes its header
//! before its body is validated, so recursive and mutually recursive calls never wait on
//! themselves.

use super::collect::UnitEntity;
use super::stmt::ends_with_return;
use super::{Binding, FunctionContext, Validator};
use crate::frontend::ast::{
    Access, Declaration, EnumDecl, FunctionDecl, Lowering, Node, NodeKind, ParamDecl, Span, StructDecl, TypeExpr,
};
use crate::frontend::diagnostics::errors;
use crate::frontend::mangle;
use crate::frontend::module::{FunctionId, GlobalId, ParamInfo};
use crate::frontend::suspension::{Validation, WaitReason};
use crate::frontend::types::{CompoundId, CompoundState, TypeError, TypeIndex};

impl Validator<'_> {
    /// Validate one declaration unit and publish what it declares.
    pub fn validate_declaration(&mut self, declaration: &mut Declaration, entity: UnitEntity) -> Validation<()> {
        let span = declaration.name().span;
        match (declaration, entity) {
            (Declaration::Function(function), UnitEntity::Function(id)) => self.function_declaration(function, id),
            (Declaration::Struct(structure), UnitEntity::Compound(id)) => self.struct_declaration(structure, id),
            (Declaration::Enum(enumeration), UnitEntity::Compound(id)) => self.enum_declaration(enumeration, id),
            (Declaration::Global(node), UnitEntity::Global(id)) => self.global_declaration(node, id),
            (declaration, _) => Err(errors::type_mismatch(
                format!("`{}` was registered as a different kind of declaration", declaration.name().text),
                span,
            )
            .into()),
        }
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    fn function_declaration(&mut self, decl: &mut FunctionDecl, id: FunctionId) -> Validation<()> {
        let name = decl.name.text.clone();
        let span = decl.name.span;

        if decl.c_variadic && !decl.external {
            return Err(errors::type_mismatch(
                format!("only external functions can take C variadic arguments (`{name}`)"),
                span,
            )
            .into());
        }
        if decl.external && decl.body.is_some() {
            return Err(errors::type_mismatch(format!("external function `{name}` cannot have a body"), span).into());
        }
        if !decl.external && decl.body.is_none() {
            return Err(errors::type_mismatch(format!("function `{name}` has no body"), span).into());
        }
        if decl.coroutine && decl.returns.is_empty() {
            return Err(errors::type_mismatch(
                format!("coroutine `{name}` must declare the types of the values it yields"),
                span,
            )
            .into());
        }

        let mut params: Vec<ParamInfo> = Vec::with_capacity(decl.params.len());
        for (position, param) in decl.params.iter().enumerate() {
            let param_span = param.name.span;
            if param.variadic && position + 1 != decl.params.len() {
                return Err(errors::type_mismatch(
                    format!("only the last parameter can be variadic (`{}`)", param.name.text),
                    param_span,
                )
                .into());
            }
            if let Some(previous) = params.iter().position(|p| p.name == param.name.text) {
                return Err(errors::redefinition(
                    "parameter",
                    &param.name.text,
                    param_span,
                    decl.params[previous].name.span,
                )
                .into());
            }
            let mut ty = self.resolve_type(&param.ty, param_span, false)?;
            if ty == TypeIndex::RIEN {
                return Err(errors::type_mismatch(
                    format!("parameter `{}` cannot have type `rien`", param.name.text),
                    param_span,
                )
                .into());
            }
            if param.variadic {
                ty = self.intern(self.registry.slice_of(ty), param_span)?;
            }
            params.push(ParamInfo {
                name: param.name.text.clone(),
                ty,
                variadic: param.variadic,
                mutable: param.mutable,
                employed: param.employed,
            });
        }
        let returns = decl
            .returns
            .iter()
            .map(|r| self.resolve_type(r, span, false))
            .collect::<Validation<Vec<_>>>()?;
        if returns.contains(&TypeIndex::RIEN) && returns.len() > 1 {
            return Err(errors::type_mismatch("`rien` cannot be one of several return types", span).into());
        }
        let returns: Vec<TypeIndex> = returns.into_iter().filter(|r| *r != TypeIndex::RIEN).collect();

        if name == self.entry_point {
            let valid_return = returns.is_empty() || returns == [TypeIndex::Z32];
            if !params.is_empty() || !valid_return || decl.coroutine {
                return Err(errors::type_mismatch(
                    format!("the entry point `{name}` takes no parameters and returns `z32` or nothing"),
                    span,
                )
                .into());
            }
        }

        let param_types: Vec<TypeIndex> = params.iter().map(|p| p.ty).collect();
        let linkage = mangle::function_name(
            self.registry,
            &self.module_name(),
            &name,
            &param_types,
            &returns,
            decl.external,
            self.entry_point,
        );
        if let Err(previous) = self.modules.publish_function(id, params.clone(), returns.clone(), linkage) {
            let previous_span = self.modules.function(previous).map(|f| f.span).unwrap_or(span);
            return Err(errors::redefinition("function", &name, span, previous_span).into());
        }
        tracing::debug!(function = %name, "published function header");

        let Some(body) = decl.body.as_mut() else {
            return Ok(());
        };

        self.function = Some(FunctionContext {
            name: name.clone(),
            returns: returns.clone(),
            coroutine: decl.coroutine,
        });
        self.scope.enter();
        let result = self.bind_params(decl_params_view(&decl.params), &params).and_then(|()| match body.kind {
            NodeKind::Block => self.block(body),
            _ => self.statement(body),
        });
        self.scope.leave();
        self.function = None;
        result?;

        if !returns.is_empty() && !decl.coroutine && !ends_with_return(body) {
            return Err(errors::invalid_control(
                format!("`{name}` does not return a value on every path"),
                span,
            )
            .with_note("the last statement must be a `retourne`, or an `si`/`sinon` whose branches both return")
            .into());
        }
        Ok(())
    }

    fn bind_params(&mut self, spans: Vec<(Span, bool)>, params: &[ParamInfo]) -> Validation<()> {
        for (param, (span, reference)) in params.iter().zip(spans) {
            if reference {
                let ty = self.intern(self.registry.pointee(param.ty), span)?;
                self.declare_local(
                    &param.name,
                    Binding {
                        ty,
                        mutable: true,
                        access: Access::ReferenceParam,
                        span,
                    },
                )?;
            } else {
                self.declare_local(
                    &param.name,
                    Binding {
                        ty: param.ty,
                        mutable: param.mutable,
                        access: Access::Local,
                        span,
                    },
                )?;
            }
            if param.employed {
                self.employ(param, span)?;
            }
        }
        Ok(())
    }

    /// Bring the fields of an employed struct (or pointed-to struct) parameter into scope.
    fn employ(&mut self, param: &ParamInfo, span: Span) -> Validation<()> {
        let (struct_ty, through_pointer) = match self.registry.compound_of(param.ty) {
            Some(_) => (param.ty, false),
            None => match self.registry.pointee(param.ty) {
                Ok(inner) if self.registry.compound_of(inner).is_some() => (inner, true),
                _ => {
                    return Err(errors::type_mismatch(
                        format!(
                            "only structs and pointers to structs can be employed, `{}` has type `{}`",
                            param.name,
                            self.display(param.ty)
                        ),
                        span,
                    )
                    .into());
                }
            },
        };
        let Some(compound_id) = self.registry.compound_of(struct_ty) else {
            return Ok(());
        };
        if let Some((module, name)) = self.modules.compound_owner(compound_id) {
            self.require(WaitReason::Compound { module, name })?;
        }
        let compound = self
            .registry
            .compound(compound_id)
            .map_err(|e| errors::type_mismatch(e.to_string(), span))?;
        if compound.is_enum() {
            return Err(errors::type_mismatch(format!("enum `{}` cannot be employed", compound.name), span).into());
        }
        for field in compound.fields {
            self.declare_local(
                &field.name,
                Binding {
                    ty: field.ty,
                    mutable: param.mutable || through_pointer,
                    access: Access::Employed {
                        base: param.name.clone(),
                        through_pointer,
                    },
                    span,
                },
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Compounds
    // ------------------------------------------------------------------------

    fn struct_declaration(&mut self, decl: &StructDecl, id: CompoundId) -> Validation<()> {
        let name = &decl.name.text;
        if decl.external {
            self.modules.publish_compound(self.module, name);
            return Ok(());
        }

        let compound = self.compound_state(id, decl.name.span)?;
        if compound == CompoundState::Declared {
            let mut fields = Vec::with_capacity(decl.fields.len());
            for field in &decl.fields {
                // Identity is enough here; by-value layout waits below, after cycles are ruled out.
                let ty = self.resolve_type(&field.ty, field.name.span, true)?;
                if ty == TypeIndex::RIEN {
                    return Err(errors::type_mismatch(
                        format!("field `{}` cannot have type `rien`", field.name.text),
                        field.name.span,
                    )
                    .into());
                }
                fields.push((field.name.text.clone(), ty));
            }
            self.registry.set_fields(id, fields).map_err(|e| {
                let field_span = |field: &str| {
                    decl.fields
                        .iter()
                        .filter(|f| f.name.text == field)
                        .map(|f| f.name.span)
                        .last()
                        .unwrap_or(decl.name.span)
                };
                match e {
                    TypeError::StructureCycle { structure, field } => {
                        errors::structure_cycle(&structure, &field, field_span(&field))
                    }
                    TypeError::DuplicateField { field, .. } => {
                        let first = decl
                            .fields
                            .iter()
                            .find(|f| f.name.text == field)
                            .map(|f| f.name.span)
                            .unwrap_or(decl.name.span);
                        errors::redefinition("field", &field, field_span(&field), first)
                    }
                    other => errors::type_mismatch(other.to_string(), decl.name.span),
                }
            })?;
        }

        let compound = self
            .registry
            .compound(id)
            .map_err(|e| errors::type_mismatch(e.to_string(), decl.name.span))?;
        for field in &compound.fields {
            for dependency in self.registry.by_value_compounds(field.ty) {
                if dependency == id {
                    continue;
                }
                if let Some((module, owner)) = self.modules.compound_owner(dependency) {
                    self.require(WaitReason::Compound { module, name: owner })?;
                }
            }
        }
        let layout = self
            .registry
            .finalize(id)
            .map_err(|e| errors::type_mismatch(e.to_string(), decl.name.span))?;
        self.modules.publish_compound(self.module, name);
        tracing::debug!(structure = %name, size = layout.size, "published struct");
        Ok(())
    }

    fn enum_declaration(&mut self, decl: &EnumDecl, id: CompoundId) -> Validation<()> {
        let name = &decl.name.text;
        let span = decl.name.span;
        if self.compound_state(id, span)? == CompoundState::Declared {
            let backing = match &decl.backing {
                Some(expr) => self.resolve_type(expr, span, false)?,
                None => TypeIndex::Z32,
            };
            if !self.registry.is_integer(backing) {
                return Err(errors::type_mismatch(
                    format!("enum `{name}` must be backed by an integer type, found `{}`", self.display(backing)),
                    span,
                )
                .into());
            }
            let mut variants: Vec<(String, i64)> = Vec::with_capacity(decl.variants.len());
            let mut next = 0i64;
            for variant in &decl.variants {
                if let Some(position) = variants.iter().position(|(n, _)| *n == variant.name.text) {
                    return Err(errors::redefinition(
                        "variant",
                        &variant.name.text,
                        variant.name.span,
                        decl.variants[position].name.span,
                    )
                    .into());
                }
                let value = variant.value.unwrap_or(next);
                variants.push((variant.name.text.clone(), value));
                next = value.wrapping_add(1);
            }
            self.registry
                .set_enum(id, backing, variants)
                .map_err(|e| errors::type_mismatch(e.to_string(), span))?;
        }
        self.registry
            .finalize(id)
            .map_err(|e| errors::type_mismatch(e.to_string(), span))?;
        self.modules.publish_compound(self.module, name);
        tracing::debug!(enumeration = %name, "published enum");
        Ok(())
    }

    fn compound_state(&self, id: CompoundId, span: Span) -> Validation<CompoundState> {
        self.registry
            .compound(id)
            .map(|c| c.state)
            .map_err(|e| errors::type_mismatch(e.to_string(), span).into())
    }

    // ------------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------------

    fn global_declaration(&mut self, node: &mut Node, id: GlobalId) -> Validation<()> {
        let span = node.span();
        let (target, value) = match node.kind {
            NodeKind::Assignment => match node.children.as_mut_slice() {
                [target, value] => (target, Some(value)),
                _ => return Err(errors::type_mismatch("malformed global declaration", span).into()),
            },
            _ => (node, None),
        };
        let name = target.name().to_string();
        let declared = match target.type_expr.clone() {
            Some(expr) => Some(self.resolve_type(&expr, target.span(), false)?),
            None => None,
        };

        let ty = match (declared, value) {
            (declared, Some(value)) => {
                self.expr(value)?;
                if value.ty == TypeIndex::RIEN {
                    return Err(errors::type_mismatch("this expression produces no value", value.span()).into());
                }
                let ty = match declared {
                    Some(ty) => ty,
                    None if value.ty == TypeIndex::NULL => {
                        return Err(errors::type_mismatch(
                            format!("cannot infer the type of `{name}` from `nul`"),
                            target.span(),
                        )
                        .into());
                    }
                    None => value.ty,
                };
                if !self.coerce(value, ty).is_compatible() {
                    return Err(errors::assignment_type_mismatch(
                        &self.display(ty),
                        &self.display(value.ty),
                        value.span(),
                    )
                    .into());
                }
                ty
            }
            (Some(ty), None) => ty,
            (None, None) => {
                return Err(errors::type_mismatch(
                    format!("the declaration of `{name}` needs a type or a value"),
                    target.span(),
                )
                .into());
            }
        };
        if ty == TypeIndex::RIEN || ty == TypeIndex::NULL {
            return Err(errors::type_mismatch(
                format!("cannot declare `{name}` with type `{}`", self.display(ty)),
                target.span(),
            )
            .into());
        }
        target.ty = ty;
        target.lowering = Lowering::Access(Access::Global(id));
        let linkage = mangle::global_name(&self.module_name(), &name);
        self.modules.publish_global(id, ty, linkage);
        tracing::debug!(global = %name, "published global");
        Ok(())
    }
}

/// Span and by-reference flag of each declared parameter.
fn decl_params_view(params: &[ParamDecl]) -> Vec<(Span, bool)> {
    params
        .iter()
        .map(|p| (p.name.span, matches!(p.ty, TypeExpr::Reference(_))))
        .collect()
}
