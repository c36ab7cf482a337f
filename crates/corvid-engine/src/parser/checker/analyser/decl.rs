//! Declaration analysis: structures, functions, constructors and fields.

use std::sync::Arc;

use super::{Analyser, BodyContext};
use crate::parser::ast::{Expr, FieldDecl, FunctionDecl, InitDecl, Param, Stmt, StructureDecl, Visibility};
use crate::parser::checker::error::CheckError;
use crate::parser::checker::resolve::TypeContext;
use crate::parser::checker::semantic::*;
use crate::parser::checker::symbols::SymbolId;
use crate::parser::token::Span;
use crate::parser::types::{DataType, Equivalence};

impl<'a> Analyser<'a> {
    // ------------------------------------------------------------------------
    // Structures
    // ------------------------------------------------------------------------

    pub(super) fn analyse_structure(
        &mut self,
        symbol: SymbolId,
        decl: &StructureDecl,
    ) -> Option<Arc<SemStructure>> {
        let table = self.table;
        let structure = table.structure(symbol)?;
        let previous = self.structure.replace(symbol);
        let id = self.next_id();

        if let Some(header) = table.structure_header(symbol) {
            self.report_all(&header.errors);
        }
        if table.has_inheritance_cycle(symbol) {
            self.report(CheckError::InheritanceCycle {
                name: decl.name.name.clone(),
                span: decl.name.span,
            });
        }

        let mut fields = Vec::new();
        for field in &decl.fields {
            if structure.is_protocol() {
                self.report(CheckError::UnexpectedType {
                    actual: field.name.name.clone(),
                    reason: "protocols cannot declare fields".to_string(),
                    span: field.span,
                });
                continue;
            }
            let Some(field_id) = self.member_symbol(symbol, &field.name.name, field.name.span) else {
                continue;
            };
            if let Some(analysed) = self.analyse_field(symbol, field_id, field) {
                fields.push(analysed);
            }
        }

        let mut functions = Vec::new();
        for function in &decl.functions {
            let Some(function_id) =
                self.member_symbol(symbol, &function.name.name, function.name.span)
            else {
                continue;
            };
            if structure.is_protocol() {
                self.check_protocol_function(function_id, function);
            }
            if let Some(analysed) = self.analyse_function(function_id, function) {
                functions.push(analysed);
            }
        }

        let init = match (&decl.init, structure.init) {
            (Some(init_decl), Some(init_id)) => self.analyse_init(symbol, init_id, init_decl),
            _ => {
                if structure.is_class() {
                    self.check_implicit_base_call(symbol, decl.name.span);
                }
                None
            }
        };

        if structure.is_class() {
            self.check_protocol_implementations(symbol, decl);
        }

        self.structure = previous;
        Some(Arc::new(SemStructure {
            id,
            symbol,
            fields,
            functions,
            init,
            span: decl.span,
        }))
    }

    /// Protocol functions are virtual requirements without bodies.
    fn check_protocol_function(&mut self, function_id: SymbolId, decl: &FunctionDecl) {
        let table = self.table;
        let Some(function) = table.function(function_id) else {
            return;
        };
        function.mark_virtual();
        if decl.body.is_some() {
            self.report(CheckError::UnexpectedType {
                actual: decl.name.name.clone(),
                reason: "protocol functions cannot have a body".to_string(),
                span: decl.name.span,
            });
        }
        if function.is_generic() {
            self.report(CheckError::GenericVirtualFunction {
                name: decl.name.name.clone(),
                span: decl.name.span,
            });
        }
    }

    fn check_protocol_implementations(&mut self, class: SymbolId, decl: &StructureDecl) {
        let table = self.table;
        let Some(header) = table.structure_header(class) else {
            return;
        };
        let self_type = table.self_type(class);
        for protocol in &header.protocols {
            let Some((protocol_id, _)) = protocol.as_structure() else {
                continue;
            };
            let Some(required) = table.structure(protocol_id) else {
                continue;
            };
            for function in &required.functions {
                let name = &table.symbol(*function).name;
                if table.find_implementation(&self_type, name).is_none() {
                    self.report(CheckError::MissingImplementation {
                        class: decl.name.name.clone(),
                        protocol: table.symbol(protocol_id).name.clone(),
                        function: name.clone(),
                        span: decl.name.span,
                    });
                }
            }
        }
    }

    /// A class without a constructor still needs a base call when the
    /// ancestor's constructor takes parameters.
    fn check_implicit_base_call(&mut self, class: SymbolId, span: Span) {
        let table = self.table;
        let Some(ancestor) = table.ancestor_of(&table.self_type(class)) else {
            return;
        };
        if ancestor_init_arity(self, &ancestor) > 0 {
            self.report(CheckError::MissingBaseCall { span });
        }
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    pub(super) fn analyse_function(
        &mut self,
        symbol: SymbolId,
        decl: &FunctionDecl,
    ) -> Option<Arc<SemFunction>> {
        let table = self.table;
        let function = table.function(symbol)?;
        let signature = table.signature(symbol)?;
        self.report_all(&signature.errors);

        if function.is_override {
            self.check_override(symbol, decl);
        }

        let id = self.next_id();
        let body_id = self.next_id();
        let context = BodyContext::new(
            TypeContext::for_function(table, symbol),
            function.is_static,
            signature.return_type.clone(),
        );
        let errors_before = self.diagnostics.error_count();

        let ((params, block), locals) = self.with_body(context, |this| {
            let params = this.declare_params(&decl.params, &signature.params);
            let block = decl.body.as_ref().map(|body| this.analyse_block(body));
            (params, block)
        });

        if let Some(block) = &block {
            self.check_returns(&decl.name.name, &signature.return_type, block, errors_before);
        }

        Some(Arc::new(SemFunction {
            id,
            symbol,
            body: SemBody {
                id: body_id,
                params,
                locals,
                block,
            },
            base_call: None,
            return_type: signature.return_type.clone(),
            span: decl.span,
        }))
    }

    fn declare_params(&mut self, params: &[Param], types: &[DataType]) -> Vec<LocalId> {
        params
            .iter()
            .zip(types)
            .filter_map(|(param, ty)| {
                self.declare_local(LocalInfo {
                    name: param.name.name.clone(),
                    ty: ty.clone(),
                    is_mutable: false,
                    is_param: true,
                    span: param.name.span,
                })
                .ok()
            })
            .collect()
    }

    /// A body that already produced errors is not checked, since dropped
    /// statements may have held its returns.
    fn check_returns(
        &mut self,
        name: &str,
        return_type: &DataType,
        block: &SemBlock,
        errors_before: usize,
    ) {
        if return_type.is_void()
            || return_type.is_unknown()
            || self.diagnostics.error_count() > errors_before
        {
            return;
        }
        if !super::stmt::always_returns(&block.statements) {
            self.report(CheckError::MissingReturn {
                name: name.to_string(),
                ty: self.display(return_type),
                span: block.span,
            });
        }
    }

    /// Validate an `override` and link it to the ancestor function, which
    /// becomes virtual.
    fn check_override(&mut self, symbol: SymbolId, decl: &FunctionDecl) {
        let table = self.table;
        let Some(function) = table.function(symbol) else {
            return;
        };
        let name = &decl.name.name;
        let span = decl.name.span;

        if function.is_static {
            self.report(CheckError::StaticMismatch {
                name: name.clone(),
                reason: "is static and cannot override".to_string(),
                span,
            });
            return;
        }

        let overridden = self
            .structure
            .and_then(|owner| table.ancestor_of(&table.self_type(owner)))
            .and_then(|ancestor| {
                table.ancestry(&ancestor).into_iter().find_map(|ty| {
                    let (owner, _) = ty.as_structure()?;
                    let found = table.structure(owner)?.scope.find_symbol(name)?;
                    let f = table.function(found)?;
                    (!f.is_static && !f.is_constructor).then_some((found, ty))
                })
            });

        let Some((base, base_owner)) = overridden else {
            self.report(CheckError::NothingToOverride {
                name: name.clone(),
                span,
            });
            return;
        };
        let Some(base_function) = table.function(base) else {
            return;
        };

        base_function.mark_virtual();
        let _ = function.overrides.set(base);

        if function.is_generic() || base_function.is_generic() {
            self.report(CheckError::GenericVirtualFunction {
                name: name.clone(),
                span,
            });
        }

        let (Some(own), Some(inherited)) = (table.signature(symbol), table.signature(base)) else {
            return;
        };
        let bindings = table.bindings_for(&base_owner);
        let expected_params: Vec<DataType> =
            inherited.params.iter().map(|p| p.substitute(&bindings)).collect();
        let expected_return = inherited.return_type.substitute(&bindings);

        let same = |a: &DataType, b: &DataType| a.is_equivalent(b) == Equivalence::Equal;
        let matches = expected_params.len() == own.params.len()
            && expected_params.iter().zip(&own.params).all(|(e, a)| same(a, e))
            && same(&own.return_type, &expected_return);

        if !matches {
            self.report(CheckError::IncompatibleType {
                expected: self.signature_text(&expected_params, &expected_return),
                actual: self.signature_text(&own.params, &own.return_type),
                span,
            });
        }
    }

    fn signature_text(&self, params: &[DataType], ret: &DataType) -> String {
        let params: Vec<String> = params.iter().map(|p| self.display(p)).collect();
        format!("fn({}) {}", params.join(", "), self.display(ret))
    }

    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    fn analyse_init(
        &mut self,
        owner: SymbolId,
        symbol: SymbolId,
        decl: &InitDecl,
    ) -> Option<Arc<SemFunction>> {
        let table = self.table;
        let signature = table.signature(symbol)?;
        self.report_all(&signature.errors);

        let id = self.next_id();
        let body_id = self.next_id();
        let block_id = self.next_id();
        let self_type = table.self_type(owner);
        let ancestor = table.ancestor_of(&self_type);

        let mut context = BodyContext::new(
            TypeContext::for_function(table, symbol),
            false,
            DataType::VOID,
        );
        context.is_constructor = true;

        let ((params, base_call, statements), locals) = self.with_body(context, |this| {
            let params = this.declare_params(&decl.params, &signature.params);

            let mut statements = Vec::new();
            for (param, local) in decl.params.iter().zip(&params) {
                if param.ty.is_none() {
                    if let Some(stmt) = this.field_initializer(&self_type, param, *local) {
                        statements.push(stmt);
                    }
                }
            }

            let (base_stmt, rest) = match decl.body.statements.split_first() {
                Some((Stmt::Expr(first), rest)) if first.is_base_call() => (Some(first), rest),
                _ => (None, decl.body.statements.as_slice()),
            };

            let base_call = base_stmt.and_then(|stmt| this.analyse_base_call(ancestor.as_ref(), stmt));

            this.push_scope();
            statements.extend(this.analyse_statements(rest));
            this.pop_scope();
            (params, base_call, statements)
        });

        if base_call.is_none() {
            if let Some(ancestor) = &ancestor {
                if ancestor_init_arity(self, ancestor) > 0 {
                    self.report(CheckError::MissingBaseCall { span: decl.span });
                }
            }
        }

        Some(Arc::new(SemFunction {
            id,
            symbol,
            body: SemBody {
                id: body_id,
                params,
                locals,
                block: Some(SemBlock {
                    id: block_id,
                    statements,
                    span: decl.body.span,
                }),
            },
            base_call,
            return_type: DataType::VOID,
            span: decl.span,
        }))
    }

    /// `self.p = p` for a typeless constructor parameter.
    fn field_initializer(&mut self, self_type: &DataType, param: &Param, local: LocalId) -> Option<SemStmt> {
        let table = self.table;
        let member = table
            .find_member(self_type, &param.name.name)
            .filter(|m| table.field(m.symbol).is_some())?;
        let ty = table.member_field_type(&member);
        let span = param.span;

        let instance = SemExpr {
            id: self.next_id(),
            ty: self_type.clone(),
            kind: SemExprKind::SelfValue,
            span,
        };
        let target = SemExpr {
            id: self.next_id(),
            ty: ty.clone(),
            kind: SemExprKind::Field {
                instance: Some(Box::new(instance)),
                owner: member.owner,
                field: member.symbol,
            },
            span,
        };
        let value = SemExpr {
            id: self.next_id(),
            ty: ty.clone(),
            kind: SemExprKind::Local(local),
            span,
        };
        Some(SemStmt::Expr(SemExpr {
            id: self.next_id(),
            ty,
            kind: SemExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        }))
    }

    fn analyse_base_call(&mut self, ancestor: Option<&DataType>, stmt: &Expr) -> Option<SemBaseCall> {
        let Expr::Call { args, span, .. } = stmt else {
            return None;
        };
        let Some(ancestor) = ancestor else {
            self.report(CheckError::MisplacedBase { span: *span });
            return None;
        };
        let table = self.table;
        let (ancestor_id, _) = ancestor.as_structure()?;
        let constructor = table.structure(ancestor_id)?.init;

        let expected: Vec<DataType> = match constructor.and_then(|c| table.signature(c)) {
            Some(sig) => {
                let bindings = table.bindings_for(ancestor);
                sig.params.iter().map(|p| p.substitute(&bindings)).collect()
            }
            None => Vec::new(),
        };

        let args = self.analyse_arguments(args, &expected, *span).ok()?;
        Some(SemBaseCall {
            id: self.next_id(),
            ancestor: ancestor.clone(),
            constructor,
            args,
            span: *span,
        })
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    fn analyse_field(
        &mut self,
        owner: SymbolId,
        symbol: SymbolId,
        decl: &FieldDecl,
    ) -> Option<Arc<SemField>> {
        let table = self.table;
        let field = table.field(symbol)?;
        let field_type = table.field_type(symbol)?;
        self.report_all(&field_type.errors);
        let ty = field_type.ty.clone();
        let name = &decl.name.name;
        let span = decl.name.span;

        if decl.setter.is_some() && decl.getter.is_none() {
            self.report(CheckError::SetterWithoutGetter {
                name: name.clone(),
                span,
            });
        }
        if decl.setter.is_some() && !decl.is_mutable {
            self.report(CheckError::SetterOnImmutableField {
                name: name.clone(),
                span,
            });
        }
        if decl.visibility == Visibility::Public
            && field.is_static
            && field.is_mutable
            && !field.is_computed()
        {
            self.report(CheckError::MutablePublicStaticField {
                name: name.clone(),
                span,
            });
        }

        let id = self.next_id();
        let types = TypeContext::for_structure(table, owner);

        let initializer = decl.initializer.as_ref().and_then(|expr| {
            let context = BodyContext::new(types.clone(), true, DataType::VOID);
            let (value, _) = self.with_body(context, |this| {
                let value = this.analyse_expr(expr)?;
                this.coerce(value, &ty)
            });
            value.ok()
        });

        let getter = decl.getter.as_ref().map(|block| {
            let body_id = self.next_id();
            let context = BodyContext::new(types.clone(), field.is_static, ty.clone());
            let errors_before = self.diagnostics.error_count();
            let (block, locals) = self.with_body(context, |this| this.analyse_block(block));
            self.check_returns(name, &ty, &block, errors_before);
            SemBody {
                id: body_id,
                params: Vec::new(),
                locals,
                block: Some(block),
            }
        });

        let setter = decl.setter.as_ref().map(|setter| {
            let body_id = self.next_id();
            let context = BodyContext::new(types.clone(), field.is_static, DataType::VOID);
            let ((params, block), locals) = self.with_body(context, |this| {
                let params = this
                    .declare_local(LocalInfo {
                        name: setter.param.name.clone(),
                        ty: ty.clone(),
                        is_mutable: false,
                        is_param: true,
                        span: setter.param.span,
                    })
                    .into_iter()
                    .collect::<Vec<_>>();
                (params, this.analyse_block(&setter.body))
            });
            SemBody {
                id: body_id,
                params,
                locals,
                block: Some(block),
            }
        });

        Some(Arc::new(SemField {
            id,
            symbol,
            ty,
            initializer,
            getter,
            setter,
            span: decl.span,
        }))
    }
}

/// Number of parameters of the ancestor's constructor; zero without one.
fn ancestor_init_arity(analyser: &Analyser<'_>, ancestor: &DataType) -> usize {
    let table = analyser.table;
    ancestor
        .as_structure()
        .and_then(|(id, _)| table.structure(id))
        .and_then(|s| s.init)
        .and_then(|init| table.function(init))
        .map_or(0, |f| f.params.len())
}
