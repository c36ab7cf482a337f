//! Expression analysis: name resolution, calls, operators and casts.

use super::{Analyser, Check, Recovery};
use crate::parser::ast::{BinaryOp, Expr, Ident, Literal, TypeExpr, UnaryOp};
use crate::parser::checker::error::CheckError;
use crate::parser::checker::resolve::MemberLookup;
use crate::parser::checker::semantic::*;
use crate::parser::checker::symbols::{SymbolId, SymbolKind};
use crate::parser::token::Span;
use crate::parser::types::{
    Bindings, DataType, Equivalence, PrimitiveKind, FLOAT_LITERAL, INT_LITERAL,
};

/// What a name or dotted path refers to.
#[derive(Debug)]
pub(crate) enum Resolved {
    /// A namespace or a leading part of one
    Namespace(String),
    Type(DataType),
    Value(SemExpr),
}

impl<'a> Analyser<'a> {
    /// Analyse an expression used as a value.
    pub(crate) fn analyse_expr(&mut self, expr: &Expr) -> Check<SemExpr> {
        let value = self.analyse_operand(expr)?;
        if let SemExprKind::Function { .. } = value.kind {
            return self.fail(CheckError::UnexpectedType {
                actual: self.display(&value.ty),
                reason: "a function must be called".to_string(),
                span: value.span,
            });
        }
        Ok(value)
    }

    /// Like [`Analyser::analyse_expr`], but function references are allowed.
    fn analyse_operand(&mut self, expr: &Expr) -> Check<SemExpr> {
        match expr {
            Expr::Literal { value, span } => Ok(self.literal(value.clone(), *span)),
            Expr::Identifier(_) | Expr::Member { .. } => match self.analyse_path(expr)? {
                Resolved::Value(value) => Ok(value),
                Resolved::Namespace(name) => self.fail(CheckError::UnexpectedType {
                    actual: name,
                    reason: "a namespace is not a value".to_string(),
                    span: expr.span(),
                }),
                Resolved::Type(ty) => self.fail(CheckError::UnexpectedType {
                    actual: self.display(&ty),
                    reason: "a type is not a value".to_string(),
                    span: expr.span(),
                }),
            },
            Expr::Unary { op, operand, span } => self.analyse_unary(*op, operand, *span),
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => self.analyse_binary(*op, left, right, *span),
            Expr::Assign {
                target,
                value,
                span,
            } => self.analyse_assign(target, value, *span),
            Expr::Call {
                callee,
                type_args,
                args,
                span,
            } => self.analyse_call(callee, type_args, args, *span),
            Expr::New { ty, args, span } => self.analyse_new(ty, args, *span),
            Expr::SelfValue(span) => self.self_value(*span),
            Expr::Base(span) => self.fail(CheckError::MisplacedBase { span: *span }),
            Expr::SizeOf { ty, span } => {
                let ty = self.resolve_type(ty)?;
                Ok(self.node(
                    DataType::Primitive(PrimitiveKind::U64),
                    SemExprKind::SizeOf(ty),
                    *span,
                ))
            }
            Expr::Cast { expr, ty, span } => self.analyse_cast(expr, ty, *span),
        }
    }

    pub(crate) fn node(&mut self, ty: DataType, kind: SemExprKind, span: Span) -> SemExpr {
        SemExpr {
            id: self.next_id(),
            ty,
            kind,
            span,
        }
    }

    fn literal(&mut self, value: Literal, span: Span) -> SemExpr {
        let ty = match value {
            Literal::Int(_) => DataType::Primitive(INT_LITERAL),
            Literal::Float(_) => DataType::Primitive(FLOAT_LITERAL),
            Literal::Bool(_) => DataType::BOOL,
        };
        self.node(ty, SemExprKind::Literal(value), span)
    }

    fn self_value(&mut self, span: Span) -> Check<SemExpr> {
        match self.self_type() {
            Some(ty) => Ok(self.node(ty, SemExprKind::SelfValue, span)),
            None => self.fail(CheckError::MisplacedSelf { span }),
        }
    }

    // ------------------------------------------------------------------------
    // Names and members
    // ------------------------------------------------------------------------

    /// Resolve an identifier or dotted member chain.
    pub(crate) fn analyse_path(&mut self, expr: &Expr) -> Check<Resolved> {
        match expr {
            Expr::Identifier(ident) => self.resolve_name(ident),
            Expr::Member {
                object,
                member,
                span,
            } => {
                if let Expr::Base(base_span) = **object {
                    return self.base_member(member, base_span, *span).map(Resolved::Value);
                }
                match self.analyse_path(object)? {
                    Resolved::Namespace(namespace) => self.namespace_member(&namespace, member),
                    Resolved::Type(ty) => self.static_member(&ty, member, *span).map(Resolved::Value),
                    Resolved::Value(value) => {
                        self.instance_member(value, member, *span).map(Resolved::Value)
                    }
                }
            }
            other => self.analyse_operand(other).map(Resolved::Value),
        }
    }

    fn resolve_name(&mut self, ident: &Ident) -> Check<Resolved> {
        let name = ident.name.as_str();
        let span = ident.span;

        if let Some((local, info)) = self.find_local(name) {
            let ty = info.ty.clone();
            return Ok(Resolved::Value(self.node(ty, SemExprKind::Local(local), span)));
        }

        let table = self.table;
        if let Some(structure) = self.structure {
            let owner = table.self_type(structure);
            if let Some(member) = table.find_member(&owner, name) {
                if is_static_member(self, member.symbol) {
                    return self.member_value(None, member, span).map(Resolved::Value);
                }
                return match self.self_type() {
                    Some(self_type) => {
                        let instance = self.node(self_type, SemExprKind::SelfValue, span);
                        self.member_value(Some(instance), member, span)
                            .map(Resolved::Value)
                    }
                    None => self.fail(CheckError::StaticMismatch {
                        name: name.to_string(),
                        reason: "is an instance member and cannot be used in a static context"
                            .to_string(),
                        span,
                    }),
                };
            }
        }

        if let Some(symbol) = table.find_in_file(self.file, name) {
            return self.symbol_reference(symbol, span);
        }
        if table.is_namespace_prefix(name) {
            return Ok(Resolved::Namespace(name.to_string()));
        }
        self.fail(CheckError::NotFound {
            name: name.to_string(),
            span,
        })
    }

    fn namespace_member(&mut self, namespace: &str, member: &Ident) -> Check<Resolved> {
        let table = self.table;
        let path = format!("{}.{}", namespace, member.name);
        let segments: Vec<&str> = path.split('.').collect();
        if let Some(symbol) = table.find_path(&segments) {
            return self.symbol_reference(symbol, member.span);
        }
        if table.is_namespace_prefix(&path) {
            return Ok(Resolved::Namespace(path));
        }
        self.fail(CheckError::NotFound {
            name: path,
            span: member.span,
        })
    }

    /// A top-level symbol used by name.
    fn symbol_reference(&mut self, symbol: SymbolId, span: Span) -> Check<Resolved> {
        let table = self.table;
        match &table.symbol(symbol).kind {
            SymbolKind::Structure(_) => Ok(Resolved::Type(DataType::structure(symbol))),
            SymbolKind::Enum(_) => Ok(Resolved::Type(DataType::Enum(symbol))),
            SymbolKind::Function(_) => {
                let ty = DataType::Function {
                    symbol,
                    instance: None,
                    type_args: Vec::new(),
                };
                Ok(Resolved::Value(self.node(
                    ty,
                    SemExprKind::Function {
                        instance: None,
                        owner: None,
                        function: symbol,
                        type_args: Vec::new(),
                        non_virtual: false,
                    },
                    span,
                )))
            }
            SymbolKind::Field(_) | SymbolKind::TypeParameter(_) => {
                self.fail(CheckError::UnexpectedType {
                    actual: table.symbol(symbol).name.clone(),
                    reason: "cannot be referenced here".to_string(),
                    span,
                })
            }
        }
    }

    /// `Type.member`: a static member or an enum variant.
    fn static_member(&mut self, ty: &DataType, member: &Ident, span: Span) -> Check<SemExpr> {
        let table = self.table;
        if let DataType::Enum(symbol) = ty {
            let index = table
                .symbol(*symbol)
                .as_enum()
                .and_then(|e| e.variant_index(&member.name));
            return match index {
                Some(index) => Ok(self.node(
                    ty.clone(),
                    SemExprKind::EnumValue {
                        symbol: *symbol,
                        index,
                    },
                    span,
                )),
                None => self.fail(CheckError::NotFound {
                    name: format!("{}.{}", table.symbol(*symbol).name, member.name),
                    span: member.span,
                }),
            };
        }

        let Some(found) = table.find_member(ty, &member.name) else {
            return self.fail(CheckError::NotFound {
                name: member.name.clone(),
                span: member.span,
            });
        };
        if !is_static_member(self, found.symbol) {
            return self.fail(CheckError::StaticMismatch {
                name: member.name.clone(),
                reason: "is an instance member and needs an instance".to_string(),
                span: member.span,
            });
        }
        self.member_value(None, found, span)
    }

    /// `value.member`: an instance field or method.
    fn instance_member(&mut self, value: SemExpr, member: &Ident, span: Span) -> Check<SemExpr> {
        let table = self.table;
        if let SemExprKind::Function { .. } = value.kind {
            return self.fail(CheckError::UnexpectedType {
                actual: self.display(&value.ty),
                reason: "a function has no members".to_string(),
                span: value.span,
            });
        }
        let found = match &value.ty {
            DataType::Unknown => return Err(Recovery),
            DataType::Structure { .. } => table.find_member(&value.ty, &member.name),
            _ => None,
        };
        let Some(found) = found else {
            return self.fail(CheckError::NotFound {
                name: member.name.clone(),
                span: member.span,
            });
        };
        if is_static_member(self, found.symbol) {
            return self.fail(CheckError::StaticMismatch {
                name: member.name.clone(),
                reason: "is static and cannot be used through an instance".to_string(),
                span: member.span,
            });
        }
        self.member_value(Some(value), found, span)
    }

    /// `base.member`: the ancestor's member, called without virtual dispatch.
    fn base_member(&mut self, member: &Ident, base_span: Span, span: Span) -> Check<SemExpr> {
        let table = self.table;
        let ancestor = self
            .self_type()
            .and_then(|self_type| table.ancestor_of(&self_type));
        let (Some(self_type), Some(ancestor)) = (self.self_type(), ancestor) else {
            return self.fail(CheckError::MisplacedBase { span: base_span });
        };
        let Some(found) = table.find_member(&ancestor, &member.name) else {
            return self.fail(CheckError::NotFound {
                name: member.name.clone(),
                span: member.span,
            });
        };
        if is_static_member(self, found.symbol) {
            return self.fail(CheckError::StaticMismatch {
                name: member.name.clone(),
                reason: "is static and cannot be used through 'base'".to_string(),
                span: member.span,
            });
        }

        let receiver = self.node(self_type, SemExprKind::SelfValue, base_span);
        let instance = self.node(
            ancestor,
            SemExprKind::Cast {
                operand: Box::new(receiver),
                implicit: true,
            },
            base_span,
        );
        let mut value = self.member_value(Some(instance), found, span)?;
        if let SemExprKind::Function { non_virtual, .. } = &mut value.kind {
            *non_virtual = true;
        }
        Ok(value)
    }

    fn member_value(
        &mut self,
        instance: Option<SemExpr>,
        member: MemberLookup,
        span: Span,
    ) -> Check<SemExpr> {
        let table = self.table;
        let instance = instance.map(Box::new);
        if table.field(member.symbol).is_some() {
            let ty = table.member_field_type(&member);
            return Ok(self.node(
                ty,
                SemExprKind::Field {
                    instance,
                    owner: member.owner,
                    field: member.symbol,
                },
                span,
            ));
        }
        if table.function(member.symbol).is_some() {
            let ty = DataType::Function {
                symbol: member.symbol,
                instance: instance.as_ref().map(|i| Box::new(i.ty.clone())),
                type_args: Vec::new(),
            };
            return Ok(self.node(
                ty,
                SemExprKind::Function {
                    instance,
                    owner: Some(member.owner),
                    function: member.symbol,
                    type_args: Vec::new(),
                    non_virtual: false,
                },
                span,
            ));
        }
        self.fail(CheckError::UnexpectedType {
            actual: table.symbol(member.symbol).name.clone(),
            reason: "not a field or function".to_string(),
            span,
        })
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    fn analyse_call(
        &mut self,
        callee: &Expr,
        type_args: &[TypeExpr],
        args: &[Expr],
        span: Span,
    ) -> Check<SemExpr> {
        if let Expr::Base(base_span) = callee {
            return self.fail(CheckError::MisplacedBase { span: *base_span });
        }
        let table = self.table;
        let mut callee = self.analyse_operand(callee)?;

        let (function, owner) = match &callee.kind {
            SemExprKind::Function {
                function, owner, ..
            } => (*function, owner.clone()),
            _ => {
                return self.fail(CheckError::UnexpectedType {
                    actual: self.display(&callee.ty),
                    reason: "not callable".to_string(),
                    span: callee.span,
                })
            }
        };
        let Some(symbol) = table.function(function) else {
            return Err(Recovery);
        };
        let Some(signature) = table.signature(function) else {
            return Err(Recovery);
        };
        let name = table.symbol(function).name.clone();

        let mut explicit = Vec::with_capacity(type_args.len());
        for arg in type_args {
            explicit.push(self.resolve_type(arg)?);
        }
        if !type_args.is_empty() && explicit.len() != symbol.type_params.len() {
            return self.fail(CheckError::WrongTypeArgumentCount {
                name,
                expected: symbol.type_params.len(),
                actual: explicit.len(),
                span,
            });
        }
        if args.len() != signature.params.len() {
            return self.fail(CheckError::WrongArgumentCount {
                expected: signature.params.len(),
                actual: args.len(),
                span,
            });
        }

        let mut analysed = Vec::with_capacity(args.len());
        for arg in args {
            analysed.push(self.analyse_expr(arg)?);
        }

        let mut bindings = owner
            .as_ref()
            .map(|o| table.bindings_for(o))
            .unwrap_or_default();

        let function_args = if symbol.is_generic() && explicit.is_empty() {
            let mut inferred = Bindings::default();
            for (param, arg) in signature.params.iter().zip(&analysed) {
                unify(
                    &param.substitute(&bindings),
                    &arg.ty,
                    &symbol.type_params,
                    &mut inferred,
                );
            }
            let mut resolved = Vec::with_capacity(symbol.type_params.len());
            for param in &symbol.type_params {
                match inferred.get(param) {
                    Some(ty) => resolved.push(ty.clone()),
                    None => {
                        return self.fail(CheckError::CannotInferTypeArguments { name, span });
                    }
                }
            }
            resolved
        } else {
            explicit
        };
        bindings.extend(table.function_bindings(function, &function_args));

        let mut coerced = Vec::with_capacity(analysed.len());
        for (arg, param) in analysed.into_iter().zip(&signature.params) {
            coerced.push(self.coerce(arg, &param.substitute(&bindings))?);
        }
        let return_type = signature.return_type.substitute(&bindings);

        if let SemExprKind::Function { type_args, .. } = &mut callee.kind {
            *type_args = function_args.clone();
        }
        if let DataType::Function { type_args, .. } = &mut callee.ty {
            *type_args = function_args;
        }

        Ok(self.node(
            return_type,
            SemExprKind::Call {
                callee: Box::new(callee),
                args: coerced,
            },
            span,
        ))
    }

    /// Analyse `args` and coerce them to `expected`.
    pub(crate) fn analyse_arguments(
        &mut self,
        args: &[Expr],
        expected: &[DataType],
        span: Span,
    ) -> Check<Vec<SemExpr>> {
        if args.len() != expected.len() {
            return self.fail(CheckError::WrongArgumentCount {
                expected: expected.len(),
                actual: args.len(),
                span,
            });
        }
        let mut analysed = Vec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(expected) {
            let value = self.analyse_expr(arg)?;
            analysed.push(self.coerce(value, ty)?);
        }
        Ok(analysed)
    }

    fn analyse_new(&mut self, ty: &TypeExpr, args: &[Expr], span: Span) -> Check<SemExpr> {
        let table = self.table;
        let ty = self.resolve_type(ty)?;
        let class = ty
            .as_structure()
            .and_then(|(id, _)| table.structure(id).map(|s| (id, s)))
            .filter(|(_, s)| s.is_class());
        let Some((_, class)) = class else {
            return self.fail(CheckError::UnexpectedType {
                actual: self.display(&ty),
                reason: "only classes can be instantiated".to_string(),
                span,
            });
        };

        let expected: Vec<DataType> = match class.init.and_then(|init| table.signature(init)) {
            Some(signature) => {
                let bindings = table.bindings_for(&ty);
                signature.params.iter().map(|p| p.substitute(&bindings)).collect()
            }
            None => Vec::new(),
        };
        let args = self.analyse_arguments(args, &expected, span)?;

        Ok(self.node(
            ty,
            SemExprKind::New {
                constructor: class.init,
                args,
            },
            span,
        ))
    }

    // ------------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------------

    fn analyse_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> Check<SemExpr> {
        let operand = self.analyse_expr(operand)?;
        let ok = match op {
            UnaryOp::Negate => is_numeric_like(&operand.ty),
            UnaryOp::Not => operand.ty.is_bool() || operand.ty.is_unknown(),
        };
        if !ok {
            let reason = match op {
                UnaryOp::Negate => "expected a numeric operand",
                UnaryOp::Not => "expected a boolean operand",
            };
            return self.fail(CheckError::UnexpectedType {
                actual: self.display(&operand.ty),
                reason: reason.to_string(),
                span: operand.span,
            });
        }
        let ty = operand.ty.clone();
        Ok(self.node(
            ty,
            SemExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn analyse_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Check<SemExpr> {
        let left = self.analyse_expr(left)?;
        let right = self.analyse_expr(right)?;

        if op.is_logical() {
            for operand in [&left, &right] {
                if !operand.ty.is_bool() && !operand.ty.is_unknown() {
                    return self.fail(CheckError::UnexpectedType {
                        actual: self.display(&operand.ty),
                        reason: format!("'{}' expects boolean operands", op.symbol()),
                        span: operand.span,
                    });
                }
            }
            return Ok(self.binary(op, left, right, DataType::BOOL, span));
        }

        if op.is_arithmetic() || op.is_comparison() {
            for operand in [&left, &right] {
                if !is_numeric_like(&operand.ty) {
                    return self.fail(CheckError::UnexpectedType {
                        actual: self.display(&operand.ty),
                        reason: format!("'{}' expects numeric operands", op.symbol()),
                        span: operand.span,
                    });
                }
            }
        }

        // the left operand decides the type unless it is the only literal
        let (left, right) = if is_literal(&left) && !is_literal(&right) {
            let ty = right.ty.clone();
            (self.coerce(left, &ty)?, right)
        } else {
            let ty = left.ty.clone();
            let right = self.coerce(right, &ty)?;
            (left, right)
        };

        if op.is_equality() && self.is_structure_value(&left.ty) {
            let table = self.table;
            let has_is_equal = table
                .find_member(&left.ty, "IsEqual")
                .and_then(|m| table.function(m.symbol))
                .is_some_and(|f| !f.is_static && f.params.len() == 1);
            if !has_is_equal {
                return self.fail(CheckError::MissingIsEqual {
                    ty: self.display(&left.ty),
                    op: op.symbol().to_string(),
                    span,
                });
            }
        }

        let ty = if op.is_arithmetic() {
            left.ty.clone()
        } else {
            DataType::BOOL
        };
        Ok(self.binary(op, left, right, ty, span))
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: SemExpr,
        right: SemExpr,
        ty: DataType,
        span: Span,
    ) -> SemExpr {
        self.node(
            ty,
            SemExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    fn is_structure_value(&self, ty: &DataType) -> bool {
        let table = self.table;
        ty.as_structure()
            .and_then(|(id, _)| table.structure(id))
            .is_some_and(|s| !s.is_module())
    }

    fn analyse_assign(&mut self, target: &Expr, value: &Expr, span: Span) -> Check<SemExpr> {
        let table = self.table;
        let target = self.analyse_expr(target)?;

        match &target.kind {
            SemExprKind::Local(local) => {
                let info = self
                    .body
                    .as_ref()
                    .map(|b| b.locals[local.0 as usize].clone());
                if let Some(info) = info.filter(|i| !i.is_mutable) {
                    return self.fail(CheckError::ImmutableAssignment {
                        name: info.name,
                        span: target.span,
                    });
                }
            }
            SemExprKind::Field {
                instance, field, ..
            } => {
                let Some(symbol) = table.field(*field) else {
                    return Err(Recovery);
                };
                let assignable = if symbol.is_computed() {
                    symbol.has_setter
                } else {
                    symbol.is_mutable
                        || (self.in_constructor()
                            && instance
                                .as_deref()
                                .is_some_and(|i| matches!(i.kind, SemExprKind::SelfValue)))
                };
                if !assignable {
                    return self.fail(CheckError::ImmutableAssignment {
                        name: table.symbol(*field).name.clone(),
                        span: target.span,
                    });
                }
            }
            _ => {
                return self.fail(CheckError::UnexpectedType {
                    actual: self.display(&target.ty),
                    reason: "cannot be assigned to".to_string(),
                    span: target.span,
                })
            }
        }

        let value = self.analyse_expr(value)?;
        let value = self.coerce(value, &target.ty)?;
        let ty = target.ty.clone();
        Ok(self.node(
            ty,
            SemExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    // ------------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------------

    /// Convert `expr` to `expected`, inserting an implicit cast when needed.
    pub(crate) fn coerce(&mut self, expr: SemExpr, expected: &DataType) -> Check<SemExpr> {
        let literal = is_literal(&expr);
        let equivalence = if literal {
            expr.ty.is_equivalent_literal(expected)
        } else {
            expr.ty.is_equivalent(expected)
        };
        match equivalence {
            Equivalence::Equal => Ok(expr),
            Equivalence::ImplicitCast if literal => Ok(retype_literal(expr, expected)),
            Equivalence::ImplicitCast => Ok(self.implicit_cast(expr, expected)),
            Equivalence::Incompatible if self.is_upcast(&expr.ty, expected) => {
                Ok(self.implicit_cast(expr, expected))
            }
            Equivalence::Incompatible => self.fail(CheckError::IncompatibleType {
                expected: self.display(expected),
                actual: self.display(&expr.ty),
                span: expr.span,
            }),
        }
    }

    fn implicit_cast(&mut self, expr: SemExpr, ty: &DataType) -> SemExpr {
        let span = expr.span;
        self.node(
            ty.clone(),
            SemExprKind::Cast {
                operand: Box::new(expr),
                implicit: true,
            },
            span,
        )
    }

    /// A class value used as one of its ancestor classes.
    fn is_upcast(&self, from: &DataType, to: &DataType) -> bool {
        let table = self.table;
        let is_class = |ty: &DataType| {
            ty.as_structure()
                .and_then(|(id, _)| table.structure(id))
                .is_some_and(|s| s.is_class())
        };
        is_class(from) && is_class(to) && table.is_subclass_of(from, to)
    }

    fn analyse_cast(&mut self, expr: &Expr, ty: &TypeExpr, span: Span) -> Check<SemExpr> {
        let operand = self.analyse_expr(expr)?;
        let target = self.resolve_type(ty)?;

        if operand.ty == target {
            self.report(CheckError::RedundantCast {
                ty: self.display(&target),
                span,
            });
            return Ok(operand);
        }
        if !self.is_valid_cast(&operand.ty, &target) {
            return self.fail(CheckError::InvalidCast {
                from: self.display(&operand.ty),
                to: self.display(&target),
                span,
            });
        }
        Ok(self.node(
            target,
            SemExprKind::Cast {
                operand: Box::new(operand),
                implicit: false,
            },
            span,
        ))
    }

    fn is_valid_cast(&self, from: &DataType, to: &DataType) -> bool {
        use crate::parser::checker::symbols::StructureKind;

        let table = self.table;
        let kind = |ty: &DataType| {
            ty.as_structure()
                .and_then(|(id, _)| table.structure(id))
                .map(|s| s.kind)
        };
        match (from, to) {
            (DataType::Unknown, _) | (_, DataType::Unknown) => true,
            _ if from.is_void() || to.is_void() => false,
            (DataType::Primitive(a), DataType::Primitive(b)) => {
                (*a == PrimitiveKind::Bool) == (*b == PrimitiveKind::Bool)
            }
            (DataType::Enum(_), DataType::Primitive(p))
            | (DataType::Primitive(p), DataType::Enum(_)) => p.is_integer(),
            (DataType::Structure { .. }, DataType::Structure { .. }) => {
                match (kind(from), kind(to)) {
                    (Some(StructureKind::Class), Some(StructureKind::Class)) => {
                        table.is_subclass_of(from, to) || table.is_subclass_of(to, from)
                    }
                    (Some(StructureKind::Class), Some(StructureKind::Protocol))
                    | (Some(StructureKind::Protocol), Some(StructureKind::Class))
                    | (Some(StructureKind::Protocol), Some(StructureKind::Protocol)) => true,
                    _ => false,
                }
            }
            _ => from.is_equivalent(to) == Equivalence::Equal,
        }
    }
}

fn is_static_member(analyser: &Analyser<'_>, symbol: SymbolId) -> bool {
    let table = analyser.table;
    match &table.symbol(symbol).kind {
        SymbolKind::Field(f) => f.is_static,
        SymbolKind::Function(f) => f.is_static,
        _ => false,
    }
}

/// Numeric, or a type parameter whose instantiation is checked after specialization.
fn is_numeric_like(ty: &DataType) -> bool {
    ty.is_numeric() || ty.is_unknown() || matches!(ty, DataType::TypeParameter(_))
}

/// A literal, or a negated numeric literal.
fn is_literal(expr: &SemExpr) -> bool {
    match &expr.kind {
        SemExprKind::Literal(_) => true,
        SemExprKind::Unary {
            op: UnaryOp::Negate,
            operand,
        } => is_literal(operand),
        _ => false,
    }
}

fn retype_literal(expr: SemExpr, ty: &DataType) -> SemExpr {
    let kind = match expr.kind {
        SemExprKind::Unary { op, operand } => SemExprKind::Unary {
            op,
            operand: Box::new(retype_literal(*operand, ty)),
        },
        other => other,
    };
    SemExpr {
        ty: ty.clone(),
        kind,
        ..expr
    }
}

/// Bind `params` by matching `param` against `arg` structurally.
fn unify(param: &DataType, arg: &DataType, params: &[SymbolId], bindings: &mut Bindings) {
    match (param, arg) {
        (DataType::TypeParameter(p), _) if params.contains(p) => {
            bindings.entry(*p).or_insert_with(|| arg.clone());
        }
        (
            DataType::Structure {
                symbol: a,
                type_args: a_args,
            },
            DataType::Structure {
                symbol: b,
                type_args: b_args,
            },
        ) if a == b => {
            for (x, y) in a_args.iter().zip(b_args) {
                unify(x, y, params, bindings);
            }
        }
        (DataType::Slice(a), DataType::Slice(b)) => unify(a, b, params, bindings),
        _ => {}
    }
}
