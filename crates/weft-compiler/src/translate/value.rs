//! Type-directed value compilation.
//!
//! Values come in as untyped expressions; the expected type decides how a
//! literal is interpreted and which coercions apply. Errors are reported
//! and the target keeps its default-default, so downstream consumers always
//! see a well-typed value.

use rowan::TextRange;

use weft_schema::{FieldSlot, ListValue, NodeBody, StructValue, Type, Value};

use crate::ast::{DeclKind, DeclName, ValueBody, ValueExpr};
use crate::diagnostics::DiagnosticMessage;
use crate::resolve::Resolution;

use super::{NodeTranslator, UnfinishedValue, ValueTarget};

impl<'a> NodeTranslator<'a> {
    /// Compile a value during the bootstrap pass. The target is seeded with
    /// its default-default first, so a failure (or deferral) still leaves
    /// well-formed output. Compound values wait for `finish`, when the
    /// nodes they reference have bootstrap schemas.
    pub(crate) fn compile_bootstrap_value(
        &mut self,
        source: &'a ValueExpr,
        ty: Type,
        target: ValueTarget,
    ) {
        *self.value_target_mut(&target) = Value::default_for(&ty);

        match ty {
            Type::List(_) | Type::Struct(_) | Type::Interface(_) | Type::Any => {
                self.unfinished_values.push(UnfinishedValue { source, ty, target });
            }
            _ => self.compile_value(source, &ty, &target, true),
        }
    }

    /// Compile a value expression into `target`. On error the target is
    /// left untouched (it already holds the default).
    pub(crate) fn compile_value(
        &mut self,
        source: &'a ValueExpr,
        ty: &Type,
        target: &ValueTarget,
        is_bootstrap: bool,
    ) {
        if let Some(value) = self.compile_value_inner(source, ty, is_bootstrap) {
            *self.value_target_mut(target) = value;
        }
    }

    fn compile_value_inner(
        &mut self,
        source: &'a ValueExpr,
        ty: &Type,
        is_bootstrap: bool,
    ) -> Option<Value> {
        match &source.body {
            ValueBody::Name(name) => {
                if let Some(bare) = name.bare_name() {
                    if let Type::Enum(enum_id) = ty {
                        let resolver = self.resolver;
                        match resolver.resolve_bootstrap(*enum_id) {
                            Some(node) => {
                                if let NodeBody::Enum(enumerants) = &node.body
                                    && let Some(index) =
                                        enumerants.iter().position(|e| e.name == bare)
                                {
                                    return Some(Value::Enum(index as u16));
                                }
                                // not an enumerant; maybe a constant
                            }
                            None => {
                                // The enum's schema is broken for reasons
                                // already reported; assume the enumerant
                                // would have matched.
                                return Some(Value::Enum(0));
                            }
                        }
                    } else {
                        let keyword = match bare {
                            "void" => Some(Value::Void),
                            "true" => Some(Value::Bool(true)),
                            "false" => Some(Value::Bool(false)),
                            "nan" => Some(Value::Float64(f64::NAN)),
                            "inf" => Some(Value::Float64(f64::INFINITY)),
                            _ => None,
                        };
                        if let Some(value) = keyword {
                            return self.coerce_value(value, ty, source.span);
                        }
                    }
                }
                self.read_constant(name, ty, is_bootstrap, source.span)
            }

            ValueBody::PositiveInt(value) => self.fit_int(i128::from(*value), ty, source.span),

            ValueBody::NegativeInt(magnitude) => {
                if *magnitude > (i64::MAX as u64) + 1 {
                    self.diag.push(DiagnosticMessage::error(
                        source.span,
                        "integer is too big to be negative",
                    ));
                    None
                } else {
                    self.fit_int(-i128::from(*magnitude), ty, source.span)
                }
            }

            ValueBody::Float(value) => self.fit_float(*value, ty, source.span),

            ValueBody::String(text) => match ty {
                Type::Text => Some(Value::Text(Some(text.clone()))),
                Type::Data => Some(Value::Data(Some(text.clone().into_bytes()))),
                _ => {
                    self.report_type_mismatch(source.span, ty);
                    None
                }
            },

            ValueBody::List(elements) => match ty {
                Type::List(element_ty) => {
                    let mut values = Vec::with_capacity(elements.len());
                    for element in elements {
                        // a bad element keeps its default; the error is
                        // already on record
                        let value = self
                            .compile_value_inner(element, element_ty, is_bootstrap)
                            .unwrap_or_else(|| Value::default_for(element_ty));
                        values.push(value);
                    }
                    Some(Value::List(Some(ListValue { elements: values })))
                }
                _ => {
                    self.report_type_mismatch(source.span, ty);
                    None
                }
            },

            ValueBody::Struct(assignments) => match ty {
                Type::Struct(struct_id) => {
                    let resolver = self.resolver;
                    // schema may be broken for reasons already reported
                    let struct_node = resolver.resolve_bootstrap(*struct_id)?.as_struct()?;

                    let mut fields = Vec::with_capacity(assignments.len());
                    for assignment in assignments {
                        let field_name = &assignment.field_name;
                        let Some(field) = struct_node.field(&field_name.text) else {
                            self.diag.push(DiagnosticMessage::error(
                                field_name.span,
                                format!("struct has no field named '{}'", field_name.text),
                            ));
                            continue;
                        };
                        let field_ty = match &field.slot {
                            FieldSlot::Regular { ty, .. } => ty.clone(),
                            FieldSlot::Group { type_id } => Type::Struct(*type_id),
                        };
                        let value = self
                            .compile_value_inner(&assignment.value, &field_ty, is_bootstrap)
                            .unwrap_or_else(|| Value::default_for(&field_ty));
                        fields.push((field_name.text.clone(), value));
                    }
                    Some(Value::Struct(Some(StructValue {
                        type_id: *struct_id,
                        fields,
                    })))
                }
                _ => {
                    // This covers struct literals against list- and
                    // Any-typed targets too: without a schema there is
                    // nothing to build.
                    self.report_type_mismatch(source.span, ty);
                    None
                }
            },

            // Placeholder from an earlier parse error, already reported.
            ValueBody::Unknown => None,
        }
    }

    /// Look up a constant and fit its stored value to the expected type.
    fn read_constant(
        &mut self,
        name: &DeclName,
        ty: &Type,
        is_bootstrap: bool,
        span: TextRange,
    ) -> Option<Value> {
        let resolver = self.resolver;
        // Unresolved names were the resolver's to report.
        let resolved = resolver.resolve(name)?;

        let Resolution::Node {
            kind: DeclKind::Const,
            id,
        } = resolved
        else {
            self.diag.push(DiagnosticMessage::error(
                span,
                format!("'{name}' does not refer to a constant"),
            ));
            return None;
        };

        // During bootstrap only primitive constants are expected, so the
        // bootstrap schema suffices; the finish pass needs the final one so
        // compound payloads are filled in.
        let node = if is_bootstrap {
            resolver.resolve_bootstrap(id)
        } else {
            resolver.resolve_final(id)
        };
        // The constant's schema may be broken for reasons already reported.
        let node = node?;
        let NodeBody::Const(constant) = &node.body else {
            return None;
        };

        if name.is_bare() {
            // A bare identifier that happens to hit a constant in an
            // enclosing scope reads like a literal; require qualification.
            let scope = resolver.resolve_bootstrap(node.scope_id);
            if let Some(scope) = scope {
                let parent = match &scope.body {
                    NodeBody::File => "",
                    _ => scope.local_name(),
                };
                let bare = name.bare_name().expect("bare name checked above");
                self.diag.push(DiagnosticMessage::error(
                    span,
                    format!(
                        "constant names must be qualified to avoid confusion; \
                         replace '{bare}' with '{parent}.{bare}' if that is what you intended"
                    ),
                ));
            }
        }

        let value = constant.value.clone();
        if constant.ty == *ty {
            return Some(value);
        }
        if let Some(int) = value_as_int(&value) {
            return self.fit_int(int, ty, span);
        }
        if let Some(float) = value_as_float(&value) {
            return self.fit_float(float, ty, span);
        }
        self.report_type_mismatch(span, ty);
        None
    }

    /// Fit a keyword literal to the expected type.
    fn coerce_value(&mut self, value: Value, ty: &Type, span: TextRange) -> Option<Value> {
        let matches = matches!(
            (&value, ty),
            (Value::Void, Type::Void) | (Value::Bool(_), Type::Bool)
        );
        if matches {
            return Some(value);
        }
        if let Some(float) = value_as_float(&value) {
            return self.fit_float(float, ty, span);
        }
        self.report_type_mismatch(span, ty);
        None
    }

    fn fit_int(&mut self, value: i128, ty: &Type, span: TextRange) -> Option<Value> {
        if ty.is_integer() {
            let fitted = match ty {
                Type::Int8 => i8::try_from(value).ok().map(Value::Int8),
                Type::Int16 => i16::try_from(value).ok().map(Value::Int16),
                Type::Int32 => i32::try_from(value).ok().map(Value::Int32),
                Type::Int64 => i64::try_from(value).ok().map(Value::Int64),
                Type::Uint8 => u8::try_from(value).ok().map(Value::Uint8),
                Type::Uint16 => u16::try_from(value).ok().map(Value::Uint16),
                Type::Uint32 => u32::try_from(value).ok().map(Value::Uint32),
                Type::Uint64 => u64::try_from(value).ok().map(Value::Uint64),
                _ => unreachable!("is_integer covers exactly the integer types"),
            };
            if fitted.is_none() {
                self.diag.push(DiagnosticMessage::error(
                    span,
                    format!("integer value is out of range for {ty}"),
                ));
            }
            fitted
        } else {
            match ty {
                Type::Float32 => Some(Value::Float32(value as f32)),
                Type::Float64 => Some(Value::Float64(value as f64)),
                _ => {
                    self.report_type_mismatch(span, ty);
                    None
                }
            }
        }
    }

    fn fit_float(&mut self, value: f64, ty: &Type, span: TextRange) -> Option<Value> {
        match ty {
            Type::Float32 => Some(Value::Float32(value as f32)),
            Type::Float64 => Some(Value::Float64(value)),
            _ => {
                self.report_type_mismatch(span, ty);
                None
            }
        }
    }

    fn report_type_mismatch(&mut self, span: TextRange, ty: &Type) {
        self.diag.push(DiagnosticMessage::error(
            span,
            format!("type mismatch: expected {ty}"),
        ));
    }
}

fn value_as_int(value: &Value) -> Option<i128> {
    match value {
        Value::Int8(v) => Some(i128::from(*v)),
        Value::Int16(v) => Some(i128::from(*v)),
        Value::Int32(v) => Some(i128::from(*v)),
        Value::Int64(v) => Some(i128::from(*v)),
        Value::Uint8(v) => Some(i128::from(*v)),
        Value::Uint16(v) => Some(i128::from(*v)),
        Value::Uint32(v) => Some(i128::from(*v)),
        Value::Uint64(v) => Some(i128::from(*v)),
        _ => None,
    }
}

fn value_as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(f64::from(*v)),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}
