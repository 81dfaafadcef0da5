use std::collections::HashSet;
use std::sync::Arc;

use log::trace;

use crate::analyzer::{AnalyzerError, AnalyzerResult, inspect_with};
use crate::binding::{
    ExpressionTable, VariableDescriptor, VariableKind, VariableResolution, VariableTable,
};
use crate::catalog::table::{ColumnValue, IndexDeclaration, TableDeclaration};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Region};
use crate::expr::{
    AggregateFunctionCall, Binary, BinaryOperator, Cast, Coalesce, Compare, ComparisonOperator,
    Conditional, FunctionCall, Immediate, Let, MatchExpr, ScalarExpr, Unary, UnaryOperator,
    VariableReference,
};
use crate::plan::relational::{
    Aggregate, AggregateColumn, AggregateGroup, ColumnMapping, Distinct, Emit, Filter, Find,
    Identify, Join, JoinFind, JoinGroup, JoinScan, Limit, Offer, Project, RelationalPlan, Scan,
    SearchKey, SetQuantifier, TakeCogroup, TakeFlat, TakeGroup, Union, Values, WriteMapping,
    WriteTable,
};
use crate::plan::statement::{CreateIndex, CreateTable, Statement, WriteStatement};
use crate::plan::step::{
    AggregateExchange, BroadcastExchange, Exchange, ExchangeKind, ForwardExchange, GroupExchange,
    Step, StepGraph,
};
use crate::types::conversion::{
    Ternary, binary_bit_string_promotion, binary_character_string_promotion,
    binary_numeric_promotion, binary_octet_string_promotion, binary_time_interval_promotion,
    is_assignment_convertible, is_cast_convertible, unary_decimal_promotion,
    unary_numeric_promotion, unary_temporal_promotion, unary_time_interval_promotion,
    unifying_conversion,
};
use crate::types::data_type::{
    DataType, TypeCategory, is_equality_comparable, is_order_comparable,
};
use crate::types::repository::{TypeRepository, shared_error, shared_pending};

pub(crate) struct Engine<'a> {
    expressions: &'a mut ExpressionTable,
    variables: &'a mut VariableTable,
    diagnostics: &'a mut Vec<Diagnostic>,
    repo: &'a TypeRepository,
    validate: bool,
    allow_unresolved: bool,
}

fn expected_message(actual: &DataType, expected: &[TypeCategory]) -> String {
    let list = expected
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{actual} (expected: {{{list}}})")
}

fn sum_lengths(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => x.checked_add(y),
        _ => None,
    }
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        expressions: &'a mut ExpressionTable,
        variables: &'a mut VariableTable,
        diagnostics: &'a mut Vec<Diagnostic>,
        repo: &'a TypeRepository,
        validate: bool,
        allow_unresolved: bool,
    ) -> Self {
        Engine {
            expressions,
            variables,
            diagnostics,
            repo,
            validate,
            allow_unresolved,
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        trace!("diagnostic: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn report_expected(
        &mut self,
        code: DiagnosticCode,
        region: Option<Region>,
        actual: &DataType,
        expected: &[TypeCategory],
    ) {
        self.report(Diagnostic::new(
            code,
            expected_message(actual, expected),
            region,
        ));
    }

    fn raise(&mut self, diagnostic: Diagnostic) -> Arc<DataType> {
        self.report(diagnostic);
        shared_error()
    }

    fn raise_expected(
        &mut self,
        code: DiagnosticCode,
        region: Option<Region>,
        actual: &DataType,
        expected: &[TypeCategory],
    ) -> Arc<DataType> {
        self.report_expected(code, region, actual, expected);
        shared_error()
    }

    fn inspect(&self, resolution: &VariableResolution) -> Option<Arc<DataType>> {
        inspect_with(self.expressions, resolution)
    }

    fn is_unresolved_or_error(&self, ty: Option<&Arc<DataType>>) -> bool {
        match ty {
            None => true,
            Some(ty) => ty.category() == TypeCategory::Unresolved,
        }
    }

    fn is_unresolved_or_error_resolution(&self, resolution: &VariableResolution) -> bool {
        if !resolution.is_resolved() {
            return true;
        }
        let ty = self.inspect(resolution);
        self.is_unresolved_or_error(ty.as_ref())
    }

    // ---------------------------------------------------------------- scalar

    pub(crate) fn resolve_scalar(
        &mut self,
        expression: &ScalarExpr,
    ) -> AnalyzerResult<Arc<DataType>> {
        if let Some(resolved) = self.expressions.find(expression.id()) {
            return Ok(resolved);
        }
        let resolved = self.dispatch_scalar(expression)?;
        self.expressions
            .bind(expression.id(), Arc::clone(&resolved), true)?;
        Ok(resolved)
    }

    fn dispatch_scalar(&mut self, expression: &ScalarExpr) -> AnalyzerResult<Arc<DataType>> {
        match expression {
            ScalarExpr::Immediate(e) => self.resolve_immediate(e),
            ScalarExpr::VariableReference(e) => self.resolve_variable_reference(e),
            ScalarExpr::Unary(e) => self.resolve_unary(e),
            ScalarExpr::Cast(e) => self.resolve_cast(e),
            ScalarExpr::Binary(e) => self.resolve_binary(e),
            ScalarExpr::Compare(e) => self.resolve_compare(e),
            ScalarExpr::Match(e) => self.resolve_match(e),
            ScalarExpr::Conditional(e) => self.resolve_conditional(e),
            ScalarExpr::Coalesce(e) => self.resolve_coalesce(e),
            ScalarExpr::Let(e) => self.resolve_let(e),
            ScalarExpr::FunctionCall(e) => self.resolve_function_call(e),
            ScalarExpr::AggregateFunctionCall(e) => self.resolve_aggregate_function_call(e),
        }
    }

    fn resolve_immediate(&mut self, e: &Immediate) -> AnalyzerResult<Arc<DataType>> {
        if self.validate {
            if !self.allow_unresolved && e.data_type.category() == TypeCategory::Unresolved {
                return Ok(self.raise(Diagnostic::new(
                    DiagnosticCode::UnsupportedType,
                    format!("immediate expression type is unsupported: {}", e.data_type),
                    e.region,
                )));
            }
            if let Some(vtype) = e.value.natural_type(&e.data_type, self.repo) {
                if is_assignment_convertible(&vtype, &e.data_type) != Ternary::Yes {
                    return Ok(self.raise_expected(
                        DiagnosticCode::InconsistentType,
                        e.region,
                        &e.data_type,
                        &[vtype.category()],
                    ));
                }
            }
        }
        Ok(Arc::clone(&e.data_type))
    }

    fn resolve_variable_reference(
        &mut self,
        e: &VariableReference,
    ) -> AnalyzerResult<Arc<DataType>> {
        let resolution = self.resolve_stream_column(&e.variable, e.region)?;
        if let Some(ty) = self.inspect(&resolution) {
            return Ok(ty);
        }
        if self.allow_unresolved {
            return Ok(shared_pending());
        }
        // the unbound reference was already reported by the lookup
        Ok(shared_error())
    }

    fn resolve_unary(&mut self, e: &Unary) -> AnalyzerResult<Arc<DataType>> {
        let operand = self.resolve_scalar(&e.operand)?;
        let region = e.operand.region().or(e.region);
        Ok(match e.operator {
            UnaryOperator::Plus | UnaryOperator::SignInversion => match operand.category() {
                TypeCategory::Unknown => self.raise_expected(
                    DiagnosticCode::AmbiguousType,
                    region,
                    &operand,
                    &[TypeCategory::Number, TypeCategory::DatetimeInterval],
                ),
                TypeCategory::Number => unary_numeric_promotion(&operand, self.repo),
                TypeCategory::DatetimeInterval => {
                    unary_time_interval_promotion(&operand, self.repo)
                }
                TypeCategory::Unresolved => operand,
                _ => self.raise_expected(
                    DiagnosticCode::UnsupportedType,
                    region,
                    &operand,
                    &[TypeCategory::Number, TypeCategory::DatetimeInterval],
                ),
            },
            UnaryOperator::Length => {
                if self.validate {
                    match operand.category() {
                        TypeCategory::CharacterString
                        | TypeCategory::OctetString
                        | TypeCategory::BitString
                        | TypeCategory::Unresolved => {}
                        TypeCategory::Unknown => self.report_expected(
                            DiagnosticCode::AmbiguousType,
                            region,
                            &operand,
                            &[TypeCategory::CharacterString, TypeCategory::BitString],
                        ),
                        _ => self.report_expected(
                            DiagnosticCode::UnsupportedType,
                            region,
                            &operand,
                            &[TypeCategory::CharacterString, TypeCategory::BitString],
                        ),
                    }
                }
                self.repo.get(DataType::Int4)
            }
            UnaryOperator::ConditionalNot => {
                if self.validate {
                    match operand.category() {
                        TypeCategory::Unknown | TypeCategory::Boolean | TypeCategory::Unresolved => {
                        }
                        _ => self.report_expected(
                            DiagnosticCode::UnsupportedType,
                            region,
                            &operand,
                            &[TypeCategory::Boolean],
                        ),
                    }
                }
                self.repo.get(DataType::Boolean)
            }
            UnaryOperator::IsNull => {
                if self.validate {
                    match operand.category() {
                        TypeCategory::Unknown
                        | TypeCategory::Boolean
                        | TypeCategory::Number
                        | TypeCategory::CharacterString
                        | TypeCategory::OctetString
                        | TypeCategory::BitString
                        | TypeCategory::Temporal
                        | TypeCategory::DatetimeInterval
                        | TypeCategory::Unresolved => {}
                        _ => self.report_expected(
                            DiagnosticCode::UnsupportedType,
                            region,
                            &operand,
                            &[
                                TypeCategory::Boolean,
                                TypeCategory::Number,
                                TypeCategory::CharacterString,
                                TypeCategory::OctetString,
                                TypeCategory::BitString,
                                TypeCategory::Temporal,
                                TypeCategory::DatetimeInterval,
                            ],
                        ),
                    }
                }
                self.repo.get(DataType::Boolean)
            }
            UnaryOperator::IsTrue | UnaryOperator::IsFalse | UnaryOperator::IsUnknown => {
                if self.validate {
                    match operand.category() {
                        TypeCategory::Unknown | TypeCategory::Boolean | TypeCategory::Unresolved => {
                        }
                        _ => self.report_expected(
                            DiagnosticCode::UnsupportedType,
                            region,
                            &operand,
                            &[TypeCategory::Boolean],
                        ),
                    }
                }
                self.repo.get(DataType::Boolean)
            }
        })
    }

    fn resolve_cast(&mut self, e: &Cast) -> AnalyzerResult<Arc<DataType>> {
        if self.validate {
            if !self.allow_unresolved && e.data_type.category() == TypeCategory::Unresolved {
                return Ok(self.raise(Diagnostic::new(
                    DiagnosticCode::UnsupportedType,
                    format!("cast target type is unsupported: {}", e.data_type),
                    e.region,
                )));
            }
            let operand = self.resolve_scalar(&e.operand)?;
            if is_cast_convertible(&operand, &e.data_type) == Ternary::No {
                self.report_expected(
                    DiagnosticCode::UnsupportedType,
                    e.region,
                    &operand,
                    &[e.data_type.category()],
                );
            }
        }
        Ok(Arc::clone(&e.data_type))
    }

    fn category_pair(left: &Arc<DataType>, right: &Arc<DataType>) -> (TypeCategory, TypeCategory) {
        let lcat = left.category();
        let rcat = right.category();
        if lcat == TypeCategory::Unknown {
            return (rcat, rcat);
        }
        if rcat == TypeCategory::Unknown {
            return (lcat, lcat);
        }
        (lcat, rcat)
    }

    fn resolve_binary(&mut self, e: &Binary) -> AnalyzerResult<Arc<DataType>> {
        let left = self.resolve_scalar(&e.left)?;
        let right = self.resolve_scalar(&e.right)?;
        let left_region = e.left.region().or(e.region);
        let right_region = e.right.region().or(e.region);
        let (lcat, rcat) = Self::category_pair(&left, &right);
        match e.operator {
            BinaryOperator::Add | BinaryOperator::Subtract => {
                if lcat == TypeCategory::Unresolved {
                    return Ok(left);
                }
                if rcat == TypeCategory::Unresolved {
                    return Ok(right);
                }
                let add = e.operator == BinaryOperator::Add;
                Ok(match lcat {
                    TypeCategory::Unknown => self.raise_expected(
                        DiagnosticCode::AmbiguousType,
                        left_region,
                        &left,
                        &[
                            TypeCategory::Number,
                            TypeCategory::Temporal,
                            TypeCategory::DatetimeInterval,
                        ],
                    ),
                    TypeCategory::Number => {
                        if rcat == TypeCategory::Number {
                            self.numeric_additive_promotion(&left, &right)
                        } else {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::Number],
                            )
                        }
                    }
                    TypeCategory::Temporal => {
                        if rcat == TypeCategory::DatetimeInterval {
                            unary_temporal_promotion(&left, self.repo)
                        } else {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::DatetimeInterval],
                            )
                        }
                    }
                    TypeCategory::DatetimeInterval => {
                        if add && rcat == TypeCategory::Temporal {
                            unary_temporal_promotion(&right, self.repo)
                        } else if rcat == TypeCategory::DatetimeInterval {
                            binary_time_interval_promotion(&left, &right, self.repo)
                        } else if add {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::Temporal, TypeCategory::DatetimeInterval],
                            )
                        } else {
                            // <interval> - <temporal> is not defined
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::DatetimeInterval],
                            )
                        }
                    }
                    _ => self.raise_expected(
                        DiagnosticCode::UnsupportedType,
                        left_region,
                        &left,
                        &[
                            TypeCategory::Number,
                            TypeCategory::Temporal,
                            TypeCategory::DatetimeInterval,
                        ],
                    ),
                })
            }
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Remainder => {
                if lcat == TypeCategory::Unresolved {
                    return Ok(left);
                }
                if rcat == TypeCategory::Unresolved {
                    return Ok(right);
                }
                let multiply = e.operator == BinaryOperator::Multiply;
                Ok(match lcat {
                    TypeCategory::Unknown => self.raise_expected(
                        DiagnosticCode::AmbiguousType,
                        left_region,
                        &left,
                        &[TypeCategory::Number, TypeCategory::DatetimeInterval],
                    ),
                    TypeCategory::Number => {
                        if rcat == TypeCategory::Number {
                            self.numeric_multiplicative_promotion(&left, &right)
                        } else if multiply && rcat == TypeCategory::DatetimeInterval {
                            unary_time_interval_promotion(&right, self.repo)
                        } else if multiply {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::Number, TypeCategory::DatetimeInterval],
                            )
                        } else {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::Number],
                            )
                        }
                    }
                    TypeCategory::DatetimeInterval => {
                        if rcat == TypeCategory::Number {
                            unary_time_interval_promotion(&left, self.repo)
                        } else if multiply {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::DatetimeInterval],
                            )
                        } else {
                            self.raise_expected(
                                DiagnosticCode::InconsistentType,
                                right_region,
                                &right,
                                &[TypeCategory::Number],
                            )
                        }
                    }
                    _ => self.raise_expected(
                        DiagnosticCode::UnsupportedType,
                        left_region,
                        &left,
                        &[TypeCategory::Number, TypeCategory::DatetimeInterval],
                    ),
                })
            }
            BinaryOperator::Concat => {
                if lcat == TypeCategory::Unresolved {
                    return Ok(left);
                }
                if rcat == TypeCategory::Unresolved {
                    return Ok(right);
                }
                Ok(self.resolve_concat(e, &left, &right, lcat, rcat))
            }
            BinaryOperator::ConditionalAnd | BinaryOperator::ConditionalOr => {
                if self.validate
                    && lcat != TypeCategory::Unresolved
                    && rcat != TypeCategory::Unresolved
                {
                    match lcat {
                        TypeCategory::Unknown | TypeCategory::Boolean => {
                            if rcat != TypeCategory::Unknown && rcat != TypeCategory::Boolean {
                                self.report_expected(
                                    DiagnosticCode::InconsistentType,
                                    right_region,
                                    &right,
                                    &[TypeCategory::Boolean],
                                );
                            }
                        }
                        _ => self.report_expected(
                            DiagnosticCode::UnsupportedType,
                            left_region,
                            &left,
                            &[TypeCategory::Boolean],
                        ),
                    }
                }
                Ok(self.repo.get(DataType::Boolean))
            }
        }
    }

    /// add/subtract: decimal operands produce `decimal(*, max(s, t))`.
    fn numeric_additive_promotion(
        &mut self,
        left: &Arc<DataType>,
        right: &Arc<DataType>,
    ) -> Arc<DataType> {
        let result = binary_numeric_promotion(left, right, self.repo);
        if matches!(result.as_ref(), DataType::Decimal { .. }) {
            let left_dec = unary_decimal_promotion(left, self.repo);
            let right_dec = unary_decimal_promotion(right, self.repo);
            if let (
                DataType::Decimal { scale: ls, .. },
                DataType::Decimal { scale: rs, .. },
            ) = (left_dec.as_ref(), right_dec.as_ref())
            {
                let scale = match (ls, rs) {
                    (Some(s), Some(t)) => Some(*s.max(t)),
                    _ => None,
                };
                return self.repo.get(DataType::decimal(None, scale));
            }
        }
        result
    }

    /// multiply/divide/remainder: two decimals produce `decimal(*, *)`.
    fn numeric_multiplicative_promotion(
        &mut self,
        left: &Arc<DataType>,
        right: &Arc<DataType>,
    ) -> Arc<DataType> {
        let result = binary_numeric_promotion(left, right, self.repo);
        if matches!(left.as_ref(), DataType::Decimal { .. })
            && matches!(right.as_ref(), DataType::Decimal { .. })
        {
            return self.repo.get(DataType::decimal(None, None));
        }
        result
    }

    fn resolve_concat(
        &mut self,
        e: &Binary,
        left: &Arc<DataType>,
        right: &Arc<DataType>,
        lcat: TypeCategory,
        rcat: TypeCategory,
    ) -> Arc<DataType> {
        let left_region = e.left.region().or(e.region);
        let right_region = e.right.region().or(e.region);
        match lcat {
            TypeCategory::Unknown => self.raise_expected(
                DiagnosticCode::AmbiguousType,
                left_region,
                left,
                &[
                    TypeCategory::CharacterString,
                    TypeCategory::OctetString,
                    TypeCategory::BitString,
                ],
            ),
            TypeCategory::CharacterString => {
                if rcat != TypeCategory::CharacterString {
                    return self.raise_expected(
                        DiagnosticCode::InconsistentType,
                        right_region,
                        right,
                        &[TypeCategory::CharacterString],
                    );
                }
                let result = binary_character_string_promotion(left, right, self.repo);
                if let (
                    DataType::Character { length: ll, .. },
                    DataType::Character { length: rl, .. },
                    DataType::Character { varying, .. },
                ) = (left.as_ref(), right.as_ref(), result.as_ref())
                {
                    return self
                        .repo
                        .get(DataType::character(*varying, sum_lengths(*ll, *rl)));
                }
                result
            }
            TypeCategory::OctetString => {
                if rcat != TypeCategory::OctetString {
                    return self.raise_expected(
                        DiagnosticCode::InconsistentType,
                        right_region,
                        right,
                        &[TypeCategory::OctetString],
                    );
                }
                let result = binary_octet_string_promotion(left, right, self.repo);
                if let (
                    DataType::Octet { length: ll, .. },
                    DataType::Octet { length: rl, .. },
                    DataType::Octet { varying, .. },
                ) = (left.as_ref(), right.as_ref(), result.as_ref())
                {
                    return self
                        .repo
                        .get(DataType::octet(*varying, sum_lengths(*ll, *rl)));
                }
                result
            }
            TypeCategory::BitString => {
                if rcat != TypeCategory::BitString {
                    return self.raise_expected(
                        DiagnosticCode::InconsistentType,
                        right_region,
                        right,
                        &[TypeCategory::BitString],
                    );
                }
                let result = binary_bit_string_promotion(left, right, self.repo);
                if let (
                    DataType::Bit { length: ll, .. },
                    DataType::Bit { length: rl, .. },
                    DataType::Bit { varying, .. },
                ) = (left.as_ref(), right.as_ref(), result.as_ref())
                {
                    return self.repo.get(DataType::bit(*varying, sum_lengths(*ll, *rl)));
                }
                result
            }
            _ => self.raise_expected(
                DiagnosticCode::UnsupportedType,
                left_region,
                left,
                &[
                    TypeCategory::CharacterString,
                    TypeCategory::OctetString,
                    TypeCategory::BitString,
                ],
            ),
        }
    }

    fn is_comparable(operator: ComparisonOperator, ty: &DataType) -> bool {
        if operator.is_ordering() {
            is_order_comparable(ty)
        } else {
            is_equality_comparable(ty)
        }
    }

    fn resolve_compare(&mut self, e: &Compare) -> AnalyzerResult<Arc<DataType>> {
        if self.validate {
            let left = self.resolve_scalar(&e.left)?;
            let right = self.resolve_scalar(&e.right)?;
            let lcat = left.category();
            let rcat = right.category();
            if lcat == TypeCategory::Unresolved || rcat == TypeCategory::Unresolved {
                return Ok(self.repo.get(DataType::Boolean));
            }
            let unified = unifying_conversion(&left, &right, self.repo);
            if unified.category() == TypeCategory::Unresolved {
                self.report_expected(
                    DiagnosticCode::InconsistentType,
                    e.right.region().or(e.region),
                    &right,
                    &[lcat],
                );
            }
            if !Self::is_comparable(e.operator, &unified) {
                self.report(Diagnostic::new(
                    DiagnosticCode::UnsupportedType,
                    format!("unsupported comparison for the type: {unified}"),
                    e.region,
                ));
            }
        }
        Ok(self.repo.get(DataType::Boolean))
    }

    fn resolve_match(&mut self, e: &MatchExpr) -> AnalyzerResult<Arc<DataType>> {
        if self.validate {
            let operands = [&e.input, &e.pattern, &e.escape];
            for operand in operands {
                let ty = self.resolve_scalar(operand)?;
                match ty.category() {
                    TypeCategory::Unresolved
                    | TypeCategory::Unknown
                    | TypeCategory::CharacterString => {}
                    _ => self.report_expected(
                        DiagnosticCode::UnsupportedType,
                        operand.region().or(e.region),
                        &ty,
                        &[TypeCategory::CharacterString],
                    ),
                }
            }
        }
        Ok(self.repo.get(DataType::Boolean))
    }

    fn resolve_conditional(&mut self, e: &Conditional) -> AnalyzerResult<Arc<DataType>> {
        let mut current = self.repo.get(DataType::Unknown);
        for alternative in &e.alternatives {
            if self.validate {
                let condition = self.resolve_scalar(&alternative.condition)?;
                match condition.category() {
                    TypeCategory::Unresolved | TypeCategory::Unknown | TypeCategory::Boolean => {}
                    _ => self.report_expected(
                        DiagnosticCode::UnsupportedType,
                        alternative.condition.region().or(e.region),
                        &condition,
                        &[TypeCategory::Boolean],
                    ),
                }
            }
            let body = self.resolve_scalar(&alternative.body)?;
            if body.category() == TypeCategory::Unresolved {
                return Ok(body);
            }
            let next = unifying_conversion(&current, &body, self.repo);
            if next.category() == TypeCategory::Unresolved {
                return Ok(self.raise_expected(
                    DiagnosticCode::InconsistentType,
                    alternative.body.region().or(e.region),
                    &body,
                    &[current.category()],
                ));
            }
            current = next;
        }
        if let Some(default_expression) = &e.default_expression {
            let body = self.resolve_scalar(default_expression)?;
            if body.category() == TypeCategory::Unresolved {
                return Ok(body);
            }
            let next = unifying_conversion(&current, &body, self.repo);
            if next.category() == TypeCategory::Unresolved {
                return Ok(self.raise_expected(
                    DiagnosticCode::InconsistentType,
                    default_expression.region().or(e.region),
                    &body,
                    &[current.category()],
                ));
            }
            current = next;
        }
        Ok(current)
    }

    fn resolve_coalesce(&mut self, e: &Coalesce) -> AnalyzerResult<Arc<DataType>> {
        let mut current = self.repo.get(DataType::Unknown);
        for alternative in &e.alternatives {
            let ty = self.resolve_scalar(alternative)?;
            if ty.category() == TypeCategory::Unresolved {
                return Ok(ty);
            }
            let next = unifying_conversion(&current, &ty, self.repo);
            if next.category() == TypeCategory::Unresolved {
                return Ok(self.raise_expected(
                    DiagnosticCode::InconsistentType,
                    alternative.region().or(e.region),
                    &ty,
                    &[current.category()],
                ));
            }
            current = next;
        }
        Ok(current)
    }

    fn resolve_let(&mut self, e: &Let) -> AnalyzerResult<Arc<DataType>> {
        for declarator in &e.variables {
            self.resolve_scalar(&declarator.value)?;
            self.variables.bind(
                &declarator.variable,
                VariableResolution::ScalarExpression(declarator.value.id()),
                true,
            )?;
        }
        self.resolve_scalar(&e.body)
    }

    fn resolve_function_call(&mut self, e: &FunctionCall) -> AnalyzerResult<Arc<DataType>> {
        if self.validate {
            let return_type = Arc::clone(e.function.return_type());
            if !self.allow_unresolved && self.is_unresolved_or_error(Some(&return_type)) {
                self.report(Diagnostic::new(
                    DiagnosticCode::UnsupportedType,
                    format!("function return type is unsupported: {return_type}"),
                    e.region,
                ));
            } else if e.function.parameter_types().len() != e.arguments.len() {
                self.report(Diagnostic::new(
                    DiagnosticCode::InconsistentElements,
                    "inconsistent number of function arguments",
                    e.region,
                ));
            } else {
                let parameters: Vec<Arc<DataType>> = e.function.parameter_types().to_vec();
                for (argument, parameter) in e.arguments.iter().zip(parameters) {
                    let ty = self.resolve_scalar(argument)?;
                    if !self.is_unresolved_or_error(Some(&ty))
                        && is_assignment_convertible(&ty, &parameter) != Ternary::Yes
                    {
                        self.report_expected(
                            DiagnosticCode::InconsistentType,
                            argument.region().or(e.region),
                            &ty,
                            &[parameter.category()],
                        );
                        break;
                    }
                }
            }
        }
        Ok(Arc::clone(e.function.return_type()))
    }

    fn resolve_aggregate_function_call(
        &mut self,
        e: &AggregateFunctionCall,
    ) -> AnalyzerResult<Arc<DataType>> {
        if self.validate {
            let return_type = Arc::clone(e.function.return_type());
            if !self.allow_unresolved && self.is_unresolved_or_error(Some(&return_type)) {
                self.report(Diagnostic::new(
                    DiagnosticCode::UnsupportedType,
                    format!("function return type is unsupported: {return_type}"),
                    e.region,
                ));
            } else if e.function.parameter_types().len() != e.arguments.len() {
                self.report(Diagnostic::new(
                    DiagnosticCode::InconsistentElements,
                    "inconsistent number of function arguments",
                    e.region,
                ));
            } else {
                let parameters: Vec<Arc<DataType>> = e.function.parameter_types().to_vec();
                for (argument, parameter) in e.arguments.iter().zip(parameters) {
                    let ty = self.resolve_scalar(argument)?;
                    if !self.is_unresolved_or_error(Some(&ty))
                        && is_assignment_convertible(&ty, &parameter) != Ternary::Yes
                    {
                        self.report_expected(
                            DiagnosticCode::InconsistentType,
                            argument.region().or(e.region),
                            &ty,
                            &[parameter.category()],
                        );
                        break;
                    }
                }
            }
        }
        Ok(Arc::clone(e.function.return_type()))
    }

    // ---------------------------------------------------------- resolutions

    fn resolve_stream_column(
        &mut self,
        variable: &VariableDescriptor,
        region: Option<Region>,
    ) -> AnalyzerResult<VariableResolution> {
        if let Some(resolution) = self.variables.find(variable) {
            return Ok(resolution);
        }
        match variable.kind() {
            VariableKind::FrameVariable
            | VariableKind::StreamVariable
            | VariableKind::LocalVariable => {
                if !self.allow_unresolved {
                    self.report(Diagnostic::new(
                        DiagnosticCode::UnresolvedVariable,
                        format!("variable is not yet resolved: {variable}"),
                        region,
                    ));
                }
                Ok(VariableResolution::Unresolved)
            }
            VariableKind::ExternalVariable => {
                let declaration = variable
                    .as_external()
                    .cloned()
                    .ok_or(AnalyzerError::InvalidVariable {
                        expected: VariableKind::ExternalVariable,
                        actual: variable.kind(),
                    })?;
                if !self.allow_unresolved
                    && self.is_unresolved_or_error(Some(declaration.data_type()))
                {
                    self.report(Diagnostic::new(
                        DiagnosticCode::UnsupportedType,
                        format!(
                            "unsupported external variable type: {} ({})",
                            declaration.name(),
                            declaration.data_type()
                        ),
                        region,
                    ));
                    return Ok(VariableResolution::Unresolved);
                }
                Ok(self.variables.bind(
                    variable,
                    VariableResolution::External(declaration),
                    true,
                )?)
            }
            actual => Err(AnalyzerError::InvalidVariable {
                expected: VariableKind::StreamVariable,
                actual,
            }),
        }
    }

    fn resolve_external_relation_column(
        &mut self,
        variable: &VariableDescriptor,
    ) -> AnalyzerResult<VariableResolution> {
        if let Some(resolution) = self.variables.find(variable) {
            return Ok(resolution);
        }
        match variable.kind() {
            VariableKind::TableColumn => {
                let column = Arc::clone(variable.require_table_column()?);
                if !self.allow_unresolved && self.is_unresolved_or_error(Some(column.data_type())) {
                    self.report(Diagnostic::new(
                        DiagnosticCode::UnsupportedType,
                        format!(
                            "unsupported column type: {} ({})",
                            column.name(),
                            column.data_type()
                        ),
                        None,
                    ));
                }
                Ok(self
                    .variables
                    .bind(variable, VariableResolution::TableColumn(column), true)?)
            }
            VariableKind::ExchangeColumn => {
                if !self.allow_unresolved {
                    self.report(Diagnostic::new(
                        DiagnosticCode::UnresolvedVariable,
                        format!("exchange column is not yet resolved: {variable}"),
                        None,
                    ));
                }
                Ok(VariableResolution::Unresolved)
            }
            actual => Err(AnalyzerError::InvalidVariable {
                expected: VariableKind::TableColumn,
                actual,
            }),
        }
    }

    fn resolve_table_column(
        &mut self,
        variable: &VariableDescriptor,
    ) -> AnalyzerResult<VariableResolution> {
        let column = Arc::clone(variable.require_table_column()?);
        if let Some(resolution) = self.variables.find(variable) {
            return Ok(resolution);
        }
        Ok(self
            .variables
            .bind(variable, VariableResolution::TableColumn(column), true)?)
    }

    fn resolve_exchange_column(
        &mut self,
        variable: &VariableDescriptor,
    ) -> AnalyzerResult<VariableResolution> {
        if variable.kind() != VariableKind::ExchangeColumn {
            return Err(AnalyzerError::InvalidVariable {
                expected: VariableKind::ExchangeColumn,
                actual: variable.kind(),
            });
        }
        if let Some(resolution) = self.variables.find(variable) {
            return Ok(resolution);
        }
        if !self.allow_unresolved {
            self.report(Diagnostic::new(
                DiagnosticCode::UnresolvedVariable,
                format!("exchange column is not yet resolved: {variable}"),
                None,
            ));
        }
        Ok(VariableResolution::Unresolved)
    }

    // ----------------------------------------------------------- validators

    fn validate_equality_comparable(&mut self, ty: &DataType, region: Option<Region>) -> bool {
        if !is_equality_comparable(ty) {
            self.report(Diagnostic::new(
                DiagnosticCode::UnsupportedType,
                format!("unsupported equality comparison for the type: {ty}"),
                region,
            ));
            return false;
        }
        true
    }

    fn validate_order_comparable(&mut self, ty: &DataType, region: Option<Region>) -> bool {
        if !is_order_comparable(ty) {
            self.report(Diagnostic::new(
                DiagnosticCode::UnsupportedType,
                format!("unsupported order comparison for the type: {ty}"),
                region,
            ));
            return false;
        }
        true
    }

    fn validate_condition(&mut self, condition: Option<&ScalarExpr>) -> AnalyzerResult<bool> {
        if let Some(condition) = condition {
            let ty = self.resolve_scalar(condition)?;
            match ty.category() {
                TypeCategory::Unresolved | TypeCategory::Unknown | TypeCategory::Boolean => {}
                _ => {
                    self.report_expected(
                        DiagnosticCode::InconsistentType,
                        condition.region(),
                        &ty,
                        &[TypeCategory::Boolean],
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn validate_keys(&mut self, keys: &[SearchKey], range: bool) -> AnalyzerResult<bool> {
        let count = keys.len();
        for (index, key) in keys.iter().enumerate() {
            let resolution = self.resolve_external_relation_column(&key.variable)?;
            let variable_type = self.inspect(&resolution);
            let value_type = self.resolve_scalar(&key.value)?;
            if self.is_unresolved_or_error(variable_type.as_ref())
                || self.is_unresolved_or_error(Some(&value_type))
            {
                return Ok(false);
            }
            let variable_type = variable_type.unwrap_or_else(shared_error);
            if is_assignment_convertible(&value_type, &variable_type) != Ternary::Yes {
                self.report_expected(
                    DiagnosticCode::InconsistentType,
                    key.value.region(),
                    &value_type,
                    &[variable_type.category()],
                );
                return Ok(false);
            }
            if !self.validate_equality_comparable(&value_type, key.value.region()) {
                return Ok(false);
            }
            if range
                && index + 1 == count
                && !self.validate_order_comparable(&value_type, key.value.region())
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn validate_group_keys(&mut self, keys: &[VariableDescriptor]) -> AnalyzerResult<bool> {
        for key in keys {
            let resolution = self.resolve_stream_column(key, None)?;
            if self.is_unresolved_or_error_resolution(&resolution) {
                return Ok(false);
            }
            if let Some(ty) = self.inspect(&resolution) {
                if !self.validate_equality_comparable(&ty, None) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn validate_sort_keys(
        &mut self,
        keys: &[crate::plan::relational::SortKey],
    ) -> AnalyzerResult<bool> {
        for key in keys {
            let resolution = self.resolve_stream_column(&key.variable, None)?;
            if self.is_unresolved_or_error_resolution(&resolution) {
                return Ok(false);
            }
            if let Some(ty) = self.inspect(&resolution) {
                if !self.validate_order_comparable(&ty, None) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn validate_key_pairs(
        &mut self,
        key_pairs: &[crate::plan::relational::KeyPair],
    ) -> AnalyzerResult<bool> {
        for key_pair in key_pairs {
            let left_resolution = self.resolve_stream_column(&key_pair.left, None)?;
            let right_resolution = self.resolve_stream_column(&key_pair.right, None)?;
            let left = self.inspect(&left_resolution);
            let right = self.inspect(&right_resolution);
            if self.is_unresolved_or_error(left.as_ref())
                || self.is_unresolved_or_error(right.as_ref())
            {
                return Ok(false);
            }
            let left = left.unwrap_or_else(shared_error);
            let right = right.unwrap_or_else(shared_error);
            let unified = unifying_conversion(&left, &right, self.repo);
            if unified.is_error() {
                self.report_expected(
                    DiagnosticCode::InconsistentType,
                    None,
                    &right,
                    &[left.category()],
                );
                return Ok(false);
            }
            if !self.validate_equality_comparable(&unified, None) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn validate_table_write(
        &mut self,
        table: &Arc<TableDeclaration>,
        mappings: &[WriteMapping],
    ) -> AnalyzerResult<bool> {
        for mapping in mappings {
            let source = self.resolve_stream_column(&mapping.source, None)?;
            let destination = self.resolve_table_column(&mapping.destination)?;
            let column = destination
                .as_table_column()
                .ok_or_else(|| AnalyzerError::InvalidTableColumn {
                    column: mapping.destination.to_string(),
                })?;
            if !table.owns_column(column) {
                return Err(AnalyzerError::InvalidTableColumn {
                    column: mapping.destination.to_string(),
                });
            }
            let source_type = self.inspect(&source);
            let destination_type = self.inspect(&destination);
            if self.is_unresolved_or_error(source_type.as_ref())
                || self.is_unresolved_or_error(destination_type.as_ref())
            {
                return Ok(false);
            }
            let source_type = source_type.unwrap_or_else(shared_error);
            let destination_type = destination_type.unwrap_or_else(shared_error);
            match is_assignment_convertible(&source_type, &destination_type) {
                Ternary::Yes => {}
                Ternary::No => {
                    self.report_expected(
                        DiagnosticCode::InconsistentType,
                        None,
                        &source_type,
                        &[destination_type.category()],
                    );
                    return Ok(false);
                }
                Ternary::Unknown => return Ok(false),
            }
        }
        Ok(true)
    }

    fn resolve_read_like(&mut self, columns: &[ColumnMapping]) -> AnalyzerResult<bool> {
        for column in columns {
            let resolution = self.resolve_external_relation_column(&column.source)?;
            if self.is_unresolved_or_error_resolution(&resolution) {
                return Ok(false);
            }
            self.variables.bind(&column.destination, resolution, true)?;
        }
        Ok(true)
    }

    fn resolve_exchange_columns(&mut self, columns: &[ColumnMapping]) -> AnalyzerResult<bool> {
        for column in columns {
            let resolution = self.resolve_exchange_column(&column.source)?;
            if self.is_unresolved_or_error_resolution(&resolution) {
                return Ok(false);
            }
            self.variables.bind(&column.destination, resolution, true)?;
        }
        Ok(true)
    }

    fn resolve_aggregate_columns(&mut self, columns: &[AggregateColumn]) -> AnalyzerResult<bool> {
        for column in columns {
            if self.validate {
                if column.function.parameter_types().len() != column.arguments.len() {
                    return Ok(false);
                }
                let parameters: Vec<Arc<DataType>> = column.function.parameter_types().to_vec();
                for (argument, parameter) in column.arguments.iter().zip(parameters) {
                    let resolution = self.resolve_stream_column(argument, None)?;
                    let Some(ty) = self.inspect(&resolution) else {
                        return Ok(false);
                    };
                    if ty.is_error() {
                        return Ok(false);
                    }
                    if is_assignment_convertible(&ty, &parameter) == Ternary::No {
                        self.report_expected(
                            DiagnosticCode::InconsistentType,
                            None,
                            &parameter,
                            &[parameter.category()],
                        );
                        return Ok(false);
                    }
                }
            }
            self.variables.bind(
                &column.destination,
                VariableResolution::Aggregation(Arc::clone(&column.function)),
                true,
            )?;
        }
        Ok(true)
    }

    // ------------------------------------------------------------ relations

    pub(crate) fn resolve_relation(
        &mut self,
        plan: &Arc<RelationalPlan>,
        recursive: bool,
    ) -> AnalyzerResult<bool> {
        if recursive {
            let mut saw = HashSet::new();
            self.resolve_relation_recursive(plan, &mut saw)
        } else {
            self.resolve_relation_flat(plan)
        }
    }

    fn resolve_relation_recursive(
        &mut self,
        plan: &Arc<RelationalPlan>,
        saw: &mut HashSet<usize>,
    ) -> AnalyzerResult<bool> {
        if !saw.insert(Arc::as_ptr(plan) as usize) {
            // already visited through another edge of the dag
            return Ok(true);
        }
        for input in plan.inputs() {
            if !self.resolve_relation_recursive(input, saw)? {
                return Ok(false);
            }
        }
        self.resolve_relation_flat(plan)
    }

    fn resolve_relation_flat(&mut self, plan: &Arc<RelationalPlan>) -> AnalyzerResult<bool> {
        trace!("resolving operator: {}", plan.as_ref());
        match plan.as_ref() {
            RelationalPlan::Scan(op) => self.resolve_scan(op),
            RelationalPlan::Find(op) => self.resolve_find(op),
            RelationalPlan::Values(op) => self.resolve_values(op),
            RelationalPlan::Join(op) => self.resolve_join(op),
            RelationalPlan::JoinFind(op) => self.resolve_join_find(op),
            RelationalPlan::JoinScan(op) => self.resolve_join_scan(op),
            RelationalPlan::Project(op) => self.resolve_project(op),
            RelationalPlan::Filter(op) => self.resolve_filter(op),
            RelationalPlan::Identify(op) => self.resolve_identify(op),
            RelationalPlan::Buffer(_) => Ok(true),
            RelationalPlan::Aggregate(op) => self.resolve_aggregate(op),
            RelationalPlan::Distinct(op) => self.resolve_distinct(op),
            RelationalPlan::Limit(op) => self.resolve_limit(op),
            RelationalPlan::Union(op) => self.resolve_union(op),
            RelationalPlan::Intersection(op) => {
                if self.validate {
                    return self.validate_key_pairs(&op.key_pairs);
                }
                Ok(true)
            }
            RelationalPlan::Difference(op) => {
                if self.validate {
                    return self.validate_key_pairs(&op.key_pairs);
                }
                Ok(true)
            }
            RelationalPlan::Emit(op) => self.resolve_emit(op),
            RelationalPlan::WriteTable(op) => self.resolve_write_table(op),
            RelationalPlan::TakeFlat(op) => self.resolve_take_flat(op),
            RelationalPlan::TakeGroup(op) => self.resolve_take_group(op),
            RelationalPlan::TakeCogroup(op) => self.resolve_take_cogroup(op),
            RelationalPlan::Offer(op) => self.resolve_offer(op),
            RelationalPlan::JoinGroup(op) => self.resolve_join_group(op),
            RelationalPlan::AggregateGroup(op) => self.resolve_aggregate_group(op),
            RelationalPlan::IntersectionGroup(_)
            | RelationalPlan::DifferenceGroup(_)
            | RelationalPlan::Flatten(_) => Ok(true),
        }
    }

    fn resolve_scan(&mut self, op: &Scan) -> AnalyzerResult<bool> {
        if !self.resolve_read_like(&op.columns)? {
            return Ok(false);
        }
        if self.validate {
            if !self.validate_keys(&op.upper.keys, true)? {
                return Ok(false);
            }
            if !self.validate_keys(&op.lower.keys, true)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_find(&mut self, op: &Find) -> AnalyzerResult<bool> {
        if !self.resolve_read_like(&op.columns)? {
            return Ok(false);
        }
        if self.validate && !self.validate_keys(&op.keys, false)? {
            return Ok(false);
        }
        Ok(true)
    }

    fn resolve_values(&mut self, op: &Values) -> AnalyzerResult<bool> {
        for row in &op.rows {
            if op.columns.len() < row.len() {
                let region = row[op.columns.len()].region();
                self.report(Diagnostic::new(
                    DiagnosticCode::InconsistentElements,
                    "too many values",
                    region,
                ));
                return Ok(false);
            }
            if op.columns.len() > row.len() {
                let region = row.last().and_then(ScalarExpr::region);
                self.report(Diagnostic::new(
                    DiagnosticCode::InconsistentElements,
                    "too short values",
                    region,
                ));
                return Ok(false);
            }
        }

        // no rows: every column becomes unknown
        if op.rows.is_empty() {
            for column in &op.columns {
                self.variables.bind(
                    column,
                    VariableResolution::Unknown(self.repo.get(DataType::Unknown)),
                    true,
                )?;
            }
            return Ok(true);
        }

        if op.rows.len() == 1 {
            for (column, value) in op.columns.iter().zip(op.rows[0].iter()) {
                let source = self.resolve_scalar(value)?;
                if self.is_unresolved_or_error(Some(&source)) {
                    return Ok(false);
                }
                self.variables.bind(
                    column,
                    VariableResolution::ScalarExpression(value.id()),
                    true,
                )?;
            }
            return Ok(true);
        }

        for (index, column) in op.columns.iter().enumerate() {
            let mut current: Option<Arc<DataType>> = None;
            for row in &op.rows {
                let value = &row[index];
                let next = self.resolve_scalar(value)?;
                if self.is_unresolved_or_error(Some(&next)) {
                    return Ok(false);
                }
                current = match current {
                    None => Some(next),
                    Some(current_type) => {
                        let unified = unifying_conversion(&current_type, &next, self.repo);
                        if unified.category() == TypeCategory::Unresolved {
                            self.report_expected(
                                DiagnosticCode::InconsistentType,
                                value.region(),
                                &next,
                                &[current_type.category()],
                            );
                            return Ok(false);
                        }
                        Some(unified)
                    }
                };
            }
            if let Some(current) = current {
                self.variables
                    .bind(column, VariableResolution::Unknown(current), true)?;
            }
        }
        Ok(true)
    }

    fn resolve_join(&mut self, op: &Join) -> AnalyzerResult<bool> {
        if self.validate && !self.validate_condition(op.condition.as_ref())? {
            return Ok(false);
        }
        Ok(true)
    }

    fn resolve_join_find(&mut self, op: &JoinFind) -> AnalyzerResult<bool> {
        let resolved = match &op.source {
            crate::plan::relational::RelationSource::Index(_) => {
                self.resolve_read_like(&op.columns)?
            }
            crate::plan::relational::RelationSource::Exchange(_) => {
                self.resolve_exchange_columns(&op.columns)?
            }
        };
        if !resolved {
            return Ok(false);
        }
        if self.validate {
            if !self.validate_broadcast_keys(&op.keys)? {
                return Ok(false);
            }
            if !self.validate_condition(op.condition.as_ref())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_join_scan(&mut self, op: &JoinScan) -> AnalyzerResult<bool> {
        let resolved = match &op.source {
            crate::plan::relational::RelationSource::Index(_) => {
                self.resolve_read_like(&op.columns)?
            }
            crate::plan::relational::RelationSource::Exchange(_) => {
                self.resolve_exchange_columns(&op.columns)?
            }
        };
        if !resolved {
            return Ok(false);
        }
        if self.validate {
            if !self.validate_broadcast_range_keys(&op.upper.keys)? {
                return Ok(false);
            }
            if !self.validate_broadcast_range_keys(&op.lower.keys)? {
                return Ok(false);
            }
            if !self.validate_condition(op.condition.as_ref())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Keys of a probing join may address table columns or exchange columns.
    fn validate_broadcast_keys(&mut self, keys: &[SearchKey]) -> AnalyzerResult<bool> {
        self.validate_probe_keys(keys, false)
    }

    fn validate_broadcast_range_keys(&mut self, keys: &[SearchKey]) -> AnalyzerResult<bool> {
        self.validate_probe_keys(keys, true)
    }

    fn validate_probe_keys(&mut self, keys: &[SearchKey], range: bool) -> AnalyzerResult<bool> {
        let count = keys.len();
        for (index, key) in keys.iter().enumerate() {
            let resolution = match key.variable.kind() {
                VariableKind::ExchangeColumn => self.resolve_exchange_column(&key.variable)?,
                _ => self.resolve_external_relation_column(&key.variable)?,
            };
            let variable_type = self.inspect(&resolution);
            let value_type = self.resolve_scalar(&key.value)?;
            if self.is_unresolved_or_error(variable_type.as_ref())
                || self.is_unresolved_or_error(Some(&value_type))
            {
                return Ok(false);
            }
            let variable_type = variable_type.unwrap_or_else(shared_error);
            if is_assignment_convertible(&value_type, &variable_type) != Ternary::Yes {
                self.report_expected(
                    DiagnosticCode::InconsistentType,
                    key.value.region(),
                    &value_type,
                    &[variable_type.category()],
                );
                return Ok(false);
            }
            if !self.validate_equality_comparable(&value_type, key.value.region()) {
                return Ok(false);
            }
            if range
                && index + 1 == count
                && !self.validate_order_comparable(&value_type, key.value.region())
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_project(&mut self, op: &Project) -> AnalyzerResult<bool> {
        for column in &op.columns {
            let source = self.resolve_scalar(&column.value)?;
            if source.is_error() {
                return Ok(false);
            }
            self.variables.bind(
                &column.variable,
                VariableResolution::ScalarExpression(column.value.id()),
                true,
            )?;
        }
        Ok(true)
    }

    fn resolve_filter(&mut self, op: &Filter) -> AnalyzerResult<bool> {
        if self.validate {
            return self.validate_condition(Some(&op.condition));
        }
        Ok(true)
    }

    fn resolve_identify(&mut self, op: &Identify) -> AnalyzerResult<bool> {
        self.variables.bind(
            &op.variable,
            VariableResolution::Unknown(Arc::clone(&op.row_id_type)),
            true,
        )?;
        Ok(true)
    }

    fn resolve_aggregate(&mut self, op: &Aggregate) -> AnalyzerResult<bool> {
        if self.validate && !self.validate_group_keys(&op.group_keys)? {
            return Ok(false);
        }
        self.resolve_aggregate_columns(&op.columns)
    }

    fn resolve_distinct(&mut self, op: &Distinct) -> AnalyzerResult<bool> {
        if self.validate {
            return self.validate_group_keys(&op.group_keys);
        }
        Ok(true)
    }

    fn resolve_limit(&mut self, op: &Limit) -> AnalyzerResult<bool> {
        if self.validate {
            if !self.validate_group_keys(&op.group_keys)? {
                return Ok(false);
            }
            if !self.validate_sort_keys(&op.sort_keys)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_union(&mut self, op: &Union) -> AnalyzerResult<bool> {
        for mapping in &op.mappings {
            match (&mapping.left, &mapping.right) {
                (Some(left), Some(right)) => {
                    let left_resolution = self.resolve_stream_column(left, None)?;
                    let right_resolution = self.resolve_stream_column(right, None)?;
                    let left_type = self.inspect(&left_resolution);
                    let right_type = self.inspect(&right_resolution);
                    if self.is_unresolved_or_error(left_type.as_ref())
                        || self.is_unresolved_or_error(right_type.as_ref())
                    {
                        return Ok(false);
                    }
                    let left_type = left_type.unwrap_or_else(shared_error);
                    let right_type = right_type.unwrap_or_else(shared_error);
                    let unified = unifying_conversion(&left_type, &right_type, self.repo);
                    if unified.is_error() {
                        self.report_expected(
                            DiagnosticCode::InconsistentType,
                            None,
                            &right_type,
                            &[left_type.category()],
                        );
                        return Ok(false);
                    }
                    if op.quantifier == SetQuantifier::Distinct
                        && !self.validate_equality_comparable(&unified, None)
                    {
                        return Ok(false);
                    }
                    self.variables.bind(
                        &mapping.destination,
                        VariableResolution::Unknown(unified),
                        true,
                    )?;
                }
                (Some(side), None) | (None, Some(side)) => {
                    let resolution = self.resolve_stream_column(side, None)?;
                    if self.is_unresolved_or_error_resolution(&resolution) {
                        return Ok(false);
                    }
                    if op.quantifier == SetQuantifier::Distinct {
                        if let Some(ty) = self.inspect(&resolution) {
                            // diagnose but still bind the destination
                            self.validate_equality_comparable(&ty, None);
                        }
                    }
                    self.variables
                        .bind(&mapping.destination, resolution, true)?;
                }
                (None, None) => {
                    self.report(Diagnostic::new(
                        DiagnosticCode::Unknown,
                        "union mapping has no source",
                        None,
                    ));
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn resolve_emit(&mut self, op: &Emit) -> AnalyzerResult<bool> {
        if self.validate {
            for column in &op.columns {
                let resolution = self.resolve_stream_column(&column.source, None)?;
                if self.is_unresolved_or_error_resolution(&resolution) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn resolve_write_table(&mut self, op: &WriteTable) -> AnalyzerResult<bool> {
        if self.validate {
            let table = Arc::clone(op.destination.table());
            if !self.validate_table_write(&table, &op.keys)? {
                return Ok(false);
            }
            if !self.validate_table_write(&table, &op.columns)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_take_flat(&mut self, op: &TakeFlat) -> AnalyzerResult<bool> {
        self.resolve_exchange_columns(&op.columns)
    }

    fn resolve_take_group(&mut self, op: &TakeGroup) -> AnalyzerResult<bool> {
        self.resolve_exchange_columns(&op.columns)
    }

    fn resolve_take_cogroup(&mut self, op: &TakeCogroup) -> AnalyzerResult<bool> {
        let mut group_count: Option<usize> = None;
        for group in &op.groups {
            let Some(exchange) = group.source.as_group() else {
                self.report(Diagnostic::new(
                    DiagnosticCode::Unknown,
                    "take_cogroup source must be a group exchange",
                    None,
                ));
                return Ok(false);
            };
            match group_count {
                None => group_count = Some(exchange.group_keys.len()),
                Some(count) if count != exchange.group_keys.len() => {
                    self.report(Diagnostic::new(
                        DiagnosticCode::InconsistentElements,
                        "inconsistent number of group keys",
                        None,
                    ));
                    return Ok(false);
                }
                Some(_) => {}
            }
        }
        let Some(group_count) = group_count else {
            return Ok(true);
        };

        for position in 0..group_count {
            let mut promoted = false;
            let mut current: Option<Arc<DataType>> = None;
            for group in &op.groups {
                let Some(exchange) = group.source.as_group() else {
                    continue;
                };
                let column = &exchange.group_keys[position];
                let resolution = self.variables.find(column).unwrap_or_default();
                let source = self.inspect(&resolution);
                if self.is_unresolved_or_error(source.as_ref()) {
                    return Ok(false);
                }
                let source = source.unwrap_or_else(shared_error);
                current = match current {
                    None => Some(source),
                    Some(current_type) if current_type != source => {
                        let unified = unifying_conversion(&current_type, &source, self.repo);
                        if unified.is_error() {
                            self.report_expected(
                                DiagnosticCode::InconsistentType,
                                None,
                                &source,
                                &[current_type.category()],
                            );
                            return Ok(false);
                        }
                        promoted = true;
                        Some(unified)
                    }
                    current => current,
                };
            }
            if promoted {
                if let Some(current) = current {
                    for group in &op.groups {
                        let Some(exchange) = group.source.as_group() else {
                            continue;
                        };
                        let column = &exchange.group_keys[position];
                        self.variables.bind(
                            column,
                            VariableResolution::Unknown(Arc::clone(&current)),
                            true,
                        )?;
                    }
                }
            }
        }

        for group in &op.groups {
            if !self.resolve_exchange_columns(&group.columns)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_offer(&mut self, op: &Offer) -> AnalyzerResult<bool> {
        for column in &op.columns {
            let source = self.resolve_stream_column(&column.source, None)?;
            if self.is_unresolved_or_error_resolution(&source) {
                return Ok(false);
            }
            match self.variables.find(&column.destination) {
                None => {
                    // first offer into this exchange column
                    self.variables.bind(&column.destination, source, true)?;
                }
                Some(destination) => {
                    // union-like: merge with the established binding
                    let source_type = self.inspect(&source);
                    let destination_type = self.inspect(&destination);
                    if self.is_unresolved_or_error(source_type.as_ref())
                        || self.is_unresolved_or_error(destination_type.as_ref())
                    {
                        return Ok(false);
                    }
                    let source_type = source_type.unwrap_or_else(shared_error);
                    let destination_type = destination_type.unwrap_or_else(shared_error);
                    let unified = unifying_conversion(&source_type, &destination_type, self.repo);
                    if unified.is_error() {
                        self.report_expected(
                            DiagnosticCode::InconsistentType,
                            None,
                            &source_type,
                            &[destination_type.category()],
                        );
                    }
                    self.variables.bind(
                        &column.destination,
                        VariableResolution::Unknown(unified),
                        true,
                    )?;
                }
            }
        }
        Ok(true)
    }

    fn resolve_join_group(&mut self, op: &JoinGroup) -> AnalyzerResult<bool> {
        if self.validate {
            return self.validate_condition(op.condition.as_ref());
        }
        Ok(true)
    }

    fn resolve_aggregate_group(&mut self, op: &AggregateGroup) -> AnalyzerResult<bool> {
        self.resolve_aggregate_columns(&op.columns)
    }

    // ----------------------------------------------------------------- steps

    pub(crate) fn resolve_step(&mut self, step: &Step) -> AnalyzerResult<bool> {
        match step {
            Step::Process(process) => self.resolve_relation(&process.operators, true),
            Step::Exchange(exchange) => self.resolve_exchange(exchange),
        }
    }

    fn resolve_exchange(&mut self, exchange: &Arc<Exchange>) -> AnalyzerResult<bool> {
        match exchange.kind() {
            ExchangeKind::Forward(ForwardExchange { columns, .. })
            | ExchangeKind::Broadcast(BroadcastExchange { columns }) => {
                if self.validate {
                    for column in columns {
                        self.resolve_exchange_column(column)?;
                    }
                }
                Ok(true)
            }
            ExchangeKind::Group(GroupExchange {
                columns,
                group_keys,
                sort_keys,
                ..
            }) => {
                if self.validate {
                    for column in columns {
                        self.resolve_exchange_column(column)?;
                    }
                    for column in group_keys {
                        if !self.validate_exchange_group_column(column)? {
                            return Ok(false);
                        }
                    }
                    for key in sort_keys {
                        if !self.validate_exchange_sort_column(&key.variable)? {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
            ExchangeKind::Aggregate(AggregateExchange {
                source_columns,
                group_keys,
                aggregations,
            }) => {
                if !self.resolve_aggregate_exchange_columns(aggregations)? {
                    return Ok(false);
                }
                if self.validate {
                    for column in source_columns {
                        self.resolve_exchange_column(column)?;
                    }
                    for column in group_keys {
                        if !self.validate_exchange_group_column(column)? {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
            ExchangeKind::Discard => Ok(true),
        }
    }

    /// Aggregation columns of an aggregate exchange read exchange columns.
    fn resolve_aggregate_exchange_columns(
        &mut self,
        columns: &[AggregateColumn],
    ) -> AnalyzerResult<bool> {
        for column in columns {
            if self.validate {
                if column.function.parameter_types().len() != column.arguments.len() {
                    return Ok(false);
                }
                let parameters: Vec<Arc<DataType>> = column.function.parameter_types().to_vec();
                for (argument, parameter) in column.arguments.iter().zip(parameters) {
                    let resolution = self.resolve_exchange_column(argument)?;
                    let Some(ty) = self.inspect(&resolution) else {
                        return Ok(false);
                    };
                    if ty.is_error() {
                        return Ok(false);
                    }
                    if is_assignment_convertible(&ty, &parameter) == Ternary::No {
                        self.report_expected(
                            DiagnosticCode::InconsistentType,
                            None,
                            &parameter,
                            &[parameter.category()],
                        );
                        return Ok(false);
                    }
                }
            }
            self.variables.bind(
                &column.destination,
                VariableResolution::Aggregation(Arc::clone(&column.function)),
                true,
            )?;
        }
        Ok(true)
    }

    fn validate_exchange_group_column(
        &mut self,
        variable: &VariableDescriptor,
    ) -> AnalyzerResult<bool> {
        let resolution = self.resolve_exchange_column(variable)?;
        if !resolution.is_resolved() {
            return Ok(self.allow_unresolved);
        }
        let Some(ty) = self.inspect(&resolution) else {
            return Ok(self.allow_unresolved);
        };
        if ty.is_error() {
            return Ok(false);
        }
        Ok(self.validate_equality_comparable(&ty, None))
    }

    fn validate_exchange_sort_column(
        &mut self,
        variable: &VariableDescriptor,
    ) -> AnalyzerResult<bool> {
        let resolution = self.resolve_exchange_column(variable)?;
        if !resolution.is_resolved() {
            return Ok(self.allow_unresolved);
        }
        let Some(ty) = self.inspect(&resolution) else {
            return Ok(self.allow_unresolved);
        };
        if ty.is_error() {
            return Ok(false);
        }
        Ok(self.validate_order_comparable(&ty, None))
    }

    pub(crate) fn resolve_step_graph(&mut self, graph: &StepGraph) -> AnalyzerResult<bool> {
        for step in graph.sort_from_upstream() {
            if !self.resolve_step(step)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ------------------------------------------------------------ statements

    pub(crate) fn resolve_statement(&mut self, statement: &Statement) -> AnalyzerResult<bool> {
        match statement {
            Statement::Execute(graph) => self.resolve_step_graph(graph),
            Statement::Write(stmt) => self.resolve_write_statement(stmt),
            Statement::CreateTable(stmt) => self.resolve_create_table(stmt),
            Statement::CreateIndex(stmt) => self.resolve_create_index(stmt),
            Statement::DropTable(_)
            | Statement::DropIndex(_)
            | Statement::GrantTable(_)
            | Statement::RevokeTable(_)
            | Statement::Empty => Ok(true),
        }
    }

    fn resolve_write_statement(&mut self, stmt: &WriteStatement) -> AnalyzerResult<bool> {
        if !self.validate {
            return Ok(true);
        }
        let table = Arc::clone(stmt.destination.table());
        for tuple in &stmt.tuples {
            if stmt.columns.len() < tuple.len() {
                let region = tuple[stmt.columns.len()].region();
                self.report(Diagnostic::new(
                    DiagnosticCode::InconsistentElements,
                    "too many values",
                    region,
                ));
                return Ok(false);
            }
            if stmt.columns.len() > tuple.len() {
                let region = tuple.last().and_then(ScalarExpr::region);
                self.report(Diagnostic::new(
                    DiagnosticCode::InconsistentElements,
                    "too short values",
                    region,
                ));
                return Ok(false);
            }
        }
        for (index, column) in stmt.columns.iter().enumerate() {
            let destination = self.resolve_table_column(column)?;
            let column_declaration = destination
                .as_table_column()
                .cloned()
                .ok_or_else(|| AnalyzerError::InvalidTableColumn {
                    column: column.to_string(),
                })?;
            if !table.owns_column(&column_declaration) {
                return Err(AnalyzerError::InvalidTableColumn {
                    column: column.to_string(),
                });
            }
            for tuple in &stmt.tuples {
                let source = self.resolve_scalar(&tuple[index])?;
                if !self.is_unresolved_or_error(Some(&source))
                    && is_assignment_convertible(&source, column_declaration.data_type())
                        != Ternary::Yes
                {
                    self.report_expected(
                        DiagnosticCode::InconsistentType,
                        tuple[index].region(),
                        &source,
                        &[column_declaration.data_type().category()],
                    );
                }
            }
        }
        Ok(true)
    }

    fn resolve_create_table(&mut self, stmt: &CreateTable) -> AnalyzerResult<bool> {
        if !self.validate {
            return Ok(true);
        }
        let mut success = true;
        for column in stmt.definition.columns() {
            match column.default_value() {
                ColumnValue::None => {}
                ColumnValue::Immediate(value) => {
                    if let Some(vtype) = value.natural_type(column.data_type(), self.repo) {
                        if is_assignment_convertible(&vtype, column.data_type()) != Ternary::Yes {
                            self.report(Diagnostic::new(
                                DiagnosticCode::InconsistentType,
                                format!(
                                    "column \"{}\" has inconsistent type for its default value",
                                    column.name()
                                ),
                                None,
                            ));
                            success = false;
                        }
                    }
                }
                ColumnValue::Sequence(_) => {
                    if !matches!(column.data_type().as_ref(), DataType::Int4 | DataType::Int8) {
                        self.report(Diagnostic::new(
                            DiagnosticCode::InconsistentType,
                            format!(
                                "column \"{}\" must be more than 32-bit int for storing sequence values",
                                column.name()
                            ),
                            None,
                        ));
                        success = false;
                    }
                }
                ColumnValue::Function(function) => {
                    if !function.parameter_types().is_empty() {
                        self.report(Diagnostic::new(
                            DiagnosticCode::InconsistentElements,
                            "function call for default value must not have any arguments",
                            None,
                        ));
                        success = false;
                    }
                    if is_assignment_convertible(function.return_type(), column.data_type())
                        != Ternary::Yes
                    {
                        self.report(Diagnostic::new(
                            DiagnosticCode::InconsistentType,
                            format!(
                                "function \"{}\" has inconsistent type ({}) for the column \"{}\" ({})",
                                function.name(),
                                function.return_type(),
                                column.name(),
                                column.data_type()
                            ),
                            None,
                        ));
                        success = false;
                    }
                }
            }
        }
        if let Some(primary_key) = &stmt.primary_key {
            if !self.validate_index_keys(primary_key, "primary key") {
                success = false;
            }
        }
        Ok(success)
    }

    fn resolve_create_index(&mut self, stmt: &CreateIndex) -> AnalyzerResult<bool> {
        if !self.validate {
            return Ok(true);
        }
        Ok(self.validate_index_keys(&stmt.definition, "index key"))
    }

    fn validate_index_keys(&mut self, index: &Arc<IndexDeclaration>, label: &str) -> bool {
        let mut success = true;
        for key in index.keys() {
            if index.features().scan {
                if !is_order_comparable(key.column.data_type()) {
                    self.report(Diagnostic::new(
                        DiagnosticCode::UnsupportedType,
                        format!(
                            "{label} must be order comparable: {}.{} ({})",
                            index.table().name(),
                            key.column.name(),
                            key.column.data_type()
                        ),
                        None,
                    ));
                    success = false;
                }
            } else if index.features().find && !is_equality_comparable(key.column.data_type()) {
                self.report(Diagnostic::new(
                    DiagnosticCode::UnsupportedType,
                    format!(
                        "{label} must be equality comparable: {}.{} ({})",
                        index.table().name(),
                        key.column.name(),
                        key.column.data_type()
                    ),
                    None,
                ));
                success = false;
            }
        }
        success
    }
}
