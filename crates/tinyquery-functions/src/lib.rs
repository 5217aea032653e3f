//! The built-in function inventory: every scalar, operator, and aggregate
//! function the compiler can resolve a name to, plus the `Function`
//! trait family (see [`core`]) that both compiler and evaluator drive
//! through.

mod aggregate;
mod core;
mod error;
mod flatten;
mod json;
mod operators;
mod scalar;
mod timestamp;

use std::collections::HashMap;
use std::sync::OnceLock;

pub use core::{ensure_literal, Aggregate, AggregateImpl, Function, Scalar, ScalarImpl};
pub use error::{RuntimeError, TypeError};
pub use timestamp::NoArgKind;

/// Constructs a fresh no-arg timestamp function bound to a specific instant;
/// callers (the evaluator, ultimately driven by a job's run time) supply
/// `now` rather than the registry reaching for the system clock itself.
pub fn no_arg_function(kind: NoArgKind, now: chrono::DateTime<chrono::Utc>) -> Box<dyn Function> {
    Box::new(Scalar(timestamp::NoArgFunction { kind, now }))
}

fn functions() -> &'static HashMap<&'static str, Box<dyn Function>> {
    static FUNCTIONS: OnceLock<HashMap<&'static str, Box<dyn Function>>> = OnceLock::new();
    FUNCTIONS.get_or_init(|| {
        let mut m: HashMap<&'static str, Box<dyn Function>> = HashMap::new();

        m.insert("abs", Box::new(Scalar(scalar::AbsFunction)));
        m.insert("floor", Box::new(Scalar(scalar::FloorFunction)));
        m.insert("integer", Box::new(Scalar(scalar::IntegerCastFunction)));
        m.insert("ln", Box::new(Scalar(scalar::LogFunction(scalar::LogBase::Natural))));
        m.insert("log", Box::new(Scalar(scalar::LogFunction(scalar::LogBase::Natural))));
        m.insert("log10", Box::new(Scalar(scalar::LogFunction(scalar::LogBase::Base(10.0)))));
        m.insert("log2", Box::new(Scalar(scalar::LogFunction(scalar::LogBase::Base(2.0)))));
        m.insert("pow", Box::new(Scalar(scalar::PowFunction)));
        m.insert("rand", Box::new(Scalar(scalar::RandFunction)));
        m.insert("hash", Box::new(Scalar(scalar::HashFunction)));
        m.insert("least", Box::new(Scalar(scalar::NumericArgReduceFunction(scalar::Reduce::Least))));
        m.insert("greatest", Box::new(Scalar(scalar::NumericArgReduceFunction(scalar::Reduce::Greatest))));

        m.insert("concat", Box::new(Aggregate(aggregate::ConcatAggregateFunction)));
        m.insert("string", Box::new(Scalar(scalar::StringFunction)));
        m.insert("left", Box::new(Scalar(scalar::LeftFunction)));
        m.insert("regexp_match", Box::new(Scalar(scalar::RegexpMatchFunction)));
        m.insert("regexp_extract", Box::new(Scalar(scalar::RegexpExtractFunction)));
        m.insert("regexp_replace", Box::new(Scalar(scalar::RegexpReplaceFunction)));
        m.insert("contains", Box::new(Scalar(operators::ContainsFunction)));
        m.insert("group_concat_unquoted", Box::new(Aggregate(aggregate::GroupConcatUnquotedFunction)));

        m.insert("json_extract", Box::new(Scalar(json::JsonExtractFunction::json())));
        m.insert("json_extract_scalar", Box::new(Scalar(json::JsonExtractFunction::scalar())));

        m.insert("if", Box::new(Scalar(scalar::IfFunction)));
        m.insert("ifnull", Box::new(Scalar(scalar::IfNullFunction)));
        m.insert("coalesce", Box::new(Scalar(scalar::CoalesceFunction)));
        m.insert("in", Box::new(Scalar(scalar::InFunction)));
        m.insert("is_null", Box::new(Scalar(operators::NullCheckOperator(operators::NullCheck::IsNull))));
        m.insert(
            "is_not_null",
            Box::new(Scalar(operators::NullCheckOperator(operators::NullCheck::IsNotNull))),
        );
        m.insert("not", Box::new(Scalar(operators::NotOperator)));

        m.insert("nth", Box::new(Aggregate(scalar::NthFunction)));
        m.insert("first", Box::new(Aggregate(aggregate::FirstFunction)));

        m.insert("sum", Box::new(Aggregate(aggregate::SumFunction)));
        m.insert("min", Box::new(Aggregate(aggregate::MinMaxFunction(aggregate::MinMax::Min))));
        m.insert("max", Box::new(Aggregate(aggregate::MinMaxFunction(aggregate::MinMax::Max))));
        m.insert("count", Box::new(Aggregate(aggregate::CountFunction)));
        m.insert("count_distinct", Box::new(Aggregate(aggregate::CountDistinctFunction)));
        m.insert("avg", Box::new(Aggregate(aggregate::AvgFunction)));
        m.insert("stddev_samp", Box::new(Aggregate(aggregate::StddevSampFunction)));
        m.insert("quantiles", Box::new(Aggregate(aggregate::QuantilesFunction)));

        m.insert("timestamp", Box::new(Scalar(timestamp::TimestampFunction)));
        m.insert("date", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Date))));
        m.insert("day", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Day))));
        m.insert(
            "dayofweek",
            Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::DayOfWeek))),
        );
        m.insert(
            "dayofyear",
            Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::DayOfYear))),
        );
        m.insert("hour", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Hour))));
        m.insert("minute", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Minute))));
        m.insert("month", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Month))));
        m.insert("quarter", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Quarter))));
        m.insert("second", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Second))));
        m.insert("time", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Time))));
        m.insert("year", Box::new(Scalar(timestamp::TimestampExtractFunction(timestamp::Extract::Year))));

        m.insert("format_utc_usec", Box::new(Scalar(timestamp::FormatUtcUsecFunction)));
        m.insert("parse_utc_usec", Box::new(Scalar(timestamp::ParseUtcUsecFunction)));
        m.insert("strftime_utc_usec", Box::new(Scalar(timestamp::StrftimeFunction)));

        m.insert(
            "timestamp_to_msec",
            Box::new(Scalar(timestamp::TimestampToUnitFunction(timestamp::TimeUnit::Millis))),
        );
        m.insert(
            "timestamp_to_sec",
            Box::new(Scalar(timestamp::TimestampToUnitFunction(timestamp::TimeUnit::Seconds))),
        );
        m.insert(
            "timestamp_to_usec",
            Box::new(Scalar(timestamp::TimestampToUnitFunction(timestamp::TimeUnit::Micros))),
        );
        m.insert(
            "msec_to_timestamp",
            Box::new(Scalar(timestamp::UnitToTimestampFunction(timestamp::TimeUnit::Millis))),
        );
        m.insert(
            "sec_to_timestamp",
            Box::new(Scalar(timestamp::UnitToTimestampFunction(timestamp::TimeUnit::Seconds))),
        );
        m.insert(
            "usec_to_timestamp",
            Box::new(Scalar(timestamp::UnitToTimestampFunction(timestamp::TimeUnit::Micros))),
        );

        m.insert("date_add", Box::new(Scalar(timestamp::DateAddFunction)));
        m.insert("datediff", Box::new(Scalar(timestamp::DateDiffFunction)));

        m.insert(
            "utc_usec_to_day",
            Box::new(Scalar(timestamp::TimestampShiftFunction(timestamp::ShiftUnit::Day))),
        );
        m.insert(
            "utc_usec_to_hour",
            Box::new(Scalar(timestamp::TimestampShiftFunction(timestamp::ShiftUnit::Hour))),
        );
        m.insert(
            "utc_usec_to_month",
            Box::new(Scalar(timestamp::TimestampShiftFunction(timestamp::ShiftUnit::Month))),
        );
        m.insert(
            "utc_usec_to_year",
            Box::new(Scalar(timestamp::TimestampShiftFunction(timestamp::ShiftUnit::Year))),
        );
        m.insert(
            "utc_usec_to_week",
            Box::new(Scalar(timestamp::TimestampShiftFunction(timestamp::ShiftUnit::Week))),
        );
        m.insert("week", Box::new(Scalar(timestamp::WeekdayFunction)));

        m
    })
}

fn unary_operators() -> &'static HashMap<&'static str, Box<dyn Function>> {
    static OPS: OnceLock<HashMap<&'static str, Box<dyn Function>>> = OnceLock::new();
    OPS.get_or_init(|| {
        let mut m: HashMap<&'static str, Box<dyn Function>> = HashMap::new();
        m.insert("-", Box::new(Scalar(operators::NegateOperator)));
        m.insert("not", Box::new(Scalar(operators::NotOperator)));
        m.insert("is_null", Box::new(Scalar(operators::NullCheckOperator(operators::NullCheck::IsNull))));
        m.insert(
            "is_not_null",
            Box::new(Scalar(operators::NullCheckOperator(operators::NullCheck::IsNotNull))),
        );
        m
    })
}

fn binary_operators() -> &'static HashMap<&'static str, Box<dyn Function>> {
    static OPS: OnceLock<HashMap<&'static str, Box<dyn Function>>> = OnceLock::new();
    OPS.get_or_init(|| {
        let mut m: HashMap<&'static str, Box<dyn Function>> = HashMap::new();
        m.insert("+", Box::new(Scalar(operators::ArithmeticOperator(operators::ArithOp::Add))));
        m.insert("-", Box::new(Scalar(operators::ArithmeticOperator(operators::ArithOp::Sub))));
        m.insert("*", Box::new(Scalar(operators::ArithmeticOperator(operators::ArithOp::Mul))));
        m.insert("/", Box::new(Scalar(operators::ArithmeticOperator(operators::ArithOp::Div))));
        m.insert("%", Box::new(Scalar(operators::ArithmeticOperator(operators::ArithOp::Mod))));
        m.insert("=", Box::new(Scalar(operators::ComparisonOperator(operators::Cmp::Eq))));
        m.insert("!=", Box::new(Scalar(operators::ComparisonOperator(operators::Cmp::Ne))));
        m.insert(">", Box::new(Scalar(operators::ComparisonOperator(operators::Cmp::Gt))));
        m.insert("<", Box::new(Scalar(operators::ComparisonOperator(operators::Cmp::Lt))));
        m.insert(">=", Box::new(Scalar(operators::ComparisonOperator(operators::Cmp::Ge))));
        m.insert("<=", Box::new(Scalar(operators::ComparisonOperator(operators::Cmp::Le))));
        m.insert("and", Box::new(Scalar(operators::BooleanOperator(operators::BoolOp::And))));
        m.insert("or", Box::new(Scalar(operators::BooleanOperator(operators::BoolOp::Or))));
        m.insert("contains", Box::new(Scalar(operators::ContainsFunction)));
        m
    })
}

/// Functions that require grouped, rather than per-row, evaluation. This is
/// a fixed list rather than a query against the registry: a handful of
/// functions (`nth`, `concat`, `least`, `greatest`) skip scalar
/// auto-flattening of repeated args for implementation convenience without
/// being aggregates a bare `SELECT` should implicitly group by.
const AGGREGATE_FUNCTION_NAMES: &[&str] = &[
    "sum",
    "min",
    "max",
    "count",
    "avg",
    "count_distinct",
    "group_concat_unquoted",
    "stddev_samp",
    "quantiles",
    "first",
];

pub fn get_func(name: &str) -> Result<&'static dyn Function, TypeError> {
    functions()
        .get(name)
        .map(|f| f.as_ref())
        .ok_or_else(|| TypeError::UnknownFunction(name.to_string()))
}

pub fn get_unary_op(name: &str) -> Result<&'static dyn Function, TypeError> {
    unary_operators()
        .get(name)
        .map(|f| f.as_ref())
        .ok_or_else(|| TypeError::UnknownFunction(name.to_string()))
}

pub fn get_binary_op(name: &str) -> Result<&'static dyn Function, TypeError> {
    binary_operators()
        .get(name)
        .map(|f| f.as_ref())
        .ok_or_else(|| TypeError::UnknownFunction(name.to_string()))
}

pub fn is_aggregate_func(name: &str) -> bool {
    AGGREGATE_FUNCTION_NAMES.contains(&name)
}

/// Looks a function up regardless of which registry it was compiled from.
/// The compiler records only a function's name in the plan (see
/// `tinyquery-plan::Expr::FunctionCall`), so the evaluator needs to resolve
/// it the same way regardless of whether it's a general function, a unary
/// operator, or a binary operator.
pub fn resolve(name: &str) -> Result<&'static dyn Function, TypeError> {
    functions()
        .get(name)
        .or_else(|| unary_operators().get(name))
        .or_else(|| binary_operators().get(name))
        .map(|f| f.as_ref())
        .ok_or_else(|| TypeError::UnknownFunction(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyquery_types::PrimitiveType;

    #[test]
    fn looks_up_scalar_and_aggregate_functions() {
        assert!(!is_aggregate_func("abs"));
        assert!(is_aggregate_func("sum"));
        assert!(is_aggregate_func("first"));
        // concat/nth are evaluated like aggregates (no repeated-field
        // flattening) but don't trigger implicit GROUP BY inference.
        assert!(!is_aggregate_func("concat"));
        assert!(!is_aggregate_func("nth"));
    }

    #[test]
    fn unknown_function_errors() {
        assert!(get_func("not_a_real_function").is_err());
    }

    #[test]
    fn arithmetic_operator_infers_float_when_either_side_is_float() {
        let op = get_binary_op("+").unwrap();
        let result = op.check_types(&[PrimitiveType::Int, PrimitiveType::Float]).unwrap();
        assert_eq!(result, PrimitiveType::Float);
    }
}
