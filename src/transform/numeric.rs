use serde_json::Number;
use tracing::warn;

use super::rules::Rule;
use crate::types::Value;

/// A JSON number split into integer and float arithmetic.
///
/// Integer operands stay integers while the result is exact and fits in `i64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn from_number(n: &Number) -> Option<Num> {
        match n.as_i64() {
            Some(i) => Some(Num::Int(i)),
            None => n.as_f64().map(Num::Float),
        }
    }

    /// `None` for NaN and infinities, which JSON cannot carry.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Num::Int(i) => Some(Value::from(i)),
            Num::Float(f) => Number::from_f64(f).map(Value::Number),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn combine(
        self,
        other: Num,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Num {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => match int_op(a, b) {
                Some(exact) => Num::Int(exact),
                None => Num::Float(float_op(a as f64, b as f64)),
            },
            (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
        }
    }

    pub fn mul(self, other: Num) -> Num {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    pub fn add(self, other: Num) -> Num {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, other: Num) -> Num {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    /// True division; `None` for a zero divisor.
    pub fn div(self, other: Num) -> Option<Num> {
        let divisor = other.as_f64();
        (divisor != 0.0).then(|| Num::Float(self.as_f64() / divisor))
    }

    pub fn round(self, decimal_places: i32) -> Num {
        match self {
            Num::Int(i) if decimal_places >= 0 => Num::Int(i),
            Num::Int(i) => Num::Int(round_int_half_even(i, decimal_places.unsigned_abs())),
            Num::Float(f) => Num::Float(round_half_even(f, decimal_places)),
        }
    }

    pub fn abs(self) -> Num {
        match self {
            Num::Int(i) => i.checked_abs().map_or(Num::Float((i as f64).abs()), Num::Int),
            Num::Float(f) => Num::Float(f.abs()),
        }
    }
}

/// Round to `decimal_places` with ties going to the even neighbour.
///
/// Negative places round to tens, hundreds, and so on.
pub fn round_half_even(value: f64, decimal_places: i32) -> f64 {
    if decimal_places >= 0 {
        let factor = 10f64.powi(decimal_places);
        let scaled = value * factor;
        if !scaled.is_finite() {
            return value;
        }
        scaled.round_ties_even() / factor
    } else {
        let factor = 10f64.powi(-decimal_places);
        (value / factor).round_ties_even() * factor
    }
}

fn round_int_half_even(value: i64, digits: u32) -> i64 {
    let Some(unit) = 10i64.checked_pow(digits) else {
        return 0;
    };
    let quotient = value / unit;
    let remainder = value % unit;
    let twice = remainder.unsigned_abs() * 2;
    let unit_abs = unit.unsigned_abs();
    let away = twice > unit_abs || (twice == unit_abs && quotient % 2 != 0);
    let rounded = if away {
        quotient + value.signum()
    } else {
        quotient
    };
    rounded.saturating_mul(unit)
}

pub(crate) fn apply(rule: &Rule, n: Number) -> Value {
    let Some(num) = Num::from_number(&n) else {
        return Value::Number(n);
    };
    let result = match rule {
        Rule::Multiply(factor) => Some(num.mul(*factor)),
        Rule::Add(addend) => Some(num.add(*addend)),
        Rule::Subtract(subtrahend) => Some(num.sub(*subtrahend)),
        Rule::Divide(divisor) => num.div(*divisor),
        Rule::Round { decimal_places } => Some(num.round(*decimal_places)),
        Rule::Absolute => Some(num.abs()),
        _ => None,
    };
    match result.map(Num::into_value) {
        Some(Some(value)) => value,
        Some(None) => {
            warn!(rule = rule.name(), "numeric rule skipped, result is not finite");
            Value::Number(n)
        }
        None => Value::Number(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(value: Value) -> Number {
        match value {
            Value::Number(n) => n,
            other => panic!("not a number: {other}"),
        }
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(apply(&Rule::Multiply(Num::Int(3)), number(json!(5))), json!(15));
        assert_eq!(apply(&Rule::Add(Num::Int(-7)), number(json!(5))), json!(-2));
    }

    #[test]
    fn mixed_arithmetic_becomes_float() {
        assert_eq!(
            apply(&Rule::Multiply(Num::Float(0.5)), number(json!(5))),
            json!(2.5)
        );
    }

    #[test]
    fn divide_by_zero_is_skipped() {
        assert_eq!(apply(&Rule::Divide(Num::Int(0)), number(json!(5))), json!(5));
        assert_eq!(apply(&Rule::Divide(Num::Int(2)), number(json!(5))), json!(2.5));
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(-2.5, 0), -2.0);
        assert_eq!(round_half_even(0.125, 2), 0.12);
        assert_eq!(round_half_even(0.375, 2), 0.38);
        assert_eq!(round_half_even(1234.5678, 2), 1234.57);
        assert_eq!(round_half_even(1250.0, -2), 1200.0);
    }

    #[test]
    fn integer_rounding_with_negative_places() {
        assert_eq!(Num::Int(1250).round(-2), Num::Int(1200));
        assert_eq!(Num::Int(1350).round(-2), Num::Int(1400));
        assert_eq!(Num::Int(-1351).round(-2), Num::Int(-1400));
        assert_eq!(Num::Int(42).round(3), Num::Int(42));
    }

    #[test]
    fn absolute_handles_extremes() {
        assert_eq!(Num::Int(-4).abs(), Num::Int(4));
        assert_eq!(Num::Int(i64::MIN).abs(), Num::Float(9.223372036854776e18));
    }

    #[test]
    fn overflow_falls_back_to_float() {
        assert!(matches!(
            Num::Int(i64::MAX).add(Num::Int(1)),
            Num::Float(_)
        ));
    }
}
