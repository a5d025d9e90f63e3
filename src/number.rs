use std::fmt;

/// A Lox number is either an integer or a float; the tag survives
/// arithmetic and only collapses to float when an operand already is one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    pub fn negate(self) -> Number {
        match self {
            Number::Int(i) => Number::Int(-i),
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a + b),
            _ => Number::Float(self.as_f64() + other.as_f64()),
        }
    }

    pub fn sub(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a - b),
            _ => Number::Float(self.as_f64() - other.as_f64()),
        }
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a * b),
            _ => Number::Float(self.as_f64() * other.as_f64()),
        }
    }

    /// Division always yields a float, and the caller is expected to check
    /// `is_zero` on the divisor first to produce a proper runtime error.
    pub fn div(self, other: Number) -> Number {
        Number::Float(self.as_f64() / other.as_f64())
    }

    pub fn partial_cmp(self, other: Number) -> Option<std::cmp::Ordering> {
        self.as_f64().partial_cmp(&other.as_f64())
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(n) => {
                let text = n.to_string();
                let text = text.strip_suffix(".0").unwrap_or(&text);
                write!(f, "{text}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        let a = Number::Int(3);
        let b = Number::Int(4);
        assert_eq!(a.add(b), Number::Int(7));
        assert_eq!(a.mul(b), Number::Int(12));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let a = Number::Int(3);
        let b = Number::Float(0.5);
        assert_eq!(a.add(b), Number::Float(3.5));
    }

    #[test]
    fn division_always_yields_float() {
        let a = Number::Int(6);
        let b = Number::Int(3);
        assert_eq!(a.div(b), Number::Float(2.0));
    }

    #[test]
    fn float_and_int_print_the_same_when_whole() {
        assert_eq!(Number::Float(2.0).to_string(), "2");
        assert_eq!(Number::Int(2).to_string(), "2");
    }

    #[test]
    fn fractional_float_prints_its_decimal_part() {
        assert_eq!(Number::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn equality_crosses_the_int_float_tag() {
        assert_eq!(Number::Int(3).as_f64(), Number::Float(3.0).as_f64());
    }
}
