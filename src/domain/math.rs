//! Integer arithmetic service, registered by the server binary as `Math`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rpc::registry::{MethodTable, Service};

/// Missing operands read as zero; lowercase field names are accepted too.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Operands {
    #[serde(alias = "a")]
    pub a: i64,
    #[serde(alias = "b")]
    pub b: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("integer overflow")]
    Overflow,
    #[error("divide by zero")]
    DivideByZero,
}

#[derive(Debug, Default)]
pub struct Math;

impl Math {
    pub fn add(&self, args: Operands, reply: &mut i64) -> Result<(), MathError> {
        *reply = args.a.checked_add(args.b).ok_or(MathError::Overflow)?;
        Ok(())
    }

    pub fn multiply(&self, args: Operands, reply: &mut i64) -> Result<(), MathError> {
        *reply = args.a.checked_mul(args.b).ok_or(MathError::Overflow)?;
        Ok(())
    }

    pub fn divide(&self, args: Operands, reply: &mut i64) -> Result<(), MathError> {
        if args.b == 0 {
            return Err(MathError::DivideByZero);
        }
        *reply = args.a.checked_div(args.b).ok_or(MathError::Overflow)?;
        Ok(())
    }
}

impl Service for Math {
    fn methods(table: &mut MethodTable<Self>) {
        table
            .method("Add", Self::add)
            .method("Multiply", Self::multiply)
            .method("Divide", Self::divide);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        op: fn(&Math, Operands, &mut i64) -> Result<(), MathError>,
        a: i64,
        b: i64,
    ) -> Result<i64, MathError> {
        let mut reply = 0;
        op(&Math, Operands { a, b }, &mut reply)?;
        Ok(reply)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run(Math::add, 2, 3), Ok(5));
        assert_eq!(run(Math::multiply, -4, 3), Ok(-12));
        assert_eq!(run(Math::divide, 7, 2), Ok(3));
    }

    #[test]
    fn failures() {
        assert_eq!(run(Math::add, i64::MAX, 1), Err(MathError::Overflow));
        assert_eq!(run(Math::divide, 1, 0), Err(MathError::DivideByZero));
        assert_eq!(run(Math::divide, i64::MIN, -1), Err(MathError::Overflow));
        assert_eq!(MathError::DivideByZero.to_string(), "divide by zero");
    }

    #[test]
    fn operands_zero_fill_and_accept_lowercase() {
        let decode = |raw: &str| -> (i64, i64) {
            let operands: Operands = serde_json::from_str(raw).expect("decodes");
            (operands.a, operands.b)
        };
        assert_eq!(decode("{}"), (0, 0));
        assert_eq!(decode(r#"{"A":2}"#), (2, 0));
        assert_eq!(decode(r#"{"a":2,"b":3}"#), (2, 3));
        assert_eq!(decode(r#"{"A":4,"B":5,"C":6}"#), (4, 5));
    }
}
