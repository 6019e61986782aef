//! Value sources and arithmetic.

use crate::graph::PortDescriptor;
use crate::types::DataType;
use crate::value::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOp {
    /// Passes numbers through; usually fed by user data.
    Number,
    /// Passes strings through; usually fed by user data.
    Text,
    /// Arithmetic series: start, step, count.
    Series,
    Add,
    Subtract,
}

impl ValueOp {
    pub fn inputs(&self) -> Vec<PortDescriptor> {
        match self {
            ValueOp::Number => vec![PortDescriptor::input("N", DataType::Number).optional()],
            ValueOp::Text => vec![PortDescriptor::input("S", DataType::String).optional()],
            ValueOp::Series => vec![
                PortDescriptor::input("S", DataType::Number)
                    .with_default(0)
                    .describe("First number"),
                PortDescriptor::input("N", DataType::Number)
                    .with_default(1)
                    .describe("Step"),
                PortDescriptor::input("C", DataType::Number)
                    .with_default(10)
                    .describe("Count"),
            ],
            ValueOp::Add | ValueOp::Subtract => vec![
                PortDescriptor::input("A", DataType::Number),
                PortDescriptor::input("B", DataType::Number),
            ],
        }
    }

    pub fn outputs(&self) -> Vec<PortDescriptor> {
        match self {
            ValueOp::Number => vec![PortDescriptor::output("N", DataType::Number).rearranging()],
            ValueOp::Text => vec![PortDescriptor::output("S", DataType::String).rearranging()],
            ValueOp::Series => vec![PortDescriptor::output("S", DataType::Number).list()],
            ValueOp::Add | ValueOp::Subtract => vec![PortDescriptor::output("N", DataType::Number)],
        }
    }

    pub fn calculate(&self, args: &[Value]) -> std::result::Result<Record, String> {
        let number = |i: usize, name: &str| {
            args.get(i)
                .and_then(Value::as_f64)
                .ok_or_else(|| format!("{} is not a number", name))
        };
        let (name, value) = match self {
            ValueOp::Number => ("N", Value::from(number(0, "N")?)),
            ValueOp::Text => {
                let text = match args.first() {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => return Err("S is empty".to_string()),
                    Some(other) => other.to_string(),
                };
                ("S", Value::from(text))
            }
            ValueOp::Series => {
                let start = number(0, "S")?;
                let step = number(1, "N")?;
                let count = number(2, "C")?.max(0.0).trunc() as usize;
                let series: Vec<Value> = (0..count)
                    .map(|i| Value::from(start + step * i as f64))
                    .collect();
                ("S", Value::List(series))
            }
            ValueOp::Add => ("N", Value::from(number(0, "A")? + number(1, "B")?)),
            ValueOp::Subtract => ("N", Value::from(number(0, "A")? - number(1, "B")?)),
        };
        let mut record = Record::new();
        record.insert(name.to_string(), value);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series() {
        let args = [Value::from(1), Value::from(0.5), Value::from(3)];
        let record = ValueOp::Series.calculate(&args).unwrap();
        assert_eq!(
            record["S"],
            Value::List(vec![Value::from(1.0), Value::from(1.5), Value::from(2.0)])
        );
    }

    #[test]
    fn test_arithmetic() {
        let args = [Value::from(5), Value::from(2)];
        assert_eq!(ValueOp::Add.calculate(&args).unwrap()["N"], Value::from(7.0));
        assert_eq!(ValueOp::Subtract.calculate(&args).unwrap()["N"], Value::from(3.0));

        let err = ValueOp::Add
            .calculate(&[Value::from("five"), Value::from(2)])
            .unwrap_err();
        assert_eq!(err, "A is not a number");
    }

    #[test]
    fn test_text_stringifies_numbers() {
        let record = ValueOp::Text.calculate(&[Value::from(4)]).unwrap();
        assert_eq!(record["S"], Value::from("4"));
    }
}
