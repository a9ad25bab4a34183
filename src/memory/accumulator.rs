use std::collections::HashSet;

use crate::{
    memory::{Expression, PipelineError, ValueOrdering},
    value::{DataValue, Document},
};

/// Per-group running state.
///
/// The pipeline evaluates the accumulator's argument for each document of a
/// group, feeds it to `update`, and calls `finalize` once the group is done.
pub trait Accumulator: Send {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError>;

    fn finalize(&self) -> DataValue;
}

/// One `output: { $op: argument }` entry of a `$group` or `$bucket` stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorSpec {
    pub output: String,
    pub operator: String,
    pub argument: DataValue,
}

impl AccumulatorSpec {
    pub fn parse(output: &str, spec: &DataValue) -> Result<Self, PipelineError> {
        let (operator, argument) = spec
            .as_document()
            .and_then(Expression::operator)
            .ok_or_else(|| PipelineError::stage("$group", format!("field `{output}` must be an accumulator object")))?;
        let spec = Self { output: output.to_string(), operator: operator.to_string(), argument: argument.clone() };
        spec.create()?;
        Ok(spec)
    }

    pub fn create(&self) -> Result<Box<dyn Accumulator>, PipelineError> {
        let acc: Box<dyn Accumulator> = match self.operator.as_str() {
            "$sum" => Box::new(SumAcc::default()),
            "$avg" => Box::new(AvgAcc::default()),
            "$min" => Box::new(ExtremeAcc { best: None, want_max: false }),
            "$max" => Box::new(ExtremeAcc { best: None, want_max: true }),
            "$first" => Box::new(FirstAcc(None)),
            "$last" => Box::new(LastAcc(DataValue::Null)),
            "$count" => Box::new(CountAcc(0)),
            "$push" => Box::new(PushAcc(Vec::new())),
            "$addToSet" => Box::new(SetAcc { seen: HashSet::new(), items: Vec::new() }),
            other => return Err(PipelineError::UnknownAccumulator(other.to_string())),
        };
        Ok(acc)
    }

    /// Argument evaluated against one document. `$count` ignores its argument.
    pub fn argument_for(&self, doc: &Document) -> Result<DataValue, PipelineError> {
        if self.operator == "$count" {
            return Ok(DataValue::Null);
        }
        Expression::evaluate(&self.argument, doc)
    }
}

/// Non-numeric inputs are skipped, an empty group sums to 0.
#[derive(Default)]
struct SumAcc {
    int: i64,
    float: f64,
    is_float: bool,
}

impl Accumulator for SumAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        match value {
            DataValue::Int(i) if !self.is_float => match self.int.checked_add(*i) {
                Some(sum) => self.int = sum,
                None => {
                    self.is_float = true;
                    self.float = self.int as f64 + *i as f64;
                }
            },
            DataValue::Int(i) => self.float += *i as f64,
            DataValue::Float(f) => {
                if !self.is_float {
                    self.is_float = true;
                    self.float = self.int as f64;
                }
                self.float += f;
            }
            _ => {}
        }
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        if self.is_float { DataValue::Float(self.float) } else { DataValue::Int(self.int) }
    }
}

#[derive(Default)]
struct AvgAcc {
    sum: f64,
    cnt: i64,
}

impl Accumulator for AvgAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        if let Some(v) = value.as_f64() {
            self.sum += v;
            self.cnt += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        if self.cnt == 0 { DataValue::Null } else { DataValue::Float(self.sum / self.cnt as f64) }
    }
}

struct ExtremeAcc {
    best: Option<DataValue>,
    want_max: bool,
}

impl Accumulator for ExtremeAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        if value.is_null() {
            return Ok(());
        }
        let replace = match &self.best {
            None => true,
            Some(best) => {
                let ord = ValueOrdering::compare(value, best);
                if self.want_max { ord.is_gt() } else { ord.is_lt() }
            }
        };
        if replace {
            self.best = Some(value.clone());
        }
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        self.best.clone().unwrap_or_default()
    }
}

struct FirstAcc(Option<DataValue>);

impl Accumulator for FirstAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        if self.0.is_none() {
            self.0 = Some(value.clone());
        }
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        self.0.clone().unwrap_or_default()
    }
}

struct LastAcc(DataValue);

impl Accumulator for LastAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        self.0 = value.clone();
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        self.0.clone()
    }
}

struct CountAcc(i64);

impl Accumulator for CountAcc {
    fn update(&mut self, _value: &DataValue) -> Result<(), PipelineError> {
        self.0 += 1;
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        DataValue::Int(self.0)
    }
}

struct PushAcc(Vec<DataValue>);

impl Accumulator for PushAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        self.0.push(value.clone());
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        DataValue::Array(self.0.clone())
    }
}

struct SetAcc {
    seen: HashSet<String>,
    items: Vec<DataValue>,
}

impl Accumulator for SetAcc {
    fn update(&mut self, value: &DataValue) -> Result<(), PipelineError> {
        if value.is_null() {
            return Ok(());
        }
        if self.seen.insert(value.canonical_key()) {
            self.items.push(value.clone());
        }
        Ok(())
    }

    fn finalize(&self) -> DataValue {
        DataValue::Array(self.items.clone())
    }
}
