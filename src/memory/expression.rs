use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Timelike, Utc};

use crate::{
    memory::{PipelineError, ValueOrdering},
    value::{DataValue, Document},
};

/// Evaluator for aggregation expressions against one document.
///
/// Strings beginning with `$` are field paths, `$$ROOT` is the whole
/// document, single-key documents whose key starts with `$` are operators and
/// every other value is a literal.
pub struct Expression;

impl Expression {
    pub fn evaluate(expr: &DataValue, root: &Document) -> Result<DataValue, PipelineError> {
        match expr {
            DataValue::Text(text) if text.starts_with('$') => Ok(Self::resolve_path(text, root)),
            DataValue::Array(items) => Ok(DataValue::Array(
                items.iter().map(|item| Self::evaluate(item, root)).collect::<Result<_, _>>()?,
            )),
            DataValue::Document(fields) => {
                if let Some((operator, args)) = Self::operator(fields) {
                    return Self::apply(operator, args, root);
                }
                let mut out = Document::with_capacity(fields.len());
                for (key, value) in fields {
                    out.insert(key.clone(), Self::evaluate(value, root)?);
                }
                Ok(DataValue::Document(out))
            }
            literal => Ok(literal.clone()),
        }
    }

    /// `Some((operator, args))` when `fields` is a single `$op` entry.
    pub fn operator(fields: &Document) -> Option<(&str, &DataValue)> {
        if fields.len() != 1 {
            return None;
        }
        let (key, value) = fields.first()?;
        key.starts_with('$').then_some((key.as_str(), value))
    }

    /// Falsy values are `false`, null and zero.
    pub fn truthy(value: &DataValue) -> bool {
        match value {
            DataValue::Null => false,
            DataValue::Bool(b) => *b,
            DataValue::Int(i) => *i != 0,
            DataValue::Float(f) => *f != 0.0,
            _ => true,
        }
    }

    fn resolve_path(reference: &str, root: &Document) -> DataValue {
        let path = match reference.strip_prefix("$$") {
            Some(variable) => match variable.split_once('.') {
                Some(("ROOT" | "CURRENT", rest)) => rest,
                None if variable == "ROOT" || variable == "CURRENT" => return DataValue::Document(root.clone()),
                _ => return DataValue::Null,
            },
            None => &reference[1..],
        };
        lookup(root, path).cloned().unwrap_or(DataValue::Null)
    }

    fn apply(operator: &str, args: &DataValue, root: &Document) -> Result<DataValue, PipelineError> {
        if operator == "$literal" {
            return Ok(args.clone());
        }
        match operator {
            "$switch" => return Self::switch(args, root),
            "$cond" => return Self::cond(args, root),
            "$dateTrunc" => return Self::date_trunc(args, root),
            _ => {}
        }

        let values = match args {
            DataValue::Array(items) => items.iter().map(|item| Self::evaluate(item, root)).collect::<Result<Vec<_>, _>>()?,
            single => vec![Self::evaluate(single, root)?],
        };

        match operator {
            "$add" => Self::add(&values),
            "$subtract" => Self::subtract(operator, &values),
            "$multiply" => Self::fold_numeric(operator, &values, |a, b| a.checked_mul(b), |a, b| a * b),
            "$divide" => Self::divide(operator, &values),
            "$concat" => Self::concat(operator, &values),
            "$ifNull" => Ok(values.iter().find(|v| !v.is_null()).cloned().unwrap_or_default()),
            "$size" => match Self::single(operator, &values)? {
                DataValue::Array(items) => Ok(DataValue::Int(items.len() as i64)),
                other => Err(PipelineError::expression(operator, format!("expects an array, got {}", other.type_name()))),
            },
            "$toInt" | "$toLong" => Self::to_int(operator, Self::single(operator, &values)?),
            "$toDouble" => Self::to_double(operator, Self::single(operator, &values)?),
            "$toString" => Ok(match Self::single(operator, &values)? {
                DataValue::Null => DataValue::Null,
                other => DataValue::Text(other.to_string()),
            }),
            "$toUpper" | "$toLower" => Ok(match Self::single(operator, &values)? {
                DataValue::Text(s) if operator == "$toUpper" => DataValue::Text(s.to_uppercase()),
                DataValue::Text(s) => DataValue::Text(s.to_lowercase()),
                DataValue::Null => DataValue::Text(String::new()),
                other => DataValue::Text(other.to_string()),
            }),
            "$arrayElemAt" => Self::array_elem_at(operator, &values),
            "$split" => Self::split(operator, &values),
            "$round" => Self::round(operator, &values),
            "$year" | "$month" | "$dayOfMonth" | "$hour" | "$minute" | "$dayOfWeek" => {
                Self::date_part(operator, Self::single(operator, &values)?)
            }
            "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" => Self::compare(operator, &values),
            "$in" => match values.as_slice() {
                [needle, DataValue::Array(haystack)] => {
                    Ok(DataValue::Bool(haystack.iter().any(|v| ValueOrdering::equals(needle, v))))
                }
                _ => Err(PipelineError::expression(operator, "expects [value, array]")),
            },
            "$and" => Ok(DataValue::Bool(values.iter().all(Self::truthy))),
            "$or" => Ok(DataValue::Bool(values.iter().any(Self::truthy))),
            "$not" => Ok(DataValue::Bool(!Self::truthy(Self::single(operator, &values)?))),
            other => Err(PipelineError::UnknownOperator(other.to_string())),
        }
    }

    fn single<'a>(operator: &str, values: &'a [DataValue]) -> Result<&'a DataValue, PipelineError> {
        match values {
            [one] => Ok(one),
            _ => Err(PipelineError::expression(operator, format!("takes one argument, got {}", values.len()))),
        }
    }

    fn pair<'a>(operator: &str, values: &'a [DataValue]) -> Result<(&'a DataValue, &'a DataValue), PipelineError> {
        match values {
            [a, b] => Ok((a, b)),
            _ => Err(PipelineError::expression(operator, format!("takes two arguments, got {}", values.len()))),
        }
    }

    fn add(values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let mut instant: Option<DateTime<Utc>> = None;
        let mut numbers = Vec::with_capacity(values.len());
        for value in values {
            match value {
                DataValue::Null => return Ok(DataValue::Null),
                v if ValueOrdering::instant(v).is_some() => {
                    if instant.is_some() {
                        return Err(PipelineError::expression("$add", "only one date is allowed"));
                    }
                    instant = ValueOrdering::instant(v);
                }
                v => numbers.push(v.clone()),
            }
        }
        let sum = Self::fold_numeric("$add", &numbers, |a, b| a.checked_add(b), |a, b| a + b)?;
        match instant {
            Some(ts) => {
                let millis = sum.as_f64().unwrap_or(0.0) as i64;
                Ok(DataValue::Timestamp(ts + TimeDelta::milliseconds(millis)))
            }
            None => Ok(sum),
        }
    }

    fn subtract(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let (a, b) = Self::pair(operator, values)?;
        if a.is_null() || b.is_null() {
            return Ok(DataValue::Null);
        }
        match (ValueOrdering::instant(a), ValueOrdering::instant(b)) {
            (Some(x), Some(y)) => Ok(DataValue::Int((x - y).num_milliseconds())),
            (Some(x), None) => {
                let millis = b
                    .as_f64()
                    .ok_or_else(|| PipelineError::expression(operator, "cannot subtract a non-number from a date"))?;
                Ok(DataValue::Timestamp(x - TimeDelta::milliseconds(millis as i64)))
            }
            _ => Self::fold_numeric(operator, values, |x, y| x.checked_sub(y), |x, y| x - y),
        }
    }

    fn divide(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let (a, b) = Self::pair(operator, values)?;
        if a.is_null() || b.is_null() {
            return Ok(DataValue::Null);
        }
        match (a.as_f64(), b.as_f64()) {
            (Some(_), Some(d)) if d == 0.0 => Err(PipelineError::expression(operator, "division by zero")),
            (Some(n), Some(d)) => Ok(DataValue::Float(n / d)),
            _ => Err(PipelineError::expression(operator, "only supports numeric types")),
        }
    }

    /// Integer arithmetic while every operand is an integer and nothing
    /// overflows, floating point otherwise.
    fn fold_numeric(
        operator: &str,
        values: &[DataValue],
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<DataValue, PipelineError> {
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            return Ok(DataValue::Int(0));
        };
        let mut acc = first.clone();
        for value in iter {
            acc = match (&acc, value) {
                (DataValue::Null, _) | (_, DataValue::Null) => return Ok(DataValue::Null),
                (DataValue::Int(a), DataValue::Int(b)) => match int_op(*a, *b) {
                    Some(r) => DataValue::Int(r),
                    None => DataValue::Float(float_op(*a as f64, *b as f64)),
                },
                (a, b) => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => DataValue::Float(float_op(x, y)),
                    _ => return Err(PipelineError::expression(operator, "only supports numeric types")),
                },
            };
        }
        if !(acc.is_numeric() || acc.is_null()) {
            return Err(PipelineError::expression(operator, "only supports numeric types"));
        }
        Ok(acc)
    }

    fn concat(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let mut out = String::new();
        for value in values {
            match value {
                DataValue::Null => return Ok(DataValue::Null),
                DataValue::Text(s) => out.push_str(s),
                other => {
                    return Err(PipelineError::expression(operator, format!("only supports strings, got {}", other.type_name())));
                }
            }
        }
        Ok(DataValue::Text(out))
    }

    fn to_int(operator: &str, value: &DataValue) -> Result<DataValue, PipelineError> {
        match value {
            DataValue::Null => Ok(DataValue::Null),
            DataValue::Int(i) => Ok(DataValue::Int(*i)),
            DataValue::Float(f) => Ok(DataValue::Int(f.trunc() as i64)),
            DataValue::Bool(b) => Ok(DataValue::Int(i64::from(*b))),
            DataValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(DataValue::Int)
                .map_err(|_| PipelineError::expression(operator, format!("cannot convert `{s}` to an integer"))),
            other => Err(PipelineError::expression(operator, format!("cannot convert {}", other.type_name()))),
        }
    }

    fn to_double(operator: &str, value: &DataValue) -> Result<DataValue, PipelineError> {
        match value {
            DataValue::Null => Ok(DataValue::Null),
            DataValue::Bool(b) => Ok(DataValue::Float(if *b { 1.0 } else { 0.0 })),
            DataValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(DataValue::Float)
                .map_err(|_| PipelineError::expression(operator, format!("cannot convert `{s}` to a double"))),
            other => other
                .as_f64()
                .map(DataValue::Float)
                .ok_or_else(|| PipelineError::expression(operator, format!("cannot convert {}", other.type_name()))),
        }
    }

    fn array_elem_at(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let (array, index) = Self::pair(operator, values)?;
        let (DataValue::Array(items), Some(index)) = (array, index.as_i64()) else {
            if array.is_null() {
                return Ok(DataValue::Null);
            }
            return Err(PipelineError::expression(operator, "expects [array, integer]"));
        };
        let position = if index < 0 { items.len() as i64 + index } else { index };
        Ok(usize::try_from(position).ok().and_then(|p| items.get(p)).cloned().unwrap_or_default())
    }

    fn split(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        match Self::pair(operator, values)? {
            (DataValue::Null, _) => Ok(DataValue::Null),
            (DataValue::Text(text), DataValue::Text(delimiter)) if !delimiter.is_empty() => Ok(DataValue::Array(
                text.split(delimiter.as_str()).map(|part| DataValue::Text(part.to_string())).collect(),
            )),
            _ => Err(PipelineError::expression(operator, "expects [string, non-empty delimiter]")),
        }
    }

    fn round(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let (number, places) = match values {
            [n] => (n, 0),
            [n, p] => (n, p.as_i64().unwrap_or(0)),
            _ => return Err(PipelineError::expression(operator, "expects [number, places]")),
        };
        match number {
            DataValue::Null => Ok(DataValue::Null),
            DataValue::Int(i) => Ok(DataValue::Int(*i)),
            other => {
                let value = other.as_f64().ok_or_else(|| PipelineError::expression(operator, "only supports numeric types"))?;
                let factor = 10f64.powi(places as i32);
                Ok(DataValue::Float((value * factor).round() / factor))
            }
        }
    }

    fn compare(operator: &str, values: &[DataValue]) -> Result<DataValue, PipelineError> {
        let (a, b) = Self::pair(operator, values)?;
        let ord = ValueOrdering::compare(a, b);
        let result = match operator {
            "$eq" => ord.is_eq(),
            "$ne" => ord.is_ne(),
            "$gt" => ord.is_gt(),
            "$gte" => ord.is_ge(),
            "$lt" => ord.is_lt(),
            _ => ord.is_le(),
        };
        Ok(DataValue::Bool(result))
    }

    fn switch(args: &DataValue, root: &Document) -> Result<DataValue, PipelineError> {
        let spec = args.as_document().ok_or_else(|| PipelineError::expression("$switch", "expects a document"))?;
        let branches = spec
            .get("branches")
            .and_then(DataValue::as_array)
            .ok_or_else(|| PipelineError::expression("$switch", "requires a `branches` array"))?;
        for branch in branches {
            let (Some(case), Some(then)) = (branch.get_path("case"), branch.get_path("then")) else {
                return Err(PipelineError::expression("$switch", "every branch needs `case` and `then`"));
            };
            if Self::truthy(&Self::evaluate(case, root)?) {
                return Self::evaluate(then, root);
            }
        }
        match spec.get("default") {
            Some(default) => Self::evaluate(default, root),
            None => Err(PipelineError::expression("$switch", "no branch matched and no `default` was given")),
        }
    }

    fn cond(args: &DataValue, root: &Document) -> Result<DataValue, PipelineError> {
        let (condition, then, otherwise) = match args {
            DataValue::Array(items) if items.len() == 3 => (&items[0], &items[1], &items[2]),
            DataValue::Document(spec) => match (spec.get("if"), spec.get("then"), spec.get("else")) {
                (Some(i), Some(t), Some(e)) => (i, t, e),
                _ => return Err(PipelineError::expression("$cond", "requires `if`, `then` and `else`")),
            },
            _ => return Err(PipelineError::expression("$cond", "expects [if, then, else]")),
        };
        if Self::truthy(&Self::evaluate(condition, root)?) {
            Self::evaluate(then, root)
        } else {
            Self::evaluate(otherwise, root)
        }
    }

    fn date_trunc(args: &DataValue, root: &Document) -> Result<DataValue, PipelineError> {
        let spec = args.as_document().ok_or_else(|| PipelineError::expression("$dateTrunc", "expects a document"))?;
        let date = match spec.get("date") {
            Some(expr) => Self::evaluate(expr, root)?,
            None => return Err(PipelineError::expression("$dateTrunc", "requires `date`")),
        };
        if date.is_null() {
            return Ok(DataValue::Null);
        }
        let ts = ValueOrdering::instant(&date)
            .ok_or_else(|| PipelineError::expression("$dateTrunc", format!("cannot truncate {}", date.type_name())))?;
        let unit = match spec.get("unit") {
            Some(expr) => Self::evaluate(expr, root)?,
            None => return Err(PipelineError::expression("$dateTrunc", "requires `unit`")),
        };
        let bin = match spec.get("binSize") {
            Some(expr) => Self::evaluate(expr, root)?.as_i64().unwrap_or(1).max(1),
            None => 1,
        };
        let truncated = match unit.as_str() {
            Some("year") => ts.with_ordinal(1).and_then(|d| d.duration_trunc(TimeDelta::days(1)).ok()),
            Some("month") => ts.with_day(1).and_then(|d| d.duration_trunc(TimeDelta::days(1)).ok()),
            Some("week") => {
                let back = TimeDelta::days(ts.weekday().num_days_from_sunday().into());
                (ts - back).duration_trunc(TimeDelta::days(1)).ok()
            }
            Some("day") => ts.duration_trunc(TimeDelta::days(bin)).ok(),
            Some("hour") => ts.duration_trunc(TimeDelta::hours(bin)).ok(),
            Some("minute") => ts.duration_trunc(TimeDelta::minutes(bin)).ok(),
            Some("second") => ts.duration_trunc(TimeDelta::seconds(bin)).ok(),
            _ => return Err(PipelineError::expression("$dateTrunc", format!("unsupported unit {unit}"))),
        };
        truncated
            .map(DataValue::Timestamp)
            .ok_or_else(|| PipelineError::expression("$dateTrunc", "date out of range"))
    }

    fn date_part(operator: &str, value: &DataValue) -> Result<DataValue, PipelineError> {
        if value.is_null() {
            return Ok(DataValue::Null);
        }
        let ts = ValueOrdering::instant(value)
            .ok_or_else(|| PipelineError::expression(operator, format!("expects a date, got {}", value.type_name())))?;
        let part = match operator {
            "$year" => ts.year() as i64,
            "$month" => ts.month() as i64,
            "$dayOfMonth" => ts.day() as i64,
            "$hour" => ts.hour() as i64,
            "$minute" => ts.minute() as i64,
            _ => ts.weekday().number_from_sunday() as i64,
        };
        Ok(DataValue::Int(part))
    }
}

/// Resolves a dotted path inside a document. A numeric segment indexes into
/// an array.
pub fn lookup<'a>(root: &'a Document, path: &str) -> Option<&'a DataValue> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = root.get(head)?;
    match rest {
        Some(rest) => value.get_path(rest),
        None => Some(value),
    }
}
