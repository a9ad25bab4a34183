use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::{
    memory::{lookup, Accumulator, AccumulatorSpec, Expression, Matcher, PipelineError, ValueOrdering},
    value::{DataValue, Document},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Computed(DataValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    pub group_by: DataValue,
    pub boundaries: Vec<DataValue>,
    pub default: Option<DataValue>,
    pub output: Vec<AccumulatorSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnwindSpec {
    pub path: String,
    pub preserve_empty: bool,
}

/// One parsed aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Document),
    Project(Vec<(String, ProjectField)>),
    AddFields(Vec<(String, DataValue)>),
    Group { id: DataValue, accumulators: Vec<AccumulatorSpec> },
    Sort(Vec<(String, bool)>),
    Limit(usize),
    Skip(usize),
    ReplaceRoot(DataValue),
    Bucket(BucketSpec),
    Count(String),
    Unwind(UnwindSpec),
}

/// A parsed aggregation pipeline, run over an in-memory set of documents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn parse(stages: &[DataValue]) -> Result<Self, PipelineError> {
        let stages = stages.iter().map(Self::parse_stage).collect::<Result<_, _>>()?;
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run(&self, mut documents: Vec<Document>) -> Result<Vec<Document>, PipelineError> {
        for stage in &self.stages {
            documents = Self::execute_stage(stage, documents)?;
        }
        Ok(documents)
    }

    fn parse_stage(value: &DataValue) -> Result<Stage, PipelineError> {
        let (name, spec) = value
            .as_document()
            .and_then(Expression::operator)
            .ok_or_else(|| PipelineError::stage("pipeline", "each stage must be a single `$stage` document"))?;

        match name {
            "$match" => Ok(Stage::Match(Self::document(name, spec)?.clone())),
            "$project" => Self::parse_project(name, Self::document(name, spec)?),
            "$addFields" | "$set" => Ok(Stage::AddFields(
                Self::document(name, spec)?.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            "$group" => Self::parse_group(Self::document(name, spec)?),
            "$sort" => Self::parse_sort(Self::document(name, spec)?),
            "$limit" => Ok(Stage::Limit(Self::count_arg(name, spec)?)),
            "$skip" => Ok(Stage::Skip(Self::count_arg(name, spec)?)),
            "$replaceRoot" => {
                let new_root = Self::document(name, spec)?
                    .get("newRoot")
                    .ok_or_else(|| PipelineError::stage(name, "requires `newRoot`"))?;
                Ok(Stage::ReplaceRoot(new_root.clone()))
            }
            "$replaceWith" => Ok(Stage::ReplaceRoot(spec.clone())),
            "$bucket" => Self::parse_bucket(Self::document(name, spec)?),
            "$count" => match spec {
                DataValue::Text(field) if !field.is_empty() && !field.starts_with('$') && !field.contains('.') => {
                    Ok(Stage::Count(field.clone()))
                }
                _ => Err(PipelineError::stage(name, "expects a plain field name")),
            },
            "$unwind" => Self::parse_unwind(spec),
            other => Err(PipelineError::UnknownStage(other.to_string())),
        }
    }

    fn document<'a>(stage: &str, spec: &'a DataValue) -> Result<&'a Document, PipelineError> {
        spec.as_document().ok_or_else(|| PipelineError::stage(stage, "expects a document"))
    }

    fn count_arg(stage: &str, spec: &DataValue) -> Result<usize, PipelineError> {
        spec.as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PipelineError::stage(stage, "expects a non-negative integer"))
    }

    fn parse_project(stage: &str, spec: &Document) -> Result<Stage, PipelineError> {
        let mut fields = Vec::with_capacity(spec.len());
        for (key, value) in spec {
            let field = match value {
                DataValue::Bool(true) => ProjectField::Include,
                DataValue::Bool(false) => ProjectField::Exclude,
                DataValue::Int(_) | DataValue::Float(_) => {
                    if value.as_f64().unwrap_or(0.0) != 0.0 { ProjectField::Include } else { ProjectField::Exclude }
                }
                other => ProjectField::Computed(other.clone()),
            };
            fields.push((key.clone(), field));
        }
        let excludes_other_than_id = fields.iter().any(|(k, f)| *f == ProjectField::Exclude && k != "_id");
        let includes = fields.iter().any(|(_, f)| *f != ProjectField::Exclude);
        if excludes_other_than_id && includes {
            return Err(PipelineError::stage(stage, "cannot mix inclusion and exclusion"));
        }
        Ok(Stage::Project(fields))
    }

    fn parse_group(spec: &Document) -> Result<Stage, PipelineError> {
        let id = spec.get("_id").cloned().ok_or_else(|| PipelineError::stage("$group", "requires `_id`"))?;
        let accumulators = spec
            .iter()
            .filter(|(k, _)| k.as_str() != "_id")
            .map(|(k, v)| AccumulatorSpec::parse(k, v))
            .collect::<Result<_, _>>()?;
        Ok(Stage::Group { id, accumulators })
    }

    fn parse_sort(spec: &Document) -> Result<Stage, PipelineError> {
        let keys = spec
            .iter()
            .map(|(k, v)| match v.as_i64() {
                Some(1) => Ok((k.clone(), true)),
                Some(-1) => Ok((k.clone(), false)),
                _ => Err(PipelineError::stage("$sort", format!("direction for `{k}` must be 1 or -1"))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if keys.is_empty() {
            return Err(PipelineError::stage("$sort", "needs at least one key"));
        }
        Ok(Stage::Sort(keys))
    }

    fn parse_bucket(spec: &Document) -> Result<Stage, PipelineError> {
        let group_by = spec.get("groupBy").cloned().ok_or_else(|| PipelineError::stage("$bucket", "requires `groupBy`"))?;
        let boundaries = spec
            .get("boundaries")
            .and_then(DataValue::as_array)
            .cloned()
            .ok_or_else(|| PipelineError::stage("$bucket", "requires a `boundaries` array"))?;
        if boundaries.len() < 2 {
            return Err(PipelineError::stage("$bucket", "needs at least two boundaries"));
        }
        if boundaries.windows(2).any(|w| ValueOrdering::compare(&w[0], &w[1]) != Ordering::Less) {
            return Err(PipelineError::stage("$bucket", "boundaries must be strictly ascending"));
        }
        let output = match spec.get("output") {
            Some(DataValue::Document(fields)) => {
                fields.iter().map(|(k, v)| AccumulatorSpec::parse(k, v)).collect::<Result<Vec<_>, _>>()?
            }
            Some(_) => return Err(PipelineError::stage("$bucket", "`output` must be a document")),
            None => vec![AccumulatorSpec {
                output: "count".into(),
                operator: "$sum".into(),
                argument: DataValue::Int(1),
            }],
        };
        Ok(Stage::Bucket(BucketSpec { group_by, boundaries, default: spec.get("default").cloned(), output }))
    }

    fn parse_unwind(spec: &DataValue) -> Result<Stage, PipelineError> {
        let (path, preserve_empty) = match spec {
            DataValue::Text(path) => (path.clone(), false),
            DataValue::Document(fields) => {
                let path = fields
                    .get("path")
                    .and_then(DataValue::as_str)
                    .ok_or_else(|| PipelineError::stage("$unwind", "requires `path`"))?;
                let preserve = fields.get("preserveNullAndEmptyArrays").is_some_and(Expression::truthy);
                (path.to_string(), preserve)
            }
            _ => return Err(PipelineError::stage("$unwind", "expects a path or a document")),
        };
        let path = path
            .strip_prefix('$')
            .ok_or_else(|| PipelineError::stage("$unwind", "path must start with `$`"))?
            .to_string();
        Ok(Stage::Unwind(UnwindSpec { path, preserve_empty }))
    }

    fn execute_stage(stage: &Stage, documents: Vec<Document>) -> Result<Vec<Document>, PipelineError> {
        match stage {
            Stage::Match(filter) => {
                let mut kept = Vec::with_capacity(documents.len());
                for doc in documents {
                    if Matcher::matches(filter, &doc)? {
                        kept.push(doc);
                    }
                }
                Ok(kept)
            }
            Stage::Project(fields) => documents.iter().map(|doc| Self::project(fields, doc)).collect(),
            Stage::AddFields(fields) => documents
                .into_iter()
                .map(|mut doc| -> Result<Document, PipelineError> {
                    let computed = fields
                        .iter()
                        .map(|(k, expr)| Expression::evaluate(expr, &doc).map(|v| (k, v)))
                        .collect::<Result<Vec<_>, _>>()?;
                    for (key, value) in computed {
                        set_path(&mut doc, key, value);
                    }
                    Ok(doc)
                })
                .collect(),
            Stage::Group { id, accumulators } => Self::group(id, accumulators, documents),
            Stage::Sort(keys) => {
                let mut documents = documents;
                documents.sort_by(|a, b| Self::compare_by_keys(keys, a, b));
                Ok(documents)
            }
            Stage::Limit(n) => Ok(documents.into_iter().take(*n).collect()),
            Stage::Skip(n) => Ok(documents.into_iter().skip(*n).collect()),
            Stage::ReplaceRoot(expr) => documents
                .iter()
                .map(|doc| -> Result<Document, PipelineError> {
                    match Expression::evaluate(expr, doc)? {
                        DataValue::Document(root) => Ok(root),
                        other => Err(PipelineError::stage(
                            "$replaceRoot",
                            format!("`newRoot` must evaluate to a document, got {}", other.type_name()),
                        )),
                    }
                })
                .collect(),
            Stage::Bucket(spec) => Self::bucket(spec, documents),
            Stage::Count(field) => {
                if documents.is_empty() {
                    return Ok(vec![]);
                }
                Ok(vec![Document::from_iter([(field.clone(), DataValue::Int(documents.len() as i64))])])
            }
            Stage::Unwind(spec) => Ok(Self::unwind(spec, documents)),
        }
    }

    /// `_id` is kept unless excluded explicitly.
    fn project(fields: &[(String, ProjectField)], doc: &Document) -> Result<Document, PipelineError> {
        let exclusion_mode = fields.iter().all(|(_, f)| *f == ProjectField::Exclude);
        if exclusion_mode {
            let mut out = doc.clone();
            for (path, _) in fields {
                remove_path(&mut out, path);
            }
            return Ok(out);
        }

        let mut out = Document::new();
        let id_excluded = fields.iter().any(|(k, f)| k == "_id" && *f == ProjectField::Exclude);
        let id_listed = fields.iter().any(|(k, _)| k == "_id");
        if !id_excluded && !id_listed {
            if let Some(id) = doc.get("_id") {
                out.insert("_id".into(), id.clone());
            }
        }
        for (path, field) in fields {
            match field {
                ProjectField::Include => {
                    if let Some(value) = lookup(doc, path) {
                        set_path(&mut out, path, value.clone());
                    }
                }
                ProjectField::Exclude => {}
                ProjectField::Computed(expr) => set_path(&mut out, path, Expression::evaluate(expr, doc)?),
            }
        }
        Ok(out)
    }

    /// Groups keep the order in which their key was first seen.
    fn group(id: &DataValue, accumulators: &[AccumulatorSpec], documents: Vec<Document>) -> Result<Vec<Document>, PipelineError> {
        let mut groups: IndexMap<String, (DataValue, Vec<Box<dyn Accumulator>>)> = IndexMap::new();
        for doc in &documents {
            let key = Expression::evaluate(id, doc)?;
            let slot = match groups.entry(key.canonical_key()) {
                indexmap::map::Entry::Occupied(e) => e.into_mut(),
                indexmap::map::Entry::Vacant(e) => {
                    let accs = accumulators.iter().map(AccumulatorSpec::create).collect::<Result<Vec<_>, _>>()?;
                    e.insert((key, accs))
                }
            };
            for (spec, acc) in accumulators.iter().zip(slot.1.iter_mut()) {
                acc.update(&spec.argument_for(doc)?)?;
            }
        }

        Ok(groups
            .into_values()
            .map(|(key, accs)| {
                let mut out = Document::with_capacity(accs.len() + 1);
                out.insert("_id".into(), key);
                for (spec, acc) in accumulators.iter().zip(accs) {
                    out.insert(spec.output.clone(), acc.finalize());
                }
                out
            })
            .collect())
    }

    fn compare_by_keys(keys: &[(String, bool)], a: &Document, b: &Document) -> Ordering {
        for (path, ascending) in keys {
            let va = lookup(a, path).unwrap_or(&DataValue::Null);
            let vb = lookup(b, path).unwrap_or(&DataValue::Null);
            let ord = ValueOrdering::compare_directed(va, vb, *ascending);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Buckets are `[lower, upper)` ranges labelled by their lower boundary.
    /// Only non-empty buckets are emitted, the `default` bucket last.
    fn bucket(spec: &BucketSpec, documents: Vec<Document>) -> Result<Vec<Document>, PipelineError> {
        let ranges = spec.boundaries.len() - 1;
        let new_accs = || spec.output.iter().map(AccumulatorSpec::create).collect::<Result<Vec<_>, _>>();
        let mut buckets: Vec<Option<Vec<Box<dyn Accumulator>>>> = (0..=ranges).map(|_| None).collect();

        for doc in &documents {
            let value = Expression::evaluate(&spec.group_by, doc)?;
            let index = (0..ranges).find(|&i| {
                let (lower, upper) = (&spec.boundaries[i], &spec.boundaries[i + 1]);
                ValueOrdering::comparable(&value, lower)
                    && ValueOrdering::compare(&value, lower) != Ordering::Less
                    && ValueOrdering::compare(&value, upper) == Ordering::Less
            });
            let index = match (index, &spec.default) {
                (Some(i), _) => i,
                (None, Some(_)) => ranges,
                (None, None) => {
                    return Err(PipelineError::stage(
                        "$bucket",
                        format!("value {value} falls outside every boundary and no `default` was given"),
                    ));
                }
            };
            if buckets[index].is_none() {
                buckets[index] = Some(new_accs()?);
            }
            if let Some(accs) = buckets[index].as_mut() {
                for (output, acc) in spec.output.iter().zip(accs.iter_mut()) {
                    acc.update(&output.argument_for(doc)?)?;
                }
            }
        }

        let mut out = Vec::new();
        for (index, accs) in buckets.into_iter().enumerate() {
            let Some(accs) = accs else { continue };
            let label = if index < ranges {
                spec.boundaries[index].clone()
            } else {
                spec.default.clone().unwrap_or_default()
            };
            let mut doc = Document::with_capacity(accs.len() + 1);
            doc.insert("_id".into(), label);
            for (output, acc) in spec.output.iter().zip(accs) {
                doc.insert(output.output.clone(), acc.finalize());
            }
            out.push(doc);
        }
        Ok(out)
    }

    fn unwind(spec: &UnwindSpec, documents: Vec<Document>) -> Vec<Document> {
        let mut out = Vec::with_capacity(documents.len());
        for doc in documents {
            match lookup(&doc, &spec.path).cloned() {
                Some(DataValue::Array(items)) if !items.is_empty() => {
                    for item in items {
                        let mut copy = doc.clone();
                        set_path(&mut copy, &spec.path, item);
                        out.push(copy);
                    }
                }
                Some(DataValue::Array(_)) | Some(DataValue::Null) | None => {
                    if spec.preserve_empty {
                        out.push(doc);
                    }
                }
                Some(_) => out.push(doc),
            }
        }
        out
    }
}

/// Writes `value` at a dotted path, creating intermediate documents.
pub fn set_path(doc: &mut Document, path: &str, value: DataValue) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc.entry(head.to_string()).or_insert_with(|| DataValue::Document(Document::new()));
            if !matches!(child, DataValue::Document(_)) {
                *child = DataValue::Document(Document::new());
            }
            if let DataValue::Document(inner) = child {
                set_path(inner, rest, value);
            }
        }
    }
}

pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.shift_remove(path);
        }
        Some((head, rest)) => {
            if let Some(DataValue::Document(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}
