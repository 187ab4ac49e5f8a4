use crate::record::{ChangeRecord, FileKind, Reason, SchemaError, Update};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// The uniform output of both the protocol decoder and the manifest diff:
/// an ordered, schema-validated collection of change records. Membership is
/// fixed at construction; per-update counts are computed on first use and
/// cached (membership never changes, so the cache never needs invalidating).
#[derive(Debug, Default)]
pub struct DeploymentResult {
    name: Option<String>,
    records: Vec<ChangeRecord>,
    nested: Vec<DeploymentResult>,
    counts: OnceLock<BTreeMap<Update, usize>>,
}

impl DeploymentResult {
    pub fn new(records: Vec<ChangeRecord>) -> Result<Self, SchemaError> {
        for record in &records {
            record.validate()?;
        }
        Ok(Self {
            name: None,
            records,
            nested: Vec::new(),
            counts: OnceLock::new(),
        })
    }

    pub fn named(name: impl Into<String>, records: Vec<ChangeRecord>) -> Result<Self, SchemaError> {
        let mut result = Self::new(records)?;
        result.name = Some(name.into());
        Ok(result)
    }

    /// Build from raw change maps, e.g. records relayed as JSON by another
    /// process. Enumeration fields outside their accepted sets and missing
    /// required fields are rejected with the offending field named.
    pub fn from_raw(raw: &[Value]) -> Result<Self, SchemaError> {
        let records = raw
            .iter()
            .map(parse_raw_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(records)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    /// How many records carry the given update type.
    pub fn count_of(&self, update: Update) -> usize {
        self.counts
            .get_or_init(|| {
                let mut counts = BTreeMap::new();
                for record in &self.records {
                    *counts.entry(record.update).or_insert(0) += 1;
                }
                counts
            })
            .get(&update)
            .copied()
            .unwrap_or(0)
    }

    /// Attach a per-target sub-result when one synchronization fans out
    /// across multiple remote hosts. Aggregation is by concatenation.
    pub fn push_nested(&mut self, sub: DeploymentResult) {
        self.nested.push(sub);
    }

    /// The per-target results, or `[self]` when none were attached.
    pub fn targets(&self) -> Vec<&DeploymentResult> {
        if self.nested.is_empty() {
            vec![self]
        } else {
            self.nested.iter().collect()
        }
    }
}

impl<'a> IntoIterator for &'a DeploymentResult {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn parse_raw_record(value: &Value) -> Result<ChangeRecord, SchemaError> {
    let update = Update::parse(str_field(value, "update")?)?;
    let kind = FileKind::parse(str_field(value, "filetype")?)?;

    let mut reason = BTreeSet::new();
    let items = value
        .get("reason")
        .ok_or(SchemaError::MissingField("reason"))?
        .as_array()
        .ok_or(SchemaError::InvalidType {
            field: "reason",
            expected: "list of strings",
        })?;
    for item in items {
        let item = item.as_str().ok_or(SchemaError::InvalidType {
            field: "reason",
            expected: "list of strings",
        })?;
        reason.insert(Reason::parse(item)?);
    }

    let filename = str_field(value, "filename")?;
    let mut record = ChangeRecord::new(update, kind, reason, filename);
    if let Some(local) = value.get("localfilename") {
        let local = local.as_str().ok_or(SchemaError::InvalidType {
            field: "localfilename",
            expected: "string",
        })?;
        record = record.with_local_path(local);
    }
    Ok(record)
}

fn str_field<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, SchemaError> {
    value
        .get(field)
        .ok_or(SchemaError::MissingField(field))?
        .as_str()
        .ok_or(SchemaError::InvalidType {
            field,
            expected: "string",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sent(filename: &str) -> ChangeRecord {
        ChangeRecord::new(
            Update::Sent,
            FileKind::File,
            [Reason::Checksum],
            filename,
        )
    }

    fn deleted(filename: &str) -> ChangeRecord {
        ChangeRecord::new(Update::Deleted, FileKind::File, [Reason::Missing], filename)
    }

    #[test]
    fn counts_per_update_type() {
        let result =
            DeploymentResult::new(vec![sent("a"), sent("b"), deleted("c")]).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.count_of(Update::Sent), 2);
        assert_eq!(result.count_of(Update::Deleted), 1);
        assert_eq!(result.count_of(Update::Received), 0);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let result = DeploymentResult::new(vec![sent("b"), sent("a"), deleted("z")]).unwrap();
        let names: Vec<&str> = result.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["b", "a", "z"]);
    }

    #[test]
    fn construction_rejects_invalid_records() {
        let bad = ChangeRecord::new(Update::Deleted, FileKind::File, [Reason::Size], "a");
        let err = DeploymentResult::new(vec![sent("ok"), bad]).unwrap_err();
        assert_eq!(err, SchemaError::DeletedWithoutMissing("a".into()));
    }

    #[test]
    fn targets_defaults_to_self() {
        let result = DeploymentResult::new(vec![sent("a")]).unwrap();
        let targets = result.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].len(), 1);
    }

    #[test]
    fn targets_yields_nested_results() {
        let mut combined = DeploymentResult::named("all", Vec::new()).unwrap();
        combined.push_nested(DeploymentResult::named("host-a", vec![sent("a")]).unwrap());
        combined.push_nested(DeploymentResult::named("host-b", vec![deleted("b")]).unwrap());

        let targets = combined.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name(), Some("host-a"));
        assert_eq!(targets[1].name(), Some("host-b"));
    }

    #[test]
    fn from_raw_accepts_well_formed_maps() {
        let raw = vec![
            json!({
                "update": "sent",
                "filetype": "file",
                "reason": ["checksum"],
                "filename": "src/main.php",
                "localfilename": "/work/site/src/main.php",
            }),
            json!({
                "update": "deleted",
                "filetype": "file",
                "reason": ["missing"],
                "filename": "old.txt",
            }),
        ];
        let result = DeploymentResult::from_raw(&raw).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result.records()[0].local_path.as_deref(),
            Some(camino::Utf8Path::new("/work/site/src/main.php"))
        );
        assert_eq!(result.records()[1].local_path, None);
    }

    #[test]
    fn from_raw_names_field_and_accepted_values() {
        let raw = vec![json!({
            "update": "pushed",
            "filetype": "file",
            "reason": [],
            "filename": "a",
        })];
        match DeploymentResult::from_raw(&raw).unwrap_err() {
            SchemaError::UnknownValue { field, allowed, .. } => {
                assert_eq!(field, "update");
                assert_eq!(allowed, Update::ALLOWED);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_raw_rejects_missing_fields() {
        let raw = vec![json!({
            "update": "sent",
            "reason": ["checksum"],
            "filename": "a",
        })];
        assert_eq!(
            DeploymentResult::from_raw(&raw).unwrap_err(),
            SchemaError::MissingField("filetype")
        );
    }
}
