use serde::{Deserialize, Deserializer, Serialize};

/// One mined refactoring, as produced by the corpus-ingestion tooling.
///
/// Field names follow the ingestion JSON (camelCase). Missing or `null`
/// fields decode to `None` (or the type's default) and are written back as
/// `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefactoringRecord {
    #[serde(rename = "type", default)]
    pub refactoring_type: Option<String>,

    #[serde(rename = "sourceCodeBeforeRefactoring", default)]
    pub source_code_before: Option<String>,

    #[serde(default)]
    pub file_path_before: Option<String>,

    #[serde(default, deserialize_with = "null_to_default")]
    pub is_pure_refactoring: bool,

    #[serde(default)]
    pub commit_id: Option<String>,

    #[serde(default)]
    pub package_name_before: Option<String>,

    #[serde(default)]
    pub class_name_before: Option<String>,

    #[serde(default)]
    pub method_name_before: Option<String>,

    /// Bodies of methods invoked by the refactored method; empty when unknown.
    #[serde(default, deserialize_with = "null_to_default")]
    pub invoked_method: String,

    #[serde(default)]
    pub class_signature_before: Option<String>,

    #[serde(rename = "sourceCodeAfterRefactoring", default)]
    pub source_code_after: Option<String>,

    #[serde(default)]
    pub diff_source_code: Option<String>,

    #[serde(default)]
    pub unique_id: Option<String>,

    /// Natural-language summary of the method, written upstream by an LLM.
    #[serde(default)]
    pub context_description: Option<String>,
}

fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_ingestion_field_names() {
        let record: RefactoringRecord = serde_json::from_str(
            r#"{
                "type": "Extract Method",
                "sourceCodeBeforeRefactoring": "void a() {}",
                "sourceCodeAfterRefactoring": "void a() { b(); }",
                "isPureRefactoring": true,
                "classNameBefore": "Foo",
                "uniqueId": "u-1",
                "contextDescription": "Resets state."
            }"#,
        )
        .unwrap();

        assert_eq!(record.refactoring_type.as_deref(), Some("Extract Method"));
        assert_eq!(record.source_code_before.as_deref(), Some("void a() {}"));
        assert_eq!(record.source_code_after.as_deref(), Some("void a() { b(); }"));
        assert!(record.is_pure_refactoring);
        assert_eq!(record.class_name_before.as_deref(), Some("Foo"));
        assert_eq!(record.invoked_method, "");
        assert_eq!(record.commit_id, None);
    }

    #[test]
    fn null_scalars_decode_to_defaults() {
        let record: RefactoringRecord = serde_json::from_str(
            r#"{"invokedMethod": null, "isPureRefactoring": null, "commitId": null}"#,
        )
        .unwrap();
        assert_eq!(record.invoked_method, "");
        assert!(!record.is_pure_refactoring);
        assert_eq!(record.commit_id, None);
    }

    #[test]
    fn encodes_absent_fields_as_null() {
        let value = serde_json::to_value(RefactoringRecord::default()).unwrap();
        assert_eq!(value["diffSourceCode"], serde_json::Value::Null);
        assert_eq!(value["invokedMethod"], serde_json::json!(""));
        assert_eq!(value["isPureRefactoring"], serde_json::json!(false));
    }
}
