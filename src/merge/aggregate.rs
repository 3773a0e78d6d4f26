//! Building aggregated values files from `Multi` items.

use crate::merge::consumer::WriteError;
use crate::models::{Element, ResourceItem, VALUES_FOLDER, ValueNode, qualified_folder_name};
use crate::services::create_path_comment;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

/// Name of every aggregated values file.
pub const FN_VALUES_XML: &str = "values.xml";

pub const TAG_RESOURCES: &str = "resources";

/// `<root>/values[-<qualifiers>]/values.xml`
pub fn values_file_path(root: &Utf8Path, qualifiers: &str) -> Utf8PathBuf {
    root.join(qualified_folder_name(VALUES_FOLDER, qualifiers))
        .join(FN_VALUES_XML)
}

/// Sorts `items` and builds the `<resources>` document for them.
///
/// A provenance comment, padded by newlines, precedes each run of items that
/// come from the same source file (same `Arc`, not just an equal path).
pub fn build_values_document(items: &mut [ResourceItem]) -> Result<ValueNode, WriteError> {
    items.sort_by(|a, b| a.merge_order(b));

    let mut root = Element::new(TAG_RESOURCES);
    let mut current_source = None;

    for item in items.iter() {
        let source = item.source();
        if !current_source.is_some_and(|current| Arc::ptr_eq(current, source)) {
            current_source = Some(source);
            root.push(ValueNode::Text("\n".to_string()));
            root.push(ValueNode::Comment(create_path_comment(source.path())?));
            root.push(ValueNode::Text("\n".to_string()));
        }

        let value = item
            .value()
            .ok_or_else(|| WriteError::MissingValue(item.name().to_string()))?;
        root.push(value.clone());
    }

    Ok(root.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceFile, ResourceType};
    use crate::services::{PrettyPrinter, XmlPrinter};
    use proptest::prelude::*;

    fn string_item(name: &str, source: &Arc<crate::models::ResourceFile>) -> ResourceItem {
        ResourceItem::new(name, ResourceType::String, Arc::clone(source))
            .with_value(ValueNode::named("string", name, &name.to_uppercase()))
    }

    fn comments(doc: &ValueNode) -> Vec<String> {
        doc.as_element()
            .unwrap()
            .children
            .iter()
            .filter_map(|c| match c {
                ValueNode::Comment(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_values_file_path() {
        let root = Utf8Path::new("/out");
        assert_eq!(values_file_path(root, ""), Utf8PathBuf::from("/out/values/values.xml"));
        assert_eq!(
            values_file_path(root, "fr-rCA"),
            Utf8PathBuf::from("/out/values-fr-rCA/values.xml")
        );
    }

    #[test]
    fn test_one_comment_per_source_run() {
        let a = ResourceFile::multi("/res/a/values.xml", "");
        let b = ResourceFile::multi("/res/b/values.xml", "");
        let mut items = vec![string_item("z", &b), string_item("y", &a), string_item("x", &a)];

        let doc = build_values_document(&mut items).unwrap();
        assert_eq!(
            comments(&doc),
            vec!["From: file:///res/a/values.xml", "From: file:///res/b/values.xml"]
        );
        let names: Vec<_> = items.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_interleaved_sources_repeat_comments() {
        let a = ResourceFile::multi("/res/a/values.xml", "");
        let b = ResourceFile::multi("/res/b/values.xml", "");
        let mut items = vec![string_item("a1", &a), string_item("b1", &b), string_item("c1", &a)];

        let doc = build_values_document(&mut items).unwrap();
        assert_eq!(comments(&doc).len(), 3);
    }

    #[test]
    fn test_equal_paths_from_distinct_files_are_separate_sources() {
        let first = ResourceFile::multi("/res/values/values.xml", "");
        let second = ResourceFile::multi("/res/values/values.xml", "");
        let mut items = vec![string_item("a", &first), string_item("b", &second)];

        let doc = build_values_document(&mut items).unwrap();
        assert_eq!(comments(&doc).len(), 2);
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let a = ResourceFile::multi("/res/a/values.xml", "");
        let mut items = vec![ResourceItem::new("bare", ResourceType::String, a)];
        let err = build_values_document(&mut items).unwrap_err();
        assert!(matches!(err, WriteError::MissingValue(name) if name == "bare"));
    }

    #[test]
    fn test_empty_group_builds_empty_root() {
        let doc = build_values_document(&mut []).unwrap();
        assert_eq!(doc, Element::new(TAG_RESOURCES).into());
    }

    proptest! {
        #[test]
        fn prop_output_independent_of_submission_order(
            order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let a = ResourceFile::multi("/res/a/values.xml", "");
            let b = ResourceFile::multi("/res/b/values.xml", "");
            let all = vec![
                string_item("alpha", &a),
                string_item("beta", &b),
                string_item("gamma", &a),
                ResourceItem::new("primary", ResourceType::Color, Arc::clone(&b))
                    .with_value(ValueNode::named("color", "primary", "#fff")),
                ResourceItem::new("margin", ResourceType::Dimen, Arc::clone(&a))
                    .with_value(ValueNode::named("dimen", "margin", "4dp")),
                string_item("delta", &b),
            ];

            let mut sorted = all.clone();
            let expected = PrettyPrinter::default()
                .print(&build_values_document(&mut sorted).unwrap())
                .unwrap();

            let mut shuffled: Vec<_> = order.iter().map(|&i| all[i].clone()).collect();
            let actual = PrettyPrinter::default()
                .print(&build_values_document(&mut shuffled).unwrap())
                .unwrap();

            prop_assert_eq!(actual, expected);
        }
    }
}
