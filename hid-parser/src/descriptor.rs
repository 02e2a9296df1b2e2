use std::collections::BTreeMap;
use std::fmt::{self, Display, Write as _};

use crate::collection::{Collection, Field, FieldKind};
use crate::error::{HidError, Result};
use crate::parser::Parser;

/// Raw report descriptor bytes, exactly as returned by the OS.
#[derive(Debug)]
pub struct ReportDescriptor {
    pub bytes: Vec<u8>,
}

impl ReportDescriptor {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn decode(&self) -> DescriptorTree {
        DescriptorTree::parse(&self.bytes)
    }
}

/// Stable location of a field in the tree: the child-index path down to
/// its collection, then the position in that collection's field list.
/// Index entries stay valid because the tree is immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldRef {
    path: Vec<usize>,
    field: usize,
}

impl FieldRef {
    pub(crate) fn new(path: Vec<usize>, field: usize) -> Self {
        FieldRef { path, field }
    }
}

/// The decoded descriptor: a collection tree rooted at a synthetic root,
/// an index of fields by Report ID, and a copy of the source bytes.
#[derive(Debug)]
pub struct DescriptorTree {
    root: Collection,
    index: BTreeMap<u8, Vec<FieldRef>>,
    bytes: Vec<u8>,
}

impl DescriptorTree {
    /// Decode a raw descriptor. Any byte stream produces a tree;
    /// malformed input degrades to a best-effort result.
    pub fn parse(bytes: &[u8]) -> Self {
        let (root, index) = Parser::parse(bytes);

        DescriptorTree {
            root,
            index,
            bytes: bytes.to_vec(),
        }
    }

    pub fn root(&self) -> &Collection {
        &self.root
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Report IDs seen in the descriptor, ascending. ID 0 stands for
    /// "no Report ID prefix".
    pub fn report_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.index.keys().copied()
    }

    /// All fields declared under the given Report ID, in descriptor
    /// order. Unknown IDs yield an empty list.
    pub fn find_by_report_id(&self, id: u8) -> Vec<&Field> {
        match self.index.get(&id) {
            Some(refs) => refs.iter().map(|reference| self.resolve(reference)).collect(),
            None => vec![],
        }
    }

    fn resolve(&self, reference: &FieldRef) -> &Field {
        let mut node = &self.root;
        for &child in &reference.path {
            node = &node.children[child];
        }

        &node.fields[reference.field]
    }

    /// Byte length of the feature report with the given ID, including the
    /// leading Report ID byte.
    pub fn feature_report_len(&self, id: u8) -> Result<usize> {
        let fields = self.find_by_report_id(id);
        let feature_fields: Vec<_> = fields
            .iter()
            .filter(|field| field.kind == FieldKind::Feature)
            .collect();

        if feature_fields.is_empty() {
            return Err(HidError::InvalidArgument(format!(
                "no feature report with ID {id}"
            )));
        }

        let bits: u32 = feature_fields.iter().map(|field| field.bit_len()).sum();

        Ok(1 + bits.div_ceil(8) as usize)
    }
}

impl Display for DescriptorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();

        // the synthetic root is not labelled, its content starts at
        // indent zero
        for field in &self.root.fields {
            dump_field(field, 0, &mut out);
        }
        for child in &self.root.children {
            dump_collection(child, 0, &mut out);
        }

        f.write_str(&out)
    }
}

fn dump_collection(collection: &Collection, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);

    let _ = write!(out, "{indent}Collection({})", collection.collection_type);
    if collection.usage_page != 0 || collection.usage != 0 {
        let _ = write!(
            out,
            " UsagePage=0x{:04X} Usage=0x{:X}",
            collection.usage_page, collection.usage
        );
    }
    out.push('\n');

    for field in &collection.fields {
        dump_field(field, depth + 1, out);
    }
    for child in &collection.children {
        dump_collection(child, depth + 1, out);
    }
}

fn dump_field(field: &Field, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);

    let _ = write!(
        out,
        "{indent}{} id={} size={} count={} flags=0x{:02X}",
        field.kind, field.report_id, field.report_size, field.report_count, field.flags
    );
    if !field.usages.is_empty() {
        let usages = field
            .usages
            .iter()
            .map(|usage| format!("0x{usage:X}"))
            .collect::<Vec<_>>()
            .join(",");
        let _ = write!(out, " usages={usages}");
    }
    out.push('\n');
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collection::CollectionType;

    const MOUSE: [u8; 34] = [
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x02, // Usage (Mouse)
        0xA1, 0x01, // Collection (Application)
        0x09, 0x01, //   Usage (Pointer)
        0xA1, 0x00, //   Collection (Physical)
        0x05, 0x09, //     Usage Page (Button)
        0x19, 0x01, //     Usage Minimum (1)
        0x29, 0x03, //     Usage Maximum (3)
        0x15, 0x00, //     Logical Minimum (0)
        0x25, 0x01, //     Logical Maximum (1)
        0x95, 0x03, //     Report Count (3)
        0x75, 0x01, //     Report Size (1)
        0x81, 0x02, //     Input (Data,Variable,Absolute)
        0x95, 0x01, //     Report Count (1)
        0x75, 0x05, //     Report Size (5)
        0x81, 0x03, //     Input (Const,Variable,Absolute)
        0xC0, //   End Collection
        0xC0, // End Collection
    ];

    #[test]
    fn empty_input_yields_empty_tree() {
        let tree = DescriptorTree::parse(&[]);

        assert!(tree.root().fields.is_empty());
        assert!(tree.root().children.is_empty());
        assert_eq!(tree.report_ids().count(), 0);
        assert_eq!(tree.to_string(), "");
    }

    #[test]
    fn parses_a_mouse_descriptor() {
        let tree = DescriptorTree::parse(&MOUSE);

        assert_eq!(tree.root().children.len(), 1);
        let application = &tree.root().children[0];
        assert_eq!(application.collection_type, CollectionType::Application);
        assert_eq!(application.usage_page, 0x01);
        assert_eq!(application.usage, 0x02);
        assert!(application.fields.is_empty());

        assert_eq!(application.children.len(), 1);
        let physical = &application.children[0];
        assert_eq!(physical.collection_type, CollectionType::Physical);
        assert_eq!(physical.usage_page, 0x01);
        assert_eq!(physical.usage, 0x01);

        assert_eq!(physical.fields.len(), 2);
        let buttons = &physical.fields[0];
        assert_eq!(buttons.kind, FieldKind::Input);
        assert_eq!(buttons.usage_page, 0x09);
        assert_eq!(buttons.usages, vec![1, 2, 3]);
        assert_eq!(buttons.report_count, 3);
        assert_eq!(buttons.report_size, 1);
        assert_eq!(buttons.flags, 0x02);

        let padding = &physical.fields[1];
        assert_eq!(padding.usage_page, 0x09);
        assert!(padding.usages.is_empty());
        assert_eq!(padding.report_count, 1);
        assert_eq!(padding.report_size, 5);
        assert_eq!(padding.flags, 0x03);
    }

    #[test]
    fn snapshots_global_state_per_field() {
        let tree = DescriptorTree::parse(&MOUSE);
        let fields = tree.find_by_report_id(0);

        // later Report Size / Count items must not disturb the first field
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].report_size, 1);
        assert_eq!(fields[0].report_count, 3);
        assert_eq!(fields[1].report_size, 5);
        assert_eq!(fields[1].report_count, 1);
    }

    #[test]
    fn dumps_the_tree() {
        let tree = DescriptorTree::parse(&MOUSE);

        let expected = "\
Collection(Application) UsagePage=0x0001 Usage=0x2
  Collection(Physical) UsagePage=0x0001 Usage=0x1
    Input id=0 size=1 count=3 flags=0x02 usages=0x1,0x2,0x3
    Input id=0 size=5 count=1 flags=0x03
";
        assert_eq!(tree.to_string(), expected);
    }

    #[test]
    fn indexes_fields_by_report_id() {
        // three Feature reports, IDs 1..3, 8 bits each
        let bytes = [
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x09, 0x02, // Usage (Mouse)
            0xA1, 0x01, // Collection (Application)
            0x75, 0x08, //   Report Size (8)
            0x95, 0x01, //   Report Count (1)
            0x85, 0x01, //   Report ID (1)
            0xB1, 0x02, //   Feature
            0x85, 0x02, //   Report ID (2)
            0xB1, 0x02, //   Feature
            0x85, 0x03, //   Report ID (3)
            0xB1, 0x02, //   Feature
            0xC0, // End Collection
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert_eq!(tree.report_ids().collect::<Vec<_>>(), vec![1, 2, 3]);

        let fields = tree.find_by_report_id(2);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].kind, FieldKind::Feature);
        assert_eq!(fields[0].report_id, 2);
        assert_eq!(fields[0].report_size, 8);
        assert_eq!(fields[0].report_count, 1);

        assert!(tree.find_by_report_id(99).is_empty());
    }

    #[test]
    fn push_pop_restores_global_state() {
        let bytes = [
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x75, 0x01, // Report Size (1)
            0x95, 0x01, // Report Count (1)
            0xA4, // Push
            0x05, 0x09, // Usage Page (Button)
            0x81, 0x02, // Input
            0xB4, // Pop
            0x81, 0x02, // Input
        ];
        let tree = DescriptorTree::parse(&bytes);

        let fields = tree.find_by_report_id(0);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].usage_page, 0x09);
        assert_eq!(fields[1].usage_page, 0x01);
    }

    #[test]
    fn pop_on_empty_stack_is_absorbed() {
        let bytes = [
            0xB4, // Pop with nothing pushed
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x81, 0x02, // Input
        ];
        let tree = DescriptorTree::parse(&bytes);

        let fields = tree.find_by_report_id(0);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].usage_page, 0x01);
    }

    #[test]
    fn end_collection_at_root_is_absorbed() {
        let bytes = [
            0xC0, // stray End Collection
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x09, 0x02, // Usage (Mouse)
            0xA1, 0x01, // Collection (Application)
            0xC0, // End Collection
            0xC0, // another stray one
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert_eq!(tree.root().children.len(), 1);
    }

    #[test]
    fn truncated_descriptor_keeps_parsed_prefix() {
        let tree = DescriptorTree::parse(&MOUSE[..MOUSE.len() - 1]);

        assert_eq!(tree.root().children.len(), 1);
        let application = &tree.root().children[0];
        assert_eq!(application.children.len(), 1);
        assert_eq!(application.children[0].fields.len(), 2);
    }

    #[test]
    fn fields_outside_collections_attach_to_the_root() {
        let bytes = [
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x75, 0x08, // Report Size (8)
            0x95, 0x01, // Report Count (1)
            0x81, 0x02, // Input, no collection open
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert_eq!(tree.root().fields.len(), 1);
        assert_eq!(tree.find_by_report_id(0).len(), 1);
    }

    #[test]
    fn unclosed_collections_stay_attached() {
        let bytes = [
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x09, 0x02, // Usage (Mouse)
            0xA1, 0x01, // Collection (Application), never closed
            0x09, 0x01, // Usage (Pointer)
            0xA1, 0x00, // Collection (Physical), never closed
            0x75, 0x08, // Report Size (8)
            0x95, 0x01, // Report Count (1)
            0x81, 0x02, // Input
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert_eq!(tree.root().children.len(), 1);
        assert_eq!(tree.root().children[0].children.len(), 1);
        assert_eq!(tree.root().children[0].children[0].fields.len(), 1);
    }

    #[test]
    fn usage_range_wins_over_usage_list() {
        let bytes = [
            0x05, 0x09, // Usage Page (Button)
            0x09, 0x08, // Usage (8), shadowed by the range
            0x19, 0x01, // Usage Minimum (1)
            0x29, 0x02, // Usage Maximum (2)
            0x75, 0x01, // Report Size (1)
            0x95, 0x02, // Report Count (2)
            0x81, 0x02, // Input
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert_eq!(tree.find_by_report_id(0)[0].usages, vec![1, 2]);
    }

    #[test]
    fn inverted_usage_range_is_empty() {
        let bytes = [
            0x19, 0x03, // Usage Minimum (3)
            0x29, 0x01, // Usage Maximum (1)
            0x81, 0x02, // Input
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert!(tree.find_by_report_id(0)[0].usages.is_empty());
    }

    #[test]
    fn main_items_clear_local_state() {
        let bytes = [
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x09, 0x02, // Usage (Mouse)
            0xA1, 0x01, // Collection (Application), consumes the usage
            0x75, 0x08, // Report Size (8)
            0x95, 0x01, // Report Count (1)
            0x81, 0x02, // Input, sees no usages
            0xC0, // End Collection
        ];
        let tree = DescriptorTree::parse(&bytes);

        assert!(tree.find_by_report_id(0)[0].usages.is_empty());
    }

    #[test]
    fn computes_feature_report_length() {
        let bytes = [
            0x85, 0x05, // Report ID (5)
            0x75, 0x08, // Report Size (8)
            0x95, 0x03, // Report Count (3)
            0xB1, 0x02, // Feature, 24 bits
            0x75, 0x01, // Report Size (1)
            0x95, 0x02, // Report Count (2)
            0xB1, 0x02, // Feature, 2 more bits
        ];
        let tree = DescriptorTree::parse(&bytes);

        // 26 bits round up to 4 bytes, plus the Report ID byte
        assert_eq!(tree.feature_report_len(5).unwrap(), 5);
        assert!(matches!(
            tree.feature_report_len(9),
            Err(HidError::InvalidArgument(_))
        ));
    }

    #[test]
    fn tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<DescriptorTree>();
    }
}
