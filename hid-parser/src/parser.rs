use std::collections::BTreeMap;

use crate::basic::{BasicItem, BasicItems, GlobalItem, LocalItem, MainItem};
use crate::collection::{Collection, CollectionType, Field, FieldKind};
use crate::descriptor::FieldRef;

/// Global item state. Carried across main items, snapshotted into every
/// emitted field, and saved/restored whole by Push/Pop.
#[derive(Debug, Clone, Default)]
struct GlobalState {
    usage_page: u16,
    report_id: u8,
    report_size: u32,
    report_count: u32,
    logical_minimum: i32,
    logical_maximum: i32,
    physical_minimum: i32,
    physical_maximum: i32,
    unit: u32,
    unit_exponent: i8,
}

/// Local item state, discarded after every main item.
#[derive(Debug, Default)]
struct LocalState {
    usages: Vec<u32>,
    has_usage_range: bool,
    usage_minimum: u32,
    usage_maximum: u32,
}

impl LocalState {
    /// The usages a field emitted under this state carries: a declared
    /// range wins over listed usages, an inverted range is empty.
    fn field_usages(&self) -> Vec<u32> {
        if self.has_usage_range {
            if self.usage_minimum <= self.usage_maximum {
                (self.usage_minimum..=self.usage_maximum).collect()
            } else {
                vec![]
            }
        } else {
            self.usages.clone()
        }
    }
}

/// Builds the collection tree and report-ID index from a descriptor byte
/// stream. Never fails: unknown tags are skipped, stack underflows are
/// absorbed, truncation just ends the stream.
pub(crate) struct Parser {
    global: GlobalState,
    global_stack: Vec<GlobalState>,
    local: LocalState,
    root: Collection,
    /// Child-index path from the root to the open collection.
    path: Vec<usize>,
    index: BTreeMap<u8, Vec<FieldRef>>,
}

impl Parser {
    pub(crate) fn parse(bytes: &[u8]) -> (Collection, BTreeMap<u8, Vec<FieldRef>>) {
        let mut parser = Parser {
            global: GlobalState::default(),
            global_stack: vec![],
            local: LocalState::default(),
            root: Collection::root(),
            path: vec![],
            index: BTreeMap::new(),
        };

        for item in BasicItems::new(bytes) {
            match item {
                BasicItem::Main(item) => parser.main_item(item),
                BasicItem::Global(item) => parser.global_item(item),
                BasicItem::Local(item) => parser.local_item(item),
                BasicItem::Reserved => (),
            }
        }

        (parser.root, parser.index)
    }

    fn current(&mut self) -> &mut Collection {
        let mut node = &mut self.root;
        for &child in &self.path {
            node = &mut node.children[child];
        }

        node
    }

    fn main_item(&mut self, item: MainItem) {
        match item {
            MainItem::Collection(code) => {
                let collection = Collection {
                    collection_type: CollectionType::new(code),
                    usage_page: self.global.usage_page,
                    usage: self.local.usages.last().copied().unwrap_or(0),
                    fields: vec![],
                    children: vec![],
                };

                let parent = self.current();
                parent.children.push(collection);
                let child = parent.children.len() - 1;
                self.path.push(child);
            }
            MainItem::EndCollection => {
                // at the root this is a no-op
                self.path.pop();
            }
            MainItem::Input(flags) => self.emit_field(FieldKind::Input, flags),
            MainItem::Output(flags) => self.emit_field(FieldKind::Output, flags),
            MainItem::Feature(flags) => self.emit_field(FieldKind::Feature, flags),
            MainItem::Reserved => (),
        }

        self.local = LocalState::default();
    }

    fn emit_field(&mut self, kind: FieldKind, flags: u8) {
        let field = Field {
            kind,
            report_id: self.global.report_id,
            usage_page: self.global.usage_page,
            usages: self.local.field_usages(),
            report_size: self.global.report_size,
            report_count: self.global.report_count,
            logical_minimum: self.global.logical_minimum,
            logical_maximum: self.global.logical_maximum,
            physical_minimum: self.global.physical_minimum,
            physical_maximum: self.global.physical_maximum,
            unit: self.global.unit,
            unit_exponent: self.global.unit_exponent,
            flags,
        };

        let path = self.path.clone();
        let report_id = field.report_id;

        let collection = self.current();
        let reference = FieldRef::new(path, collection.fields.len());
        collection.fields.push(field);

        self.index.entry(report_id).or_default().push(reference);
    }

    fn global_item(&mut self, item: GlobalItem) {
        match item {
            GlobalItem::UsagePage(page) => self.global.usage_page = page,
            GlobalItem::LogicalMinimum(value) => self.global.logical_minimum = value,
            GlobalItem::LogicalMaximum(value) => self.global.logical_maximum = value,
            GlobalItem::PhysicalMinimum(value) => self.global.physical_minimum = value,
            GlobalItem::PhysicalMaximum(value) => self.global.physical_maximum = value,
            GlobalItem::UnitExponent(value) => self.global.unit_exponent = value,
            GlobalItem::Unit(value) => self.global.unit = value,
            GlobalItem::ReportSize(value) => self.global.report_size = value,
            GlobalItem::ReportId(value) => self.global.report_id = value,
            GlobalItem::ReportCount(value) => self.global.report_count = value,
            GlobalItem::Push => self.global_stack.push(self.global.clone()),
            GlobalItem::Pop => {
                // Pop with nothing pushed is a no-op
                if let Some(saved) = self.global_stack.pop() {
                    self.global = saved;
                }
            }
            GlobalItem::Reserved => (),
        }
    }

    fn local_item(&mut self, item: LocalItem) {
        match item {
            LocalItem::Usage(usage) => self.local.usages.push(usage),
            LocalItem::UsageMinimum(usage) => {
                self.local.has_usage_range = true;
                self.local.usage_minimum = usage;
            }
            LocalItem::UsageMaximum(usage) => {
                self.local.has_usage_range = true;
                self.local.usage_maximum = usage;
            }
            // string indices, designators and delimiters are accepted
            // but not modelled; they do not clear local state
            _ => (),
        }
    }
}
