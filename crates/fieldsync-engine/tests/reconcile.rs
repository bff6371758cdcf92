use std::collections::{BTreeMap, HashMap};

use pretty_assertions::assert_eq;

use fieldsync_engine::{
    save_active_sheet, CellResolver, FieldValue, ListDescriptor, ListProvider, ReconcileSettings,
    Reconciler, RecordId, RecordListSource, RecordUpdate, SaveError, SourceError, UpdateSink,
};
use fieldsync_model::{
    BindingStore, EvaluatedCell, FieldDescriptor, FieldKind, FieldSchema, Position,
    RecordTypeRegistry,
};

#[derive(Default)]
struct FakeDocument {
    cells: HashMap<Position, EvaluatedCell>,
}

impl FakeDocument {
    fn set(&mut self, sheet: &str, row: u32, col: u32, cell: EvaluatedCell) {
        self.cells.insert(Position::new(sheet, row, col), cell);
    }
}

impl CellResolver for FakeDocument {
    fn evaluated_cell(&self, position: &Position) -> EvaluatedCell {
        self.cells.get(position).cloned().unwrap_or_default()
    }
}

struct FakeList {
    descriptor: ListDescriptor,
    /// Backing record identities; the materialized window exposes a prefix.
    record_ids: Vec<RecordId>,
    fields: FieldSchema,
    loaded: bool,
    window: u32,
    load_calls: usize,
    fail_loads: bool,
}

impl FakeList {
    fn new(descriptor: ListDescriptor, record_ids: Vec<RecordId>, fields: FieldSchema) -> Self {
        let window = record_ids.len() as u32;
        Self {
            descriptor,
            record_ids,
            fields,
            loaded: false,
            window,
            load_calls: 0,
            fail_loads: false,
        }
    }
}

impl RecordListSource for FakeList {
    fn is_ready(&self) -> bool {
        self.loaded
    }

    fn load(&mut self) -> Result<(), SourceError> {
        if self.fail_loads {
            return Err(SourceError::Backend("connection lost".to_string()));
        }
        self.loaded = true;
        self.load_calls += 1;
        Ok(())
    }

    fn reload(&mut self) -> Result<(), SourceError> {
        self.load()
    }

    fn max_position(&self) -> u32 {
        self.window
    }

    fn increase_max_position(&mut self, new_max: u32) {
        self.window = self.window.max(new_max);
    }

    fn id_from_position(&self, index: u32) -> Option<RecordId> {
        if !self.loaded || index >= self.window {
            return None;
        }
        self.record_ids.get(index as usize).copied()
    }

    fn fields(&self) -> &FieldSchema {
        &self.fields
    }
}

#[derive(Default)]
struct FakeLists {
    lists: Vec<FakeList>,
}

impl FakeLists {
    fn push(&mut self, list: FakeList) {
        self.lists.push(list);
    }

    fn get(&self, list_id: &str) -> &FakeList {
        self.lists
            .iter()
            .find(|list| list.descriptor.id == list_id)
            .expect("unknown list")
    }
}

impl ListProvider for FakeLists {
    fn descriptors(&self) -> Vec<ListDescriptor> {
        self.lists.iter().map(|list| list.descriptor.clone()).collect()
    }

    fn source(&mut self, list_id: &str) -> Option<&mut dyn RecordListSource> {
        self.lists
            .iter_mut()
            .find(|list| list.descriptor.id == list_id)
            .map(|list| list as &mut dyn RecordListSource)
    }
}

#[derive(Default)]
struct FakeSink {
    writes: Vec<(String, Vec<RecordUpdate>)>,
}

impl UpdateSink for FakeSink {
    fn write(&mut self, record_type: &str, updates: &[RecordUpdate]) -> Result<(), SourceError> {
        self.writes.push((record_type.to_string(), updates.to_vec()));
        Ok(())
    }
}

fn order_line_fields() -> FieldSchema {
    let mut fields = FieldSchema::new();
    fields.insert("quantity".to_string(), FieldDescriptor::new(FieldKind::Float));
    fields.insert(
        "unit_price".to_string(),
        FieldDescriptor::new(FieldKind::Monetary),
    );
    fields.insert(
        "product_id".to_string(),
        FieldDescriptor::new(FieldKind::ManyToOne),
    );
    fields.insert("width".to_string(), FieldDescriptor::new(FieldKind::Integer));
    fields
}

fn material_line_fields() -> FieldSchema {
    let mut fields = FieldSchema::new();
    fields.insert("quantity".to_string(), FieldDescriptor::new(FieldKind::Float));
    fields.insert(
        "description".to_string(),
        FieldDescriptor::new(FieldKind::Char),
    );
    fields
}

fn order_list(id: &str, sheet: &str, record_ids: Vec<RecordId>) -> FakeList {
    FakeList::new(
        ListDescriptor::new(id, "order.line", sheet, format!("Order Line {id}")),
        record_ids,
        order_line_fields(),
    )
}

fn values(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn single_numeric_binding_produces_one_update() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101, 102, 103]));

    let registry = RecordTypeRegistry::builtin();
    let reconciler = Reconciler::new(&store, &registry);
    let result = reconciler.compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.batches.len(), 1);
    assert_eq!(result.batches[0].record_type, "order.line");
    assert_eq!(
        result.batches[0].updates,
        vec![RecordUpdate {
            record_id: 101,
            values: values(&[("quantity", FieldValue::Number(5.0))]),
        }]
    );
}

#[test]
fn bindings_on_the_same_record_merge_into_one_update() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 0, 1), "L1", 0, "unit_price")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(2.0, "2"));
    document.set("s1", 0, 1, EvaluatedCell::number(9.5, "9.50"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(
        result.batches[0].updates,
        vec![RecordUpdate {
            record_id: 101,
            values: values(&[
                ("quantity", FieldValue::Number(2.0)),
                ("unit_price", FieldValue::Number(9.5)),
            ]),
        }]
    );
}

#[test]
fn blank_cells_contribute_nothing() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 1, 0), "L1", 1, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    // Row 0 left unset; row 1 evaluates to the empty string.
    document.set("s1", 1, 0, EvaluatedCell::text(""));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101, 102]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
}

#[test]
fn type_mismatches_are_skipped_silently_by_default() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 1, 0), "L1", 1, "width")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::text("lots"));
    document.set("s1", 1, 0, EvaluatedCell::number(2.5, "2.5"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101, 102]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.warnings, Vec::<String>::new());
}

#[test]
fn opted_in_validation_skips_surface_as_warnings() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::text("lots"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));

    let registry = RecordTypeRegistry::builtin();
    let settings = ReconcileSettings {
        report_validation_skips: true,
    };
    let result = Reconciler::with_settings(&store, &registry, settings)
        .compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("s1!A1"));
    assert!(!result.is_blocked(), "warnings never block a save");
}

#[test]
fn integer_fields_accept_whole_numbers_unchanged() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "width")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(3.0, "3"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(
        result.batches[0].updates[0].values,
        values(&[("width", FieldValue::Number(3.0))])
    );
}

#[test]
fn char_fields_take_the_formatted_text() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "M1", 0, "description")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(1234.5, "1,234.50"));

    let mut lists = FakeLists::default();
    lists.push(FakeList::new(
        ListDescriptor::new("M1", "material.line", "s1", "Material Line M1"),
        vec![7],
        material_line_fields(),
    ));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(
        result.batches[0].updates[0].values,
        values(&[("description", FieldValue::Text("1,234.50".to_string()))])
    );
}

#[test]
fn conflicting_bindings_block_the_list_with_one_message() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 4, 1), "L1", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(1.0, "1"));
    document.set("s1", 4, 1, EvaluatedCell::number(2.0, "2"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));

    let registry = RecordTypeRegistry::builtin();
    let reconciler = Reconciler::new(&store, &registry);
    let result = reconciler.compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![], "a conflicted list emits no commands");
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("s1!A1"));
    assert!(result.errors[0].contains("s1!B5"));
    assert!(result.is_blocked());

    // The pre-check reports the same conflict on its own.
    let messages = reconciler.find_duplicate_bindings("L1", &document);
    assert_eq!(messages, result.errors);
}

#[test]
fn a_blank_duplicate_is_not_a_conflict() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 4, 1), "L1", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(1.0, "1"));
    // The second cell stays blank: only one live writer remains.

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.batches[0].updates.len(), 1);
}

#[test]
fn lists_anchored_to_other_sheets_are_ignored() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s2", 0, 0), "L2", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s2", 0, 0, EvaluatedCell::number(5.0, "5"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L2", "s2", vec![201]));

    let registry = RecordTypeRegistry::builtin();
    let reconciler = Reconciler::new(&store, &registry);
    let result = reconciler.compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(reconciler.active_sheet_list_ids("s1", &lists), Vec::<String>::new());
    assert_eq!(
        reconciler.active_sheet_list_ids("s2", &lists),
        vec!["L2".to_string()]
    );
}

#[test]
fn unsupported_record_types_are_ignored() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L9", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));

    let mut lists = FakeLists::default();
    lists.push(FakeList::new(
        ListDescriptor::new("L9", "invoice.line", "s1", "Invoice Line L9"),
        vec![901],
        order_line_fields(),
    ));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
}

#[test]
fn a_list_without_a_data_source_is_skipped_silently() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));

    struct DescriptorsOnly(ListDescriptor);
    impl ListProvider for DescriptorsOnly {
        fn descriptors(&self) -> Vec<ListDescriptor> {
            vec![self.0.clone()]
        }
        fn source(&mut self, _list_id: &str) -> Option<&mut dyn RecordListSource> {
            None
        }
    }

    let mut lists = DescriptorsOnly(ListDescriptor::new("L1", "order.line", "s1", "Order Line"));
    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
}

#[test]
fn a_failing_list_degrades_without_aborting_the_others() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 1, 0), "L2", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));
    document.set("s1", 1, 0, EvaluatedCell::number(6.0, "6"));

    let mut lists = FakeLists::default();
    let mut failing = order_list("L1", "s1", vec![101]);
    failing.fail_loads = true;
    lists.push(failing);
    lists.push(order_list("L2", "s1", vec![201]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("Could not process list Order Line L1"));
    assert_eq!(result.batches.len(), 1);
    assert_eq!(result.batches[0].list_id, "L2");
}

#[test]
fn out_of_window_slots_grow_the_source_before_resolving() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 5, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));

    let mut lists = FakeLists::default();
    let mut list = order_list("L1", "s1", vec![101, 102, 103, 104, 105, 106]);
    list.window = 3; // only the first three slots are materialized
    lists.push(list);

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches[0].updates[0].record_id, 106);
    let list = lists.get("L1");
    assert_eq!(list.window, 6, "window grew to cover the bound slot");
    assert!(list.load_calls >= 2, "initial load plus a reload");
}

#[test]
fn unresolved_record_slots_are_dropped() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 7, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));

    let mut lists = FakeLists::default();
    // Slot 7 is materialized but holds no record.
    lists.push(order_list("L1", "s1", vec![101, 102]));

    let registry = RecordTypeRegistry::builtin();
    let result =
        Reconciler::new(&store, &registry).compute_update_commands("s1", &document, &mut lists);

    assert_eq!(result.batches, vec![]);
    assert_eq!(result.errors, Vec::<String>::new());
}

#[test]
fn reconciliation_is_deterministic() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 1, 0), "L1", 1, "unit_price")
        .unwrap();
    store
        .add_binding(Position::new("s1", 2, 0), "L1", 1, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(1.0, "1"));
    document.set("s1", 1, 0, EvaluatedCell::number(2.0, "2"));
    document.set("s1", 2, 0, EvaluatedCell::number(3.0, "3"));

    let registry = RecordTypeRegistry::builtin();
    let reconciler = Reconciler::new(&store, &registry);

    let mut lists_a = FakeLists::default();
    lists_a.push(order_list("L1", "s1", vec![101, 102]));
    let first = reconciler.compute_update_commands("s1", &document, &mut lists_a);

    let mut lists_b = FakeLists::default();
    lists_b.push(order_list("L1", "s1", vec![101, 102]));
    let second = reconciler.compute_update_commands("s1", &document, &mut lists_b);

    assert_eq!(first, second);
}

#[test]
fn save_is_all_or_nothing_on_conflicts() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 1, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 0, 1), "M1", 0, "quantity")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(1.0, "1"));
    document.set("s1", 1, 0, EvaluatedCell::number(2.0, "2"));
    document.set("s1", 0, 1, EvaluatedCell::number(4.0, "4"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));
    lists.push(FakeList::new(
        ListDescriptor::new("M1", "material.line", "s1", "Material Line M1"),
        vec![7],
        material_line_fields(),
    ));

    let registry = RecordTypeRegistry::builtin();
    let reconciler = Reconciler::new(&store, &registry);
    let mut sink = FakeSink::default();

    let err = save_active_sheet(&reconciler, "s1", &document, &mut lists, &mut sink).unwrap_err();
    match err {
        SaveError::Blocked { messages } => assert_eq!(messages.len(), 1),
        other => panic!("expected a blocked save, got {other:?}"),
    }
    // The clean material.line batch was held back too.
    assert!(sink.writes.is_empty());
}

#[test]
fn save_writes_once_per_record_collection() {
    let mut store = BindingStore::new();
    store
        .add_binding(Position::new("s1", 0, 0), "L1", 0, "quantity")
        .unwrap();
    store
        .add_binding(Position::new("s1", 0, 1), "M1", 0, "description")
        .unwrap();

    let mut document = FakeDocument::default();
    document.set("s1", 0, 0, EvaluatedCell::number(5.0, "5"));
    document.set("s1", 0, 1, EvaluatedCell::text("oak panel"));

    let mut lists = FakeLists::default();
    lists.push(order_list("L1", "s1", vec![101]));
    lists.push(FakeList::new(
        ListDescriptor::new("M1", "material.line", "s1", "Material Line M1"),
        vec![7],
        material_line_fields(),
    ));

    let registry = RecordTypeRegistry::builtin();
    let reconciler = Reconciler::new(&store, &registry);
    let mut sink = FakeSink::default();

    let report = save_active_sheet(&reconciler, "s1", &document, &mut lists, &mut sink).unwrap();
    assert_eq!(report.collections_written, 2);
    assert_eq!(report.records_written, 2);

    assert_eq!(sink.writes.len(), 2);
    // Collections are written in a stable order.
    assert_eq!(sink.writes[0].0, "material.line");
    assert_eq!(sink.writes[1].0, "order.line");
    assert_eq!(
        sink.writes[0].1[0].values,
        values(&[("description", FieldValue::Text("oak panel".to_string()))])
    );
}

#[test]
fn extrapolated_fill_bindings_register_like_manual_ones() {
    let mut store = BindingStore::new();
    let origin_position = Position::new("s1", 2, 0);
    store
        .add_binding(origin_position.clone(), "L1", 0, "quantity")
        .unwrap();

    let origin = store.get_binding(&origin_position).unwrap().clone();
    let target_position = Position::new("s1", 4, 0);
    let derived =
        fieldsync_engine::extrapolate_binding(&origin, &origin_position, &target_position).unwrap();

    let outcome = store
        .add_binding(
            target_position.clone(),
            derived.list_id.clone(),
            derived.index_in_list as i64,
            derived.field_name.clone(),
        )
        .unwrap();
    assert!(!outcome.is_no_op());
    assert_eq!(store.get_binding(&target_position), Some(&derived));
    assert_eq!(derived.index_in_list, 2);

    // Re-deriving and re-registering the same fill is idempotent.
    let again = store
        .add_binding(
            target_position,
            derived.list_id.clone(),
            derived.index_in_list as i64,
            derived.field_name.clone(),
        )
        .unwrap();
    assert!(again.is_no_op());
}
