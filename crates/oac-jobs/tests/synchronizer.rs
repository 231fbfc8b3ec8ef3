use std::cell::RefCell;
use std::rc::Rc;

use oac_engine::anyvalue::json::parse_type;
use oac_engine::{AnyValue, TypeRegistry, VariableRegistry, Workspace};
use oac_jobs::{VariableUpdate, WorkspaceSynchronizer};
use oac_model::anyvalue_items::{set_variable_value, variable_value};
use oac_model::items::{self, props, tags};
use oac_model::{ItemCatalogue, ItemId, SessionModel, Variant};

type Writes = Rc<RefCell<Vec<(String, AnyValue)>>>;

struct SyncFixture {
    model: SessionModel,
    workspace: ItemId,
    variable: ItemId,
    writes: Writes,
    sync: WorkspaceSynchronizer,
}

impl SyncFixture {
    fn new(initial: &AnyValue) -> Self {
        let mut model = SessionModel::new();
        let root = model.root();
        let procedure = items::create_procedure(&mut model, root, tags::PROCEDURES).unwrap();
        let workspace = items::workspace_item(&model, procedure).unwrap();
        let variable = ItemCatalogue::standard()
            .new_variable(&mut model, "Local")
            .unwrap();
        model.set_attribute(variable, "name", "v").unwrap();
        model.append_item(variable, workspace, tags::VARIABLES).unwrap();
        set_variable_value(&mut model, variable, initial).unwrap();

        let writes: Writes = Rc::default();
        let sink = Rc::clone(&writes);
        let mut sync = WorkspaceSynchronizer::with_writer(
            &mut model,
            workspace,
            Box::new(move |name, value| sink.borrow_mut().push((name.to_string(), value.clone()))),
        );
        sync.start(&mut model).unwrap();
        Self {
            model,
            workspace,
            variable,
            writes,
            sync,
        }
    }

    fn value_item(&self) -> ItemId {
        items::anyvalue_item(&self.model, self.variable).unwrap()
    }
}

fn pair(a: i32) -> AnyValue {
    let ty = parse_type(
        r#"{"type":"Pair","attributes":[{"a":{"type":"int32"}},{"b":{"type":"int32"}}]}"#,
        &TypeRegistry::new(),
    )
    .unwrap();
    let AnyValue::Struct(mut value) = AnyValue::default_for(&ty) else {
        panic!("struct expected");
    };
    value.fields.insert("a".into(), AnyValue::Int32(a));
    AnyValue::Struct(value)
}

#[test]
fn domain_update_is_not_echoed() {
    let mut fixture = SyncFixture::new(&AnyValue::Int32(0));
    fixture
        .sync
        .process_event_from_domain(
            &mut fixture.model,
            &VariableUpdate {
                name: "v".into(),
                value: AnyValue::Int32(5),
                connected: true,
            },
        )
        .unwrap();
    assert!(fixture.writes.borrow().is_empty());
    assert_eq!(
        variable_value(&fixture.model, fixture.variable).unwrap(),
        AnyValue::Int32(5)
    );
    assert!(items::is_available(&fixture.model, fixture.variable));
}

#[test]
fn item_edit_is_forwarded_once() {
    let mut fixture = SyncFixture::new(&AnyValue::Int32(0));
    let leaf = fixture.value_item();
    fixture
        .model
        .set_data(leaf, props::VALUE, Variant::Int(7))
        .unwrap();
    assert_eq!(
        *fixture.writes.borrow(),
        [("v".to_string(), AnyValue::Int32(7))]
    );
}

#[test]
fn struct_member_edit_forwards_the_whole_value() {
    let mut fixture = SyncFixture::new(&pair(1));
    let root = fixture.value_item();
    let member = fixture.model.children(root, tags::FIELDS)[0];
    fixture
        .model
        .set_data(member, props::VALUE, Variant::Int(9))
        .unwrap();
    assert_eq!(*fixture.writes.borrow(), [("v".to_string(), pair(9))]);
}

#[test]
fn replaced_subtree_is_still_tracked() {
    let mut fixture = SyncFixture::new(&AnyValue::Int32(0));
    fixture
        .sync
        .process_event_from_domain(
            &mut fixture.model,
            &VariableUpdate {
                name: "v".into(),
                value: pair(2),
                connected: true,
            },
        )
        .unwrap();
    assert!(fixture.writes.borrow().is_empty());

    let root = fixture.value_item();
    let member = fixture.model.children(root, tags::FIELDS)[1];
    fixture
        .model
        .set_data(member, props::VALUE, Variant::Int(4))
        .unwrap();
    let writes = fixture.writes.borrow();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1.child("b"), Some(&AnyValue::Int32(4)));
}

#[test]
fn disconnected_update_only_clears_availability() {
    let mut fixture = SyncFixture::new(&AnyValue::Int32(3));
    fixture
        .sync
        .process_event_from_domain(
            &mut fixture.model,
            &VariableUpdate {
                name: "v".into(),
                value: AnyValue::Int32(99),
                connected: false,
            },
        )
        .unwrap();
    assert!(!items::is_available(&fixture.model, fixture.variable));
    assert_eq!(
        variable_value(&fixture.model, fixture.variable).unwrap(),
        AnyValue::Int32(3)
    );
}

#[test]
fn unknown_variable_is_dropped() {
    let mut fixture = SyncFixture::new(&AnyValue::Int32(0));
    fixture
        .sync
        .process_event_from_domain(
            &mut fixture.model,
            &VariableUpdate {
                name: "ghost".into(),
                value: AnyValue::Int32(1),
                connected: true,
            },
        )
        .unwrap();
    assert_eq!(
        variable_value(&fixture.model, fixture.variable).unwrap(),
        AnyValue::Int32(0)
    );
    assert_eq!(fixture.workspace, fixture.sync.workspace_item());
}

#[test]
fn live_workspace_receives_item_edits() {
    let mut model = SessionModel::new();
    let root = model.root();
    let procedure = items::create_procedure(&mut model, root, tags::PROCEDURES).unwrap();
    let workspace_item = items::workspace_item(&model, procedure).unwrap();
    let variable = ItemCatalogue::standard()
        .new_variable(&mut model, "Local")
        .unwrap();
    model.set_attribute(variable, "name", "count").unwrap();
    model
        .append_item(variable, workspace_item, tags::VARIABLES)
        .unwrap();

    let domain = Workspace::new();
    let mut local = VariableRegistry::with_standard().create("Local").unwrap();
    local.set_attribute("name", "count");
    local.set_attribute("type", r#"{"type":"uint16"}"#);
    local.set_attribute("value", "5");
    domain.add_variable(local).unwrap();

    let mut sync = WorkspaceSynchronizer::for_workspace(&mut model, workspace_item, domain.clone());
    sync.start(&mut model).unwrap();
    assert!(sync.is_started());
    assert_eq!(variable_value(&model, variable).unwrap(), AnyValue::UInt16(5));
    assert!(items::is_available(&model, variable));

    let leaf = items::anyvalue_item(&model, variable).unwrap();
    model.set_data(leaf, props::VALUE, Variant::UInt(6)).unwrap();
    assert_eq!(domain.get_value("count"), Some(AnyValue::UInt16(6)));

    sync.shutdown(&mut model).unwrap();
    assert!(!items::is_available(&model, variable));
    assert!(!domain.is_setup());
}

#[test]
fn start_rejects_mismatched_workspaces() {
    let mut model = SessionModel::new();
    let root = model.root();
    let procedure = items::create_procedure(&mut model, root, tags::PROCEDURES).unwrap();
    let workspace_item = items::workspace_item(&model, procedure).unwrap();

    let domain = Workspace::new();
    let mut local = VariableRegistry::with_standard().create("Local").unwrap();
    local.set_attribute("name", "extra");
    domain.add_variable(local).unwrap();

    let mut sync = WorkspaceSynchronizer::for_workspace(&mut model, workspace_item, domain);
    assert!(matches!(
        sync.start(&mut model),
        Err(oac_jobs::JobError::WorkspaceMismatch(_))
    ));
    assert!(!sync.is_started());
}
