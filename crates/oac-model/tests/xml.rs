mod common;

use expect_test::expect;
use oac_engine::AnyValue;
use oac_model::anyvalue_items::variable_value;
use oac_model::items::{self, tags};
use oac_model::xml::{export_procedure, import_procedure};
use oac_model::{ItemCatalogue, SessionModel, Variant};

const PROCEDURE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Procedure xmlns="http://codac.iter.org/sup/oac-tree" name="demo">
  <RegisterType jsontype='{"type":"Pair","attributes":[{"a":{"type":"int32"}}]}'/>
  <Sequence isRoot="true">
    <Wait timeout="0.5"/>
    <Message text="done &amp; dusted"/>
  </Sequence>
  <Workspace>
    <Local name="var0" type='{"type":"uint32"}' value="42"/>
  </Workspace>
</Procedure>
"#;

fn import(xml: &str) -> (SessionModel, oac_model::ItemId) {
    let mut model = SessionModel::new();
    let root = model.root();
    let procedure = import_procedure(
        xml,
        &mut model,
        &ItemCatalogue::standard(),
        root,
        tags::PROCEDURES,
    )
    .unwrap();
    (model, procedure)
}

#[test]
fn import_builds_typed_items() {
    let (model, procedure) = import(PROCEDURE_XML);
    let top = items::top_instructions(&model, procedure).unwrap();
    assert_eq!(top.len(), 1);
    let children = model.children(top[0], tags::INSTRUCTIONS);
    assert_eq!(model.model_type(children[0]), Some("Wait"));
    assert_eq!(
        model.attribute(children[0], "timeout"),
        Some(&Variant::Double(0.5))
    );
    assert_eq!(
        model.attribute(children[1], "text"),
        Some(&Variant::Str("done & dusted".into()))
    );

    let variables = items::variable_items(&model, procedure).unwrap();
    assert_eq!(items::variable_name(&model, variables[0]).as_deref(), Some("var0"));
    assert_eq!(
        variable_value(&model, variables[0]).unwrap(),
        AnyValue::UInt32(42)
    );
    let preamble = items::preamble_item(&model, procedure).unwrap();
    assert_eq!(model.children(preamble, tags::TYPE_REGISTRATIONS).len(), 1);
}

#[test]
fn export_snapshot_and_round_trip() {
    let (model, procedure) = import(PROCEDURE_XML);
    let exported = export_procedure(&model, procedure).unwrap();
    expect![[r#"
<?xml version="1.0" encoding="UTF-8"?>
<Procedure>
  <RegisterType jsontype="{&quot;type&quot;:&quot;Pair&quot;,&quot;attributes&quot;:[{&quot;a&quot;:{&quot;type&quot;:&quot;int32&quot;}}]}"/>
  <Sequence isRoot="true">
    <Wait timeout="0.5"/>
    <Message text="done &amp; dusted"/>
  </Sequence>
  <Workspace>
    <Local name="var0" type="{&quot;type&quot;:&quot;uint32&quot;}" value="42"/>
  </Workspace>
</Procedure>
"#]]
    .assert_eq(&exported);

    let (again, again_procedure) = import(&exported);
    assert_eq!(export_procedure(&again, again_procedure).unwrap(), exported);
}

#[test]
fn registered_struct_type_resolves_variable_value() {
    let xml = r#"<Procedure>
  <RegisterType jsontype='{"type":"Pair","attributes":[{"a":{"type":"int32"}},{"b":{"type":"bool"}}]}'/>
  <Workspace>
    <Local name="pair" type='{"type":"Pair"}' value='{"a":3,"b":true}'/>
  </Workspace>
</Procedure>"#;
    let (model, procedure) = import(xml);
    let variable = items::variable_items(&model, procedure).unwrap()[0];
    let value = variable_value(&model, variable).unwrap();
    assert_eq!(value.child("a"), Some(&AnyValue::Int32(3)));
    assert_eq!(value.child("b"), Some(&AnyValue::Bool(true)));
    assert!(model.attribute(variable, "type").is_none());
}

#[test]
fn unknown_types_survive_the_round_trip() {
    let xml = r#"<Procedure>
  <PvAccessRead channel="X:Y" outputVar="out"/>
  <Workspace>
    <ChannelAccessClient name="out" channel="X:Y" type='{"type":"Unregistered"}'/>
  </Workspace>
</Procedure>"#;
    let (model, procedure) = import(xml);
    let exported = export_procedure(&model, procedure).unwrap();
    expect![[r#"
<?xml version="1.0" encoding="UTF-8"?>
<Procedure>
  <PvAccessRead channel="X:Y" outputVar="out"/>
  <Workspace>
    <ChannelAccessClient name="out" channel="X:Y" type="{&quot;type&quot;:&quot;Unregistered&quot;}"/>
  </Workspace>
</Procedure>
"#]]
    .assert_eq(&exported);
}
