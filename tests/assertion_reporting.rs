use dom_fixture::{
    AssertionFailure, DocumentSource, Fixture, FixtureOptions, Result, ScriptSource, Value,
};

fn collecting_fixture() -> Fixture {
    let options = FixtureOptions::new(DocumentSource::html("<ul id=\"list\"></ul>"))
        .continue_on_fail(true)
        .script(ScriptSource::native("widgets", |window| {
            window.set_global("$", Value::object(vec![("version", Value::from("3.7"))]));
            Ok(())
        }));
    Fixture::new(options)
}

fn messages(failures: &[AssertionFailure]) -> Vec<&str> {
    failures.iter().map(|failure| failure.message.as_str()).collect()
}

#[test]
fn strict_and_loose_equality_disagree_on_coerced_values() -> Result<()> {
    let mut fixture = collecting_fixture();
    fixture.add_test("coercion", |ctx| {
        let assert = &ctx.assert;
        assert.are_equal(5, "5", None);
        assert.are_pseudo_equal(5, "5", None);
        assert.are_pseudo_equal(Value::Null, Value::Undefined, None);
        assert.are_not_equal(0, false, None);
        assert.are_not_pseudo_equal(0, false, None);
        Ok(())
    });

    let summary = fixture.run()?;
    assert_eq!(
        messages(&summary.failures),
        vec![
            "Value [5] expected but was [5]",
            "Pseudo value [0] was not expected",
        ]
    );
    Ok(())
}

#[test]
fn boolean_and_truthiness_checks_report_default_messages() -> Result<()> {
    let mut fixture = collecting_fixture();
    fixture.add_test("truthiness", |ctx| {
        let assert = &ctx.assert;
        assert.is_true(1, None);
        assert.is_true("yes", None);
        assert.is_false("", None);
        assert.is_truthy(Value::empty_object(), None);
        assert.is_truthy(0, None);
        assert.is_falsey(f64::NAN, None);
        assert.is_falsey("0", None);
        Ok(())
    });

    let summary = fixture.run()?;
    assert_eq!(
        messages(&summary.failures),
        vec![
            "True expected but was false",
            "Truthy value expected but was falsey",
            "Falsey value expected but was truthy",
        ]
    );
    Ok(())
}

#[test]
fn property_checks_see_library_handle_and_custom_messages_win() -> Result<()> {
    let mut fixture = collecting_fixture();
    fixture.add_test("properties", |ctx| {
        let library = ctx.ui_library.clone();
        ctx.assert.has_property(library.clone(), "version", None);
        ctx.assert.has_property(library, "plugins", None);
        ctx.assert
            .has_property(Value::empty_object(), "id", Some("widget id missing"));
        ctx.assert.fail(None);
        ctx.assert.fail(Some(""));
        Ok(())
    });

    let summary = fixture.run()?;
    assert_eq!(
        messages(&summary.failures),
        vec![
            "Object property [plugins] expected but was not found",
            "widget id missing",
            "Assertion failed",
            "Assertion failed",
        ]
    );
    assert!(
        summary
            .failures
            .iter()
            .all(|failure| failure.test == "properties")
    );
    Ok(())
}

#[test]
fn collected_failures_are_traced_with_test_description() -> Result<()> {
    let mut fixture = collecting_fixture();
    fixture.add_test("traced", |ctx| {
        ctx.assert.are_equal("a", "b", Some("letters differ"));
        Ok(())
    });

    fixture.run()?;
    let logs = fixture.take_trace_logs();
    assert!(logs.contains(&"[assert] traced: letters differ".to_string()));
    Ok(())
}
