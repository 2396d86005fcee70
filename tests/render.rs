use serde_json::json;
use trellis::{Config, Engine, ErrorKind};

fn render(source: &str, ctx: serde_json::Value) -> String {
    Engine::new()
        .compile(source)
        .unwrap()
        .render(ctx)
        .unwrap()
}

fn render_err(source: &str, ctx: serde_json::Value) -> String {
    Engine::new()
        .compile(source)
        .unwrap()
        .render(ctx)
        .unwrap_err()
        .to_string()
}

#[test]
fn render_inline_expr_scalars() {
    let ctx = json!({ "b": true, "i": 123, "f": 123.5, "s": "dolor", "n": null });
    assert_eq!(render("{{ b }} {{ i }} {{ f }} {{ s }} [{{ n }}]", ctx), "true 123 123.5 dolor []");
}

#[test]
fn render_inline_expr_map_and_list_index() {
    let ctx = json!({ "ipsum": { "dolor": "sit" }, "list": ["a", "b"] });
    assert_eq!(render("{{ ipsum.dolor }} {{ list.1 }}", ctx), "sit b");
}

#[test]
fn render_inline_expr_undefined_is_empty() {
    assert_eq!(render("[{{ missing }}] [{{ user.name }}]", json!({ "user": {} })), "[] []");
}

#[test]
fn render_inline_expr_err_undefined_strict() {
    let config = Config {
        strict_variables: true,
        ..Config::default()
    };
    let err = Engine::with_config(config)
        .compile("{{ ipsum }}")
        .unwrap()
        .render(json!({}))
        .unwrap_err();
    assert_eq!(err.to_string(), "not found in this scope between bytes 3 and 8");
}

#[test]
fn render_inline_expr_literals() {
    assert_eq!(
        render("{{ 'a' }} {{ \"b\" }} {{ 3.5 }} {{ -2 }} {{ true }} [{{ none }}]", json!({})),
        "a b 3.5 -2 true []"
    );
}

#[test]
fn render_inline_expr_err_unprintable() {
    assert_eq!(
        render_err("{{ ipsum }}", json!({ "ipsum": [1] })),
        "expected printable value, but expression evaluated to list between bytes 3 and 8"
    );
}

#[test]
fn render_filters_and_calls() {
    let ctx = json!({ "name": "  Ann ", "tags": ["a", "b", "c"], "empty": "" });
    assert_eq!(render("{{ name | trim | upper }}", ctx.clone()), "ANN");
    assert_eq!(render("{{ tags | join(', ') }}", ctx.clone()), "a, b, c");
    assert_eq!(render("{{ tags | length }}", ctx.clone()), "3");
    assert_eq!(render("{{ empty | default('none given') }}", ctx.clone()), "none given");
    assert_eq!(render("{{ lower('ABC') }}", ctx), "abc");
}

#[test]
fn render_list_and_map_literals() {
    assert_eq!(render("{{ [1, 2, 3] | length }}", json!({})), "3");
    assert_eq!(render("{{ {a: 1, 'b-c': 2} | length }}", json!({})), "2");
}

#[test]
fn render_err_unknown_function() {
    assert_eq!(
        render_err("{{ ipsum | unknown }}", json!({ "ipsum": true })),
        "unknown function `unknown` between bytes 11 and 18"
    );
}

#[test]
fn render_err_function_arity() {
    assert_eq!(
        render_err("{{ upper() }}", json!({})),
        "function expected 1 argument, found 0 between bytes 3 and 8"
    );
}

#[test]
fn render_err_function_argument_type() {
    assert_eq!(
        render_err("{{ upper(1) }}", json!({})),
        "function expected string argument at position 1, found integer between bytes 3 and 8"
    );
}

#[test]
fn render_if_elseif_else() {
    let source = "{% if a %}A{% elseif b %}B{% else if c %}C{% else %}D{% endif %}";
    assert_eq!(render(source, json!({ "a": true })), "A");
    assert_eq!(render(source, json!({ "b": 1 })), "B");
    assert_eq!(render(source, json!({ "c": "yes" })), "C");
    assert_eq!(render(source, json!({ "a": false, "b": 0, "c": "" })), "D");
}

#[test]
fn render_if_not() {
    let source = "{% if not items %}empty{% else %}full{% endif %}";
    assert_eq!(render(source, json!({ "items": [] })), "empty");
    assert_eq!(render(source, json!({ "items": [1] })), "full");
}

#[test]
fn render_for_loop_with_loop_variable() {
    let source = "{% for x in xs %}{{ loop.index }}:{{ x }}{% if not loop.last %},{% endif %}{% endfor %}";
    assert_eq!(render(source, json!({ "xs": ["a", "b", "c"] })), "1:a,2:b,3:c");
}

#[test]
fn render_for_loop_key_value() {
    let source = "{% for k, v in m %}{{ k }}={{ v }};{% endfor %}";
    assert_eq!(render(source, json!({ "m": { "b": 2, "a": 1 } })), "a=1;b=2;");

    let source = "{% for i, v in xs %}{{ i }}{{ v }}{% endfor %}";
    assert_eq!(render(source, json!({ "xs": ["a", "b"] })), "0a1b");
}

#[test]
fn render_for_loop_nested_shadows() {
    let source = "{% for x in xs %}{% for x in x %}{{ x }}{% endfor %}|{{ loop.index0 }};{% endfor %}";
    assert_eq!(render(source, json!({ "xs": [[1, 2], [3]] })), "12|0;3|1;");
}

#[test]
fn render_for_loop_over_none_is_empty() {
    assert_eq!(render("a{% for x in missing %}{{ x }}{% endfor %}b", json!({})), "ab");
}

#[test]
fn render_for_loop_err_not_iterable() {
    assert_eq!(
        render_err("{% for x in n %}{% endfor %}", json!({ "n": 1 })),
        "expected iterable, but expression evaluated to integer between bytes 12 and 13"
    );
}

#[test]
fn render_whitespace_trim_and_comments() {
    assert_eq!(render("a {{- x -}} b", json!({ "x": "X" })), "aXb");
    assert_eq!(render("a\n  {%- if true -%}\n b {%- endif %}", json!({})), "ab");
    assert_eq!(render("a{# ignored {{ x }} #}b", json!({})), "ab");
}

#[test]
fn render_autoescape() {
    let config = Config {
        autoescape: true,
        ..Config::default()
    };
    let engine = Engine::with_config(config);
    let ctx = json!({ "s": "<b>" });
    let render = |source: &str| engine.compile(source).unwrap().render(&ctx).unwrap();
    assert_eq!(render("{{ s }}"), "&lt;b&gt;");
    assert_eq!(render("{{ s | raw }}"), "<b>");
    assert_eq!(render("{{ s | e }}"), "&lt;b&gt;");
    assert_eq!(render("{{ s | upper | raw }}"), "<B>");
}

#[test]
fn render_no_autoescape_by_default() {
    assert_eq!(render("{{ s }} {{ s | escape }}", json!({ "s": "<b>" })), "<b> &lt;b&gt;");
}

#[test]
fn render_include_shares_context() {
    let mut engine = Engine::new();
    engine.add_template("header", "<h1>{{ title }}</h1>").unwrap();
    engine.add_template("page", "{% include \"header\" %}{{ body }}").unwrap();
    let result = engine
        .get_template("page")
        .unwrap()
        .render(json!({ "title": "Home", "body": "hi" }))
        .unwrap();
    assert_eq!(result, "<h1>Home</h1>hi");
}

#[test]
fn render_include_with_isolates_context() {
    let mut engine = Engine::new();
    engine.add_global("site", "S");
    engine.add_template("item", "{{ site }}:{{ name }}:{{ title }}").unwrap();
    let result = engine
        .compile("{% include \"item\" with {name: 'x'} %}|{{ title }}")
        .unwrap()
        .render(json!({ "title": "T" }))
        .unwrap();
    assert_eq!(result, "S:x:|T");
}

#[test]
fn render_include_with_err_not_a_map() {
    let mut engine = Engine::new();
    engine.add_template("item", "").unwrap();
    let err = engine
        .compile("{% include \"item\" with 1 %}")
        .unwrap()
        .render(json!({}))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "expected map for include variables, but expression evaluated to integer between bytes 11 and 17"
    );
}

#[test]
fn render_include_err_not_found() {
    let err = Engine::new()
        .compile("{% include \"missing\" %}")
        .unwrap()
        .render(json!({}))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound(name) if name == "missing"));
    assert_eq!(err.to_string(), "template `missing` not found between bytes 11 and 20");
}

#[test]
fn render_include_err_names_the_included_template() {
    let mut engine = Engine::new();
    engine.add_template("inner", "{{ nope() }}").unwrap();
    engine.add_template("outer", "{% include \"inner\" %}").unwrap();
    let err = engine.get_template("outer").unwrap().render(json!({})).unwrap_err();
    assert_eq!(err.template_name(), Some("inner"));
    assert_eq!(
        err.to_string(),
        "unknown function `nope` between bytes 3 and 7 in `inner`"
    );
}

#[test]
fn render_include_err_max_depth() {
    let mut engine = Engine::new();
    engine.add_template("loop", "{% include \"loop\" %}").unwrap();
    let err = engine.get_template("loop").unwrap().render(json!({})).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MaxIncludeDepth(64)));
}

#[test]
fn render_to_writer() {
    let mut buf = Vec::new();
    Engine::new()
        .compile("Hello {{ name }}")
        .unwrap()
        .render_to_writer(&mut buf, json!({ "name": "Ann" }))
        .unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "Hello Ann");
}

#[test]
fn render_pretty_error() {
    let err = Engine::new()
        .compile("lorem\n{{ ipsum }}")
        .unwrap()
        .render(json!({ "ipsum": {} }))
        .unwrap_err();
    let expected = "
   |
 2 | {{ ipsum }}
   |    ^^^^^ expected printable value, but expression evaluated to map
";
    assert_eq!(format!("{err:#}"), expected);
}

#[test]
fn render_include_max_depth_counts_nested_includes() {
    let mut engine = Engine::with_config(Config {
        max_include_depth: 2,
        ..Config::default()
    });
    engine.add_template("c", "c").unwrap();
    engine.add_template("b", "b{% include \"c\" %}").unwrap();
    engine.add_template("a", "a{% include \"b\" %}").unwrap();
    let result = engine.get_template("a").unwrap().render(json!({})).unwrap();
    assert_eq!(result, "abc");

    engine.add_template("d", "d{% include \"a\" %}").unwrap();
    let err = engine.get_template("d").unwrap().render(json!({})).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MaxIncludeDepth(2)));
}

#[test]
fn render_raw_text_around_tags() {
    let result = render("<p>{# note #}{{ x }}</p>\n", json!({ "x": 1 }));
    assert_eq!(result, "<p>1</p>\n");
}
