//! Integration tests for query execution.

mod common;

use common::{query, run_query, run_with};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use walkql_runtime::schema::InputObjectDef;
use walkql_runtime::{
    Context, Directive, Document, ExecuteError, ExecutionError, Executor, ExecutorConfig, Field,
    FieldDef, FieldExtra, FieldValue, FragmentDefinition, InputFieldDef, InputValue, InterfaceDef,
    ObjectDef, OperationDefinition, Request, Resolution, ResolverMap, Schema, SchemaBuilder,
    Selection, TypeDef, TypeRef, UnionDef,
};

fn pets_schema() -> Schema {
    SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .field(FieldDef::new("pet", TypeRef::named("Pet")))
                .field(FieldDef::new("named", TypeRef::named("Named")))
                .field(FieldDef::new("a", TypeRef::named("Dog")))
                .field(FieldDef::new("b", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Interface(
            InterfaceDef::new("Named").field(FieldDef::new("name", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Dog")
                .implements("Named")
                .field(FieldDef::new("name", TypeRef::named("String")))
                .field(FieldDef::new("bark", TypeRef::named("String")))
                .field(FieldDef::new("x", TypeRef::named("Int")))
                .field(FieldDef::new("y", TypeRef::named("Int"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Cat")
                .implements("Named")
                .field(FieldDef::new("name", TypeRef::named("String")))
                .field(FieldDef::new("meow", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Union(UnionDef::new("Pet", ["Dog", "Cat"])))
        .build()
}

/// Test fields sharing a response key merge into one object.
#[tokio::test]
async fn test_merges_repeated_fields() {
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "a", |_parent, _args, _ctx, _info| Ok(json!({"x": 1, "y": 2})));

    let response = run_query(
        pets_schema(),
        resolvers,
        vec![
            Selection::field(Field::new("a").with_selections(vec![Selection::leaf("x")])),
            Selection::field(Field::new("a").with_selections(vec![Selection::leaf("y")])),
        ],
    )
    .await;

    assert_eq!(response.data, json!({"a": {"x": 1, "y": 2}}));
    assert_eq!(
        serde_json::to_string(&response.data).unwrap(),
        r#"{"a":{"x":1,"y":2}}"#
    );
}

/// Test `@skip` and `@include` remove fields.
#[tokio::test]
async fn test_conditional_inclusion() {
    let root = json!({"a": {"x": 1}, "b": "kept"});

    for directive in [Directive::skip(true), Directive::include(false)] {
        let request = query(vec![
            Selection::field(
                Field::new("a")
                    .with_directive(directive)
                    .with_selections(vec![Selection::leaf("x")]),
            ),
            Selection::leaf("b"),
        ])
        .with_root_value(root.clone());

        let response = run_with(pets_schema(), ResolverMap::new(), ExecutorConfig::default(), request).await;
        assert_eq!(response.data, json!({"b": "kept"}));
    }
}

/// Test type conditions are tested against the runtime type.
#[tokio::test]
async fn test_only_matching_fragment_runs() {
    let barks = Arc::new(AtomicUsize::new(0));
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "pet", |_parent, _args, _ctx, _info| {
        Ok(json!({"__typename": "Cat", "meow": "mrrp"}))
    });
    let counter = Arc::clone(&barks);
    resolvers.register_fn("Dog", "bark", move |_parent, _args, _ctx, _info| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!("woof"))
    });

    let response = run_query(
        pets_schema(),
        resolvers,
        vec![Selection::field(Field::new("pet").with_selections(vec![
            Selection::inline(Some("Dog"), vec![Selection::leaf("bark")]),
            Selection::inline(Some("Cat"), vec![Selection::leaf("meow")]),
        ]))],
    )
    .await;

    assert_eq!(response.data, json!({"pet": {"meow": "mrrp"}}));
    assert_eq!(barks.load(Ordering::SeqCst), 0);
}

/// Test interface fields complete against the concrete type.
#[tokio::test]
async fn test_interface_resolution() {
    let document = Document::new()
        .with_operation(OperationDefinition::query(vec![Selection::field(
            Field::new("named").with_selections(vec![
                Selection::leaf("__typename"),
                Selection::leaf("name"),
                Selection::spread("DogBits"),
                Selection::inline(Some("Cat"), vec![Selection::leaf("meow")]),
            ]),
        )]))
        .with_fragment(FragmentDefinition::new("DogBits", "Dog", vec![Selection::leaf("bark")]));
    let request = Request::new(document).with_root_value(json!({
        "named": {"__typename": "Dog", "name": "Rex", "bark": "woof", "meow": "never"}
    }));

    let response = run_with(pets_schema(), ResolverMap::new(), ExecutorConfig::default(), request).await;
    assert_eq!(
        response.data,
        json!({"named": {"__typename": "Dog", "name": "Rex", "bark": "woof"}})
    );
}

/// Test a registered type resolver decides the concrete type.
#[tokio::test]
async fn test_registered_type_resolver() {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query").field(FieldDef::new("pets", TypeRef::list(TypeRef::named("Pet")))),
        ))
        .add_type(TypeDef::Object(ObjectDef::new("Dog").field(FieldDef::new("bark", TypeRef::named("String")))))
        .add_type(TypeDef::Object(ObjectDef::new("Cat").field(FieldDef::new("meow", TypeRef::named("String")))))
        .add_type(TypeDef::Union(UnionDef::new("Pet", ["Dog", "Cat"])))
        .type_resolver("Pet", |value, _ctx| {
            let name = if value.get("meow").is_some() { "Cat" } else { "Dog" };
            Some(name.to_string())
        })
        .build();
    let request = query(vec![Selection::field(Field::new("pets").with_selections(vec![
        Selection::leaf("__typename"),
        Selection::inline(Some("Dog"), vec![Selection::leaf("bark")]),
        Selection::inline(Some("Cat"), vec![Selection::leaf("meow")]),
    ]))])
    .with_root_value(json!({"pets": [{"meow": "hi"}, {"bark": "yo"}]}));

    let response = run_with(schema, ResolverMap::new(), ExecutorConfig::default(), request).await;
    assert_eq!(
        response.data,
        json!({"pets": [
            {"__typename": "Cat", "meow": "hi"},
            {"__typename": "Dog", "bark": "yo"}
        ]})
    );
}

/// Test a value that resolves to no possible type is an application error.
#[tokio::test]
async fn test_unresolvable_abstract_type() {
    let request = query(vec![Selection::field(
        Field::new("pet").with_selections(vec![Selection::leaf("__typename")]),
    )])
    .with_root_value(json!({"pet": {"__typename": "Query"}}));

    let response = run_with(pets_schema(), ResolverMap::new(), ExecutorConfig::default(), request).await;
    assert_eq!(response.data, json!({"pet": null}));
    assert_eq!(
        response.errors[0].message,
        "Abstract type \"Pet\" must resolve to an Object type at runtime for field \"Query.pet\"."
    );
}

fn list_schema() -> Schema {
    SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .field(FieldDef::new("numbers", TypeRef::list(TypeRef::required("Int"))))
                .field(FieldDef::new("items", TypeRef::list(TypeRef::named("Item")))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Item")
                .field(FieldDef::new("id", TypeRef::required("ID")))
                .field(FieldDef::new("label", TypeRef::named("String"))),
        ))
        .build()
}

/// Test list order is positional under out-of-order settlement.
#[tokio::test]
async fn test_list_order_is_positional() {
    let mut resolvers = ResolverMap::new();
    resolvers.register_resolution("Query", "numbers", |_parent, _args, _ctx, _info| {
        FieldValue::list((0..4u64).map(|i| {
            Resolution::pending(async move {
                tokio::time::sleep(Duration::from_millis((4 - i) * 5)).await;
                FieldValue::from(json!(i))
            })
        }))
        .into()
    });

    let response = run_query(list_schema(), resolvers, vec![Selection::leaf("numbers")]).await;
    assert_eq!(response.data, json!({"numbers": [0, 1, 2, 3]}));
}

/// Test deferred child resolvers under list items.
#[tokio::test]
async fn test_async_fields_under_list_items() {
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "items", |_parent, _args, _ctx, _info| {
        Ok(json!([{"id": 1}, {"id": 2}, {"id": 3}]))
    });
    resolvers.register_async("Item", "label", |parent, _args, _ctx, _info| async move {
        let id = parent["id"].as_u64().unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(20 - id * 5)).await;
        Ok(json!(format!("item-{id}")))
    });

    let response = run_query(
        list_schema(),
        resolvers,
        vec![Selection::field(
            Field::new("items").with_selections(vec![Selection::leaf("id"), Selection::leaf("label")]),
        )],
    )
    .await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "items": [
          {
            "id": "1",
            "label": "item-1"
          },
          {
            "id": "2",
            "label": "item-2"
          },
          {
            "id": "3",
            "label": "item-3"
          }
        ]
      }
    }
    "###);
}

/// Test the same inputs produce the same response.
#[tokio::test]
async fn test_execution_is_deterministic() {
    let executor = Executor::new();
    let schema = Arc::new(list_schema());
    let request = query(vec![Selection::field(
        Field::new("items").with_selections(vec![Selection::leaf("label"), Selection::leaf("id")]),
    )])
    .with_root_value(json!({"items": [{"id": 1, "label": "a"}, {"id": null}, null]}));

    let first = executor.execute(Arc::clone(&schema), request.clone()).await.unwrap();
    let second = executor.execute(schema, request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.data,
        json!({"items": [{"label": "a", "id": "1"}, null, null]})
    );
    assert_eq!(first.errors.len(), 1);
}

/// Test mutation root fields run one after another.
#[tokio::test]
async fn test_mutation_fields_run_serially() {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .mutation_type("Mutation")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .field(FieldDef::new("first", TypeRef::named("Int")))
                .field(FieldDef::new("second", TypeRef::named("Int"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Mutation")
                .field(FieldDef::new("first", TypeRef::named("Int")))
                .field(FieldDef::new("second", TypeRef::named("Int"))),
        ))
        .build();

    let resolvers = |order: Arc<Mutex<Vec<&'static str>>>| {
        let mut resolvers = ResolverMap::new();
        for (type_name, field, delay, value) in [
            ("Mutation", "first", 20, 1),
            ("Mutation", "second", 0, 2),
            ("Query", "first", 20, 1),
            ("Query", "second", 0, 2),
        ] {
            let order = Arc::clone(&order);
            resolvers.register_async(type_name, field, move |_parent, _args, _ctx, _info| {
                let order = Arc::clone(&order);
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    order.lock().push(field);
                    Ok(json!(value))
                }
            });
        }
        resolvers
    };
    let selections = vec![Selection::leaf("first"), Selection::leaf("second")];

    let order = Arc::new(Mutex::new(Vec::new()));
    let request = Request::new(Document::new().with_operation(OperationDefinition::mutation(selections.clone())));
    let response = run_with(schema.clone(), resolvers(Arc::clone(&order)), ExecutorConfig::default(), request).await;
    assert_eq!(response.data, json!({"first": 1, "second": 2}));
    assert_eq!(*order.lock(), vec!["first", "second"]);

    let order = Arc::new(Mutex::new(Vec::new()));
    let response = run_with(schema, resolvers(Arc::clone(&order)), ExecutorConfig::default(), query(selections)).await;
    assert_eq!(response.data, json!({"first": 1, "second": 2}));
    assert_eq!(*order.lock(), vec!["second", "first"]);
}

fn greeting_schema() -> Schema {
    SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .field(
                    FieldDef::new("greet", TypeRef::named("String")).argument(
                        InputFieldDef::new("name", TypeRef::named("String")).default_value(json!("world")),
                    ),
                )
                .field(
                    FieldDef::new("inspect", TypeRef::named("String"))
                        .extra(FieldExtra::AstNode)
                        .extra(FieldExtra::Errors),
                ),
        ))
        .build()
}

fn greeting_resolvers() -> ResolverMap {
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "greet", |_parent, args, _ctx, _info| {
        let name: String = args.require("name")?;
        Ok(json!(format!("hello {name}")))
    });
    resolvers.register_fn("Query", "inspect", |_parent, args, _ctx, _info| {
        if let Some(errors) = args.errors() {
            errors.push(ExecutionError::new("partial result"));
        }
        let key = args.node().map(|node| node.response_key().to_string());
        Ok(json!(key))
    });
    resolvers
}

/// Test variables, operation defaults and argument defaults.
#[tokio::test]
async fn test_arguments_and_variables() {
    let greet = || Selection::field(Field::new("greet").with_argument("name", InputValue::variable("who")));

    let document = |default: Option<InputValue>| {
        Document::new().with_operation(OperationDefinition::query(vec![greet()]).with_variable("who", default))
    };

    let response = run_with(
        greeting_schema(),
        greeting_resolvers(),
        ExecutorConfig::default(),
        Request::new(document(None)),
    )
    .await;
    assert_eq!(response.data, json!({"greet": "hello world"}));

    let response = run_with(
        greeting_schema(),
        greeting_resolvers(),
        ExecutorConfig::default(),
        Request::new(document(Some(InputValue::from("Bob")))),
    )
    .await;
    assert_eq!(response.data, json!({"greet": "hello Bob"}));

    let variables = HashMap::from([("who".to_string(), json!("Ann"))]);
    let response = run_with(
        greeting_schema(),
        greeting_resolvers(),
        ExecutorConfig::default(),
        Request::new(document(Some(InputValue::from("Bob")))).with_variables(variables),
    )
    .await;
    assert_eq!(response.data, json!({"greet": "hello Ann"}));
}

/// Test declared extras reach the resolver.
#[tokio::test]
async fn test_field_extras() {
    let response = run_query(
        greeting_schema(),
        greeting_resolvers(),
        vec![Selection::field(Field::new("inspect").with_alias("seen").at(1, 3))],
    )
    .await;

    assert_eq!(response.data, json!({"seen": "seen"}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        serde_json::to_value(&response.errors[0]).unwrap(),
        json!({"message": "partial result", "locations": [{"line": 1, "column": 3}], "path": ["seen"]})
    );
}

/// Test authorizers can hide or reject objects.
#[tokio::test]
async fn test_authorization() {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .field(FieldDef::new("secret", TypeRef::named("Secret")))
                .field(FieldDef::new("guarded", TypeRef::named("Guarded"))),
        ))
        .add_type(TypeDef::Object(ObjectDef::new("Secret").field(FieldDef::new("v", TypeRef::named("Int")))))
        .add_type(TypeDef::Object(ObjectDef::new("Guarded").field(FieldDef::new("v", TypeRef::named("Int")))))
        .build();

    let mut resolvers = ResolverMap::new();
    resolvers.register_authorizer("Secret", |_ty: &ObjectDef, value: Value, ctx: &Context| {
        if ctx.get::<bool>("admin") == Some(true) {
            Resolution::ready(value)
        } else {
            Resolution::ready(Value::Null)
        }
    });
    resolvers.register_authorizer("Guarded", |_ty: &ObjectDef, _value: Value, _ctx: &Context| {
        Resolution::pending(async { FieldValue::from(ExecutionError::new("forbidden")) })
    });

    let selections = vec![
        Selection::field(Field::new("secret").with_selections(vec![Selection::leaf("v")])),
        Selection::field(Field::new("guarded").with_selections(vec![Selection::leaf("v")])),
    ];
    let root = json!({"secret": {"v": 1}, "guarded": {"v": 2}});

    let response = run_with(
        schema.clone(),
        ResolverMap::new(),
        ExecutorConfig::default(),
        query(selections.clone()).with_root_value(root.clone()),
    )
    .await;
    assert_eq!(response.data, json!({"secret": {"v": 1}, "guarded": {"v": 2}}));

    let response = run_with(
        schema,
        resolvers,
        ExecutorConfig::default(),
        query(selections).with_root_value(root),
    )
    .await;
    assert_eq!(response.data, json!({"secret": null, "guarded": null}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "forbidden");
}

/// Test a bounded scheduler and serial dispatch give the same result.
#[tokio::test]
async fn test_serial_dispatch_matches_parallel() {
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "items", |_parent, _args, _ctx, _info| {
        Ok(json!([{"id": 1}, {"id": 2}]))
    });
    resolvers.register_async("Item", "label", |parent, _args, _ctx, _info| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(json!(parent["id"].to_string()))
    });
    let selections = vec![Selection::field(
        Field::new("items").with_selections(vec![Selection::leaf("id"), Selection::leaf("label")]),
    )];

    let response = run_with(
        list_schema(),
        resolvers,
        ExecutorConfig::default()
            .with_max_parallel_depth(0)
            .with_max_concurrent_resolvers(1)
            .with_tracing(true),
        query(selections),
    )
    .await;

    assert_eq!(
        response.data,
        json!({"items": [{"id": "1", "label": "1"}, {"id": "2", "label": "2"}]})
    );
}

/// Test internal faults abort execution.
#[tokio::test]
async fn test_faults_abort() {
    let executor = Executor::new();
    let schema = Arc::new(pets_schema());

    let result = executor
        .execute(Arc::clone(&schema), query(vec![Selection::spread("Missing")]))
        .await;
    assert!(matches!(result, Err(ExecuteError::UnknownFragment(name)) if name == "Missing"));

    let result = executor
        .execute(
            Arc::clone(&schema),
            query(vec![Selection::field(
                Field::new("a").with_selections(vec![Selection::leaf("nope")]),
            )])
            .with_root_value(json!({"a": {}})),
        )
        .await;
    assert!(matches!(result, Err(ExecuteError::UnknownField { type_name, .. }) if type_name == "Dog"));

    let two = Document::new()
        .with_operation(OperationDefinition::query(vec![]).with_name("A"))
        .with_operation(OperationDefinition::query(vec![]).with_name("B"));
    let result = executor.execute(Arc::clone(&schema), Request::new(two.clone())).await;
    assert!(matches!(result, Err(ExecuteError::AmbiguousOperation)));
    let result = executor
        .execute(schema, Request::new(two).with_operation_name("B"))
        .await;
    assert_eq!(result.unwrap().data, json!({}));

    let input_schema = SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query").field(FieldDef::new("filter", TypeRef::named("Filter"))),
        ))
        .add_type(TypeDef::InputObject(
            InputObjectDef::new("Filter").field(InputFieldDef::new("a", TypeRef::named("Int"))),
        ))
        .build();
    let result = executor
        .execute(
            Arc::new(input_schema),
            query(vec![Selection::leaf("filter")]).with_root_value(json!({"filter": {"a": 1}})),
        )
        .await;
    assert!(matches!(
        result,
        Err(ExecuteError::UnhandledTypeKind { kind: "input object", type_name }) if type_name == "Filter"
    ));
}

/// Test a fault cancels work still pending elsewhere in the tree.
#[tokio::test]
async fn test_fault_cancels_pending_resolvers() {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .field(FieldDef::new("a", TypeRef::named("Obj")))
                .field(FieldDef::new("b", TypeRef::named("Obj"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Obj")
                .field(FieldDef::new("x", TypeRef::named("Int")))
                .field(FieldDef::new("y", TypeRef::named("Int"))),
        ))
        .build();

    let effects = Arc::new(AtomicUsize::new(0));
    let mut resolvers = ResolverMap::new();
    let counter = Arc::clone(&effects);
    resolvers.register_async("Obj", "x", move |_parent, _args, _ctx, _info| {
        let counter = Arc::clone(&counter);
        async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(1))
        }
    });

    let request = query(vec![
        Selection::field(Field::new("b").with_selections(vec![Selection::leaf("nope")])),
        Selection::field(
            Field::new("a").with_selections(vec![Selection::leaf("x"), Selection::leaf("y")]),
        ),
    ])
    .with_root_value(json!({"a": {"y": 2}, "b": {}}));

    let result = Executor::with_resolvers(resolvers)
        .execute(Arc::new(schema), request)
        .await;
    assert!(matches!(result, Err(ExecuteError::UnknownField { type_name, .. }) if type_name == "Obj"));
    assert_eq!(effects.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(effects.load(Ordering::SeqCst), 0);
}
