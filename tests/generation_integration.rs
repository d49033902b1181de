use serde_json::{json, Value as JsonValue};

use schema_typegen::fragment::{parse_field, ParseContext};
use schema_typegen::snapshot::classify_field;
use schema_typegen::{
    generate_types_from_json, generate_typescript, GenerationOptions, ModelTypeSet, TypegenError,
};

fn lean_field(key: &str, raw: JsonValue) -> Option<String> {
    parse_field(key, &classify_field(&raw), ParseContext::default()).expect("field renders")
}

fn generate(snapshot: JsonValue) -> Vec<ModelTypeSet> {
    generate_types_from_json(&snapshot.to_string(), &GenerationOptions::default())
        .expect("generation succeeds")
        .models
}

#[test]
fn required_string_field() {
    assert_eq!(
        lean_field("email", json!({"type": "String", "required": true})).as_deref(),
        Some("email: string;")
    );
}

#[test]
fn geospatial_array_is_optional() {
    assert_eq!(
        lean_field("loc", json!({"type": ["Number"], "index": "2dsphere"})).as_deref(),
        Some("loc?: number[];")
    );
}

#[test]
fn typed_array_is_required() {
    assert_eq!(
        lean_field("tags", json!({"type": ["Number"]})).as_deref(),
        Some("tags: number[];")
    );
}

#[test]
fn mixed_field_is_optional_any() {
    assert_eq!(
        lean_field("metadata", json!("Mixed")).as_deref(),
        Some("metadata?: any;")
    );
}

#[test]
fn lean_reference_is_id_or_model() {
    assert_eq!(
        lean_field("owner", json!({"type": "ObjectId", "ref": "User"})).as_deref(),
        Some("owner?: User[\"_id\"] | User;")
    );
}

#[test]
fn required_enum_is_literal_union() {
    assert_eq!(
        lean_field("status", json!({"enum": ["a", "b"], "type": "String", "required": true}))
            .as_deref(),
        Some("status: \"a\" | \"b\";")
    );
}

#[test]
fn required_flag_never_makes_scalars_optional() {
    for marker in ["String", "Number", "Boolean", "Date", "Buffer", "Decimal128", "ObjectId"] {
        let line = lean_field("value", json!({"type": marker, "required": true})).unwrap();
        assert!(line.starts_with("value: "), "{marker}: {line}");
    }
}

#[test]
fn geospatial_arrays_are_optional_regardless_of_other_flags() {
    for extra in [
        json!({}),
        json!({"required": true}),
        json!({"default": {"$undefined": true}}),
        json!({"required": true, "default": {"$undefined": true}}),
    ] {
        let mut raw = json!({"type": ["Number"], "index": "2dsphere"});
        for (key, value) in extra.as_object().unwrap() {
            raw[key] = value.clone();
        }
        assert_eq!(lean_field("loc", raw).as_deref(), Some("loc?: number[];"));
    }
}

#[test]
fn self_referencing_schema_is_named_not_inlined() {
    let models = generate(json!({
        "schemas": {"node": {"tree": {
            "label": "String",
            "children": [{"$schema": "node"}]
        }}},
        "models": [{"name": "Tree", "schema": "node"}]
    }));
    let tree = &models[0];
    assert!(tree.children.is_empty());
    assert!(tree.lean.contains("children: Tree[];"));
    assert!(tree
        .document
        .as_deref()
        .unwrap()
        .contains("children: mongoose.Types.DocumentArray<TreeDocument>;"));
}

#[test]
fn shared_schema_is_emitted_once() {
    let models = generate(json!({
        "schemas": {"address": {"tree": {"city": "String"}}},
        "models": [
            {"name": "User", "schema": {"tree": {"home": {"$schema": "address"}}}},
            {"name": "Shop", "schema": {"tree": {"location": {"$schema": "address"}}}}
        ]
    }));
    assert_eq!(models[0].children.len(), 1);
    assert_eq!(models[0].children[0].name, "UserHome");
    assert!(models[1].children.is_empty());
    assert!(models[1].lean.contains("location?: UserHome;"));
}

#[test]
fn child_names_avoid_models_and_alias_types() {
    let models = generate(json!({"models": [
        {"name": "User", "schema": {"tree": {
            "friends": [{"$schema": {"tree": {"name": "String"}}}],
            "models": {"$schema": {"tree": {"kind": "String"}}}
        }}},
        {"name": "UserFriend", "schema": {"tree": {"since": "Date"}}}
    ]}));
    let names: Vec<_> = models[0].children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["UserFriend2", "UserModelSubdoc"]);
    assert!(models[0].lean.contains("friends: UserFriend2[];"));
}

#[test]
fn dot_qualified_reference_targets_child_type() {
    let models = generate(json!({"models": [
        {"name": "User", "schema": {"tree": {
            "friends": [{"$schema": {"tree": {"name": "String"}}}]
        }}},
        {"name": "Invite", "schema": {"tree": {
            "friend": {"type": "ObjectId", "ref": "User.friends", "autopopulate": true}
        }}}
    ]}));
    assert!(models[1].lean.contains("friend?: UserFriend;"));
}

#[test]
fn aliases_mirror_their_target_field() {
    let models = generate(json!({"models": [{"name": "User", "schema": {
        "tree": {"n": {"type": "String", "required": true}},
        "aliases": {"name": "n"}
    }}]}));
    let document = models[0].document.as_deref().unwrap();
    assert!(document.contains("n: string;"));
    assert!(document.contains("name: string;"));
    assert!(!models[0].lean.contains("name:"));
}

#[test]
fn unknown_registry_id_degrades_with_warning() {
    let set = generate_types_from_json(
        &json!({"models": [{"name": "User", "schema": {"tree": {
            "profile": {"$schema": "missing"}
        }}}]})
        .to_string(),
        &GenerationOptions::default(),
    )
    .unwrap();
    assert!(set.models[0].lean.contains("profile?: any;"));
    assert!(set.warnings.iter().any(|w| w.contains("unknown schema id 'missing'")));
}

#[test]
fn unknown_model_schema_id_is_fatal() {
    let err = generate_types_from_json(
        &json!({"models": [{"name": "User", "schema": "missing"}]}).to_string(),
        &GenerationOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TypegenError::Snapshot(_)));
}

#[test]
fn dates_as_strings_and_lean_only_options() {
    let snapshot = json!({"models": [{"name": "Event", "schema": {"tree": {
        "at": {"type": "Date", "required": true},
        "_id": "ObjectId"
    }}}]})
    .to_string();
    let options = GenerationOptions {
        dates_as_strings: true,
        no_runtime_wrapper: true,
    };
    let out = generate_typescript(&snapshot, &options, None).unwrap();
    assert!(out.contains("export type Event = {\n  at: string;\n  _id: string;\n};"));
    assert!(!out.contains("mongoose"));
}

#[test]
fn generation_is_idempotent() {
    let snapshot = json!({"models": [
        {"name": "User", "schema": {"tree": {
            "email": {"type": "String", "required": true},
            "friends": [{"$schema": {"tree": {"name": "String", "tags": ["String"]}}}],
            "scores": {"type": "Map", "of": "Number"}
        }}, "methods": ["greet"], "statics": ["byEmail"]},
        {"name": "Post", "schema": {"tree": {"author": {"type": "ObjectId", "ref": "User"}}}}
    ]})
    .to_string();
    let first = generate_typescript(&snapshot, &GenerationOptions::default(), None).unwrap();
    let second = generate_typescript(&snapshot, &GenerationOptions::default(), None).unwrap();
    assert_eq!(first, second);

    let regenerated =
        generate_typescript(&snapshot, &GenerationOptions::default(), Some(&first)).unwrap();
    assert_eq!(first, regenerated);
}

#[test]
fn full_file_layout() {
    let snapshot = json!({"models": [{"name": "User", "schema": {"tree": {
        "email": {"type": "String", "required": true},
        "pets": [{"$schema": {"tree": {"name": "String"}}}]
    }}}]})
    .to_string();
    let out = generate_typescript(&snapshot, &GenerationOptions::default(), None).unwrap();

    let expected = r#"// Generated by schema-typegen.
// WARNING: This file is generated. Only edit inside the custom-types region.

import mongoose from "mongoose";

export type UserPet = {
  name?: string;
};

export type UserPetDocument = mongoose.Types.Subdocument & {
  name?: string;
};

export type User = {
  email: string;
  pets: UserPet[];
};

export type UserDocument = mongoose.Document<mongoose.Types.ObjectId, UserQueries> & UserMethods & {
  email: string;
  pets: mongoose.Types.DocumentArray<UserPetDocument>;
};

export type UserMethods = {};

export type UserStatics = {};

export type UserQueries = {};

export type UserQuery = mongoose.Query<any, UserDocument, UserQueries> & UserQueries;

export type UserModel = mongoose.Model<UserDocument, UserQueries> & UserStatics;

export type UserSchema = mongoose.Schema<UserDocument, UserModel, UserMethods, UserQueries>;

// <custom-types>
// </custom-types>
"#;
    assert_eq!(out, expected);
}

#[test]
fn shared_schema_keeps_placement_of_first_use() {
    let models = generate(json!({
        "schemas": {"tag": {"tree": {"label": "String"}}},
        "models": [{"name": "Post", "schema": {"tree": {
            "tags": [{"$schema": "tag"}],
            "primary": {"$schema": "tag"}
        }}}]
    }));
    let post = &models[0];
    assert_eq!(post.children.len(), 1);
    assert_eq!(post.children[0].name, "PostTag");
    assert!(post.children[0].is_subdocument_array);
    assert!(post.lean.contains("primary?: PostTag;"));
    assert!(post
        .document
        .as_deref()
        .unwrap()
        .contains("primary?: PostTagDocument;"));
}
