//! Integration tests for PathDB
//!
//! Tests full flows from statement parsing through path execution to file
//! system changes.

use pathdb::{Bins, Database, Exp, PathStep, QueryResult, Selection, Value, ValueType};
use tempfile::TempDir;

const INVENTORY: &str = include_str!("../data/inventory_sample.json");

/// Helper to create a test database
async fn setup_test_db() -> (TempDir, Database) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let db = Database::open(tmp.path()).await.expect("Failed to open database");
    (tmp, db)
}

/// Helper to load the sample inventory into products/catalog
async fn load_catalog(db: &Database) {
    let json: serde_json::Value = serde_json::from_str(INVENTORY).expect("Bad sample data");
    let mut bins = Bins::new();
    bins.insert("catalog".to_string(), Value::from(json));
    db.put("products", "catalog", bins).await.expect("Failed to load catalog");
}

fn featured_in_stock() -> Vec<PathStep> {
    vec![
        PathStep::key("inventory"),
        PathStep::filtered(Exp::eq(
            Exp::map_get("featured", ValueType::Bool, Exp::loop_value()),
            Exp::val(true),
        )),
        PathStep::key("variants"),
        PathStep::filtered(Exp::gt(
            Exp::map_get("quantity", ValueType::Int, Exp::loop_value()),
            Exp::val(0),
        )),
    ]
}

// =============================================================================
// Record Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_put_get_roundtrip() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let record = db.get("products", "catalog").await.unwrap().unwrap();
    assert_eq!(record.key, "catalog");
    assert_eq!(record.meta.generation, 1);

    let name = record
        .bin("catalog")
        .and_then(|c| c.get("inventory"))
        .and_then(|inv| inv.get("10000001"))
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str);
    assert_eq!(name, Some("Classic T-Shirt"));
}

#[tokio::test]
async fn test_put_bumps_generation() {
    let (_tmp, db) = setup_test_db().await;

    let mut bins = Bins::new();
    bins.insert("catalog".to_string(), Value::from("v1"));
    assert_eq!(db.put("products", "catalog", bins.clone()).await.unwrap(), 1);

    bins.insert("catalog".to_string(), Value::from("v2"));
    assert_eq!(db.put("products", "catalog", bins).await.unwrap(), 2);

    let record = db.get("products", "catalog").await.unwrap().unwrap();
    assert_eq!(record.meta.generation, 2);
    assert_eq!(record.bin("catalog"), Some(&Value::String("v2".into())));
}

#[tokio::test]
async fn test_delete_and_truncate() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    assert_eq!(db.keys("products").unwrap(), vec!["catalog"]);
    assert!(db.delete("products", "catalog").await.unwrap());
    assert!(!db.delete("products", "catalog").await.unwrap());

    load_catalog(&db).await;
    assert_eq!(db.truncate("products").await.unwrap(), 1);
    assert!(db.get("products", "catalog").await.unwrap().is_none());

    // Truncating a set that was never written is a no-op
    assert_eq!(db.truncate("empty-set").await.unwrap(), 0);
}

#[tokio::test]
async fn test_sets_listing() {
    let (_tmp, db) = setup_test_db().await;
    assert!(db.sets().unwrap().is_empty());

    load_catalog(&db).await;
    assert_eq!(db.sets().unwrap(), vec!["products"]);
}

#[tokio::test]
async fn test_path_traversal_rejected() {
    let (_tmp, db) = setup_test_db().await;

    assert!(db.get("../secret", "catalog").await.is_err());
    assert!(db.get("products", "../../etc/passwd").await.is_err());
    assert!(db.put("products", "..", Bins::new()).await.is_err());
}

#[tokio::test]
async fn test_put_rejects_invalid_bin_names() {
    let (_tmp, db) = setup_test_db().await;

    // Every bin a put stores must also be addressable by a query
    let mut bins = Bins::new();
    bins.insert("bad bin".to_string(), Value::from("x"));
    assert!(db.put("products", "catalog", bins).await.is_err());

    let mut bins = Bins::new();
    bins.insert("catalog".to_string(), Value::from("x"));
    assert!(db.put("products", "catalog", bins).await.is_ok());
}

// =============================================================================
// SELECT Tests
// =============================================================================

#[tokio::test]
async fn test_select_tree_prunes_to_matches() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let result = db
        .select_by_path("products", "catalog", "catalog", &featured_in_stock(), Selection::tree())
        .await
        .unwrap();

    let QueryResult::Tree(tree) = result else { panic!("expected tree") };
    let products = tree.get("inventory").and_then(Value::as_map).unwrap();

    // Non-featured Winter Beanie drops out entirely
    assert_eq!(products.keys().collect::<Vec<_>>(), vec!["10000001", "20000001"]);

    // Out-of-stock MED variant is pruned from the T-shirt
    let variants = products
        .get("10000001")
        .and_then(|p| p.get("variants"))
        .and_then(Value::as_map)
        .unwrap();
    assert_eq!(variants.keys().collect::<Vec<_>>(), vec!["LRG", "SML"]);
}

#[tokio::test]
async fn test_select_keys_with_regex() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let steps = vec![
        PathStep::key("inventory"),
        PathStep::filtered(Exp::regex_match("10000.*", Exp::loop_key())),
    ];
    let result = db
        .select_by_path("products", "catalog", "catalog", &steps, Selection::keys())
        .await
        .unwrap();

    assert_eq!(
        result,
        QueryResult::Keys(vec![
            Value::String("10000001".into()),
            Value::String("10000002".into()),
        ])
    );
}

#[tokio::test]
async fn test_select_count_with_combined_filter() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    // In stock AND priced under 50: LRG at 55 is excluded
    let affordable = Exp::and(
        Exp::gt(Exp::map_get("quantity", ValueType::Int, Exp::loop_value()), Exp::val(0)),
        Exp::lt(Exp::map_get("price", ValueType::Int, Exp::loop_value()), Exp::val(50)),
    );
    let steps = vec![
        PathStep::key("inventory"),
        PathStep::filtered(Exp::eq(
            Exp::map_get("featured", ValueType::Bool, Exp::loop_value()),
            Exp::val(true),
        )),
        PathStep::key("variants"),
        PathStep::filtered(affordable),
    ];

    let result = db
        .select_by_path("products", "catalog", "catalog", &steps, Selection::count())
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Count(2));
}

#[tokio::test]
async fn test_select_values_flattens_matches() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let result = db
        .select_by_path("products", "catalog", "catalog", &featured_in_stock(), Selection::values())
        .await
        .unwrap();

    let QueryResult::Values(values) = result else { panic!("expected values") };
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| v.get("price").is_some()));
}

// =============================================================================
// MODIFY Tests
// =============================================================================

#[tokio::test]
async fn test_modify_in_place_bumps_generation() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let bump = Exp::add(
        Exp::map_get("quantity", ValueType::Int, Exp::loop_value()),
        Exp::val(10),
    );
    let changed = db
        .modify_by_path(
            "products", "catalog", "catalog", &featured_in_stock(),
            "quantity", &bump, None, false,
        )
        .await
        .unwrap();
    assert_eq!(changed, 3);

    let record = db.get("products", "catalog").await.unwrap().unwrap();
    assert_eq!(record.meta.generation, 2);

    let quantity = record
        .bin("catalog")
        .and_then(|c| c.get("inventory"))
        .and_then(|inv| inv.get("20000001"))
        .and_then(|p| p.get("variants"))
        .and_then(|v| v.get("OS"))
        .and_then(|v| v.get("quantity"))
        .and_then(Value::as_i64);
    assert_eq!(quantity, Some(17));
}

#[tokio::test]
async fn test_modify_into_target_bin_leaves_source_untouched() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let bump = Exp::add(
        Exp::map_get("quantity", ValueType::Int, Exp::loop_value()),
        Exp::val(10),
    );
    db.modify_by_path(
        "products", "catalog", "catalog", &featured_in_stock(),
        "quantity", &bump, Some("updated"), false,
    )
    .await
    .unwrap();

    let record = db.get("products", "catalog").await.unwrap().unwrap();
    let quantity_in = |bin: &str| {
        record
            .bin(bin)
            .and_then(|c| c.get("inventory"))
            .and_then(|inv| inv.get("10000001"))
            .and_then(|p| p.get("variants"))
            .and_then(|v| v.get("SML"))
            .and_then(|v| v.get("quantity"))
            .and_then(Value::as_i64)
    };
    assert_eq!(quantity_in("catalog"), Some(4));
    assert_eq!(quantity_in("updated"), Some(14));
}

// =============================================================================
// NOFAIL Tests
// =============================================================================

#[tokio::test]
async fn test_malformed_data_fails_without_nofail() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    // Plant a featured product whose variants map has a string where a
    // variant map should be
    let bad_product = Value::from(serde_json::json!({
        "name": "Hooded Sweatshirt",
        "featured": true,
        "variants": { "quantity": "10" }
    }));
    db.insert_at_path(
        "products", "catalog", "catalog",
        &[PathStep::key("inventory")], "10000003", bad_product,
    )
    .await
    .unwrap();

    let err = db
        .select_by_path("products", "catalog", "catalog", &featured_in_stock(), Selection::tree())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Type mismatch"));

    // Same query with NOFAIL skips the malformed record
    let result = db
        .select_by_path(
            "products", "catalog", "catalog",
            &featured_in_stock(), Selection::tree().no_fail(),
        )
        .await
        .unwrap();
    let QueryResult::Tree(tree) = result else { panic!("expected tree") };
    let products = tree.get("inventory").and_then(Value::as_map).unwrap();
    assert_eq!(products.keys().collect::<Vec<_>>(), vec!["10000001", "20000001"]);
}

#[tokio::test]
async fn test_invalid_regex_propagates_even_with_nofail() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    // NOFAIL tolerates malformed data, not a broken pattern
    let steps = vec![
        PathStep::key("inventory"),
        PathStep::filtered(Exp::regex_match("10000[", Exp::loop_key())),
    ];
    let err = db
        .select_by_path("products", "catalog", "catalog", &steps, Selection::keys().no_fail())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid regex"));
}

// =============================================================================
// Textual Statement Tests
// =============================================================================

#[tokio::test]
async fn test_execute_select_statement() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let result = db
        .execute(
            "products",
            "catalog",
            "SELECT COUNT FROM catalog AT inventory.*{featured:bool = true}.variants.*{quantity:int > 0}",
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Count(3));

    let result = db
        .execute(
            "products",
            "catalog",
            "SELECT KEYS FROM catalog AT inventory.*{key MATCHES '10000.*'}",
        )
        .await
        .unwrap();
    let QueryResult::Keys(keys) = result else { panic!("expected keys") };
    assert_eq!(keys.len(), 2);
}

#[tokio::test]
async fn test_execute_modify_statement() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let result = db
        .execute(
            "products",
            "catalog",
            "MODIFY catalog AT inventory.*{featured = true}.variants.*{quantity:int > 0} \
             SET quantity = quantity:int + 10 INTO updated",
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Affected(3));

    let record = db.get("products", "catalog").await.unwrap().unwrap();
    assert!(record.bin("updated").is_some());
    assert!(record.bin("catalog").is_some());
}

#[tokio::test]
async fn test_execute_rejects_bad_statement() {
    let (_tmp, db) = setup_test_db().await;
    load_catalog(&db).await;

    let err = db
        .execute("products", "catalog", "SELEKT TREE FROM catalog AT *")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("parse"));
}

// =============================================================================
// Error Reporting Tests
// =============================================================================

#[tokio::test]
async fn test_missing_set_record_and_bin() {
    let (_tmp, db) = setup_test_db().await;

    let steps = vec![PathStep::all_children()];
    let err = db
        .select_by_path("products", "catalog", "catalog", &steps, Selection::tree())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));

    load_catalog(&db).await;
    let err = db
        .select_by_path("products", "missing", "catalog", &steps, Selection::tree())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));

    let err = db
        .select_by_path("products", "catalog", "missing", &steps, Selection::tree())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Bin 'missing'"));
}
