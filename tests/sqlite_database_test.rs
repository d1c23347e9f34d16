//! End-to-end tests against a temporary SQLite database.

use sqlbridge::config::DatabaseConfig;
use sqlbridge::database::{Database, UpsertOutcome};
use sqlbridge::define_record;
use sqlbridge::dialect::ProviderRegistry;
use sqlbridge::error::DbError;
use sqlbridge::factory::DatabaseFactory;
use tempfile::NamedTempFile;

define_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Widget in "Widget" {
        #[auto_increment]
        ID => pub id: Option<i64> = "Id",
        NAME => pub name: String = "Name",
        PRICE => pub price: f64 = "Price",
    }
}

define_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Tag in "Tag" {
        #[primary_key]
        LABEL => pub label: String = "Label",
    }
}

fn widget(name: &str, price: f64) -> Widget {
    Widget {
        id: None,
        name: name.to_string(),
        price,
    }
}

/// Factory over a fresh SQLite file with the test tables created.
async fn setup() -> (DatabaseFactory, NamedTempFile) {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let url = format!("sqlite:{}?mode=rwc", temp_file.path().to_str().unwrap());

    let factory = DatabaseFactory::new(ProviderRegistry::with_builtins()).with_profiling(true);
    factory
        .configure(DatabaseConfig::parse(&url).expect("Failed to parse URL"))
        .expect("Failed to configure factory");

    let mut db = factory.create_database().await.unwrap();
    db.execute(
        "CREATE TABLE \"Widget\" (\
         \"Id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
         \"Name\" TEXT NOT NULL UNIQUE, \
         \"Price\" REAL NOT NULL)",
    )
    .await
    .expect("Failed to create Widget");
    db.execute("CREATE TABLE \"Tag\" (\"Label\" TEXT PRIMARY KEY)")
        .await
        .expect("Failed to create Tag");
    db.close().await.unwrap();

    (factory, temp_file)
}

async fn widget_count(db: &mut Database) -> i64 {
    let query = db.sql().select_count().from::<Widget>();
    db.execute_scalar(query).await.unwrap()
}

#[tokio::test]
async fn test_report() {
    let (factory, _file) = setup().await;
    let report = factory.report().await.unwrap();
    assert_eq!(report.provider, "SQLite");
    assert!(report.server_version.starts_with('3'));
    assert_eq!(report.bulk_strategy, "command");
    assert_eq!(report.native_bulk_strategy, None);
}

#[tokio::test]
async fn test_bulk_insert_across_batches() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();

    // 2 writable columns under 999 parameters: batches of 499
    let records: Vec<_> = (0..1200)
        .map(|i| widget(&format!("w{:04}", i), i as f64 / 2.0))
        .collect();
    assert_eq!(db.insert_bulk(&records).await.unwrap(), 1200);
    assert_eq!(widget_count(&mut db).await, 1200);

    let query = db
        .sql()
        .select_record::<Widget>()
        .from::<Widget>()
        .order_by(&[Widget::NAME])
        .page(10, 3);
    let page: Vec<Widget> = db.fetch(query).await.unwrap();
    let names: Vec<_> = page.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, ["w0010", "w0011", "w0012"]);
    assert_eq!(page[0].price, 5.0);
    assert!(page[0].id.is_some());
}

#[tokio::test]
async fn test_where_in_against_real_rows() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();
    db.insert_bulk(&[widget("A", 1.0), widget("B", 2.0), widget("C", 3.0)])
        .await
        .unwrap();

    let query = db
        .sql()
        .select_record::<Widget>()
        .from::<Widget>()
        .where_in(Widget::NAME, ["A", "C"])
        .order_by_desc(&[Widget::PRICE]);
    let found: Vec<Widget> = db.fetch(query).await.unwrap();
    let names: Vec<_> = found.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, ["C", "A"]);

    let query = db
        .sql()
        .select_all()
        .from::<Widget>()
        .where_in(Widget::NAME, Vec::<String>::new());
    assert!(db.fetch_rows(query).await.unwrap().is_empty());

    let query = db
        .sql()
        .select_all()
        .from::<Widget>()
        .where_not_in(Widget::NAME, Vec::<String>::new());
    assert_eq!(db.fetch_rows(query).await.unwrap().len(), 3);

    let query = db
        .sql()
        .select_record::<Widget>()
        .from::<Widget>()
        .where_(Widget::PRICE.gt(1.5))
        .for_update();
    let first: Option<Widget> = db.first(query).await.unwrap();
    assert!(first.is_some());
}

#[tokio::test]
async fn test_update_and_delete_through_builder() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();
    db.insert_bulk(&[widget("A", 1.0), widget("B", 2.0)])
        .await
        .unwrap();

    let update = db
        .sql()
        .update::<Widget>(|u| u.set(Widget::PRICE, 9.5))
        .where_(Widget::NAME.eq("A"));
    assert_eq!(db.execute(update).await.unwrap(), 1);

    let query = db
        .sql()
        .select([Widget::PRICE])
        .from::<Widget>()
        .where_(Widget::NAME.eq("A"));
    let price: f64 = db.execute_scalar(query).await.unwrap();
    assert_eq!(price, 9.5);

    let delete = db.sql().delete_from::<Widget>().where_(Widget::NAME.eq("B"));
    assert_eq!(db.execute(delete).await.unwrap(), 1);
    assert_eq!(widget_count(&mut db).await, 1);
}

#[tokio::test]
async fn test_unique_violation_is_constraint_error() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();
    db.insert_bulk(&[widget("A", 1.0)]).await.unwrap();

    let err = db.insert_bulk(&[widget("A", 2.0)]).await.unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation { .. }));
    assert!(!err.is_transient());
    assert!(err.sql().is_some_and(|sql| sql.contains("INSERT INTO \"Widget\"")));
}

#[tokio::test]
async fn test_insert_or_update() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();

    let outcome = db
        .insert_or_update(&widget("A", 1.0), &[Widget::NAME])
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let outcome = db
        .insert_or_update(&widget("A", 4.0), &[Widget::NAME])
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    assert_eq!(widget_count(&mut db).await, 1);

    let query = db
        .sql()
        .select([Widget::PRICE])
        .from::<Widget>()
        .where_(Widget::NAME.eq("A"));
    let price: f64 = db.execute_scalar(query).await.unwrap();
    assert_eq!(price, 4.0);
}

#[tokio::test]
async fn test_insert_or_update_key_only_record() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();
    let tag = Tag {
        label: "red".to_string(),
    };

    assert_eq!(
        db.insert_or_update(&tag, &[]).await.unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(
        db.insert_or_update(&tag, &[]).await.unwrap(),
        UpsertOutcome::Updated
    );
}

#[tokio::test]
async fn test_insert_or_update_needs_a_key() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();

    // the auto-increment key of an unsaved record is NULL, so nothing matches
    let outcome = db.insert_or_update(&widget("N", 1.0), &[]).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    define_record! {
        pub struct Keyless in "Widget" {
            NAME => pub name: String = "Name",
        }
    }
    let err = db
        .insert_or_update(
            &Keyless {
                name: "x".to_string(),
            },
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Builder { .. }));
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let (factory, _file) = setup().await;
    let mut db = factory.create_database().await.unwrap();

    db.begin().await.unwrap();
    db.insert_bulk(&[widget("A", 1.0)]).await.unwrap();
    db.rollback().await.unwrap();
    assert_eq!(widget_count(&mut db).await, 0);

    db.begin().await.unwrap();
    db.insert_bulk(&[widget("A", 1.0)]).await.unwrap();
    db.commit().await.unwrap();
    assert_eq!(widget_count(&mut db).await, 1);
}

#[tokio::test]
async fn test_dropped_transaction_is_not_committed() {
    let (factory, _file) = setup().await;

    {
        let mut db = factory.create_database().await.unwrap();
        db.begin().await.unwrap();
        db.insert_bulk(&[widget("lost", 1.0)]).await.unwrap();
    }

    let mut db = factory.create_database().await.unwrap();
    assert_eq!(widget_count(&mut db).await, 0);

    let profiler = factory.profiler().unwrap().snapshot();
    assert!(profiler.commands > 0);
}
