use bson::Document;
use plp_bookstore::errors::RunnerError;
use plp_bookstore::query::{DeleteReport, UpdateReport, Verbosity};
use plp_bookstore::runner::{Console, OutputMode, QueryRunner, Step, StepStatus};
use plp_bookstore::store::{BookStore, FindSpec, MemoryStore, seed_or_close};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Copy, PartialEq)]
enum Refuse {
    Inserts,
    Deletes,
}

/// Delegates to a seeded memory store but refuses one kind of write.
struct Refusing {
    inner: MemoryStore,
    refuse: Refuse,
    closed: Arc<AtomicBool>,
}

impl Refusing {
    fn new(refuse: Refuse, closed: &Arc<AtomicBool>) -> Self {
        Self { inner: MemoryStore::seeded("db", "books"), refuse, closed: Arc::clone(closed) }
    }

    fn refused(&self, what: Refuse) -> Result<(), RunnerError> {
        if self.refuse == what { Err(RunnerError::QueryError("write refused".into())) } else { Ok(()) }
    }
}

impl BookStore for Refusing {
    fn namespace(&self) -> String {
        self.inner.namespace()
    }
    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, RunnerError> {
        self.inner.find(filter, spec).await
    }
    async fn count(&self, filter: Document) -> Result<u64, RunnerError> {
        self.inner.count(filter).await
    }
    async fn insert_many(&self, docs: Vec<Document>) -> Result<usize, RunnerError> {
        self.refused(Refuse::Inserts)?;
        self.inner.insert_many(docs).await
    }
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateReport, RunnerError> {
        self.inner.update_one(filter, update).await
    }
    async fn delete_one(&self, filter: Document) -> Result<DeleteReport, RunnerError> {
        self.refused(Refuse::Deletes)?;
        self.inner.delete_one(filter).await
    }
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, RunnerError> {
        self.inner.aggregate(pipeline).await
    }
    async fn create_index(&self, keys: Document) -> Result<String, RunnerError> {
        self.inner.create_index(keys).await
    }
    async fn list_index_names(&self) -> Result<Vec<String>, RunnerError> {
        self.inner.list_index_names().await
    }
    async fn explain_find(&self, filter: Document, verbosity: Verbosity) -> Result<Document, RunnerError> {
        self.inner.explain_find(filter, verbosity).await
    }
    async fn drop_collection(&self) -> Result<(), RunnerError> {
        self.inner.drop_collection().await
    }
    async fn close(self) -> Result<(), RunnerError> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close().await
    }
}

#[tokio::test]
async fn full_run_on_the_sample_books() {
    let (mut console, out, err) = Console::capture(OutputMode::Human);
    let store = MemoryStore::seeded("plp_bookstore", "books");
    let report = QueryRunner::new(&mut console)
        .run("in-memory", async { Ok::<_, RunnerError>(store) })
        .await
        .unwrap();

    assert_eq!(report.namespace, "plp_bookstore.books");
    assert_eq!(report.steps.len(), 14);
    assert_eq!(report.count(&StepStatus::Completed), 14);
    assert!(report.failure().is_none());
    assert_eq!(report.writes_applied(), 4);
    assert!(report.finished_at.is_some());

    let printed = out.contents();
    let expected_in_order = [
        "Connected successfully to in-memory server",
        "Books published after 1950 are: ",
        "Books by 'Herman Melville': ",
        "Price of book updated (matched 1, modified 1)",
        "Book deleted (deleted 1)",
        "Books in stock and published after 2010: ",
        "Books in stock and published after 2010 (title, author, price): ",
        "Books sorted by price (descending):",
        "Average price of books by genre:",
        "Author with the most books:",
        "Index created on 'title'",
        "Compound index created on 'author' and 'published_year'",
        "in-memory connection closed!",
    ];
    let mut from = 0;
    for line in expected_in_order {
        let at = printed[from..].find(line).unwrap_or_else(|| panic!("missing {line:?} after offset {from}"));
        from += at + line.len();
    }
    assert!(printed.contains("\"title\": \"Moby Dick\""));
    assert!(err.contents().is_empty());
}

#[tokio::test]
async fn explain_uses_the_title_index_created_earlier() {
    let (mut console, out, _err) = Console::capture(OutputMode::Human);
    let store = MemoryStore::seeded("plp_bookstore", "books");
    QueryRunner::new(&mut console)
        .run("in-memory", async { Ok::<_, RunnerError>(store) })
        .await
        .unwrap();
    let printed = out.contents();
    let plan = &printed[printed.find("\"explainVersion\"").unwrap()..];
    assert!(plan.contains("\"IXSCAN\""));
    assert!(plan.contains("\"indexName\": \"title_1\""));
    assert!(!plan.contains("COLLSCAN"));
}

#[tokio::test]
async fn first_failure_skips_the_rest_and_still_closes() {
    let (mut console, out, err) = Console::capture(OutputMode::Human);
    let closed = Arc::new(AtomicBool::new(false));
    let store = Refusing::new(Refuse::Deletes, &closed);
    let report = QueryRunner::new(&mut console)
        .run("in-memory", async { Ok::<_, RunnerError>(store) })
        .await
        .unwrap();

    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(
        report.failure(),
        Some((Step::DeleteByTitle, "step 'delete_by_title' failed: Query error: write refused"))
    );
    assert_eq!(report.status_of(Step::UpdatePrice), Some(&StepStatus::Completed));
    assert_eq!(report.writes_applied(), 1);
    assert_eq!(report.count(&StepStatus::Skipped), 8);
    assert_eq!(report.status_of(Step::Explain), Some(&StepStatus::Skipped));
    assert_eq!(report.status_of(Step::Disconnect), Some(&StepStatus::Completed));

    assert_eq!(err.contents(), "Error: step 'delete_by_title' failed: Query error: write refused\n");
    let printed = out.contents();
    assert!(printed.contains("Price of book updated"));
    assert!(!printed.contains("Books in stock"));
    assert!(printed.ends_with("in-memory connection closed!\n"));
}

#[tokio::test]
async fn failed_seed_closes_the_store_and_is_returned() {
    let (mut console, out, _err) = Console::capture(OutputMode::Human);
    let closed = Arc::new(AtomicBool::new(false));
    let store = Refusing::new(Refuse::Inserts, &closed);
    let e = QueryRunner::new(&mut console)
        .run("in-memory", seed_or_close(store, plp_bookstore::seed::sample_books()))
        .await
        .unwrap_err();
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(e.to_string(), "step 'seed' failed: Query error: write refused");
    assert!(out.contents().is_empty());
}

#[tokio::test]
async fn successful_seed_hands_the_open_store_to_the_run() {
    let (mut console, _out, _err) = Console::capture(OutputMode::Human);
    let closed = Arc::new(AtomicBool::new(false));
    let store = Refusing::new(Refuse::Deletes, &closed);
    let seeded = seed_or_close(store, vec![bson::doc! {"title": "Extra"}]).await.unwrap();
    assert!(!closed.load(Ordering::SeqCst));
    assert_eq!(seeded.count(bson::doc! {}).await.unwrap(), 13);

    let report = QueryRunner::new(&mut console).run("in-memory", async { Ok(seeded) }).await.unwrap();
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(report.failure().map(|(step, _)| step), Some(Step::DeleteByTitle));
}

#[tokio::test]
async fn connection_failure_is_returned() {
    let (mut console, out, _err) = Console::capture(OutputMode::Human);
    let e = QueryRunner::new(&mut console)
        .run("MongoDB", async { Err::<MemoryStore, _>(RunnerError::Connection("no server".into())) })
        .await
        .unwrap_err();
    assert!(matches!(e, RunnerError::Connection(_)));
    assert!(out.contents().is_empty());
}

#[tokio::test]
async fn json_mode_ends_with_the_report() {
    let (mut console, out, _err) = Console::capture(OutputMode::Json);
    let store = MemoryStore::seeded("plp_bookstore", "books");
    QueryRunner::new(&mut console)
        .run("in-memory", async { Ok::<_, RunnerError>(store) })
        .await
        .unwrap();
    let lines: Vec<serde_json::Value> =
        out.contents().lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines[0]["event"], "connected");
    let last = lines.last().unwrap();
    assert_eq!(last["event"], "report");
    assert_eq!(last["steps"].as_array().unwrap().len(), 14);
    let top = lines.iter().find(|l| l["step"] == "top_author").unwrap();
    assert_eq!(top["data"][0]["bookCount"], 2);
}
