use crate::catalog;
use crate::config::Settings;
use crate::errors::RunnerError;
use crate::import::{ImportOptions, read_file};
use crate::query::Verbosity;
use crate::runner::{Console, QueryRunner};
use crate::store::{BookStore, MemoryStore, MongoStore, seed_or_close};
use crate::utils::json::document_to_json;

use super::command::Command;
use super::util::summarize;

const MONGO: &str = "MongoDB";
const MEMORY: &str = "in-memory";

/// Executes one CLI command.
///
/// # Errors
/// Returns connection failures, and for the maintenance commands any store error.
/// Query failures inside `run` are printed and do not produce an error.
pub async fn run_with_format(
    settings: &Settings,
    cmd: Command,
    console: &mut Console,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Run { memory, seed } => {
            let mut runner = QueryRunner::new(console);
            let report = if memory {
                let store = MemoryStore::seeded(&settings.database, &settings.collection);
                runner.run(MEMORY, async { Ok::<_, RunnerError>(store) }).await?
            } else {
                runner
                    .run(MONGO, async {
                        let store = MongoStore::connect(settings).await?;
                        if seed {
                            seed_or_close(store, crate::seed::sample_books()).await
                        } else {
                            Ok(store)
                        }
                    })
                    .await?
            };
            log::info!("{}", summarize(&report));
            Ok(())
        }
        Command::Seed { file, drop } => {
            let docs = match &file {
                Some(p) => {
                    let (docs, report) = read_file(p, &ImportOptions::default())?;
                    log::info!("read {} documents from {} ({} skipped)", report.read, p.display(), report.skipped);
                    docs
                }
                None => crate::seed::sample_books(),
            };
            let store = MongoStore::connect(settings).await?;
            let outcome = async {
                if drop {
                    store.drop_collection().await?;
                    log::info!("dropped {}", store.namespace());
                }
                seed_store(&store, docs).await
            }
            .await;
            finish(store, outcome, |n| {
                console.milestone("seeded", &format!("Inserted {n} books into {}", settings.namespace()));
            })
            .await
        }
        Command::Explain { title, verbosity, memory } => {
            if memory {
                let store = MemoryStore::seeded(&settings.database, &settings.collection);
                explain_on(store, &title, verbosity, console).await
            } else {
                explain_on(MongoStore::connect(settings).await?, &title, verbosity, console).await
            }
        }
        Command::Indexes { memory } => {
            if memory {
                indexes_on(MemoryStore::seeded(&settings.database, &settings.collection), console).await
            } else {
                indexes_on(MongoStore::connect(settings).await?, console).await
            }
        }
    }
}

async fn seed_store<S: BookStore>(store: &S, docs: Vec<bson::Document>) -> Result<usize, RunnerError> {
    let n = store.insert_many(docs).await?;
    log::info!("inserted {n} documents into {}", store.namespace());
    Ok(n)
}

/// Closes `store` whatever `outcome` was, then reports the outcome.
async fn finish<S: BookStore, T>(
    store: S,
    outcome: Result<T, RunnerError>,
    on_ok: impl FnOnce(T),
) -> Result<(), Box<dyn std::error::Error>> {
    let closed = store.close().await;
    let value = outcome?;
    closed?;
    on_ok(value);
    Ok(())
}

async fn explain_on<S: BookStore>(
    store: S,
    title: &str,
    verbosity: Verbosity,
    console: &mut Console,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = store.explain_find(catalog::by_title(title), verbosity).await;
    finish(store, outcome, |plan| {
        console.result(crate::runner::Step::Explain, "", &document_to_json(&plan));
    })
    .await
}

async fn indexes_on<S: BookStore>(store: S, console: &mut Console) -> Result<(), Box<dyn std::error::Error>> {
    let ns = store.namespace();
    let outcome = store.list_index_names().await;
    finish(store, outcome, |names| {
        console.milestone("indexes", &format!("Indexes on {ns}: {}", names.join(", ")));
    })
    .await
}
