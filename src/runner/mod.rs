//! The Query Runner: connect, run the fixed queries in order, close.
//!
//! The first failing query ends the run; the rest are recorded as skipped and the store is
//! closed on every path. Only a failed connection is returned as an error.

mod console;
mod report;
mod steps;

pub use console::{Console, OutputMode, SharedBuf};
pub use report::{RunReport, StepRecord, StepStatus};
pub use steps::Step;

use crate::catalog;
use crate::errors::RunnerError;
use crate::query::Verbosity;
use crate::store::{BookStore, FindSpec};
use crate::utils::json::{document_to_json, documents_to_json};
use std::future::Future;

pub struct QueryRunner<'c> {
    console: &'c mut Console,
}

impl<'c> QueryRunner<'c> {
    pub fn new(console: &'c mut Console) -> Self {
        Self { console }
    }

    /// Awaits `connect`, then runs every query step against the store and closes it.
    ///
    /// # Errors
    /// Returns the connection error when `connect` fails. Query failures are reported in the
    /// returned [`RunReport`] instead.
    pub async fn run<S, Fut>(&mut self, backend: &str, connect: Fut) -> Result<RunReport, RunnerError>
    where
        S: BookStore,
        Fut: Future<Output = Result<S, RunnerError>>,
    {
        let store = match connect.await {
            Ok(s) => s,
            Err(e) => {
                log::error!("connect failed: {e}");
                return Err(e);
            }
        };
        let mut report = RunReport::new(store.namespace());
        report.record(Step::Connect, StepStatus::Completed);
        self.console.milestone("connected", &format!("Connected successfully to {backend} server"));
        log::info!("connected to {}", report.namespace);

        let mut failed = false;
        for step in Step::QUERIES {
            if failed {
                report.record(step, StepStatus::Skipped);
                continue;
            }
            let started = std::time::Instant::now();
            match self.execute(&store, step).await {
                Ok(()) => {
                    let kind = if step.mutates() { "write" } else { "read" };
                    log::info!("{kind} step {step} completed in {} ms", started.elapsed().as_millis());
                    report.record(step, StepStatus::Completed);
                }
                Err(e) => {
                    let e = e.in_step(step.label());
                    log::error!("{e}");
                    self.console.error(Some(step), &e.to_string());
                    report.record(step, StepStatus::Failed(e.to_string()));
                    failed = true;
                }
            }
        }

        // released on every path
        match store.close().await {
            Ok(()) => {
                report.record(Step::Disconnect, StepStatus::Completed);
                self.console.milestone("closed", &format!("{backend} connection closed!"));
            }
            Err(e) => {
                log::error!("close failed: {e}");
                self.console.error(Some(Step::Disconnect), &e.to_string());
                report.record(Step::Disconnect, StepStatus::Failed(e.to_string()));
            }
        }
        report.finish();
        self.console.report(&report);
        Ok(report)
    }

    async fn execute<S: BookStore>(&mut self, store: &S, step: Step) -> Result<(), RunnerError> {
        match step {
            Step::PublishedAfter => {
                let docs = store.find(catalog::published_after(catalog::RECENT_YEAR), FindSpec::default()).await?;
                let label = format!("Books published after {} are: ", catalog::RECENT_YEAR);
                self.console.result(step, &label, &documents_to_json(&docs));
            }
            Step::ByAuthor => {
                let docs = store.find(catalog::by_author(catalog::AUTHOR), FindSpec::default()).await?;
                let label = format!("Books by '{}': ", catalog::AUTHOR);
                self.console.result(step, &label, &documents_to_json(&docs));
            }
            Step::UpdatePrice => {
                let r = store
                    .update_one(catalog::by_title(catalog::UPDATE_TITLE), catalog::set_price(catalog::NEW_PRICE))
                    .await?;
                log::info!("update_one matched={} modified={}", r.matched, r.modified);
                self.console.done(
                    step,
                    &format!("Price of book updated (matched {}, modified {})", r.matched, r.modified),
                );
            }
            Step::DeleteByTitle => {
                let r = store.delete_one(catalog::by_title(catalog::DELETE_TITLE)).await?;
                log::info!("delete_one deleted={}", r.deleted);
                self.console.done(step, &format!("Book deleted (deleted {})", r.deleted));
            }
            Step::InStockAfter => {
                let docs = store.find(catalog::in_stock_after(catalog::IN_STOCK_AFTER), FindSpec::default()).await?;
                let label = format!("Books in stock and published after {}: ", catalog::IN_STOCK_AFTER);
                self.console.result(step, &label, &documents_to_json(&docs));
            }
            Step::ProjectionFind => {
                let docs = store
                    .find(
                        catalog::in_stock_after(catalog::IN_STOCK_AFTER),
                        FindSpec::projected(catalog::summary_projection()),
                    )
                    .await?;
                let label = format!(
                    "Books in stock and published after {} (title, author, price): ",
                    catalog::IN_STOCK_AFTER
                );
                self.console.result(step, &label, &documents_to_json(&docs));
            }
            Step::SortedByPrice => {
                let spec = FindSpec::projected(catalog::summary_projection()).sorted(catalog::price_descending());
                let docs = store.find(bson::doc! {}, spec).await?;
                self.console.result(step, "Books sorted by price (descending):", &documents_to_json(&docs));
            }
            Step::AveragePriceByGenre => {
                let docs = store.aggregate(catalog::average_price_by_genre()).await?;
                self.console.result(step, "Average price of books by genre:", &documents_to_json(&docs));
            }
            Step::TopAuthor => {
                let docs = store.aggregate(catalog::top_author()).await?;
                self.console.result(step, "Author with the most books:", &documents_to_json(&docs));
            }
            Step::TitleIndex => {
                let name = store.create_index(catalog::title_index()).await?;
                log::info!("index {name} ready");
                self.console.done(step, "Index created on 'title'");
            }
            Step::AuthorYearIndex => {
                let name = store.create_index(catalog::author_year_index()).await?;
                log::info!("index {name} ready");
                self.console.done(step, "Compound index created on 'author' and 'published_year'");
            }
            Step::Explain => {
                let plan = store
                    .explain_find(catalog::by_title(catalog::EXPLAIN_TITLE), Verbosity::ExecutionStats)
                    .await?;
                self.console.result(step, "", &document_to_json(&plan));
            }
            Step::Connect | Step::Disconnect => {}
        }
        Ok(())
    }
}
