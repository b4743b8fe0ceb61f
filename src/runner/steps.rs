use serde::Serialize;

/// One operation of the fixed run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Connect,
    PublishedAfter,
    ByAuthor,
    UpdatePrice,
    DeleteByTitle,
    InStockAfter,
    ProjectionFind,
    SortedByPrice,
    AveragePriceByGenre,
    TopAuthor,
    TitleIndex,
    AuthorYearIndex,
    Explain,
    Disconnect,
}

impl Step {
    /// The query steps run between connect and disconnect.
    pub const QUERIES: [Self; 12] = [
        Self::PublishedAfter,
        Self::ByAuthor,
        Self::UpdatePrice,
        Self::DeleteByTitle,
        Self::InStockAfter,
        Self::ProjectionFind,
        Self::SortedByPrice,
        Self::AveragePriceByGenre,
        Self::TopAuthor,
        Self::TitleIndex,
        Self::AuthorYearIndex,
        Self::Explain,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::PublishedAfter => "published_after",
            Self::ByAuthor => "by_author",
            Self::UpdatePrice => "update_price",
            Self::DeleteByTitle => "delete_by_title",
            Self::InStockAfter => "in_stock_after",
            Self::ProjectionFind => "projection_find",
            Self::SortedByPrice => "sorted_by_price",
            Self::AveragePriceByGenre => "average_price_by_genre",
            Self::TopAuthor => "top_author",
            Self::TitleIndex => "title_index",
            Self::AuthorYearIndex => "author_year_index",
            Self::Explain => "explain",
            Self::Disconnect => "disconnect",
        }
    }

    /// Whether the step writes to the collection.
    #[must_use]
    pub const fn mutates(self) -> bool {
        matches!(self, Self::UpdatePrice | Self::DeleteByTitle | Self::TitleIndex | Self::AuthorYearIndex)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
