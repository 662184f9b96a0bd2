mod article;
mod source;

pub use article::{ArticleDetail, NewArticle, RecentArticle};
pub use source::{Source, SourceMetadata};
