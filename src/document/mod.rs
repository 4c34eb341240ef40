/*!
 * Document model for books.
 *
 * The ingestion layer hands over an ordered Chapter -> Paragraph -> Sentence
 * tree. Sentence text and ids are fixed at ingestion; classification and
 * translation state is filled in by the pipeline.
 */

pub mod model;

pub use model::{
    Chapter, DocumentTree, Paragraph, Sentence, SentenceDisposition, SentenceLocation,
};
