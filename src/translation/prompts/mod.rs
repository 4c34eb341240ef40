/*!
 * Prompt construction for batch translation requests.
 */

pub mod templates;

pub use templates::{BatchPromptBuilder, PromptTemplate, RequestEntry, ServiceRequest};
