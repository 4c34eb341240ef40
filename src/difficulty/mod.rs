/*!
 * Sentence difficulty analysis.
 *
 * - `lexicon`: word commonness lookup
 * - `level`: proficiency levels and thresholds
 * - `classifier`: per-sentence scoring
 * - `selector`: translate/keep decision for a whole document
 */

pub mod classifier;
pub mod level;
pub mod lexicon;
pub mod selector;

pub use classifier::{LevelClassifier, SentenceScore, tokenize};
pub use level::{ProficiencyLevel, ThresholdTable};
pub use lexicon::{FrequencyTable, LexicalScorer};
pub use selector::{SelectionSummary, SentenceSelector};
