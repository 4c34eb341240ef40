/*!
 * ISO language code handling.
 *
 * Books declare their language in many shapes (`en`, `eng`, `fre`, `pt-BR`).
 * Everything is normalized to ISO 639-1 where such a code exists, falling
 * back to ISO 639-3.
 */

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: [(&str, &str); 18] = [
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Strip a region or script subtag (`pt-BR`, `zh_Hant`) and lowercase.
fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn lookup(code: &str) -> Option<Language> {
    let primary = primary_subtag(code);
    match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => {
            let terminological = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(bibliographic, _)| *bibliographic == primary)
                .map_or(primary.as_str(), |(_, terminological)| *terminological);
            Language::from_639_3(terminological)
        }
        _ => None,
    }
}

/// Whether the code names a known language
pub fn is_valid_language_code(code: &str) -> bool {
    lookup(code).is_some()
}

/// Normalize to ISO 639-1, or ISO 639-3 when the language has no 2-letter code
pub fn normalize_language_code(code: &str) -> Result<String> {
    let language = lookup(code).ok_or_else(|| anyhow!("Invalid language code: {}", code))?;
    Ok(language
        .to_639_1()
        .map_or_else(|| language.to_639_3().to_string(), str::to_string))
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    lookup(code)
        .map(|language| language.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (lookup(code1), lookup(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// English name of the language, used in prompts
pub fn get_language_name(code: &str) -> Result<String> {
    let language = lookup(code).ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;
    Ok(language.to_name().to_string())
}
