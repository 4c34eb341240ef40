/*!
 * Tests for ISO language code utilities
 */

use mlbooks::language_utils::{
    get_language_name, is_valid_language_code, language_codes_match, normalize_language_code,
    normalize_to_part2t,
};

/// Test that 2-letter, 3-letter and bibliographic codes are all recognized
#[test]
fn test_isValidLanguageCode_withKnownCodes_shouldAccept() {
    assert!(is_valid_language_code("en"));
    assert!(is_valid_language_code("eng"));
    assert!(is_valid_language_code("fre"));
    assert!(is_valid_language_code("fra"));
    assert!(is_valid_language_code("pt-BR"));
}

/// Test that garbage codes are rejected
#[test]
fn test_isValidLanguageCode_withUnknownCodes_shouldReject() {
    assert!(!is_valid_language_code(""));
    assert!(!is_valid_language_code("xx"));
    assert!(!is_valid_language_code("english"));
    assert!(!is_valid_language_code("e"));
}

/// Test normalization to the 2-letter form
#[test]
fn test_normalizeLanguageCode_withVariants_shouldReturnPart1() {
    assert_eq!(normalize_language_code("en").unwrap(), "en");
    assert_eq!(normalize_language_code("ENG").unwrap(), "en");
    assert_eq!(normalize_language_code("ger").unwrap(), "de");
    assert_eq!(normalize_language_code("pt_BR").unwrap(), "pt");
}

/// Test normalization to the 3-letter terminological form
#[test]
fn test_normalizeToPart2t_withBibliographicCode_shouldReturnTerminological() {
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("fr").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert!(normalize_to_part2t("zz").is_err());
}

/// Test that different spellings of one language compare equal
#[test]
fn test_languageCodesMatch_withEquivalentCodes_shouldMatch() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("fre", "fra"));
    assert!(language_codes_match("fr", "fre"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("xx", "xx"));
}

/// Test the English names used in prompts
#[test]
fn test_getLanguageName_withValidCode_shouldReturnEnglishName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("fra").unwrap(), "French");
    assert_eq!(get_language_name("pt-BR").unwrap(), "Portuguese");
    assert!(get_language_name("invalid").is_err());
}
