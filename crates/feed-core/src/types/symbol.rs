//! 심볼 목록 정규화.

use std::collections::HashSet;

/// 쉼표로 구분된 심볼 문자열을 목록으로 변환합니다.
///
/// 공백은 제거되고 빈 항목은 무시됩니다.
pub fn parse_symbol_list(csv: &str) -> Vec<String> {
    normalize_symbols(csv.split(','))
}

/// 심볼 목록을 정규화합니다.
///
/// - 앞뒤 공백 제거
/// - 빈 심볼 제거
/// - 중복 제거 (처음 나타난 순서 유지)
///
/// Yahoo 심볼은 대소문자를 구분하지 않지만 `^GSPC`, `GC=F` 같은 형식을
/// 그대로 보존하기 위해 대소문자는 변경하지 않습니다.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
