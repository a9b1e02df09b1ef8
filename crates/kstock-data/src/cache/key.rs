//! 캐시 키 생성.
//!
//! 키는 `|`로 구분한 구성 요소의 나열입니다. 구성 요소 안의 `\`와 `|`는
//! `\`로 이스케이프하므로 서로 다른 튜플이 같은 키가 되지 않습니다.

use std::fmt;

const SEPARATOR: char = '|';
const ESCAPE: char = '\\';

/// 결정적 캐시 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// 엔티티 식별자로 시작하는 키.
    pub fn new(entity: impl AsRef<str>) -> Self {
        let mut key = String::new();
        push_escaped(&mut key, entity.as_ref());
        Self(key)
    }

    /// 파라미터 추가.
    pub fn with(mut self, part: impl fmt::Display) -> Self {
        self.0.push(SEPARATOR);
        push_escaped(&mut self.0, &part.to_string());
        self
    }

    /// 이 키로 시작하는 모든 하위 키를 찾기 위한 접두사.
    pub fn prefix(&self) -> String {
        format!("{}{}", self.0, SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn push_escaped(buf: &mut String, part: &str) {
    for c in part.chars() {
        if c == SEPARATOR || c == ESCAPE {
            buf.push(ESCAPE);
        }
        buf.push(c);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
