//! Attribute Name Tokenizer
//!
//! Splits a binding attribute name on `:` and remembers where the
//! keyword tokens sit. `vm:value:to:on:input` yields the tokens
//! `["vm", "value", "to", "on", "input"]` with `Vm` at 0, `To` at 2
//! and `On` at 3. When a keyword repeats, the last occurrence wins.

use std::collections::HashMap;

/// Keywords recognized inside binding attribute names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Vm,
    On,
    To,
    From,
    Bind,
}

impl Keyword {
    pub fn parse(token: &str) -> Option<Keyword> {
        match token {
            "vm" => Some(Keyword::Vm),
            "on" => Some(Keyword::On),
            "to" => Some(Keyword::To),
            "from" => Some(Keyword::From),
            "bind" => Some(Keyword::Bind),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Vm => "vm",
            Keyword::On => "on",
            Keyword::To => "to",
            Keyword::From => "from",
            Keyword::Bind => "bind",
        }
    }
}

/// A tokenized attribute name.
#[derive(Debug, Clone, Default)]
pub struct Tokenized {
    pub tokens: Vec<String>,
    special: HashMap<Keyword, usize>,
}

impl Tokenized {
    /// Index of a keyword's (last) occurrence in `tokens`.
    pub fn keyword_index(&self, keyword: Keyword) -> Option<usize> {
        self.special.get(&keyword).copied()
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// The token following `on`, if any: the trigger event name in
    /// `value:to:on:input`.
    pub fn event_after_on(&self) -> Option<&str> {
        let index = self.keyword_index(Keyword::On)?;
        self.tokens.get(index + 1).map(|s| s.as_str())
    }
}

pub fn tokenize(source: &str) -> Tokenized {
    let mut result = Tokenized::default();
    for token in source.split(':') {
        if let Some(keyword) = Keyword::parse(token) {
            result.special.insert(keyword, result.tokens.len());
        }
        result.tokens.push(token.to_string());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_binding_name() {
        let result = tokenize("value:to");
        assert_eq!(result.tokens, ["value", "to"]);
        assert_eq!(result.keyword_index(Keyword::To), Some(1));
        assert_eq!(result.keyword_index(Keyword::From), None);
    }

    #[test]
    fn test_event_suffix() {
        let result = tokenize("value:to:on:input");
        assert_eq!(result.keyword_index(Keyword::To), Some(1));
        assert_eq!(result.keyword_index(Keyword::On), Some(2));
        assert_eq!(result.event_after_on(), Some("input"));
    }

    #[test]
    fn test_vm_prefix() {
        let result = tokenize("vm:value:bind");
        assert!(result.has_token("vm"));
        assert_eq!(result.keyword_index(Keyword::Vm), Some(0));
        assert_eq!(result.keyword_index(Keyword::Bind), Some(2));
    }

    #[test]
    fn test_repeated_keyword_keeps_last_index() {
        // "on" appears as a bound name and as the event marker.
        let result = tokenize("on:to:on:click");
        assert_eq!(result.keyword_index(Keyword::On), Some(2));
        assert_eq!(result.event_after_on(), Some("click"));
    }

    #[test]
    fn test_no_keywords() {
        let result = tokenize("class");
        assert_eq!(result.tokens, ["class"]);
        assert_eq!(result.event_after_on(), None);
    }
}
