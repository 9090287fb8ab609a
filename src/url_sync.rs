//! Mirrors the current LOT into the page address.
//!
//! Updates replace the address in place (no history entry is recorded) and
//! leave every other query pair untouched.

use url::Url;

use crate::transport::jsonp::LOT_PARAM;

/// Address of the current page session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAddress {
    url: Url,
    history_len: usize,
}

impl PageAddress {
    /// A freshly loaded page at `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            history_len: 1,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Number of history entries; replacements never change it.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Set `lot`, or remove it when `lot` is empty.
    pub fn update(&mut self, lot: &str) {
        let value = (!lot.is_empty()).then_some(lot);
        set_query_param(&mut self.url, LOT_PARAM, value);
    }

    /// The `lot` value present at load time, if non-empty.
    pub fn read_initial(&self) -> Option<String> {
        self.param(LOT_PARAM)
    }

    /// Value of the first `key` pair, if non-empty.
    pub fn param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }
}

/// Set `key` in place of its first occurrence (dropping later duplicates), appending
/// it when absent; `None` removes every occurrence. Other pairs keep their order.
pub fn set_query_param(url: &mut Url, key: &str, value: Option<&str>) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in url.query_pairs() {
        if k == key {
            if let Some(new) = value
                && !replaced
            {
                pairs.push((k.into_owned(), new.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if let Some(new) = value
        && !replaced
    {
        pairs.push((key.to_string(), new.to_string()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
