use std::collections::HashSet;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedAddresses {
    pub valid: Vec<Pubkey>,
    pub invalid: usize,
    pub duplicates: usize,
}

fn is_base58_char(c: char) -> bool {
    BASE58_ALPHABET.contains(c)
}

/// 形如 base58 且长度在 32..=44 之间的字符串。
pub fn looks_like_address(token: &str) -> bool {
    (32..=44).contains(&token.len()) && token.chars().all(is_base58_char)
}

/// 从任意文本中提取地址：以非 base58 字符为分隔，保序去重，统计非法与重复数量。
pub fn parse_addresses(raw: &str) -> ImportedAddresses {
    let mut seen = HashSet::new();
    let mut imported = ImportedAddresses::default();

    for token in raw.split(|c: char| !is_base58_char(c)) {
        if token.is_empty() {
            continue;
        }
        let parsed = if looks_like_address(token) {
            Pubkey::from_str(token).ok()
        } else {
            None
        };
        match parsed {
            Some(key) => {
                if seen.insert(key) {
                    imported.valid.push(key);
                } else {
                    imported.duplicates += 1;
                }
            }
            None => imported.invalid += 1,
        }
    }

    imported
}

/// 合并导入结果到现有收款列表，保持首次出现的顺序。
pub fn merge_recipients(existing: &[Pubkey], imported: &[Pubkey], mode: ImportMode) -> Vec<Pubkey> {
    let base: &[Pubkey] = match mode {
        ImportMode::Append => existing,
        ImportMode::Replace => &[],
    };
    let mut seen = HashSet::with_capacity(base.len() + imported.len());
    base.iter()
        .chain(imported.iter())
        .filter(|key| seen.insert(**key))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_addresses_across_separators() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let raw = format!("{a},{b}\r\n{a}; nope 0xdeadbeef\t{b}");
        let imported = parse_addresses(&raw);
        assert_eq!(imported.valid, vec![a, b]);
        assert_eq!(imported.duplicates, 2);
        // "nope" 与 "xdeadbeef" 不是地址（'0' 不在 base58 字母表中，作为分隔符）
        assert_eq!(imported.invalid, 2);
    }

    #[test]
    fn merge_appends_or_replaces_without_duplicates() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let c = Pubkey::new_unique();
        assert_eq!(
            merge_recipients(&[a, b], &[b, c], ImportMode::Append),
            vec![a, b, c]
        );
        assert_eq!(
            merge_recipients(&[a, b], &[c, c], ImportMode::Replace),
            vec![c]
        );
    }

    #[test]
    fn address_shape_check() {
        assert!(looks_like_address(&Pubkey::new_unique().to_string()));
        assert!(!looks_like_address("short"));
        assert!(!looks_like_address("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl"));
    }
}
