//! Type name to key prefix conversion
//!
//! `ChatMessage` becomes `chat_messages`, `Admin::Post` becomes `admin/posts`.

/// Words whose plural is not formed by a suffix rule
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "news",
];

/// Convert a CamelCase type name to snake_case
///
/// Acronyms stay together (`HTTPRequest` -> `http_request`) and `::` becomes `/`.
pub fn underscore(name: &str) -> String {
    let name = name.replace("::", "/");
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else if c == '-' {
            result.push('_');
        } else {
            result.push(c);
        }
    }
    result
}

/// English plural of a snake_case name, inflecting only its last word
pub fn pluralize(name: &str) -> String {
    let split = name.rfind(['_', '/']).map(|i| i + 1).unwrap_or(0);
    let (head, word) = name.split_at(split);
    if word.is_empty() {
        return name.to_string();
    }

    let lower = word.to_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return name.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(single, _)| *single == lower) {
        return format!("{}{}", head, plural);
    }

    let plural = if lower.ends_with("ss")
        || lower.ends_with("sh")
        || lower.ends_with("ch")
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("us")
    {
        format!("{}es", word)
    } else if lower.ends_with('s') {
        // Already plural
        word.to_string()
    } else if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{}s", word)
    };
    format!("{}{}", head, plural)
}

fn ends_with_vowel_y(word: &str) -> bool {
    let mut rev = word.chars().rev();
    rev.next();
    matches!(rev.next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

/// Key prefix for a type name: underscored, then pluralized
pub fn collection_name(type_name: &str) -> String {
    pluralize(&underscore(type_name))
}
