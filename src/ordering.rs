//! Derive a query's result ordering from its top-level ORDER BY clause

use crate::row::{ColumnType, Schema};
use crate::source::SortKey;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word { text: String, quoted: bool },
    Number(String),
    Symbol(char),
}

#[derive(Debug, Clone)]
struct Lexeme {
    token: Token,
    depth: usize,
}

/// Split SQL text into words, numbers and symbols, tracking parenthesis
/// depth. String literals and comments are dropped.
fn tokenize(sql: &str) -> Vec<Lexeme> {
    let chars: Vec<char> = sql.chars().collect();
    let mut lexemes = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '\'' => {
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\'' {
                        if chars.get(i + 1) == Some(&'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
                // literals only matter as "something that is not a column"
                lexemes.push(Lexeme {
                    token: Token::Symbol('\''),
                    depth,
                });
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                while i < chars.len() {
                    if chars[i] == '"' {
                        if chars.get(i + 1) == Some(&'"') {
                            text.push('"');
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    text.push(chars[i]);
                    i += 1;
                }
                i += 1;
                lexemes.push(Lexeme {
                    token: Token::Word { text, quoted: true },
                    depth,
                });
            }
            '(' => {
                lexemes.push(Lexeme {
                    token: Token::Symbol('('),
                    depth,
                });
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                lexemes.push(Lexeme {
                    token: Token::Symbol(')'),
                    depth,
                });
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    i += 1;
                }
                lexemes.push(Lexeme {
                    token: Token::Number(chars[start..i].iter().collect()),
                    depth,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                lexemes.push(Lexeme {
                    token: Token::Word {
                        text: chars[start..i].iter().collect(),
                        quoted: false,
                    },
                    depth,
                });
            }
            other => {
                lexemes.push(Lexeme {
                    token: Token::Symbol(other),
                    depth,
                });
                i += 1;
            }
        }
    }

    lexemes
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word { text, quoted: false } if text.eq_ignore_ascii_case(keyword))
}

/// Tokens of the last ORDER BY clause at nesting depth zero
fn top_level_order_by(lexemes: &[Lexeme]) -> Option<Vec<Token>> {
    let start = lexemes
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| {
            pair[0].depth == 0
                && pair[1].depth == 0
                && is_keyword(&pair[0].token, "ORDER")
                && is_keyword(&pair[1].token, "BY")
        })
        .map(|(i, _)| i + 2)
        .last()?;

    let clause = lexemes[start..]
        .iter()
        .take_while(|l| {
            !(l.depth == 0
                && (matches!(l.token, Token::Symbol(';'))
                    || ["LIMIT", "OFFSET", "FETCH"]
                        .iter()
                        .any(|kw| is_keyword(&l.token, kw))))
        })
        .map(|l| (l.token.clone(), l.depth))
        .collect::<Vec<_>>();

    // a set operation after the clause means it belonged to one branch
    if clause.iter().any(|(t, d)| {
        *d == 0 && ["UNION", "EXCEPT", "INTERSECT"].iter().any(|kw| is_keyword(t, kw))
    }) {
        return None;
    }

    let mut tokens = Vec::new();
    for (token, depth) in clause {
        if depth > 0 {
            // any nested expression is not a plain column reference
            return Some(vec![Token::Symbol('(')]);
        }
        tokens.push(token);
    }
    Some(tokens)
}

/// Items of the outermost select list, split on top-level commas
fn select_items(lexemes: &[Lexeme]) -> Vec<Vec<Token>> {
    let Some(start) = lexemes
        .iter()
        .position(|l| l.depth == 0 && is_keyword(&l.token, "SELECT"))
    else {
        return Vec::new();
    };

    let mut items = vec![Vec::new()];
    for lexeme in &lexemes[start + 1..] {
        if lexeme.depth == 0 {
            if ["FROM", "WHERE", "GROUP", "HAVING", "WINDOW", "QUALIFY", "ORDER", "LIMIT"]
                .iter()
                .any(|kw| is_keyword(&lexeme.token, kw))
                || matches!(lexeme.token, Token::Symbol(';'))
            {
                break;
            }
            if matches!(lexeme.token, Token::Symbol(',')) {
                items.push(Vec::new());
                continue;
            }
        }
        if let Some(item) = items.last_mut() {
            item.push(lexeme.token.clone());
        }
    }

    if let Some(first) = items.first_mut() {
        if first.first().map_or(false, |t| is_keyword(t, "DISTINCT") || is_keyword(t, "ALL")) {
            first.remove(0);
        }
    }
    items
}

fn same_word(a: &Token, b: &Token) -> bool {
    match (a, b) {
        (Token::Word { text: x, quoted: false }, Token::Word { text: y, quoted: false }) => {
            x.eq_ignore_ascii_case(y)
        }
        (Token::Word { text: x, .. }, Token::Word { text: y, .. }) => x == y,
        (Token::Symbol(x), Token::Symbol(y)) => x == y,
        _ => false,
    }
}

/// Output name of a select item that is exactly the column reference `reference`,
/// optionally aliased
fn output_name_of(item: &[Token], reference: &[Token]) -> Option<String> {
    if item.len() < reference.len()
        || !item.iter().zip(reference).all(|(a, b)| same_word(a, b))
    {
        return None;
    }
    let name_of = |token: &Token| match token {
        Token::Word { text, .. } => Some(text.clone()),
        _ => None,
    };
    match &item[reference.len()..] {
        [] => reference.last().and_then(name_of),
        [alias] => name_of(alias),
        [kw, alias] if is_keyword(kw, "AS") => name_of(alias),
        _ => None,
    }
}

/// Position of the only result column called `name`
fn unique_column(schema: &Schema, name: &str, exact: bool) -> Option<usize> {
    let matches = |column_name: &str| {
        if exact {
            column_name == name
        } else {
            column_name.eq_ignore_ascii_case(name)
        }
    };
    let mut positions = schema
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| matches(&c.name))
        .map(|(i, _)| i);
    let first = positions.next()?;
    positions.next().is_none().then_some(first)
}

fn resolve_term(term: &[Token], schema: &Schema, items: &[Vec<Token>]) -> Option<SortKey> {
    let mut end = term.len();
    let mut nulls_first = None;
    let mut descending = false;

    if end >= 2 && is_keyword(&term[end - 2], "NULLS") {
        if is_keyword(&term[end - 1], "FIRST") {
            nulls_first = Some(true);
        } else if is_keyword(&term[end - 1], "LAST") {
            nulls_first = Some(false);
        } else {
            return None;
        }
        end -= 2;
    }
    if end >= 1 && is_keyword(&term[end - 1], "DESC") {
        descending = true;
        end -= 1;
    } else if end >= 1 && is_keyword(&term[end - 1], "ASC") {
        end -= 1;
    }

    let column = resolve_column(&term[..end], schema, items)?;
    if let ColumnType::Other(_) = schema.columns()[column].col_type {
        return None;
    }
    Some(SortKey {
        column,
        descending,
        nulls_first: nulls_first.unwrap_or(false),
    })
}

fn resolve_column(expr: &[Token], schema: &Schema, items: &[Vec<Token>]) -> Option<usize> {
    match expr {
        [Token::Number(n)] => {
            let ordinal: usize = n.parse().ok()?;
            (1..=schema.len()).contains(&ordinal).then(|| ordinal - 1)
        }
        [.., Token::Word { text, quoted }] => {
            // qualified names alternate word, '.', word
            let well_formed = expr.iter().enumerate().all(|(i, t)| match t {
                Token::Word { .. } => i % 2 == 0,
                Token::Symbol('.') => i % 2 == 1,
                _ => false,
            });
            if !well_formed {
                return None;
            }
            if expr.len() > 1 {
                // a qualified reference only names a result column when the
                // select list projects that same reference
                let mut outputs = items.iter().filter_map(|item| output_name_of(item, expr));
                let name = outputs.next()?;
                if outputs.next().is_some() {
                    return None;
                }
                return unique_column(schema, &name, false);
            }
            if *quoted {
                unique_column(schema, text, true).or_else(|| unique_column(schema, text, false))
            } else {
                unique_column(schema, text, false)
            }
        }
        _ => None,
    }
}

/// Sort keys describing the order of the query's result rows, or `None`
/// when the result order cannot be expressed over the result columns.
pub fn sort_keys_for_query(query: &str, schema: &Schema) -> Option<Vec<SortKey>> {
    let lexemes = tokenize(query);
    let clause = top_level_order_by(&lexemes)?;

    if clause.len() == 1 && is_keyword(&clause[0], "ALL") {
        let orderable = schema
            .columns()
            .iter()
            .all(|c| !matches!(c.col_type, ColumnType::Other(_)));
        return (orderable && !schema.is_empty())
            .then(|| (0..schema.len()).map(SortKey::asc).collect());
    }

    let items = select_items(&lexemes);
    let mut keys = Vec::new();
    for term in clause.split(|t| matches!(t, Token::Symbol(','))) {
        keys.push(resolve_term(term, schema, &items)?);
    }

    (!keys.is_empty()).then_some(keys)
}
