//! Outgoing dice-command rewrites.
//!
//! Three independent first-token transformations, applied by the
//! controller in the order: step expansion, karma append, hide marking.
//!
//! Step annotation grammar (the de facto wire format for this
//! sub-protocol):
//!
//! ```text
//! "!" "!"? "[" <expr> "]" <rest>
//! ```
//!
//! `<expr>` is a bounded additive integer expression (digit runs joined
//! by `+` or `-`, optional leading minus) evaluating to a step level in
//! 1..=30. The whole annotation, leading bangs included, is replaced by
//! the step's dice notation with `<rest>` appended.

use crate::{ChatError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Earthdawn step table: step level (1-based) to dice notation.
static STEP_TABLE: [&str; 30] = [
    "1d4-2",
    "1d4-1",
    "1d4",
    "1d6",
    "1d8",
    "1d10",
    "1d12",
    "2d6",
    "1d8+1d6",
    "1d10+1d6",
    "1d10+1d8",
    "2d10",
    "1d12+1d10",
    "2d12",
    "1d12+2d6",
    "1d12+1d8+1d6",
    "1d12+1d10+1d6",
    "1d12+1d10+1d8",
    "1d20+2d6",
    "1d20+1d8+1d6",
    "1d20+1d10+1d6",
    "1d20+1d10+1d8",
    "1d20+2d10",
    "1d20+1d12+1d10",
    "1d20+2d12",
    "1d20+1d12+2d6",
    "1d20+1d12+1d8+1d6",
    "1d20+1d12+1d10+1d6",
    "1d20+1d12+1d10+1d8",
    "1d20+1d10+1d8+2d6",
];

static STEP_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^!!?\[(?P<expr>[^\]]*)\](?P<rest>.*)$").expect("step annotation regex")
});

/// Dice notation for a step level, if the level is within the table.
pub fn step_dice(level: i64) -> Option<&'static str> {
    if (1..=STEP_TABLE.len() as i64).contains(&level) {
        Some(STEP_TABLE[(level - 1) as usize])
    } else {
        None
    }
}

/// Expand a leading step annotation into dice notation.
///
/// Text without an annotation passes through unchanged. An annotation
/// whose expression is non-numeric or outside 1..=30 fails with
/// [`ChatError::Expansion`]; callers send the original text instead.
pub fn expand_step(text: &str) -> Result<String> {
    let Some(captures) = STEP_ANNOTATION.captures(text) else {
        return Ok(text.to_owned());
    };

    let expr = &captures["expr"];
    let level = eval_step_expr(expr)?;
    let dice = step_dice(level)
        .ok_or_else(|| ChatError::Expansion(format!("step level {level} out of range")))?;

    Ok(format!("{dice}{}", &captures["rest"]))
}

/// Evaluate a step expression: integer literals joined by `+`/`-`.
///
/// Deliberately not a general expression evaluator; step levels are a
/// closed 1..=30 domain.
fn eval_step_expr(expr: &str) -> Result<i64> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ChatError::Expansion("empty step expression".into()));
    }

    let mut total: i64 = 0;
    let mut sign: i64 = 1;
    let mut digits = String::new();

    let flush = |digits: &mut String, sign: i64, total: &mut i64| -> Result<()> {
        if digits.is_empty() {
            return Err(ChatError::Expansion(format!(
                "malformed step expression: {expr}"
            )));
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| ChatError::Expansion(format!("malformed step expression: {expr}")))?;
        // User-typed input: overflow is an expansion failure, not a panic.
        *total = sign
            .checked_mul(value)
            .and_then(|term| total.checked_add(term))
            .ok_or_else(|| {
                ChatError::Expansion(format!("step expression overflows: {expr}"))
            })?;
        digits.clear();
        Ok(())
    };

    for (i, c) in expr.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '-' if i == 0 => sign = -1,
            '+' | '-' => {
                flush(&mut digits, sign, &mut total)?;
                sign = if c == '-' { -1 } else { 1 };
            }
            c if c.is_whitespace() => continue,
            _ => {
                return Err(ChatError::Expansion(format!(
                    "non-numeric step expression: {expr}"
                )));
            }
        }
    }
    flush(&mut digits, sign, &mut total)?;

    Ok(total)
}

/// Append a karma modifier to the first whitespace-delimited token.
///
/// The first token is the roll expression itself, so the modifier lands
/// on the roll and not on trailing description text.
pub fn append_karma(text: &str, karma: &str) -> String {
    rewrite_first_token(text, |token| format!("{token}+{karma}"))
}

/// Append the hide marker `*` to the first token, asking the server not
/// to echo the roll expression publicly.
pub fn mark_hidden(text: &str) -> String {
    rewrite_first_token(text, |token| format!("{token}*"))
}

fn rewrite_first_token(text: &str, rewrite: impl FnOnce(&str) -> String) -> String {
    // Leading whitespace is not a token; keep it in front of the rewrite.
    let lead_len = text.len() - text.trim_start().len();
    let (lead, body) = text.split_at(lead_len);
    if body.is_empty() {
        return text.to_owned();
    }
    match body.split_once(char::is_whitespace) {
        Some((first, rest)) => {
            // split_once eats the delimiter; re-read it from the source.
            let sep = body[first.len()..body.len() - rest.len()].to_owned();
            format!("{lead}{}{sep}{rest}", rewrite(first))
        }
        None => format!("{lead}{}", rewrite(body)),
    }
}
