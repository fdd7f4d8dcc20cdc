use std::collections::HashMap;

/// A parsed PGN game: tag pairs plus the mainline moves as SAN tokens.
///
/// Moves are not validated here; replaying them against a board is the
/// replayer's job.
#[derive(Debug, Clone, Default)]
pub struct PgnGame {
    pub tags: HashMap<String, String>,
    pub moves: Vec<String>,
    pub result: PgnResult,
}

impl PgnGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PgnResult {
    WhiteWins,
    BlackWins,
    Draw,
    #[default]
    Ongoing,
}

impl PgnResult {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Ongoing),
            _ => None,
        }
    }
}

/// Parse a single-game PGN string.
///
/// Comments (`{}` and `;`), variations, NAGs and move numbers are skipped;
/// only the mainline survives.
pub fn parse_pgn(input: &str) -> Result<PgnGame, PgnError> {
    let mut game = PgnGame::default();
    let mut movetext = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && movetext.trim().is_empty() {
            let (name, value) = parse_tag(trimmed)?;
            game.tags.insert(name, value);
        } else if trimmed.starts_with('%') {
            // Escape line.
            continue;
        } else {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }

    if let Some(result) = game.tag("Result").and_then(PgnResult::from_token) {
        game.result = result;
    }

    let mut chars = movetext.chars();
    let mut depth = 0usize;
    let mut token = String::new();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush(&mut token, &mut game, depth);
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(PgnError::UnterminatedComment);
                }
            }
            ';' => {
                flush(&mut token, &mut game, depth);
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush(&mut token, &mut game, depth);
                depth += 1;
            }
            ')' => {
                flush(&mut token, &mut game, depth);
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PgnError::InvalidFormat("unbalanced ')'".to_string()))?;
            }
            c if c.is_whitespace() => flush(&mut token, &mut game, depth),
            c => token.push(c),
        }
    }
    flush(&mut token, &mut game, depth);

    if depth != 0 {
        return Err(PgnError::UnterminatedVariation);
    }

    Ok(game)
}

fn flush(token: &mut String, game: &mut PgnGame, depth: usize) {
    if depth == 0 && !token.is_empty() {
        push_token(token, game);
    }
    token.clear();
}

fn push_token(token: &str, game: &mut PgnGame) {
    if let Some(result) = PgnResult::from_token(token) {
        game.result = result;
        return;
    }
    if token.starts_with('$') {
        return;
    }

    // Strip a leading move number: "12.", "12...", "12.e4".
    let stripped = token.trim_start_matches(|c: char| c.is_ascii_digit());
    let san = if stripped.len() != token.len() && stripped.starts_with('.') {
        stripped.trim_start_matches('.')
    } else {
        token
    };

    if !san.is_empty() {
        game.moves.push(san.to_string());
    }
}

fn parse_tag(line: &str) -> Result<(String, String), PgnError> {
    let inner = line
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
    let (name, rest) = inner
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
    let value = rest
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
    Ok((name.to_string(), value.replace("\\\"", "\"")))
}

#[derive(Debug, thiserror::Error)]
pub enum PgnError {
    #[error("Invalid PGN format: {0}")]
    InvalidFormat(String),
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error("Unterminated comment")]
    UnterminatedComment,
    #[error("Unterminated variation")]
    UnterminatedVariation,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LICHESS_PGN: &str = r#"[Event "Rated Blitz game"]
[Site "https://lichess.org/abcd1234"]
[White "alice"]
[Black "bob"]
[Result "0-1"]
[Opening "Italian Game: Two Knights Defense"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Nf6 4. Ng5?! d5 5. exd5 Na5 0-1
"#;

    #[test]
    fn test_parse_tags_and_moves() {
        let game = parse_pgn(LICHESS_PGN).unwrap();
        assert_eq!(game.tag("White"), Some("alice"));
        assert_eq!(game.tag("Opening"), Some("Italian Game: Two Knights Defense"));
        assert_eq!(game.result, PgnResult::BlackWins);
        assert_eq!(
            game.moves,
            vec!["e4", "e5", "Nf3", "Nc6", "Bc4", "Nf6", "Ng5?!", "d5", "exd5", "Na5"]
        );
    }

    #[test]
    fn test_skips_comments_variations_and_nags() {
        let pgn = "1. e4 {best by test} e5 (1... c5 2. Nf3 (2. c3) d6) 2. Nf3 $1 ; line comment\n2... Nc6 *";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(game.result, PgnResult::Ongoing);
    }

    #[test]
    fn test_move_number_glued_to_move() {
        let game = parse_pgn("1.d4 d5 2.c4 1/2-1/2").unwrap();
        assert_eq!(game.moves, vec!["d4", "d5", "c4"]);
        assert_eq!(game.result, PgnResult::Draw);
    }

    #[test]
    fn test_empty_movetext() {
        let game = parse_pgn("[Event \"?\"]\n").unwrap();
        assert!(game.moves.is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            parse_pgn("1. e4 {never closed"),
            Err(PgnError::UnterminatedComment)
        ));
        assert!(matches!(
            parse_pgn("1. e4 (1. d4"),
            Err(PgnError::UnterminatedVariation)
        ));
        assert!(matches!(parse_pgn("1. e4 )"), Err(PgnError::InvalidFormat(_))));
        assert!(matches!(
            parse_pgn("[White alice]\n1. e4"),
            Err(PgnError::InvalidTag(_))
        ));
    }
}
